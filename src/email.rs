use crate::clock::Clock;
use crate::config::MailConfig;
use crate::error::DeliveryError;
use crate::export::XLSX_CONTENT_TYPE;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fs;
use std::path::Path;
use std::time::Duration;

const SUBJECT: &str = "Folder Details Report";
const BODY: &str = "Attached is the folder details report.";

/// Anything that can deliver a finished report file.
pub trait Notifier: Send + Sync {
    fn send_report(&self, path: &Path) -> Result<(), DeliveryError>;
}

pub struct Mailer<T> {
    transport: T,
    from: Mailbox,
    to: Mailbox,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|source| DeliveryError::Address {
        address: address.to_string(),
        source,
    })
}

impl Mailer<SmtpTransport> {
    /// Authenticated relay (implicit TLS on 465) with a bounded timeout.
    pub fn smtp(config: &MailConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        let creds = Credentials::new(config.smtp_user.clone(), config.smtp_pass.clone());
        let transport = SmtpTransport::relay(&config.smtp_host)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        Mailer::new(transport, &config.smtp_user, &config.recipient)
    }
}

impl<T> Mailer<T>
where
    T: Transport,
    T::Error: std::fmt::Display,
{
    pub fn new(transport: T, from: &str, to: &str) -> Result<Self, DeliveryError> {
        Ok(Mailer {
            transport,
            from: parse_mailbox(from)?,
            to: parse_mailbox(to)?,
        })
    }

    #[must_use]
    pub fn recipient(&self) -> &Mailbox {
        &self.to
    }

    fn deliver(&self, email: &Message) -> Result<(), DeliveryError> {
        self.transport
            .send(email)
            .map(|_| ())
            .map_err(|e| DeliveryError::Transport(e.to_string()))
    }

    /// Sends a plain message so the credentials can be checked without a scan.
    pub fn send_test(&self, clock: &dyn Clock) -> Result<(), DeliveryError> {
        let body = format!(
            "This is a test email from folder_report.\n\nSent at: {}\n\nIf you received this, report delivery is working.",
            clock.now().format("%Y-%m-%d %H:%M:%S")
        );
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject("[Folder Report] Test Email")
            .body(body)?;

        self.deliver(&email)
    }
}

impl<T> Notifier for Mailer<T>
where
    T: Transport + Send + Sync,
    T::Error: std::fmt::Display,
{
    fn send_report(&self, path: &Path) -> Result<(), DeliveryError> {
        let content = fs::read(path).map_err(|source| DeliveryError::Attachment {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map_or_else(|| "report.xlsx".to_string(), |n| n.to_string_lossy().to_string());
        let content_type = ContentType::parse(XLSX_CONTENT_TYPE)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(SUBJECT)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(BODY.to_string()))
                    .singlepart(Attachment::new(filename).body(content, content_type)),
            )?;

        self.deliver(&email)?;
        log::info!("report {} sent to {}", path.display(), self.to);
        Ok(())
    }
}
