mod clock;
mod config;
mod email;
mod error;
mod export;
mod pipeline;
mod scanner;
mod scheduler;
mod server;
mod summary;
mod types;

use clap::Parser;
use clock::{Clock, SystemClock};
use config::Config;
use email::Mailer;
use pipeline::{Pipeline, RunOutcome};
use scheduler::Scheduler;
use server::IdleServer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory whose subfolders are reported (overrides USER_DIR)
    #[arg(long, short = 'r')]
    root: Option<PathBuf>,

    /// Port for the HTTP listener (overrides PORT)
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Where report spreadsheets are written (overrides REPORT_DIR)
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Run a single scan, export and send, then exit
    #[arg(long)]
    once: bool,

    /// Print the folder table to the terminal instead of sending a report
    #[arg(long)]
    print: bool,

    /// Test email configuration by sending a test email
    #[arg(long)]
    test_email: bool,

    /// Give up on a scan after this many seconds
    #[arg(long, default_value_t = 300)]
    scan_timeout: u64,

    /// Give up on the SMTP exchange after this many seconds
    #[arg(long, default_value_t = 60)]
    smtp_timeout: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(root) = args.root.clone() {
        config.root = Some(root);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.output_dir.clone() {
        config.out_dir = dir;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if args.test_email {
        test_email_config(&config, &args, clock.as_ref());
        return;
    }

    if args.print {
        print_once(&config, clock.as_ref());
        return;
    }

    let pipeline = Arc::new(build_pipeline(&config, &args, Arc::clone(&clock)));

    if args.once {
        let outcome = pipeline.run_once();
        log::info!("run finished: {outcome:?}");
        if !matches!(outcome, RunOutcome::Delivered { .. } | RunOutcome::Exported { .. }) {
            std::process::exit(1);
        }
        return;
    }

    let server = match IdleServer::bind(config.port) {
        Ok(server) => {
            log::info!("server is running on port {}", server.port());
            server
        }
        Err(e) => {
            log::error!("cannot listen on port {}: {e}", config.port);
            std::process::exit(1);
        }
    };

    let scheduler = match Scheduler::new(scheduler::EVERY_MINUTE, Arc::clone(&clock)) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    if let Some(next) = scheduler.next_fire() {
        log::info!("first scheduled run at {}", next.format("%Y-%m-%d %H:%M:%S"));
    }
    let job = Arc::clone(&pipeline);
    let _schedule = match scheduler.start(Arc::new(move || {
        job.run_once();
    })) {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("failed to start scheduler: {e}");
            std::process::exit(1);
        }
    };

    server.wait();
}

fn build_pipeline(config: &Config, args: &Args, clock: Arc<dyn Clock>) -> Pipeline {
    let pipeline = Pipeline::new(config.root.clone(), config.out_dir.clone(), clock)
        .with_scan_timeout(Duration::from_secs(args.scan_timeout));

    let Some(mail) = &config.mail else {
        return pipeline;
    };

    match Mailer::smtp(mail, Duration::from_secs(args.smtp_timeout)) {
        Ok(mailer) => {
            log::info!("reports will be sent to {}", mailer.recipient());
            pipeline.with_notifier(Box::new(mailer))
        }
        Err(e) => {
            log::error!("report delivery disabled: {e}");
            pipeline
        }
    }
}

fn print_once(config: &Config, clock: &dyn Clock) {
    let Some(root) = &config.root else {
        log::error!("{}", error::ConfigError::MissingRoot);
        std::process::exit(1);
    };

    match scanner::scan_root(root, clock) {
        Ok(report) => summary::print_report(&report.value, report.errors.len()),
        Err(e) => {
            log::error!("scan failed: {e}");
            std::process::exit(1);
        }
    }
}

fn test_email_config(config: &Config, args: &Args, clock: &dyn Clock) {
    println!("Testing email configuration...");

    let Some(mail) = &config.mail else {
        eprintln!("✗ Email configuration incomplete");
        eprintln!("  Set these in the environment or in .env:");
        eprintln!("    EMAIL_USER=your-email@gmail.com");
        eprintln!("    EMAIL_PASSWORD=your-app-password");
        eprintln!("    EMAIL_TO=recipient@example.com");
        std::process::exit(1);
    };
    println!("✓ Email config loaded");
    println!("  SMTP Host: {}", mail.smtp_host);
    println!("  SMTP User: {}", mail.smtp_user);
    println!("  Recipient: {}", mail.recipient);

    println!("\nSending test email...");
    let result = Mailer::smtp(mail, Duration::from_secs(args.smtp_timeout))
        .and_then(|mailer| mailer.send_test(clock));

    match result {
        Ok(()) => println!("\nTest complete. Check your inbox at: {}", mail.recipient),
        Err(e) => {
            eprintln!("✗ Failed to send test email: {e}");
            std::process::exit(1);
        }
    }
}
