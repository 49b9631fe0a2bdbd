use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Response, Server};

/// Keeps the process reachable as a service. Defines no routes, so every
/// request gets a 404. Dropping it closes the listener.
pub struct IdleServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl IdleServer {
    pub fn bind(port: u16) -> io::Result<Self> {
        let server = Server::http(("0.0.0.0", port))
            .map_err(|e| io::Error::new(io::ErrorKind::AddrNotAvailable, e.to_string()))?;
        let addr = server.server_addr().to_ip().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "listener has no IP address")
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let worker = thread::Builder::new()
            .name("http".to_string())
            .spawn(move || serve(&server, &flag))?;

        Ok(IdleServer {
            addr,
            stop,
            worker: Some(worker),
        })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Blocks for as long as the listener is up.
    pub fn wait(mut self) {
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("http thread panicked");
        }
    }
}

impl Drop for IdleServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("http thread panicked");
        }
    }
}

fn serve(server: &Server, stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        match server.recv_timeout(Duration::from_millis(500)) {
            Ok(Some(request)) => {
                log::debug!("{} {} -> 404", request.method(), request.url());
                let response = Response::from_string("Not Found").with_status_code(404);
                if let Err(e) = request.respond(response) {
                    log::debug!("failed to answer request: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("listener error: {e}");
                break;
            }
        }
    }
}
