//! Background UDP listener feeding raw controller lines to the simulation

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default port the Arduino bridge sends to
pub const DEFAULT_CONTROLLER_PORT: u16 = 49999;

/// Upper bound on waiting for the receive task during shutdown
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_millis(200);

const MAX_DATAGRAM: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("failed to bind controller socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Owns the receive task; dropping the receiver side ends the task too
pub struct ControllerListener {
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ControllerListener {
    /// Listen on every interface at `port`
    pub async fn bind(
        port: u16,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), ControllerError> {
        Self::bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
    }

    pub async fn bind_addr(
        addr: SocketAddr,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>), ControllerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ControllerError::Bind { addr, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| ControllerError::Bind { addr, source })?;

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(receive_loop(socket, line_tx, stop_rx));

        info!(addr = %local_addr, "Controller listener started");

        Ok((
            Self {
                local_addr,
                stop_tx,
                task,
            },
            line_rx,
        ))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the task to stop and wait briefly for it; aborts if it lingers
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);

        let abort = self.task.abort_handle();
        match tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, self.task).await {
            Ok(_) => info!("Controller listener stopped"),
            Err(_) => {
                warn!("Controller listener did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

async fn receive_loop(
    socket: UdpSocket,
    line_tx: mpsc::UnboundedSender<String>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        if *stop_rx.borrow() {
                            break;
                        }
                        warn!(error = %e, "Controller receive failed");
                        continue;
                    }
                };

                let text = String::from_utf8_lossy(&buf[..len]);
                for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    debug!(%from, line, "Controller datagram");
                    if line_tx.send(line.to_string()).is_err() {
                        debug!("Controller queue closed, stopping listener");
                        return;
                    }
                }
            }
        }
    }
}
