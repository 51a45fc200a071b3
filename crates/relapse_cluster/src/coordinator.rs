//! The coordinator process: sole point of truth for the trial-wide grant.

use crate::protocol::{Request, Response};
use relapse_core::{CoreError, CoreResult};
use relapse_inject::InjectionManager;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Address to listen on
    pub addr: String,
    /// Directory the trial descriptor is finalized into
    pub trials_dir: PathBuf,
}

impl CoordinatorConfig {
    /// Create a config
    #[must_use]
    pub fn new(addr: impl Into<String>, trials_dir: impl Into<PathBuf>) -> Self {
        Self {
            addr: addr.into(),
            trials_dir: trials_dir.into(),
        }
    }
}

/// Coordinator server: serializes concurrent requests from many processes
/// through the single shared [`InjectionManager`].
///
/// Serving stops when a `Shutdown` request arrives; the manager is
/// finalized at that point, exactly once.
pub struct Coordinator {
    config: CoordinatorConfig,
    manager: Arc<InjectionManager>,
    listener: TcpListener,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl Coordinator {
    /// Bind the coordinator to its address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(
        config: CoordinatorConfig,
        manager: Arc<InjectionManager>,
    ) -> CoreResult<Self> {
        let listener = TcpListener::bind(&config.addr).await?;
        let (stop_tx, stop_rx) = watch::channel(false);
        info!(addr = %config.addr, trial = %manager.trial(), "coordinator bound");
        Ok(Self {
            config,
            manager,
            listener,
            stop_tx,
            stop_rx,
        })
    }

    /// The bound address (useful when binding port 0)
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be read.
    pub fn local_addr(&self) -> CoreResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The shared manager
    #[must_use]
    pub fn manager(&self) -> Arc<InjectionManager> {
        Arc::clone(&self.manager)
    }

    /// Accept and serve connections until a `Shutdown` request arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting fails.
    pub async fn run(self) -> CoreResult<()> {
        let mut stop_rx = self.stop_rx.clone();
        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "connection accepted");
                    let manager = Arc::clone(&self.manager);
                    let trials_dir = self.config.trials_dir.clone();
                    let stop_tx = self.stop_tx.clone();
                    tokio::spawn(async move {
                        if let Err(err) = serve_connection(stream, manager, trials_dir, stop_tx).await {
                            warn!(%peer, %err, "connection ended with error");
                        }
                    });
                }
            }
        }
        info!("coordinator stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    manager: Arc<InjectionManager>,
    trials_dir: PathBuf,
    stop_tx: watch::Sender<bool>,
) -> CoreResult<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = serde_json::from_str(&line)?;
        let (response, stop) = match request {
            Request::Inject {
                pid,
                occurrence,
                site,
            } => {
                let grant = manager.decide_at(pid, occurrence, &site).is_grant();
                (Response::Decision { grant }, false)
            }
            Request::Shutdown => {
                if let Err(err) = manager.finalize(&trials_dir) {
                    warn!(%err, "finalize failed during shutdown");
                }
                (Response::Shutdown, true)
            }
        };

        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        write.write_all(payload.as_bytes()).await?;

        if stop {
            stop_tx.send(true).map_err(|err| CoreError::Internal {
                message: format!("stop signal dropped: {}", err),
            })?;
            break;
        }
    }
    Ok(())
}
