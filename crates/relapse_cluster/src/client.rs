//! Client side of the coordination protocol.

use crate::protocol::{Request, Response};
use relapse_core::{CoreError, Occurrence, ProcessId};
use relapse_inject::CallSiteInfo;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::warn;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No connection has been established
    #[error("Not connected to coordinator")]
    NotConnected,

    /// Connection failed or was lost mid-call
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Message failed to encode or decode
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Coordinator answered with the wrong message
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<TransportError> for CoreError {
    fn from(err: TransportError) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// Connection lifecycle, kept explicit rather than hidden behind a lazy
/// proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Not yet connected
    Disconnected,
    /// Connected and usable
    Connected,
    /// A transport failure occurred; the connection is gone
    Lost,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Client for the coordination protocol: one in-flight request, blocking
/// await on the response.
///
/// Any transport failure on a decision call degrades to "deny" - the
/// caller is on the hot path of the system under test and must never
/// block or crash over a coordination hiccup, and never guess a grant
/// under uncertainty.
pub struct CoordinatorClient {
    addr: String,
    state: ClientState,
    connection: Option<Connection>,
}

impl CoordinatorClient {
    /// Create a client for a coordinator address; resolved once at
    /// start-up via [`connect`](Self::connect)
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            state: ClientState::Disconnected,
            connection: None,
        }
    }

    /// Connection state
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Coordinator address
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Establish the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator is unreachable.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|err| TransportError::ConnectionLost(err.to_string()))?;
        let (read, write) = stream.into_split();
        self.connection = Some(Connection {
            reader: BufReader::new(read),
            writer: write,
        });
        self.state = ClientState::Connected;
        Ok(())
    }

    /// Ask the coordinator whether the fault fires. Transport failures map
    /// to deny.
    pub async fn inject(
        &mut self,
        pid: ProcessId,
        occurrence: Occurrence,
        site: &CallSiteInfo,
    ) -> bool {
        let request = Request::Inject {
            pid,
            occurrence,
            site: site.clone(),
        };
        match self.call(&request).await {
            Ok(Response::Decision { grant }) => grant,
            Ok(other) => {
                warn!(?other, "unexpected coordinator response; denying");
                self.mark_lost();
                false
            }
            Err(err) => {
                warn!(%err, "coordinator unreachable; denying");
                false
            }
        }
    }

    /// End the trial on the coordinator side. Returns whether the
    /// coordinator acknowledged.
    pub async fn shutdown(&mut self) -> bool {
        match self.call(&Request::Shutdown).await {
            Ok(Response::Shutdown) => true,
            Ok(other) => {
                warn!(?other, "unexpected shutdown response");
                self.mark_lost();
                false
            }
            Err(err) => {
                warn!(%err, "shutdown call failed");
                false
            }
        }
    }

    async fn call(&mut self, request: &Request) -> Result<Response, TransportError> {
        let connection = match self.connection.as_mut() {
            Some(connection) => connection,
            None => return Err(TransportError::NotConnected),
        };

        let mut payload = serde_json::to_string(request)
            .map_err(|err| TransportError::Serialization(err.to_string()))?;
        payload.push('\n');

        if let Err(err) = connection.writer.write_all(payload.as_bytes()).await {
            self.mark_lost();
            return Err(TransportError::ConnectionLost(err.to_string()));
        }

        let mut line = String::new();
        match connection.reader.read_line(&mut line).await {
            Ok(0) => {
                self.mark_lost();
                Err(TransportError::ConnectionLost("connection closed".to_string()))
            }
            Ok(_) => serde_json::from_str(line.trim_end())
                .map_err(|err| TransportError::InvalidResponse(err.to_string())),
            Err(err) => {
                self.mark_lost();
                Err(TransportError::ConnectionLost(err.to_string()))
            }
        }
    }

    fn mark_lost(&mut self) {
        self.state = ClientState::Lost;
        self.connection = None;
    }
}
