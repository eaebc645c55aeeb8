//! Outbound task delivery over TCP
//!
//! One connection per request: connect, write the task frame, then a
//! spawned reader waits for the result frame and feeds it back into the
//! correlator. If the peer never answers, the correlator's own deadline
//! handles it; this transport only reports delivery.

use async_trait::async_trait;
use devlink_core::{TaskRequest, WireMessage};
use devlink_tasks::{TaskCorrelator, Transport, TransportError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::frame;

/// Transport that delivers task requests to a fixed peer endpoint
pub struct TcpTransport {
    peer: SocketAddr,
    correlator: Arc<TaskCorrelator>,
}

impl TcpTransport {
    /// Create a transport targeting `peer`, feeding responses into
    /// `correlator`
    pub fn new(peer: SocketAddr, correlator: Arc<TaskCorrelator>) -> Self {
        Self { peer, correlator }
    }

    /// The peer endpoint this transport delivers to
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, request: &TaskRequest) -> Result<(), TransportError> {
        let stream = TcpStream::connect(self.peer)
            .await
            .map_err(|e| TransportError::Unreachable(format!("{}: {}", self.peer, e)))?;
        let (mut reader, mut writer) = stream.into_split();

        frame::write_message(&mut writer, &WireMessage::Task(request.clone())).await?;
        debug!(task = %request.task_id, peer = %self.peer, "task request delivered");

        // Reply arrives on the same connection; hand it to the
        // correlator whenever it lands. A closed or garbled connection
        // simply leaves the correlation to time out.
        let correlator = self.correlator.clone();
        let task_id = request.task_id.clone();
        tokio::spawn(async move {
            match frame::read_message(&mut reader).await {
                Ok(WireMessage::TaskResult(response)) => correlator.deliver_response(response),
                Ok(other) => {
                    warn!(task = %task_id, "unexpected reply frame: {:?}", other);
                }
                Err(e) => {
                    debug!(task = %task_id, error = %e, "no reply on task connection");
                }
            }
        });

        Ok(())
    }
}
