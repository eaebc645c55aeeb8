//! Inbound side: answer pairing handshakes and task requests
//!
//! One frame in, one frame out per connection. Pairing frames are
//! checked against the session (`validate_credential` then
//! `complete_pairing`); task frames go to the injected handler.

use async_trait::async_trait;
use devlink_core::{DeviceInfo, TaskRequest, TaskResponse, WireMessage};
use devlink_pairing::PairingSession;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::frame;

/// Executes one task request on behalf of the linked peer
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, request: TaskRequest) -> TaskResponse;
}

/// Accepts connections from the peer and answers them
pub struct TaskListener {
    listener: TcpListener,
    session: Arc<PairingSession>,
    local: DeviceInfo,
}

impl TaskListener {
    /// Bind to `addr`, answering pairing attempts against `session` and
    /// identifying as `local` in pairing acks
    pub async fn bind(
        addr: SocketAddr,
        session: Arc<PairingSession>,
        local: DeviceInfo,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "task listener bound");
        Ok(Self {
            listener,
            session,
            local,
        })
    }

    /// The bound address (useful with port 0)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and answer connections until the listener is dropped
    pub async fn run<H: TaskHandler>(self, handler: Arc<H>) -> std::io::Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let session = self.session.clone();
            let local = self.local.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, session, local, handler).await {
                    debug!(peer = %peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

async fn handle_connection<H: TaskHandler>(
    mut stream: TcpStream,
    peer: SocketAddr,
    session: Arc<PairingSession>,
    local: DeviceInfo,
    handler: Arc<H>,
) -> std::io::Result<()> {
    let (mut reader, mut writer) = stream.split();

    match frame::read_message(&mut reader).await? {
        WireMessage::Pair { secret, device } => {
            let accepted = session.validate_credential(&secret)
                && match session.current_credential() {
                    Some(credential) => session.complete_pairing(&credential, device.clone()),
                    None => false,
                };

            if accepted {
                info!(peer = %peer, device = %device.id, "pairing accepted");
            } else {
                warn!(peer = %peer, "pairing rejected");
            }

            let ack = WireMessage::PairAck {
                accepted,
                device: accepted.then(|| local.clone()),
            };
            frame::write_message(&mut writer, &ack).await
        }
        WireMessage::Task(request) => {
            debug!(peer = %peer, task = %request.task_id, kind = %request.kind, "task received");
            let response = handler.handle(request).await;
            session.mark_synced();
            frame::write_message(&mut writer, &WireMessage::TaskResult(response)).await
        }
        other => {
            warn!(peer = %peer, "unexpected inbound frame: {:?}", other);
            Ok(())
        }
    }
}
