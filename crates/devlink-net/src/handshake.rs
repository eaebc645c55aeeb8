//! Client side of the pairing handshake
//!
//! The mobile device scanned (or typed) a credential; this presents its
//! secret to the issuing device and returns that device's identity so
//! the caller can record it via `complete_pairing` on its own session.

use devlink_core::{DeviceInfo, WireMessage};
use devlink_pairing::PairingCredential;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::frame;

/// Failures of the client-side handshake
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer rejected the credential")]
    Rejected,
    #[error("unexpected handshake reply")]
    Protocol,
}

/// Present `credential` to its issuing device, identifying as `local`
///
/// On success returns the issuing device's descriptor; the caller is
/// expected to follow up with `complete_pairing` on its own session.
pub async fn pair_with(
    credential: &PairingCredential,
    local: &DeviceInfo,
) -> Result<DeviceInfo, HandshakeError> {
    let endpoint = format!("{}:{}", credential.address, credential.port);
    debug!(endpoint = %endpoint, "presenting pairing credential");

    let mut stream = TcpStream::connect(&endpoint).await?;
    let (mut reader, mut writer) = stream.split();

    let hello = WireMessage::Pair {
        secret: credential.secret.clone(),
        device: local.clone(),
    };
    frame::write_message(&mut writer, &hello).await?;

    match frame::read_message(&mut reader).await? {
        WireMessage::PairAck {
            accepted: true,
            device: Some(remote),
        } => {
            info!(device = %remote.id, name = %remote.name, "pairing accepted by peer");
            Ok(remote)
        }
        WireMessage::PairAck { .. } => Err(HandshakeError::Rejected),
        _ => Err(HandshakeError::Protocol),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{TaskHandler, TaskListener};
    use crate::tcp::TcpTransport;
    use async_trait::async_trait;
    use devlink_core::{DeviceRole, TaskRequest, TaskResponse};
    use devlink_pairing::PairingSession;
    use devlink_tasks::TaskCorrelator;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    /// Handler that answers every task with its own payload
    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        async fn handle(&self, request: TaskRequest) -> TaskResponse {
            TaskResponse::ok(request.task_id, request.payload)
        }
    }

    async fn spawn_desktop() -> (Arc<PairingSession>, PairingCredential, std::net::SocketAddr) {
        let session = Arc::new(PairingSession::new(Duration::from_secs(30)));
        let desktop = DeviceInfo::new("Desk", DeviceRole::Desktop);

        let listener = TaskListener::bind(
            "127.0.0.1:0".parse().unwrap(),
            session.clone(),
            desktop.clone(),
        )
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();

        // Issue against the actually bound port
        let desktop = desktop.with_endpoint("127.0.0.1", addr.port());
        let credential = session.issue_credential(&desktop);

        tokio::spawn(listener.run(Arc::new(EchoHandler)));
        (session, credential, addr)
    }

    #[tokio::test]
    async fn test_pairing_handshake_links_both_sides() {
        let (desktop_session, credential, _addr) = spawn_desktop().await;

        let phone = DeviceInfo::new("Phone", DeviceRole::Mobile);
        let phone_session = PairingSession::new(Duration::from_secs(30));

        let remote = pair_with(&credential, &phone).await.unwrap();
        assert!(phone_session.complete_pairing(&credential, remote));

        assert!(phone_session.status().is_linked);
        assert!(desktop_session.status().is_linked);
        assert_eq!(
            desktop_session.linked_device().unwrap().id,
            phone.id
        );
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let (desktop_session, credential, _addr) = spawn_desktop().await;

        let mut forged = credential.clone();
        forged.secret = "nope".to_string();

        let phone = DeviceInfo::new("Phone", DeviceRole::Mobile);
        let result = pair_with(&forged, &phone).await;
        assert!(matches!(result, Err(HandshakeError::Rejected)));
        assert!(!desktop_session.status().is_linked);
    }

    #[tokio::test]
    async fn test_offload_roundtrip_over_tcp() {
        let (desktop_session, credential, addr) = spawn_desktop().await;

        let phone = DeviceInfo::new("Phone", DeviceRole::Mobile);
        pair_with(&credential, &phone).await.unwrap();

        let correlator = Arc::new(TaskCorrelator::new(Duration::from_secs(5)));
        let transport = TcpTransport::new(addr, correlator.clone());

        let request = correlator.build_validation_task(json!({"image": "abc"}));
        let task_id = request.task_id.clone();
        let response = correlator.offload(request, &transport).await.unwrap();

        assert!(response.succeeded);
        assert_eq!(response.task_id, task_id);
        assert_eq!(response.result, Some(json!({"image": "abc"})));
        assert_eq!(correlator.pending_count(), 0);

        // The exchange stamped the desktop's last_sync
        assert!(desktop_session.status().last_sync.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_transport_failure() {
        let correlator = Arc::new(TaskCorrelator::new(Duration::from_secs(5)));
        // Discard port, nothing listens there
        let transport = TcpTransport::new("127.0.0.1:9".parse().unwrap(), correlator.clone());

        let request = correlator.build_sync_task(json!(null));
        let result = correlator.offload(request, &transport).await;

        assert!(matches!(
            result,
            Err(devlink_tasks::OffloadError::Transport(_))
        ));
        assert_eq!(correlator.pending_count(), 0);
    }
}
