//! Pairing session: credential issue/validate/consume and link state
//!
//! A session holds at most one live credential and at most one linked
//! peer. All operations are total: invalid input yields `false` or an
//! empty status, never an error. Expiry is evaluated lazily at
//! validation/pairing time; there is no background sweep.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use devlink_core::config::{DEFAULT_PAIRING_TTL, DEFAULT_PORT};
use devlink_core::{Clock, DeviceInfo, SystemClock};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Short-lived secret plus addressing info that authorizes one device
/// to link with another
///
/// Conveyed out-of-band (QR code, manual entry) from the issuing device
/// to the pairing device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingCredential {
    /// Identity of the issuing device
    pub device_id: devlink_core::DeviceId,
    /// Address the issuing device listens on
    pub address: String,
    /// Port the issuing device listens on
    pub port: u16,
    /// The pairing secret
    pub secret: String,
    /// Hard expiry; the credential is live iff `now < expires_at`
    pub expires_at: DateTime<Utc>,
}

impl PairingCredential {
    /// Whether the credential has expired relative to the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Read-only view of the current link state
///
/// Always computed from session state, never stored independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStatus {
    /// Whether a peer is currently linked
    pub is_linked: bool,
    /// The linked peer, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_device: Option<DeviceInfo>,
    /// When the link last carried a completed exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SessionState {
    credential: Option<PairingCredential>,
    linked_device: Option<DeviceInfo>,
    last_sync: Option<DateTime<Utc>>,
}

/// Owns the lifecycle of a single pairing credential and the single
/// currently-linked remote device
///
/// States: Idle -> CredentialIssued -> Linked -> Idle (`unlink` returns
/// to Idle from either of the later states).
pub struct PairingSession {
    state: Mutex<SessionState>,
    ttl: ChronoDuration,
    clock: Arc<dyn Clock>,
}

impl PairingSession {
    /// Create a session with the given credential TTL and wall-clock time
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a session with an injected clock (deterministic tests)
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        // Out-of-range std durations fall back to the protocol default
        let ttl = ChronoDuration::from_std(ttl)
            .unwrap_or_else(|_| ChronoDuration::milliseconds(DEFAULT_PAIRING_TTL.as_millis() as i64));
        Self {
            state: Mutex::new(SessionState::default()),
            ttl,
            clock,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mint a fresh pairing credential for the local device
    ///
    /// Always succeeds. Overwrites any previously issued (but
    /// unconsumed) credential; no credential history is kept.
    pub fn issue_credential(&self, local: &DeviceInfo) -> PairingCredential {
        let now = self.clock.now();
        let credential = PairingCredential {
            device_id: local.id.clone(),
            address: local
                .address
                .clone()
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: local.port.unwrap_or(DEFAULT_PORT),
            secret: generate_secret(),
            expires_at: now + self.ttl,
        };

        let mut state = self.state();
        if state.credential.is_some() {
            debug!("replacing previously issued pairing credential");
        }
        state.credential = Some(credential.clone());

        info!(
            device = %local.id,
            expires_at = %credential.expires_at,
            "issued pairing credential"
        );
        credential
    }

    /// Check a presented secret against the stored credential
    ///
    /// Returns false if no credential has been issued, the stored one
    /// has expired, or the secret does not match. Detecting expiry
    /// discards the stored credential so no further attempts can be
    /// made against it. A successful match does NOT consume the
    /// credential; it stays valid for retries until it expires or
    /// pairing completes.
    pub fn validate_credential(&self, secret: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state();

        let Some(credential) = state.credential.as_ref() else {
            debug!("credential validation failed: none issued");
            return false;
        };

        if credential.is_expired_at(now) {
            debug!("credential validation failed: expired, discarding");
            state.credential = None;
            return false;
        }

        if credential.secret != secret {
            warn!("credential validation failed: secret mismatch");
            return false;
        }

        true
    }

    /// Record the remote device as linked
    ///
    /// Returns false iff the credential has expired relative to this
    /// session's clock; the linked device is left untouched in that
    /// case. Does not cross-check the secret against the session's own
    /// stored credential; that is `validate_credential`'s job and
    /// callers must invoke both. On success the session's own stored
    /// credential is consumed.
    pub fn complete_pairing(&self, credential: &PairingCredential, remote: DeviceInfo) -> bool {
        let now = self.clock.now();
        if credential.is_expired_at(now) {
            debug!("pairing rejected: credential expired");
            return false;
        }

        let mut state = self.state();
        info!(device = %remote.id, name = %remote.name, "device linked");
        state.linked_device = Some(remote);
        state.credential = None;
        true
    }

    /// Clear the linked device and any stored credential
    ///
    /// Idempotent; returns the session to Idle.
    pub fn unlink(&self) {
        let mut state = self.state();
        if state.linked_device.is_some() {
            info!("device unlinked");
        }
        state.credential = None;
        state.linked_device = None;
        state.last_sync = None;
    }

    /// Current link state; pure read, no side effects
    pub fn status(&self) -> LinkStatus {
        let state = self.state();
        LinkStatus {
            is_linked: state.linked_device.is_some(),
            linked_device: state.linked_device.clone(),
            last_sync: state.last_sync,
        }
    }

    /// The linked peer, if any
    pub fn linked_device(&self) -> Option<DeviceInfo> {
        self.state().linked_device.clone()
    }

    /// The currently stored credential, if one is live
    ///
    /// Used by the issuing side to display the credential (QR code) and
    /// to complete an inbound handshake after validating the secret.
    pub fn current_credential(&self) -> Option<PairingCredential> {
        self.state().credential.clone()
    }

    /// Stamp the time of the last completed exchange with the peer
    pub fn mark_synced(&self) {
        let now = self.clock.now();
        self.state().last_sync = Some(now);
    }
}

/// Generate a pairing secret: 256 bits from the thread-local CSPRNG
fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    BASE64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_core::{DeviceRole, ManualClock};

    const TTL: Duration = Duration::from_millis(30_000);

    fn desktop() -> DeviceInfo {
        DeviceInfo::new("Desk", DeviceRole::Desktop).with_endpoint("192.168.1.5", 8765)
    }

    fn phone() -> DeviceInfo {
        DeviceInfo::new("Phone", DeviceRole::Mobile)
    }

    fn manual_session() -> (PairingSession, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let session = PairingSession::with_clock(TTL, clock.clone());
        (session, clock)
    }

    #[test]
    fn test_issue_and_validate() {
        let (session, clock) = manual_session();
        let credential = session.issue_credential(&desktop());

        assert_eq!(credential.address, "192.168.1.5");
        assert_eq!(credential.port, 8765);
        assert_eq!(
            credential.expires_at - clock.now(),
            ChronoDuration::milliseconds(30_000)
        );

        clock.advance(ChronoDuration::milliseconds(100));
        assert!(session.validate_credential(&credential.secret));
        // Successful validation does not consume the credential
        assert!(session.validate_credential(&credential.secret));
    }

    #[test]
    fn test_validate_without_credential() {
        let (session, _clock) = manual_session();
        assert!(!session.validate_credential("anything"));
    }

    #[test]
    fn test_validate_wrong_secret() {
        let (session, _clock) = manual_session();
        session.issue_credential(&desktop());
        assert!(!session.validate_credential("not-the-secret"));
        // Mismatch does not discard the stored credential
        assert!(session.current_credential().is_some());
    }

    #[test]
    fn test_expired_credential_is_discarded() {
        let (session, clock) = manual_session();
        let credential = session.issue_credential(&desktop());

        clock.advance(ChronoDuration::milliseconds(30_001));
        assert!(!session.validate_credential(&credential.secret));
        assert!(session.current_credential().is_none());

        // The same credential object is also rejected by complete_pairing
        assert!(!session.complete_pairing(&credential, phone()));
        assert!(!session.status().is_linked);
    }

    #[test]
    fn test_expiry_boundary() {
        let (session, clock) = manual_session();
        let credential = session.issue_credential(&desktop());

        clock.advance(ChronoDuration::milliseconds(29_999));
        assert!(session.validate_credential(&credential.secret));

        clock.advance(ChronoDuration::milliseconds(1));
        // now == expires_at is no longer live
        assert!(!session.validate_credential(&credential.secret));
    }

    #[test]
    fn test_reissue_invalidates_previous() {
        let (session, _clock) = manual_session();
        let first = session.issue_credential(&desktop());
        let second = session.issue_credential(&desktop());

        assert_ne!(first.secret, second.secret);
        assert!(!session.validate_credential(&first.secret));
        assert!(session.validate_credential(&second.secret));
    }

    #[test]
    fn test_complete_pairing_consumes_credential() {
        let (session, _clock) = manual_session();
        let credential = session.issue_credential(&desktop());
        let remote = phone();

        assert!(session.complete_pairing(&credential, remote.clone()));

        let status = session.status();
        assert!(status.is_linked);
        assert_eq!(status.linked_device.unwrap().id, remote.id);
        // Credential is consumed once pairing completes
        assert!(!session.validate_credential(&credential.secret));
    }

    #[test]
    fn test_unlink_is_idempotent() {
        let (session, _clock) = manual_session();
        let credential = session.issue_credential(&desktop());
        session.complete_pairing(&credential, phone());
        session.mark_synced();

        session.unlink();
        session.unlink();

        let status = session.status();
        assert!(!status.is_linked);
        assert!(status.linked_device.is_none());
        assert!(status.last_sync.is_none());
        assert!(session.current_credential().is_none());
    }

    #[test]
    fn test_mark_synced_reflected_in_status() {
        let (session, clock) = manual_session();
        let credential = session.issue_credential(&desktop());
        session.complete_pairing(&credential, phone());

        assert!(session.status().last_sync.is_none());
        session.mark_synced();
        assert_eq!(session.status().last_sync, Some(clock.now()));
    }

    #[test]
    fn test_secrets_are_distinct() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        assert!(a.len() >= 43); // 32 bytes base64
    }

    #[test]
    fn test_credential_serializes_for_exchange() {
        let (session, _clock) = manual_session();
        let credential = session.issue_credential(&desktop());
        let json = serde_json::to_string(&credential).unwrap();
        let decoded: PairingCredential = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, credential);
    }
}
