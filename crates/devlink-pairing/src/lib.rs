//! devlink Pairing - Credential lifecycle and link state
//!
//! A `PairingSession` gates access to the link between two devices:
//! it mints short-lived pairing credentials, validates them when the
//! peer presents one back, and records the single linked peer.
//!
//! # Pairing Flow
//!
//! 1. The desktop instance calls [`PairingSession::issue_credential`]
//! 2. The credential travels out-of-band (QR code, manual entry)
//! 3. The mobile instance presents the secret back over the transport
//! 4. The desktop validates it (`validate_credential`) and records the
//!    peer (`complete_pairing`); the mobile records the desktop the
//!    same way with the credential it scanned
//!
//! # Example
//!
//! ```
//! use devlink_core::{DeviceInfo, DeviceRole};
//! use devlink_pairing::PairingSession;
//! use std::time::Duration;
//!
//! let local = DeviceInfo::new("Desk", DeviceRole::Desktop);
//! let session = PairingSession::new(Duration::from_secs(30));
//! let credential = session.issue_credential(&local);
//!
//! assert!(session.validate_credential(&credential.secret));
//! let remote = DeviceInfo::new("Phone", DeviceRole::Mobile);
//! assert!(session.complete_pairing(&credential, remote));
//! assert!(session.status().is_linked);
//! ```

pub mod session;

pub use session::{LinkStatus, PairingCredential, PairingSession};
