//! Device identity
//!
//! Describes the local instance and any remote peer it links with.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub Uuid);

impl DeviceId {
    /// Generate a new random device ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role a device plays in a link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// Desktop instance (issues pairing credentials)
    #[default]
    Desktop,
    /// Mobile instance (consumes pairing credentials)
    Mobile,
    /// Web client
    Web,
}

impl std::str::FromStr for DeviceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "mobile" | "phone" => Ok(Self::Mobile),
            "web" | "browser" => Ok(Self::Web),
            _ => Err(format!(
                "Invalid device role: {}. Use: desktop, mobile, web",
                s
            )),
        }
    }
}

/// Descriptor for a device instance
///
/// Carried in pairing handshakes and recorded by a session as the
/// linked peer once pairing completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Unique device identifier
    pub id: DeviceId,
    /// Human-readable device name (e.g., "Living Room PC", "Pixel 9")
    pub name: String,
    /// Role this device plays
    pub role: DeviceRole,
    /// Capabilities advertised to the peer (e.g., "camera", "gpu")
    pub capabilities: Vec<String>,
    /// Network address, if reachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Listening port, if reachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl DeviceInfo {
    /// Create a new device descriptor with a fresh random ID
    pub fn new(name: impl Into<String>, role: DeviceRole) -> Self {
        Self {
            id: DeviceId::new(),
            name: name.into(),
            role,
            capabilities: Vec::new(),
            address: None,
            port: None,
        }
    }

    /// Builder pattern: set the reachable endpoint
    pub fn with_endpoint(mut self, address: impl Into<String>, port: u16) -> Self {
        self.address = Some(address.into());
        self.port = Some(port);
        self
    }

    /// Builder pattern: set advertised capabilities
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_generation() {
        let id1 = DeviceId::new();
        let id2 = DeviceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_device_role_parsing() {
        assert_eq!("desktop".parse::<DeviceRole>().unwrap(), DeviceRole::Desktop);
        assert_eq!("mobile".parse::<DeviceRole>().unwrap(), DeviceRole::Mobile);
        assert_eq!("web".parse::<DeviceRole>().unwrap(), DeviceRole::Web);
        assert!("toaster".parse::<DeviceRole>().is_err());
    }

    #[test]
    fn test_device_builder() {
        let device = DeviceInfo::new("Test", DeviceRole::Mobile)
            .with_endpoint("192.168.1.10", 8765)
            .with_capabilities(vec!["camera".to_string()]);
        assert_eq!(device.address.as_deref(), Some("192.168.1.10"));
        assert_eq!(device.port, Some(8765));
        assert_eq!(device.capabilities, vec!["camera"]);
    }
}
