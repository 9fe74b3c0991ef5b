//! Process identity attached to sessions.

use std::net::UdpSocket;
use std::sync::OnceLock;

use serde::Serialize;
use tracing::warn;

static PROCESS_DEVICE: OnceLock<Device> = OnceLock::new();

/// Static identity of the process driving validation: local address and
/// hostname. Resolved once at first use; resolution failure yields a
/// degraded placeholder rather than blocking startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub address: String,
    pub hostname: String,
}

impl Device {
    pub fn new(address: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            hostname: hostname.into(),
        }
    }

    /// The process-wide identity, resolved on first call and reused after.
    pub fn current() -> &'static Device {
        PROCESS_DEVICE.get_or_init(Device::resolve)
    }

    /// Resolve the local address and hostname.
    pub fn resolve() -> Device {
        let hostname = match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(error) => {
                warn!(%error, "hostname resolution failed, using placeholder identity");
                return Device::degraded(&error.to_string());
            }
        };

        match local_address() {
            Some(address) => Device::new(address, hostname),
            None => Device::new("unresolved", hostname),
        }
    }

    fn degraded(detail: &str) -> Device {
        Device::new("Unable to retrieve the localhost information", detail)
    }
}

/// Local outbound address, discovered by opening a UDP socket toward a
/// well-known address. No packet is sent.
fn local_address() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_never_panics() {
        let device = Device::resolve();
        assert!(!device.address.is_empty());
        assert!(!device.hostname.is_empty());
    }

    #[test]
    fn test_current_is_stable() {
        let first = Device::current();
        let second = Device::current();
        assert_eq!(first, second);
    }

    #[test]
    fn test_device_serializes() {
        let device = Device::new("10.0.0.7", "validator-host");
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["address"], "10.0.0.7");
        assert_eq!(json["hostname"], "validator-host");
    }
}
