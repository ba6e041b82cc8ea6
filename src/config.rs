//! Ambient configuration structs (§9 design note, §3.1 of the expanded
//! spec): kwargs/defaults from the source collapse to explicit, `Default`-
//! backed config structs rather than a builder/kwargs free-for-all.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Defaults applied by [`crate::client`] builders unless a call overrides
/// them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDefaults {
    pub device_id: u8,
    pub timeout: Duration,
    pub retries: u32,
    pub reconnect_delay_min: Duration,
    pub reconnect_delay_max: Duration,
    pub broadcast_enable: bool,
    /// Serial-only: discard the locally-echoed copy of a transmitted frame
    /// before reading the real response.
    pub handle_local_echo: bool,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            device_id: 1,
            timeout: Duration::from_secs(3),
            retries: 3,
            reconnect_delay_min: Duration::from_millis(100),
            reconnect_delay_max: Duration::from_secs(300),
            broadcast_enable: false,
            handle_local_echo: false,
        }
    }
}

/// Defaults applied by [`crate::server::dispatch`] unless a server
/// overrides them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefaults {
    pub zero_mode: bool,
    pub ignore_missing_slaves: bool,
    pub broadcast_enable: bool,
    pub identity: DeviceIdentity,
}

impl Default for ServerDefaults {
    fn default() -> Self {
        Self {
            zero_mode: false,
            ignore_missing_slaves: false,
            broadcast_enable: false,
            identity: DeviceIdentity::default(),
        }
    }
}

/// Backs FC 0x2B/14 (Read Device Information) and FC 17 (Report Slave Id).
/// Field order matches the standard "basic" device information objects
/// (object ids 0..=6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_name: String,
    pub product_code: String,
    pub major_minor_revision: String,
    pub vendor_url: String,
    pub product_name: String,
    pub model_name: String,
    pub user_application_name: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            vendor_name: "modbus_core".to_string(),
            product_code: "MCORE".to_string(),
            major_minor_revision: env!("CARGO_PKG_VERSION").to_string(),
            vendor_url: "https://docs.rs/modbus_core".to_string(),
            product_name: "modbus_core server".to_string(),
            model_name: "generic".to_string(),
            user_application_name: String::new(),
        }
    }
}

impl DeviceIdentity {
    /// The seven standard "basic"/"regular" objects, in object-id order.
    pub fn objects(&self) -> Vec<(u8, Vec<u8>)> {
        vec![
            (0, self.vendor_name.clone().into_bytes()),
            (1, self.product_code.clone().into_bytes()),
            (2, self.major_minor_revision.clone().into_bytes()),
            (3, self.vendor_url.clone().into_bytes()),
            (4, self.product_name.clone().into_bytes()),
            (5, self.model_name.clone().into_bytes()),
            (6, self.user_application_name.clone().into_bytes()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_defaults_round_trip_through_json() {
        let defaults = ClientDefaults::default();
        let json = serde_json::to_string(&defaults).unwrap();
        let back: ClientDefaults = serde_json::from_str(&json).unwrap();
        assert_eq!(defaults, back);
    }

    #[test]
    fn server_defaults_round_trip_through_json() {
        let defaults = ServerDefaults { ignore_missing_slaves: true, ..ServerDefaults::default() };
        let json = serde_json::to_string(&defaults).unwrap();
        let back: ServerDefaults = serde_json::from_str(&json).unwrap();
        assert_eq!(defaults, back);
    }

    #[test]
    fn device_identity_round_trips_as_a_config_fixture() {
        let identity = DeviceIdentity { model_name: "test-rig".to_string(), ..DeviceIdentity::default() };
        let json = serde_json::to_string(&identity).unwrap();
        let back: DeviceIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(identity, back);
    }
}
