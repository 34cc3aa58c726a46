// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! System configuration: endpoints, bridges, and global timing parameters.

use crate::acl::Acl;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Global timing parameters shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Seconds between peer-dialect maintenance ticks.
    #[serde(default = "default_ping_time")]
    pub ping_time_secs: u64,

    /// Missed pings tolerated before a peer session is torn down.
    #[serde(default = "default_max_missed")]
    pub max_missed: u32,

    /// Stream silence timeout (STREAM_TO).
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,

    /// OpenBridge stream trimmer interval.
    #[serde(default = "default_trim_interval")]
    pub stream_trim_interval_secs: u64,

    /// Rule-timer tick interval (§4.E).
    #[serde(default = "default_rule_tick")]
    pub rule_tick_interval_secs: u64,

    /// Monitor TCP port, if the monitor sink is enabled.
    #[serde(default)]
    pub monitor_bind_address: Option<SocketAddr>,

    /// Log level override; `--logging` on the CLI takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Configured endpoints.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    /// Path to the bridge/rule file, loaded separately at startup.
    #[serde(default)]
    pub rules_file: Option<String>,
}

fn default_ping_time() -> u64 {
    5
}

fn default_max_missed() -> u32 {
    3
}

fn default_stream_timeout() -> u64 {
    2
}

fn default_trim_interval() -> u64 {
    5
}

fn default_rule_tick() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            ping_time_secs: default_ping_time(),
            max_missed: default_max_missed(),
            stream_timeout_secs: default_stream_timeout(),
            stream_trim_interval_secs: default_trim_interval(),
            rule_tick_interval_secs: default_rule_tick(),
            monitor_bind_address: None,
            log_level: default_log_level(),
            endpoints: Vec::new(),
            rules_file: None,
        }
    }
}

impl SystemConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn ping_time(&self) -> Duration {
        Duration::from_secs(self.ping_time_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn stream_trim_interval(&self) -> Duration {
        Duration::from_secs(self.stream_trim_interval_secs)
    }

    pub fn rule_tick_interval(&self) -> Duration {
        Duration::from_secs(self.rule_tick_interval_secs)
    }

    pub fn endpoint(&self, name: &str) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    /// Validate configuration: no duplicate endpoint names, at least one
    /// endpoint, role-specific fields present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::Invalid("no endpoints configured".into()));
        }
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if !seen.insert(endpoint.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate endpoint name {:?}",
                    endpoint.name
                )));
            }
        }
        if self.ping_time_secs == 0 {
            return Err(ConfigError::Invalid("ping_time_secs cannot be 0".into()));
        }
        Ok(())
    }
}

/// Per-endpoint configuration. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub bind_address: SocketAddr,
    #[serde(default = "default_group_hangtime")]
    pub group_hangtime_secs: u64,
    pub role: EndpointRole,
}

fn default_group_hangtime() -> u64 {
    5
}

impl EndpointConfig {
    pub fn group_hangtime(&self) -> Duration {
        Duration::from_secs(self.group_hangtime_secs)
    }
}

/// Role-specific fields, per §3 DATA MODEL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EndpointRole {
    Master {
        passphrase: String,
        #[serde(default = "default_true")]
        repeat: bool,
        #[serde(default)]
        acl: Acl,
    },
    Peer {
        passphrase: String,
        master_address: SocketAddr,
        radio_id: u32,
        #[serde(default)]
        description: PeerDescriptionConfig,
        #[serde(default)]
        options: Option<String>,
        #[serde(default)]
        loose_peer_id_check: bool,
    },
    OpenBridge {
        hmac_key: Vec<u8>,
        network_id: u32,
        target_address: SocketAddr,
    },
}

fn default_true() -> bool {
    true
}

/// The self-description a PEER sends its master in RPTC, as free-form
/// config fields. Converted to the fixed-width wire fields on dial-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerDescriptionConfig {
    #[serde(default)]
    pub callsign: String,
    #[serde(default)]
    pub rx_freq: String,
    #[serde(default)]
    pub tx_freq: String,
    #[serde(default)]
    pub tx_power: String,
    #[serde(default)]
    pub colour_code: String,
    #[serde(default)]
    pub latitude: String,
    #[serde(default)]
    pub longitude: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_slots")]
    pub slots: u8,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub software_id: String,
    #[serde(default)]
    pub package_id: String,
}

fn default_slots() -> u8 {
    3
}

fn pad<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [b' '; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

impl PeerDescriptionConfig {
    pub fn to_repeater_description(&self) -> hblink_wire::control::RepeaterDescription {
        hblink_wire::control::RepeaterDescription {
            callsign: pad(&self.callsign),
            rx_freq: pad(&self.rx_freq),
            tx_freq: pad(&self.tx_freq),
            tx_power: pad(&self.tx_power),
            colour_code: pad(&self.colour_code),
            latitude: pad(&self.latitude),
            longitude: pad(&self.longitude),
            height: pad(&self.height),
            location: pad(&self.location),
            description: pad(&self.description),
            slots: self.slots,
            url: pad(&self.url),
            software_id: pad(&self.software_id),
            package_id: pad(&self.package_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_master() -> EndpointConfig {
        EndpointConfig {
            name: "MASTER-1".into(),
            bind_address: "0.0.0.0:62031".parse().unwrap(),
            group_hangtime_secs: 5,
            role: EndpointRole::Master {
                passphrase: "secret".into(),
                repeat: true,
                acl: Acl::default(),
            },
        }
    }

    #[test]
    fn default_system_config_fails_validation_without_endpoints() {
        assert!(SystemConfig::default().validate().is_err());
    }

    #[test]
    fn duplicate_endpoint_names_are_rejected() {
        let mut config = SystemConfig::default();
        config.endpoints.push(sample_master());
        config.endpoints.push(sample_master());
        assert!(config.validate().is_err());
    }

    #[test]
    fn valid_config_round_trips_through_toml() {
        let mut config = SystemConfig::default();
        config.endpoints.push(sample_master());
        config.validate().unwrap();

        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: SystemConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed.endpoints.len(), 1);
        assert_eq!(parsed.endpoints[0].name, "MASTER-1");
    }

    #[test]
    fn from_file_loads_and_validates() {
        let mut config = SystemConfig::default();
        config.endpoints.push(sample_master());
        let toml_str = toml::to_string_pretty(&config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hblink.cfg");
        std::fs::write(&path, toml_str).unwrap();

        let loaded = SystemConfig::from_file(&path).unwrap();
        assert_eq!(loaded.endpoints[0].name, "MASTER-1");
    }

    #[test]
    fn endpoint_lookup_by_name() {
        let mut config = SystemConfig::default();
        config.endpoints.push(sample_master());
        assert!(config.endpoint("MASTER-1").is_some());
        assert!(config.endpoint("nope").is_none());
    }

    #[test]
    fn peer_description_pads_short_fields_with_spaces() {
        let desc = PeerDescriptionConfig {
            callsign: "W1AW".into(),
            slots: 2,
            ..Default::default()
        };
        let wire = desc.to_repeater_description();
        assert_eq!(&wire.callsign, b"W1AW    ");
        assert_eq!(wire.slots, 2);
    }

    #[test]
    fn peer_description_truncates_overlong_fields() {
        let desc = PeerDescriptionConfig {
            callsign: "WAYTOOLONGCALLSIGN".into(),
            ..Default::default()
        };
        let wire = desc.to_repeater_description();
        assert_eq!(wire.callsign.len(), 8);
    }
}
