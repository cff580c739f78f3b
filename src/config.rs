/*!
Build configuration.

Replaces process-wide settings with one explicitly constructed value that is handed to the
pipeline. Every field has a default, so an empty TOML document is a valid configuration.
*/

use std::{collections::BTreeMap, net::Ipv4Addr, path::Path};

use ipnetwork::{IpNetwork, Ipv4Network};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub general: GeneralConfig,
    /// host name -> platform -> deployment settings
    pub deploy_hosts: BTreeMap<String, BTreeMap<String, PlatformDeploy>>,
    /// platform -> configuration syntax, applied to routers before the layers are built.
    /// Configured entries are merged over the defaults.
    #[serde(deserialize_with = "over_default_syntax")]
    pub syntax: BTreeMap<String, String>,
    pub ip: IpConfig,
    pub bgp: BgpConfig,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub deploy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformDeploy {
    pub deploy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpConfig {
    pub loopback_block: IpNetwork,
    pub infra_block: IpNetwork,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpConfig {
    /// Below this many physical nodes iBGP is a full mesh, otherwise route reflectors are used.
    pub full_mesh_threshold: usize,
    pub route_reflectors_per_asn: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    /// Stages after which the model is published. Empty means never.
    pub checkpoints: Vec<Stage>,
}

fn default_syntax() -> BTreeMap<String, String> {
    [("junosphere", "junos"), ("dynagen", "ios"), ("netkit", "quagga")]
        .into_iter()
        .map(|(platform, syntax)| (platform.to_string(), syntax.to_string()))
        .collect()
}

fn over_default_syntax<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut syntax = default_syntax();
    syntax.extend(BTreeMap::<String, String>::deserialize(deserializer)?);
    Ok(syntax)
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            deploy_hosts: BTreeMap::new(),
            syntax: default_syntax(),
            ip: IpConfig::default(),
            bgp: BgpConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl Default for IpConfig {
    fn default() -> Self {
        Self {
            loopback_block: v4_block([192, 168, 128, 0], 22),
            infra_block: v4_block([10, 0, 0, 0], 8),
        }
    }
}

fn v4_block(addr: [u8; 4], prefix: u8) -> IpNetwork {
    let addr = Ipv4Addr::from(addr);
    match Ipv4Network::new(addr, prefix) {
        Ok(net) => IpNetwork::V4(net),
        Err(_) => IpNetwork::V4(Ipv4Network::from(addr)),
    }
}

impl Default for BgpConfig {
    fn default() -> Self {
        Self {
            full_mesh_threshold: 5,
            route_reflectors_per_asn: 2,
        }
    }
}

impl BuildConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BuildConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ip.loopback_block.is_ipv4() || !self.ip.infra_block.is_ipv4() {
            return Err(ConfigError::Invalid(
                "ip.loopback_block and ip.infra_block must be IPv4 networks".to_string(),
            ));
        }
        if self.bgp.route_reflectors_per_asn == 0 {
            return Err(ConfigError::Invalid(
                "bgp.route_reflectors_per_asn must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Defaults forced when the input had to be read by the fallback loader: deployment is
    /// switched on and a single local host is registered.
    pub fn force_local_deployment(&mut self) {
        self.general.deploy = true;
        self.deploy_hosts
            .entry("internal".to_string())
            .or_default()
            .insert("cisco".to_string(), PlatformDeploy { deploy: true });
    }

    /// Whether the model should be published after `stage`.
    pub fn is_checkpoint(&self, stage: Stage) -> bool {
        self.snapshot.enabled && self.snapshot.checkpoints.contains(&stage)
    }
}
