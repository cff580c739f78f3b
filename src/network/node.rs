use std::{
    fmt::Display,
    net::{IpAddr, Ipv4Addr},
};

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a device, shared by every overlay that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Identity of a physical device, derived from its (unique) input label.
    pub fn for_device(label: &str) -> Self {
        NodeId(Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("device:{label}").as_bytes(),
        ))
    }

    /// Identity for a node synthesized by a transformation. Namespaced under `parent`
    /// so that two different parents never produce the same id for the same key.
    pub fn derived(parent: NodeId, key: &str) -> Self {
        NodeId(Uuid::new_v5(&parent.0, key.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device role as carried by the `device_type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Router,
    Switch,
    Server,
    CollisionDomain,
}

impl DeviceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::Router => "router",
            DeviceRole::Switch => "switch",
            DeviceRole::Server => "server",
            DeviceRole::CollisionDomain => "collision_domain",
        }
    }
}

impl Display for DeviceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a node, edge or graph attribute.
///
/// Serialized untagged so that attribute maps read like plain JSON objects. Addresses and
/// networks are tried before strings on the way back in, so `"10.0.0.1"` comes back as an
/// address rather than a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Addr(IpAddr),
    Network(IpNetwork),
    Str(String),
}

impl AttrValue {
    /// `false`, zero and the empty string are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            AttrValue::Bool(b) => *b,
            AttrValue::Int(i) => *i != 0,
            AttrValue::Float(f) => *f != 0.0,
            AttrValue::Str(s) => !s.is_empty(),
            AttrValue::Addr(_) | AttrValue::Network(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Best-effort conversion to an IPv4 address: addresses are taken as-is, strings are parsed.
    pub fn to_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            AttrValue::Addr(IpAddr::V4(addr)) => Some(*addr),
            AttrValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Addr(a) => write!(f, "{a}"),
            AttrValue::Network(n) => write!(f, "{n}"),
            AttrValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<IpAddr> for AttrValue {
    fn from(value: IpAddr) -> Self {
        AttrValue::Addr(value)
    }
}

impl From<Ipv4Addr> for AttrValue {
    fn from(value: Ipv4Addr) -> Self {
        AttrValue::Addr(IpAddr::V4(value))
    }
}

impl From<IpNetwork> for AttrValue {
    fn from(value: IpNetwork) -> Self {
        AttrValue::Network(value)
    }
}

mod tests {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    fn test_device_ids_are_stable_and_distinct() {
        assert_eq!(NodeId::for_device("r1"), NodeId::for_device("r1"));
        assert_ne!(NodeId::for_device("r1"), NodeId::for_device("r2"));

        let parent = NodeId::for_device("r1");
        assert_ne!(NodeId::derived(parent, "r2#0"), NodeId::derived(parent, "r2#1"));
        assert_ne!(
            NodeId::derived(parent, "x"),
            NodeId::derived(NodeId::for_device("r2"), "x")
        );
    }

    #[test]
    fn test_attr_value_deserialization() {
        let values: Vec<AttrValue> =
            serde_json::from_str(r#"[true, 3, 1.5, "10.0.0.1", "10.0.0.0/30", "r1"]"#).unwrap();
        assert_eq!(values[0], AttrValue::Bool(true));
        assert_eq!(values[1], AttrValue::Int(3));
        assert_eq!(values[2], AttrValue::Float(1.5));
        assert_eq!(values[3], AttrValue::Addr("10.0.0.1".parse().unwrap()));
        assert!(matches!(values[4], AttrValue::Network(_)));
        assert_eq!(values[5], AttrValue::Str("r1".into()));
    }

    #[test]
    fn test_truthiness() {
        assert!(!AttrValue::Bool(false).is_truthy());
        assert!(!AttrValue::Int(0).is_truthy());
        assert!(!AttrValue::Str(String::new()).is_truthy());
        assert!(AttrValue::Str("x".into()).is_truthy());
        assert_eq!(AttrValue::Str("192.168.0.1".into()).to_ipv4(), Some(Ipv4Addr::new(192, 168, 0, 1)));
    }
}
