use std::{
    fmt::Display,
    net::{IpAddr, Ipv4Addr},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    layers::{DeriveError, ensure_absent, igp_base},
    network::{AbstractNetworkModel, AttrValue, predicate::is_l3device},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// The AFI every generated NET starts with (private addressing).
const PRIVATE_AFI: u8 = 0x49;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemId {
    raw_id: [u8; 6],
}

impl Display for SystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.raw_id.chunks(2).map(hex::encode).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl SystemId {
    /// The system ID spelled by the twelve decimal digits of a zero-padded dotted quad, read as
    /// hex digits: 192.168.19.1 gives `1921.6801.9001`.
    pub fn from_ipv4(addr: Ipv4Addr) -> Self {
        let digits: String = addr.octets().iter().map(|o| format!("{o:03}")).collect();
        let mut raw_id = [0u8; 6];
        for (byte, pair) in raw_id.iter_mut().zip(digits.as_bytes().chunks(2)) {
            // decimal digits are valid hex nibbles
            *byte = ((pair[0] - b'0') << 4) | (pair[1] - b'0');
        }
        SystemId { raw_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaAddress {
    pub raw_address: Vec<u8>,
}

impl Display for AreaAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // AFI on its own, then groups of 2 bytes
        let Some((afi, rest)) = self.raw_address.split_first() else {
            return Ok(());
        };
        write!(f, "{afi:02X}")?;
        for chunk in rest.chunks(2) {
            write!(f, ".{}", hex::encode_upper(chunk))?;
        }
        Ok(())
    }
}

/// An IS-IS network entity title: area address, system ID and a zero NSEL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetAddress {
    pub area_address: AreaAddress,
    pub system_id: SystemId,
}

impl Display for NetAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.00", self.area_address, self.system_id)
    }
}

/// Anything a NET can be derived from.
pub trait ToIpv4 {
    fn to_ipv4(&self) -> Result<Ipv4Addr, AddressError>;
}

impl ToIpv4 for Ipv4Addr {
    fn to_ipv4(&self) -> Result<Ipv4Addr, AddressError> {
        Ok(*self)
    }
}

impl ToIpv4 for IpAddr {
    fn to_ipv4(&self) -> Result<Ipv4Addr, AddressError> {
        match self {
            IpAddr::V4(addr) => Ok(*addr),
            IpAddr::V6(addr) => Err(AddressError::InvalidAddress(addr.to_string())),
        }
    }
}

impl ToIpv4 for str {
    fn to_ipv4(&self) -> Result<Ipv4Addr, AddressError> {
        self.trim()
            .parse()
            .map_err(|_| AddressError::InvalidAddress(self.to_string()))
    }
}

impl ToIpv4 for String {
    fn to_ipv4(&self) -> Result<Ipv4Addr, AddressError> {
        self.as_str().to_ipv4()
    }
}

impl ToIpv4 for AttrValue {
    fn to_ipv4(&self) -> Result<Ipv4Addr, AddressError> {
        AttrValue::to_ipv4(self).ok_or_else(|| AddressError::InvalidAddress(self.to_string()))
    }
}

impl<T: ToIpv4 + ?Sized> ToIpv4 for &T {
    fn to_ipv4(&self) -> Result<Ipv4Addr, AddressError> {
        (**self).to_ipv4()
    }
}

impl<T: ToIpv4> ToIpv4 for Option<T> {
    fn to_ipv4(&self) -> Result<Ipv4Addr, AddressError> {
        match self {
            Some(value) => value.to_ipv4(),
            None => Err(AddressError::InvalidAddress("no address".to_string())),
        }
    }
}

/// The IOS-style NET for an IPv4 address, in area `49`.
pub fn ip_to_net_address(ip: impl ToIpv4) -> Result<NetAddress, AddressError> {
    Ok(NetAddress {
        area_address: AreaAddress {
            raw_address: vec![PRIVATE_AFI],
        },
        system_id: SystemId::from_ipv4(ip.to_ipv4()?),
    })
}

/// `ip_to_net_address` rendered as a string, e.g. 192.168.19.1 -> `49.1921.6801.9001.00`.
pub fn ip_to_net_ent_title_ios(ip: impl ToIpv4) -> Result<String, AddressError> {
    Ok(ip_to_net_address(ip)?.to_string())
}

/// The `isis` overlay: the same shape as `ospf`, plus a NET on every L3 device derived from its
/// loopback in `ip`.
pub fn build_isis(anm: &mut AbstractNetworkModel) -> Result<(), DeriveError> {
    ensure_absent(anm, "isis")?;
    let mut isis = igp_base(anm)?;

    let input = anm.overlay("input")?;
    let devices: Vec<_> = isis
        .all_nodes()
        .filter(|n| input.matches(*n, &is_l3device()))
        .collect();
    for device in devices {
        let loopback = anm.node(device).get("ip", "loopback")?;
        let net = ip_to_net_ent_title_ios(loopback).map_err(|source| DeriveError::InvalidAddress {
            node: anm.node_label(device),
            source,
        })?;
        isis.set(device, "net", net)?;
    }

    info!("isis: {} nodes, {} adjacencies", isis.len(), isis.edge_count());
    anm.add_overlay("isis", isis)?;
    Ok(())
}
