use std::net::Ipv4Addr;

use ipnetwork::{IpNetwork, Ipv4Network};
use tracing::{debug, info};

use crate::{
    collaborators::{CollaboratorError, IpAllocator},
    config::IpConfig,
    network::{
        Overlay,
        predicate::{attr, is_l3device},
    },
};

/// Hands out addresses in enumeration order.
///
/// - L3 devices get a `loopback` from the loopback block (the network address is skipped).
/// - Each collision domain gets the smallest `subnet` from the infrastructure block that holds
///   one address per attached device plus network and broadcast, never smaller than a /30.
/// - Each edge of a collision domain gets the attached device's address in `ip_address`.
#[derive(Debug, Clone)]
pub struct SequentialAllocator {
    loopback_block: Ipv4Network,
    infra_block: Ipv4Network,
}

impl SequentialAllocator {
    pub fn new(loopback_block: Ipv4Network, infra_block: Ipv4Network) -> Self {
        Self {
            loopback_block,
            infra_block,
        }
    }

    pub fn from_config(config: &IpConfig) -> Result<Self, CollaboratorError> {
        match (config.loopback_block, config.infra_block) {
            (IpNetwork::V4(loopback), IpNetwork::V4(infra)) => Ok(Self::new(loopback, infra)),
            _ => Err(CollaboratorError::Allocation(
                "only IPv4 blocks are supported".to_string(),
            )),
        }
    }

    fn allocate_loopbacks(&self, ip: &mut Overlay) -> Result<(), CollaboratorError> {
        let devices: Vec<_> = ip.nodes(&is_l3device()).collect();
        let mut hosts = self.loopback_block.iter().skip(1);
        for device in devices {
            let addr = hosts.next().ok_or_else(|| {
                CollaboratorError::Allocation(format!(
                    "loopback block {} exhausted",
                    self.loopback_block
                ))
            })?;
            ip.set(device, "loopback", addr)
                .map_err(|e| CollaboratorError::Allocation(e.to_string()))?;
        }
        Ok(())
    }

    fn allocate_subnets(&self, ip: &mut Overlay) -> Result<(), CollaboratorError> {
        let exhausted = || {
            CollaboratorError::Allocation(format!("infrastructure block {} exhausted", self.infra_block))
        };
        let domains: Vec<_> = ip.nodes(&attr("collision_domain")).collect();
        let end = u64::from(u32::from(self.infra_block.broadcast())) + 1;
        let mut cursor = u64::from(u32::from(self.infra_block.network()));

        for domain in domains {
            let attachments = ip.edges_of(domain);
            let size = ((attachments.len() + 2) as u64).next_power_of_two().max(4);
            let prefix = 32 - size.trailing_zeros() as u8;
            cursor = cursor.div_ceil(size) * size;
            if cursor + size > end {
                return Err(exhausted());
            }
            let base = Ipv4Addr::from(u32::try_from(cursor).map_err(|_| exhausted())?);
            let subnet = Ipv4Network::new(base, prefix)
                .map_err(|e| CollaboratorError::Allocation(e.to_string()))?;

            ip.set(domain, "subnet", IpNetwork::V4(subnet))
                .map_err(|e| CollaboratorError::Allocation(e.to_string()))?;
            for (offset, edge) in attachments.iter().enumerate() {
                let host = Ipv4Addr::from(u32::from(base) + 1 + offset as u32);
                ip.set_edge(edge, "ip_address", host);
            }
            debug!("{} -> {}", ip.label(domain), subnet);
            cursor += size;
        }
        Ok(())
    }
}

impl IpAllocator for SequentialAllocator {
    fn allocate_ips(&self, ip: &mut Overlay) -> Result<(), CollaboratorError> {
        self.allocate_loopbacks(ip)?;
        self.allocate_subnets(ip)?;
        info!(
            "allocated loopbacks from {} and subnets from {}",
            self.loopback_block, self.infra_block
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{AttrValue, Attributes, node::NodeId};

    fn node(g: &mut Overlay, label: &str, attrs: &[(&str, AttrValue)]) -> NodeId {
        let id = NodeId::for_device(label);
        let mut map = Attributes::new();
        map.insert("label".into(), label.into());
        for (k, v) in attrs {
            map.insert(k.to_string(), v.clone());
        }
        g.add_node(id, map);
        id
    }

    fn allocator(loopbacks: &str, infra: &str) -> SequentialAllocator {
        SequentialAllocator::new(loopbacks.parse().unwrap(), infra.parse().unwrap())
    }

    #[test]
    fn test_allocates_loopbacks_and_subnets() {
        let mut ip = Overlay::undirected();
        let r1 = node(&mut ip, "r1", &[("device_type", "router".into())]);
        let r2 = node(&mut ip, "r2", &[("device_type", "router".into())]);
        let r3 = node(&mut ip, "r3", &[("device_type", "router".into())]);
        let sw = node(&mut ip, "sw", &[("device_type", "switch".into()), ("collision_domain", true.into())]);
        let cd = node(&mut ip, "cd_r1_r2", &[("collision_domain", true.into())]);
        for r in [r1, r2, r3] {
            ip.add_edge(r, sw, Attributes::new()).unwrap();
        }
        ip.add_edge(r1, cd, Attributes::new()).unwrap();
        ip.add_edge(r2, cd, Attributes::new()).unwrap();

        allocator("192.168.0.0/24", "10.0.0.0/24").allocate_ips(&mut ip).unwrap();

        assert_eq!(ip.get(r1, "loopback"), Some(&AttrValue::from(Ipv4Addr::new(192, 168, 0, 1))));
        assert_eq!(ip.get(r3, "loopback"), Some(&AttrValue::from(Ipv4Addr::new(192, 168, 0, 3))));
        assert_eq!(ip.get(sw, "loopback"), None);

        // three attachments need a /29, two fit a /30
        assert_eq!(ip.get(sw, "subnet").map(|v| v.to_string()), Some("10.0.0.0/29".to_string()));
        assert_eq!(ip.get(cd, "subnet").map(|v| v.to_string()), Some("10.0.0.8/30".to_string()));
        let addrs: Vec<String> = ip
            .edges_of(cd)
            .iter()
            .filter_map(|e| ip.edge_get(e, "ip_address").map(|v| v.to_string()))
            .collect();
        assert_eq!(addrs, vec!["10.0.0.9", "10.0.0.10"]);
    }

    #[test]
    fn test_reports_exhaustion() {
        let mut ip = Overlay::undirected();
        node(&mut ip, "r1", &[("device_type", "router".into())]);
        node(&mut ip, "r2", &[("device_type", "router".into())]);
        let result = allocator("192.168.0.0/31", "10.0.0.0/24").allocate_ips(&mut ip);
        assert!(matches!(result, Err(CollaboratorError::Allocation(_))));

        let mut ip = Overlay::undirected();
        node(&mut ip, "cd1", &[("collision_domain", true.into())]);
        node(&mut ip, "cd2", &[("collision_domain", true.into())]);
        let result = allocator("192.168.0.0/24", "10.0.0.0/30").allocate_ips(&mut ip);
        assert!(matches!(result, Err(CollaboratorError::Allocation(_))));
    }
}
