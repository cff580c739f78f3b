use std::cmp::Reverse;

use tracing::info;

use crate::{
    collaborators::{CollaboratorError, RouteReflectorAllocator},
    network::{Attributes, Overlay, node::NodeId},
};

/// Picks the best-connected routers of each ASN as route reflectors.
///
/// Within an ASN the routers with the highest physical degree (ties in enumeration order) become
/// reflectors and are marked `route_reflector = true`. Reflectors peer with each other in a full
/// mesh; every other router peers with every reflector, in both directions.
#[derive(Debug, Clone)]
pub struct DegreeReflectorAllocator {
    per_asn: usize,
}

impl DegreeReflectorAllocator {
    pub fn new(per_asn: usize) -> Self {
        Self { per_asn }
    }
}

impl RouteReflectorAllocator for DegreeReflectorAllocator {
    fn allocate(&self, phy: &Overlay, bgp: &mut Overlay) -> Result<(), CollaboratorError> {
        if self.per_asn == 0 {
            return Err(CollaboratorError::RouteReflector(
                "at least one route reflector per ASN is required".to_string(),
            ));
        }
        let mut ibgp = Attributes::new();
        ibgp.insert("type".to_string(), "ibgp".into());

        for (asn, mut routers) in bgp.groupby("asn") {
            if routers.len() < 2 {
                continue;
            }
            routers.sort_by_key(|r| Reverse(phy.degree(*r)));
            let count = self.per_asn.min(routers.len());
            let (reflectors, clients) = routers.split_at(count);

            let mut sessions: Vec<(NodeId, NodeId)> = Vec::new();
            for &rr in reflectors {
                sessions.extend(reflectors.iter().filter(|&&o| o != rr).map(|&o| (rr, o)));
                for &client in clients {
                    sessions.push((rr, client));
                    sessions.push((client, rr));
                }
            }
            bgp.update(reflectors.iter().copied(), &[("route_reflector", true.into())]);
            let added = bgp.add_edges(sessions, &ibgp);
            info!(
                "asn {}: {} route reflector(s), {} iBGP sessions",
                asn.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
                reflectors.len(),
                added.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::AttrValue;

    #[test]
    fn test_reflectors_are_highest_degree() {
        let mut phy = Overlay::undirected();
        let mut bgp = Overlay::directed();
        let ids: Vec<NodeId> = (0..5).map(|i| NodeId::for_device(&format!("r{i}"))).collect();
        for id in &ids {
            let mut attrs = Attributes::new();
            attrs.insert("asn".into(), AttrValue::Int(1));
            phy.add_node(*id, attrs.clone());
            bgp.add_node(*id, attrs);
        }
        // r3 is the hub, r1 second
        for (a, b) in [(3, 0), (3, 1), (3, 2), (3, 4), (1, 0), (1, 2)] {
            phy.add_edge(ids[a], ids[b], Attributes::new()).unwrap();
        }

        DegreeReflectorAllocator::new(2).allocate(&phy, &mut bgp).unwrap();

        assert!(bgp.is(ids[3], "route_reflector"));
        assert!(bgp.is(ids[1], "route_reflector"));
        assert!(!bgp.is(ids[0], "route_reflector"));
        // 2 reflector sessions + 2 * 2 * 3 client sessions
        assert_eq!(bgp.edge_count(), 2 + 12);
        assert!(bgp.all_edges().all(|e| bgp.edge_get(&e, "type") == Some(&AttrValue::from("ibgp"))));
        assert_eq!(bgp.neighbors(ids[0]), vec![ids[3], ids[1]]);
    }

    #[test]
    fn test_rejects_zero_reflectors() {
        let mut bgp = Overlay::directed();
        let result = DegreeReflectorAllocator::new(0).allocate(&Overlay::undirected(), &mut bgp);
        assert!(matches!(result, Err(CollaboratorError::RouteReflector(_))));
    }
}
