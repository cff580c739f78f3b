use tracing::{debug, info};

use crate::{
    collaborators::IpAllocator,
    layers::{DeriveError, ensure_absent},
    network::{
        AbstractNetworkModel, AttrValue, Attributes, DeviceRole, EdgeCopy, EdgePredicate, Overlay,
        node::NodeId,
        predicate::{Predicate, attr, attr_both, is_l3device, is_switch},
    },
    transform::{aggregate_nodes, neigh_attr, neigh_average, neigh_equal, neigh_most_frequent, split},
};

/// The `ip` overlay.
///
/// Switches are folded out of `phy` and every remaining link between two L3 devices is split by
/// a new collision-domain node. Collision domains (switches included) are numbered with `cd_id`
/// in enumeration order; the split-created ones are named after their neighbors and placed
/// between them in `graphics`. Addresses come from `allocator`.
pub fn build_ip(anm: &mut AbstractNetworkModel, allocator: &dyn IpAllocator) -> Result<(), DeriveError> {
    ensure_absent(anm, "ip")?;
    let phy = anm.overlay("phy")?;
    let graphics = anm.overlay("graphics")?;

    let mut ip = Overlay::undirected();
    ip.add_nodes_from(phy, &Predicate::Any, &[]);
    ip.add_edges_from(phy, &EdgePredicate::Any, &EdgeCopy::new());

    let switches: Vec<NodeId> = ip.nodes(&is_switch()).collect();
    aggregate_nodes(&mut ip, &switches, &["edge_id"]);

    let links: Vec<_> = ip.edges(&attr_both(is_l3device())).collect();
    let created = split(&mut ip, &links, &["edge_id"]);
    debug!("split {} links, {} switches folded", created.len(), switches.len());

    let mut drawn: Vec<(NodeId, Attributes)> = Vec::new();
    for &cd in &created {
        let mut placement = Attributes::new();
        for axis in ["x", "y"] {
            if let Some(mean) = neigh_average(&ip, cd, axis, graphics) {
                placement.insert(axis.to_string(), AttrValue::Float(mean));
            }
        }
        if let Some(asn) = neigh_most_frequent(&ip, cd, "asn", phy) {
            ip.set(cd, "asn", asn.clone())?;
            placement.insert("asn".to_string(), asn);
        }
        let shared_host = neigh_equal(&ip, cd, "host", phy)
            .then(|| neigh_attr(&ip, cd, "host", phy).next().flatten().cloned())
            .flatten();
        if let Some(host) = shared_host {
            ip.set(cd, "host", host)?;
        }
        drawn.push((cd, placement));
    }

    ip.update(switches.iter().chain(&created).copied(), &[("collision_domain", true.into())]);

    let domains: Vec<NodeId> = ip.nodes(&attr("collision_domain")).collect();
    for (index, &cd) in domains.iter().enumerate() {
        let mut shown = Attributes::new();
        shown.insert("device_type".to_string(), DeviceRole::CollisionDomain.as_str().into());
        if ip.matches(cd, &is_switch()) {
            ip.set(cd, "cd_id", AttrValue::from(index))?;
        } else {
            let mut labels: Vec<String> = neigh_attr(&ip, cd, "label", phy)
                .flatten()
                .map(AttrValue::to_string)
                .collect();
            labels.sort();
            let label = format!("cd_{}", labels.join("_"));
            ip.set(cd, "label", label.as_str())?;
            ip.set(cd, "cd_id", label.as_str())?;
            shown.insert("label".to_string(), label.into());
        }
        drawn.push((cd, shown));
    }

    allocator.allocate_ips(&mut ip)?;
    info!(
        "ip: {} nodes, {} collision domains, {} edges",
        ip.len(),
        domains.len(),
        ip.edge_count()
    );

    let graphics = anm.overlay_mut("graphics")?;
    for (node, attrs) in drawn {
        graphics.add_node(node, attrs);
    }
    anm.add_overlay("ip", ip)?;
    Ok(())
}
