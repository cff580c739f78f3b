use tracing::info;

use crate::{
    layers::DeriveError,
    network::{
        AbstractNetworkModel, AttrValue, EdgeCopy,
        predicate::{edge_attr_eq, is_router, is_switch},
    },
};

const PHY_RETAIN: [&str; 8] = [
    "label",
    "update",
    "device_type",
    "device_subtype",
    "asn",
    "platform",
    "host",
    "syntax",
];

const TOPOLOGY_ZOO_CREATOR: &str = "Topology Zoo Toolset";

/// Fills the pre-registered `phy` overlay: routers and switches of `input` and the physical
/// links between them. Topologies from the Topology Zoo keep their `Network` name.
pub fn build_phy(anm: &mut AbstractNetworkModel) -> Result<(), DeriveError> {
    let (phy, input) = anm.overlay_pair("phy", "input")?;
    phy.add_nodes_from(input, &is_router().or(is_switch()), &PHY_RETAIN);

    if input.data().get("Creator") == Some(&AttrValue::from(TOPOLOGY_ZOO_CREATOR)) {
        if let Some(network) = input.data().get("Network") {
            phy.set_data("Network", network.clone());
        }
    }

    phy.add_edges_from(input, &edge_attr_eq("type", "physical"), &EdgeCopy::new());
    info!("phy: {} nodes, {} links", phy.len(), phy.edge_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Attributes, Overlay, node::NodeId};

    #[test]
    fn test_phy_keeps_routers_switches_and_physical_links() {
        let mut input = Overlay::undirected();
        input.set_data("Creator", TOPOLOGY_ZOO_CREATOR);
        input.set_data("Network", "Abilene");
        let ids: Vec<NodeId> = ["r1", "sw1", "srv1"].iter().map(|l| NodeId::for_device(l)).collect();
        for (id, role) in ids.iter().zip(["router", "switch", "server"]) {
            let mut attrs = Attributes::new();
            attrs.insert("device_type".into(), role.into());
            attrs.insert("x".into(), AttrValue::Int(1));
            input.add_node(*id, attrs);
        }
        let mut physical = Attributes::new();
        physical.insert("type".into(), "physical".into());
        input.add_edge(ids[0], ids[1], physical.clone()).unwrap();
        input.add_edge(ids[1], ids[2], physical).unwrap();
        let mut virt = Attributes::new();
        virt.insert("type".into(), "virtual".into());
        input.add_edge(ids[0], ids[1], virt).unwrap();

        let mut anm = AbstractNetworkModel::new();
        anm.add_overlay("input", input).unwrap();
        build_phy(&mut anm).unwrap();

        let phy = anm.overlay("phy").unwrap();
        assert_eq!(phy.all_nodes().collect::<Vec<_>>(), ids[..2].to_vec());
        assert_eq!(phy.get(ids[0], "x"), None);
        assert_eq!(phy.edge_count(), 1);
        assert_eq!(phy.data().get("Network"), Some(&AttrValue::from("Abilene")));
    }
}
