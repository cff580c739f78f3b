use tracing::info;

use crate::{
    collaborators::RouteReflectorAllocator,
    layers::{DeriveError, ensure_absent},
    network::{
        AbstractNetworkModel, Attributes, EdgeCopy, Overlay,
        node::NodeId,
        predicate::{attr_equal, edge_attr_eq, is_router},
    },
};

/// The `bgp` overlay (directed): routers of `input`, an eBGP session pair for every input edge
/// that crosses an AS boundary, and iBGP sessions within each AS.
///
/// With fewer than `full_mesh_threshold` physical nodes every AS is a full iBGP mesh, otherwise
/// `route_reflectors` decides the iBGP sessions. Routers with an eBGP session are marked
/// `ebgp = true`.
pub fn build_bgp(
    anm: &mut AbstractNetworkModel,
    full_mesh_threshold: usize,
    route_reflectors: &dyn RouteReflectorAllocator,
) -> Result<(), DeriveError> {
    ensure_absent(anm, "bgp")?;
    let input = anm.overlay("input")?;
    let phy = anm.overlay("phy")?;

    let mut bgp = Overlay::directed();
    bgp.add_nodes_from(input, &is_router(), &[]);
    let ebgp = bgp.add_edges_from(
        input,
        &attr_equal("asn").negate(),
        &EdgeCopy::new().retain(["edge_id"]).bidirectional().set("type", "ebgp"),
    );

    if phy.len() < full_mesh_threshold {
        let mut ibgp = Attributes::new();
        ibgp.insert("type".to_string(), "ibgp".into());
        for (_, devices) in phy.groupby("asn") {
            let routers: Vec<NodeId> = devices
                .into_iter()
                .filter(|d| phy.matches(*d, &is_router()) && bgp.contains(*d))
                .collect();
            let sessions: Vec<(NodeId, NodeId)> = routers
                .iter()
                .flat_map(|&s| routers.iter().filter(move |&&t| t != s).map(move |&t| (s, t)))
                .collect();
            bgp.add_edges(sessions, &ibgp);
        }
    } else {
        route_reflectors.allocate(phy, &mut bgp)?;
    }

    let speakers: Vec<NodeId> = ebgp.iter().flat_map(|e| [e.src, e.dst]).collect();
    bgp.update(speakers, &[("ebgp", true.into())]);

    let ibgp_sessions = bgp.edges(&edge_attr_eq("type", "ibgp")).count();
    info!(
        "bgp: {} routers, {} eBGP and {} iBGP sessions",
        bgp.len(),
        ebgp.len(),
        ibgp_sessions
    );
    anm.add_overlay("bgp", bgp)?;
    Ok(())
}
