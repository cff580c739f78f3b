/*!
Layer builders. Each one derives a named overlay from overlays registered before it:

- `input::build_graphics`: drawing attributes, from `input`.
- `phy::build_phy`: routers, switches and physical links, from `input`.
- `ip::build_ip`: collision domains and addressing, from `phy`.
- `ospf::build_ospf` / `isis::build_isis`: intra-AS adjacencies, from `input` (and `ip`).
- `bgp::build_bgp`: eBGP and iBGP sessions, from `input` and `phy`.

A builder either registers its overlay complete or fails without registering anything.
*/

pub mod bgp;
pub mod input;
pub mod ip;
pub mod isis;
pub mod ospf;
pub mod phy;

use thiserror::Error;

use crate::{
    collaborators::CollaboratorError,
    network::{
        AbstractNetworkModel, AnmError, EdgeCopy, EdgePredicate, Overlay,
        node::NodeId,
        predicate::{attr_equal, is_router, is_switch},
    },
    transform::{aggregate_nodes, explode_nodes},
};

pub use bgp::build_bgp;
pub use input::{build_graphics, prepare_input};
pub use ip::build_ip;
pub use isis::{AddressError, build_isis, ip_to_net_ent_title_ios};
pub use ospf::build_ospf;
pub use phy::build_phy;

#[derive(Debug, Error)]
pub enum DeriveError {
    #[error(transparent)]
    Anm(#[from] AnmError),
    #[error("Cannot derive a NET for {node}: {source}")]
    InvalidAddress {
        node: String,
        #[source]
        source: AddressError,
    },
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

pub(crate) fn ensure_absent(anm: &AbstractNetworkModel, name: &str) -> Result<(), AnmError> {
    if anm.has_overlay(name) {
        return Err(AnmError::DuplicateOverlay(name.to_string()));
    }
    Ok(())
}

/// Shared start of the IGP overlays: routers and switches of `input` with their ASN, every input
/// edge, switches folded into direct router adjacencies and back, and finally no edges that
/// cross an AS boundary.
pub(crate) fn igp_base(anm: &AbstractNetworkModel) -> Result<Overlay, AnmError> {
    let input = anm.overlay("input")?;
    let mut igp = Overlay::undirected();
    igp.add_nodes_from(input, &is_router(), &["asn"]);
    igp.add_nodes_from(input, &is_switch(), &["asn"]);
    igp.add_edges_from(input, &EdgePredicate::Any, &EdgeCopy::new().retain(["edge_id"]));

    let switches: Vec<NodeId> = input.nodes(&is_switch()).filter(|n| igp.contains(*n)).collect();
    aggregate_nodes(&mut igp, &switches, &["edge_id"]);
    explode_nodes(&mut igp, &switches, &["edge_id"]);

    let inter_as: Vec<_> = igp.edges(&attr_equal("asn").negate()).collect();
    igp.remove_edges_from(&inter_as);
    Ok(igp)
}
