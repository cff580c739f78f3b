use tracing::info;

use crate::{
    layers::{DeriveError, ensure_absent, igp_base},
    network::{AbstractNetworkModel, AttrValue, Edge},
};

/// The `ospf` overlay: intra-AS adjacencies, all in area 0 with cost 1.
pub fn build_ospf(anm: &mut AbstractNetworkModel) -> Result<(), DeriveError> {
    ensure_absent(anm, "ospf")?;
    let mut ospf = igp_base(anm)?;

    let adjacencies: Vec<Edge> = ospf.all_edges().collect();
    ospf.update_edges(&adjacencies, &[("area", AttrValue::Int(0)), ("cost", AttrValue::Int(1))]);

    info!("ospf: {} nodes, {} adjacencies", ospf.len(), ospf.edge_count());
    anm.add_overlay("ospf", ospf)?;
    Ok(())
}
