use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::{
    collaborators::InputExpander,
    layers::{DeriveError, ensure_absent},
    network::{
        AbstractNetworkModel, Overlay,
        predicate::{Predicate, attr_eq, is_router},
    },
};

const GRAPHICS_RETAIN: [&str; 7] = ["x", "y", "device_type", "device_subtype", "pop", "asn", "label"];

/// Registers the loaded topology as `input` and readies it for the layer builders:
/// the optional expander runs first, then multi-AS labelling, then `syntax` for every router
/// whose `platform` has an entry in `syntax_by_platform`.
pub fn prepare_input(
    anm: &mut AbstractNetworkModel,
    mut input: Overlay,
    expander: Option<&dyn InputExpander>,
    syntax_by_platform: &BTreeMap<String, String>,
) -> Result<(), DeriveError> {
    ensure_absent(anm, "input")?;
    if let Some(expander) = expander {
        expander.expand(&mut input)?;
    }

    let asns: HashSet<String> = input
        .all_nodes()
        .filter_map(|n| input.get(n, "asn"))
        .map(|asn| asn.to_string())
        .collect();

    for (platform, syntax) in syntax_by_platform {
        let routers: Vec<_> = input
            .nodes(&is_router().and(attr_eq("platform", platform.as_str())))
            .collect();
        debug!("{} {} router(s) use {}", routers.len(), platform, syntax);
        input.update(routers, &[("syntax", syntax.as_str().into())]);
    }

    info!("input: {} nodes, {} edges, {} ASN(s)", input.len(), input.edge_count(), asns.len());
    anm.add_overlay("input", input)?;
    if asns.len() > 1 {
        anm.set_node_label(".", &["label", "pop", "asn"]);
    }
    Ok(())
}

/// The `graphics` overlay: every input node with its drawing attributes.
pub fn build_graphics(anm: &mut AbstractNetworkModel) -> Result<(), DeriveError> {
    ensure_absent(anm, "graphics")?;
    let mut graphics = Overlay::undirected();
    graphics.add_nodes_from(anm.overlay("input")?, &Predicate::Any, &GRAPHICS_RETAIN);
    anm.add_overlay("graphics", graphics)?;
    Ok(())
}
