/*!
Collapsing shared-medium devices out of an overlay and putting them back.

`aggregate_nodes` strips every edge of each listed node and connects the node's outside
neighbors to each other directly. What was removed is kept in a ledger on the overlay, so
`explode_nodes` can restore the original edges, endpoints and retained attributes included.
*/

use std::collections::HashSet;

use tracing::debug;

use crate::network::{
    Edge, Overlay,
    node::NodeId,
    overlay::{CollapsedLink, pick},
};

/// Collapses each node of `nodes` out of the edge set.
///
/// The nodes themselves stay in the overlay (without edges). For every pair of neighbors that
/// are not themselves in `nodes`, a direct edge is created carrying the `retain`ed attributes
/// of the edge on the first neighbor's side. In a directed overlay direct edges run from the
/// node's predecessors to its successors. Edges between two members of `nodes` are recorded
/// but not bridged.
///
/// Returns the direct edges that were created.
pub fn aggregate_nodes(overlay: &mut Overlay, nodes: &[NodeId], retain: &[&str]) -> Vec<Edge> {
    let members: HashSet<NodeId> = nodes.iter().copied().filter(|n| overlay.contains(*n)).collect();
    let mut created = Vec::new();
    let mut done: HashSet<NodeId> = HashSet::new();

    for &node in nodes {
        if !members.contains(&node) || !done.insert(node) {
            continue;
        }

        let mut links = Vec::new();
        for edge in overlay.incident_edges(node) {
            let Some(attrs) = overlay.edge_attrs(&edge) else {
                continue;
            };
            links.push(CollapsedLink {
                neighbor: edge.other(node),
                outgoing: edge.src == node,
                attrs: attrs.clone(),
            });
        }
        let incident = overlay.incident_edges(node);
        overlay.remove_edges_from(&incident);

        let mut direct = Vec::new();
        let outside: Vec<&CollapsedLink> = links
            .iter()
            .filter(|l| l.neighbor != node && !members.contains(&l.neighbor))
            .collect();
        if overlay.is_directed() {
            for from in outside.iter().filter(|l| !l.outgoing) {
                for to in outside.iter().filter(|l| l.outgoing) {
                    if from.neighbor == to.neighbor {
                        continue;
                    }
                    direct.extend(overlay.add_edge(from.neighbor, to.neighbor, pick(&from.attrs, retain)));
                }
            }
        } else {
            let mut seen: Vec<NodeId> = Vec::new();
            let distinct: Vec<&CollapsedLink> = outside
                .into_iter()
                .filter(|l| {
                    let fresh = !seen.contains(&l.neighbor);
                    seen.push(l.neighbor);
                    fresh
                })
                .collect();
            for (i, a) in distinct.iter().enumerate() {
                for b in &distinct[i + 1..] {
                    direct.extend(overlay.add_edge(a.neighbor, b.neighbor, pick(&a.attrs, retain)));
                }
            }
        }

        debug!(
            "aggregated {} ({} links folded, {} direct edges)",
            overlay.label(node),
            links.len(),
            direct.len()
        );
        created.extend(direct.iter().copied());
        let ledger = overlay.aggregations.entry(node).or_default();
        ledger.links.extend(links);
        ledger.direct.extend(direct);
    }
    created
}

/// Reverses `aggregate_nodes` for each listed node: the direct edges created for it are removed
/// and its original edges are re-created (re-adding the node itself if it has gone missing),
/// carrying the `retain`ed attributes of the original edge. Nodes that were never aggregated
/// are left alone.
///
/// Returns the restored edges.
pub fn explode_nodes(overlay: &mut Overlay, nodes: &[NodeId], retain: &[&str]) -> Vec<Edge> {
    let mut restored = Vec::new();
    for &node in nodes {
        let Some(ledger) = overlay.aggregations.remove(&node) else {
            continue;
        };
        if !overlay.contains(node) {
            overlay.add_node(node, Default::default());
        }
        overlay.remove_edges_from(&ledger.direct);

        for link in &ledger.links {
            let (src, dst) = if link.outgoing {
                (node, link.neighbor)
            } else {
                (link.neighbor, node)
            };
            match overlay.add_edge(src, dst, pick(&link.attrs, retain)) {
                Ok(edge) => restored.push(edge),
                Err(e) => debug!("not restoring link of {}: {}", overlay.label(node), e),
            }
        }
        debug!("exploded {} ({} links restored)", overlay.label(node), ledger.links.len());
    }
    restored
}
