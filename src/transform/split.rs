use tracing::debug;

use crate::network::{
    Attributes, Edge, Overlay,
    node::NodeId,
    overlay::pick,
};

/// Splits each edge in two by inserting a new node between its endpoints.
///
/// Callers pick the edges (typically those whose both endpoints are L3 devices); every edge
/// passed is split. The two replacement edges carry the `retain`ed attributes of the original.
/// In a directed overlay the original direction is kept (`src -> new -> dst`).
///
/// The new node's identity is derived from the original edge, so re-running a build over the
/// same input yields the same identities. Returns the created nodes in the order of `edges`.
pub fn split(overlay: &mut Overlay, edges: &[Edge], retain: &[&str]) -> Vec<NodeId> {
    let mut created = Vec::with_capacity(edges.len());
    for edge in edges {
        let Some(attrs) = overlay.remove_edge(edge) else {
            debug!("edge {} -> {} is gone, not splitting", edge.src, edge.dst);
            continue;
        };
        let data = pick(&attrs, retain);
        let middle = NodeId::derived(edge.src, &format!("split:{}:{}", edge.dst, edge.sequence()));
        overlay.add_node(middle, Attributes::new());

        let second = if overlay.is_directed() {
            (middle, edge.dst)
        } else {
            (edge.dst, middle)
        };
        // both endpoints were present a moment ago and the middle node was just added
        let _ = overlay.add_edge(edge.src, middle, data.clone());
        let _ = overlay.add_edge(second.0, second.1, data);
        created.push(middle);
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        AttrValue,
        predicate::{attr_both, is_l3device},
    };

    fn device(g: &mut Overlay, label: &str, role: &str) -> NodeId {
        let id = NodeId::for_device(label);
        let mut attrs = Attributes::new();
        attrs.insert("device_type".into(), role.into());
        g.add_node(id, attrs);
        id
    }

    #[test]
    fn test_split_adds_one_node_per_edge() {
        let mut g = Overlay::undirected();
        let r1 = device(&mut g, "r1", "router");
        let r2 = device(&mut g, "r2", "router");
        let r3 = device(&mut g, "r3", "router");
        let sw = device(&mut g, "sw", "switch");
        for (a, b, id) in [(r1, r2, 1), (r2, r3, 2), (r3, sw, 3)] {
            let mut attrs = Attributes::new();
            attrs.insert("edge_id".into(), AttrValue::Int(id));
            attrs.insert("type".into(), "physical".into());
            g.add_edge(a, b, attrs).unwrap();
        }

        let picked: Vec<Edge> = g.edges(&attr_both(is_l3device())).collect();
        assert_eq!(picked.len(), 2);
        let before = g.len();
        let created = split(&mut g, &picked, &["edge_id"]);

        assert_eq!(created.len(), 2);
        assert_eq!(g.len(), before + 2);
        assert_eq!(g.edge_count(), 5);
        assert_eq!(g.neighbors(created[0]), vec![r1, r2]);
        assert_eq!(g.neighbors(created[1]), vec![r2, r3]);
        for edge in g.incident_edges(created[0]) {
            assert_eq!(g.edge_get(&edge, "edge_id"), Some(&AttrValue::Int(1)));
            assert_eq!(g.edge_get(&edge, "type"), None);
        }
        // r3 - sw untouched
        assert_eq!(g.neighbors(sw), vec![r3]);
    }

    #[test]
    fn test_split_keeps_direction() {
        let mut g = Overlay::directed();
        let a = device(&mut g, "a", "router");
        let b = device(&mut g, "b", "router");
        let edge = g.add_edge(a, b, Attributes::new()).unwrap();

        let created = split(&mut g, &[edge], &[]);
        let edges: Vec<(NodeId, NodeId)> = g.all_edges().map(|e| (e.src, e.dst)).collect();
        assert_eq!(edges, vec![(a, created[0]), (created[0], b)]);

        // a stale handle is ignored
        assert!(split(&mut g, &[edge], &[]).is_empty());
    }
}
