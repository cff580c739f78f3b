/*!
Queries over a node's neighbors.

Neighbors are taken from one overlay (the structure) while attribute values are read from a
reference overlay, e.g. the neighbors of a collision domain in `ip` but their coordinates from
`graphics`. Neighbors are enumerated in the order of the edges that reach them, so every
"first" and every tie-break below is reproducible.
*/

use crate::network::{AttrValue, Overlay, node::NodeId};

/// The attribute value of each neighbor, `None` where the reference overlay lacks the node or
/// the attribute. Taking the first item is only meaningful when `neigh_equal` holds, or when
/// the caller is fine with an arbitrary (but deterministic) pick.
pub fn neigh_attr<'a>(
    overlay: &Overlay,
    node: NodeId,
    attr: &'a str,
    reference: &'a Overlay,
) -> impl Iterator<Item = Option<&'a AttrValue>> + use<'a> {
    overlay
        .neighbors(node)
        .into_iter()
        .map(move |n| reference.get(n, attr))
}

/// Arithmetic mean of the numeric values among the neighbors. Neighbors without a numeric value
/// are left out; `None` if there are no numeric values at all.
pub fn neigh_average(overlay: &Overlay, node: NodeId, attr: &str, reference: &Overlay) -> Option<f64> {
    let values: Vec<f64> = neigh_attr(overlay, node, attr, reference)
        .flatten()
        .filter_map(AttrValue::as_f64)
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Most common value among the neighbors that carry the attribute.
///
/// Ties go to the value encountered first in neighbor order: for `[A, A, B, B]` the result is
/// `A`, for `[B, A, A, B]` it is `B`.
pub fn neigh_most_frequent(
    overlay: &Overlay,
    node: NodeId,
    attr: &str,
    reference: &Overlay,
) -> Option<AttrValue> {
    let mut counts: Vec<(&AttrValue, usize)> = Vec::new();
    for value in neigh_attr(overlay, node, attr, reference).flatten() {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(&AttrValue, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.clone())
}

/// `true` iff the node has neighbors and they all report the same value (a missing value counts
/// as a value of its own, so a mix of present and missing is not equal).
pub fn neigh_equal(overlay: &Overlay, node: NodeId, attr: &str, reference: &Overlay) -> bool {
    let mut values = neigh_attr(overlay, node, attr, reference);
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => false,
    }
}

mod tests {
    #[allow(unused_imports)]
    use super::*;
    #[allow(unused_imports)]
    use crate::network::Attributes;

    /// A hub node linked to one spoke per value, in order. Returns (structure, reference, hub).
    #[allow(dead_code)]
    fn hub(values: &[Option<AttrValue>]) -> (Overlay, Overlay, NodeId) {
        let mut structure = Overlay::undirected();
        let mut reference = Overlay::undirected();
        let hub = NodeId::for_device("hub");
        structure.add_node(hub, Attributes::new());
        for (i, value) in values.iter().enumerate() {
            let spoke = NodeId::for_device(&format!("n{i}"));
            structure.add_node(spoke, Attributes::new());
            structure.add_edge(hub, spoke, Attributes::new()).unwrap();
            let mut attrs = Attributes::new();
            if let Some(v) = value {
                attrs.insert("v".into(), v.clone());
            }
            reference.add_node(spoke, attrs);
        }
        (structure, reference, hub)
    }

    #[test]
    fn test_most_frequent_tie_goes_to_first_seen() {
        let a = AttrValue::Int(1);
        let b = AttrValue::Int(2);
        let (g, r, n) = hub(&[Some(a.clone()), Some(a.clone()), Some(b.clone()), Some(b.clone())]);
        assert_eq!(neigh_most_frequent(&g, n, "v", &r), Some(a.clone()));

        let (g, r, n) = hub(&[Some(b.clone()), Some(a.clone()), Some(a.clone()), Some(b.clone())]);
        assert_eq!(neigh_most_frequent(&g, n, "v", &r), Some(b.clone()));

        let (g, r, n) = hub(&[Some(b.clone()), Some(a.clone()), Some(a.clone())]);
        assert_eq!(neigh_most_frequent(&g, n, "v", &r), Some(a));

        let (g, r, n) = hub(&[None, None]);
        assert_eq!(neigh_most_frequent(&g, n, "v", &r), None);
    }

    #[test]
    fn test_average() {
        let (g, r, n) = hub(&[Some(AttrValue::Int(10)), Some(AttrValue::Float(20.0)), None]);
        assert_eq!(neigh_average(&g, n, "v", &r), Some(15.0));
        let (g, r, n) = hub(&[]);
        assert_eq!(neigh_average(&g, n, "v", &r), None);
    }

    #[test]
    fn test_equal_and_first_pick() {
        let h = AttrValue::from("host1");
        let (g, r, n) = hub(&[Some(h.clone()), Some(h.clone())]);
        assert!(neigh_equal(&g, n, "v", &r));
        assert_eq!(neigh_attr(&g, n, "v", &r).next(), Some(Some(&h)));

        let (g, r, n) = hub(&[Some(h.clone()), None]);
        assert!(!neigh_equal(&g, n, "v", &r));

        let (g, r, n) = hub(&[Some(h), Some(AttrValue::from("host2"))]);
        assert!(!neigh_equal(&g, n, "v", &r));

        let (g, r, n) = hub(&[]);
        assert!(!neigh_equal(&g, n, "v", &r));
    }
}
