use std::collections::{BTreeMap, HashMap};

use petgraph::{
    Direction,
    graph::{EdgeIndex, NodeIndex},
    stable_graph::StableGraph,
    visit::EdgeRef,
};
use serde::{Serialize, ser::SerializeStruct};

use crate::network::{
    AnmError,
    node::{AttrValue, NodeId},
    predicate::{Attributes, EdgePredicate, Predicate},
};

#[derive(Debug, Clone)]
struct NodeRecord {
    id: NodeId,
    attrs: Attributes,
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    seq: u64,
    attrs: Attributes,
}

/// Handle to an edge of one overlay. Handles go stale when the edge is removed; stale handles
/// are rejected rather than silently resolving to whatever edge reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub src: NodeId,
    pub dst: NodeId,
    index: EdgeIndex,
    seq: u64,
}

impl Edge {
    /// Position of the edge in its overlay's insertion order.
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// The endpoint that is not `node`. For self-loops this is `node` itself.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.src == node { self.dst } else { self.src }
    }
}

/// One edge that was folded away by `aggregate_nodes`, remembered so it can be restored.
#[derive(Debug, Clone)]
pub(crate) struct CollapsedLink {
    pub(crate) neighbor: NodeId,
    /// `true` if the aggregated node was the edge's source.
    pub(crate) outgoing: bool,
    pub(crate) attrs: Attributes,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Aggregation {
    pub(crate) links: Vec<CollapsedLink>,
    pub(crate) direct: Vec<Edge>,
}

/// Options for `Overlay::add_edges_from`.
#[derive(Debug, Clone, Default)]
pub struct EdgeCopy {
    retain: Option<Vec<String>>,
    bidirectional: bool,
    set: Attributes,
}

impl EdgeCopy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carry only the listed attributes. Without this, every attribute is carried.
    pub fn retain<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retain = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Emit every source edge as a pair of opposite edges.
    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    /// Set an attribute on every copied edge.
    pub fn set(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.set.insert(name.to_string(), value.into());
        self
    }
}

/// A single named view of the network.
///
/// Nodes are keyed by `NodeId` so the same device can be found in every overlay that holds it.
/// Enumeration of nodes, edges and neighbors always follows insertion order.
#[derive(Debug, Clone)]
pub struct Overlay {
    directed: bool,
    graph: StableGraph<NodeRecord, EdgeRecord>,
    node_id_to_index_map: HashMap<NodeId, NodeIndex>,
    node_order: Vec<NodeIndex>,
    edge_order: BTreeMap<u64, EdgeIndex>,
    next_edge_seq: u64,
    data: Attributes,
    pub(crate) aggregations: HashMap<NodeId, Aggregation>,
}

impl Default for Overlay {
    fn default() -> Self {
        Self::undirected()
    }
}

impl Overlay {
    fn with_mode(directed: bool) -> Self {
        Self {
            directed,
            graph: StableGraph::new(),
            node_id_to_index_map: HashMap::new(),
            node_order: Vec::new(),
            edge_order: BTreeMap::new(),
            next_edge_seq: 0,
            data: Attributes::new(),
            aggregations: HashMap::new(),
        }
    }

    pub fn undirected() -> Self {
        Self::with_mode(false)
    }

    pub fn directed() -> Self {
        Self::with_mode(true)
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.node_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_order.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_order.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node_id_to_index_map.contains_key(&node)
    }

    /// Graph-level attributes.
    pub fn data(&self) -> &Attributes {
        &self.data
    }

    pub fn set_data(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.data.insert(name.to_string(), value.into());
    }

    // ---- nodes ----

    /// Adds a node, or merges `attrs` into it if it is already present.
    /// Returns `true` if the node was newly added.
    pub fn add_node(&mut self, node: NodeId, attrs: Attributes) -> bool {
        if let Some(&index) = self.node_id_to_index_map.get(&node) {
            self.graph[index].attrs.extend(attrs);
            return false;
        }
        let index = self.graph.add_node(NodeRecord { id: node, attrs });
        self.node_id_to_index_map.insert(node, index);
        self.node_order.push(index);
        true
    }

    /// Copies the nodes of `source` matching `filter`, keeping only the `retain`ed attributes
    /// (all of them if `retain` is empty).
    pub fn add_nodes_from(&mut self, source: &Overlay, filter: &Predicate, retain: &[&str]) {
        let picked: Vec<NodeId> = source.nodes(filter).collect();
        self.copy_nodes(source, picked, retain);
    }

    /// Copies an explicit set of nodes from `source`. Nodes absent from `source` are skipped.
    pub fn copy_nodes<I>(&mut self, source: &Overlay, nodes: I, retain: &[&str])
    where
        I: IntoIterator<Item = NodeId>,
    {
        for node in nodes {
            if let Some(attrs) = source.node_attrs(node) {
                self.add_node(node, pick(attrs, retain));
            }
        }
    }

    /// Nodes matching `filter`, in insertion order.
    pub fn nodes<'a>(&'a self, filter: &'a Predicate) -> impl Iterator<Item = NodeId> + 'a {
        self.node_order
            .iter()
            .map(|&index| &self.graph[index])
            .filter(move |record| filter.matches(&record.attrs))
            .map(|record| record.id)
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_order.iter().map(|&index| self.graph[index].id)
    }

    pub fn node_attrs(&self, node: NodeId) -> Option<&Attributes> {
        self.node_id_to_index_map
            .get(&node)
            .map(|&index| &self.graph[index].attrs)
    }

    pub fn get(&self, node: NodeId, name: &str) -> Option<&AttrValue> {
        self.node_attrs(node).and_then(|attrs| attrs.get(name))
    }

    /// Attribute is present and truthy.
    pub fn is(&self, node: NodeId, name: &str) -> bool {
        self.get(node, name).is_some_and(AttrValue::is_truthy)
    }

    pub fn matches(&self, node: NodeId, filter: &Predicate) -> bool {
        self.node_attrs(node).is_some_and(|attrs| filter.matches(attrs))
    }

    /// The node's `label`, falling back to its identity.
    pub fn label(&self, node: NodeId) -> String {
        match self.get(node, "label") {
            Some(label) => label.to_string(),
            None => node.to_string(),
        }
    }

    pub fn set(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), AnmError> {
        let index = *self
            .node_id_to_index_map
            .get(&node)
            .ok_or(AnmError::UnknownNode(node))?;
        self.graph[index].attrs.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn unset(&mut self, node: NodeId, name: &str) -> Option<AttrValue> {
        let index = *self.node_id_to_index_map.get(&node)?;
        self.graph[index].attrs.remove(name)
    }

    /// Sets every attribute in `attrs` on every listed node. Nodes not in the overlay are skipped.
    pub fn update<I>(&mut self, nodes: I, attrs: &[(&str, AttrValue)])
    where
        I: IntoIterator<Item = NodeId>,
    {
        for node in nodes {
            if let Some(&index) = self.node_id_to_index_map.get(&node) {
                let record = &mut self.graph[index];
                for (name, value) in attrs {
                    record.attrs.insert(name.to_string(), value.clone());
                }
            }
        }
    }

    /// Partitions the nodes by the value of `name`. Groups appear in the order their first
    /// member was added; nodes without the attribute are grouped under `None`.
    pub fn groupby(&self, name: &str) -> Vec<(Option<AttrValue>, Vec<NodeId>)> {
        let mut groups: Vec<(Option<AttrValue>, Vec<NodeId>)> = Vec::new();
        for node in self.all_nodes() {
            let key = self.get(node, name).cloned();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(node),
                None => groups.push((key, vec![node])),
            }
        }
        groups
    }

    // ---- edges ----

    /// Adds an edge between two nodes of this overlay.
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, attrs: Attributes) -> Result<Edge, AnmError> {
        let a = *self
            .node_id_to_index_map
            .get(&src)
            .ok_or(AnmError::UnknownNode(src))?;
        let b = *self
            .node_id_to_index_map
            .get(&dst)
            .ok_or(AnmError::UnknownNode(dst))?;
        let seq = self.next_edge_seq;
        self.next_edge_seq += 1;
        let index = self.graph.add_edge(a, b, EdgeRecord { seq, attrs });
        self.edge_order.insert(seq, index);
        Ok(Edge { src, dst, index, seq })
    }

    /// Adds edges for explicit node pairs, all carrying `attrs`. Pairs with an endpoint outside
    /// the overlay are skipped.
    pub fn add_edges<I>(&mut self, pairs: I, attrs: &Attributes) -> Vec<Edge>
    where
        I: IntoIterator<Item = (NodeId, NodeId)>,
    {
        pairs
            .into_iter()
            .filter_map(|(src, dst)| self.add_edge(src, dst, attrs.clone()).ok())
            .collect()
    }

    /// Copies the edges of `source` matching `filter` whose endpoints are both present here.
    pub fn add_edges_from(
        &mut self,
        source: &Overlay,
        filter: &EdgePredicate,
        options: &EdgeCopy,
    ) -> Vec<Edge> {
        let picked: Vec<Edge> = source.edges(filter).collect();
        self.copy_edges(source, &picked, options)
    }

    /// Copies an explicit list of `source` edges.
    pub fn copy_edges(&mut self, source: &Overlay, edges: &[Edge], options: &EdgeCopy) -> Vec<Edge> {
        let mut added = Vec::new();
        for edge in edges {
            let Some(attrs) = source.edge_attrs(edge) else {
                continue;
            };
            if !self.contains(edge.src) || !self.contains(edge.dst) {
                continue;
            }
            let mut attrs = match &options.retain {
                Some(names) => attrs
                    .iter()
                    .filter(|(k, _)| names.contains(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                None => attrs.clone(),
            };
            attrs.extend(options.set.clone());
            if options.bidirectional {
                added.extend(self.add_edge(edge.dst, edge.src, attrs.clone()));
            }
            added.extend(self.add_edge(edge.src, edge.dst, attrs));
        }
        added
    }

    /// Edges matching `filter`, in insertion order.
    pub fn edges<'a>(&'a self, filter: &'a EdgePredicate) -> impl Iterator<Item = Edge> + 'a {
        self.edge_order.values().filter_map(move |&index| {
            let edge = self.edge_at(index)?;
            let record = &self.graph[index];
            let src = self.node_attrs(edge.src)?;
            let dst = self.node_attrs(edge.dst)?;
            filter.matches(&record.attrs, src, dst).then_some(edge)
        })
    }

    pub fn all_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edge_order
            .values()
            .filter_map(|&index| self.edge_at(index))
    }

    fn edge_at(&self, index: EdgeIndex) -> Option<Edge> {
        let (a, b) = self.graph.edge_endpoints(index)?;
        Some(Edge {
            src: self.graph[a].id,
            dst: self.graph[b].id,
            index,
            seq: self.graph[index].seq,
        })
    }

    fn live(&self, edge: &Edge) -> Option<&EdgeRecord> {
        self.graph
            .edge_weight(edge.index)
            .filter(|record| record.seq == edge.seq)
    }

    pub fn has_edge(&self, edge: &Edge) -> bool {
        self.live(edge).is_some()
    }

    pub fn edge_attrs(&self, edge: &Edge) -> Option<&Attributes> {
        self.live(edge).map(|record| &record.attrs)
    }

    pub fn edge_get(&self, edge: &Edge, name: &str) -> Option<&AttrValue> {
        self.edge_attrs(edge).and_then(|attrs| attrs.get(name))
    }

    pub fn set_edge(&mut self, edge: &Edge, name: &str, value: impl Into<AttrValue>) -> bool {
        if self.live(edge).is_none() {
            return false;
        }
        if let Some(record) = self.graph.edge_weight_mut(edge.index) {
            record.attrs.insert(name.to_string(), value.into());
        }
        true
    }

    /// Sets every attribute in `attrs` on every listed edge.
    pub fn update_edges<'e, I>(&mut self, edges: I, attrs: &[(&str, AttrValue)])
    where
        I: IntoIterator<Item = &'e Edge>,
    {
        for edge in edges {
            for (name, value) in attrs {
                self.set_edge(edge, name, value.clone());
            }
        }
    }

    pub fn remove_edge(&mut self, edge: &Edge) -> Option<Attributes> {
        self.live(edge)?;
        let record = self.graph.remove_edge(edge.index)?;
        self.edge_order.remove(&record.seq);
        Some(record.attrs)
    }

    pub fn remove_edges_from<'e, I>(&mut self, edges: I)
    where
        I: IntoIterator<Item = &'e Edge>,
    {
        for edge in edges {
            self.remove_edge(edge);
        }
    }

    /// Edges touching `node` in either direction, in insertion order.
    pub fn incident_edges(&self, node: NodeId) -> Vec<Edge> {
        self.collect_incident(node, true)
    }

    /// Edges touching `node`, in insertion order. In a directed overlay only outgoing edges count.
    pub fn edges_of(&self, node: NodeId) -> Vec<Edge> {
        self.collect_incident(node, !self.directed)
    }

    fn collect_incident(&self, node: NodeId, with_incoming: bool) -> Vec<Edge> {
        let Some(&index) = self.node_id_to_index_map.get(&node) else {
            return Vec::new();
        };
        let mut found: Vec<Edge> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .filter_map(|e| self.edge_at(e.id()))
            .collect();
        if with_incoming {
            found.extend(
                self.graph
                    .edges_directed(index, Direction::Incoming)
                    .filter(|e| e.source() != e.target())
                    .filter_map(|e| self.edge_at(e.id())),
            );
        }
        found.sort_by_key(|edge| edge.seq);
        found
    }

    /// Distinct neighbors of `node` in the order of the edges that reach them.
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        let mut seen = Vec::new();
        for edge in self.edges_of(node) {
            let other = edge.other(node);
            if !seen.contains(&other) {
                seen.push(other);
            }
        }
        seen
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.edges_of(node).len()
    }
}

/// Copy of `attrs` restricted to `retain`; an empty list keeps everything.
pub(crate) fn pick(attrs: &Attributes, retain: &[&str]) -> Attributes {
    if retain.is_empty() {
        return attrs.clone();
    }
    attrs
        .iter()
        .filter(|(k, _)| retain.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[derive(Serialize)]
struct NodeEntry<'a> {
    id: NodeId,
    #[serde(flatten)]
    attrs: &'a Attributes,
}

#[derive(Serialize)]
struct EdgeEntry<'a> {
    src: NodeId,
    dst: NodeId,
    #[serde(flatten)]
    attrs: &'a Attributes,
}

// Node-link layout, the same shape the JSON loader reads.
impl Serialize for Overlay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let nodes: Vec<NodeEntry> = self
            .node_order
            .iter()
            .map(|&index| NodeEntry {
                id: self.graph[index].id,
                attrs: &self.graph[index].attrs,
            })
            .collect();
        let edges: Vec<EdgeEntry> = self
            .edge_order
            .values()
            .filter_map(|&index| {
                let edge = self.edge_at(index)?;
                Some(EdgeEntry {
                    src: edge.src,
                    dst: edge.dst,
                    attrs: &self.graph[index].attrs,
                })
            })
            .collect();

        let mut st = serializer.serialize_struct("Overlay", 4)?;
        st.serialize_field("directed", &self.directed)?;
        st.serialize_field("data", &self.data)?;
        st.serialize_field("nodes", &nodes)?;
        st.serialize_field("edges", &edges)?;
        st.end()
    }
}
