/*!
Node-link JSON topologies, the layout networkx writes with `node_link_data`:

```json
{
  "graph": { "Creator": "..." },
  "nodes": [ { "id": "r1", "device_type": "router", "asn": 1, "x": 0, "y": 0 } ],
  "links": [ { "source": "r1", "target": "r2", "type": "physical" } ]
}
```

Node ids double as labels when no `label` is given. Links without a `type` are physical, links
without an `edge_id` are numbered in file order. `null` attributes are dropped.
*/

use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

use serde::Deserialize;
use tracing::info;

use crate::{
    load::{LoadError, TopologyLoader, read},
    network::{AttrValue, Attributes, Overlay, node::NodeId},
};

type RawAttributes = BTreeMap<String, Option<AttrValue>>;

fn present(raw: RawAttributes) -> Attributes {
    raw.into_iter()
        .filter_map(|(name, value)| Some((name, value?)))
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawTopology {
    #[serde(default)]
    graph: RawAttributes,
    nodes: Vec<RawNode>,
    #[serde(default, alias = "edges")]
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: AttrValue,
    #[serde(flatten)]
    attrs: RawAttributes,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    source: AttrValue,
    target: AttrValue,
    #[serde(flatten)]
    attrs: RawAttributes,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeLinkLoader;

impl NodeLinkLoader {
    pub fn parse(&self, content: &str) -> Result<Overlay, LoadError> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| LoadError::UnrecognizedInputFormat(format!("not JSON: {e}")))?;
        if value.get("nodes").is_none() {
            return Err(LoadError::UnrecognizedInputFormat(
                "JSON without a \"nodes\" list".to_string(),
            ));
        }
        let raw: RawTopology =
            serde_json::from_value(value).map_err(|e| LoadError::Invalid(e.to_string()))?;

        let mut input = Overlay::undirected();
        for (name, value) in present(raw.graph) {
            input.set_data(&name, value);
        }

        let mut seen = HashSet::new();
        for node in raw.nodes {
            let key = node.id.to_string();
            if !seen.insert(key.clone()) {
                return Err(LoadError::Invalid(format!("duplicate node id {key}")));
            }
            let mut attrs = present(node.attrs);
            attrs.entry("label".to_string()).or_insert_with(|| key.clone().into());
            input.add_node(NodeId::for_device(&key), attrs);
        }

        for (index, link) in raw.links.into_iter().enumerate() {
            let (source, target) = (link.source.to_string(), link.target.to_string());
            for end in [&source, &target] {
                if !seen.contains(end) {
                    return Err(LoadError::Invalid(format!("link refers to unknown node {end}")));
                }
            }
            let mut attrs = present(link.attrs);
            attrs.entry("type".to_string()).or_insert_with(|| "physical".into());
            attrs.entry("edge_id".to_string()).or_insert(AttrValue::from(index));
            input
                .add_edge(NodeId::for_device(&source), NodeId::for_device(&target), attrs)
                .map_err(|e| LoadError::Invalid(e.to_string()))?;
        }
        Ok(input)
    }
}

impl TopologyLoader for NodeLinkLoader {
    fn load(&self, path: &Path) -> Result<Overlay, LoadError> {
        let input = self.parse(&read(path)?)?;
        info!(
            "loaded {}: {} nodes, {} links",
            path.display(),
            input.len(),
            input.edge_count()
        );
        Ok(input)
    }
}

mod tests {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    fn test_parse_fixture() {
        let input = NodeLinkLoader
            .parse(include_str!("../../test_data/small_topology.json"))
            .unwrap();
        assert_eq!(input.len(), 6);
        assert_eq!(input.edge_count(), 6);
        assert_eq!(
            input.data().get("Creator"),
            Some(&AttrValue::from("hand written"))
        );

        let r1 = NodeId::for_device("r1");
        assert_eq!(input.get(r1, "label"), Some(&AttrValue::from("r1")));
        assert_eq!(input.get(r1, "asn"), Some(&AttrValue::Int(1)));
        assert_eq!(input.get(r1, "platform"), Some(&AttrValue::from("netkit")));

        let ids: Vec<i64> = input
            .all_edges()
            .filter_map(|e| input.edge_get(&e, "edge_id").and_then(AttrValue::as_i64))
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
        assert!(input
            .all_edges()
            .all(|e| input.edge_get(&e, "type") == Some(&AttrValue::from("physical"))));
    }

    #[test]
    fn test_null_attributes_are_dropped() {
        let input = NodeLinkLoader
            .parse(
                r#"{
                    "graph": {"name": null},
                    "nodes": [
                        {"id": "r1", "device_type": "router", "pop": null},
                        {"id": "r2", "device_type": "router", "pop": "syd"}
                    ],
                    "links": [{"source": "r1", "target": "r2", "speed": null}]
                }"#,
            )
            .unwrap();
        assert!(input.data().get("name").is_none());
        let r1 = NodeId::for_device("r1");
        assert_eq!(input.get(r1, "pop"), None);
        assert_eq!(input.get(r1, "device_type"), Some(&AttrValue::from("router")));
        assert_eq!(input.get(NodeId::for_device("r2"), "pop"), Some(&AttrValue::from("syd")));
        let link = input.all_edges().next().unwrap();
        assert_eq!(input.edge_get(&link, "speed"), None);
        assert_eq!(input.edge_get(&link, "type"), Some(&AttrValue::from("physical")));
    }

    #[test]
    fn test_format_errors() {
        assert!(matches!(
            NodeLinkLoader.parse("<graphml/>"),
            Err(LoadError::UnrecognizedInputFormat(_))
        ));
        assert!(matches!(
            NodeLinkLoader.parse(r#"{"directed": false}"#),
            Err(LoadError::UnrecognizedInputFormat(_))
        ));
        assert!(matches!(
            NodeLinkLoader.parse(r#"{"nodes": [{"id": "a"}, {"id": "a"}]}"#),
            Err(LoadError::Invalid(_))
        ));
        assert!(matches!(
            NodeLinkLoader.parse(r#"{"nodes": [{"id": "a"}], "links": [{"source": "a", "target": "b"}]}"#),
            Err(LoadError::Invalid(_))
        ));
    }
}
