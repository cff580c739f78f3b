/*!
Line-oriented topology lists, one statement per line:

```text
# comment
node r1 router 65001
node sw1 switch
link r1 sw1
```

`node <label> <device_type> [asn]` declares a device, `link <a> <b>` a physical link between
two declared devices.
*/

use std::path::Path;

use tracing::info;

use crate::{
    load::{LoadError, TopologyLoader, read},
    network::{AttrValue, Attributes, Overlay, node::NodeId},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkListLoader;

impl LinkListLoader {
    pub fn parse(&self, content: &str) -> Result<Overlay, LoadError> {
        let mut input = Overlay::undirected();
        let mut links = 0usize;

        for (number, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let invalid = |what: &str| LoadError::Invalid(format!("line {}: {what}: {line}", number + 1));
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["node", label, device_type, rest @ ..] => {
                    let mut attrs = Attributes::new();
                    attrs.insert("label".to_string(), (*label).into());
                    attrs.insert("device_type".to_string(), (*device_type).into());
                    match rest {
                        [] => {}
                        [asn] => {
                            let asn: i64 = asn.parse().map_err(|_| invalid("bad asn"))?;
                            attrs.insert("asn".to_string(), AttrValue::Int(asn));
                        }
                        _ => return Err(invalid("trailing words")),
                    }
                    if !input.add_node(NodeId::for_device(label), attrs) {
                        return Err(invalid("duplicate node"));
                    }
                }
                ["link", a, b] => {
                    let mut attrs = Attributes::new();
                    attrs.insert("type".to_string(), "physical".into());
                    attrs.insert("edge_id".to_string(), AttrValue::from(links));
                    input
                        .add_edge(NodeId::for_device(a), NodeId::for_device(b), attrs)
                        .map_err(|_| invalid("link to undeclared node"))?;
                    links += 1;
                }
                _ => return Err(invalid("unknown statement")),
            }
        }
        Ok(input)
    }
}

impl TopologyLoader for LinkListLoader {
    fn load(&self, path: &Path) -> Result<Overlay, LoadError> {
        let input = self.parse(&read(path)?)?;
        info!("loaded {} as a link list: {} nodes", path.display(), input.len());
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_list() {
        let input = LinkListLoader
            .parse("# lab\nnode r1 router 65001\nnode sw1 switch\n\nlink r1 sw1 # uplink\n")
            .unwrap();
        let r1 = NodeId::for_device("r1");
        assert_eq!(input.len(), 2);
        assert_eq!(input.get(r1, "asn"), Some(&AttrValue::Int(65001)));
        assert_eq!(input.get(NodeId::for_device("sw1"), "asn"), None);
        let edge = input.all_edges().next().unwrap();
        assert_eq!(input.edge_get(&edge, "edge_id"), Some(&AttrValue::Int(0)));
    }

    #[test]
    fn test_rejects_bad_lines() {
        for bad in [
            "node r1 router x",
            "node r1 router\nnode r1 router",
            "link r1 r2",
            "router r1",
        ] {
            assert!(matches!(LinkListLoader.parse(bad), Err(LoadError::Invalid(_))), "{bad}");
        }
    }
}
