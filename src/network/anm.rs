use serde::{Serialize, ser::SerializeMap};

use crate::network::{
    AnmError,
    node::{AttrValue, NodeId},
    overlay::Overlay,
    predicate::Attributes,
};

/// How `AbstractNetworkModel::node_label` renders a device.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelFormat {
    separator: String,
    attrs: Vec<String>,
}

/// Registry of named overlays that share one node-identity space.
#[derive(Debug, Clone)]
pub struct AbstractNetworkModel {
    overlays: Vec<(String, Overlay)>,
    label_format: Option<LabelFormat>,
}

impl Default for AbstractNetworkModel {
    fn default() -> Self {
        Self::new()
    }
}

impl AbstractNetworkModel {
    /// Creates a model with an empty `phy` overlay already registered.
    pub fn new() -> Self {
        Self {
            overlays: vec![("phy".to_string(), Overlay::undirected())],
            label_format: None,
        }
    }

    /// Registers `overlay` under `name`.
    pub fn add_overlay(&mut self, name: &str, overlay: Overlay) -> Result<&mut Overlay, AnmError> {
        if self.has_overlay(name) {
            return Err(AnmError::DuplicateOverlay(name.to_string()));
        }
        self.overlays.push((name.to_string(), overlay));
        let (_, added) = self
            .overlays
            .last_mut()
            .ok_or_else(|| AnmError::UnknownOverlay(name.to_string()))?;
        Ok(added)
    }

    pub fn has_overlay(&self, name: &str) -> bool {
        self.overlays.iter().any(|(n, _)| n == name)
    }

    pub fn overlay(&self, name: &str) -> Result<&Overlay, AnmError> {
        self.overlays
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
            .ok_or_else(|| AnmError::UnknownOverlay(name.to_string()))
    }

    pub fn overlay_mut(&mut self, name: &str) -> Result<&mut Overlay, AnmError> {
        self.overlays
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
            .ok_or_else(|| AnmError::UnknownOverlay(name.to_string()))
    }

    /// Borrows `target` mutably and `source` immutably at the same time.
    pub fn overlay_pair(
        &mut self,
        target: &str,
        source: &str,
    ) -> Result<(&mut Overlay, &Overlay), AnmError> {
        let t = self.position(target)?;
        let s = self.position(source)?;
        if t == s {
            return Err(AnmError::AliasedOverlay(target.to_string()));
        }
        if t < s {
            let (left, right) = self.overlays.split_at_mut(s);
            Ok((&mut left[t].1, &right[0].1))
        } else {
            let (left, right) = self.overlays.split_at_mut(t);
            Ok((&mut right[0].1, &left[s].1))
        }
    }

    fn position(&self, name: &str) -> Result<usize, AnmError> {
        self.overlays
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| AnmError::UnknownOverlay(name.to_string()))
    }

    pub fn overlay_names(&self) -> impl Iterator<Item = &str> {
        self.overlays.iter().map(|(n, _)| n.as_str())
    }

    /// Cross-overlay view of one device.
    pub fn node(&self, id: NodeId) -> NodeView<'_> {
        NodeView { anm: self, id }
    }

    /// Render device labels as the given attributes of the input overlay joined by `separator`.
    pub fn set_node_label(&mut self, separator: &str, attrs: &[&str]) {
        self.label_format = Some(LabelFormat {
            separator: separator.to_string(),
            attrs: attrs.iter().map(|a| a.to_string()).collect(),
        });
    }

    /// Display label of a device under the current label format. Attributes the device does not
    /// carry are left out.
    pub fn node_label(&self, id: NodeId) -> String {
        let view = self.node(id);
        match &self.label_format {
            Some(format) => format
                .attrs
                .iter()
                .filter_map(|attr| view.get("input", attr).ok().flatten())
                .map(AttrValue::to_string)
                .collect::<Vec<_>>()
                .join(&format.separator),
            None => match view.get("input", "label").ok().flatten() {
                Some(label) => label.to_string(),
                None => id.to_string(),
            },
        }
    }
}

/// One device, looked at through any overlay of the model.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    anm: &'a AbstractNetworkModel,
    id: NodeId,
}

impl<'a> NodeView<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The device's attributes in `overlay`, `None` if the overlay does not contain it.
    pub fn in_overlay(&self, overlay: &str) -> Result<Option<&'a Attributes>, AnmError> {
        Ok(self.anm.overlay(overlay)?.node_attrs(self.id))
    }

    pub fn get(&self, overlay: &str, attr: &str) -> Result<Option<&'a AttrValue>, AnmError> {
        Ok(self.anm.overlay(overlay)?.get(self.id, attr))
    }

    /// Names of the overlays that contain this device.
    pub fn overlays(&self) -> Vec<&'a str> {
        self.anm
            .overlays
            .iter()
            .filter(|(_, o)| o.contains(self.id))
            .map(|(n, _)| n.as_str())
            .collect()
    }
}

impl Serialize for AbstractNetworkModel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.overlays.len()))?;
        for (name, overlay) in &self.overlays {
            map.serialize_entry(name, overlay)?;
        }
        map.end()
    }
}

mod tests {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    fn test_overlay_registry() {
        let mut anm = AbstractNetworkModel::new();
        assert!(anm.has_overlay("phy"));
        anm.add_overlay("input", Overlay::undirected()).unwrap();
        assert!(matches!(
            anm.add_overlay("input", Overlay::undirected()),
            Err(AnmError::DuplicateOverlay(name)) if name == "input"
        ));
        assert!(matches!(anm.overlay("ospf"), Err(AnmError::UnknownOverlay(_))));
        assert_eq!(anm.overlay_names().collect::<Vec<_>>(), vec!["phy", "input"]);
    }

    #[test]
    fn test_cross_overlay_view() {
        let mut anm = AbstractNetworkModel::new();
        let r1 = NodeId::for_device("r1");
        let mut ip = Overlay::undirected();
        let mut attrs = Attributes::new();
        attrs.insert("loopback".into(), AttrValue::Addr("192.168.0.1".parse().unwrap()));
        ip.add_node(r1, attrs);
        anm.add_overlay("ip", ip).unwrap();
        anm.add_overlay("isis", Overlay::undirected())
            .unwrap()
            .add_node(r1, Attributes::new());

        let view = anm.node(r1);
        assert_eq!(view.overlays(), vec!["ip", "isis"]);
        assert!(view.get("ip", "loopback").unwrap().is_some());
        assert!(view.in_overlay("phy").unwrap().is_none());
        assert!(view.get("bgp", "asn").is_err());
    }

    #[test]
    fn test_overlay_pair_and_labels() {
        let mut anm = AbstractNetworkModel::new();
        let r1 = NodeId::for_device("r1");
        let mut input = Overlay::undirected();
        let mut attrs = Attributes::new();
        attrs.insert("label".into(), "r1".into());
        attrs.insert("asn".into(), AttrValue::Int(65001));
        input.add_node(r1, attrs);
        anm.add_overlay("input", input).unwrap();

        let (phy, input) = anm.overlay_pair("phy", "input").unwrap();
        phy.add_nodes_from(input, &crate::network::predicate::Predicate::Any, &["label"]);
        assert_eq!(anm.overlay("phy").unwrap().len(), 1);
        assert!(matches!(anm.overlay_pair("phy", "phy"), Err(AnmError::AliasedOverlay(_))));

        assert_eq!(anm.node_label(r1), "r1");
        anm.set_node_label(".", &["label", "pop", "asn"]);
        assert_eq!(anm.node_label(r1), "r1.65001");
    }
}
