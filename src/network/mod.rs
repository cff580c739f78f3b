/*
 * This module defines the abstract network model: node identities, typed attributes,
 * the overlay graph and the registry of named overlays that share one identity space.
 */

pub mod anm;
pub mod node;
pub mod overlay;
pub mod predicate;

use thiserror::Error;

use crate::network::node::NodeId;

pub use anm::{AbstractNetworkModel, NodeView};
pub use node::{AttrValue, DeviceRole};
pub use overlay::{Edge, EdgeCopy, Overlay};
pub use predicate::{Attributes, EdgePredicate, Predicate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnmError {
    #[error("Unknown overlay: {0}")]
    UnknownOverlay(String),
    #[error("Overlay already exists: {0}")]
    DuplicateOverlay(String),
    #[error("Overlay {0} cannot be borrowed as both source and target")]
    AliasedOverlay(String),
    #[error("Node {0} is not present in the overlay")]
    UnknownNode(NodeId),
}
