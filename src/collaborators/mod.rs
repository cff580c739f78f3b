/*!
Seams for the steps the layer builders delegate.

This module defines:
- `IpAllocator`: assigns addresses on the `ip` overlay in place.
- `RouteReflectorAllocator`: adds a hierarchical iBGP edge set to the `bgp` overlay in place.
- `InputExpander`: rewrites the input overlay (e.g. graph products) before any layer is built.
- `SnapshotPublisher`: receives the model at configured checkpoints.

Default implementations live in the submodules. The builders only rely on the contracts
documented on each trait, never on a particular strategy.
*/

pub mod allocator;
pub mod publish;
pub mod route_reflector;

use thiserror::Error;

use crate::network::Overlay;

pub use allocator::SequentialAllocator;
pub use publish::{ChannelPublisher, NullPublisher, Snapshot, SnapshotPublisher};
pub use route_reflector::DegreeReflectorAllocator;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("IP allocation failed: {0}")]
    Allocation(String),
    #[error("Route reflector allocation failed: {0}")]
    RouteReflector(String),
    #[error("Input expansion failed: {0}")]
    Expansion(String),
}

/// Address allocation over the `ip` overlay.
///
/// Contract: every L3 device and every collision domain that needs an address gets a unique one.
pub trait IpAllocator: Send + Sync {
    fn allocate_ips(&self, ip: &mut Overlay) -> Result<(), CollaboratorError>;
}

/// iBGP session planning for larger topologies.
///
/// Contract: the iBGP edges added to `bgp` (tagged `type = "ibgp"`) connect every router of an
/// ASN, using fewer sessions than a full mesh.
pub trait RouteReflectorAllocator: Send + Sync {
    fn allocate(&self, phy: &Overlay, bgp: &mut Overlay) -> Result<(), CollaboratorError>;
}

/// Rewrites the input overlay before the layers are derived from it.
pub trait InputExpander: Send + Sync {
    fn expand(&self, input: &mut Overlay) -> Result<(), CollaboratorError>;
}
