/*!
Graph transformation primitives shared by the layer builders.

- `aggregate`: collapse shared-medium devices into direct adjacencies, and undo it.
- `split`: insert a node in the middle of an edge.
- `neighbor`: attribute queries over a node's neighbors.
*/

pub mod aggregate;
pub mod neighbor;
pub mod split;

pub use aggregate::{aggregate_nodes, explode_nodes};
pub use neighbor::{neigh_attr, neigh_average, neigh_equal, neigh_most_frequent};
pub use split::split;
