pub mod check;
mod edge;
pub mod network;
mod node;
pub mod refs;

pub use edge::{Edge, NodeId};
pub use network::Aig;
pub use node::{AigNode, LEVEL_INFINITY, NodeKind, SCRATCH_CLEAR};
