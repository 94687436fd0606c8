//! Domain layer: the tree container and its identifiers
//!
//! This layer is independent of external concerns (no I/O, no config loading).

pub mod id;
pub mod iter;
pub mod node;

pub use id::{IdGenerator, NodeId, RandomIdGenerator, SequentialIdGenerator};
pub use iter::{PostOrderIterator, TreeIterator};
pub use node::TreeNode;
