//! Generic owned tree container.
//!
//! A [`TreeNode`] owns an ordered list of child nodes and an optional,
//! caller-defined metadata payload. Every node carries a process-unique
//! [`NodeId`] minted by a pluggable [`IdGenerator`]; lookup, insertion,
//! removal and folds are all addressed by that id.
//!
//! ```
//! use nodetree::TreeNode;
//!
//! let mut root = TreeNode::new(Some("root"));
//! let child = TreeNode::new(Some("child"));
//! let child_id = child.id();
//! root.add_node(child);
//!
//! assert_eq!(root.get_parent_node_id(&child_id), Some(root.id()));
//! assert_eq!(root.traverse(|count, _node| count + 1, 0), 2);
//! assert!(root.remove_node_by_id(&child_id));
//! ```

pub mod config;
pub mod domain;
pub mod errors;
pub mod tree_traits;
pub mod util;

pub use config::{IdSettings, IdStrategy, RenderSettings, Settings, SharedIdGenerator};
pub use domain::{IdGenerator, NodeId, RandomIdGenerator, SequentialIdGenerator, TreeNode};
pub use errors::{TreeError, TreeResult};
pub use tree_traits::TreeNodeConvert;
