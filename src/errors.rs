use thiserror::Error;

use crate::domain::NodeId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Duplicate node id in subtree: {0}")]
    DuplicateId(NodeId),

    #[error("Invalid node id '{input}': {reason}")]
    InvalidId { input: String, reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub type TreeResult<T> = Result<T, TreeError>;
