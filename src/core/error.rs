use thiserror::Error;

use crate::core::types::{ConnectionId, NodeId};

#[derive(Error, Debug)]
pub enum GridError {
    #[error("line endpoints must be distinct nodes: {0:?}")]
    SelfLoop(NodeId),

    #[error("a line already joins these termini: {0:?}")]
    DuplicateLine(ConnectionId),

    #[error("node not found: {0:?}")]
    NodeMissing(NodeId),

    #[error("actor channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, GridError>;
