use std::fmt;

use thiserror::Error;

use crate::pool::tree::TreeViolation;

/// The arena a failed allocation was directed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArenaKind {
    StringRecords,
    TreeNodes,
    StringBytes,
}

impl fmt::Display for ArenaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StringRecords => "string record",
            Self::TreeNodes => "tree node",
            Self::StringBytes => "string byte",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("{arena} arena exhausted: all {max_pages} pages in use")]
    AllocationExhausted { arena: ArenaKind, max_pages: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Bucket {bucket} is corrupt: {violation}")]
    CorruptTree {
        bucket: usize,
        violation: TreeViolation,
    },
}

impl PoolError {
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::AllocationExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
