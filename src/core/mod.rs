//! Core model-tree abstractions
//!
//! This module defines the block capability trait, block identity, the
//! variable value model, and a concrete in-memory model block used by the
//! example flowsheet and the test suite.

pub mod block;
pub mod model;
pub mod variable;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use self::block::Block;
pub use self::model::ModelBlock;
pub use self::variable::{IndexKey, IndexedEntry, ScalarValue, VarValue, Variable};

/// Unique identifier for a model block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub Uuid);

impl BlockId {
    /// Generate a new random block ID
    pub fn new() -> Self {
        BlockId(Uuid::new_v4())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}
