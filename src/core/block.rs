//! Block capability trait
//!
//! A block is a node in the simulation model tree, owned by the surrounding
//! model framework. The UI layer only needs to look things up by name:
//! variables, child blocks, and the list of children in a stable order. Any
//! block-like type that can answer those lookups can be decorated with an
//! interface; there is no reflection involved.

use std::sync::Arc;

use crate::core::variable::Variable;
use crate::core::BlockId;

/// Capability interface that a model block must satisfy
pub trait Block: Send + Sync {
    /// Stable identity of the block; key for the interface side-table
    fn id(&self) -> BlockId;

    /// Local name of the block within its parent
    fn name(&self) -> &str;

    /// Documentation string, if the model framework provides one
    fn doc(&self) -> Option<&str> {
        None
    }

    /// Look up a variable by name
    fn variable(&self, name: &str) -> Option<Arc<Variable>>;

    /// Look up a child block by name
    fn child(&self, name: &str) -> Option<Arc<dyn Block>>;

    /// Child blocks, in a deterministic order
    fn children(&self) -> Vec<Arc<dyn Block>>;
}
