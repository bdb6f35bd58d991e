//! Flowsheet UI - serialization and workflow layer for process flowsheet models
//!
//! This crate provides the user-interface layer for flowsheet simulation
//! models: block interfaces that declare which model variables a block
//! exports, a flowsheet interface that serializes and loads the whole block
//! tree as a schema-validated JSON document, and a workflow action registry
//! that drives build/solve/results execution in dependency order.

pub mod core;
pub mod ui;
mod tests;

// Re-export commonly used types
pub use crate::core::{
    Block, BlockId, IndexKey, IndexedEntry, ModelBlock, ScalarValue, VarValue, Variable,
};
pub use crate::ui::{
    BlockInterface, FlowsheetError, FlowsheetInterface, InterfaceConfig, InterfaceError,
    InterfaceRegistry, VariableSpec,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
