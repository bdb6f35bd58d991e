//! User-interface layer
//!
//! Block interfaces, the saved-document schema, the flowsheet interface, and
//! the workflow action registry.

pub mod actions;
pub mod flowsheet;
pub mod interface;
pub mod schema;

pub use self::actions::{ActionContext, ActionError, ActionRegistry};
pub use self::flowsheet::{FlowsheetError, FlowsheetInterface, VarDiff};
pub use self::interface::{
    BlockInterface, InterfaceConfig, InterfaceError, InterfaceRegistry, VariableSpec,
};
pub use self::schema::{
    document_schema, BlockDocument, DocumentSchema, ExportedVariable, RootDocument, SchemaError,
};
