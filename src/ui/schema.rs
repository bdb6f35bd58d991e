//! Saved-document schema
//!
//! Defines the JSON layout used by save/load: the document key constants,
//! the serde document types, and a draft-07 JSON Schema assembled
//! programmatically from the same constants so the schema and the types
//! cannot drift apart.

use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

use crate::core::VarValue;

// ── Document keys ───────────────────────────────────────────────────────────

/// Key for a block or variable name
pub const NAME_KEY: &str = "name";
/// Key for the child block list
pub const BLOCKS_KEY: &str = "blocks";
/// Key for a display name
pub const DISPLAY_KEY: &str = "display_name";
/// Key for a description
pub const DESC_KEY: &str = "description";
/// Key for a block category
pub const CATEGORY_KEY: &str = "category";
/// Key for the exported variable list
pub const VARIABLES_KEY: &str = "variables";
/// Key for a variable value
pub const VALUE_KEY: &str = "value";
/// Key for an index tuple
pub const INDEX_KEY: &str = "index";
/// Key for a units string
pub const UNITS_KEY: &str = "units";

/// Name of the synthetic root node of a saved document
pub const ROOT_NAME: &str = "__root__";

// ── Document types ──────────────────────────────────────────────────────────

/// One exported variable record: current value plus display metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedVariable {
    /// Name of the variable on its block
    pub name: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Units string, present only when the variable carries units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Scalar value or list of index/value pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<VarValue>,
}

/// One block node of a saved document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDocument {
    /// Local block name
    pub name: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Exported variables; absent for bare container nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<ExportedVariable>>,
    /// Child block nodes
    #[serde(default)]
    pub blocks: Vec<BlockDocument>,
}

impl BlockDocument {
    /// Bare container node: an interface-less block kept only so the path
    /// to an interfaced descendant is preserved
    pub fn container(name: impl Into<String>, blocks: Vec<BlockDocument>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            category: None,
            variables: None,
            blocks,
        }
    }
}

/// Root of a saved document
///
/// Carries the fixed name [`ROOT_NAME`], the single exported flowsheet
/// block, and a flattened metadata map of every other top-level key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootDocument {
    /// Always [`ROOT_NAME`] when produced by this crate
    pub name: String,
    /// Top-level blocks; exactly one is required when loading
    pub blocks: Vec<BlockDocument>,
    /// Top-level metadata: every root key other than `name` and `blocks`
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

// ── Schema ──────────────────────────────────────────────────────────────────

/// Build the draft-07 schema for a block document node.
///
/// Assembled from the key constants above rather than a JSON string so the
/// key names used here are the same values the rest of the crate uses.
fn block_schema() -> Value {
    let scalar = json!({
        "oneOf": [
            { "type": "number" },
            { "type": "string" },
        ]
    });
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$ref": "#/$defs/block",
        "$defs": {
            "block": {
                "type": "object",
                "properties": {
                    NAME_KEY: { "type": "string" },
                    DISPLAY_KEY: { "type": "string" },
                    DESC_KEY: { "type": "string" },
                    CATEGORY_KEY: { "type": "string" },
                    VARIABLES_KEY: {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                NAME_KEY: { "type": "string" },
                                DISPLAY_KEY: { "type": "string" },
                                DESC_KEY: { "type": "string" },
                                UNITS_KEY: { "type": "string" },
                                // Scalar form (bare number/string) or the
                                // indexed form (list of index/value pairs).
                                VALUE_KEY: {
                                    "oneOf": [
                                        {
                                            "type": "array",
                                            "items": {
                                                "type": "object",
                                                "properties": {
                                                    INDEX_KEY: {
                                                        "type": "array",
                                                        "items": scalar.clone(),
                                                    },
                                                    VALUE_KEY: scalar.clone(),
                                                    UNITS_KEY: { "type": "string" },
                                                },
                                                "required": [INDEX_KEY, VALUE_KEY],
                                            },
                                        },
                                        { "type": "number" },
                                        { "type": "string" },
                                    ]
                                },
                            },
                            "required": [NAME_KEY],
                        },
                    },
                    BLOCKS_KEY: {
                        "type": "array",
                        "items": { "$ref": "#/$defs/block" },
                    },
                },
                "required": [NAME_KEY, BLOCKS_KEY],
            }
        }
    })
}

/// Input document rejected by the schema
#[derive(Debug, Error)]
#[error("document failed schema validation: {}", .errors.join("; "))]
pub struct SchemaError {
    /// One message per validator diagnostic, with its instance path
    pub errors: Vec<String>,
}

/// Compiled document schema, hiding the validation library
pub struct DocumentSchema {
    compiled: JSONSchema,
}

impl DocumentSchema {
    /// Compile the block document schema
    pub fn new() -> Self {
        let schema = block_schema();
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .expect("block document schema is valid");
        Self { compiled }
    }

    /// Validate a document, collecting every diagnostic
    pub fn validate(&self, document: &Value) -> Result<(), SchemaError> {
        if let Err(errors) = self.compiled.validate(document) {
            let errors = errors
                .map(|e| format!("{} (at instance path \"{}\")", e, e.instance_path))
                .collect();
            return Err(SchemaError { errors });
        }
        Ok(())
    }
}

impl Default for DocumentSchema {
    fn default() -> Self {
        Self::new()
    }
}

static SCHEMA: LazyLock<DocumentSchema> = LazyLock::new(DocumentSchema::new);

/// Shared compiled schema instance
pub fn document_schema() -> &'static DocumentSchema {
    &SCHEMA
}
