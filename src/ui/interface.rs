//! Block interfaces and the interface side-table
//!
//! A `BlockInterface` records which variables a model block exports to the
//! UI, along with display metadata. Interfaces live in an
//! `InterfaceRegistry`, a side-table keyed by block identity, so model
//! blocks never carry UI state themselves and reusing a block in another
//! tree cannot leak interfaces across flowsheets.

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::core::{Block, BlockId, VarValue};
use crate::ui::schema::ExportedVariable;

// ── Errors ──────────────────────────────────────────────────────────────────

/// Declaration-time export errors
///
/// Raised when an interface is attached, never deferred to export time.
#[derive(Debug, Error)]
pub enum InterfaceError {
    /// Declared name does not exist on the block at all
    #[error("cannot export '{attr}' from block '{block}': no such attribute")]
    NoSuchVariable { block: String, attr: String },

    /// Declared name resolves to a child block, not a variable
    #[error("cannot export '{attr}' from block '{block}': not a variable")]
    NotAVariable { block: String, attr: String },
}

// ── Export declarations ─────────────────────────────────────────────────────

/// Declaration of one exported variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Name of the variable on the block
    pub name: String,
    /// Display-name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Units override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl VariableSpec {
    /// Declare a variable by name, with no overrides
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            units: None,
        }
    }

    /// Set the display-name override
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the description override
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the units override
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
}

/// Configuration map for a block interface
///
/// Unset options fall back to defaults at attach time: display name from the
/// block name, description from the block doc string (or `"none"`), category
/// `"default"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Display name for the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description for the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category for the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Ordered variable-export declarations. Deserializes from either a
    /// sequence of names (or spec objects) or a mapping of name to
    /// overrides.
    #[serde(
        default,
        deserialize_with = "deserialize_variables",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub variables: Vec<VariableSpec>,
}

impl InterfaceConfig {
    /// Empty configuration; everything defaults at attach time
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Declare an exported variable by name
    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variables.push(VariableSpec::new(name));
        self
    }

    /// Declare an exported variable with overrides
    pub fn with_variable_spec(mut self, spec: VariableSpec) -> Self {
        self.variables.push(spec);
        self
    }
}

fn deserialize_variables<'de, D>(deserializer: D) -> Result<Vec<VariableSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Overrides {
        #[serde(default)]
        display_name: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        units: Option<String>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Name(String),
        Spec(VariableSpec),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decls {
        Sequence(Vec<Entry>),
        Table(serde_json::Map<String, Value>),
    }

    match Decls::deserialize(deserializer)? {
        Decls::Sequence(entries) => Ok(entries
            .into_iter()
            .map(|entry| match entry {
                Entry::Name(name) => VariableSpec::new(name),
                Entry::Spec(spec) => spec,
            })
            .collect()),
        Decls::Table(table) => {
            let mut specs = Vec::with_capacity(table.len());
            for (name, overrides) in table {
                let mut spec = VariableSpec::new(name);
                if !overrides.is_null() {
                    let overrides: Overrides =
                        serde_json::from_value(overrides).map_err(serde::de::Error::custom)?;
                    spec.display_name = overrides.display_name;
                    spec.description = overrides.description;
                    spec.units = overrides.units;
                }
                specs.push(spec);
            }
            Ok(specs)
        }
    }
}

// ── Block interface ─────────────────────────────────────────────────────────

/// Export/display metadata attached to one model block
pub struct BlockInterface {
    block: Arc<dyn Block>,
    display_name: String,
    description: String,
    category: String,
    variables: Vec<VariableSpec>,
}

impl BlockInterface {
    /// Build an interface for `block`, applying option defaults and
    /// validating every declared variable against the block.
    pub fn new(block: Arc<dyn Block>, config: InterfaceConfig) -> Result<Self, InterfaceError> {
        for spec in &config.variables {
            validate_export_var(block.as_ref(), &spec.name)?;
        }
        let display_name = config
            .display_name
            .unwrap_or_else(|| block.name().to_string());
        let description = config
            .description
            .or_else(|| block.doc().map(str::to_string))
            .unwrap_or_else(|| "none".to_string());
        let category = config.category.unwrap_or_else(|| "default".to_string());
        Ok(Self {
            block,
            display_name,
            description,
            category,
            variables: config.variables,
        })
    }

    /// The block this interface is attached to
    pub fn block(&self) -> &Arc<dyn Block> {
        &self.block
    }

    /// Display name of the block
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Description of the block
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Category of the block
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The variable-export declarations, in declaration order
    pub fn variable_specs(&self) -> &[VariableSpec] {
        &self.variables
    }

    /// Exported variable records, computed from current block state at each
    /// call. The iterator is lazy and restartable; nothing is cached, so two
    /// passes after a value change yield different records.
    pub fn exported_variables(&self) -> impl Iterator<Item = ExportedVariable> + '_ {
        self.variables.iter().map(move |spec| self.export_one(spec))
    }

    fn export_one(&self, spec: &VariableSpec) -> ExportedVariable {
        // Declarations are validated at attach time, so the lookup only
        // fails if the model tree was mutated underneath the interface.
        let variable = self.block.variable(&spec.name);
        let display_name = spec
            .display_name
            .clone()
            .or_else(|| variable.as_ref().map(|v| v.name().to_string()))
            .unwrap_or_else(|| spec.name.clone());
        let description = spec
            .description
            .clone()
            .or_else(|| variable.as_ref().and_then(|v| v.doc().map(str::to_string)))
            .unwrap_or_else(|| format!("{} variable", display_name));
        let units = spec
            .units
            .clone()
            .or_else(|| variable.as_ref().and_then(|v| v.units().map(str::to_string)));
        ExportedVariable {
            name: spec.name.clone(),
            display_name: Some(display_name),
            description: Some(description),
            units,
            value: variable.map(|v| v.value()),
        }
    }

    /// Apply document variable values to the block. Only stored values are
    /// modified; display metadata and units are left alone. Returns the
    /// names present in the document but not declared here ("missing") and
    /// the declared names the document did not mention ("extra").
    pub fn apply_variables(&self, variables: &[ExportedVariable]) -> (Vec<String>, Vec<String>) {
        let mut extra: Vec<String> = self.variables.iter().map(|s| s.name.clone()).collect();
        let mut missing = Vec::new();
        for record in variables {
            match extra.iter().position(|name| *name == record.name) {
                Some(pos) => {
                    extra.remove(pos);
                }
                None => {
                    missing.push(record.name.clone());
                    continue;
                }
            }
            let value = match &record.value {
                Some(value) => value,
                None => continue,
            };
            if let Some(variable) = self.block.variable(&record.name) {
                match value {
                    // Scalars are replaced wholesale.
                    VarValue::Scalar(scalar) => variable.set_value(VarValue::Scalar(scalar.clone())),
                    // Indexed entries are matched by exact index tuple.
                    VarValue::Indexed(entries) => {
                        for entry in entries {
                            variable.set_index(&entry.index, entry.value.clone());
                        }
                    }
                }
            }
        }
        (missing, extra)
    }
}

impl fmt::Debug for BlockInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockInterface")
            .field("block", &self.block.name())
            .field("display_name", &self.display_name)
            .field("category", &self.category)
            .field("variables", &self.variables)
            .finish()
    }
}

fn validate_export_var(block: &dyn Block, name: &str) -> Result<(), InterfaceError> {
    if block.variable(name).is_some() {
        return Ok(());
    }
    if block.child(name).is_some() {
        return Err(InterfaceError::NotAVariable {
            block: block.name().to_string(),
            attr: name.to_string(),
        });
    }
    Err(InterfaceError::NoSuchVariable {
        block: block.name().to_string(),
        attr: name.to_string(),
    })
}

// ── Interface registry ──────────────────────────────────────────────────────

/// Side-table mapping block identity to its attached interface
///
/// Clones share the same underlying table. The registry is owned by its
/// flowsheet interface, so its lifetime ends with the flowsheet's.
#[derive(Clone, Default)]
pub struct InterfaceRegistry {
    interfaces: Arc<RwLock<HashMap<BlockId, Arc<BlockInterface>>>>,
}

impl InterfaceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new interface built from `config` to `block`, replacing any
    /// previously attached interface.
    pub fn set_block_interface(
        &self,
        block: Arc<dyn Block>,
        config: InterfaceConfig,
    ) -> Result<Arc<BlockInterface>, InterfaceError> {
        let interface = Arc::new(BlockInterface::new(block, config)?);
        self.insert(interface.clone());
        Ok(interface)
    }

    /// Register an existing interface under its block's identity
    pub fn insert(&self, interface: Arc<BlockInterface>) {
        self.interfaces
            .write()
            .insert(interface.block().id(), interface);
    }

    /// Retrieve the interface attached to `block`, if any
    pub fn get_block_interface(&self, block: &dyn Block) -> Option<Arc<BlockInterface>> {
        self.interfaces.read().get(&block.id()).cloned()
    }

    /// Convenience constructor: declare `variables` as plain names on top of
    /// `config` and attach the resulting interface to `block`.
    pub fn export_variables<'a>(
        &self,
        block: Arc<dyn Block>,
        variables: impl IntoIterator<Item = &'a str>,
        config: InterfaceConfig,
    ) -> Result<Arc<BlockInterface>, InterfaceError> {
        let mut config = config;
        for name in variables {
            config.variables.push(VariableSpec::new(name));
        }
        self.set_block_interface(block, config)
    }

    /// Detach and return the interface for `block`, if any
    pub fn remove(&self, block: &dyn Block) -> Option<Arc<BlockInterface>> {
        self.interfaces.write().remove(&block.id())
    }

    /// Whether `block` has an attached interface
    pub fn contains(&self, block: &dyn Block) -> bool {
        self.interfaces.read().contains_key(&block.id())
    }

    /// Number of attached interfaces
    pub fn len(&self) -> usize {
        self.interfaces.read().len()
    }

    /// Whether no interface is attached
    pub fn is_empty(&self) -> bool {
        self.interfaces.read().is_empty()
    }

    /// Detach all interfaces
    pub fn clear(&self) {
        self.interfaces.write().clear();
    }
}
