//! Flowsheet interface
//!
//! The root object for a whole model tree: binds the root block, exports the
//! tree as a schema-validated document, loads documents back into the live
//! tree (recording missing/extra variables along the way), and drives the
//! workflow action registry.

use log::{debug, info};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::core::Block;
use crate::ui::actions::{ActionContext, ActionError, ActionFn, ActionRegistry, SOLVE};
use crate::ui::interface::{InterfaceConfig, InterfaceError, InterfaceRegistry};
use crate::ui::schema::{document_schema, BlockDocument, RootDocument, SchemaError, ROOT_NAME};

/// Errors from flowsheet serialization and loading
#[derive(Debug, Error)]
pub enum FlowsheetError {
    /// Input document rejected by the schema validator
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Document could not be parsed or serialized
    #[error("invalid document: {0}")]
    Document(#[from] serde_json::Error),

    /// Declaration failure while attaching the root interface
    #[error(transparent)]
    Interface(#[from] InterfaceError),

    /// The document must contain exactly one top-level block
    #[error("expected exactly one top-level block, got {count}: [{}]", .names.join(", "))]
    TopLevelBlocks { count: usize, names: Vec<String> },

    /// A document block names a child the live tree does not have
    #[error("no child block named '{name}' under '{path}'")]
    BlockNotFound { path: String, name: String },

    /// No root block has been bound with `set_block`
    #[error("no flowsheet block has been set")]
    NoBlock,

    /// Variable diffs are recorded by `update`; nothing has been loaded yet
    #[error("variable differences are not available before a document is loaded")]
    NotLoaded,

    /// File could not be opened or used
    #[error("flowsheet file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Missing/extra variables recorded by the last `update`, keyed by the
/// dot-joined block path from the root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarDiff {
    /// Document variables not declared on the corresponding interface
    pub missing: BTreeMap<String, Vec<String>>,
    /// Declared variables the document did not mention
    pub extra: BTreeMap<String, Vec<String>>,
}

/// Root interface for a flowsheet model tree
///
/// Constructed from options only; the root model block is bound later with
/// [`set_block`](FlowsheetInterface::set_block) once the flowsheet has been
/// built.
pub struct FlowsheetInterface {
    config: InterfaceConfig,
    interfaces: InterfaceRegistry,
    actions: ActionRegistry,
    block: RwLock<Option<Arc<dyn Block>>>,
    meta: RwLock<Map<String, Value>>,
    var_diff: RwLock<Option<VarDiff>>,
}

impl FlowsheetInterface {
    /// Create an unbound flowsheet interface from options
    pub fn new(config: InterfaceConfig) -> Self {
        Self {
            config,
            interfaces: InterfaceRegistry::new(),
            actions: ActionRegistry::standard(),
            block: RwLock::new(None),
            meta: RwLock::new(Map::new()),
            var_diff: RwLock::new(None),
        }
    }

    /// The interface side-table for this flowsheet
    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.interfaces
    }

    /// Bind the root model block, attaching an interface built from the
    /// construction options. Declared variables are validated here.
    pub fn set_block(&self, block: Arc<dyn Block>) -> Result<(), InterfaceError> {
        self.interfaces
            .set_block_interface(block.clone(), self.config.clone())?;
        *self.block.write() = Some(block);
        Ok(())
    }

    /// The bound root block, if any
    pub fn block(&self) -> Option<Arc<dyn Block>> {
        self.block.read().clone()
    }

    // ── Export ──────────────────────────────────────────────────────────

    /// Serialize the current state of the block tree as a document
    ///
    /// Walks the tree depth-first. Blocks with an attached interface emit
    /// full nodes with freshly computed variable records; interface-less
    /// blocks survive only as bare containers on the path to an interfaced
    /// descendant.
    pub fn as_document(&self) -> Result<RootDocument, FlowsheetError> {
        let root = self.block().ok_or(FlowsheetError::NoBlock)?;
        debug!("exporting flowsheet document from block '{}'", root.name());
        let blocks = self.export_block(root.as_ref()).into_iter().collect();
        Ok(RootDocument {
            name: ROOT_NAME.to_string(),
            blocks,
            meta: self.meta.read().clone(),
        })
    }

    fn export_block(&self, block: &dyn Block) -> Option<BlockDocument> {
        let children: Vec<BlockDocument> = block
            .children()
            .iter()
            .filter_map(|child| self.export_block(child.as_ref()))
            .collect();
        match self.interfaces.get_block_interface(block) {
            Some(interface) => Some(BlockDocument {
                name: block.name().to_string(),
                display_name: Some(interface.display_name().to_string()),
                description: Some(interface.description().to_string()),
                category: Some(interface.category().to_string()),
                variables: Some(interface.exported_variables().collect()),
                blocks: children,
            }),
            None if !children.is_empty() => {
                Some(BlockDocument::container(block.name(), children))
            }
            None => None,
        }
    }

    /// Save the current state as UTF-8 JSON to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FlowsheetError> {
        let file = File::create(path.as_ref())?;
        self.save_to(BufWriter::new(file))?;
        debug!("saved flowsheet document to {}", path.as_ref().display());
        Ok(())
    }

    /// Serialize the current state into a writer
    pub fn save_to<W: Write>(&self, writer: W) -> Result<(), FlowsheetError> {
        let document = self.as_document()?;
        serde_json::to_writer_pretty(writer, &document)?;
        Ok(())
    }

    // ── Import ──────────────────────────────────────────────────────────

    /// Load a document from `path` and apply it with [`update`](Self::update)
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), FlowsheetError> {
        let file = File::open(path.as_ref())?;
        debug!("loading flowsheet document from {}", path.as_ref().display());
        self.load_from(BufReader::new(file))
    }

    /// Read a document from a reader and apply it with
    /// [`update`](Self::update)
    pub fn load_from<R: Read>(&self, reader: R) -> Result<(), FlowsheetError> {
        let data: Value = serde_json::from_reader(reader)?;
        self.update(&data)
    }

    /// Apply a document to the live tree
    ///
    /// The document is validated against the schema before anything is
    /// touched. Variables are then applied block by block, recording
    /// missing/extra names for [`get_var_missing`](Self::get_var_missing)
    /// and [`get_var_extra`](Self::get_var_extra). A document child with no
    /// matching live block aborts the walk; values applied before that
    /// point are not rolled back. On success the top-level metadata is
    /// replaced and the run status of the `solve` action (and everything
    /// depending on it) is cleared: new data invalidates an old solve, not
    /// the build.
    pub fn update(&self, data: &Value) -> Result<(), FlowsheetError> {
        document_schema().validate(data)?;
        let document: RootDocument = serde_json::from_value(data.clone())?;
        if document.blocks.len() != 1 {
            return Err(FlowsheetError::TopLevelBlocks {
                count: document.blocks.len(),
                names: document.blocks.iter().map(|b| b.name.clone()).collect(),
            });
        }
        let root = self.block().ok_or(FlowsheetError::NoBlock)?;
        let mut diff = VarDiff::default();
        self.apply_block(&document.blocks[0], root.as_ref(), None, &mut diff)?;
        *self.var_diff.write() = Some(diff);
        *self.meta.write() = document.meta;
        if self.actions.was_run(SOLVE) {
            info!("clearing run status of '{}' after loading new data", SOLVE);
        }
        self.actions.invalidate(SOLVE);
        Ok(())
    }

    fn apply_block(
        &self,
        document: &BlockDocument,
        block: &dyn Block,
        parent_path: Option<&str>,
        diff: &mut VarDiff,
    ) -> Result<(), FlowsheetError> {
        let path = match parent_path {
            Some(parent) => format!("{}.{}", parent, block.name()),
            None => block.name().to_string(),
        };
        match self.interfaces.get_block_interface(block) {
            Some(interface) => match &document.variables {
                Some(variables) => {
                    let (missing, extra) = interface.apply_variables(variables);
                    if !missing.is_empty() {
                        diff.missing.insert(path.clone(), missing);
                    }
                    if !extra.is_empty() {
                        diff.extra.insert(path.clone(), extra);
                    }
                }
                // No variables in the document: everything declared on the
                // interface is extra.
                None => {
                    let declared: Vec<String> = interface
                        .variable_specs()
                        .iter()
                        .map(|spec| spec.name.clone())
                        .collect();
                    if !declared.is_empty() {
                        diff.extra.insert(path.clone(), declared);
                    }
                }
            },
            // No interface on the live block: every document variable is
            // missing.
            None => {
                if let Some(variables) = &document.variables {
                    if !variables.is_empty() {
                        diff.missing.insert(
                            path.clone(),
                            variables.iter().map(|v| v.name.clone()).collect(),
                        );
                    }
                }
            }
        }
        for sub in &document.blocks {
            let child = block
                .child(&sub.name)
                .ok_or_else(|| FlowsheetError::BlockNotFound {
                    path: path.clone(),
                    name: sub.name.clone(),
                })?;
            self.apply_block(sub, child.as_ref(), Some(&path), diff)?;
        }
        Ok(())
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    /// Variables present in the last loaded document but not declared on
    /// the corresponding block interface, keyed by block path
    pub fn get_var_missing(&self) -> Result<BTreeMap<String, Vec<String>>, FlowsheetError> {
        self.var_diff
            .read()
            .as_ref()
            .map(|diff| diff.missing.clone())
            .ok_or(FlowsheetError::NotLoaded)
    }

    /// Declared interface variables the last loaded document did not
    /// mention, keyed by block path
    pub fn get_var_extra(&self) -> Result<BTreeMap<String, Vec<String>>, FlowsheetError> {
        self.var_diff
            .read()
            .as_ref()
            .map(|diff| diff.extra.clone())
            .ok_or(FlowsheetError::NotLoaded)
    }

    // ── Metadata ────────────────────────────────────────────────────────

    /// Snapshot of the top-level metadata map
    pub fn meta(&self) -> Map<String, Value> {
        self.meta.read().clone()
    }

    /// Set one top-level metadata entry, included in the next export
    pub fn set_meta(&self, key: impl Into<String>, value: Value) {
        self.meta.write().insert(key.into(), value);
    }

    // ── Actions ─────────────────────────────────────────────────────────

    /// Register a new action type with its dependencies
    pub fn add_action_type(&self, name: &str, deps: Vec<String>) -> Result<(), ActionError> {
        self.actions.add_action_type(name, deps)
    }

    /// Set the function to call for a named action
    pub fn set_action<F>(&self, name: &str, func: F) -> Result<(), ActionError>
    where
        F: Fn(ActionContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.actions.set_action(name, func)
    }

    /// Set the function and parameters to call for a named action
    pub fn set_action_with<F>(
        &self,
        name: &str,
        func: F,
        params: Map<String, Value>,
    ) -> Result<(), ActionError>
    where
        F: Fn(ActionContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.actions.set_action_with(name, func, params)
    }

    /// Function and parameters registered for a named action
    pub fn get_action(
        &self,
        name: &str,
    ) -> Result<(Option<Arc<ActionFn>>, Map<String, Value>), ActionError> {
        self.actions.get_action(name)
    }

    /// Whether an action has run since it was last invalidated
    pub fn action_was_run(&self, name: &str) -> bool {
        self.actions.was_run(name)
    }

    #[cfg(test)]
    pub(crate) fn action_registry(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Run the named action
    ///
    /// Already-run actions are an idempotent no-op. Otherwise every
    /// not-yet-run dependency is run first, depth-first in declaration
    /// order, then the registered function is invoked with the bound block,
    /// this interface, and the registered parameters. A successful run
    /// invalidates every transitive dependent.
    pub fn run_action(&self, name: &str) -> Result<(), ActionError> {
        self.actions.check_known(name)?;
        if self.actions.was_run(name) {
            info!("skipping duplicate run of action '{}'", name);
            return Ok(());
        }
        for dep in self.actions.deps_of(name)? {
            if !self.actions.was_run(&dep) {
                debug!("running dependency '{}' of action '{}'", dep, name);
                self.run_action(&dep)?;
            }
        }
        let (func, params) = self.actions.get_action(name)?;
        let func = func.ok_or_else(|| ActionError::NoFunction(name.to_string()))?;
        debug!("running action '{}'", name);
        func(ActionContext {
            block: self.block(),
            ui: self,
            params: &params,
        })
        .map_err(|source| ActionError::Failed {
            name: name.to_string(),
            source,
        })?;
        self.actions.mark_run(name);
        Ok(())
    }
}

impl Default for FlowsheetInterface {
    fn default() -> Self {
        Self::new(InterfaceConfig::default())
    }
}
