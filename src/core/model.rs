//! Concrete model block
//!
//! `ModelBlock` is a plain in-memory tree node implementing the [`Block`]
//! capability trait. The example flowsheet script and the test suite build
//! their model trees out of it; a real simulation framework would provide
//! its own `Block` implementation instead.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::core::block::Block;
use crate::core::variable::Variable;
use crate::core::BlockId;

/// In-memory model tree node
///
/// Variables and children keep their insertion order, which makes tree walks
/// deterministic. The node is interior-mutable so a tree held behind `Arc`
/// can be grown incrementally while it is being built.
#[derive(Debug)]
pub struct ModelBlock {
    id: BlockId,
    name: String,
    doc: Option<String>,
    variables: RwLock<Vec<Arc<Variable>>>,
    children: RwLock<Vec<Arc<ModelBlock>>>,
}

impl ModelBlock {
    /// Create a new block with the given local name
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: BlockId::new(),
            name: name.into(),
            doc: None,
            variables: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
        })
    }

    /// Create a new block with a documentation string
    pub fn with_doc(name: impl Into<String>, doc: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: BlockId::new(),
            name: name.into(),
            doc: Some(doc.into()),
            variables: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
        })
    }

    /// Add a variable, replacing any existing variable with the same name
    pub fn add_variable(&self, variable: Variable) -> Arc<Variable> {
        let variable = Arc::new(variable);
        let mut variables = self.variables.write();
        match variables.iter_mut().find(|v| v.name() == variable.name()) {
            Some(slot) => *slot = variable.clone(),
            None => variables.push(variable.clone()),
        }
        variable
    }

    /// Add a child block, replacing any existing child with the same name
    pub fn add_child(&self, child: Arc<ModelBlock>) -> Arc<ModelBlock> {
        let mut children = self.children.write();
        match children.iter_mut().find(|c| c.name() == child.name()) {
            Some(slot) => *slot = child.clone(),
            None => children.push(child.clone()),
        }
        child
    }

    /// Create and attach a child block
    pub fn new_child(&self, name: impl Into<String>) -> Arc<ModelBlock> {
        self.add_child(ModelBlock::new(name))
    }

    /// Create and attach a child block with a documentation string
    pub fn new_child_with_doc(
        &self,
        name: impl Into<String>,
        doc: impl Into<String>,
    ) -> Arc<ModelBlock> {
        self.add_child(ModelBlock::with_doc(name, doc))
    }

    /// Snapshot of the block's variables, in insertion order
    pub fn variables(&self) -> Vec<Arc<Variable>> {
        self.variables.read().clone()
    }
}

impl Block for ModelBlock {
    fn id(&self) -> BlockId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    fn variable(&self, name: &str) -> Option<Arc<Variable>> {
        self.variables
            .read()
            .iter()
            .find(|v| v.name() == name)
            .cloned()
    }

    fn child(&self, name: &str) -> Option<Arc<dyn Block>> {
        self.children
            .read()
            .iter()
            .find(|c| c.name() == name)
            .map(|c| Arc::clone(c) as Arc<dyn Block>)
    }

    fn children(&self) -> Vec<Arc<dyn Block>> {
        self.children
            .read()
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn Block>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_ids_are_unique() {
        let a = ModelBlock::new("a");
        let b = ModelBlock::new("b");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_variable_lookup() {
        let block = ModelBlock::new("feed");
        block.add_variable(Variable::scalar("flow_vol", 0.033).with_units("m^3/s"));

        let var = block.variable("flow_vol").expect("variable should exist");
        assert_eq!(var.units(), Some("m^3/s"));
        assert!(block.variable("missing").is_none());
    }

    #[test]
    fn test_child_lookup_and_order() {
        let fs = ModelBlock::new("fs");
        fs.new_child("feed");
        fs.new_child("P1");
        fs.new_child("nanofiltration");

        let names: Vec<String> = fs
            .children()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["feed", "P1", "nanofiltration"]);

        assert!(fs.child("P1").is_some());
        assert!(fs.child("p1").is_none());
    }

    #[test]
    fn test_add_variable_replaces_same_name() {
        let block = ModelBlock::new("feed");
        block.add_variable(Variable::scalar("flow_vol", 1.0));
        block.add_variable(Variable::scalar("flow_vol", 2.0));

        assert_eq!(block.variables().len(), 1);
        let value = block.variable("flow_vol").unwrap().value();
        assert_eq!(value.as_scalar().and_then(|s| s.as_f64()), Some(2.0));
    }

    #[test]
    fn test_doc_string() {
        let block = ModelBlock::with_doc("fs", "Treatment train");
        assert_eq!(block.doc(), Some("Treatment train"));
        assert!(ModelBlock::new("bare").doc().is_none());
    }
}
