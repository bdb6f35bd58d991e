//! Workflow action registry
//!
//! Actions are named operations over the flowsheet (build, solve, results,
//! user-defined) arranged in a dependency DAG. Running an action first runs
//! its not-yet-run dependencies depth-first; a successful run invalidates
//! the run status of every action that transitively depends on it.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;

use crate::core::Block;
use crate::ui::flowsheet::FlowsheetInterface;

/// Name of the flowsheet build action
pub const BUILD: &str = "build";
/// Name of the solve action
pub const SOLVE: &str = "solve";
/// Name of the results action
pub const RESULTS: &str = "results";

/// Arguments handed to a registered action function
pub struct ActionContext<'a> {
    /// Root block bound to the flowsheet, once `set_block` has been called
    pub block: Option<Arc<dyn Block>>,
    /// The flowsheet interface running the action
    pub ui: &'a FlowsheetInterface,
    /// Parameters registered with the action
    pub params: &'a Map<String, Value>,
}

/// A registered action function
pub type ActionFn = dyn Fn(ActionContext<'_>) -> anyhow::Result<()> + Send + Sync;

/// Workflow errors
#[derive(Debug, Error)]
pub enum ActionError {
    /// Action name was never registered
    #[error("unknown action '{name}', known actions: [{known}]")]
    UnknownAction { name: String, known: String },

    /// Dependency list names an unregistered action
    #[error("unknown dependency '{dep}' for action '{action}'")]
    UnknownDependency { action: String, dep: String },

    /// Action declared dependent on itself
    #[error("action '{0}' cannot depend on itself")]
    SelfDependency(String),

    /// Dependency edges form a cycle
    #[error("action dependencies form a cycle involving: [{}]", .names.join(", "))]
    DependencyCycle { names: Vec<String> },

    /// Action was run without a registered function
    #[error("no function registered for action '{0}'")]
    NoFunction(String),

    /// The registered function returned an error
    #[error("action '{name}' failed")]
    Failed {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ActionError {
    fn unknown(name: &str, actions: &HashMap<String, ActionEntry>) -> Self {
        let mut known: Vec<&str> = actions.keys().map(String::as_str).collect();
        known.sort_unstable();
        ActionError::UnknownAction {
            name: name.to_string(),
            known: known.join(", "),
        }
    }
}

struct ActionEntry {
    func: Option<Arc<ActionFn>>,
    params: Map<String, Value>,
    deps: Vec<String>,
    has_run: bool,
}

impl ActionEntry {
    fn new(deps: Vec<String>) -> Self {
        Self {
            func: None,
            params: Map::new(),
            deps,
            has_run: false,
        }
    }
}

/// Registry of workflow actions and their run state
///
/// Functions are stored behind `Arc` and cloned out of the lock before they
/// are invoked, so a running action can call back into the flowsheet
/// interface without re-entering the registry lock.
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, ActionEntry>>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the standard workflow chain
    /// `build → solve → results`
    pub fn standard() -> Self {
        let registry = Self::default();
        {
            let mut actions = registry.actions.write();
            actions.insert(BUILD.to_string(), ActionEntry::new(vec![]));
            actions.insert(SOLVE.to_string(), ActionEntry::new(vec![BUILD.to_string()]));
            actions.insert(
                RESULTS.to_string(),
                ActionEntry::new(vec![SOLVE.to_string()]),
            );
        }
        registry
    }

    /// Register a new action type with its dependencies. A no-op when the
    /// name is already known. Dependencies must already be registered, an
    /// action cannot depend on itself, and any dependency cycle is rejected
    /// here so `run_action` can never recurse unboundedly.
    pub fn add_action_type(&self, name: &str, deps: Vec<String>) -> Result<(), ActionError> {
        let mut actions = self.actions.write();
        if actions.contains_key(name) {
            return Ok(());
        }
        for dep in &deps {
            if dep == name {
                return Err(ActionError::SelfDependency(name.to_string()));
            }
            if !actions.contains_key(dep.as_str()) {
                return Err(ActionError::UnknownDependency {
                    action: name.to_string(),
                    dep: dep.clone(),
                });
            }
        }
        if let Some(names) = find_cycle(&actions, name, &deps) {
            return Err(ActionError::DependencyCycle { names });
        }
        actions.insert(name.to_string(), ActionEntry::new(deps));
        Ok(())
    }

    /// Set the function for a registered action
    pub fn set_action<F>(&self, name: &str, func: F) -> Result<(), ActionError>
    where
        F: Fn(ActionContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_action_with(name, func, Map::new())
    }

    /// Set the function and parameters for a registered action
    pub fn set_action_with<F>(
        &self,
        name: &str,
        func: F,
        params: Map<String, Value>,
    ) -> Result<(), ActionError>
    where
        F: Fn(ActionContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut actions = self.actions.write();
        match actions.get_mut(name) {
            Some(entry) => {
                entry.func = Some(Arc::new(func));
                entry.params = params;
                Ok(())
            }
            None => Err(ActionError::unknown(name, &actions)),
        }
    }

    /// Function and parameters registered for `name`
    pub fn get_action(
        &self,
        name: &str,
    ) -> Result<(Option<Arc<ActionFn>>, Map<String, Value>), ActionError> {
        let actions = self.actions.read();
        match actions.get(name) {
            Some(entry) => Ok((entry.func.clone(), entry.params.clone())),
            None => Err(ActionError::unknown(name, &actions)),
        }
    }

    /// Whether an action has run (false for unknown names)
    pub fn was_run(&self, name: &str) -> bool {
        self.actions
            .read()
            .get(name)
            .map(|entry| entry.has_run)
            .unwrap_or(false)
    }

    /// Fail with a lookup error unless `name` is registered
    pub(crate) fn check_known(&self, name: &str) -> Result<(), ActionError> {
        let actions = self.actions.read();
        if actions.contains_key(name) {
            Ok(())
        } else {
            Err(ActionError::unknown(name, &actions))
        }
    }

    /// Dependency list of a registered action
    pub(crate) fn deps_of(&self, name: &str) -> Result<Vec<String>, ActionError> {
        let actions = self.actions.read();
        match actions.get(name) {
            Some(entry) => Ok(entry.deps.clone()),
            None => Err(ActionError::unknown(name, &actions)),
        }
    }

    /// Record a successful run: clear every transitive dependent first,
    /// then mark `name` as run.
    pub(crate) fn mark_run(&self, name: &str) {
        let mut actions = self.actions.write();
        clear_dependents(&mut actions, name);
        if let Some(entry) = actions.get_mut(name) {
            entry.has_run = true;
        }
    }

    /// Clear the run status of `name` and of every transitive dependent
    pub(crate) fn invalidate(&self, name: &str) {
        let mut actions = self.actions.write();
        clear_dependents(&mut actions, name);
        if let Some(entry) = actions.get_mut(name) {
            entry.has_run = false;
        }
    }
}

/// Clear the run status of every action that transitively depends on `name`
fn clear_dependents(actions: &mut HashMap<String, ActionEntry>, name: &str) {
    let mut affected = dependents_of(actions, name);
    while let Some(dependent) = affected.pop() {
        if let Some(entry) = actions.get_mut(&dependent) {
            entry.has_run = false;
        }
        affected.extend(dependents_of(actions, &dependent));
    }
}

/// Actions whose dependency lists name `name` directly
fn dependents_of(actions: &HashMap<String, ActionEntry>, name: &str) -> Vec<String> {
    actions
        .iter()
        .filter(|(_, entry)| entry.deps.iter().any(|dep| dep == name))
        .map(|(action, _)| action.clone())
        .collect()
}

/// Topological check over the dependency graph extended with the candidate
/// action. Returns the names stuck on a cycle, or `None` when the graph is
/// acyclic (Kahn's algorithm).
fn find_cycle(
    actions: &HashMap<String, ActionEntry>,
    candidate: &str,
    candidate_deps: &[String],
) -> Option<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

    in_degree.insert(candidate, 0);
    adjacency.insert(candidate, Vec::new());
    for name in actions.keys() {
        in_degree.insert(name.as_str(), 0);
        adjacency.insert(name.as_str(), Vec::new());
    }

    // Edge from dependency to dependent.
    let edges = actions
        .iter()
        .flat_map(|(name, entry)| entry.deps.iter().map(move |dep| (dep.as_str(), name.as_str())))
        .chain(candidate_deps.iter().map(|dep| (dep.as_str(), candidate)));
    for (dep, dependent) in edges {
        adjacency.entry(dep).or_default().push(dependent);
        *in_degree.entry(dependent).or_default() += 1;
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut visited = 0usize;
    let total = in_degree.len();
    while let Some(node) = queue.pop_front() {
        visited += 1;
        if let Some(neighbors) = adjacency.get(node) {
            for &neighbor in neighbors {
                let degree = in_degree.get_mut(neighbor).expect("neighbor is a node");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(neighbor);
                }
            }
        }
    }

    if visited < total {
        let mut names: Vec<String> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        names.sort_unstable();
        Some(names)
    } else {
        None
    }
}
