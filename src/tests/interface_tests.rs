//! Block interface and registry tests

use serde_json::json;

use crate::core::{Block, IndexedEntry, ModelBlock, ScalarValue, VarValue, Variable};
use crate::tests::support::comp_key;
use crate::ui::interface::{InterfaceConfig, InterfaceError, InterfaceRegistry, VariableSpec};

fn feed_block() -> std::sync::Arc<ModelBlock> {
    let feed = ModelBlock::with_doc("feed", "Influent feed");
    feed.add_variable(
        Variable::scalar("flow_vol", 0.033)
            .with_units("m^3/s")
            .with_doc("Volumetric feed flow rate"),
    );
    feed.add_variable(Variable::indexed(
        "conc_mass_comp",
        vec![
            IndexedEntry::new(comp_key(0.0, "dye"), 1.2.into()),
            IndexedEntry::new(comp_key(1.0, "tds"), 3.4.into()),
        ],
    ));
    feed
}

#[test]
fn test_attach_defaults_from_block() {
    let feed = feed_block();
    let registry = InterfaceRegistry::new();

    let interface = registry
        .set_block_interface(feed, InterfaceConfig::new())
        .unwrap();

    assert_eq!(interface.display_name(), "feed");
    assert_eq!(interface.description(), "Influent feed");
    assert_eq!(interface.category(), "default");
}

#[test]
fn test_attach_defaults_without_doc() {
    let bare = ModelBlock::new("bare");
    let registry = InterfaceRegistry::new();

    let interface = registry
        .set_block_interface(bare, InterfaceConfig::new())
        .unwrap();

    assert_eq!(interface.description(), "none");
}

#[test]
fn test_attach_with_overrides() {
    let feed = feed_block();
    let registry = InterfaceRegistry::new();

    let interface = registry
        .set_block_interface(
            feed,
            InterfaceConfig::new()
                .with_display_name("Feed")
                .with_description("Dye-laden influent")
                .with_category("feed"),
        )
        .unwrap();

    assert_eq!(interface.display_name(), "Feed");
    assert_eq!(interface.description(), "Dye-laden influent");
    assert_eq!(interface.category(), "feed");
}

#[test]
fn test_declaring_unknown_attribute_fails_at_attach() {
    let feed = feed_block();
    let registry = InterfaceRegistry::new();

    let result = registry.set_block_interface(
        feed.clone(),
        InterfaceConfig::new().with_variable("no_such_var"),
    );

    assert!(matches!(
        result.unwrap_err(),
        InterfaceError::NoSuchVariable { .. }
    ));
    // Nothing is registered on failure.
    assert!(!registry.contains(feed.as_ref()));
}

#[test]
fn test_declaring_child_block_fails_as_non_variable() {
    let fs = ModelBlock::new("fs");
    fs.new_child("feed");
    let registry = InterfaceRegistry::new();

    let result =
        registry.set_block_interface(fs, InterfaceConfig::new().with_variable("feed"));

    assert!(matches!(
        result.unwrap_err(),
        InterfaceError::NotAVariable { .. }
    ));
}

#[test]
fn test_export_records_follow_live_values() {
    let feed = feed_block();
    let registry = InterfaceRegistry::new();
    let interface = registry
        .export_variables(feed.clone(), ["flow_vol"], InterfaceConfig::new())
        .unwrap();

    let first: Vec<_> = interface.exported_variables().collect();
    assert_eq!(
        first[0].value,
        Some(VarValue::Scalar(ScalarValue::Number(0.033)))
    );

    feed.variable("flow_vol").unwrap().set_scalar(0.05);

    // Records are recomputed on every pass; nothing is cached.
    let second: Vec<_> = interface.exported_variables().collect();
    assert_eq!(
        second[0].value,
        Some(VarValue::Scalar(ScalarValue::Number(0.05)))
    );
}

#[test]
fn test_export_record_defaults() {
    let feed = feed_block();
    let registry = InterfaceRegistry::new();
    let interface = registry
        .export_variables(
            feed,
            ["flow_vol", "conc_mass_comp"],
            InterfaceConfig::new(),
        )
        .unwrap();

    let records: Vec<_> = interface.exported_variables().collect();

    // Display name defaults to the variable name, description to the
    // variable doc string, units to the variable units.
    assert_eq!(records[0].display_name.as_deref(), Some("flow_vol"));
    assert_eq!(
        records[0].description.as_deref(),
        Some("Volumetric feed flow rate")
    );
    assert_eq!(records[0].units.as_deref(), Some("m^3/s"));

    // Without a doc string the description falls back to "<name> variable";
    // without units the key is absent.
    assert_eq!(
        records[1].description.as_deref(),
        Some("conc_mass_comp variable")
    );
    assert!(records[1].units.is_none());
}

#[test]
fn test_export_record_overrides() {
    let feed = feed_block();
    let registry = InterfaceRegistry::new();
    let interface = registry
        .set_block_interface(
            feed,
            InterfaceConfig::new().with_variable_spec(
                VariableSpec::new("flow_vol")
                    .with_display_name("Feed flow")
                    .with_description("Volumetric flow into the train")
                    .with_units("m3 hr-1"),
            ),
        )
        .unwrap();

    let records: Vec<_> = interface.exported_variables().collect();
    assert_eq!(records[0].display_name.as_deref(), Some("Feed flow"));
    assert_eq!(
        records[0].description.as_deref(),
        Some("Volumetric flow into the train")
    );
    assert_eq!(records[0].units.as_deref(), Some("m3 hr-1"));
}

#[test]
fn test_indexed_export_yields_exact_pair_set() {
    let feed = feed_block();
    let registry = InterfaceRegistry::new();
    let interface = registry
        .export_variables(feed, ["conc_mass_comp"], InterfaceConfig::new())
        .unwrap();

    let record = interface.exported_variables().next().unwrap();
    let value = record.value.unwrap();
    let entries = value.as_indexed().unwrap();

    assert_eq!(entries.len(), 2);
    // Order-independent: both pairs are present, and nothing else.
    assert!(entries
        .iter()
        .any(|e| e.index == comp_key(0.0, "dye") && e.value == ScalarValue::Number(1.2)));
    assert!(entries
        .iter()
        .any(|e| e.index == comp_key(1.0, "tds") && e.value == ScalarValue::Number(3.4)));
}

#[test]
fn test_reattach_replaces_interface() {
    let feed = feed_block();
    let registry = InterfaceRegistry::new();

    registry
        .set_block_interface(
            feed.clone(),
            InterfaceConfig::new().with_display_name("First"),
        )
        .unwrap();
    registry
        .set_block_interface(
            feed.clone(),
            InterfaceConfig::new().with_display_name("Second"),
        )
        .unwrap();

    let interface = registry.get_block_interface(feed.as_ref()).unwrap();
    assert_eq!(interface.display_name(), "Second");
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_registry_remove_and_clear() {
    let feed = feed_block();
    let other = ModelBlock::new("other");
    let registry = InterfaceRegistry::new();

    registry
        .set_block_interface(feed.clone(), InterfaceConfig::new())
        .unwrap();
    registry
        .set_block_interface(other.clone(), InterfaceConfig::new())
        .unwrap();
    assert_eq!(registry.len(), 2);

    let removed = registry.remove(feed.as_ref());
    assert!(removed.is_some());
    assert!(!registry.contains(feed.as_ref()));
    assert!(registry.contains(other.as_ref()));

    registry.clear();
    assert!(registry.is_empty());
}

#[test]
fn test_config_deserializes_name_sequence() {
    let config: InterfaceConfig = serde_json::from_value(json!({
        "display_name": "Feed",
        "variables": ["flow_vol", "conc_mass_comp"],
    }))
    .unwrap();

    assert_eq!(config.display_name.as_deref(), Some("Feed"));
    assert_eq!(config.variables.len(), 2);
    assert_eq!(config.variables[0], VariableSpec::new("flow_vol"));
    assert_eq!(config.variables[1], VariableSpec::new("conc_mass_comp"));
}

#[test]
fn test_config_deserializes_override_table() {
    let config: InterfaceConfig = serde_json::from_value(json!({
        "variables": {
            "flow_vol": { "display_name": "Feed flow", "units": "m^3/s" },
            "recovery_vol": null,
        },
    }))
    .unwrap();

    assert_eq!(config.variables.len(), 2);
    let flow = config
        .variables
        .iter()
        .find(|spec| spec.name == "flow_vol")
        .unwrap();
    assert_eq!(flow.display_name.as_deref(), Some("Feed flow"));
    assert_eq!(flow.units.as_deref(), Some("m^3/s"));
    let recovery = config
        .variables
        .iter()
        .find(|spec| spec.name == "recovery_vol")
        .unwrap();
    assert!(recovery.display_name.is_none());
}

#[test]
fn test_config_deserializes_spec_objects() {
    let config: InterfaceConfig = serde_json::from_value(json!({
        "variables": [
            { "name": "flow_vol", "description": "Feed flow" },
            "recovery_vol",
        ],
    }))
    .unwrap();

    assert_eq!(config.variables.len(), 2);
    assert_eq!(config.variables[0].description.as_deref(), Some("Feed flow"));
    assert_eq!(config.variables[1].name, "recovery_vol");
}
