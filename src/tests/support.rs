//! Shared fixtures for the test suites

use std::sync::Arc;

use crate::core::{Block, IndexKey, IndexedEntry, ModelBlock, ScalarValue, Variable};
use crate::ui::flowsheet::FlowsheetInterface;
use crate::ui::interface::InterfaceConfig;

/// Index key `(n, component)` as used by the treatment-train fixtures
pub(crate) fn comp_key(n: f64, component: &str) -> IndexKey {
    IndexKey(vec![n.into(), component.into()])
}

/// Scalar f64 view of a block variable
pub(crate) fn scalar_of(block: &dyn Block, name: &str) -> f64 {
    block
        .variable(name)
        .expect("variable exists")
        .value()
        .as_scalar()
        .and_then(ScalarValue::as_f64)
        .expect("scalar number")
}

/// Small treatment-train model tree:
///
/// ```text
/// fs
/// ├── feed          (interfaced: flow_vol, conc_mass_comp)
/// ├── stage         (no interface)
/// │   └── membrane  (interfaced: recovery_vol)
/// └── junk          (no interface, no interfaced descendants)
/// ```
pub(crate) fn sample_tree() -> Arc<ModelBlock> {
    let fs = ModelBlock::with_doc("fs", "Treatment train");

    let feed = fs.new_child_with_doc("feed", "Influent feed");
    feed.add_variable(
        Variable::scalar("flow_vol", 0.033)
            .with_units("m^3/s")
            .with_doc("Volumetric feed flow rate"),
    );
    feed.add_variable(
        Variable::indexed(
            "conc_mass_comp",
            vec![
                IndexedEntry::new(comp_key(0.0, "dye"), 2.5.into()),
                IndexedEntry::new(comp_key(0.0, "tds"), 50.0.into()),
            ],
        )
        .with_units("kg/m^3"),
    );

    let stage = fs.new_child("stage");
    let membrane = stage.new_child_with_doc("membrane", "Nanofiltration membrane");
    membrane.add_variable(Variable::scalar("recovery_vol", 0.7).with_units("dimensionless"));

    fs.new_child("junk");
    fs
}

/// Flowsheet interface wired to [`sample_tree`]: interfaces attached to
/// `feed` and `stage.membrane`, root bound.
pub(crate) fn sample_flowsheet() -> (FlowsheetInterface, Arc<ModelBlock>) {
    let fs = sample_tree();
    let feed = fs.child("feed").expect("feed exists");
    let membrane = fs
        .child("stage")
        .and_then(|stage| stage.child("membrane"))
        .expect("membrane exists");

    let ui = FlowsheetInterface::new(InterfaceConfig::new().with_display_name("Flowsheet"));
    ui.interfaces()
        .export_variables(
            feed,
            ["flow_vol", "conc_mass_comp"],
            InterfaceConfig::new().with_display_name("Feed"),
        )
        .expect("feed interface attaches");
    ui.interfaces()
        .export_variables(
            membrane,
            ["recovery_vol"],
            InterfaceConfig::new().with_category("membrane"),
        )
        .expect("membrane interface attaches");
    ui.set_block(fs.clone()).expect("root interface attaches");
    (ui, fs)
}
