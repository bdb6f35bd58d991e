//! Dye desalination treatment train example
//!
//! Mirrors a wastewater resource-recovery case study: dye-laden textile
//! wastewater is pumped through a nanofiltration membrane that rejects dye
//! into the retentate while most of the water and TDS pass to the permeate.
//! The script registers build/solve/results actions on a flowsheet
//! interface, drives them through the dependency chain, and prints (or
//! saves) the exported document.
//!
//! Usage: `dye_desalination [OUTPUT.json]`

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde_json::json;

use flowsheet_ui::ui::actions::{self, ActionContext};
use flowsheet_ui::{
    Block, FlowsheetInterface, IndexKey, IndexedEntry, InterfaceConfig, ModelBlock, Variable,
};

const SOLUTES: [&str; 2] = ["dye", "tds"];

fn comp_key(solute: &str) -> IndexKey {
    IndexKey(vec![0.into(), solute.into()])
}

fn comp_entries(values: [f64; 2]) -> Vec<IndexedEntry> {
    SOLUTES
        .iter()
        .zip(values)
        .map(|(solute, value)| IndexedEntry::new(comp_key(solute), value.into()))
        .collect()
}

/// Construct the model tree and attach the block interfaces
fn build(ctx: ActionContext<'_>) -> anyhow::Result<()> {
    let fs = ModelBlock::with_doc("fs", "Dye desalination treatment train");

    let feed = fs.new_child_with_doc("feed", "Influent feed");
    feed.add_variable(
        Variable::scalar("flow_vol", 120.0 / 3600.0)
            .with_units("m^3/s")
            .with_doc("Volumetric feed flow rate"),
    );
    feed.add_variable(
        Variable::indexed("conc_mass_comp", comp_entries([2.5, 50.0]))
            .with_units("kg/m^3")
            .with_doc("Component mass concentrations"),
    );

    let pump = fs.new_child_with_doc("P1", "Feed pump");
    pump.add_variable(Variable::scalar("applied_pressure", 6.9).with_units("bar"));
    pump.add_variable(Variable::scalar("efficiency", 0.8).with_units("dimensionless"));
    pump.add_variable(Variable::scalar("electricity", 0.0).with_units("kW"));

    let nf = fs.new_child_with_doc("nanofiltration", "rHGO dye-rejection membrane");
    nf.add_variable(Variable::scalar("recovery_vol", 0.7).with_units("dimensionless"));
    nf.add_variable(
        Variable::indexed("rejection_comp", comp_entries([0.98, 0.05]))
            .with_units("dimensionless")
            .with_doc("Observed solute rejection"),
    );

    let permeate = fs.new_child_with_doc("permeate", "Treated permeate product");
    permeate.add_variable(Variable::scalar("flow_vol", 0.0).with_units("m^3/s"));
    permeate.add_variable(
        Variable::indexed("conc_mass_comp", comp_entries([0.0, 0.0])).with_units("kg/m^3"),
    );

    let retentate = fs.new_child_with_doc("retentate", "Dye concentrate product");
    retentate.add_variable(Variable::scalar("flow_vol", 0.0).with_units("m^3/s"));
    retentate.add_variable(
        Variable::indexed("conc_mass_comp", comp_entries([0.0, 0.0])).with_units("kg/m^3"),
    );

    let interfaces = ctx.ui.interfaces();
    interfaces.export_variables(
        feed,
        ["flow_vol", "conc_mass_comp"],
        InterfaceConfig::new().with_display_name("Feed"),
    )?;
    interfaces.export_variables(
        pump,
        ["applied_pressure", "electricity"],
        InterfaceConfig::new()
            .with_display_name("Pump")
            .with_category("pumping"),
    )?;
    interfaces.export_variables(
        nf,
        ["recovery_vol", "rejection_comp"],
        InterfaceConfig::new()
            .with_display_name("Nanofiltration")
            .with_category("membrane"),
    )?;
    interfaces.export_variables(
        permeate,
        ["flow_vol", "conc_mass_comp"],
        InterfaceConfig::new().with_category("product"),
    )?;
    interfaces.export_variables(
        retentate,
        ["flow_vol", "conc_mass_comp"],
        InterfaceConfig::new().with_category("product"),
    )?;

    ctx.ui.set_block(fs)?;
    Ok(())
}

/// Stand-in for the external solver: a component mass balance over the
/// nanofiltration stage plus the pump electricity draw
fn solve(ctx: ActionContext<'_>) -> anyhow::Result<()> {
    let fs = ctx.block.context("flowsheet has not been built")?;

    let feed = child(&fs, "feed")?;
    let pump = child(&fs, "P1")?;
    let nf = child(&fs, "nanofiltration")?;
    let permeate = child(&fs, "permeate")?;
    let retentate = child(&fs, "retentate")?;

    let feed_flow = scalar(&feed, "flow_vol")?;
    let recovery = scalar(&nf, "recovery_vol")?;
    if recovery <= 0.0 || recovery >= 1.0 {
        bail!("volumetric recovery must be within (0, 1), got {recovery}");
    }
    let permeate_flow = feed_flow * recovery;
    let retentate_flow = feed_flow - permeate_flow;
    set_scalar(&permeate, "flow_vol", permeate_flow)?;
    set_scalar(&retentate, "flow_vol", retentate_flow)?;

    for solute in SOLUTES {
        let key = comp_key(solute);
        let conc_feed = indexed(&feed, "conc_mass_comp", &key)?;
        let rejection = indexed(&nf, "rejection_comp", &key)?;
        let mass_rate = feed_flow * conc_feed;
        let permeate_mass = mass_rate * (1.0 - rejection);
        set_index(&permeate, "conc_mass_comp", &key, permeate_mass / permeate_flow)?;
        set_index(
            &retentate,
            "conc_mass_comp",
            &key,
            (mass_rate - permeate_mass) / retentate_flow,
        )?;
    }

    // Electricity draw from applied pressure (bar -> Pa) and efficiency.
    let pressure = scalar(&pump, "applied_pressure")?;
    let efficiency = scalar(&pump, "efficiency")?;
    set_scalar(&pump, "electricity", feed_flow * pressure * 1.0e5 / efficiency / 1000.0)?;
    Ok(())
}

/// Print the exported variable records, block by block
fn report(ctx: ActionContext<'_>) -> anyhow::Result<()> {
    let fs = ctx.block.context("flowsheet has not been built")?;
    print_block(ctx.ui, fs.as_ref(), 0);
    Ok(())
}

fn print_block(ui: &FlowsheetInterface, block: &dyn Block, depth: usize) {
    let indent = "  ".repeat(depth);
    match ui.interfaces().get_block_interface(block) {
        Some(interface) => {
            println!(
                "{}{} ({})",
                indent,
                interface.display_name(),
                interface.category()
            );
            for record in interface.exported_variables() {
                let value = record
                    .value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string());
                match record.units {
                    Some(units) => println!("{}  {} = {} {}", indent, record.name, value, units),
                    None => println!("{}  {} = {}", indent, record.name, value),
                }
            }
        }
        None => println!("{}{}", indent, block.name()),
    }
    for sub in block.children() {
        print_block(ui, sub.as_ref(), depth + 1);
    }
}

fn child(block: &Arc<dyn Block>, name: &str) -> anyhow::Result<Arc<dyn Block>> {
    block
        .child(name)
        .with_context(|| format!("missing block '{}' under '{}'", name, block.name()))
}

fn scalar(block: &Arc<dyn Block>, name: &str) -> anyhow::Result<f64> {
    let variable = block
        .variable(name)
        .with_context(|| format!("missing variable '{}' on '{}'", name, block.name()))?;
    variable
        .value()
        .as_scalar()
        .and_then(|s| s.as_f64())
        .with_context(|| format!("variable '{}' on '{}' is not a scalar number", name, block.name()))
}

fn indexed(block: &Arc<dyn Block>, name: &str, key: &IndexKey) -> anyhow::Result<f64> {
    let variable = block
        .variable(name)
        .with_context(|| format!("missing variable '{}' on '{}'", name, block.name()))?;
    let value = variable.value();
    let entries = value
        .as_indexed()
        .with_context(|| format!("variable '{}' on '{}' is not indexed", name, block.name()))?;
    entries
        .iter()
        .find(|entry| entry.index == *key)
        .and_then(|entry| entry.value.as_f64())
        .with_context(|| format!("no numeric entry at index {} of '{}'", key, name))
}

fn set_scalar(block: &Arc<dyn Block>, name: &str, value: f64) -> anyhow::Result<()> {
    block
        .variable(name)
        .with_context(|| format!("missing variable '{}' on '{}'", name, block.name()))?
        .set_scalar(value);
    Ok(())
}

fn set_index(block: &Arc<dyn Block>, name: &str, key: &IndexKey, value: f64) -> anyhow::Result<()> {
    block
        .variable(name)
        .with_context(|| format!("missing variable '{}' on '{}'", name, block.name()))?
        .set_index(key, value.into());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let ui = FlowsheetInterface::new(
        InterfaceConfig::new()
            .with_display_name("Dye desalination")
            .with_description("Nanofiltration dye/TDS separation train"),
    );
    ui.set_action(actions::BUILD, build)?;
    ui.set_action(actions::SOLVE, solve)?;
    ui.set_action(actions::RESULTS, report)?;
    ui.set_meta("case_study", json!("dye_desalination"));

    // results pulls in build and solve through the dependency chain.
    ui.run_action(actions::RESULTS)?;

    if let Some(path) = env::args().nth(1) {
        ui.save(&path)?;
        println!("saved flowsheet document to {path}");
    } else {
        let document = serde_json::to_string_pretty(&ui.as_document()?)?;
        println!("{document}");
    }
    Ok(())
}
