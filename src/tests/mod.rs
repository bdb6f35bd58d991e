//! Cross-module test suites
//!
//! Unit-level tests live next to their modules; these suites exercise the
//! interface, flowsheet, and action layers together.

#[cfg(test)]
mod support;

#[cfg(test)]
mod interface_tests;
