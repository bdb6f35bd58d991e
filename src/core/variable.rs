//! Variable value model
//!
//! Model variables hold either a bare scalar or an indexed set of values,
//! where each indexed entry is addressed by a tuple of numbers and strings
//! (e.g. `[0, "dye"]`). The same representation is used on the wire: scalars
//! serialize as bare JSON numbers/strings, indexed variables as a list of
//! index/value pairs, so values round-trip without a separate wire type.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bare scalar value: a JSON number or string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// Numeric value
    Number(f64),
    /// String value
    Text(String),
}

impl ScalarValue {
    /// Try to convert to a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to convert to a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Number(n) => write!(f, "{}", n),
            ScalarValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(n: f64) -> Self {
        ScalarValue::Number(n)
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::Number(n as f64)
    }
}

impl From<i32> for ScalarValue {
    fn from(n: i32) -> Self {
        ScalarValue::Number(n as f64)
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

/// Index tuple addressing one entry of an indexed variable
///
/// Entries are matched by exact tuple equality during loading; there is no
/// coercion between numbers and strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexKey(pub Vec<ScalarValue>);

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, ")")
    }
}

/// One index/value pair of an indexed variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// Index tuple for this entry
    pub index: IndexKey,
    /// Value at this index
    pub value: ScalarValue,
    /// Per-entry units override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl IndexedEntry {
    /// Create an entry without per-entry units
    pub fn new(index: IndexKey, value: ScalarValue) -> Self {
        Self {
            index,
            value,
            units: None,
        }
    }
}

/// Value of a model variable
///
/// Scalars serialize as bare values, indexed variables as a list of
/// index/value pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    /// Single scalar value
    Scalar(ScalarValue),
    /// Ordered list of index/value pairs
    Indexed(Vec<IndexedEntry>),
}

impl VarValue {
    /// Whether this is an indexed value
    pub fn is_indexed(&self) -> bool {
        matches!(self, VarValue::Indexed(_))
    }

    /// Try to view as a scalar
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            VarValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Try to view as indexed entries
    pub fn as_indexed(&self) -> Option<&[IndexedEntry]> {
        match self {
            VarValue::Indexed(entries) => Some(entries),
            _ => None,
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarValue::Scalar(s) => write!(f, "{}", s),
            VarValue::Indexed(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", entry.index, entry.value)?;
                }
                Ok(())
            }
        }
    }
}

/// A named model variable
///
/// The value is interior-mutable so a shared block tree can be updated in
/// place when a saved document is loaded.
#[derive(Debug)]
pub struct Variable {
    name: String,
    doc: Option<String>,
    units: Option<String>,
    value: RwLock<VarValue>,
}

impl Variable {
    /// Create a scalar variable
    pub fn scalar(name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            units: None,
            value: RwLock::new(VarValue::Scalar(value.into())),
        }
    }

    /// Create an indexed variable from index/value pairs
    pub fn indexed(name: impl Into<String>, entries: Vec<IndexedEntry>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            units: None,
            value: RwLock::new(VarValue::Indexed(entries)),
        }
    }

    /// Set the units string
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Set the documentation string
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Variable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Documentation string, if any
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Units string, if any
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    /// Snapshot of the current value
    pub fn value(&self) -> VarValue {
        self.value.read().clone()
    }

    /// Whether the current value is indexed
    pub fn is_indexed(&self) -> bool {
        self.value.read().is_indexed()
    }

    /// Replace the whole value
    pub fn set_value(&self, value: VarValue) {
        *self.value.write() = value;
    }

    /// Replace the value with a scalar
    pub fn set_scalar(&self, value: impl Into<ScalarValue>) {
        *self.value.write() = VarValue::Scalar(value.into());
    }

    /// Set one indexed entry by exact index match, appending the pair when
    /// no entry has that index. A scalar value is replaced by a one-entry
    /// indexed value.
    pub fn set_index(&self, index: &IndexKey, value: ScalarValue) {
        let mut current = self.value.write();
        match &mut *current {
            VarValue::Indexed(entries) => {
                match entries.iter_mut().find(|entry| entry.index == *index) {
                    Some(entry) => entry.value = value,
                    None => entries.push(IndexedEntry::new(index.clone(), value)),
                }
            }
            VarValue::Scalar(_) => {
                *current = VarValue::Indexed(vec![IndexedEntry::new(index.clone(), value)]);
            }
        }
    }
}
