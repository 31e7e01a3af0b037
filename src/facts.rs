//! Reference facts.
//!
//! Factors may name an external fact (cost of living in a city, a tax rate)
//! instead of giving a literal. The engine resolves every reference once,
//! before any trial starts, through a [`FactProvider`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;
use serde_yaml::Value;

use crate::error::{SimError, SimResult};

/// Source of reference values.
///
/// `None` means the key is unknown; the engine reports it as a
/// fact-not-found violation for that option's factor.
pub trait FactProvider {
    /// Look up a reference key.
    fn lookup(&self, key: &str) -> Option<f64>;
}

impl<T: FactProvider + ?Sized> FactProvider for &T {
    fn lookup(&self, key: &str) -> Option<f64> {
        (**self).lookup(key)
    }
}

impl FactProvider for HashMap<String, f64> {
    fn lookup(&self, key: &str) -> Option<f64> {
        self.get(key).copied()
    }
}

impl FactProvider for BTreeMap<String, f64> {
    fn lookup(&self, key: &str) -> Option<f64> {
        self.get(key).copied()
    }
}

/// In-memory fact table, loadable from YAML or JSON.
///
/// Nested maps are flattened with `.`-joined keys:
///
/// ```yaml
/// cost_of_living:
///   berlin: 1800
///   lisbon: 1200
/// ```
///
/// yields `cost_of_living.berlin` and `cost_of_living.lisbon`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StaticFactProvider {
    facts: BTreeMap<String, f64>,
}

impl StaticFactProvider {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table from key/value pairs.
    #[must_use]
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        Self {
            facts: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Add or replace a fact.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.facts.insert(key.into(), value);
    }

    /// Number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// True if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Parse a YAML (or JSON) document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse, or a leaf is not
    /// a finite number.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let root: Value = serde_yaml::from_str(yaml)?;
        let mut provider = Self::new();
        match root {
            Value::Null => {}
            Value::Mapping(_) => flatten("", &root, &mut provider.facts)?,
            _ => return Err(SimError::config("fact table must be a mapping")),
        }
        Ok(provider)
    }

    /// Load a fact file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, f64>) -> SimResult<()> {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return Err(SimError::config(format!("unsupported fact key under '{prefix}'"))),
                };
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, v, out)?;
            }
            Ok(())
        }
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() => {
                out.insert(prefix.to_string(), v);
                Ok(())
            }
            _ => Err(SimError::config(format!("fact '{prefix}' is not a finite number"))),
        },
        _ => Err(SimError::config(format!("fact '{prefix}' is not a number"))),
    }
}

impl FactProvider for StaticFactProvider {
    fn lookup(&self, key: &str) -> Option<f64> {
        self.facts.get(key).copied()
    }
}
