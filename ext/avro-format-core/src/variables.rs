//! Variable substitution for file names and field paths

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name to value map used to expand `${NAME}` and `%%NAME%%` references.
///
/// Names missing from the map are looked up in the process environment.
/// References that resolve nowhere are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables {
    #[serde(default)]
    values: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.set(name, value);
        self
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }

    /// Expand every resolvable reference in `input`
    pub fn substitute(&self, input: &str) -> String {
        let expanded = self.expand(input, "${", "}");
        self.expand(&expanded, "%%", "%%")
    }

    fn expand(&self, input: &str, open: &str, close: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find(open) {
            let after_open = &rest[start + open.len()..];
            let Some(end) = after_open.find(close) else {
                break;
            };

            out.push_str(&rest[..start]);
            let name = &after_open[..end];
            match self.get(name).filter(|_| !name.is_empty()) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push_str(open);
                    out.push_str(name);
                    out.push_str(close);
                }
            }
            rest = &after_open[end + close.len()..];
        }

        out.push_str(rest);
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut vars = Variables::new();
        for (k, v) in iter {
            vars.set(k, v);
        }
        vars
    }
}
