//! Parameter naming and the per-build parameter map.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::query::ident::sanitize_param;

/// Parameter values keyed by name. Ordered so rendered output is stable.
pub type ParamMap = BTreeMap<String, Value>;

/// Placeholder syntax understood by the target server.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamStyle {
    /// `{name}`, the legacy REST endpoint syntax.
    #[default]
    Braces,
    /// `$name`.
    Dollar,
}

impl ParamStyle {
    /// Renders the placeholder for `name`.
    pub fn placeholder(self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        self.write_placeholder(&mut out, name);
        out
    }

    pub(crate) fn write_placeholder(self, out: &mut String, name: &str) {
        let _ = match self {
            ParamStyle::Braces => write!(out, "{{{name}}}"),
            ParamStyle::Dollar => write!(out, "${name}"),
        };
    }
}

/// Hands out collision-free parameter names for one build session.
///
/// The first request for `(ns, prop)` yields `ns_prop`; later requests that
/// share that base get `ns_prop_<k>` where `k` is one more than the highest
/// suffix already issued for the base.
#[derive(Debug, Default, Clone)]
pub struct ParameterNamer {
    used: FxHashSet<String>,
}

impl ParameterNamer {
    /// Creates an empty namer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh name for `property` under `namespace` and records it.
    pub fn name_for(&mut self, namespace: &str, property: &str) -> String {
        let base = sanitize_param(&format!("{namespace}_{property}"));
        let name = match self.highest_suffix(&base) {
            None => base,
            Some(max) => format!("{base}_{}", max + 1),
        };
        self.used.insert(name.clone());
        name
    }

    /// Reserves a name verbatim (for fixed parameters such as `props`).
    /// Returns false when the name is already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.used.insert(name.to_owned())
    }

    /// `None` when nothing shares the base; otherwise the highest suffix in
    /// use, with the bare base counting as 0.
    fn highest_suffix(&self, base: &str) -> Option<u64> {
        let prefix = format!("{base}_");
        let mut highest: Option<u64> = None;
        for name in &self.used {
            let suffix = if name == base {
                Some(0)
            } else {
                name.strip_prefix(&prefix)
                    .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|rest| rest.parse::<u64>().ok())
            };
            if let Some(suffix) = suffix {
                highest = Some(highest.map_or(suffix, |h| h.max(suffix)));
            }
        }
        highest
    }
}
