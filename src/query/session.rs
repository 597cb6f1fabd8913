//! Mutable state owned by one query build.

use rustc_hash::FxHashSet;
use std::collections::HashMap;

use crate::query::ast::{Direction, Labels, MatchStep, StepKind};
use crate::query::criteria::Normalizer;
use crate::query::errors::{BuildError, BuildResult};
use crate::query::ident::validate_reference;
use crate::query::params::{ParamMap, ParamStyle, ParameterNamer};

/// A match step after reference resolution and parameter allocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedStep {
    /// Node or relationship.
    pub kind: StepKind,
    /// Final reference.
    pub reference: String,
    /// Labels or relationship types.
    pub labels: Labels,
    /// Relationship direction.
    pub direction: Direction,
    /// Inline properties as `(property, parameter)` pairs.
    pub properties: Vec<(String, String)>,
    /// Re-uses a reference declared by an earlier clause.
    pub bound: bool,
}

/// References, parameter names and values accumulated during one build.
///
/// Never shared between builds; every builder creates its own.
#[derive(Debug, Default, Clone)]
pub struct BuildSession {
    references: Vec<String>,
    reference_set: FxHashSet<String>,
    namespaces: HashMap<String, String>,
    pub(crate) namer: ParameterNamer,
    pub(crate) params: ParamMap,
    pub(crate) style: ParamStyle,
}

impl BuildSession {
    /// Creates an empty session rendering placeholders in `style`.
    pub fn new(style: ParamStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// References in registration order.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// True when `reference` was registered.
    pub fn has_reference(&self, reference: &str) -> bool {
        self.reference_set.contains(reference)
    }

    /// Parameters collected so far.
    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    /// Placeholder style.
    pub fn style(&self) -> ParamStyle {
        self.style
    }

    /// Normaliser writing into this session; unqualified properties resolve
    /// against the first registered reference.
    pub fn normalizer(&mut self) -> Normalizer<'_> {
        Normalizer::new(
            self.references.first().map(String::as_str),
            &self.namespaces,
            &mut self.namer,
            &mut self.params,
        )
    }

    /// Routes parameter names for `reference` through `prefix`.
    pub fn set_namespace(&mut self, reference: &str, prefix: &str) {
        self.namespaces
            .insert(reference.to_owned(), prefix.to_owned());
    }

    /// Namespace used when naming parameters for `reference`.
    pub fn namespace_for<'a>(&'a self, reference: &'a str) -> &'a str {
        self.namespaces
            .get(reference)
            .map(String::as_str)
            .unwrap_or(reference)
    }

    /// Allocates a parameter for `property` under `namespace` and stores
    /// `value` under it.
    pub fn bind(&mut self, namespace: &str, property: &str, value: serde_json::Value) -> String {
        let name = self.namer.name_for(namespace, property);
        self.params.insert(name.clone(), value);
        name
    }

    /// Stores `value` under a fixed parameter name, falling back to the
    /// namer when the name is already taken.
    pub fn bind_fixed(&mut self, name: &str, value: serde_json::Value) -> String {
        let name = if self.namer.reserve(name) {
            name.to_owned()
        } else {
            self.namer.name_for(name, "value")
        };
        self.params.insert(name.clone(), value);
        name
    }

    /// Registers a new reference, generating one when `requested` is `None`.
    pub fn register(&mut self, kind: StepKind, requested: Option<&str>) -> BuildResult<String> {
        let reference = match requested {
            Some(reference) => {
                validate_reference(reference)?;
                if self.has_reference(reference) {
                    return Err(BuildError::DuplicateRef {
                        reference: reference.to_owned(),
                    });
                }
                reference.to_owned()
            }
            None => self.next_reference(kind),
        };
        self.reference_set.insert(reference.clone());
        self.references.push(reference.clone());
        Ok(reference)
    }

    /// `n`, `n1`, `n2`, ... for nodes and `r`, `r1`, ... for relationships,
    /// skipping anything already taken.
    fn next_reference(&self, kind: StepKind) -> String {
        let base = kind.ref_base();
        if !self.has_reference(base) {
            return base.to_owned();
        }
        (1u64..)
            .map(|i| format!("{base}{i}"))
            .find(|candidate| !self.has_reference(candidate))
            .unwrap_or_else(|| base.to_owned())
    }

    /// Resolves a caller step: registers (or checks) its reference and binds
    /// its inline properties.
    pub fn resolve(&mut self, step: MatchStep) -> BuildResult<ResolvedStep> {
        let reference = if step.bound {
            let reference = step.reference.clone().unwrap_or_default();
            if !self.has_reference(&reference) {
                return Err(BuildError::UnknownRef {
                    reference,
                    context: "pattern",
                });
            }
            reference
        } else {
            self.register(step.kind, step.reference.as_deref())?
        };

        let namespace = self.namespace_for(&reference).to_owned();
        let properties = if step.bound {
            Vec::new()
        } else {
            step.properties
                .into_iter()
                .map(|(key, value)| {
                    let param = self.bind(&namespace, &key, value);
                    (key, param)
                })
                .collect()
        };

        Ok(ResolvedStep {
            kind: step.kind,
            reference,
            labels: if step.bound { Labels::new() } else { step.labels },
            direction: step.direction,
            properties,
            bound: step.bound,
        })
    }
}
