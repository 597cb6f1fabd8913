//! Criteria normalisation.
//!
//! Caller criteria arrive as loosely shaped JSON objects. They are classified
//! exactly once into [`Criteria`] and then lowered into a [`LogicalNode`]
//! tree whose leaves carry resolved references and parameter names.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::query::ast::{ComparisonLeaf, LogicalNode, Operator, SortDirection, IDENTITY_PROPERTY};
use crate::query::errors::{BuildError, BuildResult};
use crate::query::params::{ParamMap, ParameterNamer};

/// Classified criteria, decided once at parse time.
#[derive(Clone, Debug, PartialEq)]
pub enum Criteria {
    /// `property = value`
    Equality {
        /// Attribute name.
        property: String,
        /// Literal compared against.
        value: Value,
    },
    /// `property <op> value`
    Comparator {
        /// Attribute name.
        property: String,
        /// Explicit comparator.
        operator: Operator,
        /// Operand (truthiness for existence checks).
        value: Value,
    },
    /// Every child must hold.
    And(Vec<Criteria>),
    /// At least one child must hold.
    Or(Vec<Criteria>),
    /// Nested criteria scoped to one matched entity.
    ByReference {
        /// Reference the nested criteria constrain.
        reference: String,
        /// Scoped criteria.
        criteria: Box<Criteria>,
    },
}

impl Criteria {
    /// Classifies `raw`. Keys equal to one of `references` whose value is an
    /// object (and not a comparator object) open a reference scope.
    pub fn parse(raw: &Value, references: &[&str]) -> BuildResult<Self> {
        parse_object(raw, references, false)
    }

    /// True when the criteria carry no predicate at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Criteria::And(children) | Criteria::Or(children) => {
                children.iter().all(Criteria::is_empty)
            }
            Criteria::ByReference { criteria, .. } => criteria.is_empty(),
            _ => false,
        }
    }
}

fn parse_object(raw: &Value, references: &[&str], scoped: bool) -> BuildResult<Criteria> {
    let obj = raw
        .as_object()
        .ok_or_else(|| BuildError::criteria(format!("expected an object, got {raw}")))?;
    let mut entries = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        entries.push(parse_entry(key, value, references, scoped)?);
    }
    Ok(match entries.len() {
        1 => entries.remove(0),
        _ => Criteria::And(entries),
    })
}

fn parse_entry(
    key: &str,
    value: &Value,
    references: &[&str],
    scoped: bool,
) -> BuildResult<Criteria> {
    if key.eq_ignore_ascii_case("and") || key.eq_ignore_ascii_case("or") {
        let items = value.as_array().ok_or_else(|| {
            BuildError::criteria(format!("'{key}' must be a list of criteria objects"))
        })?;
        if items.is_empty() {
            return Err(BuildError::criteria(format!(
                "'{key}' must list at least one criteria object"
            )));
        }
        let children = items
            .iter()
            .map(|item| parse_object(item, references, scoped))
            .collect::<BuildResult<Vec<_>>>()?;
        return Ok(if key.eq_ignore_ascii_case("and") {
            Criteria::And(children)
        } else {
            Criteria::Or(children)
        });
    }

    if !scoped && references.contains(&key) {
        if let Some(obj) = value.as_object() {
            if comparator_entries(obj).is_none() {
                return Ok(Criteria::ByReference {
                    reference: key.to_owned(),
                    criteria: Box::new(parse_object(value, references, true)?),
                });
            }
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(mut comparisons) = comparator_entries(obj) {
            let mut children: Vec<Criteria> = comparisons
                .drain(..)
                .map(|(operator, operand)| Criteria::Comparator {
                    property: key.to_owned(),
                    operator,
                    value: operand.clone(),
                })
                .collect();
            return Ok(match children.len() {
                1 => children.remove(0),
                _ => Criteria::And(children),
            });
        }
    }

    Ok(Criteria::Equality {
        property: key.to_owned(),
        value: value.clone(),
    })
}

/// `Some` only when the object is non-empty and every key is an operator.
fn comparator_entries(obj: &Map<String, Value>) -> Option<Vec<(Operator, &Value)>> {
    if obj.is_empty() {
        return None;
    }
    obj.iter()
        .map(|(key, value)| Operator::parse(key).map(|op| (op, value)))
        .collect()
}

/// Lowers [`Criteria`] into a [`LogicalNode`] tree, allocating parameter
/// names and filling the parameter map as it goes.
pub struct Normalizer<'a> {
    default_reference: Option<&'a str>,
    namespaces: &'a HashMap<String, String>,
    namer: &'a mut ParameterNamer,
    params: &'a mut ParamMap,
}

impl<'a> Normalizer<'a> {
    /// Creates a normaliser writing into the given session state.
    pub fn new(
        default_reference: Option<&'a str>,
        namespaces: &'a HashMap<String, String>,
        namer: &'a mut ParameterNamer,
        params: &'a mut ParamMap,
    ) -> Self {
        Self {
            default_reference,
            namespaces,
            namer,
            params,
        }
    }

    /// Returns `None` when the criteria contain no predicate.
    pub fn normalize(&mut self, criteria: &Criteria) -> BuildResult<Option<LogicalNode>> {
        self.lower(criteria, None)
    }

    fn lower(
        &mut self,
        criteria: &Criteria,
        scope: Option<&str>,
    ) -> BuildResult<Option<LogicalNode>> {
        match criteria {
            Criteria::Equality { property, value } => self
                .leaf(scope, property, Operator::Eq, value)
                .map(|leaf| Some(LogicalNode::Leaf(leaf))),
            Criteria::Comparator {
                property,
                operator,
                value,
            } => self
                .leaf(scope, property, *operator, value)
                .map(|leaf| Some(LogicalNode::Leaf(leaf))),
            Criteria::And(children) => Ok(self.group(children, scope)?.map(LogicalNode::and)),
            Criteria::Or(children) => Ok(self.group(children, scope)?.map(LogicalNode::or)),
            Criteria::ByReference {
                reference,
                criteria,
            } => self.lower(criteria, Some(reference.as_str())),
        }
    }

    fn group(
        &mut self,
        children: &[Criteria],
        scope: Option<&str>,
    ) -> BuildResult<Option<Vec<LogicalNode>>> {
        let mut lowered = Vec::with_capacity(children.len());
        for child in children {
            if let Some(node) = self.lower(child, scope)? {
                lowered.push(node);
            }
        }
        Ok((!lowered.is_empty()).then_some(lowered))
    }

    fn leaf(
        &mut self,
        scope: Option<&str>,
        property: &str,
        operator: Operator,
        value: &Value,
    ) -> BuildResult<ComparisonLeaf> {
        let reference = scope
            .or(self.default_reference)
            .ok_or(BuildError::MissingMatch)?
            .to_owned();

        if operator.is_existence() {
            let holds = is_truthy(value);
            let operator = match (operator, holds) {
                (Operator::Exists, true) | (Operator::NotExists, false) => Operator::Exists,
                _ => Operator::NotExists,
            };
            return Ok(ComparisonLeaf {
                reference,
                property: property.to_owned(),
                operator,
                parameter: None,
                value: Value::Bool(holds),
            });
        }

        let value = if property == IDENTITY_PROPERTY {
            coerce_identity(value, operator)?
        } else {
            value.clone()
        };
        let namespace = self
            .namespaces
            .get(&reference)
            .map(String::as_str)
            .unwrap_or(&reference);
        let parameter = self.namer.name_for(namespace, property);
        self.params.insert(parameter.clone(), value.clone());
        Ok(ComparisonLeaf {
            reference,
            property: property.to_owned(),
            operator,
            parameter: Some(parameter),
            value,
        })
    }
}

/// Loose truthiness: `null`, `false`, `0` and `""` are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parses the leading integer of `raw` (optional sign, then digits).
pub fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn identity_int(value: &Value) -> BuildResult<i64> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_int_prefix(s),
        _ => None,
    };
    parsed.ok_or_else(|| BuildError::InvalidIdentity {
        value: value.to_string(),
    })
}

fn coerce_identity(value: &Value, operator: Operator) -> BuildResult<Value> {
    match (operator, value) {
        (Operator::In, Value::Array(items)) => items
            .iter()
            .map(|item| identity_int(item).map(Value::from))
            .collect::<BuildResult<Vec<_>>>()
            .map(Value::Array),
        _ => identity_int(value).map(Value::from),
    }
}

/// One sort key from caller criteria; the reference is supplied by whoever
/// applies it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    /// Property being sorted on.
    pub property: String,
    /// Sort direction.
    pub direction: SortDirection,
}

/// Parses `[{prop: "asc"|"desc"}]`, `["prop"]` or `{prop: "desc", ...}`.
pub fn parse_sort(raw: &Value) -> BuildResult<Vec<SortKey>> {
    let invalid = |reason: String| BuildError::InvalidSort { reason };
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::String(property) => Ok(vec![SortKey {
            property: property.clone(),
            direction: SortDirection::Ascending,
        }]),
        Value::Object(obj) => obj
            .iter()
            .map(|(property, dir)| sort_entry(property, dir))
            .collect(),
        Value::Array(items) => {
            let mut keys = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(property) => keys.push(SortKey {
                        property: property.clone(),
                        direction: SortDirection::Ascending,
                    }),
                    Value::Object(obj) => {
                        for (property, dir) in obj {
                            keys.push(sort_entry(property, dir)?);
                        }
                    }
                    other => return Err(invalid(format!("unsupported sort entry {other}"))),
                }
            }
            Ok(keys)
        }
        other => Err(invalid(format!("unsupported sort value {other}"))),
    }
}

fn sort_entry(property: &str, dir: &Value) -> BuildResult<SortKey> {
    let direction = match dir {
        Value::Null => SortDirection::Ascending,
        Value::String(s) => SortDirection::parse(s).ok_or_else(|| BuildError::InvalidSort {
            reason: format!("unknown direction '{s}' for '{property}'"),
        })?,
        Value::Number(n) if n.as_i64() == Some(1) => SortDirection::Ascending,
        Value::Number(n) if n.as_i64() == Some(-1) => SortDirection::Descending,
        other => {
            return Err(BuildError::InvalidSort {
                reason: format!("unknown direction {other} for '{property}'"),
            })
        }
    };
    Ok(SortKey {
        property: property.to_owned(),
        direction,
    })
}

/// Parses a caller-supplied limit; only positive integers are accepted.
pub fn parse_limit(raw: &Value) -> BuildResult<u64> {
    let invalid = || BuildError::InvalidLimit {
        value: raw.to_string(),
    };
    let parsed = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_int_prefix(s),
        _ => None,
    };
    match parsed {
        Some(n) if n > 0 => Ok(n as u64),
        _ => Err(invalid()),
    }
}

/// Caller-facing find criteria: `{where?, sort?|order?, limit?}`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindCriteria {
    /// Raw filter object; classified against the builder's references.
    pub filter: Option<Value>,
    /// Sort keys in priority order.
    pub sort: Vec<SortKey>,
    /// Positive row limit.
    pub limit: Option<u64>,
}

impl FindCriteria {
    /// Parses the caller-facing object.
    pub fn from_json(raw: &Value) -> BuildResult<Self> {
        let obj = match raw {
            Value::Null => return Ok(Self::default()),
            Value::Object(obj) => obj,
            other => {
                return Err(BuildError::criteria(format!(
                    "find criteria must be an object, got {other}"
                )))
            }
        };
        let filter = match obj.get("where") {
            None | Some(Value::Null) => None,
            Some(Value::Object(w)) if w.is_empty() => None,
            Some(w @ Value::Object(_)) => Some(w.clone()),
            Some(other) => {
                return Err(BuildError::criteria(format!(
                    "'where' must be an object, got {other}"
                )))
            }
        };
        let sort = match obj.get("sort").or_else(|| obj.get("order")) {
            Some(raw) => parse_sort(raw)?,
            None => Vec::new(),
        };
        let limit = match obj.get("limit") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(parse_limit(raw)?),
        };
        Ok(Self {
            filter,
            sort,
            limit,
        })
    }
}
