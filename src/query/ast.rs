//! Structures describing one query build: the pattern steps, the normalised
//! predicate tree, ordering and write clauses.
//!
//! Everything here is plain data. The builder owns the only mutable state
//! (used references and parameter names); renderers consume these types
//! read-only.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

use crate::query::errors::{BuildError, BuildResult};

/// Reserved property name addressing the engine-assigned identity.
pub const IDENTITY_PROPERTY: &str = "_id";

/// Ordered list of labels (node labels or relationship types).
pub type Labels = SmallVec<[String; 2]>;

/// Whether a step matches a node or a relationship.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Node participant, rendered as `(ref:Label)`.
    Node,
    /// Relationship participant, rendered as `-[ref:TYPE]-`.
    #[serde(rename = "rel")]
    Relationship,
}

impl StepKind {
    /// Base letter used for generated references.
    pub fn ref_base(self) -> &'static str {
        match self {
            StepKind::Node => "n",
            StepKind::Relationship => "r",
        }
    }
}

/// Direction selector for relationship steps.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Pointing from the previous node to the next one.
    Out,
    /// Pointing from the next node back to the previous one.
    In,
    /// Either direction.
    #[default]
    Undirected,
}

impl Direction {
    /// Parses the caller-facing direction string; `None` means undirected.
    pub fn parse(raw: Option<&str>) -> BuildResult<Self> {
        match raw {
            None => Ok(Direction::Undirected),
            Some(value) if value.eq_ignore_ascii_case("out") => Ok(Direction::Out),
            Some(value) if value.eq_ignore_ascii_case("in") => Ok(Direction::In),
            Some(value) => Err(BuildError::InvalidDirection {
                direction: value.to_owned(),
            }),
        }
    }
}

/// One participant in a graph pattern as supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchStep {
    /// Node or relationship.
    pub kind: StepKind,
    /// Caller-supplied reference; generated when absent.
    pub reference: Option<String>,
    /// Node labels, or alternative relationship types.
    pub labels: Labels,
    /// Relationship direction; ignored for nodes.
    pub direction: Direction,
    /// Inline property constraints rendered inside the pattern.
    pub properties: BTreeMap<String, Value>,
    /// Reuses a reference introduced by an earlier clause instead of
    /// declaring a new one.
    pub bound: bool,
}

impl MatchStep {
    fn new(kind: StepKind) -> Self {
        Self {
            kind,
            reference: None,
            labels: Labels::new(),
            direction: Direction::Undirected,
            properties: BTreeMap::new(),
            bound: false,
        }
    }

    /// Node step with a generated reference.
    pub fn node() -> Self {
        Self::new(StepKind::Node)
    }

    /// Undirected relationship step with a generated reference.
    pub fn rel() -> Self {
        Self::new(StepKind::Relationship)
    }

    /// Node step pointing at a reference declared elsewhere in the query.
    pub fn bound(reference: impl Into<String>) -> Self {
        let mut step = Self::node().with_ref(reference);
        step.bound = true;
        step
    }

    /// Sets the reference.
    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Appends a label (or relationship type).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Appends an optional label; `None` leaves the step unlabelled.
    pub fn maybe_label(self, label: Option<&str>) -> Self {
        match label {
            Some(label) if !label.is_empty() => self.label(label),
            _ => self,
        }
    }

    /// Sets the relationship direction.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Adds one inline property constraint.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Adds every entry of `props` as an inline property constraint.
    pub fn properties<I, K>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.properties
            .extend(props.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Parses the caller-facing object form
    /// `{type: "node"|"rel", ref?, labels?, direction?, props?}`.
    pub fn from_json(value: &Value) -> BuildResult<Self> {
        let obj = value.as_object().ok_or(BuildError::MissingType)?;
        let kind = match obj.get("type").and_then(Value::as_str) {
            Some("node") => StepKind::Node,
            Some("rel") => StepKind::Relationship,
            _ => return Err(BuildError::MissingType),
        };
        let mut step = MatchStep::new(kind);
        if let Some(reference) = obj.get("ref").and_then(Value::as_str) {
            if !reference.is_empty() {
                step.reference = Some(reference.to_owned());
            }
        }
        match obj.get("labels") {
            Some(Value::Array(labels)) => {
                for label in labels {
                    let label = label.as_str().ok_or_else(|| {
                        BuildError::criteria("match step labels must be strings")
                    })?;
                    step.labels.push(label.to_owned());
                }
            }
            Some(Value::String(label)) => step.labels.push(label.clone()),
            Some(Value::Null) | None => {}
            Some(_) => return Err(BuildError::criteria("match step labels must be a list")),
        }
        if kind == StepKind::Relationship {
            step.direction = match obj.get("direction") {
                None | Some(Value::Null) => Direction::Undirected,
                Some(Value::String(dir)) => Direction::parse(Some(dir.as_str()))?,
                Some(other) => {
                    return Err(BuildError::InvalidDirection {
                        direction: other.to_string(),
                    })
                }
            };
        }
        if let Some(props) = obj.get("props").and_then(Value::as_object) {
            step = step.properties(props.clone());
        }
        Ok(step)
    }
}

/// Comparator carried by a predicate leaf.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<>`
    Ne,
    /// `IN`
    In,
    /// `EXISTS(...)`
    Exists,
    /// `NOT EXISTS(...)`
    NotExists,
}

impl Operator {
    /// Recognises an operator key, ignoring ASCII case and surrounding space.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim();
        let op = match key {
            "=" => Operator::Eq,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "<>" | "!=" => Operator::Ne,
            _ if key.eq_ignore_ascii_case("in") => Operator::In,
            _ if key.eq_ignore_ascii_case("exists") => Operator::Exists,
            _ if key
                .split_whitespace()
                .map(str::to_ascii_lowercase)
                .eq(["not", "exists"]) =>
            {
                Operator::NotExists
            }
            _ => return None,
        };
        Some(op)
    }

    /// Textual form used in rendered predicates.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Ne => "<>",
            Operator::In => "IN",
            Operator::Exists => "EXISTS",
            Operator::NotExists => "NOT EXISTS",
        }
    }

    /// Existence checks consume no parameter slot.
    pub fn is_existence(self) -> bool {
        matches!(self, Operator::Exists | Operator::NotExists)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single predicate over one matched entity.
#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonLeaf {
    /// Reference the predicate constrains.
    pub reference: String,
    /// Attribute name or [`IDENTITY_PROPERTY`].
    pub property: String,
    /// Comparator.
    pub operator: Operator,
    /// Key into the parameter map; `None` for existence checks.
    pub parameter: Option<String>,
    /// Value as stored in the parameter map.
    pub value: Value,
}

impl ComparisonLeaf {
    /// True when the leaf compares against the engine identity.
    pub fn is_identity(&self) -> bool {
        self.property == IDENTITY_PROPERTY
    }
}

/// Logical connective joining sibling predicates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Connective {
    /// All children must hold.
    And,
    /// At least one child must hold.
    Or,
}

impl Connective {
    /// Separator placed between rendered children.
    pub fn separator(self) -> &'static str {
        match self {
            Connective::And => " AND ",
            Connective::Or => " OR ",
        }
    }
}

/// Normalised predicate tree.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalNode {
    /// One comparison.
    Leaf(ComparisonLeaf),
    /// Children joined by a connective.
    Group {
        /// How the children combine.
        connective: Connective,
        /// Nested nodes, rendered in order.
        children: Vec<LogicalNode>,
    },
}

impl LogicalNode {
    /// Builds an AND group.
    pub fn and(children: Vec<LogicalNode>) -> Self {
        LogicalNode::Group {
            connective: Connective::And,
            children,
        }
    }

    /// Builds an OR group.
    pub fn or(children: Vec<LogicalNode>) -> Self {
        LogicalNode::Group {
            connective: Connective::Or,
            children,
        }
    }

    /// Iterates every leaf in depth-first order.
    pub fn leaves(&self) -> Vec<&ComparisonLeaf> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a ComparisonLeaf>) {
        match self {
            LogicalNode::Leaf(leaf) => out.push(leaf),
            LogicalNode::Group { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

/// Sort direction for one order entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Parses `asc`/`desc` (and their long forms) ignoring case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Ascending),
            "desc" | "descending" => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

/// One ORDER BY entry; list position is sort priority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderSpec {
    /// Reference being sorted on.
    pub reference: String,
    /// Property of that reference.
    pub property: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl OrderSpec {
    /// Ascending entry.
    pub fn asc(reference: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            property: property.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending entry.
    pub fn desc(reference: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            property: property.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Assignment rendered inside SET / ON MATCH SET / ON CREATE SET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetItem {
    /// `ref.prop = {param}`
    Property {
        /// Target reference.
        reference: String,
        /// Property being assigned.
        property: String,
        /// Parameter holding the new value.
        parameter: String,
    },
    /// `ref.prop = timestamp()`
    Timestamp {
        /// Target reference.
        reference: String,
        /// Property receiving the server clock.
        property: String,
    },
    /// `ref = {param}` replacing the whole attribute bag.
    Replace {
        /// Target reference.
        reference: String,
        /// Parameter or alias holding the map.
        source: String,
    },
}

impl SetItem {
    pub(crate) fn reference(&self) -> &str {
        match self {
            SetItem::Property { reference, .. }
            | SetItem::Timestamp { reference, .. }
            | SetItem::Replace { reference, .. } => reference,
        }
    }
}

/// Returns a copy of `props` without the identity-like keys `id` and `_id`.
pub fn without_identity_keys(props: &Map<String, Value>) -> Map<String, Value> {
    props
        .iter()
        .filter(|(key, _)| key.as_str() != "id" && key.as_str() != IDENTITY_PROPERTY)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
