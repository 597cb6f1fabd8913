//! Fluent query builder.
//!
//! Every build owns one [`BuildSession`]; nothing is shared between
//! builders. Chainable methods record the first failure and keep returning
//! `self`, so callers check for errors once in [`QueryBuilder::to_query`].

use serde_json::{Map, Value};
use tracing::trace;

use crate::query::ast::{LogicalNode, MatchStep, Operator, OrderSpec, SetItem, SortDirection};
use crate::query::criteria::{parse_limit, Criteria, SortKey};
use crate::query::errors::{BuildError, BuildResult};
use crate::query::ident::quote;
use crate::query::params::{ParamMap, ParamStyle};
use crate::query::pattern::PatternBuilder;
use crate::query::predicate;
use crate::query::session::BuildSession;

/// Query text plus the parameters it references.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltQuery {
    /// Query text, one clause per line.
    pub query: String,
    /// Values for every placeholder in `query`.
    pub params: ParamMap,
}

/// Fluent builder assembling MATCH / WHERE / write clauses / RETURN /
/// ORDER BY / LIMIT.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    session: BuildSession,
    matches: PatternBuilder,
    predicates: Vec<LogicalNode>,
    merges: PatternBuilder,
    on_create: Vec<SetItem>,
    on_match: Vec<SetItem>,
    sets: Vec<SetItem>,
    deletes: Vec<String>,
    detach: bool,
    returns: Vec<String>,
    return_disabled: bool,
    order: Vec<OrderSpec>,
    limit: Option<u64>,
    match_attempted: bool,
    error: Option<BuildError>,
}

impl QueryBuilder {
    /// Creates an empty builder using `{name}` placeholders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty builder rendering placeholders in `style`.
    pub fn with_param_style(style: ParamStyle) -> Self {
        Self {
            session: BuildSession::new(style),
            ..Self::default()
        }
    }

    /// References registered so far, in order.
    pub fn references(&self) -> &[String] {
        self.session.references()
    }

    /// Adds one match step as its own pattern.
    pub fn r#match(self, step: MatchStep) -> Self {
        self.match_chain([step])
    }

    /// Adds steps rendered as one connected chain.
    pub fn match_chain<I>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = MatchStep>,
    {
        self.match_attempted = true;
        if self.error.is_some() {
            return self;
        }
        if let Err(err) = self.matches.add(&mut self.session, steps) {
            self.record_error(err);
        }
        self
    }

    /// Adds caller-facing JSON steps: one object, or an array rendered as a
    /// chain.
    pub fn match_json(mut self, raw: &Value) -> Self {
        self.match_attempted = true;
        let steps: BuildResult<Vec<MatchStep>> = match raw {
            Value::Array(items) => items.iter().map(MatchStep::from_json).collect(),
            other => MatchStep::from_json(other).map(|step| vec![step]),
        };
        match steps {
            Ok(steps) => self.match_chain(steps),
            Err(err) => self.fail(err),
        }
    }

    /// Names parameters for `reference` with `prefix` instead of the
    /// reference itself. Must precede the steps and criteria it affects.
    pub fn namespace(mut self, reference: &str, prefix: &str) -> Self {
        self.session.set_namespace(reference, prefix);
        self
    }

    /// Adds caller-facing criteria. Unqualified properties constrain the
    /// first registered reference. `null` and `{}` add nothing.
    pub fn where_json(self, raw: &Value) -> Self {
        if self.error.is_some() {
            return self;
        }
        match raw {
            Value::Null => return self,
            Value::Object(obj) if obj.is_empty() => return self,
            _ => {}
        }
        let parsed = {
            let references: Vec<&str> = self
                .session
                .references()
                .iter()
                .map(String::as_str)
                .collect();
            Criteria::parse(raw, &references)
        };
        match parsed {
            Ok(criteria) => self.filter(&criteria),
            Err(err) => self.fail(err),
        }
    }

    /// Adds caller-facing criteria that all constrain `reference`. Keys are
    /// never read as reference scopes.
    pub fn where_scoped(self, reference: &str, raw: &Value) -> Self {
        if self.error.is_some() {
            return self;
        }
        if !self.session.has_reference(reference) {
            return self.fail(BuildError::UnknownRef {
                reference: reference.to_owned(),
                context: "where",
            });
        }
        match raw {
            Value::Null => return self,
            Value::Object(obj) if obj.is_empty() => return self,
            _ => {}
        }
        match Criteria::parse(raw, &[]) {
            Ok(criteria) => self.filter(&Criteria::ByReference {
                reference: reference.to_owned(),
                criteria: Box::new(criteria),
            }),
            Err(err) => self.fail(err),
        }
    }

    /// Adds already classified criteria.
    pub fn filter(mut self, criteria: &Criteria) -> Self {
        if self.error.is_some() || criteria.is_empty() {
            return self;
        }
        match self.session.normalizer().normalize(criteria) {
            Ok(Some(node)) => self.predicates.push(node),
            Ok(None) => {}
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Adds predicates for `reference` using the supplied builder.
    pub fn where_ref<F>(self, reference: &str, build: F) -> Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        if self.error.is_some() {
            return self;
        }
        if !self.session.has_reference(reference) {
            return self.fail(BuildError::UnknownRef {
                reference: reference.to_owned(),
                context: "where",
            });
        }
        let mut builder = PredicateBuilder::default();
        build(&mut builder);
        match builder.finish() {
            Some(criteria) => {
                let scoped = Criteria::ByReference {
                    reference: reference.to_owned(),
                    criteria: Box::new(criteria),
                };
                self.filter(&scoped)
            }
            None => self.fail(BuildError::criteria(
                "where_ref requires at least one predicate",
            )),
        }
    }

    /// Sets the explicit return list.
    pub fn returns<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returns.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Emits no RETURN clause; for statements that only write.
    pub fn without_return(mut self) -> Self {
        self.return_disabled = true;
        self
    }

    /// Appends one ORDER BY entry.
    pub fn order(mut self, spec: OrderSpec) -> Self {
        self.order.push(spec);
        self
    }

    /// Appends ORDER BY entries in priority order.
    pub fn orders<I>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = OrderSpec>,
    {
        self.order.extend(specs);
        self
    }

    /// Applies parsed sort keys against `reference`.
    pub fn order_by_keys(self, reference: &str, keys: &[SortKey]) -> Self {
        let specs = keys.iter().map(|key| OrderSpec {
            reference: reference.to_owned(),
            property: key.property.clone(),
            direction: key.direction,
        });
        self.orders(specs.collect::<Vec<_>>())
    }

    /// Limits the row count; zero is rejected.
    pub fn limit(mut self, limit: u64) -> Self {
        if limit == 0 {
            return self.fail(BuildError::InvalidLimit {
                value: limit.to_string(),
            });
        }
        self.limit = Some(limit);
        self
    }

    /// Limits the row count from a caller-supplied value.
    pub fn limit_json(self, raw: &Value) -> Self {
        match parse_limit(raw) {
            Ok(limit) => self.limit(limit),
            Err(err) => self.fail(err),
        }
    }

    /// `SET reference.property = {param}`.
    pub fn set(self, reference: &str, property: &str, value: Value) -> Self {
        let mut props = Map::new();
        props.insert(property.to_owned(), value);
        self.set_in(reference, &props)
    }

    /// One SET assignment per entry of `props`.
    pub fn set_in(self, reference: &str, props: &Map<String, Value>) -> Self {
        let namespace = self.session.namespace_for(reference).to_owned();
        self.set_in_namespace(reference, &namespace, props)
    }

    /// Like [`QueryBuilder::set_in`] but names parameters under `namespace`,
    /// keeping them apart from criteria on the same reference.
    pub fn set_in_namespace(
        mut self,
        reference: &str,
        namespace: &str,
        props: &Map<String, Value>,
    ) -> Self {
        if let Err(err) = self.require_reference(reference, "set") {
            return self.fail(err);
        }
        for (property, value) in props {
            let parameter = self.session.bind(namespace, property, value.clone());
            self.sets.push(SetItem::Property {
                reference: reference.to_owned(),
                property: property.clone(),
                parameter,
            });
        }
        self
    }

    /// `SET reference.property = timestamp()`.
    pub fn set_timestamp(mut self, reference: &str, property: &str) -> Self {
        if let Err(err) = self.require_reference(reference, "set") {
            return self.fail(err);
        }
        self.sets.push(SetItem::Timestamp {
            reference: reference.to_owned(),
            property: property.to_owned(),
        });
        self
    }

    /// Adds a MERGE chain. Endpoints declared by MATCH are referenced with
    /// [`MatchStep::bound`].
    pub fn merge<I>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = MatchStep>,
    {
        if self.error.is_some() {
            return self;
        }
        if let Err(err) = self.merges.add(&mut self.session, steps) {
            self.record_error(err);
        }
        self
    }

    /// `ON MATCH SET reference.property = timestamp()` for the MERGE.
    pub fn on_match_timestamp(mut self, reference: &str, property: &str) -> Self {
        if let Err(err) = self.require_reference(reference, "merge") {
            return self.fail(err);
        }
        self.on_match.push(SetItem::Timestamp {
            reference: reference.to_owned(),
            property: property.to_owned(),
        });
        self
    }

    /// `ON CREATE SET reference.property = timestamp()` for the MERGE.
    pub fn on_create_timestamp(mut self, reference: &str, property: &str) -> Self {
        if let Err(err) = self.require_reference(reference, "merge") {
            return self.fail(err);
        }
        self.on_create.push(SetItem::Timestamp {
            reference: reference.to_owned(),
            property: property.to_owned(),
        });
        self
    }

    /// `DELETE reference`.
    pub fn delete(mut self, reference: &str) -> Self {
        if let Err(err) = self.require_reference(reference, "delete") {
            return self.fail(err);
        }
        self.deletes.push(reference.to_owned());
        self
    }

    /// `DETACH DELETE reference`; also removes attached relationships.
    pub fn detach_delete(mut self, reference: &str) -> Self {
        self = self.delete(reference);
        self.detach = true;
        self
    }

    /// Validates the build and renders it.
    pub fn to_query(mut self) -> BuildResult<BuiltQuery> {
        if !self.match_attempted {
            return Err(BuildError::MissingMatch);
        }
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if self.matches.is_empty() {
            return Err(BuildError::MissingMatch);
        }

        let returns = self.resolve_returns()?;
        for spec in &self.order {
            if !self.session.has_reference(&spec.reference) {
                return Err(BuildError::OrderNotRef {
                    reference: spec.reference.clone(),
                    property: spec.property.clone(),
                });
            }
        }

        let style = self.session.style();
        let mut lines = vec![format!("MATCH {}", self.matches.render(style))];

        match self.predicates.len() {
            0 => {}
            1 => lines.push(format!("WHERE {}", predicate::render(&self.predicates[0], style))),
            _ => {
                let combined = LogicalNode::and(self.predicates.clone());
                lines.push(format!("WHERE {}", predicate::render(&combined, style)));
            }
        }
        if !self.merges.is_empty() {
            lines.push(format!("MERGE {}", self.merges.render(style)));
        }
        if !self.on_create.is_empty() {
            lines.push(format!("ON CREATE SET {}", render_set_items(&self.on_create, style)));
        }
        if !self.on_match.is_empty() {
            lines.push(format!("ON MATCH SET {}", render_set_items(&self.on_match, style)));
        }
        if !self.sets.is_empty() {
            lines.push(format!("SET {}", render_set_items(&self.sets, style)));
        }
        if !self.deletes.is_empty() {
            let keyword = if self.detach { "DETACH DELETE" } else { "DELETE" };
            lines.push(format!("{keyword} {}", self.deletes.join(", ")));
        }
        if !returns.is_empty() {
            lines.push(format!("RETURN {}", returns.join(", ")));
        }
        if !self.order.is_empty() {
            lines.push(format!("ORDER BY {}", render_order(&self.order)));
        }
        if let Some(limit) = self.limit {
            lines.push(format!("LIMIT {limit}"));
        }

        let query = lines.join("\n");
        let params = self.session.params;
        trace!(lines = lines.len(), params = params.len(), "query.builder.rendered");
        Ok(BuiltQuery { query, params })
    }

    fn resolve_returns(&self) -> BuildResult<Vec<String>> {
        if self.return_disabled {
            return Ok(Vec::new());
        }
        if self.returns.is_empty() {
            return match self.session.references() {
                [only] => Ok(vec![only.clone()]),
                _ => Err(BuildError::MissingReturn),
            };
        }
        for alias in &self.returns {
            if !self.session.has_reference(alias) {
                return Err(BuildError::ReturnNotRef {
                    alias: alias.clone(),
                });
            }
        }
        Ok(self.returns.clone())
    }

    fn require_reference(&self, reference: &str, context: &'static str) -> BuildResult<()> {
        if self.error.is_some() || self.session.has_reference(reference) {
            return Ok(());
        }
        Err(BuildError::UnknownRef {
            reference: reference.to_owned(),
            context,
        })
    }

    fn fail(mut self, err: BuildError) -> Self {
        self.record_error(err);
        self
    }

    fn record_error(&mut self, err: BuildError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

pub(crate) fn render_set_items(items: &[SetItem], style: ParamStyle) -> String {
    items
        .iter()
        .map(|item| match item {
            SetItem::Property {
                reference,
                property,
                parameter,
            } => format!(
                "{reference}.{} = {}",
                quote(property),
                style.placeholder(parameter)
            ),
            SetItem::Timestamp {
                reference,
                property,
            } => format!("{reference}.{} = timestamp()", quote(property)),
            SetItem::Replace { reference, source } => format!("{reference} = {source}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_order(order: &[OrderSpec]) -> String {
    order
        .iter()
        .map(|spec| match spec.direction {
            SortDirection::Ascending => format!("{}.{}", spec.reference, quote(&spec.property)),
            SortDirection::Descending => {
                format!("{}.{} DESC", spec.reference, quote(&spec.property))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Typed predicate collector used by [`QueryBuilder::where_ref`].
#[derive(Debug, Default)]
pub struct PredicateBuilder {
    exprs: Vec<Criteria>,
}

impl PredicateBuilder {
    fn push(&mut self, property: &str, operator: Operator, value: Value) -> &mut Self {
        self.exprs.push(Criteria::Comparator {
            property: property.to_owned(),
            operator,
            value,
        });
        self
    }

    fn finish(self) -> Option<Criteria> {
        let mut exprs = self.exprs;
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Criteria::And(exprs)),
        }
    }

    /// `property = value`
    pub fn eq(&mut self, property: &str, value: impl Into<Value>) -> &mut Self {
        self.push(property, Operator::Eq, value.into())
    }

    /// `property <> value`
    pub fn ne(&mut self, property: &str, value: impl Into<Value>) -> &mut Self {
        self.push(property, Operator::Ne, value.into())
    }

    /// `property < value`
    pub fn lt(&mut self, property: &str, value: impl Into<Value>) -> &mut Self {
        self.push(property, Operator::Lt, value.into())
    }

    /// `property <= value`
    pub fn le(&mut self, property: &str, value: impl Into<Value>) -> &mut Self {
        self.push(property, Operator::Le, value.into())
    }

    /// `property > value`
    pub fn gt(&mut self, property: &str, value: impl Into<Value>) -> &mut Self {
        self.push(property, Operator::Gt, value.into())
    }

    /// `property >= value`
    pub fn ge(&mut self, property: &str, value: impl Into<Value>) -> &mut Self {
        self.push(property, Operator::Ge, value.into())
    }

    /// `property IN values`
    pub fn in_list<I, V>(&mut self, property: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(property, Operator::In, Value::Array(values))
    }

    /// `EXISTS(property)`
    pub fn exists(&mut self, property: &str) -> &mut Self {
        self.push(property, Operator::Exists, Value::Bool(true))
    }

    /// `NOT EXISTS(property)`
    pub fn not_exists(&mut self, property: &str) -> &mut Self {
        self.push(property, Operator::Exists, Value::Bool(false))
    }

    /// Nested OR group.
    pub fn any<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        self.group(build, Criteria::Or)
    }

    /// Nested AND group.
    pub fn all<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        self.group(build, Criteria::And)
    }

    fn group<F>(&mut self, build: F, wrap: fn(Vec<Criteria>) -> Criteria) -> &mut Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        let mut nested = PredicateBuilder::default();
        build(&mut nested);
        if !nested.exprs.is_empty() {
            self.exprs.push(wrap(nested.exprs));
        }
        self
    }
}
