//! High-level node and relationship operations.
//!
//! Every operation builds a fresh [`QueryBuilder`], dispatches it through the
//! connection's [`GraphExecutor`](crate::service::GraphExecutor) and reshapes
//! the returned entities. Build failures are reported before anything is
//! sent; server failures are returned unchanged.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::codec::encode_params;
use crate::config::ConnectionConfig;
use crate::query::ast::without_identity_keys;
use crate::query::criteria::parse_sort;
use crate::query::{
    BuildError, BuiltQuery, CreateBuilder, Direction, FindCriteria, MatchStep, ParamStyle,
    QueryBuilder, SortKey,
};
use crate::record::{reshape, reshape_row, NormalizedRecord, RawRow, RecordRow};
use crate::registry::ConnectionRegistry;
use crate::Result;

const PRED: &str = "a";
const SUCC: &str = "b";
const REL: &str = "r";
const NODE: &str = "n";
const LINK: &str = "n";
const LAST_SEEN: &str = "lastSeen";

/// Endpoint criteria and relationship shape shared by traversal, link and
/// unlink operations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Traversal {
    /// Predecessor label.
    pub label: Option<String>,
    /// Predecessor criteria (flat property map or `and`/`or` groups).
    pub predecessor: Value,
    /// Successor label.
    pub successor_label: Option<String>,
    /// Successor criteria; a `sort` key orders the returned successors.
    pub successor: Value,
    /// Relationship type.
    pub rel_type: Option<String>,
    /// Inline relationship properties.
    pub rel_props: Map<String, Value>,
}

impl Traversal {
    /// Traversal over relationships of `rel_type`.
    pub fn new(rel_type: impl Into<String>) -> Self {
        Self {
            rel_type: Some(rel_type.into()),
            ..Self::default()
        }
    }

    /// Sets the predecessor label and criteria.
    pub fn with_predecessor(mut self, label: Option<&str>, criteria: Value) -> Self {
        self.label = label.map(str::to_owned);
        self.predecessor = criteria;
        self
    }

    /// Sets the successor label and criteria.
    pub fn with_successor(mut self, label: Option<&str>, criteria: Value) -> Self {
        self.successor_label = label.map(str::to_owned);
        self.successor = criteria;
        self
    }

    /// Sets inline relationship properties.
    pub fn with_rel_props(mut self, props: Map<String, Value>) -> Self {
        self.rel_props = props;
        self
    }

    fn required_type(&self) -> std::result::Result<&str, BuildError> {
        self.rel_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(BuildError::MissingLinkType)
    }
}

/// Arguments of [`GraphAdapter::update_link`]. Always matches outbound
/// relationships.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkUpdate {
    /// Start node label.
    pub from_label: Option<String>,
    /// Start node criteria.
    pub from: Value,
    /// End node label.
    pub to_label: Option<String>,
    /// End node criteria.
    pub to: Value,
    /// Relationship type; required.
    pub rel_type: Option<String>,
    /// Properties the existing relationship must carry.
    pub match_props: Map<String, Value>,
    /// New property values; `id` and `_id` are ignored.
    pub update_props: Option<Map<String, Value>>,
}

/// Async operations over registered connections.
#[derive(Debug, Clone)]
pub struct GraphAdapter {
    registry: Arc<ConnectionRegistry>,
}

impl GraphAdapter {
    /// Wraps a registry shared with other adapters.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Underlying registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Registers a logical connection; see [`ConnectionRegistry::register`].
    pub fn register_connection(&self, identity: &str, config: ConnectionConfig) -> Result<()> {
        Ok(self.registry.register(identity, config)?)
    }

    /// Empty builder using the connection's placeholder style.
    pub fn build_query(&self, connection: &str) -> Result<QueryBuilder> {
        let config = self.registry.connection(connection)?;
        Ok(QueryBuilder::with_param_style(config.config().param_style))
    }

    /// Node step whose reference and label are both `label`.
    pub fn to_node(label: &str) -> MatchStep {
        MatchStep::node().with_ref(label).label(label)
    }

    /// Runs `built` and reshapes every column of every row.
    pub async fn query_raw(&self, connection: &str, built: &BuiltQuery) -> Result<Vec<RecordRow>> {
        let rows = self.dispatch(connection, built).await?;
        Ok(rows.into_iter().map(reshape_row).collect())
    }

    /// Runs `built` and keeps only the `alias` column.
    pub async fn query(
        &self,
        connection: &str,
        built: &BuiltQuery,
        alias: &str,
    ) -> Result<Vec<NormalizedRecord>> {
        let rows = self.dispatch(connection, built).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove(alias))
            .map(reshape)
            .collect())
    }

    /// Creates one node.
    pub async fn create(
        &self,
        connection: &str,
        label: Option<&str>,
        props: &Map<String, Value>,
    ) -> Result<Vec<NormalizedRecord>> {
        let built = self.create_builder(connection, label)?.one(props)?;
        self.query(connection, &built, NODE).await
    }

    /// Creates one node per row of `{key: [attributes, ...]}`.
    pub async fn create_many(
        &self,
        connection: &str,
        label: Option<&str>,
        payload: &Value,
    ) -> Result<Vec<NormalizedRecord>> {
        let built = self.create_builder(connection, label)?.many(payload)?;
        self.query(connection, &built, NODE).await
    }

    /// Finds nodes matching `{where?, sort?|order?, limit?}`.
    pub async fn find(
        &self,
        connection: &str,
        label: Option<&str>,
        criteria: &Value,
    ) -> Result<Vec<NormalizedRecord>> {
        let style = self.registry.connection(connection)?.config().param_style;
        let built = find_query(label, criteria, style)?;
        self.query(connection, &built, NODE).await
    }

    /// Sets `values` (minus `id`/`_id`) on every matching node.
    pub async fn update(
        &self,
        connection: &str,
        label: Option<&str>,
        criteria: &Value,
        values: &Map<String, Value>,
    ) -> Result<Vec<NormalizedRecord>> {
        let values = without_identity_keys(values);
        if values.is_empty() {
            return Err(BuildError::MissingUpdateValues.into());
        }
        let find = FindCriteria::from_json(criteria)?;
        let built = self
            .build_query(connection)?
            .namespace(NODE, "old")
            .r#match(MatchStep::node().with_ref(NODE).maybe_label(label))
            .where_scoped(NODE, find.filter.as_ref().unwrap_or(&Value::Null))
            .set_in_namespace(NODE, "new", &values)
            .to_query()?;
        self.query(connection, &built, NODE).await
    }

    /// Deletes matching nodes. Nodes that still have relationships make the
    /// server fail the statement; that error is returned as is.
    pub async fn destroy(&self, connection: &str, label: Option<&str>, criteria: &Value) -> Result<()> {
        self.delete_nodes(connection, label, criteria, false).await
    }

    /// Deletes matching nodes together with their relationships.
    pub async fn detach_destroy(
        &self,
        connection: &str,
        label: Option<&str>,
        criteria: &Value,
    ) -> Result<()> {
        self.delete_nodes(connection, label, criteria, true).await
    }

    /// Successors over relationships in either direction.
    pub async fn get_related_nodes(&self, connection: &str, t: &Traversal) -> Result<Vec<NormalizedRecord>> {
        self.related_nodes(connection, t, Direction::Undirected).await
    }

    /// Successors over outbound relationships.
    pub async fn get_out_nodes(&self, connection: &str, t: &Traversal) -> Result<Vec<NormalizedRecord>> {
        self.related_nodes(connection, t, Direction::Out).await
    }

    /// Successors over inbound relationships.
    pub async fn get_in_nodes(&self, connection: &str, t: &Traversal) -> Result<Vec<NormalizedRecord>> {
        self.related_nodes(connection, t, Direction::In).await
    }

    /// Relationships in either direction.
    pub async fn get_links(&self, connection: &str, t: &Traversal) -> Result<Vec<NormalizedRecord>> {
        self.related_links(connection, t, Direction::Undirected).await
    }

    /// Outbound relationships.
    pub async fn get_out_links(&self, connection: &str, t: &Traversal) -> Result<Vec<NormalizedRecord>> {
        self.related_links(connection, t, Direction::Out).await
    }

    /// Inbound relationships.
    pub async fn get_in_links(&self, connection: &str, t: &Traversal) -> Result<Vec<NormalizedRecord>> {
        self.related_links(connection, t, Direction::In).await
    }

    /// Creates an outbound relationship between the matched endpoints, or
    /// stamps `lastSeen` on the existing one.
    pub async fn link(&self, connection: &str, t: &Traversal) -> Result<Vec<NormalizedRecord>> {
        let rel_type = t.required_type()?;
        let built = self
            .build_query(connection)?
            .namespace(PRED, "pred")
            .namespace(SUCC, "succ")
            .namespace(LINK, "rel")
            .r#match(MatchStep::node().with_ref(PRED).maybe_label(t.label.as_deref()))
            .r#match(
                MatchStep::node()
                    .with_ref(SUCC)
                    .maybe_label(t.successor_label.as_deref()),
            )
            .where_scoped(PRED, &t.predecessor)
            .where_scoped(SUCC, &t.successor)
            .merge([
                MatchStep::bound(PRED),
                MatchStep::rel()
                    .with_ref(LINK)
                    .label(rel_type)
                    .direction(Direction::Out)
                    .properties(t.rel_props.clone()),
                MatchStep::bound(SUCC),
            ])
            .on_match_timestamp(LINK, LAST_SEEN)
            .returns([LINK])
            .to_query()?;
        self.query(connection, &built, LINK).await
    }

    /// Deletes matching relationships and returns the successors they
    /// pointed at. No match is an empty result.
    pub async fn unlink(&self, connection: &str, t: &Traversal) -> Result<Vec<NormalizedRecord>> {
        let rel_type = t.required_type()?;
        let built = self
            .build_query(connection)?
            .namespace(PRED, "pred")
            .namespace(SUCC, "succ")
            .namespace(REL, "rel")
            .match_chain(traversal_chain(t, Some(rel_type), Direction::Undirected))
            .where_scoped(PRED, &t.predecessor)
            .where_scoped(SUCC, &t.successor)
            .delete(REL)
            .returns([SUCC])
            .to_query()?;
        self.query(connection, &built, SUCC).await
    }

    /// Updates properties of matching outbound relationships.
    pub async fn update_link(&self, connection: &str, update: &LinkUpdate) -> Result<Vec<NormalizedRecord>> {
        let rel_type = update
            .rel_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(BuildError::MissingLinkType)?;
        let values = update
            .update_props
            .as_ref()
            .map(without_identity_keys)
            .filter(|values| !values.is_empty())
            .ok_or(BuildError::MissingLinkUpdate)?;
        let built = self
            .build_query(connection)?
            .namespace(PRED, "from")
            .namespace(SUCC, "to")
            .namespace(LINK, "old_rel")
            .match_chain([
                MatchStep::node()
                    .with_ref(PRED)
                    .maybe_label(update.from_label.as_deref()),
                MatchStep::rel()
                    .with_ref(LINK)
                    .label(rel_type)
                    .direction(Direction::Out)
                    .properties(update.match_props.clone()),
                MatchStep::node()
                    .with_ref(SUCC)
                    .maybe_label(update.to_label.as_deref()),
            ])
            .where_scoped(PRED, &update.from)
            .where_scoped(SUCC, &update.to)
            .set_in_namespace(LINK, "new_rel", &values)
            .returns([LINK])
            .to_query()?;
        self.query(connection, &built, LINK).await
    }

    async fn related_nodes(
        &self,
        connection: &str,
        t: &Traversal,
        direction: Direction,
    ) -> Result<Vec<NormalizedRecord>> {
        let (successor, sort) = split_sort(&t.successor)?;
        let built = self
            .traversal_builder(connection, t, direction)?
            .where_scoped(SUCC, &successor)
            .order_by_keys(SUCC, &sort)
            .returns([SUCC])
            .to_query()?;
        self.query(connection, &built, SUCC).await
    }

    async fn related_links(
        &self,
        connection: &str,
        t: &Traversal,
        direction: Direction,
    ) -> Result<Vec<NormalizedRecord>> {
        let (successor, _) = split_sort(&t.successor)?;
        let built = self
            .traversal_builder(connection, t, direction)?
            .where_scoped(SUCC, &successor)
            .returns([REL])
            .to_query()?;
        self.query(connection, &built, REL).await
    }

    fn traversal_builder(&self, connection: &str, t: &Traversal, direction: Direction) -> Result<QueryBuilder> {
        Ok(self
            .build_query(connection)?
            .namespace(PRED, "pred")
            .namespace(SUCC, "succ")
            .namespace(REL, "rel")
            .match_chain(traversal_chain(t, t.rel_type.as_deref(), direction))
            .where_scoped(PRED, &t.predecessor))
    }

    async fn delete_nodes(
        &self,
        connection: &str,
        label: Option<&str>,
        criteria: &Value,
        detach: bool,
    ) -> Result<()> {
        let find = FindCriteria::from_json(criteria)?;
        let builder = self
            .build_query(connection)?
            .r#match(MatchStep::node().with_ref(NODE).maybe_label(label))
            .where_scoped(NODE, find.filter.as_ref().unwrap_or(&Value::Null));
        let builder = if detach {
            builder.detach_delete(NODE)
        } else {
            builder.delete(NODE)
        };
        let built = builder.without_return().to_query()?;
        self.dispatch(connection, &built).await?;
        Ok(())
    }

    fn create_builder(&self, connection: &str, label: Option<&str>) -> Result<CreateBuilder> {
        let config = self.registry.connection(connection)?;
        Ok(CreateBuilder::new(label).with_param_style(config.config().param_style))
    }

    async fn dispatch(&self, connection: &str, built: &BuiltQuery) -> Result<Vec<RawRow>> {
        let handle = self.registry.connection(connection)?;
        let executor = self.registry.executor(connection).await?;
        let params = encode_params(&built.params);
        if handle.config().debug {
            info!(connection, query = %built.query, params = params.len(), "adapter.query.dispatch");
        } else {
            debug!(connection, query = %built.query, params = params.len(), "adapter.query.dispatch");
        }
        let rows = executor
            .execute(&built.query, &params)
            .await
            .map_err(|err| {
                warn!(connection, error = %err, "adapter.query.failed");
                err
            })?;
        debug!(connection, rows = rows.len(), "adapter.query.complete");
        Ok(rows)
    }
}

/// The statement [`GraphAdapter::find`] sends, built without a connection.
pub fn find_query(
    label: Option<&str>,
    criteria: &Value,
    style: ParamStyle,
) -> std::result::Result<BuiltQuery, BuildError> {
    let find = FindCriteria::from_json(criteria)?;
    let mut builder = QueryBuilder::with_param_style(style)
        .r#match(MatchStep::node().with_ref(NODE).maybe_label(label))
        .where_scoped(NODE, find.filter.as_ref().unwrap_or(&Value::Null))
        .order_by_keys(NODE, &find.sort);
    if let Some(limit) = find.limit {
        builder = builder.limit(limit);
    }
    builder.to_query()
}

fn traversal_chain(t: &Traversal, rel_type: Option<&str>, direction: Direction) -> [MatchStep; 3] {
    [
        MatchStep::node().with_ref(PRED).maybe_label(t.label.as_deref()),
        MatchStep::rel()
            .with_ref(REL)
            .maybe_label(rel_type)
            .direction(direction)
            .properties(t.rel_props.clone()),
        MatchStep::node()
            .with_ref(SUCC)
            .maybe_label(t.successor_label.as_deref()),
    ]
}

/// Pulls `sort` out of successor criteria.
fn split_sort(raw: &Value) -> std::result::Result<(Value, Vec<SortKey>), BuildError> {
    match raw {
        Value::Object(obj) if obj.contains_key("sort") => {
            let mut rest = obj.clone();
            let sort = rest.remove("sort").unwrap_or(Value::Null);
            Ok((Value::Object(rest), parse_sort(&sort)?))
        }
        other => Ok((other.clone(), Vec::new())),
    }
}
