//! Persisted query shape and the value types shared by every editor mode.

use crate::{
    codec::complex_field::column_label_of,
    error::{EditorError, Result},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;

pub const AGGREGATION_COUNT: &str = "COUNT";
pub const AGGREGATION_SUM: &str = "SUM";

/// Execution hints the query endpoint understands. Custom names are still accepted.
pub const QUERY_OPTION_NAMES: &[&str] = &[
    "timeoutMs",
    "useMultistageEngine",
    "enableNullHandling",
    "maxExecutionThreads",
    "maxServerResponseSizeBytes",
    "numReplicaGroupsToQuery",
    "skipUpsert",
    "skipIndexes",
    "useStarTree",
    "minSegmentGroupTrimSize",
    "groupTrimThreshold",
];

/// A column reference: either a top-level column or a keyed sub-field of a composite column.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplexField {
    pub name: Option<String>,
    pub key: Option<String>,
}

impl ComplexField {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            key: None,
        }
    }

    pub fn keyed(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            key: Some(key.into()),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or_default()
    }

    /// Fields without a name never participate in a request.
    pub fn is_empty(&self) -> bool {
        self.name().is_empty()
    }

    pub fn label(&self) -> String {
        column_label_of(self.name(), self.key())
    }

    pub fn non_empty(&self) -> Option<ComplexField> {
        if self.is_empty() {
            None
        } else {
            Some(self.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(SortDirection::Asc),
            "DESC" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 8] = [
        FilterOperator::Eq,
        FilterOperator::NotEq,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::Like,
        FilterOperator::NotLike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::Like => "like",
            FilterOperator::NotLike => "not like",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == normalized.as_str())
    }

    /// `=` and `!=` accept a value list; every other operator compares against one value.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, FilterOperator::Eq | FilterOperator::NotEq)
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionFilter {
    pub column_name: Option<String>,
    pub column_key: Option<String>,
    pub operator: Option<String>,
    pub value_exprs: Option<Vec<String>>,
}

impl DimensionFilter {
    pub fn column(&self) -> ComplexField {
        ComplexField {
            name: self.column_name.clone(),
            key: self.column_key.clone(),
        }
    }

    /// Returns `None` for absent or unrecognized operators.
    pub fn operator(&self) -> Option<FilterOperator> {
        self.operator.as_deref().and_then(FilterOperator::parse)
    }

    pub fn values(&self) -> &[String] {
        self.value_exprs.as_deref().unwrap_or_default()
    }

    /// Switching to a single-valued operator drops every value past the first.
    pub fn set_operator(&mut self, operator: FilterOperator) {
        self.operator = Some(operator.as_str().to_string());
        self.truncate_to_arity();
    }

    pub fn normalized(&self) -> DimensionFilter {
        let mut filter = self.clone();
        filter.truncate_to_arity();
        filter
    }

    fn truncate_to_arity(&mut self) {
        let single = self.operator().is_some_and(|op| !op.is_multi_valued());
        if let (true, Some(values)) = (single, self.value_exprs.as_mut()) {
            values.truncate(1);
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderByClause {
    pub column_name: Option<String>,
    pub column_key: Option<String>,
    pub direction: Option<SortDirection>,
}

impl OrderByClause {
    pub fn new(column: ComplexField, direction: SortDirection) -> Self {
        Self {
            column_name: column.name,
            column_key: column.key,
            direction: Some(direction),
        }
    }

    pub fn column(&self) -> ComplexField {
        ComplexField {
            name: self.column_name.clone(),
            key: self.column_key.clone(),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOption {
    pub name: Option<String>,
    pub value: Option<String>,
}

impl QueryOption {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
        }
    }

    pub fn is_known(&self) -> bool {
        self.name
            .as_deref()
            .is_some_and(|name| QUERY_OPTION_NAMES.contains(&name))
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExtractor {
    pub source: Option<ComplexField>,
    pub path: Option<String>,
    pub result_type: Option<String>,
    pub alias: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexpExtractor {
    pub source: Option<ComplexField>,
    pub pattern: Option<String>,
    pub group: Option<i64>,
    pub alias: Option<String>,
}

impl RegexpExtractor {
    /// Replaces the pattern only when it compiles; an invalid pattern leaves the previous one.
    pub fn set_pattern(&mut self, pattern: &str) -> Result<()> {
        Regex::new(pattern).map_err(|err| EditorError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        self.pattern = Some(pattern.to_string());
        Ok(())
    }

    pub fn has_valid_pattern(&self) -> bool {
        self.pattern
            .as_deref()
            .is_some_and(|pattern| Regex::new(pattern).is_ok())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditorMode {
    #[default]
    Builder,
    Code,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayType {
    #[default]
    Timeseries,
    Table,
    Logs,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableType {
    #[default]
    TableList,
    ColumnList,
    DistinctValues,
    PinotQl,
}

impl VariableType {
    pub fn needs_table(&self) -> bool {
        !matches!(self, VariableType::TableList)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VariableColumnType {
    Dimension,
    Metric,
    #[serde(rename = "DATETIME")]
    DateTime,
    #[default]
    All,
}

/// Storage and transport form of a query. Holds the fields of every editor mode at once;
/// only the active mode's subset is ever populated.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQuery {
    pub ref_id: Option<String>,
    pub hide: Option<bool>,

    pub editor_mode: Option<EditorMode>,
    pub display_type: Option<DisplayType>,
    pub variable_type: Option<VariableType>,

    pub table_name: Option<String>,
    pub time_column: Option<String>,
    /// Legacy plain-string metric column, superseded by `metric_column_v2`.
    #[serde(rename = "metricColumn")]
    pub metric_column: Option<String>,
    #[serde(rename = "metricColumnV2")]
    pub metric_column_v2: Option<ComplexField>,
    pub granularity: Option<String>,
    pub aggregation_function: Option<String>,
    pub limit: Option<i64>,
    /// Legacy plain-string group-by list, superseded by `group_by_columns_v2`.
    #[serde(rename = "groupByColumns")]
    pub group_by_columns: Option<Vec<String>>,
    #[serde(rename = "groupByColumnsV2")]
    pub group_by_columns_v2: Option<Vec<ComplexField>>,
    pub order_by: Option<Vec<OrderByClause>>,
    pub filters: Option<Vec<DimensionFilter>>,
    pub query_options: Option<Vec<QueryOption>>,
    pub legend: Option<String>,
    pub series_limit: Option<i64>,

    pub pinot_ql_code: Option<String>,
    pub time_column_alias: Option<String>,
    pub metric_column_alias: Option<String>,

    pub log_column: Option<ComplexField>,
    pub log_column_alias: Option<String>,
    pub metadata_columns: Option<Vec<ComplexField>>,
    pub json_extractors: Option<Vec<JsonExtractor>>,
    pub regexp_extractors: Option<Vec<RegexpExtractor>>,

    pub column_name: Option<String>,
    pub column_type: Option<VariableColumnType>,

    /// Host-owned keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PersistedQuery {
    /// A query holding only the fields owned by the host, with every editor field cleared.
    pub fn host_fields(&self) -> PersistedQuery {
        PersistedQuery {
            ref_id: self.ref_id.clone(),
            hide: self.hide,
            extra: self.extra.clone(),
            ..Default::default()
        }
    }
}
