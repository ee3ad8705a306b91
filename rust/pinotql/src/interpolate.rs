//! Template-variable substitution over a persisted query.
//!
//! Interpolation produces a copy for execution only; the editor's params keep the raw
//! `$variable` text.

use crate::model::{
    ComplexField, DimensionFilter, JsonExtractor, OrderByClause, PersistedQuery, QueryOption,
    RegexpExtractor,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Replaces variable references inside a piece of text.
pub trait VariableResolver {
    fn replace(&self, text: &str) -> String;
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> String,
{
    fn replace(&self, text: &str) -> String {
        self(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Single(String),
    Multi(Vec<String>),
}

impl VariableValue {
    fn render(&self, format: Option<&str>) -> String {
        let values: Vec<&str> = match self {
            VariableValue::Single(value) => vec![value.as_str()],
            VariableValue::Multi(values) => values.iter().map(String::as_str).collect(),
        };

        match format {
            Some("pipe") => values.join("|"),
            Some("singlequote") => values
                .iter()
                .map(|value| format!("'{}'", value.replace('\'', "\\'")))
                .collect::<Vec<_>>()
                .join(","),
            Some("doublequote") => values
                .iter()
                .map(|value| format!("\"{}\"", value.replace('"', "\\\"")))
                .collect::<Vec<_>>()
                .join(","),
            _ => values.join(","),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::Single(value.to_string())
    }
}

impl From<Vec<&str>> for VariableValue {
    fn from(values: Vec<&str>) -> Self {
        VariableValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(\w+)(?::(\w+))?\}|\[\[(\w+)(?::(\w+))?\]\]|\$(\w+)")
        .expect("variable pattern compiles")
});

/// Named dashboard variables. Names are stored without their `$` sigil.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, VariableValue>", into = "HashMap<String, VariableValue>")]
pub struct TemplateVariables {
    values: HashMap<String, VariableValue>,
}

impl TemplateVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<VariableValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<VariableValue>) {
        self.values
            .insert(name.trim_start_matches('$').to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.values.get(name.trim_start_matches('$'))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl From<HashMap<String, VariableValue>> for TemplateVariables {
    fn from(raw: HashMap<String, VariableValue>) -> Self {
        let mut variables = TemplateVariables::new();
        for (name, value) in raw {
            variables.insert(&name, value);
        }
        variables
    }
}

impl From<TemplateVariables> for HashMap<String, VariableValue> {
    fn from(variables: TemplateVariables) -> Self {
        variables.values
    }
}

impl VariableResolver for TemplateVariables {
    fn replace(&self, text: &str) -> String {
        if self.values.is_empty() || !(text.contains('$') || text.contains("[[")) {
            return text.to_string();
        }

        VARIABLE_PATTERN
            .replace_all(text, |caps: &Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(5))
                    .map_or("", |m| m.as_str());
                let format = caps.get(2).or_else(|| caps.get(4)).map(|m| m.as_str());

                match self.values.get(name) {
                    Some(value) if !name.starts_with("__") => value.render(format),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Structural substitution: each string-bearing leaf goes through the resolver.
trait Interpolate: Sized {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self;
}

impl Interpolate for String {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self {
        resolver.replace(self)
    }
}

impl<T: Interpolate> Interpolate for Option<T> {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self {
        self.as_ref().map(|value| value.interpolate(resolver))
    }
}

impl<T: Interpolate> Interpolate for Vec<T> {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self {
        self.iter().map(|value| value.interpolate(resolver)).collect()
    }
}

impl Interpolate for ComplexField {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self {
        ComplexField {
            name: self.name.interpolate(resolver),
            key: self.key.interpolate(resolver),
        }
    }
}

impl Interpolate for DimensionFilter {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self {
        DimensionFilter {
            column_name: self.column_name.interpolate(resolver),
            column_key: self.column_key.interpolate(resolver),
            operator: self.operator.clone(),
            value_exprs: self.value_exprs.interpolate(resolver),
        }
    }
}

impl Interpolate for OrderByClause {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self {
        OrderByClause {
            column_name: self.column_name.interpolate(resolver),
            column_key: self.column_key.interpolate(resolver),
            direction: self.direction,
        }
    }
}

impl Interpolate for QueryOption {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self {
        QueryOption {
            name: self.name.interpolate(resolver),
            value: self.value.interpolate(resolver),
        }
    }
}

impl Interpolate for JsonExtractor {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self {
        JsonExtractor {
            source: self.source.interpolate(resolver),
            path: self.path.interpolate(resolver),
            result_type: self.result_type.interpolate(resolver),
            alias: self.alias.interpolate(resolver),
        }
    }
}

impl Interpolate for RegexpExtractor {
    fn interpolate(&self, resolver: &dyn VariableResolver) -> Self {
        RegexpExtractor {
            source: self.source.interpolate(resolver),
            pattern: self.pattern.interpolate(resolver),
            group: self.group,
            alias: self.alias.interpolate(resolver),
        }
    }
}

/// Returns a copy of `query` with variables resolved in every editor string. Discriminators,
/// numbers and host-owned fields are copied unchanged.
pub fn interpolate_query<R>(query: &PersistedQuery, resolver: &R) -> PersistedQuery
where
    R: VariableResolver + ?Sized,
{
    let r: &dyn VariableResolver = &|text: &str| resolver.replace(text);

    PersistedQuery {
        table_name: query.table_name.interpolate(r),
        time_column: query.time_column.interpolate(r),
        metric_column: query.metric_column.interpolate(r),
        metric_column_v2: query.metric_column_v2.interpolate(r),
        granularity: query.granularity.interpolate(r),
        aggregation_function: query.aggregation_function.interpolate(r),
        group_by_columns: query.group_by_columns.interpolate(r),
        group_by_columns_v2: query.group_by_columns_v2.interpolate(r),
        order_by: query.order_by.interpolate(r),
        filters: query.filters.interpolate(r),
        query_options: query.query_options.interpolate(r),
        legend: query.legend.interpolate(r),
        pinot_ql_code: query.pinot_ql_code.interpolate(r),
        time_column_alias: query.time_column_alias.interpolate(r),
        metric_column_alias: query.metric_column_alias.interpolate(r),
        log_column: query.log_column.interpolate(r),
        log_column_alias: query.log_column_alias.interpolate(r),
        metadata_columns: query.metadata_columns.interpolate(r),
        json_extractors: query.json_extractors.interpolate(r),
        regexp_extractors: query.regexp_extractors.interpolate(r),
        column_name: query.column_name.interpolate(r),
        ..query.clone()
    }
}
