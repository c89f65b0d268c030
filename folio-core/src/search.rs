//! Search engine query model and the document-query converter seam

use crate::config::QueryConfig;
use crate::error::FolioError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Default full-text field namespace
pub const FULLTEXT_FIELD: &str = "ecm:fulltext";

/// Field targeted by full-text queries on the bare full-text namespace
const ALL_FIELD: &str = "_all";

/// Logical operator joining clauses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOperator {
    #[default]
    And,
    Or,
}

impl BoolOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Search engine query AST
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    MatchAll,
    /// Literal full-text query string, passed to the engine unparsed
    QueryString(String),
    SimpleQueryString {
        query: String,
        fields: Vec<String>,
        default_operator: BoolOperator,
    },
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Range {
        field: String,
        bounds: RangeBounds,
    },
    Prefix {
        field: String,
        value: String,
    },
    Wildcard {
        field: String,
        pattern: String,
    },
    Exists {
        field: String,
    },
    Bool {
        must: Vec<SearchQuery>,
        should: Vec<SearchQuery>,
        must_not: Vec<SearchQuery>,
    },
    /// Document-query clause handed to the engine-side converter as is
    Nxql(String),
}

/// Bounds of a range query; unset bounds are open
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl SearchQuery {
    pub fn query_string(query: impl Into<String>) -> Self {
        Self::QueryString(query.into())
    }

    pub fn term(field: impl Into<String>, value: Value) -> Self {
        Self::Term {
            field: field.into(),
            value,
        }
    }

    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Terms {
            field: field.into(),
            values,
        }
    }

    pub fn range(field: impl Into<String>, bounds: RangeBounds) -> Self {
        Self::Range {
            field: field.into(),
            bounds,
        }
    }

    /// Negate a query
    pub fn not(query: SearchQuery) -> Self {
        Self::Bool {
            must: Vec::new(),
            should: Vec::new(),
            must_not: vec![query],
        }
    }

    /// Render the engine's JSON query body
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::QueryString(query) => json!({ "query_string": { "query": query } }),
            Self::SimpleQueryString {
                query,
                fields,
                default_operator,
            } => json!({
                "simple_query_string": {
                    "query": query,
                    "fields": fields,
                    "default_operator": default_operator.as_str(),
                }
            }),
            Self::Term { field, value } => json!({ "term": { field.as_str(): value.to_json() } }),
            Self::Terms { field, values } => {
                let values: Vec<_> = values.iter().map(Value::to_json).collect();
                json!({ "terms": { field.as_str(): values } })
            }
            Self::Range { field, bounds } => {
                let mut body = serde_json::Map::new();
                for (key, bound) in [
                    ("gt", &bounds.gt),
                    ("gte", &bounds.gte),
                    ("lt", &bounds.lt),
                    ("lte", &bounds.lte),
                ] {
                    if let Some(v) = bound {
                        body.insert(key.to_string(), v.to_json());
                    }
                }
                json!({ "range": { field.as_str(): body } })
            }
            Self::Prefix { field, value } => json!({ "prefix": { field.as_str(): value } }),
            Self::Wildcard { field, pattern } => {
                json!({ "wildcard": { field.as_str(): pattern } })
            }
            Self::Exists { field } => json!({ "exists": { "field": field } }),
            Self::Bool {
                must,
                should,
                must_not,
            } => {
                let mut body = serde_json::Map::new();
                for (key, clauses) in [("must", must), ("should", should), ("must_not", must_not)] {
                    if !clauses.is_empty() {
                        body.insert(
                            key.to_string(),
                            serde_json::Value::Array(clauses.iter().map(Self::to_json).collect()),
                        );
                    }
                }
                json!({ "bool": body })
            }
            Self::Nxql(query) => json!({ "nxql": { "query": query } }),
        }
    }
}

/// Accumulates clauses and joins them with one logical operator
#[derive(Debug, Clone, Default)]
pub struct ExpressionBuilder {
    operator: BoolOperator,
    clauses: Vec<SearchQuery>,
}

impl ExpressionBuilder {
    pub fn new(operator: BoolOperator) -> Self {
        Self {
            operator,
            clauses: Vec::new(),
        }
    }

    pub fn add(&mut self, clause: SearchQuery) {
        self.clauses.push(clause);
    }

    /// No clause matches everything, a single clause stands alone.
    pub fn build(mut self) -> SearchQuery {
        match self.clauses.len() {
            0 => SearchQuery::MatchAll,
            1 => self.clauses.remove(0),
            _ => match self.operator {
                BoolOperator::And => SearchQuery::Bool {
                    must: self.clauses,
                    should: Vec::new(),
                    must_not: Vec::new(),
                },
                BoolOperator::Or => SearchQuery::Bool {
                    must: Vec::new(),
                    should: self.clauses,
                    must_not: Vec::new(),
                },
            },
        }
    }
}

/// Converts document-query text and simple predicate expressions into
/// search engine queries.
pub trait QueryConverter {
    /// Convert a complete document-query where clause
    fn convert(&self, nxql: &str) -> crate::Result<SearchQuery>;

    /// Build the query for `name <operator> value`.
    ///
    /// `values` holds the expanded value list for multi-valued operators
    /// (`IN`, `BETWEEN`); `value` is the first resolved value.
    fn simple_expression(
        &self,
        operator: &str,
        name: &str,
        value: &Value,
        values: &[Value],
    ) -> crate::Result<SearchQuery>;

    /// Namespace that marks full-text fields in predicate names
    fn fulltext_field(&self) -> &str {
        FULLTEXT_FIELD
    }
}

/// Converter shipped with the crate.
///
/// Whole clauses are deferred to the engine as [`SearchQuery::Nxql`];
/// simple expressions are mapped operator by operator.
#[derive(Debug, Clone)]
pub struct StandardConverter {
    fulltext_field: String,
}

impl Default for StandardConverter {
    fn default() -> Self {
        Self::new(FULLTEXT_FIELD)
    }
}

impl StandardConverter {
    pub fn new(fulltext_field: impl Into<String>) -> Self {
        Self {
            fulltext_field: fulltext_field.into(),
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(config.fulltext_field.as_str())
    }

    fn fulltext_target(&self, name: &str) -> Option<String> {
        if name == self.fulltext_field {
            return Some(ALL_FIELD.to_string());
        }
        name.strip_prefix(self.fulltext_field.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .map(str::to_string)
    }

    fn equality(&self, name: &str, value: &Value, values: &[Value]) -> SearchQuery {
        if let Some(field) = self.fulltext_target(name) {
            return SearchQuery::SimpleQueryString {
                query: value.to_string(),
                fields: vec![field],
                default_operator: BoolOperator::And,
            };
        }
        match value {
            Value::List(_) => SearchQuery::terms(name, values.to_vec()),
            _ => SearchQuery::term(name, value.clone()),
        }
    }
}

impl QueryConverter for StandardConverter {
    fn convert(&self, nxql: &str) -> crate::Result<SearchQuery> {
        Ok(SearchQuery::Nxql(nxql.trim().to_string()))
    }

    fn simple_expression(
        &self,
        operator: &str,
        name: &str,
        value: &Value,
        values: &[Value],
    ) -> crate::Result<SearchQuery> {
        let op = operator.trim().to_uppercase();
        let query = match op.as_str() {
            "=" => self.equality(name, value, values),
            "!=" | "<>" => SearchQuery::not(self.equality(name, value, values)),
            "<" => SearchQuery::range(
                name,
                RangeBounds {
                    lt: Some(value.clone()),
                    ..Default::default()
                },
            ),
            "<=" => SearchQuery::range(
                name,
                RangeBounds {
                    lte: Some(value.clone()),
                    ..Default::default()
                },
            ),
            ">" => SearchQuery::range(
                name,
                RangeBounds {
                    gt: Some(value.clone()),
                    ..Default::default()
                },
            ),
            ">=" => SearchQuery::range(
                name,
                RangeBounds {
                    gte: Some(value.clone()),
                    ..Default::default()
                },
            ),
            "IN" => SearchQuery::terms(name, values.to_vec()),
            "NOT IN" => SearchQuery::not(SearchQuery::terms(name, values.to_vec())),
            "BETWEEN" | "NOT BETWEEN" => {
                let [low, high, ..] = values else {
                    return Err(FolioError::UnsupportedOperator(format!(
                        "{} on {} needs two values, got {}",
                        op,
                        name,
                        values.len()
                    )));
                };
                let range = SearchQuery::range(
                    name,
                    RangeBounds {
                        gte: Some(low.clone()),
                        lte: Some(high.clone()),
                        ..Default::default()
                    },
                );
                if op == "BETWEEN" {
                    range
                } else {
                    SearchQuery::not(range)
                }
            }
            "LIKE" | "NOT LIKE" => {
                let wildcard = SearchQuery::Wildcard {
                    field: name.to_string(),
                    pattern: like_to_wildcard(&value.to_string()),
                };
                if op == "LIKE" {
                    wildcard
                } else {
                    SearchQuery::not(wildcard)
                }
            }
            "ILIKE" | "NOT ILIKE" => {
                let wildcard = SearchQuery::Wildcard {
                    field: name.to_string(),
                    pattern: like_to_wildcard(&value.to_string().to_lowercase()),
                };
                if op == "ILIKE" {
                    wildcard
                } else {
                    SearchQuery::not(wildcard)
                }
            }
            "STARTSWITH" => SearchQuery::Prefix {
                field: name.to_string(),
                value: value.to_string(),
            },
            "IS NULL" => SearchQuery::not(SearchQuery::Exists {
                field: name.to_string(),
            }),
            "IS NOT NULL" => SearchQuery::Exists {
                field: name.to_string(),
            },
            _ => return Err(FolioError::UnsupportedOperator(op)),
        };
        Ok(query)
    }

    fn fulltext_field(&self) -> &str {
        &self.fulltext_field
    }
}

/// Translate a LIKE pattern (`%`, `_`) into an engine wildcard (`*`, `?`)
fn like_to_wildcard(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut escaped = false;
    for c in pattern.chars() {
        match c {
            '\\' if !escaped => escaped = true,
            '%' if !escaped => out.push('*'),
            '_' if !escaped => out.push('?'),
            _ => {
                out.push(c);
                escaped = false;
            }
        }
    }
    out
}
