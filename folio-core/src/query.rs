//! Search query construction from patterns and where clauses

use crate::config::{ProviderDefinition, ProviderSource};
use crate::document::DocumentModel;
use crate::error::FolioError;
use crate::search::{BoolOperator, ExpressionBuilder, QueryConverter, SearchQuery};
use crate::value::Value;
use crate::where_clause::{PredicateDefinition, PredicateField, WhereClauseDefinition};

const PLACEHOLDER: char = '?';

/// Builds search engine queries, delegating document-query text to a
/// [`QueryConverter`]. FULLTEXT predicates use the converter's full-text
/// namespace.
pub struct QueryBuilder<'c> {
    converter: &'c dyn QueryConverter,
}

impl<'c> QueryBuilder<'c> {
    pub fn new(converter: &'c dyn QueryConverter) -> Self {
        Self { converter }
    }

    /// Build a query from a pattern with positional `?` placeholders.
    ///
    /// With `use_native` the substituted text becomes a literal query
    /// string, otherwise it goes through the converter.
    pub fn make_query(
        &self,
        pattern: &str,
        params: &[Value],
        quote_parameters: bool,
        escape_parameters: bool,
        use_native: bool,
    ) -> crate::Result<SearchQuery> {
        let query = substitute_parameters(pattern, params, quote_parameters, escape_parameters)?;
        tracing::trace!(pattern, query = %query, use_native, "substituted query pattern");
        if use_native {
            Ok(SearchQuery::query_string(query))
        } else {
            self.converter.convert(&query)
        }
    }

    /// Build the conjunction of a where clause's fixed part and its
    /// predicates evaluated against `doc`.
    ///
    /// The fixed part is only used when `params` is given. Predicates whose
    /// fields all resolve to absent values are skipped.
    pub fn make_where_clause_query(
        &self,
        doc: &DocumentModel,
        where_clause: &WhereClauseDefinition,
        params: Option<&[Value]>,
        use_native: bool,
    ) -> crate::Result<SearchQuery> {
        let mut eb = ExpressionBuilder::new(BoolOperator::And);

        if let (Some(params), Some(fixed_part)) = (params, where_clause.fixed_part.as_deref()) {
            let fixed = substitute_parameters(fixed_part, params, true, false)?;
            if !fixed.trim().is_empty() {
                if use_native {
                    eb.add(SearchQuery::query_string(fixed));
                } else {
                    eb.add(self.converter.convert(&fixed)?);
                }
            }
        }

        for predicate in &where_clause.predicates {
            if let Some(clause) = self.predicate_query(doc, predicate)? {
                eb.add(clause);
            }
        }

        Ok(eb.build())
    }

    /// Build the query of a configured provider
    pub fn make_provider_query(
        &self,
        provider: &ProviderDefinition,
        doc: Option<&DocumentModel>,
        params: &[Value],
        use_native: bool,
    ) -> crate::Result<SearchQuery> {
        match &provider.source {
            ProviderSource::Pattern(pattern) => self.make_query(
                pattern,
                params,
                provider.quote_parameters,
                provider.escape_parameters,
                use_native,
            ),
            ProviderSource::WhereClause(clause) => {
                let doc = doc.ok_or_else(|| {
                    FolioError::Repository(format!(
                        "provider '{}' needs a document to read predicate values from",
                        provider.name
                    ))
                })?;
                self.make_where_clause_query(doc, clause, Some(params), use_native)
            }
        }
    }

    fn predicate_query(
        &self,
        doc: &DocumentModel,
        predicate: &PredicateDefinition,
    ) -> crate::Result<Option<SearchQuery>> {
        let mut values = predicate
            .fields
            .iter()
            .map(|field| resolve_field(doc, field))
            .collect::<crate::Result<Vec<_>>>()?;

        if !values.iter().any(Value::is_present) {
            return Ok(None);
        }

        let value = values[0].clone();
        if let Value::List(items) = &value {
            values = items.clone();
        }

        let mut name = predicate.parameter.clone();
        let mut operator = predicate.operator.trim().to_uppercase();
        if operator == "FULLTEXT" || operator == "FULLTEXT ALL" {
            operator = "=".to_string();
            let fulltext_field = self.converter.fulltext_field();
            if !name.starts_with(fulltext_field) {
                name = format!("{}.{}", fulltext_field, name);
            }
        }

        self.converter
            .simple_expression(&operator, &name, &value, &values)
            .map(Some)
    }
}

fn resolve_field(doc: &DocumentModel, field: &PredicateField) -> crate::Result<Value> {
    let resolved = match (&field.xpath, &field.schema, &field.name) {
        (Some(xpath), _, _) => doc.property_value(xpath),
        (None, Some(schema), Some(name)) => doc.property(schema, name),
        _ => Err(FolioError::Repository(
            "predicate field needs an xpath or a schema and name".to_string(),
        )),
    };
    resolved.map_err(|e| match e {
        FolioError::PropertyResolution { .. } => e,
        other => FolioError::PropertyResolution {
            xpath: field.describe(),
            message: other.to_string(),
        },
    })
}

/// Replace each `?` of `pattern`, left to right, with the rendered parameter.
///
/// The pattern is scanned once so placeholders inside substituted values
/// are left alone. Fails unless there is exactly one parameter per
/// placeholder.
pub fn substitute_parameters(
    pattern: &str,
    params: &[Value],
    quote: bool,
    escape: bool,
) -> crate::Result<String> {
    let placeholders = pattern.matches(PLACEHOLDER).count();
    if placeholders != params.len() {
        return Err(FolioError::Substitution {
            placeholders,
            parameters: params.len(),
        });
    }

    let mut out = String::with_capacity(pattern.len() + params.len() * 8);
    let mut params = params.iter();
    for c in pattern.chars() {
        if c == PLACEHOLDER {
            // Counts were checked above.
            if let Some(param) = params.next() {
                out.push_str(&convert_param(param, quote, escape));
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Render one parameter for a query string. Only strings are quoted.
pub fn convert_param(param: &Value, quote: bool, escape: bool) -> String {
    match param {
        Value::String(s) => {
            let s = if escape { escape_string(s) } else { s.clone() };
            if quote {
                format!("\"{}\"", s)
            } else {
                s
            }
        }
        Value::List(items) => items
            .iter()
            .map(|item| convert_param(item, quote, escape))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
