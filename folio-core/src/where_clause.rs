//! Declarative where-clause and predicate definitions

use serde::{Deserialize, Serialize};

/// A where clause: an optional fixed text part with `?` placeholders plus
/// predicates whose values are read from a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhereClauseDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_part: Option<String>,
    #[serde(default, rename = "predicate", skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<PredicateDefinition>,
}

impl WhereClauseDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixed_part(mut self, fixed_part: impl Into<String>) -> Self {
        self.fixed_part = Some(fixed_part.into());
        self
    }

    pub fn with_predicate(mut self, predicate: PredicateDefinition) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// `parameter <operator> <values of fields>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateDefinition {
    /// Target field of the generated clause
    pub parameter: String,
    pub operator: String,
    /// Document fields supplying the operand(s)
    #[serde(default, rename = "field")]
    pub fields: Vec<PredicateField>,
}

impl PredicateDefinition {
    pub fn new(parameter: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            operator: operator.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: PredicateField) -> Self {
        self.fields.push(field);
        self
    }
}

/// A document field, addressed by xpath or by schema and name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredicateField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PredicateField {
    pub fn xpath(xpath: impl Into<String>) -> Self {
        Self {
            xpath: Some(xpath.into()),
            ..Default::default()
        }
    }

    pub fn schema_field(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            xpath: None,
            schema: Some(schema.into()),
            name: Some(name.into()),
        }
    }

    /// Human-readable address, used in error messages
    pub fn describe(&self) -> String {
        match (&self.xpath, &self.schema, &self.name) {
            (Some(xpath), _, _) => xpath.clone(),
            (None, Some(schema), Some(name)) => format!("{}/{}", schema, name),
            (None, _, Some(name)) => name.clone(),
            _ => "<unnamed field>".to_string(),
        }
    }
}
