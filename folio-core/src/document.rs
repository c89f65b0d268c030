//! Document model exposed by repository sessions

use crate::error::FolioError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Reference to a document, either by id or by absolute path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocRef {
    Id(String),
    Path(String),
}

impl DocRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{}", id),
            Self::Path(path) => write!(f, "path:{}", path),
        }
    }
}

/// Permissions checked through [`crate::session::CoreSession::has_permission`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Read,
    Write,
}

/// A document snapshot as returned by a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentModel {
    pub id: String,
    pub path: String,
    pub parent: Option<DocRef>,
    pub doc_type: String,
    pub facets: BTreeSet<String>,
    /// Schema name to property prefix
    pub schemas: BTreeMap<String, String>,
    pub lifecycle_state: String,
    /// Property values keyed by xpath (`prefix:name`)
    #[serde(skip)]
    pub properties: BTreeMap<String, Value>,
}

impl DocumentModel {
    pub fn new(id: impl Into<String>, path: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            parent: None,
            doc_type: doc_type.into(),
            facets: BTreeSet::new(),
            schemas: BTreeMap::new(),
            lifecycle_state: "project".to_string(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_facet(mut self, facet: impl Into<String>) -> Self {
        self.facets.insert(facet.into());
        self
    }

    pub fn with_schema(mut self, name: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.schemas.insert(name.into(), prefix.into());
        self
    }

    pub fn with_property(mut self, xpath: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(xpath.into(), value.into());
        self
    }

    pub fn with_lifecycle_state(mut self, state: impl Into<String>) -> Self {
        self.lifecycle_state = state.into();
        self
    }

    pub fn doc_ref(&self) -> DocRef {
        DocRef::Id(self.id.clone())
    }

    pub fn has_facet(&self, facet: &str) -> bool {
        self.facets.contains(facet)
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.schemas.contains_key(schema)
    }

    /// Path of the parent folder, `None` for the root
    pub fn parent_path(&self) -> Option<&str> {
        if self.path == "/" {
            return None;
        }
        let trimmed = self.path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) => Some("/"),
            Some(idx) => Some(&trimmed[..idx]),
            None => None,
        }
    }

    /// Read a property by xpath such as `dc:title`.
    ///
    /// Fails when no attached schema owns the prefix; an unset property of
    /// an attached schema reads as `Null`.
    pub fn property_value(&self, xpath: &str) -> crate::Result<Value> {
        let prefix = xpath.split_once(':').map_or("", |(prefix, _)| prefix);
        if !self.schemas.values().any(|p| p == prefix) {
            return Err(FolioError::PropertyResolution {
                xpath: xpath.to_string(),
                message: format!("no schema with prefix '{}' on document {}", prefix, self.id),
            });
        }
        Ok(self.properties.get(xpath).cloned().unwrap_or(Value::Null))
    }

    /// Read a property by schema name and field name
    pub fn property(&self, schema: &str, name: &str) -> crate::Result<Value> {
        let prefix = self
            .schemas
            .get(schema)
            .ok_or_else(|| FolioError::UnknownSchema(schema.to_string()))?;
        let xpath = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}:{}", prefix, name)
        };
        Ok(self.properties.get(&xpath).cloned().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note() -> DocumentModel {
        DocumentModel::new("n1", "/domain/workspaces/ws/note", "Note")
            .with_schema("dublincore", "dc")
            .with_property("dc:title", "Quarterly report")
    }

    #[test]
    fn test_property_value_by_xpath() {
        let doc = note();
        assert_eq!(doc.property_value("dc:title").unwrap(), Value::from("Quarterly report"));
        assert_eq!(doc.property_value("dc:nature").unwrap(), Value::Null);
    }

    #[test]
    fn test_property_value_unknown_prefix_fails() {
        let err = note().property_value("file:content").unwrap_err();
        assert!(matches!(err, FolioError::PropertyResolution { xpath, .. } if xpath == "file:content"));
    }

    #[test]
    fn test_property_by_schema_and_name() {
        let doc = note();
        assert_eq!(doc.property("dublincore", "title").unwrap(), Value::from("Quarterly report"));
        assert!(matches!(
            doc.property("files", "files"),
            Err(FolioError::UnknownSchema(s)) if s == "files"
        ));
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(note().parent_path(), Some("/domain/workspaces/ws"));
        assert_eq!(DocumentModel::new("d", "/domain", "Domain").parent_path(), Some("/"));
        assert_eq!(DocumentModel::new("r", "/", "Root").parent_path(), None);
    }

    #[test]
    fn test_doc_ref_display() {
        assert_eq!(DocRef::id("abc").to_string(), "id:abc");
        assert_eq!(DocRef::path("/a").to_string(), "path:/a");
    }
}
