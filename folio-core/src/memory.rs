//! In-memory document repository, loadable from a TOML fixture

use crate::document::{DocRef, DocumentModel, Permission};
use crate::error::FolioError;
use crate::schema::SchemaManager;
use crate::session::{CoreSession, DocumentQuery};
use crate::value::Value;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Principal reported by unrestricted sessions
pub const SYSTEM_PRINCIPAL: &str = "system";

const ROOT_ID: &str = "root";
const ROOT_TYPE: &str = "Root";

/// A registered document type
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub facets: BTreeSet<String>,
    #[serde(default)]
    pub schemas: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    model: DocumentModel,
    readers: BTreeSet<String>,
    block_inheritance: bool,
}

/// Documents, types and read grants held in memory.
///
/// Only the `Read` permission can be granted; it is inherited from the
/// parent unless inheritance is blocked.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    documents: BTreeMap<String, StoredDocument>,
    /// Path to document id
    paths: BTreeMap<String, String>,
    types: BTreeMap<String, TypeDefinition>,
    /// Schema name to property prefix
    schemas: BTreeMap<String, String>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// An empty repository holding only the root document
    pub fn new() -> Self {
        let root = StoredDocument {
            model: DocumentModel::new(ROOT_ID, "/", ROOT_TYPE).with_facet("Folderish"),
            readers: BTreeSet::new(),
            block_inheritance: false,
        };
        let mut documents = BTreeMap::new();
        documents.insert(ROOT_ID.to_string(), root);
        let mut paths = BTreeMap::new();
        paths.insert("/".to_string(), ROOT_ID.to_string());
        Self {
            documents,
            paths,
            types: BTreeMap::new(),
            schemas: BTreeMap::new(),
        }
    }

    /// Load a fixture file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Build a repository from fixture TOML
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let fixture: Fixture =
            toml::from_str(content).map_err(|e| FolioError::FixtureParse(e.to_string()))?;

        let mut repo = Self::new();
        for schema in fixture.schemas {
            repo.register_schema(schema.name, schema.prefix);
        }
        for doc_type in fixture.types {
            repo.register_type(doc_type);
        }

        let mut documents = fixture.documents;
        documents.sort_by_key(|doc| doc.path.matches('/').count());
        for entry in documents {
            repo.add_fixture_document(entry)?;
        }
        Ok(repo)
    }

    pub fn register_schema(&mut self, name: impl Into<String>, prefix: impl Into<String>) {
        self.schemas.insert(name.into(), prefix.into());
    }

    pub fn register_type(&mut self, doc_type: TypeDefinition) {
        self.types.insert(doc_type.name.clone(), doc_type);
    }

    /// Store `doc` below its parent folder.
    ///
    /// The parent must exist. Facets and schemas of the registered type are
    /// merged into the document.
    pub fn add_document(&mut self, mut doc: DocumentModel) -> crate::Result<()> {
        if self.paths.contains_key(&doc.path) {
            return Err(FolioError::Repository(format!(
                "a document already exists at {}",
                doc.path
            )));
        }
        if self.documents.contains_key(&doc.id) {
            return Err(FolioError::Repository(format!("duplicate document id {}", doc.id)));
        }
        let parent_path = doc
            .parent_path()
            .ok_or_else(|| FolioError::Repository("cannot add a second root".to_string()))?;
        let parent_id = self
            .paths
            .get(parent_path)
            .cloned()
            .ok_or_else(|| FolioError::DocumentNotFound(DocRef::path(parent_path)))?;
        doc.parent = Some(DocRef::Id(parent_id));

        if let Some(doc_type) = self.types.get(&doc.doc_type) {
            doc.facets.extend(doc_type.facets.iter().cloned());
            for schema in &doc_type.schemas {
                let prefix = self.schemas.get(schema).cloned().unwrap_or_else(|| schema.clone());
                doc.schemas.entry(schema.clone()).or_insert(prefix);
            }
        }

        self.paths.insert(doc.path.clone(), doc.id.clone());
        self.documents.insert(
            doc.id.clone(),
            StoredDocument {
                model: doc,
                readers: BTreeSet::new(),
                block_inheritance: false,
            },
        );
        Ok(())
    }

    pub fn grant_read(&mut self, doc: &DocRef, principal: impl Into<String>) -> crate::Result<()> {
        let id = self.resolve(doc)?.to_string();
        if let Some(stored) = self.documents.get_mut(&id) {
            stored.readers.insert(principal.into());
        }
        Ok(())
    }

    pub fn block_inheritance(&mut self, doc: &DocRef) -> crate::Result<()> {
        let id = self.resolve(doc)?.to_string();
        if let Some(stored) = self.documents.get_mut(&id) {
            stored.block_inheritance = true;
        }
        Ok(())
    }

    /// A session acting as `principal`
    pub fn session(&self, principal: impl Into<String>) -> MemorySession<'_> {
        MemorySession {
            repo: self,
            principal: principal.into(),
            unrestricted: false,
        }
    }

    /// Number of stored documents, root included
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn add_fixture_document(&mut self, entry: FixtureDocument) -> crate::Result<()> {
        let id = entry.id.unwrap_or_else(|| id_from_path(&entry.path));
        let mut doc = DocumentModel::new(id, entry.path.clone(), entry.doc_type)
            .with_lifecycle_state(entry.lifecycle.unwrap_or_else(|| "project".to_string()));
        doc.facets.extend(entry.facets);
        for schema in entry.schemas {
            let prefix = self.schemas.get(&schema).cloned().unwrap_or_else(|| schema.clone());
            doc.schemas.insert(schema, prefix);
        }
        for (xpath, value) in entry.properties {
            let value = value_from_toml(value)
                .map_err(|e| FolioError::FixtureParse(format!("{} {}: {}", entry.path, xpath, e)))?;
            doc.properties.insert(xpath, value);
        }
        self.add_document(doc)?;

        let doc_ref = DocRef::path(entry.path);
        for reader in entry.readers {
            self.grant_read(&doc_ref, reader)?;
        }
        if entry.block_inheritance {
            self.block_inheritance(&doc_ref)?;
        }
        Ok(())
    }

    fn resolve(&self, doc: &DocRef) -> crate::Result<&str> {
        let id = match doc {
            DocRef::Id(id) => self.documents.get_key_value(id).map(|(key, _)| key.as_str()),
            DocRef::Path(path) => self.paths.get(normalize_path(path)).map(String::as_str),
        };
        id.ok_or_else(|| FolioError::DocumentNotFound(doc.clone()))
    }

    fn stored(&self, doc: &DocRef) -> crate::Result<&StoredDocument> {
        let id = self.resolve(doc)?;
        self.documents
            .get(id)
            .ok_or_else(|| FolioError::DocumentNotFound(doc.clone()))
    }

    fn can_read(&self, id: &str, principal: &str) -> bool {
        let mut current = self.documents.get(id);
        while let Some(stored) = current {
            if stored.readers.contains(principal) {
                return true;
            }
            if stored.block_inheritance {
                return false;
            }
            current = match &stored.model.parent {
                Some(DocRef::Id(parent)) => self.documents.get(parent),
                _ => None,
            };
        }
        false
    }
}

impl SchemaManager for MemoryRepository {
    fn document_type_names_for_facet(&self, facet: &str) -> BTreeSet<String> {
        self.types
            .values()
            .filter(|t| t.facets.contains(facet))
            .map(|t| t.name.clone())
            .collect()
    }
}

/// A principal's session over a [`MemoryRepository`]
#[derive(Debug, Clone)]
pub struct MemorySession<'r> {
    repo: &'r MemoryRepository,
    principal: String,
    unrestricted: bool,
}

impl MemorySession<'_> {
    fn readable(&self, stored: &StoredDocument) -> bool {
        self.unrestricted || self.repo.can_read(&stored.model.id, &self.principal)
    }

    fn check_read(&self, doc: &DocRef, stored: &StoredDocument) -> crate::Result<()> {
        if self.readable(stored) {
            Ok(())
        } else {
            Err(FolioError::PermissionDenied {
                principal: self.principal.clone(),
                doc: doc.clone(),
            })
        }
    }
}

impl CoreSession for MemorySession<'_> {
    fn principal(&self) -> &str {
        &self.principal
    }

    fn has_permission(&self, doc: &DocRef, permission: Permission) -> crate::Result<bool> {
        let stored = self.repo.stored(doc)?;
        Ok(match permission {
            _ if self.unrestricted => true,
            Permission::Read => self.readable(stored),
            Permission::Write => false,
        })
    }

    fn get_document(&self, doc: &DocRef) -> crate::Result<DocumentModel> {
        let stored = self.repo.stored(doc)?;
        self.check_read(doc, stored)?;
        Ok(stored.model.clone())
    }

    fn get_parent_document(&self, doc: &DocRef) -> crate::Result<Option<DocumentModel>> {
        let stored = self.repo.stored(doc)?;
        match &stored.model.parent {
            Some(parent) => self.get_document(parent).map(Some),
            None => Ok(None),
        }
    }

    fn get_children(&self, doc: &DocRef, doc_type: Option<&str>) -> crate::Result<Vec<DocumentModel>> {
        let parent_id = self.repo.resolve(doc)?;
        let children = self
            .repo
            .paths
            .values()
            .filter_map(|id| self.repo.documents.get(id))
            .filter(|stored| {
                matches!(&stored.model.parent, Some(DocRef::Id(p)) if p == parent_id)
            })
            .filter(|stored| doc_type.map_or(true, |t| stored.model.doc_type == t))
            .filter(|stored| self.readable(stored))
            .map(|stored| stored.model.clone())
            .collect();
        Ok(children)
    }

    fn root_document(&self) -> crate::Result<DocumentModel> {
        let root = DocRef::path("/");
        let stored = self.repo.stored(&root)?;
        Ok(stored.model.clone())
    }

    fn query(&self, query: &DocumentQuery) -> crate::Result<Vec<DocumentModel>> {
        // `paths` iterates in path order, which satisfies ORDER BY ecm:path.
        let docs = self
            .repo
            .paths
            .values()
            .filter_map(|id| self.repo.documents.get(id))
            .filter(|stored| query.matches(&stored.model))
            .filter(|stored| self.readable(stored))
            .map(|stored| stored.model.clone())
            .collect();
        Ok(docs)
    }

    fn unrestricted(
        &self,
        scope: &mut dyn FnMut(&dyn CoreSession) -> crate::Result<()>,
    ) -> crate::Result<()> {
        let elevated = MemorySession {
            repo: self.repo,
            principal: SYSTEM_PRINCIPAL.to_string(),
            unrestricted: true,
        };
        scope(&elevated)
    }
}

fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

fn id_from_path(path: &str) -> String {
    path.trim_matches('/').replace('/', ".")
}

/// Convert a fixture property value
fn value_from_toml(value: toml::Value) -> crate::Result<Value> {
    Ok(match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Integer(i),
        toml::Value::Float(f) => Value::Float(f),
        toml::Value::Boolean(b) => Value::Boolean(b),
        toml::Value::Datetime(dt) => Value::parse_date(&dt.to_string())?,
        toml::Value::Array(items) => Value::List(
            items
                .into_iter()
                .map(value_from_toml)
                .collect::<crate::Result<Vec<_>>>()?,
        ),
        toml::Value::Table(_) => {
            return Err(FolioError::FixtureParse(
                "complex properties are not supported".to_string(),
            ))
        }
    })
}

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    schemas: Vec<FixtureSchema>,
    #[serde(default)]
    types: Vec<TypeDefinition>,
    #[serde(default)]
    documents: Vec<FixtureDocument>,
}

#[derive(Debug, Deserialize)]
struct FixtureSchema {
    name: String,
    prefix: String,
}

#[derive(Debug, Deserialize)]
struct FixtureDocument {
    #[serde(default)]
    id: Option<String>,
    path: String,
    #[serde(rename = "type")]
    doc_type: String,
    #[serde(default)]
    lifecycle: Option<String>,
    #[serde(default)]
    facets: Vec<String>,
    #[serde(default)]
    schemas: Vec<String>,
    #[serde(default)]
    readers: Vec<String>,
    #[serde(default)]
    block_inheritance: bool,
    #[serde(default)]
    properties: BTreeMap<String, toml::Value>,
}
