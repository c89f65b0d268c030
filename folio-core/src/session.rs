//! Repository session seam and typed document queries

use crate::document::{DocRef, DocumentModel, Permission};
use crate::error::FolioError;
use std::fmt;

/// A principal's view of a document repository.
///
/// Reads through a user session only see documents the principal may
/// read; the session handed to [`CoreSession::unrestricted`] scopes sees
/// everything.
pub trait CoreSession {
    fn principal(&self) -> &str;

    fn has_permission(&self, doc: &DocRef, permission: Permission) -> crate::Result<bool>;

    fn get_document(&self, doc: &DocRef) -> crate::Result<DocumentModel>;

    /// Fetch several documents, preserving the order of `docs`
    fn get_documents(&self, docs: &[DocRef]) -> crate::Result<Vec<DocumentModel>> {
        docs.iter().map(|doc| self.get_document(doc)).collect()
    }

    /// Parent of `doc`, `None` for the root
    fn get_parent_document(&self, doc: &DocRef) -> crate::Result<Option<DocumentModel>>;

    /// Children of `doc`, optionally restricted to one primary type
    fn get_children(&self, doc: &DocRef, doc_type: Option<&str>) -> crate::Result<Vec<DocumentModel>>;

    fn root_document(&self) -> crate::Result<DocumentModel>;

    fn query(&self, query: &DocumentQuery) -> crate::Result<Vec<DocumentModel>>;

    /// Run `scope` with an unrestricted session over the same repository
    fn unrestricted(
        &self,
        scope: &mut dyn FnMut(&dyn CoreSession) -> crate::Result<()>,
    ) -> crate::Result<()>;
}

/// Run `f` with elevated privileges and hand back only its owned result.
///
/// The unrestricted session is borrowed for the closure's duration and
/// cannot escape it.
pub fn run_unrestricted<T>(
    session: &dyn CoreSession,
    f: impl FnOnce(&dyn CoreSession) -> crate::Result<T>,
) -> crate::Result<T> {
    let mut f = Some(f);
    let mut out = None;
    session.unrestricted(&mut |elevated| {
        if let Some(f) = f.take() {
            out = Some(f(elevated)?);
        }
        Ok(())
    })?;
    out.ok_or_else(|| FolioError::Repository("unrestricted scope was never entered".to_string()))
}

/// A document query: documents of the given primary types strictly below
/// a path, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    /// Matching primary types; an empty list matches nothing
    pub primary_types: Vec<String>,
    /// Only strict descendants of this path
    pub path_prefix: Option<String>,
    pub order_by_path: bool,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            primary_types: types.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn under(mut self, path: impl Into<String>) -> Self {
        self.path_prefix = Some(path.into());
        self
    }

    pub fn ordered_by_path(mut self) -> Self {
        self.order_by_path = true;
        self
    }

    /// Whether `doc` satisfies the type and path conditions
    pub fn matches(&self, doc: &DocumentModel) -> bool {
        if !self.primary_types.iter().any(|t| *t == doc.doc_type) {
            return false;
        }
        match &self.path_prefix {
            Some(prefix) => is_strict_descendant(&doc.path, prefix),
            None => true,
        }
    }
}

fn is_strict_descendant(path: &str, ancestor: &str) -> bool {
    let ancestor = ancestor.trim_end_matches('/');
    path.strip_prefix(ancestor)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.is_empty())
}

impl fmt::Display for DocumentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = self
            .primary_types
            .iter()
            .map(|t| escape_nxql_string(t))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "SELECT * FROM Document WHERE ecm:primaryType IN ({})", types)?;
        if let Some(prefix) = &self.path_prefix {
            write!(f, " AND ecm:path STARTSWITH {}", escape_nxql_string(prefix))?;
        }
        if self.order_by_path {
            f.write_str(" ORDER BY ecm:path")?;
        }
        Ok(())
    }
}

/// Quote a string literal for document-query text
pub fn escape_nxql_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}
