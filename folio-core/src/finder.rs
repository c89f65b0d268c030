//! Discovery of the publishing sections a user may target

use crate::config::PublishingConfig;
use crate::document::{DocRef, DocumentModel, Permission};
use crate::error::FolioError;
use crate::schema::FacetTypeCache;
use crate::session::{run_unrestricted, CoreSession, DocumentQuery};
use crate::value::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared inputs of the strategy hooks
pub struct FinderContext<'a> {
    pub config: &'a PublishingConfig,
    pub types: &'a FacetTypeCache,
}

impl FinderContext<'_> {
    /// Types of the documents that head a section tree
    pub fn section_root_types(&self) -> Arc<std::collections::BTreeSet<String>> {
        self.types.types_for_facet(&self.config.section_root_facet)
    }

    /// Types of section documents
    pub fn section_types(&self) -> Arc<std::collections::BTreeSet<String>> {
        self.types.types_for_facet(&self.config.section_facet)
    }
}

/// Root paths computed under an unrestricted session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnrestrictedRoots {
    pub workspace_config: Vec<String>,
    /// `None` when the strategy did not compute default roots
    pub default_roots: Option<Vec<String>>,
}

/// Hooks deciding which root paths are candidates.
pub trait SectionRootsStrategy {
    /// Compute candidate roots for `current` with an unrestricted session.
    ///
    /// `known_default_roots` holds the defaults of a previous computation.
    fn compute_unrestricted_roots(
        &self,
        session: &dyn CoreSession,
        current: Option<&DocumentModel>,
        known_default_roots: Option<&[String]>,
        ctx: &FinderContext<'_>,
    ) -> crate::Result<UnrestrictedRoots>;

    /// Query for the sections below a root the user cannot read
    fn build_query(&self, path: &str, ctx: &FinderContext<'_>) -> DocumentQuery;
}

/// Workspace roots come from the nearest ancestor carrying the publishing
/// schema; default roots are the section roots of every domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSectionRootsStrategy;

impl SectionRootsStrategy for DefaultSectionRootsStrategy {
    fn compute_unrestricted_roots(
        &self,
        session: &dyn CoreSession,
        current: Option<&DocumentModel>,
        known_default_roots: Option<&[String]>,
        ctx: &FinderContext<'_>,
    ) -> crate::Result<UnrestrictedRoots> {
        let mut workspace_config = Vec::new();
        if let Some(current) = current {
            let mut parent = session.get_parent_document(&current.doc_ref())?;
            while let Some(doc) = parent {
                if doc.has_schema(&ctx.config.schema) {
                    workspace_config = section_roots_from_workspace_config(&doc, session, ctx.config)?
                        .into_iter()
                        .map(|section| section.path)
                        .collect();
                    break;
                }
                parent = session.get_parent_document(&doc.doc_ref())?;
            }
        }

        let default_roots = match known_default_roots {
            Some(known) => known.to_vec(),
            None => default_section_roots(session, ctx)?
                .into_iter()
                .map(|root| root.path)
                .collect(),
        };

        Ok(UnrestrictedRoots {
            workspace_config,
            default_roots: Some(default_roots),
        })
    }

    fn build_query(&self, path: &str, ctx: &FinderContext<'_>) -> DocumentQuery {
        DocumentQuery::of_types(ctx.section_types().iter().cloned())
            .under(path)
            .ordered_by_path()
    }
}

/// Keeps folderish documents that are neither hidden in navigation nor
/// deleted.
#[derive(Debug, Clone)]
pub struct SectionFilter {
    required_facets: Vec<String>,
    excluded_facets: Vec<String>,
    excluded_state: String,
}

impl SectionFilter {
    pub fn from_config(config: &PublishingConfig) -> Self {
        Self {
            required_facets: vec![config.folderish_facet.clone()],
            excluded_facets: vec![config.hidden_facet.clone()],
            excluded_state: config.deleted_state.clone(),
        }
    }

    pub fn accept(&self, doc: &DocumentModel) -> bool {
        self.required_facets.iter().all(|f| doc.has_facet(f))
            && !self.excluded_facets.iter().any(|f| doc.has_facet(f))
            && doc.lifecycle_state != self.excluded_state
    }

    pub fn apply(&self, docs: Vec<DocumentModel>) -> Vec<DocumentModel> {
        docs.into_iter().filter(|doc| self.accept(doc)).collect()
    }
}

/// Sections configured on `workspace`.
///
/// Ids that no longer resolve are logged and skipped; a workspace without
/// the publishing schema has no configured sections.
pub fn section_roots_from_workspace_config(
    workspace: &DocumentModel,
    session: &dyn CoreSession,
    config: &PublishingConfig,
) -> crate::Result<Vec<DocumentModel>> {
    if !workspace.has_schema(&config.schema) {
        return Ok(Vec::new());
    }

    let section_ids: Vec<String> = match workspace.property_value(&config.sections_property)? {
        Value::List(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(id) if !id.is_empty() => vec![id],
        _ => Vec::new(),
    };

    let mut sections = Vec::with_capacity(section_ids.len());
    for section_id in section_ids {
        match session.get_document(&DocRef::id(section_id.as_str())) {
            Ok(section) => sections.push(section),
            Err(FolioError::DocumentNotFound(_)) => {
                tracing::warn!(
                    section_id = %section_id,
                    workspace_id = %workspace.id,
                    "configured section not found"
                );
            }
            Err(e) => return Err(e),
        }
    }
    Ok(sections)
}

/// Section roots directly below every domain
pub fn default_section_roots(
    session: &dyn CoreSession,
    ctx: &FinderContext<'_>,
) -> crate::Result<Vec<DocumentModel>> {
    let root = session.root_document()?;
    let domains = session.get_children(&root.doc_ref(), Some(ctx.config.domain_type.as_str()))?;
    let root_types = ctx.section_root_types();

    let mut section_roots = Vec::new();
    for domain in &domains {
        for root_type in root_types.iter() {
            section_roots.extend(session.get_children(&domain.doc_ref(), Some(root_type.as_str()))?);
        }
    }
    Ok(section_roots)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FinderState {
    Stale,
    Computed { current: Option<DocRef> },
}

/// Finds the section roots a user may publish into, caching the result
/// for the current document.
pub struct RootSectionsFinder<'s, S = DefaultSectionRootsStrategy> {
    user_session: &'s dyn CoreSession,
    strategy: S,
    config: PublishingConfig,
    types: Arc<FacetTypeCache>,
    state: FinderState,
    workspace_roots: Vec<String>,
    default_roots: Option<Vec<String>>,
    accessible: Vec<DocumentModel>,
}

impl<'s> RootSectionsFinder<'s, DefaultSectionRootsStrategy> {
    pub fn new(
        user_session: &'s dyn CoreSession,
        config: PublishingConfig,
        types: Arc<FacetTypeCache>,
    ) -> Self {
        Self::with_strategy(user_session, DefaultSectionRootsStrategy, config, types)
    }
}

impl<'s, S: SectionRootsStrategy> RootSectionsFinder<'s, S> {
    pub fn with_strategy(
        user_session: &'s dyn CoreSession,
        strategy: S,
        config: PublishingConfig,
        types: Arc<FacetTypeCache>,
    ) -> Self {
        Self {
            user_session,
            strategy,
            config,
            types,
            state: FinderState::Stale,
            workspace_roots: Vec::new(),
            default_roots: None,
            accessible: Vec::new(),
        }
    }

    /// Forget the tracked document; the next lookup recomputes
    pub fn reset(&mut self) {
        self.state = FinderState::Stale;
    }

    /// Sections `current` may be published into: the workspace's
    /// configured sections, or the default roots when it has none.
    pub fn accessible_section_roots(
        &mut self,
        current: &DocumentModel,
    ) -> crate::Result<&[DocumentModel]> {
        if self.is_stale_for(current) {
            self.compute_user_section_roots(Some(current))?;
        }
        Ok(&self.accessible)
    }

    pub fn section_roots_for_workspace(
        &mut self,
        current: &DocumentModel,
    ) -> crate::Result<Vec<DocumentModel>> {
        self.section_roots_for_workspace_with(current, false)
    }

    /// Sections configured on the workspace of `current`, restricted to
    /// what the user can see.
    ///
    /// With `add_default_section_roots`, a computed but empty default root
    /// list is enumerated again.
    pub fn section_roots_for_workspace_with(
        &mut self,
        current: &DocumentModel,
        add_default_section_roots: bool,
    ) -> crate::Result<Vec<DocumentModel>> {
        if self.is_stale_for(current) {
            self.compute_user_section_roots(Some(current))?;
        }
        if add_default_section_roots {
            self.refresh_empty_default_roots()?;
        }
        self.filtered_section_roots(&self.workspace_roots, true)
    }

    pub fn default_section_roots(&mut self, only_heads: bool) -> crate::Result<Vec<DocumentModel>> {
        self.default_section_roots_with(only_heads, false)
    }

    /// Default section roots visible to the user
    pub fn default_section_roots_with(
        &mut self,
        only_heads: bool,
        add_default_section_roots: bool,
    ) -> crate::Result<Vec<DocumentModel>> {
        if self.default_roots.is_none() {
            self.compute_user_section_roots(None)?;
        }
        if add_default_section_roots {
            self.refresh_empty_default_roots()?;
        }
        let roots = self.default_roots.as_deref().unwrap_or_default();
        self.filtered_section_roots(roots, only_heads)
    }

    /// Sections configured on `workspace`, read with an unrestricted session
    pub fn section_roots_from_workspace_config(
        &self,
        workspace: &DocumentModel,
    ) -> crate::Result<Vec<DocumentModel>> {
        let config = &self.config;
        run_unrestricted(self.user_session, |session| {
            section_roots_from_workspace_config(workspace, session, config)
        })
    }

    /// Whether the cached roots were computed for another document
    pub fn is_stale_for(&self, current: &DocumentModel) -> bool {
        match &self.state {
            FinderState::Computed {
                current: Some(tracked),
            } => *tracked != current.doc_ref(),
            _ => true,
        }
    }

    fn context(&self) -> FinderContext<'_> {
        FinderContext {
            config: &self.config,
            types: &self.types,
        }
    }

    fn compute_user_section_roots(&mut self, current: Option<&DocumentModel>) -> crate::Result<()> {
        tracing::debug!(
            principal = self.user_session.principal(),
            current = current.map(|doc| doc.path.as_str()),
            "computing section roots"
        );

        let roots = {
            let ctx = self.context();
            let strategy = &self.strategy;
            let known = self.default_roots.as_deref();
            run_unrestricted(self.user_session, |session| {
                strategy.compute_unrestricted_roots(session, current, known, &ctx)
            })?
        };

        self.workspace_roots = roots.workspace_config;
        if roots.default_roots.is_some() {
            self.default_roots = roots.default_roots;
        }

        if current.is_some() {
            let candidates = if self.workspace_roots.is_empty() {
                self.default_roots.as_deref().unwrap_or_default()
            } else {
                self.workspace_roots.as_slice()
            };
            self.accessible = self.filtered_section_roots(candidates, true)?;
        }

        self.state = FinderState::Computed {
            current: current.map(DocumentModel::doc_ref),
        };
        Ok(())
    }

    fn refresh_empty_default_roots(&mut self) -> crate::Result<()> {
        if !matches!(self.default_roots.as_deref(), Some([])) {
            return Ok(());
        }
        let roots = {
            let ctx = self.context();
            run_unrestricted(self.user_session, |session| {
                default_section_roots(session, &ctx)
            })?
        };
        self.default_roots = Some(roots.into_iter().map(|root| root.path).collect());
        Ok(())
    }

    /// Resolve root paths into the sections the user can see.
    ///
    /// Readable roots are kept as they are. Below an unreadable root the
    /// user's visible sections are queried. With `only_heads`, a section
    /// below an already collected (or already skipped) one is skipped, and
    /// collected sections below a later readable root are dropped.
    fn filtered_section_roots(
        &self,
        root_paths: &[String],
        only_heads: bool,
    ) -> crate::Result<Vec<DocumentModel>> {
        let ctx = self.context();
        let mut selected = SelectedSections::default();

        for root_path in root_paths {
            let root_ref = DocRef::path(root_path.as_str());
            if self.user_session.has_permission(&root_ref, Permission::Read)? {
                if only_heads {
                    if selected.is_below_collected(root_path) {
                        continue;
                    }
                    selected.drop_nested_under(root_path);
                }
                selected.include_path(root_path);
                continue;
            }

            let query = self.strategy.build_query(root_path, &ctx);
            for section in self.user_session.query(&query)? {
                if selected.contains(&section) {
                    continue;
                }
                if only_heads
                    && (selected.has_collected_parent(&section)
                        || selected.is_below_collected(&section.path))
                {
                    selected.trash(&section);
                } else {
                    selected.include(&section);
                }
            }
        }

        let documents = self.user_session.get_documents(&selected.refs())?;
        Ok(SectionFilter::from_config(&self.config).apply(documents))
    }
}

/// Bookkeeping of `filtered_section_roots`
#[derive(Debug, Default)]
struct SelectedSections {
    /// Collected sections in selection order, with their paths
    entries: Vec<(DocRef, String)>,
    ids: HashSet<String>,
    paths: HashSet<String>,
    trashed_ids: HashSet<String>,
    trashed_paths: HashSet<String>,
}

impl SelectedSections {
    fn include_path(&mut self, path: &str) {
        if self.paths.insert(path.to_string()) {
            self.entries.push((DocRef::path(path), path.to_string()));
        }
    }

    fn include(&mut self, section: &DocumentModel) {
        self.ids.insert(section.id.clone());
        self.paths.insert(section.path.clone());
        self.entries.push((section.doc_ref(), section.path.clone()));
    }

    fn trash(&mut self, section: &DocumentModel) {
        self.trashed_ids.insert(section.id.clone());
        self.trashed_paths.insert(section.path.clone());
    }

    fn refs(&self) -> Vec<DocRef> {
        self.entries.iter().map(|(doc_ref, _)| doc_ref.clone()).collect()
    }

    fn contains(&self, section: &DocumentModel) -> bool {
        self.ids.contains(&section.id) || self.paths.contains(&section.path)
    }

    fn has_collected_parent(&self, section: &DocumentModel) -> bool {
        let by_ref = match &section.parent {
            Some(DocRef::Id(id)) => self.ids.contains(id) || self.trashed_ids.contains(id),
            Some(DocRef::Path(path)) => {
                self.paths.contains(path) || self.trashed_paths.contains(path)
            }
            None => false,
        };
        by_ref
            || section
                .parent_path()
                .is_some_and(|path| self.paths.contains(path) || self.trashed_paths.contains(path))
    }

    /// Whether `path` lies strictly below a collected section
    fn is_below_collected(&self, path: &str) -> bool {
        self.paths.iter().any(|collected| is_strictly_below(path, collected))
    }

    /// Move collected sections strictly below `path` to the trash
    fn drop_nested_under(&mut self, path: &str) {
        let (nested, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|(_, collected)| is_strictly_below(collected, path));
        self.entries = kept;
        for (doc_ref, collected) in nested {
            if let DocRef::Id(id) = doc_ref {
                self.ids.remove(&id);
                self.trashed_ids.insert(id);
            }
            self.paths.remove(&collected);
            self.trashed_paths.insert(collected);
        }
    }
}

fn is_strictly_below(path: &str, ancestor: &str) -> bool {
    path != ancestor
        && path
            .strip_prefix(ancestor.trim_end_matches('/'))
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PublishingConfig {
        PublishingConfig::default()
    }

    #[test]
    fn test_filter_requires_folderish() {
        let filter = SectionFilter::from_config(&config());
        let folder = DocumentModel::new("1", "/s", "Section").with_facet("Folderish");
        let file = DocumentModel::new("2", "/f", "File");
        assert!(filter.accept(&folder));
        assert!(!filter.accept(&file));
    }

    #[test]
    fn test_filter_excludes_hidden_and_deleted() {
        let filter = SectionFilter::from_config(&config());
        let hidden = DocumentModel::new("1", "/s", "Section")
            .with_facet("Folderish")
            .with_facet("HiddenInNavigation");
        let deleted = DocumentModel::new("2", "/t", "Section")
            .with_facet("Folderish")
            .with_lifecycle_state("deleted");
        let kept = DocumentModel::new("3", "/u", "Section").with_facet("Folderish");
        let docs = filter.apply(vec![hidden, deleted, kept]);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "3");
    }

    #[test]
    fn test_selected_sections_parent_detection() {
        let mut selected = SelectedSections::default();
        selected.include_path("/d/sections");

        let mut child = DocumentModel::new("c", "/d/sections/news", "Section");
        child.parent = Some(DocRef::id("sections-id"));
        assert!(selected.has_collected_parent(&child));

        let mut other = DocumentModel::new("o", "/d/other/news", "Section");
        other.parent = Some(DocRef::id("other-id"));
        assert!(!selected.has_collected_parent(&other));

        selected.trash(&other);
        let mut grandchild = DocumentModel::new("g", "/d/other/news/local", "Section");
        grandchild.parent = Some(DocRef::id("o"));
        assert!(selected.has_collected_parent(&grandchild));
    }

    #[test]
    fn test_selected_sections_nesting_by_path() {
        let mut selected = SelectedSections::default();
        selected.include_path("/d/sections/news/local");
        assert!(!selected.is_below_collected("/d/sections/news"));
        assert!(!selected.is_below_collected("/d/sections/news/local"));
        assert!(!selected.is_below_collected("/d/sections/news/locality"));

        selected.drop_nested_under("/d/sections/news");
        selected.include_path("/d/sections/news");
        assert_eq!(selected.refs(), vec![DocRef::path("/d/sections/news")]);
        assert!(selected.is_below_collected("/d/sections/news/local"));
        assert!(selected.trashed_paths.contains("/d/sections/news/local"));
    }

    #[test]
    fn test_strictly_below() {
        assert!(is_strictly_below("/a/b", "/a"));
        assert!(is_strictly_below("/a", "/"));
        assert!(!is_strictly_below("/a", "/a"));
        assert!(!is_strictly_below("/ab", "/a"));
        assert!(!is_strictly_below("/", "/"));
    }
}
