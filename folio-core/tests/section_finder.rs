use folio_core::finder::{
    section_roots_from_workspace_config, DefaultSectionRootsStrategy, FinderContext,
    SectionRootsStrategy, UnrestrictedRoots,
};
use folio_core::{
    CoreSession, DocRef, DocumentModel, DocumentQuery, FacetTypeCache, MemoryRepository,
    PublishingConfig, RootSectionsFinder,
};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

const FIXTURE: &str = include_str!("fixtures/publishing.toml");

fn repo() -> Arc<MemoryRepository> {
    Arc::new(MemoryRepository::from_toml(FIXTURE).unwrap())
}

fn type_cache(repo: &Arc<MemoryRepository>) -> Arc<FacetTypeCache> {
    Arc::new(FacetTypeCache::new(repo.clone()))
}

fn paths(docs: &[DocumentModel]) -> Vec<&str> {
    docs.iter().map(|d| d.path.as_str()).collect()
}

fn doc(session: &dyn CoreSession, path: &str) -> DocumentModel {
    session.get_document(&DocRef::path(path)).unwrap()
}

/// Default strategy that counts how often roots are recomputed
struct CountingStrategy {
    calls: Rc<Cell<usize>>,
}

impl SectionRootsStrategy for CountingStrategy {
    fn compute_unrestricted_roots(
        &self,
        session: &dyn CoreSession,
        current: Option<&DocumentModel>,
        known_default_roots: Option<&[String]>,
        ctx: &FinderContext<'_>,
    ) -> folio_core::Result<UnrestrictedRoots> {
        self.calls.set(self.calls.get() + 1);
        DefaultSectionRootsStrategy.compute_unrestricted_roots(session, current, known_default_roots, ctx)
    }

    fn build_query(&self, path: &str, ctx: &FinderContext<'_>) -> DocumentQuery {
        DefaultSectionRootsStrategy.build_query(path, ctx)
    }
}

#[test]
fn test_default_roots_only_heads() {
    let repo = repo();
    let session = repo.session("alice");
    let mut finder = RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

    let roots = finder.default_section_roots(true).unwrap();
    assert_eq!(
        paths(&roots),
        vec!["/default-domain/sections/news", "/other-domain/sections"]
    );
}

#[test]
fn test_default_roots_with_nested_sections() {
    let repo = repo();
    let session = repo.session("alice");
    let mut finder = RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

    let roots = finder.default_section_roots(false).unwrap();
    assert_eq!(
        paths(&roots),
        vec![
            "/default-domain/sections/news",
            "/default-domain/sections/news/local",
            "/other-domain/sections",
        ]
    );
}

#[test]
fn test_deleted_and_hidden_sections_never_listed() {
    let repo = repo();
    let session = repo.session("alice");
    let mut finder = RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

    for only_heads in [true, false] {
        let roots = finder.default_section_roots(only_heads).unwrap();
        assert!(roots.iter().all(|d| d.lifecycle_state != "deleted"));
        assert!(roots.iter().all(|d| !d.has_facet("HiddenInNavigation")));
    }
}

#[test]
fn test_default_roots_follow_user_permissions() {
    let repo = repo();
    let session = repo.session("bob");
    let mut finder = RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

    let roots = finder.default_section_roots(true).unwrap();
    assert_eq!(paths(&roots), vec!["/default-domain/sections/sport"]);
}

#[test]
fn test_accessible_roots_from_workspace_config() {
    let repo = repo();
    let session = repo.session("alice");
    let mut finder = RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

    let note = doc(&session, "/default-domain/workspaces/ws1/note");
    let roots = finder.accessible_section_roots(&note).unwrap();
    assert_eq!(paths(roots), vec!["/default-domain/sections/news"]);

    let roots = finder.section_roots_for_workspace(&note).unwrap();
    assert_eq!(paths(&roots), vec!["/default-domain/sections/news"]);
}

#[test]
fn test_accessible_roots_fall_back_to_defaults() {
    let repo = repo();
    let session = repo.session("alice");
    let mut finder = RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

    let note = doc(&session, "/default-domain/workspaces/plain/note");
    let roots = finder.accessible_section_roots(&note).unwrap();
    assert_eq!(
        paths(roots),
        vec!["/default-domain/sections/news", "/other-domain/sections"]
    );

    // No configured sections on this workspace
    assert!(finder.section_roots_for_workspace(&note).unwrap().is_empty());
}

#[test]
fn test_configured_section_hidden_from_user() {
    let repo = repo();
    let session = repo.session("bob");
    let mut finder = RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

    let note = doc(&session, "/default-domain/workspaces/ws1/note");
    assert!(finder.accessible_section_roots(&note).unwrap().is_empty());
}

#[test]
fn test_roots_cached_until_document_changes_or_reset() {
    let repo = repo();
    let session = repo.session("alice");
    let calls = Rc::new(Cell::new(0));
    let mut finder = RootSectionsFinder::with_strategy(
        &session,
        CountingStrategy {
            calls: calls.clone(),
        },
        PublishingConfig::default(),
        type_cache(&repo),
    );

    let ws_note = doc(&session, "/default-domain/workspaces/ws1/note");
    let plain_note = doc(&session, "/default-domain/workspaces/plain/note");

    finder.accessible_section_roots(&ws_note).unwrap();
    finder.accessible_section_roots(&ws_note).unwrap();
    finder.section_roots_for_workspace(&ws_note).unwrap();
    assert_eq!(calls.get(), 1);
    assert!(!finder.is_stale_for(&ws_note));
    assert!(finder.is_stale_for(&plain_note));

    finder.accessible_section_roots(&plain_note).unwrap();
    assert_eq!(calls.get(), 2);

    finder.reset();
    assert!(finder.is_stale_for(&plain_note));
    finder.accessible_section_roots(&plain_note).unwrap();
    assert_eq!(calls.get(), 3);

    // Default roots are already known, no recomputation needed.
    finder.default_section_roots(true).unwrap();
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_workspace_config_skips_missing_sections() {
    let repo = repo();
    let session = repo.session("system");
    let config = PublishingConfig::default();

    folio_core::run_unrestricted(&session, |elevated| {
        let ws = elevated.get_document(&DocRef::id("ws1"))?;
        let sections = section_roots_from_workspace_config(&ws, elevated, &config)?;
        assert_eq!(paths(&sections), vec!["/default-domain/sections/news"]);

        let plain = elevated.get_document(&DocRef::id("plain"))?;
        assert!(section_roots_from_workspace_config(&plain, elevated, &config)?.is_empty());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_finder_reads_workspace_config_unrestricted() {
    let repo = repo();
    let session = repo.session("bob");
    let finder = RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

    let ws = doc(&session, "/default-domain/workspaces/ws1");
    let sections = finder.section_roots_from_workspace_config(&ws).unwrap();
    assert_eq!(paths(&sections), vec!["/default-domain/sections/news"]);
}

#[test]
fn test_no_section_root_types_means_no_defaults() {
    let repo = Arc::new(
        MemoryRepository::from_toml(
            r#"
[[types]]
name = "Domain"
facets = ["Folderish"]

[[documents]]
path = "/domain"
type = "Domain"
readers = ["alice"]
"#,
        )
        .unwrap(),
    );
    let session = repo.session("alice");
    let mut finder = RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

    assert!(finder.default_section_roots(true).unwrap().is_empty());
    assert!(finder.default_section_roots_with(true, true).unwrap().is_empty());
}

#[test]
fn test_type_cache_shared_between_finders() {
    let repo = repo();
    let cache = type_cache(&repo);
    let alice = repo.session("alice");
    let bob = repo.session("bob");

    let mut first = RootSectionsFinder::new(&alice, PublishingConfig::default(), cache.clone());
    let mut second = RootSectionsFinder::new(&bob, PublishingConfig::default(), cache.clone());
    first.default_section_roots(true).unwrap();
    second.default_section_roots(true).unwrap();

    // Section root and section facets
    assert_eq!(cache.len(), 2);
}

fn repo_with_ws1_sections(sections: &str) -> Arc<MemoryRepository> {
    let fixture = FIXTURE.replace(r#"["sec-news", "sec-deleted-long-ago"]"#, sections);
    Arc::new(MemoryRepository::from_toml(&fixture).unwrap())
}

#[test]
fn test_nested_configured_sections_list_only_heads() {
    for sections in [
        r#"["sec-news", "sec-news-local"]"#,
        r#"["sec-news-local", "sec-news"]"#,
    ] {
        let repo = repo_with_ws1_sections(sections);
        let session = repo.session("alice");
        let mut finder =
            RootSectionsFinder::new(&session, PublishingConfig::default(), type_cache(&repo));

        let note = doc(&session, "/default-domain/workspaces/ws1/note");
        let roots = finder.accessible_section_roots(&note).unwrap();
        assert_eq!(paths(roots), vec!["/default-domain/sections/news"]);

        let roots = finder.section_roots_for_workspace(&note).unwrap();
        assert_eq!(paths(&roots), vec!["/default-domain/sections/news"]);
    }
}

/// Strategy handing back fixed default roots and no workspace roots
struct FixedDefaultsStrategy {
    default_roots: Option<Vec<String>>,
}

impl SectionRootsStrategy for FixedDefaultsStrategy {
    fn compute_unrestricted_roots(
        &self,
        _session: &dyn CoreSession,
        _current: Option<&DocumentModel>,
        _known_default_roots: Option<&[String]>,
        _ctx: &FinderContext<'_>,
    ) -> folio_core::Result<UnrestrictedRoots> {
        Ok(UnrestrictedRoots {
            workspace_config: Vec::new(),
            default_roots: self.default_roots.clone(),
        })
    }

    fn build_query(&self, path: &str, ctx: &FinderContext<'_>) -> DocumentQuery {
        DefaultSectionRootsStrategy.build_query(path, ctx)
    }
}

fn finder_with_defaults<'s>(
    session: &'s dyn CoreSession,
    repo: &Arc<MemoryRepository>,
    default_roots: Option<Vec<String>>,
) -> RootSectionsFinder<'s, FixedDefaultsStrategy> {
    RootSectionsFinder::with_strategy(
        session,
        FixedDefaultsStrategy { default_roots },
        PublishingConfig::default(),
        type_cache(repo),
    )
}

#[test]
fn test_add_defaults_enumerates_computed_empty_roots() {
    let repo = repo();
    let session = repo.session("alice");
    let mut finder = finder_with_defaults(&session, &repo, Some(Vec::new()));

    assert!(finder.default_section_roots(true).unwrap().is_empty());
    let roots = finder.default_section_roots_with(true, true).unwrap();
    assert_eq!(
        paths(&roots),
        vec!["/default-domain/sections/news", "/other-domain/sections"]
    );
}

#[test]
fn test_add_defaults_skips_roots_never_computed() {
    let repo = repo();
    let session = repo.session("alice");
    let mut finder = finder_with_defaults(&session, &repo, None);

    assert!(finder.default_section_roots_with(true, true).unwrap().is_empty());
}

#[test]
fn test_add_defaults_keeps_known_roots() {
    let repo = repo();
    let session = repo.session("alice");
    let mut finder = finder_with_defaults(
        &session,
        &repo,
        Some(vec!["/default-domain/sections/news".to_string()]),
    );

    let roots = finder.default_section_roots_with(true, true).unwrap();
    assert_eq!(paths(&roots), vec!["/default-domain/sections/news"]);
}
