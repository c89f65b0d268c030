//! Schema metadata seam and the facet type-name cache

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// Source of document type metadata
pub trait SchemaManager: Send + Sync {
    /// Names of document types carrying `facet`
    fn document_type_names_for_facet(&self, facet: &str) -> BTreeSet<String>;
}

/// Read-through cache of type names per facet.
///
/// Each facet is looked up once and never invalidated; share one instance
/// (behind an `Arc`) between finders.
pub struct FacetTypeCache {
    schema: Arc<dyn SchemaManager>,
    types: RwLock<HashMap<String, Arc<BTreeSet<String>>>>,
}

impl FacetTypeCache {
    pub fn new(schema: Arc<dyn SchemaManager>) -> Self {
        Self {
            schema,
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Type names for `facet`, computed on first use
    pub fn types_for_facet(&self, facet: &str) -> Arc<BTreeSet<String>> {
        if let Ok(types) = self.types.read() {
            if let Some(cached) = types.get(facet) {
                return Arc::clone(cached);
            }
        }

        let computed = Arc::new(self.schema.document_type_names_for_facet(facet));
        match self.types.write() {
            Ok(mut types) => Arc::clone(
                types
                    .entry(facet.to_string())
                    .or_insert_with(|| Arc::clone(&computed)),
            ),
            // A poisoned lock only loses memoization; the lookup is idempotent.
            Err(_) => computed,
        }
    }

    /// Number of facets looked up so far
    pub fn len(&self) -> usize {
        self.types.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FacetTypeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacetTypeCache")
            .field("facets", &self.len())
            .finish()
    }
}
