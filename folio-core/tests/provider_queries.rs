use folio_core::{
    Config, CoreSession, DocRef, FolioError, MemoryRepository, QueryBuilder, QueryConverter,
    SearchQuery, StandardConverter, Value,
};
use serde_json::json;
use std::cell::RefCell;

const FIXTURE: &str = include_str!("fixtures/publishing.toml");

const CONFIG: &str = r#"
[query]
use_native_query = true

[[providers]]
name = "by_title_and_nature"
pattern = "dc:title = ? AND dc:nature = ?"

[[providers]]
name = "advanced_search"
[providers.where_clause]
fixed_part = "ecm:isVersion = 0 AND ecm:parentId = ?"

[[providers.where_clause.predicate]]
parameter = "dc:title"
operator = "FULLTEXT"
field = [{ xpath = "search:title" }]

[[providers.where_clause.predicate]]
parameter = "dc:subjects"
operator = "IN"
field = [{ xpath = "search:subjects" }]

[[providers.where_clause.predicate]]
parameter = "dc:nature"
operator = "="
field = [{ xpath = "search:nature" }]

[[providers.where_clause.predicate]]
parameter = "dc:created"
operator = "BETWEEN"
field = [
    { schema = "search", name = "created_min" },
    { schema = "search", name = "created_max" },
]
"#;

/// Converter recording the clauses it is asked to convert
#[derive(Default)]
struct RecordingConverter {
    seen: RefCell<Vec<String>>,
    inner: StandardConverter,
}

impl QueryConverter for RecordingConverter {
    fn convert(&self, nxql: &str) -> folio_core::Result<SearchQuery> {
        self.seen.borrow_mut().push(nxql.to_string());
        self.inner.convert(nxql)
    }

    fn simple_expression(
        &self,
        operator: &str,
        name: &str,
        value: &Value,
        values: &[Value],
    ) -> folio_core::Result<SearchQuery> {
        self.inner.simple_expression(operator, name, value, values)
    }

    fn fulltext_field(&self) -> &str {
        self.inner.fulltext_field()
    }
}

#[test]
fn test_pattern_provider_is_converted() {
    let config = Config::from_toml(CONFIG).unwrap();
    let converter = RecordingConverter::default();
    let builder = QueryBuilder::new(&converter);

    let provider = config.provider("by_title_and_nature").unwrap();
    builder
        .make_provider_query(
            provider,
            None,
            &[Value::from("Report"), Value::from("Article")],
            false,
        )
        .unwrap();

    assert_eq!(
        converter.seen.borrow().as_slice(),
        [r#"dc:title = "Report" AND dc:nature = "Article""#.to_string()]
    );
}

#[test]
fn test_pattern_provider_parameter_mismatch() {
    let config = Config::from_toml(CONFIG).unwrap();
    let converter = StandardConverter::default();
    let builder = QueryBuilder::new(&converter);

    let provider = config.provider("by_title_and_nature").unwrap();
    let err = builder
        .make_provider_query(provider, None, &[Value::from("Report")], true)
        .unwrap_err();
    assert!(matches!(
        err,
        FolioError::Substitution {
            placeholders: 2,
            parameters: 1
        }
    ));
}

#[test]
fn test_where_clause_provider_against_fixture_document() {
    let repo = MemoryRepository::from_toml(FIXTURE).unwrap();
    let session = repo.session("alice");
    let search = session.get_document(&DocRef::id("search-1")).unwrap();

    let config = Config::from_toml(CONFIG).unwrap();
    let converter = StandardConverter::from_config(&config.query);
    let builder = QueryBuilder::new(&converter);
    let provider = config.provider("advanced_search").unwrap();

    let query = builder
        .make_provider_query(
            provider,
            Some(&search),
            &[Value::from("ws1")],
            config.query.use_native_query,
        )
        .unwrap();

    assert_eq!(
        query.to_json(),
        json!({
            "bool": {
                "must": [
                    { "query_string": { "query": "ecm:isVersion = 0 AND ecm:parentId = \"ws1\"" } },
                    {
                        "simple_query_string": {
                            "query": "budget",
                            "fields": ["dc:title"],
                            "default_operator": "and"
                        }
                    },
                    { "terms": { "dc:subjects": ["finance", "planning"] } },
                    {
                        "range": {
                            "dc:created": {
                                "gte": "2024-01-01T00:00:00.000Z",
                                "lte": "2024-12-31T23:59:59.000Z"
                            }
                        }
                    }
                ]
            }
        })
    );
}

#[test]
fn test_where_clause_provider_needs_document() {
    let config = Config::from_toml(CONFIG).unwrap();
    let converter = StandardConverter::default();
    let builder = QueryBuilder::new(&converter);
    let provider = config.provider("advanced_search").unwrap();

    let err = builder
        .make_provider_query(provider, None, &[Value::from("ws1")], true)
        .unwrap_err();
    assert!(matches!(err, FolioError::Repository(msg) if msg.contains("advanced_search")));
}

#[test]
fn test_where_clause_on_document_without_search_schema_fails() {
    let repo = MemoryRepository::from_toml(FIXTURE).unwrap();
    let session = repo.session("alice");
    let note = session.get_document(&DocRef::id("ws1-note")).unwrap();

    let config = Config::from_toml(CONFIG).unwrap();
    let converter = StandardConverter::default();
    let builder = QueryBuilder::new(&converter);
    let provider = config.provider("advanced_search").unwrap();

    let err = builder
        .make_provider_query(provider, Some(&note), &[Value::from("ws1")], true)
        .unwrap_err();
    assert!(matches!(err, FolioError::PropertyResolution { .. }));
}
