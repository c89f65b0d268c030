//! Configuration for folio

use crate::where_clause::WhereClauseDefinition;
use crate::FolioError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Folio Configuration

[query]
# Wrap string parameters in double quotes when substituting '?'
quote_pattern_parameters = true
# Backslash-escape '"' and '\' inside string parameters
escape_pattern_parameters = true
# Send substituted patterns as literal query strings instead of converting them
use_native_query = false
# Namespace of the full-text pseudo field
fulltext_field = "ecm:fulltext"

[publishing]
# Schema carrying the configured sections of a workspace
schema = "publishing"
# Property listing section ids on a workspace
sections_property = "publish:sections"
# Type of the documents directly under the repository root
domain_type = "Domain"
# Facet marking document types that are section roots
section_root_facet = "MasterPublishSpace"
# Facet marking document types that are sections
section_facet = "PublishSpace"
folderish_facet = "Folderish"
hidden_facet = "HiddenInNavigation"
deleted_state = "deleted"

# Named queries, either from a pattern or from a where clause:
#
# [[providers]]
# name = "by_title"
# pattern = "dc:title = ?"
"#;

/// Folio configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_true")]
    pub quote_pattern_parameters: bool,
    #[serde(default = "default_true")]
    pub escape_pattern_parameters: bool,
    #[serde(default)]
    pub use_native_query: bool,
    #[serde(default = "default_fulltext_field")]
    pub fulltext_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_sections_property")]
    pub sections_property: String,
    #[serde(default = "default_domain_type")]
    pub domain_type: String,
    #[serde(default = "default_section_root_facet")]
    pub section_root_facet: String,
    #[serde(default = "default_section_facet")]
    pub section_facet: String,
    #[serde(default = "default_folderish_facet")]
    pub folderish_facet: String,
    #[serde(default = "default_hidden_facet")]
    pub hidden_facet: String,
    #[serde(default = "default_deleted_state")]
    pub deleted_state: String,
}

/// Where a provider's query comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderSource {
    Pattern(String),
    WhereClause(WhereClauseDefinition),
}

/// A named query definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProvider", into = "RawProvider")]
pub struct ProviderDefinition {
    pub name: String,
    pub source: ProviderSource,
    pub quote_parameters: bool,
    pub escape_parameters: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawProvider {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    where_clause: Option<WhereClauseDefinition>,
    #[serde(default = "default_true")]
    quote_parameters: bool,
    #[serde(default = "default_true")]
    escape_parameters: bool,
}

impl TryFrom<RawProvider> for ProviderDefinition {
    type Error = String;

    fn try_from(raw: RawProvider) -> Result<Self, Self::Error> {
        let source = match (raw.pattern, raw.where_clause) {
            (Some(pattern), None) => ProviderSource::Pattern(pattern),
            (None, Some(clause)) => ProviderSource::WhereClause(clause),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "provider '{}' sets both pattern and where_clause",
                    raw.name
                ))
            }
            (None, None) => {
                return Err(format!(
                    "provider '{}' needs a pattern or a where_clause",
                    raw.name
                ))
            }
        };
        Ok(Self {
            name: raw.name,
            source,
            quote_parameters: raw.quote_parameters,
            escape_parameters: raw.escape_parameters,
        })
    }
}

impl From<ProviderDefinition> for RawProvider {
    fn from(def: ProviderDefinition) -> Self {
        let (pattern, where_clause) = match def.source {
            ProviderSource::Pattern(p) => (Some(p), None),
            ProviderSource::WhereClause(c) => (None, Some(c)),
        };
        Self {
            name: def.name,
            pattern,
            where_clause,
            quote_parameters: def.quote_parameters,
            escape_parameters: def.escape_parameters,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_fulltext_field() -> String {
    crate::search::FULLTEXT_FIELD.to_string()
}
fn default_schema() -> String {
    "publishing".to_string()
}
fn default_sections_property() -> String {
    "publish:sections".to_string()
}
fn default_domain_type() -> String {
    "Domain".to_string()
}
fn default_section_root_facet() -> String {
    "MasterPublishSpace".to_string()
}
fn default_section_facet() -> String {
    "PublishSpace".to_string()
}
fn default_folderish_facet() -> String {
    "Folderish".to_string()
}
fn default_hidden_facet() -> String {
    "HiddenInNavigation".to_string()
}
fn default_deleted_state() -> String {
    "deleted".to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            quote_pattern_parameters: true,
            escape_pattern_parameters: true,
            use_native_query: false,
            fulltext_field: default_fulltext_field(),
        }
    }
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            sections_property: default_sections_property(),
            domain_type: default_domain_type(),
            section_root_facet: default_section_root_facet(),
            section_facet: default_section_facet(),
            folderish_facet: default_folderish_facet(),
            hidden_facet: default_hidden_facet(),
            deleted_state: default_deleted_state(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| FolioError::ConfigParse(e.to_string()))
    }

    /// Find a provider by name
    pub fn provider(&self, name: &str) -> crate::Result<&ProviderDefinition> {
        self.providers
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| FolioError::UnknownProvider(name.to_string()))
    }
}
