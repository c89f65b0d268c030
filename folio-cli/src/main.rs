//! Folio CLI - build search queries and list publishing sections

use clap::{Parser, Subcommand};
use colored::Colorize;
use folio_core::config::DEFAULT_CONFIG;
use folio_core::{
    Config, CoreSession, DocRef, DocumentModel, FacetTypeCache, FolioError, MemoryRepository,
    QueryBuilder, RootSectionsFinder, StandardConverter, Value,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Search query building and publishing section discovery", long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when omitted)
    #[arg(long, global = true, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a query from a pattern with '?' placeholders
    Query {
        /// Query pattern (e.g., "dc:title = ? AND dc:nature = ?")
        pattern: String,

        /// Positional parameter (repeatable): null, true/false, integer, RFC 3339 date or text
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Send the substituted pattern as a literal query string
        #[arg(long)]
        native: bool,

        /// Do not quote string parameters
        #[arg(long)]
        no_quote: bool,

        /// Do not escape string parameters
        #[arg(long)]
        no_escape: bool,
    },

    /// Build the query of a configured provider
    Provider {
        /// Provider name from the [[providers]] config entries
        name: String,

        /// Repository fixture supplying the document
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Path of the document predicate values are read from
        #[arg(long)]
        doc: Option<String>,

        /// Principal reading the document
        #[arg(long, default_value = "system")]
        user: String,

        /// Positional parameter (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Send text parts as literal query strings (overrides config)
        #[arg(long)]
        native: bool,
    },

    /// List the section roots a user may publish into
    Sections {
        /// Repository fixture
        #[arg(long)]
        fixture: PathBuf,

        /// Principal to list sections for
        #[arg(short, long)]
        user: String,

        /// Path of the document being published
        #[arg(long)]
        doc: Option<String>,

        /// List the default section roots instead of the document's
        #[arg(long)]
        default: bool,

        /// List only the sections configured on the document's workspace
        #[arg(long, requires = "doc", conflicts_with = "default")]
        workspace: bool,

        /// Skip sections nested under an already listed section
        #[arg(long)]
        only_heads: bool,

        /// Enumerate default roots again when none were found
        /// (with --default or --workspace)
        #[arg(long)]
        add_defaults: bool,
    },

    /// Print the default configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FOLIO_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Query {
            pattern,
            params,
            native,
            no_quote,
            no_escape,
        } => cmd_query(
            cli.config.as_deref(),
            &pattern,
            &params,
            native,
            no_quote,
            no_escape,
            cli.json,
        ),
        Commands::Provider {
            name,
            fixture,
            doc,
            user,
            params,
            native,
        } => cmd_provider(
            cli.config.as_deref(),
            &name,
            fixture.as_deref(),
            doc.as_deref(),
            &user,
            &params,
            native,
        ),
        Commands::Sections {
            fixture,
            user,
            doc,
            default,
            workspace,
            only_heads,
            add_defaults,
        } => sections_mode(doc, default, workspace, add_defaults).and_then(|mode| {
            cmd_sections(
                cli.config.as_deref(),
                &fixture,
                &user,
                mode,
                only_heads,
                add_defaults,
                cli.json,
            )
        }),
        Commands::Config => {
            print!("{}", DEFAULT_CONFIG);
            Ok(())
        }
    };

    if let Err(e) = result {
        if cli.json {
            match serde_json::to_string_pretty(&e.to_envelope()) {
                Ok(body) => eprintln!("{}", body),
                Err(_) => eprintln!("Error: {}", e),
            }
        } else {
            eprintln!("{}: {}", "Error".red(), e);
        }
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> folio_core::Result<Config> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            Config::load(path)
        }
        None => Ok(Config::default()),
    }
}

/// Interpret a command-line parameter
fn parse_param(raw: &str) -> Value {
    match raw {
        "null" => Value::Null,
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                Value::Integer(i)
            } else if let Ok(date) = Value::parse_date(raw) {
                date
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

fn parse_params(raw: &[String]) -> Vec<Value> {
    raw.iter().map(|p| parse_param(p)).collect()
}

fn cmd_query(
    config_path: Option<&Path>,
    pattern: &str,
    params: &[String],
    native: bool,
    no_quote: bool,
    no_escape: bool,
    json: bool,
) -> folio_core::Result<()> {
    let config = load_config(config_path)?;
    let converter = StandardConverter::from_config(&config.query);
    let builder = QueryBuilder::new(&converter);

    let quote = config.query.quote_pattern_parameters && !no_quote;
    let escape = config.query.escape_pattern_parameters && !no_escape;
    let use_native = native || config.query.use_native_query;

    let params = parse_params(params);
    let query = builder.make_query(pattern, &params, quote, escape, use_native)?;

    if json {
        println!("{}", serde_json::to_string(&query.to_json())?);
    } else {
        let text = folio_core::substitute_parameters(pattern, &params, quote, escape)?;
        println!("{}: {}", "Query".blue(), text);
        println!("{}", serde_json::to_string_pretty(&query.to_json())?);
    }
    Ok(())
}

fn cmd_provider(
    config_path: Option<&Path>,
    name: &str,
    fixture: Option<&Path>,
    doc_path: Option<&str>,
    user: &str,
    params: &[String],
    native: bool,
) -> folio_core::Result<()> {
    let config = load_config(config_path)?;
    let provider = config.provider(name)?;

    let repo = fixture.map(MemoryRepository::load).transpose()?;
    let doc = match (&repo, doc_path) {
        (Some(repo), Some(path)) => Some(read_document(repo, user, path)?),
        (None, Some(_)) => {
            return Err(FolioError::InvalidArgument(
                "--doc needs a --fixture to read the document from".to_string(),
            ))
        }
        _ => None,
    };

    let converter = StandardConverter::from_config(&config.query);
    let builder = QueryBuilder::new(&converter);
    let query = builder.make_provider_query(
        provider,
        doc.as_ref(),
        &parse_params(params),
        native || config.query.use_native_query,
    )?;

    println!("{}", serde_json::to_string_pretty(&query.to_json())?);
    Ok(())
}

fn read_document(repo: &MemoryRepository, user: &str, path: &str) -> folio_core::Result<DocumentModel> {
    let session = repo.session(user);
    if user == folio_core::memory::SYSTEM_PRINCIPAL {
        folio_core::run_unrestricted(&session, |elevated| {
            elevated.get_document(&DocRef::path(path))
        })
    } else {
        session.get_document(&DocRef::path(path))
    }
}

/// Which section list `folio sections` prints
#[derive(Debug, PartialEq)]
enum SectionsMode {
    Default,
    Accessible(String),
    Workspace(String),
}

fn sections_mode(
    doc: Option<String>,
    default: bool,
    workspace: bool,
    add_defaults: bool,
) -> folio_core::Result<SectionsMode> {
    match doc {
        Some(path) if workspace => Ok(SectionsMode::Workspace(path)),
        Some(_) if add_defaults && !default => Err(FolioError::InvalidArgument(
            "--add-defaults applies to --default or --workspace listings".to_string(),
        )),
        Some(path) if !default => Ok(SectionsMode::Accessible(path)),
        _ => Ok(SectionsMode::Default),
    }
}

fn cmd_sections(
    config_path: Option<&Path>,
    fixture: &Path,
    user: &str,
    mode: SectionsMode,
    only_heads: bool,
    add_defaults: bool,
    json: bool,
) -> folio_core::Result<()> {
    let config = load_config(config_path)?;
    let repo = Arc::new(MemoryRepository::load(fixture)?);
    let types = Arc::new(FacetTypeCache::new(repo.clone()));
    let session = repo.session(user);
    let mut finder = RootSectionsFinder::new(&session, config.publishing.clone(), types);

    let sections = match mode {
        SectionsMode::Default => finder.default_section_roots_with(only_heads, add_defaults)?,
        SectionsMode::Accessible(path) => {
            let current = session.get_document(&DocRef::path(path))?;
            finder.accessible_section_roots(&current)?.to_vec()
        }
        SectionsMode::Workspace(path) => {
            let current = session.get_document(&DocRef::path(path))?;
            finder.section_roots_for_workspace_with(&current, add_defaults)?
        }
    };

    print_sections(user, &sections, json)
}

fn print_sections(user: &str, sections: &[DocumentModel], json: bool) -> folio_core::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sections)?);
        return Ok(());
    }

    if sections.is_empty() {
        println!("{} for {}", "No sections".yellow(), user);
        return Ok(());
    }

    println!("{} for {}:", "Sections".green(), user);
    for section in sections {
        println!(
            "  {} {} ({})",
            section.path,
            format!("[{}]", section.doc_type).dimmed(),
            section.id
        );
    }
    Ok(())
}
