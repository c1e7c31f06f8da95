use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use table_explorer::browser::{BrowserView, EntityBrowser};
use table_explorer::cache::QueryCache;
use table_explorer::clone::CloneMutation;
use table_explorer::config;
use table_explorer::model::{CloneRequest, EntityType, ProjectTarget, SortMode};
use table_explorer::notify::LogNotifier;
use table_explorer::platform::{PlatformClient, PlatformService};
use table_explorer::prefs::{PreferenceStore, SqlitePreferences, SORT_PREFERENCE_KEY};

#[derive(Debug, Parser)]
#[command(author, version, about = "Browse database entities and trigger project clones")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List entities of a schema
    Entities {
        #[arg(long)]
        schema: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Show only this entity type (e.g. table, view)
        #[arg(long)]
        only: Option<EntityType>,
        /// alphabetical or grouped-alphabetical; remembered for later runs
        #[arg(long)]
        sort: Option<SortMode>,
        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: u32,
    },
    /// List schemas of the project
    Schemas,
    /// Clone the project from a backup
    Clone {
        #[arg(long)]
        backup_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    /// List clone backups of the project
    Backups,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.preferences_url());
    let prefs = Arc::new(SqlitePreferences::open(&database_url).await?);
    let service: Arc<dyn PlatformService> =
        Arc::new(PlatformClient::from_config(&cfg).context("failed to build platform client")?);
    let cache = Arc::new(QueryCache::new());
    let project = ProjectTarget {
        project_ref: cfg.project.project_ref.clone(),
        connection_string: cfg.project.connection_string.clone(),
    };

    match args.command {
        Command::Entities {
            schema,
            search,
            only,
            sort,
            pages,
        } => {
            if let Some(sort) = sort {
                prefs
                    .set(SORT_PREFERENCE_KEY, sort.as_str())
                    .await
                    .context("failed to save sort preference")?;
            }
            let browser =
                EntityBrowser::new(service, prefs, cache, project, cfg.app.page_size).await;
            browser
                .update_filter(|f| {
                    if let Some(schema) = &schema {
                        f.select_schema(schema);
                    }
                    if let Some(only) = only {
                        f.select_only(only);
                    }
                    if let Some(search) = search {
                        f.search_text = search;
                    }
                })
                .await;
            browser.load().await;
            for _ in 1..pages {
                browser.load_more().await;
            }
            print_view(&browser).await?;
        }
        Command::Schemas => {
            let browser =
                EntityBrowser::new(service, prefs, cache, project, cfg.app.page_size).await;
            for schema in browser.schemas().await? {
                let marker = if schema.is_protected() { " (protected)" } else { "" };
                println!("{}{}", schema.name, marker);
            }
        }
        Command::Clone {
            backup_id,
            name,
            password,
        } => {
            let mutation = CloneMutation::new(service, cache, Arc::new(LogNotifier));
            let result = mutation
                .mutate(CloneRequest {
                    project_ref: project.project_ref.clone(),
                    clone_backup_id: backup_id,
                    new_project_name: name,
                    new_db_pass: password,
                })
                .await?;
            info!("clone accepted");
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Backups => {
            let mutation = CloneMutation::new(service, cache, Arc::new(LogNotifier));
            for backup in mutation.list_clone_backups(&project.project_ref).await? {
                println!(
                    "{}\t{}\t{}",
                    backup.id,
                    backup.inserted_at.to_rfc3339(),
                    backup.status.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

async fn print_view(browser: &EntityBrowser) -> Result<()> {
    let locked = browser.is_locked().await.unwrap_or(false);
    match browser.view() {
        BrowserView::Loading => println!("Loading..."),
        BrowserView::Error { message } => bail!("Failed to retrieve tables: {}", message),
        BrowserView::Empty(empty) => {
            println!("{}", empty.title());
            println!("{}", empty.description());
        }
        BrowserView::List {
            entities,
            has_next_page,
            ..
        } => {
            if locked {
                println!("(protected schema: read-only)");
            }
            for entity in entities {
                println!("{}\t{}.{}", entity.kind.label(), entity.schema, entity.name);
            }
            if has_next_page {
                println!("... more available (use --pages)");
            }
        }
    }
    Ok(())
}
