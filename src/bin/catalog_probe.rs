use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use blog_ui::config;
use blog_ui::{CatalogFacade, PageRequest, QueryKind};

#[derive(Parser, Debug)]
#[command(about = "Run one catalog query through the façade and print the result")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Page index for listings
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    page: i64,

    /// Page size for listings
    #[arg(long, default_value = "10", allow_hyphen_values = true)]
    size: i64,

    #[command(subcommand)]
    query: Probe,
}

#[derive(Subcommand, Debug)]
enum Probe {
    /// Latest entries
    All,
    /// Full-text search
    Search { term: String },
    /// One entry with content
    Entry { id: i64 },
    /// Entries with a tag
    Tag { tag: String },
    /// Entries under a comma-separated category path
    Categories { categories: String },
    /// Entries authored by a user
    CreatedBy { name: String },
    /// Entries last modified by a user
    UpdatedBy { name: String },
    /// All tags
    Tags,
    /// All category paths
    CategoryList,
}

impl Probe {
    fn kind(&self) -> QueryKind {
        match self {
            Probe::All => QueryKind::All,
            Probe::Search { .. } => QueryKind::BySearchTerm,
            Probe::Entry { .. } => QueryKind::ById,
            Probe::Tag { .. } => QueryKind::ByTag,
            Probe::Categories { .. } => QueryKind::ByCategories,
            Probe::CreatedBy { .. } => QueryKind::ByCreatedBy,
            Probe::UpdatedBy { .. } => QueryKind::ByUpdatedBy,
            Probe::Tags => QueryKind::AllTags,
            Probe::CategoryList => QueryKind::AllCategories,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let facade = CatalogFacade::from_config(&cfg)?;
    let page = PageRequest::new(args.page, args.size);

    let json = match &args.query {
        Probe::All => serde_json::to_string_pretty(&facade.find_all(page).await?)?,
        Probe::Search { term } => {
            serde_json::to_string_pretty(&facade.find_by_query(term, page).await?)?
        }
        Probe::Entry { id } => serde_json::to_string_pretty(&facade.find_by_id(*id).await?)?,
        Probe::Tag { tag } => serde_json::to_string_pretty(&facade.find_by_tag(tag, page).await?)?,
        Probe::Categories { categories } => {
            let categories = categories.split(',').map(str::to_string).collect();
            serde_json::to_string_pretty(&facade.find_by_categories(categories, page).await?)?
        }
        Probe::CreatedBy { name } => {
            serde_json::to_string_pretty(&facade.find_by_created_by(name, page).await?)?
        }
        Probe::UpdatedBy { name } => {
            serde_json::to_string_pretty(&facade.find_by_updated_by(name, page).await?)?
        }
        Probe::Tags => serde_json::to_string_pretty(&facade.find_tags().await?)?,
        Probe::CategoryList => serde_json::to_string_pretty(&facade.find_categories().await?)?,
    };

    println!("{}", json);
    println!(
        "circuit {}: {:?}",
        args.query.kind(),
        facade.circuit_state(args.query.kind())
    );
    Ok(())
}
