mod campaign;
mod catalog;
mod report;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::{campaign::CampaignCommands, catalog::CatalogCommands, report::Month};

#[derive(Debug, Parser)]
#[command(name = "campdash-cli")]
#[command(about = "Sales campaign dashboard command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create and list campaigns
    Campaign {
        #[command(subcommand)]
        command: CampaignCommands,
    },
    /// Print a markdown progress report grouped by start month
    Report {
        /// Only include campaigns starting in this month (YYYY-MM)
        #[arg(long, value_parser = report::parse_month)]
        month: Option<Month>,
    },
    /// Inspect or rebuild the cached store and supplier catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Database connectivity
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the sales database answers
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("campdash-cli: no command given, see --help");
        return Ok(());
    };

    let config = campdash_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Campaign { command } => match command {
            CampaignCommands::Add {
                name,
                supplier,
                groups,
                start,
                end,
                overall_target,
                store_targets,
            } => campaign::run_campaign_add(
                &config,
                campaign::AddArgs {
                    name,
                    supplier,
                    groups,
                    start,
                    end,
                    overall_target,
                    store_targets,
                },
            )?,
            CampaignCommands::List => campaign::run_campaign_list(&config)?,
        },
        Commands::Report { month } => {
            let source = connect_source(&config)?;
            report::run_report(&config, source, month).await?;
        }
        Commands::Catalog { command } => {
            let source = connect_source(&config)?;
            match command {
                CatalogCommands::Refresh => catalog::run_catalog_refresh(&config, &source).await?,
                CatalogCommands::Stores => catalog::run_catalog_stores(&config, &source).await?,
                CatalogCommands::Suppliers => {
                    catalog::run_catalog_suppliers(&config, &source).await?;
                }
                CatalogCommands::Groups { supplier } => {
                    catalog::run_catalog_groups(&config, &source, &supplier).await?;
                }
            }
        }
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            let source = connect_source(&config)?;
            campdash_db::health_check(source.pool()).await?;
            println!("database reachable (schema \"{}\")", source.schema());
        }
    }

    Ok(())
}

fn connect_source(config: &campdash_core::AppConfig) -> anyhow::Result<campdash_db::PgSource> {
    let pool_config = campdash_db::PoolConfig::from_app_config(config);
    let pool = campdash_db::connect_pool(&config.database_url, pool_config)?;
    Ok(campdash_db::PgSource::from_app_config(pool, config)?)
}
