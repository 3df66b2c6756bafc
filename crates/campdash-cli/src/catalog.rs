//! Catalog command handlers. Reads go through the flat-file cache and
//! rebuild it from the database when a file is missing.

use campdash_core::{AppConfig, CatalogStore};
use campdash_db::{
    load_groups_or_rebuild, load_stores_or_rebuild, load_suppliers_or_rebuild, refresh_catalog,
    PgSource,
};
use clap::Subcommand;

/// Sub-commands available under `catalog`.
#[derive(Debug, Subcommand)]
pub enum CatalogCommands {
    /// Re-read stores and suppliers from the database
    Refresh,
    /// List known stores
    Stores,
    /// List known suppliers
    Suppliers,
    /// List the product groups of one supplier
    Groups {
        #[arg(long)]
        supplier: String,
    },
}

pub(crate) async fn run_catalog_refresh(
    config: &AppConfig,
    source: &PgSource,
) -> anyhow::Result<()> {
    let store = CatalogStore::new(&config.catalog_dir);
    let summary = refresh_catalog(source, &store).await?;
    println!(
        "catalog refreshed in {}: {} stores, {} suppliers, {} groups",
        store.dir().display(),
        summary.stores,
        summary.suppliers,
        summary.groups
    );
    Ok(())
}

pub(crate) async fn run_catalog_stores(config: &AppConfig, source: &PgSource) -> anyhow::Result<()> {
    let stores = load_stores_or_rebuild(source, &CatalogStore::new(&config.catalog_dir)).await?;
    println!("{:<8}NAME", "CODE");
    for store in &stores {
        println!("{:<8}{}", store.code, store.display_name);
    }
    Ok(())
}

pub(crate) async fn run_catalog_suppliers(
    config: &AppConfig,
    source: &PgSource,
) -> anyhow::Result<()> {
    let suppliers =
        load_suppliers_or_rebuild(source, &CatalogStore::new(&config.catalog_dir)).await?;
    for supplier in &suppliers {
        println!("{supplier}");
    }
    Ok(())
}

pub(crate) async fn run_catalog_groups(
    config: &AppConfig,
    source: &PgSource,
    supplier: &str,
) -> anyhow::Result<()> {
    let groups =
        load_groups_or_rebuild(source, &CatalogStore::new(&config.catalog_dir), supplier).await?;
    if groups.is_empty() {
        println!("no groups known for supplier '{supplier}'");
        return Ok(());
    }
    for group in &groups {
        println!("{group}");
    }
    Ok(())
}
