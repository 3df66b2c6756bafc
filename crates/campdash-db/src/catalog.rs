//! Store and supplier reference data: database queries, refresh into the
//! flat-file [`CatalogStore`], and load-or-rebuild helpers.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use campdash_core::{CatalogStore, Store, StoreError, SupplierCatalog};
use sqlx::PgPool;
use thiserror::Error;

use crate::DbError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("catalog file task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Where store and supplier reference data come from.
pub trait CatalogSource {
    fn stores(&self) -> impl Future<Output = Result<Vec<Store>, DbError>> + Send;

    fn supplier_catalogs(
        &self,
    ) -> impl Future<Output = Result<Vec<SupplierCatalog>, DbError>> + Send;
}

/// Counts written by [`refresh_catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CatalogSummary {
    pub stores: usize,
    pub suppliers: usize,
    pub groups: usize,
}

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    code: String,
    display_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct SupplierGroupRow {
    supplier: String,
    group_code: String,
}

#[must_use]
pub fn stores_sql(schema: &str) -> String {
    format!(
        "SELECT \
             TRIM(l.cd_loja::TEXT) AS code, \
             TRIM(COALESCE(l.nm_loja::TEXT, '')) AS display_name \
         FROM \"{schema}\".loja l \
         ORDER BY 1"
    )
}

#[must_use]
pub fn supplier_groups_sql(schema: &str) -> String {
    format!(
        "SELECT DISTINCT \
             TRIM(p.fantasia::TEXT) AS supplier, \
             TRIM(gru.grupo::TEXT) AS group_code \
         FROM \"{schema}\".produto p \
         JOIN \"{schema}\".grupo gru ON p.codgru = gru.codgru \
         WHERE NULLIF(TRIM(p.fantasia::TEXT), '') IS NOT NULL \
           AND NULLIF(TRIM(gru.grupo::TEXT), '') IS NOT NULL \
         ORDER BY 1, 2"
    )
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn fetch_stores(pool: &PgPool, schema: &str) -> Result<Vec<Store>, DbError> {
    let rows = sqlx::query_as::<_, StoreRow>(&stores_sql(schema))
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| Store::new(r.code, r.display_name))
        .collect())
}

/// Every supplier with the groups its products belong to, sorted by
/// supplier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn fetch_supplier_catalogs(
    pool: &PgPool,
    schema: &str,
) -> Result<Vec<SupplierCatalog>, DbError> {
    let rows = sqlx::query_as::<_, SupplierGroupRow>(&supplier_groups_sql(schema))
        .fetch_all(pool)
        .await?;
    Ok(group_by_supplier(
        rows.into_iter().map(|r| (r.supplier, r.group_code)),
    ))
}

fn group_by_supplier(pairs: impl IntoIterator<Item = (String, String)>) -> Vec<SupplierCatalog> {
    let mut by_supplier: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (supplier, group) in pairs {
        by_supplier.entry(supplier).or_default().insert(group);
    }
    by_supplier
        .into_iter()
        .map(|(supplier, groups)| SupplierCatalog { supplier, groups })
        .collect()
}

/// Run a [`CatalogStore`] file operation on the blocking pool.
async fn on_disk<T, F>(store: &CatalogStore, op: F) -> Result<T, CatalogError>
where
    T: Send + 'static,
    F: FnOnce(&CatalogStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = store.clone();
    Ok(tokio::task::spawn_blocking(move || op(&store)).await??)
}

/// Re-read stores and suppliers from `source` and replace the flat files.
///
/// Both queries complete before anything is written, so a failed refresh
/// leaves the previous snapshot in place.
///
/// # Errors
///
/// Returns [`CatalogError::Db`] if a query fails and
/// [`CatalogError::Store`] if a file cannot be written.
pub async fn refresh_catalog<C: CatalogSource>(
    source: &C,
    store: &CatalogStore,
) -> Result<CatalogSummary, CatalogError> {
    let stores = source.stores().await?;
    let catalogs = source.supplier_catalogs().await?;

    let summary = CatalogSummary {
        stores: stores.len(),
        suppliers: catalogs.len(),
        groups: catalogs.iter().map(|c| c.groups.len()).sum(),
    };

    on_disk(store, move |s| {
        s.save_stores(&stores)?;
        s.save_suppliers(&catalogs)
    })
    .await?;

    tracing::info!(
        dir = %store.dir().display(),
        stores = summary.stores,
        suppliers = summary.suppliers,
        groups = summary.groups,
        "catalog refreshed"
    );
    Ok(summary)
}

/// Cached stores, rebuilding the catalog first if the file is missing.
///
/// # Errors
///
/// Returns [`CatalogError`] if the rebuild or the read fails.
pub async fn load_stores_or_rebuild<C: CatalogSource>(
    source: &C,
    store: &CatalogStore,
) -> Result<Vec<Store>, CatalogError> {
    match on_disk(store, CatalogStore::load_stores).await {
        Err(CatalogError::Store(StoreError::CatalogMissing(path))) => {
            tracing::info!(%path, "store catalog missing, rebuilding");
            refresh_catalog(source, store).await?;
            on_disk(store, CatalogStore::load_stores).await
        }
        other => other,
    }
}

/// Cached supplier names, rebuilding the catalog first if the file is
/// missing.
///
/// # Errors
///
/// Returns [`CatalogError`] if the rebuild or the read fails.
pub async fn load_suppliers_or_rebuild<C: CatalogSource>(
    source: &C,
    store: &CatalogStore,
) -> Result<Vec<String>, CatalogError> {
    match on_disk(store, CatalogStore::load_suppliers).await {
        Err(CatalogError::Store(StoreError::CatalogMissing(path))) => {
            tracing::info!(%path, "supplier catalog missing, rebuilding");
            refresh_catalog(source, store).await?;
            on_disk(store, CatalogStore::load_suppliers).await
        }
        other => other,
    }
}

/// Cached groups for `supplier`.
///
/// A supplier absent from an existing supplier list has no groups and does
/// not trigger a rebuild. Otherwise a missing file rebuilds the catalog once.
///
/// # Errors
///
/// Returns [`CatalogError`] if the rebuild or the read fails.
pub async fn load_groups_or_rebuild<C: CatalogSource>(
    source: &C,
    store: &CatalogStore,
    supplier: &str,
) -> Result<BTreeSet<String>, CatalogError> {
    let load_groups = {
        let supplier = supplier.to_string();
        move |s: &CatalogStore| s.load_groups(&supplier)
    };

    match on_disk(store, load_groups.clone()).await {
        Err(CatalogError::Store(StoreError::CatalogMissing(path))) => {
            match on_disk(store, CatalogStore::load_suppliers).await {
                Ok(known) if !known.iter().any(|s| s == supplier) => {
                    return Ok(BTreeSet::new());
                }
                Ok(_) | Err(CatalogError::Store(StoreError::CatalogMissing(_))) => {}
                Err(e) => return Err(e),
            }
            tracing::info!(%path, supplier, "group catalog missing, rebuilding");
            refresh_catalog(source, store).await?;
            match on_disk(store, load_groups).await {
                Err(CatalogError::Store(StoreError::CatalogMissing(_))) => Ok(BTreeSet::new()),
                other => other,
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FakeCatalog {
        stores: Vec<Store>,
        catalogs: Vec<SupplierCatalog>,
        fail: bool,
        refreshes: AtomicUsize,
    }

    impl FakeCatalog {
        fn new() -> Self {
            Self {
                stores: vec![Store::new("01", "Centro"), Store::new("08", "Matriz")],
                catalogs: group_by_supplier([
                    ("MANN".to_string(), "FIL".to_string()),
                    ("MANN".to_string(), "OLE".to_string()),
                    ("BOSCH".to_string(), "VEL".to_string()),
                ]),
                fail: false,
                refreshes: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn refreshes(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    impl CatalogSource for FakeCatalog {
        async fn stores(&self) -> Result<Vec<Store>, DbError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
            }
            Ok(self.stores.clone())
        }

        async fn supplier_catalogs(&self) -> Result<Vec<SupplierCatalog>, DbError> {
            Ok(self.catalogs.clone())
        }
    }

    #[test]
    fn supplier_pairs_group_and_sort() {
        let catalogs = group_by_supplier([
            ("MANN".to_string(), "OLE".to_string()),
            ("BOSCH".to_string(), "VEL".to_string()),
            ("MANN".to_string(), "FIL".to_string()),
            ("MANN".to_string(), "FIL".to_string()),
        ]);
        assert_eq!(catalogs.len(), 2);
        assert_eq!(catalogs[0].supplier, "BOSCH");
        assert_eq!(
            catalogs[1].groups.iter().collect::<Vec<_>>(),
            vec!["FIL", "OLE"]
        );
    }

    #[test]
    fn catalog_sql_targets_schema() {
        assert!(stores_sql("D-1").contains("FROM \"D-1\".loja l"));
        assert!(supplier_groups_sql("D-1").contains("SELECT DISTINCT"));
    }

    #[tokio::test]
    async fn refresh_writes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path());
        let source = FakeCatalog::new();

        let summary = refresh_catalog(&source, &store).await.unwrap();

        assert_eq!(
            summary,
            CatalogSummary {
                stores: 2,
                suppliers: 2,
                groups: 3
            }
        );
        assert_eq!(store.load_stores().unwrap(), source.stores);
        assert_eq!(store.load_suppliers().unwrap(), vec!["BOSCH", "MANN"]);
        assert!(store.load_groups("MANN").unwrap().contains("OLE"));
    }

    #[tokio::test]
    async fn missing_stores_file_triggers_one_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path());
        let source = FakeCatalog::new();

        let first = load_stores_or_rebuild(&source, &store).await.unwrap();
        let second = load_stores_or_rebuild(&source, &store).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.refreshes(), 1);
    }

    #[tokio::test]
    async fn missing_suppliers_file_triggers_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path());
        let source = FakeCatalog::new();

        let suppliers = load_suppliers_or_rebuild(&source, &store).await.unwrap();

        assert_eq!(suppliers, vec!["BOSCH", "MANN"]);
        assert_eq!(source.refreshes(), 1);
    }

    #[tokio::test]
    async fn unknown_supplier_has_no_groups_and_no_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path());
        let source = FakeCatalog::new();
        refresh_catalog(&source, &store).await.unwrap();

        let groups = load_groups_or_rebuild(&source, &store, "ACME").await.unwrap();

        assert!(groups.is_empty());
        assert_eq!(source.refreshes(), 1);
    }

    #[tokio::test]
    async fn groups_rebuild_from_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path());
        let source = FakeCatalog::new();

        let groups = load_groups_or_rebuild(&source, &store, "BOSCH").await.unwrap();

        assert_eq!(groups.into_iter().collect::<Vec<_>>(), vec!["VEL"]);
        assert_eq!(source.refreshes(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path());
        refresh_catalog(&FakeCatalog::new(), &store).await.unwrap();

        let err = refresh_catalog(&FakeCatalog::failing(), &store)
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Db(_)));
        assert_eq!(store.load_stores().unwrap().len(), 2);
    }
}
