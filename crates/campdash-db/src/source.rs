//! The Postgres-backed [`SalesSource`] and [`CatalogSource`].

use campdash_core::config::is_valid_schema_name;
use campdash_core::{AppConfig, SalesFilter, SalesLine, SalesQuery, Store, SupplierCatalog};
use sqlx::PgPool;

use crate::catalog::{fetch_stores, fetch_supplier_catalogs, CatalogSource};
use crate::metrics::SalesSource;
use crate::sales::{fetch_gross_sales, fetch_returns};
use crate::DbError;

/// A pool bound to one source schema and one set of exclusion rules.
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
    schema: String,
    filter: SalesFilter,
}

impl PgSource {
    /// # Errors
    ///
    /// Returns [`DbError::InvalidSchema`] if `schema` is not a safe identifier.
    pub fn new(
        pool: PgPool,
        schema: impl Into<String>,
        filter: SalesFilter,
    ) -> Result<Self, DbError> {
        let schema = schema.into();
        if !is_valid_schema_name(&schema) {
            return Err(DbError::InvalidSchema(schema));
        }
        Ok(Self {
            pool,
            schema,
            filter,
        })
    }

    /// # Errors
    ///
    /// Returns [`DbError::InvalidSchema`] if the configured schema is not a
    /// safe identifier.
    pub fn from_app_config(pool: PgPool, config: &AppConfig) -> Result<Self, DbError> {
        Self::new(
            pool,
            config.db_schema.clone(),
            SalesFilter::from_app_config(config),
        )
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    #[must_use]
    pub fn filter(&self) -> &SalesFilter {
        &self.filter
    }
}

impl SalesSource for PgSource {
    async fn gross_sales(&self, query: &SalesQuery) -> Result<Vec<SalesLine>, DbError> {
        fetch_gross_sales(&self.pool, &self.schema, query, &self.filter).await
    }

    async fn returns(&self, query: &SalesQuery) -> Result<Vec<SalesLine>, DbError> {
        fetch_returns(&self.pool, &self.schema, query, &self.filter).await
    }
}

impl CatalogSource for PgSource {
    async fn stores(&self) -> Result<Vec<Store>, DbError> {
        fetch_stores(&self.pool, &self.schema).await
    }

    async fn supplier_catalogs(&self) -> Result<Vec<SupplierCatalog>, DbError> {
        fetch_supplier_catalogs(&self.pool, &self.schema).await
    }
}
