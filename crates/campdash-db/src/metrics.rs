//! Campaign metrics: net unit sales per store and product group.

use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use campdash_core::{
    combine_net_sales, resolve_progress, target_stores, AggregationResult, Campaign,
    CampaignProgress, SalesLine, SalesQuery, Store, ValidationError,
};
use chrono::NaiveDate;
use thiserror::Error;

use crate::DbError;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The sales database could not be reached or the query failed. Not retried.
    #[error("sales database unavailable: {0}")]
    Connectivity(#[from] DbError),
}

/// Where gross sales and returns come from.
pub trait SalesSource {
    /// Sold quantity per `(store, group)`.
    fn gross_sales(
        &self,
        query: &SalesQuery,
    ) -> impl Future<Output = Result<Vec<SalesLine>, DbError>> + Send;

    /// Returned quantity per `(store, group)`.
    fn returns(
        &self,
        query: &SalesQuery,
    ) -> impl Future<Output = Result<Vec<SalesLine>, DbError>> + Send;
}

/// Computes net sales from a [`SalesSource`] and memoizes the unfiltered
/// result per [`SalesQuery`].
///
/// Target stores are applied after the cache, so campaigns that differ only
/// in their store targets share one entry. Entries live until
/// [`MetricsEngine::clear_cache`] or until the engine is dropped.
#[derive(Debug)]
pub struct MetricsEngine<S> {
    source: S,
    cache: HashMap<SalesQuery, AggregationResult>,
}

impl<S: SalesSource> MetricsEngine<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Net sales for `supplier`/`groups` between `start` and `end`
    /// inclusive, restricted to `target_stores`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Validation`] before any query if `groups` is
    /// empty, `supplier` is blank, or the range is inverted, and
    /// [`MetricsError::Connectivity`] if either query fails.
    pub async fn compute_net_sales<G, T>(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        supplier: &str,
        groups: &[G],
        target_stores: &[T],
    ) -> Result<AggregationResult, MetricsError>
    where
        G: AsRef<str>,
        T: AsRef<str> + Sync,
    {
        let query = SalesQuery::new(start, end, supplier, groups)?;
        self.compute(&query, target_stores).await
    }

    /// Like [`MetricsEngine::compute_net_sales`] for an already validated
    /// query.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Connectivity`] if either query fails.
    pub async fn compute<T>(
        &mut self,
        query: &SalesQuery,
        target_stores: &[T],
    ) -> Result<AggregationResult, MetricsError>
    where
        T: AsRef<str> + Sync,
    {
        if let Some(hit) = self.cache.get(query) {
            tracing::debug!(
                supplier = query.supplier(),
                start = %query.start_date(),
                end = %query.end_date(),
                "metrics cache hit"
            );
            return Ok(hit.retain_stores(target_stores));
        }

        let started = Instant::now();
        let gross = self.source.gross_sales(query).await?;
        let returns = self.source.returns(query).await?;
        let gross_keys = gross.len();
        let return_keys = returns.len();
        let combined = combine_net_sales(gross, returns);

        tracing::info!(
            supplier = query.supplier(),
            start = %query.start_date(),
            end = %query.end_date(),
            groups = query.groups().len(),
            gross_keys,
            return_keys,
            rows = combined.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "computed net sales"
        );

        let filtered = combined.retain_stores(target_stores);
        self.cache.insert(query.clone(), combined);
        Ok(filtered)
    }

    /// Progress of `campaign` against its goal.
    ///
    /// Overall goals count every store in `known_stores`; per-store goals
    /// count only the stores they name.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] under the same conditions as
    /// [`MetricsEngine::compute_net_sales`].
    pub async fn campaign_progress(
        &mut self,
        campaign: &Campaign,
        known_stores: &[Store],
    ) -> Result<CampaignProgress, MetricsError> {
        let query = SalesQuery::for_campaign(campaign)?;
        let stores = target_stores(campaign, known_stores);
        let result = self.compute(&query, &stores).await?;
        Ok(resolve_progress(campaign, &result, known_stores))
    }

    /// Drop every memoized result so the next call re-queries the source.
    pub fn clear_cache(&mut self) {
        let dropped = self.cache.len();
        self.cache.clear();
        tracing::info!(dropped, "metrics cache cleared");
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;
