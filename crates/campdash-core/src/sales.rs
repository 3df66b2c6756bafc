//! Net-sales types and the in-memory combine step of the metrics pipeline.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{AppConfig, Campaign, ValidationError};

/// Internal/system salesperson codes whose sales never count toward a campaign.
pub const DEFAULT_EXCLUDED_SELLERS: &[&str] = &["0100", "0001", "0006", "2319"];

/// CFOP codes whose return documents never count against a campaign.
pub const DEFAULT_EXCLUDED_CFOPS: &[&str] = &["1949", "2949", "1603"];

/// One aggregated `(store, group)` quantity as returned by either the gross
/// sales or the returns query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesLine {
    pub store_code: String,
    pub group: String,
    pub quantity: i64,
}

impl SalesLine {
    #[must_use]
    pub fn new(store_code: impl Into<String>, group: impl Into<String>, quantity: i64) -> Self {
        Self {
            store_code: store_code.into(),
            group: group.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetSalesRow {
    pub store_code: String,
    pub group: String,
    pub gross_quantity: i64,
    pub returned_quantity: i64,
    /// `gross_quantity - returned_quantity`; negative when returns win.
    pub net_quantity: i64,
}

/// Net sales for one query, sorted by `(store_code, group)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationResult {
    rows: Vec<NetSalesRow>,
}

impl AggregationResult {
    #[must_use]
    pub fn rows(&self) -> &[NetSalesRow] {
        &self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn total_net(&self) -> i64 {
        self.rows.iter().map(|r| r.net_quantity).sum()
    }

    #[must_use]
    pub fn total_gross(&self) -> i64 {
        self.rows.iter().map(|r| r.gross_quantity).sum()
    }

    #[must_use]
    pub fn total_returned(&self) -> i64 {
        self.rows.iter().map(|r| r.returned_quantity).sum()
    }

    #[must_use]
    pub fn net_for_store(&self, store_code: &str) -> i64 {
        self.rows
            .iter()
            .filter(|r| r.store_code == store_code)
            .map(|r| r.net_quantity)
            .sum()
    }

    /// Keep only rows whose store is one of `stores`.
    #[must_use]
    pub fn retain_stores<S: AsRef<str>>(&self, stores: &[S]) -> Self {
        let wanted: BTreeSet<&str> = stores.iter().map(AsRef::as_ref).collect();
        Self {
            rows: self
                .rows
                .iter()
                .filter(|r| wanted.contains(r.store_code.as_str()))
                .cloned()
                .collect(),
        }
    }
}

impl FromIterator<NetSalesRow> for AggregationResult {
    fn from_iter<I: IntoIterator<Item = NetSalesRow>>(iter: I) -> Self {
        let mut rows: Vec<NetSalesRow> = iter.into_iter().collect();
        rows.sort_by(|a, b| (&a.store_code, &a.group).cmp(&(&b.store_code, &b.group)));
        Self { rows }
    }
}

/// Left-join returns onto gross sales by `(store, group)` and subtract.
///
/// Keys present only in `returns` are dropped: a store/group with returns
/// but no sales in the period does not appear in the result. Duplicate keys
/// on either side are summed first.
#[must_use]
pub fn combine_net_sales(gross: Vec<SalesLine>, returns: Vec<SalesLine>) -> AggregationResult {
    let mut sold: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in gross {
        *sold.entry((line.store_code, line.group)).or_insert(0) += line.quantity;
    }

    let mut returned: HashMap<(String, String), i64> = HashMap::new();
    for line in returns {
        *returned.entry((line.store_code, line.group)).or_insert(0) += line.quantity;
    }

    sold.into_iter()
        .map(|(key, gross_quantity)| {
            let returned_quantity = returned.get(&key).copied().unwrap_or(0);
            let (store_code, group) = key;
            NetSalesRow {
                store_code,
                group,
                gross_quantity,
                returned_quantity,
                net_quantity: gross_quantity - returned_quantity,
            }
        })
        .collect()
}

/// The parameters that determine a metrics result. Also the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SalesQuery {
    start_date: NaiveDate,
    end_date: NaiveDate,
    supplier: String,
    groups: BTreeSet<String>,
}

impl SalesQuery {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the supplier is blank, no group code is
    /// given, or `start_date > end_date`.
    pub fn new<I, S>(
        start_date: NaiveDate,
        end_date: NaiveDate,
        supplier: &str,
        groups: I,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if supplier.trim().is_empty() {
            return Err(ValidationError::EmptySupplier);
        }

        let groups: BTreeSet<String> = groups
            .into_iter()
            .map(|g| g.as_ref().trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        if groups.is_empty() {
            return Err(ValidationError::EmptyGroups);
        }

        if start_date > end_date {
            return Err(ValidationError::InvertedDateRange {
                start: start_date,
                end: end_date,
            });
        }

        Ok(Self {
            start_date,
            end_date,
            // matched exactly against the product supplier column
            supplier: supplier.to_string(),
            groups,
        })
    }

    /// # Errors
    ///
    /// Never fails for a validated [`Campaign`]; the `Result` mirrors
    /// [`SalesQuery::new`].
    pub fn for_campaign(campaign: &Campaign) -> Result<Self, ValidationError> {
        Self::new(
            campaign.start_date(),
            campaign.end_date(),
            campaign.supplier(),
            campaign.groups(),
        )
    }

    #[must_use]
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    #[must_use]
    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    #[must_use]
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Group codes as an owned vector, ready to bind as a text array.
    #[must_use]
    pub fn group_list(&self) -> Vec<String> {
        self.groups.iter().cloned().collect()
    }
}

/// Extra predicates of the historical single-store report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyScope {
    pub store_code: String,
    pub excluded_customer_area: String,
    pub excluded_customer_city: String,
}

impl Default for LegacyScope {
    fn default() -> Self {
        Self {
            store_code: "08".to_string(),
            excluded_customer_area: "112".to_string(),
            excluded_customer_city: "0501".to_string(),
        }
    }
}

/// Fixed exclusion rules applied to every gross/returns query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesFilter {
    pub excluded_sellers: Vec<String>,
    pub excluded_cfops: Vec<String>,
    pub legacy: Option<LegacyScope>,
}

impl Default for SalesFilter {
    fn default() -> Self {
        Self {
            excluded_sellers: DEFAULT_EXCLUDED_SELLERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            excluded_cfops: DEFAULT_EXCLUDED_CFOPS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            legacy: None,
        }
    }
}

impl SalesFilter {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            excluded_sellers: config.excluded_sellers.clone(),
            excluded_cfops: config.excluded_cfops.clone(),
            legacy: config.legacy_scope.then(LegacyScope::default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn net_is_gross_minus_returns() {
        let result = combine_net_sales(
            vec![SalesLine::new("01", "FIL", 100)],
            vec![SalesLine::new("01", "FIL", 30)],
        );
        assert_eq!(result.len(), 1);
        let row = &result.rows()[0];
        assert_eq!(row.gross_quantity, 100);
        assert_eq!(row.returned_quantity, 30);
        assert_eq!(row.net_quantity, 70);
    }

    #[test]
    fn returns_without_sales_are_dropped() {
        let result = combine_net_sales(
            vec![SalesLine::new("01", "FIL", 5)],
            vec![SalesLine::new("02", "FIL", 10), SalesLine::new("01", "OLEO", 3)],
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows()[0].store_code, "01");
        assert_eq!(result.rows()[0].group, "FIL");
        assert_eq!(result.rows()[0].net_quantity, 5);
    }

    #[test]
    fn returns_exceeding_sales_go_negative() {
        let result = combine_net_sales(
            vec![SalesLine::new("01", "FIL", 2)],
            vec![SalesLine::new("01", "FIL", 7)],
        );
        assert_eq!(result.total_net(), -5);
    }

    #[test]
    fn duplicate_keys_are_summed() {
        let result = combine_net_sales(
            vec![SalesLine::new("01", "FIL", 2), SalesLine::new("01", "FIL", 3)],
            vec![SalesLine::new("01", "FIL", 1), SalesLine::new("01", "FIL", 1)],
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows()[0].net_quantity, 3);
    }

    #[test]
    fn rows_are_sorted_by_store_then_group() {
        let result = combine_net_sales(
            vec![
                SalesLine::new("02", "A", 1),
                SalesLine::new("01", "B", 1),
                SalesLine::new("01", "A", 1),
            ],
            vec![],
        );
        let keys: Vec<(&str, &str)> = result
            .rows()
            .iter()
            .map(|r| (r.store_code.as_str(), r.group.as_str()))
            .collect();
        assert_eq!(keys, vec![("01", "A"), ("01", "B"), ("02", "A")]);
    }

    #[test]
    fn retain_stores_filters_rows() {
        let result = combine_net_sales(
            vec![
                SalesLine::new("01", "A", 4),
                SalesLine::new("02", "A", 6),
                SalesLine::new("03", "A", 8),
            ],
            vec![],
        );
        let filtered = result.retain_stores(&["01", "03", "99"]);
        assert_eq!(filtered.total_net(), 12);
        assert_eq!(filtered.net_for_store("02"), 0);
    }

    #[test]
    fn empty_inputs_give_empty_result() {
        let result = combine_net_sales(vec![], vec![SalesLine::new("01", "A", 1)]);
        assert!(result.is_empty());
        assert_eq!(result.total_net(), 0);
    }

    #[test]
    fn sales_query_rejects_empty_groups() {
        let err = SalesQuery::new(date(2024, 1, 1), date(2024, 1, 31), "MANN", Vec::<String>::new())
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyGroups);
    }

    #[test]
    fn sales_query_rejects_inverted_range() {
        let err = SalesQuery::new(date(2024, 2, 1), date(2024, 1, 31), "MANN", ["FIL"]).unwrap_err();
        assert!(matches!(err, ValidationError::InvertedDateRange { .. }));
    }

    #[test]
    fn sales_query_treats_groups_as_a_set() {
        let a = SalesQuery::new(date(2024, 1, 1), date(2024, 1, 31), "MANN", ["B", "A"]).unwrap();
        let b = SalesQuery::new(date(2024, 1, 1), date(2024, 1, 31), "MANN", ["A", "B", "A"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.group_list(), vec!["A", "B"]);
    }

    #[test]
    fn sales_query_keeps_supplier_case() {
        let q = SalesQuery::new(date(2024, 1, 1), date(2024, 1, 31), "Mann", ["A"]).unwrap();
        assert_eq!(q.supplier(), "Mann");
    }

    #[test]
    fn default_filter_has_no_legacy_scope() {
        let filter = SalesFilter::default();
        assert!(filter.legacy.is_none());
        assert_eq!(filter.excluded_cfops, vec!["1949", "2949", "1603"]);
    }
}
