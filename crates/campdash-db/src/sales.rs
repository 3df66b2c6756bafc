//! Gross sales and returns aggregation queries.
//!
//! Both queries aggregate to `(store, group)` and share the same parameter
//! layout:
//!
//! | param | meaning |
//! |-------|---------|
//! | `$1`, `$2` | inclusive emission date range |
//! | `$3` | product supplier (exact match) |
//! | `$4` | group codes (`= ANY`) |
//! | `$5` | denylist (sellers for sales, CFOPs for returns) |
//! | `$6`..`$8` | legacy scope: store, excluded customer area, excluded city (NULL = off) |

use campdash_core::{LegacyScope, SalesFilter, SalesLine, SalesQuery};
use sqlx::PgPool;

use crate::DbError;

/// A `(store, group)` aggregate as returned by Postgres.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalesLineRow {
    pub store_code: String,
    pub group_code: String,
    pub quantity: i64,
}

impl From<SalesLineRow> for SalesLine {
    fn from(row: SalesLineRow) -> Self {
        SalesLine::new(row.store_code.trim(), row.group_code.trim(), row.quantity)
    }
}

/// SQL for gross sold quantity per `(store, group)`.
#[must_use]
pub fn gross_sales_sql(schema: &str) -> String {
    format!(
        "SELECT \
             TRIM(pp.cd_loja::TEXT) AS store_code, \
             TRIM(gru.grupo::TEXT) AS group_code, \
             COALESCE(SUM(pp.qtde_ven), 0)::BIGINT AS quantity \
         FROM \"{schema}\".prod_ped pp \
         JOIN \"{schema}\".produto p ON pp.cod_pro = p.codpro \
         JOIN \"{schema}\".grupo gru ON p.codgru = gru.codgru \
         LEFT JOIN \"{schema}\".cliente c ON pp.codcli = c.codcli \
         WHERE pp.tipped = 'V' \
           AND pp.dt_emissao::DATE BETWEEN $1 AND $2 \
           AND TRIM(p.fantasia::TEXT) = $3 \
           AND TRIM(gru.grupo::TEXT) = ANY($4::TEXT[]) \
           AND pp.codvde::TEXT <> ALL($5::TEXT[]) \
           AND ($6::TEXT IS NULL OR TRIM(pp.cd_loja::TEXT) = $6) \
           AND ($7::TEXT IS NULL OR c.codarea::TEXT <> $7) \
           AND ($8::TEXT IS NULL OR c.codcid::TEXT <> $8) \
         GROUP BY 1, 2 \
         ORDER BY 1, 2"
    )
}

/// SQL for returned quantity per `(store, group)`, counting only lines of
/// non-cancelled customer return documents.
#[must_use]
pub fn returns_sql(schema: &str) -> String {
    format!(
        "SELECT \
             TRIM(pe.cd_loja::TEXT) AS store_code, \
             TRIM(gru.grupo::TEXT) AS group_code, \
             COALESCE(SUM(pe.qt_devolve), 0)::BIGINT AS quantity \
         FROM \"{schema}\".prod_ent pe \
         JOIN \"{schema}\".entrada e \
           ON e.cd_loja = pe.cd_loja AND e.sg_serie = pe.sg_serie AND e.nu_nota = pe.nu_nota \
         JOIN \"{schema}\".produto pro ON pro.codpro = pe.cd_produto \
         JOIN \"{schema}\".grupo gru ON pro.codgru = gru.codgru \
         LEFT JOIN \"{schema}\".cliente cli ON cli.codcli = pe.cd_cliente \
         WHERE pe.dt_emissao::DATE BETWEEN $1 AND $2 \
           AND e.in_cancela = 'N' \
           AND e.in_clifor = 'C' \
           AND TRIM(pro.fantasia::TEXT) = $3 \
           AND TRIM(gru.grupo::TEXT) = ANY($4::TEXT[]) \
           AND pe.cd_cfop::TEXT <> ALL($5::TEXT[]) \
           AND ($6::TEXT IS NULL OR TRIM(pe.cd_loja::TEXT) = $6) \
           AND ($7::TEXT IS NULL OR cli.codarea::TEXT <> $7) \
           AND ($8::TEXT IS NULL OR cli.codcid::TEXT <> $8) \
         GROUP BY 1, 2 \
         ORDER BY 1, 2"
    )
}

/// Returns gross sold quantity per `(store, group)` for `query`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn fetch_gross_sales(
    pool: &PgPool,
    schema: &str,
    query: &SalesQuery,
    filter: &SalesFilter,
) -> Result<Vec<SalesLine>, DbError> {
    fetch_lines(
        pool,
        &gross_sales_sql(schema),
        query,
        &filter.excluded_sellers,
        filter.legacy.as_ref(),
    )
    .await
}

/// Returns returned quantity per `(store, group)` for `query`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn fetch_returns(
    pool: &PgPool,
    schema: &str,
    query: &SalesQuery,
    filter: &SalesFilter,
) -> Result<Vec<SalesLine>, DbError> {
    fetch_lines(
        pool,
        &returns_sql(schema),
        query,
        &filter.excluded_cfops,
        filter.legacy.as_ref(),
    )
    .await
}

async fn fetch_lines(
    pool: &PgPool,
    sql: &str,
    query: &SalesQuery,
    denylist: &[String],
    legacy: Option<&LegacyScope>,
) -> Result<Vec<SalesLine>, DbError> {
    let rows = sqlx::query_as::<_, SalesLineRow>(sql)
        .bind(query.start_date())
        .bind(query.end_date())
        .bind(query.supplier())
        .bind(query.group_list())
        .bind(denylist.to_vec())
        .bind(legacy.map(|l| l.store_code.clone()))
        .bind(legacy.map(|l| l.excluded_customer_area.clone()))
        .bind(legacy.map(|l| l.excluded_customer_city.clone()))
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(SalesLine::from).collect())
}
