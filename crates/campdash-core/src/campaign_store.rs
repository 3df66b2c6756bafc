//! Append-only CSV table of campaign definitions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::campaigns::parse_group_list;
use crate::config::parse_flag;
use crate::file_io::{csv_error, open_csv, write_csv_atomically};
use crate::{Campaign, CampaignDraft, GoalType, StoreError};

/// Column order of the campaign file.
pub const HEADERS: [&str; 9] = [
    "nome",
    "fornecedor",
    "grupos",
    "inicio",
    "fim",
    "personalizado",
    "tipo",
    "meta_geral",
    "metas_por_loja",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct CampaignStore {
    path: PathBuf,
}

impl CampaignStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every readable campaign in file order.
    ///
    /// A missing file is an empty list. Columns absent from the header read
    /// as empty strings. Rows whose dates cannot be parsed, or that fail
    /// campaign validation, are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file exists but cannot be read.
    pub fn load(&self) -> Result<Vec<Campaign>, StoreError> {
        let rows = self.read_rows()?;
        let mut campaigns = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            // +2: header line, then 1-based
            let line = index + 2;
            match parse_row(row) {
                Ok(campaign) => campaigns.push(campaign),
                Err(reason) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line,
                        reason = %reason,
                        "skipping unreadable campaign row"
                    );
                }
            }
        }

        Ok(campaigns)
    }

    /// Append `campaign` by rewriting the whole file atomically. Existing
    /// rows are carried over verbatim under the current column layout, even
    /// ones [`CampaignStore::load`] would skip.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the existing file cannot be read or the new
    /// file cannot be written.
    pub fn append(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let mut rows = self.read_rows()?;
        rows.push(to_row(campaign));

        write_csv_atomically(&self.path, |w| {
            w.write_record(HEADERS)?;
            for row in &rows {
                w.write_record(HEADERS.iter().map(|h| row.get(*h).map_or("", String::as_str)))?;
            }
            Ok(())
        })?;

        tracing::info!(
            path = %self.path.display(),
            campaign = campaign.name(),
            total = rows.len(),
            "campaign saved"
        );
        Ok(())
    }

    fn read_rows(&self) -> Result<Vec<BTreeMap<String, String>>, StoreError> {
        let Some(mut reader) = open_csv(&self.path)? else {
            return Ok(Vec::new());
        };

        let headers = reader
            .headers()
            .map_err(|e| csv_error(&self.path, e))?
            .clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| csv_error(&self.path, e))?;
            let row: BTreeMap<String, String> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.trim().to_string(), v.to_string()))
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }
}

fn to_row(campaign: &Campaign) -> BTreeMap<String, String> {
    let per_store = campaign.goal_type() == GoalType::PerStore;
    let targets_json = serde_json::to_string(campaign.per_store_targets())
        .unwrap_or_else(|_| "{}".to_string());

    [
        ("nome", campaign.name().to_string()),
        ("fornecedor", campaign.supplier().to_string()),
        ("grupos", campaign.groups_joined()),
        ("inicio", campaign.start_date().format(DATE_FORMAT).to_string()),
        ("fim", campaign.end_date().format(DATE_FORMAT).to_string()),
        ("personalizado", if per_store { "True" } else { "False" }.to_string()),
        ("tipo", campaign.goal_type().label().to_string()),
        ("meta_geral", campaign.overall_target().to_string()),
        ("metas_por_loja", targets_json),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn parse_row(row: &BTreeMap<String, String>) -> Result<Campaign, String> {
    let field = |name: &str| row.get(name).map_or("", |v| v.trim());

    let start_date = parse_date(field("inicio")).ok_or("unparseable inicio")?;
    let end_date = parse_date(field("fim")).ok_or("unparseable fim")?;

    let goal_type = GoalType::from_label(field("tipo")).unwrap_or(
        if parse_flag(field("personalizado")).unwrap_or(false) {
            GoalType::PerStore
        } else {
            GoalType::Overall
        },
    );

    let draft = CampaignDraft {
        name: field("nome").to_string(),
        supplier: field("fornecedor").to_string(),
        groups: parse_group_list(field("grupos")),
        start_date,
        end_date,
        goal_type,
        overall_target: parse_target(field("meta_geral")),
        per_store_targets: parse_store_targets(field("metas_por_loja")),
    };

    Campaign::try_from_stored(draft).map_err(|e| e.to_string())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    // older rows may carry a time component after the date
    let date_part = raw.split_whitespace().next()?;
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
}

/// Integer target, tolerating a float rendering like `150.0`. Blank or
/// unparseable values read as 0.
#[allow(clippy::cast_possible_truncation)]
fn parse_target(raw: &str) -> i64 {
    if raw.is_empty() {
        return 0;
    }
    raw.parse::<i64>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.round() as i64)
        })
        .unwrap_or(0)
}

/// JSON object of store code → target. Malformed JSON reads as an empty map.
fn parse_store_targets(raw: &str) -> BTreeMap<String, i64> {
    if raw.is_empty() {
        return BTreeMap::new();
    }
    match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(raw) {
        Ok(map) => map
            .into_iter()
            .filter_map(|(code, value)| {
                let target = match value {
                    serde_json::Value::Number(n) => n.as_i64().or_else(|| {
                        #[allow(clippy::cast_possible_truncation)]
                        n.as_f64().map(|f| f.round() as i64)
                    }),
                    serde_json::Value::String(s) => Some(parse_target(s.trim())),
                    _ => None,
                };
                target.map(|t| (code, t))
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed metas_por_loja");
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
#[path = "campaign_store_test.rs"]
mod tests;
