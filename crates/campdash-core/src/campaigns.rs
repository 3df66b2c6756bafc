use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// One aggregate target across every known store.
    Overall,
    /// An independent target per store.
    PerStore,
}

impl GoalType {
    /// Label written to the `tipo` column of the campaign file.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            GoalType::Overall => "Geral",
            GoalType::PerStore => "Por Loja",
        }
    }

    /// Inverse of [`GoalType::label`]. Matching ignores case and surrounding
    /// whitespace; anything else yields `None`.
    #[must_use]
    pub fn from_label(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("Geral") {
            Some(GoalType::Overall)
        } else if raw.eq_ignore_ascii_case("Por Loja") {
            Some(GoalType::PerStore)
        } else {
            None
        }
    }
}

impl std::fmt::Display for GoalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Unvalidated campaign input as submitted by a user.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignDraft {
    pub name: String,
    pub supplier: String,
    pub groups: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub goal_type: GoalType,
    #[serde(default)]
    pub overall_target: i64,
    #[serde(default)]
    pub per_store_targets: BTreeMap<String, i64>,
}

/// A validated, immutable campaign definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
    name: String,
    supplier: String,
    groups: Vec<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    goal_type: GoalType,
    overall_target: i64,
    per_store_targets: BTreeMap<String, i64>,
}

impl Campaign {
    /// Validate a draft into a campaign.
    ///
    /// Name and supplier are trimmed, group codes are trimmed and
    /// de-duplicated in first-seen order, and the target kind that does not
    /// match `goal_type` is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required field is blank, the group
    /// list is empty, the date range is inverted, a target is negative, or a
    /// per-store campaign has no store targets.
    pub fn try_from_draft(draft: CampaignDraft) -> Result<Self, ValidationError> {
        Self::validate(draft, true)
    }

    /// Like [`Campaign::try_from_draft`] but tolerates a per-store campaign
    /// with no targets, which happens when a stored target map was
    /// unreadable.
    pub(crate) fn try_from_stored(draft: CampaignDraft) -> Result<Self, ValidationError> {
        Self::validate(draft, false)
    }

    fn validate(draft: CampaignDraft, require_targets: bool) -> Result<Self, ValidationError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let supplier = draft.supplier.trim().to_string();
        if supplier.is_empty() {
            return Err(ValidationError::EmptySupplier);
        }

        let groups = normalize_groups(draft.groups.iter().map(String::as_str));
        if groups.is_empty() {
            return Err(ValidationError::EmptyGroups);
        }

        if draft.start_date > draft.end_date {
            return Err(ValidationError::InvertedDateRange {
                start: draft.start_date,
                end: draft.end_date,
            });
        }

        let (overall_target, per_store_targets) = match draft.goal_type {
            GoalType::Overall => {
                if draft.overall_target < 0 {
                    return Err(ValidationError::NegativeTarget {
                        scope: "overall".to_string(),
                        value: draft.overall_target,
                    });
                }
                (draft.overall_target, BTreeMap::new())
            }
            GoalType::PerStore => {
                let targets: BTreeMap<String, i64> = draft
                    .per_store_targets
                    .into_iter()
                    .map(|(code, value)| (code.trim().to_string(), value))
                    .filter(|(code, _)| !code.is_empty())
                    .collect();
                if require_targets && targets.is_empty() {
                    return Err(ValidationError::MissingStoreTargets);
                }
                if let Some((code, value)) = targets.iter().find(|(_, v)| **v < 0) {
                    return Err(ValidationError::NegativeTarget {
                        scope: format!("store {code}"),
                        value: *value,
                    });
                }
                (0, targets)
            }
        };

        Ok(Self {
            name,
            supplier,
            groups,
            start_date: draft.start_date,
            end_date: draft.end_date,
            goal_type: draft.goal_type,
            overall_target,
            per_store_targets,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
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
    pub fn goal_type(&self) -> GoalType {
        self.goal_type
    }

    #[must_use]
    pub fn overall_target(&self) -> i64 {
        self.overall_target
    }

    #[must_use]
    pub fn per_store_targets(&self) -> &BTreeMap<String, i64> {
        &self.per_store_targets
    }

    /// Group codes joined the way the campaign file stores them.
    #[must_use]
    pub fn groups_joined(&self) -> String {
        self.groups.join(";")
    }
}

/// Split a semicolon-separated group list, trimming and de-duplicating.
#[must_use]
pub fn parse_group_list(raw: &str) -> Vec<String> {
    normalize_groups(raw.split(';'))
}

fn normalize_groups<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.map(str::trim)
        .filter(|g| !g.is_empty())
        .filter(|g| seen.insert((*g).to_string()))
        .map(ToOwned::to_owned)
        .collect()
}

/// Campaigns sharing the calendar month of their start date.
#[derive(Debug, Clone)]
pub struct MonthGroup<'a> {
    pub year: i32,
    pub month: u32,
    pub campaigns: Vec<&'a Campaign>,
}

impl MonthGroup<'_> {
    /// `YYYY-MM`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Bucket campaigns by start month, months ascending, preserving input
/// order inside each month.
#[must_use]
pub fn group_by_month(campaigns: &[Campaign]) -> Vec<MonthGroup<'_>> {
    let mut buckets: BTreeMap<(i32, u32), Vec<&Campaign>> = BTreeMap::new();
    for campaign in campaigns {
        let key = (campaign.start_date.year(), campaign.start_date.month());
        buckets.entry(key).or_default().push(campaign);
    }

    buckets
        .into_iter()
        .map(|((year, month), campaigns)| MonthGroup {
            year,
            month,
            campaigns,
        })
        .collect()
}

#[cfg(test)]
#[path = "campaigns_test.rs"]
mod tests;
