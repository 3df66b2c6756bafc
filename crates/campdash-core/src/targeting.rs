//! Goal resolution: which stores a campaign targets and how far it got.

use serde::Serialize;

use crate::{AggregationResult, Campaign, GoalType, Store};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetProgress {
    /// `None` for an overall goal.
    pub store_code: Option<String>,
    pub store_name: Option<String>,
    pub target: i64,
    pub achieved: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignProgress {
    pub goal_type: GoalType,
    pub total_gross: i64,
    pub total_returned: i64,
    pub total_net: i64,
    pub targets: Vec<TargetProgress>,
}

/// Stores whose rows count toward `campaign`.
///
/// Overall goals count every known store; per-store goals count exactly the
/// stores that have a target.
#[must_use]
pub fn target_stores(campaign: &Campaign, known_stores: &[Store]) -> Vec<String> {
    match campaign.goal_type() {
        GoalType::Overall => known_stores.iter().map(|s| s.code.clone()).collect(),
        GoalType::PerStore => campaign.per_store_targets().keys().cloned().collect(),
    }
}

/// `100 * achieved / target`, or `0.0` when the target is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(achieved: i64, target: i64) -> f64 {
    if target == 0 {
        return 0.0;
    }
    100.0 * achieved as f64 / target as f64
}

/// Compute progress lines for `campaign` from an already store-filtered
/// result.
#[must_use]
pub fn resolve_progress(
    campaign: &Campaign,
    result: &AggregationResult,
    known_stores: &[Store],
) -> CampaignProgress {
    let targets = match campaign.goal_type() {
        GoalType::Overall => {
            let achieved = result.total_net();
            vec![TargetProgress {
                store_code: None,
                store_name: None,
                target: campaign.overall_target(),
                achieved,
                percentage: percentage(achieved, campaign.overall_target()),
            }]
        }
        GoalType::PerStore => campaign
            .per_store_targets()
            .iter()
            .map(|(code, &target)| {
                let achieved = result.net_for_store(code);
                TargetProgress {
                    store_code: Some(code.clone()),
                    store_name: known_stores
                        .iter()
                        .find(|s| &s.code == code)
                        .map(|s| s.display_name.clone()),
                    target,
                    achieved,
                    percentage: percentage(achieved, target),
                }
            })
            .collect(),
    };

    CampaignProgress {
        goal_type: campaign.goal_type(),
        total_gross: result.total_gross(),
        total_returned: result.total_returned(),
        total_net: result.total_net(),
        targets,
    }
}
