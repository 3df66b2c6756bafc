//! Campaign handlers: the monthly progress dashboard and campaign creation.

use axum::{extract::State, http::StatusCode, Extension, Json};
use campdash_core::{group_by_month, Campaign, CampaignDraft, CampaignProgress, CampaignStore};
use campdash_db::load_stores_or_rebuild;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{
    map_catalog_error, map_validation_error, on_campaign_file, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Serialize)]
pub(in crate::api) struct MonthView {
    pub month: String,
    pub campaigns: Vec<CampaignView>,
}

/// A campaign with either its progress or the reason it could not be
/// computed.
#[derive(Debug, Serialize)]
pub(in crate::api) struct CampaignView {
    pub campaign: Campaign,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<CampaignProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/v1/campaigns: every campaign grouped by start month, with
/// progress. A campaign whose metrics fail carries an `error` instead and
/// does not fail the request.
pub(in crate::api) async fn list_campaigns(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<MonthView>>>, ApiError> {
    let rid = &req_id.0;

    let campaigns = on_campaign_file(rid, &state.campaigns, CampaignStore::load).await?;
    if campaigns.is_empty() {
        return Ok(Json(ApiResponse::new(&req_id, Vec::new())));
    }

    let stores = load_stores_or_rebuild(&state.source, &state.catalog)
        .await
        .map_err(|e| map_catalog_error(rid, &e))?;

    let mut engine = state.engine.lock().await;
    let mut months = Vec::new();
    for group in group_by_month(&campaigns) {
        let mut views = Vec::with_capacity(group.campaigns.len());
        for campaign in &group.campaigns {
            let view = match engine.campaign_progress(campaign, &stores).await {
                Ok(progress) => CampaignView {
                    campaign: (*campaign).clone(),
                    progress: Some(progress),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(
                        campaign = campaign.name(),
                        error = %e,
                        "metrics failed for campaign"
                    );
                    CampaignView {
                        campaign: (*campaign).clone(),
                        progress: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            views.push(view);
        }
        months.push(MonthView {
            month: group.label(),
            campaigns: views,
        });
    }

    Ok(Json(ApiResponse::new(&req_id, months)))
}

/// POST /api/v1/campaigns: validate and append a campaign.
pub(in crate::api) async fn create_campaign(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(draft): Json<CampaignDraft>,
) -> Result<(StatusCode, Json<ApiResponse<Campaign>>), ApiError> {
    let rid = &req_id.0;

    let campaign = Campaign::try_from_draft(draft).map_err(|e| map_validation_error(rid, &e))?;

    let campaign = {
        let _guard = state.campaign_writes.lock().await;
        on_campaign_file(rid, &state.campaigns, move |store| {
            store.append(&campaign)?;
            Ok(campaign)
        })
        .await?
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(&req_id, campaign)),
    ))
}
