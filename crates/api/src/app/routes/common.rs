use axum::http::StatusCode;

use tableforge_core::CampaignId;

use crate::app::errors;

/// Parse a campaign id from the path. A malformed id names no campaign, so
/// it reports as not-found rather than bad-input.
pub fn parse_campaign_id(raw: &str) -> Result<CampaignId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(StatusCode::NOT_FOUND, format!("Campaign not found: {raw}"))
    })
}
