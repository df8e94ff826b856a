//! `POST /api/scrape-website`

use super::{api_error, AppState};
use crate::scraper::validate_url;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeRequest {
    #[serde(default)]
    url: String,
}

pub(super) async fn scrape_website(
    State(state): State<AppState>,
    Json(req): Json<ScrapeRequest>,
) -> (StatusCode, Json<Value>) {
    if req.url.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "url is required");
    }
    let url = match validate_url(&req.url) {
        Ok(u) => u,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.scraper.scrape(state.provider.as_ref(), &url).await {
        Ok(data) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": data,
                "sourceUrl": url.as_str(),
            })),
        ),
        Err(e) => {
            warn!("scrape-website: {url}: {e}");
            api_error(StatusCode::BAD_GATEWAY, "Failed to scrape website")
        }
    }
}
