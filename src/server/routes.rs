use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::og::RenderRequest;
use crate::score::ScoreSource;
use crate::{MiniAppError, Result};

/// Lets an intermediary keep a score for an hour to spare upstream
/// credits.
pub const SCORE_CACHE_CONTROL: &str = "public, s-maxage=3600";
/// A card is a pure function of its query.
pub const OG_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
/// A card drawn without its avatar is retried on the next request.
pub const FALLBACK_OG_CACHE_CONTROL: &str = "no-store";

#[derive(Debug, Deserialize)]
pub struct ScoreQuery {
    fid: Option<String>,
}

fn parse_fid(raw: Option<&str>) -> Result<u64> {
    let raw = raw
        .map(str::trim)
        .filter(|fid| !fid.is_empty())
        .ok_or(MiniAppError::MissingParameter("FID"))?;
    raw.parse()
        .map_err(|_| MiniAppError::MalformedParameter("FID", raw.to_string()))
}

pub async fn score(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScoreQuery>,
) -> Result<Response> {
    let fid = parse_fid(query.fid.as_deref())?;
    let result = state.scores.fetch(fid).await?;
    log::debug!("Score of fid {fid}: {}", result.formatted());
    Ok(([(CACHE_CONTROL, SCORE_CACHE_CONTROL)], Json(result)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct OgQuery {
    score: Option<String>,
    user: Option<String>,
    pfp: Option<String>,
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .split(',')
                .map(str::trim)
                .any(|candidate| candidate == etag || candidate == "*")
        })
}

pub async fn og(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OgQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let request = RenderRequest::from_query(
        query.score.as_deref(),
        query.user.as_deref(),
        query.pfp.as_deref(),
    );

    let etag = request.etag();
    if etag_matches(&headers, &etag) {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(ETAG, etag), (CACHE_CONTROL, OG_CACHE_CONTROL.to_string())],
        )
            .into_response());
    }

    let rendered =
        state.renderer.render(&request).await.map_err(|e| match e {
            MiniAppError::Render(_) => e,
            other => MiniAppError::Render(other.to_string()),
        })?;

    if !rendered.complete {
        return Ok((
            [
                (CONTENT_TYPE, "image/png"),
                (CACHE_CONTROL, FALLBACK_OG_CACHE_CONTROL),
            ],
            rendered.png,
        )
            .into_response());
    }
    Ok((
        [
            (CONTENT_TYPE, "image/png".to_string()),
            (CACHE_CONTROL, OG_CACHE_CONTROL.to_string()),
            (ETAG, rendered.etag),
        ],
        rendered.png,
    )
        .into_response())
}
