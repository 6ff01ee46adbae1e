//! HTML shells. Every page loads the same client bundle; only the head
//! metadata differs, so link previews of a shared score show that score.
use std::sync::Arc;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::Html;
use serde::Deserialize;

use super::AppState;
use crate::embed::PageMeta;
use crate::og::DEFAULT_HANDLE;
use crate::score::parse_score;
use crate::{MiniAppError, Result};

#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate<'a> {
    meta: &'a PageMeta,
    frame_json: String,
}

fn render(meta: &PageMeta) -> Result<Html<String>> {
    let page = PageTemplate {
        meta,
        frame_json: meta.frame_json(),
    };
    page.render()
        .map(Html)
        .map_err(|e| MiniAppError::Render(e.to_string()))
}

pub async fn home(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    render(&PageMeta::home(&state.config.public_url))
}

#[derive(Debug, Deserialize)]
pub struct ShareQuery {
    score: Option<String>,
    username: Option<String>,
    user: Option<String>,
    pfp: Option<String>,
}

pub async fn share(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShareQuery>,
) -> Result<Html<String>> {
    let username = query
        .username
        .or(query.user)
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_HANDLE.to_string());
    let meta = PageMeta::share(
        &state.config.public_url,
        parse_score(query.score.as_deref()),
        &username,
        query.pfp.as_deref(),
    );
    render(&meta)
}

pub async fn share_path(
    State(state): State<Arc<AppState>>,
    Path((score, username)): Path<(String, String)>,
) -> Result<Html<String>> {
    let meta = PageMeta::share(
        &state.config.public_url,
        parse_score(Some(&score)),
        &username,
        None,
    );
    render(&meta)
}
