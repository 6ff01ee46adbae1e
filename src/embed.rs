//! Embed metadata published on every page, and the links that point at
//! the share and preview routes.
//!
//! Link-preview consumers read the `fc:frame` / `fc:miniapp` meta tags
//! (a JSON object) plus the usual OpenGraph tags. [`read_embed`] does the
//! same from the consumer side.
use std::fmt;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::og::{OG_HEIGHT, OG_WIDTH};
use crate::score::format_score;

pub const EMBED_VERSION: &str = "1";
pub const FRAME_META: &str = "fc:frame";
pub const MINIAPP_META: &str = "fc:miniapp";
pub const SPLASH_BACKGROUND: &str = "#000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub version: String,
    pub image_url: String,
    pub button: FrameButton,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameButton {
    pub title: String,
    pub action: FrameAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub name: String,
    pub url: String,
    pub splash_image_url: String,
    pub splash_background_color: String,
}

impl Frame {
    /// Embed whose button launches the app at `app_url`.
    pub fn launch(app_url: &Url, image_url: String) -> Self {
        let app = app_url.as_str().trim_end_matches('/');
        Self {
            version: EMBED_VERSION.to_string(),
            image_url,
            button: FrameButton {
                title: "Check My Score".to_string(),
                action: FrameAction {
                    action_type: "launch_frame".to_string(),
                    name: "Check Neynar Score".to_string(),
                    url: app.to_string(),
                    splash_image_url: format!("{app}/splash.png"),
                    splash_background_color: SPLASH_BACKGROUND.to_string(),
                },
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Preview image attached to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub alt: String,
}

/// Everything a page publishes in its `<head>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub image: PreviewImage,
    pub frame: Frame,
}

impl PageMeta {
    pub fn home(app_url: &Url) -> Self {
        let image_url = asset_url(app_url, "hero.png");
        Self {
            title: "Check Neynar Score".to_string(),
            description: "Check your Farcaster Reputation Score".to_string(),
            image: PreviewImage {
                url: image_url.clone(),
                width: OG_WIDTH,
                height: OG_HEIGHT,
                alt: "Neynar Score".to_string(),
            },
            frame: Frame::launch(app_url, image_url),
        }
    }

    /// Metadata of a shared score. The score is normalized first so the
    /// title and the preview image always agree.
    pub fn share(
        app_url: &Url,
        score: f64,
        username: &str,
        pfp: Option<&str>,
    ) -> Self {
        let normalized = format_score(score);
        let image_url =
            og_image_url(app_url, score, username, pfp).to_string();
        Self {
            title: format!("Neynar Score: {normalized}"),
            description: format!(
                "Check @{username}'s Farcaster Reputation Score"
            ),
            image: PreviewImage {
                url: image_url.clone(),
                width: OG_WIDTH,
                height: OG_HEIGHT,
                alt: format!("{username}'s Neynar Score"),
            },
            frame: Frame::launch(app_url, image_url),
        }
    }

    pub fn frame_json(&self) -> String {
        self.frame.to_json()
    }
}

fn asset_url(app_url: &Url, asset: &str) -> String {
    format!("{}/{asset}", app_url.as_str().trim_end_matches('/'))
}

fn route_url(app_url: &Url, route: &str) -> Url {
    let mut url = app_url.clone();
    url.set_path(route);
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// `/share?score=..&username=..[&pfp=..]`, the link embedded in casts.
pub fn share_link(
    app_url: &Url,
    score: f64,
    username: &str,
    pfp: Option<&str>,
) -> Url {
    let mut url = route_url(app_url, "/share");
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("score", &format_score(score))
            .append_pair("username", username);
        if let Some(pfp) = pfp.filter(|p| !p.is_empty()) {
            query.append_pair("pfp", pfp);
        }
    }
    url
}

/// `/api/og?score=..&user=..[&pfp=..]`, the rendered preview image.
pub fn og_image_url(
    app_url: &Url,
    score: f64,
    username: &str,
    pfp: Option<&str>,
) -> Url {
    let mut url = route_url(app_url, "/api/og");
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("score", &format_score(score))
            .append_pair("user", username);
        if let Some(pfp) = pfp.filter(|p| !p.is_empty()) {
            query.append_pair("pfp", pfp);
        }
    }
    url
}

/// Embed and OpenGraph data as read back from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub frame: Option<Frame>,
    pub miniapp: Option<Frame>,
}

impl fmt::Display for Embed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let none = "-";
        let show = |value: &Option<String>| {
            value.as_deref().unwrap_or(none).to_string()
        };
        writeln!(f, "title:       {}", show(&self.title))?;
        writeln!(f, "description: {}", show(&self.description))?;
        writeln!(f, "image:       {}", show(&self.image))?;
        match self.frame.as_ref().or(self.miniapp.as_ref()) {
            Some(frame) => write!(
                f,
                "launch:      {} -> {}",
                frame.button.title, frame.button.action.url
            ),
            None => write!(f, "launch:      {none}"),
        }
    }
}

lazy_static! {
    static ref TITLE: Option<Selector> = Selector::parse("title").ok();
    static ref OG_TITLE: Option<Selector> =
        Selector::parse("meta[property=\"og:title\"]").ok();
    static ref OG_DESCRIPTION: Option<Selector> =
        Selector::parse("meta[property=\"og:description\"]").ok();
    static ref OG_IMAGE: Option<Selector> =
        Selector::parse("meta[property=\"og:image\"]").ok();
    static ref FRAME: Option<Selector> =
        Selector::parse("meta[name=\"fc:frame\"]").ok();
    static ref MINIAPP: Option<Selector> =
        Selector::parse("meta[name=\"fc:miniapp\"]").ok();
}

pub fn read_embed(html: &str) -> Embed {
    let html = Html::parse_document(html);
    Embed {
        title: select_content(&html, OG_TITLE.as_ref())
            .or_else(|| select_title(&html)),
        description: select_content(&html, OG_DESCRIPTION.as_ref()),
        image: select_content(&html, OG_IMAGE.as_ref()),
        frame: select_frame(&html, FRAME.as_ref(), FRAME_META),
        miniapp: select_frame(&html, MINIAPP.as_ref(), MINIAPP_META),
    }
}

fn select_content(html: &Html, selector: Option<&Selector>) -> Option<String> {
    html.select(selector?)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(|value| value.to_string())
}

fn select_title(html: &Html) -> Option<String> {
    html.select(TITLE.as_ref()?)
        .next()
        .and_then(|element| element.text().next())
        .map(|text| text.to_string())
}

fn select_frame(
    html: &Html,
    selector: Option<&Selector>,
    name: &str,
) -> Option<Frame> {
    let raw = select_content(html, selector)?;
    serde_json::from_str(&raw)
        .map_err(|e| log::warn!("Unreadable {name} embed: {e}"))
        .ok()
}
