//! Preview card rendering.
//!
//! A [`RenderRequest`] is turned into a [`Layout`] (pure), rasterized on a
//! blocking thread and encoded as PNG. The output is a pure function of
//! the request, so encoded images are cached by [`RenderCache`] under a
//! CRC-32 of the canonical request, which doubles as the `ETag`.
mod avatar;
mod cache;
mod font;
mod layout;
mod raster;

use std::sync::{Mutex, MutexGuard};

use image::RgbaImage;

use crate::score::{clamp_score, format_score, parse_score, ScoreTier};
use crate::{MiniAppError, Result};

pub use avatar::{fetch_avatar, AVATAR_MAX_BYTES};
pub use cache::RenderCache;
pub use font::{FontSource, Typeface, FONT_MAX_BYTES};
pub use layout::{layout, DrawOp, Layout, RingGeometry};
pub use raster::{encode_png, rasterize};

pub const OG_WIDTH: u32 = 1200;
pub const OG_HEIGHT: u32 = 800;
pub const DEFAULT_HANDLE: &str = "User";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub score: f64,
    pub handle: String,
    pub avatar_url: Option<String>,
}

impl RenderRequest {
    pub fn new(
        score: f64,
        handle: impl Into<String>,
        avatar_url: Option<String>,
    ) -> Self {
        let handle = handle.into();
        let handle = handle.trim().trim_start_matches('@');
        Self {
            score: clamp_score(score),
            handle: if handle.is_empty() {
                DEFAULT_HANDLE.to_string()
            } else {
                handle.to_string()
            },
            avatar_url: avatar_url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Builds a request from raw query values, applying defaults for
    /// anything absent or unreadable.
    pub fn from_query(
        score: Option<&str>,
        user: Option<&str>,
        pfp: Option<&str>,
    ) -> Self {
        Self::new(
            parse_score(score),
            user.unwrap_or(DEFAULT_HANDLE),
            pfp.map(str::to_string),
        )
    }

    pub fn tier(&self) -> ScoreTier {
        ScoreTier::classify(self.score)
    }

    /// Normalized form of the request; equal strings render equal images.
    pub fn canonical(&self) -> String {
        let score = format_score(self.score);
        let mut out = format!("score={score}&user={}", self.handle);
        if let Some(pfp) = &self.avatar_url {
            out.push_str("&pfp=");
            out.push_str(pfp);
        }
        out
    }

    pub fn key(&self) -> u32 {
        crc32fast::hash(self.canonical().as_bytes())
    }

    pub fn etag(&self) -> String {
        format!("\"{:08x}\"", self.key())
    }
}

/// Lays out, rasterizes and encodes one card.
pub fn render_png(
    request: &RenderRequest,
    avatar: Option<&RgbaImage>,
    typeface: &Typeface,
) -> Result<Vec<u8>> {
    let layout = layout(request, avatar.is_some());
    let image = rasterize(&layout, avatar, typeface);
    encode_png(&image).map_err(|e| MiniAppError::Render(e.to_string()))
}

/// An encoded card and its validator.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub png: Vec<u8>,
    pub etag: String,
    /// False when the avatar was requested but could not be drawn; such
    /// a card is a stand-in and must not be kept as the final image.
    pub complete: bool,
}

/// Everything needed to serve cards: the outbound client for avatars,
/// the font and the cache of finished images.
pub struct Renderer {
    client: reqwest::Client,
    fonts: FontSource,
    cache: Mutex<RenderCache>,
    allow_private_avatars: bool,
}

impl Renderer {
    pub fn new(
        client: reqwest::Client,
        font_url: Option<String>,
        cache_bytes: usize,
    ) -> Self {
        Self {
            fonts: FontSource::new(client.clone(), font_url),
            client,
            cache: Mutex::new(RenderCache::new("og", cache_bytes)),
            allow_private_avatars: false,
        }
    }

    /// Lets avatars be fetched from loopback and private networks.
    pub fn allow_private_avatars(mut self, allow: bool) -> Self {
        self.allow_private_avatars = allow;
        self
    }

    pub fn cached_entries(&self) -> usize {
        self.cache().len()
    }

    pub async fn render(&self, request: &RenderRequest) -> Result<Rendered> {
        let key = request.key();
        let canonical = request.canonical();
        let etag = request.etag();
        if let Some(png) = self.cache().get(key, &canonical) {
            return Ok(Rendered {
                png,
                etag,
                complete: true,
            });
        }

        let avatar = match &request.avatar_url {
            Some(url) => {
                fetch_avatar(&self.client, url, self.allow_private_avatars)
                    .await
            }
            None => None,
        };
        let complete = request.avatar_url.is_none() || avatar.is_some();
        let typeface = self.fonts.typeface().await;

        let job = request.clone();
        let png = tokio::task::spawn_blocking(move || {
            render_png(&job, avatar.as_ref(), &typeface)
        })
        .await
        .map_err(|e| MiniAppError::Render(e.to_string()))??;

        if complete {
            self.cache().set(key, &canonical, png.clone());
        }
        log::info!("Rendered card {canonical} ({} bytes)", png.len());
        Ok(Rendered {
            png,
            etag,
            complete,
        })
    }

    fn cache(&self) -> MutexGuard<'_, RenderCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
