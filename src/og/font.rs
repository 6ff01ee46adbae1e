use std::fmt;
use std::sync::Arc;

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use tokio::sync::OnceCell;

use crate::fetch::fetch_bytes;
use crate::{MiniAppError, Result};

/// Upper bound on a downloaded font file.
pub const FONT_MAX_BYTES: usize = 8 * 1024 * 1024;

/// Cells per em for the built-in face. The 8x8 glyphs sit in the
/// middle of a 12 cell line.
const BITMAP_CELLS_PER_EM: f32 = 12.0;
const BITMAP_GLYPH_CELLS: f32 = 8.0;

/// Face used to draw text on preview cards.
pub enum Typeface {
    /// Built-in 8x8 bitmap glyphs, always available
    Bitmap,
    Outline(FontVec),
}

impl fmt::Debug for Typeface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Typeface::Bitmap => f.write_str("Typeface::Bitmap"),
            Typeface::Outline(font) => {
                write!(f, "Typeface::Outline({} glyphs)", font.glyph_count())
            }
        }
    }
}

impl Typeface {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        FontVec::try_from_vec(bytes)
            .map(Typeface::Outline)
            .map_err(|e| MiniAppError::Render(format!("invalid font: {e}")))
    }

    pub fn is_bitmap(&self) -> bool {
        matches!(self, Typeface::Bitmap)
    }

    /// Advance width of a line of text.
    pub fn measure(&self, text: &str, size: f32, spacing: f32) -> f32 {
        let count = text.chars().count();
        if count == 0 {
            return 0.0;
        }
        let gaps = spacing * (count - 1) as f32;
        match self {
            Typeface::Bitmap => {
                let cell = size / BITMAP_CELLS_PER_EM;
                count as f32 * BITMAP_GLYPH_CELLS * cell + gaps
            }
            Typeface::Outline(font) => {
                let scaled = font.as_scaled(PxScale::from(size));
                let mut width = 0.0;
                let mut previous = None;
                for c in text.chars() {
                    let id = scaled.glyph_id(c);
                    if let Some(prev) = previous {
                        width += scaled.kern(prev, id);
                    }
                    width += scaled.h_advance(id);
                    previous = Some(id);
                }
                width + gaps
            }
        }
    }

    /// Walks the coverage of a line of text whose box starts at
    /// (`left`, `top`) and is `size` pixels tall. `plot` receives pixel
    /// coordinates and a coverage in `0..=1`.
    pub fn draw<F>(
        &self,
        text: &str,
        left: f32,
        top: f32,
        size: f32,
        spacing: f32,
        mut plot: F,
    ) where
        F: FnMut(i64, i64, f32),
    {
        match self {
            Typeface::Bitmap => {
                let cell = size / BITMAP_CELLS_PER_EM;
                let glyph_size = BITMAP_GLYPH_CELLS * cell;
                let glyph_top = top + (size - glyph_size) / 2.0;
                let mut x = left;
                for c in text.chars() {
                    let rows = bitmap_glyph(c);
                    draw_bitmap(&rows, x, glyph_top, cell, &mut plot);
                    x += glyph_size + spacing;
                }
            }
            Typeface::Outline(font) => {
                let scale = PxScale::from(size);
                let scaled = font.as_scaled(scale);
                let height = scaled.ascent() - scaled.descent();
                let baseline = top + (size - height) / 2.0 + scaled.ascent();
                let mut x = left;
                let mut previous = None;
                for c in text.chars() {
                    let id = scaled.glyph_id(c);
                    if let Some(prev) = previous {
                        x += scaled.kern(prev, id);
                    }
                    let glyph =
                        id.with_scale_and_position(scale, point(x, baseline));
                    if let Some(outlined) = font.outline_glyph(glyph) {
                        let bounds = outlined.px_bounds();
                        let ox = bounds.min.x as i64;
                        let oy = bounds.min.y as i64;
                        outlined.draw(|gx, gy, coverage| {
                            plot(ox + gx as i64, oy + gy as i64, coverage)
                        });
                    }
                    x += scaled.h_advance(id) + spacing;
                    previous = Some(id);
                }
            }
        }
    }
}

fn bitmap_glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn draw_bitmap<F>(rows: &[u8; 8], left: f32, top: f32, cell: f32, plot: &mut F)
where
    F: FnMut(i64, i64, f32),
{
    let x0 = left.floor() as i64;
    let y0 = top.floor() as i64;
    let x1 = (left + 8.0 * cell).ceil() as i64;
    let y1 = (top + 8.0 * cell).ceil() as i64;
    for py in y0..y1 {
        let row = ((py as f32 + 0.5 - top) / cell).floor();
        if !(0.0..8.0).contains(&row) {
            continue;
        }
        let bits = rows[row as usize];
        for px in x0..x1 {
            let column = ((px as f32 + 0.5 - left) / cell).floor();
            if !(0.0..8.0).contains(&column) {
                continue;
            }
            if bits & (1 << column as u8) != 0 {
                plot(px, py, 1.0);
            }
        }
    }
}

/// Resolves the face used for rendering. A configured remote font is
/// downloaded once; until that succeeds every render falls back to the
/// built-in face.
pub struct FontSource {
    client: reqwest::Client,
    url: Option<String>,
    bitmap: Arc<Typeface>,
    outline: OnceCell<Arc<Typeface>>,
}

impl FontSource {
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
            bitmap: Arc::new(Typeface::Bitmap),
            outline: OnceCell::new(),
        }
    }

    pub async fn typeface(&self) -> Arc<Typeface> {
        let Some(url) = &self.url else {
            return self.bitmap.clone();
        };
        let loaded = self
            .outline
            .get_or_try_init(|| async {
                log::info!("Loading font from {url}");
                let bytes =
                    fetch_bytes(&self.client, url, FONT_MAX_BYTES).await?;
                let face = Typeface::from_bytes(bytes)?;
                Ok::<_, MiniAppError>(Arc::new(face))
            })
            .await;
        match loaded {
            Ok(face) => face.clone(),
            Err(e) => {
                log::warn!("Font {url} unavailable, using built-in face: {e}");
                self.bitmap.clone()
            }
        }
    }
}
