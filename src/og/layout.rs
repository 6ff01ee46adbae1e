//! The preview card template as a flat list of drawing instructions.
//!
//! Everything here is a pure function of the request; pixels are produced
//! later by [`rasterize`](super::rasterize).
use image::Rgba;

use super::{RenderRequest, OG_HEIGHT, OG_WIDTH};
use crate::score::format_score;

pub const BACKGROUND: Rgba<u8> = Rgba([0x05, 0x05, 0x05, 0xff]);
pub const GRADIENT_TOP: Rgba<u8> = Rgba([0x1a, 0x1a, 0x2e, 0xff]);
pub const GRADIENT_BOTTOM: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 0xff]);
pub const HANDLE_COLOR: Rgba<u8> = Rgba([0xe5, 0xe7, 0xeb, 0xff]);
pub const SCORE_COLOR: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
pub const LABEL_COLOR: Rgba<u8> = Rgba([0x9c, 0xa3, 0xaf, 0xff]);
pub const RING_FILL: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 153]);
pub const AVATAR_BORDER: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 40]);

pub const LABEL: &str = "NEYNAR SCORE";

const HANDLE_SIZE: f32 = 48.0;
const HANDLE_GAP: f32 = 20.0;
const RING_DIAMETER: f32 = 320.0;
const RING_BORDER: f32 = 12.0;
const RING_GLOW: f32 = 80.0;
const RING_GAP: f32 = 30.0;
const SCORE_SIZE: f32 = 100.0;
const LABEL_SIZE: f32 = 24.0;
const LABEL_SPACING: f32 = 4.0;
const AVATAR_DIAMETER: f32 = 140.0;
const AVATAR_GAP: f32 = 24.0;
const AVATAR_BORDER_WIDTH: f32 = 4.0;
const MAX_HANDLE_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill(Rgba<u8>),
    VerticalGradient {
        top: Rgba<u8>,
        bottom: Rgba<u8>,
    },
    /// Soft halo fading out from `radius` to `radius + spread`
    Glow {
        cx: f32,
        cy: f32,
        radius: f32,
        spread: f32,
        color: Rgba<u8>,
    },
    Disc {
        cx: f32,
        cy: f32,
        radius: f32,
        color: Rgba<u8>,
    },
    /// Circle outline drawn inside `radius`
    Ring {
        cx: f32,
        cy: f32,
        radius: f32,
        width: f32,
        color: Rgba<u8>,
    },
    /// Decoded avatar, cropped to a circle
    Avatar {
        cx: f32,
        cy: f32,
        radius: f32,
    },
    /// Single line of text horizontally centered on `cx`
    Text {
        text: String,
        cx: f32,
        top: f32,
        size: f32,
        spacing: f32,
        color: Rgba<u8>,
    },
}

/// Geometry of the score ring, kept around for callers that need to
/// locate it in the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingGeometry {
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
    pub border: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub ring: RingGeometry,
    pub ops: Vec<DrawOp>,
}

pub fn layout(request: &RenderRequest, has_avatar: bool) -> Layout {
    let tier = request.tier();
    let cx = OG_WIDTH as f32 / 2.0;

    let avatar_block = if has_avatar {
        AVATAR_DIAMETER + AVATAR_GAP
    } else {
        0.0
    };
    let column = avatar_block
        + HANDLE_SIZE
        + HANDLE_GAP
        + RING_DIAMETER
        + RING_GAP
        + LABEL_SIZE;
    let mut y = ((OG_HEIGHT as f32 - column) / 2.0).floor();

    let mut ops = vec![
        DrawOp::Fill(BACKGROUND),
        DrawOp::VerticalGradient {
            top: GRADIENT_TOP,
            bottom: GRADIENT_BOTTOM,
        },
    ];

    if has_avatar {
        let radius = AVATAR_DIAMETER / 2.0;
        let cy = y + radius;
        ops.push(DrawOp::Avatar { cx, cy, radius });
        ops.push(DrawOp::Ring {
            cx,
            cy,
            radius,
            width: AVATAR_BORDER_WIDTH,
            color: AVATAR_BORDER,
        });
        y += avatar_block;
    }

    ops.push(DrawOp::Text {
        text: format!("@{}", display_handle(&request.handle)),
        cx,
        top: y,
        size: HANDLE_SIZE,
        spacing: 0.0,
        color: HANDLE_COLOR,
    });
    y += HANDLE_SIZE + HANDLE_GAP;

    let ring = RingGeometry {
        cx,
        cy: y + RING_DIAMETER / 2.0,
        radius: RING_DIAMETER / 2.0,
        border: RING_BORDER,
    };
    ops.extend([
        DrawOp::Glow {
            cx,
            cy: ring.cy,
            radius: ring.radius,
            spread: RING_GLOW,
            color: tier.glow(),
        },
        DrawOp::Disc {
            cx,
            cy: ring.cy,
            radius: ring.radius,
            color: RING_FILL,
        },
        DrawOp::Ring {
            cx,
            cy: ring.cy,
            radius: ring.radius,
            width: ring.border,
            color: tier.rgba(),
        },
        DrawOp::Text {
            text: format_score(request.score),
            cx,
            top: ring.cy - SCORE_SIZE / 2.0,
            size: SCORE_SIZE,
            spacing: 0.0,
            color: SCORE_COLOR,
        },
    ]);
    y += RING_DIAMETER + RING_GAP;

    ops.push(DrawOp::Text {
        text: LABEL.to_string(),
        cx,
        top: y,
        size: LABEL_SIZE,
        spacing: LABEL_SPACING,
        color: LABEL_COLOR,
    });

    Layout {
        width: OG_WIDTH,
        height: OG_HEIGHT,
        ring,
        ops,
    }
}

/// Long handles are cut so the line never leaves the card.
fn display_handle(handle: &str) -> String {
    if handle.chars().count() <= MAX_HANDLE_CHARS {
        handle.to_string()
    } else {
        let cut: String = handle.chars().take(MAX_HANDLE_CHARS - 3).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreTier;

    fn texts(layout: &Layout) -> Vec<&str> {
        layout
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn column_is_vertically_centered() {
        let plain = layout(&RenderRequest::new(0.5, "bo", None), false);
        assert_eq!(plain.ring.cy, 407.0);
        assert_eq!((plain.width, plain.height), (1200, 800));

        let with_avatar = layout(&RenderRequest::new(0.5, "bo", None), true);
        assert_eq!(with_avatar.ring.cy, 489.0);
        assert!(with_avatar
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::Avatar { cy, .. } if *cy == 167.0)));
    }

    #[test]
    fn ring_takes_tier_colour() {
        let layout = layout(&RenderRequest::new(0.95, "alice", None), false);
        let ring = layout.ops.iter().find_map(|op| match op {
            DrawOp::Ring { color, width, .. } if *width == RING_BORDER => {
                Some(*color)
            }
            _ => None,
        });
        assert_eq!(ring, Some(ScoreTier::High.rgba()));
        assert!(!layout
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::Avatar { .. })));
    }

    #[test]
    fn texts_in_reading_order() {
        let layout = layout(&RenderRequest::new(0.7, "carol", None), false);
        assert_eq!(texts(&layout), vec!["@carol", "0.70", "NEYNAR SCORE"]);
    }

    #[test]
    fn long_handles_are_truncated() {
        let handle = "x".repeat(64);
        let layout = layout(&RenderRequest::new(0.1, handle, None), false);
        let line = texts(&layout)[0];
        assert_eq!(line.chars().count(), 1 + MAX_HANDLE_CHARS);
        assert!(line.ends_with("..."));
    }
}
