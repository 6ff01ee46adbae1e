use std::fmt;

use image::Rgba;

/// Colour band of a score. Shared by the live gauge, the view model and
/// the rendered preview image so all three always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreTier {
    /// Below 0.7, amber
    Low,
    /// From 0.7 up to (not including) 0.9, purple
    Mid,
    /// 0.9 and above, emerald
    High,
}

pub const MID_THRESHOLD: f64 = 0.7;
pub const HIGH_THRESHOLD: f64 = 0.9;

impl ScoreTier {
    pub fn classify(value: f64) -> Self {
        if value >= HIGH_THRESHOLD {
            ScoreTier::High
        } else if value >= MID_THRESHOLD {
            ScoreTier::Mid
        } else {
            ScoreTier::Low
        }
    }

    /// Hex colour used for the gauge stroke and the ring border.
    pub fn color(&self) -> &'static str {
        match self {
            ScoreTier::Low => "#fbbf24",
            ScoreTier::Mid => "#a855f7",
            ScoreTier::High => "#34d399",
        }
    }

    pub fn rgba(&self) -> Rgba<u8> {
        match self {
            ScoreTier::Low => Rgba([0xfb, 0xbf, 0x24, 0xff]),
            ScoreTier::Mid => Rgba([0xa8, 0x55, 0xf7, 0xff]),
            ScoreTier::High => Rgba([0x34, 0xd3, 0x99, 0xff]),
        }
    }

    /// The ring's outer glow: tier colour at 40% opacity.
    pub fn glow(&self) -> Rgba<u8> {
        let Rgba([r, g, b, _]) = self.rgba();
        Rgba([r, g, b, 102])
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScoreTier::Low => "amber",
            ScoreTier::Mid => "purple",
            ScoreTier::High => "emerald",
        }
    }
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
