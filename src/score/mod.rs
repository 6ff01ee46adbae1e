mod fetcher;
mod tier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use fetcher::{NeynarClient, ProxyClient};
pub use tier::{ScoreTier, HIGH_THRESHOLD, MID_THRESHOLD};

/// Reputation score of one account, as shown to the user.
///
/// The value is always inside `[0, 1]`; see [`clamp_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    #[serde(rename = "score")]
    pub value: f64,
    #[serde(rename = "username", skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(rename = "pfpUrl", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ScoreResult {
    pub fn new(
        value: f64,
        handle: Option<String>,
        avatar_url: Option<String>,
    ) -> Self {
        Self {
            value: clamp_score(value),
            handle: handle.filter(|h| !h.is_empty()),
            avatar_url: avatar_url.filter(|u| !u.is_empty()),
        }
    }

    pub fn tier(&self) -> ScoreTier {
        ScoreTier::classify(self.value)
    }

    pub fn formatted(&self) -> String {
        format_score(self.value)
    }
}

/// Brings any upstream value into the displayable range and onto the
/// two-decimal grid it is printed with, so the tier of a score is the
/// tier of its text. Non-finite values count as a missing score.
pub fn clamp_score(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    format!("{:.2}", value.clamp(0.0, 1.0))
        .parse()
        .unwrap_or(0.0)
}

/// Parses a score coming from a query string, applying the same rules as
/// [`clamp_score`]. Absent or unparsable input yields `0`.
pub fn parse_score(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .map(clamp_score)
        .unwrap_or(0.0)
}

/// Two decimal places, used everywhere a score is printed.
pub fn format_score(value: f64) -> String {
    format!("{:.2}", clamp_score(value))
}

/// Anything able to resolve a user identifier into a score.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn fetch(&self, fid: u64) -> Result<ScoreResult>;
}
