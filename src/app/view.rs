//! Pure projection of a [`Snapshot`] into what the screen shows.
use std::f64::consts::PI;

use super::{ActionStatus, Phase, Snapshot};
use crate::score::{clamp_score, format_score, ScoreTier};

pub const GAUGE_SIZE: u32 = 192;
pub const GAUGE_RADIUS: f64 = 70.0;
pub const GAUGE_STROKE: f64 = 12.0;

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub greeting: String,
    pub avatar_url: Option<String>,
    /// Header bookmark shortcut, hidden once the app is added.
    pub show_bookmark_icon: bool,
    pub body: Body,
    pub error: Option<String>,
    /// Only present once a score is known.
    pub actions: Option<Actions>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Spinner,
    CheckButton { label: &'static str, disabled: bool },
    Gauge(Gauge),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub text: String,
    pub tier: ScoreTier,
    pub svg: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actions {
    pub share_label: &'static str,
    pub donate_label: &'static str,
    pub bookmark_label: &'static str,
    pub bookmark_disabled: bool,
}

pub fn project(snapshot: &Snapshot) -> View {
    let greeting = format!(
        "Hello, {}",
        snapshot
            .user
            .as_ref()
            .map(|u| u.greeting_name())
            .unwrap_or("User")
    );
    let avatar_url = snapshot.user.as_ref().and_then(|u| u.pfp_url.clone());

    let (body, error) = match &snapshot.phase {
        Phase::Uninitialized => (Body::Spinner, None),
        Phase::ReadyNoScore => (check_button(false), None),
        Phase::Loading => (check_button(true), None),
        Phase::Error(message) => (check_button(false), Some(message.clone())),
        Phase::ReadyWithScore(score) => (Body::Gauge(gauge(score.value)), None),
    };

    let scored = matches!(snapshot.phase, Phase::ReadyWithScore(_));
    let actions = scored.then(|| Actions {
        share_label: "Share Score",
        donate_label: match snapshot.donation {
            ActionStatus::Idle => "Donate",
            ActionStatus::Pending => "...",
            ActionStatus::Success => "Sent!",
        },
        bookmark_label: if snapshot.added { "Saved" } else { "Bookmark" },
        bookmark_disabled: snapshot.added,
    });

    View {
        greeting,
        avatar_url,
        show_bookmark_icon: !snapshot.added,
        body,
        error,
        actions,
    }
}

fn check_button(loading: bool) -> Body {
    Body::CheckButton {
        label: if loading { "Loading..." } else { "Check My Score" },
        disabled: loading,
    }
}

pub fn gauge(value: f64) -> Gauge {
    let value = clamp_score(value);
    let tier = ScoreTier::classify(value);
    Gauge {
        text: format_score(value),
        tier,
        svg: gauge_svg(value, tier),
    }
}

/// Progress ring: a faint full track plus an arc whose length is the
/// score. Rotated so the arc starts at twelve o'clock.
pub fn gauge_svg(value: f64, tier: ScoreTier) -> String {
    let center = GAUGE_SIZE as f64 / 2.0;
    let circumference = 2.0 * PI * GAUGE_RADIUS;
    let offset = circumference - clamp_score(value) * circumference;
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" "#,
            r#"width="{size}" height="{size}" "#,
            r#"viewBox="0 0 {size} {size}">"#,
            r#"<g transform="rotate(-90 {c} {c})">"#,
            r#"<circle cx="{c}" cy="{c}" r="{r}" fill="transparent" "#,
            r#"stroke="rgba(255,255,255,0.05)" stroke-width="{w}"/>"#,
            r#"<circle cx="{c}" cy="{c}" r="{r}" fill="transparent" "#,
            r#"stroke="{color}" stroke-width="{w}" stroke-linecap="round" "#,
            r#"stroke-dasharray="{dash:.2}" "#,
            r#"stroke-dashoffset="{offset:.2}"/>"#,
            r#"</g></svg>"#
        ),
        size = GAUGE_SIZE,
        c = center,
        r = GAUGE_RADIUS,
        w = GAUGE_STROKE,
        color = tier.color(),
        dash = circumference,
        offset = offset,
    )
}
