//! Session state of the mini app as seen by one user.
//!
//! The app starts [`Phase::Uninitialized`], becomes ready once the host
//! context is known (or given up on), and moves to
//! [`Phase::ReadyWithScore`] after one successful check. A failed check
//! lands in [`Phase::Error`], which accepts another check.
//!
//! All methods take `&self`: the session lives behind a mutex that is
//! never held across an `.await`, so concurrent callers observe the
//! loading flag and back off instead of issuing a second request.
mod actions;
pub mod view;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use url::Url;

use crate::host::{initialize, Host, UserContext, CONTEXT_TIMEOUT};
use crate::score::{ScoreResult, ScoreSource};
use crate::MiniAppError;

pub use actions::{
    share_text, Attempt, DonationMethod, DonationOutcome, DONATION_CHAIN,
    DONATION_CHAIN_ID, DONATION_RECIPIENT, DONATION_RESET, DONATION_TOKEN,
    DONATION_WEI,
};
pub use view::View;

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Uninitialized,
    ReadyNoScore,
    Loading,
    ReadyWithScore(ScoreResult),
    /// A check failed; carries the message shown to the user.
    Error(String),
}

/// Local status of a side-effecting action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionStatus {
    #[default]
    Idle,
    Pending,
    Success,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Scored(ScoreResult),
    Failed(String),
    /// Nothing was fetched: a check is in flight, the score is already
    /// known, or there is no user to check.
    Ignored,
}

/// Point-in-time copy of the session, used for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: Phase,
    pub user: Option<UserContext>,
    pub added: bool,
    pub donation: ActionStatus,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Public base URL of the deployment, used in share links.
    pub public_url: Url,
    pub context_timeout: Duration,
    pub donation_reset: Duration,
}

impl AppSettings {
    pub fn new(public_url: Url) -> Self {
        Self {
            public_url,
            context_timeout: CONTEXT_TIMEOUT,
            donation_reset: DONATION_RESET,
        }
    }
}

struct Session {
    phase: Phase,
    user: Option<UserContext>,
    added: bool,
    donation: ActionStatus,
    /// Bumped on every donation so a stale reset timer leaves a newer
    /// donation alone.
    donation_epoch: u64,
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MiniApp {
    host: Arc<dyn Host>,
    scores: Arc<dyn ScoreSource>,
    settings: AppSettings,
    session: Arc<Mutex<Session>>,
}

impl MiniApp {
    pub fn new(
        host: Arc<dyn Host>,
        scores: Arc<dyn ScoreSource>,
        settings: AppSettings,
    ) -> Self {
        Self {
            host,
            scores,
            settings,
            session: Arc::new(Mutex::new(Session {
                phase: Phase::Uninitialized,
                user: None,
                added: false,
                donation: ActionStatus::Idle,
                donation_epoch: 0,
            })),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    /// Runs the initialization phase once. Later calls are no-ops.
    pub async fn start(&self) {
        if self.session().phase != Phase::Uninitialized {
            return;
        }

        let init =
            initialize(self.host.as_ref(), self.settings.context_timeout).await;

        let mut session = self.session();
        if session.phase != Phase::Uninitialized {
            return;
        }
        match &init.user {
            Some(user) => log::info!("Session started for fid {}", user.fid),
            None => log::info!("Session started without a user"),
        }
        session.user = init.user;
        session.added = init.added;
        session.phase = Phase::ReadyNoScore;
    }

    pub fn snapshot(&self) -> Snapshot {
        let session = self.session();
        Snapshot {
            phase: session.phase.clone(),
            user: session.user.clone(),
            added: session.added,
            donation: session.donation,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session().phase.clone()
    }

    pub fn view(&self) -> View {
        view::project(&self.snapshot())
    }

    /// Fetches the score of the current user.
    ///
    /// The phase flips to `Loading` under the lock before the request goes
    /// out, so a second caller sees it and gets [`CheckOutcome::Ignored`].
    pub async fn check_score(&self) -> CheckOutcome {
        let fid = {
            let mut session = self.session();
            match session.phase {
                Phase::ReadyNoScore | Phase::Error(_) => {}
                _ => return CheckOutcome::Ignored,
            }
            let Some(fid) = session.user.as_ref().map(|u| u.fid) else {
                return CheckOutcome::Ignored;
            };
            session.phase = Phase::Loading;
            fid
        };

        let result = self.scores.fetch(fid).await;

        let mut session = self.session();
        match result {
            Ok(score) => {
                log::info!("fid {fid} scored {}", score.formatted());
                if let Some(user) = session.user.as_mut() {
                    user.refine(&score);
                }
                session.phase = Phase::ReadyWithScore(score.clone());
                CheckOutcome::Scored(score)
            }
            Err(e) => {
                log::error!("Failed to fetch score of fid {fid}: {e}");
                let message = user_message(&e).to_string();
                session.phase = Phase::Error(message.clone());
                CheckOutcome::Failed(message)
            }
        }
    }
}

/// Short message shown in place of the gauge after a failed check.
fn user_message(error: &MiniAppError) -> &'static str {
    match error {
        MiniAppError::NotFound => "User not found",
        MiniAppError::MissingParameter(_)
        | MiniAppError::MalformedParameter(..) => {
            "Could not identify your account"
        }
        _ => "Failed to fetch score",
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::sync::Notify;

    use super::testing::*;
    use super::*;

    async fn started(
        host: FakeHost,
        scores: ScriptedScores,
    ) -> (MiniApp, Arc<ScriptedScores>) {
        let scores = Arc::new(scores);
        let app = MiniApp::new(Arc::new(host), scores.clone(), settings());
        app.start().await;
        (app, scores)
    }

    #[tokio::test]
    async fn starts_ready_without_score() {
        let app = MiniApp::new(
            Arc::new(FakeHost::with_user(Some(alice()))),
            Arc::new(ScriptedScores::default()),
            settings(),
        );
        assert_eq!(app.phase(), Phase::Uninitialized);
        app.start().await;
        let snapshot = app.snapshot();
        assert_eq!(snapshot.phase, Phase::ReadyNoScore);
        assert_eq!(snapshot.user, Some(alice()));
        assert!(!snapshot.added);
    }

    #[tokio::test]
    async fn successful_check_reaches_terminal_phase() {
        let score = ScoreResult::new(0.95, Some("alice_c".into()), None);
        let (app, scores) = started(
            FakeHost::with_user(Some(alice())),
            ScriptedScores::new(vec![Ok(score.clone())]),
        )
        .await;

        let outcome = app.check_score().await;
        assert_eq!(outcome, CheckOutcome::Scored(score.clone()));
        assert_eq!(app.phase(), Phase::ReadyWithScore(score));
        assert_eq!(
            app.snapshot().user.unwrap().username.as_deref(),
            Some("alice_c")
        );

        // terminal: no further fetches
        assert_eq!(app.check_score().await, CheckOutcome::Ignored);
        assert_eq!(scores.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_check_shows_message_and_allows_retry() {
        let (app, scores) = started(
            FakeHost::with_user(Some(alice())),
            ScriptedScores::new(vec![
                Err(MiniAppError::Upstream("Bad Gateway".into())),
                Ok(ScoreResult::new(0.4, None, None)),
            ]),
        )
        .await;

        assert_eq!(
            app.check_score().await,
            CheckOutcome::Failed("Failed to fetch score".into())
        );
        assert_eq!(app.phase(), Phase::Error("Failed to fetch score".into()));

        assert!(matches!(app.check_score().await, CheckOutcome::Scored(_)));
        assert_eq!(scores.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_is_reported_to_the_user() {
        let (app, _) = started(
            FakeHost::with_user(Some(alice())),
            ScriptedScores::new(vec![Err(MiniAppError::NotFound)]),
        )
        .await;
        assert_eq!(
            app.check_score().await,
            CheckOutcome::Failed("User not found".into())
        );
    }

    #[tokio::test]
    async fn anonymous_session_never_fetches() {
        let (app, scores) =
            started(FakeHost::with_user(None), ScriptedScores::default()).await;
        assert_eq!(app.phase(), Phase::ReadyNoScore);
        assert_eq!(app.check_score().await, CheckOutcome::Ignored);
        assert_eq!(scores.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn uninitialized_session_never_fetches() {
        let scores = Arc::new(ScriptedScores::default());
        let app = MiniApp::new(
            Arc::new(FakeHost::with_user(Some(alice()))),
            scores.clone(),
            settings(),
        );
        assert_eq!(app.check_score().await, CheckOutcome::Ignored);
        assert_eq!(scores.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_checks_while_loading_are_ignored() {
        let gate = Arc::new(Notify::new());
        let mut scores =
            ScriptedScores::new(vec![Ok(ScoreResult::new(0.8, None, None))]);
        scores.gate = Some(gate.clone());
        let host = FakeHost::with_user(Some(alice()));
        let (app, scores) = started(host, scores).await;
        let app = Arc::new(app);

        let first = tokio::spawn({
            let app = app.clone();
            async move { app.check_score().await }
        });

        while scores.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(app.phase(), Phase::Loading);

        for _ in 0..3 {
            assert_eq!(app.check_score().await, CheckOutcome::Ignored);
        }
        assert_eq!(scores.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert!(matches!(first.await.unwrap(), CheckOutcome::Scored(_)));
        assert_eq!(scores.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let mut host = FakeHost::with_user(Some(alice()));
        host.context.added = true;
        let (app, _) = started(host, ScriptedScores::default()).await;
        app.start().await;
        assert!(app.snapshot().added);
        assert_eq!(app.phase(), Phase::ReadyNoScore);
    }
}
