//! Capabilities of the client that embeds the mini app.
//!
//! The mini app never talks to the social network directly: posting,
//! bookmarking and token transfers all go through the host. A browser
//! wallet, when one is injected into the page, is reached through
//! [`Wallet`].
//!
//! [`initialize`] is the start-up phase. It signals readiness and waits a
//! bounded time for the host to describe the current user.
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::HostError;
use crate::score::ScoreResult;

/// Upper bound on how long start-up waits for the host context.
pub const CONTEXT_TIMEOUT: Duration = Duration::from_secs(3);

/// The signed-in account as described by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub fid: u64,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub pfp_url: Option<String>,
}

impl UserContext {
    pub fn new(fid: u64) -> Self {
        Self {
            fid,
            display_name: None,
            username: None,
            pfp_url: None,
        }
    }

    /// Adopts the canonical handle and avatar returned with a score.
    pub fn refine(&mut self, score: &ScoreResult) {
        if let Some(handle) = &score.handle {
            self.username = Some(handle.clone());
        }
        if let Some(avatar) = &score.avatar_url {
            self.pfp_url = Some(avatar.clone());
        }
    }

    /// Name used in greetings.
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("User")
    }

    /// Handle used in share links and preview images.
    pub fn handle(&self) -> &str {
        self.username
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or("User")
    }
}

/// What the host reports at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostContext {
    pub user: Option<UserContext>,
    /// The user already added this app to their client.
    pub added: bool,
}

/// A pre-filled post handed to the host's composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cast {
    pub text: String,
    pub embeds: Vec<String>,
}

/// Host-mediated token transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    /// CAIP-19 asset id, e.g. `eip155:8453/native`
    pub token: String,
    /// Amount in the token's smallest unit
    pub amount: String,
    pub recipient_address: String,
}

/// Transaction submitted through an injected wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    /// Hex encoded wei amount, `0x` prefixed
    pub value: String,
    /// Hex encoded chain id, `0x` prefixed
    pub chain_id: String,
}

/// A browser wallet injected into the page.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<String>, HostError>;

    /// Returns the transaction hash.
    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<String, HostError>;
}

#[async_trait]
pub trait Host: Send + Sync {
    /// Tells the host the app finished loading and can be shown.
    async fn ready(&self) -> Result<(), HostError>;

    async fn context(&self) -> Result<HostContext, HostError>;

    async fn add_mini_app(&self) -> Result<(), HostError>;

    async fn compose_cast(&self, cast: &Cast) -> Result<(), HostError>;

    async fn send_token(
        &self,
        transfer: &TokenTransfer,
    ) -> Result<(), HostError>;

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), HostError>;

    /// The injected wallet, if the page has one.
    fn wallet(&self) -> Option<&dyn Wallet> {
        None
    }
}

/// Outcome of the start-up phase. Always produced, even when the host
/// never answers: the session is then anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Initialized {
    pub user: Option<UserContext>,
    pub added: bool,
}

pub async fn initialize(host: &dyn Host, timeout: Duration) -> Initialized {
    if let Err(e) = host.ready().await {
        log::warn!("Host did not accept the ready signal: {e}");
    }

    match tokio::time::timeout(timeout, host.context()).await {
        Ok(Ok(context)) => Initialized {
            user: context.user,
            added: context.added,
        },
        Ok(Err(e)) => {
            log::warn!("Error loading host context: {e}");
            Initialized::default()
        }
        Err(_) => {
            log::warn!(
                "Host context did not resolve within {}ms, \
                 continuing anonymously",
                timeout.as_millis()
            );
            Initialized::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticHost {
        context: Result<HostContext, HostError>,
        delay: Duration,
    }

    #[async_trait]
    impl Host for StaticHost {
        async fn ready(&self) -> Result<(), HostError> {
            Err(HostError::Unavailable("not embedded".into()))
        }

        async fn context(&self) -> Result<HostContext, HostError> {
            tokio::time::sleep(self.delay).await;
            self.context.clone()
        }

        async fn add_mini_app(&self) -> Result<(), HostError> {
            Ok(())
        }

        async fn compose_cast(&self, _: &Cast) -> Result<(), HostError> {
            Ok(())
        }

        async fn send_token(&self, _: &TokenTransfer) -> Result<(), HostError> {
            Ok(())
        }

        async fn copy_to_clipboard(&self, _: &str) -> Result<(), HostError> {
            Ok(())
        }
    }

    fn alice() -> UserContext {
        UserContext {
            fid: 123,
            display_name: Some("Alice".into()),
            username: Some("alice".into()),
            pfp_url: None,
        }
    }

    #[tokio::test]
    async fn resolves_user_and_added_flag() {
        let host = StaticHost {
            context: Ok(HostContext {
                user: Some(alice()),
                added: true,
            }),
            delay: Duration::ZERO,
        };
        let init = initialize(&host, CONTEXT_TIMEOUT).await;
        assert_eq!(init.user, Some(alice()));
        assert!(init.added);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_context_becomes_anonymous() {
        let host = StaticHost {
            context: Ok(HostContext {
                user: Some(alice()),
                added: false,
            }),
            delay: Duration::from_secs(60),
        };
        let init = initialize(&host, CONTEXT_TIMEOUT).await;
        assert_eq!(init, Initialized::default());
    }

    #[tokio::test]
    async fn failing_context_becomes_anonymous() {
        let host = StaticHost {
            context: Err(HostError::Failed("boom".into())),
            delay: Duration::ZERO,
        };
        let init = initialize(&host, CONTEXT_TIMEOUT).await;
        assert_eq!(init.user, None);
    }

    #[test]
    fn refine_prefers_canonical_values() {
        let mut user = UserContext::new(7);
        assert_eq!(user.greeting_name(), "User");
        assert_eq!(user.handle(), "User");

        user.refine(&ScoreResult::new(
            0.5,
            Some("canonical".into()),
            Some("https://img.example/c.png".into()),
        ));
        assert_eq!(user.username.as_deref(), Some("canonical"));
        assert_eq!(user.pfp_url.as_deref(), Some("https://img.example/c.png"));
        assert_eq!(user.handle(), "canonical");

        user.refine(&ScoreResult::new(0.5, None, None));
        assert_eq!(user.username.as_deref(), Some("canonical"));
    }
}
