use std::sync::Arc;
use std::time::Duration;

use super::{lock, ActionStatus, MiniApp, Phase};
use crate::embed::share_link;
use crate::errors::HostError;
use crate::host::{Cast, TokenTransfer, TransactionRequest};
use crate::score::format_score;
use crate::{MiniAppError, Result};

pub const DONATION_RECIPIENT: &str =
    "0xa6DEe9FdE9E1203ad02228f00bF10235d9Ca3752";
/// 0.0005 ETH
pub const DONATION_WEI: u128 = 500_000_000_000_000;
/// Base mainnet
pub const DONATION_CHAIN_ID: u64 = 8453;
pub const DONATION_TOKEN: &str = "eip155:8453/native";
pub const DONATION_RESET: Duration = Duration::from_secs(3);

/// Donation methods, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationMethod {
    /// Direct transfer through a wallet injected into the page
    InjectedWallet,
    /// Transfer sheet provided by the host client
    HostTransfer,
    /// Copy the recipient address so the user can send manually
    Clipboard,
}

pub const DONATION_CHAIN: [DonationMethod; 3] = [
    DonationMethod::InjectedWallet,
    DonationMethod::HostTransfer,
    DonationMethod::Clipboard,
];

/// Result of one donation method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Succeeded,
    /// The user said no. Stops the chain.
    Rejected,
    /// Anything else. The next method is tried.
    Failed(String),
}

impl From<std::result::Result<(), HostError>> for Attempt {
    fn from(result: std::result::Result<(), HostError>) -> Self {
        match result {
            Ok(()) => Attempt::Succeeded,
            Err(e) if e.is_rejection() => Attempt::Rejected,
            Err(e) => Attempt::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DonationOutcome {
    Sent(DonationMethod),
    /// The user rejected a prompt; the status went straight back to idle.
    Cancelled,
    /// Every method failed.
    Failed,
    /// A donation is already pending.
    Ignored,
}

pub fn share_text(score: f64) -> String {
    format!(
        "My Neynar Score is {}! 🏆\n\n\
         Check yours in the Neynar Score Mini App.",
        format_score(score)
    )
}

/// Rejections are the user's choice and are not reported as failures.
fn host_failure(action: &str, error: HostError) -> MiniAppError {
    if error.is_rejection() {
        log::info!("{action} cancelled by the user");
        MiniAppError::ActionCancelled
    } else {
        log::error!("Failed to {action}: {error}");
        MiniAppError::Host(error)
    }
}

impl MiniApp {
    /// The post that [`MiniApp::share`] would hand to the host, if a score
    /// is known.
    pub fn compose_share(&self) -> Option<Cast> {
        let session = self.session();
        let Phase::ReadyWithScore(score) = &session.phase else {
            return None;
        };
        let user = session.user.as_ref()?;
        let link = share_link(
            &self.settings.public_url,
            score.value,
            user.handle(),
            user.pfp_url.as_deref(),
        );
        Some(Cast {
            text: share_text(score.value),
            embeds: vec![link.to_string()],
        })
    }

    /// Opens the host composer with the score post. No retry.
    pub async fn share(&self) -> Result<Cast> {
        let cast = self
            .compose_share()
            .ok_or(MiniAppError::MissingParameter("score"))?;
        self.host
            .compose_cast(&cast)
            .await
            .map_err(|e| host_failure("share", e))?;
        Ok(cast)
    }

    /// Asks the host to add this app for the user. Does nothing once
    /// added.
    pub async fn bookmark(&self) -> Result<()> {
        if self.session().added {
            return Ok(());
        }
        self.host
            .add_mini_app()
            .await
            .map_err(|e| host_failure("add mini app", e))?;
        self.session().added = true;
        Ok(())
    }

    pub fn donation_status(&self) -> ActionStatus {
        self.session().donation
    }

    /// Walks [`DONATION_CHAIN`] until a method succeeds or the user
    /// rejects a prompt.
    pub async fn donate(&self) -> DonationOutcome {
        {
            let mut session = self.session();
            if session.donation == ActionStatus::Pending {
                return DonationOutcome::Ignored;
            }
            session.donation = ActionStatus::Pending;
            session.donation_epoch += 1;
        }

        for method in DONATION_CHAIN {
            match self.attempt_donation(method).await {
                Attempt::Succeeded => {
                    log::info!("Donation sent via {method:?}");
                    let epoch = {
                        let mut session = self.session();
                        session.donation = ActionStatus::Success;
                        session.donation_epoch
                    };
                    self.schedule_donation_reset(epoch);
                    return DonationOutcome::Sent(method);
                }
                Attempt::Rejected => {
                    log::info!("Donation rejected by the user via {method:?}");
                    self.session().donation = ActionStatus::Idle;
                    return DonationOutcome::Cancelled;
                }
                Attempt::Failed(reason) => {
                    log::warn!("Donation via {method:?} failed: {reason}");
                }
            }
        }

        log::error!("Donation failed with every method");
        self.session().donation = ActionStatus::Idle;
        DonationOutcome::Failed
    }

    async fn attempt_donation(&self, method: DonationMethod) -> Attempt {
        match method {
            DonationMethod::InjectedWallet => self.donate_with_wallet().await,
            DonationMethod::HostTransfer => {
                let transfer = TokenTransfer {
                    token: DONATION_TOKEN.to_string(),
                    amount: DONATION_WEI.to_string(),
                    recipient_address: DONATION_RECIPIENT.to_string(),
                };
                self.host.send_token(&transfer).await.into()
            }
            DonationMethod::Clipboard => {
                self.host.copy_to_clipboard(DONATION_RECIPIENT).await.into()
            }
        }
    }

    async fn donate_with_wallet(&self) -> Attempt {
        let Some(wallet) = self.host.wallet() else {
            return Attempt::Failed("no injected wallet".into());
        };

        let accounts = match wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => return Attempt::from(Err(e)),
        };
        let Some(from) = accounts.into_iter().next() else {
            return Attempt::Failed("wallet exposed no account".into());
        };

        let request = TransactionRequest {
            from,
            to: DONATION_RECIPIENT.to_string(),
            value: format!("{DONATION_WEI:#x}"),
            chain_id: format!("{DONATION_CHAIN_ID:#x}"),
        };
        match wallet.send_transaction(&request).await {
            Ok(hash) => {
                log::debug!("Donation transaction {hash}");
                Attempt::Succeeded
            }
            Err(e) => Attempt::from(Err(e)),
        }
    }

    fn schedule_donation_reset(&self, epoch: u64) {
        let session = Arc::clone(&self.session);
        let delay = self.settings.donation_reset;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut session = lock(&session);
            if session.donation_epoch == epoch
                && session.donation == ActionStatus::Success
            {
                session.donation = ActionStatus::Idle;
            }
        });
    }
}
