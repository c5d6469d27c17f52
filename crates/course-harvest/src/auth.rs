//! Sign-in state machine.
//!
//! ```text
//! Start → ProviderChosen → CredentialsSubmitted → AwaitingSecondFactor → Authenticated
//!   └──────────────┴───────────────┴──────────────────────┴──→ Failed
//! ```
//!
//! Each selector step walks an ordered fallback chain from the site
//! profile. The second factor is approved out of band, so the last state
//! polls until the browser leaves the sign-in flow or the ceiling passes.
//! There is one attempt per run; a failure is terminal.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{Credentials, HarvestConfig};
use crate::driver::{BrowserDriver, PageDriver, PageGuard};
use crate::session::AuthenticatedSession;
use crate::strategy::{click_first, fill_first, first_match, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    Start,
    ProviderChosen,
    CredentialsSubmitted,
    AwaitingSecondFactor,
    Authenticated,
    Failed,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthState::Start => "start",
            AuthState::ProviderChosen => "provider-chosen",
            AuthState::CredentialsSubmitted => "credentials-submitted",
            AuthState::AwaitingSecondFactor => "awaiting-second-factor",
            AuthState::Authenticated => "authenticated",
            AuthState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Sign-in did not complete. `state` is the last state reached.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("authentication failed at {state}: {reason}")]
pub struct AuthFailure {
    pub state: AuthState,
    pub reason: String,
}

impl AuthFailure {
    fn at(state: AuthState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: reason.into(),
        }
    }
}

/// Run the sign-in flow on a fresh page of `browser`.
///
/// The sign-in page is closed on every terminal state; the authenticated
/// cookies stay in the browser context the returned session wraps.
pub async fn authenticate(
    browser: Arc<dyn BrowserDriver>,
    credentials: &Credentials,
    config: &HarvestConfig,
) -> Result<AuthenticatedSession, AuthFailure> {
    let page = PageGuard::open(browser.as_ref())
        .await
        .map_err(|e| AuthFailure::at(AuthState::Start, format!("cannot open page: {e}")))?;

    let result = run(&*page, credentials, config).await;
    page.release().await;

    match result {
        Ok(landed_url) => {
            info!(url = %landed_url, "signed in");
            Ok(AuthenticatedSession::new(browser, landed_url, Utc::now()))
        }
        Err(failure) => {
            warn!(state = %failure.state, reason = %failure.reason, "sign-in failed");
            Err(failure)
        }
    }
}

async fn run(
    page: &dyn PageDriver,
    credentials: &Credentials,
    config: &HarvestConfig,
) -> Result<String, AuthFailure> {
    let mut state = AuthState::Start;
    loop {
        debug!(state = %state, "sign-in state");
        state = match state {
            AuthState::Start => {
                choose_provider(page, config).await?;
                AuthState::ProviderChosen
            }
            AuthState::ProviderChosen => {
                submit_credentials(page, credentials, config).await?;
                AuthState::CredentialsSubmitted
            }
            AuthState::CredentialsSubmitted => {
                info!("waiting for second-factor approval");
                AuthState::AwaitingSecondFactor
            }
            AuthState::AwaitingSecondFactor => {
                return await_second_factor(page, config).await;
            }
            AuthState::Authenticated | AuthState::Failed => {
                return Err(AuthFailure::at(state, "state machine re-entered"));
            }
        };
    }
}

async fn choose_provider(page: &dyn PageDriver, config: &HarvestConfig) -> Result<(), AuthFailure> {
    let profile = &config.profile;
    let timings = &config.timings;
    let fail = |reason: String| AuthFailure::at(AuthState::Start, reason);

    page.navigate(&profile.login_url, timings.navigation_timeout)
        .await
        .map_err(|e| fail(e.to_string()))?;
    page.wait_for_timeout(timings.login_page_settle).await;

    let chosen = click_first(
        page,
        "identity provider",
        &profile.login.provider_buttons,
        timings.step_timeout,
    )
    .await
    .map_err(|e| fail(e.to_string()))?;
    debug!(selector = %chosen, "identity provider chosen");

    page.wait_for_timeout(timings.provider_settle).await;
    Ok(())
}

async fn submit_credentials(
    page: &dyn PageDriver,
    credentials: &Credentials,
    config: &HarvestConfig,
) -> Result<(), AuthFailure> {
    let login = &config.profile.login;
    let step = config.timings.step_timeout;
    let fail = |reason: String| AuthFailure::at(AuthState::ProviderChosen, reason);

    fill_first(page, "identifier field", &login.identifier_fields, &credentials.login_id, step)
        .await
        .map_err(|e| fail(e.to_string()))?;
    fill_first(page, "secret field", &login.secret_fields, &credentials.secret, step)
        .await
        .map_err(|e| fail(e.to_string()))?;
    click_first(page, "submit button", &login.submit_buttons, step)
        .await
        .map_err(|e| fail(e.to_string()))?;
    Ok(())
}

async fn await_second_factor(
    page: &dyn PageDriver,
    config: &HarvestConfig,
) -> Result<String, AuthFailure> {
    let profile = &config.profile;
    let timings = &config.timings;
    let poll = Poll::new(timings.second_factor_interval, timings.second_factor_ceiling);

    let landed = poll
        .until(|attempt| async move {
            if let Ok(button) = first_match(
                page,
                "continue button",
                &profile.login.continue_buttons,
                true,
                timings.step_timeout,
            )
            .await
            {
                if page.click(&button.value).await.is_ok() {
                    info!(selector = %button.strategy, "continue activated");
                    page.wait_for_timeout(timings.continue_settle).await;
                }
            }

            let url = page.current_url().await.ok()?;
            let title = page.title().await.unwrap_or_default();
            if profile.is_signed_in_location(&url, &title) {
                return Some(url);
            }
            if attempt % 5 == 0 {
                debug!(attempt, url = %url, "still waiting for approval");
            }
            None
        })
        .await;

    landed.ok_or_else(|| {
        AuthFailure::at(
            AuthState::AwaitingSecondFactor,
            format!(
                "no approval within {}s",
                timings.second_factor_ceiling.as_secs()
            ),
        )
    })
}
