//! Authorization callback handling
//!
//! Validates what Spotify sent back, redeems the code with the pending
//! attempt's verifier and stores the resulting token. The pending attempt is
//! consumed on entry, so every outcome (success or any failure) leaves no
//! attempt behind and a replayed callback finds nothing to redeem.
//!
//! Check order: provider error, code, state, pending attempt, state match,
//! then the exchange. Failures navigate to the landing page with the error's
//! code; success stores the token before navigating to the post-login page.

use serde::Deserialize;
use tracing::{info, warn};

use crate::authorize::{PendingAuthorization, Platform};
use crate::client::ClientConfig;
use crate::error::{Error, Result};
use crate::session::TokenStore;
use crate::token::{BearerToken, TokenExchanger};

/// Query parameters on the redirect back from the provider.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Complete an authorization attempt.
///
/// On success the token is in `store` and `platform` has navigated to the
/// post-login path. On failure nothing was written to `store` and `platform`
/// has navigated to the landing path with `?error=<code>`.
pub async fn handle_callback<P, S>(
    config: &ClientConfig,
    params: &CallbackParams,
    platform: &mut P,
    exchanger: &dyn TokenExchanger,
    store: &mut S,
) -> Result<()>
where
    P: Platform + Send,
    S: TokenStore + Send,
{
    let pending = platform.read_pending();
    platform.clear_pending();

    let result = redeem(params, pending, exchanger).await;
    match result {
        Ok(token) => {
            store.set_token(&token);
            platform.navigate(&config.post_login_path);
            info!("authorization completed");
            Ok(())
        }
        Err(e) => Err(reject_callback(config, platform, e)),
    }
}

/// Fail an attempt without redeeming anything: the pending attempt is
/// discarded and `platform` navigates to the landing path with `err`'s code.
///
/// For callbacks that never reach [`handle_callback`], such as a query
/// string the service could not parse. Returns `err` for propagation.
pub fn reject_callback<P: Platform>(config: &ClientConfig, platform: &mut P, err: Error) -> Error {
    platform.clear_pending();
    warn!(code = err.code(), error = %err, "authorization callback rejected");
    platform.navigate(&config.landing_with_error(err.code()));
    err
}

async fn redeem(
    params: &CallbackParams,
    pending: Option<PendingAuthorization>,
    exchanger: &dyn TokenExchanger,
) -> Result<BearerToken> {
    if let Some(error) = &params.error {
        return Err(Error::AuthorizationDenied(error.clone()));
    }
    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(Error::MissingCode)?;
    let state = params
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingState)?;
    let pending = pending.ok_or(Error::MissingVerifier)?;
    if !constant_time_eq(pending.state.as_bytes(), state.as_bytes()) {
        return Err(Error::StateMismatch);
    }
    exchanger.exchange(code, &pending.verifier).await
}

/// Equality whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
