//! Spotify OAuth (Authorization Code + PKCE) for the mood study
//!
//! Everything between "participant clicks Connect with Spotify" and "a
//! bearer token is in the session": PKCE generation, authorization
//! initiation, callback validation, the confidential token exchange and
//! dual-horizon token custody. Browser effects are abstracted behind
//! [`Platform`] and [`TokenStore`], so the whole flow runs without a browser.
//!
//! Flow:
//! 1. `authorize::begin_authorization()` persists a pending attempt and
//!    navigates to Spotify's consent page
//! 2. Spotify redirects to `CALLBACK_PATH` with `code` and `state`
//! 3. `callback::handle_callback()` checks the attempt, redeems the code via
//!    a [`TokenExchanger`] and writes the token to the [`TokenStore`]
//! 4. The API gateway reads the token from the store on every call
//!
//! There is no refresh: when the token expires the participant repeats 1-3.

pub mod authorize;
pub mod callback;
pub mod client;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod session;
pub mod token;

pub use authorize::{
    MemoryPlatform, PendingAuthorization, Platform, begin_authorization, build_authorization_url,
};
pub use callback::{CallbackParams, handle_callback, reject_callback};
pub use client::ClientConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use pkce::{PkcePair, compute_challenge, generate_state, generate_verifier};
pub use session::{DualHorizonStore, Horizon, MemoryHorizon, MemoryTokenStore, TokenStore};
pub use token::{AccessToken, BearerToken, HttpTokenExchanger, TokenExchanger, TokenResponse};
