//! Spotify Web API access for the mood study
//!
//! [`ApiGateway`] wraps the endpoints the study pages need (search, device
//! listing, playback transfer, play, current user) behind bearer
//! authentication taken from a `spotify_auth::TokenStore`, and maps failures
//! to [`ApiError`]. [`Recommender`] is the seam the recommendation logic
//! plugs into.

pub mod error;
pub mod gateway;
pub mod models;
pub mod recommend;

pub use error::{ApiError, Result};
pub use gateway::{API_BASE_URL, ApiGateway, AuthorizedGateway, MAX_SEARCH_LIMIT};
pub use models::{Album, Artist, Device, Image, Track, UserProfile};
pub use recommend::{Recommendation, Recommender, SearchRecommender};
