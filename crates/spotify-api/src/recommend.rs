//! Recommendation provider contract
//!
//! The study's mood-matching heuristic lives outside this workspace. Pages
//! only depend on `recommend(mood) -> {title, artist, uri}`, plus album art
//! when Spotify has it. The search-backed provider here is the fallback that
//! asks Spotify for the best match on the mood text itself.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::Result;
use crate::gateway::AuthorizedGateway;

/// A track to play for a participant's mood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub artist: String,
    pub uri: String,
    /// First (largest) album cover Spotify returned, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
}

/// Produces a recommendation for a mood description.
///
/// Returns `Ok(None)` when nothing suitable was found. Uses
/// `Pin<Box<dyn Future>>` for dyn-compatibility (`Arc<dyn Recommender>`).
pub trait Recommender: Send + Sync {
    fn id(&self) -> &str;

    fn recommend<'a>(
        &'a self,
        api: &'a AuthorizedGateway,
        mood: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Recommendation>>> + Send + 'a>>;
}

/// Recommends the top Spotify search hit for the mood text.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchRecommender;

impl Recommender for SearchRecommender {
    fn id(&self) -> &str {
        "search"
    }

    fn recommend<'a>(
        &'a self,
        api: &'a AuthorizedGateway,
        mood: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Recommendation>>> + Send + 'a>> {
        Box::pin(async move {
            let mood = mood.trim();
            if mood.is_empty() {
                return Ok(None);
            }
            let tracks = api.search_tracks(mood, 1).await?;
            Ok(tracks.into_iter().next().map(|track| Recommendation {
                artist: track.artist_names(),
                album_art: track
                    .album
                    .and_then(|album| album.images.into_iter().next())
                    .map(|image| image.url),
                title: track.name,
                uri: track.uri,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ApiGateway;
    use spotify_auth::AccessToken;
    use tokio::net::TcpListener;

    async fn start_search_server(items: serde_json::Value) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route(
            "/v1/search",
            axum::routing::get(move || {
                let items = items.clone();
                async move { axum::Json(serde_json::json!({"tracks": {"items": items}})) }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn top_hit_becomes_recommendation() {
        let base = start_search_server(serde_json::json!([
            {"id": "1", "name": "Walking on Sunshine", "uri": "spotify:track:1",
             "artists": [{"name": "Katrina and the Waves"}]},
        ]))
        .await;
        let gateway = ApiGateway::new(reqwest::Client::new(), base);
        let api = gateway.with_token(AccessToken::new("BQD".into()));

        let recommendation = SearchRecommender
            .recommend(&api, "sunny and upbeat")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            recommendation,
            Recommendation {
                title: "Walking on Sunshine".into(),
                artist: "Katrina and the Waves".into(),
                uri: "spotify:track:1".into(),
                album_art: None,
            }
        );
    }

    #[tokio::test]
    async fn album_art_uses_first_image() {
        let base = start_search_server(serde_json::json!([
            {"id": "2", "name": "Here Comes the Sun", "uri": "spotify:track:2",
             "artists": [{"name": "The Beatles"}],
             "album": {"name": "Abbey Road", "images": [
                 {"url": "https://i.scdn.co/image/large", "width": 640, "height": 640},
                 {"url": "https://i.scdn.co/image/small", "width": 64, "height": 64}
             ]}},
        ]))
        .await;
        let gateway = ApiGateway::new(reqwest::Client::new(), base);
        let api = gateway.with_token(AccessToken::new("BQD".into()));

        let recommendation = SearchRecommender
            .recommend(&api, "sunny")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            recommendation.album_art.as_deref(),
            Some("https://i.scdn.co/image/large")
        );
        let json = serde_json::to_value(&recommendation).unwrap();
        assert_eq!(json["album_art"], "https://i.scdn.co/image/large");
    }

    #[tokio::test]
    async fn no_hits_is_none() {
        let base = start_search_server(serde_json::json!([])).await;
        let gateway = ApiGateway::new(reqwest::Client::new(), base);
        let api = gateway.with_token(AccessToken::new("BQD".into()));

        assert!(SearchRecommender.recommend(&api, "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_mood_skips_the_network() {
        let gateway = ApiGateway::new(reqwest::Client::new(), "http://127.0.0.1:1/v1");
        let api = gateway.with_token(AccessToken::new("BQD".into()));

        assert!(SearchRecommender.recommend(&api, "   ").await.unwrap().is_none());
    }
}
