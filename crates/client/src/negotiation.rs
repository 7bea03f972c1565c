//! Session negotiation against the Azure OpenAI realtime API
//!
//! Two HTTP round-trips precede media: create an ephemeral session on the
//! resource endpoint, then trade the local SDP offer for the service's
//! answer on the regional realtime endpoint using the ephemeral credential.

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use voice_client_config::Settings;

use crate::error::ClientError;

/// Outcome of session creation: the session id and the ephemeral bearer
/// credential that authorizes the SDP handshake
#[derive(Debug, Clone)]
pub struct NegotiatedSession {
    pub id: String,
    pub bearer: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    client_secret: ClientSecret,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: String,
}

/// HTTP client for the two negotiation endpoints
pub struct NegotiationClient {
    http: reqwest::Client,
    settings: Settings,
}

impl NegotiationClient {
    pub fn new(settings: Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Create an ephemeral realtime session.
    ///
    /// Sends the deployment and voice; authenticates with the configured
    /// API key when present. A non-2xx response surfaces with the service's
    /// body intact, since Azure puts the diagnostic there.
    pub async fn create_session(&self) -> Result<NegotiatedSession, ClientError> {
        let url = self.settings.sessions_url();
        debug!(url = %url, deployment = %self.settings.deployment, "creating realtime session");

        let body = json!({
            "model": self.settings.deployment,
            "voice": self.settings.voice,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::SessionNegotiation {
                status: status.as_u16(),
                body,
            });
        }

        let session: SessionResponse = response.json().await?;
        info!(session_id = %session.id, "realtime session created");

        Ok(NegotiatedSession {
            id: session.id,
            bearer: session.client_secret.value,
        })
    }

    /// Exchange the local SDP offer for the service's answer.
    ///
    /// The realtime endpoint speaks raw SDP, not JSON: the offer goes up as
    /// the request body and the answer comes back as the response body.
    pub async fn exchange_offer(&self, offer: &str, bearer: &str) -> Result<String, ClientError> {
        let url = self.settings.handshake_url();
        debug!(url = %url, offer_len = offer.len(), "exchanging SDP offer");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", bearer))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/sdp"))
            .body(offer.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Handshake {
                status: status.as_u16(),
                body,
            });
        }

        let answer = response.text().await?;
        debug!(answer_len = answer.len(), "received SDP answer");
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn settings_for(base: &str) -> Settings {
        Settings {
            endpoint: base.to_string(),
            deployment: "gpt-4o-mini-realtime-preview".to_string(),
            api_key: Some("test-key".to_string()),
            realtime_host: Some(base.to_string()),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_create_session_parses_response() {
        let router = Router::new().route(
            "/openai/realtimeapi/sessions",
            post(|| async {
                Json(serde_json::json!({
                    "id": "sess-123",
                    "client_secret": { "value": "ephemeral-token" },
                }))
            }),
        );
        let base = spawn_server(router).await;

        let client = NegotiationClient::new(settings_for(&base));
        let session = client.create_session().await.unwrap();
        assert_eq!(session.id, "sess-123");
        assert_eq!(session.bearer, "ephemeral-token");
    }

    #[tokio::test]
    async fn test_create_session_surfaces_rejection_body() {
        let router = Router::new().route(
            "/openai/realtimeapi/sessions",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = spawn_server(router).await;

        let client = NegotiationClient::new(settings_for(&base));
        let err = client.create_session().await.unwrap_err();
        match err {
            ClientError::SessionNegotiation { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_offer_round_trips_sdp() {
        let router = Router::new().route(
            "/v1/realtimertc",
            post(|body: String| async move {
                assert!(body.starts_with("v=0"));
                "v=0\r\no=answer 0 0 IN IP4 127.0.0.1\r\n".to_string()
            }),
        );
        let base = spawn_server(router).await;

        let client = NegotiationClient::new(settings_for(&base));
        let answer = client
            .exchange_offer("v=0\r\no=offer 0 0 IN IP4 127.0.0.1\r\n", "tok")
            .await
            .unwrap();
        assert!(answer.contains("o=answer"));
    }

    #[tokio::test]
    async fn test_exchange_offer_surfaces_rejection() {
        let router = Router::new().route(
            "/v1/realtimertc",
            post(|| async { (StatusCode::FORBIDDEN, "expired credential") }),
        );
        let base = spawn_server(router).await;

        let client = NegotiationClient::new(settings_for(&base));
        let err = client.exchange_offer("v=0", "tok").await.unwrap_err();
        assert!(matches!(err, ClientError::Handshake { status: 403, .. }));
    }
}
