//! REST client for the durable message store.
//!
//! Two endpoints back the chat: `GET /api/messages/:roomId` returns the
//! transcript oldest-first, `POST /api/messages` persists a send and
//! returns the stored document. Both require a bearer credential.

use pawlink_core::{AuthToken, ChatError, RoomId};
use pawlink_proto::{SendPayload, WireMessage};

/// Client for the message REST API.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<AuthToken>,
}

impl RestClient {
    /// Create a client for the given API base URL.
    ///
    /// `base_url` is the server root without a trailing slash, e.g.
    /// `https://api.pawlink.example`.
    pub fn new(base_url: impl Into<String>, token: Option<AuthToken>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), token }
    }

    fn token(&self) -> Result<&AuthToken, ChatError> {
        self.token
            .as_ref()
            .ok_or_else(|| ChatError::Auth { reason: "no credential for REST call".to_string() })
    }

    /// Fetch a room's transcript, oldest first.
    pub async fn fetch_history(&self, room_id: &RoomId) -> Result<Vec<WireMessage>, ChatError> {
        let token = self.token()?;
        let url = format!("{}/api/messages/{}", self.base_url, room_id.as_str());

        let response = self
            .http
            .get(&url)
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| ChatError::Fetch { reason: format!("history request failed: {e}") })?;

        let response = check_status(response)?;
        response
            .json::<Vec<WireMessage>>()
            .await
            .map_err(|e| ChatError::Fetch { reason: format!("history body invalid: {e}") })
    }

    /// Persist a message; returns the stored document with its server
    /// id and timestamp.
    pub async fn post_message(&self, payload: &SendPayload) -> Result<WireMessage, ChatError> {
        let token = self.token()?;
        let url = format!("{}/api/messages", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token.expose())
            .json(payload)
            .send()
            .await
            .map_err(|e| ChatError::Fetch { reason: format!("post request failed: {e}") })?;

        let response = check_status(response)?;
        response
            .json::<WireMessage>()
            .await
            .map_err(|e| ChatError::Fetch { reason: format!("post body invalid: {e}") })
    }
}

/// Map HTTP status failures onto the error taxonomy.
///
/// 401/403 are credential problems and not transient; everything else
/// non-success is a fetch failure.
fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ChatError::Auth { reason: format!("server rejected credential: {status}") });
    }
    if !status.is_success() {
        return Err(ChatError::Fetch { reason: format!("server returned {status}") });
    }
    Ok(response)
}
