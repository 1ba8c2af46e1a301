use super::types::{
    AuthEnvelope, AuthGrant, ErrorEnvelope, NewStory, StoriesEnvelope, Story, StoryEnvelope,
    UserEnvelope, UserRecord,
};
use super::{ApiError, StoryApi};
use futures::StreamExt;
use reqwest::redirect::Policy;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Public Hack or Snooze API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://hack-or-snooze-v3.herokuapp.com";

/// Upper bound for any response body. The full story list is the largest
/// payload and stays well below this.
const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024;

/// Only the connection phase is bounded. Requests themselves run until the
/// server answers or the transport fails.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Create a redirect policy with loop detection and limited hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(to = %url, hop = attempt.previous().len() + 1, "Following redirect");
        attempt.follow()
    })
}

/// `reqwest` implementation of [`StoryApi`].
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self, ClientBuildError> {
        let base = Url::parse(base_url)
            .map_err(|e| ClientBuildError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ClientBuildError::InvalidBaseUrl(base_url.to_string()));
        }
        if base.scheme() == "http" {
            tracing::warn!(
                base_url = %base,
                "Using plain HTTP API endpoint, tokens are sent unencrypted"
            );
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(create_redirect_policy())
            .user_agent(concat!("snooze/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base })
    }

    /// Base URL with `segments` appended. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: the base can always take path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = read_limited_text(response, MAX_RESPONSE_SIZE).await?;

        if !status.is_success() {
            let err = error_for_status(status, &body);
            tracing::debug!(status = status.as_u16(), error = %err, "API request failed");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(error = %e, "Unexpected API response body");
            ApiError::Network(format!("unexpected response: {e}"))
        })
    }
}

impl StoryApi for HttpApi {
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthGrant, ApiError> {
        let body = json!({
            "user": { "username": username, "password": password.expose_secret() }
        });
        let request = self.client.post(self.endpoint(&["login"])).json(&body);
        let envelope: AuthEnvelope = self.send(request).await.map_err(|e| match e {
            // The service answers 404 for unknown usernames.
            ApiError::NotFound => ApiError::Auth,
            other => other,
        })?;
        Ok(AuthGrant {
            user: envelope.user,
            token: SecretString::from(envelope.token),
        })
    }

    async fn create_account(
        &self,
        username: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<AuthGrant, ApiError> {
        let body = json!({
            "user": { "name": name, "username": username, "password": password.expose_secret() }
        });
        let request = self.client.post(self.endpoint(&["signup"])).json(&body);
        let envelope: AuthEnvelope = self.send(request).await?;
        Ok(AuthGrant {
            user: envelope.user,
            token: SecretString::from(envelope.token),
        })
    }

    async fn resolve_session(
        &self,
        token: &SecretString,
        username: &str,
    ) -> Result<UserRecord, ApiError> {
        let mut url = self.endpoint(&["users", username]);
        url.query_pairs_mut().append_pair("token", token.expose_secret());
        let request = self.client.get(url);
        let envelope: UserEnvelope = self.send(request).await?;
        Ok(envelope.user)
    }

    async fn list_stories(&self) -> Result<Vec<Story>, ApiError> {
        let request = self.client.get(self.endpoint(&["stories"]));
        let envelope: StoriesEnvelope = self.send(request).await?;
        Ok(envelope.stories)
    }

    async fn create_story(
        &self,
        token: &SecretString,
        story: &NewStory,
    ) -> Result<Story, ApiError> {
        let body = json!({ "token": token.expose_secret(), "story": story });
        let request = self.client.post(self.endpoint(&["stories"])).json(&body);
        let envelope: StoryEnvelope = self.send(request).await?;
        Ok(envelope.story)
    }

    async fn delete_story(&self, token: &SecretString, story_id: &str) -> Result<(), ApiError> {
        let body = json!({ "token": token.expose_secret() });
        let request = self
            .client
            .delete(self.endpoint(&["stories", story_id]))
            .json(&body);
        let envelope: StoryEnvelope = self.send(request).await?;
        if envelope.story.story_id != story_id {
            return Err(ApiError::Network("deletion was not confirmed".to_string()));
        }
        Ok(())
    }

    async fn add_favorite(
        &self,
        token: &SecretString,
        username: &str,
        story_id: &str,
    ) -> Result<UserRecord, ApiError> {
        let body = json!({ "token": token.expose_secret() });
        let request = self
            .client
            .post(self.endpoint(&["users", username, "favorites", story_id]))
            .json(&body);
        let envelope: UserEnvelope = self.send(request).await?;
        Ok(envelope.user)
    }

    async fn remove_favorite(
        &self,
        token: &SecretString,
        username: &str,
        story_id: &str,
    ) -> Result<UserRecord, ApiError> {
        let body = json!({ "token": token.expose_secret() });
        let request = self
            .client
            .delete(self.endpoint(&["users", username, "favorites", story_id]))
            .json(&body);
        let envelope: UserEnvelope = self.send(request).await?;
        Ok(envelope.user)
    }
}

/// Map a non-success status and its body onto the error taxonomy.
fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Auth,
        StatusCode::FORBIDDEN => ApiError::Authz,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => {
            ApiError::Validation(error_message(body).unwrap_or_else(|| "invalid request".into()))
        }
        other => ApiError::Network(format!("HTTP status {}", other.as_u16())),
    }
}

/// Extract the human-readable message from an error body, if any.
///
/// `message` is either a string or a list of strings (one per failed field).
fn error_message(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    match envelope.error.message {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Array(items)) => {
            let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => envelope.error.title,
    }
}

async fn read_limited_text(response: reqwest::Response, limit: usize) -> Result<String, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::Network(format!(
                "response too large (exceeds {limit} bytes)"
            )));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::Network(format!(
                "response too large (exceeds {limit} bytes)"
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ApiError::Network("invalid UTF-8 in response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn story_json(id: &str) -> serde_json::Value {
        json!({
            "storyId": id,
            "title": format!("Story {id}"),
            "author": "Ada",
            "url": "https://www.example.com/a",
            "username": "ada",
            "createdAt": "2024-03-01T12:00:00.000Z",
            "updatedAt": "2024-03-01T12:00:00.000Z"
        })
    }

    fn user_json(favorites: Vec<serde_json::Value>) -> serde_json::Value {
        json!({
            "username": "ada",
            "name": "Ada Lovelace",
            "createdAt": "2023-12-10T08:00:00.000Z",
            "updatedAt": "2023-12-10T08:00:00.000Z",
            "favorites": favorites,
            "stories": [story_json("own-1")]
        })
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_partial_json(json!({"user": {"username": "ada"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": user_json(vec![story_json("fav-1")]),
                "token": "tok"
            })))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let grant = api.authenticate("ada", &secret("pw")).await.unwrap();

        assert_eq!(grant.token.expose_secret(), "tok");
        assert_eq!(grant.user.username, "ada");
        assert_eq!(grant.user.favorites.len(), 1);
        assert_eq!(grant.user.stories[0].story_id, "own-1");
    }

    #[tokio::test]
    async fn test_authenticate_bad_password_is_auth_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"status": 401, "title": "Unauthorized", "message": "Invalid password"}
            })))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let err = api.authenticate("ada", &secret("nope")).await.unwrap_err();
        assert_eq!(err, ApiError::Auth);
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user_is_auth_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let err = api.authenticate("ghost", &secret("pw")).await.unwrap_err();
        assert_eq!(err, ApiError::Auth);
    }

    #[tokio::test]
    async fn test_signup_conflict_is_validation_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/signup"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {
                    "status": 409,
                    "title": "Conflict",
                    "message": "There already exists a user with username 'ada'."
                }
            })))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let err = api
            .create_account("ada", &secret("pw"), "Ada")
            .await
            .unwrap_err();
        match err {
            ApiError::Validation(msg) => assert!(msg.contains("already exists")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_session_sends_token_query() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/ada"))
            .and(query_param("token", "tok"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"user": user_json(vec![])})),
            )
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let user = api.resolve_session(&secret("tok"), "ada").await.unwrap();
        assert_eq!(user.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_list_stories_preserves_server_order() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"stories": [story_json("new"), story_json("mid"), story_json("old")]}),
            ))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let ids: Vec<String> = api
            .list_stories()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.story_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_create_story_posts_fields() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stories"))
            .and(body_partial_json(json!({
                "token": "tok",
                "story": {"author": "Ada", "title": "Notes", "url": "https://example.com/notes"}
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"story": story_json("s-9")})),
            )
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let story = api
            .create_story(
                &secret("tok"),
                &NewStory {
                    author: "Ada".into(),
                    title: "Notes".into(),
                    url: "https://example.com/notes".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(story.story_id, "s-9");
    }

    #[tokio::test]
    async fn test_delete_story_forbidden_is_authz_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/stories/s-1"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let err = api.delete_story(&secret("tok"), "s-1").await.unwrap_err();
        assert_eq!(err, ApiError::Authz);
    }

    #[tokio::test]
    async fn test_delete_story_with_mismatched_confirmation_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/stories/s-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"message": "Deleted", "story": story_json("s-2")}),
            ))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let err = api.delete_story(&secret("tok"), "s-1").await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }

    #[tokio::test]
    async fn test_add_favorite_uses_user_path() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/ada/favorites/s-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Favorite Added!",
                "user": user_json(vec![story_json("s-1")])
            })))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let user = api.add_favorite(&secret("tok"), "ada", "s-1").await.unwrap();
        assert_eq!(user.favorites[0].story_id, "s-1");
    }

    #[tokio::test]
    async fn test_malformed_body_is_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stories"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let err = api.list_stories().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let api = HttpApi::new(&mock_server.uri()).unwrap();
        let err = api.list_stories().await.unwrap_err();
        assert_eq!(err, ApiError::Network("HTTP status 503".into()));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        assert!(HttpApi::new("ftp://example.com").is_err());
        assert!(HttpApi::new("not a url").is_err());
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let api = HttpApi::new("https://api.example.com/v3/").unwrap();
        let url = api.endpoint(&["users", "a b", "favorites", "x/y"]);
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v3/users/a%20b/favorites/x%2Fy"
        );
    }

    #[test]
    fn test_error_message_joins_field_list() {
        let body =
            r#"{"error": {"status": 400, "message": ["title is required", "url is invalid"]}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("title is required; url is invalid")
        );
    }
}
