//! Record store backed by a hosted Postgres REST gateway.
//!
//! Tables live under `/rest/v1/<table>` and accounts under `/auth/v1/...`.
//! Row-level security is enforced server side: a write the caller may not
//! perform comes back as an empty result, not as an error.

use engine::{Session, StoreError};
use reqwest::{RequestBuilder, Response, Url};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::RwLock;

mod auth;
mod records;

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    error: Option<String>,
}

impl ErrorResponse {
    fn into_message(self) -> String {
        self.message
            .or(self.error_description)
            .or(self.msg)
            .or(self.error)
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[derive(Debug)]
pub struct RestStore {
    base_url: Url,
    api_key: String,
    http: reqwest::Client,
    session: RwLock<Option<Session>>,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        // A trailing slash keeps `join` from dropping the last path segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|err| StoreError::Validation(format!("invalid base_url: {err}")))?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            http: reqwest::Client::new(),
            session: RwLock::new(None),
        })
    }

    /// Starts from an existing session instead of signing in.
    pub async fn with_session(self, session: Session) -> Self {
        *self.session.write().await = Some(session);
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|err| StoreError::Validation(format!("invalid endpoint {path}: {err}")))
    }

    /// Adds the project key and the caller's bearer token, or the project key
    /// as bearer when nobody is signed in. Expiring sessions are renewed first.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .access_token()
            .await
            .unwrap_or_else(|| self.api_key.clone());
        request.header("apikey", &self.api_key).bearer_auth(token)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let res = request.send().await.map_err(transport)?;
    if res.status().is_success() {
        return Ok(res);
    }

    let status = res.status().as_u16();
    let body = res
        .json::<ErrorResponse>()
        .await
        .map(ErrorResponse::into_message)
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(StoreError::from_status(status, body))
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, StoreError> {
    let bytes = res.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|err| StoreError::Decode(err.to_string()))
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_message_field() {
        let body: ErrorResponse = serde_json::from_str(
            r#"{"message":"duplicate key","error":"conflict","msg":"x"}"#,
        )
        .unwrap();
        assert_eq!(body.into_message(), "duplicate key");

        let body: ErrorResponse =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .unwrap();
        assert_eq!(body.into_message(), "Invalid login credentials");

        assert_eq!(ErrorResponse::default().into_message(), "unknown error");
    }

    #[test]
    fn base_url_keeps_its_path() {
        let store = RestStore::new("https://example.test/project", "key").unwrap();
        assert_eq!(
            store.endpoint("rest/v1/budgets").unwrap().as_str(),
            "https://example.test/project/rest/v1/budgets"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = RestStore::new("not a url", "key").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
