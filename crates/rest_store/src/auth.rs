use chrono::{DateTime, TimeDelta, Utc};
use engine::{AuthProvider, Identity, Session, StoreError};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{RestStore, read_json, send};

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
}

impl From<AuthUser> for Identity {
    fn from(user: AuthUser) -> Self {
        Identity {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: AuthUser,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|seconds| Utc::now() + TimeDelta::seconds(seconds)),
            user: token.user.into(),
        }
    }
}

/// Seconds before `expires_at` at which a session is renewed.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Whether `session` should be renewed before the next request.
fn needs_refresh(session: &Session, now: DateTime<Utc>) -> bool {
    session.refresh_token.is_some()
        && session
            .expires_at
            .is_some_and(|at| at - TimeDelta::seconds(REFRESH_MARGIN_SECS) <= now)
}

impl RestStore {
    /// Bearer token for the next request, renewing the session first when it
    /// is about to expire. A failed renewal keeps the old token; the request
    /// then fails as unauthorized.
    pub(crate) async fn access_token(&self) -> Option<String> {
        {
            let session = self.session.read().await;
            match session.as_ref() {
                None => return None,
                Some(session) if !needs_refresh(session, Utc::now()) => {
                    return Some(session.access_token.clone());
                }
                Some(_) => {}
            }
        }

        // Held across the renewal so concurrent requests refresh only once.
        let mut session = self.session.write().await;
        let current = session.as_ref()?;
        if !needs_refresh(current, Utc::now()) {
            return Some(current.access_token.clone());
        }
        let refresh_token = current.refresh_token.clone().unwrap_or_default();
        match self.refresh_session(&refresh_token).await {
            Ok(renewed) => {
                debug!(user = %renewed.user.id, "session renewed");
                *session = Some(renewed);
            }
            Err(err) => warn!("session renewal failed: {err}"),
        }
        session.as_ref().map(|session| session.access_token.clone())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, StoreError> {
        let endpoint = self.endpoint("auth/v1/token")?;
        let request = self
            .http
            .post(endpoint)
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&json!({ "refresh_token": refresh_token }));
        let res = send(request).await?;
        Ok(read_json::<TokenResponse>(res).await?.into())
    }
}

/// A sign-up answers with a full session when the project auto-confirms
/// accounts, or with the bare user when confirmation is pending.
fn session_from_signup(body: Value) -> Result<Option<Session>, StoreError> {
    if body.get("access_token").is_none() {
        return Ok(None);
    }
    serde_json::from_value::<TokenResponse>(body)
        .map(|token| Some(token.into()))
        .map_err(|err| StoreError::Decode(err.to_string()))
}

impl AuthProvider for RestStore {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let endpoint = self.endpoint("auth/v1/token")?;
        let request = self
            .http
            .post(endpoint)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }));
        let res = send(request).await?;
        let session: Session = read_json::<TokenResponse>(res).await?.into();

        info!(user = %session.user.id, "signed in");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Option<Session>, StoreError> {
        let endpoint = self.endpoint("auth/v1/signup")?;
        let request = self
            .http
            .post(endpoint)
            .header("apikey", &self.api_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "full_name": full_name },
            }));
        let res = send(request).await?;
        let session = session_from_signup(read_json(res).await?)?;

        match &session {
            Some(session) => {
                info!(user = %session.user.id, "signed up");
                *self.session.write().await = Some(session.clone());
            }
            None => info!("sign-up pending email confirmation"),
        }
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        let Some(session) = self.session.write().await.take() else {
            debug!("sign out without a session");
            return Ok(());
        };
        let endpoint = self.endpoint("auth/v1/logout")?;
        let request = self
            .http
            .post(endpoint)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token);
        send(request).await?;
        info!(user = %session.user.id, "signed out");
        Ok(())
    }

    async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }
}
