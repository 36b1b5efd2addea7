use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::ApiError;
use crate::settings::Settings;
use crate::transport::{Body, HttpMethod, Request, Response, Transport, TransportError};

/// Lifetime assumed when the login response omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Login rejected: {0}")]
    Rejected(ApiError),
    #[error("Login request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Failed to parse login response: {0}")]
    Decode(String),
    #[error("Invalid access token: {0}")]
    InvalidToken(String),
    #[error("Invalid sudo user id: {0:?}")]
    InvalidSudoId(String),
    #[error("Login task failed: {0}")]
    Interrupted(String),
}

/// Wire shape of the login response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessToken {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn from_access_token(token: AccessToken, now: DateTime<Utc>) -> Result<Self, AuthError> {
        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("response has no access_token".to_string()))?;
        let lifetime = token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        if lifetime <= 0 {
            return Err(AuthError::InvalidToken(format!(
                "expires_in must be positive, got {}",
                lifetime
            )));
        }

        Ok(Self {
            access_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: now + Duration::seconds(lifetime),
            refresh_token: token.refresh_token,
        })
    }

    /// Expiry is inclusive: a credential expiring exactly at `now` is stale.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

type LoginFuture = Shared<BoxFuture<'static, Result<Credential, AuthError>>>;

/// Credential obtained by logging in as another user.
#[derive(Debug, Clone)]
struct Sudo {
    user_id: String,
    credential: Credential,
}

#[derive(Default)]
struct SessionState {
    credential: Option<Credential>,
    sudo: Option<Sudo>,
    pending: Option<(u64, LoginFuture)>,
    generation: u64,
}

/// Holds the bearer credential for one [`Settings`] record and refreshes it
/// on demand. At most one login exchange is in flight at a time; callers that
/// arrive while it runs await the same outcome.
///
/// [`AuthSession::login_as`] switches the session to acting as another user.
/// Requests then carry that user's credential until [`AuthSession::logout`]
/// ends the sudo session and the API user's credential takes over again.
pub struct AuthSession {
    settings: Arc<Settings>,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<SessionState>>,
}

impl AuthSession {
    pub fn new(settings: Arc<Settings>, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            transport,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Starts from a previously persisted credential. An expired one is
    /// replaced on first use.
    pub fn with_credential(
        settings: Arc<Settings>,
        transport: Arc<dyn Transport>,
        credential: Credential,
    ) -> Self {
        let session = Self::new(settings, transport);
        lock(&session.state).credential = Some(credential);
        session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn credential(&self) -> Option<Credential> {
        lock(&self.state).credential.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let state = lock(&self.state);
        let fresh = |c: &Credential| !c.is_expired();
        state.sudo.as_ref().is_some_and(|s| fresh(&s.credential))
            || state.credential.as_ref().is_some_and(fresh)
    }

    /// Id of the user the session acts as, while that sudo session is fresh.
    pub fn sudo_id(&self) -> Option<String> {
        lock(&self.state)
            .sudo
            .as_ref()
            .filter(|s| !s.credential.is_expired())
            .map(|s| s.user_id.clone())
    }

    pub fn is_sudo(&self) -> bool {
        self.sudo_id().is_some()
    }

    /// Adds the `Authorization` header, logging in first if needed.
    pub async fn authenticate(&self, request: Request) -> Result<Request, AuthError> {
        let credential = self.active_credential().await?;
        Ok(request.with_header("authorization", credential.authorization()))
    }

    /// The sudo credential when one is active, otherwise the API user's.
    /// An expired sudo session is dropped rather than renewed.
    pub async fn active_credential(&self) -> Result<Credential, AuthError> {
        {
            let mut state = lock(&self.state);
            let expired = match &state.sudo {
                Some(sudo) if !sudo.credential.is_expired() => {
                    return Ok(sudo.credential.clone());
                }
                Some(sudo) => Some(sudo.user_id.clone()),
                None => None,
            };
            if let Some(user_id) = expired {
                tracing::warn!("Sudo session for user {} expired", user_id);
                state.sudo = None;
            }
        }
        self.ensure_fresh_credential().await
    }

    /// Logs in as `sudo_id` using the API user's credential. An active sudo
    /// session for another user is logged out first; one for the same user
    /// is reused.
    pub async fn login_as(&self, sudo_id: impl Into<String>) -> Result<Credential, AuthError> {
        let sudo_id = sudo_id.into();
        if sudo_id.trim().is_empty() {
            return Err(AuthError::InvalidSudoId(sudo_id));
        }

        let current = lock(&self.state).sudo.clone();
        if let Some(current) = current {
            if current.credential.is_expired() {
                lock(&self.state).sudo = None;
            } else if current.user_id == sudo_id {
                return Ok(current.credential);
            } else {
                self.revoke(&current.credential).await?;
                lock(&self.state).sudo = None;
                tracing::info!("Ended sudo session for user {}", current.user_id);
            }
        }

        let api_credential = self.ensure_fresh_credential().await?;
        let request = Request::new(
            HttpMethod::Post,
            format!(
                "{}/login/{}",
                self.settings.api_path(),
                urlencoding::encode(&sudo_id)
            ),
        )
        .with_header("authorization", api_credential.authorization());
        let response = self.transport.execute(request).await?;
        let credential = credential_from_response(&self.settings, &response)?;

        lock(&self.state).sudo = Some(Sudo {
            user_id: sudo_id.clone(),
            credential: credential.clone(),
        });
        tracing::info!("Acting as user {} on {}", sudo_id, self.settings.base_url);
        Ok(credential)
    }

    pub async fn login(&self) -> Result<Credential, AuthError> {
        self.ensure_fresh_credential().await
    }

    pub async fn ensure_fresh_credential(&self) -> Result<Credential, AuthError> {
        let pending = {
            let mut state = lock(&self.state);
            if let Some(credential) = &state.credential {
                if !credential.is_expired_at(Utc::now()) {
                    return Ok(credential.clone());
                }
            }
            let existing = state.pending.as_ref().map(|(_, pending)| pending.clone());
            match existing {
                Some(pending) => pending,
                None => {
                    state.generation += 1;
                    let generation = state.generation;
                    // Runs as its own task so it completes even when every
                    // waiter goes away.
                    let task = tokio::spawn(login_exchange(
                        Arc::clone(&self.settings),
                        Arc::clone(&self.transport),
                        Arc::downgrade(&self.state),
                        generation,
                    ));
                    let pending = task
                        .map(|joined| {
                            joined.unwrap_or_else(|e| Err(AuthError::Interrupted(e.to_string())))
                        })
                        .boxed()
                        .shared();
                    state.pending = Some((generation, pending.clone()));
                    pending
                }
            }
        };
        pending.await
    }

    /// Ends the server-side session of the active user. During a sudo
    /// session only that session ends and the API user stays logged in.
    /// Returns `false` when there was nothing to log out.
    pub async fn logout(&self) -> Result<bool, AuthError> {
        let sudo = lock(&self.state)
            .sudo
            .clone()
            .filter(|s| !s.credential.is_expired());
        if let Some(sudo) = sudo {
            self.revoke(&sudo.credential).await?;
            lock(&self.state).sudo = None;
            tracing::info!("Ended sudo session for user {}", sudo.user_id);
            return Ok(true);
        }

        let Some(credential) = self.credential().filter(|c| !c.is_expired()) else {
            return Ok(false);
        };
        self.revoke(&credential).await?;

        self.reset();
        tracing::info!("Logged out of {}", self.settings.base_url);
        Ok(true)
    }

    /// Drops the held credentials. A login already in flight still completes
    /// for its waiters but is not stored.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.credential = None;
        state.sudo = None;
        state.pending = None;
    }

    async fn revoke(&self, credential: &Credential) -> Result<(), AuthError> {
        let request = Request::new(
            HttpMethod::Delete,
            format!("{}/logout", self.settings.api_path()),
        )
        .with_header("authorization", credential.authorization());
        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            return Err(AuthError::Rejected(ApiError::from_response(&response)));
        }
        Ok(())
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn login_exchange(
    settings: Arc<Settings>,
    transport: Arc<dyn Transport>,
    state: Weak<Mutex<SessionState>>,
    generation: u64,
) -> Result<Credential, AuthError> {
    let result = request_token(&settings, transport.as_ref()).await;

    if let Some(shared) = state.upgrade() {
        let mut state = lock(&shared);
        if matches!(&state.pending, Some((g, _)) if *g == generation) {
            state.pending = None;
            if let Ok(credential) = &result {
                state.credential = Some(credential.clone());
            }
        }
    }
    result
}

async fn request_token(
    settings: &Settings,
    transport: &dyn Transport,
) -> Result<Credential, AuthError> {
    tracing::debug!("Logging in to {} as {}", settings.base_url, settings.client_id);

    let request = Request::new(HttpMethod::Post, format!("{}/login", settings.api_path()))
        .with_body(Body::Form(vec![
            ("client_id".to_string(), settings.client_id.clone()),
            ("client_secret".to_string(), settings.client_secret.clone()),
        ]));
    let response = transport.execute(request).await?;
    let credential = credential_from_response(settings, &response)?;

    tracing::info!(
        "Authenticated against {}, token expires at {}",
        settings.base_url,
        credential.expires_at
    );
    Ok(credential)
}

fn credential_from_response(
    settings: &Settings,
    response: &Response,
) -> Result<Credential, AuthError> {
    if !response.is_success() {
        let error = ApiError::from_response(response);
        tracing::warn!("Login to {} rejected: {}", settings.base_url, error);
        return Err(AuthError::Rejected(error));
    }

    let token: AccessToken = serde_json::from_slice(&response.body)
        .map_err(|e| AuthError::Decode(e.to_string()))?;
    Credential::from_access_token(token, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_inclusive() {
        let now = Utc::now();
        let credential = Credential {
            access_token: "t".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: now,
            refresh_token: None,
        };
        assert!(credential.is_expired_at(now));
        assert!(!credential.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_credential_requires_token() {
        let result = Credential::from_access_token(AccessToken::default(), Utc::now());
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_credential_default_lifetime() {
        let now = Utc::now();
        let token = AccessToken {
            access_token: Some("abc".to_string()),
            ..Default::default()
        };
        let credential = Credential::from_access_token(token, now).unwrap();
        assert_eq!(
            credential.expires_at,
            now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS)
        );
        assert_eq!(credential.token_type, "Bearer");
    }

    #[test]
    fn test_credential_rejects_non_positive_lifetime() {
        let token = AccessToken {
            access_token: Some("abc".to_string()),
            expires_in: Some(0),
            ..Default::default()
        };
        assert!(Credential::from_access_token(token, Utc::now()).is_err());
    }
}
