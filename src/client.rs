use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::auth::{AuthError, AuthSession};
use crate::error::{ok, ApiError, SdkError, SdkResult, ValidationError};
use crate::paging::Pager;
use crate::settings::{Settings, SettingsResolver, SettingsSource};
use crate::transport::{
    Body, HttpMethod, HttpTransport, Request, Response, ResponseMode, Transport,
};

/// Declares the shape of one API endpoint: how its arguments become a
/// [`Request`] and what a successful response decodes into.
pub trait Endpoint: Send + Sync {
    type Output: DeserializeOwned;

    fn method(&self) -> HttpMethod;

    /// Path relative to the versioned API root, e.g. `/user`.
    fn path(&self) -> String;

    fn query(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn body(&self) -> Option<Body> {
        None
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn requires_auth(&self) -> bool {
        true
    }

    /// Unversioned endpoints live directly under `/api`.
    fn versioned(&self) -> bool {
        true
    }
}

/// Settings, session and transport composed into typed endpoint calls.
#[derive(Clone)]
pub struct ApiClient {
    settings: Arc<Settings>,
    transport: Arc<dyn Transport>,
    session: Arc<AuthSession>,
}

impl ApiClient {
    pub fn new(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        let settings = Arc::new(settings);
        let session = AuthSession::new(Arc::clone(&settings), Arc::clone(&transport));
        Self {
            settings,
            transport,
            session: Arc::new(session),
        }
    }

    pub fn with_session(session: Arc<AuthSession>) -> Self {
        Self {
            settings: Arc::new(session.settings().clone()),
            transport: session.transport(),
            session,
        }
    }

    /// Client talking HTTP through reqwest.
    pub fn http(settings: Settings) -> Result<Self, SdkError> {
        let settings = Arc::new(settings);
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(Arc::clone(&settings))?);
        let session = AuthSession::new(Arc::clone(&settings), Arc::clone(&transport));
        Ok(Self {
            settings,
            transport,
            session: Arc::new(session),
        })
    }

    pub fn from_source(
        resolver: &SettingsResolver,
        source: &SettingsSource,
    ) -> Result<Self, SdkError> {
        let settings = resolver.resolve(source)?;
        Self::http(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Runs an endpoint and decodes its response. Only credential failures
    /// surface as the outer error; everything else is in the inner result.
    pub async fn call<E: Endpoint>(
        &self,
        endpoint: &E,
    ) -> Result<SdkResult<E::Output>, AuthError> {
        let response = match self.call_raw(endpoint).await? {
            Ok(response) => response,
            Err(e) => return Ok(Err(e)),
        };
        Ok(decode(&response))
    }

    /// Like [`ApiClient::call`], with every failure folded into [`SdkError`].
    pub async fn call_ok<E: Endpoint>(&self, endpoint: &E) -> Result<E::Output, SdkError> {
        ok(self.call(endpoint).await?)
    }

    /// Runs an endpoint without decoding the body. Non-2xx statuses are
    /// returned as responses, not errors.
    pub async fn call_raw<E: Endpoint>(
        &self,
        endpoint: &E,
    ) -> Result<SdkResult<Response>, AuthError> {
        if let Err(e) = endpoint.validate() {
            tracing::debug!("Rejected {} {}: {}", endpoint.method(), endpoint.path(), e);
            return Ok(Err(ApiError::validation(e)));
        }

        let path = self.resolve_path(&endpoint.path(), endpoint.versioned());
        let mut request = Request::new(endpoint.method(), path).with_query(endpoint.query());
        if let Some(body) = endpoint.body() {
            request = request.with_body(body);
        }
        if endpoint.requires_auth() {
            request = self.session.authenticate(request).await?;
        }

        let method = request.method;
        let path = request.path.clone();
        match self.transport.execute(request).await {
            Ok(response) => Ok(Ok(response)),
            Err(e) => {
                tracing::warn!("{} {} failed: {}", method, path, e);
                Ok(Err(e.into()))
            }
        }
    }

    /// Starts paging through a collection endpoint.
    pub async fn pager<E, T>(&self, endpoint: &E) -> Result<SdkResult<Pager<'_, T>>, AuthError>
    where
        E: Endpoint<Output = Vec<T>>,
        T: DeserializeOwned,
    {
        Pager::new(self, endpoint).await
    }

    fn resolve_path(&self, path: &str, versioned: bool) -> String {
        let lower = path.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return path.to_string();
        }
        let api_path = if versioned {
            self.settings.api_path()
        } else {
            "/api".to_string()
        };
        if path.starts_with('/') || path.is_empty() {
            format!("{}{}", api_path, path)
        } else {
            format!("{}/{}", api_path, path)
        }
    }
}

/// Turns a response into a typed value. Total: malformed or mismatched
/// bodies become a decode error instead of a panic.
pub fn decode<T: DeserializeOwned>(response: &Response) -> SdkResult<T> {
    if !response.is_success() {
        return Err(ApiError::from_response(response));
    }
    let status = response.status;

    if response.body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(serde_json::Value::Null)
            .map_err(|e| ApiError::decode(status, e));
    }
    if response.is_json() {
        return serde_json::from_slice(&response.body).map_err(|e| ApiError::decode(status, e));
    }

    match response.mode() {
        ResponseMode::Binary => Err(ApiError::decode(
            status,
            format!("binary content ({}) needs a raw call", response.content_type()),
        )),
        ResponseMode::String | ResponseMode::Unknown => {
            if let Ok(value) = serde_json::from_slice::<T>(&response.body) {
                return Ok(value);
            }
            let text = String::from_utf8(response.body.clone())
                .map_err(|e| ApiError::decode(status, e))?;
            serde_json::from_value(serde_json::Value::String(text))
                .map_err(|e| ApiError::decode(status, e))
        }
    }
}
