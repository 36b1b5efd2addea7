use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::settings::Settings;

pub const APP_ID_HEADER: &str = "x-looker-appid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Json(_) => "application/json",
            Body::Form(_) => "application/x-www-form-urlencoded",
            Body::Text(_) => "text/plain; charset=utf-8",
            Body::Bytes(_) => "application/octet-stream",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TransportError> {
        match self {
            Body::Json(value) => {
                serde_json::to_vec(value).map_err(|e| TransportError::Request(e.to_string()))
            }
            Body::Form(pairs) => Ok(encode_pairs(pairs.iter().map(|(k, v)| (k, v))).into_bytes()),
            Body::Text(text) => Ok(text.clone().into_bytes()),
            Body::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// An outbound call, described independently of any HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: HttpMethod,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Body>,
}

impl Request {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    String,
    Binary,
    Unknown,
}

impl ResponseMode {
    /// Textual types must be checked before binary ones since both match
    /// some `application/*` types.
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = content_type.trim().to_ascii_lowercase();
        let essence = ct.split(';').next().unwrap_or("").trim();

        let textual_app = essence.strip_prefix("application/").is_some_and(|sub| {
            ["json", "xml", "sql", "graphql", "javascript", "x-www-form-urlencoded"]
                .iter()
                .any(|word| {
                    sub.split(|c: char| !c.is_ascii_alphanumeric() && c != '-')
                        .any(|token| token == *word)
                })
        });
        if textual_app
            || essence.starts_with("text/")
            || essence.ends_with("+xml")
            || ct.contains("charset=")
        {
            return ResponseMode::String;
        }

        const BINARY: [&str; 6] = [
            "image/",
            "audio/",
            "video/",
            "font/",
            "application/",
            "multipart/",
        ];
        if BINARY.iter().any(|prefix| essence.starts_with(prefix)) {
            return ResponseMode::Binary;
        }
        ResponseMode::Unknown
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    pub fn is_success(&self) -> bool {
        (200..=226).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        let essence = self.content_type().split(';').next().unwrap_or("").trim();
        essence.starts_with("application/") && essence.contains("json")
    }

    pub fn mode(&self) -> ResponseMode {
        ResponseMode::from_content_type(self.content_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("Malformed response body: {0}")]
    Body(String),
    #[error("Request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, TransportError>;
}

/// Percent-encodes query parameters in key order. Returns an empty string
/// for an empty map.
pub fn encode_params(params: &BTreeMap<String, String>) -> String {
    encode_pairs(params.iter())
}

fn encode_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding::encode(k.as_ref()),
                urlencoding::encode(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Joins a relative path to `base_url`; absolute `http(s)://` paths pass
/// through unchanged.
pub fn make_url(base_url: &str, path: &str, query: &BTreeMap<String, String>) -> String {
    let lower = path.to_ascii_lowercase();
    let mut url = if lower.starts_with("http://") || lower.starts_with("https://") {
        path.to_string()
    } else if path.is_empty() || path.starts_with('/') {
        format!("{}{}", base_url, path)
    } else {
        format!("{}/{}", base_url, path)
    };
    let qs = encode_params(query);
    if !qs.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&qs);
    }
    url
}

/// reqwest-backed transport bound to one [`Settings`] record.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    settings: Arc<Settings>,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: Arc<Settings>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { settings, client })
    }

    fn classify(url: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() {
            TransportError::Connect {
                url: url.to_string(),
                reason: error.to_string(),
            }
        } else if error.is_body() || error.is_decode() {
            TransportError::Body(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let url = make_url(&self.settings.base_url, &request.path, &request.query);
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .header(APP_ID_HEADER, &self.settings.agent_tag);
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, body.content_type())
                .body(body.to_bytes()?);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let res = builder
            .send()
            .await
            .map_err(|e| Self::classify(&url, e))?;

        let status = res.status().as_u16();
        let headers = res
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = res.bytes().await.map_err(|e| Self::classify(&url, e))?;

        tracing::debug!("{} {} -> {}", request.method, url, status);
        Ok(Response {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
