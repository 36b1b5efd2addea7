pub mod auth;
pub mod cli;
pub mod client;
pub mod error;
pub mod handlers;
pub mod methods;
pub mod paging;
pub mod settings;
pub mod transport;

pub use auth::{AuthError, AuthSession, Credential};
pub use client::{ApiClient, Endpoint};
pub use error::{ok, ApiError, ApiErrorKind, SdkError, SdkResult, ValidationError};
pub use paging::{PageRel, Pager};
pub use settings::{ConfigError, Settings, SettingsResolver, SettingsSource};
pub use transport::{HttpTransport, Request, Response, Transport, TransportError};
