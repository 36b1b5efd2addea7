use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::client::Endpoint;
use crate::error::ValidationError;
use crate::transport::{Body, HttpMethod};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiVersionElement {
    pub version: Option<String>,
    pub full_version: Option<String>,
    pub status: Option<String>,
    pub swagger_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiVersion {
    pub looker_release_version: Option<String>,
    pub current_version: Option<ApiVersionElement>,
    pub supported_versions: Vec<ApiVersionElement>,
    pub api_server_url: Option<String>,
    pub web_server_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub is_disabled: bool,
    pub locale: Option<String>,
    pub role_ids: Vec<String>,
}

/// Writable subset of [`User`]; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl WriteUser {
    /// JSON object holding only the fields that are set.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        let strings = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("locale", &self.locale),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                object.insert(key.to_string(), Value::from(value.as_str()));
            }
        }
        if let Some(is_disabled) = self.is_disabled {
            object.insert("is_disabled".to_string(), Value::Bool(is_disabled));
        }
        Value::Object(object)
    }
}

fn require(name: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingArgument(name))
    } else {
        Ok(())
    }
}

fn insert_opt<T: ToString>(query: &mut BTreeMap<String, String>, key: &str, value: &Option<T>) {
    if let Some(value) = value {
        query.insert(key.to_string(), value.to_string());
    }
}

/// `GET /api/versions`. Needs no credentials.
#[derive(Debug, Clone, Default)]
pub struct Versions;

impl Endpoint for Versions {
    type Output = ApiVersion;

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> String {
        "/versions".to_string()
    }

    fn requires_auth(&self) -> bool {
        false
    }

    fn versioned(&self) -> bool {
        false
    }
}

/// The user the session is logged in as.
#[derive(Debug, Clone, Default)]
pub struct Me {
    pub fields: Option<String>,
}

impl Endpoint for Me {
    type Output = User;

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> String {
        "/user".to_string()
    }

    fn query(&self) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        insert_opt(&mut query, "fields", &self.fields);
        query
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetUser {
    pub user_id: String,
    pub fields: Option<String>,
}

impl GetUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            fields: None,
        }
    }
}

impl Endpoint for GetUser {
    type Output = User;

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> String {
        format!("/users/{}", urlencoding::encode(&self.user_id))
    }

    fn query(&self) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        insert_opt(&mut query, "fields", &self.fields);
        query
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("user_id", &self.user_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchUsers {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub sorts: Option<String>,
    pub fields: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Endpoint for SearchUsers {
    type Output = Vec<User>;

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> String {
        "/users/search".to_string()
    }

    fn query(&self) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        insert_opt(&mut query, "email", &self.email);
        insert_opt(&mut query, "first_name", &self.first_name);
        insert_opt(&mut query, "last_name", &self.last_name);
        insert_opt(&mut query, "sorts", &self.sorts);
        insert_opt(&mut query, "fields", &self.fields);
        insert_opt(&mut query, "page", &self.page);
        insert_opt(&mut query, "per_page", &self.per_page);
        insert_opt(&mut query, "limit", &self.limit);
        insert_opt(&mut query, "offset", &self.offset);
        query
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let minimums = [
            ("page", self.page, 1),
            ("per_page", self.per_page, 1),
            ("limit", self.limit, 1),
            ("offset", self.offset, 0),
        ];
        for (name, value, minimum) in minimums {
            if let Some(value) = value {
                if value < minimum {
                    return Err(ValidationError::InvalidArgument {
                        name,
                        reason: format!("must be at least {}, got {}", minimum, value),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub user_id: String,
    pub body: WriteUser,
}

impl Endpoint for UpdateUser {
    type Output = User;

    fn method(&self) -> HttpMethod {
        HttpMethod::Patch
    }

    fn path(&self) -> String {
        format!("/users/{}", urlencoding::encode(&self.user_id))
    }

    fn body(&self) -> Option<Body> {
        Some(Body::Json(self.body.to_json()))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("user_id", &self.user_id)?;
        if self.body == WriteUser::default() {
            return Err(ValidationError::InvalidArgument {
                name: "body",
                reason: "no fields to update".to_string(),
            });
        }
        Ok(())
    }
}

/// Untyped call for paths the catalog does not cover.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl RawRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
        }
    }
}

impl Endpoint for RawRequest {
    type Output = Value;

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn query(&self) -> BTreeMap<String, String> {
        self.query.clone()
    }

    fn body(&self) -> Option<Body> {
        self.body.clone().map(Body::Json)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("path", &self.path)
    }
}
