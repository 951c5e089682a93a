//! Login request and outcome types

use serde_json::{Map, Value};

/// Opaque login request passed to the server's `login` method
///
/// Either `{"resume": token}` or arbitrary credential fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginRequest {
    fields: Map<String, Value>,
}

impl LoginRequest {
    /// Empty request; connecting with it skips login
    pub fn new() -> Self {
        Self::default()
    }

    /// Request resuming a previous login with `token`
    pub fn resume(token: impl Into<String>) -> Self {
        Self::new().with("resume", Value::String(token.into()))
    }

    /// Add a field
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The `resume` field, when it is a string
    pub fn resume_token(&self) -> Option<&str> {
        self.fields.get("resume").and_then(Value::as_str)
    }

    /// A `resume` field is present but is not a string; it matches no stored credential
    pub fn has_non_string_resume(&self) -> bool {
        self.fields.get("resume").is_some_and(|v| !v.is_string())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub(crate) fn to_param(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<Map<String, Value>> for LoginRequest {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Successful login reply
#[derive(Debug, Clone, PartialEq)]
pub struct LoginResult {
    /// User id
    pub id: Option<String>,
    pub token: String,
    pub token_expires: Option<Value>,
    /// The reply as received
    pub raw: Value,
}

impl LoginResult {
    /// Parse a `login` reply; `None` unless it carries a non-empty token
    pub fn from_value(raw: Value) -> Option<Self> {
        let token = raw.get("token").and_then(Value::as_str).filter(|t| !t.is_empty())?.to_string();
        let id = raw.get("id").and_then(Value::as_str).map(str::to_string);
        let token_expires = raw.get("tokenExpires").cloned();
        Some(Self {
            id,
            token,
            token_expires,
            raw,
        })
    }
}

/// Outcome of the login performed when the connection was created
#[derive(Debug, Clone, PartialEq)]
pub enum LoginStatus {
    Result(LoginResult),
    Error(String),
}

impl LoginStatus {
    pub fn result(&self) -> Option<&LoginResult> {
        match self {
            LoginStatus::Result(result) => Some(result),
            LoginStatus::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoginStatus::Result(_) => None,
            LoginStatus::Error(message) => Some(message),
        }
    }
}
