//! Transport-independent description of one HTTP request.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the ambient session credential (cookie jar) accompanies the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialMode {
    #[default]
    Include,
    Omit,
}

/// One part of a multipart/form-data body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Request body. Cloneable so the Session Guard can re-issue a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as JSON with a JSON content type.
    Json(Value),
    /// Passed through unmodified; only the given content type (if any) is set.
    Raw {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    /// Encoded as multipart/form-data by the transport.
    Multipart(Vec<FormPart>),
}

impl RequestBody {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: RequestBody,
    /// Caller-supplied `Authorization` header value.
    pub authorization: Option<String>,
    pub credentials: CredentialMode,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: RequestBody::Empty,
            authorization: None,
            credentials: CredentialMode::Include,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Attach a JSON body. A value that fails to serialize is logged and
    /// sent as `null`.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        let value = serde_json::to_value(body).unwrap_or_else(|err| {
            tracing::warn!(path = %self.path, error = %err, "request body is not valid JSON, sending null");
            Value::Null
        });
        self.body = RequestBody::Json(value);
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn bearer(mut self, token: impl AsRef<str>) -> Self {
        self.authorization = Some(format!("Bearer {}", token.as_ref()));
        self
    }

    pub fn credentials(mut self, mode: CredentialMode) -> Self {
        self.credentials = mode;
        self
    }

    /// Copy of this request with the caller-supplied authorization removed,
    /// so a freshly rotated cookie is the only credential sent.
    pub fn without_authorization(&self) -> Self {
        Self {
            authorization: None,
            ..self.clone()
        }
    }

    /// Login and refresh must never trigger a refresh of their own.
    pub fn is_auth_bootstrap(&self) -> bool {
        let path = self.path.split('?').next().unwrap_or_default();
        path == LOGIN_PATH || path == REFRESH_PATH
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
