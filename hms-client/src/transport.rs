//! reqwest-backed [`Transport`].

use async_trait::async_trait;
use hms_core::{
    ApiRequest, CredentialMode, FormPart, HmsResult, HttpFailure, Method, RequestBody, Transport,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::ClientConfig;

/// HTTP transport against the HMS backend.
///
/// Requests with [`CredentialMode::Include`] go through a client with a cookie
/// jar, so the session cookie set by login or refresh rides along on every
/// later request. [`CredentialMode::Omit`] requests use a second client with
/// no jar.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    anonymous: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;
        let anonymous = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            anonymous,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build(&self, request: &ApiRequest) -> HmsResult<reqwest::RequestBuilder> {
        let client = match request.credentials {
            CredentialMode::Include => &self.client,
            CredentialMode::Omit => &self.anonymous,
        };
        let mut builder = client.request(reqwest_method(request.method), self.url(&request.path));
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(authorization) = &request.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        let builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Raw {
                bytes,
                content_type,
            } => {
                let builder = builder.body(bytes.clone());
                match content_type {
                    Some(content_type) => builder.header(CONTENT_TYPE, content_type),
                    None => builder,
                }
            }
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };
        Ok(builder)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> HmsResult<Value> {
        let builder = self.build(request)?;
        let response = builder.send().await.map_err(network_failure)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(network_failure)?;
        let body = parse_body(&bytes);

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "request completed"
        );

        if status.is_success() {
            Ok(body)
        } else {
            Err(HttpFailure::from_status(status.as_u16(), &body))
        }
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn build_form(parts: &[FormPart]) -> HmsResult<Form> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(content_type) = content_type {
                    file = file.mime_str(content_type).map_err(|err| {
                        HttpFailure::network(format!("invalid content type for {name}: {err}"))
                    })?;
                }
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

/// Unreadable or empty bodies become `{}`.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::Object(Map::new()))
}

fn network_failure(err: reqwest::Error) -> HttpFailure {
    if err.is_timeout() {
        HttpFailure::network("request timed out")
    } else if err.is_connect() {
        HttpFailure::network(format!("connection failed: {err}"))
    } else {
        HttpFailure::network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_fallbacks() {
        assert_eq!(parse_body(b""), json!({}));
        assert_eq!(parse_body(b"<html>502</html>"), json!({}));
        assert_eq!(parse_body(br#"{"data":[1]}"#), json!({ "data": [1] }));
    }

    #[test]
    fn test_url_joining() {
        let config = ClientConfig {
            api_base_url: "http://localhost:4000/api/".to_string(),
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.url("/patients"), "http://localhost:4000/api/patients");
        assert_eq!(transport.url("patients"), "http://localhost:4000/api/patients");
    }

    #[test]
    fn test_bad_multipart_content_type_is_rejected() {
        let parts = vec![FormPart::File {
            name: "scan".to_string(),
            file_name: "scan.png".to_string(),
            content_type: Some("not a mime".to_string()),
            bytes: vec![1, 2, 3],
        }];
        assert!(build_form(&parts).unwrap_err().is_network());
    }
}
