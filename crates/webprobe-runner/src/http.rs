//! reqwest-backed transport

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tokio_util::sync::CancellationToken;

use webprobe_core::content::CONTENT_TYPE_JSON;
use webprobe_core::{Body, PartContent, Request};

use crate::error::TransportError;
use crate::transport::{Response, Transport};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BODY_BYTES: usize = 4096;

/// Sends requests to `base_url` + request URI.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    headers: HashMap<String, String>,
}

impl ReqwestTransport {
    /// Transport with the default 10s timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be initialised
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be initialised
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: HashMap::new(),
        })
    }

    /// Headers added to every request
    #[must_use]
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    fn url(&self, uri: &str) -> String {
        format!("{}{uri}", self.base_url)
    }

    fn prepare(&self, request: Request) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("method {}", request.method)))?;

        let mut req = self.client.request(method, self.url(&request.uri));
        for (k, v) in &self.headers {
            // Values that are not valid in HTTP never reach the server
            if HeaderValue::from_str(v).is_ok() {
                req = req.header(k, v);
            }
        }

        let req = match request.body {
            None => req,
            Some(Body::Json(text)) => {
                let content_type = request
                    .content_type
                    .filter(|ct| ct.to_ascii_lowercase().contains("json"))
                    .unwrap_or_else(|| CONTENT_TYPE_JSON.to_string());
                req.header(CONTENT_TYPE, content_type).body(text)
            }
            Some(Body::Form(fields)) => req.form(&fields),
            Some(Body::Multipart(parts)) => {
                let mut form = reqwest::multipart::Form::new();
                for part in parts {
                    form = match part.content {
                        PartContent::Text(text) => form.text(part.name, text),
                        PartContent::File {
                            file_name,
                            content_type,
                            bytes,
                        } => {
                            let file = reqwest::multipart::Part::bytes(bytes)
                                .file_name(file_name)
                                .mime_str(&content_type)
                                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                            form.part(part.name, file)
                        }
                    };
                }
                req.multipart(form)
            }
            Some(Body::Raw {
                content_type,
                bytes,
            }) => req.header(CONTENT_TYPE, content_type).body(bytes),
        };
        Ok(req)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        let req = self.prepare(request)?;

        let resp = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransportError::Cancelled),
            sent = req.send() => sent.map_err(|e| TransportError::Request(e.to_string()))?,
        };
        let status = resp.status().as_u16();

        let text = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TransportError::Cancelled),
            text = resp.text() => text.unwrap_or_default(),
        };

        Ok(Response {
            status,
            body: truncate_body(text),
        })
    }
}

/// Empty bodies become `None`; long ones are cut on a char boundary.
fn truncate_body(text: String) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    if text.len() <= MAX_BODY_BYTES {
        return Some(text);
    }
    let mut end = MAX_BODY_BYTES;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    Some(format!("{}…({} bytes total)", &text[..end], text.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use webprobe_core::{Method, Part, RequestFactory};

    fn request(method: Method, uri: &str, body: Option<Body>) -> Request {
        Request {
            method,
            uri: uri.to_string(),
            content_type: None,
            body,
        }
    }

    fn build(transport: &ReqwestTransport, request: Request) -> reqwest::Request {
        transport.prepare(request).unwrap().build().unwrap()
    }

    #[test]
    fn joins_base_url_and_uri() {
        let transport = ReqwestTransport::new("http://localhost:8080/").unwrap();
        let req = build(&transport, request(Method::Delete, "/pet/1", None));

        assert_eq!(req.method(), reqwest::Method::DELETE);
        assert_eq!(req.url().as_str(), "http://localhost:8080/pet/1");
        assert!(req.body().is_none());
    }

    #[test]
    fn json_body_keeps_declared_json_type() {
        let transport = ReqwestTransport::new("http://localhost").unwrap();

        let mut plain = request(Method::Post, "/pet", Some(Body::Json("{}".into())));
        plain.content_type = Some("application/xml".into());
        let req = build(&transport, plain);
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(req.body().and_then(|b| b.as_bytes()), Some(&b"{}"[..]));

        let mut vendor = request(Method::Post, "/pet", Some(Body::Json("{}".into())));
        vendor.content_type = Some("application/vnd.api+json".into());
        let req = build(&transport, vendor);
        assert_eq!(req.headers()[CONTENT_TYPE], "application/vnd.api+json");
    }

    #[test]
    fn form_body_is_urlencoded() {
        let transport = ReqwestTransport::new("http://localhost").unwrap();
        let body = Body::Form(vec![
            ("name".into(), "test".into()),
            ("status".into(), "a b".into()),
        ]);
        let req = build(&transport, request(Method::Post, "/pet/1", Some(body)));

        assert_eq!(
            req.headers()[CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            req.body().and_then(|b| b.as_bytes()),
            Some(&b"name=test&status=a+b"[..])
        );
    }

    #[test]
    fn multipart_body_sets_boundary() {
        let transport = ReqwestTransport::new("http://localhost").unwrap();
        let body = Body::Multipart(vec![
            Part::text("additionalMetadata", ""),
            Part::placeholder_file("file"),
        ]);
        let req = build(&transport, request(Method::Post, "/upload", Some(body)));

        let content_type = req.headers()[CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
    }

    #[test]
    fn raw_body_uses_its_content_type() {
        let transport = ReqwestTransport::new("http://localhost").unwrap();
        let body = Body::Raw {
            content_type: "application/xml".into(),
            bytes: b"<pet/>".to_vec(),
        };
        let req = build(&transport, request(Method::Put, "/pet", Some(body)));

        assert_eq!(req.headers()[CONTENT_TYPE], "application/xml");
        assert_eq!(req.body().and_then(|b| b.as_bytes()), Some(&b"<pet/>"[..]));
    }

    #[test]
    fn xml_body_override_is_sent_as_xml() {
        let document = webprobe_core::loader::parse_str(
            r#"
openapi: 3.0.3
info: {title: Pets, version: "1"}
paths:
  /pet:
    put:
      requestBody:
        content:
          application/xml:
            schema:
              type: object
              required: [name]
              properties:
                name: {type: string}
"#,
            webprobe_core::loader::Format::Yaml,
        )
        .unwrap();
        let mut config = webprobe_core::Config::default();
        config.bodies.push(webprobe_core::BodyOverride {
            operation: "PUT /pet".into(),
            content_type: Some("application/xml".into()),
            body: "<pet/>".into(),
        });
        let factory = RequestFactory::new().with_body_hook(config.body_hook().unwrap());
        let (path, op) = document.operations().next().unwrap();
        let transport = ReqwestTransport::new("http://localhost").unwrap();

        let req = build(&transport, factory.build(path, op));

        assert_eq!(req.headers()[CONTENT_TYPE], "application/xml");
        assert_eq!(req.body().and_then(|b| b.as_bytes()), Some(&b"<pet/>"[..]));
    }

    #[test]
    fn configured_headers_skip_invalid_values() {
        let headers = HashMap::from([
            ("Authorization".to_string(), "Bearer abc".to_string()),
            ("X-Broken".to_string(), "a\r\nb".to_string()),
        ]);
        let transport = ReqwestTransport::new("http://localhost")
            .unwrap()
            .with_headers(headers);
        let req = build(&transport, request(Method::Get, "/", None));

        assert_eq!(req.headers()["authorization"], "Bearer abc");
        assert!(req.headers().get("x-broken").is_none());
    }

    #[test]
    fn truncates_long_bodies() {
        assert_eq!(truncate_body(String::new()), None);
        assert_eq!(truncate_body("ok".into()), Some("ok".into()));

        let long = "é".repeat(MAX_BODY_BYTES);
        let cut = truncate_body(long).unwrap();
        assert!(cut.ends_with(&format!("({} bytes total)", MAX_BODY_BYTES * 2)));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_sending() {
        let transport = ReqwestTransport::new("http://127.0.0.1:9").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transport
            .send(request(Method::Get, "/", None), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
    }

    #[tokio::test]
    async fn reads_status_from_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 401 Unauthorized\r\ncontent-length: 6\r\nconnection: close\r\n\r\ndenied",
                )
                .await
                .unwrap();
        });

        let transport = ReqwestTransport::new(format!("http://{addr}")).unwrap();
        let response = transport
            .send(request(Method::Get, "/pet/1", None), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(response.body.as_deref(), Some("denied"));
    }
}
