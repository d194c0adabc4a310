//! Transport-ready request values and their assembly from the document

use crate::content::{BodyHook, ContentBuilder, RequestContentInfo};
use crate::document::{Method, Operation};
use crate::synth::{ParameterValueHook, Synthesizer};
use crate::uri::build_uri;

/// Placeholder bytes for file-shaped multipart parts
pub const PLACEHOLDER_FILE_CONTENT: &[u8] = b"Test content";

/// Request body, already materialized for one content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// JSON text (sent as `application/json` unless the declared type says otherwise)
    Json(String),
    /// `application/x-www-form-urlencoded` fields in declaration order
    Form(Vec<(String, String)>),
    /// `multipart/form-data` parts in declaration order
    Multipart(Vec<Part>),
    /// Caller-provided bytes with an explicit content type
    Raw {
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl Body {
    /// Text rendering for logs and reports. Binary parts are elided.
    #[must_use]
    pub fn preview(&self) -> String {
        match self {
            Self::Json(text) => text.clone(),
            Self::Form(fields) => fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&"),
            Self::Multipart(parts) => parts
                .iter()
                .map(|p| match &p.content {
                    PartContent::Text(t) => format!("{}={t:?}", p.name),
                    PartContent::File { bytes, .. } => {
                        format!("{}=<{} bytes>", p.name, bytes.len())
                    }
                })
                .collect::<Vec<_>>()
                .join("; "),
            Self::Raw {
                content_type,
                bytes,
            } => format!("<{} bytes of {content_type}>", bytes.len()),
        }
    }
}

/// One multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub content: PartContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContent {
    Text(String),
    File {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl Part {
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: PartContent::Text(value.into()),
        }
    }

    /// Placeholder upload named after the part.
    #[must_use]
    pub fn placeholder_file(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            content: PartContent::File {
                file_name: name.clone(),
                content_type: "application/octet-stream".to_string(),
                bytes: PLACEHOLDER_FILE_CONTENT.to_vec(),
            },
            name,
        }
    }
}

/// One assembled HTTP request. The URI is relative to the transport's base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    /// Declared content type the body was built for
    pub content_type: Option<String>,
    pub body: Option<Body>,
}

/// Builds one [`Request`] per operation, applying the installed hooks
#[derive(Debug, Clone, Default)]
pub struct RequestFactory {
    synthesizer: Synthesizer,
    content: ContentBuilder,
}

impl RequestFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parameter_hook(mut self, hook: ParameterValueHook) -> Self {
        self.synthesizer.set_hook(Some(hook));
        self
    }

    #[must_use]
    pub fn with_body_hook(mut self, hook: BodyHook) -> Self {
        self.content.set_hook(Some(hook));
        self
    }

    /// Assemble the request for `operation` under `path`.
    ///
    /// Only the first declared content type of the request body is used.
    #[must_use]
    pub fn build(&self, path: &str, operation: &Operation) -> Request {
        let uri = build_uri(path, operation, &self.synthesizer);

        let (content_type, body) = match operation.request_body.as_ref().and_then(|rb| rb.first())
        {
            Some((content_type, media_type)) => {
                let info = RequestContentInfo {
                    operation,
                    content_type,
                    media_type,
                    path,
                    method: operation.method,
                };
                (
                    Some(content_type.to_string()),
                    Some(self.content.build(&info, &self.synthesizer)),
                )
            }
            None => (None, None),
        };

        Request {
            method: operation.method,
            uri,
            content_type,
            body,
        }
    }
}
