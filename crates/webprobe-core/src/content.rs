//! Request body materialization, dispatched by declared content type
//!
//! Best-effort: building a body never fails. Unknown content types and
//! missing schemas fall back to JSON.

use std::sync::Arc;

use crate::document::{MediaType, Method, Operation, Schema, SchemaKind};
use crate::request::{Body, Part};
use crate::synth::{SynthesisContext, Synthesizer, ValueSite};

pub const CONTENT_TYPE_MULTIPART: &str = "multipart/form-data";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Property name treated as an upload even when its schema says otherwise
const FILE_PROPERTY: &str = "file";

/// Everything a [`BodyHook`] can inspect
#[derive(Debug, Clone, Copy)]
pub struct RequestContentInfo<'a> {
    pub operation: &'a Operation,
    pub content_type: &'a str,
    pub media_type: &'a MediaType,
    pub path: &'a str,
    pub method: Method,
}

/// Verbatim body for an operation. `None` falls back to synthesis.
pub type BodyHook = Arc<dyn Fn(&RequestContentInfo<'_>) -> Option<Body> + Send + Sync>;

/// Body encoding chosen from the declared content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Multipart,
    UrlEncoded,
    /// `application/json` or any `+json` suffix
    Json,
    /// Anything else (`application/xml`, `text/plain`, ...)
    Other,
}

impl ContentKind {
    /// Classify a content type, ignoring case and parameters (`; charset=...`).
    #[must_use]
    pub fn of(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            CONTENT_TYPE_MULTIPART => Self::Multipart,
            CONTENT_TYPE_FORM => Self::UrlEncoded,
            CONTENT_TYPE_JSON => Self::Json,
            other if other.ends_with("+json") => Self::Json,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Default)]
pub struct ContentBuilder {
    hook: Option<BodyHook>,
}

impl std::fmt::Debug for ContentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentBuilder")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl ContentBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_hook(mut self, hook: BodyHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn set_hook(&mut self, hook: Option<BodyHook>) {
        self.hook = hook;
    }

    /// Build the body for one declared content type.
    #[must_use]
    pub fn build(&self, info: &RequestContentInfo<'_>, synthesizer: &Synthesizer) -> Body {
        if let Some(body) = self.hook.as_ref().and_then(|hook| hook(info)) {
            return body;
        }

        let Some(schema) = info.media_type.schema.as_ref() else {
            return Body::Json("{}".to_string());
        };

        let writer = BodyWriter {
            info,
            synthesizer,
        };
        match ContentKind::of(info.content_type) {
            ContentKind::Multipart => Body::Multipart(writer.multipart(schema)),
            ContentKind::UrlEncoded => Body::Form(writer.form(schema)),
            // Synthesis only speaks JSON
            ContentKind::Json | ContentKind::Other => Body::Json(writer.json(schema, "")),
        }
    }
}

struct BodyWriter<'a> {
    info: &'a RequestContentInfo<'a>,
    synthesizer: &'a Synthesizer,
}

impl<'a> BodyWriter<'a> {
    fn context(&self, name: &'a str, schema: &'a Schema, site: ValueSite) -> SynthesisContext<'a> {
        SynthesisContext {
            path: self.info.path,
            method: self.info.method,
            operation: self.info.operation,
            parameter_name: name,
            site,
            schema,
        }
    }

    fn multipart(&self, schema: &Schema) -> Vec<Part> {
        properties(schema)
            .iter()
            .map(|(name, prop)| {
                if prop.is_binary() || name == FILE_PROPERTY {
                    Part::placeholder_file(name.as_str())
                } else {
                    Part::text(name.as_str(), String::new())
                }
            })
            .collect()
    }

    fn form(&self, schema: &'a Schema) -> Vec<(String, String)> {
        properties(schema)
            .iter()
            .map(|(name, prop)| {
                let ctx = self.context(name, prop, ValueSite::FormField);
                (name.clone(), self.synthesizer.synthesize(&ctx))
            })
            .collect()
    }

    /// JSON literal for `schema`. Objects keep required properties only.
    fn json(&self, schema: &'a Schema, name: &'a str) -> String {
        match &schema.kind {
            SchemaKind::Array(items) => format!("[{}]", self.json(items, name)),
            SchemaKind::Object {
                properties,
                required,
            } => {
                if !name.is_empty() {
                    let ctx = self.context(name, schema, ValueSite::JsonProperty);
                    if let Some(value) = self.synthesizer.override_for(&ctx) {
                        return value;
                    }
                }
                let members: Vec<String> = required
                    .iter()
                    .filter_map(|req| {
                        properties
                            .iter()
                            .find(|(prop_name, _)| prop_name == req)
                            .map(|(prop_name, prop)| {
                                format!("\"{prop_name}\": {}", self.json(prop, prop_name))
                            })
                    })
                    .collect();
                format!("{{{}}}", members.join(", "))
            }
            _ => {
                let ctx = self.context(name, schema, ValueSite::JsonProperty);
                self.synthesizer.synthesize(&ctx)
            }
        }
    }
}

/// Declared properties of an object schema; empty for anything else.
fn properties(schema: &Schema) -> &[(String, Schema)] {
    match &schema.kind {
        SchemaKind::Object { properties, .. } => properties,
        _ => &[],
    }
}
