//! Schema → placeholder literal synthesis
//!
//! Deterministic: the same schema and context always produce the same
//! string. Callers can install a [`ParameterValueHook`] that replaces the
//! type default for specific parameters or body properties.

use std::sync::Arc;

use crate::document::{Method, Operation, Schema, SchemaKind};

/// Placeholder for integer and number schemas
pub const DEFAULT_INTEGER: &str = "1";
/// Placeholder for everything that is not numeric or boolean
pub const DEFAULT_STRING: &str = "test";
/// Placeholder for boolean schemas
pub const DEFAULT_BOOLEAN: &str = "true";

/// Where a synthesized value will be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSite {
    /// Substituted into a `{name}` placeholder of the path template
    PathSegment,
    /// A urlencoded or multipart field
    FormField,
    /// A property of a JSON body (strings get enclosed in quotes)
    JsonProperty,
}

impl ValueSite {
    #[must_use]
    pub const fn encloses_strings(self) -> bool {
        matches!(self, Self::JsonProperty)
    }
}

/// Everything a [`ParameterValueHook`] can inspect
#[derive(Debug, Clone, Copy)]
pub struct SynthesisContext<'a> {
    pub path: &'a str,
    pub method: Method,
    pub operation: &'a Operation,
    pub parameter_name: &'a str,
    pub site: ValueSite,
    /// Schema being synthesized (array items once arrays are unwrapped)
    pub schema: &'a Schema,
}

impl<'a> SynthesisContext<'a> {
    #[must_use]
    pub fn with_schema(self, schema: &'a Schema) -> Self {
        Self { schema, ..self }
    }
}

/// Custom value for a parameter or property. `None` keeps the type default.
pub type ParameterValueHook = Arc<dyn Fn(&SynthesisContext<'_>) -> Option<String> + Send + Sync>;

/// Turns schema nodes into placeholder literals
#[derive(Clone, Default)]
pub struct Synthesizer {
    hook: Option<ParameterValueHook>,
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl Synthesizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_hook(mut self, hook: ParameterValueHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn set_hook(&mut self, hook: Option<ParameterValueHook>) {
        self.hook = hook;
    }

    /// Synthesize the literal for `ctx.schema`.
    ///
    /// Arrays yield the placeholder of a single element; JSON callers wrap it
    /// in brackets. An `int64` path segment is always `"1"`, even when a hook
    /// is installed. Everywhere else a hook value replaces the default.
    #[must_use]
    pub fn synthesize(&self, ctx: &SynthesisContext<'_>) -> String {
        let schema = ctx.schema;
        if let SchemaKind::Array(items) = &schema.kind {
            return self.synthesize(&ctx.with_schema(items));
        }

        if ctx.site == ValueSite::PathSegment && schema.is_int64() {
            return DEFAULT_INTEGER.to_string();
        }

        let value = self
            .override_for(ctx)
            .unwrap_or_else(|| default_for(schema).to_string());

        if ctx.site.encloses_strings() && schema.is_string_like() {
            enclose(&value)
        } else {
            value
        }
    }

    /// Value returned by the installed hook, if any.
    #[must_use]
    pub fn override_for(&self, ctx: &SynthesisContext<'_>) -> Option<String> {
        self.hook.as_ref().and_then(|hook| hook(ctx))
    }
}

/// Type default, before any hook is consulted.
#[must_use]
pub fn default_for(schema: &Schema) -> &'static str {
    match &schema.kind {
        SchemaKind::Integer | SchemaKind::Number => DEFAULT_INTEGER,
        SchemaKind::Boolean => DEFAULT_BOOLEAN,
        SchemaKind::Array(items) => default_for(items),
        _ => DEFAULT_STRING,
    }
}

/// JSON string literal for `value`.
fn enclose(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
