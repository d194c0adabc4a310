//! webprobe-core: document model, value synthesis and request assembly
//!
//! This crate turns an API description into concrete HTTP requests without
//! hand-written fixtures. Sending them and judging the responses is the job
//! of `webprobe-runner`.

pub mod config;
pub mod content;
pub mod document;
pub mod loader;
pub mod request;
pub mod synth;
pub mod uri;

pub use config::{BodyOverride, Config, ConfigError};
pub use content::{BodyHook, ContentBuilder, ContentKind, RequestContentInfo};
pub use document::{
    Document, MediaType, Method, Operation, Parameter, ParameterLocation, PathItem, RequestBody,
    Schema, SchemaKind, SecurityRequirement, SpecVersion,
};
pub use loader::{DocumentSource, LoadError};
pub use request::{Body, Part, PartContent, Request, RequestFactory};
pub use synth::{ParameterValueHook, SynthesisContext, Synthesizer, ValueSite};
pub use uri::build_uri;
