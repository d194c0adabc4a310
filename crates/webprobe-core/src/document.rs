//! API description model: paths, operations, parameters and schemas
//!
//! Produced once by [`crate::loader`] and read-only afterwards. All `$ref`s
//! are already resolved, so every [`Schema`] is a finite tree.

use std::fmt;

/// Description format the document was written in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecVersion {
    /// `swagger: "2.0"`
    Swagger2,
    /// `openapi: "3.x.y"` (version string as declared)
    OpenApi3(String),
}

/// A loaded API description
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub version: Option<SpecVersion>,
    pub title: Option<String>,
    /// Paths in declaration order
    pub paths: Vec<PathItem>,
}

impl Document {
    /// Iterate `(path, operation)` pairs in document order.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &Operation)> {
        self.paths
            .iter()
            .flat_map(|item| item.operations.iter().map(|op| (item.path.as_str(), op)))
    }

    /// Number of declared operations across all paths.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.paths.iter().map(|p| p.operations.len()).sum()
    }

    /// Number of operations that declare a security requirement.
    #[must_use]
    pub fn secured_operation_count(&self) -> usize {
        self.operations().filter(|(_, op)| op.is_secured()).count()
    }
}

/// One path template and the operations declared under it
#[derive(Debug, Clone, PartialEq)]
pub struct PathItem {
    pub path: String,
    /// Operations in declaration order
    pub operations: Vec<Operation>,
}

/// HTTP method of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl Method {
    /// Parse a path-item key (`get`, `post`, ...). Non-method keys yield `None`.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "put" => Some(Self::Put),
            "post" => Some(Self::Post),
            "delete" => Some(Self::Delete),
            "options" => Some(Self::Options),
            "head" => Some(Self::Head),
            "patch" => Some(Self::Patch),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A method-scoped endpoint definition
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub method: Method,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub security: Vec<SecurityRequirement>,
}

impl Operation {
    /// Bare operation with no parameters, body or security.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            operation_id: None,
            summary: None,
            description: None,
            parameters: Vec::new(),
            request_body: None,
            security: Vec::new(),
        }
    }

    /// An operation is secured when at least one requirement names a scheme.
    ///
    /// An empty requirement (`{}`) means anonymous access is allowed.
    #[must_use]
    pub fn is_secured(&self) -> bool {
        self.security.iter().any(|r| !r.schemes.is_empty())
    }

    /// Parameters located in the path template.
    pub fn path_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Path)
    }

    /// Human identifier: operationId, then summary, then description.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.operation_id
            .as_deref()
            .or(self.summary.as_deref())
            .or(self.description.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Schema,
}

/// Declared request body: content type → media type, in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestBody {
    pub required: bool,
    pub content: Vec<(String, MediaType)>,
}

impl RequestBody {
    /// First declared content type; the only one used when building requests.
    #[must_use]
    pub fn first(&self) -> Option<(&str, &MediaType)> {
        self.content.first().map(|(ct, mt)| (ct.as_str(), mt))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaType {
    pub schema: Option<Schema>,
}

/// Alternative set of schemes (with scopes) that together grant access
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityRequirement {
    pub schemes: Vec<(String, Vec<String>)>,
}

/// Type descriptor used to pick placeholder values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub kind: SchemaKind,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SchemaKind {
    String,
    Integer,
    Number,
    Boolean,
    /// Swagger 2.0 `type: file`
    File,
    Array(Box<Schema>),
    Object {
        /// Properties in declaration order
        properties: Vec<(String, Schema)>,
        required: Vec<String>,
    },
    #[default]
    Unknown,
}

impl Schema {
    #[must_use]
    pub fn new(kind: SchemaKind) -> Self {
        Self { kind, format: None }
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn string() -> Self {
        Self::new(SchemaKind::String)
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::new(SchemaKind::Integer)
    }

    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self::new(SchemaKind::Array(Box::new(items)))
    }

    #[must_use]
    pub fn object(properties: Vec<(String, Schema)>, required: Vec<String>) -> Self {
        Self::new(SchemaKind::Object {
            properties,
            required,
        })
    }

    #[must_use]
    pub fn is_int64(&self) -> bool {
        self.format.as_deref() == Some("int64")
    }

    /// Strings, files and untyped nodes are rendered as JSON strings.
    #[must_use]
    pub fn is_string_like(&self) -> bool {
        matches!(
            self.kind,
            SchemaKind::String | SchemaKind::File | SchemaKind::Unknown
        )
    }

    /// Binary upload: `format: binary` or Swagger 2.0 `type: file`
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self.kind, SchemaKind::File) || self.format.as_deref() == Some("binary")
    }

    /// Look up a property schema by name (objects only).
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Schema> {
        match &self.kind {
            SchemaKind::Object { properties, .. } => properties
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, s)| s),
            _ => None,
        }
    }
}
