//! API description loading: OpenAPI 3.x and Swagger 2.0, JSON or YAML
//!
//! Produces a [`Document`] with every local `$ref` resolved. Structural
//! problems are collected and reported together; a self-referencing schema
//! is rejected outright.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::document::{
    Document, MediaType, Method, Operation, Parameter, ParameterLocation, PathItem, RequestBody,
    Schema, SchemaKind, SecurityRequirement, SpecVersion,
};

/// Where the API description comes from
pub enum DocumentSource {
    /// File on disk, opened and closed by the loader
    Path(PathBuf),
    /// Already-open stream, read to the end by the loader
    Reader(Box<dyn Read + Send>),
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// Serialization of the description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    /// Leading `{` → JSON, otherwise YAML
    Detect,
}

impl Format {
    /// Pick the format from the file extension, falling back to content sniffing.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Self::Yaml,
            "json" => Self::Json,
            _ => Self::Detect,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("API description '{}' does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },
    #[error("Parse error: {0}")]
    Syntax(String),
    #[error("Unsupported description version: {0}")]
    UnsupportedVersion(String),
    #[error("Could not read API description:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
    #[error("Cyclic schema reference: {0}")]
    CyclicSchema(String),
}

/// Load from either kind of source.
///
/// # Errors
///
/// See [`LoadError`]; a missing file is reported before anything is read.
pub fn load(source: DocumentSource) -> Result<Document, LoadError> {
    match source {
        DocumentSource::Path(path) => load_path(&path),
        DocumentSource::Reader(mut reader) => load_reader(&mut reader),
    }
}

/// Load a description file.
///
/// # Errors
///
/// Returns [`LoadError::NotFound`] when the file does not exist.
pub fn load_path(path: &Path) -> Result<Document, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "read API description");
    parse_str(&content, Format::from_path(path))
}

/// Load from an open stream. The format is sniffed from the content.
///
/// # Errors
///
/// Returns [`LoadError::Io`] when the stream cannot be read.
pub fn load_reader(reader: &mut dyn Read) -> Result<Document, LoadError> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| LoadError::Io {
            path: "<stream>".to_string(),
            message: e.to_string(),
        })?;
    parse_str(&content, Format::Detect)
}

/// Parse description text.
///
/// # Errors
///
/// Returns [`LoadError::Syntax`] for text that is neither JSON nor YAML, and
/// the structural errors of [`from_value`].
pub fn parse_str(content: &str, format: Format) -> Result<Document, LoadError> {
    let format = match format {
        Format::Detect if content.trim_start().starts_with('{') => Format::Json,
        Format::Detect => Format::Yaml,
        other => other,
    };
    let raw: Value = match format {
        Format::Json => serde_json::from_str(content)
            .map_err(|e| LoadError::Syntax(format!("Invalid JSON: {e}")))?,
        _ => serde_yml::from_str(content)
            .map_err(|e| LoadError::Syntax(format!("Invalid YAML: {e}")))?,
    };
    from_value(&raw)
}

/// Build a [`Document`] from an already-parsed tree.
///
/// # Errors
///
/// Returns [`LoadError::UnsupportedVersion`] unless the root declares
/// `swagger: "2.0"` or `openapi: "3.x"`, [`LoadError::CyclicSchema`] for
/// self-referencing schemas and [`LoadError::Invalid`] for everything else.
pub fn from_value(raw: &Value) -> Result<Document, LoadError> {
    let Some(root) = raw.as_object() else {
        return Err(LoadError::Invalid(vec![
            "document root must be an object".to_string(),
        ]));
    };
    let version = detect_version(root)?;

    let mut extractor = Extractor {
        root: raw,
        version: version.clone(),
        errors: Vec::new(),
    };
    let paths = extractor.paths(root)?;

    if !extractor.errors.is_empty() {
        return Err(LoadError::Invalid(extractor.errors));
    }

    let document = Document {
        version: Some(version),
        title: root
            .get("info")
            .and_then(|i| i.get("title"))
            .and_then(Value::as_str)
            .map(String::from),
        paths,
    };
    tracing::debug!(
        paths = document.paths.len(),
        operations = document.operation_count(),
        secured = document.secured_operation_count(),
        "loaded API description"
    );
    Ok(document)
}

fn detect_version(root: &Map<String, Value>) -> Result<SpecVersion, LoadError> {
    if let Some(v) = root.get("swagger") {
        let declared = version_string(v);
        return if declared == "2.0" {
            Ok(SpecVersion::Swagger2)
        } else {
            Err(LoadError::UnsupportedVersion(format!("swagger {declared}")))
        };
    }
    if let Some(v) = root.get("openapi") {
        let declared = version_string(v);
        return if declared.starts_with("3.") {
            Ok(SpecVersion::OpenApi3(declared))
        } else {
            Err(LoadError::UnsupportedVersion(format!("openapi {declared}")))
        };
    }
    Err(LoadError::UnsupportedVersion(
        "no `openapi` or `swagger` field".to_string(),
    ))
}

/// YAML may give an unquoted `2.0` as a number.
fn version_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parameter before Swagger 2.0 body/formData normalization
#[derive(Clone)]
enum RawParam {
    Regular(Parameter),
    Body { schema: Schema, required: bool },
    FormData { schema: Schema, required: bool },
}

#[derive(Clone)]
struct ParamEntry {
    name: String,
    location: String,
    param: RawParam,
}

struct Extractor<'a> {
    root: &'a Value,
    version: SpecVersion,
    errors: Vec<String>,
}

impl<'a> Extractor<'a> {
    fn is_swagger2(&self) -> bool {
        self.version == SpecVersion::Swagger2
    }

    fn paths(&mut self, root: &'a Map<String, Value>) -> Result<Vec<PathItem>, LoadError> {
        let paths = match root.get("paths") {
            Some(Value::Object(paths)) => paths,
            Some(_) => {
                self.errors.push("paths: must be an object".to_string());
                return Ok(Vec::new());
            }
            // 3.1 allows webhook-only documents
            None if matches!(&self.version, SpecVersion::OpenApi3(v) if v.starts_with("3.1")) => {
                return Ok(Vec::new());
            }
            None => {
                self.errors
                    .push("paths: required field is missing".to_string());
                return Ok(Vec::new());
            }
        };

        let mut items = Vec::new();
        for (path, item) in paths {
            let item = match self.deref(item) {
                Ok(v) => v,
                Err(e) => {
                    self.errors.push(format!("paths.{path}: {e}"));
                    continue;
                }
            };
            let Some(item) = item.as_object() else {
                self.errors
                    .push(format!("paths.{path}: path item must be an object"));
                continue;
            };

            let shared = self.parameters(item.get("parameters"), &format!("paths.{path}"))?;
            let mut operations = Vec::new();
            for (key, op) in item {
                let Some(method) = Method::from_key(key) else {
                    continue;
                };
                let location = format!("paths.{path}.{key}");
                let Some(op) = op.as_object() else {
                    self.errors
                        .push(format!("{location}: operation must be an object"));
                    continue;
                };
                operations.push(self.operation(method, op, &shared, &location)?);
            }
            items.push(PathItem {
                path: path.clone(),
                operations,
            });
        }
        Ok(items)
    }

    fn operation(
        &mut self,
        method: Method,
        obj: &'a Map<String, Value>,
        shared: &[ParamEntry],
        location: &str,
    ) -> Result<Operation, LoadError> {
        let own = self.parameters(obj.get("parameters"), location)?;
        let mut merged: Vec<ParamEntry> = shared
            .iter()
            .filter(|s| {
                !own.iter()
                    .any(|o| o.name == s.name && o.location == s.location)
            })
            .cloned()
            .collect();
        merged.extend(own);

        let mut op = Operation::new(method);
        op.operation_id = string_field(obj, "operationId");
        op.summary = string_field(obj, "summary");
        op.description = string_field(obj, "description");

        let mut body = None;
        let mut form_fields = Vec::new();
        for entry in merged {
            match entry.param {
                RawParam::Regular(p) => op.parameters.push(p),
                RawParam::Body { schema, required } => body = Some((schema, required)),
                RawParam::FormData { schema, required } => {
                    form_fields.push((entry.name, schema, required));
                }
            }
        }

        op.request_body = if self.is_swagger2() {
            self.swagger_body(obj, body, form_fields)
        } else {
            self.request_body(obj.get("requestBody"), location)?
        };

        let security = obj.get("security").or_else(|| self.root.get("security"));
        op.security = self.security(security, location);
        Ok(op)
    }

    fn parameters(
        &mut self,
        value: Option<&'a Value>,
        location: &str,
    ) -> Result<Vec<ParamEntry>, LoadError> {
        let Some(value) = value else {
            return Ok(Vec::new());
        };
        let Some(list) = value.as_array() else {
            self.errors
                .push(format!("{location}.parameters: must be an array"));
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for (idx, raw) in list.iter().enumerate() {
            let at = format!("{location}.parameters[{idx}]");
            let raw = match self.deref(raw) {
                Ok(v) => v,
                Err(e) => {
                    self.errors.push(format!("{at}: {e}"));
                    continue;
                }
            };
            let name = raw.get("name").and_then(Value::as_str);
            let located = raw.get("in").and_then(Value::as_str);
            let (Some(name), Some(located)) = (name, located) else {
                self.errors
                    .push(format!("{at}: parameter requires `name` and `in`"));
                continue;
            };
            let required = raw
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(located == "path");

            let param = match located {
                "body" if self.is_swagger2() => RawParam::Body {
                    schema: self.optional_schema(raw.get("schema"))?,
                    required,
                },
                "formData" if self.is_swagger2() => RawParam::FormData {
                    // 2.0 declares non-body types inline on the parameter
                    schema: self.schema(raw, &mut Vec::new())?,
                    required,
                },
                other => {
                    let Some(param_location) = ParameterLocation::from_key(other) else {
                        self.errors
                            .push(format!("{at}: unknown parameter location `{other}`"));
                        continue;
                    };
                    let schema = if self.is_swagger2() {
                        self.schema(raw, &mut Vec::new())?
                    } else {
                        self.parameter_schema(raw)?
                    };
                    RawParam::Regular(Parameter {
                        name: name.to_string(),
                        location: param_location,
                        required,
                        schema,
                    })
                }
            };
            entries.push(ParamEntry {
                name: name.to_string(),
                location: located.to_string(),
                param,
            });
        }
        Ok(entries)
    }

    /// 3.x parameter schema: `schema`, else the first `content` schema, else string.
    fn parameter_schema(&mut self, raw: &'a Value) -> Result<Schema, LoadError> {
        if let Some(schema) = raw.get("schema") {
            return self.schema(schema, &mut Vec::new());
        }
        let from_content = raw
            .get("content")
            .and_then(Value::as_object)
            .and_then(|c| c.values().next())
            .and_then(|m| m.get("schema"));
        match from_content {
            Some(schema) => self.schema(schema, &mut Vec::new()),
            None => Ok(Schema::string()),
        }
    }

    fn request_body(
        &mut self,
        value: Option<&'a Value>,
        location: &str,
    ) -> Result<Option<RequestBody>, LoadError> {
        let Some(value) = value else {
            return Ok(None);
        };
        let value = match self.deref(value) {
            Ok(v) => v,
            Err(e) => {
                self.errors.push(format!("{location}.requestBody: {e}"));
                return Ok(None);
            }
        };
        let Some(content) = value.get("content").and_then(Value::as_object) else {
            self.errors
                .push(format!("{location}.requestBody: `content` must be an object"));
            return Ok(None);
        };

        let mut media_types = Vec::new();
        for (content_type, media) in content {
            let schema = self.optional_schema(media.get("schema"))?;
            media_types.push((
                content_type.clone(),
                MediaType {
                    schema: media.get("schema").map(|_| schema),
                },
            ));
        }
        Ok(Some(RequestBody {
            required: value
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            content: media_types,
        }))
    }

    /// Swagger 2.0: `in: body` and `in: formData` become a request body.
    fn swagger_body(
        &self,
        obj: &'a Map<String, Value>,
        body: Option<(Schema, bool)>,
        form_fields: Vec<(String, Schema, bool)>,
    ) -> Option<RequestBody> {
        let consumes: Vec<String> = obj
            .get("consumes")
            .or_else(|| self.root.get("consumes"))
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        if let Some((schema, required)) = body {
            let content_types = if consumes.is_empty() {
                vec![crate::content::CONTENT_TYPE_JSON.to_string()]
            } else {
                consumes
            };
            return Some(RequestBody {
                required,
                content: content_types
                    .into_iter()
                    .map(|ct| {
                        (
                            ct,
                            MediaType {
                                schema: Some(schema.clone()),
                            },
                        )
                    })
                    .collect(),
            });
        }

        if form_fields.is_empty() {
            return None;
        }
        let has_file = form_fields.iter().any(|(_, s, _)| s.is_binary());
        let declares = |ct: &str| consumes.iter().any(|c| c.eq_ignore_ascii_case(ct));
        let content_type = if has_file || declares(crate::content::CONTENT_TYPE_MULTIPART) {
            crate::content::CONTENT_TYPE_MULTIPART
        } else {
            crate::content::CONTENT_TYPE_FORM
        };

        let required_any = form_fields.iter().any(|(_, _, r)| *r);
        let required: Vec<String> = form_fields
            .iter()
            .filter(|(_, _, r)| *r)
            .map(|(n, _, _)| n.clone())
            .collect();
        let properties = form_fields
            .into_iter()
            .map(|(name, schema, _)| (name, schema))
            .collect();
        Some(RequestBody {
            required: required_any,
            content: vec![(
                content_type.to_string(),
                MediaType {
                    schema: Some(Schema::object(properties, required)),
                },
            )],
        })
    }

    fn security(
        &mut self,
        value: Option<&'a Value>,
        location: &str,
    ) -> Vec<SecurityRequirement> {
        let Some(value) = value else {
            return Vec::new();
        };
        let Some(list) = value.as_array() else {
            self.errors
                .push(format!("{location}.security: must be an array"));
            return Vec::new();
        };
        list.iter()
            .filter_map(Value::as_object)
            .map(|req| SecurityRequirement {
                schemes: req
                    .iter()
                    .map(|(scheme, scopes)| {
                        let scopes: Vec<String> = scopes
                            .as_array()
                            .map(|s| s.iter().filter_map(Value::as_str).map(String::from).collect())
                            .unwrap_or_default();
                        (scheme.clone(), scopes)
                    })
                    .collect(),
            })
            .collect()
    }

    fn optional_schema(&mut self, value: Option<&'a Value>) -> Result<Schema, LoadError> {
        match value {
            Some(v) => self.schema(v, &mut Vec::new()),
            None => Ok(Schema::default()),
        }
    }

    /// Resolve a schema node into a finite [`Schema`] tree.
    ///
    /// `stack` holds the references currently being expanded; meeting one of
    /// them again is a cycle.
    fn schema(&mut self, value: &'a Value, stack: &mut Vec<String>) -> Result<Schema, LoadError> {
        if let Some(reference) = value.get("$ref").and_then(Value::as_str) {
            if stack.iter().any(|r| r == reference) {
                return Err(LoadError::CyclicSchema(reference.to_string()));
            }
            let Some(target) = self.lookup(reference) else {
                self.errors
                    .push(format!("unresolved reference `{reference}`"));
                return Ok(Schema::default());
            };
            stack.push(reference.to_string());
            let resolved = self.schema(target, stack);
            stack.pop();
            return resolved;
        }

        let Some(obj) = value.as_object() else {
            return Ok(Schema::default());
        };

        if let Some(parts) = obj.get("allOf").and_then(Value::as_array) {
            let mut properties = Vec::new();
            let mut required = Vec::new();
            for part in parts {
                let merged = self.schema(part, stack)?;
                if let SchemaKind::Object {
                    properties: p,
                    required: r,
                } = merged.kind
                {
                    merge_object(&mut properties, &mut required, p, r);
                }
            }
            if let SchemaKind::Object {
                properties: p,
                required: r,
            } = self.object_kind(obj, stack)?
            {
                merge_object(&mut properties, &mut required, p, r);
            }
            return Ok(Schema::object(properties, required));
        }

        for key in ["oneOf", "anyOf"] {
            if let Some(variants) = obj.get(key).and_then(Value::as_array) {
                return match variants.iter().find(|v| type_name(v) != Some("null")) {
                    Some(variant) => self.schema(variant, stack),
                    None => Ok(Schema::default()),
                };
            }
        }

        let kind = match type_name(value) {
            Some("string") => SchemaKind::String,
            Some("integer") => SchemaKind::Integer,
            Some("number") => SchemaKind::Number,
            Some("boolean") => SchemaKind::Boolean,
            Some("file") => SchemaKind::File,
            Some("array") => self.array_kind(obj, stack)?,
            Some("object") => self.object_kind(obj, stack)?,
            _ if obj.contains_key("properties") => self.object_kind(obj, stack)?,
            _ if obj.contains_key("items") => self.array_kind(obj, stack)?,
            _ => SchemaKind::Unknown,
        };
        Ok(Schema {
            kind,
            format: string_field(obj, "format"),
        })
    }

    fn array_kind(
        &mut self,
        obj: &'a Map<String, Value>,
        stack: &mut Vec<String>,
    ) -> Result<SchemaKind, LoadError> {
        let items = match obj.get("items") {
            Some(items) => self.schema(items, stack)?,
            None => Schema::default(),
        };
        Ok(SchemaKind::Array(Box::new(items)))
    }

    fn object_kind(
        &mut self,
        obj: &'a Map<String, Value>,
        stack: &mut Vec<String>,
    ) -> Result<SchemaKind, LoadError> {
        let mut properties = Vec::new();
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                properties.push((name.clone(), self.schema(prop, stack)?));
            }
        }
        let required = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(SchemaKind::Object {
            properties,
            required,
        })
    }

    /// Follow a chain of `$ref`s on a parameter, path item or request body.
    fn deref(&self, value: &'a Value) -> Result<&'a Value, String> {
        let mut current = value;
        let mut seen: Vec<&str> = Vec::new();
        while let Some(reference) = current.get("$ref").and_then(Value::as_str) {
            if seen.contains(&reference) {
                return Err(format!("cyclic reference `{reference}`"));
            }
            seen.push(reference);
            current = self
                .lookup(reference)
                .ok_or_else(|| format!("unresolved reference `{reference}`"))?;
        }
        Ok(current)
    }

    /// Local JSON-pointer references only (`#/...`).
    fn lookup(&self, reference: &str) -> Option<&'a Value> {
        reference
            .strip_prefix('#')
            .and_then(|pointer| self.root.pointer(pointer))
    }
}

/// `type` as a single name; 3.1 type arrays give their first non-null entry.
fn type_name(value: &Value) -> Option<&str> {
    match value.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

fn merge_object(
    properties: &mut Vec<(String, Schema)>,
    required: &mut Vec<String>,
    more_properties: Vec<(String, Schema)>,
    more_required: Vec<String>,
) {
    for (name, schema) in more_properties {
        match properties.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = schema,
            None => properties.push((name, schema)),
        }
    }
    for name in more_required {
        if !required.contains(&name) {
            required.push(name);
        }
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(String::from)
}
