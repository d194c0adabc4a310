//! Project configuration for endpoint checks

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::content::{BodyHook, ContentKind, RequestContentInfo};
use crate::request::Body;
use crate::synth::{ParameterValueHook, SynthesisContext};

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API description path (OpenAPI 3.x or Swagger 2.0, JSON or YAML)
    pub spec: PathBuf,

    /// Base URL of the server to test
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// HTTP headers sent by the full traversal (auth, API keys, ...).
    /// Never sent by the authentication check.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Parameter or body property name → literal value
    #[serde(default)]
    pub values: HashMap<String, String>,

    /// Verbatim request bodies for specific operations
    #[serde(default)]
    pub bodies: Vec<BodyOverride>,
}

/// A verbatim request body for one operation.
///
/// ```toml
/// [[bodies]]
/// operation = "POST /pet"
/// body = '{"name": "rex", "photoUrls": []}'
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyOverride {
    /// Operation to match, e.g. "POST /pet", "PUT /pet/{petId}"
    pub operation: String,

    /// Only apply to this declared content type (any when absent)
    #[serde(default)]
    pub content_type: Option<String>,

    /// Body text, sent as-is
    pub body: String,
}

impl BodyOverride {
    /// Check if this override matches the given operation label (e.g. "POST /pet").
    pub fn matches_operation(&self, method: &str, path: &str) -> bool {
        let label = format!("{method} {path}");
        self.operation == label
    }

    fn matches(&self, info: &RequestContentInfo<'_>) -> bool {
        self.matches_operation(info.method.as_str(), info.path)
            && self
                .content_type
                .as_deref()
                .is_none_or(|ct| ct.eq_ignore_ascii_case(info.content_type))
    }
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: PathBuf::from("openapi.yaml"),
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: default_timeout_secs(),
            headers: HashMap::new(),
            values: HashMap::new(),
            bodies: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.webprobe.toml)
    ///
    /// # Errors
    ///
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".webprobe.toml", ".webprobe.json", "webprobe.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        // No config file, return default
        Ok(Self::default())
    }

    /// Hook serving `values` by parameter name, if any are configured.
    #[must_use]
    pub fn parameter_hook(&self) -> Option<ParameterValueHook> {
        if self.values.is_empty() {
            return None;
        }
        let values = self.values.clone();
        Some(Arc::new(move |ctx: &SynthesisContext<'_>| {
            values.get(ctx.parameter_name).cloned()
        }))
    }

    /// Hook serving `bodies` by operation label, if any are configured.
    #[must_use]
    pub fn body_hook(&self) -> Option<BodyHook> {
        if self.bodies.is_empty() {
            return None;
        }
        let bodies = self.bodies.clone();
        Some(Arc::new(move |info: &RequestContentInfo<'_>| {
            let matched = bodies.iter().find(|b| b.matches(info))?;
            Some(match ContentKind::of(info.content_type) {
                ContentKind::Json => Body::Json(matched.body.clone()),
                ContentKind::Multipart | ContentKind::UrlEncoded | ContentKind::Other => Body::Raw {
                    content_type: info.content_type.to_string(),
                    bytes: matched.body.clone().into_bytes(),
                },
            })
        }))
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# webprobe configuration

# API description (OpenAPI 3.x or Swagger 2.0, JSON or YAML)
spec = "openapi.yaml"

# Server to test
base_url = "http://localhost:8080"

# Per-request timeout in seconds
timeout_secs = 10

# HTTP headers for `webprobe traverse` (never sent by `webprobe auth`)
[headers]
Authorization = "Bearer your-token-here"
# X-API-Key = "your-api-key"

# Values for path parameters and body properties, by name
[values]
petId = "1"
# username = "alice"

# Verbatim request bodies
# [[bodies]]
# operation = "POST /pet"
# content_type = "application/json"
# body = '{"name": "rex", "photoUrls": []}'
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {message}", path = .0.display(), message = .1)]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MediaType, Method, Operation, Schema};
    use crate::synth::ValueSite;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.spec, PathBuf::from("openapi.yaml"));
        assert_eq!(config.timeout_secs, 10);
        assert!(config.parameter_hook().is_none());
        assert!(config.body_hook().is_none());
    }

    #[test]
    fn parse_toml() {
        let toml = r#"
spec = "api.yaml"
base_url = "http://localhost:3000"

[headers]
Authorization = "Bearer token123"

[values]
petId = "42"

[[bodies]]
operation = "POST /pet"
body = '{"name": "rex"}'
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.spec, PathBuf::from("api.yaml"));
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(
            config.headers.get("Authorization"),
            Some(&"Bearer token123".to_string())
        );
        assert_eq!(config.values.get("petId"), Some(&"42".to_string()));
        assert_eq!(config.bodies.len(), 1);
        assert!(config.bodies[0].content_type.is_none());
    }

    #[test]
    fn example_config_parses() {
        let config: Config = toml::from_str(Config::example()).unwrap();
        assert_eq!(config.spec, PathBuf::from("openapi.yaml"));
        assert_eq!(config.values.get("petId"), Some(&"1".to_string()));
    }

    #[test]
    fn load_json_and_toml_files() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("webprobe.json");
        std::fs::write(
            &json_path,
            r#"{"spec": "a.json", "base_url": "http://x", "timeout_secs": 3}"#,
        )
        .unwrap();
        let config = Config::load(&json_path).unwrap();
        assert_eq!(config.timeout_secs, 3);

        let toml_path = dir.path().join("webprobe.toml");
        std::fs::write(&toml_path, "spec = 'b.yaml'\nbase_url = 'http://y'\n").unwrap();
        let config = Config::load(&toml_path).unwrap();
        assert_eq!(config.base_url, "http://y");

        let missing = dir.path().join("missing.toml");
        let err = Config::load(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
        assert!(
            err.to_string()
                .starts_with(&format!("Cannot read {}: ", missing.display()))
        );
    }

    #[test]
    fn parameter_hook_serves_values_by_name() {
        let mut config = Config::default();
        config.values.insert("petId".into(), "7".into());
        let hook = config.parameter_hook().unwrap();

        let op = Operation::new(Method::Get);
        let schema = Schema::integer();
        let mut ctx = SynthesisContext {
            path: "/pet/{petId}",
            method: Method::Get,
            operation: &op,
            parameter_name: "petId",
            site: ValueSite::PathSegment,
            schema: &schema,
        };
        assert_eq!(hook(&ctx), Some("7".to_string()));

        ctx.parameter_name = "other";
        assert_eq!(hook(&ctx), None);
    }

    #[test]
    fn body_hook_matches_operation_and_content_type() {
        let mut config = Config::default();
        config.bodies.push(BodyOverride {
            operation: "POST /pet".into(),
            content_type: None,
            body: r#"{"name": "rex"}"#.into(),
        });
        config.bodies.push(BodyOverride {
            operation: "PUT /pet".into(),
            content_type: Some("application/xml".into()),
            body: "<pet/>".into(),
        });
        let hook = config.body_hook().unwrap();

        let op = Operation::new(Method::Post);
        let media = MediaType::default();
        let mut info = RequestContentInfo {
            operation: &op,
            content_type: "application/json",
            media_type: &media,
            path: "/pet",
            method: Method::Post,
        };
        assert_eq!(hook(&info), Some(Body::Json(r#"{"name": "rex"}"#.into())));

        info.method = Method::Put;
        assert_eq!(hook(&info), None);

        info.content_type = "application/xml";
        assert_eq!(
            hook(&info),
            Some(Body::Raw {
                content_type: "application/xml".into(),
                bytes: b"<pet/>".to_vec(),
            })
        );
    }

    #[test]
    fn body_override_matches_operation() {
        let body = BodyOverride {
            operation: "POST /orders".into(),
            content_type: None,
            body: "{}".into(),
        };

        assert!(body.matches_operation("POST", "/orders"));
        assert!(!body.matches_operation("GET", "/orders"));
        assert!(!body.matches_operation("POST", "/users"));
    }
}
