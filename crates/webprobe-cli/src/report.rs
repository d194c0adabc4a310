//! Traversal results and their terminal / JSON rendering

use std::collections::BTreeMap;

use serde::Serialize;

use webprobe_runner::{EndpointInformation, Response, VerificationFailure};

/// One exercised endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointResult {
    pub method: String,
    pub path: String,
    pub uri: String,
    pub operation: String,
    pub status: u16,
}

impl EndpointResult {
    pub fn new(endpoint: &EndpointInformation<'_>, response: &Response) -> Self {
        Self {
            method: endpoint.method.to_string(),
            path: endpoint.path.to_string(),
            uri: endpoint.uri.to_string(),
            operation: endpoint.label(),
            status: response.status,
        }
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn line(&self) -> String {
        format!(
            "{:<6} {} -> {} ({})",
            self.method, self.uri, self.status, self.operation
        )
    }
}

/// Status code → number of responses
pub fn status_distribution(results: &[EndpointResult]) -> BTreeMap<u16, u64> {
    let mut dist = BTreeMap::new();
    for r in results {
        *dist.entry(r.status).or_insert(0) += 1;
    }
    dist
}

pub fn format_distribution(dist: &BTreeMap<u16, u64>) -> String {
    dist.iter()
        .map(|(code, count)| format!("{code}x{count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn traverse_json(results: &[EndpointResult], exit_code: i32) -> serde_json::Value {
    serde_json::json!({
        "command": "traverse",
        "exit_code": exit_code,
        "requests": results.len(),
        "server_errors": results.iter().filter(|r| r.is_server_error()).count(),
        "status_distribution": status_distribution(results),
        "endpoints": results,
    })
}

/// `requests` is only known for a passing check.
pub fn auth_json(
    requests: Option<usize>,
    failure: Option<&VerificationFailure>,
    exit_code: i32,
) -> serde_json::Value {
    serde_json::json!({
        "command": "auth",
        "status": if failure.is_some() { "fail" } else { "pass" },
        "exit_code": exit_code,
        "requests": requests,
        "failure": failure.map(|f| serde_json::json!({
            "method": f.method.to_string(),
            "uri": f.uri,
            "operation": f.operation,
            "status": f.status,
        })),
    })
}
