//! Sequential endpoint invoker
//!
//! Walks the document in declaration order and sends one request per
//! selected operation. Each response is handed to the caller before the
//! next request is built, so at most one request is ever in flight.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use webprobe_core::{Document, Method, Operation, RequestFactory};

use crate::error::ExerciseError;
use crate::transport::{Response, Transport};

/// The operation a response belongs to
#[derive(Debug, Clone, Copy)]
pub struct EndpointInformation<'a> {
    /// Path template as declared
    pub path: &'a str,
    pub method: Method,
    pub operation: &'a Operation,
    /// Resolved request URI
    pub uri: &'a str,
}

impl EndpointInformation<'_> {
    /// operationId, summary or description; falls back to "METHOD path".
    #[must_use]
    pub fn label(&self) -> String {
        self.operation
            .label()
            .map_or_else(|| format!("{} {}", self.method, self.path), String::from)
    }
}

/// Send one request per operation accepted by `filter`.
///
/// Returns the number of requests sent. An error from `per_operation` stops
/// the walk and is returned as-is.
///
/// # Errors
///
/// Returns [`ExerciseError::Cancelled`] if `cancel` fires before a send,
/// transport failures, and whatever `per_operation` returns.
pub async fn invoke<T, F, P>(
    transport: &T,
    document: &Document,
    factory: &RequestFactory,
    mut filter: F,
    mut per_operation: P,
    cancel: &CancellationToken,
) -> Result<usize, ExerciseError>
where
    T: Transport + ?Sized,
    F: FnMut(&Operation) -> bool,
    P: FnMut(&EndpointInformation<'_>, &Response) -> Result<(), ExerciseError>,
{
    if cancel.is_cancelled() {
        return Err(ExerciseError::Cancelled);
    }

    let mut sent = 0;
    for (path, operation) in document.operations() {
        if !filter(operation) {
            continue;
        }

        let request = factory.build(path, operation);
        if cancel.is_cancelled() {
            debug!(sent, "cancelled before {} {}", request.method, request.uri);
            return Err(ExerciseError::Cancelled);
        }

        let uri = request.uri.clone();
        if let Some(body) = &request.body {
            debug!(method = %request.method, %uri, body = %body.preview(), "sending");
        } else {
            debug!(method = %request.method, %uri, "sending");
        }

        let response = transport.send(request, cancel).await?;
        sent += 1;
        debug!(method = %operation.method, %uri, status = response.status, "received");

        let endpoint = EndpointInformation {
            path,
            method: operation.method,
            operation,
            uri: &uri,
        };
        per_operation(&endpoint, &response)?;
    }

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use webprobe_core::{Parameter, ParameterLocation, PathItem, Request, Schema};

    struct Recorder {
        uris: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(
            &self,
            request: Request,
            _cancel: &CancellationToken,
        ) -> Result<Response, TransportError> {
            self.uris.lock().unwrap().push(request.uri);
            Ok(Response::status(200))
        }
    }

    fn document() -> Document {
        let mut get_pet = Operation::new(Method::Get);
        get_pet.operation_id = Some("getPetById".into());
        get_pet.parameters.push(Parameter {
            name: "petId".into(),
            location: ParameterLocation::Path,
            required: true,
            schema: Schema::integer().with_format("int64"),
        });
        let delete_pet = Operation::new(Method::Delete);

        Document {
            version: None,
            title: None,
            paths: vec![
                PathItem {
                    path: "/pet".into(),
                    operations: vec![Operation::new(Method::Post)],
                },
                PathItem {
                    path: "/pet/{petId}".into(),
                    operations: vec![get_pet, delete_pet],
                },
            ],
        }
    }

    #[tokio::test]
    async fn sends_in_document_order() {
        let transport = Recorder {
            uris: Mutex::new(Vec::new()),
        };
        let mut seen = Vec::new();

        let sent = invoke(
            &transport,
            &document(),
            &RequestFactory::new(),
            |_| true,
            |endpoint, response| {
                seen.push((endpoint.method, endpoint.label(), response.status));
                Ok(())
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(sent, 3);
        assert_eq!(
            *transport.uris.lock().unwrap(),
            vec!["/pet", "/pet/1", "/pet/{petId}"]
        );
        assert_eq!(seen[0], (Method::Post, "POST /pet".to_string(), 200));
        assert_eq!(seen[1].1, "getPetById");
    }

    #[tokio::test]
    async fn filter_and_callback_error_stop_early() {
        let transport = Recorder {
            uris: Mutex::new(Vec::new()),
        };

        let err = invoke(
            &transport,
            &document(),
            &RequestFactory::new(),
            |op| op.method != Method::Post,
            |_, _| Err(ExerciseError::Configuration("stop".into())),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExerciseError::Configuration(_)));
        assert_eq!(*transport.uris.lock().unwrap(), vec!["/pet/1"]);
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let transport = Recorder {
            uris: Mutex::new(Vec::new()),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = invoke(
            &transport,
            &Document::default(),
            &RequestFactory::new(),
            |_| true,
            |_, _| Ok(()),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExerciseError::Cancelled));
        assert!(transport.uris.lock().unwrap().is_empty());
    }
}
