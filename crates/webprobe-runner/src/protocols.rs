//! Verification protocols built on the invoker

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use webprobe_core::{Document, Operation, RequestFactory};

use crate::error::{CallbackError, ExerciseError, VerificationFailure};
use crate::invoker::{EndpointInformation, invoke};
use crate::transport::{Response, STATUS_UNAUTHORIZED, Transport};

/// Outcome of a completed traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraversalSummary {
    pub requests_sent: usize,
}

/// Call every secured operation without credentials and require 401.
///
/// # Errors
///
/// Returns [`ExerciseError::Verification`] for the first endpoint that
/// answers with anything else; later endpoints are not called.
pub async fn verify_secured_endpoints_require_authentication<T>(
    transport: &T,
    document: &Document,
    factory: &RequestFactory,
    cancel: &CancellationToken,
) -> Result<TraversalSummary, ExerciseError>
where
    T: Transport + ?Sized,
{
    info!(
        secured = document.secured_operation_count(),
        "checking secured endpoints reject anonymous calls"
    );

    let requests_sent = invoke(
        transport,
        document,
        factory,
        Operation::is_secured,
        |endpoint, response| {
            if response.status == STATUS_UNAUTHORIZED {
                return Ok(());
            }
            let failure = VerificationFailure {
                method: endpoint.method,
                uri: endpoint.uri.to_string(),
                operation: endpoint.label(),
                status: response.status,
            };
            warn!("{failure}");
            Err(ExerciseError::Verification(failure))
        },
        cancel,
    )
    .await?;

    info!(requests_sent, "all secured endpoints returned 401");
    Ok(TraversalSummary { requests_sent })
}

/// Call every operation and hand each response to `callback`.
///
/// Status codes are never judged here.
///
/// # Errors
///
/// Returns [`ExerciseError::Callback`] with the callback's error as source,
/// plus cancellation and transport failures.
pub async fn exercise_all_endpoints<T, C>(
    transport: &T,
    document: &Document,
    factory: &RequestFactory,
    mut callback: C,
    cancel: &CancellationToken,
) -> Result<TraversalSummary, ExerciseError>
where
    T: Transport + ?Sized,
    C: FnMut(&EndpointInformation<'_>, &Response) -> Result<(), CallbackError>,
{
    info!(
        operations = document.operation_count(),
        "exercising all endpoints"
    );

    let requests_sent = invoke(
        transport,
        document,
        factory,
        |_| true,
        |endpoint, response| callback(endpoint, response).map_err(ExerciseError::Callback),
        cancel,
    )
    .await?;

    info!(requests_sent, "traversal finished");
    Ok(TraversalSummary { requests_sent })
}
