//! webprobe-runner: endpoint invoker and verification protocols

pub mod error;
pub mod exerciser;
pub mod http;
pub mod invoker;
pub mod protocols;
pub mod transport;

pub use error::{CallbackError, ExerciseError, TransportError, VerificationFailure};
pub use exerciser::Exerciser;
pub use http::ReqwestTransport;
pub use invoker::{EndpointInformation, invoke};
pub use protocols::{
    TraversalSummary, exercise_all_endpoints, verify_secured_endpoints_require_authentication,
};
pub use transport::{Response, STATUS_UNAUTHORIZED, Transport};
