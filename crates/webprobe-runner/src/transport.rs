//! Transport seam: the only place a request leaves the process

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use webprobe_core::Request;

use crate::error::TransportError;

pub const STATUS_UNAUTHORIZED: u16 = 401;

/// What came back from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Option<String>,
}

impl Response {
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self { status, body: None }
    }
}

/// Sends one request and waits for its response.
///
/// Implementations should give up with [`TransportError::Cancelled`] once
/// `cancel` fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        (**self).send(request, cancel).await
    }
}
