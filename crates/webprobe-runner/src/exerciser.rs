//! Entry point tying a document source to the verification protocols

use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use webprobe_core::loader::{self, DocumentSource};
use webprobe_core::{BodyHook, Document, ParameterValueHook, RequestFactory};

use crate::error::{CallbackError, ExerciseError};
use crate::invoker::EndpointInformation;
use crate::protocols::{self, TraversalSummary};
use crate::transport::{Response, Transport};

/// Exercises the endpoints of one API description.
///
/// The description is loaded on first use and cached for the lifetime of the
/// exerciser. A reader source is consumed by that first load.
///
/// ```no_run
/// # async fn run() -> Result<(), webprobe_runner::ExerciseError> {
/// use tokio_util::sync::CancellationToken;
/// use webprobe_runner::{Exerciser, ReqwestTransport};
///
/// let exerciser = Exerciser::from_path("petstore.yaml")?;
/// let transport = ReqwestTransport::new("http://localhost:8080")?;
/// exerciser
///     .verify_secured_endpoints_require_authentication(&transport, &CancellationToken::new())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Exerciser {
    source: Mutex<Option<DocumentSource>>,
    document: OnceLock<Arc<Document>>,
    factory: RequestFactory,
}

impl Exerciser {
    /// # Errors
    ///
    /// Returns [`ExerciseError::Configuration`] for an empty path. A missing
    /// file is only reported on first use.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ExerciseError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ExerciseError::Configuration(
                "API description path is empty".to_string(),
            ));
        }
        Ok(Self::from_source(DocumentSource::Path(path)))
    }

    #[must_use]
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self::from_source(DocumentSource::Reader(Box::new(reader)))
    }

    #[must_use]
    pub fn from_source(source: DocumentSource) -> Self {
        Self {
            source: Mutex::new(Some(source)),
            document: OnceLock::new(),
            factory: RequestFactory::new(),
        }
    }

    /// Exerciser over an already-loaded document.
    #[must_use]
    pub fn from_document(document: Document) -> Self {
        Self {
            source: Mutex::new(None),
            document: OnceLock::from(Arc::new(document)),
            factory: RequestFactory::new(),
        }
    }

    #[must_use]
    pub fn with_parameter_hook(mut self, hook: ParameterValueHook) -> Self {
        self.factory = std::mem::take(&mut self.factory).with_parameter_hook(hook);
        self
    }

    #[must_use]
    pub fn with_body_hook(mut self, hook: BodyHook) -> Self {
        self.factory = std::mem::take(&mut self.factory).with_body_hook(hook);
        self
    }

    /// The loaded document, loading it on first call.
    ///
    /// # Errors
    ///
    /// Returns [`ExerciseError::Load`] if loading fails, or
    /// [`ExerciseError::Configuration`] if no document is available.
    pub fn document(&self) -> Result<Arc<Document>, ExerciseError> {
        if let Some(document) = self.document.get() {
            return Ok(Arc::clone(document));
        }

        let mut source = self
            .source
            .lock()
            .map_err(|_| ExerciseError::Configuration("document source lock poisoned".into()))?;

        // Another caller may have finished loading while we waited
        if let Some(document) = self.document.get() {
            return Ok(Arc::clone(document));
        }

        let loaded = match source.take() {
            Some(DocumentSource::Path(path)) => {
                debug!(path = %path.display(), "loading API description");
                let loaded = loader::load_path(&path);
                // A path can be retried after a failed load
                *source = Some(DocumentSource::Path(path));
                loaded
            }
            Some(DocumentSource::Reader(mut reader)) => {
                debug!("loading API description from reader");
                loader::load_reader(&mut reader)
            }
            None => {
                return Err(ExerciseError::Configuration(
                    "API description is not available".into(),
                ));
            }
        }?;

        let document = Arc::clone(self.document.get_or_init(|| Arc::new(loaded)));
        *source = None;
        Ok(document)
    }

    /// Call every secured operation anonymously; each must answer 401.
    ///
    /// # Errors
    ///
    /// Load and configuration errors before any request, then the first
    /// [`ExerciseError::Verification`], cancellation or transport failure.
    pub async fn verify_secured_endpoints_require_authentication<T>(
        &self,
        transport: &T,
        cancel: &CancellationToken,
    ) -> Result<TraversalSummary, ExerciseError>
    where
        T: Transport + ?Sized,
    {
        let document = self.document()?;
        protocols::verify_secured_endpoints_require_authentication(
            transport,
            &document,
            &self.factory,
            cancel,
        )
        .await
    }

    /// Call every operation, forwarding each response to `callback`.
    ///
    /// # Errors
    ///
    /// Load and configuration errors before any request, then callback,
    /// cancellation or transport failures.
    pub async fn exercise_all_endpoints<T, C>(
        &self,
        transport: &T,
        callback: C,
        cancel: &CancellationToken,
    ) -> Result<TraversalSummary, ExerciseError>
    where
        T: Transport + ?Sized,
        C: FnMut(&EndpointInformation<'_>, &Response) -> Result<(), CallbackError>,
    {
        let document = self.document()?;
        protocols::exercise_all_endpoints(transport, &document, &self.factory, callback, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use webprobe_core::LoadError;

    const MINIMAL: &str = r#"{"openapi": "3.0.3", "info": {"title": "t", "version": "1"}, "paths": {"/ping": {"get": {}}}}"#;

    #[test]
    fn empty_path_is_a_configuration_error() {
        let err = Exerciser::from_path("").unwrap_err();
        assert!(matches!(err, ExerciseError::Configuration(_)));
    }

    #[test]
    fn reader_is_loaded_once_and_cached() {
        let exerciser = Exerciser::from_reader(Cursor::new(MINIMAL.as_bytes().to_vec()));

        let first = exerciser.document().unwrap();
        let second = exerciser.document().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.operation_count(), 1);
    }

    #[test]
    fn consumed_reader_is_a_configuration_error() {
        let exerciser = Exerciser::from_reader(Cursor::new(b"not: [valid".to_vec()));

        assert!(matches!(
            exerciser.document().unwrap_err(),
            ExerciseError::Load(_)
        ));
        assert!(matches!(
            exerciser.document().unwrap_err(),
            ExerciseError::Configuration(_)
        ));
    }

    #[test]
    fn missing_file_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later.json");
        let exerciser = Exerciser::from_path(&path).unwrap();

        assert!(matches!(
            exerciser.document().unwrap_err(),
            ExerciseError::Load(LoadError::NotFound(_))
        ));

        std::fs::write(&path, MINIMAL).unwrap();
        assert_eq!(exerciser.document().unwrap().operation_count(), 1);
    }

    #[test]
    fn from_document_needs_no_source() {
        let exerciser = Exerciser::from_document(Document::default());
        assert_eq!(exerciser.document().unwrap().operation_count(), 0);
    }
}
