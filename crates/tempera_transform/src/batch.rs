//! Batch resizing over a bounded worker pool.

use crate::{ResizePipeline, ResizeResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempera_error::{ResizeError, ResizeErrorKind, TemperaError, TemperaResult};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// One image in a batch.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Encoded bytes
    pub bytes: Arc<[u8]>,
    /// Declared MIME type
    pub mime_type: String,
}

impl ImageInput {
    /// Wrap bytes and their MIME type.
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Progress event emitted after each item finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    /// Key of the item that finished
    pub key: String,
    /// Items finished so far
    pub completed: usize,
    /// Items in the batch
    pub total: usize,
    /// Whether the item succeeded
    pub success: bool,
}

/// A keyed batch of images resized for one consumer.
///
/// # Example
///
/// ```rust
/// use tempera_transform::{ImageInput, ResizeBatchRequest};
///
/// let request = ResizeBatchRequest::new("gallery")
///     .with_image("front", ImageInput::new(vec![0u8; 16], "image/jpeg"))
///     .with_image("back", ImageInput::new(vec![0u8; 16], "image/jpeg"))
///     .with_parallel(true)
///     .with_max_concurrency(2);
/// assert_eq!(request.images.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResizeBatchRequest {
    /// Images by caller-chosen key
    pub images: HashMap<String, ImageInput>,
    /// Consumer key used to resolve the strategy
    pub consumer_key: String,
    /// Run items concurrently
    pub parallel: bool,
    /// Worker ceiling; defaults to the pipeline's `max_concurrency`
    pub max_concurrency: Option<usize>,
    /// Progress sink; events are dropped when the channel is full
    pub progress: Option<mpsc::Sender<BatchProgress>>,
    /// Stops admitting new items once cancelled
    pub cancel: Option<CancellationToken>,
}

impl ResizeBatchRequest {
    /// Empty request for `consumer_key`.
    pub fn new(consumer_key: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            ..Default::default()
        }
    }

    /// Add an image.
    pub fn with_image(mut self, key: impl Into<String>, image: ImageInput) -> Self {
        self.images.insert(key.into(), image);
        self
    }

    /// Run items concurrently.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Override the worker ceiling.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    /// Send progress events to `sender`.
    pub fn with_progress(mut self, sender: mpsc::Sender<BatchProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Honor `token` at worker admission.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Outcome of a batch in which at least one item succeeded.
#[derive(Debug)]
pub struct BatchResize {
    /// Successful items by key
    pub results: HashMap<String, ResizeResult>,
    /// Failed items by key
    pub failures: HashMap<String, TemperaError>,
    /// Wall time for the whole batch
    pub elapsed: Duration,
}

impl BatchResize {
    /// Whether every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Keys that failed, sorted.
    pub fn failed_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.failures.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// A [`ResizeErrorKind::PartialBatch`] naming the failed keys, if any failed.
    pub fn aggregate_error(&self) -> Option<ResizeError> {
        (!self.failures.is_empty()).then(|| {
            ResizeError::new(ResizeErrorKind::PartialBatch {
                failed: self.failed_keys(),
            })
        })
    }
}

struct Tally<'a> {
    total: usize,
    completed: usize,
    results: HashMap<String, ResizeResult>,
    failures: HashMap<String, TemperaError>,
    progress: Option<&'a mpsc::Sender<BatchProgress>>,
}

impl Tally<'_> {
    fn record(&mut self, key: String, outcome: TemperaResult<ResizeResult>) {
        self.completed += 1;
        let success = outcome.is_ok();
        if let Some(sender) = self.progress {
            let event = BatchProgress {
                key: key.clone(),
                completed: self.completed,
                total: self.total,
                success,
            };
            if sender.try_send(event).is_err() {
                tracing::debug!(key = %key, "Progress channel full or closed, dropping event");
            }
        }
        match outcome {
            Ok(result) => {
                self.results.insert(key, result);
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Batch item failed");
                self.failures.insert(key, err);
            }
        }
    }
}

fn cancelled() -> TemperaError {
    ResizeError::new(ResizeErrorKind::Cancelled).into()
}

impl ResizePipeline {
    /// Resize a keyed batch of images.
    ///
    /// Per-item failures are collected in [`BatchResize::failures`]; the call
    /// itself fails only when the batch is empty or every item failed.
    /// Cancellation is checked before each item is admitted; items already
    /// running finish normally.
    ///
    /// # Errors
    ///
    /// [`ResizeErrorKind::EmptyBatch`] for an empty request,
    /// [`ResizeErrorKind::BatchFailed`] when no item succeeded.
    #[tracing::instrument(
        skip(self, request),
        fields(
            consumer_key = %request.consumer_key,
            items = request.images.len(),
            parallel = request.parallel
        )
    )]
    pub async fn resize_batch(&self, request: ResizeBatchRequest) -> TemperaResult<BatchResize> {
        let started = Instant::now();
        let ResizeBatchRequest {
            images,
            consumer_key,
            parallel,
            max_concurrency,
            progress,
            cancel,
        } = request;

        if images.is_empty() {
            return Err(ResizeError::new(ResizeErrorKind::EmptyBatch).into());
        }

        let mut tally = Tally {
            total: images.len(),
            completed: 0,
            results: HashMap::new(),
            failures: HashMap::new(),
            progress: progress.as_ref(),
        };

        if parallel {
            let limit = max_concurrency
                .unwrap_or(self.inner.config.max_concurrency)
                .max(1);
            self.run_parallel(images, &consumer_key, limit, cancel.as_ref(), &mut tally)
                .await;
        } else {
            self.run_sequential(images, &consumer_key, cancel.as_ref(), &mut tally)
                .await;
        }

        let Tally {
            total,
            results,
            failures,
            ..
        } = tally;

        if results.is_empty() {
            let mut failed: Vec<String> = failures.into_keys().collect();
            failed.sort();
            tracing::warn!(total, "Every batch item failed");
            return Err(ResizeError::new(ResizeErrorKind::BatchFailed { failed }).into());
        }

        let batch = BatchResize {
            results,
            failures,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            total,
            succeeded = batch.results.len(),
            failed = batch.failures.len(),
            elapsed_ms = batch.elapsed.as_millis() as u64,
            "Batch resize complete"
        );
        Ok(batch)
    }

    async fn run_sequential(
        &self,
        images: HashMap<String, ImageInput>,
        consumer_key: &str,
        cancel: Option<&CancellationToken>,
        tally: &mut Tally<'_>,
    ) {
        let mut images: Vec<(String, ImageInput)> = images.into_iter().collect();
        images.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (key, input) in images {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                tally.record(key, Err(cancelled()));
                continue;
            }
            let outcome = self
                .resize_single(input.bytes, &input.mime_type, consumer_key)
                .await;
            tally.record(key, outcome);
        }
    }

    async fn run_parallel(
        &self,
        images: HashMap<String, ImageInput>,
        consumer_key: &str,
        limit: usize,
        cancel: Option<&CancellationToken>,
        tally: &mut Tally<'_>,
    ) {
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut workers = JoinSet::new();
        let mut pending = BTreeSet::new();

        tracing::debug!(limit, "Starting parallel batch");

        for (key, input) in images {
            let admitted = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    permit = Arc::clone(&semaphore).acquire_owned() => Some(permit),
                },
                None => Some(Arc::clone(&semaphore).acquire_owned().await),
            };

            let permit = match admitted {
                Some(Ok(permit)) => permit,
                Some(Err(err)) => {
                    let err = ResizeError::new(ResizeErrorKind::Worker(err.to_string()));
                    tally.record(key, Err(err.into()));
                    continue;
                }
                None => {
                    tally.record(key, Err(cancelled()));
                    continue;
                }
            };

            pending.insert(key.clone());
            let pipeline = self.clone();
            let consumer_key = consumer_key.to_string();
            workers.spawn(async move {
                let _permit = permit;
                let outcome = pipeline
                    .resize_single(input.bytes, &input.mime_type, &consumer_key)
                    .await;
                (key, outcome)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((key, outcome)) => {
                    pending.remove(&key);
                    tally.record(key, outcome);
                }
                Err(err) => tracing::error!(error = %err, "Batch worker panicked"),
            }
        }

        // Keys whose worker died without reporting.
        for key in pending {
            let err = ResizeError::new(ResizeErrorKind::Worker(format!(
                "worker for '{}' did not complete",
                key
            )));
            tally.record(key, Err(err.into()));
        }
    }
}
