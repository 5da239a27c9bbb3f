//! Sequential batch conversion with progress reporting
//!
//! Inputs are converted one at a time, in order. Each item produces a
//! `processing` event followed by `completed` or `failed`. By default a
//! failure is recorded in the result list and the batch moves on; with
//! `stop_on_error` the first failure aborts the batch and is returned.

use crate::converter::Converter;
use crate::models::{BatchItem, BatchProgress, ConversionOptions, ImageInput, ProgressStatus};
use crate::{Error, Result};
use tracing::{debug, info, warn};

pub type ProgressCallback = Box<dyn Fn(&BatchProgress) + Send + Sync>;

#[derive(Default)]
pub struct BatchOptions {
    pub convert: ConversionOptions,
    pub on_progress: Option<ProgressCallback>,
    /// Accepted for compatibility; conversion is always sequential.
    pub concurrency: Option<usize>,
    pub stop_on_error: bool,
}

impl BatchOptions {
    pub fn new(convert: ConversionOptions) -> Self {
        Self {
            convert,
            ..Self::default()
        }
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BatchProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    fn emit(&self, current: usize, total: usize, identifier: &str, status: ProgressStatus) {
        if let Some(callback) = &self.on_progress {
            callback(&BatchProgress {
                current,
                total,
                identifier: identifier.to_string(),
                status,
            });
        }
    }
}

impl Converter {
    /// Convert every input in order, returning one [`BatchItem`] per input.
    pub async fn batch_convert<I>(&self, inputs: I, options: BatchOptions) -> Result<Vec<BatchItem>>
    where
        I: IntoIterator,
        I::Item: Into<ImageInput>,
    {
        if options.concurrency == Some(0) {
            return Err(Error::invalid_options(
                "concurrency",
                0,
                "positive integer",
            ));
        }
        if options.concurrency.is_some_and(|n| n > 1) {
            debug!("Concurrency setting ignored; batch runs sequentially");
        }

        let inputs: Vec<ImageInput> = inputs.into_iter().map(Into::into).collect();
        let total = inputs.len();
        let mut current = 0;
        let mut results = Vec::with_capacity(total);

        info!("Starting batch conversion of {} inputs", total);

        for (index, input) in inputs.into_iter().enumerate() {
            let identifier = input.identifier(index);
            options.emit(current, total, &identifier, ProgressStatus::Processing);

            match self.convert(input, Some(&options.convert)).await {
                Ok(result) => {
                    current += 1;
                    options.emit(current, total, &identifier, ProgressStatus::Completed);
                    results.push(BatchItem {
                        identifier,
                        outcome: Ok(result),
                    });
                }
                Err(e) => {
                    current += 1;
                    options.emit(current, total, &identifier, ProgressStatus::Failed);
                    if options.stop_on_error {
                        warn!("[{}] Conversion failed, aborting batch: {}", identifier, e);
                        return Err(e);
                    }
                    warn!("[{}] Conversion failed: {}", identifier, e);
                    results.push(BatchItem {
                        identifier,
                        outcome: Err(e),
                    });
                }
            }
        }

        let failed = results.iter().filter(|item| !item.success()).count();
        info!(
            "Batch finished: {} converted, {} failed",
            total - failed,
            failed
        );
        Ok(results)
    }
}

/// Batch-convert with the headless backend.
pub async fn batch_convert<I>(inputs: I, options: BatchOptions) -> Result<Vec<BatchItem>>
where
    I: IntoIterator,
    I::Item: Into<ImageInput>,
{
    Converter::headless()?.batch_convert(inputs, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::MockEncoder;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    type Events = Arc<Mutex<Vec<(usize, String, ProgressStatus)>>>;

    fn recorder(events: &Events) -> impl Fn(&BatchProgress) + Send + Sync + 'static {
        let events = events.clone();
        move |p: &BatchProgress| {
            events
                .lock()
                .unwrap()
                .push((p.current, p.identifier.clone(), p.status));
        }
    }

    fn three_buffers() -> Vec<Vec<u8>> {
        vec![vec![1; 10], vec![2; 10], vec![3; 10]]
    }

    #[tokio::test]
    async fn test_collects_failures_in_order() {
        let converter = Converter::new(Box::new(MockEncoder::new().with_failure_on_call(2)));
        let events: Events = Arc::default();

        let results = converter
            .batch_convert(three_buffers(), BatchOptions::default().on_progress(recorder(&events)))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].success());
        assert!(!results[1].success());
        assert_eq!(results[1].error().unwrap().kind(), ErrorKind::ConversionFailed);
        assert!(results[1].result().is_none());
        assert!(results[2].success());
        assert_eq!(
            results.iter().map(|r| r.identifier.as_str()).collect::<Vec<_>>(),
            vec!["buffer-0", "buffer-1", "buffer-2"]
        );

        use ProgressStatus::*;
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                (0, "buffer-0".to_string(), Processing),
                (1, "buffer-0".to_string(), Completed),
                (1, "buffer-1".to_string(), Processing),
                (2, "buffer-1".to_string(), Failed),
                (2, "buffer-2".to_string(), Processing),
                (3, "buffer-2".to_string(), Completed),
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_on_error_aborts() {
        let encoder = MockEncoder::new().with_failure_on_call(2);
        let converter = Converter::new(Box::new(encoder.clone()));
        let events: Events = Arc::default();

        let err = converter
            .batch_convert(
                three_buffers(),
                BatchOptions::default()
                    .stop_on_error(true)
                    .on_progress(recorder(&events)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConversionFailed);
        assert_eq!(encoder.get_encode_count(), 2);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[3], (2, "buffer-1".to_string(), ProgressStatus::Failed));
        assert!(events.iter().all(|(_, id, _)| id != "buffer-2"));
    }

    #[tokio::test]
    async fn test_path_identifiers_and_shared_options() {
        let encoder = MockEncoder::new();
        let converter = Converter::new(Box::new(encoder.clone()));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, [0u8; 40]).unwrap();

        let inputs = vec![ImageInput::from(path.clone()), ImageInput::from(vec![0u8; 8])];
        let options = BatchOptions::new(ConversionOptions::default().with_quality(42));
        let results = converter.batch_convert(inputs, options).await.unwrap();

        assert_eq!(results[0].identifier, path.display().to_string());
        assert_eq!(results[1].identifier, "buffer-1");
        assert!(encoder.get_seen_options().iter().all(|o| o.quality == 42));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let converter = Converter::new(Box::new(MockEncoder::new()));
        let results = converter
            .batch_convert(Vec::<Vec<u8>>::new(), BatchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let converter = Converter::new(Box::new(MockEncoder::new()));
        let err = converter
            .batch_convert(three_buffers(), BatchOptions::default().with_concurrency(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOptions);

        let results = converter
            .batch_convert(three_buffers(), BatchOptions::default().with_concurrency(4))
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }
}
