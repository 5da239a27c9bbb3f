use super::{EncodedImage, WebpEncoder};
use crate::input::Runtime;
use crate::models::ResolvedOptions;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Deterministic encoder: output is half the input length.
#[derive(Clone)]
pub struct MockEncoder {
    encode_count: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
    failing_calls: Arc<Mutex<HashSet<usize>>>,
    seen_options: Arc<Mutex<Vec<ResolvedOptions>>>,
    dimensions: (u32, u32),
    runtime: Runtime,
}

impl MockEncoder {
    pub fn new() -> Self {
        Self {
            encode_count: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
            failing_calls: Arc::new(Mutex::new(HashSet::new())),
            seen_options: Arc::new(Mutex::new(Vec::new())),
            dimensions: (64, 64),
            runtime: Runtime::Headless,
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Fail the `call`-th encode (1-based).
    pub fn with_failure_on_call(self, call: usize) -> Self {
        self.failing_calls.lock().unwrap().insert(call);
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = (width, height);
        self
    }

    pub fn with_runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn get_encode_count(&self) -> usize {
        *self.encode_count.lock().unwrap()
    }

    pub fn get_seen_options(&self) -> Vec<ResolvedOptions> {
        self.seen_options.lock().unwrap().clone()
    }
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebpEncoder for MockEncoder {
    fn runtime(&self) -> Runtime {
        self.runtime
    }

    async fn encode(&self, data: Vec<u8>, options: &ResolvedOptions) -> Result<EncodedImage> {
        let call = {
            let mut count = self.encode_count.lock().unwrap();
            *count += 1;
            *count
        };
        self.seen_options.lock().unwrap().push(options.clone());

        if *self.should_fail.lock().unwrap() || self.failing_calls.lock().unwrap().contains(&call)
        {
            return Err(Error::Io(std::io::Error::other("Mock failure")));
        }

        let (width, height) = self.dimensions;
        Ok(EncodedImage {
            data: vec![0x57; (data.len() / 2).max(1)],
            width,
            height,
        })
    }
}
