use crate::error::EngineError;
use crate::services::engine::TextRecognizer;
use parking_lot::Mutex;
use std::sync::Arc;

/// One pool slot. The mutex encodes the engine's non-reentrancy; by
/// construction (round-robin dispatch with workers == engines) it is
/// never contended.
pub type SharedEngine = Arc<Mutex<Box<dyn TextRecognizer>>>;

/// Factory invoked once per pool slot on a blocking worker.
pub type EngineFactory =
    dyn Fn(usize) -> Result<Box<dyn TextRecognizer>, EngineError> + Send + Sync;

/// Fixed set of independently-initialized recognition engines.
///
/// The pool does no checkout/checkin bookkeeping; the dispatcher's
/// round-robin cursor is what keeps concurrent calls off the same index.
pub struct EnginePool {
    // Outer mutex exists only so shutdown() can drop the engines.
    engines: Mutex<Vec<SharedEngine>>,
    size: usize,
    kind: &'static str,
}

impl EnginePool {
    /// Construct all `size` engines concurrently. Each instance load is
    /// I/O- and CPU-heavy and independent, so they run on separate
    /// blocking workers; the first failure aborts initialization and no
    /// partially-initialized pool is exposed.
    pub async fn initialize(size: usize, factory: Arc<EngineFactory>) -> Result<Self, EngineError> {
        if size == 0 {
            return Err(EngineError::Load("pool size must be at least 1".to_string()));
        }

        let mut handles = Vec::with_capacity(size);
        for index in 0..size {
            let factory = Arc::clone(&factory);
            handles.push(tokio::task::spawn_blocking(move || factory(index)));
        }

        let mut engines = Vec::with_capacity(size);
        for (index, handle) in handles.into_iter().enumerate() {
            let engine = handle
                .await
                .map_err(|e| EngineError::Load(format!("engine {} load task failed: {}", index, e)))??;
            engines.push(Arc::new(Mutex::new(engine)));
        }

        tracing::info!(size, "engine pool initialized");

        // Captured once while no recognition can be running; reading it
        // later must not touch an engine mutex a worker may be holding.
        let kind = engines[0].lock().kind();

        Ok(Self {
            engines: Mutex::new(engines),
            size,
            kind,
        })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Handle at the given pool position. Fails once the pool has been
    /// shut down.
    pub fn engine(&self, index: usize) -> Result<SharedEngine, EngineError> {
        self.engines
            .lock()
            .get(index)
            .cloned()
            .ok_or(EngineError::ShuttingDown)
    }

    /// Engine kind, for logs and the health endpoint. Served from the
    /// value captured at initialization so a busy engine mutex can never
    /// stall the caller.
    pub fn engine_kind(&self) -> &'static str {
        self.kind
    }

    /// Release all engine resources. Idempotent; callers must have
    /// drained in-flight work first.
    pub fn shutdown(&self) {
        let mut engines = self.engines.lock();
        if !engines.is_empty() {
            tracing::info!(size = engines.len(), "releasing engine pool");
            engines.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::detection::Detection;
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeEngine;

    impl TextRecognizer for FakeEngine {
        fn recognize(
            &mut self,
            _image: &DynamicImage,
            _box_score_threshold: f64,
        ) -> Result<Vec<Detection>, EngineError> {
            Ok(Vec::new())
        }

        fn kind(&self) -> &'static str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_initialize_builds_all_engines() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let factory: Arc<EngineFactory> = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeEngine) as Box<dyn TextRecognizer>)
        });

        let pool = EnginePool::initialize(4, factory).await.unwrap();
        assert_eq!(pool.len(), 4);
        assert_eq!(built.load(Ordering::SeqCst), 4);
        assert_eq!(pool.engine_kind(), "fake");
        for index in 0..4 {
            assert!(pool.engine(index).is_ok());
        }
    }

    #[tokio::test]
    async fn test_initialize_fails_atomically() {
        let factory: Arc<EngineFactory> = Arc::new(|index| {
            if index == 2 {
                Err(EngineError::Load("model file missing".to_string()))
            } else {
                Ok(Box::new(FakeEngine) as Box<dyn TextRecognizer>)
            }
        });

        let result = EnginePool::initialize(4, factory).await;
        assert!(matches!(result, Err(EngineError::Load(_))));
    }

    #[tokio::test]
    async fn test_initialize_rejects_zero_size() {
        let factory: Arc<EngineFactory> =
            Arc::new(|_| Ok(Box::new(FakeEngine) as Box<dyn TextRecognizer>));
        assert!(EnginePool::initialize(0, factory).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let factory: Arc<EngineFactory> =
            Arc::new(|_| Ok(Box::new(FakeEngine) as Box<dyn TextRecognizer>));
        let pool = EnginePool::initialize(2, factory).await.unwrap();

        pool.shutdown();
        pool.shutdown();

        assert!(matches!(pool.engine(0), Err(EngineError::ShuttingDown)));
        assert_eq!(pool.engine_kind(), "fake");
    }

    #[tokio::test]
    async fn test_engine_kind_does_not_wait_on_a_busy_engine() {
        let factory: Arc<EngineFactory> =
            Arc::new(|_| Ok(Box::new(FakeEngine) as Box<dyn TextRecognizer>));
        let pool = EnginePool::initialize(2, factory).await.unwrap();

        // Hold engine 0's mutex as an in-flight recognition would.
        let busy = pool.engine(0).unwrap();
        let _guard = busy.lock();

        assert_eq!(pool.engine_kind(), "fake");
    }

    #[tokio::test]
    async fn test_out_of_range_index_fails() {
        let factory: Arc<EngineFactory> =
            Arc::new(|_| Ok(Box::new(FakeEngine) as Box<dyn TextRecognizer>));
        let pool = EnginePool::initialize(2, factory).await.unwrap();
        assert!(pool.engine(5).is_err());
    }
}
