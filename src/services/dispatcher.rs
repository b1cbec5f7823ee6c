use crate::error::EngineError;
use crate::models::detection::Detection;
use crate::services::pool::EnginePool;
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Routes recognition work onto the engine pool.
///
/// The cursor is the one piece of cross-request mutable state in the
/// system; it is advanced with an atomic increment-and-wrap so two
/// concurrent submissions can never land on the same engine index. The
/// semaphore is sized to the engine count, so at most `n` recognitions
/// run at once and the uncontended-mutex invariant on each handle holds.
pub struct OcrDispatcher {
    pool: Arc<EnginePool>,
    limiter: Arc<Semaphore>,
    cursor: AtomicUsize,
    draining: AtomicBool,
    box_score_threshold: f64,
}

impl OcrDispatcher {
    pub fn new(pool: Arc<EnginePool>, box_score_threshold: f64) -> Self {
        let limiter = Arc::new(Semaphore::new(pool.len()));
        Self {
            pool,
            limiter,
            cursor: AtomicUsize::new(0),
            draining: AtomicBool::new(false),
            box_score_threshold,
        }
    }

    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    /// Atomically read-and-increment the cursor modulo the pool size.
    fn next_index(&self) -> usize {
        let size = self.pool.len();
        self.cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some((c + 1) % size)
            })
            .unwrap_or(0)
    }

    /// Run recognition on the next engine in rotation, off the accepting
    /// task. Completion order across submissions is not guaranteed.
    ///
    /// An abandoned caller (client disconnect) does not cancel the
    /// recognition already running on its worker; it runs to completion.
    pub async fn submit(&self, image: DynamicImage) -> Result<Vec<Detection>, EngineError> {
        if self.draining.load(Ordering::Acquire) {
            return Err(EngineError::ShuttingDown);
        }

        let permit = Arc::clone(&self.limiter)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::ShuttingDown)?;

        let index = self.next_index();
        let engine = self.pool.engine(index)?;
        let threshold = self.box_score_threshold;

        tracing::debug!(engine_index = index, "dispatching recognition");

        let result = tokio::task::spawn_blocking(move || {
            let mut guard = engine.lock();
            let result = guard.recognize(&image, threshold);
            drop(guard);
            // Hold the permit until recognition is done so the drain
            // cannot observe an idle slot with work still running.
            drop(permit);
            result
        })
        .await
        .map_err(|e| EngineError::Inference(format!("recognition task failed: {}", e)))?;

        result
    }

    /// Two-phase drain: stop accepting new submissions, wait for every
    /// outstanding recognition to finish, then release the engines.
    /// Idempotent; concurrent callers all wait for completion.
    pub async fn drain(&self) {
        let first = !self.draining.swap(true, Ordering::AcqRel);
        if first {
            tracing::info!("draining in-flight recognition work");
        }

        // All permits free means no recognition is in flight.
        let total = self.pool.len() as u32;
        if let Ok(all) = self.limiter.acquire_many(total).await {
            drop(all);
        }
        self.limiter.close();

        self.pool.shutdown();

        if first {
            tracing::info!("drain complete, engine pool released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engine::TextRecognizer;
    use crate::services::pool::EngineFactory;
    use std::time::Duration;

    /// Engine that records per-index call counts and can simulate slow
    /// recognition.
    struct CountingEngine {
        index: usize,
        calls: Arc<Vec<AtomicUsize>>,
        delay: Duration,
        completed: Arc<AtomicUsize>,
    }

    impl TextRecognizer for CountingEngine {
        fn recognize(
            &mut self,
            _image: &DynamicImage,
            _box_score_threshold: f64,
        ) -> Result<Vec<Detection>, EngineError> {
            self.calls[self.index].fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Detection::from_rect(
                0.0,
                0.0,
                10.0,
                10.0,
                "42".to_string(),
                0.9,
            )])
        }

        fn kind(&self) -> &'static str {
            "counting"
        }
    }

    struct Fixture {
        calls: Arc<Vec<AtomicUsize>>,
        completed: Arc<AtomicUsize>,
    }

    async fn dispatcher_with(n: usize, delay: Duration) -> (Arc<OcrDispatcher>, Fixture) {
        let calls = Arc::new((0..n).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
        let completed = Arc::new(AtomicUsize::new(0));

        let fixture = Fixture {
            calls: Arc::clone(&calls),
            completed: Arc::clone(&completed),
        };

        let factory: Arc<EngineFactory> = Arc::new(move |index| {
            Ok(Box::new(CountingEngine {
                index,
                calls: Arc::clone(&calls),
                delay,
                completed: Arc::clone(&completed),
            }) as Box<dyn TextRecognizer>)
        });

        let pool = Arc::new(EnginePool::initialize(n, factory).await.unwrap());
        (Arc::new(OcrDispatcher::new(pool, 0.0)), fixture)
    }

    fn blank() -> DynamicImage {
        DynamicImage::new_luma8(8, 8)
    }

    #[tokio::test]
    async fn test_round_robin_fairness() {
        // m*n sequential submissions over n engines select each index
        // exactly m times.
        let (dispatcher, fixture) = dispatcher_with(4, Duration::ZERO).await;

        for _ in 0..12 {
            dispatcher.submit(blank()).await.unwrap();
        }

        for counter in fixture.calls.iter() {
            assert_eq!(counter.load(Ordering::SeqCst), 3);
        }
    }

    #[tokio::test]
    async fn test_concurrent_submissions_complete() {
        let (dispatcher, fixture) = dispatcher_with(2, Duration::from_millis(20)).await;

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let d = Arc::clone(&dispatcher);
            tasks.push(tokio::spawn(async move { d.submit(blank()).await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(fixture.completed.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_drain_waits_for_in_flight_work() {
        let (dispatcher, fixture) = dispatcher_with(3, Duration::from_millis(50)).await;

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let d = Arc::clone(&dispatcher);
            tasks.push(tokio::spawn(async move { d.submit(blank()).await }));
        }
        // Let the submissions reach their workers before draining.
        tokio::time::sleep(Duration::from_millis(10)).await;

        dispatcher.drain().await;

        // Nothing was abandoned mid-flight.
        assert_eq!(fixture.completed.load(Ordering::SeqCst), 3);
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_submit_after_drain_is_rejected() {
        let (dispatcher, _fixture) = dispatcher_with(2, Duration::ZERO).await;
        dispatcher.drain().await;

        let result = dispatcher.submit(blank()).await;
        assert!(matches!(result, Err(EngineError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_drain_is_idempotent() {
        let (dispatcher, _fixture) = dispatcher_with(2, Duration::ZERO).await;
        dispatcher.drain().await;
        dispatcher.drain().await;
    }

    #[tokio::test]
    async fn test_engine_failure_does_not_poison_rotation() {
        struct FlakyEngine {
            index: usize,
        }

        impl TextRecognizer for FlakyEngine {
            fn recognize(
                &mut self,
                _image: &DynamicImage,
                _box_score_threshold: f64,
            ) -> Result<Vec<Detection>, EngineError> {
                if self.index == 0 {
                    Err(EngineError::Inference("bad read".to_string()))
                } else {
                    Ok(Vec::new())
                }
            }

            fn kind(&self) -> &'static str {
                "flaky"
            }
        }

        let factory: Arc<EngineFactory> =
            Arc::new(|index| Ok(Box::new(FlakyEngine { index }) as Box<dyn TextRecognizer>));
        let pool = Arc::new(EnginePool::initialize(2, factory).await.unwrap());
        let dispatcher = OcrDispatcher::new(pool, 0.0);

        // Engine 0 fails, engine 1 succeeds, and the rotation keeps
        // alternating regardless.
        assert!(dispatcher.submit(blank()).await.is_err());
        assert!(dispatcher.submit(blank()).await.is_ok());
        assert!(dispatcher.submit(blank()).await.is_err());
        assert!(dispatcher.submit(blank()).await.is_ok());
    }
}
