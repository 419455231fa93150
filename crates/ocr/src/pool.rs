//! Bounded pool of OCR engine instances.
//!
//! Engine configuration is mutated in place before every call, so an
//! instance can serve only one caller at a time. Workers check an engine
//! out per task and the RAII lease guarantees it goes back, replacing the
//! thread-local handles the pipeline used to rely on.

use std::sync::mpsc;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::engine::{OcrEngine, OcrError, RecognizeOptions};

pub type BoxedEngine = Box<dyn OcrEngine>;
type EngineFactory = Box<dyn Fn() -> Result<BoxedEngine, OcrError> + Send + Sync>;

struct PoolState {
    idle: Vec<BoxedEngine>,
    /// Engines accounted for: idle plus checked out. Never exceeds capacity.
    live: usize,
}

pub struct EnginePool {
    factory: EngineFactory,
    capacity: usize,
    call_timeout: Duration,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl EnginePool {
    /// `factory` builds a fresh engine instance; at most `capacity` exist
    /// at once. Every recognize call through a lease is bounded by
    /// `call_timeout` — a timed-out call surfaces as
    /// [`OcrError::Timeout`], which the extraction chain treats as a
    /// recoverable stage failure.
    pub fn new(
        capacity: usize,
        call_timeout: Duration,
        factory: impl Fn() -> Result<BoxedEngine, OcrError> + Send + Sync + 'static,
    ) -> Self {
        EnginePool {
            factory: Box::new(factory),
            capacity: capacity.max(1),
            call_timeout,
            state: Mutex::new(PoolState { idle: Vec::new(), live: 0 }),
            available: Condvar::new(),
        }
    }

    /// Block until an engine is free and lease it. The lease returns the
    /// engine on drop.
    pub fn checkout(&self) -> Result<EngineLease<'_>, OcrError> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if let Some(engine) = state.idle.pop() {
                return Ok(EngineLease { pool: self, engine: Some(engine) });
            }
            if state.live < self.capacity {
                state.live += 1;
                drop(state);
                debug!("building new OCR engine instance");
                match (self.factory)() {
                    Ok(engine) => {
                        return Ok(EngineLease { pool: self, engine: Some(engine) });
                    }
                    Err(e) => {
                        self.release_slot();
                        return Err(e);
                    }
                }
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    pub fn idle_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .idle
            .len()
    }

    fn return_engine(&self, engine: BoxedEngine) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.idle.push(engine);
        self.available.notify_one();
    }

    fn release_slot(&self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.live -= 1;
        self.available.notify_one();
    }
}

/// Scoped lease of one engine instance.
///
/// A call that outlives the pool's timeout abandons the instance — the
/// watchdog thread still owns it inside the blocked call and drops it
/// whenever the engine finally returns. The lease then rebuilds from the
/// factory on its next use, so capacity is preserved even though the
/// wedged instance is not.
pub struct EngineLease<'a> {
    pool: &'a EnginePool,
    engine: Option<BoxedEngine>,
}

impl EngineLease<'_> {
    fn recognize_watched(
        &mut self,
        region: &DynamicImage,
        options: &RecognizeOptions,
    ) -> Result<String, OcrError> {
        let mut engine = match self.engine.take() {
            Some(engine) => engine,
            // A previous call timed out; replace the abandoned instance.
            None => (self.pool.factory)()?,
        };

        let timeout = self.pool.call_timeout;
        let region = region.clone();
        let options = options.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let result = engine.recognize(&region, &options);
            // Receiver gone means the caller gave up; the engine drops here.
            let _ = tx.send((engine, result));
        });

        match rx.recv_timeout(timeout) {
            Ok((engine, result)) => {
                self.engine = Some(engine);
                result
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(?timeout, "OCR call timed out; abandoning engine instance");
                Err(OcrError::Timeout(timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(OcrError::Engine("engine worker terminated unexpectedly".into()))
            }
        }
    }
}

impl OcrEngine for EngineLease<'_> {
    fn recognize(
        &mut self,
        region: &DynamicImage,
        options: &RecognizeOptions,
    ) -> Result<String, OcrError> {
        self.recognize_watched(region, options)
    }
}

impl Drop for EngineLease<'_> {
    fn drop(&mut self) {
        match self.engine.take() {
            Some(engine) => self.pool.return_engine(engine),
            None => self.pool.release_slot(),
        }
    }
}
