use crate::model::RiskModel;
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle of the served risk model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelState {
    NoModel,
    Training,
    Ready,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelState::NoModel => "NO_MODEL",
            ModelState::Training => "TRAINING",
            ModelState::Ready => "READY",
        })
    }
}

/// The currently served model.
///
/// Readers clone the `Arc` and keep predicting with it for as long as they
/// like; a retrain replaces the whole reference, never the model behind it.
/// Only one training may run at a time.
#[derive(Default)]
pub struct ModelSlot {
    current: RwLock<Option<Arc<RiskModel>>>,
    trainer: Mutex<()>,
    training: AtomicBool,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<RiskModel>> {
        self.current.read().clone()
    }

    pub fn state(&self) -> ModelState {
        if self.training.load(Ordering::Acquire) {
            ModelState::Training
        } else if self.current.read().is_some() {
            ModelState::Ready
        } else {
            ModelState::NoModel
        }
    }

    /// Become the single trainer, waiting for any running training to end.
    pub fn begin_training(&self) -> TrainingGuard<'_> {
        let lock = self.trainer.lock();
        self.training.store(true, Ordering::Release);
        TrainingGuard {
            slot: self,
            _lock: lock,
        }
    }
}

/// Exclusive right to replace the served model. Dropping it ends training.
pub struct TrainingGuard<'a> {
    slot: &'a ModelSlot,
    _lock: MutexGuard<'a, ()>,
}

impl TrainingGuard<'_> {
    pub fn install(&self, model: RiskModel) -> Arc<RiskModel> {
        let model = Arc::new(model);
        *self.slot.current.write() = Some(Arc::clone(&model));
        model
    }

    /// Drop the served model, e.g. after its artifact turned out unusable.
    pub fn clear(&self) {
        *self.slot.current.write() = None;
    }
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.slot.training.store(false, Ordering::Release);
    }
}
