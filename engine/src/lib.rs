pub mod engine;
pub mod frames;
pub mod registry;

pub use engine::{EngineState, SimulationEngine};
pub use frames::{FrameQueue, SnapshotProducer};
pub use registry::{RegistryError, RunHandle, SimulationRegistry};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Take a mutex even if a panicking holder poisoned it. Simulation state
/// stays consistent across panics because whole days complete under the
/// lock before the engine reacts.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
