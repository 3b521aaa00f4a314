use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use shared::{ConfigError, SimProperties};
use sim::{DayListener, Simulation};

use crate::engine::SimulationEngine;
use crate::frames::{FrameQueue, SnapshotProducer};

/// Frames kept per run before the oldest is dropped.
const FRAME_QUEUE_CAPACITY: usize = 8;

/// One running simulation with its observation pipeline.
pub struct RunHandle {
    pub run_id: Uuid,
    pub engine: Arc<SimulationEngine>,
    pub producer: SnapshotProducer,
    pub frames: Arc<FrameQueue>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a simulation named {0:?} is already registered")]
    DuplicateName(String),
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// Explicit registry of active runs, keyed by run name, passed by reference
/// to whichever component starts or stops instances. There is no hidden
/// process-wide state.
#[derive(Default)]
pub struct SimulationRegistry {
    runs: HashMap<String, RunHandle>,
}

impl SimulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration, build the simulation with its day-end
    /// listeners in place, then start the engine and snapshot producer.
    pub fn launch(
        &mut self,
        props: SimProperties,
        listeners: Vec<DayListener>,
    ) -> Result<&RunHandle, RegistryError> {
        let name = props.run_name.clone();
        if self.runs.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        let interval = Duration::from_millis(props.snapshot_interval_ms.max(1));
        let mut simulation = Simulation::new(props)?;
        for listener in listeners {
            simulation.add_day_listener(listener);
        }
        let run_id = simulation.run_id();

        let engine = Arc::new(SimulationEngine::new(simulation));
        let frames = Arc::new(FrameQueue::new(FRAME_QUEUE_CAPACITY));
        let producer = SnapshotProducer::spawn(engine.simulation(), Arc::clone(&frames), interval);
        engine.start();
        tracing::info!("launched simulation {:?} ({})", name, run_id);

        let handle = RunHandle {
            run_id,
            engine,
            producer,
            frames,
        };
        Ok(self.runs.entry(name).or_insert(handle))
    }

    pub fn get(&self, name: &str) -> Option<&RunHandle> {
        self.runs.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop a run's engine and producer and drop the handle. Unknown names
    /// return false.
    pub fn stop(&mut self, name: &str) -> bool {
        match self.runs.remove(name) {
            Some(handle) => {
                handle.engine.stop();
                handle.engine.wait_until_finished();
                handle.producer.stop();
                tracing::info!("stopped simulation {:?}", name);
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for name in self.names() {
            self.stop(&name);
        }
    }
}
