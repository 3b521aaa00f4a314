use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use shared::clamp_step_delay;
use sim::Simulation;

use crate::lock;

/// Engine lifecycle. `Stopped` is terminal; a stopped engine never runs
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Running,
    Paused,
    Stopped,
}

struct Control {
    state: Mutex<EngineState>,
    wakeup: Condvar,
    step_delay_ms: AtomicU64,
}

/// Drives a simulation on a dedicated thread, one day per step, with a
/// live-adjustable inter-step delay and cooperative cancellation. An
/// in-flight day always completes; stop never tears a day in half.
pub struct SimulationEngine {
    sim: Arc<Mutex<Simulation>>,
    control: Arc<Control>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SimulationEngine {
    pub fn new(sim: Simulation) -> Self {
        let delay = clamp_step_delay(sim.props().step_delay_ms);
        Self {
            sim: Arc::new(Mutex::new(sim)),
            control: Arc::new(Control {
                state: Mutex::new(EngineState::Created),
                wakeup: Condvar::new(),
                step_delay_ms: AtomicU64::new(delay),
            }),
            handle: Mutex::new(None),
        }
    }

    /// The shared simulation handle. Observers lock it for the whole of any
    /// multi-step read.
    pub fn simulation(&self) -> Arc<Mutex<Simulation>> {
        Arc::clone(&self.sim)
    }

    pub fn state(&self) -> EngineState {
        *lock(&self.control.state)
    }

    /// Spawn the loop thread. A no-op unless the engine is freshly created;
    /// in particular a stopped engine refuses to restart.
    pub fn start(&self) {
        {
            let mut state = lock(&self.control.state);
            if *state != EngineState::Created {
                return;
            }
            *state = EngineState::Running;
        }
        let sim = Arc::clone(&self.sim);
        let control = Arc::clone(&self.control);
        let handle = thread::spawn(move || run_loop(&sim, &control));
        *lock(&self.handle) = Some(handle);
    }

    /// Cooperative stop: publish the terminal state and wake the loop thread
    /// out of its inter-step sleep. Idempotent.
    pub fn stop(&self) {
        *lock(&self.control.state) = EngineState::Stopped;
        self.control.wakeup.notify_all();
    }

    /// Flip Running <-> Paused; a stopped engine stays stopped.
    pub fn toggle_pause(&self) {
        {
            let mut state = lock(&self.control.state);
            *state = match *state {
                EngineState::Running => EngineState::Paused,
                EngineState::Paused => EngineState::Running,
                other => other,
            };
        }
        self.control.wakeup.notify_all();
    }

    /// Publish a new inter-step delay, clamped into bounds. The loop thread
    /// re-reads it every iteration, so speed changes apply without a restart
    /// and without losing simulation state.
    pub fn set_step_delay(&self, ms: u64) {
        self.control
            .step_delay_ms
            .store(clamp_step_delay(ms), Ordering::Relaxed);
    }

    pub fn step_delay(&self) -> u64 {
        self.control.step_delay_ms.load(Ordering::Relaxed)
    }

    /// Block until the loop thread terminates. Safe before `start` and safe
    /// to call more than once.
    pub fn wait_until_finished(&self) {
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn run_loop(sim: &Arc<Mutex<Simulation>>, control: &Arc<Control>) {
    loop {
        let state = *lock(&control.state);
        match state {
            EngineState::Stopped => break,
            EngineState::Running => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut sim = lock(sim);
                    sim.advance_day();
                    (sim.day(), sim.is_extinct())
                }));
                match outcome {
                    Ok((day, true)) => {
                        tracing::info!("population extinct on day {}, stopping engine", day);
                        *lock(&control.state) = EngineState::Stopped;
                        break;
                    }
                    Ok((_, false)) => {}
                    Err(_) => {
                        tracing::error!("simulation step panicked, stopping engine");
                        *lock(&control.state) = EngineState::Stopped;
                        break;
                    }
                }
            }
            EngineState::Created | EngineState::Paused => {}
        }

        // Interruptible inter-step sleep; stop() cuts it short.
        let delay = Duration::from_millis(control.step_delay_ms.load(Ordering::Relaxed));
        let guard = lock(&control.state);
        if *guard == EngineState::Stopped {
            break;
        }
        let _ = control.wakeup.wait_timeout(guard, delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{SimProperties, VegetationVariant, MAX_STEP_DELAY_MS, MIN_STEP_DELAY_MS};

    /// A population that never gains or loses energy: it keeps the engine
    /// busy for as long as a test wants.
    fn immortal_props() -> SimProperties {
        SimProperties {
            width: 5,
            height: 5,
            start_animals: 2,
            start_plants: 0,
            plants_per_day: 0,
            start_energy: 20,
            move_cost: 0,
            reproduction_threshold: 30,
            reproduction_cost: 12,
            vegetation: VegetationVariant::Anywhere,
            step_delay_ms: MIN_STEP_DELAY_MS,
            seed: Some(31),
            ..Default::default()
        }
    }

    fn doomed_props() -> SimProperties {
        SimProperties {
            start_animals: 1,
            start_energy: 2,
            move_cost: 1,
            ..immortal_props()
        }
    }

    fn engine(props: SimProperties) -> SimulationEngine {
        SimulationEngine::new(Simulation::new(props).unwrap())
    }

    #[test]
    fn test_step_delay_is_clamped() {
        let engine = engine(immortal_props());
        engine.set_step_delay(0);
        assert_eq!(engine.step_delay(), MIN_STEP_DELAY_MS);
        engine.set_step_delay(1_000_000);
        assert_eq!(engine.step_delay(), MAX_STEP_DELAY_MS);
        engine.set_step_delay(200);
        assert_eq!(engine.step_delay(), 200);
    }

    #[test]
    fn test_runs_to_extinction_and_stops_itself() {
        let engine = engine(doomed_props());
        engine.start();
        engine.wait_until_finished();

        assert_eq!(engine.state(), EngineState::Stopped);
        let sim = engine.simulation();
        let sim = lock(&sim);
        assert!(sim.is_extinct());
        assert_eq!(sim.dead_count(), 1);
    }

    #[test]
    fn test_stopped_engine_refuses_restart() {
        let engine = engine(immortal_props());
        engine.start();
        assert_eq!(engine.state(), EngineState::Running);
        engine.stop();
        engine.stop();
        engine.wait_until_finished();
        assert_eq!(engine.state(), EngineState::Stopped);

        engine.start();
        assert_eq!(engine.state(), EngineState::Stopped);
        engine.wait_until_finished();
    }

    #[test]
    fn test_toggle_pause_after_stop_is_noop() {
        let engine = engine(immortal_props());
        engine.start();
        engine.toggle_pause();
        assert_eq!(engine.state(), EngineState::Paused);
        engine.toggle_pause();
        assert_eq!(engine.state(), EngineState::Running);

        engine.stop();
        engine.wait_until_finished();
        engine.toggle_pause();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_pause_halts_day_progress() {
        let engine = engine(immortal_props());
        engine.start();
        engine.toggle_pause();

        let day_when_paused = {
            let sim = engine.simulation();
            let day = lock(&sim).day();
            day
        };
        std::thread::sleep(Duration::from_millis(80));
        let day_later = {
            let sim = engine.simulation();
            let day = lock(&sim).day();
            day
        };
        // At most one in-flight day between start and the pause taking hold.
        assert!(day_later <= day_when_paused + 1);

        engine.stop();
        engine.wait_until_finished();
    }
}
