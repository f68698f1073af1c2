// SyncWalk effect - lit window advanced one step per retrigger
use palette::Srgb;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::color;
use crate::effects::Effect;
use crate::util::DoneState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncWalkOptions {
    #[serde(default)]
    pub amount: i64,
}

struct WalkState {
    step: usize,
    velocity: u8,
}

/// Lights a window of `amount` slots; every retrigger moves the window by
/// `amount` and adopts the new velocity. Walks off the end of the range to
/// finish. Velocity 1 on note-off is the agreed turn-off signal.
pub struct SyncWalk {
    range: Vec<usize>,
    color: Srgb<f64>,
    amount: usize,
    state: Mutex<WalkState>,
    done: DoneState,
}

impl SyncWalk {
    pub fn new(range: Vec<usize>, base: Srgb<f64>, velocity: u8, options: SyncWalkOptions) -> Self {
        SyncWalk {
            range,
            color: base,
            amount: options.amount.max(0) as usize,
            state: Mutex::new(WalkState { step: 0, velocity }),
            done: DoneState::default(),
        }
    }
}

impl Effect for SyncWalk {
    fn range(&self) -> &[usize] {
        &self.range
    }

    fn next_values(&self) -> Vec<Srgb<f64>> {
        let mut values = vec![color::black(); self.range.len()];
        let state = self.state.lock().unwrap();
        if self.is_done() || state.step >= self.range.len() {
            return values;
        }
        let color = color::adjust_to_velocity(self.color, state.velocity);
        let window_end = (state.step + self.amount).min(self.range.len());
        for value in &mut values[state.step..window_end] {
            *value = color;
        }
        values
    }

    fn is_done(&self) -> bool {
        self.done.is_done()
    }

    fn set_done(&self) {
        self.done.set_done();
    }

    fn off_event(&self, velocity: u8) {
        // Off velocity 1 is the explicit turn-off signal.
        if velocity == 1 {
            self.done.set_done();
        }
    }

    fn retrigger(&self, velocity: u8) -> bool {
        let mut state = self.state.lock().unwrap();
        state.step += self.amount;
        state.velocity = velocity;
        if state.step >= self.range.len() {
            self.done.set_done();
        }
        self.is_done()
    }
}
