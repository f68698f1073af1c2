// Static effect - constant fill until note-off
use palette::Srgb;

use crate::color;
use crate::effects::Effect;
use crate::util::DoneState;

/// Holds its velocity-adjusted base color until the note is released or
/// the effect is retriggered.
pub struct Static {
    range: Vec<usize>,
    color: Srgb<f64>,
    done: DoneState,
}

impl Static {
    pub fn new(range: Vec<usize>, base: Srgb<f64>, velocity: u8) -> Self {
        Static {
            range,
            color: color::adjust_to_velocity(base, velocity),
            done: DoneState::default(),
        }
    }
}

impl Effect for Static {
    fn range(&self) -> &[usize] {
        &self.range
    }

    fn next_values(&self) -> Vec<Srgb<f64>> {
        if self.is_done() {
            vec![color::black(); self.range.len()]
        } else {
            vec![self.color; self.range.len()]
        }
    }

    fn is_done(&self) -> bool {
        self.done.is_done()
    }

    fn set_done(&self) {
        self.done.set_done();
    }

    fn off_event(&self, _velocity: u8) {
        self.done.set_done();
    }

    fn retrigger(&self, _velocity: u8) -> bool {
        self.done.set_done()
    }
}
