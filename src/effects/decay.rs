// Decay effect - self-terminating perceptual fade to black
use palette::Srgb;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::color;
use crate::effects::Effect;
use crate::util::DoneState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayOptions {
    #[serde(default)]
    pub decay_coef: f64,
}

/// Fades its current color by a fixed HSLuv lightness step per tick. The
/// exponent 1/2.2 inverts the perceptual gamma so numerically equal steps
/// feel equal. Self-terminating; note-off is ignored.
pub struct Decay {
    range: Vec<usize>,
    current: Mutex<Srgb<f64>>,
    decay_coef: f64,
    done: DoneState,
}

impl Decay {
    pub fn new(range: Vec<usize>, base: Srgb<f64>, velocity: u8, options: DecayOptions) -> Self {
        if options.decay_coef <= 0.0 {
            log::warn!("decay coefficient is {}", options.decay_coef);
        }
        Decay {
            range,
            current: Mutex::new(color::adjust_to_velocity(base, velocity)),
            decay_coef: options.decay_coef,
            done: DoneState::default(),
        }
    }

    fn next_color(&self) -> Srgb<f64> {
        let mut current = self.current.lock().unwrap();
        if self.is_done() {
            *current = color::black();
            return *current;
        }

        let (h, s, l) = color::to_hsluv(*current);
        if l <= 0.0 {
            *current = color::black();
            self.done.set_done();
            return *current;
        }
        let l = (l - (self.decay_coef / 255.0).powf(1.0 / 2.2)).max(0.0);
        *current = color::from_hsluv(h, s, l);
        *current
    }
}

impl Effect for Decay {
    fn range(&self) -> &[usize] {
        &self.range
    }

    fn next_values(&self) -> Vec<Srgb<f64>> {
        vec![self.next_color(); self.range.len()]
    }

    fn is_done(&self) -> bool {
        self.done.is_done()
    }

    fn set_done(&self) {
        self.done.set_done();
    }

    fn off_event(&self, _velocity: u8) {}

    fn retrigger(&self, _velocity: u8) -> bool {
        self.done.set_done()
    }
}
