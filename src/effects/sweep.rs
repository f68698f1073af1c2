// Sweep effect - moving head with distance-faded bleed
use palette::Srgb;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::color;
use crate::effects::Effect;
use crate::util::DoneState;

/// Minimum lightness worth emitting; below this the LED color is unstable.
const MIN_LIGHTNESS: f64 = 0.0065;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepOptions {
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub bleed: f64,
    #[serde(default)]
    pub bleed_before: bool,
    #[serde(default)]
    pub bleed_after: bool,
}

/// Walks a lit head across the range at `speed` slots per tick. Slots on
/// the bleed side fade with distance through the 2.2 perceptual curve;
/// the effect finishes once the bleed tail has cleared the last slot.
pub struct Sweep {
    range: Vec<usize>,
    color: Srgb<f64>,
    options: SweepOptions,
    current_step: Mutex<f64>,
    done: DoneState,
    range_len: usize,
}

impl Sweep {
    pub fn new(range: Vec<usize>, base: Srgb<f64>, options: SweepOptions) -> Self {
        let range_len = range.len();
        Sweep {
            range,
            color: base,
            options,
            current_step: Mutex::new(0.0),
            done: DoneState::default(),
            range_len,
        }
    }
}

impl Effect for Sweep {
    fn range(&self) -> &[usize] {
        &self.range
    }

    fn next_values(&self) -> Vec<Srgb<f64>> {
        let step = {
            let mut current = self.current_step.lock().unwrap();
            *current += self.options.speed;
            *current
        };
        // Truncate to the slot the head sits on.
        let head = step as i64;

        let mut values = vec![color::black(); self.range_len];
        let (h, s, l) = color::to_hsluv(self.color);
        for i in 0..self.range_len {
            let slot = i as i64;
            if slot == head {
                values[i] = self.color;
            } else if (self.options.bleed_before && slot > head)
                || (self.options.bleed_after && slot < head)
            {
                let distance = (head - slot).abs() as f64;
                // Brightness reduction from distance, on the perceptual
                // curve, scaled by the bleed factor.
                let brightness = distance.powf(2.2) * self.options.bleed;
                let mut lightness = l / brightness;
                if lightness < MIN_LIGHTNESS {
                    // The tail has faded out here; once that happens on the
                    // last slot with the head past the range, we are done.
                    if i == self.range_len - 1 && head > self.range_len as i64 {
                        self.done.set_done();
                    }
                    lightness = 0.0;
                } else if lightness > l {
                    lightness = l;
                }
                values[i] = color::from_hsluv(h, s, lightness);
            }
        }
        values
    }

    fn is_done(&self) -> bool {
        self.done.is_done()
    }

    fn set_done(&self) {
        self.done.set_done();
    }

    fn off_event(&self, _velocity: u8) {}

    fn retrigger(&self, _velocity: u8) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(len: usize, options: SweepOptions) -> Sweep {
        Sweep::new(
            (0..len).collect(),
            color::from_hex("#ff0000").unwrap(),
            options,
        )
    }

    #[test]
    fn test_head_shows_base_color() {
        let effect = sweep(
            20,
            SweepOptions {
                speed: 1.0,
                bleed: 0.5,
                bleed_after: true,
                ..Default::default()
            },
        );
        let values = effect.next_values();
        assert_eq!(values.len(), 20);
        // After one tick the head sits on slot 1.
        assert_eq!(color::to_rgb255(values[1]), (255, 0, 0));
    }

    #[test]
    fn test_bleed_fades_with_distance() {
        let effect = sweep(
            20,
            SweepOptions {
                speed: 5.0,
                bleed: 2.0,
                bleed_after: true,
                ..Default::default()
            },
        );
        let values = effect.next_values();
        let (_, _, l_head) = color::to_hsluv(values[5]);
        let (_, _, l_near) = color::to_hsluv(values[4]);
        let (_, _, l_far) = color::to_hsluv(values[2]);
        assert!(l_near < l_head);
        assert!(l_far < l_near);
        // Ahead of the head stays black without bleed_before.
        assert!(color::is_almost_black(values[6]));
    }

    #[test]
    fn test_bleed_before_lights_ahead() {
        let effect = sweep(
            10,
            SweepOptions {
                speed: 1.0,
                bleed: 0.2,
                bleed_before: true,
                ..Default::default()
            },
        );
        let values = effect.next_values();
        assert!(!color::is_almost_black(values[2]));
        // Behind the head stays black without bleed_after.
        assert!(color::is_almost_black(values[0]));
    }

    #[test]
    fn test_finishes_after_tail_clears() {
        let effect = sweep(
            20,
            SweepOptions {
                speed: 1.0,
                bleed: 0.5,
                bleed_after: true,
                ..Default::default()
            },
        );
        let mut ticks = 0;
        while !effect.is_done() {
            let values = effect.next_values();
            assert_eq!(values.len(), 20);
            ticks += 1;
            assert!(ticks < 60, "sweep never finished");
        }
        // It takes at least the full pass before the tail can clear.
        assert!(ticks > 20);
    }

    #[test]
    fn test_never_finishes_without_trailing_bleed() {
        let effect = sweep(
            5,
            SweepOptions {
                speed: 1.0,
                bleed: 0.5,
                bleed_before: true,
                ..Default::default()
            },
        );
        for _ in 0..50 {
            effect.next_values();
        }
        assert!(!effect.is_done());
    }

    #[test]
    fn test_retrigger_requests_replacement_without_done() {
        let effect = sweep(5, SweepOptions::default());
        assert!(effect.retrigger(90));
        assert!(!effect.is_done());
    }
}
