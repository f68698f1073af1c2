// Drums Module - Fixed channel-2 percussion mapping
use crate::color;
use crate::effects::{Decay, DecayOptions, Sweep, SweepOptions};
use crate::midi::NoteEvent;
use crate::registry::EffectRegistry;
use crate::strip::Strip;
use crate::util::make_range;
use palette::Srgb;

fn indices(first: i64, last: i64) -> Vec<usize> {
    make_range(first, last, 1).into_iter().map(|i| i as usize).collect()
}

/// Reactive hard-coded drum kit mapping. Note numbers follow the General
/// MIDI percussion map; quiet hits below the per-voice velocity threshold
/// are ignored so ghost notes don't light the strip.
pub fn handle(strip: &Strip, registry: &EffectRegistry, event: &NoteEvent) {
    match event.note {
        36 => {
            // Bass
            if !event.on || event.velocity > 80 {
                let (r, g, b) = color::to_rgb255(Srgb::new(1.0, 0.0, 0.0));
                strip.set_range(30, 45, event.on, r, g, b);
            }
        }
        38 | 40 => {
            // Snare
            if !event.on || event.velocity > 80 {
                let (r, g, b) = color::to_rgb255(color::from_hsluv(66.0, 1.0, 0.8));
                strip.set_range(60, 75, event.on, r, g, b);
            }
        }
        37 => {
            // Rimshot Snare
            if !event.on || event.velocity > 80 {
                let (r, g, b) = color::to_rgb255(color::from_hsluv(25.0, 1.0, 0.6));
                strip.set_range(60, 65, event.on, r, g, b);
                strip.set_range(70, 75, event.on, r, g, b);
            }
        }
        49 | 55 => {
            // Main Crash
            if event.on && event.velocity > 60 {
                registry.attach(
                    event.note,
                    Box::new(Decay::new(
                        indices(40, 60),
                        color::from_hsluv(0.0, 0.0, f64::from(event.velocity) / 255.0),
                        127,
                        DecayOptions { decay_coef: 0.005 },
                    )),
                );
            }
        }
        39 => {
            // Trash Crash
            if event.on && event.velocity > 60 {
                let velocity = f64::from(event.velocity);
                registry.attach(
                    event.note,
                    Box::new(Sweep::new(
                        indices(65, 120),
                        Srgb::new(
                            velocity / 255.0,
                            velocity / (2.0 * 255.0),
                            velocity / (2.0 * 255.0),
                        ),
                        SweepOptions {
                            speed: 1.0,
                            bleed: 0.5,
                            bleed_after: true,
                            ..Default::default()
                        },
                    )),
                );
            }
        }
        52 | 57 => {
            // Sec Crash
            if event.on && event.velocity > 60 {
                registry.attach(
                    event.note,
                    Box::new(Sweep::new(
                        indices(75, 90),
                        color::from_hsluv(38.0, 1.0, 0.6),
                        SweepOptions {
                            speed: 1.0,
                            bleed: 0.5,
                            bleed_after: true,
                            ..Default::default()
                        },
                    )),
                );
            }
        }
        44 => {
            // Foot HiHat
            if !event.on || event.velocity > 60 {
                strip.set_range(59, 61, event.on, event.velocity, event.velocity / 5, 0);
            }
        }
        43 | 58 => {
            // Gong tom
            if !event.on || event.velocity > 60 {
                strip.set_range(1, 30, event.on, event.velocity, event.velocity / 5, 0);
            }
        }
        41 => {
            // Cymbal swell
            if event.on || event.velocity > 60 {
                let velocity = f64::from(event.velocity) / 255.0;
                registry.attach(
                    event.note,
                    Box::new(Sweep::new(
                        indices(85, 120),
                        Srgb::new(velocity, velocity, velocity),
                        SweepOptions {
                            speed: 3.0,
                            bleed: 0.02,
                            bleed_before: true,
                            bleed_after: true,
                        },
                    )),
                );
            }
        }
        _ => {
            strip.set_pixel(
                event.note as usize,
                event.on,
                event.velocity,
                event.velocity / 5,
                0,
            );
        }
    }
}
