// Registry Module - Lifecycle of active effects and the animator tick
use std::sync::{Arc, RwLock};

use crate::color;
use crate::effects::Effect;
use crate::strip::Strip;

struct ActiveEffect {
    note: u8,
    effect: Box<dyn Effect>,
}

/// The set of live effects, keyed by note (255 is the editor's preview
/// slot) and iterated in insertion order. Owns effect lifecycle: it applies
/// their outputs into the strip each tick and drops them once done.
///
/// Lock order: the registry lock is never held across a strip call.
pub struct EffectRegistry {
    strip: Arc<Strip>,
    effects: RwLock<Vec<ActiveEffect>>,
}

impl EffectRegistry {
    pub fn new(strip: Arc<Strip>) -> Self {
        EffectRegistry {
            strip,
            effects: RwLock::new(Vec::new()),
        }
    }

    /// Insert an effect for a note, replacing a previous one in place. The
    /// replaced effect was already dealt with by the retrigger policy.
    pub fn attach(&self, note: u8, effect: Box<dyn Effect>) {
        let mut effects = self.effects.write().unwrap();
        match effects.iter_mut().find(|e| e.note == note) {
            Some(slot) => slot.effect = effect,
            None => effects.push(ActiveEffect { note, effect }),
        }
    }

    /// Retrigger the live effect for `note` if it has one; when the live
    /// effect reports it was superseded (or none exists), build a fresh one
    /// with `build` and attach it.
    pub fn retrigger_or_attach<F>(&self, note: u8, velocity: u8, build: F)
    where
        F: FnOnce(u8) -> Box<dyn Effect>,
    {
        let mut effects = self.effects.write().unwrap();
        if let Some(slot) = effects.iter_mut().find(|e| e.note == note) {
            if !slot.effect.retrigger(velocity) {
                // Still authoritative; keep it.
                return;
            }
            slot.effect = build(velocity);
            return;
        }
        effects.push(ActiveEffect {
            note,
            effect: build(velocity),
        });
    }

    /// Deliver a note-off to the live effect, if any. No removal here;
    /// effects leave the registry when they report done during a tick.
    pub fn off(&self, note: u8, velocity: u8) {
        let effects = self.effects.read().unwrap();
        if let Some(slot) = effects.iter().find(|e| e.note == note) {
            slot.effect.off_event(velocity);
        }
    }

    /// One animator step: compose every effect's next values into a black
    /// scratch frame ("non-black wins", insertion order), commit it to the
    /// strip, then collect effects that reported done.
    pub fn tick(&self) {
        let mut scratch = vec![color::black(); self.strip.len()];
        let mut any_done = false;
        {
            let effects = self.effects.read().unwrap();
            for active in effects.iter() {
                let values = active.effect.next_values();
                for (value, &index) in values.iter().zip(active.effect.range()) {
                    if index < scratch.len() && !color::is_almost_black(*value) {
                        scratch[index] = *value;
                    }
                }
                if active.effect.is_done() {
                    any_done = true;
                }
            }
        }

        self.strip.commit(&scratch);

        if any_done {
            let mut effects = self.effects.write().unwrap();
            effects.retain(|e| !e.effect.is_done());
        }
    }

    /// Force-done and drop the effect for one note, if present.
    pub fn force_done(&self, note: u8) {
        let mut effects = self.effects.write().unwrap();
        effects.retain(|e| {
            if e.note == note {
                e.effect.set_done();
                false
            } else {
                true
            }
        });
    }

    /// Force-done and drop every live effect.
    pub fn force_done_all(&self) {
        let mut effects = self.effects.write().unwrap();
        let count = effects.len();
        for active in effects.iter() {
            active.effect.set_done();
        }
        effects.clear();
        if count > 0 {
            log::info!("Cleared all active effects ({} stopped)", count);
        }
    }

    pub fn active_count(&self) -> usize {
        self.effects.read().unwrap().len()
    }

    pub fn has_effect(&self, note: u8) -> bool {
        self.effects.read().unwrap().iter().any(|e| e.note == note)
    }
}
