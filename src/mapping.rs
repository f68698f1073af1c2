// Mapping Module - Note→preset tables, mapping files and the preview slot
use anyhow::{anyhow, bail, Context, Result};
use palette::Srgb;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::color;
use crate::effects::{Decay, DecayOptions, Effect, Static, Sweep, SweepOptions, SyncWalk, SyncWalkOptions};
use crate::midi::NoteEvent;
use crate::registry::EffectRegistry;
use crate::strip::Strip;
use crate::util;

/// Reserved note for editor-triggered preview effects.
pub const PREVIEW_NOTE: u8 = 255;
pub const MAX_MIDI_NOTE: u8 = 127;

/// On-disk mapping file. `options` stays schemaless here so saved files
/// round-trip through the editor untouched; it is parsed into a typed
/// [`EffectSpec`] when the table is installed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub presets: Vec<PresetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub note: u8,
    pub first: i64,
    pub last: i64,
    pub step: i64,
    pub color: String,
    pub effect: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// Effect kind plus its parsed options.
#[derive(Debug, Clone)]
pub enum EffectSpec {
    Static,
    Decay(DecayOptions),
    Sweep(SweepOptions),
    SyncWalk(SyncWalkOptions),
}

impl EffectSpec {
    pub fn from_parts(kind: &str, options: &serde_json::Value) -> Result<EffectSpec> {
        match kind {
            "static" => Ok(EffectSpec::Static),
            "decay" => Ok(EffectSpec::Decay(parse_options(options)?)),
            "sweep" => Ok(EffectSpec::Sweep(parse_options(options)?)),
            "syncWalk" => Ok(EffectSpec::SyncWalk(parse_options(options)?)),
            other => Err(anyhow!("unknown effect kind: {}", other)),
        }
    }

    pub fn build(&self, range: Vec<usize>, base: Srgb<f64>, velocity: u8) -> Box<dyn Effect> {
        match self {
            EffectSpec::Static => Box::new(Static::new(range, base, velocity)),
            EffectSpec::Decay(opts) => Box::new(Decay::new(range, base, velocity, opts.clone())),
            EffectSpec::Sweep(opts) => Box::new(Sweep::new(range, base, opts.clone())),
            EffectSpec::SyncWalk(opts) => {
                Box::new(SyncWalk::new(range, base, velocity, opts.clone()))
            }
        }
    }
}

fn parse_options<T: DeserializeOwned + Default>(value: &serde_json::Value) -> Result<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).context("invalid effect options")
}

/// One installed preset: expanded range, parsed color, typed effect spec.
#[derive(Debug, Clone)]
pub struct Preset {
    pub range: Vec<usize>,
    pub color: Srgb<f64>,
    pub spec: EffectSpec,
}

/// The installed note→preset table.
#[derive(Debug, Default)]
pub struct MappingTable {
    pub name: String,
    pub description: String,
    pub presets: HashMap<u8, Preset>,
}

impl MappingTable {
    /// Validate and build a table from a parsed file. Any failure leaves
    /// the caller's installed table untouched.
    pub fn from_file(file: &MappingFile, strip_len: usize) -> Result<MappingTable> {
        let mut presets = HashMap::new();
        for entry in &file.presets {
            if entry.note > MAX_MIDI_NOTE {
                bail!("preset note {} out of MIDI range", entry.note);
            }
            let range = expand_range(entry.first, entry.last, entry.step, strip_len)
                .with_context(|| format!("preset for note {}", entry.note))?;
            let color = color::from_hex(&entry.color)
                .with_context(|| format!("preset for note {}", entry.note))?;
            let spec = EffectSpec::from_parts(&entry.effect, &entry.options)
                .with_context(|| format!("preset for note {}", entry.note))?;
            // Duplicate notes: last entry wins.
            presets.insert(entry.note, Preset { range, color, spec });
        }
        Ok(MappingTable {
            name: file.name.clone(),
            description: file.description.clone(),
            presets,
        })
    }
}

/// Expand (first, last, step) and check every index against the strip.
pub fn expand_range(first: i64, last: i64, step: i64, strip_len: usize) -> Result<Vec<usize>> {
    let raw = util::make_range(first, last, step);
    if raw.is_empty() {
        bail!("empty LED range ({}..{} step {})", first, last, step);
    }
    raw.into_iter()
        .map(|i| {
            if i < 0 || i as usize >= strip_len {
                bail!("LED index {} outside strip of {}", i, strip_len)
            } else {
                Ok(i as usize)
            }
        })
        .collect()
}

/// Normalize a mapping file name: enforce a `.json` suffix and refuse
/// anything that could escape the mappings directory.
pub fn normalize_mapping_name(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        bail!("invalid mapping name: {:?}", name);
    }
    if name.ends_with(".json") {
        Ok(name.to_string())
    } else {
        Ok(format!("{}.json", name))
    }
}

/// Maps note events to effect activations through the installed table,
/// and carries the editor-facing trigger/preview entry points. Holds the
/// process-wide current mapping name.
pub struct Mapper {
    mappings_dir: PathBuf,
    strip: Arc<Strip>,
    registry: Arc<EffectRegistry>,
    table: RwLock<MappingTable>,
    current_name: RwLock<String>,
}

impl Mapper {
    pub fn new(
        mappings_dir: PathBuf,
        initial_mapping: String,
        strip: Arc<Strip>,
        registry: Arc<EffectRegistry>,
    ) -> Self {
        Mapper {
            mappings_dir,
            strip,
            registry,
            table: RwLock::new(MappingTable::default()),
            current_name: RwLock::new(initial_mapping),
        }
    }

    pub fn mappings_dir(&self) -> &Path {
        &self.mappings_dir
    }

    pub fn current_mapping(&self) -> String {
        self.current_name.read().unwrap().clone()
    }

    pub fn table_name(&self) -> String {
        self.table.read().unwrap().name.clone()
    }

    /// Route one note event through the table. Unmapped notes are dropped.
    pub fn handle(&self, event: &NoteEvent) {
        let preset = {
            let table = self.table.read().unwrap();
            table.presets.get(&event.note).cloned()
        };
        let Some(preset) = preset else {
            return;
        };
        if event.on {
            self.trigger(event.note, event.velocity, &preset);
        } else {
            self.registry.off(event.note, event.velocity);
        }
    }

    /// Manually trigger the preset for a note (REST surface).
    pub fn trigger_preset(&self, note: u8, velocity: u8) -> Result<()> {
        let preset = {
            let table = self.table.read().unwrap();
            table.presets.get(&note).cloned()
        };
        let preset = preset.ok_or_else(|| anyhow!("no mapping found for note {}", note))?;
        self.trigger(note, velocity, &preset);
        Ok(())
    }

    /// Manually release the preset for a note (REST surface).
    pub fn trigger_preset_off(&self, note: u8, velocity: u8) -> Result<()> {
        {
            let table = self.table.read().unwrap();
            if !table.presets.contains_key(&note) {
                bail!("no mapping found for note {}", note);
            }
        }
        self.registry.off(note, velocity);
        Ok(())
    }

    fn trigger(&self, note: u8, velocity: u8, preset: &Preset) {
        let range = preset.range.clone();
        let base = preset.color;
        let spec = preset.spec.clone();
        self.registry
            .retrigger_or_attach(note, velocity, move |v| spec.build(range, base, v));
    }

    /// Attach an ad-hoc effect to the preview slot with max velocity,
    /// applying the usual retrigger semantics.
    pub fn trigger_preview(
        &self,
        first: i64,
        last: i64,
        step: i64,
        color_hex: &str,
        effect_kind: &str,
        options: &serde_json::Value,
    ) -> Result<()> {
        let range = expand_range(first, last, step, self.strip.len())?;
        let base = color::from_hex(color_hex)?;
        let spec = EffectSpec::from_parts(effect_kind, options)?;
        self.registry
            .retrigger_or_attach(PREVIEW_NOTE, color::MAX_VELOCITY, move |v| {
                spec.build(range, base, v)
            });
        log::info!(
            "Preview effect triggered: {} on range {}-{} step {}",
            effect_kind,
            first,
            last,
            step
        );
        Ok(())
    }

    /// Note-off for the preview slot.
    pub fn preview_off(&self) {
        self.registry.off(PREVIEW_NOTE, 0);
    }

    /// Force-done and drop the preview effect.
    pub fn clear_preview(&self) {
        self.registry.force_done(PREVIEW_NOTE);
    }

    /// Force-done and drop every active effect.
    pub fn clear_all(&self) {
        self.registry.force_done_all();
    }

    /// Load and install a mapping file from the mappings directory. The
    /// table is fully parsed and validated before anything changes; on
    /// failure the installed table stays as it was. On success all live
    /// effects are force-done first.
    pub fn load_from_file(&self, name: &str) -> Result<()> {
        let name = normalize_mapping_name(name)?;
        let path = self.mappings_dir.join(&name);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("reading mapping file {}", path.display()))?;
        let file: MappingFile = serde_json::from_str(&data)
            .with_context(|| format!("parsing mapping file {}", name))?;
        let table = MappingTable::from_file(&file, self.strip.len())
            .with_context(|| format!("validating mapping file {}", name))?;

        self.registry.force_done_all();
        let preset_count = table.presets.len();
        let title = table.name.clone();
        *self.table.write().unwrap() = table;
        log::info!(
            "Loaded mapping '{}' with {} presets from {}",
            title,
            preset_count,
            name
        );
        Ok(())
    }

    /// Load a mapping and make it the current one.
    pub fn switch_mapping(&self, name: &str) -> Result<()> {
        let name = normalize_mapping_name(name)?;
        self.load_from_file(&name)?;
        *self.current_name.write().unwrap() = name;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static DIR_SEQ: AtomicU64 = AtomicU64::new(0);

    fn temp_mappings_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "midilight-test-{}-{}",
            std::process::id(),
            DIR_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn mapper_with(dir: PathBuf) -> (Arc<Strip>, Arc<EffectRegistry>, Mapper) {
        let strip = Arc::new(Strip::new(150));
        let registry = Arc::new(EffectRegistry::new(strip.clone()));
        let mapper = Mapper::new(dir, "live.json".to_string(), strip.clone(), registry.clone());
        (strip, registry, mapper)
    }

    const LIVE_SET: &str = r##"{
        "name": "Live Set",
        "description": "test fixture",
        "presets": [
            {"note": 36, "first": 0, "last": 5, "step": 1,
             "color": "#ff0000", "effect": "static", "options": {}},
            {"note": 38, "first": 10, "last": 20, "step": 2,
             "color": "#00ff00", "effect": "decay",
             "options": {"decay_coef": 10}},
            {"note": 40, "first": 30, "last": 50, "step": 1,
             "color": "#0000ff", "effect": "sweep",
             "options": {"speed": 1, "bleed": 0.5, "bleed_after": true}},
            {"note": 42, "first": 60, "last": 70, "step": 1,
             "color": "#ffffff", "effect": "syncWalk",
             "options": {"amount": 3}}
        ]
    }"##;

    #[test]
    fn test_effect_spec_rejects_unknown_kind() {
        let err = EffectSpec::from_parts("strobe", &serde_json::Value::Null).unwrap_err();
        assert!(err.to_string().contains("unknown effect kind"));
    }

    #[test]
    fn test_effect_spec_defaults_on_null_options() {
        assert!(EffectSpec::from_parts("decay", &serde_json::Value::Null).is_ok());
    }

    #[test]
    fn test_expand_range_bounds() {
        assert_eq!(expand_range(1, 5, 1, 150).unwrap(), vec![1, 2, 3, 4]);
        assert!(expand_range(0, 200, 1, 150).is_err());
        assert!(expand_range(-3, 3, 1, 150).is_err());
        assert!(expand_range(5, 5, 1, 150).is_err());
    }

    #[test]
    fn test_normalize_mapping_name() {
        assert_eq!(normalize_mapping_name("live").unwrap(), "live.json");
        assert_eq!(normalize_mapping_name("live.json").unwrap(), "live.json");
        assert!(normalize_mapping_name("../etc/passwd").is_err());
        assert!(normalize_mapping_name("a/b.json").is_err());
        assert!(normalize_mapping_name("").is_err());
    }

    #[test]
    fn test_load_installs_table() {
        let dir = temp_mappings_dir();
        fs::write(dir.join("live.json"), LIVE_SET).unwrap();
        let (_, _, mapper) = mapper_with(dir);
        mapper.load_from_file("live.json").unwrap();
        assert_eq!(mapper.table_name(), "Live Set");
        assert_eq!(mapper.table.read().unwrap().presets.len(), 4);
        // Step-2 range expanded exclusively.
        assert_eq!(
            mapper.table.read().unwrap().presets[&38].range,
            vec![10, 12, 14, 16, 18]
        );
    }

    #[test]
    fn test_load_twice_is_idempotent() {
        let dir = temp_mappings_dir();
        fs::write(dir.join("live.json"), LIVE_SET).unwrap();
        let (_, _, mapper) = mapper_with(dir);
        mapper.load_from_file("live.json").unwrap();
        let first: Vec<u8> = {
            let mut notes: Vec<u8> =
                mapper.table.read().unwrap().presets.keys().copied().collect();
            notes.sort_unstable();
            notes
        };
        mapper.load_from_file("live.json").unwrap();
        let second: Vec<u8> = {
            let mut notes: Vec<u8> =
                mapper.table.read().unwrap().presets.keys().copied().collect();
            notes.sort_unstable();
            notes
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_failed_load_keeps_old_table() {
        let dir = temp_mappings_dir();
        fs::write(dir.join("live.json"), LIVE_SET).unwrap();
        fs::write(dir.join("broken.json"), "{not json").unwrap();
        fs::write(
            dir.join("badkind.json"),
            r##"{"name":"x","presets":[{"note":1,"first":0,"last":5,"step":1,
                 "color":"#ffffff","effect":"strobe","options":{}}]}"##,
        )
        .unwrap();
        let (_, _, mapper) = mapper_with(dir);
        mapper.load_from_file("live.json").unwrap();

        assert!(mapper.load_from_file("missing.json").is_err());
        assert!(mapper.load_from_file("broken.json").is_err());
        assert!(mapper.load_from_file("badkind.json").is_err());
        assert_eq!(mapper.table_name(), "Live Set");
        assert_eq!(mapper.table.read().unwrap().presets.len(), 4);
    }

    #[test]
    fn test_reload_force_dones_live_effects() {
        let dir = temp_mappings_dir();
        fs::write(dir.join("live.json"), LIVE_SET).unwrap();
        fs::write(
            dir.join("other.json"),
            r##"{"name":"Other","presets":[{"note":40,"first":0,"last":5,"step":1,
                 "color":"#ff0000","effect":"static","options":{}}]}"##,
        )
        .unwrap();
        let (_, registry, mapper) = mapper_with(dir);
        mapper.load_from_file("live.json").unwrap();
        mapper.trigger_preset(36, 127).unwrap();
        mapper.trigger_preset(38, 127).unwrap();
        assert_eq!(registry.active_count(), 2);

        mapper.switch_mapping("other.json").unwrap();
        assert_eq!(registry.active_count(), 0);
        assert_eq!(mapper.current_mapping(), "other.json");

        // The new table answers for note 40 now.
        mapper.trigger_preset(40, 127).unwrap();
        assert!(registry.has_effect(40));
        assert!(mapper.trigger_preset(36, 127).is_err());
    }

    #[test]
    fn test_handle_drops_unmapped_notes() {
        let dir = temp_mappings_dir();
        fs::write(dir.join("live.json"), LIVE_SET).unwrap();
        let (_, registry, mapper) = mapper_with(dir);
        mapper.load_from_file("live.json").unwrap();
        mapper.handle(&NoteEvent {
            note: 99,
            velocity: 127,
            on: true,
            channel: 3,
        });
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_handle_on_then_off_finishes_static() {
        let dir = temp_mappings_dir();
        fs::write(dir.join("live.json"), LIVE_SET).unwrap();
        let (_, registry, mapper) = mapper_with(dir);
        mapper.load_from_file("live.json").unwrap();
        mapper.handle(&NoteEvent {
            note: 36,
            velocity: 100,
            on: true,
            channel: 3,
        });
        assert!(registry.has_effect(36));
        mapper.handle(&NoteEvent {
            note: 36,
            velocity: 64,
            on: false,
            channel: 3,
        });
        registry.tick();
        assert!(!registry.has_effect(36));
    }

    #[test]
    fn test_preview_lifecycle() {
        let dir = temp_mappings_dir();
        let (_, registry, mapper) = mapper_with(dir);
        mapper
            .trigger_preview(0, 10, 1, "#ff00ff", "static", &serde_json::json!({}))
            .unwrap();
        assert!(registry.has_effect(PREVIEW_NOTE));

        // Retriggering the static preview replaces it.
        mapper
            .trigger_preview(0, 10, 1, "#00ffff", "static", &serde_json::json!({}))
            .unwrap();
        assert!(registry.has_effect(PREVIEW_NOTE));
        assert_eq!(registry.active_count(), 1);

        mapper.clear_preview();
        assert!(!registry.has_effect(PREVIEW_NOTE));
    }

    #[test]
    fn test_preview_rejects_bad_input() {
        let dir = temp_mappings_dir();
        let (_, _, mapper) = mapper_with(dir);
        assert!(mapper
            .trigger_preview(0, 10, 1, "#zz0000", "static", &serde_json::Value::Null)
            .is_err());
        assert!(mapper
            .trigger_preview(0, 10, 1, "#ff0000", "wobble", &serde_json::Value::Null)
            .is_err());
        assert!(mapper
            .trigger_preview(0, 500, 1, "#ff0000", "static", &serde_json::Value::Null)
            .is_err());
    }
}
