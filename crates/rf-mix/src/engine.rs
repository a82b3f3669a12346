//! Mix engine
//!
//! Tracks land on named buses. `mix()` processes every bus (inserts, fader,
//! mute/solo gate, sends), applies sidechain ducking, pans and sums into the
//! master bus, then runs the master chain. Bus audio is drained by each
//! successful render; settings persist.

use rf_core::{AudioBuffer, RfError, ensure_finite, ensure_range};
use rf_master::{LUFS_FLOOR, LoudnessMeasurement, MasterChain, MasterConfig};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::bus::{BusConfig, InsertEffect, MixBus};
use crate::error::{MixError, MixResult};
use crate::pan::pan_stereo;
use crate::presets::{GenrePreset, genre_preset};
use crate::role::TrackRole;
use crate::sidechain::{SidechainRoute, apply_sidechain, duck_gain_curve};
use crate::track::TrackProcessor;

/// Bus everything sums into
pub const MASTER_BUS: &str = "master";

/// Buses every engine starts with
pub const DEFAULT_BUSES: [&str; 8] = [
    "kick", "drums", "bass", "melodic", "fx", "reverb", "delay", MASTER_BUS,
];

/// One rendered track handed over by the upstream renderer
#[derive(Debug, Clone)]
pub struct TrackInput {
    pub name: String,
    pub audio: AudioBuffer,
    pub role: TrackRole,
    /// Overrides the genre/role preset
    pub preset: Option<String>,
    /// Overrides the role's bus
    pub bus: Option<String>,
    pub gain_db: f64,
}

impl TrackInput {
    pub fn new(name: impl Into<String>, audio: AudioBuffer, role: TrackRole) -> Self {
        Self {
            name: name.into(),
            audio,
            role,
            preset: None,
            bus: None,
            gain_db: 0.0,
        }
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_bus(mut self, bus: impl Into<String>) -> Self {
        self.bus = Some(bus.into());
        self
    }

    pub fn with_gain(mut self, gain_db: f64) -> Self {
        self.gain_db = gain_db;
        self
    }
}

/// Mastered render plus the figures the file writer reports
#[derive(Debug, Clone)]
pub struct MixOutput {
    /// Stereo, `(0, 2)` when nothing was mixed
    pub audio: AudioBuffer,
    pub integrated_lufs: f64,
    pub true_peak_db: f64,
    pub sample_peak_db: f64,
    pub normalization_gain_db: f64,
    pub loudness: LoudnessMeasurement,
}

impl MixOutput {
    fn empty() -> Self {
        Self {
            audio: AudioBuffer::empty_stereo(),
            integrated_lufs: LUFS_FLOOR,
            true_peak_db: f64::NEG_INFINITY,
            sample_peak_db: f64::NEG_INFINITY,
            normalization_gain_db: 0.0,
            loudness: LoudnessMeasurement::silence(),
        }
    }
}

/// Bus-based mixer for one sample rate
#[derive(Debug, Clone)]
pub struct MixEngine {
    sample_rate: f64,
    buses: BTreeMap<String, MixBus>,
    sidechains: Vec<SidechainRoute>,
    master: MasterConfig,
    processor: TrackProcessor,
    genre: Option<&'static GenrePreset>,
}

impl MixEngine {
    pub fn new(sample_rate: f64) -> MixResult<Self> {
        if !(sample_rate.is_finite() && (8000.0..=384000.0).contains(&sample_rate)) {
            return Err(RfError::InvalidSampleRate(sample_rate.max(0.0) as u32).into());
        }
        let buses = DEFAULT_BUSES
            .iter()
            .map(|&name| {
                let mut bus = MixBus::new(name);
                bus.config.solo_safe = matches!(name, "reverb" | "delay");
                (name.to_string(), bus)
            })
            .collect();
        Ok(Self {
            sample_rate,
            buses,
            sidechains: Vec::new(),
            master: MasterConfig::default(),
            processor: TrackProcessor::new(sample_rate)?,
            genre: None,
        })
    }

    /// Engine preloaded with a genre's bus gains, sidechains and loudness target
    pub fn for_genre(sample_rate: f64, genre: &str) -> MixResult<Self> {
        let preset = genre_preset(genre)?;
        let mut engine = Self::new(sample_rate)?;
        for (bus, gain_db) in &preset.bus_gains_db {
            engine.create_bus(bus)?;
            engine.set_bus_gain(bus, *gain_db)?;
        }
        for route in &preset.sidechains {
            engine.add_sidechain(route.clone())?;
        }
        engine.master.target_lufs = preset.target_lufs;
        engine.genre = Some(preset);
        log::debug!(
            "mix engine: genre '{}' ({} sidechains, target {:.1} LUFS)",
            preset.name,
            preset.sidechains.len(),
            preset.target_lufs
        );
        Ok(engine)
    }

    pub fn with_master_config(mut self, config: MasterConfig) -> MixResult<Self> {
        config.validate(self.sample_rate)?;
        self.master = config;
        Ok(self)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn master_config(&self) -> &MasterConfig {
        &self.master
    }

    pub fn genre(&self) -> Option<&GenrePreset> {
        self.genre
    }

    pub fn sidechains(&self) -> &[SidechainRoute] {
        &self.sidechains
    }

    /// Create an empty bus; existing buses are left alone
    pub fn create_bus(&mut self, name: &str) -> MixResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MixError::InvalidRoute("bus name is empty".to_string()));
        }
        if !self.buses.contains_key(name) {
            log::debug!("mix engine: created bus '{name}'");
            self.buses.insert(name.to_string(), MixBus::new(name));
        }
        Ok(())
    }

    pub fn bus(&self, name: &str) -> Option<&MixBus> {
        self.buses.get(name)
    }

    pub fn bus_names(&self) -> Vec<&str> {
        self.buses.keys().map(String::as_str).collect()
    }

    fn bus_mut(&mut self, name: &str) -> MixResult<&mut MixBus> {
        self.buses
            .get_mut(name)
            .ok_or_else(|| MixError::UnknownBus(name.to_string()))
    }

    /// Sum audio into a bus, creating it if needed
    pub fn add_to_bus(&mut self, name: &str, audio: &AudioBuffer, gain_db: f64) -> MixResult<()> {
        ensure_finite("bus input gain_db", gain_db)?;
        self.create_bus(name)?;
        self.bus_mut(name.trim())?.add_audio(audio, gain_db);
        Ok(())
    }

    /// Run a track through its preset and onto its bus
    pub fn add_track(&mut self, track: &TrackInput) -> MixResult<()> {
        let preset = match (&track.preset, self.genre) {
            (Some(name), _) => name.as_str(),
            (None, Some(genre)) => genre.preset_for(track.role),
            (None, None) => track.role.default_preset(),
        };
        let bus = track
            .bus
            .as_deref()
            .unwrap_or_else(|| track.role.default_bus());

        let processed = self.processor.process(&track.audio, preset)?;
        log::debug!(
            "track '{}' ({}): preset '{preset}' -> bus '{bus}'",
            track.name,
            track.role
        );
        self.add_to_bus(bus, &processed, track.gain_db)
    }

    /// Replace a bus's settings; rejected settings leave the old ones in place
    pub fn configure_bus(&mut self, name: &str, config: BusConfig) -> MixResult<()> {
        config.validate(self.sample_rate)?;
        for target in config.sends.keys() {
            self.check_send_target(name, target)?;
        }
        let previous = std::mem::replace(&mut self.bus_mut(name)?.config, config);
        if let Err(e) = self.processing_order() {
            self.bus_mut(name)?.config = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn set_bus_gain(&mut self, name: &str, gain_db: f64) -> MixResult<()> {
        ensure_finite("bus gain_db", gain_db)?;
        self.bus_mut(name)?.config.gain_db = gain_db;
        Ok(())
    }

    pub fn set_bus_pan(&mut self, name: &str, pan: f64) -> MixResult<()> {
        ensure_range("bus pan", pan, -1.0, 1.0)?;
        self.bus_mut(name)?.config.pan = pan;
        Ok(())
    }

    pub fn set_mute(&mut self, name: &str, mute: bool) -> MixResult<()> {
        self.bus_mut(name)?.config.mute = mute;
        Ok(())
    }

    pub fn set_solo(&mut self, name: &str, solo: bool) -> MixResult<()> {
        self.bus_mut(name)?.config.solo = solo;
        Ok(())
    }

    pub fn add_insert(&mut self, name: &str, insert: InsertEffect) -> MixResult<()> {
        insert.validate(self.sample_rate)?;
        self.bus_mut(name)?.config.inserts.push(insert);
        Ok(())
    }

    /// Post-fader send; level 0 removes it
    pub fn set_send(&mut self, source: &str, target: &str, level: f64) -> MixResult<()> {
        ensure_range("send level", level, 0.0, 4.0)?;
        self.check_send_target(source, target)?;

        let sends = &mut self.bus_mut(source)?.config.sends;
        if level == 0.0 {
            sends.remove(target);
            return Ok(());
        }
        let previous = sends.insert(target.to_string(), level);

        if let Err(e) = self.processing_order() {
            let sends = &mut self.bus_mut(source)?.config.sends;
            match previous {
                Some(old) => sends.insert(target.to_string(), old),
                None => sends.remove(target),
            };
            return Err(e);
        }
        Ok(())
    }

    fn check_send_target(&self, source: &str, target: &str) -> MixResult<()> {
        if !self.buses.contains_key(source) {
            return Err(MixError::UnknownBus(source.to_string()));
        }
        if !self.buses.contains_key(target) {
            return Err(MixError::UnknownBus(target.to_string()));
        }
        if source == MASTER_BUS || target == MASTER_BUS {
            return Err(MixError::InvalidRoute(format!(
                "send {source} -> {target}: the master bus cannot send or be sent to"
            )));
        }
        if source == target {
            return Err(MixError::InvalidRoute(format!("bus '{source}' cannot send to itself")));
        }
        Ok(())
    }

    pub fn add_sidechain(&mut self, route: SidechainRoute) -> MixResult<()> {
        route.validate()?;
        for bus in [&route.trigger, &route.target] {
            if !self.buses.contains_key(bus.as_str()) {
                return Err(MixError::UnknownBus(bus.clone()));
            }
            if bus == MASTER_BUS {
                return Err(MixError::InvalidRoute(
                    "the master bus cannot take part in a sidechain".to_string(),
                ));
            }
        }
        if route.trigger == route.target {
            return Err(MixError::InvalidRoute(format!(
                "bus '{}' cannot duck itself",
                route.trigger
            )));
        }
        self.sidechains.push(route);
        Ok(())
    }

    /// Non-master buses ordered so every send source precedes its target
    fn processing_order(&self) -> MixResult<Vec<String>> {
        let names: Vec<&str> = self
            .buses
            .keys()
            .map(String::as_str)
            .filter(|&n| n != MASTER_BUS)
            .collect();

        let mut incoming: BTreeMap<&str, usize> = names.iter().map(|&n| (n, 0)).collect();
        for &name in &names {
            for target in self.buses[name].config.sends.keys() {
                if let Some(count) = incoming.get_mut(target.as_str()) {
                    *count += 1;
                }
            }
        }

        let mut ready: VecDeque<&str> = incoming
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&n, _)| n)
            .collect();
        let mut order = Vec::with_capacity(names.len());
        while let Some(name) = ready.pop_front() {
            order.push(name.to_string());
            for target in self.buses[name].config.sends.keys() {
                if let Some(count) = incoming.get_mut(target.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(target.as_str());
                    }
                }
            }
        }

        if order.len() < names.len() {
            let stuck: Vec<&str> = incoming
                .iter()
                .filter(|&(_, &count)| count > 0)
                .map(|(&n, _)| n)
                .collect();
            return Err(MixError::InvalidRoute(format!(
                "send cycle between buses: {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// Render every bus into one mastered stereo buffer.
    ///
    /// Bus audio is cleared only when the render succeeds; after an error the
    /// accumulated audio is still in place.
    pub fn mix(&mut self) -> MixResult<MixOutput> {
        let output = self.render()?;
        for bus in self.buses.values_mut() {
            bus.take_audio();
        }
        Ok(output)
    }

    fn render(&self) -> MixResult<MixOutput> {
        let order = self.processing_order()?;
        log::debug!("mix: bus order {}", order.join(" -> "));
        let mut chain = MasterChain::new(self.master.clone(), self.sample_rate)?;

        let mut pending: BTreeMap<&str, AudioBuffer> = self
            .buses
            .iter()
            .map(|(name, bus)| (name.as_str(), bus.audio.clone()))
            .collect();

        let any_solo = self
            .buses
            .values()
            .any(|b| b.name != MASTER_BUS && b.config.solo);
        // Send targets of a soloed bus stay audible
        let mut fed_by_solo: BTreeSet<&str> = BTreeSet::new();

        // 1. inserts, fader, mute/solo gate, sends
        let mut outputs: BTreeMap<&str, AudioBuffer> = BTreeMap::new();
        for name in &order {
            let name = name.as_str();
            let bus = &self.buses[name];
            let input = pending.remove(name).unwrap_or_default();
            if input.is_empty() {
                continue;
            }
            let soloed = bus.config.solo || fed_by_solo.contains(name);
            let solo_excluded = any_solo && !soloed && !bus.config.solo_safe;
            if bus.config.mute || solo_excluded {
                log::trace!("bus '{name}': gated (mute/solo)");
                continue;
            }

            let processed = bus.process_chain(&input, self.sample_rate)?;
            for (target, level) in &bus.config.sends {
                if let Some(dest) = pending.get_mut(target.as_str()) {
                    dest.mix_in(&processed, *level);
                    if any_solo && soloed {
                        log::debug!("bus '{target}': audible through send from soloed '{name}'");
                        fed_by_solo.insert(target.as_str());
                    }
                }
            }
            outputs.insert(name, processed);
        }

        // 2. sidechain ducking on processed bus audio
        for route in &self.sidechains {
            let Some(trigger) = outputs.get(route.trigger.as_str()) else {
                if outputs.contains_key(route.target.as_str()) {
                    log::warn!(
                        "sidechain {} -> {}: trigger bus is silent",
                        route.trigger,
                        route.target
                    );
                }
                continue;
            };
            let curve = duck_gain_curve(trigger, route, self.sample_rate);
            if let Some(target) = outputs.get_mut(route.target.as_str()) {
                apply_sidechain(target, &curve);
                log::debug!(
                    "sidechain {} -> {}: depth {:.2}",
                    route.trigger,
                    route.target,
                    route.depth
                );
            }
        }

        // 3. pan and sum
        let mut sum = AudioBuffer::empty_stereo();
        for (name, audio) in &outputs {
            let pan = self.buses[*name].config.pan;
            sum.mix_in(&pan_stereo(audio, pan), 1.0);
        }

        if let Some(master_bus) = self.buses.get(MASTER_BUS) {
            if let Some(direct) = pending.remove(MASTER_BUS) {
                if !direct.is_empty() {
                    sum.mix_in(&direct, 1.0);
                }
            }
            if master_bus.config.mute {
                sum = AudioBuffer::empty_stereo();
            } else if !sum.is_empty() {
                let processed = master_bus.process_chain(&sum, self.sample_rate)?;
                sum = pan_stereo(&processed, master_bus.config.pan);
            }
        }

        if sum.is_empty() {
            log::debug!("mix engine: no bus audio, returning empty render");
            return Ok(MixOutput::empty());
        }

        // 4. master chain and loudness normalization
        let mastered = chain.process(&sum)?;
        log::info!(
            "mix: {} buses, {} frames, {:.2} LUFS, {:.2} dBTP",
            outputs.len(),
            mastered.audio.len(),
            mastered.loudness.integrated_lufs,
            mastered.loudness.true_peak_db
        );

        Ok(MixOutput {
            integrated_lufs: mastered.loudness.integrated_lufs,
            true_peak_db: mastered.loudness.true_peak_db,
            sample_peak_db: mastered.loudness.sample_peak_db,
            normalization_gain_db: mastered.normalization_gain_db,
            loudness: mastered.loudness,
            audio: mastered.audio,
        })
    }
}
