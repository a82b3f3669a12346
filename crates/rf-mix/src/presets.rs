//! Static preset tables
//!
//! Track presets (name → processing chain) and genre presets (bus gains,
//! sidechain routes, loudness target, per-role track presets). Both tables
//! are built once on first use and never mutated.

use once_cell::sync::Lazy;
use rf_dsp::{CompressorConfig, EqBand, TransientConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::FRAC_1_SQRT_2;

use crate::error::{MixError, MixResult};
use crate::role::TrackRole;
use crate::sidechain::SidechainRoute;

/// Per-track processing chain: saturate → EQ → compress → transient → gain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackPreset {
    pub name: String,
    /// tanh drive, `<= 1` bypasses saturation
    pub drive: f64,
    pub eq: Vec<EqBand>,
    pub compressor: CompressorConfig,
    pub transient: TransientConfig,
    pub output_gain_db: f64,
}

impl Default for TrackPreset {
    fn default() -> Self {
        Self {
            name: "clean".to_string(),
            drive: 1.0,
            eq: Vec::new(),
            compressor: CompressorConfig::unity(),
            transient: TransientConfig::default(),
            output_gain_db: 0.0,
        }
    }
}

impl TrackPreset {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn drive(mut self, drive: f64) -> Self {
        self.drive = drive;
        self
    }

    fn eq(mut self, bands: Vec<EqBand>) -> Self {
        self.eq = bands;
        self
    }

    fn comp(mut self, compressor: CompressorConfig) -> Self {
        self.compressor = compressor;
        self
    }

    fn transient(mut self, attack_pct: f64, sustain_pct: f64) -> Self {
        self.transient = TransientConfig::new(attack_pct, sustain_pct);
        self
    }

    fn gain(mut self, db: f64) -> Self {
        self.output_gain_db = db;
        self
    }
}

static TRACK_PRESETS: Lazy<HashMap<&'static str, TrackPreset>> = Lazy::new(|| {
    let q = FRAC_1_SQRT_2;
    let presets = [
        TrackPreset::named("clean"),
        TrackPreset::named("kick_punchy")
            .eq(vec![
                EqBand::highpass(30.0, q),
                EqBand::peak(60.0, 3.0, 1.0),
                EqBand::peak(350.0, -3.0, 1.5),
                EqBand::peak(4000.0, 2.0, 1.0),
            ])
            .comp(CompressorConfig::new(-18.0, 4.0, 10.0, 80.0))
            .transient(30.0, -10.0),
        TrackPreset::named("drums_generic")
            .eq(vec![
                EqBand::highpass(40.0, q),
                EqBand::high_shelf(8000.0, 2.0, q),
            ])
            .comp(CompressorConfig::new(-16.0, 3.0, 5.0, 100.0))
            .transient(15.0, 0.0),
        TrackPreset::named("trap_808")
            .drive(3.0)
            .eq(vec![
                EqBand::highpass(25.0, q),
                EqBand::peak(55.0, 3.0, 1.0),
                EqBand::lowpass(5000.0, q),
            ])
            .comp(CompressorConfig::new(-12.0, 4.0, 5.0, 150.0).with_makeup(2.0))
            .gain(-1.0),
        TrackPreset::named("trap_hihat")
            .eq(vec![
                EqBand::highpass(400.0, q),
                EqBand::high_shelf(10000.0, 3.0, q),
            ])
            .comp(CompressorConfig::new(-20.0, 2.0, 1.0, 50.0))
            .transient(40.0, -30.0)
            .gain(-3.0),
        TrackPreset::named("boom_bap_drums")
            .drive(1.5)
            .eq(vec![
                EqBand::highpass(45.0, q),
                EqBand::peak(100.0, 2.0, 1.0),
                EqBand::lowpass(12000.0, q),
            ])
            .comp(CompressorConfig::new(-14.0, 4.0, 15.0, 120.0).with_makeup(1.0))
            .transient(20.0, 10.0),
        TrackPreset::named("lofi_drums")
            .drive(2.0)
            .eq(vec![
                EqBand::highpass(60.0, q),
                EqBand::lowpass(8000.0, q),
            ])
            .comp(CompressorConfig::new(-16.0, 3.0, 20.0, 150.0))
            .transient(-20.0, 20.0)
            .gain(-2.0),
        TrackPreset::named("lofi_keys")
            .drive(1.8)
            .eq(vec![
                EqBand::highpass(120.0, q),
                EqBand::peak(800.0, 1.5, 0.8),
                EqBand::lowpass(6000.0, q),
            ])
            .comp(CompressorConfig::new(-20.0, 2.0, 30.0, 200.0))
            .gain(-2.0),
        TrackPreset::named("house_kick")
            .eq(vec![
                EqBand::highpass(30.0, q),
                EqBand::peak(50.0, 4.0, 1.2),
                EqBand::peak(300.0, -4.0, 1.5),
            ])
            .comp(CompressorConfig::new(-14.0, 4.0, 5.0, 60.0))
            .transient(40.0, -20.0),
        TrackPreset::named("house_bass")
            .drive(1.4)
            .eq(vec![
                EqBand::highpass(35.0, q),
                EqBand::peak(90.0, 2.0, 1.0),
                EqBand::lowpass(3000.0, q),
            ])
            .comp(CompressorConfig::new(-16.0, 4.0, 10.0, 100.0))
            .gain(-1.0),
        TrackPreset::named("bass_generic")
            .eq(vec![
                EqBand::highpass(30.0, q),
                EqBand::peak(250.0, -2.0, 1.0),
            ])
            .comp(CompressorConfig::new(-18.0, 3.0, 15.0, 120.0)),
        TrackPreset::named("melodic_generic")
            .eq(vec![
                EqBand::highpass(100.0, q),
                EqBand::peak(400.0, -1.5, 1.0),
            ])
            .comp(CompressorConfig::new(-20.0, 2.0, 20.0, 150.0))
            .gain(-2.0),
        TrackPreset::named("edm_lead")
            .drive(1.6)
            .eq(vec![
                EqBand::highpass(150.0, q),
                EqBand::peak(2500.0, 2.0, 1.0),
                EqBand::high_shelf(9000.0, 2.0, q),
            ])
            .comp(CompressorConfig::new(-18.0, 3.0, 5.0, 100.0))
            .transient(10.0, 0.0)
            .gain(-2.0),
        TrackPreset::named("edm_pad")
            .eq(vec![
                EqBand::highpass(200.0, q),
                EqBand::peak(600.0, -2.0, 0.8),
            ])
            .comp(CompressorConfig::new(-22.0, 2.0, 40.0, 300.0))
            .transient(-30.0, 20.0)
            .gain(-4.0),
        TrackPreset::named("vocal_lead")
            .eq(vec![
                EqBand::highpass(80.0, q),
                EqBand::peak(300.0, -2.0, 1.2),
                EqBand::peak(3000.0, 2.0, 1.0),
                EqBand::high_shelf(10000.0, 1.5, q),
            ])
            .comp(CompressorConfig::new(-20.0, 3.5, 5.0, 80.0).with_makeup(2.0)),
        TrackPreset::named("fx_generic")
            .eq(vec![EqBand::highpass(150.0, q)])
            .comp(CompressorConfig::new(-24.0, 2.0, 20.0, 200.0))
            .gain(-4.0),
    ];
    // Same order as PRESET_NAMES
    PRESET_NAMES.into_iter().zip(presets).collect()
});

const PRESET_NAMES: [&str; 16] = [
    "clean",
    "kick_punchy",
    "drums_generic",
    "trap_808",
    "trap_hihat",
    "boom_bap_drums",
    "lofi_drums",
    "lofi_keys",
    "house_kick",
    "house_bass",
    "bass_generic",
    "melodic_generic",
    "edm_lead",
    "edm_pad",
    "vocal_lead",
    "fx_generic",
];

/// Look up a registered track preset
pub fn track_preset(name: &str) -> MixResult<&'static TrackPreset> {
    TRACK_PRESETS
        .get(name.trim())
        .ok_or_else(|| MixError::UnknownPreset(name.to_string()))
}

/// Every registered track preset name
pub fn preset_names() -> &'static [&'static str] {
    &PRESET_NAMES
}

/// Genre bundle: bus balance, sidechain routes, loudness target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenrePreset {
    pub name: String,
    /// Bus trim (dB), keyed by bus name
    pub bus_gains_db: BTreeMap<String, f64>,
    pub sidechains: Vec<SidechainRoute>,
    pub target_lufs: f64,
    /// Track preset per role, overriding the role default
    pub role_presets: BTreeMap<TrackRole, String>,
}

impl GenrePreset {
    /// Track preset for `role` under this genre
    pub fn preset_for(&self, role: TrackRole) -> &str {
        self.role_presets
            .get(&role)
            .map(String::as_str)
            .unwrap_or_else(|| role.default_preset())
    }
}

struct GenreRow {
    name: &'static str,
    target_lufs: f64,
    bus_gains: &'static [(&'static str, f64)],
    /// (target bus, depth) ducked by the kick bus
    kick_ducks: &'static [(&'static str, f64)],
    roles: &'static [(TrackRole, &'static str)],
}

const GENRES: [GenreRow; 8] = [
    GenreRow {
        name: "trap",
        target_lufs: -10.0,
        bus_gains: &[("kick", 0.0), ("drums", -2.0), ("bass", -1.0), ("melodic", -4.0), ("fx", -8.0)],
        kick_ducks: &[("bass", 0.8)],
        roles: &[(TrackRole::Bass, "trap_808"), (TrackRole::Drums, "trap_hihat")],
    },
    GenreRow {
        name: "boom_bap",
        target_lufs: -11.0,
        bus_gains: &[("kick", 0.0), ("drums", 0.0), ("bass", -2.0), ("melodic", -4.0), ("fx", -8.0)],
        kick_ducks: &[("bass", 0.4)],
        roles: &[(TrackRole::Drums, "boom_bap_drums"), (TrackRole::Kick, "boom_bap_drums")],
    },
    GenreRow {
        name: "lofi",
        target_lufs: -14.0,
        bus_gains: &[("kick", -2.0), ("drums", -3.0), ("bass", -3.0), ("melodic", -1.0), ("fx", -6.0)],
        kick_ducks: &[("melodic", 0.3)],
        roles: &[(TrackRole::Drums, "lofi_drums"), (TrackRole::Melodic, "lofi_keys")],
    },
    GenreRow {
        name: "house",
        target_lufs: -9.0,
        bus_gains: &[("kick", 0.0), ("drums", -3.0), ("bass", -2.0), ("melodic", -4.0), ("fx", -6.0)],
        kick_ducks: &[("bass", 0.9), ("melodic", 0.5)],
        roles: &[(TrackRole::Kick, "house_kick"), (TrackRole::Bass, "house_bass")],
    },
    GenreRow {
        name: "edm",
        target_lufs: -8.0,
        bus_gains: &[("kick", 0.0), ("drums", -3.0), ("bass", -2.0), ("melodic", -3.0), ("fx", -5.0)],
        kick_ducks: &[("bass", 0.9), ("melodic", 0.7)],
        roles: &[(TrackRole::Kick, "house_kick"), (TrackRole::Melodic, "edm_lead")],
    },
    GenreRow {
        name: "pop",
        target_lufs: -11.0,
        bus_gains: &[("kick", -1.0), ("drums", -2.0), ("bass", -2.0), ("melodic", -3.0), ("fx", -8.0)],
        kick_ducks: &[("bass", 0.3)],
        roles: &[],
    },
    GenreRow {
        name: "rock",
        target_lufs: -10.0,
        bus_gains: &[("kick", -1.0), ("drums", 0.0), ("bass", -2.0), ("melodic", -1.0), ("fx", -10.0)],
        kick_ducks: &[],
        roles: &[],
    },
    GenreRow {
        name: "ambient",
        target_lufs: -16.0,
        bus_gains: &[("kick", -6.0), ("drums", -6.0), ("bass", -4.0), ("melodic", 0.0), ("fx", -2.0)],
        kick_ducks: &[],
        roles: &[(TrackRole::Melodic, "edm_pad")],
    },
];

static GENRE_PRESETS: Lazy<HashMap<&'static str, GenrePreset>> = Lazy::new(|| {
    GENRES
        .iter()
        .map(|g| {
            let preset = GenrePreset {
                name: g.name.to_string(),
                bus_gains_db: g
                    .bus_gains
                    .iter()
                    .map(|&(bus, db)| (bus.to_string(), db))
                    .collect(),
                sidechains: g
                    .kick_ducks
                    .iter()
                    .map(|&(target, depth)| SidechainRoute::new("kick", target).with_depth(depth))
                    .collect(),
                target_lufs: g.target_lufs,
                role_presets: g
                    .roles
                    .iter()
                    .map(|&(role, preset)| (role, preset.to_string()))
                    .collect(),
            };
            (g.name, preset)
        })
        .collect()
});

fn normalize_genre(name: &str) -> String {
    let key = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    match key.as_str() {
        "boombap" | "hip_hop" | "hiphop" => "boom_bap".to_string(),
        "lo_fi" | "lofi_hip_hop" => "lofi".to_string(),
        "deep_house" | "tech_house" => "house".to_string(),
        "electronic" | "dance" => "edm".to_string(),
        _ => key,
    }
}

/// Look up a genre bundle; names are case- and separator-insensitive
pub fn genre_preset(name: &str) -> MixResult<&'static GenrePreset> {
    GENRE_PRESETS
        .get(normalize_genre(name).as_str())
        .ok_or_else(|| MixError::UnknownGenre(name.to_string()))
}

/// Every registered genre name
pub fn genre_names() -> Vec<&'static str> {
    GENRES.iter().map(|g| g.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48000.0;

    #[test]
    fn test_every_name_is_registered() {
        for name in preset_names() {
            let preset = track_preset(name).unwrap();
            assert_eq!(preset.name, *name);
        }
        assert_eq!(TRACK_PRESETS.len(), PRESET_NAMES.len());
    }

    #[test]
    fn test_presets_are_valid() {
        for name in preset_names() {
            let preset = track_preset(name).unwrap();
            for band in &preset.eq {
                band.validate(SR).unwrap();
            }
            preset.compressor.validate().unwrap();
            preset.transient.validate().unwrap();
        }
    }

    #[test]
    fn test_unknown_preset_is_error() {
        assert_eq!(
            track_preset("polka_tuba"),
            Err(MixError::UnknownPreset("polka_tuba".to_string()))
        );
    }

    #[test]
    fn test_trap_808_drive() {
        assert_eq!(track_preset("trap_808").unwrap().drive, 3.0);
    }

    #[test]
    fn test_genre_lookup_normalizes() {
        assert_eq!(genre_preset("Boom-Bap").unwrap().name, "boom_bap");
        assert_eq!(genre_preset("hip hop").unwrap().name, "boom_bap");
        assert_eq!(genre_preset(" TRAP ").unwrap().name, "trap");
        assert!(matches!(genre_preset("polka"), Err(MixError::UnknownGenre(_))));
    }

    #[test]
    fn test_genre_role_presets_resolve() {
        for genre in genre_names() {
            let preset = genre_preset(genre).unwrap();
            for role in TrackRole::ALL {
                track_preset(preset.preset_for(role)).unwrap();
            }
            for route in &preset.sidechains {
                route.validate().unwrap();
            }
        }
        assert_eq!(genre_preset("trap").unwrap().preset_for(TrackRole::Bass), "trap_808");
        assert_eq!(genre_preset("pop").unwrap().preset_for(TrackRole::Vocal), "vocal_lead");
    }

    #[test]
    fn test_track_preset_from_json() {
        let preset: TrackPreset =
            serde_json::from_str(r#"{"name": "custom", "drive": 2.0, "output_gain_db": -3.0}"#)
                .unwrap();
        assert_eq!(preset.drive, 2.0);
        assert!(preset.eq.is_empty());
        assert_eq!(preset.compressor, CompressorConfig::unity());
    }
}
