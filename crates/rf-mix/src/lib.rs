//! rf-mix: Mixdown engine for ReelForge
//!
//! Turns rendered, role-tagged track buffers into one mastered stereo buffer:
//! per-track presets, named buses with inserts and sends, sidechain ducking,
//! constant-power panning, then the `rf-master` chain.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rf_mix::{TrackInput, TrackRole, mix_tracks};
//!
//! let tracks = vec![
//!     TrackInput::new("kick", kick, TrackRole::Kick),
//!     TrackInput::new("808", bass, TrackRole::Bass),
//! ];
//! let out = mix_tracks(48000.0, &tracks, Some("trap"))?;
//! println!("{:.1} LUFS, {:.1} dBTP", out.integrated_lufs, out.true_peak_db);
//! ```

pub mod bus;
pub mod engine;
pub mod error;
pub mod pan;
pub mod presets;
pub mod role;
pub mod sidechain;
pub mod track;

pub use bus::{BusConfig, InsertEffect, MixBus};
pub use engine::{DEFAULT_BUSES, MASTER_BUS, MixEngine, MixOutput, TrackInput};
pub use error::{MixError, MixResult};
pub use pan::{constant_power_gains, pan_stereo};
pub use presets::{
    GenrePreset, TrackPreset, genre_names, genre_preset, preset_names, track_preset,
};
pub use role::TrackRole;
pub use sidechain::{SidechainRoute, apply_sidechain, duck_gain_curve};
pub use track::TrackProcessor;

/// Process, route, mix and master a set of tracks in one call
pub fn mix_tracks(
    sample_rate: f64,
    tracks: &[TrackInput],
    genre: Option<&str>,
) -> MixResult<MixOutput> {
    let mut engine = match genre {
        Some(genre) => MixEngine::for_genre(sample_rate, genre)?,
        None => MixEngine::new(sample_rate)?,
    };
    for track in tracks {
        engine.add_track(track)?;
    }
    engine.mix()
}
