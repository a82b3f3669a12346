//! Track roles supplied by the upstream renderer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MixError;

/// What a track is, musically; selects its default bus and preset
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TrackRole {
    Kick,
    Drums,
    Bass,
    #[default]
    Melodic,
    Vocal,
    Fx,
}

impl TrackRole {
    pub const ALL: [TrackRole; 6] = [
        TrackRole::Kick,
        TrackRole::Drums,
        TrackRole::Bass,
        TrackRole::Melodic,
        TrackRole::Vocal,
        TrackRole::Fx,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kick => "kick",
            Self::Drums => "drums",
            Self::Bass => "bass",
            Self::Melodic => "melodic",
            Self::Vocal => "vocal",
            Self::Fx => "fx",
        }
    }

    /// Bus a track of this role lands on. Vocals share the melodic bus.
    pub fn default_bus(self) -> &'static str {
        match self {
            Self::Kick => "kick",
            Self::Drums => "drums",
            Self::Bass => "bass",
            Self::Melodic | Self::Vocal => "melodic",
            Self::Fx => "fx",
        }
    }

    /// Track preset used when neither the track nor the genre names one
    pub fn default_preset(self) -> &'static str {
        match self {
            Self::Kick => "kick_punchy",
            Self::Drums => "drums_generic",
            Self::Bass => "bass_generic",
            Self::Melodic => "melodic_generic",
            Self::Vocal => "vocal_lead",
            Self::Fx => "fx_generic",
        }
    }
}

impl fmt::Display for TrackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackRole {
    type Err = MixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "kick" | "kick_drum" | "bd" => Ok(Self::Kick),
            "drums" | "drum" | "percussion" | "perc" | "hihat" | "hats" | "snare" => {
                Ok(Self::Drums)
            }
            "bass" | "808" | "sub" | "sub_bass" => Ok(Self::Bass),
            "melodic" | "keys" | "piano" | "pad" | "lead" | "synth" | "chords" | "guitar"
            | "strings" => Ok(Self::Melodic),
            "vocal" | "vocals" | "vox" | "voice" => Ok(Self::Vocal),
            "fx" | "sfx" | "effects" | "riser" | "ambience" => Ok(Self::Fx),
            _ => Err(MixError::UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!("808".parse::<TrackRole>().unwrap(), TrackRole::Bass);
        assert_eq!("Keys".parse::<TrackRole>().unwrap(), TrackRole::Melodic);
        assert_eq!("percussion".parse::<TrackRole>().unwrap(), TrackRole::Drums);
        assert_eq!(" VOX ".parse::<TrackRole>().unwrap(), TrackRole::Vocal);
        assert!(matches!(
            "kazoo".parse::<TrackRole>(),
            Err(MixError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_vocal_shares_melodic_bus() {
        assert_eq!(TrackRole::Vocal.default_bus(), "melodic");
        assert_eq!(TrackRole::Vocal.default_preset(), "vocal_lead");
    }

    #[test]
    fn test_round_trip_names() {
        for role in TrackRole::ALL {
            assert_eq!(role.as_str().parse::<TrackRole>().unwrap(), role);
        }
    }
}
