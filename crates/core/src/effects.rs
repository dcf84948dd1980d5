//! Overlay audio ambience presets
//!
//! The overlay renders each preset as a Web Audio filter graph. The server
//! only decides which preset is active and how loud its noise bed is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound for any noise bed level
pub const MAX_NOISE_LEVEL: f64 = 0.10;

/// Processing preset applied to quote audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectPreset {
    /// Clean, direct audio
    #[default]
    None,
    /// Terminal/gate PA speaker
    AirportPa,
    /// Gate desk or jetway intercom
    GateDesk,
    /// Band-limited tower/center radio with hiss
    AtcRadio,
    /// Flight deck to passengers intercom
    CabinIntercom,
    /// Outdoor apron PA with a wind bed
    ApronOutdoor,
    /// Large hangar/concourse reverb
    HangarConcourse,
}

impl EffectPreset {
    pub const ALL: [EffectPreset; 7] = [
        EffectPreset::None,
        EffectPreset::AirportPa,
        EffectPreset::GateDesk,
        EffectPreset::AtcRadio,
        EffectPreset::CabinIntercom,
        EffectPreset::ApronOutdoor,
        EffectPreset::HangarConcourse,
    ];

    /// Case-insensitive parse; unknown names fall back to `None`
    pub fn parse(raw: &str) -> Self {
        let key = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EffectPreset::None => "none",
            EffectPreset::AirportPa => "airport_pa",
            EffectPreset::GateDesk => "gate_desk",
            EffectPreset::AtcRadio => "atc_radio",
            EffectPreset::CabinIntercom => "cabin_intercom",
            EffectPreset::ApronOutdoor => "apron_outdoor",
            EffectPreset::HangarConcourse => "hangar_concourse",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EffectPreset::None => "No processing, clean direct audio.",
            EffectPreset::AirportPa => "Terminal/gate PA speaker processing.",
            EffectPreset::GateDesk => "Gate desk or jetway intercom.",
            EffectPreset::AtcRadio => "ATC radio (tower/center) with band-limited audio.",
            EffectPreset::CabinIntercom => "Flight deck to passengers intercom.",
            EffectPreset::ApronOutdoor => "Outdoor apron PA with a wind/air bed.",
            EffectPreset::HangarConcourse => "Large hangar/concourse acoustics.",
        }
    }

    /// Noise bed the preset carries on its own
    pub fn noise_bed(self) -> Option<NoiseKind> {
        match self {
            EffectPreset::AtcRadio => Some(NoiseKind::Radio),
            EffectPreset::ApronOutdoor => Some(NoiseKind::Wind),
            _ => None,
        }
    }
}

impl fmt::Display for EffectPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Noise bed mixed under the quote audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseKind {
    Static,
    Radio,
    Wind,
}

/// Effects block carried by vote and settings events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    pub static_noise: bool,
    pub preset: EffectPreset,
    pub static_noise_level: f64,
    pub radio_noise_level: f64,
    pub wind_noise_level: f64,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            static_noise: false,
            preset: EffectPreset::None,
            static_noise_level: 0.02,
            radio_noise_level: 0.03,
            wind_noise_level: 0.03,
        }
    }
}

impl Effects {
    /// Build an effects block, enforcing level bounds and preset exclusivity
    pub fn new(
        static_noise: bool,
        preset: EffectPreset,
        static_level: f64,
        radio_level: f64,
        wind_level: f64,
    ) -> Self {
        Self {
            // static-only only applies when no processing preset is selected
            static_noise: static_noise && preset == EffectPreset::None,
            preset,
            static_noise_level: normalize_level(static_level),
            radio_noise_level: normalize_level(radio_level),
            wind_noise_level: normalize_level(wind_level),
        }
    }

    /// Which noise bed the active selection uses, if any
    pub fn noise_kind(&self) -> Option<NoiseKind> {
        match self.preset {
            EffectPreset::None if self.static_noise => Some(NoiseKind::Static),
            preset => preset.noise_bed(),
        }
    }

    /// Level of the active noise bed, 0.0 when there is none
    pub fn active_noise_level(&self) -> f64 {
        match self.noise_kind() {
            Some(NoiseKind::Static) => self.static_noise_level,
            Some(NoiseKind::Radio) => self.radio_noise_level,
            Some(NoiseKind::Wind) => self.wind_noise_level,
            None => 0.0,
        }
    }
}

/// Clamp to 0.0..=0.10 and round to 3 decimals
pub fn normalize_level(level: f64) -> f64 {
    if !level.is_finite() {
        return 0.0;
    }
    (level.clamp(0.0, MAX_NOISE_LEVEL) * 1000.0).round() / 1000.0
}
