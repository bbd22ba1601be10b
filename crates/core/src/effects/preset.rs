use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::PhosphorError;

/// Enable flags for the three effect channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnabledFlags {
    pub crt: bool,
    pub scanlines: bool,
    pub vhs: bool,
}

impl EnabledFlags {
    pub const fn new(crt: bool, scanlines: bool, vhs: bool) -> Self {
        Self { crt, scanlines, vhs }
    }
}

/// Named combinations of enable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preset {
    Clean,
    EightiesTv,
    VhsLater,
    /// Any combination that is not one of the named presets.
    Custom,
}

impl Preset {
    /// Presets that carry a fixed set of flags.
    pub const NAMED: [Preset; 3] = [Self::Clean, Self::EightiesTv, Self::VhsLater];

    pub fn name(self) -> &'static str {
        match self {
            Self::Clean => "Clean",
            Self::EightiesTv => "80s TV",
            Self::VhsLater => "VHS (later)",
            Self::Custom => "Custom",
        }
    }

    /// Flags this preset applies. `Custom` has none of its own.
    pub fn flags(self) -> Option<EnabledFlags> {
        match self {
            Self::Clean => Some(EnabledFlags::new(false, false, false)),
            Self::EightiesTv => Some(EnabledFlags::new(true, true, false)),
            Self::VhsLater => Some(EnabledFlags::new(true, true, true)),
            Self::Custom => None,
        }
    }

    /// Returns the named preset equal to `flags`, or [`Preset::Custom`].
    pub fn matching(flags: EnabledFlags) -> Self {
        Self::NAMED
            .into_iter()
            .find(|preset| preset.flags() == Some(flags))
            .unwrap_or(Self::Custom)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = PhosphorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalised.as_str() {
            "clean" => Ok(Self::Clean),
            "80stv" | "eightiestv" | "tv" => Ok(Self::EightiesTv),
            "vhslater" | "vhs" => Ok(Self::VhsLater),
            "custom" => Ok(Self::Custom),
            _ => Err(PhosphorError::UnknownPreset(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_named_presets() {
        assert_eq!(Preset::matching(EnabledFlags::default()), Preset::Clean);
        assert_eq!(Preset::matching(EnabledFlags::new(true, true, false)), Preset::EightiesTv);
        assert_eq!(Preset::matching(EnabledFlags::new(true, true, true)), Preset::VhsLater);
    }

    #[test]
    fn other_combinations_are_custom() {
        assert_eq!(Preset::matching(EnabledFlags::new(false, false, true)), Preset::Custom);
        assert_eq!(Preset::matching(EnabledFlags::new(true, false, true)), Preset::Custom);
    }

    #[test]
    fn parses_display_names_and_slugs() {
        assert_eq!("80s TV".parse::<Preset>().unwrap(), Preset::EightiesTv);
        assert_eq!("80s-tv".parse::<Preset>().unwrap(), Preset::EightiesTv);
        assert_eq!("VHS (later)".parse::<Preset>().unwrap(), Preset::VhsLater);
        assert_eq!("clean".parse::<Preset>().unwrap(), Preset::Clean);
        assert!("sepia".parse::<Preset>().is_err());
    }
}
