//! Per-side bot autonomy flag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a side's moves are generated by the engine ("bot" mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyFlag {
    #[default]
    Off,
    On,
}

impl AutonomyFlag {
    #[inline]
    pub const fn is_on(self) -> bool {
        matches!(self, AutonomyFlag::On)
    }

    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            AutonomyFlag::Off => AutonomyFlag::On,
            AutonomyFlag::On => AutonomyFlag::Off,
        }
    }
}

impl From<bool> for AutonomyFlag {
    fn from(on: bool) -> Self {
        if on {
            AutonomyFlag::On
        } else {
            AutonomyFlag::Off
        }
    }
}

impl fmt::Display for AutonomyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutonomyFlag::Off => write!(f, "off"),
            AutonomyFlag::On => write!(f, "on"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggled_flips() {
        assert_eq!(AutonomyFlag::Off.toggled(), AutonomyFlag::On);
        assert_eq!(AutonomyFlag::On.toggled(), AutonomyFlag::Off);
    }

    #[test]
    fn from_bool() {
        assert!(AutonomyFlag::from(true).is_on());
        assert!(!AutonomyFlag::from(false).is_on());
        assert_eq!(AutonomyFlag::default(), AutonomyFlag::Off);
    }
}
