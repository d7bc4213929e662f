// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of GridWatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! One polling cycle's worth of readings from the backup-power installation.
//!
//! Every field is optional: a reading the upstream source omitted stays `None`
//! and is never replaced by zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw grid alarm code reported while the grid is present
pub const GRID_UP_CODE: i64 = 0;
/// Raw grid alarm code reported while the grid is lost
pub const GRID_DOWN_CODE: i64 = 2;
/// Raw VE.Bus state code of the passthru mode
pub const PASSTHRU_CODE: i64 = 9;
/// Raw VE.Bus error code meaning "no error"
pub const VE_BUS_NO_ERROR_CODE: i64 = 0;

/// A coded status as delivered by the installation (code + human label)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReading {
    pub code: i64,
    #[serde(default)]
    pub label: String,
}

impl StatusReading {
    pub fn new(code: i64, label: impl Into<String>) -> Self {
        Self {
            code,
            label: label.into(),
        }
    }
}

impl fmt::Display for StatusReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.label)
    }
}

/// Interpreted grid alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridState {
    Up,
    Down,
}

impl GridState {
    /// Map a raw grid alarm code, `None` for codes with no defined meaning
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            GRID_UP_CODE => Some(Self::Up),
            GRID_DOWN_CODE => Some(Self::Down),
            _ => None,
        }
    }
}

/// Inverter/charger operating mode as far as the alert rules care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum VeBusMode {
    /// Grid power passes through to the loads with bounded current capacity
    Passthru,
    /// Any other VE.Bus state, kept with its raw code
    Other(i64),
}

impl VeBusMode {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Passthru => PASSTHRU_CODE,
            Self::Other(code) => code,
        }
    }
}

impl From<i64> for VeBusMode {
    fn from(code: i64) -> Self {
        if code == PASSTHRU_CODE {
            Self::Passthru
        } else {
            Self::Other(code)
        }
    }
}

impl From<VeBusMode> for i64 {
    fn from(mode: VeBusMode) -> Self {
        mode.code()
    }
}

/// AC phase of a three-phase installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    L1,
    L2,
    L3,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::L1, Phase::L2, Phase::L3];

    /// 1-based phase number used in messages
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::L1 => 1,
            Self::L2 => 2,
            Self::L3 => 3,
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.number() - 1)
    }

    /// Phase from its 1-based number
    #[must_use]
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::L1),
            2 => Some(Self::L2),
            3 => Some(Self::L3),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Immutable read of one polling cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySnapshot {
    /// Grid alarm (code 0 = grid present, 2 = grid lost)
    pub grid: Option<StatusReading>,
    /// VE.Bus error (code 0 = no error)
    pub ve_bus_error: Option<StatusReading>,
    /// VE.Bus operating mode
    pub ve_bus_mode: Option<VeBusMode>,
    /// Battery state of charge (0-100%)
    pub battery_soc: Option<f64>,
    /// Per-phase AC input voltage (V)
    pub input_voltage: [Option<f64>; 3],
    /// Per-phase AC output voltage (V)
    pub output_voltage: [Option<f64>; 3],
    /// Per-phase AC output current (A)
    pub output_current: [Option<f64>; 3],
}

impl TelemetrySnapshot {
    /// Interpreted grid state, `None` when absent or the code is unexpected
    #[must_use]
    pub fn grid_state(&self) -> Option<GridState> {
        self.grid.as_ref().and_then(|g| GridState::from_code(g.code))
    }

    #[must_use]
    pub fn input_voltage(&self, phase: Phase) -> Option<f64> {
        self.input_voltage[phase.index()]
    }

    #[must_use]
    pub fn output_voltage(&self, phase: Phase) -> Option<f64> {
        self.output_voltage[phase.index()]
    }

    #[must_use]
    pub fn output_current(&self, phase: Phase) -> Option<f64> {
        self.output_current[phase.index()]
    }

    #[must_use]
    pub fn is_passthru(&self) -> bool {
        self.ve_bus_mode == Some(VeBusMode::Passthru)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_state_codes() {
        assert_eq!(GridState::from_code(0), Some(GridState::Up));
        assert_eq!(GridState::from_code(2), Some(GridState::Down));
        assert_eq!(GridState::from_code(1), None);
    }

    #[test]
    fn test_ve_bus_mode_roundtrips_raw_code() {
        assert_eq!(VeBusMode::from(9), VeBusMode::Passthru);
        assert_eq!(VeBusMode::from(3), VeBusMode::Other(3));
        assert_eq!(i64::from(VeBusMode::Passthru), 9);
    }

    #[test]
    fn test_snapshot_fixture_format() {
        let json = r#"{
            "grid": {"code": 2, "label": "Grid lost"},
            "ve_bus_mode": 9,
            "battery_soc": 54.5,
            "output_current": [18.0, null, 2.5]
        }"#;
        let snapshot: TelemetrySnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.grid_state(), Some(GridState::Down));
        assert!(snapshot.is_passthru());
        assert_eq!(snapshot.battery_soc, Some(54.5));
        assert_eq!(snapshot.output_current(Phase::L1), Some(18.0));
        assert_eq!(snapshot.output_current(Phase::L2), None);
        assert_eq!(snapshot.input_voltage(Phase::L3), None);
        assert!(snapshot.ve_bus_error.is_none());
    }

    #[test]
    fn test_phase_numbering() {
        assert_eq!(Phase::from_number(2), Some(Phase::L2));
        assert_eq!(Phase::from_number(4), None);
        assert_eq!(Phase::L3.index(), 2);
        assert_eq!(Phase::L1.to_string(), "1");
    }
}
