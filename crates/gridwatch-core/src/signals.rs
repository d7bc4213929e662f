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

//! Signal state machine: turns consecutive telemetry snapshots into
//! debounced alert and recovery events.

use crate::actuator::SwitchState;
use gridwatch_types::{AlertThresholds, GridState, Phase, StatusReading, TelemetrySnapshot};
use gridwatch_types::telemetry::VE_BUS_NO_ERROR_CODE;
use tracing::{debug, info, warn};

/// Lower edge of the recovery band around nominal voltage
const VOLTAGE_NORMAL_LOW_RATIO: f64 = 0.955;
/// Upper edge of the recovery band around nominal voltage
const VOLTAGE_NORMAL_HIGH_RATIO: f64 = 1.045;

const POWER_BREACH_RATIO: f64 = 0.98;
const POWER_RESET_RATIO: f64 = 0.80;
const PASSTHRU_BREACH_RATIO: f64 = 0.98;
const PASSTHRU_RESET_RATIO: f64 = 0.85;

/// Consecutive breaching cycles needed before a load alert fires
const BREACH_CYCLES_TO_ALERT: u32 = 2;

/// One alert or recovery emitted by the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    GridDown,
    GridUp,
    VeBusError { error: String },
    VeBusRecovered,
    BatteryLow { soc: f64 },
    BatteryCritical { soc: f64 },
    VoltageLow { phase: Phase, voltage: f64 },
    VoltageHigh { phase: Phase, voltage: f64 },
    VoltageNormal { phase: Phase, voltage: f64 },
    CriticalLoad { phase: Phase, power_w: f64 },
    PassthruOverload { phase: Phase, current_a: f64 },
}

impl AlertEvent {
    /// Message catalogue id used to render this event
    #[must_use]
    pub fn message_id(&self) -> &'static str {
        match self {
            Self::GridDown => "grid-down",
            Self::GridUp => "grid-up",
            Self::VeBusError { .. } => "ve-bus-error",
            Self::VeBusRecovered => "ve-bus-recovered",
            Self::BatteryLow { .. } => "battery-low",
            Self::BatteryCritical { .. } => "battery-critical",
            Self::VoltageLow { .. } => "voltage-low",
            Self::VoltageHigh { .. } => "voltage-high",
            Self::VoltageNormal { .. } => "voltage-normal",
            Self::CriticalLoad { .. } => "critical-load",
            Self::PassthruOverload { .. } => "passthru-overload",
        }
    }

    /// Template parameters, already formatted for display (timestamp excluded)
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::GridDown | Self::GridUp | Self::VeBusRecovered => vec![],
            Self::VeBusError { error } => vec![("error", error.clone())],
            Self::BatteryLow { soc } | Self::BatteryCritical { soc } => {
                vec![("soc", soc.to_string())]
            }
            Self::VoltageLow { phase, voltage }
            | Self::VoltageHigh { phase, voltage }
            | Self::VoltageNormal { phase, voltage } => vec![
                ("phase", phase.to_string()),
                ("voltage", format!("{voltage:.1}")),
            ],
            Self::CriticalLoad { phase, power_w } => vec![
                ("phase", phase.to_string()),
                ("power", format!("{power_w:.2}")),
            ],
            Self::PassthruOverload { phase, current_a } => vec![
                ("phase", phase.to_string()),
                ("current", format!("{current_a:.2}")),
            ],
        }
    }

    /// Switch state the actuator must be driven to, if this event requests one
    #[must_use]
    pub fn actuation(&self) -> Option<SwitchState> {
        match self {
            Self::GridDown => Some(SwitchState::Off),
            Self::GridUp => Some(SwitchState::On),
            _ => None,
        }
    }
}

/// Breach counter with hysteresis for power/current conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BreachTracker {
    consecutive: u32,
    reported: bool,
}

impl BreachTracker {
    /// Feed one sample; returns true when an alert must fire
    fn observe(&mut self, value: f64, breach_above: f64, reset_below: f64) -> bool {
        if value > breach_above {
            self.consecutive = self.consecutive.saturating_add(1);
            if self.consecutive >= BREACH_CYCLES_TO_ALERT && !self.reported {
                self.reported = true;
                return true;
            }
        } else if value < reset_below {
            self.consecutive = 0;
            self.reported = false;
        }
        false
    }

    /// No reading this cycle: counter restarts, outstanding alert stays
    fn missing(&mut self) {
        self.consecutive = 0;
    }
}

/// Per-signal memory between polling cycles
#[derive(Debug, Clone, Default)]
pub struct SignalStateMachine {
    primed: bool,
    grid: Option<GridState>,
    ve_bus_error: Option<i64>,
    last_soc: Option<f64>,
    battery_low_reported: bool,
    battery_critical_reported: bool,
    voltage_reported: [bool; 3],
    power: [BreachTracker; 3],
    passthru: [BreachTracker; 3],
}

impl SignalStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the priming read has happened since construction or the last reset
    #[must_use]
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Forget everything; the next snapshot primes again
    pub fn reset(&mut self) {
        info!("🔄 Signal state reset");
        *self = Self::default();
    }

    /// Last accepted grid state
    #[must_use]
    pub fn grid(&self) -> Option<GridState> {
        self.grid
    }

    /// Evaluate one snapshot and return the events it produces.
    ///
    /// The first snapshot after (re)initialization only seeds the state.
    pub fn evaluate(
        &mut self,
        snapshot: &TelemetrySnapshot,
        thresholds: &AlertThresholds,
    ) -> Vec<AlertEvent> {
        if !self.primed {
            self.prime(snapshot, thresholds);
            return Vec::new();
        }

        let mut events = Vec::new();
        self.evaluate_grid(snapshot, &mut events);
        self.evaluate_ve_bus(snapshot.ve_bus_error.as_ref(), &mut events);
        self.evaluate_battery(snapshot.battery_soc, thresholds, &mut events);
        self.evaluate_voltage(snapshot, thresholds, &mut events);
        self.evaluate_output_power(snapshot, thresholds, &mut events);
        self.evaluate_passthru(snapshot, thresholds, &mut events);
        events
    }

    fn prime(&mut self, snapshot: &TelemetrySnapshot, thresholds: &AlertThresholds) {
        self.grid = snapshot.grid_state();
        self.ve_bus_error = snapshot.ve_bus_error.as_ref().map(|s| s.code);
        self.last_soc = snapshot.battery_soc;
        if let Some(soc) = snapshot.battery_soc {
            self.battery_low_reported = soc <= thresholds.battery_low_soc;
            self.battery_critical_reported = soc <= thresholds.battery_critical_soc;
        }

        let nominal = thresholds.nominal_voltage;
        let low = nominal * thresholds.voltage_low_ratio;
        let high = nominal * thresholds.voltage_high_ratio;
        for phase in Phase::ALL {
            if let Some(voltage) = snapshot.input_voltage(phase).filter(|v| *v > 0.0) {
                self.voltage_reported[phase.index()] = voltage < low || voltage > high;
            }
        }
        self.primed = true;
        info!(
            "🧭 Signal state primed: grid={:?}, ve_bus_error={:?}, soc={:?}",
            self.grid, self.ve_bus_error, self.last_soc
        );
    }

    fn evaluate_grid(&mut self, snapshot: &TelemetrySnapshot, events: &mut Vec<AlertEvent>) {
        let Some(reading) = snapshot.grid.as_ref() else {
            debug!("Grid reading absent, no action taken");
            return;
        };
        let Some(state) = GridState::from_code(reading.code) else {
            warn!("⚠️ Unexpected grid alarm value {}, ignoring", reading);
            return;
        };
        if self.grid == Some(state) {
            return;
        }

        match state {
            GridState::Down => {
                info!("🔌 Grid status changed to DOWN: {}", reading.label);
                events.push(AlertEvent::GridDown);
            }
            GridState::Up => {
                info!("🔌 Grid status changed to RESTORED: {}", reading.label);
                events.push(AlertEvent::GridUp);
            }
        }
        self.grid = Some(state);
    }

    fn evaluate_ve_bus(&mut self, reading: Option<&StatusReading>, events: &mut Vec<AlertEvent>) {
        let Some(reading) = reading else {
            return;
        };
        let previous = self.ve_bus_error.replace(reading.code);
        if previous == Some(reading.code) {
            return;
        }

        if reading.code == VE_BUS_NO_ERROR_CODE {
            if previous.is_some() {
                info!("🔧 VE.Bus error cleared");
                events.push(AlertEvent::VeBusRecovered);
            }
        } else {
            info!("🚨 VE.Bus error: {}", reading);
            events.push(AlertEvent::VeBusError {
                error: reading.label.clone(),
            });
        }
    }

    fn evaluate_battery(
        &mut self,
        soc: Option<f64>,
        thresholds: &AlertThresholds,
        events: &mut Vec<AlertEvent>,
    ) {
        let Some(soc) = soc else {
            return;
        };

        if let Some(last) = self.last_soc {
            let low = thresholds.battery_low_soc;
            let critical = thresholds.battery_critical_soc;

            if last > low && soc <= low && !self.battery_low_reported {
                info!("🪫 Low battery detected: SOC={}%", soc);
                self.battery_low_reported = true;
                events.push(AlertEvent::BatteryLow { soc });
            }
            if last > critical && soc <= critical && !self.battery_critical_reported {
                info!("🪫 Critical battery detected: SOC={}%", soc);
                self.battery_critical_reported = true;
                events.push(AlertEvent::BatteryCritical { soc });
            }

            if soc > low && self.battery_low_reported {
                info!("🔋 SOC recovered above low threshold: SOC={}%", soc);
                self.battery_low_reported = false;
            }
            if soc > critical && self.battery_critical_reported {
                info!("🔋 SOC recovered above critical threshold: SOC={}%", soc);
                self.battery_critical_reported = false;
            }
        }

        self.last_soc = Some(soc);
    }

    fn evaluate_voltage(
        &mut self,
        snapshot: &TelemetrySnapshot,
        thresholds: &AlertThresholds,
        events: &mut Vec<AlertEvent>,
    ) {
        let nominal = thresholds.nominal_voltage;
        let low = nominal * thresholds.voltage_low_ratio;
        let high = nominal * thresholds.voltage_high_ratio;
        let normal = (nominal * VOLTAGE_NORMAL_LOW_RATIO)..=(nominal * VOLTAGE_NORMAL_HIGH_RATIO);

        for phase in Phase::ALL {
            // 0 V means the phase is not wired / no signal
            let Some(voltage) = snapshot.input_voltage(phase).filter(|v| *v > 0.0) else {
                continue;
            };
            let reported = &mut self.voltage_reported[phase.index()];

            if voltage < low && !*reported {
                info!("📉 Phase {} input voltage low: {:.1}V", phase, voltage);
                *reported = true;
                events.push(AlertEvent::VoltageLow { phase, voltage });
            } else if voltage > high && !*reported {
                info!("📈 Phase {} input voltage high: {:.1}V", phase, voltage);
                *reported = true;
                events.push(AlertEvent::VoltageHigh { phase, voltage });
            } else if normal.contains(&voltage) && *reported {
                info!("🆗 Phase {} input voltage normal: {:.1}V", phase, voltage);
                *reported = false;
                events.push(AlertEvent::VoltageNormal { phase, voltage });
            }
        }
    }

    fn evaluate_output_power(
        &mut self,
        snapshot: &TelemetrySnapshot,
        thresholds: &AlertThresholds,
        events: &mut Vec<AlertEvent>,
    ) {
        if snapshot.grid_state() != Some(GridState::Down) {
            return;
        }
        let Some(max_power) = thresholds.max_power_w else {
            return;
        };

        for phase in Phase::ALL {
            let tracker = &mut self.power[phase.index()];
            let Some(current) = snapshot.output_current(phase) else {
                tracker.missing();
                continue;
            };

            let power_w = thresholds.nominal_voltage * current;
            if tracker.observe(
                power_w,
                max_power * POWER_BREACH_RATIO,
                max_power * POWER_RESET_RATIO,
            ) {
                info!(
                    "‼️ Phase {} - MAX POWER ALERT! Voltage: {:?}V, Current: {}A, Power: {:.2}W",
                    phase,
                    snapshot.output_voltage(phase),
                    current,
                    power_w
                );
                events.push(AlertEvent::CriticalLoad { phase, power_w });
            }
        }
    }

    fn evaluate_passthru(
        &mut self,
        snapshot: &TelemetrySnapshot,
        thresholds: &AlertThresholds,
        events: &mut Vec<AlertEvent>,
    ) {
        if !snapshot.is_passthru() {
            return;
        }
        let Some(max_current) = thresholds.max_passthru_current_a else {
            return;
        };

        for phase in Phase::ALL {
            let tracker = &mut self.passthru[phase.index()];
            let Some(current_a) = snapshot.output_current(phase) else {
                tracker.missing();
                continue;
            };

            if tracker.observe(
                current_a,
                max_current * PASSTHRU_BREACH_RATIO,
                max_current * PASSTHRU_RESET_RATIO,
            ) {
                info!(
                    "‼️ Phase {} - PASSTHRU MAX CURRENT ALERT! Voltage: {:?}V, Current: {:.2}A",
                    phase,
                    snapshot.output_voltage(phase),
                    current_a
                );
                events.push(AlertEvent::PassthruOverload { phase, current_a });
            }
        }
    }
}
