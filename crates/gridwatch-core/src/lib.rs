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

pub mod actuator;
pub mod gate;
pub mod messages;
pub mod monitor;
pub mod schedule;
pub mod signals;
pub mod simulation;
pub mod traits;
pub mod trigger;

pub use actuator::{ActuationReport, ActuatorController, DeviceOutcome, SwitchState};
pub use gate::should_silence;
pub use messages::{MessageRenderer, TIMESTAMP_FORMAT};
pub use monitor::{Clock, EvaluationContext, Monitor, MonitorHandle};
pub use schedule::{OutageScheduleCache, RefreshOutcome, ScheduleRefresher, parse_schedule_reply};
pub use signals::{AlertEvent, SignalStateMachine};
pub use simulation::ScriptedTelemetry;
pub use traits::{
    CollaboratorFactory, ConfigProvider, DeviceTransport, Notifier, ScheduleExtractor,
    SendOptions, StaticConfig, TelemetrySource, TransportError, TransportResult,
};
pub use trigger::OutageTrigger;
