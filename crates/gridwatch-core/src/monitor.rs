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

//! The polling loop: one cooperative task that fetches telemetry, runs the
//! signal state machine, refreshes outage schedules, fires the pre-outage
//! trigger and dispatches notifications and actuation.
//!
//! All decision state is owned by [`Monitor`] and only touched from its own
//! task. Device I/O is the only work moved off the loop.

use crate::actuator::{ActuationReport, ActuatorController, SwitchState};
use crate::gate::should_silence;
use crate::messages::MessageRenderer;
use crate::schedule::{OutageScheduleCache, RefreshOutcome, ScheduleRefresher};
use crate::signals::SignalStateMachine;
use crate::traits::{
    CollaboratorFactory, ConfigProvider, Notifier, ScheduleExtractor, SendOptions,
    TelemetrySource,
};
use crate::trigger::OutageTrigger;
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use gridwatch_types::{
    Config, GridState, Phase, ScheduleConfig, TelegramConfig, TelemetrySnapshot, TuyaConfig,
    VictronConfig,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Wall-clock source, injectable for tests
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Default)]
struct ControlState {
    simulation: Option<Arc<dyn TelemetrySource>>,
    reinitialize: bool,
}

/// Cross-task control of a running monitor: simulation swap and reinitialize
#[derive(Clone, Default)]
pub struct MonitorHandle {
    state: Arc<Mutex<ControlState>>,
}

impl fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MonitorHandle")
            .field("simulating", &state.simulation.is_some())
            .field("reinitialize", &state.reinitialize)
            .finish()
    }
}

impl MonitorHandle {
    /// Replace live telemetry with `source` from the next cycle on
    pub fn start_simulation(&self, source: Arc<dyn TelemetrySource>) {
        info!("🎬 Simulation started with {}", source.name());
        self.state.lock().simulation = Some(source);
    }

    /// Return to live telemetry; signal state is rebuilt from the next live read
    pub fn stop_simulation(&self) {
        let mut state = self.state.lock();
        if state.simulation.take().is_some() {
            info!("🎬 Simulation stopped, reinitializing signal state");
            state.reinitialize = true;
        }
    }

    pub fn request_reinitialize(&self) {
        self.state.lock().reinitialize = true;
    }

    #[must_use]
    pub fn is_simulating(&self) -> bool {
        self.state.lock().simulation.is_some()
    }

    fn take_reinitialize(&self) -> bool {
        std::mem::take(&mut self.state.lock().reinitialize)
    }

    fn simulation(&self) -> Option<Arc<dyn TelemetrySource>> {
        self.state.lock().simulation.clone()
    }
}

/// Telemetry strategy for one cycle
#[derive(Clone)]
pub struct EvaluationContext {
    pub telemetry: Arc<dyn TelemetrySource>,
    pub simulated: bool,
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("telemetry", &self.telemetry.name())
            .field("simulated", &self.simulated)
            .finish()
    }
}

/// A collaborator built from one configuration section, rebuilt when the
/// section changes
struct Bound<C, T> {
    label: &'static str,
    section: Option<C>,
    value: Option<T>,
}

impl<C: Clone + PartialEq, T> Bound<C, T> {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            section: None,
            value: None,
        }
    }

    fn sync(&mut self, section: &C, enabled: bool, build: impl FnOnce(&C) -> Result<T>) {
        if self.section.as_ref() == Some(section) {
            return;
        }

        self.value = None;
        if !enabled {
            self.section = Some(section.clone());
            warn!("⚠️ {} not configured, disabled", self.label);
            return;
        }

        match build(section) {
            Ok(value) => {
                info!("🔧 {} (re)initialized", self.label);
                self.value = Some(value);
                self.section = Some(section.clone());
            }
            // section stays unrecorded so the next cycle retries
            Err(e) => error!("❌ Failed to initialize {}: {:#}", self.label, e),
        }
    }

    fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

/// The telemetry/alert loop
pub struct Monitor {
    config: Arc<dyn ConfigProvider>,
    factory: Arc<dyn CollaboratorFactory>,
    handle: MonitorHandle,
    clock: Clock,
    period: Duration,

    signals: SignalStateMachine,
    cache: OutageScheduleCache,
    refresher: ScheduleRefresher,
    trigger: OutageTrigger,

    telemetry: Bound<VictronConfig, Arc<dyn TelemetrySource>>,
    notifier: Bound<TelegramConfig, Arc<dyn Notifier>>,
    actuator: Bound<TuyaConfig, ActuatorController>,
    extractor: Bound<ScheduleConfig, Arc<dyn ScheduleExtractor>>,
    renderer: Option<MessageRenderer>,

    in_flight: Option<JoinHandle<ActuationReport>>,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("period", &self.period)
            .field("signals", &self.signals)
            .field("cache", &self.cache.path())
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    pub fn new(config: Arc<dyn ConfigProvider>, factory: Arc<dyn CollaboratorFactory>) -> Self {
        let initial = config.current();
        Self {
            cache: OutageScheduleCache::load(initial.system.schedule_cache_path()),
            period: initial.monitor.refresh_period(),
            config,
            factory,
            handle: MonitorHandle::default(),
            clock: Arc::new(Utc::now),
            signals: SignalStateMachine::new(),
            refresher: ScheduleRefresher::new(),
            trigger: OutageTrigger::new(),
            telemetry: Bound::new("VRM telemetry"),
            notifier: Bound::new("Telegram notifier"),
            actuator: Bound::new("Tuya device control"),
            extractor: Bound::new("Outage schedule automation"),
            renderer: None,
            in_flight: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn signals(&self) -> &SignalStateMachine {
        &self.signals
    }

    #[must_use]
    pub fn schedule_cache(&self) -> &OutageScheduleCache {
        &self.cache
    }

    /// Run until the task is dropped. A failing cycle never ends the loop.
    pub async fn run(mut self) {
        info!("🚀 Monitor started");
        loop {
            if let Err(e) = self.run_cycle().await {
                error!("❌ Cycle failed: {:#}", e);
            }
            tokio::time::sleep(self.period).await;
        }
    }

    /// Wait for the most recently dispatched actuation, if any
    pub async fn wait_for_actuation(&mut self) -> Option<ActuationReport> {
        let task = self.in_flight.take()?;
        match task.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("⚠️ Actuation task ended early: {}", e);
                None
            }
        }
    }

    /// One polling cycle
    pub async fn run_cycle(&mut self) -> Result<()> {
        let config = self.config.current();
        self.period = config.monitor.refresh_period();
        let tz = config.monitor.tz();

        if self.handle.take_reinitialize() {
            self.signals.reset();
        }
        self.sync_collaborators(&config);

        let now = (self.clock)().with_timezone(&tz);
        let scheduling = config.schedule.enabled && self.actuator.get().is_some();
        if scheduling {
            self.refresh_schedule(&config, now).await?;
        }

        let Some(context) = self.context() else {
            warn!("⚠️ No telemetry source configured, skipping cycle");
            return Ok(());
        };
        let Some(snapshot) = context.telemetry.fetch().await else {
            warn!("⚠️ No telemetry from {}, skipping cycle", context.telemetry.name());
            return Ok(());
        };
        log_snapshot(&snapshot);

        if !self.signals.is_primed() {
            self.signals.evaluate(&snapshot, &config.thresholds);
            return Ok(());
        }

        if scheduling {
            self.check_trigger(&config, &snapshot, now);
        }

        let events = self.signals.evaluate(&snapshot, &config.thresholds);
        for event in &events {
            if let Some(state) = event.actuation() {
                self.dispatch_actuation(state);
            }

            let rendered = self
                .renderer()
                .and_then(|r| r.render_alert(event, &now).map_err(Into::into));
            let text = match rendered {
                Ok(text) => text,
                Err(e) => {
                    warn!("⚠️ Failed to render alert {:?}: {:#}", event, e);
                    continue;
                }
            };
            self.notify(text, false, &config, now, context.simulated).await?;
        }

        Ok(())
    }

    fn context(&self) -> Option<EvaluationContext> {
        if let Some(telemetry) = self.handle.simulation() {
            return Some(EvaluationContext {
                telemetry,
                simulated: true,
            });
        }
        self.telemetry.get().map(|telemetry| EvaluationContext {
            telemetry: Arc::clone(telemetry),
            simulated: false,
        })
    }

    fn sync_collaborators(&mut self, config: &Config) {
        let factory = Arc::clone(&self.factory);

        self.telemetry
            .sync(&config.victron, config.victron.is_configured(), |c| {
                factory.telemetry(c)
            });
        self.notifier
            .sync(&config.telegram, config.telegram.is_configured(), |c| {
                factory.notifier(c)
            });
        self.actuator
            .sync(&config.tuya, config.tuya.is_configured(), |c| {
                factory
                    .device_transport(c)
                    .map(|transport| ActuatorController::from_config(transport, c))
            });
        self.extractor.sync(
            &config.schedule,
            config.schedule.enabled && config.schedule.is_configured(),
            |c| factory.schedule_extractor(c),
        );

        if self.renderer.as_ref().map(MessageRenderer::language) != Some(config.monitor.language) {
            match MessageRenderer::new(config.monitor.language) {
                Ok(renderer) => self.renderer = Some(renderer),
                Err(e) => error!("❌ Failed to load messages for {}: {}", config.monitor.language, e),
            }
        }

        let cache_path = config.system.schedule_cache_path();
        if self.cache.path() != cache_path {
            self.cache = OutageScheduleCache::load(cache_path);
        }
    }

    fn renderer(&self) -> Result<&MessageRenderer> {
        self.renderer
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Message catalogue not loaded"))
    }

    async fn refresh_schedule(&mut self, config: &Config, now: DateTime<Tz>) -> Result<()> {
        self.trigger.prune(now);

        let Some(extractor) = self.extractor.get().cloned() else {
            return Ok(());
        };
        let outcome = self
            .refresher
            .tick(
                extractor.as_ref(),
                &mut self.cache,
                config.schedule.refresh_interval(),
                now,
            )
            .await;

        if let RefreshOutcome::Updated(updated) = outcome {
            let simulated = self.handle.is_simulating();
            for schedule in &updated {
                let text = self.renderer()?.render_schedule_update(schedule)?;
                self.notify(text, true, config, now, simulated).await?;
            }
        }
        Ok(())
    }

    fn check_trigger(&mut self, config: &Config, snapshot: &TelemetrySnapshot, now: DateTime<Tz>) {
        if self.cache.is_empty() || snapshot.grid_state() != Some(GridState::Up) {
            return;
        }

        let due = self.trigger.due(
            now,
            &self.cache,
            config.schedule.pre_outage_lead(),
            self.period,
        );
        if !due.is_empty() {
            info!(
                "⏰ Turning devices off {} minutes before scheduled outage",
                config.schedule.pre_outage_minutes
            );
            self.dispatch_actuation(SwitchState::Off);
        }
    }

    async fn notify(
        &self,
        text: String,
        html: bool,
        config: &Config,
        now: DateTime<Tz>,
        simulated: bool,
    ) -> Result<()> {
        let text = if simulated {
            self.renderer()?.with_test_banner(&text)?
        } else {
            text
        };
        let options = SendOptions {
            silent: should_silence(&now, &config.quiet),
            html,
        };

        match self.notifier.get() {
            Some(notifier) => {
                if let Err(e) = notifier.send(&text, options).await {
                    error!("❌ Failed to deliver message via {}: {:#}", notifier.name(), e);
                }
            }
            None => info!("📭 No notifier configured, message dropped:\n{}", text),
        }
        Ok(())
    }

    /// Drive devices without blocking the loop; a newer request supersedes
    /// one still in flight.
    fn dispatch_actuation(&mut self, state: SwitchState) {
        let Some(controller) = self.actuator.get().cloned() else {
            debug!("No devices configured, skipping switch {}", state);
            return;
        };

        if let Some(previous) = self.in_flight.take() {
            if !previous.is_finished() {
                warn!("⚠️ Superseding unfinished actuation with {}", state);
                previous.abort();
            }
        }

        self.in_flight = Some(tokio::spawn(async move {
            controller.set_desired_state(state).await
        }));
    }
}

fn log_snapshot(snapshot: &TelemetrySnapshot) {
    debug!("Fetched grid: {:?}", snapshot.grid);
    debug!("Fetched ve_bus_error: {:?}", snapshot.ve_bus_error);
    debug!("Fetched ve_bus_mode: {:?}", snapshot.ve_bus_mode);
    debug!("Fetched soc: {:?}", snapshot.battery_soc);
    for phase in Phase::ALL {
        debug!(
            "Fetched L{}: in={:?}V out={:?}V out={:?}A",
            phase,
            snapshot.input_voltage(phase),
            snapshot.output_voltage(phase),
            snapshot.output_current(phase)
        );
    }
}
