//! Tick-driven control loop: drain every pending inbound frame into the
//! device table, then emit one MIT command per elapsed period.

use crate::error::{ProtocolError, Result};
use crate::ident::MAX_NODE_ID;
use crate::limits::MitLimits;
use crate::metrics::MetricsHub;
use crate::packer::{zero_position_frame, MitCommand, NmtCommand};
use crate::table::{DeviceTable, Disposition};
use can_transport::{CanBus, CanFrame, TransportError};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Construction-time inputs of a [`ControlLoop`].
#[derive(Clone, Debug, PartialEq)]
pub struct LoopSettings {
    pub target_node: u8,
    pub period: Duration,
    pub kp: f64,
    pub kd: f64,
    pub initial_target: f64,
    /// Bounds for encoding outbound commands, independent of any device profile.
    pub command_limits: MitLimits,
}

impl LoopSettings {
    pub fn with_rate_hz(mut self, rate_hz: f64) -> Result<Self> {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return Err(ProtocolError::InvalidSetting("update rate must be a positive number"));
        }
        self.period = Duration::try_from_secs_f64(1.0 / rate_hz)
            .map_err(|_| ProtocolError::InvalidSetting("update rate out of range"))?;
        if self.period.is_zero() {
            return Err(ProtocolError::InvalidSetting("update rate out of range"));
        }
        Ok(self)
    }

    fn validate(&self, capacity: usize) -> Result<()> {
        let max = capacity.min(usize::from(MAX_NODE_ID));
        if self.target_node == 0 || usize::from(self.target_node) > max {
            return Err(ProtocolError::InvalidNode {
                node_id: self.target_node,
                max,
            });
        }
        if self.period.is_zero() {
            return Err(ProtocolError::InvalidSetting("period must be non-zero"));
        }
        if !(self.kp.is_finite() && self.kd.is_finite() && self.initial_target.is_finite()) {
            return Err(ProtocolError::InvalidSetting("gains and target must be finite"));
        }
        Ok(())
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            target_node: 1,
            period: Duration::from_millis(10),
            kp: 0.5,
            kd: 0.3,
            initial_target: 0.0,
            command_limits: MitLimits::DEFAULT,
        }
    }
}

/// Result of the command phase of one tick.
#[derive(Debug, PartialEq)]
pub enum SendOutcome {
    /// Period not yet elapsed.
    Idle,
    Sent(MitCommand),
    /// The transport rejected the frame. Not retried; the next period sends again.
    Failed(TransportError),
}

#[derive(Debug, PartialEq)]
pub struct TickReport {
    pub drained: usize,
    pub applied: usize,
    pub send: SendOutcome,
}

impl TickReport {
    pub fn sent(&self) -> Option<&MitCommand> {
        match &self.send {
            SendOutcome::Sent(cmd) => Some(cmd),
            _ => None,
        }
    }
}

/// Owns the bus and the device table for the length of a control session.
pub struct ControlLoop<B: CanBus> {
    bus: B,
    table: DeviceTable,
    settings: LoopSettings,
    target: f64,
    last_send: Instant,
    targets: Option<Receiver<f64>>,
    metrics: Option<MetricsHub>,
}

impl<B: CanBus> ControlLoop<B> {
    pub fn new(bus: B, table: DeviceTable, settings: LoopSettings) -> Result<Self> {
        Self::starting_at(bus, table, settings, Instant::now())
    }

    /// Like [`ControlLoop::new`] with an explicit start time for the send schedule.
    pub fn starting_at(
        bus: B,
        table: DeviceTable,
        settings: LoopSettings,
        now: Instant,
    ) -> Result<Self> {
        settings.validate(table.capacity())?;
        Ok(Self {
            bus,
            table,
            target: settings.initial_target,
            settings,
            last_send: now,
            targets: None,
            metrics: None,
        })
    }

    /// New targets pushed here are picked up, latest wins, at the next tick.
    pub fn with_target_channel(mut self, rx: Receiver<f64>) -> Self {
        self.targets = Some(rx);
        self
    }

    pub fn with_metrics(mut self, hub: MetricsHub) -> Self {
        self.metrics = Some(hub);
        self
    }

    pub fn table(&self) -> &DeviceTable {
        &self.table
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn set_target(&mut self, target: f64) {
        if target.is_finite() {
            self.target = target;
        } else {
            warn!(value = target, "ignoring non-finite target");
        }
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn metrics(&self) -> Option<&MetricsHub> {
        self.metrics.as_ref()
    }

    pub fn into_parts(self) -> (B, DeviceTable) {
        (self.bus, self.table)
    }

    pub fn enable(&mut self) -> Result<()> {
        let node = self.settings.target_node;
        self.transmit(&NmtCommand::Enable.to_frame(node))?;
        info!(node, "motor enabled");
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        let node = self.settings.target_node;
        self.transmit(&NmtCommand::Disable.to_frame(node))?;
        info!(node, "motor disabled");
        Ok(())
    }

    pub fn zero_position(&mut self) -> Result<()> {
        let node = self.settings.target_node;
        self.transmit(&zero_position_frame(node))?;
        info!(node, "zero position set");
        Ok(())
    }

    /// The command the next due period will emit.
    pub fn current_command(&self) -> MitCommand {
        MitCommand::position(self.target, self.settings.kp, self.settings.kd)
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Instant::now())
    }

    /// One polling step at time `now`.
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        let (drained, applied) = self.drain();
        self.take_new_target();

        let send = if now.saturating_duration_since(self.last_send) >= self.settings.period {
            // re-anchor on `now` so tick jitter never accumulates into a burst
            self.last_send = now;
            let cmd = self.current_command();
            let frame = cmd.to_frame(self.settings.target_node, &self.settings.command_limits);
            match self.transmit(&frame) {
                Ok(()) => SendOutcome::Sent(cmd),
                Err(e) => SendOutcome::Failed(e),
            }
        } else {
            SendOutcome::Idle
        };

        TickReport {
            drained,
            applied,
            send,
        }
    }

    /// Tick until `running` is cleared, sleeping `idle` between ticks.
    /// `observe` sees every report together with the current table.
    pub fn run<F>(&mut self, idle: Duration, running: &AtomicBool, mut observe: F)
    where
        F: FnMut(&TickReport, &DeviceTable),
    {
        info!(
            node = self.settings.target_node,
            period_us = self.settings.period.as_micros() as u64,
            "control loop started"
        );
        while running.load(Ordering::SeqCst) {
            let report = self.tick();
            observe(&report, &self.table);
            std::thread::sleep(idle);
        }
        info!("control loop stopped");
    }

    fn drain(&mut self) -> (usize, usize) {
        let mut drained = 0;
        let mut applied = 0;
        loop {
            match self.bus.try_recv() {
                Ok(Some(frame)) => {
                    drained += 1;
                    let disposition = self.table.apply_frame(&frame);
                    if let Some(m) = &self.metrics {
                        m.mit.rx_frames.inc();
                        m.record_disposition(&disposition);
                    }
                    match disposition {
                        Disposition::Applied { .. } => applied += 1,
                        Disposition::Ignored => {}
                        dropped => debug!(id = %frame.id, ?dropped, "heartbeat dropped"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "receive failed, ending drain for this tick");
                    if let Some(m) = &self.metrics {
                        m.mit.recv_errors.inc();
                    }
                    break;
                }
            }
        }
        (drained, applied)
    }

    fn take_new_target(&mut self) {
        let Some(rx) = &self.targets else {
            return;
        };
        let latest = rx.try_iter().last();
        if let Some(target) = latest {
            if target.is_finite() {
                info!(value = target, "target updated");
            }
            self.set_target(target);
        }
    }

    fn transmit(&mut self, frame: &CanFrame) -> Result<(), TransportError> {
        match self.bus.send(frame) {
            Ok(()) => {
                if let Some(m) = &self.metrics {
                    m.mit.tx_frames.inc();
                }
                Ok(())
            }
            Err(e) => {
                warn!(id = %frame.id, error = %e, "send failed");
                if let Some(m) = &self.metrics {
                    m.mit.send_failures.inc();
                }
                Err(e)
            }
        }
    }
}
