use crate::table::Disposition;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct LoopMetrics {
    pub tx_frames: IntCounter,
    pub rx_frames: IntCounter,
    pub heartbeats_applied: IntCounter,
    pub frames_dropped: IntCounterVec,
    pub send_failures: IntCounter,
    pub recv_errors: IntCounter,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub mit: LoopMetrics,
}

impl MetricsHub {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let mit = LoopMetrics {
            tx_frames: IntCounter::new("mit_can_tx_frames_total", "Total CAN frames sent")?,
            rx_frames: IntCounter::new("mit_can_rx_frames_total", "Total CAN frames received")?,
            heartbeats_applied: IntCounter::new(
                "mit_heartbeats_applied_total",
                "Heartbeats decoded into the device table",
            )?,
            frames_dropped: IntCounterVec::new(
                Opts::new(
                    "mit_frames_dropped_total",
                    "Received frames not applied to the device table",
                ),
                &["reason"],
            )?,
            send_failures: IntCounter::new(
                "mit_send_failures_total",
                "Outbound frames the transport rejected",
            )?,
            recv_errors: IntCounter::new(
                "mit_recv_errors_total",
                "Transport errors while draining the receive queue",
            )?,
        };
        registry.register(Box::new(mit.tx_frames.clone()))?;
        registry.register(Box::new(mit.rx_frames.clone()))?;
        registry.register(Box::new(mit.heartbeats_applied.clone()))?;
        registry.register(Box::new(mit.frames_dropped.clone()))?;
        registry.register(Box::new(mit.send_failures.clone()))?;
        registry.register(Box::new(mit.recv_errors.clone()))?;
        Ok(Self { registry, mit })
    }

    pub fn record_disposition(&self, disposition: &Disposition) {
        match disposition {
            Disposition::Applied { .. } => self.mit.heartbeats_applied.inc(),
            other => self
                .mit
                .frames_dropped
                .with_label_values(&[other.reason()])
                .inc(),
        }
    }

    pub fn dropped(&self, reason: &str) -> u64 {
        self.mit.frames_dropped.with_label_values(&[reason]).get()
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
