//! Orchestrator - The periodic monitoring cycle
//!
//! ## Responsibilities
//!
//! - Pull a metrics snapshot every cycle
//! - Run visual analysis when a frame is present
//! - Evaluate alerts and broadcast the composite update
//!
//! One cycle failing (sensor read, frame decode) is logged and the loop
//! retries on the next period; the loop only exits on explicit stop.

use crate::alerts::AlertEngine;
use crate::classifier::AnalysisSuite;
use crate::error::Result;
use crate::realtime_hub::{RealtimeHub, SensorUpdate};
use crate::sensors::MetricsSource;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Default cycle period
pub const DEFAULT_CYCLE: Duration = Duration::from_secs(10);

/// MonitorOrchestrator instance
pub struct MonitorOrchestrator {
    source: Arc<dyn MetricsSource>,
    analysis: Arc<AnalysisSuite>,
    engine: Arc<AlertEngine>,
    hub: Arc<RealtimeHub>,
    period: Duration,
    running: Arc<RwLock<bool>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorOrchestrator {
    /// Create a new orchestrator with the default 10-second period
    pub fn new(
        source: Arc<dyn MetricsSource>,
        analysis: Arc<AnalysisSuite>,
        engine: AlertEngine,
        hub: Arc<RealtimeHub>,
    ) -> Self {
        Self {
            source,
            analysis,
            engine: Arc::new(engine),
            hub,
            period: DEFAULT_CYCLE,
            running: Arc::new(RwLock::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Override the cycle period
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Start the monitoring loop (idempotent)
    pub async fn start(&self) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!("Orchestrator already running");
                return;
            }
            *running = true;
        }

        tracing::info!(period_secs = self.period.as_secs(), "Starting orchestrator");

        let source = self.source.clone();
        let analysis = self.analysis.clone();
        let engine = self.engine.clone();
        let hub = self.hub.clone();
        let running = self.running.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut interval = interval(period);

            loop {
                interval.tick().await;

                {
                    let is_running = running.read().await;
                    if !*is_running {
                        break;
                    }
                }

                match Self::cycle(&source, &analysis, &engine, &hub).await {
                    Ok(update) => {
                        tracing::debug!(alerts = update.alerts.len(), "Cycle complete");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Cycle failed, retrying next period");
                    }
                }
            }

            tracing::info!("Orchestrator stopped");
        });

        let mut slot = self.handle.lock().await;
        *slot = Some(handle);
    }

    /// Stop the loop and join it (idempotent)
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }
        tracing::info!("Stopping orchestrator");
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Run a single cycle immediately, returning the broadcast update
    pub async fn run_once(&self) -> Result<SensorUpdate> {
        Self::cycle(&self.source, &self.analysis, &self.engine, &self.hub).await
    }

    async fn cycle(
        source: &Arc<dyn MetricsSource>,
        analysis: &AnalysisSuite,
        engine: &AlertEngine,
        hub: &RealtimeHub,
    ) -> Result<SensorUpdate> {
        let mut snapshot = source.read().await?;

        // Visual analysis is skipped entirely without a frame; slots the
        // source already filled (forced scenarios) are kept as-is.
        if let Some(frame_b64) = snapshot.camera_frame_base64.clone() {
            match BASE64.decode(frame_b64) {
                Ok(frame) => {
                    if snapshot.disease_analysis.is_none() {
                        snapshot.disease_analysis = Some(analysis.detect_disease(&frame).await);
                    }
                    if snapshot.pest_analysis.is_none() {
                        snapshot.pest_analysis = Some(analysis.identify_pests(&frame).await);
                    }
                    if snapshot.growth_metrics.is_none() {
                        snapshot.growth_metrics = Some(analysis.measure_growth(&frame).await);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Frame decode failed, skipping visual analysis");
                }
            }
        }

        let alerts = engine.evaluate(&snapshot);
        let update = SensorUpdate::new(snapshot, alerts);
        hub.broadcast(&update).await;
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::OfflineClassifier;
    use crate::frame_buffer::FrameBuffer;
    use crate::frame_source::placeholder;
    use crate::sensors::{GrowthStage, Scenario, SimulatedSensors};

    fn pipeline() -> (Arc<SimulatedSensors>, Arc<RealtimeHub>, MonitorOrchestrator) {
        let buffer = Arc::new(FrameBuffer::new(placeholder()));
        let simulator = Arc::new(SimulatedSensors::new("GH-TEST", buffer));
        let hub = Arc::new(RealtimeHub::new());
        let suite = Arc::new(AnalysisSuite::new(Arc::new(OfflineClassifier)));
        let orchestrator = MonitorOrchestrator::new(
            simulator.clone() as Arc<dyn MetricsSource>,
            suite,
            AlertEngine::default(),
            hub.clone(),
        );
        (simulator, hub, orchestrator)
    }

    #[tokio::test]
    async fn cycle_attaches_analysis_and_broadcasts_envelope() {
        let (_sim, hub, orchestrator) = pipeline();
        let (_id, mut rx) = hub.register().await;

        let update = orchestrator.run_once().await.unwrap();

        // Baseline readings are healthy and the offline classifier yields
        // no findings, so the cycle is alert-free
        assert!(update.alerts.is_empty());
        assert!(update.data.disease_analysis.is_some());
        assert!(update.data.pest_analysis.is_some());
        assert_eq!(
            update.data.growth_metrics.as_ref().unwrap().growth_stage,
            GrowthStage::Unknown
        );

        let delivered = rx.try_recv().unwrap();
        assert!(delivered.contains("\"type\":\"sensor_update\""));
    }

    #[tokio::test]
    async fn injected_scenario_surfaces_as_alert_in_broadcast() {
        let (sim, hub, orchestrator) = pipeline();
        let (_id, mut rx) = hub.register().await;

        sim.inject_scenario(Scenario::HighTemperature).await;
        let update = orchestrator.run_once().await.unwrap();

        assert_eq!(update.alerts.len(), 1);
        assert!(update.alerts[0].title.contains("Heat Stress"));
        assert!(rx.try_recv().unwrap().contains("Heat Stress"));
    }

    #[tokio::test]
    async fn forced_analysis_is_not_overwritten_by_classifier() {
        let (sim, _hub, orchestrator) = pipeline();

        sim.inject_scenario(Scenario::DetectDisease).await;
        let update = orchestrator.run_once().await.unwrap();

        let disease = update.data.disease_analysis.unwrap();
        assert_eq!(disease.diseases_detected[0].name, "powdery_mildew");
        assert_eq!(update.alerts.len(), 1);
        assert!(update.alerts[0].title.contains("Powdery Mildew"));
    }

    #[tokio::test]
    async fn start_stop_are_idempotent() {
        let (_sim, _hub, orchestrator) = pipeline();
        let orchestrator = orchestrator.with_period(Duration::from_millis(20));

        orchestrator.start().await;
        orchestrator.start().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        orchestrator.stop().await;
        orchestrator.stop().await;
    }
}
