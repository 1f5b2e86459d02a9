//! Application state
//!
//! Holds all shared components and configuration. Everything is built
//! explicitly in `main` and injected; there are no process-wide globals.

use crate::classifier::VisionClassifier;
use crate::frame_buffer::FrameBuffer;
use crate::frame_source::FrameProducer;
use crate::orchestrator::MonitorOrchestrator;
use crate::realtime_hub::RealtimeHub;
use crate::sensors::SimulatedSensors;
use std::path::PathBuf;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Demo video file for the frame producer
    pub video_path: PathBuf,
    /// Classification model server URL (degraded mode when unset)
    pub classifier_url: Option<String>,
    /// Greenhouse identifier stamped on every snapshot
    pub greenhouse_id: String,
    /// Orchestrator cycle period in seconds
    pub cycle_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            video_path: std::env::var("VIDEO_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("demo_videos/polyhouse_plants.mp4")),
            classifier_url: std::env::var("CLASSIFIER_URL").ok(),
            greenhouse_id: std::env::var("GREENHOUSE_ID")
                .unwrap_or_else(|_| "GH001-SIMULATOR".to_string()),
            cycle_secs: std::env::var("CYCLE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Shared latest-frame buffer
    pub frame_buffer: Arc<FrameBuffer>,
    /// Background frame producer
    pub producer: Arc<FrameProducer>,
    /// RealtimeHub (WebSocket fan-out)
    pub hub: Arc<RealtimeHub>,
    /// MonitorOrchestrator (periodic cycle)
    pub orchestrator: Arc<MonitorOrchestrator>,
    /// Vision classifier boundary
    pub classifier: Arc<dyn VisionClassifier>,
    /// Simulated sensor source, present only in simulator mode; the
    /// operator demo controls require it
    pub simulator: Option<Arc<SimulatedSensors>>,
    /// Active frame source ("video" or "synthetic")
    pub frame_source: &'static str,
}

impl AppState {
    /// Operating mode reported on the root endpoint
    pub fn mode(&self) -> &'static str {
        if self.simulator.is_some() {
            "simulated"
        } else {
            "live"
        }
    }
}
