//! Polyhouse Monitor
//!
//! Real-time environmental monitoring pipeline for a controlled growing
//! environment.
//!
//! ## Architecture (7 Components)
//!
//! 1. FrameBuffer - Shared latest-frame buffer (single writer, many readers)
//! 2. FrameProducer / FrameSource - ~30 fps frame acquisition (video or synthetic)
//! 3. Sensors - Metrics snapshot model and the MetricsSource capability
//! 4. Classifier - Vision classification boundary with degraded fallback
//! 5. Alerts - Stateless per-snapshot rule engine
//! 6. RealtimeHub - WebSocket fan-out with per-subscriber failure isolation
//! 7. Orchestrator - The fixed-period cycle driving the pipeline
//!
//! ## Design Principles
//!
//! - Explicit dependency injection: no process-wide singletons
//! - Best-effort delivery: one bad subscriber never stalls the broadcast
//! - Degrade, never abort: transient failures skip a cycle, missing
//!   resources substitute synthetic fallbacks

pub mod alerts;
pub mod classifier;
pub mod error;
pub mod frame_buffer;
pub mod frame_source;
pub mod models;
pub mod orchestrator;
pub mod realtime_hub;
pub mod sensors;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
