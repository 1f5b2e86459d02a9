//! Sensors - Metrics snapshot model and sensor sources
//!
//! ## Responsibilities
//!
//! - [`MetricsSnapshot`]: one immutable capture of all readings per cycle
//! - [`MetricsSource`]: capability boundary the orchestrator reads through,
//!   source-agnostic (a live hardware variant conforms to the same trait)
//! - [`SimulatedSensors`]: jittered synthetic readings with operator
//!   scenario controls for forcing out-of-range conditions

use crate::error::Result;
use crate::frame_buffer::FrameBuffer;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One detected disease finding from visual analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseFinding {
    pub name: String,
    /// Confidence in percent (0-100)
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<String>,
}

/// Disease analysis attached to a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseAnalysis {
    pub diseases_detected: Vec<DiseaseFinding>,
    pub overall_health: String,
}

/// One detected pest finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PestFinding {
    pub pest_type: String,
    /// Estimated population
    pub count: u32,
    pub confidence: f64,
    pub severity: String,
}

/// Pest analysis attached to a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PestAnalysis {
    pub pests_detected: Vec<PestFinding>,
    pub infestation_level: String,
}

impl PestAnalysis {
    /// Analysis result with no findings
    pub fn none() -> Self {
        Self {
            pests_detected: Vec::new(),
            infestation_level: "none".to_string(),
        }
    }
}

/// Crop growth stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthStage {
    #[default]
    Unknown,
    Seedling,
    Vegetative,
    Flowering,
    Fruiting,
}

/// Growth analysis attached to a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthMetrics {
    pub canopy_coverage_percent: f64,
    pub growth_stage: GrowthStage,
}

impl Default for GrowthMetrics {
    fn default() -> Self {
        Self {
            canopy_coverage_percent: 0.0,
            growth_stage: GrowthStage::Unknown,
        }
    }
}

/// Immutable environmental snapshot captured once per orchestrator cycle
///
/// Field names match the wire format consumed by the dashboard. A missing
/// reading is carried as zero and never triggers an alert.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub greenhouse_id: String,
    #[serde(default)]
    pub temperature_internal: f64,
    #[serde(default)]
    pub temperature_external: f64,
    #[serde(default)]
    pub temperature_soil: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub soil_moisture: f64,
    #[serde(default)]
    pub water_level_cm: f64,
    #[serde(default)]
    pub motion_detected: bool,
    #[serde(default)]
    pub light_par: f64,
    #[serde(default)]
    pub co2_level: f64,
    #[serde(default)]
    pub soil_ph: f64,
    #[serde(default)]
    pub soil_ec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_frame_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease_analysis: Option<DiseaseAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pest_analysis: Option<PestAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_metrics: Option<GrowthMetrics>,
}

/// Capability boundary for sensor acquisition
///
/// Two variants are expected: live hardware and simulated. The pipeline
/// never knows which one it holds.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Capture a snapshot of all current readings plus the latest frame
    async fn read(&self) -> Result<MetricsSnapshot>;
}

/// Operator-injectable fault scenarios (simulator only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    HighTemperature,
    HighHumidity,
    LowHumidity,
    LowSoilMoisture,
    HighSoilMoisture,
    DetectDisease,
    DetectPest,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scenario::HighTemperature => "high_temperature",
            Scenario::HighHumidity => "high_humidity",
            Scenario::LowHumidity => "low_humidity",
            Scenario::LowSoilMoisture => "low_soil_moisture",
            Scenario::HighSoilMoisture => "high_soil_moisture",
            Scenario::DetectDisease => "detect_disease",
            Scenario::DetectPest => "detect_pest",
        };
        f.write_str(name)
    }
}

impl FromStr for Scenario {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "high_temperature" => Ok(Scenario::HighTemperature),
            "high_humidity" => Ok(Scenario::HighHumidity),
            "low_humidity" => Ok(Scenario::LowHumidity),
            "low_soil_moisture" => Ok(Scenario::LowSoilMoisture),
            "high_soil_moisture" => Ok(Scenario::HighSoilMoisture),
            "detect_disease" => Ok(Scenario::DetectDisease),
            "detect_pest" => Ok(Scenario::DetectPest),
            _ => Err(()),
        }
    }
}

/// Simulated sensor source
///
/// Base readings jitter around healthy values; an injected scenario
/// offsets the relevant reading far enough to guarantee it crosses its
/// alert threshold. Detection scenarios attach canned analysis results
/// and draw a demo overlay on the buffered frame.
pub struct SimulatedSensors {
    greenhouse_id: String,
    buffer: Arc<FrameBuffer>,
    scenario: RwLock<Option<Scenario>>,
}

impl SimulatedSensors {
    pub fn new(greenhouse_id: impl Into<String>, buffer: Arc<FrameBuffer>) -> Self {
        Self {
            greenhouse_id: greenhouse_id.into(),
            buffer,
            scenario: RwLock::new(None),
        }
    }

    /// Inject a fault scenario (operator control)
    pub async fn inject_scenario(&self, scenario: Scenario) {
        {
            let mut slot = self.scenario.write().await;
            *slot = Some(scenario);
        }
        tracing::info!(scenario = %scenario, "Scenario injected");

        // Detection scenarios get a demo overlay on the live frame
        match scenario {
            Scenario::DetectDisease => {
                self.buffer
                    .overlay_text("DISEASE DETECTED: POWDERY MILDEW", (50, 50), [255, 0, 0])
                    .await;
                self.buffer
                    .highlight_region((150, 180, 200, 150), "Disease Detected", [255, 0, 0])
                    .await;
            }
            Scenario::DetectPest => {
                self.buffer
                    .overlay_text("PESTS DETECTED: APHIDS (42)", (50, 50), [255, 165, 0])
                    .await;
            }
            _ => {}
        }
    }

    /// Clear any injected scenario
    pub async fn clear_scenario(&self) {
        let mut slot = self.scenario.write().await;
        *slot = None;
        tracing::info!("Scenarios cleared");
    }

    /// Currently active scenario, if any
    pub async fn active_scenario(&self) -> Option<Scenario> {
        *self.scenario.read().await
    }

    fn forced_disease() -> DiseaseAnalysis {
        DiseaseAnalysis {
            diseases_detected: vec![DiseaseFinding {
                name: "powdery_mildew".to_string(),
                confidence: 92.3,
                recommended_action: Some("Neem oil spray".to_string()),
            }],
            overall_health: "diseased".to_string(),
        }
    }

    fn forced_pests() -> PestAnalysis {
        PestAnalysis {
            pests_detected: vec![PestFinding {
                pest_type: "aphids".to_string(),
                count: 42,
                confidence: 88.1,
                severity: "moderate".to_string(),
            }],
            infestation_level: "moderate".to_string(),
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[async_trait]
impl MetricsSource for SimulatedSensors {
    async fn read(&self) -> Result<MetricsSnapshot> {
        let scenario = *self.scenario.read().await;
        let frame = self.buffer.read().await;
        let frame_b64 = BASE64.encode(frame.encode_bmp());

        // Keep the RNG out of scope before any further await points
        let (mut temp, mut humidity, mut soil_moisture, water_level, light, co2, ph, ec, motion): (
            f64,
            f64,
            f64,
            f64,
            f64,
            f64,
            f64,
            f64,
            bool,
        ) = {
            let mut rng = rand::thread_rng();
            (
                24.0 + rng.gen_range(-2.0..2.0),
                65.0 + rng.gen_range(-5.0..5.0),
                70.0 + rng.gen_range(-3.0..3.0),
                35.0 + rng.gen_range(-2.0..2.0),
                600.0 + rng.gen_range(-100.0..100.0),
                420.0 + rng.gen_range(-20.0..20.0),
                6.2 + rng.gen_range(-0.2..0.2),
                1.8 + rng.gen_range(-0.1..0.1),
                rng.gen::<f64>() > 0.8 && rng.gen_bool(0.5),
            )
        };

        // Offsets are sized so the reading is guaranteed past its threshold
        match scenario {
            Some(Scenario::HighTemperature) => temp += 12.0,
            Some(Scenario::HighHumidity) => humidity += 28.0,
            Some(Scenario::LowHumidity) => humidity -= 35.0,
            Some(Scenario::LowSoilMoisture) => soil_moisture -= 45.0,
            Some(Scenario::HighSoilMoisture) => soil_moisture += 25.0,
            _ => {}
        }

        let delta = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
        };

        let mut snapshot = MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            greenhouse_id: self.greenhouse_id.clone(),
            temperature_internal: round1(temp),
            temperature_external: round1(temp - 3.0 + delta.0),
            temperature_soil: round1(temp - 2.0 + delta.1),
            humidity: round1(humidity.clamp(0.0, 100.0)),
            soil_moisture: round1(soil_moisture.clamp(0.0, 100.0)),
            water_level_cm: round1(water_level.max(0.0)),
            motion_detected: motion,
            light_par: round1(light),
            co2_level: round1(co2),
            soil_ph: round1(ph),
            soil_ec: round1(ec),
            camera_frame_base64: Some(frame_b64),
            disease_analysis: None,
            pest_analysis: None,
            growth_metrics: None,
        };

        match scenario {
            Some(Scenario::DetectDisease) => {
                snapshot.disease_analysis = Some(Self::forced_disease());
                snapshot.pest_analysis = Some(PestAnalysis::none());
            }
            Some(Scenario::DetectPest) => {
                snapshot.pest_analysis = Some(Self::forced_pests());
            }
            _ => {}
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::placeholder;

    fn simulator() -> SimulatedSensors {
        let buffer = Arc::new(FrameBuffer::new(placeholder()));
        SimulatedSensors::new("GH-TEST", buffer)
    }

    #[test]
    fn scenario_names_round_trip() {
        for s in [
            Scenario::HighTemperature,
            Scenario::HighHumidity,
            Scenario::LowHumidity,
            Scenario::LowSoilMoisture,
            Scenario::HighSoilMoisture,
            Scenario::DetectDisease,
            Scenario::DetectPest,
        ] {
            assert_eq!(s.to_string().parse::<Scenario>(), Ok(s));
        }
        assert!("flood".parse::<Scenario>().is_err());
    }

    #[tokio::test]
    async fn baseline_readings_are_in_healthy_bands() {
        let sim = simulator();
        let snap = sim.read().await.unwrap();
        assert!(snap.temperature_internal > 18.0 && snap.temperature_internal < 28.0);
        assert!(snap.humidity > 40.0 && snap.humidity < 85.0);
        assert!(snap.soil_moisture > 30.0 && snap.soil_moisture < 90.0);
        assert!(snap.disease_analysis.is_none());
    }

    #[tokio::test]
    async fn snapshot_carries_encoded_frame() {
        let sim = simulator();
        let snap = sim.read().await.unwrap();
        let bytes = BASE64.decode(snap.camera_frame_base64.unwrap()).unwrap();
        assert_eq!(&bytes[0..2], b"BM");
    }

    #[tokio::test]
    async fn threshold_scenarios_force_out_of_range_readings() {
        let sim = simulator();

        sim.inject_scenario(Scenario::HighTemperature).await;
        assert!(sim.read().await.unwrap().temperature_internal > 32.0);

        sim.inject_scenario(Scenario::HighHumidity).await;
        assert!(sim.read().await.unwrap().humidity > 85.0);

        sim.inject_scenario(Scenario::LowHumidity).await;
        assert!(sim.read().await.unwrap().humidity < 40.0);

        sim.inject_scenario(Scenario::LowSoilMoisture).await;
        assert!(sim.read().await.unwrap().soil_moisture < 30.0);

        sim.inject_scenario(Scenario::HighSoilMoisture).await;
        assert!(sim.read().await.unwrap().soil_moisture > 90.0);

        sim.clear_scenario().await;
        assert_eq!(sim.active_scenario().await, None);
        let snap = sim.read().await.unwrap();
        assert!(snap.temperature_internal < 28.0);
    }

    #[tokio::test]
    async fn detection_scenarios_attach_forced_analysis() {
        let sim = simulator();

        sim.inject_scenario(Scenario::DetectDisease).await;
        let snap = sim.read().await.unwrap();
        let disease = snap.disease_analysis.unwrap();
        assert_eq!(disease.diseases_detected[0].name, "powdery_mildew");
        assert_eq!(disease.diseases_detected[0].confidence, 92.3);

        sim.inject_scenario(Scenario::DetectPest).await;
        let snap = sim.read().await.unwrap();
        let pests = snap.pest_analysis.unwrap();
        assert_eq!(pests.pests_detected[0].pest_type, "aphids");
        assert_eq!(pests.pests_detected[0].count, 42);
    }
}
