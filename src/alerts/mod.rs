//! Alerts - Stateless rule engine over metrics snapshots
//!
//! ## Responsibilities
//!
//! - Evaluate one snapshot against the domain thresholds and visual
//!   analysis results
//! - Produce the prioritized alert list broadcast with each cycle
//!
//! Evaluation is a pure function of the snapshot: no rule state persists
//! across cycles and the same conditions re-alert every cycle by design.
//! Rules append in fixed order (threshold rules, then diseases, then
//! pests, then the harvest advisory), with no sorting or dedup after.

use crate::sensors::{GrowthStage, MetricsSnapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Critical,
    Warning,
    Advisory,
}

/// One priority-ranked recommended action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remedy {
    pub priority: u8,
    pub action: String,
}

impl Remedy {
    fn first(action: impl Into<String>) -> Vec<Remedy> {
        vec![Remedy {
            priority: 1,
            action: action.into(),
        }]
    }
}

/// One rule-engine finding
///
/// Recomputed fresh every cycle; the id is derived from the alert kind
/// and the evaluation time and has no identity across cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub level: AlertLevel,
    pub title: String,
    pub description: String,
    pub current_value: f64,
    pub optimal_range: String,
    pub impact: String,
    pub solutions: Vec<Remedy>,
}

/// Domain thresholds for the rule engine
///
/// Comparisons are strict (`>` / `<`); a zero reading never triggers.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub temp_optimal_min: f64,
    pub temp_optimal_max: f64,
    pub temp_yield_stress: f64,
    pub humidity_optimal_min: f64,
    pub humidity_optimal_max: f64,
    pub humidity_disease_risk: f64,
    pub humidity_stress: f64,
    pub soil_optimal_min: f64,
    pub soil_optimal_max: f64,
    pub soil_critical_min: f64,
    pub soil_critical_max: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temp_optimal_min: 18.0,
            temp_optimal_max: 28.0,
            temp_yield_stress: 32.0,
            humidity_optimal_min: 55.0,
            humidity_optimal_max: 75.0,
            humidity_disease_risk: 85.0,
            humidity_stress: 40.0,
            soil_optimal_min: 50.0,
            soil_optimal_max: 80.0,
            soil_critical_min: 30.0,
            soil_critical_max: 90.0,
        }
    }
}

/// Stateless alert rule engine
#[derive(Debug, Clone, Default)]
pub struct AlertEngine {
    thresholds: Thresholds,
}

impl AlertEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate a snapshot into an ordered alert list
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        let th = &self.thresholds;
        let now_ms = Utc::now().timestamp_millis();
        let mut alerts = Vec::new();

        let temp = snapshot.temperature_internal;
        if temp > 0.0 && temp > th.temp_yield_stress {
            alerts.push(Alert {
                id: format!("yield_threat_{}", now_ms),
                level: AlertLevel::Critical,
                title: "Yield Threat: Heat Stress".to_string(),
                description: format!(
                    "Internal temp is {}°C, exceeding the critical yield stress point.",
                    temp
                ),
                current_value: temp,
                optimal_range: format!("{}-{}°C", th.temp_optimal_min, th.temp_optimal_max),
                impact: "Sustained heat stress will slow fruit growth and reduce yield \
                         forecast by 5-10% per day."
                    .to_string(),
                solutions: Remedy::first(
                    "Activate cooling systems (fans/misters) to lower temperature.",
                ),
            });
        }

        let humidity = snapshot.humidity;
        let humidity_range = format!(
            "{}-{}%",
            th.humidity_optimal_min, th.humidity_optimal_max
        );
        if humidity > th.humidity_disease_risk {
            alerts.push(Alert {
                id: format!("disease_risk_hum_{}", now_ms),
                level: AlertLevel::Warning,
                title: "Disease Risk: High Humidity".to_string(),
                description: format!(
                    "Humidity is {}%, creating ideal conditions for fungal growth.",
                    humidity
                ),
                current_value: humidity,
                optimal_range: humidity_range.clone(),
                impact: "High probability of powdery mildew or blight, impacting crop \
                         quality and market value."
                    .to_string(),
                solutions: Remedy::first("Increase ventilation and air circulation immediately."),
            });
        }
        if humidity > 0.0 && humidity < th.humidity_stress {
            alerts.push(Alert {
                id: format!("yield_threat_hum_{}", now_ms),
                level: AlertLevel::Warning,
                title: "Yield Threat: Transpiration Stress".to_string(),
                description: format!(
                    "Humidity is {}%, causing plants to lose water too quickly.",
                    humidity
                ),
                current_value: humidity,
                optimal_range: humidity_range,
                impact: "Stunts growth and reduces fruit size, lowering overall yield."
                    .to_string(),
                solutions: Remedy::first(
                    "Activate misting or fogging systems to raise humidity.",
                ),
            });
        }

        let moisture = snapshot.soil_moisture;
        let soil_range = format!("{}-{}%", th.soil_optimal_min, th.soil_optimal_max);
        if moisture > 0.0 && moisture < th.soil_critical_min {
            alerts.push(Alert {
                id: format!("yield_threat_moisture_{}", now_ms),
                level: AlertLevel::Critical,
                title: "Yield Threat: Dehydration Stress".to_string(),
                description: format!(
                    "Soil moisture has dropped to {}%, below the critical threshold.",
                    moisture
                ),
                current_value: moisture,
                optimal_range: soil_range.clone(),
                impact: "Impairs nutrient uptake, stunts growth, and can lead to \
                         irreversible wilting. Reduces yield forecast."
                    .to_string(),
                solutions: Remedy::first(
                    "Activate irrigation system immediately to restore soil moisture.",
                ),
            });
        }
        if moisture > th.soil_critical_max {
            alerts.push(Alert {
                id: format!("disease_risk_moisture_{}", now_ms),
                level: AlertLevel::Warning,
                title: "Disease Risk: Waterlogged Soil".to_string(),
                description: format!(
                    "Soil moisture is at {}%, creating anaerobic conditions.",
                    moisture
                ),
                current_value: moisture,
                optimal_range: soil_range,
                impact: "Promotes root rot and fungal diseases. High risk of crop loss \
                         if not addressed."
                    .to_string(),
                solutions: Remedy::first("Disable all irrigation and check for drainage issues."),
            });
        }

        if let Some(disease) = &snapshot.disease_analysis {
            for finding in &disease.diseases_detected {
                let action = finding
                    .recommended_action
                    .as_deref()
                    .unwrap_or("treatment");
                alerts.push(Alert {
                    id: format!("disease_{}_{}", finding.name, now_ms),
                    level: AlertLevel::Warning,
                    title: format!("AI Detected Disease: {}", title_case(&finding.name)),
                    description: format!(
                        "AI analysis has detected signs of {} with {}% confidence.",
                        finding.name, finding.confidence
                    ),
                    current_value: finding.confidence,
                    optimal_range: "0% symptoms".to_string(),
                    impact: "Immediate action required to prevent 15-25% crop loss, \
                             impacting market delivery schedules."
                        .to_string(),
                    solutions: Remedy::first(format!("Apply targeted {}.", action)),
                });
            }
        }

        if let Some(pests) = &snapshot.pest_analysis {
            for finding in &pests.pests_detected {
                alerts.push(Alert {
                    id: format!("pest_{}_{}", finding.pest_type, now_ms),
                    level: AlertLevel::Warning,
                    title: format!("AI Detected Pests: {}", title_case(&finding.pest_type)),
                    description: format!(
                        "AI analysis has identified an infestation of {} with an \
                         estimated population of {}.",
                        finding.pest_type, finding.count
                    ),
                    current_value: finding.count as f64,
                    optimal_range: "0 pests".to_string(),
                    impact: "Pest infestations can rapidly damage crops, reducing \
                             marketable yield and increasing labor costs."
                        .to_string(),
                    solutions: Remedy::first(
                        "Deploy biological controls or apply appropriate pesticides \
                         immediately.",
                    ),
                });
            }
        }

        // The harvest advisory only fires on an otherwise quiet cycle
        if alerts.is_empty() {
            if let Some(growth) = &snapshot.growth_metrics {
                if growth.growth_stage == GrowthStage::Fruiting {
                    alerts.push(Alert {
                        id: format!("harvest_window_{}", now_ms),
                        level: AlertLevel::Advisory,
                        title: "Optimal Harvest Window Approaching".to_string(),
                        description: "Plants are in the mature fruiting stage and \
                                      environmental conditions are optimal."
                            .to_string(),
                        current_value: growth.canopy_coverage_percent,
                        optimal_range: "Fruiting Stage".to_string(),
                        impact: "Planning now ensures maximum yield quality and optimal \
                                 market timing."
                            .to_string(),
                        solutions: Remedy::first(
                            "Schedule labor and logistics for harvest in the next 7-10 days.",
                        ),
                    });
                }
            }
        }

        alerts
    }
}

fn title_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{DiseaseAnalysis, DiseaseFinding, GrowthMetrics, PestAnalysis, PestFinding};

    fn snapshot(temp: f64, humidity: f64, soil: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            temperature_internal: temp,
            humidity,
            soil_moisture: soil,
            ..Default::default()
        }
    }

    fn engine() -> AlertEngine {
        AlertEngine::default()
    }

    #[test]
    fn heat_stress_fires_exactly_one_critical_alert() {
        let alerts = engine().evaluate(&snapshot(33.0, 60.0, 70.0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert!(alerts[0].title.contains("Heat Stress"));
        assert_eq!(alerts[0].current_value, 33.0);
    }

    #[test]
    fn high_humidity_fires_disease_risk_warning() {
        let alerts = engine().evaluate(&snapshot(24.0, 90.0, 70.0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
        assert!(alerts[0].title.contains("High Humidity"));
        assert_eq!(alerts[0].current_value, 90.0);
    }

    #[test]
    fn low_humidity_fires_transpiration_warning() {
        let alerts = engine().evaluate(&snapshot(24.0, 35.0, 70.0));
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].title.contains("Transpiration"));
    }

    #[test]
    fn dry_soil_fires_exactly_one_critical_dehydration_alert() {
        let alerts = engine().evaluate(&snapshot(24.0, 65.0, 20.0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert!(alerts[0].title.contains("Dehydration"));
        assert_eq!(alerts[0].current_value, 20.0);
    }

    #[test]
    fn waterlogged_soil_fires_warning() {
        let alerts = engine().evaluate(&snapshot(24.0, 65.0, 95.0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
        assert!(alerts[0].title.contains("Waterlogged"));
    }

    #[test]
    fn in_range_snapshot_produces_no_alerts() {
        assert!(engine().evaluate(&snapshot(24.0, 65.0, 70.0)).is_empty());
    }

    #[test]
    fn zero_readings_never_trigger() {
        // An absent reading is carried as zero; low-side rules must not fire
        assert!(engine().evaluate(&snapshot(0.0, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn thresholds_are_strict_comparisons() {
        // Exactly at the boundary does not fire
        assert!(engine().evaluate(&snapshot(32.0, 65.0, 70.0)).is_empty());
        assert!(engine().evaluate(&snapshot(24.0, 85.0, 70.0)).is_empty());
        assert!(engine().evaluate(&snapshot(24.0, 40.0, 70.0)).is_empty());
        assert!(engine().evaluate(&snapshot(24.0, 65.0, 30.0)).is_empty());
        assert!(engine().evaluate(&snapshot(24.0, 65.0, 90.0)).is_empty());
    }

    #[test]
    fn detected_disease_fires_one_warning_with_confidence() {
        let mut snap = snapshot(24.0, 65.0, 70.0);
        snap.disease_analysis = Some(DiseaseAnalysis {
            diseases_detected: vec![DiseaseFinding {
                name: "powdery_mildew".to_string(),
                confidence: 92.3,
                recommended_action: Some("Neem oil spray".to_string()),
            }],
            overall_health: "diseased".to_string(),
        });

        let alerts = engine().evaluate(&snap);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
        assert!(alerts[0].title.contains("Powdery Mildew"));
        assert_eq!(alerts[0].current_value, 92.3);
        assert!(alerts[0].solutions[0].action.contains("Neem oil spray"));
    }

    #[test]
    fn detected_pests_fire_one_warning_per_pest() {
        let mut snap = snapshot(24.0, 65.0, 70.0);
        snap.pest_analysis = Some(PestAnalysis {
            pests_detected: vec![PestFinding {
                pest_type: "aphids".to_string(),
                count: 42,
                confidence: 88.1,
                severity: "moderate".to_string(),
            }],
            infestation_level: "moderate".to_string(),
        });

        let alerts = engine().evaluate(&snap);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].title.contains("Aphids"));
        assert_eq!(alerts[0].current_value, 42.0);
    }

    #[test]
    fn harvest_advisory_fires_only_on_quiet_fruiting_cycles() {
        let mut snap = snapshot(24.0, 65.0, 70.0);
        snap.growth_metrics = Some(GrowthMetrics {
            canopy_coverage_percent: 81.0,
            growth_stage: GrowthStage::Fruiting,
        });

        let alerts = engine().evaluate(&snap);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Advisory);
        assert_eq!(alerts[0].current_value, 81.0);

        // Suppressed whenever any other rule fired
        snap.temperature_internal = 33.0;
        let alerts = engine().evaluate(&snap);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
    }

    #[test]
    fn multiple_rules_fire_in_fixed_order() {
        let mut snap = snapshot(33.0, 90.0, 20.0);
        snap.disease_analysis = Some(DiseaseAnalysis {
            diseases_detected: vec![DiseaseFinding {
                name: "blight".to_string(),
                confidence: 70.0,
                recommended_action: None,
            }],
            overall_health: "diseased".to_string(),
        });

        let alerts = engine().evaluate(&snap);
        assert_eq!(alerts.len(), 4);
        assert!(alerts[0].title.contains("Heat Stress"));
        assert!(alerts[1].title.contains("High Humidity"));
        assert!(alerts[2].title.contains("Dehydration"));
        assert!(alerts[3].title.contains("Blight"));
        // No recommended action falls back to a generic treatment
        assert!(alerts[3].solutions[0].action.contains("treatment"));
    }

    #[test]
    fn evaluation_is_idempotent_modulo_timestamp_ids() {
        let snap = snapshot(33.0, 90.0, 70.0);
        let eng = engine();
        let first = eng.evaluate(&snap);
        let second = eng.evaluate(&snap);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.level, b.level);
            assert_eq!(a.title, b.title);
            assert_eq!(a.description, b.description);
            assert_eq!(a.current_value, b.current_value);
            assert_eq!(a.solutions, b.solutions);
            // Ids share the kind prefix and differ only in the time suffix
            let prefix = |id: &str| id.rsplit_once('_').map(|(p, _)| p.to_string());
            assert_eq!(prefix(&a.id), prefix(&b.id));
        }
    }

    #[test]
    fn alert_level_serializes_lowercase() {
        let json = serde_json::to_string(&AlertLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
