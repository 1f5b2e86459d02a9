//! Classifier - Vision classification boundary
//!
//! ## Responsibilities
//!
//! - [`VisionClassifier`]: the opaque `classify(image) -> label, confidence`
//!   capability; never fails past its boundary (sentinel on failure)
//! - [`RemoteClassifier`]: HTTP adapter to an external model server
//! - [`OfflineClassifier`]: permanent degraded mode when no model server
//!   is configured
//! - [`AnalysisSuite`]: turns raw classifications into the disease, pest
//!   and growth analysis attached to a snapshot

use crate::sensors::{DiseaseAnalysis, DiseaseFinding, GrowthMetrics, PestAnalysis};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Label returned when classification fails; treated as "no finding"
pub const SENTINEL_LABEL: &str = "Error";

/// One classification result
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    /// Confidence in percent (0-100)
    pub confidence: f64,
}

impl Classification {
    /// Failure sentinel: downstream treats this as no finding
    pub fn sentinel() -> Self {
        Self {
            label: SENTINEL_LABEL.to_string(),
            confidence: 0.0,
        }
    }
}

/// Opaque image classification capability
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    /// Classify an encoded frame; yields the sentinel on internal failure
    async fn classify(&self, frame: &[u8]) -> Classification;

    /// Whether the classification backend is currently reachable
    async fn ready(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: String,
    confidence: f64,
}

/// HTTP adapter to an external classification model server
pub struct RemoteClassifier {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteClassifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    async fn try_classify(&self, frame: &[u8]) -> crate::error::Result<Classification> {
        let url = format!("{}/classify", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/octet-stream")
            .body(frame.to_vec())
            .send()
            .await?
            .error_for_status()?;
        let parsed: ClassifyResponse = resp.json().await?;
        Ok(Classification {
            label: parsed.label,
            confidence: parsed.confidence.clamp(0.0, 100.0),
        })
    }
}

#[async_trait]
impl VisionClassifier for RemoteClassifier {
    async fn classify(&self, frame: &[u8]) -> Classification {
        match self.try_classify(frame).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Classification failed, using sentinel");
                Classification::sentinel()
            }
        }
    }

    async fn ready(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Degraded-mode classifier used when no model server is configured
///
/// Always yields the sentinel, so the pipeline keeps running with
/// reduced fidelity instead of failing.
pub struct OfflineClassifier;

#[async_trait]
impl VisionClassifier for OfflineClassifier {
    async fn classify(&self, _frame: &[u8]) -> Classification {
        Classification::sentinel()
    }

    async fn ready(&self) -> bool {
        false
    }
}

/// Visual analysis built on top of a classifier
pub struct AnalysisSuite {
    classifier: Arc<dyn VisionClassifier>,
}

impl AnalysisSuite {
    pub fn new(classifier: Arc<dyn VisionClassifier>) -> Self {
        Self { classifier }
    }

    /// Run disease detection on an encoded frame
    ///
    /// Only a "diseased" classification produces a finding; the sentinel
    /// and a healthy label both yield an empty list.
    pub async fn detect_disease(&self, frame: &[u8]) -> DiseaseAnalysis {
        let result = self.classifier.classify(frame).await;
        let mut diseases = Vec::new();
        if result.label == "diseased" {
            diseases.push(DiseaseFinding {
                name: "leaf_disease".to_string(),
                confidence: result.confidence,
                recommended_action: Some(
                    "Inspect plant for specific pests or fungal spots.".to_string(),
                ),
            });
        }
        DiseaseAnalysis {
            diseases_detected: diseases,
            overall_health: result.label,
        }
    }

    /// Pest identification (placeholder model)
    pub async fn identify_pests(&self, _frame: &[u8]) -> PestAnalysis {
        PestAnalysis::none()
    }

    /// Growth stage measurement (placeholder model)
    pub async fn measure_growth(&self, _frame: &[u8]) -> GrowthMetrics {
        GrowthMetrics::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::GrowthStage;

    #[tokio::test]
    async fn offline_classifier_yields_sentinel() {
        let result = OfflineClassifier.classify(&[1, 2, 3]).await;
        assert_eq!(result.label, SENTINEL_LABEL);
        assert_eq!(result.confidence, 0.0);
        assert!(!OfflineClassifier.ready().await);
    }

    #[tokio::test]
    async fn sentinel_classification_produces_no_findings() {
        let suite = AnalysisSuite::new(Arc::new(OfflineClassifier));
        let analysis = suite.detect_disease(&[0u8; 16]).await;
        assert!(analysis.diseases_detected.is_empty());
        assert_eq!(analysis.overall_health, SENTINEL_LABEL);
    }

    #[tokio::test]
    async fn diseased_classification_produces_one_finding() {
        struct DiseasedModel;

        #[async_trait]
        impl VisionClassifier for DiseasedModel {
            async fn classify(&self, _frame: &[u8]) -> Classification {
                Classification {
                    label: "diseased".to_string(),
                    confidence: 87.5,
                }
            }

            async fn ready(&self) -> bool {
                true
            }
        }

        let suite = AnalysisSuite::new(Arc::new(DiseasedModel));
        let analysis = suite.detect_disease(&[0u8; 16]).await;
        assert_eq!(analysis.diseases_detected.len(), 1);
        assert_eq!(analysis.diseases_detected[0].name, "leaf_disease");
        assert_eq!(analysis.diseases_detected[0].confidence, 87.5);
        assert_eq!(analysis.overall_health, "diseased");
    }

    #[tokio::test]
    async fn placeholder_models_report_nothing() {
        let suite = AnalysisSuite::new(Arc::new(OfflineClassifier));
        let pests = suite.identify_pests(&[]).await;
        assert!(pests.pests_detected.is_empty());
        assert_eq!(pests.infestation_level, "none");

        let growth = suite.measure_growth(&[]).await;
        assert_eq!(growth.growth_stage, GrowthStage::Unknown);
        assert_eq!(growth.canopy_coverage_percent, 0.0);
    }
}
