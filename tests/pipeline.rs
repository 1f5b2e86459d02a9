//! End-to-end pipeline tests: producer -> buffer -> sensors ->
//! orchestrator -> hub -> subscriber.

use polyhouse_monitor::alerts::AlertEngine;
use polyhouse_monitor::classifier::{AnalysisSuite, OfflineClassifier};
use polyhouse_monitor::frame_buffer::FrameBuffer;
use polyhouse_monitor::frame_source::{placeholder, FrameProducer, SyntheticSource};
use polyhouse_monitor::orchestrator::MonitorOrchestrator;
use polyhouse_monitor::realtime_hub::RealtimeHub;
use polyhouse_monitor::sensors::{MetricsSource, Scenario, SimulatedSensors};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn producer_keeps_buffer_fresh_while_running() {
    let buffer = Arc::new(FrameBuffer::new(placeholder()));
    let producer = FrameProducer::new(buffer.clone());

    assert!(!buffer.has_frame().await);
    producer.start(Box::new(SyntheticSource::new())).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(buffer.has_frame().await);
    producer.stop().await;
}

#[tokio::test]
async fn full_cycle_reaches_every_subscriber() {
    let buffer = Arc::new(FrameBuffer::new(placeholder()));
    let simulator = Arc::new(SimulatedSensors::new("GH001-TEST", buffer));
    let hub = Arc::new(RealtimeHub::new());
    let suite = Arc::new(AnalysisSuite::new(Arc::new(OfflineClassifier)));
    let orchestrator = MonitorOrchestrator::new(
        simulator.clone() as Arc<dyn MetricsSource>,
        suite,
        AlertEngine::default(),
        hub.clone(),
    );

    let (_a, mut rx_a) = hub.register().await;
    let (_b, rx_b) = hub.register().await;
    let (_c, mut rx_c) = hub.register().await;

    // One subscriber disconnects before the cycle runs
    drop(rx_b);

    simulator.inject_scenario(Scenario::LowSoilMoisture).await;
    let update = orchestrator.run_once().await.unwrap();

    assert_eq!(update.alerts.len(), 1);
    assert!(update.alerts[0].title.contains("Dehydration"));
    assert!(update.data.soil_moisture < 30.0);

    // The failed subscriber was dropped; the rest got the same envelope
    assert_eq!(hub.connection_count(), 2);
    let got_a = rx_a.try_recv().unwrap();
    let got_c = rx_c.try_recv().unwrap();
    assert_eq!(got_a, got_c);
    assert!(got_a.contains("\"type\":\"sensor_update\""));
    assert!(got_a.contains("Dehydration"));

    // Resolving the scenario quiets the next cycle
    simulator.clear_scenario().await;
    let update = orchestrator.run_once().await.unwrap();
    assert!(update.alerts.is_empty());
}
