//! End-to-end detection runs against simulated receivers
//!
//! Every test runs on a paused tokio clock, so observation windows elapse
//! instantly and timings are exact.

use std::time::Duration;

use gps_detect::{
    AdvanceReason, Candidate, DetectionOutcome, Detector, DetectorConfig,
    DetectorEvent, SkipReason, StaticPorts, PLATFORM_SOURCE,
};
use gps_sim::{SimAttempt, SimConnection, SimDevice, SimFactory};
use proptest::prelude::*;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub const WINDOW: Duration = Duration::from_millis(2000);

    /// Build candidates from endpoint strings, labelled with themselves
    pub fn candidates(ids: &[&str]) -> Vec<Candidate> {
        ids.iter()
            .map(|id| Candidate::user_specified(id).unwrap())
            .collect()
    }

    /// Run a detector over `ids` and collect its progress events
    pub async fn run(
        ids: &[&str],
        factory: SimFactory,
    ) -> (DetectionOutcome, Vec<DetectorEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let detector =
            Detector::with_candidates(DetectorConfig::default(), candidates(ids), factory)
                .unwrap()
                .with_progress(tx);
        let outcome = detector.run().await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (outcome, events)
    }

    /// Opened (endpoint, baud) pairs in order
    pub fn opened(attempts: &[SimAttempt]) -> Vec<(String, Option<u32>)> {
        attempts
            .iter()
            .filter(|a| a.opened)
            .map(|a| (a.endpoint.clone(), a.baud))
            .collect()
    }

    pub fn terminal_events(events: &[DetectorEvent]) -> usize {
        events.iter().filter(|e| e.is_terminal()).count()
    }
}

use helpers::*;

// ============================================================================
// Concrete Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_gpsd_silent_serial_answers_at_38400() {
    let factory = SimFactory::new()
        .with_device("localhost:2947:", SimDevice::Silent)
        .with_device(
            "/dev/ttyUSB0",
            SimDevice::responds_at(38400, Duration::from_millis(500)),
        );
    let stats = factory.stats();
    let start = Instant::now();

    let (outcome, events) = run(&["localhost:2947:", "/dev/ttyUSB0"], factory).await;

    let detected = outcome.into_detected().expect("receiver should be detected");
    assert_eq!(detected.candidate.id, "/dev/ttyUSB0");
    assert_eq!(detected.baud, Some(38400));

    let conn = detected
        .connection
        .into_any()
        .downcast::<SimConnection>()
        .unwrap();
    assert_eq!(conn.endpoint(), "/dev/ttyUSB0");
    assert_eq!(conn.baud(), Some(38400));
    assert!(conn.is_alive());

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.opens, 4);
    assert_eq!(snapshot.closes, 3, "three discarded connections");
    assert_eq!(snapshot.self_destructs, 0);
    assert_eq!(snapshot.alive, 1);
    assert_eq!(snapshot.max_alive, 1);

    assert_eq!(
        opened(&stats.attempts()),
        vec![
            ("localhost:2947:".to_string(), None),
            ("/dev/ttyUSB0".to_string(), Some(4800)),
            ("/dev/ttyUSB0".to_string(), Some(9600)),
            ("/dev/ttyUSB0".to_string(), Some(38400)),
        ]
    );

    // Three full windows, then half a second into the fourth
    assert_eq!(start.elapsed(), WINDOW * 3 + Duration::from_millis(500));

    assert_eq!(terminal_events(&events), 1);
    assert_eq!(
        events.last(),
        Some(&DetectorEvent::Detected {
            candidate: "/dev/ttyUSB0".into(),
            baud: Some(38400),
        })
    );
    let abandoned = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                DetectorEvent::AttemptAbandoned {
                    reason: AdvanceReason::Timeout,
                    ..
                }
            )
        })
        .count();
    assert_eq!(abandoned, 3);
}

#[tokio::test(start_paused = true)]
async fn test_network_window_applies_to_gpsd_only() {
    let factory = SimFactory::new()
        .with_device("localhost:2947:", SimDevice::Silent)
        .with_device(
            "/dev/ttyUSB0",
            SimDevice::responds_at(9600, Duration::from_millis(500)),
        );
    let stats = factory.stats();
    let config = DetectorConfig {
        baud_rates: vec![4800, 9600],
        network_window_ms: Some(5000),
        ..Default::default()
    };
    let start = Instant::now();

    let outcome = Detector::with_candidates(
        config,
        candidates(&["localhost:2947:", "/dev/ttyUSB0"]),
        factory,
    )
    .unwrap()
    .run()
    .await;

    let detected = outcome.into_detected().expect("receiver should be detected");
    assert_eq!(detected.baud, Some(9600));
    // gpsd window, one serial window at 4800, then half a second at 9600
    assert_eq!(
        start.elapsed(),
        Duration::from_millis(5000) + WINDOW + Duration::from_millis(500)
    );
    assert_eq!(stats.closes(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_candidate_list_fails_immediately() {
    let factory = SimFactory::new();
    let stats = factory.stats();
    let start = Instant::now();

    let (outcome, events) = run(&[], factory).await;

    assert!(!outcome.is_detected());
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(stats.opens(), 0);
    assert!(stats.attempts().is_empty());
    assert_eq!(events, vec![DetectorEvent::Failed { attempts: 0 }]);
}

#[tokio::test(start_paused = true)]
async fn test_enumerated_ports_follow_gpsd() {
    let factory = SimFactory::new()
        .with_device("/dev/ttyS0", SimDevice::Silent)
        .with_device("/dev/ttyUSB0", SimDevice::responds(Duration::from_millis(100)));
    let stats = factory.stats();
    let ports = factory.ports();

    let detector = Detector::new(DetectorConfig::default(), None, &ports, factory).unwrap();
    let ids: Vec<_> = detector.candidates().iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec!["localhost:2947:", "/dev/ttyS0", "/dev/ttyUSB0"]);

    let detected = detector.run().await.into_detected().unwrap();
    assert_eq!(detected.candidate.id, "/dev/ttyUSB0");
    assert_eq!(detected.baud, Some(4800));
    // gpsd once, ttyS0 across all five rates, ttyUSB0 at the first rate
    assert_eq!(stats.opens(), 7);
    assert_eq!(stats.max_alive(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_platform_source_first_when_supported() {
    let factory = SimFactory::new()
        .with_platform(true)
        .with_device(PLATFORM_SOURCE, SimDevice::responds(Duration::from_millis(10)));
    let ports = StaticPorts(vec![("/dev/ttyS0".into(), "/dev/ttyS0".into())]);

    let detector = Detector::new(DetectorConfig::default(), Some(""), &ports, factory).unwrap();
    assert_eq!(detector.candidates()[0].id, PLATFORM_SOURCE);

    let detected = detector.run().await.into_detected().unwrap();
    assert_eq!(detected.candidate.id, PLATFORM_SOURCE);
    assert_eq!(detected.baud, None);
}

// ============================================================================
// Resource Ownership
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_nothing_happens_after_handoff() {
    let factory = SimFactory::new()
        .with_device("/dev/ttyUSB0", SimDevice::responds(Duration::from_millis(10)));
    let stats = factory.stats();

    let (outcome, _) = run(&["/dev/ttyUSB0", "/dev/ttyUSB1"], factory).await;
    let detected = outcome.into_detected().unwrap();
    let before = stats.snapshot();

    tokio::time::sleep(WINDOW * 10).await;
    assert_eq!(stats.snapshot(), before);
    assert!(detected.connection.status().has_valid_frame());

    // The caller now owns the connection and decides when it ends
    detected.connection.close();
    assert_eq!(stats.alive(), 0);
    assert_eq!(stats.closes(), before.closes + 1);
}

#[tokio::test(start_paused = true)]
async fn test_dying_device_advances_without_double_close() {
    let factory = SimFactory::new()
        .with_device("/dev/ttyUSB0", SimDevice::dies_after(Duration::from_millis(300)))
        .with_device("/dev/ttyUSB1", SimDevice::responds(Duration::from_millis(10)));
    let stats = factory.stats();
    let start = Instant::now();

    let (outcome, events) = run(&["/dev/ttyUSB0", "/dev/ttyUSB1"], factory).await;
    let detected = outcome.into_detected().unwrap();
    assert_eq!(detected.candidate.id, "/dev/ttyUSB1");

    // Every baud on ttyUSB0 dies after 300 ms and is dropped right away
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.self_destructs, 5);
    assert_eq!(snapshot.closes, 0);
    assert_eq!(snapshot.alive, 1);
    assert_eq!(snapshot.max_alive, 1);
    assert_eq!(start.elapsed(), Duration::from_millis(300 * 5 + 10));

    let teardowns = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                DetectorEvent::AttemptAbandoned {
                    reason: AdvanceReason::ExternalTeardown,
                    ..
                }
            )
        })
        .count();
    assert_eq!(teardowns, 5);
}

#[tokio::test(start_paused = true)]
async fn test_busy_port_skipped_without_waiting() {
    let factory = SimFactory::new()
        .with_device("/dev/ttyUSB0", SimDevice::Busy)
        .with_device("/dev/ttyUSB1", SimDevice::responds_at(9600, Duration::ZERO));
    let stats = factory.stats();
    let start = Instant::now();

    let (outcome, events) = run(&["/dev/ttyUSB0", "/dev/ttyUSB1"], factory).await;
    let detected = outcome.into_detected().unwrap();
    assert_eq!(detected.baud, Some(9600));

    // Five refused opens cost no time; only ttyUSB1 at 4800 waits a window
    assert_eq!(start.elapsed(), WINDOW);
    assert_eq!(stats.attempts().iter().filter(|a| !a.opened).count(), 5);
    assert_eq!(stats.opens(), 2);

    let skipped: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DetectorEvent::AttemptSkipped {
                baud,
                reason: SkipReason::OpenFailed(_),
                ..
            } => *baud,
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![4800, 9600, 38400, 57600, 115200]);
}

#[tokio::test(start_paused = true)]
async fn test_garbage_is_not_a_detection() {
    let factory = SimFactory::new()
        .with_device("/dev/ttyUSB0", SimDevice::no_fix(Duration::from_millis(5)));
    let stats = factory.stats();

    let (outcome, events) = run(&["/dev/ttyUSB0"], factory).await;
    assert!(!outcome.is_detected());
    assert_eq!(stats.opens(), 5);
    assert_eq!(stats.closes(), 5);
    assert_eq!(stats.alive(), 0);
    assert_eq!(events.last(), Some(&DetectorEvent::Failed { attempts: 5 }));
}

#[tokio::test(start_paused = true)]
async fn test_abort_closes_connection_under_observation() {
    let factory = SimFactory::new().with_device("/dev/ttyUSB0", SimDevice::Silent);
    let stats = factory.stats();
    let detector =
        Detector::with_candidates(DetectorConfig::default(), candidates(&["/dev/ttyUSB0"]), factory)
            .unwrap();

    let handle = detector.spawn();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stats.alive(), 1);

    handle.abort();
    assert!(handle.outcome().await.is_none());
    assert_eq!(stats.alive(), 0);
    assert_eq!(stats.closes(), 1);
}

#[test]
fn test_malformed_network_endpoint_rejected() {
    let ports = StaticPorts(Vec::new());
    for bad in ["localhost:abc", "localhost:2947", ":2947:"] {
        let result = Detector::new(DetectorConfig::default(), Some(bad), &ports, SimFactory::new());
        assert!(result.is_err(), "{bad} should be rejected");
    }
}

// ============================================================================
// Properties
// ============================================================================

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn silent_devices_fail_once_within_bound(
        serial_ports in 0usize..4,
        with_gpsd in any::<bool>(),
        bauds in prop::collection::vec(1200u32..230400, 1..5),
        window_ms in 10u64..3000,
    ) {
        let mut ids = Vec::new();
        if with_gpsd {
            ids.push("localhost:2947:".to_string());
        }
        for i in 0..serial_ports {
            ids.push(format!("/dev/ttyUSB{i}"));
        }
        let candidates: Vec<_> = ids
            .iter()
            .map(|id| Candidate::user_specified(id).unwrap())
            .collect();
        let config = DetectorConfig {
            baud_rates: bauds.clone(),
            observation_window_ms: window_ms,
            ..Default::default()
        };
        let bound = config.worst_case(&candidates);

        let factory = SimFactory::new();
        let stats = factory.stats();

        let (outcome, events, elapsed) = paused_runtime().block_on(async move {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let start = Instant::now();
            let outcome = Detector::with_candidates(config, candidates, factory)
                .unwrap()
                .with_progress(tx)
                .run()
                .await;
            let elapsed = start.elapsed();
            let mut events = Vec::new();
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
            (outcome, events, elapsed)
        });

        let expected_opens = serial_ports * bauds.len() + usize::from(with_gpsd);
        prop_assert!(!outcome.is_detected());
        prop_assert_eq!(terminal_events(&events), 1);
        prop_assert_eq!(events.last(), Some(&DetectorEvent::Failed { attempts: expected_opens }));
        prop_assert_eq!(stats.opens(), expected_opens);
        prop_assert_eq!(stats.closes(), expected_opens);
        prop_assert!(stats.max_alive() <= 1);
        prop_assert!(elapsed <= bound);
        prop_assert_eq!(elapsed, Duration::from_millis(window_ms) * expected_opens as u32);
    }

    #[test]
    fn first_responsive_pair_wins(
        silent_before in 0usize..3,
        answer_baud_index in 0usize..5,
    ) {
        let bauds = DetectorConfig::default().baud_rates;
        let answer_baud = bauds[answer_baud_index];

        let mut factory = SimFactory::new();
        let mut ids = Vec::new();
        for i in 0..silent_before {
            let id = format!("/dev/ttyS{i}");
            factory = factory.with_device(id.clone(), SimDevice::Silent);
            ids.push(id);
        }
        factory = factory
            .with_device("/dev/ttyUSB0", SimDevice::responds_at(answer_baud, Duration::from_millis(1)))
            .with_device("/dev/ttyUSB1", SimDevice::responds(Duration::ZERO));
        ids.push("/dev/ttyUSB0".into());
        ids.push("/dev/ttyUSB1".into());
        let stats = factory.stats();

        let candidates: Vec<_> = ids
            .iter()
            .map(|id| Candidate::user_specified(id).unwrap())
            .collect();
        let detected = paused_runtime().block_on(async move {
            Detector::with_candidates(DetectorConfig::default(), candidates, factory)
                .unwrap()
                .run()
                .await
                .into_detected()
        });

        let detected = detected.expect("a receiver answers");
        prop_assert_eq!(detected.candidate.id.as_str(), "/dev/ttyUSB0");
        prop_assert_eq!(detected.baud, Some(answer_baud));

        let discarded = silent_before * bauds.len() + answer_baud_index;
        prop_assert_eq!(stats.opens(), discarded + 1);
        prop_assert_eq!(stats.closes(), discarded);
        prop_assert_eq!(stats.max_alive(), 1);
        prop_assert!(stats.attempts().iter().all(|a| a.endpoint != "/dev/ttyUSB1"));
    }
}
