//! Event bus tests

use std::time::Duration;

use dockmon::events::{BusOptions, EventBus, EventPayload, EventType};

use crate::common::RecordingSink;

fn log(project: &str, output: &str) -> EventPayload {
    EventPayload::new(project).with_output(output)
}

#[tokio::test]
async fn test_filtered_subscriber() {
    let bus = EventBus::default();
    let sink = RecordingSink::new();
    let _sub = bus.subscribe(Some("web".to_string()), sink.clone());

    assert_eq!(bus.publish(EventType::BuildLog, &log("api", "x")), 0);
    assert_eq!(bus.publish(EventType::BuildLog, &log("web", "y")), 1);

    let events = sink.payloads_after_connect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1.project, "web");
    assert_eq!(events[0].1.output.as_deref(), Some("y"));
}

#[tokio::test]
async fn test_unfiltered_subscriber_receives_everything() {
    let bus = EventBus::default();

    // Nothing is replayed to late subscribers
    bus.publish(EventType::BuildLog, &log("web", "before"));

    let sink = RecordingSink::new();
    let _sub = bus.subscribe(None, sink.clone());
    let connection = sink.frames()[0].payload().unwrap();
    assert_eq!(connection.project, "*");

    bus.publish(EventType::BuildLog, &log("web", "a"));
    bus.publish(EventType::DeployLog, &log("api", "b"));
    bus.publish(
        EventType::DeployCompleted,
        &EventPayload::new("api").with_status("completed"),
    );

    assert_eq!(
        sink.events(),
        vec![
            EventType::Connection,
            EventType::BuildLog,
            EventType::DeployLog,
            EventType::DeployCompleted,
        ]
    );
}

#[tokio::test]
async fn test_per_subscriber_order() {
    let bus = EventBus::default();
    let first = RecordingSink::new();
    let second = RecordingSink::new();
    let _a = bus.subscribe(None, first.clone());
    let _b = bus.subscribe(Some("web".to_string()), second.clone());

    for i in 0..50 {
        bus.publish(EventType::BuildLog, &log("web", &i.to_string()));
    }

    let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
    for sink in [&first, &second] {
        let outputs: Vec<String> = sink
            .payloads_after_connect()
            .into_iter()
            .map(|(_, p)| p.output.unwrap())
            .collect();
        assert_eq!(outputs, expected);
    }
}

#[tokio::test]
async fn test_rejecting_sink_is_removed() {
    let bus = EventBus::default();
    let broken = RecordingSink::new();
    let healthy = RecordingSink::new();
    let _a = bus.subscribe(None, broken.clone());
    let _b = bus.subscribe(None, healthy.clone());
    assert_eq!(bus.subscriber_count(), 2);

    broken.reject_writes();
    assert_eq!(bus.publish(EventType::BuildLog, &log("web", "x")), 1);
    assert_eq!(bus.subscriber_count(), 1);

    // Later publishes only reach the healthy subscriber
    assert_eq!(bus.publish(EventType::BuildLog, &log("web", "y")), 1);
    assert_eq!(healthy.payloads_after_connect().len(), 2);
}

#[tokio::test]
async fn test_closed_sink_is_removed() {
    let bus = EventBus::default();
    let sink = RecordingSink::new();
    let sub = bus.subscribe(None, sink.clone());

    sink.close();
    assert_eq!(bus.publish(EventType::BuildLog, &log("web", "x")), 0);
    assert_eq!(bus.subscriber_count(), 0);
    assert!(sink.payloads_after_connect().is_empty());

    // Dropping an already removed subscription is harmless
    drop(sub);
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_ping() {
    let bus = EventBus::new(BusOptions {
        keep_alive_interval: Duration::from_secs(15),
    });
    let filtered = RecordingSink::new();
    let all = RecordingSink::new();
    let _a = bus.subscribe(Some("web".to_string()), filtered.clone());
    let _b = bus.subscribe(None, all.clone());

    tokio::time::sleep(Duration::from_secs(14)).await;
    assert_eq!(all.events(), vec![EventType::Connection]);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(all.events(), vec![EventType::Connection, EventType::Ping]);

    let pings = filtered.payloads_after_connect();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].0, EventType::Ping);
    assert_eq!(pings[0].1.project, "web");
    assert_eq!(all.payloads_after_connect()[0].1.project, "*");

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(all.events().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_removes_closed_sink() {
    let bus = EventBus::default();
    let sink = RecordingSink::new();
    let _sub = bus.subscribe(None, sink.clone());

    sink.close();
    assert_eq!(bus.subscriber_count(), 1);

    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(sink.events(), vec![EventType::Connection]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_subscribe_and_publish() {
    let bus = EventBus::default();
    let watcher = RecordingSink::new();
    let _watch = bus.subscribe(None, watcher.clone());

    let mut handles = Vec::new();
    for i in 0..8 {
        let bus = bus.clone();
        handles.push(tokio::spawn(async move {
            let sink = RecordingSink::new();
            let sub = bus.subscribe(Some(format!("p{}", i)), sink.clone());
            for n in 0..20 {
                bus.publish(EventType::BuildLog, &log(&format!("p{}", i), &n.to_string()));
            }
            drop(sub);
            sink.payloads_after_connect().len()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 20);
    }
    assert_eq!(watcher.payloads_after_connect().len(), 160);
    assert_eq!(bus.subscriber_count(), 1);
}
