// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use turnstile_adapters::{FakeBroker, FakePublisher, FakeSubscriber, PubSubCall};

type TestRelay = EventRelay<FakePublisher, FakeSubscriber>;

fn relay() -> (TestRelay, FakeBroker) {
    let broker = FakeBroker::new();
    let relay = EventRelay::new(broker.publisher(), broker.subscriber());
    (relay, broker)
}

/// Handler that records every message it sees
#[derive(Clone, Default)]
struct Inbox {
    seen: Arc<Mutex<Vec<Message>>>,
}

impl Inbox {
    fn handler(&self) -> impl MessageHandler {
        let seen = Arc::clone(&self.seen);
        move |message: &Message| -> HandlerResult {
            seen.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn payloads(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.payload.clone())
            .collect()
    }

    fn messages(&self) -> Vec<Message> {
        self.seen.lock().unwrap().clone()
    }

    async fn wait_for(&self, count: usize) {
        for _ in 0..200 {
            if self.seen.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {} messages, got {:?}",
            count,
            self.payloads()
        );
    }
}

fn count_calls(broker: &FakeBroker, wanted: impl Fn(&PubSubCall) -> bool) -> usize {
    broker.calls().iter().filter(|c| wanted(c)).count()
}

/// Give the dispatch task a chance to run
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn publish_fans_out_to_every_handler() {
    let (relay, _broker) = relay();
    let inboxes = [Inbox::default(), Inbox::default(), Inbox::default()];
    for inbox in &inboxes {
        relay.subscribe("orders", inbox.handler()).await.unwrap();
    }

    let receivers = relay.publish("orders", "created").await;

    assert_eq!(receivers, 1);
    for inbox in &inboxes {
        inbox.wait_for(1).await;
        assert_eq!(inbox.payloads(), vec!["created"]);
    }
}

#[tokio::test]
async fn unsubscribing_one_handler_leaves_the_others() {
    let (relay, broker) = relay();
    let inboxes = [Inbox::default(), Inbox::default(), Inbox::default()];
    let mut ids = Vec::new();
    for inbox in &inboxes {
        ids.push(relay.subscribe("orders", inbox.handler()).await.unwrap());
    }

    assert!(relay.unsubscribe("orders", Some(ids[1])).await);
    relay.publish("orders", "second").await;

    inboxes[0].wait_for(1).await;
    inboxes[2].wait_for(1).await;
    settle().await;
    assert!(inboxes[1].payloads().is_empty());
    assert_eq!(relay.handler_count("orders"), 2);
    assert_eq!(
        count_calls(&broker, |c| matches!(c, PubSubCall::Unsubscribe { .. })),
        0
    );
}

#[tokio::test]
async fn shared_channel_subscribes_and_unsubscribes_once() {
    let (relay, broker) = relay();
    let a = relay.subscribe("rooms", Inbox::default().handler()).await.unwrap();
    let b = relay.subscribe("rooms", Inbox::default().handler()).await.unwrap();
    assert_ne!(a, b);

    assert_eq!(
        count_calls(&broker, |c| matches!(c, PubSubCall::Subscribe { .. })),
        1
    );

    assert!(relay.unsubscribe("rooms", Some(a)).await);
    assert_eq!(
        count_calls(&broker, |c| matches!(c, PubSubCall::Unsubscribe { .. })),
        0
    );

    assert!(relay.unsubscribe("rooms", Some(b)).await);
    assert_eq!(
        count_calls(&broker, |c| matches!(c, PubSubCall::Unsubscribe { .. })),
        1
    );
    assert!(relay.channels().is_empty());
    assert!(broker.channels().is_empty());
}

#[tokio::test]
async fn unsubscribe_all_drops_every_handler() {
    let (relay, broker) = relay();
    relay.subscribe("rooms", Inbox::default().handler()).await.unwrap();
    relay.subscribe("rooms", Inbox::default().handler()).await.unwrap();

    assert!(relay.unsubscribe("rooms", None).await);
    assert!(!relay.unsubscribe("rooms", None).await);

    assert_eq!(relay.handler_count("rooms"), 0);
    assert_eq!(
        count_calls(&broker, |c| matches!(c, PubSubCall::Unsubscribe { .. })),
        1
    );
}

#[tokio::test]
async fn unsubscribe_unknown_handler_is_false() {
    let (relay, broker) = relay();
    let id = relay.subscribe("rooms", Inbox::default().handler()).await.unwrap();

    assert!(!relay.unsubscribe("other", Some(id)).await);
    assert!(!relay.unsubscribe("other", None).await);
    assert_eq!(relay.handler_count("rooms"), 1);
    assert!(broker
        .calls()
        .iter()
        .all(|c| !matches!(c, PubSubCall::Unsubscribe { .. })));
}

#[tokio::test]
async fn subscribe_when_not_ready_registers_nothing() {
    let (relay, broker) = relay();
    relay.subscriber().set_ready(false);

    let id = relay.subscribe("rooms", Inbox::default().handler()).await;

    assert_eq!(id, None);
    assert_eq!(relay.handler_count("rooms"), 0);
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn failed_store_subscribe_rolls_back() {
    let (relay, broker) = relay();
    broker.set_subscribe_fails(true);

    assert_eq!(relay.subscribe("rooms", Inbox::default().handler()).await, None);
    assert_eq!(relay.handler_count("rooms"), 0);

    broker.set_subscribe_fails(false);
    assert!(relay
        .subscribe("rooms", Inbox::default().handler())
        .await
        .is_some());
    assert_eq!(
        count_calls(&broker, |c| matches!(c, PubSubCall::Subscribe { .. })),
        2
    );
}

#[tokio::test]
async fn publish_when_not_ready_returns_zero_without_sending() {
    let (relay, broker) = relay();
    relay.publisher().set_ready(false);

    assert_eq!(relay.publish("orders", "lost").await, 0);
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn publish_reports_receiver_count() {
    let (relay, broker) = relay();
    let other = broker.subscriber();
    other.subscribe("orders").await.unwrap();
    relay.subscribe("orders", Inbox::default().handler()).await.unwrap();

    assert_eq!(relay.publish("orders", "x").await, 2);
    assert_eq!(relay.publish("nobody-listens", "x").await, 0);
}

#[tokio::test]
async fn pattern_handlers_see_the_concrete_channel() {
    let (relay, _broker) = relay();
    let inbox = Inbox::default();
    relay.psubscribe("bookings.*", inbox.handler()).await.unwrap();

    relay.publish("bookings.created", "b1").await;
    relay.publish("members.created", "m1").await;
    inbox.wait_for(1).await;
    settle().await;

    let messages = inbox.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].channel, "bookings.created");
    assert_eq!(messages[0].pattern.as_deref(), Some("bookings.*"));
    assert_eq!(messages[0].payload, "b1");
}

#[tokio::test]
async fn punsubscribe_stops_pattern_delivery() {
    let (relay, broker) = relay();
    let inbox = Inbox::default();
    relay.psubscribe("bookings.*", inbox.handler()).await.unwrap();

    assert!(relay.punsubscribe("bookings.*", None).await);
    relay.publish("bookings.created", "b1").await;
    settle().await;

    assert!(inbox.payloads().is_empty());
    assert!(broker.patterns().is_empty());
    assert_eq!(relay.pattern_handler_count("bookings.*"), 0);
}

#[tokio::test]
async fn channel_and_pattern_handlers_are_dispatched_separately() {
    let (relay, _broker) = relay();
    let by_channel = Inbox::default();
    let by_pattern = Inbox::default();
    relay.subscribe("bookings.created", by_channel.handler()).await.unwrap();
    relay.psubscribe("bookings.*", by_pattern.handler()).await.unwrap();

    assert_eq!(relay.publish("bookings.created", "b1").await, 2);

    by_channel.wait_for(1).await;
    by_pattern.wait_for(1).await;
    settle().await;
    assert_eq!(by_channel.messages().len(), 1);
    assert_eq!(by_pattern.messages().len(), 1);
    assert_eq!(by_channel.messages()[0].pattern, None);
}

#[tokio::test]
async fn failing_and_panicking_handlers_do_not_stop_others() {
    let (relay, _broker) = relay();
    let inbox = Inbox::default();
    relay
        .subscribe("orders", |_: &Message| -> HandlerResult {
            Err("handler rejected message".into())
        })
        .await
        .unwrap();
    relay
        .subscribe("orders", |message: &Message| -> HandlerResult {
            if message.payload == "boom" {
                panic!("handler exploded");
            }
            Ok(())
        })
        .await
        .unwrap();
    relay.subscribe("orders", inbox.handler()).await.unwrap();

    relay.publish("orders", "boom").await;
    relay.publish("orders", "after").await;

    inbox.wait_for(2).await;
    assert_eq!(inbox.payloads(), vec!["boom", "after"]);
}

#[tokio::test]
async fn publish_json_encodes_values_and_passes_strings_through() {
    let (relay, _broker) = relay();
    let inbox = Inbox::default();
    relay.subscribe("events", inbox.handler()).await.unwrap();

    #[derive(Serialize)]
    struct Booked<'a> {
        slot: &'a str,
        seats: u32,
    }

    relay
        .publish_json("events", &Booked { slot: "9am", seats: 2 })
        .await
        .unwrap();
    relay.publish_json("events", "plain text").await.unwrap();

    inbox.wait_for(2).await;
    let messages = inbox.messages();
    let decoded: serde_json::Value = messages[0].json().unwrap();
    assert_eq!(decoded, serde_json::json!({"slot": "9am", "seats": 2}));
    assert_eq!(messages[1].payload, "plain text");
}

#[tokio::test]
async fn disconnect_closes_connections_and_clears_handlers() {
    let (relay, broker) = relay();
    relay.subscribe("orders", Inbox::default().handler()).await.unwrap();

    relay.disconnect().await;

    assert!(relay.channels().is_empty());
    assert!(relay.publisher().readiness().is_closed());
    assert!(relay.subscriber().readiness().is_closed());
    assert_eq!(relay.publish("orders", "late").await, 0);
    assert!(broker.channels().is_empty());
}

#[tokio::test]
async fn dropping_the_relay_ends_dispatch() {
    let broker = FakeBroker::new();
    let subscriber = broker.subscriber();
    let relay = EventRelay::new(broker.publisher(), subscriber.clone());
    relay.subscribe("orders", Inbox::default().handler()).await.unwrap();

    drop(relay);
    broker.publisher().publish("orders", &Payload::text("x")).await.unwrap();
    settle().await;

    // The stream was handed to the dispatcher, not left for another taker
    assert!(subscriber.take_messages().is_none());
}
