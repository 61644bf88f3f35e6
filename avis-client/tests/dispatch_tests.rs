use avis_client::{
    Client, ClientError, ClientOptions, CollectingListener, Connection, ConnectionState,
    ListenerError, LocalRouter, LoopExit, NotificationEvent, PanicPolicy, Value,
};
use avis_types::Attributes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const URI: &str = "elvin://localhost";

fn pair() -> (LocalRouter, Connection, Connection) {
    let router = LocalRouter::new();
    let consumer = Client::local(router.clone()).open(URI).unwrap();
    let producer = Client::local(router.clone()).open(URI).unwrap();
    (router, consumer, producer)
}

fn numbered(n: i32) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.set_int32("n", n).unwrap();
    attrs
}

/// Close `connection` once a listener on `subscription` has seen `count` notifications
fn close_after(connection: &Connection, expression: &str, count: usize) {
    let seen = AtomicUsize::new(0);
    let subscription = connection.subscribe(expression).unwrap();
    subscription.add_listener(move |event: &NotificationEvent<'_>| -> anyhow::Result<()> {
        if seen.fetch_add(1, Ordering::SeqCst) + 1 == count {
            if let Some(connection) = event.subscription.connection() {
                connection.close();
            }
        }
        Ok(())
    });
}

#[test]
fn test_require_scenario() {
    let (_router, consumer, producer) = pair();
    let subscription = consumer.subscribe("require(Opaque)").unwrap();
    let collected = CollectingListener::new();
    subscription.add_listener(collected.clone());
    close_after(&consumer, "require(Opaque)", 2);

    let opaque = b"dabguytreww\0\0\x01x".to_vec();
    let mut first = Attributes::new();
    first.set_string("Greeting", "Hello World").unwrap();
    first.set_int32("Number", 42).unwrap();
    first.set_int64("big", 400000000011).unwrap();
    first.set_real64("real", f64::NAN).unwrap();
    first.set_real64("real2", 2314.342413).unwrap();
    first.set_opaque("Opaque", &opaque).unwrap();

    let mut unrelated = Attributes::new();
    unrelated.set_string("Greeting", "no opaque here").unwrap();

    let mut second = Attributes::new();
    second.set_real64("Opaque", 5.0).unwrap();

    producer.send(&first).unwrap();
    producer.send(&unrelated).unwrap();
    producer.send(&second).unwrap();

    assert_eq!(consumer.event_loop().unwrap(), LoopExit::Closed);

    let received = collected.take();
    assert_eq!(received.len(), 2);

    let got = &received[0].attributes;
    assert_eq!(got.len(), 6);
    let names: Vec<_> = got.names().collect();
    assert_eq!(
        names,
        vec!["Greeting", "Number", "big", "real", "real2", "Opaque"]
    );
    for (name, value) in first.iter() {
        assert!(
            got.get(name).unwrap().bit_eq(value),
            "{} changed in transit",
            name
        );
    }
    assert!(got.get_real64("real").unwrap().is_nan());
    assert_eq!(got.get_opaque("Opaque").unwrap(), opaque.as_slice());
    assert!(!received[0].secure);

    assert_eq!(
        received[1].attributes.get("Opaque").unwrap(),
        &Value::Real64(5.0)
    );

    let stats = consumer.stats();
    assert_eq!(stats.notifications_received, 3);
    assert_eq!(stats.notifications_matched, 2);
    assert_eq!(producer.stats().notifications_sent, 3);
}

#[test]
fn test_listeners_run_in_registration_order() {
    let (_router, consumer, producer) = pair();
    let subscription = consumer.subscribe("require(n)").unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        subscription.add_listener(move |_: &NotificationEvent<'_>| -> anyhow::Result<()> {
            order.lock().push(tag);
            Ok(())
        });
    }
    close_after(&consumer, "require(n)", 1);

    producer.send(&numbered(1)).unwrap();
    consumer.event_loop().unwrap();

    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
}

#[test]
fn test_removed_listener_is_not_invoked() {
    let (_router, consumer, producer) = pair();
    let subscription = consumer.subscribe("require(n)").unwrap();
    let removed = CollectingListener::new();
    let kept = CollectingListener::new();
    let id = subscription.add_listener(removed.clone());
    subscription.add_listener(kept.clone());

    assert!(subscription.remove_listener(id));
    assert!(!subscription.remove_listener(id));
    assert_eq!(subscription.listener_count(), 1);

    producer.send(&numbered(1)).unwrap();
    assert_eq!(consumer.run_once().unwrap(), None);

    assert!(removed.is_empty());
    assert_eq!(kept.len(), 1);
}

#[test]
fn test_listener_removes_itself() {
    let (_router, consumer, producer) = pair();
    let subscription = consumer.subscribe("require(n)").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let own_id = Arc::new(Mutex::new(None));

    let id = {
        let calls = Arc::clone(&calls);
        let own_id = Arc::clone(&own_id);
        subscription.add_listener(move |event: &NotificationEvent<'_>| -> anyhow::Result<()> {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *own_id.lock() {
                event.subscription.remove_listener(id);
            }
            Ok(())
        })
    };
    *own_id.lock() = Some(id);
    close_after(&consumer, "require(n)", 2);

    producer.send(&numbered(1)).unwrap();
    producer.send(&numbered(2)).unwrap();
    consumer.event_loop().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(subscription.listener_count(), 0);
}

#[test]
fn test_listener_subscribes_on_its_connection() {
    let (_router, consumer, producer) = pair();
    let outer = consumer.subscribe("require(n)").unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let created = Arc::new(Mutex::new(None));

    {
        let seen = Arc::clone(&seen);
        let created = Arc::clone(&created);
        outer.add_listener(move |event: &NotificationEvent<'_>| -> anyhow::Result<()> {
            let mut created = created.lock();
            if created.is_some() {
                return Ok(());
            }
            let connection = event
                .subscription
                .connection()
                .ok_or_else(|| anyhow::anyhow!("connection gone"))?;
            let inner = connection.subscribe("require(n)")?;

            let seen = Arc::clone(&seen);
            inner.add_listener(move |event: &NotificationEvent<'_>| -> anyhow::Result<()> {
                let mut seen = seen.lock();
                seen.push(event.attributes.get_int32("n")?);
                if seen.len() == 2 {
                    if let Some(connection) = event.subscription.connection() {
                        connection.close();
                    }
                }
                Ok(())
            });
            *created = Some(inner);
            Ok(())
        });
    }

    for n in 1..=3 {
        producer.send(&numbered(n)).unwrap();
    }
    assert_eq!(consumer.event_loop().unwrap(), LoopExit::Closed);

    // Created during the first pass, so it starts with the second notification
    assert_eq!(*seen.lock(), vec![2, 3]);
    assert!(created.lock().is_some());
    assert_eq!(consumer.stats().listener_failures, 0);
}

#[test]
fn test_listener_unsubscribes_later_subscription() {
    let (_router, consumer, producer) = pair();
    let first = consumer.subscribe("require(n)").unwrap();
    let later = consumer.subscribe("require(n)").unwrap();
    let collected = CollectingListener::new();
    later.add_listener(collected.clone());

    let target = later.clone();
    first.add_listener(move |_: &NotificationEvent<'_>| -> anyhow::Result<()> {
        target.unsubscribe();
        Ok(())
    });
    close_after(&consumer, "require(n)", 2);

    producer.send(&numbered(1)).unwrap();
    producer.send(&numbered(2)).unwrap();
    assert_eq!(consumer.event_loop().unwrap(), LoopExit::Closed);

    assert!(collected.is_empty());
    assert!(!later.is_active());
    assert_eq!(later.listener_count(), 0);
}

#[test]
fn test_listener_removed_mid_pass_still_runs_once() {
    let (_router, consumer, producer) = pair();
    let subscription = consumer.subscribe("require(n)").unwrap();
    let victim_id = Arc::new(Mutex::new(None));

    {
        let victim_id = Arc::clone(&victim_id);
        subscription.add_listener(move |event: &NotificationEvent<'_>| -> anyhow::Result<()> {
            if let Some(id) = victim_id.lock().take() {
                assert!(event.subscription.remove_listener(id));
            }
            Ok(())
        });
    }
    let victim = CollectingListener::new();
    *victim_id.lock() = Some(subscription.add_listener(victim.clone()));
    close_after(&consumer, "require(n)", 2);

    producer.send(&numbered(1)).unwrap();
    producer.send(&numbered(2)).unwrap();
    consumer.event_loop().unwrap();

    let received = victim.take();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].attributes.get_int32("n").unwrap(), 1);
    assert_eq!(subscription.listener_count(), 1);
}

#[test]
fn test_close_from_listener_stops_after_current_pass() {
    let (_router, consumer, producer) = pair();
    let first = consumer.subscribe("require(n)").unwrap();
    let later = consumer.subscribe("require(n)").unwrap();
    let collected = CollectingListener::new();

    first.add_listener(|event: &NotificationEvent<'_>| -> anyhow::Result<()> {
        if let Some(connection) = event.subscription.connection() {
            connection.close();
            assert_eq!(connection.state(), ConnectionState::Closed);
        }
        Ok(())
    });
    later.add_listener(collected.clone());

    for n in 1..=3 {
        producer.send(&numbered(n)).unwrap();
    }

    assert_eq!(consumer.event_loop().unwrap(), LoopExit::Closed);

    // The pass that closed the connection still reaches the later
    // subscription; the queued notifications are never dispatched.
    let received = collected.take();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].attributes.get_int32("n").unwrap(), 1);
    assert!(!later.is_active());
    assert_eq!(consumer.state(), ConnectionState::Closed);
}

#[test]
fn test_close_from_other_thread_wakes_loop() {
    let (_router, consumer, _producer) = pair();
    consumer.subscribe("require(n)").unwrap();

    let looping = consumer.clone();
    let handle = thread::spawn(move || looping.event_loop());

    while consumer.state() != ConnectionState::LoopRunning {
        thread::yield_now();
    }
    assert!(matches!(
        consumer.event_loop(),
        Err(ClientError::LoopAlreadyRunning)
    ));

    consumer.close();
    consumer.close();
    assert_eq!(handle.join().unwrap().unwrap(), LoopExit::Closed);
    assert!(matches!(consumer.event_loop(), Err(ClientError::NotConnected)));
    assert!(matches!(
        consumer.send(&numbered(1)),
        Err(ClientError::NotConnected)
    ));
    assert!(matches!(
        consumer.subscribe("require(n)"),
        Err(ClientError::NotConnected)
    ));
}

#[test]
fn test_subscribe_while_loop_runs() {
    let (_router, consumer, producer) = pair();
    let looping = consumer.clone();
    let handle = thread::spawn(move || looping.event_loop());

    let subscriber = {
        let consumer = consumer.clone();
        thread::spawn(move || {
            let mut subs = Vec::new();
            for i in 0..20 {
                subs.push(consumer.subscribe(&format!("n == {}", i)).unwrap());
            }
            subs
        })
    };
    let subs = subscriber.join().unwrap();
    assert_eq!(consumer.subscriptions().len(), 20);

    let collected = CollectingListener::new();
    subs[7].add_listener(collected.clone());
    close_after(&consumer, "n == 7", 1);
    producer.send(&numbered(7)).unwrap();

    assert_eq!(handle.join().unwrap().unwrap(), LoopExit::Closed);
    assert_eq!(collected.len(), 1);
}

#[test]
fn test_unsubscribe() {
    let (_router, consumer, producer) = pair();
    let gone = consumer.subscribe("require(n)").unwrap();
    let collected = CollectingListener::new();
    gone.add_listener(collected.clone());

    gone.unsubscribe();
    gone.unsubscribe();
    assert!(!gone.is_active());
    assert_eq!(gone.listener_count(), 0);
    assert!(consumer.subscriptions().is_empty());

    producer.send(&numbered(1)).unwrap();
    consumer.run_once().unwrap();
    assert!(collected.is_empty());
    assert_eq!(consumer.stats().notifications_matched, 0);
}

#[test]
fn test_failing_listeners_do_not_stop_dispatch() {
    let router = LocalRouter::new();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let client = {
        let failures = Arc::clone(&failures);
        Client::local(router.clone()).on_listener_error(move |error: &ListenerError| {
            failures.lock().push(error.is_panic());
        })
    };
    let consumer = client.open(URI).unwrap();

    let subscription = consumer.subscribe("require(n)").unwrap();
    subscription.add_listener(|_: &NotificationEvent<'_>| -> anyhow::Result<()> {
        anyhow::bail!("listener refused")
    });
    subscription.add_listener(|_: &NotificationEvent<'_>| -> anyhow::Result<()> {
        panic!("listener exploded")
    });
    let collected = CollectingListener::new();
    subscription.add_listener(collected.clone());

    consumer.send(&numbered(1)).unwrap();
    assert_eq!(consumer.run_once().unwrap(), None);

    assert_eq!(collected.len(), 1);
    assert_eq!(*failures.lock(), vec![false, true]);
    assert_eq!(consumer.stats().listener_failures, 2);
    assert_eq!(consumer.state(), ConnectionState::Open);
}

#[test]
fn test_propagate_panic_policy() {
    let router = LocalRouter::new();
    let options = ClientOptions {
        listener_panic_policy: PanicPolicy::Propagate,
        ..ClientOptions::default()
    };
    let consumer = Client::new(router, options).open(URI).unwrap();
    let subscription = consumer.subscribe("require(n)").unwrap();
    subscription.add_listener(|_: &NotificationEvent<'_>| -> anyhow::Result<()> {
        panic!("boom")
    });

    consumer.send(&numbered(1)).unwrap();
    let looping = consumer.clone();
    let outcome = thread::spawn(move || looping.run_once()).join();

    assert!(outcome.is_err());
    assert_eq!(consumer.state(), ConnectionState::Open);
    assert_eq!(consumer.stats().listener_failures, 1);
}

#[test]
fn test_insecure_deliveries_can_be_refused() {
    let router = LocalRouter::new();
    let consumer = Client::local(router.clone())
        .open("elvin:/secure/localhost")
        .unwrap();
    let secure_producer = Client::local(router.clone())
        .open("elvin:/secure/localhost")
        .unwrap();
    let plain_producer = Client::local(router).open("elvin://localhost").unwrap();

    let subscription = consumer.subscribe("require(n)").unwrap();
    subscription.set_accept_insecure(false);
    let collected = CollectingListener::new();
    subscription.add_listener(collected.clone());

    plain_producer.send(&numbered(1)).unwrap();
    secure_producer.send(&numbered(2)).unwrap();
    consumer.run_once().unwrap();
    consumer.run_once().unwrap();

    let received = collected.take();
    assert_eq!(received.len(), 1);
    assert!(received[0].secure);
    assert_eq!(received[0].attributes.get_int32("n").unwrap(), 2);
}

#[test]
fn test_transport_endings() {
    let (router, consumer, producer) = pair();
    router.fail_endpoint("localhost:2917", "link lost");
    assert_eq!(
        consumer.event_loop().unwrap(),
        LoopExit::Failed("Transport failure: link lost".to_string())
    );
    assert_eq!(consumer.state(), ConnectionState::Closed);
    drop(producer);

    let (router, consumer, _producer) = pair();
    let looping = consumer.clone();
    let handle = thread::spawn(move || looping.event_loop());
    thread::sleep(Duration::from_millis(20));
    router.shutdown();
    assert_eq!(handle.join().unwrap().unwrap(), LoopExit::Disconnected);
}

#[test]
fn test_open_errors() {
    let router = LocalRouter::new();
    router.refuse("blocked");
    let client = Client::local(router);

    assert!(matches!(
        client.open("elvin://blocked"),
        Err(ClientError::Connect { .. })
    ));
    assert!(matches!(
        client.open("http://localhost"),
        Err(ClientError::InvalidUri(_))
    ));

    let connection = client.open_default().unwrap();
    assert_eq!(connection.uri().host, "127.0.0.1");
    assert!(matches!(
        connection.subscribe("foobar(name)"),
        Err(ClientError::FilterSyntax(_))
    ));
}

#[test]
fn test_oversized_notification_is_rejected() {
    let router = LocalRouter::new();
    let options = ClientOptions {
        packet_max_length: 1024,
        ..ClientOptions::default()
    };
    let connection = Client::new(router, options).open(URI).unwrap();

    let mut attrs = Attributes::new();
    attrs.set_opaque("blob", &[7u8; 4096]).unwrap();
    assert!(matches!(
        connection.send(&attrs),
        Err(ClientError::Codec(_))
    ));
}
