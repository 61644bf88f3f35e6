//! In-process demo: a producer and a consumer on one router.

use super::attributes::describe;
use anyhow::{Context, Result};
use avis_client::{Client, ClientOptions, Connection, LocalRouter, NotificationEvent};
use avis_types::Attributes;
use std::sync::atomic::{AtomicU64, Ordering};

const SUBSCRIPTION: &str = "require(Opaque)";

/// The notifications sent each round. The second reuses `Opaque` with a
/// different type and still matches.
fn sample_notifications() -> Result<[Attributes; 2]> {
    let mut first = Attributes::new();
    first.set_string("Greeting", "Hello World")?;
    first.set_int32("Number", 42)?;
    first.set_int64("big", 400000000011)?;
    first.set_real64("real", f64::NAN)?;
    first.set_real64("real2", 2314.342413)?;
    first.set_opaque("Opaque", b"dabguytreww\0\0\x01x")?;

    let mut second = Attributes::new();
    second.set_real64("Opaque", 5.0)?;

    Ok([first, second])
}

fn send_round(producer: &Connection) -> Result<()> {
    for notification in sample_notifications()? {
        producer.send(&notification)?;
    }
    Ok(())
}

/// Run `rounds` rounds, printing each notification the consumer receives.
///
/// The listener sends the next round itself and closes the consumer after
/// the last one, so the event loop ends from inside a callback.
pub fn run_demo(options: ClientOptions, rounds: u64) -> Result<()> {
    let router = LocalRouter::with_options(&options);
    let consumer = Client::new(router.clone(), options.clone())
        .open_default()
        .context("Failed to open consumer connection")?;
    let producer = Client::new(router, options)
        .open_default()
        .context("Failed to open producer connection")?;
    println!("Connected to {}", consumer.uri().canonical());

    let subscription = consumer.subscribe(SUBSCRIPTION)?;
    println!("Subscribed to {}", SUBSCRIPTION);

    let expected = rounds * 2;
    let seen = AtomicU64::new(0);
    let sender = producer.clone();
    subscription.add_listener(move |event: &NotificationEvent<'_>| -> anyhow::Result<()> {
        let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
        println!(
            "Notification {} ({}):",
            n,
            if event.secure { "secure" } else { "insecure" }
        );
        for (name, value) in event.attributes.iter() {
            println!("  {}", describe(name, value));
        }

        if n == expected {
            if let Some(connection) = event.subscription.connection() {
                connection.close();
            }
        } else if n % 2 == 0 {
            send_round(&sender)?;
        }
        Ok(())
    });

    send_round(&producer)?;
    let exit = consumer.event_loop()?;
    tracing::debug!("Demo loop exited: {:?}", exit);

    let stats = consumer.stats();
    println!(
        "Received {} notifications, {} matched",
        stats.notifications_received, stats.notifications_matched
    );
    producer.close();
    Ok(())
}
