#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Example demonstrating producers and consumers connected by `pipey_pipe` pipes.
//!
//! This example shows a producer feeding a capitalizing consumer on another
//! worker, a relay forwarding into a second pipe, and a producer that is
//! dropped without closing its pipe explicitly.

use std::{sync::Arc, time::Duration};

use pipey_pipe::{
    Consumer, Jitter, Pipe, Producer, RandomJitter, Sink, Stdout, pipeline, source,
    transform::capitalize, worker,
};

const TEST_DATA: &str = "id,name\n1,alpha\n2,beta\n3,gamma\n";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    println!("=== Filter Chain Example ===\n");

    // Example 1: the original demo, a capitalizing consumer on its own worker
    println!("Example 1: Capitalize lines");
    println!("---------------------------");
    capitalize_example()?;

    println!("\n");

    // Example 2: two consumers chained through a second pipe
    println!("Example 2: Relay through a second pipe");
    println!("--------------------------------------");
    relay_example()?;

    println!("\n");

    // Example 3: the producer is dropped instead of closed
    println!("Example 3: Dropped producer");
    println!("---------------------------");
    dropped_producer_example()?;

    println!("\n");

    // Example 4: using the Sink trait directly
    println!("Example 4: Using the Sink trait");
    println!("-------------------------------");
    sink_trait_example()?;

    Ok(())
}

/// Capitalizes lines with a small random lag on both sides.
fn capitalize_example() -> Result<(), Box<dyn std::error::Error>> {
    let jitter: Arc<dyn Jitter> = Arc::new(RandomJitter::coin_flip(Duration::from_millis(50)));

    let pipe = Pipe::new();
    let producer = Producer::new(pipe.clone()).with_jitter(jitter.clone());
    let consumer = Consumer::new(pipe, capitalize, Stdout).with_jitter(jitter);

    println!("Starting a consumer listening to the producer's pipe");
    let report = pipeline::run(producer, source::lines(TEST_DATA.as_bytes()), consumer)?;
    println!("Pipe is empty and closed after {} lines", report.forwarded);

    Ok(())
}

/// Forwards capitalized lines into a second pipe drained by a numbering consumer.
fn relay_example() -> Result<(), Box<dyn std::error::Error>> {
    let first = Pipe::new();
    let second = Pipe::new();

    let mut relay = Consumer::new(first.clone(), capitalize, Producer::new(second.clone()));
    let relay = worker::spawn("relay", move || relay.listen())?;

    let mut number = 0;
    let mut numbered = Consumer::new(
        second,
        move |line: String| {
            number += 1;
            format!("{number}: {line}")
        },
        Stdout,
    );
    let numbered = worker::spawn("numbered", move || numbered.listen())?;

    let mut producer = Producer::new(first);
    producer.send_all(["first\n", "second\n", "third\n"].map(String::from))?;

    let relayed = relay.join()??;
    let printed = numbered.join()??;
    println!("Relayed {relayed} lines, printed {printed}");

    Ok(())
}

/// Shows that dropping a producer closes its pipe.
fn dropped_producer_example() -> Result<(), Box<dyn std::error::Error>> {
    let pipe = Pipe::new();
    let mut consumer = Consumer::new(pipe.clone(), capitalize, Vec::new());
    let listener = worker::spawn("listener", move || {
        consumer.listen().unwrap_or_else(|e| match e {});
        consumer.into_sink()
    })?;

    let mut producer = Producer::new(pipe.clone());
    producer.send("x\n".to_string())?;
    println!("Sent 1 line, dropping the producer without closing");
    drop(producer);

    println!("Pipe closed: {}", pipe.is_closed());
    println!("Consumer received: {:?}", listener.join()?);

    Ok(())
}

/// Generic function that accepts any type implementing `Sink`.
fn send_via_trait<S: Sink<String>>(sink: &mut S, line: &str) -> Result<(), S::Error> {
    sink.send(capitalize(line))
}

fn sink_trait_example() -> Result<(), Box<dyn std::error::Error>> {
    let pipe = Pipe::new();
    let mut producer = Producer::new(pipe.clone());
    let mut collected = Vec::new();

    send_via_trait(&mut producer, "into a pipe")?;
    send_via_trait(&mut collected, "into a vec").unwrap_or_else(|e| match e {});
    producer.finish()?;

    println!("Pipe holds {:?}", pipe.try_dequeue()?);
    println!("Vec holds {collected:?}");

    Ok(())
}
