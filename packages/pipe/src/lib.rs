//! Single-producer, single-consumer pipes.
//!
//! This crate provides a [`Pipe`] that hands items from one worker to another
//! in FIFO order, with a one-way close flag that lets the receiving side tell
//! "nothing yet" apart from "nothing ever again". The [`Producer`] and
//! [`Consumer`] roles wrap either end of a pipe, and [`pipeline::run`] places
//! them on their own workers.
//!
//! # Example
//!
//! ```rust
//! use pipey_pipe::{Consumer, Pipe, Producer, transform::capitalize};
//!
//! let pipe = Pipe::new();
//! let mut producer = Producer::new(pipe.clone());
//! let mut consumer = Consumer::new(pipe, capitalize, Vec::new());
//!
//! producer.send_all(["ab\n".to_string(), "cd\n".to_string()]).unwrap();
//! consumer.listen().unwrap();
//!
//! assert_eq!(consumer.into_sink(), vec!["AB\n", "CD\n"]);
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

pub mod consumer;
pub mod jitter;
pub mod pipe;
pub mod pipeline;
pub mod producer;
pub mod sink;
pub mod source;
pub mod transform;
pub mod worker;

pub use consumer::{Consumer, ConsumerState, WaitStrategy};
pub use jitter::{Jitter, NoJitter, RandomJitter};
pub use pipe::{ClosedChannelError, DequeueTimeoutError, EmptyError, Pipe};
pub use producer::{Producer, ProducerError};
pub use sink::{Sink, Stdout, Writer};
