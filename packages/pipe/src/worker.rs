//! Named workers for running pipe roles concurrently.

use std::{
    any::Any,
    thread::{self, JoinHandle},
};

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Failed to spawn worker '{name}'")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Worker '{name}' panicked: {message}")]
    Panicked { name: String, message: String },
}

/// Handle to a running worker.
#[derive(Debug)]
pub struct Worker<R> {
    name: String,
    handle: JoinHandle<R>,
}

/// Runs `function` on its own named thread.
///
/// # Errors
///
/// * If the operating system fails to create the thread
pub fn spawn<Function, Output>(
    name: &str,
    function: Function,
) -> Result<Worker<Output>, WorkerError>
where
    Function: FnOnce() -> Output + Send + 'static,
    Output: Send + 'static,
{
    log::trace!("spawn start: {name}");

    #[cfg(debug_assertions)]
    let function = {
        let name = name.to_owned();
        move || {
            let response = function();
            log::trace!("spawn finished: {name}");

            response
        }
    };

    let handle = thread::Builder::new()
        .name(name.to_owned())
        .spawn(function)
        .map_err(|source| WorkerError::Spawn {
            name: name.to_owned(),
            source,
        })?;

    Ok(Worker {
        name: name.to_owned(),
        handle,
    })
}

impl<R> Worker<R> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker's function has returned or panicked.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the worker terminates and returns its output.
    ///
    /// # Errors
    ///
    /// * If the worker panicked
    pub fn join(self) -> Result<R, WorkerError> {
        log::trace!("join: waiting for {}", self.name);

        self.handle.join().map_err(|payload| {
            let message = panic_message(payload.as_ref());
            log::error!("join: worker {} panicked: {message}", self.name);
            WorkerError::Panicked {
                name: self.name,
                message,
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic payload>".to_string())
}
