//! Async runtime for concurrent fetching.
//!
//! Feed pages and detail pages go through the blocking HTTP client. The
//! fetch loops are written as `futures` streams over
//! `tokio::task::spawn_blocking`, and the synchronous pipeline drives them
//! with [`block_on`].

use std::future::Future;

use tokio::runtime::Builder;

use crate::error::Result;

/// Drive `future` to completion on a fresh current-thread runtime.
///
/// Must not be called from inside an async task. Calling it from a
/// `spawn_blocking` closure is fine.
///
/// # Arguments
///
/// * `future` - The future to run
///
/// # Returns
///
/// The future's output.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = Builder::new_current_thread().enable_time().build()?;
    Ok(runtime.block_on(future))
}
