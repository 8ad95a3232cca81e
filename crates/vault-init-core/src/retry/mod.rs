//! Policy-based retry engine
//!
//! Used where an operation is expected to fail for a while before it can
//! succeed, most notably while cloud credentials are injected into a freshly
//! started container.
//!
//! # Features
//!
//! - Fixed-interval [`RetryPolicy`] with an optional attempt cap (`None` retries forever)
//! - [`RetryPredicate`] to separate "not yet" errors from fatal ones
//! - Observable attempts via [`RetryObserver`], with [`TracingObserver`] for logging
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use vault_init_core::retry::{ClosurePredicate, RetryExecutorBuilder, RetryPolicy, TracingObserver};
//!
//! async fn example() {
//!     let executor = RetryExecutorBuilder::new()
//!         .with_policy(RetryPolicy::unbounded(Duration::from_secs(5)))
//!         .with_predicate(ClosurePredicate::new(|err: &std::io::Error| {
//!             err.kind() == std::io::ErrorKind::NotFound
//!         }))
//!         .with_observer(TracingObserver::new("credentials"))
//!         .build();
//!
//!     let _ = executor
//!         .execute(|| async { std::fs::read_to_string("/var/run/secrets/token") })
//!         .await;
//! }
//! ```

mod error;
mod executor;
mod observer;
mod policy;

pub use error::RetryError;
pub use executor::{RetryExecutor, RetryExecutorBuilder};
#[cfg(test)]
pub use observer::StatsObserver;
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use policy::{AlwaysRetry, ClosurePredicate, RetryPolicy, RetryPredicate};

#[cfg(test)]
mod tests;
