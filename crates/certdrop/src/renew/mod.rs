//! Certificate renewal
//!
//! [`RenewalCoordinator`] drives an [`Executor`] with forced-renewal
//! semantics, retrying with a fixed delay, then polls the certificate
//! directory until the renewed files are visible.
//!
//! # Failure Handling
//!
//! - Non-zero exit, timeout and spawn errors are retried up to the policy bound
//! - A missing executable fails at once, since retrying cannot help
//! - Files that never appear after a successful run fail with a readiness
//!   timeout, distinct from an executor failure

mod coordinator;
mod executor;

pub use coordinator::{RenewalAttempt, RenewalCoordinator, RenewalReport};
pub use executor::{CommandExecutor, Executor, RenewalOutcome};
