//! Certificate archive delivery
//!
//! [`DeliveryCoordinator`] turns an archive into a [`NotificationPayload`] and
//! hands it to a [`Notifier`], retrying failed sends with a linear backoff
//! (`attempt * backoff_unit`). API rejections and transport failures are
//! retried alike. Dry-run mode logs a preview instead of calling the notifier.

mod coordinator;
mod notifier;
mod payload;

pub use coordinator::{DeliveryAttempt, DeliveryCoordinator, DeliveryOutcome, DeliveryReport};
pub use notifier::{Notifier, ResendNotifier};
pub use payload::{format_sender, parse_recipients, Attachment, NotificationPayload};
