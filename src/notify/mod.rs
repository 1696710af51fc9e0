//! Downstream notification: fire-and-forget change events.
//!
//! The scheduler hands a [`ChangeEvent`] to a [`Notifier`] and moves on.
//! [`KubernetesNotifier`] updates external-dns target annotations in the
//! background and only ever logs its failures.

mod error;
mod event;
mod kubernetes;

pub use error::NotifyError;
pub use event::{ChangeEvent, DisabledNotifier, Notifier};
pub use kubernetes::{
    DEFAULT_LABEL_SELECTOR, KubernetesNotifier, TARGET_ANNOTATION, UpdateSummary,
};
