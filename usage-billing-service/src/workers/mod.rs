mod provider_sync;
mod usage_writer;

pub use provider_sync::{MirrorJob, ProviderSync, ProviderSyncQueue};
pub use usage_writer::{UsageQueue, UsageWriter};
