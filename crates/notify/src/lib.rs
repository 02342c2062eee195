//! Live view notification on top of [`store`]: a [`Notifier`] pins a
//! version, re-evaluates its view on [`Notifier::refresh`], and diffs
//! the result against its prior snapshot into a [`ChangeSet`] (spec
//! §4.8). Delivery is decoupled from computation via the [`Scheduler`]
//! capability, so callbacks always run on their accessor's owning
//! thread.

mod changeset;
mod differencing;
mod notifier;
mod registry;
mod scheduler;

pub use changeset::{ChangeSet, Delivery};
pub use notifier::Notifier;
pub use registry::NotifierRegistry;
pub use scheduler::{ChannelScheduler, FrozenScheduler, Scheduler};
