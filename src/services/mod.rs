pub mod batch;
pub use batch::{BatchError, BatchService};

pub mod locks;
pub use locks::KeyedLocks;

pub mod reconcile;
pub use reconcile::{MembershipDelta, ReconcileError, Reconciler};

pub mod refresh;
pub use refresh::{RefreshError, RefreshService, Refreshed};

pub mod resolver;
pub use resolver::{TitleResolution, TitleResolver};

pub mod scheduler;
pub use scheduler::{Scheduler, Sweep};

pub mod staleness;
pub use staleness::StalenessPolicy;

#[cfg(test)]
pub mod testing;
