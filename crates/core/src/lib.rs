pub mod reconcile;
pub mod stability;
pub mod store;
pub mod watch;

pub use reconcile::{ReconcileReport, reconcile};
pub use stability::StabilityProbe;
pub use store::{BucketListing, ObjectStore, RemoteObject};
pub use watch::BackupWatcher;
