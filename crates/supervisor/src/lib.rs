pub mod client;
pub mod model;

pub use client::{SupervisorClient, SupervisorError};
pub use model::{BackupDetail, BackupSummary};
