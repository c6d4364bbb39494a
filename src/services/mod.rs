pub mod mutation_service;
pub mod sync_controller;

pub use mutation_service::MutationService;
pub use sync_controller::{CollectionErrors, RefreshOutcome, SyncController, SyncStatus};
