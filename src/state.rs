use std::sync::Arc;

use crate::services::{MutationService, SyncController};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SyncController>,
    pub mutations: Arc<MutationService>,
}
