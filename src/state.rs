use std::sync::Arc;

use crate::config::Config;
use crate::store::{DocumentStore, PermissionStore};
use crate::ws::registry::RoomRegistry;

/// Shared application state handed to every route.
///
/// The room registry is a constructed service owned here for the lifetime
/// of the process; the stores are trait objects so the collaboration path
/// stays decoupled from the database layer.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<RoomRegistry>,
    pub documents: Arc<dyn DocumentStore>,
    pub permissions: Arc<dyn PermissionStore>,
}
