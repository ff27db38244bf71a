use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::registry::{RoomRegistry, SessionId};
use crate::models::{EditMessage, ServerMessage};
use crate::services::auth_service::UserIdentity;
use crate::store::{DocumentStore, PermissionStore};

/// Lifecycle of one document connection. There is no re-entry to an
/// earlier state; `Closed` is terminal and inbound messages received
/// after it are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authorizing,
    Joined,
    Closed,
}

/// Server-side state machine for one client connected to one document.
///
/// The session owns no document data; it authorizes against the
/// permission store, reads and writes through the document store, and
/// fans edits out through the room registry. Store answers are never
/// cached across messages.
pub struct DocSession {
    id: SessionId,
    document_id: Uuid,
    identity: Option<UserIdentity>,
    state: SessionState,
    registry: Arc<RoomRegistry>,
    documents: Arc<dyn DocumentStore>,
    permissions: Arc<dyn PermissionStore>,
    outbound: mpsc::UnboundedSender<String>,
}

impl DocSession {
    pub fn new(
        id: SessionId,
        document_id: Uuid,
        identity: Option<UserIdentity>,
        registry: Arc<RoomRegistry>,
        documents: Arc<dyn DocumentStore>,
        permissions: Arc<dyn PermissionStore>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            id,
            document_id,
            identity,
            state: SessionState::Connecting,
            registry,
            documents,
            permissions,
            outbound,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the connection through authorization and into the room.
    ///
    /// Returns `false` when the connection must be closed without sending
    /// anything: no authenticated identity, or no view access. On success
    /// the session is registered with the registry and the caller's first
    /// and only `initial` frame carrying the stored content has been
    /// queued.
    pub async fn connect(&mut self) -> bool {
        self.state = SessionState::Authorizing;

        let user_id = match &self.identity {
            Some(identity) => identity.user_id.clone(),
            None => {
                warn!(
                    "Unauthenticated connection attempt to document {}",
                    self.document_id
                );
                self.state = SessionState::Closed;
                return false;
            }
        };

        if !self.authorize_view(&user_id).await {
            warn!(
                "User {} has no view access to document {}",
                user_id, self.document_id
            );
            self.state = SessionState::Closed;
            return false;
        }

        self.registry
            .join(self.document_id, self.id, self.outbound.clone())
            .await;

        // A document that was deleted while a link to it is still around
        // opens as an empty text, matching what the stores report.
        let content = match self.documents.read(self.document_id).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                warn!("Document {} does not exist, serving empty content", self.document_id);
                String::new()
            }
            Err(e) => {
                error!("Failed to load document {}: {}", self.document_id, e);
                String::new()
            }
        };
        self.send_to_self(&ServerMessage::initial(content));

        self.state = SessionState::Joined;
        info!("User {} connected to document {}", user_id, self.document_id);
        true
    }

    /// Handle one inbound text frame.
    ///
    /// Malformed frames are dropped without closing the connection. A
    /// frame from a user without edit rights answers that user alone with
    /// an error; nothing is persisted or broadcast. A valid edit is
    /// written through unconditionally (last writer wins) and then fanned
    /// out to every member of the room, the editor included.
    pub async fn receive(&mut self, raw: &str) {
        if self.state != SessionState::Joined {
            return;
        }

        // A session can only reach Joined with an identity; re-check anyway.
        let user_id = match &self.identity {
            Some(identity) => identity.user_id.clone(),
            None => {
                warn!(
                    "Edit without authentication on document {}",
                    self.document_id
                );
                return;
            }
        };

        let edit = match EditMessage::parse(raw) {
            Ok(edit) => edit,
            Err(e) => {
                debug!(
                    "Dropping malformed message on document {}: {}",
                    self.document_id, e
                );
                return;
            }
        };

        if !self.authorize_edit(&user_id).await {
            warn!(
                "User {} has no edit access to document {}",
                user_id, self.document_id
            );
            self.send_to_self(&ServerMessage::error(
                "You do not have permission to edit this document",
            ));
            return;
        }

        info!(
            "User {} saving document {} ({} bytes)",
            user_id,
            self.document_id,
            edit.content.len()
        );
        match self.documents.write(self.document_id, &edit.content).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Document {} no longer exists, dropping edit",
                    self.document_id
                );
                return;
            }
            Err(e) => {
                error!("Failed to save document {}: {}", self.document_id, e);
                return;
            }
        }

        let payload = ServerMessage::update(edit.content).encode();
        self.registry.broadcast_all(self.document_id, &payload).await;
    }

    /// Transport disconnected: deregister and terminate.
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Joined {
            self.registry.leave(self.document_id, self.id).await;
        }
        self.state = SessionState::Closed;
        let user = self
            .identity
            .as_ref()
            .map(|identity| identity.user_id.as_str())
            .unwrap_or("anonymous");
        info!("User {} disconnected from document {}", user, self.document_id);
    }

    /// View access: document owner, or holder of any grant on it.
    /// A store failure denies access rather than letting the check pass.
    async fn authorize_view(&self, user_id: &str) -> bool {
        match self.permissions.can_view(self.document_id, user_id).await {
            Ok(allowed) => allowed,
            Err(e) => {
                error!(
                    "View check failed for user {} on document {}: {}",
                    user_id, self.document_id, e
                );
                false
            }
        }
    }

    /// Edit access: document owner, or holder of a grant with the edit
    /// flag set. Fails closed like the view check.
    async fn authorize_edit(&self, user_id: &str) -> bool {
        match self.permissions.can_edit(self.document_id, user_id).await {
            Ok(allowed) => allowed,
            Err(e) => {
                error!(
                    "Edit check failed for user {} on document {}: {}",
                    user_id, self.document_id, e
                );
                false
            }
        }
    }

    fn send_to_self(&self, message: &ServerMessage) {
        // The writer task may already be gone during teardown; the stale
        // membership entry is pruned on the next broadcast.
        if self.outbound.send(message.encode()).is_err() {
            debug!(
                "Session {} outbound channel closed, message dropped",
                self.id
            );
        }
    }
}
