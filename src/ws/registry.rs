use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// Outbound handle of one connected session. Payloads are pre-serialized
/// frames; the per-connection writer task drains them into the socket.
pub type MemberSender = mpsc::UnboundedSender<String>;

/// Maps a document id to the set of sessions currently connected to it.
///
/// One registry instance is created at startup and handed to whatever
/// accepts connections; rooms are ephemeral and rebuilt from zero on
/// restart. The room map is the only shared mutable state in the
/// collaboration path, so membership is read and cloned under the lock
/// and delivery happens after it is released.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<Uuid, HashMap<SessionId, MemberSender>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a session to a document's room, creating the room if this is
    /// the first connection. Joining twice with the same session id keeps
    /// a single membership entry.
    pub async fn join(&self, document_id: Uuid, session_id: SessionId, sender: MemberSender) {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(document_id).or_default();
        room.insert(session_id, sender);
        info!(
            "Session {} joined room {} ({} member(s))",
            session_id,
            document_id,
            room.len()
        );
    }

    /// Remove a session from a document's room. The room entry itself is
    /// dropped when the last member leaves so the map stays bounded by the
    /// number of live connections.
    pub async fn leave(&self, document_id: Uuid, session_id: SessionId) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&document_id) {
            room.remove(&session_id);
            if room.is_empty() {
                rooms.remove(&document_id);
                debug!("Room {} is empty, reclaimed", document_id);
            }
        }
        info!("Session {} left room {}", session_id, document_id);
    }

    /// Deliver a payload to every current member of a room, including the
    /// session the payload originated from.
    pub async fn broadcast_all(&self, document_id: Uuid, payload: &str) {
        self.deliver(document_id, None, payload).await;
    }

    /// Deliver a payload to every current member of a room except one.
    pub async fn broadcast_except(
        &self,
        document_id: Uuid,
        sender_id: SessionId,
        payload: &str,
    ) {
        self.deliver(document_id, Some(sender_id), payload).await;
    }

    async fn deliver(&self, document_id: Uuid, skip: Option<SessionId>, payload: &str) {
        // Snapshot the membership, then deliver without holding the lock.
        // Members that join mid-broadcast are simply not in the snapshot.
        let members: Vec<(SessionId, MemberSender)> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&document_id) {
                Some(room) => room
                    .iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect(),
                None => return,
            }
        };

        let mut departed: Vec<SessionId> = Vec::new();
        for (session_id, sender) in &members {
            if skip == Some(*session_id) {
                continue;
            }
            // A closed channel means the member's connection is gone; keep
            // delivering to the rest and prune the member afterwards.
            if sender.send(payload.to_string()).is_err() {
                warn!(
                    "Session {} in room {} has a closed channel, dropping it",
                    session_id, document_id
                );
                departed.push(*session_id);
            }
        }

        for session_id in departed {
            self.leave(document_id, session_id).await;
        }
    }

    /// Number of active rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Number of sessions across all rooms.
    pub async fn connection_count(&self) -> usize {
        self.rooms.read().await.values().map(|room| room.len()).sum()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> (SessionId, MemberSender, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Uuid::new_v4(), tx, rx)
    }

    #[tokio::test]
    async fn join_is_idempotent_per_session() {
        let registry = RoomRegistry::new();
        let doc = Uuid::new_v4();
        let (id, tx, _rx) = member();

        registry.join(doc, id, tx.clone()).await;
        registry.join(doc, id, tx).await;

        assert_eq!(registry.connection_count().await, 1);
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn empty_room_is_reclaimed() {
        let registry = RoomRegistry::new();
        let doc = Uuid::new_v4();
        let (id, tx, _rx) = member();

        registry.join(doc, id, tx).await;
        registry.leave(doc, id).await;

        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_all_reaches_every_member_including_sender() {
        let registry = RoomRegistry::new();
        let doc = Uuid::new_v4();
        let (id_a, tx_a, mut rx_a) = member();
        let (id_b, tx_b, mut rx_b) = member();
        registry.join(doc, id_a, tx_a).await;
        registry.join(doc, id_b, tx_b).await;

        registry.broadcast_all(doc, "payload").await;

        assert_eq!(rx_a.recv().await.unwrap(), "payload");
        assert_eq!(rx_b.recv().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn broadcast_except_skips_the_sender() {
        let registry = RoomRegistry::new();
        let doc = Uuid::new_v4();
        let (id_a, tx_a, mut rx_a) = member();
        let (id_b, tx_b, mut rx_b) = member();
        registry.join(doc, id_a, tx_a).await;
        registry.join(doc, id_b, tx_b).await;

        registry.broadcast_except(doc, id_a, "payload").await;

        assert_eq!(rx_b.recv().await.unwrap(), "payload");
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_member_is_pruned_and_siblings_still_receive() {
        let registry = RoomRegistry::new();
        let doc = Uuid::new_v4();
        let (id_dead, tx_dead, rx_dead) = member();
        let (id_live, tx_live, mut rx_live) = member();
        registry.join(doc, id_dead, tx_dead).await;
        registry.join(doc, id_live, tx_live).await;

        drop(rx_dead);
        registry.broadcast_all(doc, "payload").await;

        assert_eq!(rx_live.recv().await.unwrap(), "payload");
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn broadcast_to_unknown_room_is_a_no_op() {
        let registry = RoomRegistry::new();
        registry.broadcast_all(Uuid::new_v4(), "payload").await;
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn rooms_are_independent() {
        let registry = RoomRegistry::new();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        let (id_a, tx_a, mut rx_a) = member();
        let (id_b, tx_b, mut rx_b) = member();
        registry.join(doc_a, id_a, tx_a).await;
        registry.join(doc_b, id_b, tx_b).await;

        registry.broadcast_all(doc_a, "only-a").await;

        assert_eq!(rx_a.recv().await.unwrap(), "only-a");
        assert!(rx_b.try_recv().is_err());
    }
}
