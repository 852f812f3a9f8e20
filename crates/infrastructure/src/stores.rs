//! 协作方接口的内存实现
//!
//! 用于开发接线和测试。真实部署把这些端口接到外部持久化服务上。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use domain::{
    MessageDraft, MessageRepository, MessageStatus, Notification, NotificationRepository,
    PresenceRepository, RepositoryError, RoomId, SocialGraph, UserId,
};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    recipient: UserId,
    status: MessageStatus,
    read: bool,
    draft: MessageDraft,
}

/// 内存消息存储
#[derive(Default)]
pub struct InMemoryMessageStore {
    conversations: RwLock<HashMap<RoomId, Vec<StoredMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn message_count(&self, conversation: &RoomId) -> usize {
        self.conversations
            .read()
            .await
            .get(conversation)
            .map_or(0, Vec::len)
    }

    pub async fn unread_count(&self, conversation: &RoomId, reader: &UserId) -> usize {
        self.conversations
            .read()
            .await
            .get(conversation)
            .map_or(0, |messages| {
                messages
                    .iter()
                    .filter(|m| &m.recipient == reader && !m.read)
                    .count()
            })
    }

    pub async fn content_of(&self, conversation: &RoomId, message_id: &str) -> Option<String> {
        self.conversations
            .read()
            .await
            .get(conversation)?
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.draft.content.clone())
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageStore {
    async fn create(&self, draft: MessageDraft) -> Result<String, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        let conversation = RoomId::direct(&draft.sender, &draft.recipient);

        let mut conversations = self.conversations.write().await;
        conversations
            .entry(conversation)
            .or_default()
            .push(StoredMessage {
                id: id.clone(),
                recipient: draft.recipient.clone(),
                status: MessageStatus::Delivered,
                read: false,
                draft,
            });

        Ok(id)
    }

    async fn mark_conversation_read(
        &self,
        conversation: &RoomId,
        reader: &UserId,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        if let Some(messages) = conversations.get_mut(conversation) {
            for message in messages.iter_mut().filter(|m| &m.recipient == reader) {
                message.read = true;
                message.status = MessageStatus::Read;
            }
        }
        Ok(())
    }

    async fn update_status(
        &self,
        conversation: &RoomId,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        let messages = conversations
            .get_mut(conversation)
            .ok_or_else(|| RepositoryError::NotFound(conversation.to_string()))?;

        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| RepositoryError::NotFound(message_id.to_string()))?;

        message.status = status;
        if status == MessageStatus::Read {
            message.read = true;
        }
        Ok(())
    }

    async fn delete(
        &self,
        conversation: &RoomId,
        message_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        let messages = conversations
            .get_mut(conversation)
            .ok_or_else(|| RepositoryError::NotFound(conversation.to_string()))?;

        let before = messages.len();
        messages.retain(|m| m.id != message_id);
        if messages.len() == before {
            return Err(RepositoryError::NotFound(message_id.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredNotification {
    notification: Notification,
    read: bool,
}

/// 内存通知存储
#[derive(Default)]
pub struct InMemoryNotificationStore {
    notifications: RwLock<HashMap<UserId, Vec<StoredNotification>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, user: &UserId, notification: Notification) {
        self.notifications
            .write()
            .await
            .entry(user.clone())
            .or_default()
            .push(StoredNotification {
                notification,
                read: false,
            });
    }

    pub async fn unread_count(&self, user: &UserId) -> usize {
        self.notifications
            .read()
            .await
            .get(user)
            .map_or(0, |items| items.iter().filter(|n| !n.read).count())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationStore {
    async fn mark_as_read(
        &self,
        user: &UserId,
        notification_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut notifications = self.notifications.write().await;
        let items = notifications
            .get_mut(user)
            .ok_or_else(|| RepositoryError::NotFound(user.to_string()))?;

        let item = items
            .iter_mut()
            .find(|n| n.notification.id == notification_id)
            .ok_or_else(|| RepositoryError::NotFound(notification_id.to_string()))?;

        item.read = true;
        Ok(())
    }

    async fn clear_all(&self, user: &UserId) -> Result<(), RepositoryError> {
        self.notifications.write().await.remove(user);
        Ok(())
    }
}

/// 内存社交关系
#[derive(Default)]
pub struct InMemorySocialGraph {
    links: RwLock<HashMap<UserId, HashSet<UserId>>>,
}

impl InMemorySocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建立双向好友关系
    pub async fn link(&self, a: &UserId, b: &UserId) {
        let mut links = self.links.write().await;
        links.entry(a.clone()).or_default().insert(b.clone());
        links.entry(b.clone()).or_default().insert(a.clone());
    }
}

#[async_trait]
impl SocialGraph for InMemorySocialGraph {
    async fn connections_of(&self, user: &UserId) -> Result<Vec<UserId>, RepositoryError> {
        let links = self.links.read().await;
        let mut friends: Vec<UserId> = links
            .get(user)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        friends.sort();
        Ok(friends)
    }
}

/// 内存在线状态存储
#[derive(Default)]
pub struct InMemoryPresenceStore {
    last_seen: RwLock<HashMap<UserId, DateTime<Utc>>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_seen_of(&self, user: &UserId) -> Option<DateTime<Utc>> {
        self.last_seen.read().await.get(user).copied()
    }
}

#[async_trait]
impl PresenceRepository for InMemoryPresenceStore {
    async fn save_last_seen(
        &self,
        user: &UserId,
        last_seen: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.last_seen.write().await.insert(user.clone(), last_seen);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(sender: &str, recipient: &str, content: &str) -> MessageDraft {
        MessageDraft {
            sender: UserId::from(sender),
            recipient: UserId::from(recipient),
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn message_lifecycle() {
        let store = InMemoryMessageStore::new();
        let conversation = RoomId::from("u1_u2");

        let id = store.create(draft("u1", "u2", "oi")).await.unwrap();
        assert_eq!(store.message_count(&conversation).await, 1);
        assert_eq!(store.unread_count(&conversation, &UserId::from("u2")).await, 1);

        assert_eq!(
            store.content_of(&conversation, &id).await.as_deref(),
            Some("oi")
        );

        store
            .update_status(&conversation, &id, MessageStatus::Read)
            .await
            .unwrap();
        assert_eq!(store.unread_count(&conversation, &UserId::from("u2")).await, 0);

        store.delete(&conversation, &id).await.unwrap();
        assert_eq!(store.message_count(&conversation).await, 0);

        let missing = store.delete(&conversation, &id).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn mark_conversation_read_targets_the_reader() {
        let store = InMemoryMessageStore::new();
        let conversation = RoomId::from("u1_u2");

        store.create(draft("u1", "u2", "a")).await.unwrap();
        store.create(draft("u2", "u1", "b")).await.unwrap();

        store
            .mark_conversation_read(&conversation, &UserId::from("u2"))
            .await
            .unwrap();

        assert_eq!(store.unread_count(&conversation, &UserId::from("u2")).await, 0);
        assert_eq!(store.unread_count(&conversation, &UserId::from("u1")).await, 1);
    }

    #[tokio::test]
    async fn notification_read_and_clear() {
        let store = InMemoryNotificationStore::new();
        let user = UserId::from("u1");

        store
            .push(&user, Notification::new("n1", "Nova contribuição", "corpo"))
            .await;
        store
            .push(&user, Notification::new("n2", "Empréstimo aprovado", "corpo"))
            .await;
        assert_eq!(store.unread_count(&user).await, 2);

        store.mark_as_read(&user, "n1").await.unwrap();
        assert_eq!(store.unread_count(&user).await, 1);

        let missing = store.mark_as_read(&user, "nope").await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));

        store.clear_all(&user).await.unwrap();
        assert_eq!(store.unread_count(&user).await, 0);
    }

    #[tokio::test]
    async fn social_graph_links_are_mutual() {
        let graph = InMemorySocialGraph::new();
        let a = UserId::from("a");
        let b = UserId::from("b");

        graph.link(&a, &b).await;

        assert_eq!(graph.connections_of(&a).await.unwrap(), vec![b.clone()]);
        assert_eq!(graph.connections_of(&b).await.unwrap(), vec![a]);
    }
}
