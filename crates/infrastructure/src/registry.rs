//! 进程内连接注册表
//!
//! 用户 ↔ 活跃连接的双向索引加房间成员关系，单进程内存实现，
//! 进程重启后从零重建。全部状态放在同一把读写锁后面：
//! 复合修改（移除连接并判断是否完全离线）在一次加锁内完成，
//! 不会与同一用户的并发注册交错。发送走无界通道，永不阻塞。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

use application::PresenceFanout;
use domain::{ConnectionId, ConnectionInfo, Frame, RoomId, UserId};

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionInfo>,
    senders: HashMap<ConnectionId, mpsc::UnboundedSender<Frame>>,
    user_connections: HashMap<UserId, HashSet<ConnectionId>>,
    /// 用户 → 已加入房间，纯记账；真正的房间扇出走 room_connections
    user_rooms: HashMap<UserId, HashSet<RoomId>>,
    room_connections: HashMap<RoomId, HashSet<ConnectionId>>,
}

/// 连接移除的结果
#[derive(Debug, Clone)]
pub struct RemovalOutcome {
    pub user_id: UserId,
    /// 这是该用户最后一条连接
    pub went_offline: bool,
}

/// 注册表聚合快照
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub connections: usize,
    pub online_users: usize,
    pub rooms: usize,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接；同一连接ID重复注册是幂等的
    pub async fn register(&self, info: ConnectionInfo, sender: mpsc::UnboundedSender<Frame>) {
        let connection_id = info.connection_id;
        let user_id = info.user_id.clone();

        let mut inner = self.inner.write().await;
        inner.senders.insert(connection_id, sender);
        inner.connections.insert(connection_id, info);
        inner
            .user_connections
            .entry(user_id.clone())
            .or_default()
            .insert(connection_id);

        tracing::info!(
            connection_id = %connection_id,
            user_id = %user_id,
            "connection registered"
        );
    }

    /// 移除连接
    ///
    /// 未知连接ID静默返回 None。移除与离线判定在同一临界区内完成，
    /// `went_offline` 对每个用户的每次离线恰好为真一次。
    pub async fn remove(&self, connection_id: ConnectionId) -> Option<RemovalOutcome> {
        let mut inner = self.inner.write().await;

        let info = inner.connections.remove(&connection_id)?;
        inner.senders.remove(&connection_id);

        let user_id = info.user_id;
        let went_offline = inner
            .user_connections
            .get_mut(&user_id)
            .map(|set| {
                set.remove(&connection_id);
                set.is_empty()
            })
            .unwrap_or(false);
        if went_offline {
            inner.user_connections.remove(&user_id);
            inner.user_rooms.remove(&user_id);
        }

        inner
            .room_connections
            .retain(|_, members| {
                members.remove(&connection_id);
                !members.is_empty()
            });

        tracing::info!(
            connection_id = %connection_id,
            user_id = %user_id,
            went_offline,
            "connection removed"
        );

        Some(RemovalOutcome {
            user_id,
            went_offline,
        })
    }

    pub async fn is_user_online(&self, user: &UserId) -> bool {
        let inner = self.inner.read().await;
        inner
            .user_connections
            .get(user)
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }

    pub async fn connection_count(&self, user: &UserId) -> usize {
        let inner = self.inner.read().await;
        inner.user_connections.get(user).map_or(0, HashSet::len)
    }

    /// 用户的活跃连接元数据
    ///
    /// 过滤掉发送端已经关闭的连接，防御断连与移除之间的竞态。
    pub async fn get_connections(&self, user: &UserId) -> Vec<ConnectionInfo> {
        let inner = self.inner.read().await;
        let Some(ids) = inner.user_connections.get(user) else {
            return Vec::new();
        };

        ids.iter()
            .filter(|id| {
                inner
                    .senders
                    .get(id)
                    .map(|s| !s.is_closed())
                    .unwrap_or(false)
            })
            .filter_map(|id| inner.connections.get(id).cloned())
            .collect()
    }

    pub async fn online_user_ids(&self) -> Vec<UserId> {
        let inner = self.inner.read().await;
        inner.user_connections.keys().cloned().collect()
    }

    /// 连接加入房间
    pub async fn join_room(&self, connection_id: ConnectionId, room: &RoomId) {
        let mut inner = self.inner.write().await;
        let Some(owner) = inner
            .connections
            .get(&connection_id)
            .map(|c| c.user_id.clone())
        else {
            tracing::warn!(connection_id = %connection_id, "join_room on unknown connection");
            return;
        };

        inner
            .room_connections
            .entry(room.clone())
            .or_default()
            .insert(connection_id);
        inner
            .user_rooms
            .entry(owner)
            .or_default()
            .insert(room.clone());
    }

    /// 连接离开房间；清空的集合整个删除
    pub async fn leave_room(&self, connection_id: ConnectionId, room: &RoomId) {
        let mut inner = self.inner.write().await;

        if let Some(members) = inner.room_connections.get_mut(room) {
            members.remove(&connection_id);
            if members.is_empty() {
                inner.room_connections.remove(room);
            }
        }

        let owner = inner
            .connections
            .get(&connection_id)
            .map(|c| c.user_id.clone());
        if let Some(owner) = owner {
            if let Some(rooms) = inner.user_rooms.get_mut(&owner) {
                rooms.remove(room);
                if rooms.is_empty() {
                    inner.user_rooms.remove(&owner);
                }
            }
        }
    }

    pub async fn rooms_of(&self, user: &UserId) -> Vec<RoomId> {
        let inner = self.inner.read().await;
        inner
            .user_rooms
            .get(user)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 发给单条连接
    pub async fn emit_to_connection(&self, connection_id: ConnectionId, frame: Frame) -> bool {
        let inner = self.inner.read().await;
        inner
            .senders
            .get(&connection_id)
            .map(|s| s.send(frame).is_ok())
            .unwrap_or(false)
    }

    /// 发给用户的全部活跃连接；没有任何连接收到时返回 false
    pub async fn emit_to_user(&self, user: &UserId, frame: Frame) -> bool {
        let inner = self.inner.read().await;
        let Some(ids) = inner.user_connections.get(user) else {
            return false;
        };

        let mut delivered = false;
        for id in ids {
            if let Some(sender) = inner.senders.get(id) {
                if sender.send(frame.clone()).is_ok() {
                    delivered = true;
                }
            }
        }
        delivered
    }

    /// 发给用户除指定连接外的其他设备
    pub async fn emit_to_user_except(
        &self,
        user: &UserId,
        except: ConnectionId,
        frame: Frame,
    ) -> bool {
        let inner = self.inner.read().await;
        let Some(ids) = inner.user_connections.get(user) else {
            return false;
        };

        let mut delivered = false;
        for id in ids.iter().filter(|id| **id != except) {
            if let Some(sender) = inner.senders.get(id) {
                if sender.send(frame.clone()).is_ok() {
                    delivered = true;
                }
            }
        }
        delivered
    }

    /// 房间扇出
    pub async fn emit_to_room(&self, room: &RoomId, frame: Frame) {
        let inner = self.inner.read().await;
        let Some(members) = inner.room_connections.get(room) else {
            return;
        };

        for id in members {
            if let Some(sender) = inner.senders.get(id) {
                let _ = sender.send(frame.clone());
            }
        }
    }

    /// 房间扇出，跳过一条连接（通常是发起者自己）
    pub async fn emit_to_room_except(&self, room: &RoomId, except: ConnectionId, frame: Frame) {
        let inner = self.inner.read().await;
        let Some(members) = inner.room_connections.get(room) else {
            return;
        };

        for id in members.iter().filter(|id| **id != except) {
            if let Some(sender) = inner.senders.get(id) {
                let _ = sender.send(frame.clone());
            }
        }
    }

    /// 全量广播（维护通知）
    pub async fn broadcast_all(&self, frame: Frame) {
        let inner = self.inner.read().await;
        for sender in inner.senders.values() {
            let _ = sender.send(frame.clone());
        }
    }

    /// 除发送者外的全量广播，O(总连接数)
    pub async fn broadcast_except(&self, sender_user: &UserId, frame: Frame) {
        let inner = self.inner.read().await;
        for (id, sender) in &inner.senders {
            let owned_by_sender = inner
                .connections
                .get(id)
                .map(|c| &c.user_id == sender_user)
                .unwrap_or(false);
            if !owned_by_sender {
                let _ = sender.send(frame.clone());
            }
        }
    }

    pub async fn stats(&self) -> RegistrySnapshot {
        let inner = self.inner.read().await;
        RegistrySnapshot {
            connections: inner.connections.len(),
            online_users: inner.user_connections.len(),
            rooms: inner.room_connections.len(),
        }
    }

    /// 进程停机时清空全部索引
    pub async fn shutdown(&self) {
        let mut inner = self.inner.write().await;
        inner.connections.clear();
        inner.senders.clear();
        inner.user_connections.clear();
        inner.user_rooms.clear();
        inner.room_connections.clear();
        tracing::info!("connection registry cleared");
    }
}

#[async_trait]
impl PresenceFanout for ConnectionRegistry {
    async fn emit_to_user(&self, user: &UserId, frame: Frame) -> bool {
        ConnectionRegistry::emit_to_user(self, user, frame).await
    }

    async fn is_online(&self, user: &UserId) -> bool {
        self.is_user_online(user).await
    }
}
