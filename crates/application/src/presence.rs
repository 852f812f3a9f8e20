//! 在线状态跟踪
//!
//! 每用户一条 PresenceRecord，状态变更按字段合并、后写覆盖，
//! 容忍挂起点处的交错。广播作用域由社交关系协作方给出；
//! `invisible` 状态抑制一切对外广播。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;

use domain::events;
use domain::{
    DeviceInfo, Frame, PresenceRecord, PresenceRepository, PresenceStatus, SocialGraph, UserId,
};

use crate::fanout::PresenceFanout;
use crate::tasks::TaskQueue;

pub struct PresenceTracker {
    records: RwLock<HashMap<UserId, PresenceRecord>>,
    fanout: Arc<dyn PresenceFanout>,
    social_graph: Arc<dyn SocialGraph>,
    presence_repository: Arc<dyn PresenceRepository>,
    tasks: Arc<TaskQueue>,
}

impl PresenceTracker {
    pub fn new(
        fanout: Arc<dyn PresenceFanout>,
        social_graph: Arc<dyn SocialGraph>,
        presence_repository: Arc<dyn PresenceRepository>,
        tasks: Arc<TaskQueue>,
    ) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            fanout,
            social_graph,
            presence_repository,
            tasks,
        }
    }

    /// 连接建立后登记在线状态
    ///
    /// 用户的第一条连接触发 `user_online` 广播；后续设备连接只刷新记录。
    pub async fn handle_connect(&self, user: &UserId, device: &DeviceInfo) {
        let was_online = {
            let mut records = self.records.write().await;
            let now = Utc::now();

            match records.get_mut(user) {
                Some(record) => {
                    let was_online = record.online;
                    record.online = true;
                    record.status = PresenceStatus::Online;
                    record.last_activity = now;
                    record.device = Some(device.clone());
                    record.last_updated = now;
                    was_online
                }
                None => {
                    records.insert(user.clone(), PresenceRecord::connected(Some(device.clone())));
                    false
                }
            }
        };

        if !was_online {
            tracing::info!(user_id = %user, "用户上线");
            self.broadcast_to_graph(
                user,
                Frame::new(
                    events::presence::USER_ONLINE,
                    json!({
                        "user_id": user,
                        "status": PresenceStatus::Online.as_str(),
                        "timestamp": Utc::now(),
                    }),
                ),
            )
            .await;
        }
    }

    /// 客户端提交的状态变更
    ///
    /// 未知取值映射为 online；`invisible` 只更新记录，不发任何广播。
    pub async fn set_status(&self, user: &UserId, raw_status: &str) {
        let status = PresenceStatus::from_client(raw_status);

        {
            let mut records = self.records.write().await;
            let now = Utc::now();
            let record = records
                .entry(user.clone())
                .or_insert_with(|| PresenceRecord::connected(None));
            record.status = status;
            record.last_activity = now;
            record.last_updated = now;
        }

        if status == PresenceStatus::Invisible {
            tracing::debug!(user_id = %user, "状态切换为隐身，跳过广播");
            return;
        }

        self.broadcast_to_graph(
            user,
            Frame::new(
                events::presence::USER_STATUS_CHANGE,
                json!({
                    "user_id": user,
                    "status": status.as_str(),
                    "timestamp": Utc::now(),
                }),
            ),
        )
        .await;
    }

    /// 最后一条连接关闭后的离线迁移
    ///
    /// 打点 last-seen，广播一次 `user_offline`，落盘交给尽力而为队列，
    /// 断连路径自身永远成功返回。
    pub async fn handle_disconnect(&self, user: &UserId) {
        let now = Utc::now();

        let was_online = {
            let mut records = self.records.write().await;
            match records.get_mut(user) {
                Some(record) => {
                    let was_online = record.online;
                    record.online = false;
                    record.status = PresenceStatus::Offline;
                    record.last_seen = Some(now);
                    record.last_updated = now;
                    was_online
                }
                None => false,
            }
        };

        if !was_online {
            return;
        }

        tracing::info!(user_id = %user, "用户离线");
        self.broadcast_to_graph(
            user,
            Frame::new(
                events::presence::USER_OFFLINE,
                json!({
                    "user_id": user,
                    "last_seen": now,
                    "timestamp": now,
                }),
            ),
        )
        .await;

        let repository = self.presence_repository.clone();
        let user = user.clone();
        self.tasks.enqueue("persist-last-seen", async move {
            repository.save_last_seen(&user, now).await?;
            Ok(())
        });
    }

    /// 存活心跳：只刷新 last_activity，不产生任何网络流量
    pub async fn touch(&self, user: &UserId) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(user) {
            record.last_activity = Utc::now();
        }
    }

    /// 在线用户查询
    ///
    /// 候选集合来自调用方或社交关系回退；只返回注册表在线、状态
    /// 非隐身且存在于记录表中的用户，记录表缺失视为离线。
    pub async fn online_users(
        &self,
        requester: &UserId,
        candidates: Option<Vec<UserId>>,
    ) -> Vec<UserId> {
        let candidates = match candidates {
            Some(ids) => ids,
            None => match self.social_graph.connections_of(requester).await {
                Ok(ids) => ids,
                Err(err) => {
                    tracing::warn!(user_id = %requester, error = %err, "failed to load social graph");
                    return Vec::new();
                }
            },
        };

        let visible: Vec<UserId> = {
            let records = self.records.read().await;
            candidates
                .into_iter()
                .filter(|id| {
                    records
                        .get(id)
                        .map(|r| r.status != PresenceStatus::Invisible)
                        .unwrap_or(false)
                })
                .collect()
        };

        let mut online = Vec::with_capacity(visible.len());
        for id in visible {
            if self.fanout.is_online(&id).await {
                online.push(id);
            }
        }
        online
    }

    pub async fn record(&self, user: &UserId) -> Option<PresenceRecord> {
        self.records.read().await.get(user).cloned()
    }

    async fn broadcast_to_graph(&self, user: &UserId, frame: Frame) {
        let friends = match self.social_graph.connections_of(user).await {
            Ok(friends) => friends,
            Err(err) => {
                tracing::warn!(user_id = %user, error = %err, "failed to load social graph for broadcast");
                return;
            }
        };

        for friend in friends {
            self.fanout.emit_to_user(&friend, frame.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::RepositoryError;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingFanout {
        emitted: Mutex<Vec<(UserId, Frame)>>,
        online: Mutex<Vec<UserId>>,
    }

    impl RecordingFanout {
        fn new(online: Vec<UserId>) -> Self {
            Self {
                emitted: Mutex::new(Vec::new()),
                online: Mutex::new(online),
            }
        }

        fn emitted(&self) -> Vec<(UserId, Frame)> {
            self.emitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PresenceFanout for RecordingFanout {
        async fn emit_to_user(&self, user: &UserId, frame: Frame) -> bool {
            self.emitted.lock().unwrap().push((user.clone(), frame));
            true
        }

        async fn is_online(&self, user: &UserId) -> bool {
            self.online.lock().unwrap().contains(user)
        }
    }

    struct FixedGraph(Vec<UserId>);

    #[async_trait]
    impl SocialGraph for FixedGraph {
        async fn connections_of(&self, _user: &UserId) -> Result<Vec<UserId>, RepositoryError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingPresenceStore {
        saved: Mutex<Vec<UserId>>,
    }

    #[async_trait]
    impl PresenceRepository for RecordingPresenceStore {
        async fn save_last_seen(
            &self,
            user: &UserId,
            _last_seen: chrono::DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            self.saved.lock().unwrap().push(user.clone());
            Ok(())
        }
    }

    fn tracker_with(
        online: Vec<UserId>,
        friends: Vec<UserId>,
    ) -> (
        PresenceTracker,
        Arc<RecordingFanout>,
        Arc<RecordingPresenceStore>,
        Arc<TaskQueue>,
    ) {
        let fanout = Arc::new(RecordingFanout::new(online));
        let store = Arc::new(RecordingPresenceStore::default());
        let tasks = Arc::new(TaskQueue::new(16));
        let tracker = PresenceTracker::new(
            fanout.clone(),
            Arc::new(FixedGraph(friends)),
            store.clone(),
            tasks.clone(),
        );
        (tracker, fanout, store, tasks)
    }

    #[tokio::test]
    async fn first_connection_broadcasts_online_once() {
        let friend = UserId::from("friend");
        let user = UserId::from("u1");
        let (tracker, fanout, _, _) = tracker_with(vec![], vec![friend.clone()]);
        let device = DeviceInfo::from_request(None, None);

        tracker.handle_connect(&user, &device).await;
        // 第二台设备连接，不再广播
        tracker.handle_connect(&user, &device).await;

        let emitted = fanout.emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, friend);
        assert_eq!(emitted[0].1.event, events::presence::USER_ONLINE);
    }

    #[tokio::test]
    async fn invisible_updates_record_without_broadcast() {
        let user = UserId::from("u1");
        let (tracker, fanout, _, _) = tracker_with(
            vec![user.clone()],
            vec![UserId::from("friend")],
        );
        let device = DeviceInfo::from_request(None, None);

        tracker.handle_connect(&user, &device).await;
        let before = fanout.emitted().len();

        tracker.set_status(&user, "invisible").await;

        assert_eq!(fanout.emitted().len(), before, "隐身不应产生广播");
        let record = tracker.record(&user).await.unwrap();
        assert_eq!(record.status, PresenceStatus::Invisible);
        assert!(record.online);

        // 隐身用户不出现在在线列表里，即使注册表仍然在线
        let online = tracker
            .online_users(&UserId::from("friend"), Some(vec![user.clone()]))
            .await;
        assert!(online.is_empty());
    }

    #[tokio::test]
    async fn unknown_status_defaults_to_online() {
        let user = UserId::from("u1");
        let (tracker, fanout, _, _) = tracker_with(vec![], vec![UserId::from("friend")]);

        tracker.set_status(&user, "definitely-not-a-status").await;

        let record = tracker.record(&user).await.unwrap();
        assert_eq!(record.status, PresenceStatus::Online);
        let emitted = fanout.emitted();
        assert_eq!(emitted.last().unwrap().1.event, events::presence::USER_STATUS_CHANGE);
        assert_eq!(emitted.last().unwrap().1.data["status"], "online");
    }

    #[tokio::test]
    async fn disconnect_broadcasts_offline_once_and_persists_last_seen() {
        let user = UserId::from("u1");
        let friend = UserId::from("friend");
        let (tracker, fanout, store, tasks) = tracker_with(vec![], vec![friend.clone()]);
        let device = DeviceInfo::from_request(None, None);

        tracker.handle_connect(&user, &device).await;
        tracker.handle_disconnect(&user).await;
        // 重复断连不会再次广播
        tracker.handle_disconnect(&user).await;

        let offline: Vec<_> = fanout
            .emitted()
            .into_iter()
            .filter(|(_, f)| f.event == events::presence::USER_OFFLINE)
            .collect();
        assert_eq!(offline.len(), 1);

        let record = tracker.record(&user).await.unwrap();
        assert!(!record.online);
        assert_eq!(record.status, PresenceStatus::Offline);
        assert!(record.last_seen.is_some());

        tasks.drain(Duration::from_secs(1)).await;
        assert_eq!(store.saved.lock().unwrap().as_slice(), &[user]);
    }

    #[tokio::test]
    async fn online_users_requires_presence_record() {
        let known = UserId::from("known");
        let unknown = UserId::from("unknown");
        let (tracker, _, _, _) = tracker_with(vec![known.clone(), unknown.clone()], vec![]);
        let device = DeviceInfo::from_request(None, None);

        tracker.handle_connect(&known, &device).await;

        // unknown 在注册表在线，但没有在线状态记录，按离线处理
        let online = tracker
            .online_users(
                &UserId::from("requester"),
                Some(vec![known.clone(), unknown]),
            )
            .await;
        assert_eq!(online, vec![known]);
    }

    #[tokio::test]
    async fn online_users_falls_back_to_social_graph() {
        let friend = UserId::from("friend");
        let (tracker, _, _, _) = tracker_with(vec![friend.clone()], vec![friend.clone()]);
        let device = DeviceInfo::from_request(None, None);

        tracker.handle_connect(&friend, &device).await;

        let online = tracker.online_users(&UserId::from("u1"), None).await;
        assert_eq!(online, vec![friend]);
    }
}
