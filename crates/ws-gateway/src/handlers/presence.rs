//! 在线状态处理器

use chrono::Utc;
use serde_json::{json, Value};

use domain::events;
use domain::{Frame, UserId};

use super::{reply, ConnectionContext};
use crate::protocol::{OnlineUsersPayload, StatusChangePayload};
use crate::state::AppState;

/// 客户端状态变更；解析失败按防御性默认值处理（online）
pub async fn handle_status_change(state: &AppState, ctx: &ConnectionContext, data: Value) {
    let payload = serde_json::from_value::<StatusChangePayload>(data).unwrap_or_default();
    state.presence.set_status(&ctx.user_id, &payload.status).await;
}

/// 在线用户查询
pub async fn handle_get_online_users(state: &AppState, ctx: &ConnectionContext, data: Value) {
    let payload = serde_json::from_value::<OnlineUsersPayload>(data).unwrap_or_default();
    let candidates = payload
        .user_ids
        .map(|ids| ids.into_iter().map(UserId::from).collect());

    let users = state.presence.online_users(&ctx.user_id, candidates).await;
    reply(
        state,
        ctx,
        Frame::new(
            events::presence::ONLINE_USERS_LIST,
            json!({"users": users, "timestamp": Utc::now()}),
        ),
    )
    .await;
}
