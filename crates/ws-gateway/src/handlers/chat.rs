//! 聊天消息处理器
//!
//! 进出房间、消息发送 / 状态更新 / 删除、输入状态。持久化交给
//! 消息协作方，扇出走连接注册表。

use chrono::Utc;
use serde_json::{json, Value};

use domain::events;
use domain::{ChatMessage, Frame, MessageDraft, RoomId, UserId};

use super::{reply, server_error, validation_error, ConnectionContext};
use crate::protocol::{
    ConversationPayload, DeleteMessagePayload, SendMessagePayload, StatusUpdatePayload,
    TypingPayload,
};
use crate::state::AppState;

/// 加入会话房间
pub async fn handle_join(state: &AppState, ctx: &ConnectionContext, data: Value) {
    let payload: ConversationPayload = match serde_json::from_value(data) {
        Ok(payload) => payload,
        Err(err) => {
            reply(
                state,
                ctx,
                Frame::new(
                    events::room::JOIN_ERROR,
                    json!({"error": format!("invalid join payload: {err}"), "timestamp": Utc::now()}),
                ),
            )
            .await;
            return;
        }
    };

    if payload.conversation_id.is_empty() {
        reply(
            state,
            ctx,
            Frame::new(
                events::room::JOIN_ERROR,
                json!({"error": "conversation id required", "timestamp": Utc::now()}),
            ),
        )
        .await;
        return;
    }

    let room = RoomId::from(payload.conversation_id);
    state.registry.join_room(ctx.connection_id, &room).await;

    // 进房即已读，尽力而为：失败只记日志，不影响加入
    if let Err(err) = state
        .messages
        .mark_conversation_read(&room, &ctx.user_id)
        .await
    {
        tracing::warn!(
            conversation_id = %room,
            user_id = %ctx.user_id,
            error = %err,
            "failed to mark conversation read on join"
        );
    }

    reply(
        state,
        ctx,
        Frame::new(
            events::room::JOIN_SUCCESS,
            json!({"conversation_id": room, "timestamp": Utc::now()}),
        ),
    )
    .await;

    state
        .registry
        .emit_to_room_except(
            &room,
            ctx.connection_id,
            Frame::new(
                events::room::USER_JOINED,
                json!({"conversation_id": room, "user_id": ctx.user_id, "timestamp": Utc::now()}),
            ),
        )
        .await;

    tracing::info!(conversation_id = %room, user_id = %ctx.user_id, "用户加入会话");
}

/// 离开会话房间；空ID是无操作
pub async fn handle_leave(state: &AppState, ctx: &ConnectionContext, data: Value) {
    let Ok(payload) = serde_json::from_value::<ConversationPayload>(data) else {
        return;
    };
    if payload.conversation_id.is_empty() {
        return;
    }

    let room = RoomId::from(payload.conversation_id);
    state.registry.leave_room(ctx.connection_id, &room).await;
    state
        .registry
        .emit_to_room(
            &room,
            Frame::new(
                events::room::USER_LEFT,
                json!({"conversation_id": room, "user_id": ctx.user_id, "timestamp": Utc::now()}),
            ),
        )
        .await;

    tracing::info!(conversation_id = %room, user_id = %ctx.user_id, "用户离开会话");
}

/// 发送消息
///
/// 校验失败和持久化失败都以 `message_send_failed` 回给请求方，
/// 带上客户端临时ID供对账；重试是客户端的责任。
pub async fn handle_send(state: &AppState, ctx: &ConnectionContext, data: Value) {
    let payload: SendMessagePayload = match serde_json::from_value(data) {
        Ok(payload) => payload,
        Err(err) => {
            send_failed(state, ctx, None, &format!("invalid message payload: {err}")).await;
            return;
        }
    };

    let temporary_id = payload.temporary_id.clone();
    let content = payload.content.unwrap_or_default();
    let recipient = payload.recipient.unwrap_or_default();
    if content.is_empty() || recipient.is_empty() {
        send_failed(
            state,
            ctx,
            temporary_id,
            "message content and recipient are required",
        )
        .await;
        return;
    }

    let draft = MessageDraft {
        sender: ctx.user_id.clone(),
        recipient: UserId::from(recipient),
        content,
        timestamp: Utc::now(),
    };

    let permanent_id = match state.messages.create(draft.clone()).await {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(user_id = %ctx.user_id, error = %err, "message persistence failed");
            send_failed(state, ctx, temporary_id, "failed to persist message").await;
            return;
        }
    };

    let message = ChatMessage::from_draft(permanent_id, draft);
    let room = message.conversation_id.clone();

    // 先给发送方回对账事件，再向整个房间（含发送方其他设备）扇出
    if let Some(temporary_id) = temporary_id {
        reply(
            state,
            ctx,
            Frame::new(
                events::message::RECONCILE_MESSAGE,
                json!({"temporary_id": temporary_id, "message": message}),
            ),
        )
        .await;
    }

    state
        .registry
        .emit_to_room(
            &room,
            Frame::new(events::message::NEW_MESSAGE, json!({"message": message})),
        )
        .await;

    tracing::debug!(conversation_id = %room, user_id = %ctx.user_id, "消息已扇出");
}

/// 消息状态更新
pub async fn handle_status_update(state: &AppState, ctx: &ConnectionContext, data: Value) {
    let payload: StatusUpdatePayload = match serde_json::from_value(data) {
        Ok(payload) => payload,
        Err(err) => {
            reply(
                state,
                ctx,
                validation_error(&format!("invalid status update payload: {err}")),
            )
            .await;
            return;
        }
    };

    let (Some(conversation_id), Some(message_id), Some(status)) =
        (payload.conversation_id, payload.message_id, payload.status)
    else {
        reply(
            state,
            ctx,
            validation_error("conversation id, message id and status are required"),
        )
        .await;
        return;
    };

    let room = RoomId::from(conversation_id);
    match state
        .messages
        .update_status(&room, &message_id, status)
        .await
    {
        Ok(()) => {
            state
                .registry
                .emit_to_room(
                    &room,
                    Frame::new(
                        events::message::MESSAGE_STATUS_UPDATE,
                        json!({
                            "conversation_id": room,
                            "message_id": message_id,
                            "status": status.as_str(),
                            "updated_by": ctx.user_id,
                            "timestamp": Utc::now(),
                        }),
                    ),
                )
                .await;
        }
        Err(err) => {
            tracing::warn!(
                conversation_id = %room,
                message_id = %message_id,
                error = %err,
                "message status update failed"
            );
            reply(state, ctx, server_error("failed to update message status")).await;
        }
    }
}

/// 删除消息
pub async fn handle_delete(state: &AppState, ctx: &ConnectionContext, data: Value) {
    let payload: DeleteMessagePayload = match serde_json::from_value(data) {
        Ok(payload) => payload,
        Err(err) => {
            reply(
                state,
                ctx,
                validation_error(&format!("invalid delete payload: {err}")),
            )
            .await;
            return;
        }
    };

    let (Some(conversation_id), Some(message_id)) = (payload.conversation_id, payload.message_id)
    else {
        reply(
            state,
            ctx,
            validation_error("conversation id and message id are required"),
        )
        .await;
        return;
    };

    let room = RoomId::from(conversation_id);
    match state.messages.delete(&room, &message_id).await {
        Ok(()) => {
            state
                .registry
                .emit_to_room(
                    &room,
                    Frame::new(
                        events::message::MESSAGE_DELETED,
                        json!({
                            "conversation_id": room,
                            "message_id": message_id,
                            "deleted_by": ctx.user_id,
                            "timestamp": Utc::now(),
                        }),
                    ),
                )
                .await;
        }
        Err(err) => {
            tracing::warn!(
                conversation_id = %room,
                message_id = %message_id,
                error = %err,
                "message delete failed"
            );
            reply(state, ctx, server_error("failed to delete message")).await;
        }
    }
}

/// 输入状态；最低优先级，校验失败静默丢弃
pub async fn handle_typing(state: &AppState, ctx: &ConnectionContext, data: Value) {
    let Ok(payload) = serde_json::from_value::<TypingPayload>(data) else {
        return;
    };
    if payload.conversation_id.is_empty() {
        return;
    }

    let room = RoomId::from(payload.conversation_id);
    state
        .registry
        .emit_to_room_except(
            &room,
            ctx.connection_id,
            Frame::new(
                events::typing::USER_TYPING,
                json!({
                    "conversation_id": room,
                    "user_id": ctx.user_id,
                    "is_typing": payload.is_typing,
                    "timestamp": Utc::now(),
                }),
            ),
        )
        .await;
}

async fn send_failed(
    state: &AppState,
    ctx: &ConnectionContext,
    temporary_id: Option<String>,
    detail: &str,
) {
    reply(
        state,
        ctx,
        Frame::new(
            events::message::MESSAGE_SEND_FAILED,
            json!({"temporary_id": temporary_id, "error": detail, "timestamp": Utc::now()}),
        ),
    )
    .await;
}
