//! 连接准入
//!
//! 从升级请求的四个候选位置按严格优先级提取承载令牌，交给身份
//! 提供方验证，在连接上附加认证身份和设备信息。提取和验证中的
//! 任何失败都收敛为拒绝，绝不让异常冲垮接入循环。

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::Utc;

use domain::{AuthError, AuthenticatedUser, DeviceInfo, TokenVerifier, UserId};

pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
    cookie_name: String,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>, cookie_name: impl Into<String>) -> Self {
        Self {
            verifier,
            cookie_name: cookie_name.into(),
        }
    }

    /// 准入一条待升级连接
    pub async fn admit(
        &self,
        headers: &HeaderMap,
        query: &HashMap<String, String>,
    ) -> Result<(AuthenticatedUser, DeviceInfo), AuthError> {
        let token = extract_token(headers, query, &self.cookie_name)
            .ok_or(AuthError::MissingToken)?;

        let identity = self.verifier.verify(&token).await?;
        // 对验证实现保持防御：缺主体等同验证失败
        if identity.subject.trim().is_empty() {
            return Err(AuthError::InvalidPayload(
                "verified payload missing subject".to_string(),
            ));
        }

        let user = AuthenticatedUser {
            user_id: UserId::from(identity.subject),
            roles: identity.roles,
            authenticated_at: Utc::now(),
        };
        let device = DeviceInfo::from_request(
            header_str(headers, header::USER_AGENT.as_str()).map(str::to_string),
            client_ip(headers),
        );

        Ok((user, device))
    }
}

/// 按严格优先级提取令牌，第一个非空命中即胜出：
/// (1) x-auth-token 头（握手认证负载槽位）
/// (2) query 参数 token
/// (3) Authorization: Bearer
/// (4) 配置的 cookie
fn extract_token(
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    cookie_name: &str,
) -> Option<String> {
    if let Some(value) = header_str(headers, "x-auth-token") {
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    if let Some(value) = query.get("token") {
        if !value.is_empty() {
            return Some(value.clone());
        }
    }

    if let Some(value) = header_str(headers, header::AUTHORIZATION.as_str()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookies) = header_str(headers, header::COOKIE.as_str()) {
        for pair in cookies.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == cookie_name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::VerifiedIdentity;

    struct StaticVerifier(VerifiedIdentity);

    #[async_trait]
    impl TokenVerifier for StaticVerifier {
        async fn verify(&self, _token: &str) -> Result<VerifiedIdentity, AuthError> {
            Ok(self.0.clone())
        }
    }

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        headers
    }

    #[test]
    fn auth_header_slot_wins_over_everything() {
        let headers = headers_with(&[
            ("x-auth-token", "from-auth-slot"),
            ("authorization", "Bearer from-bearer"),
            ("cookie", "auth_token=from-cookie"),
        ]);
        let mut query = HashMap::new();
        query.insert("token".to_string(), "from-query".to_string());

        assert_eq!(
            extract_token(&headers, &query, "auth_token").as_deref(),
            Some("from-auth-slot")
        );
    }

    #[test]
    fn query_beats_bearer_and_cookie() {
        let headers = headers_with(&[
            ("authorization", "Bearer from-bearer"),
            ("cookie", "auth_token=from-cookie"),
        ]);
        let mut query = HashMap::new();
        query.insert("token".to_string(), "from-query".to_string());

        assert_eq!(
            extract_token(&headers, &query, "auth_token").as_deref(),
            Some("from-query")
        );
    }

    #[test]
    fn bearer_beats_cookie_and_cookie_is_last() {
        let headers = headers_with(&[
            ("authorization", "Bearer from-bearer"),
            ("cookie", "other=1; auth_token=from-cookie"),
        ]);
        assert_eq!(
            extract_token(&headers, &HashMap::new(), "auth_token").as_deref(),
            Some("from-bearer")
        );

        let cookie_only = headers_with(&[("cookie", "other=1; auth_token=from-cookie")]);
        assert_eq!(
            extract_token(&cookie_only, &HashMap::new(), "auth_token").as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn empty_candidates_do_not_win() {
        let headers = headers_with(&[
            ("x-auth-token", ""),
            ("authorization", "Bearer real-token"),
        ]);
        let mut query = HashMap::new();
        query.insert("token".to_string(), "".to_string());

        assert_eq!(
            extract_token(&headers, &query, "auth_token").as_deref(),
            Some("real-token")
        );
        assert!(extract_token(&HeaderMap::new(), &HashMap::new(), "auth_token").is_none());
    }

    #[tokio::test]
    async fn missing_token_everywhere_is_rejected() {
        let gate = AuthGate::new(
            Arc::new(StaticVerifier(VerifiedIdentity {
                subject: "u1".to_string(),
                roles: Vec::new(),
            })),
            "auth_token",
        );

        let result = gate.admit(&HeaderMap::new(), &HashMap::new()).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn blank_subject_from_verifier_is_invalid_payload() {
        let gate = AuthGate::new(
            Arc::new(StaticVerifier(VerifiedIdentity {
                subject: "  ".to_string(),
                roles: Vec::new(),
            })),
            "auth_token",
        );
        let headers = headers_with(&[("x-auth-token", "whatever")]);

        let result = gate.admit(&headers, &HashMap::new()).await;
        assert!(matches!(result, Err(AuthError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn admission_attaches_identity_and_device() {
        let gate = AuthGate::new(
            Arc::new(StaticVerifier(VerifiedIdentity {
                subject: "u1".to_string(),
                roles: vec!["member".to_string()],
            })),
            "auth_token",
        );
        let headers = headers_with(&[
            ("x-auth-token", "tok"),
            ("user-agent", "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0)"),
            ("x-forwarded-for", "10.0.0.7, 172.16.0.1"),
        ]);

        let (user, device) = gate.admit(&headers, &HashMap::new()).await.unwrap();
        assert_eq!(user.user_id, UserId::from("u1"));
        assert_eq!(user.roles, vec!["member".to_string()]);
        assert_eq!(device.device_type, domain::DeviceType::Mobile);
        assert_eq!(device.ip_address.as_deref(), Some("10.0.0.7"));
    }
}
