//! JWT 令牌验证
//!
//! 身份提供方接口的 HS256 实现。验证通过但缺少稳定主体标识的负载
//! 与验证失败同等对待。

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use domain::{AuthError, TokenVerifier, VerifiedIdentity};

/// 期望的令牌负载
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
}

pub struct JwtTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let subject = data.claims.sub.trim().to_string();
        if subject.is_empty() {
            return Err(AuthError::InvalidPayload(
                "token payload missing subject".to_string(),
            ));
        }

        Ok(VerifiedIdentity {
            subject,
            roles: data.claims.roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(secret: &str, sub: &str, roles: Vec<String>) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            roles,
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_token_yields_identity() {
        let verifier = JwtTokenVerifier::new("test-secret");
        let token = token_for("test-secret", "u1", vec!["member".to_string()]);

        let identity = verifier.verify(&token).await.unwrap();
        assert_eq!(identity.subject, "u1");
        assert_eq!(identity.roles, vec!["member".to_string()]);
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let verifier = JwtTokenVerifier::new("test-secret");
        let token = token_for("other-secret", "u1", Vec::new());

        assert!(matches!(
            verifier.verify(&token).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn blank_subject_is_invalid_payload() {
        let verifier = JwtTokenVerifier::new("test-secret");
        let token = token_for("test-secret", "   ", Vec::new());

        assert!(matches!(
            verifier.verify(&token).await,
            Err(AuthError::InvalidPayload(_))
        ));
    }
}
