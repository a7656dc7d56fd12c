use crate::model::Role;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Resolved identity for one request or editor session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Session>;
}

pub struct Hs256Verifier {
    key: DecodingKey,
}

impl Hs256Verifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl TokenVerifier for Hs256Verifier {
    async fn verify(&self, token: &str) -> Option<Session> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<Claims>(token, &self.key, &validation)
            .ok()
            .map(|d| Session {
                user_id: d.claims.sub,
                role: d.claims.role.unwrap_or(Role::User),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    #[tokio::test]
    async fn hs256_roundtrip() {
        let verifier = Hs256Verifier::new("secret");
        let token = encode(
            &Header::default(),
            &json!({ "sub": "user1", "role": "admin" }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let session = verifier.verify(&token).await.unwrap();
        assert_eq!(session.user_id, "user1");
        assert!(session.is_admin());
    }

    #[tokio::test]
    async fn missing_role_defaults_to_user() {
        let verifier = Hs256Verifier::new("secret");
        let token = encode(
            &Header::default(),
            &json!({ "sub": "user2" }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let session = verifier.verify(&token).await.unwrap();
        assert_eq!(session.role, Role::User);
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let verifier = Hs256Verifier::new("secret");
        let token = encode(
            &Header::default(),
            &json!({ "sub": "user3" }),
            &EncodingKey::from_secret(b"other"),
        )
        .unwrap();

        assert!(verifier.verify(&token).await.is_none());
    }
}
