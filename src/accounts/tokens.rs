use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{ActivationClaims, PendingAccount, SessionClaims, TokenKind};
use crate::{config::JwtConfig, state::AppState};

/// Signing and verification keys for both token kinds. Session credentials
/// and activation tickets share the secret; the `kind` claim keeps one from
/// passing as the other.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub session_ttl: Duration,
    pub activation_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            session_ttl: Duration::from_secs((config.session_ttl_minutes as u64) * 60),
            activation_ttl: Duration::from_secs((config.activation_ttl_minutes as u64) * 60),
        }
    }

    pub fn session_lifetime(&self) -> TimeDuration {
        TimeDuration::seconds(self.session_ttl.as_secs() as i64)
    }

    pub fn sign_session(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + self.session_lifetime();
        let claims = SessionClaims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Session,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "session token signed");
        Ok(token)
    }

    pub fn sign_activation(&self, pending: &PendingAccount) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.activation_ttl.as_secs() as i64);
        let claims = ActivationClaims {
            name: pending.name.clone(),
            email: pending.email.clone(),
            password_hash: pending.password_hash.clone(),
            avatar: pending.avatar.clone(),
            jti: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Activation,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(email = %pending.email, jti = %claims.jti, "activation ticket signed");
        Ok(token)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        // Expiry is exact: a 5-minute ticket is dead at 5 minutes.
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    pub fn verify_session(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation())?;
        if data.claims.kind != TokenKind::Session {
            anyhow::bail!("not a session token");
        }
        Ok(data.claims)
    }

    pub fn verify_activation(&self, token: &str) -> anyhow::Result<ActivationClaims> {
        let data = decode::<ActivationClaims>(token, &self.decoding, &self.validation())?;
        if data.claims.kind != TokenKind::Activation {
            anyhow::bail!("not an activation ticket");
        }
        Ok(data.claims)
    }
}
