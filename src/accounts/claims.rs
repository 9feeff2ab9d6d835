use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of signed token: session cookie or activation ticket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Activation,
}

/// Claims carried by the `token` session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,   // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
    pub kind: TokenKind,
}

/// A registration that has not been persisted yet. The ticket is the only
/// record of it; no user row exists until activation succeeds.
#[derive(Debug, Clone)]
pub struct PendingAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: String,
}

/// Claims carried by an activation ticket. `jti` makes the ticket single-use:
/// the replay guard records it on redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationClaims {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: String,
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}
