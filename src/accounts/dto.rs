use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::User;

/// Body of POST /activation.
#[derive(Debug, Deserialize)]
pub struct ActivationRequest {
    pub activation_token: String,
}

/// Body of POST /login-user. Fields are optional so a missing one can be
/// reported as a validation error instead of a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of PUT /update-user-info. The password re-confirms the session
/// identity; it is not changed here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfoRequest {
    pub email: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub name: String,
}

/// Body of PUT /update-user-addresses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub id: Option<Uuid>,
    pub address_type: String,
    pub country: String,
    pub city: String,
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
}

/// Body of PUT /update-user-password.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Uniform success envelope carrying a user record.
#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub success: bool,
    pub user: User,
}

impl UserEnvelope {
    pub fn new(user: User) -> Self {
        Self {
            success: true,
            user,
        }
    }
}

/// Uniform success envelope carrying only a message.
#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub success: bool,
    pub message: String,
}

impl MessageEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_info_accepts_camel_case() {
        let body = r#"{
            "email": "a@x.com",
            "password": "p1",
            "phoneNumber": "+49 30 1234567",
            "name": "A"
        }"#;
        let req: UpdateInfoRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.phone_number.as_deref(), Some("+49 30 1234567"));
    }

    #[test]
    fn change_password_accepts_camel_case() {
        let body = r#"{"oldPassword":"p1","newPassword":"p2","confirmPassword":"p2"}"#;
        let req: ChangePasswordRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.new_password, "p2");
    }

    #[test]
    fn login_tolerates_missing_fields() {
        let req: LoginRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert!(req.password.is_none());
    }
}
