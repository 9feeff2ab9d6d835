use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One entry in a user's address book. At most one entry per `address_type`
/// ("home", "office", ...); ids are assigned when the entry is inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub address_type: String,
    pub country: String,
    pub city: String,
    pub address1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

/// User record as served to clients. The password hash is not part of this
/// shape at all; paths that compare or rewrite it fetch [`Credentials`]
/// explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub phone_number: Option<String>,
    pub role: String,
    pub addresses: Json<Vec<Address>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Password material for one account.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub id: Uuid,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_camel_case_without_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "A".into(),
            email: "a@x.com".into(),
            avatar: "avatars/f1.png".into(),
            phone_number: None,
            role: "user".into(),
            addresses: Json(vec![]),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("phoneNumber"));
        assert!(json.contains("createdAt"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn address_round_trips_camel_case() {
        let json = r#"{
            "id": "6f1c7c84-8b4e-4c89-9f07-6a5d9c2e1a10",
            "addressType": "home",
            "country": "DE",
            "city": "Berlin",
            "address1": "Unter den Linden 1",
            "zipCode": "10117"
        }"#;
        let addr: Address = serde_json::from_str(json).unwrap();
        assert_eq!(addr.address_type, "home");
        assert_eq!(addr.zip_code.as_deref(), Some("10117"));
        assert!(addr.address2.is_none());
        let out = serde_json::to_string(&addr).unwrap();
        assert!(out.contains("addressType"));
        assert!(!out.contains("address2"));
    }
}
