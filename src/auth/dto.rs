use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Partial update of the authenticated user's own account.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response returned after login, register or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_serializes_id_and_email_only() {
        let user = PublicUser {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["email"], "test@example.com");
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn update_me_fields_default_to_absent() {
        let req: UpdateMeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.email.is_none());
        assert!(req.password.is_none());
    }
}
