use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::{Validate, ValidationError};

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Preferences {
    #[serde(default)]
    pub email_notifications: bool,
    #[serde(default)]
    pub sms_notifications: bool,
    #[serde(default)]
    pub marketing_emails: bool,
    #[serde(default)]
    pub room_type_preference: Option<String>,
    #[serde(default)]
    pub floor_preference: Option<String>,
    #[serde(default)]
    pub view_preference: Option<String>,
}

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
pub struct Profile {
    pub user_id: i64,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub preferences: Json<Preferences>,
    pub two_factor_enabled: bool,
    #[serde(skip_serializing)]
    pub two_factor_pending_code: Option<String>,
    #[serde(skip_serializing)]
    pub two_factor_last_sent_at: Option<NaiveDateTime>,
    pub is_blocked: bool,
    pub blocked_at: Option<NaiveDateTime>,
    pub blocked_by: Option<i64>,
    pub block_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_login_ip: Option<String>,
}

impl Profile {
    /// Marks the profile blocked by `admin_id`. Persist with `save_block_state`.
    pub fn block(&mut self, admin_id: i64, reason: &str, now: NaiveDateTime) {
        self.is_blocked = true;
        self.blocked_at = Some(now);
        self.blocked_by = Some(admin_id);
        self.block_reason = Some(reason.to_string());
    }

    pub fn unblock(&mut self) {
        self.is_blocked = false;
        self.blocked_at = None;
        self.blocked_by = None;
        self.block_reason = None;
    }

    pub fn can_make_reservations(&self, user: &User) -> bool {
        !self.is_blocked && user.is_active
    }

    pub fn block_message(&self) -> String {
        let reason = self
            .block_reason
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("not specified");
        format!(
            "Your account has been blocked. Reason: {}. Contact the administrator for more information.",
            reason
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_password_confirmation"))]
pub struct RegisterUser {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub password_confirm: String,
}

fn validate_password_confirmation(input: &RegisterUser) -> Result<(), ValidationError> {
    if input.password != input.password_confirm {
        return Err(ValidationError::new("password_mismatch"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TwoFactorCode {
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(max = 30))]
    pub first_name: Option<String>,
    #[validate(length(max = 30))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePassword {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetConfirm {
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct BlockUser {
    #[serde(default)]
    pub reason: String,
}

/// Admin listing row: a user with the blocking fields of their profile.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub created_at: NaiveDateTime,
}
