use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;
use crate::db::models::User;
use crate::db::types::{ApprovalStatus, UserRole};

const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_TIME: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("password hashing failed")]
    Hashing,
    #[error("password verification failed")]
    Verification,
    #[error("jwt encoding failed")]
    JwtEncoding,
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) role: UserRole,
    pub(crate) exp: i64,
}

/// Why an actor may not use a part of the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessDenied {
    NotAdmin,
    NotStudent,
    PendingApproval,
    Rejected,
}

impl AccessDenied {
    pub(crate) fn message(self) -> &'static str {
        match self {
            Self::NotAdmin => "Admin access required",
            Self::NotStudent => "Student access required",
            Self::PendingApproval => "Your account is awaiting admin approval",
            Self::Rejected => "Your account registration was rejected",
        }
    }
}

/// The authenticated actor, threaded explicitly into every component that
/// needs to scope or authorize work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuthContext {
    pub(crate) actor_id: String,
    pub(crate) role: UserRole,
    pub(crate) approval: ApprovalStatus,
}

impl AuthContext {
    pub(crate) fn for_user(user: &User) -> Self {
        Self { actor_id: user.id.clone(), role: user.role, approval: user.status }
    }

    pub(crate) fn ensure_admin(&self) -> Result<(), AccessDenied> {
        match self.role {
            UserRole::Admin => Ok(()),
            UserRole::Student => Err(AccessDenied::NotAdmin),
        }
    }

    /// Students may only work once an admin approved their registration.
    pub(crate) fn ensure_active_student(&self) -> Result<(), AccessDenied> {
        if self.role != UserRole::Student {
            return Err(AccessDenied::NotStudent);
        }
        self.ensure_may_sign_in()
    }

    pub(crate) fn ensure_may_sign_in(&self) -> Result<(), AccessDenied> {
        if self.role == UserRole::Admin {
            return Ok(());
        }
        match self.approval {
            ApprovalStatus::Approved => Ok(()),
            ApprovalStatus::Pending => Err(AccessDenied::PendingApproval),
            ApprovalStatus::Rejected => Err(AccessDenied::Rejected),
        }
    }
}

fn argon2() -> Result<Argon2<'static>, argon2::Error> {
    let params = argon2::Params::new(ARGON2_MEMORY_KIB, ARGON2_TIME, ARGON2_PARALLELISM, None)?;
    Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
}

pub(crate) fn hash_password(password: &str) -> Result<String, SecurityError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2()
        .map_err(|_| SecurityError::Hashing)?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| SecurityError::Hashing)?
        .to_string();

    Ok(hash)
}

pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool, SecurityError> {
    let parsed = PasswordHash::new(hash).map_err(|_| SecurityError::Verification)?;
    let argon2 = argon2().map_err(|_| SecurityError::Verification)?;

    match argon2.verify_password(password.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(SecurityError::Verification),
    }
}

pub(crate) fn create_access_token(
    subject: &str,
    role: UserRole,
    settings: &Settings,
    expires_in: Option<Duration>,
) -> Result<String, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let expire = OffsetDateTime::now_utc()
        + expires_in.unwrap_or_else(|| {
            Duration::minutes(settings.security().access_token_expire_minutes as i64)
        });

    let claims = Claims { sub: subject.to_string(), role, exp: expire.unix_timestamp() };

    encode(
        &jsonwebtoken::Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .map_err(|_| SecurityError::JwtEncoding)
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    validation.required_spec_claims.insert("exp".to_string());
    validation.required_spec_claims.insert("sub".to_string());

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::JwtDecoding)
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn context(role: UserRole, approval: ApprovalStatus) -> AuthContext {
        AuthContext { actor_id: "actor-1".to_string(), role, approval }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct-horse-battery-staple").expect("hash");
        assert!(verify_password("correct-horse-battery-staple", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_a_verification_error() {
        assert!(matches!(
            verify_password("whatever", "not-a-phc-string"),
            Err(SecurityError::Verification)
        ));
    }

    #[tokio::test]
    async fn jwt_carries_subject_and_role() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let token = create_access_token(
            "user-123",
            UserRole::Student,
            &settings,
            Some(Duration::minutes(1)),
        )
        .expect("token");
        let claims = verify_token(&token, &settings).expect("claims");

        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.role, UserRole::Student);
    }

    #[tokio::test]
    async fn expired_jwt_is_rejected() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");

        let token =
            create_access_token("user-123", UserRole::Admin, &settings, Some(Duration::hours(-2)))
                .expect("token");

        assert!(matches!(verify_token(&token, &settings), Err(SecurityError::JwtDecoding)));
    }

    #[test]
    fn pending_and_rejected_students_are_blocked() {
        assert_eq!(
            context(UserRole::Student, ApprovalStatus::Pending).ensure_active_student(),
            Err(AccessDenied::PendingApproval)
        );
        assert_eq!(
            context(UserRole::Student, ApprovalStatus::Rejected).ensure_may_sign_in(),
            Err(AccessDenied::Rejected)
        );
        assert!(context(UserRole::Student, ApprovalStatus::Approved)
            .ensure_active_student()
            .is_ok());
    }

    #[test]
    fn admins_skip_approval_but_are_not_students() {
        let admin = context(UserRole::Admin, ApprovalStatus::Pending);
        assert!(admin.ensure_admin().is_ok());
        assert!(admin.ensure_may_sign_in().is_ok());
        assert_eq!(admin.ensure_active_student(), Err(AccessDenied::NotStudent));
        assert_eq!(
            context(UserRole::Student, ApprovalStatus::Approved).ensure_admin(),
            Err(AccessDenied::NotAdmin)
        );
    }
}
