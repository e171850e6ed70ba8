use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{ApprovalStatus, UserRole};
use crate::repositories;

/// Creates the first admin account, or repairs it when its password, role or
/// approval drifted from configuration.
pub(crate) async fn ensure_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping admin bootstrap");
        return Ok(());
    }

    let email = admin.first_admin_email.trim().to_ascii_lowercase();
    let now = primitive_now_utc();

    let Some(user) = repositories::users::find_by_email(state.db(), &email).await? else {
        let hashed_password = security::hash_password(&admin.first_admin_password)?;
        repositories::users::create(
            state.db(),
            repositories::users::CreateUser {
                email: &email,
                hashed_password: &hashed_password,
                full_name: "Portal Admin",
                role: UserRole::Admin,
                status: ApprovalStatus::Approved,
                created_at: now,
            },
        )
        .await?;

        tracing::info!(email = %email, "Created bootstrap admin");
        return Ok(());
    };

    let password_matches =
        security::verify_password(&admin.first_admin_password, &user.hashed_password)
            .unwrap_or(false);
    let up_to_date = password_matches
        && user.role == UserRole::Admin
        && user.status == ApprovalStatus::Approved
        && user.is_active;

    if up_to_date {
        tracing::info!("Bootstrap admin already up to date");
        return Ok(());
    }

    let hashed_password = if password_matches {
        user.hashed_password.clone()
    } else {
        security::hash_password(&admin.first_admin_password)?
    };

    repositories::users::promote_to_admin(state.db(), &user.id, &hashed_password, now).await?;
    tracing::info!(email = %email, "Updated bootstrap admin");
    Ok(())
}
