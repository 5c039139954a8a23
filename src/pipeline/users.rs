//! Registering and removing users.
//!
//! Both operations run outside the cycle and write through to storage
//! before touching the snapshot.

use crate::error::{AppError, Result};
use crate::models::{Association, NewUser, User};
use crate::services::ScrapingService;
use crate::snapshot::SnapshotStore;
use crate::storage::Repositories;

/// Persist a new user once the portal accepts their credential.
///
/// The credential is checked with a login/logout round trip; a rejected
/// login is returned as is and nothing is saved.
pub async fn register_user<S: ScrapingService>(
    scraper: &S,
    store: &SnapshotStore,
    repos: &Repositories,
    draft: NewUser,
) -> Result<User> {
    {
        let snapshot = store.snapshot();
        let missing = snapshot.missing_collections();
        if !missing.is_empty() {
            return Err(AppError::SnapshotInconsistent { missing });
        }
        if snapshot.user_by_registration(&draft.registration).is_some() {
            return Err(AppError::validation(format!(
                "registration {} is already registered",
                draft.registration
            )));
        }
        if snapshot.user_by_phone(&draft.phone).is_some() {
            return Err(AppError::validation(format!(
                "phone {} is already registered",
                draft.phone
            )));
        }
    }

    let session = scraper.login(&draft.registration, &draft.credential).await?;
    if let Err(e) = scraper.logout(session).await {
        log::warn!("Logout after credential check failed for {}: {}", draft.registration, e);
    }

    let user = repos.users.save(draft).await?;
    store.add_user(user.clone());
    log::info!("Registered {} (id {})", user.display_name(), user.id);
    Ok(user)
}

/// Remove a user and their enrollments, then reload the snapshot.
///
/// Subjects stay, other users may still be enrolled in them.
pub async fn unregister_user(
    store: &SnapshotStore,
    repos: &Repositories,
    registration: &str,
) -> Result<User> {
    let (user, associations) = {
        let snapshot = store.snapshot();
        let user = snapshot
            .user_by_registration(registration)
            .cloned()
            .ok_or_else(|| {
                AppError::validation(format!("no user registered as {registration}"))
            })?;
        let associations: Vec<Association> = snapshot
            .subjects_for_user(user.id)
            .into_iter()
            .map(|s| Association::new(user.id, s.id))
            .collect();
        (user, associations)
    };

    for association in &associations {
        repos.associations.delete(association).await?;
    }
    repos.users.delete(&user.registration).await?;

    log::info!(
        "Removed {} and {} enrollments",
        user.display_name(),
        associations.len()
    );
    store.full_sync(repos).await?;
    Ok(user)
}
