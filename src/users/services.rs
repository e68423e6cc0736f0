use tracing::info;
use uuid::Uuid;

use super::dto::{AuthorWithRecipes, UserProfile};
use super::repo;
use crate::error::{AppError, AppResult};
use crate::recipes::services::summarize;
use crate::state::AppState;

pub(crate) fn check_can_follow(user_id: Uuid, author_id: Uuid) -> AppResult<()> {
    if user_id == author_id {
        return Err(AppError::validation("You cannot subscribe to yourself"));
    }
    Ok(())
}

/// Maps the insert result of a follow to the API outcome.
pub(crate) fn follow_created(inserted: bool) -> AppResult<()> {
    if inserted {
        Ok(())
    } else {
        Err(AppError::Conflict("Already subscribed to this author".into()))
    }
}

/// Maps the number of deleted follows to the API outcome.
pub(crate) fn follow_removed(deleted: u64) -> AppResult<()> {
    if deleted == 0 {
        return Err(AppError::not_found("Subscription"));
    }
    Ok(())
}

pub async fn with_recipes(
    st: &AppState,
    profile: UserProfile,
    recipes_limit: Option<u32>,
) -> AppResult<AuthorWithRecipes> {
    let (rows, recipes_count) =
        repo::author_recipes(&st.db, profile.id, recipes_limit.map(i64::from)).await?;
    let mut recipes = Vec::with_capacity(rows.len());
    for r in rows {
        recipes.push(summarize(st, r).await?);
    }
    Ok(AuthorWithRecipes {
        profile,
        recipes,
        recipes_count,
    })
}

pub async fn subscribe(
    st: &AppState,
    user_id: Uuid,
    author_id: Uuid,
    recipes_limit: Option<u32>,
) -> AppResult<AuthorWithRecipes> {
    let author = repo::find_profile(&st.db, Some(user_id), author_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    check_can_follow(user_id, author_id)?;

    follow_created(repo::insert_follow(&st.db, user_id, author_id).await?)?;
    info!(%user_id, %author_id, "subscribed");

    let profile = UserProfile {
        is_subscribed: true,
        ..author
    };
    with_recipes(st, profile, recipes_limit).await
}

pub async fn unsubscribe(st: &AppState, user_id: Uuid, author_id: Uuid) -> AppResult<()> {
    repo::find_profile(&st.db, Some(user_id), author_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    follow_removed(repo::delete_follow(&st.db, user_id, author_id).await?)?;
    info!(%user_id, %author_id, "unsubscribed");
    Ok(())
}
