use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::dto::UserProfile;
use crate::collections::repo::RecipeSummaryRow;

/// `$1` is the viewer (nullable); `is_subscribed` is computed against it.
const PROFILE_SELECT: &str = r#"
    SELECT u.id, u.email, u.username, u.first_name, u.last_name,
           EXISTS(
               SELECT 1 FROM follows f WHERE f.user_id = $1 AND f.author_id = u.id
           ) AS is_subscribed
      FROM users u
"#;

pub async fn count_users(db: &PgPool) -> anyhow::Result<i64> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM users"#)
        .fetch_one(db)
        .await
        .context("count users")
}

pub async fn list_profiles(
    db: &PgPool,
    viewer: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<UserProfile>> {
    sqlx::query_as::<_, UserProfile>(&format!(
        "{PROFILE_SELECT} ORDER BY u.created_at, u.id LIMIT $2 OFFSET $3"
    ))
    .bind(viewer)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list users")
}

pub async fn find_profile(
    db: &PgPool,
    viewer: Option<Uuid>,
    id: Uuid,
) -> anyhow::Result<Option<UserProfile>> {
    sqlx::query_as::<_, UserProfile>(&format!("{PROFILE_SELECT} WHERE u.id = $2"))
        .bind(viewer)
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user")
}

pub async fn count_subscriptions(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM follows WHERE user_id = $1"#)
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("count subscriptions")
}

/// Authors followed by `user_id`, most recent subscription first.
pub async fn list_subscriptions(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<UserProfile>> {
    sqlx::query_as::<_, UserProfile>(
        r#"
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
               TRUE AS is_subscribed
          FROM follows f
          JOIN users u ON u.id = f.author_id
         WHERE f.user_id = $1
         ORDER BY f.id DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list subscriptions")
}

/// Newest recipes of an author; `limit = None` returns all of them.
pub async fn author_recipes(
    db: &PgPool,
    author_id: Uuid,
    limit: Option<i64>,
) -> anyhow::Result<(Vec<RecipeSummaryRow>, i64)> {
    let rows = sqlx::query_as::<_, RecipeSummaryRow>(
        r#"
        SELECT id, name, image, cooking_time
          FROM recipes
         WHERE author_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT $2
        "#,
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(db)
    .await
    .context("list author recipes")?;

    let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM recipes WHERE author_id = $1"#)
        .bind(author_id)
        .fetch_one(db)
        .await
        .context("count author recipes")?;

    Ok((rows, total))
}

/// Returns false when the subscription already existed.
pub async fn insert_follow(db: &PgPool, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
    let done = sqlx::query(
        r#"
        INSERT INTO follows (user_id, author_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, author_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(author_id)
    .execute(db)
    .await
    .context("insert follow")?;
    Ok(done.rows_affected() == 1)
}

pub async fn delete_follow(db: &PgPool, user_id: Uuid, author_id: Uuid) -> anyhow::Result<u64> {
    let done = sqlx::query(r#"DELETE FROM follows WHERE user_id = $1 AND author_id = $2"#)
        .bind(user_id)
        .bind(author_id)
        .execute(db)
        .await
        .context("delete follow")?;
    Ok(done.rows_affected())
}
