use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>(
        r#"
        SELECT id, name, color, slug
          FROM tags
         ORDER BY id DESC
        "#,
    )
    .fetch_all(db)
    .await
    .context("list tags")
}

pub async fn find(db: &PgPool, id: i64) -> anyhow::Result<Option<Tag>> {
    sqlx::query_as::<_, Tag>(r#"SELECT id, name, color, slug FROM tags WHERE id = $1"#)
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find tag")
}

/// Tags attached to a recipe.
pub async fn list_for_recipe(db: &PgPool, recipe_id: i64) -> anyhow::Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.name, t.color, t.slug
          FROM recipe_tags rt
          JOIN tags t ON t.id = rt.tag_id
         WHERE rt.recipe_id = $1
         ORDER BY t.id DESC
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("list recipe tags")
}

/// How many of the given ids exist.
pub async fn count_existing(db: &PgPool, ids: &[i64]) -> anyhow::Result<i64> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM tags WHERE id = ANY($1)"#)
        .bind(ids)
        .fetch_one(db)
        .await
        .context("count tags")
}
