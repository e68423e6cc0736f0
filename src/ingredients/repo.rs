use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

/// Escapes LIKE wildcards and appends `%` for a prefix match.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Ingredients ordered by name, optionally narrowed to a name prefix.
pub async fn search(db: &PgPool, prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>> {
    let pattern = like_prefix(prefix.unwrap_or("").trim());
    sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT id, name, measurement_unit
          FROM ingredients
         WHERE name ILIKE $1
         ORDER BY name, measurement_unit
        "#,
    )
    .bind(pattern)
    .fetch_all(db)
    .await
    .context("search ingredients")
}

pub async fn find(db: &PgPool, id: i64) -> anyhow::Result<Option<Ingredient>> {
    sqlx::query_as::<_, Ingredient>(
        r#"SELECT id, name, measurement_unit FROM ingredients WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find ingredient")
}

pub async fn count_existing(db: &PgPool, ids: &[i64]) -> anyhow::Result<i64> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)"#)
        .bind(ids)
        .fetch_one(db)
        .await
        .context("count ingredients")
}
