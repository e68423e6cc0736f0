use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::dto::RecipeIngredientOut;
use super::repo_types::{RecipeFilter, RecipeRow, ValidatedRecipe};
use crate::error::{db_error_code, AppError, AppResult, UNIQUE_VIOLATION};

const RECIPE_COLUMNS: &str =
    "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time";

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, f: &RecipeFilter) {
    qb.push(" WHERE TRUE");
    if let Some(author) = f.author {
        qb.push(" AND r.author_id = ").push_bind(author);
    }
    if !f.tags.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        )
        .push_bind(f.tags.clone())
        .push("))");
    }
    if let Some(user) = f.favorited_by {
        qb.push(" AND EXISTS (SELECT 1 FROM favorites fv WHERE fv.recipe_id = r.id AND fv.user_id = ")
            .push_bind(user)
            .push(")");
    }
    if let Some(user) = f.in_cart_of {
        qb.push(" AND EXISTS (SELECT 1 FROM cart_entries ce WHERE ce.recipe_id = r.id AND ce.user_id = ")
            .push_bind(user)
            .push(")");
    }
}

pub async fn count(db: &PgPool, f: &RecipeFilter) -> anyhow::Result<i64> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes r");
    push_filters(&mut qb, f);
    qb.build_query_scalar::<i64>()
        .fetch_one(db)
        .await
        .context("count recipes")
}

/// Newest first.
pub async fn list(
    db: &PgPool,
    f: &RecipeFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<RecipeRow>> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {RECIPE_COLUMNS} FROM recipes r"));
    push_filters(&mut qb, f);
    qb.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    qb.build_query_as::<RecipeRow>()
        .fetch_all(db)
        .await
        .context("list recipes")
}

pub async fn find(db: &PgPool, id: i64) -> anyhow::Result<Option<RecipeRow>> {
    sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find recipe")
}

pub async fn ingredients_for(db: &PgPool, recipe_id: i64) -> anyhow::Result<Vec<RecipeIngredientOut>> {
    sqlx::query_as::<_, RecipeIngredientOut>(
        r#"
        SELECT i.id, i.name, i.measurement_unit, ri.amount
          FROM recipe_ingredients ri
          JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE ri.recipe_id = $1
         ORDER BY ri.id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await
    .context("list recipe ingredients")
}

/// `(is_favorited, is_in_shopping_cart)` for one viewer.
pub async fn flags(db: &PgPool, user_id: Uuid, recipe_id: i64) -> anyhow::Result<(bool, bool)> {
    sqlx::query_as::<_, (bool, bool)>(
        r#"
        SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = $1 AND recipe_id = $2),
               EXISTS(SELECT 1 FROM cart_entries WHERE user_id = $1 AND recipe_id = $2)
        "#,
    )
    .bind(user_id)
    .bind(recipe_id)
    .fetch_one(db)
    .await
    .context("recipe flags")
}

fn name_taken(e: sqlx::Error) -> AppError {
    if db_error_code(&e).as_deref() == Some(UNIQUE_VIOLATION) {
        AppError::Conflict("A recipe with this name already exists".into())
    } else {
        e.into()
    }
}

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    author_id: Uuid,
    v: &ValidatedRecipe,
    image: Option<&str>,
) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(&v.name)
    .bind(image)
    .bind(&v.text)
    .bind(v.cooking_time)
    .fetch_one(&mut **tx)
    .await
    .map_err(name_taken)?;

    insert_links_tx(tx, id, v).await?;
    Ok(id)
}

/// Rewrites the scalar columns; `image = None` keeps the stored one.
pub async fn update_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    v: &ValidatedRecipe,
    image: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE recipes
           SET name = $2, text = $3, cooking_time = $4, image = COALESCE($5, image)
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&v.name)
    .bind(&v.text)
    .bind(v.cooking_time)
    .bind(image)
    .execute(&mut **tx)
    .await
    .map_err(name_taken)?;

    sqlx::query(r#"DELETE FROM recipe_tags WHERE recipe_id = $1"#)
        .bind(id)
        .execute(&mut **tx)
        .await
        .context("clear recipe tags")?;
    sqlx::query(r#"DELETE FROM recipe_ingredients WHERE recipe_id = $1"#)
        .bind(id)
        .execute(&mut **tx)
        .await
        .context("clear recipe ingredients")?;

    insert_links_tx(tx, id, v).await?;
    Ok(())
}

async fn insert_links_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    v: &ValidatedRecipe,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO recipe_tags (recipe_id, tag_id)
        SELECT $1, tag_id FROM UNNEST($2::BIGINT[]) AS tag_id
        "#,
    )
    .bind(recipe_id)
    .bind(&v.tag_ids)
    .execute(&mut **tx)
    .await
    .context("insert recipe tags")?;

    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, x.ingredient_id, x.amount
          FROM UNNEST($2::BIGINT[], $3::SMALLINT[]) AS x(ingredient_id, amount)
        "#,
    )
    .bind(recipe_id)
    .bind(&v.ingredient_ids)
    .bind(&v.amounts)
    .execute(&mut **tx)
    .await
    .context("insert recipe ingredients")?;
    Ok(())
}

pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<u64> {
    let done = sqlx::query(r#"DELETE FROM recipes WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await
        .context("delete recipe")?;
    Ok(done.rows_affected())
}
