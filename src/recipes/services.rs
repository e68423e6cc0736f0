use std::collections::HashSet;

use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use super::dto::{RecipeDetails, RecipeQuery, RecipeSummary, RecipeWrite};
use super::permissions::ensure_author_or_staff;
use super::repo;
use super::repo_types::{RecipeFilter, RecipeRow, ValidatedRecipe};
use crate::auth::repo_types::User;
use crate::collections::repo::RecipeSummaryRow;
use crate::error::{AppError, AppResult};
use crate::images::services::{decode_data_url, discard_image, upload_recipe_image};
use crate::pagination::Page;
use crate::state::AppState;
use crate::{ingredients, tags, users};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_SMALL: i64 = i16::MAX as i64;

pub async fn summarize(st: &AppState, row: RecipeSummaryRow) -> anyhow::Result<RecipeSummary> {
    let image = st.image_url(row.image.as_deref()).await?;
    Ok(RecipeSummary {
        id: row.id,
        name: row.name,
        image,
        cooking_time: row.cooking_time,
    })
}

fn small_positive(value: i64, field: &str) -> AppResult<i16> {
    if (1..=MAX_SMALL).contains(&value) {
        Ok(value as i16)
    } else {
        Err(AppError::validation(format!(
            "{field} must be between 1 and {MAX_SMALL}"
        )))
    }
}

/// Checks the shape of a recipe payload. Existence of the referenced
/// tags and ingredients is checked separately against the store.
pub fn validate_recipe(body: &RecipeWrite) -> AppResult<ValidatedRecipe> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if body.text.trim().is_empty() {
        return Err(AppError::validation("text is required"));
    }
    let cooking_time = small_positive(body.cooking_time, "cooking_time")?;

    if body.tags.is_empty() {
        return Err(AppError::validation("at least one tag is required"));
    }
    let mut seen = HashSet::new();
    if !body.tags.iter().all(|id| seen.insert(*id)) {
        return Err(AppError::validation("tags must not repeat"));
    }

    if body.ingredients.is_empty() {
        return Err(AppError::validation("at least one ingredient is required"));
    }
    let mut seen = HashSet::new();
    let mut ingredient_ids = Vec::with_capacity(body.ingredients.len());
    let mut amounts = Vec::with_capacity(body.ingredients.len());
    for item in &body.ingredients {
        if !seen.insert(item.id) {
            return Err(AppError::validation("ingredients must not repeat"));
        }
        ingredient_ids.push(item.id);
        amounts.push(small_positive(item.amount, "amount")?);
    }

    Ok(ValidatedRecipe {
        name: name.to_string(),
        text: body.text.clone(),
        cooking_time,
        tag_ids: body.tags.clone(),
        ingredient_ids,
        amounts,
    })
}

async fn ensure_references_exist(st: &AppState, v: &ValidatedRecipe) -> AppResult<()> {
    if tags::repo::count_existing(&st.db, &v.tag_ids).await? != v.tag_ids.len() as i64 {
        return Err(AppError::validation("unknown tag id"));
    }
    if ingredients::repo::count_existing(&st.db, &v.ingredient_ids).await?
        != v.ingredient_ids.len() as i64
    {
        return Err(AppError::validation("unknown ingredient id"));
    }
    Ok(())
}

pub async fn load_details(
    st: &AppState,
    viewer: Option<Uuid>,
    row: RecipeRow,
) -> AppResult<RecipeDetails> {
    let author = users::repo::find_profile(&st.db, viewer, row.author_id)
        .await?
        .context("recipe author missing")?;
    let tags = tags::repo::list_for_recipe(&st.db, row.id).await?;
    let ingredients = repo::ingredients_for(&st.db, row.id).await?;
    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(user_id) => repo::flags(&st.db, user_id, row.id).await?,
        None => (false, false),
    };
    let image = st.image_url(row.image.as_deref()).await?;

    Ok(RecipeDetails {
        id: row.id,
        tags,
        author,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: row.name,
        image,
        text: row.text,
        cooking_time: row.cooking_time,
    })
}

pub async fn list_recipes(
    st: &AppState,
    viewer: Option<Uuid>,
    q: &RecipeQuery,
) -> AppResult<Page<RecipeDetails>> {
    // collection filters only make sense for a known caller
    let filter = RecipeFilter {
        author: q.author,
        tags: q.tags.clone(),
        favorited_by: viewer.filter(|_| q.favorited_only()),
        in_cart_of: viewer.filter(|_| q.in_cart_only()),
    };
    let p = q.page_params();
    let count = repo::count(&st.db, &filter).await?;
    let rows = repo::list(&st.db, &filter, p.limit(), p.offset()).await?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        results.push(load_details(st, viewer, row).await?);
    }
    Ok(Page::new(&p, count, results))
}

pub async fn get_recipe(st: &AppState, viewer: Option<Uuid>, id: i64) -> AppResult<RecipeDetails> {
    let row = repo::find(&st.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe"))?;
    load_details(st, viewer, row).await
}

async fn load_actor(st: &AppState, user_id: Uuid) -> AppResult<User> {
    User::find_by_id(&st.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

pub async fn create_recipe(
    st: &AppState,
    author_id: Uuid,
    body: RecipeWrite,
) -> AppResult<RecipeDetails> {
    let v = validate_recipe(&body)?;
    let image = body
        .image
        .as_deref()
        .ok_or_else(|| AppError::validation("image is required"))
        .and_then(decode_data_url)?;
    ensure_references_exist(st, &v).await?;

    let image_key = upload_recipe_image(st, author_id, image).await?;

    let mut tx = st.db.begin().await.context("begin tx")?;
    let id = match repo::insert_tx(&mut tx, author_id, &v, Some(&image_key)).await {
        Ok(id) => id,
        Err(e) => {
            discard_image(st, &image_key).await;
            return Err(e);
        }
    };
    tx.commit().await.context("commit tx")?;
    info!(recipe_id = id, %author_id, "recipe created");

    get_recipe(st, Some(author_id), id).await
}

pub async fn update_recipe(
    st: &AppState,
    actor_id: Uuid,
    id: i64,
    body: RecipeWrite,
) -> AppResult<RecipeDetails> {
    let actor = load_actor(st, actor_id).await?;
    let existing = repo::find(&st.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe"))?;
    ensure_author_or_staff(&actor, existing.author_id)?;

    let v = validate_recipe(&body)?;
    let image = body.image.as_deref().map(decode_data_url).transpose()?;
    ensure_references_exist(st, &v).await?;

    let new_key = match image {
        Some(img) => Some(upload_recipe_image(st, existing.author_id, img).await?),
        None => None,
    };

    let mut tx = st.db.begin().await.context("begin tx")?;
    if let Err(e) = repo::update_tx(&mut tx, id, &v, new_key.as_deref()).await {
        if let Some(key) = &new_key {
            discard_image(st, key).await;
        }
        return Err(e);
    }
    tx.commit().await.context("commit tx")?;

    if let (Some(_), Some(old)) = (&new_key, &existing.image) {
        discard_image(st, old).await;
    }
    info!(recipe_id = id, %actor_id, "recipe updated");

    get_recipe(st, Some(actor_id), id).await
}

pub async fn delete_recipe(st: &AppState, actor_id: Uuid, id: i64) -> AppResult<()> {
    let actor = load_actor(st, actor_id).await?;
    let existing = repo::find(&st.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe"))?;
    ensure_author_or_staff(&actor, existing.author_id)?;

    repo::delete(&st.db, id).await?;
    if let Some(key) = &existing.image {
        discard_image(st, key).await;
    }
    info!(recipe_id = id, %actor_id, "recipe deleted");
    Ok(())
}
