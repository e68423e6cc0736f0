use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub author_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i16,
}

/// A recipe payload that passed validation, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i16,
    pub tag_ids: Vec<i64>,
    /// Parallel to `amounts`.
    pub ingredient_ids: Vec<i64>,
    pub amounts: Vec<i16>,
}

/// Narrowing applied to the recipe list.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub favorited_by: Option<Uuid>,
    pub in_cart_of: Option<Uuid>,
}
