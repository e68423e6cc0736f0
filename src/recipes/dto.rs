use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::pagination::PageParams;
use crate::tags::repo::Tag;
use crate::users::dto::UserProfile;

/// Minimal recipe card used by toggles and subscription previews.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i16,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeIngredientOut {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

#[derive(Debug, Serialize)]
pub struct RecipeDetails {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredientOut>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i64,
}

/// Body of `POST /recipes` and `PATCH /recipes/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeWrite {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<i64>,
    #[serde(default)]
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
}

/// Recipe list query. `tags` may repeat: `?tags=lunch&tags=dinner`.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub author: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

fn truthy(v: Option<&str>) -> bool {
    matches!(v, Some("1") | Some("true") | Some("True"))
}

impl RecipeQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams::new(self.page, self.limit)
    }

    pub fn favorited_only(&self) -> bool {
        truthy(self.is_favorited.as_deref())
    }

    pub fn in_cart_only(&self) -> bool {
        truthy(self.is_in_shopping_cart.as_deref())
    }
}
