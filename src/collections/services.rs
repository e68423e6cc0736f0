use time::Date;
use tracing::{debug, info};
use uuid::Uuid;

use super::repo::InsertOutcome;
use super::shopping_list::{aggregate, attachment_name, display_name, render};
use super::CollectionKind;
use crate::error::{AppError, AppResult};
use crate::recipes::dto::RecipeSummary;
use crate::recipes::services::summarize;
use crate::state::AppState;

/// Rendered shopping list ready to be sent as an attachment.
#[derive(Debug)]
pub struct ShoppingListFile {
    pub filename: String,
    pub body: String,
    pub lines: usize,
}

/// Puts a recipe into one of the caller's collections.
///
/// A second add of the same pair is reported as `Conflict`.
pub async fn add_to_collection(
    st: &AppState,
    user_id: Uuid,
    recipe_id: i64,
    kind: CollectionKind,
) -> AppResult<RecipeSummary> {
    let recipe = st
        .collections
        .find_recipe(recipe_id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe"))?;

    match st.collections.insert_entry(kind, user_id, recipe_id).await? {
        InsertOutcome::Inserted => {}
        InsertOutcome::Duplicate => {
            return Err(AppError::Conflict(format!(
                "Recipe is already in {}",
                kind.label()
            )))
        }
        InsertOutcome::MissingRecipe => return Err(AppError::not_found("Recipe")),
    }
    info!(%user_id, recipe_id, collection = kind.label(), "recipe added");

    Ok(summarize(st, recipe).await?)
}

/// Drops a recipe from a collection. Missing entries are not an error.
pub async fn remove_from_collection(
    st: &AppState,
    user_id: Uuid,
    recipe_id: i64,
    kind: CollectionKind,
) -> AppResult<()> {
    let removed = st.collections.delete_entry(kind, user_id, recipe_id).await?;
    debug!(%user_id, recipe_id, collection = kind.label(), removed, "recipe removed");
    Ok(())
}

pub async fn build_shopping_list(
    st: &AppState,
    user_id: Uuid,
    today: Date,
) -> AppResult<ShoppingListFile> {
    let snapshot = st.collections.cart_snapshot(user_id).await?;
    let owner = snapshot
        .owner
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    if snapshot.entries == 0 {
        return Err(AppError::EmptyCart);
    }

    let items = aggregate(snapshot.lines);
    let body = render(
        &display_name(&owner),
        today,
        &st.config.shopping_list_brand,
        &items,
    );
    Ok(ShoppingListFile {
        filename: attachment_name(&owner.username),
        body,
        lines: items.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::memory::MemoryCollections;
    use std::sync::Arc;
    use time::macros::date;

    fn setup() -> (AppState, Arc<MemoryCollections>, Uuid) {
        let mem = Arc::new(MemoryCollections::default());
        mem.add_recipe(1, "Bread", &[("Flour", "g", 200)]);
        mem.add_recipe(2, "Pretzel", &[("Flour", "g", 150), ("Salt", "tsp", 5)]);
        let user = Uuid::new_v4();
        mem.add_owner(user, "baker", "Olga", "Ivanova");
        (AppState::fake_with(mem.clone()), mem, user)
    }

    #[tokio::test]
    async fn second_add_is_a_conflict() {
        let (st, mem, user) = setup();
        for kind in [CollectionKind::Favorites, CollectionKind::Cart] {
            let summary = add_to_collection(&st, user, 1, kind).await.expect("first add");
            assert_eq!(summary.id, 1);
            assert_eq!(summary.name, "Bread");
            assert_eq!(summary.image, None);

            let err = add_to_collection(&st, user, 1, kind).await.unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
            assert_eq!(mem.entry_count(kind, user), 1);
        }
    }

    #[tokio::test]
    async fn collections_are_independent() {
        let (st, mem, user) = setup();
        add_to_collection(&st, user, 1, CollectionKind::Favorites).await.unwrap();
        add_to_collection(&st, user, 1, CollectionKind::Cart).await.unwrap();
        remove_from_collection(&st, user, 1, CollectionKind::Favorites).await.unwrap();
        assert_eq!(mem.entry_count(CollectionKind::Favorites, user), 0);
        assert_eq!(mem.entry_count(CollectionKind::Cart, user), 1);
    }

    #[tokio::test]
    async fn add_unknown_recipe_is_not_found() {
        let (st, mem, user) = setup();
        let err = add_to_collection(&st, user, 999, CollectionKind::Cart).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(mem.entry_count(CollectionKind::Cart, user), 0);
    }

    #[tokio::test]
    async fn recipe_deleted_during_add_is_not_found() {
        let (st, mem, user) = setup();
        mem.delete_before_insert(2);
        let err = add_to_collection(&st, user, 2, CollectionKind::Favorites)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.to_string(), "Recipe not found");
        assert_eq!(mem.entry_count(CollectionKind::Favorites, user), 0);

        let err = add_to_collection(&st, user, 2, CollectionKind::Cart).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_is_repeatable() {
        let (st, mem, user) = setup();
        add_to_collection(&st, user, 2, CollectionKind::Favorites).await.unwrap();
        for _ in 0..3 {
            remove_from_collection(&st, user, 2, CollectionKind::Favorites)
                .await
                .expect("remove always succeeds");
        }
        remove_from_collection(&st, user, 999, CollectionKind::Favorites).await.unwrap();
        assert_eq!(mem.entry_count(CollectionKind::Favorites, user), 0);
    }

    #[tokio::test]
    async fn empty_cart_cannot_be_downloaded() {
        let (st, _, user) = setup();
        let err = build_shopping_list(&st, user, date!(2024 - 01 - 01)).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyCart));

        // favorites do not count towards the cart
        add_to_collection(&st, user, 1, CollectionKind::Favorites).await.unwrap();
        let err = build_shopping_list(&st, user, date!(2024 - 01 - 01)).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyCart));
    }

    #[tokio::test]
    async fn shopping_list_sums_cart_recipes() {
        let (st, _, user) = setup();
        add_to_collection(&st, user, 1, CollectionKind::Cart).await.unwrap();
        add_to_collection(&st, user, 2, CollectionKind::Cart).await.unwrap();

        let file = build_shopping_list(&st, user, date!(2024 - 05 - 09)).await.unwrap();
        assert_eq!(file.filename, "baker_shopping_list.txt");
        assert_eq!(file.lines, 2);
        assert_eq!(
            file.body,
            "Shopping list for: Olga Ivanova\n\nDate: 09.05.2024\n\
             + Flour (g) - 350\n+ Salt (tsp) - 5\n\nFoodgram (2024)"
        );
    }

    #[tokio::test]
    async fn removing_from_cart_shrinks_the_list() {
        let (st, _, user) = setup();
        add_to_collection(&st, user, 1, CollectionKind::Cart).await.unwrap();
        add_to_collection(&st, user, 2, CollectionKind::Cart).await.unwrap();
        remove_from_collection(&st, user, 2, CollectionKind::Cart).await.unwrap();

        let file = build_shopping_list(&st, user, date!(2024 - 05 - 09)).await.unwrap();
        assert_eq!(file.lines, 1);
        assert!(file.body.contains("+ Flour (g) - 200"));
        assert!(!file.body.contains("Salt"));
    }
}
