use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::repo::{
    CartLine, CartOwner, CartSnapshot, CollectionRepo, InsertOutcome, RecipeSummaryRow,
};
use super::CollectionKind;

struct StoredRecipe {
    summary: RecipeSummaryRow,
    ingredients: Vec<(String, String, i16)>,
}

#[derive(Default)]
struct Inner {
    recipes: HashMap<i64, StoredRecipe>,
    owners: HashMap<Uuid, CartOwner>,
    entries: HashSet<(CollectionKind, Uuid, i64)>,
    /// Recipes deleted right before the next insert that targets them.
    vanishing: HashSet<i64>,
}

/// In-memory stand-in for the collection tables.
#[derive(Default)]
pub struct MemoryCollections {
    inner: Mutex<Inner>,
}

impl MemoryCollections {
    pub fn add_recipe(&self, id: i64, name: &str, ingredients: &[(&str, &str, i16)]) {
        let recipe = StoredRecipe {
            summary: RecipeSummaryRow {
                id,
                name: name.to_string(),
                image: None,
                cooking_time: 10,
            },
            ingredients: ingredients
                .iter()
                .map(|(n, u, a)| (n.to_string(), u.to_string(), *a))
                .collect(),
        };
        self.inner.lock().unwrap().recipes.insert(id, recipe);
    }

    pub fn add_owner(&self, user_id: Uuid, username: &str, first_name: &str, last_name: &str) {
        self.inner.lock().unwrap().owners.insert(
            user_id,
            CartOwner {
                username: username.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
            },
        );
    }

    /// Makes the recipe disappear after lookup, before the entry is written.
    pub fn delete_before_insert(&self, recipe_id: i64) {
        self.inner.lock().unwrap().vanishing.insert(recipe_id);
    }

    pub fn entry_count(&self, kind: CollectionKind, user_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|(k, u, _)| *k == kind && *u == user_id)
            .count()
    }
}

#[async_trait]
impl CollectionRepo for MemoryCollections {
    async fn find_recipe(&self, recipe_id: i64) -> anyhow::Result<Option<RecipeSummaryRow>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.recipes.get(&recipe_id).map(|r| r.summary.clone()))
    }

    async fn insert_entry(
        &self,
        kind: CollectionKind,
        user_id: Uuid,
        recipe_id: i64,
    ) -> anyhow::Result<InsertOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if inner.vanishing.remove(&recipe_id) {
            inner.recipes.remove(&recipe_id);
        }
        if !inner.recipes.contains_key(&recipe_id) {
            return Ok(InsertOutcome::MissingRecipe);
        }
        if inner.entries.insert((kind, user_id, recipe_id)) {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Duplicate)
        }
    }

    async fn delete_entry(
        &self,
        kind: CollectionKind,
        user_id: Uuid,
        recipe_id: i64,
    ) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.entries.remove(&(kind, user_id, recipe_id)) as u64)
    }

    async fn cart_snapshot(&self, user_id: Uuid) -> anyhow::Result<CartSnapshot> {
        let inner = self.inner.lock().unwrap();
        let cart: Vec<i64> = inner
            .entries
            .iter()
            .filter(|(k, u, _)| *k == CollectionKind::Cart && *u == user_id)
            .map(|(_, _, r)| *r)
            .collect();
        let lines = cart
            .iter()
            .filter_map(|id| inner.recipes.get(id))
            .flat_map(|r| {
                r.ingredients.iter().map(|(n, u, a)| CartLine {
                    name: n.clone(),
                    measurement_unit: u.clone(),
                    amount: *a,
                })
            })
            .collect();
        Ok(CartSnapshot {
            owner: inner.owners.get(&user_id).cloned(),
            entries: cart.len() as i64,
            lines,
        })
    }
}
