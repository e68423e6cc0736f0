use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::CollectionKind;
use crate::error::{db_error_code, FOREIGN_KEY_VIOLATION};

/// The columns a collection toggle echoes back to the client.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeSummaryRow {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
    /// The recipe vanished between lookup and insert.
    MissingRecipe,
}

#[derive(Debug, Clone, FromRow)]
pub struct CartOwner {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// One ingredient row of one recipe sitting in a cart.
#[derive(Debug, Clone, FromRow)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

/// Everything the shopping list needs, read from one snapshot.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    pub owner: Option<CartOwner>,
    pub entries: i64,
    pub lines: Vec<CartLine>,
}

#[async_trait]
pub trait CollectionRepo: Send + Sync {
    async fn find_recipe(&self, recipe_id: i64) -> anyhow::Result<Option<RecipeSummaryRow>>;

    async fn insert_entry(
        &self,
        kind: CollectionKind,
        user_id: Uuid,
        recipe_id: i64,
    ) -> anyhow::Result<InsertOutcome>;

    /// Returns the number of deleted rows (0 or 1).
    async fn delete_entry(
        &self,
        kind: CollectionKind,
        user_id: Uuid,
        recipe_id: i64,
    ) -> anyhow::Result<u64>;

    async fn cart_snapshot(&self, user_id: Uuid) -> anyhow::Result<CartSnapshot>;
}

#[derive(Clone)]
pub struct PgCollectionRepo {
    db: PgPool,
}

impl PgCollectionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CollectionRepo for PgCollectionRepo {
    async fn find_recipe(&self, recipe_id: i64) -> anyhow::Result<Option<RecipeSummaryRow>> {
        let row = sqlx::query_as::<_, RecipeSummaryRow>(
            r#"
            SELECT id, name, image, cooking_time
              FROM recipes
             WHERE id = $1
            "#,
        )
        .bind(recipe_id)
        .fetch_optional(&self.db)
        .await
        .context("find recipe")?;
        Ok(row)
    }

    async fn insert_entry(
        &self,
        kind: CollectionKind,
        user_id: Uuid,
        recipe_id: i64,
    ) -> anyhow::Result<InsertOutcome> {
        // The unique (user_id, recipe_id) constraint decides duplicates
        let sql = format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, recipe_id) DO NOTHING",
            kind.table()
        );
        let res = sqlx::query(&sql)
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.db)
            .await;

        match res {
            Ok(done) if done.rows_affected() == 1 => Ok(InsertOutcome::Inserted),
            Ok(_) => Ok(InsertOutcome::Duplicate),
            Err(e) if db_error_code(&e).as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                Ok(InsertOutcome::MissingRecipe)
            }
            Err(e) => Err(e).with_context(|| format!("insert into {}", kind.table())),
        }
    }

    async fn delete_entry(
        &self,
        kind: CollectionKind,
        user_id: Uuid,
        recipe_id: i64,
    ) -> anyhow::Result<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            kind.table()
        );
        let done = sqlx::query(&sql)
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.db)
            .await
            .with_context(|| format!("delete from {}", kind.table()))?;
        Ok(done.rows_affected())
    }

    async fn cart_snapshot(&self, user_id: Uuid) -> anyhow::Result<CartSnapshot> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .context("set snapshot isolation")?;

        let owner = sqlx::query_as::<_, CartOwner>(
            r#"
            SELECT username, first_name, last_name
              FROM users
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("load cart owner")?;

        let entries: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM cart_entries WHERE user_id = $1"#)
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await
                .context("count cart entries")?;

        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT i.name, i.measurement_unit, ri.amount
              FROM cart_entries c
              JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
              JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE c.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .context("load cart ingredients")?;

        tx.commit().await.context("commit tx")?;

        Ok(CartSnapshot {
            owner,
            entries,
            lines,
        })
    }
}
