//! Per-user recipe collections (favorites, shopping cart) and the
//! shopping list built from the cart.

pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod repo;
pub mod services;
pub mod shopping_list;

use crate::state::AppState;
use axum::Router;

/// Which per-user collection a toggle targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Favorites,
    Cart,
}

impl CollectionKind {
    pub(crate) fn table(self) -> &'static str {
        match self {
            CollectionKind::Favorites => "favorites",
            CollectionKind::Cart => "cart_entries",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CollectionKind::Favorites => "favorites",
            CollectionKind::Cart => "shopping cart",
        }
    }
}

pub fn router() -> Router<AppState> {
    handlers::collection_routes()
}
