use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::error::{AppError, AppResult};

/// Only the author or a staff member may change or delete a recipe.
pub fn ensure_author_or_staff(actor: &User, author_id: Uuid) -> AppResult<()> {
    if actor.is_staff || actor.id == author_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn user(is_staff: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: "u@example.com".into(),
            username: "u".into(),
            first_name: "U".into(),
            last_name: String::new(),
            password_hash: String::new(),
            is_staff,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn author_may_modify() {
        let author = user(false);
        assert!(ensure_author_or_staff(&author, author.id).is_ok());
    }

    #[test]
    fn staff_may_modify_anything() {
        assert!(ensure_author_or_staff(&user(true), Uuid::new_v4()).is_ok());
    }

    #[test]
    fn others_are_forbidden() {
        let err = ensure_author_or_staff(&user(false), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }
}
