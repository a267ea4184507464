//! Account scope lookups for records a filter may reference.

use std::collections::HashSet;
use std::sync::Arc;

use bubbles_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::filter::ResourceKind;
use crate::entities::{bucket, tag, user};

/// Repository answering "does this record belong to the user's account?".
#[derive(Clone)]
pub struct ResourceRepository {
    db: Arc<DatabaseConnection>,
}

impl ResourceRepository {
    /// Create a new resource repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Account of a user, if the user exists.
    pub async fn account_of(&self, user_id: &str) -> AppResult<Option<String>> {
        let user = user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(user.map(|u| u.account_id))
    }

    /// IDs of the given kind that exist within the account.
    pub async fn ids_in_account(
        &self,
        account_id: &str,
        kind: ResourceKind,
        ids: &[String],
    ) -> AppResult<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let db = self.db.as_ref();
        let ids = ids.iter().cloned();
        let found: HashSet<String> = match kind {
            ResourceKind::Bucket => bucket::Entity::find()
                .filter(bucket::Column::AccountId.eq(account_id))
                .filter(bucket::Column::Id.is_in(ids))
                .all(db)
                .await
                .map(|rows| rows.into_iter().map(|row| row.id).collect()),
            ResourceKind::Tag => tag::Entity::find()
                .filter(tag::Column::AccountId.eq(account_id))
                .filter(tag::Column::Id.is_in(ids))
                .all(db)
                .await
                .map(|rows| rows.into_iter().map(|row| row.id).collect()),
            ResourceKind::Assignee => user::Entity::find()
                .filter(user::Column::AccountId.eq(account_id))
                .filter(user::Column::Id.is_in(ids))
                .all(db)
                .await
                .map(|rows| rows.into_iter().map(|row| row.id).collect()),
        }
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(found)
    }
}
