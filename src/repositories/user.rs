//! User repository (read-only)

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::user::{self, Entity as User};

/// Repository for user lookups
pub struct UserRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Active user with the given login email
    pub async fn find_active_by_email(
        &self,
        email: &str,
    ) -> Result<Option<user::Model>, RepositoryError> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .filter(user::Column::IsActive.eq(true))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Users among `ids` that belong to `company_id`
    pub async fn find_in_company(
        &self,
        ids: &[Uuid],
        company_id: Uuid,
    ) -> Result<Vec<user::Model>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        User::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .filter(user::Column::CompanyId.eq(company_id))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
