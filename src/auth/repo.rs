use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::repo_types::{NewUser, ProfileChanges, User, UserFilter};
use crate::db::StoreResult;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find(&self, filter: &UserFilter) -> StoreResult<Option<User>>;

    async fn create(&self, user: NewUser) -> StoreResult<User>;

    /// Returns the number of rows touched.
    async fn update_profile(&self, id: i64, changes: ProfileChanges) -> StoreResult<u64>;

    async fn update_password(&self, id: i64, password_hash: &str) -> StoreResult<u64>;

    /// Sets the verification timestamp unless one is already stored.
    async fn mark_email_verified(&self, id: i64, at: OffsetDateTime) -> StoreResult<u64>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find(&self, filter: &UserFilter) -> StoreResult<Option<User>> {
        let user = match filter {
            UserFilter::Id(id) => {
                sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, name, email, password, mobile, gender, profile_picture,
                           email_verified, created_at, updated_at
                    FROM users
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(&self.db)
                .await?
            }
            UserFilter::Email(email) => {
                sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, name, email, password, mobile, gender, profile_picture,
                           email_verified, created_at, updated_at
                    FROM users
                    WHERE email = $1
                    "#,
                )
                .bind(email)
                .fetch_optional(&self.db)
                .await?
            }
        };
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, mobile, gender, profile_picture)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, password, mobile, gender, profile_picture,
                      email_verified, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.mobile)
        .bind(&user.gender)
        .bind(&user.profile_picture)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_profile(&self, id: i64, changes: ProfileChanges) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2,
                email = $3,
                mobile = $4,
                gender = $5,
                profile_picture = COALESCE($6, profile_picture),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.mobile)
        .bind(&changes.gender)
        .bind(&changes.profile_picture)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"UPDATE users SET password = $2, updated_at = now() WHERE id = $1"#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_email_verified(&self, id: i64, at: OffsetDateTime) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = $2, updated_at = now()
            WHERE id = $1 AND email_verified IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
