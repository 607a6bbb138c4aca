//! User entity and repository
//!
//! Accounts for students, organizers and admins, including the hashed
//! one-time tokens used for email verification and password reset.

use chrono::{DateTime, Utc};
use seams_core::Role;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Backend, StoreError};

/// User entity from database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub usn: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<i32>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub credits: i64,
    pub is_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub reset_token_hash: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a new user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub usn: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<i32>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
}

/// DTO for updating a user. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub usn: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<i32>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

/// User response DTO (excludes credentials and token hashes)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[schema(example = "asha@college.edu")]
    pub email: String,
    #[schema(value_type = String, example = "student")]
    pub role: Role,
    #[schema(example = "1XX21CS001")]
    pub usn: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<i32>,
    pub department: Option<String>,
    pub phone: Option<String>,
    /// Total credit points earned
    pub credits: i64,
    pub is_verified: bool,
    #[schema(value_type = String, example = "2026-01-08T10:00:00Z")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            usn: user.usn,
            branch: user.branch,
            semester: user.semester,
            department: user.department,
            phone: user.phone,
            credits: user.credits,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    backend: Backend,
}

impl UserRepository {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Create a new user. Duplicate email or USN is a `Conflict`.
    pub async fn create(&self, input: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            password_hash: input.password_hash,
            role: input.role,
            usn: input.usn,
            branch: input.branch,
            semester: input.semester,
            department: input.department,
            phone: input.phone,
            credits: 0,
            is_verified: input.is_verified,
            verification_token_hash: input.verification_token_hash,
            verification_expires_at: input.verification_expires_at,
            reset_token_hash: None,
            reset_expires_at: None,
            created_at: now,
            updated_at: now,
        };

        match &self.backend {
            Backend::Postgres(pool) => {
                let created = sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (id, name, email, password_hash, role, usn, branch, semester,
                                       department, phone, is_verified, verification_token_hash,
                                       verification_expires_at, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
                    RETURNING *
                    "#,
                )
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .bind(&user.usn)
                .bind(&user.branch)
                .bind(user.semester)
                .bind(&user.department)
                .bind(&user.phone)
                .bind(user.is_verified)
                .bind(&user.verification_token_hash)
                .bind(user.verification_expires_at)
                .bind(now)
                .fetch_one(pool)
                .await?;
                Ok(created)
            }
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                tables.check_user_unique(Some(&user.email), user.usn.as_deref(), None)?;
                tables.users.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, User>(
                "SELECT * FROM users WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await?),
            Backend::Memory(store) => Ok(store.lock()?.users.get(&id).cloned()),
        }
    }

    /// Find user by (already normalised) email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, User>(
                "SELECT * FROM users WHERE email = $1",
            )
            .bind(email)
            .fetch_optional(pool)
            .await?),
            Backend::Memory(store) => Ok(store
                .lock()?
                .users
                .values()
                .find(|u| u.email == email)
                .cloned()),
        }
    }

    /// Find user by email or USN
    pub async fn find_by_email_or_usn(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, User>(
                "SELECT * FROM users WHERE email = $1 OR usn = $1 LIMIT 1",
            )
            .bind(identifier)
            .fetch_optional(pool)
            .await?),
            Backend::Memory(store) => Ok(store
                .lock()?
                .users
                .values()
                .find(|u| u.email == identifier || u.usn.as_deref() == Some(identifier))
                .cloned()),
        }
    }

    /// List users, newest first, optionally filtered by role
    pub async fn list(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, User>(
                r#"
                SELECT * FROM users
                WHERE ($1::TEXT IS NULL OR role = $1)
                ORDER BY created_at DESC
                "#,
            )
            .bind(role.map(|r| r.as_str()))
            .fetch_all(pool)
            .await?),
            Backend::Memory(store) => {
                let tables = store.lock()?;
                let mut users: Vec<User> = tables
                    .users
                    .values()
                    .filter(|u| role.map_or(true, |r| u.role == r))
                    .cloned()
                    .collect();
                users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(users)
            }
        }
    }

    /// Apply a partial update. Returns `None` if the user does not exist.
    pub async fn update(&self, id: Uuid, input: UserUpdate) -> Result<Option<User>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, User>(
                r#"
                UPDATE users SET
                    name = COALESCE($2, name),
                    email = COALESCE($3, email),
                    role = COALESCE($4, role),
                    usn = COALESCE($5, usn),
                    branch = COALESCE($6, branch),
                    semester = COALESCE($7, semester),
                    department = COALESCE($8, department),
                    phone = COALESCE($9, phone),
                    password_hash = COALESCE($10, password_hash),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(input.role.map(|r| r.as_str()))
            .bind(&input.usn)
            .bind(&input.branch)
            .bind(input.semester)
            .bind(&input.department)
            .bind(&input.phone)
            .bind(&input.password_hash)
            .fetch_optional(pool)
            .await?),
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                tables.check_user_unique(input.email.as_deref(), input.usn.as_deref(), Some(id))?;
                let Some(user) = tables.users.get_mut(&id) else {
                    return Ok(None);
                };
                if let Some(name) = input.name {
                    user.name = name;
                }
                if let Some(email) = input.email {
                    user.email = email;
                }
                if let Some(role) = input.role {
                    user.role = role;
                }
                if input.usn.is_some() {
                    user.usn = input.usn;
                }
                if input.branch.is_some() {
                    user.branch = input.branch;
                }
                if input.semester.is_some() {
                    user.semester = input.semester;
                }
                if input.department.is_some() {
                    user.department = input.department;
                }
                if input.phone.is_some() {
                    user.phone = input.phone;
                }
                if let Some(hash) = input.password_hash {
                    user.password_hash = hash;
                }
                user.updated_at = Utc::now();
                Ok(Some(user.clone()))
            }
        }
    }

    /// Delete a user. Their registrations stop holding seats and their
    /// events go with them.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                sqlx::query(
                    r#"
                    UPDATE events SET registered_count = registered_count - 1, updated_at = NOW()
                    WHERE id IN (
                        SELECT event_id FROM registrations
                        WHERE student_id = $1 AND status <> 'rejected'
                    )
                    "#,
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;
                let result = sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(result.rows_affected() > 0)
            }
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                if tables.users.remove(&id).is_none() {
                    return Ok(false);
                }
                let seats: Vec<Uuid> = tables
                    .registrations
                    .values()
                    .filter(|r| r.student_id == id && r.status.holds_seat())
                    .map(|r| r.event_id)
                    .collect();
                for event_id in seats {
                    if let Some(event) = tables.events.get_mut(&event_id) {
                        event.registered_count -= 1;
                    }
                }
                tables.registrations.retain(|_, r| r.student_id != id);
                tables.credit_ledger.retain(|c| c.student_id != id);
                let owned: Vec<Uuid> = tables
                    .events
                    .values()
                    .filter(|e| e.organizer_id == id)
                    .map(|e| e.id)
                    .collect();
                for event_id in owned {
                    tables.delete_event(event_id);
                }
                Ok(true)
            }
        }
    }

    /// Find the user holding an unexpired email verification token
    pub async fn find_by_verification_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, User>(
                r#"
                SELECT * FROM users
                WHERE verification_token_hash = $1 AND verification_expires_at > $2
                "#,
            )
            .bind(token_hash)
            .bind(now)
            .fetch_optional(pool)
            .await?),
            Backend::Memory(store) => Ok(store
                .lock()?
                .users
                .values()
                .find(|u| {
                    u.verification_token_hash.as_deref() == Some(token_hash)
                        && u.verification_expires_at.is_some_and(|exp| exp > now)
                })
                .cloned()),
        }
    }

    /// Mark the email verified and consume the verification token
    pub async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query(
                    r#"
                    UPDATE users SET is_verified = TRUE, verification_token_hash = NULL,
                                     verification_expires_at = NULL, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .execute(pool)
                .await?;
            }
            Backend::Memory(store) => {
                if let Some(user) = store.lock()?.users.get_mut(&id) {
                    user.is_verified = true;
                    user.verification_token_hash = None;
                    user.verification_expires_at = None;
                    user.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    /// Store (or with `None`, clear) a password reset token hash
    pub async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<(&str, DateTime<Utc>)>,
    ) -> Result<(), StoreError> {
        let (hash, expires_at) = match token {
            Some((hash, expires_at)) => (Some(hash), Some(expires_at)),
            None => (None, None),
        };
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query(
                    r#"
                    UPDATE users SET reset_token_hash = $2, reset_expires_at = $3, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(hash)
                .bind(expires_at)
                .execute(pool)
                .await?;
            }
            Backend::Memory(store) => {
                if let Some(user) = store.lock()?.users.get_mut(&id) {
                    user.reset_token_hash = hash.map(str::to_string);
                    user.reset_expires_at = expires_at;
                    user.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    /// Consume an unexpired reset token and set the new password hash.
    ///
    /// Returns the updated user, or `None` if no such token is live.
    pub async fn reset_password(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        match &self.backend {
            Backend::Postgres(pool) => Ok(sqlx::query_as::<_, User>(
                r#"
                UPDATE users SET password_hash = $2, reset_token_hash = NULL,
                                 reset_expires_at = NULL, updated_at = NOW()
                WHERE reset_token_hash = $1 AND reset_expires_at > $3
                RETURNING *
                "#,
            )
            .bind(token_hash)
            .bind(password_hash)
            .bind(now)
            .fetch_optional(pool)
            .await?),
            Backend::Memory(store) => {
                let mut tables = store.lock()?;
                let user = tables.users.values_mut().find(|u| {
                    u.reset_token_hash.as_deref() == Some(token_hash)
                        && u.reset_expires_at.is_some_and(|exp| exp > now)
                });
                Ok(user.map(|u| {
                    u.password_hash = password_hash.to_string();
                    u.reset_token_hash = None;
                    u.reset_expires_at = None;
                    u.updated_at = now;
                    u.clone()
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Duration;

    fn new_user(email: &str, usn: Option<&str>) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
            usn: usn.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let users = Database::in_memory().users();
        users.create(new_user("a@x.edu", None)).await.unwrap();
        let err = users.create(new_user("a@x.edu", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(c) if c == "users_email_key"));
    }

    #[tokio::test]
    async fn test_duplicate_usn_conflicts() {
        let users = Database::in_memory().users();
        users.create(new_user("a@x.edu", Some("U1"))).await.unwrap();
        let err = users.create(new_user("b@x.edu", Some("U1"))).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(c) if c == "users_usn_key"));
    }

    #[tokio::test]
    async fn test_find_by_email_or_usn() {
        let users = Database::in_memory().users();
        let created = users.create(new_user("a@x.edu", Some("U1"))).await.unwrap();
        let by_usn = users.find_by_email_or_usn("U1").await.unwrap().unwrap();
        assert_eq!(by_usn.id, created.id);
        let by_email = users.find_by_email_or_usn("a@x.edu").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert!(users.find_by_email_or_usn("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verification_token_expiry() {
        let users = Database::in_memory().users();
        let now = Utc::now();
        let mut input = new_user("a@x.edu", None);
        input.verification_token_hash = Some("h".into());
        input.verification_expires_at = Some(now + Duration::hours(24));
        let created = users.create(input).await.unwrap();

        assert!(users
            .find_by_verification_hash("h", now + Duration::hours(25))
            .await
            .unwrap()
            .is_none());
        let found = users.find_by_verification_hash("h", now).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        users.mark_verified(created.id).await.unwrap();
        let verified = users.find_by_id(created.id).await.unwrap().unwrap();
        assert!(verified.is_verified);
        assert!(users.find_by_verification_hash("h", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_password_consumes_token() {
        let users = Database::in_memory().users();
        let now = Utc::now();
        let created = users.create(new_user("a@x.edu", None)).await.unwrap();
        users
            .set_reset_token(created.id, Some(("r", now + Duration::minutes(10))))
            .await
            .unwrap();

        let updated = users.reset_password("r", "new-hash", now).await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "new-hash");
        assert!(users.reset_password("r", "again", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_partial() {
        let users = Database::in_memory().users();
        let created = users.create(new_user("a@x.edu", None)).await.unwrap();
        let updated = users
            .update(
                created.id,
                UserUpdate {
                    role: Some(Role::Coordinator),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.role, Role::Coordinator);
        assert_eq!(updated.email, "a@x.edu");
        assert!(users
            .update(Uuid::new_v4(), UserUpdate::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_role() {
        let users = Database::in_memory().users();
        users.create(new_user("s@x.edu", None)).await.unwrap();
        let mut admin = new_user("a@x.edu", None);
        admin.role = Role::Admin;
        users.create(admin).await.unwrap();

        assert_eq!(users.list(None).await.unwrap().len(), 2);
        let admins = users.list(Some(Role::Admin)).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].email, "a@x.edu");
    }
}
