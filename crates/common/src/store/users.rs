//! `users` table access.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, StoreError};
use crate::identity::{Role, User, VerifiedIdentity};

const USER_COLUMNS: &str = "id, email, name, picture, google_id, role, created_at, updated_at, \
                            last_login_at, deleted_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        picture: row.get("picture")?,
        google_id: row.get("google_id")?,
        role: row.get("role")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        last_login_at: row.get("last_login_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

impl Database {
    /// Look up a user by id, including soft-deleted users.
    pub fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let conn = self.connection();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Look up a user by identity-provider subject id.
    pub fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.connection();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = ?1"),
                [google_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Register a new user with the default [`Role::User`].
    pub fn create_user(&self, identity: &VerifiedIdentity) -> Result<User, StoreError> {
        let now = Utc::now();
        let id = {
            let conn = self.connection();
            conn.execute(
                "INSERT INTO users (email, name, picture, google_id, role, created_at, updated_at, last_login_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?6)",
                params![
                    identity.email,
                    identity.name,
                    identity.picture,
                    identity.subject,
                    Role::User,
                    now
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.find_user(id)?
            .ok_or(StoreError::NotFound { entity: "user", id })
    }

    /// Stamp `last_login_at` with the current time.
    pub fn record_login(&self, id: i64) -> Result<User, StoreError> {
        let now = Utc::now();
        let changed = self.connection().execute(
            "UPDATE users SET last_login_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "user", id });
        }
        self.find_user(id)?
            .ok_or(StoreError::NotFound { entity: "user", id })
    }

    /// All users that have not been deleted, oldest first.
    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id"
        ))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Change a user's role. Takes effect on the user's next request.
    pub fn set_role(&self, id: i64, role: Role) -> Result<User, StoreError> {
        let changed = self.connection().execute(
            "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3 AND deleted_at IS NULL",
            params![role, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "user", id });
        }
        self.find_user(id)?
            .ok_or(StoreError::NotFound { entity: "user", id })
    }

    /// Soft-delete a user. Outstanding bearer tokens stop authenticating.
    pub fn soft_delete_user(&self, id: i64) -> Result<(), StoreError> {
        let now = Utc::now();
        let changed = self.connection().execute(
            "UPDATE users SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![now, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "user", id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(sub: &str) -> VerifiedIdentity {
        VerifiedIdentity {
            subject: sub.into(),
            email: format!("{sub}@example.com"),
            name: format!("User {sub}"),
            picture: String::new(),
        }
    }

    #[test]
    fn new_users_default_to_user_role() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&identity("alice")).unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(user.email, "alice@example.com");
        assert!(user.last_login_at.is_some());
        assert_eq!(db.find_user_by_google_id("alice").unwrap().unwrap().id, user.id);
    }

    #[test]
    fn duplicate_subject_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&identity("bob")).unwrap();
        assert!(db.create_user(&identity("bob")).is_err());
    }

    #[test]
    fn set_role_persists() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&identity("carol")).unwrap();
        let updated = db.set_role(user.id, Role::Admin).unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(db.find_user(user.id).unwrap().unwrap().role, Role::Admin);
    }

    #[test]
    fn set_role_on_missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.set_role(42, Role::Admin),
            Err(StoreError::NotFound { id: 42, .. })
        ));
    }

    #[test]
    fn soft_delete_hides_user_from_listing() {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_user(&identity("a")).unwrap();
        let b = db.create_user(&identity("b")).unwrap();
        db.soft_delete_user(a.id).unwrap();

        let listed: Vec<i64> = db.list_users().unwrap().iter().map(|u| u.id).collect();
        assert_eq!(listed, vec![b.id]);
        assert!(db.find_user(a.id).unwrap().unwrap().is_deleted());
        assert!(db.soft_delete_user(a.id).is_err());
    }

    #[test]
    fn record_login_updates_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&identity("dave")).unwrap();
        let after = db.record_login(user.id).unwrap();
        assert!(after.last_login_at >= user.last_login_at);
    }
}
