//! `activities` table access with transparent field encryption.
//!
//! `description` and `notes` are protected columns. [`ActivityStore`] seals
//! them before they reach SQLite and opens them before handing an
//! [`Activity`] back, so callers and API clients only ever see plaintext.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{Database, StoreError};
use crate::crypto::{FieldCodec, FieldError, StoredText};
use crate::protocol::ActivityInput;

pub const DESCRIPTION_FIELD: &str = "description";
pub const NOTES_FIELD: &str = "notes";

// Legacy tables allow NULL notes; they read back as empty.
const ACTIVITY_COLUMNS: &str =
    "id, user_id, description, COALESCE(notes, '') AS notes, sealed, created_at, updated_at";

/// An activity with its protected fields in plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub user_id: i64,
    pub description: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An activity row exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredActivity {
    pub id: i64,
    pub user_id: i64,
    pub description: StoredText,
    pub notes: StoredText,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredActivity {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let sealed: bool = row.get("sealed")?;
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            description: StoredText::from_column(row.get("description")?, sealed),
            notes: StoredText::from_column(row.get("notes")?, sealed),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn open(self, codec: &FieldCodec) -> Result<Activity, FieldError> {
        Ok(Activity {
            id: self.id,
            user_id: self.user_id,
            description: codec.open(DESCRIPTION_FIELD, &self.description)?,
            notes: codec.open(NOTES_FIELD, &self.notes)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Activity repository bound to the field codec.
#[derive(Clone, Debug)]
pub struct ActivityStore {
    db: Database,
    codec: FieldCodec,
}

impl ActivityStore {
    pub fn new(db: Database, codec: FieldCodec) -> Self {
        Self { db, codec }
    }

    /// Insert a new activity owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Field`] if a protected field cannot be sealed.
    pub fn create(&self, owner: i64, input: &ActivityInput) -> Result<Activity, StoreError> {
        let description = self.codec.seal(DESCRIPTION_FIELD, &input.description)?;
        let notes = self.codec.seal(NOTES_FIELD, &input.notes)?;
        let now = Utc::now();

        let id = {
            let conn = self.db.connection();
            conn.execute(
                "INSERT INTO activities (user_id, description, notes, sealed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                params![owner, description.as_str(), notes.as_str(), now],
            )?;
            conn.last_insert_rowid()
        };

        Ok(Activity {
            id,
            user_id: owner,
            description: input.description.clone(),
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch the raw stored row, protected columns still sealed.
    pub fn stored(&self, id: i64) -> Result<Option<StoredActivity>, StoreError> {
        let conn = self.db.connection();
        let row = conn
            .query_row(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1"),
                [id],
                StoredActivity::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Fetch one activity with plaintext fields.
    pub fn get(&self, id: i64) -> Result<Option<Activity>, StoreError> {
        match self.stored(id)? {
            Some(row) => Ok(Some(row.open(&self.codec)?)),
            None => Ok(None),
        }
    }

    /// All activities owned by `owner`, newest first.
    pub fn list_for_owner(&self, owner: i64) -> Result<Vec<Activity>, StoreError> {
        let rows = {
            let conn = self.db.connection();
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map([owner], StoredActivity::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter()
            .map(|row| row.open(&self.codec).map_err(StoreError::from))
            .collect()
    }

    /// Replace the protected fields of an existing activity.
    pub fn update(&self, id: i64, input: &ActivityInput) -> Result<Activity, StoreError> {
        let description = self.codec.seal(DESCRIPTION_FIELD, &input.description)?;
        let notes = self.codec.seal(NOTES_FIELD, &input.notes)?;

        let changed = self.db.connection().execute(
            "UPDATE activities SET description = ?1, notes = ?2, sealed = 1, updated_at = ?3
             WHERE id = ?4",
            params![description.as_str(), notes.as_str(), Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "activity", id });
        }
        self.get(id)?
            .ok_or(StoreError::NotFound { entity: "activity", id })
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let changed = self
            .db
            .connection()
            .execute("DELETE FROM activities WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "activity", id });
        }
        Ok(())
    }

    /// Owner of an activity, or `None` if it does not exist.
    pub fn owner_of(&self, id: i64) -> Result<Option<i64>, StoreError> {
        let owner = self
            .db
            .connection()
            .query_row("SELECT user_id FROM activities WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(owner)
    }
}
