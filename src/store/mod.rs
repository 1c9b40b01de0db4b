use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe SQLite store
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS countdowns (
                user_id TEXT PRIMARY KEY,
                target_time TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS backgrounds (
                id TEXT PRIMARY KEY,
                image_data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_lists (
                type TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_items (
                id TEXT PRIMARY KEY,
                list_type TEXT NOT NULL,
                text TEXT DEFAULT '',
                completed INTEGER DEFAULT 0,
                images TEXT DEFAULT '[]',
                created_at TEXT NOT NULL,
                FOREIGN KEY (list_type) REFERENCES task_lists(type)
            );

            CREATE TABLE IF NOT EXISTS list_images (
                id TEXT PRIMARY KEY,
                item_id TEXT NOT NULL,
                data BLOB,
                content_type TEXT NOT NULL,
                filename TEXT NOT NULL,
                size INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (item_id) REFERENCES task_items(id)
            );

            CREATE TABLE IF NOT EXISTS user_settings (
                user_id TEXT PRIMARY KEY,
                background_type TEXT DEFAULT 'predefined',
                background_value TEXT DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_backgrounds_created_at ON backgrounds(created_at);
            CREATE INDEX IF NOT EXISTS idx_task_items_list_type ON task_items(list_type);
            CREATE INDEX IF NOT EXISTS idx_list_images_item_id ON list_images(item_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Countdown Operations ====================

    pub fn get_countdown(&self, user_id: &str) -> StoreResult<Countdown> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM countdowns WHERE user_id = ?1",
            params![user_id],
            |row| self.row_to_countdown(row),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound(format!("Countdown for user {}", user_id))
            }
            _ => StoreError::Database(e),
        })
    }

    pub fn create_countdown(&self, countdown: &mut Countdown) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        countdown.created_at = now;
        countdown.updated_at = now;

        conn.execute(
            r#"INSERT INTO countdowns (user_id, target_time, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![
                &countdown.user_id,
                countdown.target_time.to_rfc3339(),
                countdown.created_at.to_rfc3339(),
                countdown.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn update_countdown(&self, countdown: &mut Countdown) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        countdown.updated_at = Utc::now();

        let rows = conn.execute(
            "UPDATE countdowns SET target_time = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![
                countdown.target_time.to_rfc3339(),
                countdown.updated_at.to_rfc3339(),
                &countdown.user_id,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!(
                "Countdown for user {}",
                countdown.user_id
            )));
        }
        Ok(())
    }

    fn row_to_countdown(&self, row: &rusqlite::Row) -> rusqlite::Result<Countdown> {
        Ok(Countdown {
            user_id: row.get("user_id")?,
            target_time: parse_datetime(row.get::<_, String>("target_time")?),
            created_at: parse_datetime(row.get::<_, String>("created_at")?),
            updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
        })
    }

    // ==================== Background Operations ====================

    pub fn create_background(&self, background: &mut Background) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        background.id = Uuid::new_v4().to_string();
        background.created_at = Utc::now();

        conn.execute(
            "INSERT INTO backgrounds (id, image_data, created_at) VALUES (?1, ?2, ?3)",
            params![
                &background.id,
                &background.image_data,
                background.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The most recently uploaded background. Uploads append; reads take the latest.
    pub fn latest_background(&self) -> StoreResult<Background> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM backgrounds ORDER BY created_at DESC, rowid DESC LIMIT 1",
            [],
            |row| {
                Ok(Background {
                    id: row.get("id")?,
                    image_data: row.get("image_data")?,
                    created_at: parse_datetime(row.get::<_, String>("created_at")?),
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("Background".to_string()),
            _ => StoreError::Database(e),
        })
    }

    pub fn clear_backgrounds(&self) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM backgrounds", [])?;
        Ok(rows)
    }

    // ==================== Task List Operations ====================

    pub fn get_list(&self, list_type: ListType) -> StoreResult<TaskList> {
        let conn = self.conn.lock().unwrap();
        let (created_at, updated_at) = conn
            .query_row(
                "SELECT created_at, updated_at FROM task_lists WHERE type = ?1",
                params![list_type.as_str()],
                |row| {
                    Ok((
                        parse_datetime(row.get::<_, String>("created_at")?),
                        parse_datetime(row.get::<_, String>("updated_at")?),
                    ))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::NotFound(format!("List {}", list_type))
                }
                _ => StoreError::Database(e),
            })?;

        // rowid order is insertion order
        let mut stmt = conn.prepare(
            "SELECT * FROM task_items WHERE list_type = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![list_type.as_str()], |row| self.row_to_item(row))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok(TaskList {
            list_type,
            items,
            created_at,
            updated_at,
        })
    }

    /// GET on a list creates it on first access; mutations never do.
    pub fn get_or_create_list(&self, list_type: ListType) -> StoreResult<TaskList> {
        match self.get_list(list_type) {
            Ok(list) => Ok(list),
            Err(StoreError::NotFound(_)) => {
                let now = Utc::now();
                {
                    let conn = self.conn.lock().unwrap();
                    conn.execute(
                        "INSERT INTO task_lists (type, created_at, updated_at) VALUES (?1, ?2, ?3)",
                        params![list_type.as_str(), now.to_rfc3339(), now.to_rfc3339()],
                    )?;
                }
                Ok(TaskList {
                    list_type,
                    items: Vec::new(),
                    created_at: now,
                    updated_at: now,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn add_item(&self, list_type: ListType, item: &mut TaskItem) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        item.id = Uuid::new_v4().to_string();
        item.created_at = Utc::now();

        let images_json = serde_json::to_string(&item.images)?;

        conn.execute(
            r#"INSERT INTO task_items (id, list_type, text, completed, images, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                &item.id,
                list_type.as_str(),
                &item.text,
                item.completed,
                &images_json,
                item.created_at.to_rfc3339(),
            ],
        )?;

        conn.execute(
            "UPDATE task_lists SET updated_at = ?1 WHERE type = ?2",
            params![Utc::now().to_rfc3339(), list_type.as_str()],
        )?;
        Ok(())
    }

    pub fn get_item(&self, list_type: ListType, item_id: &str) -> StoreResult<TaskItem> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM task_items WHERE id = ?1 AND list_type = ?2",
            params![item_id, list_type.as_str()],
            |row| self.row_to_item(row),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound(format!("Item {}", item_id))
            }
            _ => StoreError::Database(e),
        })
    }

    pub fn update_item(&self, list_type: ListType, item: &TaskItem) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let images_json = serde_json::to_string(&item.images)?;

        let rows = conn.execute(
            r#"UPDATE task_items SET text = ?1, completed = ?2, images = ?3
               WHERE id = ?4 AND list_type = ?5"#,
            params![
                &item.text,
                item.completed,
                &images_json,
                &item.id,
                list_type.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("Item {}", item.id)));
        }

        conn.execute(
            "UPDATE task_lists SET updated_at = ?1 WHERE type = ?2",
            params![Utc::now().to_rfc3339(), list_type.as_str()],
        )?;
        Ok(())
    }

    pub fn set_item_images(&self, item_id: &str, images: &[String]) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let images_json = serde_json::to_string(images)?;

        let rows = conn.execute(
            "UPDATE task_items SET images = ?1 WHERE id = ?2",
            params![&images_json, item_id],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("Item {}", item_id)));
        }
        Ok(())
    }

    /// Removes the item together with its stored image blobs.
    pub fn delete_item(&self, list_type: ListType, item_id: &str) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM list_images WHERE item_id = ?1",
            params![item_id],
        )?;
        let rows = tx.execute(
            "DELETE FROM task_items WHERE id = ?1 AND list_type = ?2",
            params![item_id, list_type.as_str()],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("Item {}", item_id)));
        }

        tx.execute(
            "UPDATE task_lists SET updated_at = ?1 WHERE type = ?2",
            params![Utc::now().to_rfc3339(), list_type.as_str()],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn row_to_item(&self, row: &rusqlite::Row) -> rusqlite::Result<TaskItem> {
        let images_str: String = row.get("images")?;
        let images: Vec<String> = serde_json::from_str(&images_str).unwrap_or_default();

        Ok(TaskItem {
            id: row.get("id")?,
            text: row.get("text")?,
            completed: row.get("completed")?,
            created_at: parse_datetime(row.get::<_, String>("created_at")?),
            images,
        })
    }

    // ==================== List Image Operations ====================

    pub fn bulk_create_images(&self, images: &mut [ListImage]) -> StoreResult<()> {
        if images.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for image in images.iter_mut() {
            image.id = Uuid::new_v4().to_string();
            image.created_at = Utc::now();

            tx.execute(
                r#"INSERT INTO list_images (id, item_id, data, content_type, filename, size, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    &image.id,
                    &image.item_id,
                    &image.data,
                    &image.content_type,
                    &image.filename,
                    image.size,
                    image.created_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_image(&self, id: &str) -> StoreResult<ListImage> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM list_images WHERE id = ?1",
            params![id],
            |row| {
                Ok(ListImage {
                    id: row.get("id")?,
                    item_id: row.get("item_id")?,
                    data: row.get("data")?,
                    content_type: row.get("content_type")?,
                    filename: row.get("filename")?,
                    size: row.get("size")?,
                    created_at: parse_datetime(row.get::<_, String>("created_at")?),
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(format!("Image {}", id)),
            _ => StoreError::Database(e),
        })
    }

    // ==================== User Settings Operations ====================

    pub fn get_settings(&self, user_id: &str) -> StoreResult<UserSettings> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM user_settings WHERE user_id = ?1",
            params![user_id],
            |row| self.row_to_settings(row),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound(format!("Settings for user {}", user_id))
            }
            _ => StoreError::Database(e),
        })
    }

    pub fn create_settings(&self, settings: &mut UserSettings) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        settings.created_at = now;
        settings.updated_at = now;

        conn.execute(
            r#"INSERT INTO user_settings (user_id, background_type, background_value, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                &settings.user_id,
                settings.background_type.as_str(),
                &settings.background_value,
                settings.created_at.to_rfc3339(),
                settings.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn update_settings(&self, settings: &mut UserSettings) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        settings.updated_at = Utc::now();

        let rows = conn.execute(
            r#"UPDATE user_settings SET background_type = ?1, background_value = ?2, updated_at = ?3
               WHERE user_id = ?4"#,
            params![
                settings.background_type.as_str(),
                &settings.background_value,
                settings.updated_at.to_rfc3339(),
                &settings.user_id,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!(
                "Settings for user {}",
                settings.user_id
            )));
        }
        Ok(())
    }

    fn row_to_settings(&self, row: &rusqlite::Row) -> rusqlite::Result<UserSettings> {
        let type_str: String = row.get("background_type")?;

        Ok(UserSettings {
            user_id: row.get("user_id")?,
            background_type: BackgroundType::from_str(&type_str).unwrap_or_default(),
            background_value: row.get("background_value")?,
            created_at: parse_datetime(row.get::<_, String>("created_at")?),
            updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
        })
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
