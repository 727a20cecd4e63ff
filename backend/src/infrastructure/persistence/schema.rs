use rusqlite::{Connection, Result};

/// Initialize the SQLite snapshot schema.
/// This function is idempotent and can be safely called multiple times.
pub fn initialize_database(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS image_vectors (
            image_id TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            vector TEXT NOT NULL,
            image_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            upload_time TEXT NOT NULL,
            category TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS text_vectors (
            description_id TEXT PRIMARY KEY,
            image_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            vector TEXT NOT NULL,
            description_text TEXT NOT NULL,
            description_type TEXT NOT NULL,
            text_length INTEGER NOT NULL,
            confidence REAL NOT NULL,
            generation_time TEXT NOT NULL,
            FOREIGN KEY (image_id) REFERENCES image_vectors(image_id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_text_vectors_image ON text_vectors(image_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_image_vectors_category ON image_vectors(category)",
        [],
    )?;

    Ok(())
}
