/// Durable snapshots of the in-memory vector store.
///
/// The store itself is volatile; on shutdown (or on demand) its full
/// contents are written to SQLite in one transaction, and on startup the
/// snapshot is loaded back, preserving insertion order. Vectors travel as
/// JSON arrays inside TEXT columns.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::info;

use crate::domain::entities::{ImageRecord, TextRecord};
use crate::domain::value_objects::{
    Category, DescriptionId, DescriptionType, EmbeddingVector, ImageId,
};
use crate::infrastructure::store::DualVectorStore;

pub struct SnapshotRepository {
    conn: Connection,
}

impl SnapshotRepository {
    /// In-memory snapshot database (useful for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::initialize_database(&conn)?;
        Ok(SnapshotRepository { conn })
    }

    pub fn new_with_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        super::schema::initialize_database(&conn)?;
        Ok(SnapshotRepository { conn })
    }

    /// Write the store's full contents, replacing any previous snapshot.
    pub fn save(&mut self, store: &DualVectorStore) -> Result<()> {
        let images = store.export_images();
        let texts = store.export_texts();

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM text_vectors", [])?;
        tx.execute("DELETE FROM image_vectors", [])?;

        for (position, image) in images.iter().enumerate() {
            tx.execute(
                "INSERT INTO image_vectors
                 (image_id, position, vector, image_path, file_name, file_size,
                  width, height, upload_time, category)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    image.image_id.as_str(),
                    position as i64,
                    serde_json::to_string(image.vector.values())?,
                    image.image_path,
                    image.file_name,
                    image.file_size as i64,
                    image.width as i64,
                    image.height as i64,
                    image.upload_time.to_rfc3339(),
                    image.category.as_str(),
                ],
            )?;
        }

        for (position, text) in texts.iter().enumerate() {
            tx.execute(
                "INSERT INTO text_vectors
                 (description_id, image_id, position, vector, description_text,
                  description_type, text_length, confidence, generation_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    text.description_id.as_str(),
                    text.image_id.as_str(),
                    position as i64,
                    serde_json::to_string(text.vector.values())?,
                    text.description_text,
                    text.description_type.as_str(),
                    text.text_length as i64,
                    text.confidence,
                    text.generation_time.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!(
            image_count = images.len(),
            text_count = texts.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Load the snapshot back into the store, replacing its contents.
    pub fn load(&self, store: &DualVectorStore) -> Result<()> {
        let images = self.load_images()?;
        let texts = self.load_texts()?;
        store
            .restore(images, texts)
            .context("Snapshot failed store validation")?;
        Ok(())
    }

    fn load_images(&self) -> Result<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT image_id, vector, image_path, file_name, file_size,
                    width, height, upload_time, category
             FROM image_vectors ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut images = Vec::new();
        for row in rows {
            let (id, vector, path, name, size, width, height, uploaded, category) = row?;
            images.push(ImageRecord {
                image_id: ImageId::new(id).context("Corrupt image id in snapshot")?,
                vector: parse_vector(&vector)?,
                image_path: path,
                file_name: name,
                file_size: size as u64,
                width: width as u32,
                height: height as u32,
                upload_time: parse_timestamp(&uploaded)?,
                category: Category::new(category).context("Corrupt category in snapshot")?,
            });
        }
        Ok(images)
    }

    fn load_texts(&self) -> Result<Vec<TextRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT description_id, image_id, vector, description_text,
                    description_type, text_length, confidence, generation_time
             FROM text_vectors ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut texts = Vec::new();
        for row in rows {
            let (id, image_id, vector, body, ty, length, confidence, generated) = row?;
            texts.push(TextRecord {
                description_id: DescriptionId::new(id)
                    .context("Corrupt description id in snapshot")?,
                image_id: ImageId::new(image_id).context("Corrupt image id in snapshot")?,
                vector: parse_vector(&vector)?,
                description_text: body,
                description_type: DescriptionType::parse(&ty)
                    .context("Corrupt description type in snapshot")?,
                text_length: length as usize,
                confidence: confidence as f32,
                generation_time: parse_timestamp(&generated)?,
            });
        }
        Ok(texts)
    }
}

fn parse_vector(json: &str) -> Result<EmbeddingVector> {
    let values: Vec<f32> =
        serde_json::from_str(json).context("Corrupt vector JSON in snapshot")?;
    EmbeddingVector::new(values).context("Corrupt vector in snapshot")
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)
        .context("Corrupt timestamp in snapshot")?
        .with_timezone(&Utc))
}
