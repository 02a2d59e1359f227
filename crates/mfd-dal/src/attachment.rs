use garde::Validate;
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{Error, Pool, error::Result};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AttachmentKind {
    Audio,
    #[default]
    Image,
    Text,
    Video,
    Other,
}

/// Human readable size. Unit steps switch at 512 000 based thresholds, divisors
/// are powers of 1024 (see DESIGN.md for the MB divisor decision).
pub fn human_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    if size < 512_000 {
        format!("{size} B")
    } else if size < 512_000_000 {
        format!("{:.2} KB", size as f64 / KB)
    } else if size < 512_000_000_000 {
        format!("{:.2} MB", size as f64 / (KB * KB))
    } else {
        format!("{:.2} GB", size as f64 / (KB * KB * KB))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttachmentInt {
    id: i64,
    title: String,
    last_update: PrimitiveDateTime,
    file: Option<String>,
    size: Option<i64>,
    kind: AttachmentKind,
    film_id: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct Attachment {
    pub id: i64,
    pub title: String,
    pub last_update: PrimitiveDateTime,
    pub file: Option<String>,
    pub size: Option<i64>,
    pub filesize: Option<String>,
    pub kind: AttachmentKind,
    pub film_id: i64,
}

impl From<AttachmentInt> for Attachment {
    fn from(value: AttachmentInt) -> Self {
        Self {
            id: value.id,
            title: value.title,
            last_update: value.last_update,
            file: value.file,
            filesize: value.size.map(|s| human_size(s.max(0) as u64)),
            size: value.size,
            kind: value.kind,
            film_id: value.film_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateAttachment {
    #[garde(length(min = 1, max = 200))]
    pub title: String,
    #[garde(skip)]
    #[serde(default)]
    pub kind: AttachmentKind,
    #[garde(length(min = 1, max = 1024))]
    pub file: Option<String>,
    #[garde(range(min = 0))]
    pub size: Option<i64>,
}

pub type AttachmentRepository = AttachmentRepositoryImpl<Pool>;

pub struct AttachmentRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> AttachmentRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, film_id: i64, payload: CreateAttachment) -> Result<Attachment> {
        let result = sqlx::query(
            "INSERT INTO attachment (title, kind, file, size, film_id, last_update) \
             VALUES (?, ?, ?, ?, ?, datetime('now'))",
        )
        .bind(&payload.title)
        .bind(payload.kind)
        .bind(&payload.file)
        .bind(payload.size)
        .bind(film_id)
        .execute(&self.executor)
        .await?;
        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> Result<Attachment> {
        let record = sqlx::query_as::<_, AttachmentInt>(
            "SELECT id, title, last_update, file, size, kind, film_id \
             FROM attachment WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Attachment".to_string()))?;
        Ok(record.into())
    }

    pub async fn list_for_film(&self, film_id: i64) -> Result<Vec<Attachment>> {
        let records = sqlx::query_as::<_, AttachmentInt>(
            "SELECT id, title, last_update, file, size, kind, film_id \
             FROM attachment WHERE film_id = ? ORDER BY title",
        )
        .bind(film_id)
        .fetch_all(&self.executor)
        .await?;
        Ok(records.into_iter().map(Attachment::from).collect())
    }

    /// Every save refreshes last_update.
    pub async fn update(&self, id: i64, payload: CreateAttachment) -> Result<Attachment> {
        let result = sqlx::query(
            "UPDATE attachment SET title = ?, kind = ?, file = ?, size = ?, \
             last_update = datetime('now') WHERE id = ?",
        )
        .bind(&payload.title)
        .bind(payload.kind)
        .bind(&payload.file)
        .bind(payload.size)
        .bind(id)
        .execute(&self.executor)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Attachment".to_string()));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM attachment WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Attachment".to_string()));
        }
        Ok(())
    }
}
