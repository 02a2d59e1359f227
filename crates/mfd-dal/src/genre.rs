use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{Error, Pool, error::Result};

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateGenre {
    #[garde(length(min = 1, max = 50))]
    pub name: String,
}

pub type GenreRepository = GenreRepositoryImpl<Pool>;

pub struct GenreRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> GenreRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Name uniqueness is enforced by the unique index on genre.name.
    pub async fn create(&self, payload: CreateGenre) -> Result<Genre> {
        let result = sqlx::query("INSERT INTO genre (name) VALUES (?)")
            .bind(&payload.name)
            .execute(&self.executor)
            .await?;
        self.get(result.last_insert_rowid()).await
    }

    pub async fn list(&self) -> Result<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genre ORDER BY name")
            .fetch_all(&self.executor)
            .await?;
        Ok(genres)
    }

    pub async fn get(&self, id: i64) -> Result<Genre> {
        sqlx::query_as::<_, Genre>("SELECT id, name FROM genre WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Genre".to_string()))
    }

    pub async fn update(&self, id: i64, payload: CreateGenre) -> Result<Genre> {
        let result = sqlx::query("UPDATE genre SET name = ? WHERE id = ?")
            .bind(&payload.name)
            .bind(id)
            .execute(&self.executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Genre".to_string()));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM genre WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Genre".to_string()));
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM genre")
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }
}
