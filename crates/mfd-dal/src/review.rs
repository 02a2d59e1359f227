use garde::Validate;
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{Batch, Error, ListingParams, Pool, error::Result};

pub const SORT_FIELDS: &[&str] = &["rate", "edit_date"];

const DEFAULT_ORDER: &str = "edit_date DESC";

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub author: String,
    pub film_id: i64,
    pub film_title: String,
    pub rate: f64,
    pub comment: Option<String>,
    pub edit_date: PrimitiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateReview {
    #[garde(range(min = 1.0, max = 10.0))]
    pub rate: f64,
    #[garde(length(max = 5000))]
    pub comment: Option<String>,
}

const LIST_SQL: &str = "SELECT r.id, u.username AS author, r.film_id, f.title AS film_title, \
     r.rate, r.comment, r.edit_date \
     FROM review r \
     JOIN users u ON r.author_id = u.id \
     JOIN film f ON r.film_id = f.id";

pub type ReviewRepository = ReviewRepositoryImpl<Pool>;

pub struct ReviewRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> ReviewRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(
        &self,
        film_id: i64,
        author_id: i64,
        payload: CreateReview,
    ) -> Result<Review> {
        let result = sqlx::query(
            "INSERT INTO review (author_id, film_id, rate, comment, edit_date) \
             VALUES (?, ?, ?, ?, datetime('now'))",
        )
        .bind(author_id)
        .bind(film_id)
        .bind(payload.rate)
        .bind(&payload.comment)
        .execute(&self.executor)
        .await?;
        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> Result<Review> {
        let sql = format!("{LIST_SQL} WHERE r.id = ?");
        sqlx::query_as::<_, Review>(&sql)
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Review".to_string()))
    }

    /// Back office listing, newest edits first.
    pub async fn list(&self, params: ListingParams) -> Result<Batch<Review>> {
        let ordering = params.ordering(SORT_FIELDS)?;
        let ordering = if ordering.is_empty() {
            DEFAULT_ORDER.to_string()
        } else {
            ordering
        };
        let sql = format!("{LIST_SQL} ORDER BY {ordering} LIMIT ? OFFSET ?");
        let rows = sqlx::query_as::<_, Review>(&sql)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.executor)
            .await?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM review")
            .fetch_one(&self.executor)
            .await?;
        Ok(Batch {
            offset: params.offset,
            total,
            rows,
        })
    }

    pub async fn list_for_film(&self, film_id: i64) -> Result<Vec<Review>> {
        let sql = format!("{LIST_SQL} WHERE r.film_id = ? ORDER BY r.edit_date DESC");
        let rows = sqlx::query_as::<_, Review>(&sql)
            .bind(film_id)
            .fetch_all(&self.executor)
            .await?;
        Ok(rows)
    }
}
