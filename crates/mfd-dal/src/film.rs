use garde::Validate;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Batch, Error, ListingParams, Pool, error::Result, genre::Genre};

/// Fields the listing can be sorted by from the outside.
pub const SORT_FIELDS: &[&str] = &["title", "release_date", "rate", "runtime"];

const DEFAULT_ORDER: &str = "release_date DESC, title";

fn rate_percent(rate: f64) -> String {
    format!("{} %", (rate * 10.0) as i64)
}

#[derive(Debug, sqlx::FromRow)]
struct FilmShortInt {
    id: i64,
    title: String,
    release_date: Option<Date>,
    rate: f64,
}

/// Listing row - no plot, runtime or genres.
#[derive(Debug, Serialize, Clone)]
pub struct FilmShort {
    pub id: i64,
    pub title: String,
    pub release_date: Option<Date>,
    pub release_year: Option<i32>,
    pub rate: f64,
    pub rate_percent: String,
}

impl From<FilmShortInt> for FilmShort {
    fn from(value: FilmShortInt) -> Self {
        Self {
            id: value.id,
            title: value.title,
            release_date: value.release_date,
            release_year: value.release_date.map(|d| d.year()),
            rate: value.rate,
            rate_percent: rate_percent(value.rate),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FilmInt {
    id: i64,
    title: String,
    plot: Option<String>,
    release_date: Option<Date>,
    runtime: Option<i64>,
    poster: Option<String>,
    rate: f64,
}

#[derive(Debug, Serialize, Clone)]
pub struct Film {
    pub id: i64,
    pub title: String,
    pub plot: Option<String>,
    pub release_date: Option<Date>,
    pub release_year: Option<i32>,
    pub runtime: Option<i64>,
    pub poster: Option<String>,
    pub rate: f64,
    pub rate_percent: String,
    pub genres: Vec<Genre>,
}

impl Film {
    fn from_parts(value: FilmInt, genres: Vec<Genre>) -> Self {
        Self {
            id: value.id,
            title: value.title,
            plot: value.plot,
            release_date: value.release_date,
            release_year: value.release_date.map(|d| d.year()),
            runtime: value.runtime,
            poster: value.poster,
            rate: value.rate,
            rate_percent: rate_percent(value.rate),
            genres,
        }
    }
}

/// Create payload - model level constraints only, missing rate defaults to 5.0.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateFilm {
    #[garde(length(min = 1, max = 200))]
    pub title: String,
    #[garde(skip)]
    pub plot: Option<String>,
    #[garde(skip)]
    pub release_date: Option<Date>,
    #[garde(skip)]
    pub runtime: Option<i64>,
    #[garde(inner(range(min = 1.0, max = 10.0)))]
    pub rate: Option<f64>,
    #[garde(skip)]
    #[serde(default)]
    pub genres: Vec<i64>,
}

/// Strict update payload - also bounds runtime to (0, 1000].
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct UpdateFilm {
    #[garde(length(min = 1, max = 200))]
    pub title: String,
    #[garde(skip)]
    pub plot: Option<String>,
    #[garde(skip)]
    pub release_date: Option<Date>,
    #[garde(inner(range(min = 1, max = 1000)))]
    pub runtime: Option<i64>,
    #[garde(range(min = 1.0, max = 10.0))]
    pub rate: f64,
    #[garde(skip)]
    #[serde(default)]
    pub genres: Vec<i64>,
}

pub type FilmRepository = FilmRepositoryImpl<Pool>;

pub struct FilmRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> FilmRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Films in default ordering (newest release first, then title), optionally
    /// restricted to films carrying a genre of the given name.
    pub async fn list(
        &self,
        params: ListingParams,
        genre_name: Option<&str>,
    ) -> Result<Batch<FilmShort>> {
        let ordering = params.ordering(SORT_FIELDS)?;
        let ordering = if ordering.is_empty() {
            DEFAULT_ORDER.to_string()
        } else {
            ordering
        };

        let (rows, total) = match genre_name {
            Some(name) => {
                let sql = format!(
                    "SELECT f.id, f.title, f.release_date, f.rate FROM film f \
                     JOIN film_genres fg ON f.id = fg.film_id \
                     JOIN genre g ON fg.genre_id = g.id \
                     WHERE g.name = ? ORDER BY {ordering} LIMIT ? OFFSET ?"
                );
                let rows = sqlx::query_as::<_, FilmShortInt>(&sql)
                    .bind(name)
                    .bind(params.limit)
                    .bind(params.offset)
                    .fetch_all(&self.executor)
                    .await?;
                let total = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM film f \
                     JOIN film_genres fg ON f.id = fg.film_id \
                     JOIN genre g ON fg.genre_id = g.id \
                     WHERE g.name = ?",
                )
                .bind(name)
                .fetch_one(&self.executor)
                .await?;
                (rows, total)
            }
            None => {
                let sql = format!(
                    "SELECT id, title, release_date, rate FROM film \
                     ORDER BY {ordering} LIMIT ? OFFSET ?"
                );
                let rows = sqlx::query_as::<_, FilmShortInt>(&sql)
                    .bind(params.limit)
                    .bind(params.offset)
                    .fetch_all(&self.executor)
                    .await?;
                let total = self.count().await?;
                (rows, total)
            }
        };

        Ok(Batch {
            offset: params.offset,
            total,
            rows: rows.into_iter().map(FilmShort::from).collect(),
        })
    }

    /// Films by release date ascending - the "recently added to catalog" block.
    pub async fn newest(&self, params: ListingParams) -> Result<Batch<FilmShort>> {
        let rows = sqlx::query_as::<_, FilmShortInt>(
            "SELECT id, title, release_date, rate FROM film \
             ORDER BY release_date LIMIT ? OFFSET ?",
        )
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.executor)
        .await?;
        let total = self.count().await?;
        Ok(Batch {
            offset: params.offset,
            total,
            rows: rows.into_iter().map(FilmShort::from).collect(),
        })
    }

    /// Best rated films, rate strictly non-increasing, ties broken by title.
    pub async fn top_rated(&self, limit: i64) -> Result<Vec<FilmShort>> {
        let rows = sqlx::query_as::<_, FilmShortInt>(
            "SELECT id, title, release_date, rate FROM film \
             ORDER BY rate DESC, title LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.executor)
        .await?;
        Ok(rows.into_iter().map(FilmShort::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM film")
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn get(&self, id: i64) -> Result<Film> {
        let film = sqlx::query_as::<_, FilmInt>(
            "SELECT id, title, plot, release_date, runtime, poster, rate FROM film WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Film".to_string()))?;

        let genres = sqlx::query_as::<_, Genre>(
            "SELECT g.id, g.name FROM genre g \
             JOIN film_genres fg ON g.id = fg.genre_id \
             WHERE fg.film_id = ? ORDER BY g.name",
        )
        .bind(id)
        .fetch_all(&self.executor)
        .await?;

        Ok(Film::from_parts(film, genres))
    }

    pub async fn set_poster(&self, id: i64, poster: &str) -> Result<()> {
        let result = sqlx::query("UPDATE film SET poster = ? WHERE id = ?")
            .bind(poster)
            .bind(id)
            .execute(&self.executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Film".to_string()));
        }
        Ok(())
    }
}

// Writes touching more than one table run on the pool so they can use a transaction.
impl FilmRepositoryImpl<Pool> {
    pub async fn create(&self, payload: CreateFilm) -> Result<Film> {
        let mut tx = self.executor.begin().await?;
        let rate = payload.rate.unwrap_or(5.0);
        let result = sqlx::query(
            "INSERT INTO film (title, plot, release_date, runtime, rate) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&payload.title)
        .bind(&payload.plot)
        .bind(payload.release_date)
        .bind(payload.runtime)
        .bind(rate)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();
        for genre_id in &payload.genres {
            sqlx::query("INSERT INTO film_genres (film_id, genre_id) VALUES (?, ?)")
                .bind(id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        self.get(id).await
    }

    pub async fn update(&self, id: i64, payload: UpdateFilm) -> Result<Film> {
        let mut tx = self.executor.begin().await?;
        let result = sqlx::query(
            "UPDATE film SET title = ?, plot = ?, release_date = ?, runtime = ?, rate = ? \
             WHERE id = ?",
        )
        .bind(&payload.title)
        .bind(&payload.plot)
        .bind(payload.release_date)
        .bind(payload.runtime)
        .bind(payload.rate)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Film".to_string()));
        }
        sqlx::query("DELETE FROM film_genres WHERE film_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for genre_id in &payload.genres {
            sqlx::query("INSERT INTO film_genres (film_id, genre_id) VALUES (?, ?)")
                .bind(id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        self.get(id).await
    }

    /// Owned attachments and reviews go with the film via FK cascade.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM film WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Film".to_string()));
        }
        Ok(())
    }
}
