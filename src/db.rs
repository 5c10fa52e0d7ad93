use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::Pool;
use sqlx::Postgres;
use sqlx::Row;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::postgres::PgRow;
use teloxide::types::FileId;
use teloxide::types::MessageId;
use tracing::instrument;

use crate::models::ListingRow;
use crate::models::ListingStatus;
use crate::models::ListingSummary;
use crate::models::NewListing;
use crate::store::ListingStore;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const LISTING_COLUMNS: &str = r#"
  id,
  seller_tg_id,
  seller_username,
  name,
  price,
  location,
  description,
  delivery,
  status,
  moderator_message_id,
  channel_message_id,
  created_at,
  published_at,
  views,
  republish_count
"#;

#[derive(Clone)]
pub struct Db {
  pool: Pool<Postgres>,
}

impl Db {
  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(10)
      .connect(database_url)
      .await
      .context("failed to connect to postgres")?;
    MIGRATOR.run(&pool).await.context("failed to run migrations")?;
    Ok(Self { pool })
  }
}

fn parse_status(raw: &str) -> Result<ListingStatus> {
  raw.parse::<ListingStatus>().map_err(Into::into)
}

fn listing_from_row(row: &PgRow) -> Result<ListingRow> {
  Ok(ListingRow {
    id: row.try_get("id")?,
    seller_tg_id: row.try_get("seller_tg_id")?,
    seller_username: row.try_get("seller_username")?,
    name: row.try_get("name")?,
    price: row.try_get("price")?,
    location: row.try_get("location")?,
    description: row.try_get("description")?,
    delivery: row.try_get("delivery")?,
    status: parse_status(row.try_get("status")?)?,
    moderator_message_id: row.try_get::<Option<i32>, _>("moderator_message_id")?.map(MessageId),
    channel_message_id: row.try_get::<Option<i32>, _>("channel_message_id")?.map(MessageId),
    created_at: row.try_get("created_at")?,
    published_at: row.try_get("published_at")?,
    views: row.try_get("views")?,
    republish_count: row.try_get("republish_count")?,
  })
}

#[async_trait]
impl ListingStore for Db {
  #[instrument(skip(self, listing), fields(seller_tg_id = listing.seller_tg_id))]
  async fn create_listing(&self, listing: &NewListing) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
      r#"
      INSERT INTO listings (seller_tg_id, seller_username, name, price, location, description, delivery)
      VALUES ($1, $2, $3, $4, $5, $6, $7)
      RETURNING id
      "#,
    )
    .bind(listing.seller_tg_id)
    .bind(listing.seller_username.as_deref())
    .bind(&listing.name)
    .bind(&listing.price)
    .bind(listing.location.as_deref())
    .bind(&listing.description)
    .bind(&listing.delivery)
    .fetch_one(&self.pool)
    .await?;
    Ok(id)
  }

  #[instrument(skip(self))]
  async fn add_photo(&self, listing_id: i64, file_id: &FileId, position: i32) -> Result<()> {
    sqlx::query("INSERT INTO listing_photos (listing_id, file_id, position) VALUES ($1, $2, $3)")
      .bind(listing_id)
      .bind(&file_id.0)
      .bind(position)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn list_photos(&self, listing_id: i64) -> Result<Vec<FileId>> {
    let rows = sqlx::query_scalar::<_, String>(
      "SELECT file_id FROM listing_photos WHERE listing_id = $1 ORDER BY position ASC, id ASC",
    )
    .bind(listing_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(rows.into_iter().map(FileId).collect())
  }

  #[instrument(skip(self))]
  async fn get_listing(&self, listing_id: i64) -> Result<Option<ListingRow>> {
    let row = sqlx::query(&format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"))
      .bind(listing_id)
      .fetch_optional(&self.pool)
      .await?;
    row.as_ref().map(listing_from_row).transpose()
  }

  #[instrument(skip(self))]
  async fn list_seller_listings(&self, seller_tg_id: i64) -> Result<Vec<ListingSummary>> {
    let rows = sqlx::query(
      r#"
      SELECT id, name, price, status, channel_message_id, created_at, views, republish_count
      FROM listings
      WHERE seller_tg_id = $1
      ORDER BY created_at DESC, id DESC
      "#,
    )
    .bind(seller_tg_id)
    .fetch_all(&self.pool)
    .await?;

    rows
      .iter()
      .map(|row| {
        Ok(ListingSummary {
          id: row.try_get("id")?,
          name: row.try_get("name")?,
          price: row.try_get("price")?,
          status: parse_status(row.try_get("status")?)?,
          channel_message_id: row.try_get::<Option<i32>, _>("channel_message_id")?.map(MessageId),
          created_at: row.try_get("created_at")?,
          views: row.try_get("views")?,
          republish_count: row.try_get("republish_count")?,
        })
      })
      .collect()
  }

  #[instrument(skip(self))]
  async fn set_status(
    &self,
    listing_id: i64,
    status: ListingStatus,
    channel_message_id: Option<MessageId>,
  ) -> Result<()> {
    match channel_message_id {
      Some(message_id) => {
        sqlx::query(
          r#"
          UPDATE listings
          SET status = $1, channel_message_id = $2, published_at = NOW()
          WHERE id = $3
          "#,
        )
        .bind(status.as_str())
        .bind(message_id.0)
        .bind(listing_id)
        .execute(&self.pool)
        .await?;
      },
      None => {
        sqlx::query("UPDATE listings SET status = $1 WHERE id = $2")
          .bind(status.as_str())
          .bind(listing_id)
          .execute(&self.pool)
          .await?;
      },
    }
    Ok(())
  }

  #[instrument(skip(self))]
  async fn set_moderator_message(&self, listing_id: i64, message_id: MessageId) -> Result<()> {
    sqlx::query("UPDATE listings SET moderator_message_id = $1 WHERE id = $2")
      .bind(message_id.0)
      .bind(listing_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn set_price(&self, listing_id: i64, price: &str) -> Result<()> {
    sqlx::query("UPDATE listings SET price = $1 WHERE id = $2")
      .bind(price)
      .bind(listing_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn increment_republish_count(&self, listing_id: i64) -> Result<i32> {
    let count = sqlx::query_scalar::<_, i32>(
      "UPDATE listings SET republish_count = republish_count + 1 WHERE id = $1 RETURNING republish_count",
    )
    .bind(listing_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(count)
  }

  #[instrument(skip(self, file_ids), fields(count = file_ids.len()))]
  async fn replace_photos(&self, listing_id: i64, file_ids: &[FileId]) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("DELETE FROM listing_photos WHERE listing_id = $1")
      .bind(listing_id)
      .execute(&mut *tx)
      .await?;
    for (position, file_id) in file_ids.iter().enumerate() {
      sqlx::query("INSERT INTO listing_photos (listing_id, file_id, position) VALUES ($1, $2, $3)")
        .bind(listing_id)
        .bind(&file_id.0)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn delete_listing(&self, listing_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM listings WHERE id = $1")
      .bind(listing_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }
}
