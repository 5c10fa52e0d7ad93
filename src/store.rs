use anyhow::Result;
use async_trait::async_trait;
use teloxide::types::FileId;
use teloxide::types::MessageId;

use crate::models::ListingRow;
use crate::models::ListingStatus;
use crate::models::ListingSummary;
use crate::models::NewListing;

/// Persistence operations the bot needs for listings and their photos.
///
/// Every call is its own unit of work except [`ListingStore::replace_photos`],
/// which swaps the whole photo set at once.
#[async_trait]
pub trait ListingStore: Send + Sync {
  /// Inserts a listing in `moderation` status and returns its id.
  async fn create_listing(&self, listing: &NewListing) -> Result<i64>;

  async fn add_photo(&self, listing_id: i64, file_id: &FileId, position: i32) -> Result<()>;

  /// Photos ordered by position.
  async fn list_photos(&self, listing_id: i64) -> Result<Vec<FileId>>;

  async fn get_listing(&self, listing_id: i64) -> Result<Option<ListingRow>>;

  /// Seller's listings, newest first.
  async fn list_seller_listings(&self, seller_tg_id: i64) -> Result<Vec<ListingSummary>>;

  /// Updates the status. When `channel_message_id` is given it is stored and
  /// `published_at` is stamped; otherwise the channel reference is left as is.
  async fn set_status(
    &self,
    listing_id: i64,
    status: ListingStatus,
    channel_message_id: Option<MessageId>,
  ) -> Result<()>;

  async fn set_moderator_message(&self, listing_id: i64, message_id: MessageId) -> Result<()>;

  async fn set_price(&self, listing_id: i64, price: &str) -> Result<()>;

  /// Returns the counter value after the increment.
  async fn increment_republish_count(&self, listing_id: i64) -> Result<i32>;

  /// Replaces the photo set with `file_ids`, re-indexed from zero.
  async fn replace_photos(&self, listing_id: i64, file_ids: &[FileId]) -> Result<()>;

  /// Deletes the listing and, through the cascade, its photos.
  async fn delete_listing(&self, listing_id: i64) -> Result<bool>;
}
