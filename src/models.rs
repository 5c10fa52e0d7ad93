use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use teloxide::types::MessageId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
  Moderation,
  Published,
  Rejected,
  Sold,
}

impl ListingStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Moderation => "moderation",
      Self::Published => "published",
      Self::Rejected => "rejected",
      Self::Sold => "sold",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Moderation => "⏳ On moderation",
      Self::Published => "✅ Published",
      Self::Rejected => "❌ Rejected",
      Self::Sold => "💸 Sold",
    }
  }
}

impl fmt::Display for ListingStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown listing status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ListingStatus {
  type Err = UnknownStatus;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value {
      "moderation" => Ok(Self::Moderation),
      "published" => Ok(Self::Published),
      "rejected" => Ok(Self::Rejected),
      "sold" => Ok(Self::Sold),
      other => Err(UnknownStatus(other.to_string())),
    }
  }
}

/// Seller-entered fields of a listing that is about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListing {
  pub seller_tg_id: i64,
  pub seller_username: Option<String>,
  pub name: String,
  pub price: String,
  pub location: Option<String>,
  pub description: String,
  pub delivery: String,
}

#[derive(Debug, Clone)]
pub struct ListingRow {
  pub id: i64,
  pub seller_tg_id: i64,
  pub seller_username: Option<String>,
  pub name: String,
  pub price: String,
  pub location: Option<String>,
  pub description: String,
  pub delivery: String,
  pub status: ListingStatus,
  pub moderator_message_id: Option<MessageId>,
  pub channel_message_id: Option<MessageId>,
  pub created_at: DateTime<Utc>,
  pub published_at: Option<DateTime<Utc>>,
  pub views: i32,
  pub republish_count: i32,
}

/// Row shape used by the seller's "my listings" view.
#[derive(Debug, Clone)]
pub struct ListingSummary {
  pub id: i64,
  pub name: String,
  pub price: String,
  pub status: ListingStatus,
  pub channel_message_id: Option<MessageId>,
  pub created_at: DateTime<Utc>,
  pub views: i32,
  pub republish_count: i32,
}
