use teloxide::types::ChatId;
use teloxide::types::InlineKeyboardButton;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::types::KeyboardButton;
use teloxide::types::KeyboardMarkup;
use teloxide::types::MessageId;
use teloxide::types::ReplyMarkup;
use url::Url;

use crate::bot::callbacks::CallbackAction;
use crate::bot::wizard::CANCEL_LABEL;
use crate::bot::wizard::CONFIRM_LABEL;
use crate::models::ListingSummary;

pub const ADD_LISTING_LABEL: &str = "📦 Add listing";
pub const MY_LISTINGS_LABEL: &str = "📋 My listings";
pub const RULES_LABEL: &str = "📖 Rules";

pub const DELIVERY_OPTIONS: [&str; 2] = ["Ukrposhta, cash on delivery", "Nova Poshta, cash on delivery"];

pub const MAX_REPUBLISH: i32 = 3;

fn reply_keyboard<'a>(rows: impl IntoIterator<Item = &'a [&'a str]>) -> ReplyMarkup {
  let rows = rows
    .into_iter()
    .map(|row| row.iter().map(|label| KeyboardButton::new(*label)).collect::<Vec<_>>())
    .collect::<Vec<_>>();
  ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard())
}

pub fn main_menu_keyboard() -> ReplyMarkup {
  reply_keyboard([
    &[ADD_LISTING_LABEL][..],
    &[MY_LISTINGS_LABEL][..],
    &[RULES_LABEL][..],
  ])
}

pub fn delivery_keyboard() -> ReplyMarkup {
  reply_keyboard([&DELIVERY_OPTIONS[..1], &DELIVERY_OPTIONS[1 ..]])
}

pub fn confirmation_keyboard() -> ReplyMarkup {
  reply_keyboard([&[CONFIRM_LABEL][..], &[CANCEL_LABEL][..]])
}

fn callback_button(label: &str, action: CallbackAction) -> InlineKeyboardButton {
  InlineKeyboardButton::callback(label.to_string(), action.to_string())
}

pub fn moderation_keyboard(listing_id: i64) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![
    vec![callback_button("✅ Publish", CallbackAction::Publish(listing_id))],
    vec![callback_button("❌ Reject", CallbackAction::Reject(listing_id))],
    vec![callback_button("🔄 Rotate photos", CallbackAction::RotatePhotos(listing_id))],
  ])
}

pub fn rotation_keyboard(listing_id: i64, index: usize) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![callback_button(
    "🔃 Rotate 90°",
    CallbackAction::RotateOne { listing_id, index },
  )]])
}

pub fn rotation_done_keyboard(listing_id: i64) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![callback_button(
    "✅ Done",
    CallbackAction::RotationDone(listing_id),
  )]])
}

/// Link to a post in a private channel (`-100` prefixed id).
pub fn channel_post_url(channel: ChatId, message_id: MessageId) -> Option<Url> {
  let raw = channel.0.to_string();
  let internal = raw.strip_prefix("-100")?;
  Url::parse(&format!("https://t.me/c/{internal}/{}", message_id.0)).ok()
}

pub fn seller_actions_keyboard(listing: &ListingSummary, channel: Option<ChatId>) -> InlineKeyboardMarkup {
  let mut rows = Vec::new();

  if let Some(message_id) = listing.channel_message_id
    && let Some(channel) = channel
    && let Some(url) = channel_post_url(channel, message_id)
  {
    rows.push(vec![InlineKeyboardButton::url("👁 View in channel", url)]);
  }

  if listing.republish_count < MAX_REPUBLISH {
    rows.push(vec![callback_button("🔁 Republish", CallbackAction::Republish(listing.id))]);
  }

  rows.push(vec![callback_button("✅ Sold", CallbackAction::Sold(listing.id))]);
  rows.push(vec![callback_button("✏ Change price", CallbackAction::ChangePrice(listing.id))]);
  rows.push(vec![callback_button("🗑 Delete", CallbackAction::Delete(listing.id))]);

  InlineKeyboardMarkup::new(rows)
}
