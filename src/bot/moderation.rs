//! Moderator side of the listing lifecycle: the queue message, publish,
//! reject and the photo rotation session.

use chrono::Utc;
use teloxide::types::ChatId;
use teloxide::types::FileId;
use teloxide::types::InlineKeyboardButton;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::types::MessageId;
use teloxide::types::ReplyMarkup;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::context::AppContext;
use crate::bot::error::FlowError;
use crate::bot::error::FlowResult;
use crate::bot::keyboards::moderation_keyboard;
use crate::bot::keyboards::rotation_done_keyboard;
use crate::bot::keyboards::rotation_keyboard;
use crate::bot::render::channel_caption;
use crate::bot::render::moderation_caption;
use crate::bot::state::RotationDraft;
use crate::imaging::rotate_clockwise;
use crate::messenger::Body;
use crate::messenger::CAPTION_LIMIT;
use crate::messenger::MEDIA_GROUP_LIMIT;
use crate::messenger::Messenger;
use crate::models::ListingRow;
use crate::models::ListingStatus;

const CHOOSE_ACTION_TEXT: &str = "Choose an action:";
const ROTATION_HINT_TEXT: &str = "Rotate the photos that need it, then press Done.";

/// Sends the photos as consecutive albums with the caption on the very first
/// item. A caption over [`CAPTION_LIMIT`] follows the albums as its own text
/// message instead. Returns the id of the first message, if any photo was sent.
async fn send_albums(
  messenger: &dyn Messenger,
  chat: ChatId,
  photos: &[FileId],
  caption: &Body,
) -> anyhow::Result<Option<MessageId>> {
  let inline_caption = caption.text().chars().count() <= CAPTION_LIMIT;
  let mut first = None;
  for (index, chunk) in photos.chunks(MEDIA_GROUP_LIMIT).enumerate() {
    let chunk_caption = (index == 0 && inline_caption).then(|| caption.clone());
    let sent = messenger.send_media_group(chat, chunk, chunk_caption).await?;
    if first.is_none() {
      first = sent.first().copied();
    }
  }
  if first.is_some() && !inline_caption {
    messenger.send_text(chat, caption.clone(), None).await?;
  }
  Ok(first)
}

/// Best-effort notice to a third party; a failure never undoes the action.
async fn notify(messenger: &dyn Messenger, chat: ChatId, text: String) {
  if let Err(err) = messenger.send_text(chat, Body::Plain(text), None).await {
    warn!(chat_id = %chat, error = %err, "failed to deliver notification");
  }
}

async fn delete_quietly(messenger: &dyn Messenger, chat: ChatId, message_id: MessageId) {
  if let Err(err) = messenger.delete_message(chat, message_id).await {
    warn!(chat_id = %chat, message_id = %message_id, error = %err, "failed to delete message");
  }
}

/// Strips the buttons from a queue message that is about to be superseded.
pub async fn retire_action_message(ctx: &AppContext, listing: &ListingRow) {
  if listing.status != ListingStatus::Moderation {
    return;
  }
  let (Some(inbox), Some(action_message)) = (ctx.moderation_inbox(), listing.moderator_message_id) else {
    return;
  };
  let cleared = InlineKeyboardMarkup::new(Vec::<Vec<InlineKeyboardButton>>::new());
  if let Err(err) = ctx.messenger().edit_markup(inbox, action_message, cleared).await {
    warn!(listing_id = listing.id, error = %err, "failed to clear old moderation buttons");
  }
}

async fn load_listing(ctx: &AppContext, listing_id: i64) -> FlowResult<ListingRow> {
  ctx
    .store()
    .get_listing(listing_id)
    .await?
    .ok_or(FlowError::NotFound)
}

/// Re-reads the listing and checks it still waits for a decision.
async fn load_pending(ctx: &AppContext, listing_id: i64) -> FlowResult<ListingRow> {
  let listing = load_listing(ctx, listing_id).await?;
  if listing.status != ListingStatus::Moderation {
    return Err(FlowError::NotInModeration(listing.status));
  }
  Ok(listing)
}

/// Puts the listing in front of the primary moderator and remembers the
/// message carrying the action buttons.
#[instrument(skip(ctx))]
pub async fn enqueue(ctx: &AppContext, listing_id: i64) -> FlowResult<MessageId> {
  let Some(inbox) = ctx.moderation_inbox() else {
    warn!(listing_id, "no moderator configured, listing stays unreviewed");
    return Err(FlowError::ModerationUnavailable);
  };

  let listing = load_listing(ctx, listing_id).await?;
  let photos = ctx.store().list_photos(listing_id).await?;
  let caption = moderation_caption(&listing);
  let keyboard = ReplyMarkup::InlineKeyboard(moderation_keyboard(listing_id));
  let messenger = ctx.messenger();

  let action_message = if photos.is_empty() {
    messenger.send_text(inbox, caption, Some(keyboard)).await?
  } else {
    send_albums(messenger, inbox, &photos, &caption).await?;
    messenger
      .send_text(inbox, Body::Plain(CHOOSE_ACTION_TEXT.to_string()), Some(keyboard))
      .await?
  };

  ctx.store().set_moderator_message(listing_id, action_message).await?;
  info!(listing_id, chat_id = %inbox, photos = photos.len(), "listing queued for moderation");
  Ok(action_message)
}

/// Posts the listing to the channel. Returns the first channel message id.
#[instrument(skip(ctx))]
pub async fn publish(ctx: &AppContext, moderator_chat: ChatId, listing_id: i64) -> FlowResult<MessageId> {
  let listing = load_pending(ctx, listing_id).await?;
  let channel = ctx.channel().ok_or(FlowError::ChannelUnavailable)?;
  let photos = ctx.store().list_photos(listing_id).await?;
  let caption = channel_caption(&listing);
  let messenger = ctx.messenger();

  let posted = match send_albums(messenger, channel, &photos, &caption).await? {
    Some(first) => first,
    None => messenger.send_text(channel, caption, None).await?,
  };

  ctx
    .store()
    .set_status(listing_id, ListingStatus::Published, Some(posted))
    .await?;
  info!(listing_id, channel_message_id = %posted, "listing published");

  if let Some(previous) = listing.channel_message_id {
    delete_quietly(messenger, channel, previous).await;
  }

  notify(
    messenger,
    ChatId(listing.seller_tg_id),
    format!("✅ Your listing \"{}\" is published!", listing.name),
  )
  .await;
  if let Some(action_message) = listing.moderator_message_id {
    delete_quietly(messenger, moderator_chat, action_message).await;
  }
  Ok(posted)
}

/// Rejected listings are not kept: the row and its photos are removed.
#[instrument(skip(ctx))]
pub async fn reject(ctx: &AppContext, moderator_chat: ChatId, listing_id: i64) -> FlowResult<()> {
  let listing = load_pending(ctx, listing_id).await?;
  ctx
    .store()
    .set_status(listing_id, ListingStatus::Rejected, None)
    .await?;
  ctx.store().delete_listing(listing_id).await?;
  info!(listing_id, "listing rejected and removed");

  let messenger = ctx.messenger();
  notify(
    messenger,
    ChatId(listing.seller_tg_id),
    format!("❌ Your listing \"{}\" was rejected by the moderator.", listing.name),
  )
  .await;
  if let Some(action_message) = listing.moderator_message_id {
    delete_quietly(messenger, moderator_chat, action_message).await;
  }
  Ok(())
}

fn photo_label(index: usize, total: usize) -> Body {
  Body::Plain(format!("Photo {}/{total}", index + 1))
}

/// Sends every photo on its own with a rotate button, followed by the Done
/// control. The returned draft becomes the moderator's conversation state.
#[instrument(skip(ctx))]
pub async fn start_rotation(ctx: &AppContext, chat: ChatId, listing_id: i64) -> FlowResult<RotationDraft> {
  load_pending(ctx, listing_id).await?;
  let photos = ctx.store().list_photos(listing_id).await?;
  if photos.is_empty() {
    return Err(FlowError::NoPhotos);
  }

  let messenger = ctx.messenger();
  let total = photos.len();
  for (index, photo) in photos.iter().enumerate() {
    messenger
      .send_photo(
        chat,
        photo.clone(),
        Some(photo_label(index, total)),
        Some(rotation_keyboard(listing_id, index)),
      )
      .await?;
  }
  messenger
    .send_text(
      chat,
      Body::Plain(ROTATION_HINT_TEXT.to_string()),
      Some(ReplyMarkup::InlineKeyboard(rotation_done_keyboard(listing_id))),
    )
    .await?;

  info!(listing_id, chat_id = %chat, photos = total, "rotation session started");
  Ok(RotationDraft::new(listing_id, photos, Utc::now()))
}

/// Turns one photo a quarter clockwise inside the message that shows it.
#[instrument(skip(ctx, draft))]
pub async fn rotate_photo(
  ctx: &AppContext,
  draft: &mut RotationDraft,
  chat: ChatId,
  message_id: MessageId,
  listing_id: i64,
  index: usize,
) -> FlowResult<FileId> {
  if draft.listing_id != listing_id || index >= draft.working.len() {
    return Err(FlowError::RotationMismatch);
  }

  let messenger = ctx.messenger();
  let bytes = messenger.download_photo(&draft.working[index]).await?;
  let rotated = rotate_clockwise(&bytes)?;
  let replaced = messenger
    .replace_photo(
      chat,
      message_id,
      rotated,
      Some(photo_label(index, draft.working.len())),
      rotation_keyboard(listing_id, index),
    )
    .await?;

  draft.working[index] = replaced.clone();
  draft.touched_at = Utc::now();
  info!(listing_id, index, "photo rotated");
  Ok(replaced)
}

/// Stores the rotated photo set and sends the listing back to the queue.
#[instrument(skip(ctx, draft))]
pub async fn finish_rotation(ctx: &AppContext, draft: &RotationDraft, listing_id: i64) -> FlowResult<()> {
  if draft.listing_id != listing_id {
    return Err(FlowError::RotationMismatch);
  }
  let listing = load_listing(ctx, listing_id).await?;

  ctx.store().replace_photos(listing_id, &draft.working).await?;
  ctx
    .store()
    .set_status(listing_id, ListingStatus::Moderation, None)
    .await?;
  info!(listing_id, changed = draft.changed_count(), "rotated photos saved");

  let messenger = ctx.messenger();
  notify(
    messenger,
    ChatId(listing.seller_tg_id),
    format!("🔄 The moderator corrected the photos of \"{}\".", listing.name),
  )
  .await;
  if let (Some(inbox), Some(action_message)) = (ctx.moderation_inbox(), listing.moderator_message_id) {
    delete_quietly(messenger, inbox, action_message).await;
  }

  enqueue(ctx, listing_id).await?;
  Ok(())
}
