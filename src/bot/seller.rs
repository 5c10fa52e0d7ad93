//! Actions a seller takes on their own listings.

use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::context::AppContext;
use crate::bot::error::FlowError;
use crate::bot::error::FlowResult;
use crate::bot::keyboards::MAX_REPUBLISH;
use crate::bot::moderation;
use crate::bot::wizard::ListingDraft;
use crate::models::ListingRow;
use crate::models::ListingStatus;
use crate::models::ListingSummary;
use crate::pricing::commission_minor;
use crate::pricing::parse_price;

async fn owned_listing(ctx: &AppContext, seller_tg_id: i64, listing_id: i64) -> FlowResult<ListingRow> {
  let listing = ctx
    .store()
    .get_listing(listing_id)
    .await?
    .ok_or(FlowError::NotFound)?;
  if listing.seller_tg_id != seller_tg_id {
    return Err(FlowError::NotOwner);
  }
  Ok(listing)
}

/// Removes the channel post of a listing, if it ever had one.
async fn retract_channel_post(ctx: &AppContext, listing: &ListingRow) {
  let (Some(channel), Some(message_id)) = (ctx.channel(), listing.channel_message_id) else {
    return;
  };
  if let Err(err) = ctx.messenger().delete_message(channel, message_id).await {
    warn!(listing_id = listing.id, error = %err, "failed to remove channel post");
  }
}

/// Stores a confirmed draft and sends it to moderation.
///
/// A photo that fails to insert is skipped so the rest of the listing still
/// reaches the moderator. An enqueue failure after the listing is stored comes
/// back as [`FlowError::NotQueued`].
#[instrument(skip(ctx, draft), fields(seller = draft.seller_tg_id))]
pub async fn submit_listing(ctx: &AppContext, draft: &ListingDraft) -> FlowResult<i64> {
  let listing = draft.to_new_listing()?;
  let listing_id = ctx.store().create_listing(&listing).await?;

  let mut position = 0;
  for photo in &draft.photos {
    match ctx.store().add_photo(listing_id, photo, position).await {
      Ok(()) => position += 1,
      Err(err) => warn!(listing_id, error = %err, "skipping photo that failed to save"),
    }
  }
  info!(listing_id, photos = position, "listing submitted");

  moderation::enqueue(ctx, listing_id)
    .await
    .map_err(|err| FlowError::NotQueued {
      listing_id,
      source: Box::new(err),
    })?;
  Ok(listing_id)
}

/// Sends the listing through moderation again. Returns the attempts left.
#[instrument(skip(ctx))]
pub async fn republish(ctx: &AppContext, seller_tg_id: i64, listing_id: i64) -> FlowResult<i32> {
  let listing = owned_listing(ctx, seller_tg_id, listing_id).await?;
  if listing.republish_count >= MAX_REPUBLISH {
    return Err(FlowError::RepublishLimit);
  }

  moderation::retire_action_message(ctx, &listing).await;
  let count = ctx.store().increment_republish_count(listing_id).await?;
  ctx
    .store()
    .set_status(listing_id, ListingStatus::Moderation, None)
    .await?;
  moderation::enqueue(ctx, listing_id).await?;
  info!(listing_id, count, "listing republished");
  Ok(MAX_REPUBLISH - count)
}

/// Marks the listing sold and returns the commission in hryvnia minor units.
#[instrument(skip(ctx))]
pub async fn mark_sold(ctx: &AppContext, seller_tg_id: i64, listing_id: i64) -> FlowResult<i64> {
  let listing = owned_listing(ctx, seller_tg_id, listing_id).await?;
  let price = parse_price(&listing.price)?;
  let commission = commission_minor(price, ctx.settings().usd_rate_minor)?;

  ctx
    .store()
    .set_status(listing_id, ListingStatus::Sold, None)
    .await?;
  retract_channel_post(ctx, &listing).await;
  info!(listing_id, commission, "listing sold");
  Ok(commission)
}

/// Checks ownership before the seller is asked for the new price.
pub async fn begin_price_change(ctx: &AppContext, seller_tg_id: i64, listing_id: i64) -> FlowResult<ListingRow> {
  owned_listing(ctx, seller_tg_id, listing_id).await
}

/// A changed price goes back through moderation.
#[instrument(skip(ctx))]
pub async fn apply_price_change(ctx: &AppContext, seller_tg_id: i64, listing_id: i64, price: &str) -> FlowResult<()> {
  let listing = owned_listing(ctx, seller_tg_id, listing_id).await?;
  moderation::retire_action_message(ctx, &listing).await;
  ctx.store().set_price(listing_id, price).await?;
  ctx
    .store()
    .set_status(listing_id, ListingStatus::Moderation, None)
    .await?;
  moderation::enqueue(ctx, listing_id).await?;
  info!(listing_id, "price changed");
  Ok(())
}

#[instrument(skip(ctx))]
pub async fn delete_listing(ctx: &AppContext, seller_tg_id: i64, listing_id: i64) -> FlowResult<()> {
  let listing = owned_listing(ctx, seller_tg_id, listing_id).await?;
  if !ctx.store().delete_listing(listing_id).await? {
    return Err(FlowError::NotFound);
  }
  retract_channel_post(ctx, &listing).await;
  info!(listing_id, "listing deleted by seller");
  Ok(())
}

pub async fn list_listings(ctx: &AppContext, seller_tg_id: i64) -> FlowResult<Vec<ListingSummary>> {
  Ok(ctx.store().list_seller_listings(seller_tg_id).await?)
}
