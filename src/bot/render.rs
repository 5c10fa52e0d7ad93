use teloxide::utils::markdown;

use crate::bot::wizard::ListingDraft;
use crate::bot::wizard::Prompt;
use crate::bot::wizard::WizardStep;
use crate::messenger::Body;
use crate::models::ListingRow;
use crate::models::ListingSummary;
use crate::pricing::COMMISSION_PERCENT;
use crate::pricing::format_uah;

pub const MAIN_MENU_TEXT: &str = "🛍 What would you like to do?";

fn seller_mention(listing: &ListingRow) -> String {
  match listing.seller_username.as_deref() {
    Some(username) => markdown::escape(&format!("@{username}")),
    None => markdown::link(
      &format!("tg://user?id={}", listing.seller_tg_id),
      &markdown::escape("seller"),
    ),
  }
}

fn listing_fields(listing: &ListingRow) -> String {
  let mut text = format!(
    "📦 {}\n💰 Price: {}",
    markdown::bold(&markdown::escape(&listing.name)),
    markdown::escape(&listing.price)
  );
  if let Some(location) = listing.location.as_deref() {
    text.push_str(&format!("\n📍 Location: {}", markdown::escape(location)));
  }
  text.push_str(&format!(
    "\n\n{}\n\n🚚 Delivery: {}\n👤 Seller: {}",
    markdown::escape(&listing.description),
    markdown::escape(&listing.delivery),
    seller_mention(listing)
  ));
  text
}

/// Caption shown to the moderator above the action buttons.
pub fn moderation_caption(listing: &ListingRow) -> Body {
  let header = markdown::bold(&markdown::escape(&format!("🆕 New listing for moderation #{}", listing.id)));
  Body::Markdown(format!("{header}\n\n{}", listing_fields(listing)))
}

pub fn channel_caption(listing: &ListingRow) -> Body {
  Body::Markdown(listing_fields(listing))
}

pub fn prompt_text(prompt: &Prompt) -> String {
  match prompt {
    Prompt::Ask(step) => ask_text(*step).to_string(),
    Prompt::PhotoAdded { total } => {
      format!("📸 Photo {total} added. Send more, or /done_photos when finished.")
    },
    Prompt::PhotosRequired => "Send at least one photo, or /skip_photos to continue without photos.".to_string(),
    Prompt::ExpectedText(step) => format!("Please answer with text.\n\n{}", ask_text(*step)),
    Prompt::ExpectedPhoto => {
      "Send a photo, /done_photos when finished, or /skip_photos to continue without photos.".to_string()
    },
    Prompt::ChooseConfirmation => "Please use the buttons below to confirm or cancel.".to_string(),
  }
}

fn ask_text(step: WizardStep) -> &'static str {
  match step {
    WizardStep::AwaitingName => "📝 What are you selling? Send the item name.",
    WizardStep::AwaitingPrice => "💰 Send the price, for example 500 грн or 20 USD.",
    WizardStep::AwaitingPhotos => "📸 Send photos of the item. Use /done_photos when finished or /skip_photos to skip.",
    WizardStep::AwaitingLocation => "📍 Where is the item? Send a city, or /skip_location to skip.",
    WizardStep::AwaitingDescription => "🧾 Describe the item: condition, size, anything buyers should know.",
    WizardStep::AwaitingDelivery => "🚚 How will you deliver? Pick an option or type your own.",
    WizardStep::AwaitingConfirmation => "Check your listing and confirm.",
  }
}

/// Plain text recap shown at the confirmation step.
pub fn draft_summary(draft: &ListingDraft) -> String {
  let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
  let mut text = format!(
    "Your listing:\n\n📦 {}\n💰 Price: {}\n📸 Photos: {}",
    field(&draft.name),
    field(&draft.price),
    draft.photos.len()
  );
  if let Some(location) = draft.location.as_deref() {
    text.push_str(&format!("\n📍 Location: {location}"));
  }
  text.push_str(&format!(
    "\n🧾 {}\n🚚 Delivery: {}\n\nConfirm to send it to moderation.",
    field(&draft.description),
    field(&draft.delivery)
  ));
  text
}

pub fn listing_summary(listing: &ListingSummary) -> String {
  format!(
    "📦 {}\n💰 {}\n{}\n🗓 {}\n👁 Views: {}",
    listing.name,
    listing.price,
    listing.status.label(),
    listing.created_at.format("%d.%m.%Y"),
    listing.views
  )
}

pub fn rules_text(payment_card: Option<&str>) -> String {
  let card = payment_card.unwrap_or("not configured yet");
  format!(
    "📖 Rules\n\n\
     1. Every listing is checked by a moderator before it appears in the channel.\n\
     2. Describe the item honestly and add real photos.\n\
     3. After a sale, mark the listing as sold and pay a {COMMISSION_PERCENT}% commission.\n\
     4. A listing can be republished up to 3 times.\n\n\
     💳 Payment card: {card}"
  )
}

pub fn sold_text(commission_minor: i64, payment_card: Option<&str>) -> String {
  let payment = match payment_card {
    Some(card) => format!("Please transfer it to the card {card}."),
    None => "Payment details are not configured yet, a moderator will contact you.".to_string(),
  };
  format!(
    "💸 Marked as sold. Commission ({COMMISSION_PERCENT}%): {}.\n{payment}",
    format_uah(commission_minor)
  )
}
