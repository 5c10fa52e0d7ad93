use std::sync::Arc;

use anyhow::Context;
use chrono::DateTime;
use chrono::Utc;
use teloxide::dispatching::UpdateHandler;
use teloxide::dispatching::dialogue::Dialogue;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::types::ChatId;
use teloxide::types::Message;
use teloxide::types::ReplyMarkup;
use teloxide::types::User;
use teloxide::utils::command::BotCommands;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::Command;
use crate::bot::DialogueStorage;
use crate::bot::HandlerResult;
use crate::bot::callbacks::CallbackAction;
use crate::bot::context::AppContext;
use crate::bot::error::FlowError;
use crate::bot::keyboards::ADD_LISTING_LABEL;
use crate::bot::keyboards::MY_LISTINGS_LABEL;
use crate::bot::keyboards::RULES_LABEL;
use crate::bot::keyboards::confirmation_keyboard;
use crate::bot::keyboards::delivery_keyboard;
use crate::bot::keyboards::main_menu_keyboard;
use crate::bot::keyboards::seller_actions_keyboard;
use crate::bot::moderation;
use crate::bot::render;
use crate::bot::render::MAIN_MENU_TEXT;
use crate::bot::seller;
use crate::bot::state::ConversationState;
use crate::bot::state::RotationDraft;
use crate::bot::wizard::ListingDraft;
use crate::bot::wizard::Prompt;
use crate::bot::wizard::Transition;
use crate::bot::wizard::WizardInput;
use crate::bot::wizard::WizardStep;
use crate::bot::wizard::required_text;
use crate::messenger::Body;

type SharedContext = Arc<AppContext>;
type BotDialogue = Dialogue<ConversationState, DialogueStorage>;

const WELCOME_TEXT: &str = "👋 Welcome to the marketplace! Add a listing and a moderator will publish it to the channel.";
const EXPIRED_TEXT: &str = "⌛ Your unfinished draft expired. Start again from the menu.";

pub fn build_schema() -> UpdateHandler<anyhow::Error> {
  let message_handler = Update::filter_message()
    .enter_dialogue::<Message, DialogueStorage, ConversationState>()
    .branch(command_branch())
    .branch(dptree::filter(draft_expired).endpoint(handle_expired_draft))
    .branch(dptree::case![ConversationState::Wizard(draft)].endpoint(handle_wizard_message))
    .branch(dptree::case![ConversationState::ChangePrice { listing_id, touched_at }].endpoint(handle_price_message))
    .branch(dptree::endpoint(handle_idle_text));

  let action_handler = dptree::filter_map(|query: CallbackQuery| query.data.as_deref().and_then(CallbackAction::parse))
    .branch(dptree::filter(moderator_action).endpoint(handle_moderation_callback))
    .branch(dptree::filter(|action: CallbackAction| !action.requires_moderator()).endpoint(handle_seller_callback))
    .branch(dptree::endpoint(handle_forbidden_callback));

  let callback_handler = Update::filter_callback_query()
    .enter_dialogue::<CallbackQuery, DialogueStorage, ConversationState>()
    .branch(action_handler)
    .branch(dptree::endpoint(handle_unknown_callback));

  dptree::entry().branch(message_handler).branch(callback_handler)
}

fn command_branch() -> UpdateHandler<anyhow::Error> {
  dptree::entry()
    .filter_command::<Command>()
    .branch(dptree::case![Command::Start].endpoint(handle_start))
    .branch(dptree::case![Command::Help].endpoint(handle_help))
    .branch(dptree::case![Command::Sell].endpoint(handle_sell))
    .branch(dptree::case![Command::MyListings].endpoint(handle_my_listings))
    .branch(dptree::case![Command::Rules].endpoint(handle_rules))
    .branch(dptree::case![Command::Cancel].endpoint(handle_cancel))
}

fn draft_expired(state: ConversationState, ctx: SharedContext) -> bool {
  state.is_expired(ctx.settings().draft_idle_timeout, Utc::now())
}

fn moderator_action(action: CallbackAction, query: CallbackQuery, ctx: SharedContext) -> bool {
  action.requires_moderator() && ctx.is_moderator(query.from.id.0 as i64)
}

fn message_text(msg: &Message) -> Option<&str> {
  msg.text().or_else(|| msg.caption())
}

async fn reply(ctx: &AppContext, chat: ChatId, text: impl Into<String>, markup: Option<ReplyMarkup>) -> HandlerResult {
  ctx
    .messenger()
    .send_text(chat, Body::Plain(text.into()), markup)
    .await?;
  Ok(())
}

async fn reply_with_menu(ctx: &AppContext, chat: ChatId, text: impl Into<String>) -> HandlerResult {
  reply(ctx, chat, text, Some(main_menu_keyboard())).await
}

fn log_flow_error(err: &FlowError, user_id: i64) {
  match err {
    FlowError::Remote(source) => warn!(user_id, error = %source, "workflow call failed"),
    FlowError::NotQueued { listing_id, source } => {
      warn!(user_id, listing_id, error = %source, "listing stored but not queued")
    },
    other => info!(user_id, reason = %other, "workflow refused action"),
  }
}

#[instrument(skip(ctx, dialogue, msg))]
async fn handle_start(dialogue: BotDialogue, ctx: SharedContext, msg: Message) -> HandlerResult {
  dialogue.reset().await?;
  let user = msg.from.as_ref().context("message missing sender")?;
  let username = user.username.as_deref().unwrap_or("-");
  info!(user_id = user.id.0, chat_id = %msg.chat.id, username, "received /start command");
  reply_with_menu(&ctx, msg.chat.id, format!("{WELCOME_TEXT}\n\n{MAIN_MENU_TEXT}")).await
}

#[instrument(skip(ctx, msg))]
async fn handle_help(ctx: SharedContext, msg: Message) -> HandlerResult {
  info!(chat_id = %msg.chat.id, "received /help command");
  let mut text = Command::descriptions().to_string();
  text.push_str(
    "\n\nWhile adding a listing: /done_photos finishes the photo step, /skip_photos and /skip_location skip a \
     step, /cancel discards the draft.",
  );
  reply(&ctx, msg.chat.id, text, None).await
}

#[instrument(skip(ctx, dialogue, msg))]
async fn handle_sell(dialogue: BotDialogue, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user = msg.from.as_ref().context("message missing sender")?;
  start_wizard(&dialogue, &ctx, msg.chat.id, user).await
}

async fn start_wizard(dialogue: &BotDialogue, ctx: &AppContext, chat: ChatId, user: &User) -> HandlerResult {
  let draft = ListingDraft::new(user.id.0 as i64, user.username.clone(), Utc::now());
  dialogue.update(ConversationState::Wizard(draft)).await?;
  info!(user_id = user.id.0, chat_id = %chat, "listing wizard started");
  reply(
    ctx,
    chat,
    render::prompt_text(&Prompt::Ask(WizardStep::AwaitingName)),
    Some(ReplyMarkup::kb_remove()),
  )
  .await
}

#[instrument(skip(ctx, msg))]
async fn handle_my_listings(ctx: SharedContext, msg: Message) -> HandlerResult {
  let user = msg.from.as_ref().context("message missing sender")?;
  send_listings(&ctx, msg.chat.id, user.id.0 as i64).await
}

async fn send_listings(ctx: &AppContext, chat: ChatId, seller_tg_id: i64) -> HandlerResult {
  let listings = match seller::list_listings(ctx, seller_tg_id).await {
    Ok(listings) => listings,
    Err(err) => {
      log_flow_error(&err, seller_tg_id);
      return reply(ctx, chat, err.user_message(), None).await;
    },
  };

  if listings.is_empty() {
    info!(user_id = seller_tg_id, "no listings to display");
    return reply_with_menu(ctx, chat, "📋 You have no listings yet.").await;
  }

  info!(user_id = seller_tg_id, count = listings.len(), "sending seller listings");
  reply(ctx, chat, format!("📋 Your listings ({}):", listings.len()), None).await?;
  for listing in &listings {
    let keyboard = seller_actions_keyboard(listing, ctx.channel());
    reply(
      ctx,
      chat,
      render::listing_summary(listing),
      Some(ReplyMarkup::InlineKeyboard(keyboard)),
    )
    .await?;
  }
  Ok(())
}

#[instrument(skip(ctx, msg))]
async fn handle_rules(ctx: SharedContext, msg: Message) -> HandlerResult {
  let card = ctx.settings().payment_card.as_deref();
  reply(&ctx, msg.chat.id, render::rules_text(card), None).await
}

#[instrument(skip(ctx, dialogue, msg))]
async fn handle_cancel(dialogue: BotDialogue, ctx: SharedContext, msg: Message) -> HandlerResult {
  let had_draft = !matches!(dialogue.get().await?, None | Some(ConversationState::Idle));
  dialogue.reset().await?;
  info!(chat_id = %msg.chat.id, had_draft, "conversation cancelled");
  let text = if had_draft { "❌ Draft discarded." } else { "Nothing to cancel." };
  reply_with_menu(&ctx, msg.chat.id, text).await
}

#[instrument(skip(ctx, dialogue, msg))]
async fn handle_expired_draft(dialogue: BotDialogue, ctx: SharedContext, msg: Message) -> HandlerResult {
  dialogue.reset().await?;
  info!(chat_id = %msg.chat.id, "discarded expired draft");
  reply_with_menu(&ctx, msg.chat.id, EXPIRED_TEXT).await
}

fn prompt_markup(prompt: &Prompt) -> Option<ReplyMarkup> {
  match prompt {
    Prompt::Ask(WizardStep::AwaitingDelivery) | Prompt::ExpectedText(WizardStep::AwaitingDelivery) => {
      Some(delivery_keyboard())
    },
    Prompt::Ask(WizardStep::AwaitingConfirmation) | Prompt::ChooseConfirmation => Some(confirmation_keyboard()),
    _ => None,
  }
}

#[instrument(skip(ctx, dialogue, msg, draft), fields(step = ?draft.step))]
async fn handle_wizard_message(
  dialogue: BotDialogue,
  ctx: SharedContext,
  msg: Message,
  draft: ListingDraft,
) -> HandlerResult {
  let chat = msg.chat.id;
  let photo = msg.photo().and_then(|photos| photos.last()).map(|photo| photo.file.id.clone());
  // Stickers, voice notes and the like re-prompt the same way empty text does.
  let input = WizardInput::parse(draft.step, message_text(&msg), photo).unwrap_or(WizardInput::Text(String::new()));

  match draft.apply(input, Utc::now()) {
    Transition::Continue { draft, prompt } => {
      let text = if prompt == Prompt::Ask(WizardStep::AwaitingConfirmation) {
        render::draft_summary(&draft)
      } else {
        render::prompt_text(&prompt)
      };
      dialogue.update(ConversationState::Wizard(draft)).await?;
      reply(&ctx, chat, text, prompt_markup(&prompt)).await
    },
    Transition::Submit(draft) => {
      dialogue.reset().await?;
      match seller::submit_listing(&ctx, &draft).await {
        Ok(listing_id) => {
          info!(listing_id, chat_id = %chat, "listing sent to moderation");
          reply_with_menu(
            &ctx,
            chat,
            "✅ Your listing was sent to moderation. You will get a message once it is reviewed.",
          )
          .await
        },
        Err(err) => {
          log_flow_error(&err, draft.seller_tg_id);
          reply_with_menu(&ctx, chat, err.user_message()).await
        },
      }
    },
    Transition::Cancelled => {
      dialogue.reset().await?;
      info!(chat_id = %chat, "listing draft cancelled");
      reply_with_menu(&ctx, chat, "❌ Draft discarded.").await
    },
  }
}

#[instrument(skip(ctx, dialogue, msg))]
async fn handle_price_message(
  dialogue: BotDialogue,
  ctx: SharedContext,
  msg: Message,
  (listing_id, _touched_at): (i64, DateTime<Utc>),
) -> HandlerResult {
  let chat = msg.chat.id;
  let user = msg.from.as_ref().context("message missing sender")?;
  let Some(price) = message_text(&msg).and_then(required_text) else {
    return reply(&ctx, chat, "Send the new price as text, or /cancel.", None).await;
  };

  dialogue.reset().await?;
  let user_id = user.id.0 as i64;
  match seller::apply_price_change(&ctx, user_id, listing_id, &price).await {
    Ok(()) => {
      reply_with_menu(
        &ctx,
        chat,
        format!("✅ Price changed to {price}. The listing is back on moderation."),
      )
      .await
    },
    Err(err) => {
      log_flow_error(&err, user_id);
      reply_with_menu(&ctx, chat, err.user_message()).await
    },
  }
}

#[instrument(skip(ctx, dialogue, msg))]
async fn handle_idle_text(dialogue: BotDialogue, ctx: SharedContext, msg: Message) -> HandlerResult {
  let chat = msg.chat.id;
  let Some(user) = msg.from.as_ref() else {
    return Ok(());
  };

  match message_text(&msg).map(str::trim) {
    Some(ADD_LISTING_LABEL) => start_wizard(&dialogue, &ctx, chat, user).await,
    Some(MY_LISTINGS_LABEL) => send_listings(&ctx, chat, user.id.0 as i64).await,
    Some(RULES_LABEL) => {
      let card = ctx.settings().payment_card.as_deref();
      reply(&ctx, chat, render::rules_text(card), None).await
    },
    _ => reply_with_menu(&ctx, chat, MAIN_MENU_TEXT).await,
  }
}

async fn answer(bot: &Bot, query: &CallbackQuery, text: String, alert: bool) -> HandlerResult {
  bot
    .answer_callback_query(query.id.clone())
    .text(text)
    .show_alert(alert)
    .await?;
  Ok(())
}

async fn answer_outcome(bot: &Bot, query: &CallbackQuery, outcome: Result<String, FlowError>) -> HandlerResult {
  match outcome {
    Ok(text) => answer(bot, query, text, false).await,
    Err(err) => {
      log_flow_error(&err, query.from.id.0 as i64);
      answer(bot, query, err.user_message(), true).await
    },
  }
}

/// The moderator's rotation session, unless it is missing or went stale.
async fn active_rotation(dialogue: &BotDialogue, ctx: &AppContext) -> anyhow::Result<Option<RotationDraft>> {
  match dialogue.get().await? {
    Some(state @ ConversationState::RotatingPhotos(_))
      if state.is_expired(ctx.settings().draft_idle_timeout, Utc::now()) =>
    {
      dialogue.reset().await?;
      Ok(None)
    },
    Some(ConversationState::RotatingPhotos(draft)) => Ok(Some(draft)),
    _ => Ok(None),
  }
}

#[instrument(skip(bot, ctx, dialogue, query))]
async fn handle_moderation_callback(
  bot: Bot,
  dialogue: BotDialogue,
  ctx: SharedContext,
  query: CallbackQuery,
  action: CallbackAction,
) -> HandlerResult {
  let user_id = query.from.id.0 as i64;
  let Some((chat, message_id)) = query.message.as_ref().map(|message| (message.chat().id, message.id())) else {
    return answer(&bot, &query, "This message is no longer available.".to_string(), true).await;
  };
  info!(user_id, chat_id = %chat, callback = %action, "handling moderation action");

  let outcome = match action {
    CallbackAction::Publish(listing_id) => moderation::publish(&ctx, chat, listing_id)
      .await
      .map(|_| "✅ Published".to_string()),
    CallbackAction::Reject(listing_id) => moderation::reject(&ctx, chat, listing_id)
      .await
      .map(|()| "❌ Rejected and removed".to_string()),
    CallbackAction::RotatePhotos(listing_id) => match moderation::start_rotation(&ctx, chat, listing_id).await {
      Ok(draft) => {
        dialogue.update(ConversationState::RotatingPhotos(draft)).await?;
        Ok("🔄 Rotate the photos below".to_string())
      },
      Err(err) => Err(err),
    },
    CallbackAction::RotateOne { listing_id, index } => match active_rotation(&dialogue, &ctx).await? {
      Some(mut draft) => match moderation::rotate_photo(&ctx, &mut draft, chat, message_id, listing_id, index).await {
        Ok(_) => {
          dialogue.update(ConversationState::RotatingPhotos(draft)).await?;
          Ok("🔃 Rotated".to_string())
        },
        Err(err) => Err(err),
      },
      None => Err(FlowError::RotationMismatch),
    },
    CallbackAction::RotationDone(listing_id) => match active_rotation(&dialogue, &ctx).await? {
      Some(draft) => match moderation::finish_rotation(&ctx, &draft, listing_id).await {
        Ok(()) => {
          dialogue.reset().await?;
          Ok("✅ Photos saved".to_string())
        },
        Err(err) => Err(err),
      },
      None => Err(FlowError::RotationMismatch),
    },
    other => {
      warn!(callback = %other, "seller action reached the moderation handler");
      return Ok(());
    },
  };

  answer_outcome(&bot, &query, outcome).await
}

#[instrument(skip(bot, ctx, dialogue, query))]
async fn handle_seller_callback(
  bot: Bot,
  dialogue: BotDialogue,
  ctx: SharedContext,
  query: CallbackQuery,
  action: CallbackAction,
) -> HandlerResult {
  let user_id = query.from.id.0 as i64;
  let Some((chat, message_id)) = query.message.as_ref().map(|message| (message.chat().id, message.id())) else {
    return answer(&bot, &query, "This message is no longer available.".to_string(), true).await;
  };
  info!(user_id, chat_id = %chat, callback = %action, "handling seller action");

  let outcome = match action {
    CallbackAction::Republish(listing_id) => match seller::republish(&ctx, user_id, listing_id).await {
      Ok(remaining) => {
        reply(
          &ctx,
          chat,
          format!("🔁 Sent to moderation again. Republish attempts left: {remaining}."),
          None,
        )
        .await?;
        Ok("🔁 Republished".to_string())
      },
      Err(err) => Err(err),
    },
    CallbackAction::Sold(listing_id) => match seller::mark_sold(&ctx, user_id, listing_id).await {
      Ok(commission) => {
        let card = ctx.settings().payment_card.as_deref();
        reply(&ctx, chat, render::sold_text(commission, card), None).await?;
        Ok("💸 Marked as sold".to_string())
      },
      Err(err) => Err(err),
    },
    CallbackAction::ChangePrice(listing_id) => match seller::begin_price_change(&ctx, user_id, listing_id).await {
      Ok(listing) => {
        dialogue
          .update(ConversationState::ChangePrice {
            listing_id,
            touched_at: Utc::now(),
          })
          .await?;
        reply(
          &ctx,
          chat,
          format!("✏ Send the new price for \"{}\" (now {}).", listing.name, listing.price),
          Some(ReplyMarkup::kb_remove()),
        )
        .await?;
        Ok("✏ Waiting for the new price".to_string())
      },
      Err(err) => Err(err),
    },
    CallbackAction::Delete(listing_id) => match seller::delete_listing(&ctx, user_id, listing_id).await {
      Ok(()) => {
        if let Err(err) = ctx.messenger().delete_message(chat, message_id).await {
          warn!(listing_id, error = %err, "failed to remove listing card");
        }
        Ok("🗑 Listing deleted".to_string())
      },
      Err(err) => Err(err),
    },
    other => {
      warn!(callback = %other, "moderation action reached the seller handler");
      return Ok(());
    },
  };

  answer_outcome(&bot, &query, outcome).await
}

#[instrument(skip(bot, query))]
async fn handle_forbidden_callback(bot: Bot, query: CallbackQuery, action: CallbackAction) -> HandlerResult {
  warn!(user_id = query.from.id.0, callback = %action, "moderation action from a non-moderator");
  answer(&bot, &query, "Only moderators can do this.".to_string(), true).await
}

#[instrument(skip(bot, query))]
async fn handle_unknown_callback(bot: Bot, query: CallbackQuery) -> HandlerResult {
  warn!(
    user_id = query.from.id.0,
    callback = query.data.as_deref().unwrap_or("<empty>"),
    "unknown callback payload"
  );
  bot.answer_callback_query(query.id).await?;
  Ok(())
}
