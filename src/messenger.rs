//! Outbound side of the chat platform.
//!
//! Workflows talk to Telegram only through [`Messenger`], so the listing state
//! machine can be exercised without a live bot.

use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::FileId;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::types::InputFile;
use teloxide::types::InputMedia;
use teloxide::types::InputMediaPhoto;
use teloxide::types::MessageId;
use teloxide::types::ParseMode;
use teloxide::types::ReplyMarkup;
use tracing::debug;
use tracing::instrument;

/// Telegram refuses media groups larger than this.
pub const MEDIA_GROUP_LIMIT: usize = 10;

/// Longest caption Telegram accepts on a photo or album item.
pub const CAPTION_LIMIT: usize = 1024;

/// Message body together with how Telegram should parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
  Plain(String),
  /// Already escaped MarkdownV2.
  Markdown(String),
}

impl Body {
  pub fn text(&self) -> &str {
    match self {
      Self::Plain(text) | Self::Markdown(text) => text,
    }
  }

  fn parse_mode(&self) -> Option<ParseMode> {
    match self {
      Self::Plain(_) => None,
      Self::Markdown(_) => Some(ParseMode::MarkdownV2),
    }
  }
}

#[async_trait]
pub trait Messenger: Send + Sync {
  async fn send_text(&self, chat: ChatId, body: Body, markup: Option<ReplyMarkup>) -> Result<MessageId>;

  async fn send_photo(
    &self,
    chat: ChatId,
    photo: FileId,
    caption: Option<Body>,
    keyboard: Option<InlineKeyboardMarkup>,
  ) -> Result<MessageId>;

  /// Sends up to [`MEDIA_GROUP_LIMIT`] photos as one album; the caption goes on
  /// the first item.
  async fn send_media_group(&self, chat: ChatId, photos: &[FileId], caption: Option<Body>) -> Result<Vec<MessageId>>;

  async fn edit_markup(&self, chat: ChatId, message_id: MessageId, keyboard: InlineKeyboardMarkup) -> Result<()>;

  async fn delete_message(&self, chat: ChatId, message_id: MessageId) -> Result<()>;

  async fn download_photo(&self, photo: &FileId) -> Result<Vec<u8>>;

  /// Uploads `bytes` as the new photo of an existing message and returns the
  /// file reference Telegram assigned to it.
  async fn replace_photo(
    &self,
    chat: ChatId,
    message_id: MessageId,
    bytes: Vec<u8>,
    caption: Option<Body>,
    keyboard: InlineKeyboardMarkup,
  ) -> Result<FileId>;
}

pub struct TelegramMessenger {
  bot: Bot,
}

impl TelegramMessenger {
  pub fn new(bot: Bot) -> Self {
    Self { bot }
  }
}

fn media_photo(file: InputFile, caption: Option<&Body>) -> InputMedia {
  let mut photo = InputMediaPhoto::new(file);
  if let Some(body) = caption {
    photo = photo.caption(body.text().to_string());
    if let Some(mode) = body.parse_mode() {
      photo = photo.parse_mode(mode);
    }
  }
  InputMedia::Photo(photo)
}

#[async_trait]
impl Messenger for TelegramMessenger {
  #[instrument(skip(self, body, markup))]
  async fn send_text(&self, chat: ChatId, body: Body, markup: Option<ReplyMarkup>) -> Result<MessageId> {
    let mut request = self.bot.send_message(chat, body.text().to_string());
    if let Some(mode) = body.parse_mode() {
      request = request.parse_mode(mode);
    }
    if let Some(markup) = markup {
      request = request.reply_markup(markup);
    }
    let sent = request.await?;
    Ok(sent.id)
  }

  #[instrument(skip(self, caption, keyboard))]
  async fn send_photo(
    &self,
    chat: ChatId,
    photo: FileId,
    caption: Option<Body>,
    keyboard: Option<InlineKeyboardMarkup>,
  ) -> Result<MessageId> {
    let mut request = self.bot.send_photo(chat, InputFile::file_id(photo));
    if let Some(body) = caption {
      if let Some(mode) = body.parse_mode() {
        request = request.parse_mode(mode);
      }
      request = request.caption(body.text().to_string());
    }
    if let Some(keyboard) = keyboard {
      request = request.reply_markup(keyboard);
    }
    let sent = request.await?;
    Ok(sent.id)
  }

  #[instrument(skip(self, photos, caption), fields(count = photos.len()))]
  async fn send_media_group(&self, chat: ChatId, photos: &[FileId], caption: Option<Body>) -> Result<Vec<MessageId>> {
    anyhow::ensure!(
      (1 ..= MEDIA_GROUP_LIMIT).contains(&photos.len()),
      "media group must hold 1..={MEDIA_GROUP_LIMIT} photos, got {}",
      photos.len()
    );
    let media = photos
      .iter()
      .enumerate()
      .map(|(index, file_id)| {
        let caption = if index == 0 { caption.as_ref() } else { None };
        media_photo(InputFile::file_id(file_id.clone()), caption)
      })
      .collect::<Vec<_>>();
    let sent = self.bot.send_media_group(chat, media).await?;
    Ok(sent.into_iter().map(|message| message.id).collect())
  }

  #[instrument(skip(self, keyboard))]
  async fn edit_markup(&self, chat: ChatId, message_id: MessageId, keyboard: InlineKeyboardMarkup) -> Result<()> {
    match self
      .bot
      .edit_message_reply_markup(chat, message_id)
      .reply_markup(keyboard)
      .await
    {
      Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
      Err(err) => Err(err.into()),
    }
  }

  #[instrument(skip(self))]
  async fn delete_message(&self, chat: ChatId, message_id: MessageId) -> Result<()> {
    self.bot.delete_message(chat, message_id).await?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn download_photo(&self, photo: &FileId) -> Result<Vec<u8>> {
    let file = self
      .bot
      .get_file(photo.clone())
      .await
      .context("failed to get file info")?;
    let mut buf = Vec::new();
    self
      .bot
      .download_file(&file.path, &mut buf)
      .await
      .context("failed to download file")?;
    debug!(file_id = %photo.0, size = buf.len(), "downloaded photo");
    Ok(buf)
  }

  #[instrument(skip(self, bytes, caption, keyboard), fields(size = bytes.len()))]
  async fn replace_photo(
    &self,
    chat: ChatId,
    message_id: MessageId,
    bytes: Vec<u8>,
    caption: Option<Body>,
    keyboard: InlineKeyboardMarkup,
  ) -> Result<FileId> {
    let file = InputFile::memory(bytes).file_name(format!("photo_{}.jpg", message_id.0));
    let edited = self
      .bot
      .edit_message_media(chat, message_id, media_photo(file, caption.as_ref()))
      .reply_markup(keyboard)
      .await?;
    edited
      .photo()
      .and_then(|sizes| sizes.last())
      .map(|size| size.file.id.clone())
      .context("edited message carries no photo")
  }
}
