//! In-memory doubles for the store and messenger used by workflow tests.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

use anyhow::Result;
use anyhow::anyhow;
use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use image::DynamicImage;
use image::ImageFormat;
use image::RgbImage;
use teloxide::types::ChatId;
use teloxide::types::FileId;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::types::MessageId;
use teloxide::types::ReplyMarkup;

use crate::bot::context::AppContext;
use crate::config::Settings;
use crate::messenger::Body;
use crate::messenger::MEDIA_GROUP_LIMIT;
use crate::messenger::Messenger;
use crate::models::ListingRow;
use crate::models::ListingStatus;
use crate::models::ListingSummary;
use crate::models::NewListing;
use crate::store::ListingStore;

pub const MODERATOR: i64 = 1000;
pub const SELLER: i64 = 77;
pub const CHANNEL: ChatId = ChatId(-1005550001);

pub fn settings() -> Settings {
  Settings {
    moderators: vec![MODERATOR, 2000],
    channel: Some(CHANNEL),
    payment_card: Some("4441 1111 2222 3333".to_string()),
    usd_rate_minor: 4000,
    draft_idle_timeout: None,
  }
}

pub fn context(store: &Arc<MemoryStore>, messenger: &Arc<RecordingMessenger>, settings: Settings) -> AppContext {
  AppContext::new(store.clone(), messenger.clone(), settings)
}

pub fn new_listing(name: &str, price: &str) -> NewListing {
  NewListing {
    seller_tg_id: SELLER,
    seller_username: Some("seller".to_string()),
    name: name.to_string(),
    price: price.to_string(),
    location: None,
    description: "Good condition".to_string(),
    delivery: "Nova Poshta".to_string(),
  }
}

/// Small PNG with a gradient so rotations change the pixel layout.
pub fn png(width: u32, height: u32) -> Vec<u8> {
  let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([(x * 20) as u8, (y * 20) as u8, 128]));
  let mut out = Cursor::new(Vec::new());
  DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Png).unwrap();
  out.into_inner()
}

#[derive(Default)]
struct StoreInner {
  next_id: i64,
  listings: BTreeMap<i64, ListingRow>,
  photos: HashMap<i64, BTreeMap<i32, FileId>>,
}

#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<StoreInner>,
  failing: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn listing(&self, listing_id: i64) -> Option<ListingRow> {
    self.inner.lock().unwrap().listings.get(&listing_id).cloned()
  }

  pub fn photos(&self, listing_id: i64) -> Vec<FileId> {
    self
      .inner
      .lock()
      .unwrap()
      .photos
      .get(&listing_id)
      .map(|photos| photos.values().cloned().collect())
      .unwrap_or_default()
  }

  pub fn photo_rows(&self) -> usize {
    self.inner.lock().unwrap().photos.values().map(BTreeMap::len).sum()
  }

  fn check(&self) -> Result<()> {
    if self.failing.load(Ordering::SeqCst) {
      bail!("store is unavailable");
    }
    Ok(())
  }

  fn update(&self, listing_id: i64, apply: impl FnOnce(&mut ListingRow)) -> Result<()> {
    self.check()?;
    let mut inner = self.inner.lock().unwrap();
    let row = inner
      .listings
      .get_mut(&listing_id)
      .ok_or_else(|| anyhow!("listing {listing_id} does not exist"))?;
    apply(row);
    Ok(())
  }
}

#[async_trait]
impl ListingStore for MemoryStore {
  async fn create_listing(&self, listing: &NewListing) -> Result<i64> {
    self.check()?;
    let mut inner = self.inner.lock().unwrap();
    inner.next_id += 1;
    let id = inner.next_id;
    inner.listings.insert(id, ListingRow {
      id,
      seller_tg_id: listing.seller_tg_id,
      seller_username: listing.seller_username.clone(),
      name: listing.name.clone(),
      price: listing.price.clone(),
      location: listing.location.clone(),
      description: listing.description.clone(),
      delivery: listing.delivery.clone(),
      status: ListingStatus::Moderation,
      moderator_message_id: None,
      channel_message_id: None,
      created_at: Utc::now(),
      published_at: None,
      views: 0,
      republish_count: 0,
    });
    Ok(id)
  }

  async fn add_photo(&self, listing_id: i64, file_id: &FileId, position: i32) -> Result<()> {
    self.check()?;
    let mut inner = self.inner.lock().unwrap();
    if !inner.listings.contains_key(&listing_id) {
      bail!("listing {listing_id} does not exist");
    }
    let photos = inner.photos.entry(listing_id).or_default();
    if photos.contains_key(&position) {
      bail!("photo position {position} already taken");
    }
    photos.insert(position, file_id.clone());
    Ok(())
  }

  async fn list_photos(&self, listing_id: i64) -> Result<Vec<FileId>> {
    self.check()?;
    Ok(self.photos(listing_id))
  }

  async fn get_listing(&self, listing_id: i64) -> Result<Option<ListingRow>> {
    self.check()?;
    Ok(self.listing(listing_id))
  }

  async fn list_seller_listings(&self, seller_tg_id: i64) -> Result<Vec<ListingSummary>> {
    self.check()?;
    let inner = self.inner.lock().unwrap();
    let mut rows = inner
      .listings
      .values()
      .filter(|row| row.seller_tg_id == seller_tg_id)
      .map(|row| ListingSummary {
        id: row.id,
        name: row.name.clone(),
        price: row.price.clone(),
        status: row.status,
        channel_message_id: row.channel_message_id,
        created_at: row.created_at,
        views: row.views,
        republish_count: row.republish_count,
      })
      .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(rows)
  }

  async fn set_status(
    &self,
    listing_id: i64,
    status: ListingStatus,
    channel_message_id: Option<MessageId>,
  ) -> Result<()> {
    self.update(listing_id, |row| {
      row.status = status;
      if let Some(message_id) = channel_message_id {
        row.channel_message_id = Some(message_id);
        row.published_at = Some(Utc::now());
      }
    })
  }

  async fn set_moderator_message(&self, listing_id: i64, message_id: MessageId) -> Result<()> {
    self.update(listing_id, |row| row.moderator_message_id = Some(message_id))
  }

  async fn set_price(&self, listing_id: i64, price: &str) -> Result<()> {
    self.update(listing_id, |row| row.price = price.to_string())
  }

  async fn increment_republish_count(&self, listing_id: i64) -> Result<i32> {
    let mut count = 0;
    self.update(listing_id, |row| {
      row.republish_count += 1;
      count = row.republish_count;
    })?;
    Ok(count)
  }

  async fn replace_photos(&self, listing_id: i64, file_ids: &[FileId]) -> Result<()> {
    self.check()?;
    let mut inner = self.inner.lock().unwrap();
    let photos = file_ids
      .iter()
      .enumerate()
      .map(|(index, file_id)| (index as i32, file_id.clone()))
      .collect();
    inner.photos.insert(listing_id, photos);
    Ok(())
  }

  async fn delete_listing(&self, listing_id: i64) -> Result<bool> {
    self.check()?;
    let mut inner = self.inner.lock().unwrap();
    inner.photos.remove(&listing_id);
    Ok(inner.listings.remove(&listing_id).is_some())
  }
}

/// One outbound call seen by [`RecordingMessenger`].
#[derive(Debug, Clone)]
pub enum Call {
  Text {
    chat: ChatId,
    body: Body,
    markup: Option<ReplyMarkup>,
  },
  Photo {
    chat: ChatId,
    photo: FileId,
    caption: Option<Body>,
    keyboard: Option<InlineKeyboardMarkup>,
  },
  MediaGroup {
    chat: ChatId,
    photos: Vec<FileId>,
    caption: Option<Body>,
  },
  EditMarkup {
    chat: ChatId,
    message_id: MessageId,
  },
  Delete {
    chat: ChatId,
    message_id: MessageId,
  },
  Replace {
    chat: ChatId,
    message_id: MessageId,
    new_file: FileId,
  },
}

impl Call {
  pub fn chat(&self) -> ChatId {
    match self {
      Self::Text { chat, .. }
      | Self::Photo { chat, .. }
      | Self::MediaGroup { chat, .. }
      | Self::EditMarkup { chat, .. }
      | Self::Delete { chat, .. }
      | Self::Replace { chat, .. } => *chat,
    }
  }

  pub fn text(&self) -> Option<&str> {
    match self {
      Self::Text { body, .. } => Some(body.text()),
      Self::Photo { caption, .. } | Self::MediaGroup { caption, .. } => caption.as_ref().map(Body::text),
      _ => None,
    }
  }
}

/// Records outbound traffic and hands out increasing message ids.
///
/// Photo bytes live in an in-memory blob table so a replaced photo can be
/// downloaded again under its new file id.
pub struct RecordingMessenger {
  calls: Mutex<Vec<Call>>,
  blobs: Mutex<HashMap<String, Vec<u8>>>,
  next_message_id: AtomicI32,
  next_upload: AtomicI32,
  failing: AtomicBool,
  failing_chats: Mutex<HashSet<ChatId>>,
}

impl Default for RecordingMessenger {
  fn default() -> Self {
    Self {
      calls: Mutex::new(Vec::new()),
      blobs: Mutex::new(HashMap::new()),
      next_message_id: AtomicI32::new(100),
      next_upload: AtomicI32::new(1),
      failing: AtomicBool::new(false),
      failing_chats: Mutex::new(HashSet::new()),
    }
  }
}

impl RecordingMessenger {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  /// Every call addressed to `chat` fails from now on.
  pub fn fail_chat(&self, chat: ChatId) {
    self.failing_chats.lock().unwrap().insert(chat);
  }

  pub fn put_blob(&self, file_id: &FileId, bytes: Vec<u8>) {
    self.blobs.lock().unwrap().insert(file_id.0.clone(), bytes);
  }

  pub fn blob(&self, file_id: &FileId) -> Option<Vec<u8>> {
    self.blobs.lock().unwrap().get(&file_id.0).cloned()
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn calls_to(&self, chat: ChatId) -> Vec<Call> {
    self.calls().into_iter().filter(|call| call.chat() == chat).collect()
  }

  pub fn texts_to(&self, chat: ChatId) -> Vec<String> {
    self
      .calls_to(chat)
      .iter()
      .filter_map(|call| call.text().map(str::to_string))
      .collect()
  }

  pub fn clear(&self) {
    self.calls.lock().unwrap().clear();
  }

  fn next_id(&self) -> MessageId {
    MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst))
  }

  fn record(&self, call: Call) -> Result<()> {
    if self.failing.load(Ordering::SeqCst) {
      bail!("telegram is unavailable");
    }
    if self.failing_chats.lock().unwrap().contains(&call.chat()) {
      bail!("chat {} is unavailable", call.chat());
    }
    self.calls.lock().unwrap().push(call);
    Ok(())
  }
}

#[async_trait]
impl Messenger for RecordingMessenger {
  async fn send_text(&self, chat: ChatId, body: Body, markup: Option<ReplyMarkup>) -> Result<MessageId> {
    self.record(Call::Text { chat, body, markup })?;
    Ok(self.next_id())
  }

  async fn send_photo(
    &self,
    chat: ChatId,
    photo: FileId,
    caption: Option<Body>,
    keyboard: Option<InlineKeyboardMarkup>,
  ) -> Result<MessageId> {
    self.record(Call::Photo {
      chat,
      photo,
      caption,
      keyboard,
    })?;
    Ok(self.next_id())
  }

  async fn send_media_group(&self, chat: ChatId, photos: &[FileId], caption: Option<Body>) -> Result<Vec<MessageId>> {
    if photos.is_empty() || photos.len() > MEDIA_GROUP_LIMIT {
      bail!("media group of {} photos", photos.len());
    }
    self.record(Call::MediaGroup {
      chat,
      photos: photos.to_vec(),
      caption,
    })?;
    Ok(photos.iter().map(|_| self.next_id()).collect())
  }

  async fn edit_markup(&self, chat: ChatId, message_id: MessageId, _keyboard: InlineKeyboardMarkup) -> Result<()> {
    self.record(Call::EditMarkup { chat, message_id })
  }

  async fn delete_message(&self, chat: ChatId, message_id: MessageId) -> Result<()> {
    self.record(Call::Delete { chat, message_id })
  }

  async fn download_photo(&self, photo: &FileId) -> Result<Vec<u8>> {
    if self.failing.load(Ordering::SeqCst) {
      bail!("telegram is unavailable");
    }
    self.blob(photo).ok_or_else(|| anyhow!("unknown file {}", photo.0))
  }

  async fn replace_photo(
    &self,
    chat: ChatId,
    message_id: MessageId,
    bytes: Vec<u8>,
    _caption: Option<Body>,
    _keyboard: InlineKeyboardMarkup,
  ) -> Result<FileId> {
    let new_file = FileId(format!("upload-{}", self.next_upload.fetch_add(1, Ordering::SeqCst)));
    self.record(Call::Replace {
      chat,
      message_id,
      new_file: new_file.clone(),
    })?;
    self.put_blob(&new_file, bytes);
    Ok(new_file)
  }
}
