use std::collections::HashSet;
use std::sync::Arc;

use teloxide::types::ChatId;

use crate::config::Settings;
use crate::messenger::Messenger;
use crate::store::ListingStore;

#[derive(Clone)]
pub struct AppContext {
  store: Arc<dyn ListingStore>,
  messenger: Arc<dyn Messenger>,
  moderators: HashSet<i64>,
  settings: Settings,
}

impl AppContext {
  pub fn new(store: Arc<dyn ListingStore>, messenger: Arc<dyn Messenger>, settings: Settings) -> Self {
    Self {
      store,
      messenger,
      moderators: settings.moderators.iter().copied().collect(),
      settings,
    }
  }

  pub fn store(&self) -> &dyn ListingStore {
    self.store.as_ref()
  }

  pub fn messenger(&self) -> &dyn Messenger {
    self.messenger.as_ref()
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn is_moderator(&self, tg_id: i64) -> bool {
    self.moderators.contains(&tg_id)
  }

  /// Private chat of the moderator who receives the queue.
  pub fn moderation_inbox(&self) -> Option<ChatId> {
    self.settings.moderators.first().copied().map(ChatId)
  }

  pub fn channel(&self) -> Option<ChatId> {
    self.settings.channel
  }
}
