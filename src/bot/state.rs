use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use teloxide::types::FileId;

use crate::bot::wizard::ListingDraft;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "data")]
pub enum ConversationState {
  #[default]
  Idle,
  Wizard(ListingDraft),
  ChangePrice {
    listing_id: i64,
    touched_at: DateTime<Utc>,
  },
  RotatingPhotos(RotationDraft),
}

impl ConversationState {
  fn touched_at(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Idle => None,
      Self::Wizard(draft) => Some(draft.touched_at),
      Self::ChangePrice { touched_at, .. } => Some(*touched_at),
      Self::RotatingPhotos(draft) => Some(draft.touched_at),
    }
  }

  /// Drafts untouched for longer than `timeout` are stale. Without a timeout
  /// nothing expires.
  pub fn is_expired(&self, timeout: Option<Duration>, now: DateTime<Utc>) -> bool {
    match (timeout, self.touched_at()) {
      (Some(timeout), Some(touched_at)) => now - touched_at > timeout,
      _ => false,
    }
  }
}

/// Moderator-side working copy of a listing's photos while they are being
/// turned. `working[i]` replaces `original[i]` once the moderator is done.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RotationDraft {
  pub listing_id: i64,
  pub original: Vec<FileId>,
  pub working: Vec<FileId>,
  pub touched_at: DateTime<Utc>,
}

impl RotationDraft {
  pub fn new(listing_id: i64, photos: Vec<FileId>, now: DateTime<Utc>) -> Self {
    Self {
      listing_id,
      working: photos.clone(),
      original: photos,
      touched_at: now,
    }
  }

  pub fn changed_count(&self) -> usize {
    self
      .original
      .iter()
      .zip(&self.working)
      .filter(|(before, after)| before != after)
      .count()
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use chrono::Utc;
  use teloxide::types::FileId;

  use super::ConversationState;
  use super::RotationDraft;
  use crate::bot::wizard::ListingDraft;

  #[test]
  fn idle_state_never_expires() {
    let now = Utc::now();
    assert!(!ConversationState::Idle.is_expired(Some(Duration::minutes(1)), now));
  }

  #[test]
  fn drafts_expire_only_with_a_timeout() {
    let started = Utc::now();
    let state = ConversationState::Wizard(ListingDraft::new(1, None, started));
    let later = started + Duration::minutes(45);
    assert!(!state.is_expired(None, later));
    assert!(!state.is_expired(Some(Duration::minutes(60)), later));
    assert!(state.is_expired(Some(Duration::minutes(30)), later));
  }

  #[test]
  fn rotation_draft_tracks_replaced_entries() {
    let photos = vec![FileId("a".into()), FileId("b".into())];
    let mut draft = RotationDraft::new(3, photos, Utc::now());
    assert_eq!(draft.changed_count(), 0);
    draft.working[1] = FileId("b2".into());
    assert_eq!(draft.changed_count(), 1);
    assert_eq!(draft.original[1], FileId("b".into()));
  }
}
