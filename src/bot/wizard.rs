//! Linear wizard that collects a new listing from the seller.
//!
//! Each step is a variant of [`WizardStep`] and [`ListingDraft::apply`] is the
//! single transition function; it performs no I/O so the whole graph can be
//! tested without Telegram.

use anyhow::Context;
use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use teloxide::types::FileId;

use crate::models::NewListing;

pub const CONFIRM_LABEL: &str = "✅ Confirm";
pub const CANCEL_LABEL: &str = "❌ Cancel";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WizardStep {
  AwaitingName,
  AwaitingPrice,
  AwaitingPhotos,
  AwaitingLocation,
  AwaitingDescription,
  AwaitingDelivery,
  AwaitingConfirmation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardInput {
  Text(String),
  Photo(FileId),
  DonePhotos,
  Skip,
  Confirm,
  Cancel,
}

impl WizardInput {
  /// Maps a raw message onto a wizard input. Commands may carry a
  /// `@botname` suffix. Confirmation buttons only count at the last step.
  pub fn parse(step: WizardStep, text: Option<&str>, photo: Option<FileId>) -> Option<Self> {
    if let Some(photo) = photo {
      return Some(Self::Photo(photo));
    }
    let text = text.map(str::trim).filter(|t| !t.is_empty())?;

    if let Some(command) = text.strip_prefix('/') {
      let name = command.split(['@', ' ']).next().unwrap_or_default();
      match name.to_ascii_lowercase().as_str() {
        "done_photos" | "done" => return Some(Self::DonePhotos),
        "skip_photos" | "skip_location" | "skip" => return Some(Self::Skip),
        "cancel" => return Some(Self::Cancel),
        _ => {},
      }
    }

    if step == WizardStep::AwaitingConfirmation {
      if text == CONFIRM_LABEL {
        return Some(Self::Confirm);
      }
      if text == CANCEL_LABEL {
        return Some(Self::Cancel);
      }
    }

    Some(Self::Text(text.to_string()))
  }
}

/// What the bot says next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
  /// The regular question for the step.
  Ask(WizardStep),
  PhotoAdded { total: usize },
  /// `/done_photos` without any photo.
  PhotosRequired,
  /// Non-text input at a text step.
  ExpectedText(WizardStep),
  /// Text at the photo step.
  ExpectedPhoto,
  /// Anything other than confirm or cancel at the last step.
  ChooseConfirmation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
  Continue { draft: ListingDraft, prompt: Prompt },
  Submit(ListingDraft),
  Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingDraft {
  pub step: WizardStep,
  pub seller_tg_id: i64,
  pub seller_username: Option<String>,
  pub name: Option<String>,
  pub price: Option<String>,
  pub photos: Vec<FileId>,
  pub location: Option<String>,
  pub description: Option<String>,
  pub delivery: Option<String>,
  pub touched_at: DateTime<Utc>,
}

/// Field validator shared by every free-text step.
pub fn required_text(input: &str) -> Option<String> {
  let trimmed = input.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl ListingDraft {
  pub fn new(seller_tg_id: i64, seller_username: Option<String>, now: DateTime<Utc>) -> Self {
    Self {
      step: WizardStep::AwaitingName,
      seller_tg_id,
      seller_username,
      name: None,
      price: None,
      photos: Vec::new(),
      location: None,
      description: None,
      delivery: None,
      touched_at: now,
    }
  }

  pub fn apply(mut self, input: WizardInput, now: DateTime<Utc>) -> Transition {
    if input == WizardInput::Cancel {
      return Transition::Cancelled;
    }
    self.touched_at = now;

    let prompt = match (self.step, input) {
      (WizardStep::AwaitingPhotos, WizardInput::Photo(file_id)) => {
        self.photos.push(file_id);
        Prompt::PhotoAdded {
          total: self.photos.len(),
        }
      },
      (WizardStep::AwaitingPhotos, WizardInput::DonePhotos) if self.photos.is_empty() => Prompt::PhotosRequired,
      (WizardStep::AwaitingPhotos, WizardInput::DonePhotos) => self.advance(WizardStep::AwaitingLocation),
      (WizardStep::AwaitingPhotos, WizardInput::Skip) => {
        self.photos.clear();
        self.advance(WizardStep::AwaitingLocation)
      },
      (WizardStep::AwaitingPhotos, _) => Prompt::ExpectedPhoto,
      (WizardStep::AwaitingLocation, WizardInput::Skip) => {
        self.location = None;
        self.advance(WizardStep::AwaitingDescription)
      },
      (WizardStep::AwaitingConfirmation, WizardInput::Confirm) => return Transition::Submit(self),
      (WizardStep::AwaitingConfirmation, _) => Prompt::ChooseConfirmation,
      (step, WizardInput::Text(text)) => match required_text(&text) {
        Some(value) => self.accept_text(step, value),
        None => Prompt::ExpectedText(step),
      },
      (step, _) => Prompt::ExpectedText(step),
    };

    Transition::Continue { draft: self, prompt }
  }

  fn accept_text(&mut self, step: WizardStep, value: String) -> Prompt {
    match step {
      WizardStep::AwaitingName => {
        self.name = Some(value);
        self.advance(WizardStep::AwaitingPrice)
      },
      WizardStep::AwaitingPrice => {
        self.price = Some(value);
        self.advance(WizardStep::AwaitingPhotos)
      },
      WizardStep::AwaitingLocation => {
        self.location = Some(value);
        self.advance(WizardStep::AwaitingDescription)
      },
      WizardStep::AwaitingDescription => {
        self.description = Some(value);
        self.advance(WizardStep::AwaitingDelivery)
      },
      WizardStep::AwaitingDelivery => {
        self.delivery = Some(value);
        self.advance(WizardStep::AwaitingConfirmation)
      },
      WizardStep::AwaitingPhotos => Prompt::ExpectedPhoto,
      WizardStep::AwaitingConfirmation => Prompt::ChooseConfirmation,
    }
  }

  fn advance(&mut self, next: WizardStep) -> Prompt {
    self.step = next;
    Prompt::Ask(next)
  }

  pub fn to_new_listing(&self) -> Result<NewListing> {
    Ok(NewListing {
      seller_tg_id: self.seller_tg_id,
      seller_username: self.seller_username.clone(),
      name: self.name.clone().context("missing name during draft completion")?,
      price: self.price.clone().context("missing price during draft completion")?,
      location: self.location.clone(),
      description: self
        .description
        .clone()
        .context("missing description during draft completion")?,
      delivery: self
        .delivery
        .clone()
        .context("missing delivery during draft completion")?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use teloxide::types::FileId;

  use super::CANCEL_LABEL;
  use super::CONFIRM_LABEL;
  use super::ListingDraft;
  use super::Prompt;
  use super::Transition;
  use super::WizardInput;
  use super::WizardStep;

  fn step(draft: ListingDraft, input: WizardInput) -> (ListingDraft, Prompt) {
    match draft.apply(input, Utc::now()) {
      Transition::Continue { draft, prompt } => (draft, prompt),
      other => panic!("expected the wizard to continue, got {other:?}"),
    }
  }

  fn text(value: &str) -> WizardInput {
    WizardInput::Text(value.to_string())
  }

  fn photo(id: &str) -> WizardInput {
    WizardInput::Photo(FileId(id.to_string()))
  }

  fn filled_until_confirmation(photos: &[&str]) -> ListingDraft {
    let draft = ListingDraft::new(7, Some("seller".into()), Utc::now());
    let (mut draft, _) = step(draft, text("Chair"));
    (draft, _) = step(draft, text("500 грн"));
    for id in photos {
      (draft, _) = step(draft, photo(id));
    }
    let input = if photos.is_empty() { WizardInput::Skip } else { WizardInput::DonePhotos };
    (draft, _) = step(draft, input);
    (draft, _) = step(draft, WizardInput::Skip);
    (draft, _) = step(draft, text("Wooden chair"));
    let (draft, prompt) = step(draft, text("Post"));
    assert_eq!(prompt, Prompt::Ask(WizardStep::AwaitingConfirmation));
    draft
  }

  #[test]
  fn walks_all_steps_and_submits_on_confirm() {
    let draft = filled_until_confirmation(&["a", "b", "c"]);
    let Transition::Submit(done) = draft.apply(WizardInput::Confirm, Utc::now()) else {
      panic!("confirm must submit");
    };
    assert_eq!(done.photos, vec![FileId("a".into()), FileId("b".into()), FileId("c".into())]);
    let listing = done.to_new_listing().unwrap();
    assert_eq!(listing.name, "Chair");
    assert_eq!(listing.price, "500 грн");
    assert_eq!(listing.location, None);
    assert_eq!(listing.description, "Wooden chair");
    assert_eq!(listing.delivery, "Post");
  }

  #[test]
  fn cancel_discards_at_confirmation() {
    let draft = filled_until_confirmation(&["a"]);
    assert_eq!(draft.apply(WizardInput::Cancel, Utc::now()), Transition::Cancelled);
  }

  #[test]
  fn done_without_photos_reprompts() {
    let draft = ListingDraft::new(1, None, Utc::now());
    let (draft, _) = step(draft, text("Lamp"));
    let (draft, _) = step(draft, text("100"));
    let (draft, prompt) = step(draft, WizardInput::DonePhotos);
    assert_eq!(prompt, Prompt::PhotosRequired);
    assert_eq!(draft.step, WizardStep::AwaitingPhotos);

    let (draft, prompt) = step(draft, WizardInput::Skip);
    assert_eq!(prompt, Prompt::Ask(WizardStep::AwaitingLocation));
    assert!(draft.photos.is_empty());
  }

  #[test]
  fn photo_counter_reports_running_total() {
    let mut draft = ListingDraft::new(1, None, Utc::now());
    draft.step = WizardStep::AwaitingPhotos;
    let (draft, first) = step(draft, photo("x"));
    let (_, second) = step(draft, photo("y"));
    assert_eq!(first, Prompt::PhotoAdded { total: 1 });
    assert_eq!(second, Prompt::PhotoAdded { total: 2 });
  }

  #[test]
  fn location_accepts_text() {
    let mut draft = ListingDraft::new(1, None, Utc::now());
    draft.step = WizardStep::AwaitingLocation;
    let (draft, prompt) = step(draft, text("Kyiv"));
    assert_eq!(draft.location.as_deref(), Some("Kyiv"));
    assert_eq!(prompt, Prompt::Ask(WizardStep::AwaitingDescription));
  }

  #[test]
  fn wrong_input_kind_does_not_advance() {
    let draft = ListingDraft::new(1, None, Utc::now());
    let (draft, prompt) = step(draft, photo("early"));
    assert_eq!(prompt, Prompt::ExpectedText(WizardStep::AwaitingName));
    assert_eq!(draft.step, WizardStep::AwaitingName);

    let (draft, prompt) = step(draft, WizardInput::Skip);
    assert_eq!(prompt, Prompt::ExpectedText(WizardStep::AwaitingName));
    assert!(draft.name.is_none());
  }

  #[test]
  fn unknown_reply_at_confirmation_is_a_noop() {
    let draft = filled_until_confirmation(&[]);
    let (after, prompt) = step(draft.clone(), text("maybe"));
    assert_eq!(prompt, Prompt::ChooseConfirmation);
    assert_eq!(after.step, WizardStep::AwaitingConfirmation);
    assert_eq!(after.name, draft.name);
  }

  #[test]
  fn parses_commands_and_buttons() {
    let at_photos = WizardStep::AwaitingPhotos;
    assert_eq!(
      WizardInput::parse(at_photos, Some("/done_photos@market_bot"), None),
      Some(WizardInput::DonePhotos)
    );
    assert_eq!(WizardInput::parse(at_photos, Some("/skip_photos"), None), Some(WizardInput::Skip));
    assert_eq!(WizardInput::parse(at_photos, None, None), None);

    let confirm = WizardStep::AwaitingConfirmation;
    assert_eq!(WizardInput::parse(confirm, Some(CONFIRM_LABEL), None), Some(WizardInput::Confirm));
    assert_eq!(WizardInput::parse(confirm, Some(CANCEL_LABEL), None), Some(WizardInput::Cancel));
    assert_eq!(
      WizardInput::parse(WizardStep::AwaitingName, Some(CONFIRM_LABEL), None),
      Some(WizardInput::Text(CONFIRM_LABEL.to_string()))
    );
  }
}
