use thiserror::Error;

use crate::imaging::ImagingError;
use crate::models::ListingStatus;
use crate::pricing::PriceError;

/// Failures of moderation and seller workflows. Handlers turn these into a
/// reply via [`FlowError::user_message`].
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("listing not found")]
  NotFound,
  #[error("listing belongs to another seller")]
  NotOwner,
  #[error("listing is {0}, not on moderation")]
  NotInModeration(ListingStatus),
  #[error("publication channel is not configured")]
  ChannelUnavailable,
  #[error("no moderator is configured")]
  ModerationUnavailable,
  #[error("listing has no photos")]
  NoPhotos,
  #[error("republish limit reached")]
  RepublishLimit,
  #[error(transparent)]
  InvalidPrice(#[from] PriceError),
  #[error("rotation request does not match the active session")]
  RotationMismatch,
  #[error(transparent)]
  Imaging(#[from] ImagingError),
  #[error("listing {listing_id} was stored but not queued: {source}")]
  NotQueued {
    listing_id: i64,
    #[source]
    source: Box<FlowError>,
  },
  #[error(transparent)]
  Remote(#[from] anyhow::Error),
}

impl FlowError {
  pub fn user_message(&self) -> String {
    match self {
      Self::NotFound => "Listing not found.".to_string(),
      Self::NotOwner => "This listing belongs to someone else.".to_string(),
      Self::NotInModeration(status) => format!("This listing is no longer on moderation ({}).", status.label()),
      Self::ChannelUnavailable => "Publication channel is not configured.".to_string(),
      Self::ModerationUnavailable => "Moderation is unavailable right now, please try again later.".to_string(),
      Self::NoPhotos => "This listing has no photos.".to_string(),
      Self::RepublishLimit => "You have used all republish attempts for this listing.".to_string(),
      Self::InvalidPrice(_) => "Could not read the price. Change it to a number like 500 грн or 20 USD.".to_string(),
      Self::RotationMismatch => "This rotation session is no longer active.".to_string(),
      Self::Imaging(_) => "Could not process this photo.".to_string(),
      Self::NotQueued { .. } => "Your listing was saved, but it could not be sent to the moderator yet. Do not add it \
                                 again: use Republish under My listings later."
        .to_string(),
      Self::Remote(_) => "Something went wrong, please try again.".to_string(),
    }
  }
}

pub type FlowResult<T> = Result<T, FlowError>;

#[cfg(test)]
mod tests {
  use super::FlowError;
  use crate::models::ListingStatus;
  use crate::pricing::PriceError;

  #[test]
  fn remote_failures_hide_details_from_users() {
    let err = FlowError::from(anyhow::anyhow!("connection reset by peer"));
    assert!(!err.user_message().contains("connection"));
  }

  #[test]
  fn status_guard_mentions_current_status() {
    let err = FlowError::NotInModeration(ListingStatus::Published);
    assert!(err.user_message().contains(ListingStatus::Published.label()));
    assert!(matches!(FlowError::from(PriceError::NotNumeric), FlowError::InvalidPrice(_)));
  }

  #[test]
  fn stored_but_unqueued_listing_is_not_retried() {
    let err = FlowError::NotQueued {
      listing_id: 4,
      source: Box::new(FlowError::ModerationUnavailable),
    };
    let text = err.user_message();
    assert!(text.contains("saved"));
    assert!(!text.contains("try again"));
  }
}
