use std::fmt;

/// Inline button payloads. Encoded as `scope:action:args`, well under
/// Telegram's 64-byte limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
  Publish(i64),
  Reject(i64),
  RotatePhotos(i64),
  RotateOne { listing_id: i64, index: usize },
  RotationDone(i64),
  Republish(i64),
  Sold(i64),
  ChangePrice(i64),
  Delete(i64),
}

impl CallbackAction {
  pub fn parse(data: &str) -> Option<Self> {
    let mut parts = data.split(':');
    let scope = parts.next()?;
    let action = parts.next()?;
    let listing_id = parts.next()?.parse::<i64>().ok()?;
    let extra = parts.next();
    if parts.next().is_some() {
      return None;
    }

    let parsed = match (scope, action, extra) {
      ("mod", "publish", None) => Self::Publish(listing_id),
      ("mod", "reject", None) => Self::Reject(listing_id),
      ("mod", "rotate", None) => Self::RotatePhotos(listing_id),
      ("rot", "turn", Some(index)) => Self::RotateOne {
        listing_id,
        index: index.parse().ok()?,
      },
      ("rot", "done", None) => Self::RotationDone(listing_id),
      ("own", "republish", None) => Self::Republish(listing_id),
      ("own", "sold", None) => Self::Sold(listing_id),
      ("own", "price", None) => Self::ChangePrice(listing_id),
      ("own", "delete", None) => Self::Delete(listing_id),
      _ => return None,
    };
    Some(parsed)
  }

  /// Publish, reject and the rotation flow are reserved for moderators.
  pub fn requires_moderator(&self) -> bool {
    matches!(
      self,
      Self::Publish(_) | Self::Reject(_) | Self::RotatePhotos(_) | Self::RotateOne { .. } | Self::RotationDone(_)
    )
  }
}

impl fmt::Display for CallbackAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Publish(id) => write!(f, "mod:publish:{id}"),
      Self::Reject(id) => write!(f, "mod:reject:{id}"),
      Self::RotatePhotos(id) => write!(f, "mod:rotate:{id}"),
      Self::RotateOne { listing_id, index } => write!(f, "rot:turn:{listing_id}:{index}"),
      Self::RotationDone(id) => write!(f, "rot:done:{id}"),
      Self::Republish(id) => write!(f, "own:republish:{id}"),
      Self::Sold(id) => write!(f, "own:sold:{id}"),
      Self::ChangePrice(id) => write!(f, "own:price:{id}"),
      Self::Delete(id) => write!(f, "own:delete:{id}"),
    }
  }
}
