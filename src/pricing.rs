use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static AMOUNT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:[.,]\d{1,2})?$").expect("valid regex"));

const USD_MARKERS: [&str; 2] = ["usd", "$"];
const UAH_MARKERS: [&str; 3] = ["грн", "uah", "₴"];
const NEGOTIABLE_MARKERS: [&str; 2] = ["договірна", "negotiable"];

pub const COMMISSION_PERCENT: i64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceError {
  #[error("price has no numeric amount")]
  NotNumeric,
  #[error("amount exceeds supported range")]
  OutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
  Uah,
  Usd,
}

/// Amount in minor units (kopecks or cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price {
  pub minor: i64,
  pub currency: Currency,
}

/// Parses an amount like `12`, `12.5` or `12,50` into minor units.
pub fn parse_amount_minor(input: &str) -> Result<i64, PriceError> {
  let trimmed = input.trim();
  if !AMOUNT_PATTERN.is_match(trimmed) {
    return Err(PriceError::NotNumeric);
  }
  let normalized = trimmed.replace(',', ".");
  let (major, minor) = match normalized.split_once('.') {
    Some((major, minor)) => (major, minor),
    None => (normalized.as_str(), ""),
  };

  let major = major.parse::<i64>().map_err(|_| PriceError::OutOfRange)?;
  let minor = match minor.len() {
    0 => 0,
    1 => minor.parse::<i64>().map_err(|_| PriceError::OutOfRange)? * 10,
    _ => minor.parse::<i64>().map_err(|_| PriceError::OutOfRange)?,
  };

  major
    .checked_mul(100)
    .and_then(|value| value.checked_add(minor))
    .ok_or(PriceError::OutOfRange)
}

/// Reads the seller's free-text price field.
///
/// Currency words and the "negotiable" marker are stripped; what remains must
/// be a plain number. Without a USD marker the amount is taken as hryvnias.
pub fn parse_price(text: &str) -> Result<Price, PriceError> {
  let mut normalized = text.to_lowercase();
  let currency = if USD_MARKERS.iter().any(|marker| normalized.contains(marker)) {
    Currency::Usd
  } else {
    Currency::Uah
  };

  for marker in USD_MARKERS.iter().chain(&UAH_MARKERS).chain(&NEGOTIABLE_MARKERS) {
    normalized = normalized.replace(marker, "");
  }
  normalized.retain(|c| !c.is_whitespace());

  let minor = parse_amount_minor(&normalized)?;
  Ok(Price { minor, currency })
}

/// Divides a non-negative value, rounding half up without an intermediate sum.
fn div_round(value: i64, divisor: i64) -> i64 {
  let quotient = value / divisor;
  if (value % divisor) * 2 >= divisor { quotient + 1 } else { quotient }
}

/// Converts the price into hryvnia minor units. `usd_rate_minor` is the
/// number of kopecks per dollar.
pub fn to_uah_minor(price: Price, usd_rate_minor: i64) -> Result<i64, PriceError> {
  match price.currency {
    Currency::Uah => Ok(price.minor),
    Currency::Usd => price
      .minor
      .checked_mul(usd_rate_minor)
      .map(|value| div_round(value, 100))
      .ok_or(PriceError::OutOfRange),
  }
}

/// Platform commission in hryvnia minor units.
pub fn commission_minor(price: Price, usd_rate_minor: i64) -> Result<i64, PriceError> {
  let uah = to_uah_minor(price, usd_rate_minor)?;
  uah
    .checked_mul(COMMISSION_PERCENT)
    .map(|value| div_round(value, 100))
    .ok_or(PriceError::OutOfRange)
}

pub fn format_uah(minor: i64) -> String {
  format!("{}.{:02} UAH", minor / 100, minor % 100)
}
