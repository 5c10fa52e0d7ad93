use std::env;

use anyhow::Context;
use anyhow::Result;
use chrono::Duration;
use teloxide::types::ChatId;
use tracing::warn;

use crate::pricing::parse_amount_minor;

const DEFAULT_PORT: u16 = 10000;
const DEFAULT_USD_RATE_MINOR: i64 = 4000;

#[derive(Debug, Clone)]
pub struct Config {
  pub bot_token: String,
  pub database_url: String,
  pub settings: Settings,
  pub webhook: Option<WebhookConfig>,
}

/// Runtime knobs the handlers read. Missing values switch off the dependent
/// feature instead of stopping the bot.
#[derive(Debug, Clone)]
pub struct Settings {
  /// The first entry receives the moderation queue.
  pub moderators: Vec<i64>,
  pub channel: Option<ChatId>,
  pub payment_card: Option<String>,
  /// Kopecks per US dollar.
  pub usd_rate_minor: i64,
  pub draft_idle_timeout: Option<Duration>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      moderators: Vec::new(),
      channel: None,
      payment_card: None,
      usd_rate_minor: DEFAULT_USD_RATE_MINOR,
      draft_idle_timeout: None,
    }
  }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
  pub base_url: String,
  pub port: u16,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let bot_token = env::var("BOT_TOKEN")
      .or_else(|_| env::var("TELOXIDE_TOKEN"))
      .context("BOT_TOKEN or TELOXIDE_TOKEN must be set")?;
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let moderators = parse_admins(&env::var("ADMIN_IDS").unwrap_or_default());
    if moderators.is_empty() {
      warn!("ADMIN_IDS is empty, listings cannot be sent to moderation");
    }

    let channel = optional_var("CHANNEL_ID").and_then(|raw| parse_channel(&raw));
    if channel.is_none() {
      warn!("CHANNEL_ID is not set or invalid, publishing is unavailable");
    }

    let payment_card = optional_var("MONOBANK_CARD_NUMBER");
    if payment_card.is_none() {
      warn!("MONOBANK_CARD_NUMBER is not set, commission replies will lack payment details");
    }

    let usd_rate_minor = match optional_var("USD_RATE") {
      Some(raw) => parse_amount_minor(&raw).with_context(|| format!("USD_RATE is not a valid amount: {raw}"))?,
      None => DEFAULT_USD_RATE_MINOR,
    };

    let draft_idle_timeout = match optional_var("DRAFT_IDLE_MINUTES") {
      Some(raw) => {
        let minutes = raw
          .parse::<i64>()
          .with_context(|| format!("DRAFT_IDLE_MINUTES must be a whole number: {raw}"))?;
        (minutes > 0).then(|| Duration::minutes(minutes))
      },
      None => None,
    };

    let webhook = match optional_var("WEBHOOK_URL") {
      Some(base_url) => {
        let port = match optional_var("PORT") {
          Some(raw) => raw.parse::<u16>().with_context(|| format!("PORT is not a valid port: {raw}"))?,
          None => DEFAULT_PORT,
        };
        Some(WebhookConfig { base_url, port })
      },
      None => None,
    };

    Ok(Self {
      bot_token,
      database_url,
      settings: Settings {
        moderators,
        channel,
        payment_card,
        usd_rate_minor,
        draft_idle_timeout,
      },
      webhook,
    })
  }
}

fn optional_var(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

fn parse_admins(raw: &str) -> Vec<i64> {
  raw
    .split(',')
    .filter_map(|id| {
      let trimmed = id.trim();
      if trimmed.is_empty() {
        return None;
      }
      match trimmed.parse::<i64>() {
        Ok(value) => Some(value),
        Err(err) => {
          warn!(value = trimmed, error = %err, "invalid ADMIN_IDS entry");
          None
        },
      }
    })
    .collect()
}

fn parse_channel(raw: &str) -> Option<ChatId> {
  match raw.parse::<i64>() {
    Ok(0) => None,
    Ok(id) => Some(ChatId(id)),
    Err(err) => {
      warn!(value = raw, error = %err, "invalid CHANNEL_ID");
      None
    },
  }
}
