mod app;
mod bot;
mod config;
mod db;
mod imaging;
mod messenger;
mod models;
mod pricing;
mod store;
mod telemetry;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::Bot;
use tracing::info;

use crate::bot::AppContext;
use crate::messenger::TelegramMessenger;

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  telemetry::init()?;
  let config = config::Config::from_env()?;
  info!(
    moderator_count = config.settings.moderators.len(),
    channel_configured = config.settings.channel.is_some(),
    webhook = config.webhook.is_some(),
    "starting bot"
  );

  let bot = Bot::new(config.bot_token.clone());
  let db = db::Db::connect(&config.database_url).await?;
  let context = AppContext::new(
    Arc::new(db),
    Arc::new(TelegramMessenger::new(bot.clone())),
    config.settings,
  );
  let app = app::App::new(bot, context, config.webhook);
  app.run().await
}
