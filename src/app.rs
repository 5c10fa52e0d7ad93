use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use teloxide::dispatching::UpdateHandler;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::bot;
use crate::bot::AppContext;
use crate::bot::Command;
use crate::bot::DialogueStorage;
use crate::config::WebhookConfig;

pub struct App {
  bot: Bot,
  context: Arc<AppContext>,
  handler: UpdateHandler<anyhow::Error>,
  webhook: Option<WebhookConfig>,
}

/// `{base}/webhook`, tolerating a trailing slash on the base.
fn webhook_url(base_url: &str) -> anyhow::Result<Url> {
  let raw = format!("{}/webhook", base_url.trim_end_matches('/'));
  Url::parse(&raw).with_context(|| format!("WEBHOOK_URL is not a valid URL: {base_url}"))
}

impl App {
  pub fn new(bot: Bot, context: AppContext, webhook: Option<WebhookConfig>) -> Self {
    let handler = bot::build_schema();
    Self {
      bot,
      context: Arc::new(context),
      handler,
      webhook,
    }
  }

  pub async fn run(self) -> anyhow::Result<()> {
    let storage: Arc<DialogueStorage> = InMemStorage::new();

    let me = self.bot.get_me().await?;
    info!(username = me.username(), "authorized");
    if let Err(err) = self.bot.set_my_commands(Command::bot_commands()).await {
      warn!(error = %err, "failed to register bot commands");
    }

    let mut dispatcher = Dispatcher::builder(self.bot.clone(), self.handler)
      .dependencies(dptree::deps![self.context.clone(), storage.clone(), me])
      .enable_ctrlc_handler()
      .build();

    match self.webhook {
      Some(webhook) => {
        let url = webhook_url(&webhook.base_url)?;
        let address = SocketAddr::from(([0, 0, 0, 0], webhook.port));
        info!(%url, port = webhook.port, "starting webhook listener");
        let listener = webhooks::axum(self.bot.clone(), webhooks::Options::new(address, url))
          .await
          .context("failed to set up webhook")?;
        dispatcher
          .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
          )
          .await;
      },
      None => {
        info!("starting long polling");
        dispatcher.dispatch().await;
      },
    }

    Ok(())
  }
}
