use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
  /// Open the main menu
  Start,
  /// Show the help text
  Help,
  /// Create a new listing
  Sell,
  /// Show your listings
  #[command(rename = "my_listings")]
  MyListings,
  /// Marketplace rules and commission
  Rules,
  /// Abort the current draft
  Cancel,
}
