use teloxide::dispatching::dialogue::InMemStorage;

pub mod callbacks;
pub mod commands;
pub mod context;
pub mod error;
pub mod handlers;
pub mod keyboards;
pub mod moderation;
pub mod render;
pub mod seller;
pub mod state;
pub mod wizard;

pub type HandlerResult = anyhow::Result<()>;
pub type DialogueStorage = InMemStorage<state::ConversationState>;

pub use commands::Command;
pub use context::AppContext;
pub use handlers::build_schema;
