pub mod scoreboard_api;
pub mod webhook;

pub use scoreboard_api::{ScoreboardClient, ScoreboardSource};
pub use webhook::{build_notifier, WebhookNotifier};
