// Data model, in-memory storage, CSV export, and configuration for the
// standup summarizer service.

pub mod config;
pub mod export;
pub mod standup;
pub mod store;
