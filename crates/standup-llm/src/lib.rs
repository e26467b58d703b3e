// Model access for the standup pipeline: OpenAI and Ollama clients, prompt
// templates, tolerant response parsing, and the transcribe/diarize/classify
// stages built on them.

pub mod client;
pub mod parse;
pub mod pipeline;
pub mod prompt;
