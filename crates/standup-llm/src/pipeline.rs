// Transcribe -> diarize -> classify pipeline and its per-provider stages.
//
// Each stage sits behind a trait so the pipeline can be assembled from hosted,
// local, or canned implementations (and from test doubles).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use standup_core::config::{Config, Provider};
use standup_core::standup::{
    split_transcript, AudioUpload, Classification, Segment, SpeakerTurn, TranscriptSegment,
    Transcription,
};

use crate::client::{OllamaClient, OpenAiClient};
use crate::parse::{classify_by_keywords, parse_classification, parse_segments};
use crate::prompt::{classification_prompt, diarization_prompt};

// ---------------------------------------------------------------------------
// Stage traits
// ---------------------------------------------------------------------------

/// Turns recorded audio into text with timed segments.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioUpload) -> Result<Transcription>;
}

/// Splits a transcription into speaker-attributed segments.
#[async_trait]
pub trait Diarizer: Send + Sync {
    async fn diarize(&self, transcription: &Transcription) -> Result<Vec<Segment>>;
}

/// Sorts one speaker's words into yesterday / today / blockers.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification>;
}

// ---------------------------------------------------------------------------
// Transcribers
// ---------------------------------------------------------------------------

/// OpenAI Whisper transcription.
pub struct WhisperTranscriber {
    client: OpenAiClient,
}

impl WhisperTranscriber {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &AudioUpload) -> Result<Transcription> {
        info!(file = %audio.filename, bytes = audio.bytes.len(), "transcribing audio with Whisper");
        let transcription = self
            .client
            .transcribe(audio)
            .await
            .context("audio transcription failed")?;
        info!(segments = transcription.segments.len(), "transcription completed");
        Ok(transcription)
    }
}

/// Returns a fixed three-person standup regardless of the audio.
pub struct MockTranscriber;

const MOCK_TURNS: [(&str, &str); 3] = [
    (
        "Alice",
        "Yesterday I finished the auth module and fixed the mobile login bug. \
         Today I'm working on password reset. No blockers.",
    ),
    (
        "Bob",
        "I completed the profile migrations and updated the APIs. \
         Today I will build the profile page components. \
         I'm blocked on staging access and need IT approval.",
    ),
    (
        "Carol",
        "Reviewed and merged five pull requests yesterday. \
         Next I'm going to set up production alerts. Nothing blocking me.",
    ),
];

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &AudioUpload) -> Result<Transcription> {
        info!(file = %audio.filename, "using canned transcription");
        let text = MOCK_TURNS
            .iter()
            .map(|(speaker, words)| format!("{speaker}: {words}"))
            .collect::<Vec<_>>()
            .join("\n");
        let segments = MOCK_TURNS
            .iter()
            .enumerate()
            .map(|(i, (speaker, words))| TranscriptSegment {
                start: i as f64 * 60.0,
                end: (i + 1) as f64 * 60.0,
                text: format!("{speaker}: {words}"),
            })
            .collect();
        Ok(Transcription { text, segments })
    }
}

// ---------------------------------------------------------------------------
// Diarizers
// ---------------------------------------------------------------------------

/// Splits on `Name:` labels or at the midpoint; never calls a model.
pub struct TextDiarizer;

#[async_trait]
impl Diarizer for TextDiarizer {
    async fn diarize(&self, transcription: &Transcription) -> Result<Vec<Segment>> {
        Ok(split_transcript(&transcription.text))
    }
}

/// Asks a GPT model for speaker segments; unparseable answers are errors.
pub struct GptDiarizer {
    client: OpenAiClient,
}

impl GptDiarizer {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Diarizer for GptDiarizer {
    async fn diarize(&self, transcription: &Transcription) -> Result<Vec<Segment>> {
        info!("segmenting speakers with GPT");
        let reply = self
            .client
            .chat(&diarization_prompt(transcription))
            .await
            .context("speaker segmentation failed")?;
        let segments = parse_segments(&reply)
            .ok_or_else(|| anyhow!("speaker segmentation returned no valid JSON segments"))?;
        info!(segments = segments.len(), "speaker segmentation completed");
        Ok(segments)
    }
}

/// Asks a local Ollama model for speaker segments, falling back to text
/// splitting when the model is unreachable or its answer is unusable.
pub struct OllamaDiarizer {
    client: OllamaClient,
}

impl OllamaDiarizer {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Diarizer for OllamaDiarizer {
    async fn diarize(&self, transcription: &Transcription) -> Result<Vec<Segment>> {
        match self
            .client
            .generate(&diarization_prompt(transcription), true)
            .await
        {
            Ok(reply) => {
                if let Some(segments) = parse_segments(&reply) {
                    info!(segments = segments.len(), "speaker segmentation completed");
                    return Ok(segments);
                }
                warn!("Ollama segmentation was not valid JSON; splitting text instead");
            }
            Err(e) => warn!("Ollama segmentation failed, splitting text instead: {e:#}"),
        }
        Ok(split_transcript(&transcription.text))
    }
}

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

/// String-matching classifier; no model involved.
pub struct KeywordClassifier;

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        Ok(classify_by_keywords(text))
    }
}

/// GPT classification. Accepts JSON or labelled sections, otherwise errors.
pub struct GptClassifier {
    client: OpenAiClient,
}

impl GptClassifier {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Classifier for GptClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let reply = self
            .client
            .chat(&classification_prompt(text))
            .await
            .context("content classification failed")?;
        parse_classification(&reply)
            .ok_or_else(|| anyhow!("content classification returned an unreadable answer"))
    }
}

/// Ollama classification with keyword fallback on any failure.
pub struct OllamaClassifier {
    client: OllamaClient,
}

impl OllamaClassifier {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Classifier for OllamaClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        match self.client.generate(&classification_prompt(text), true).await {
            Ok(reply) => match parse_classification(&reply) {
                Some(classification) => return Ok(classification),
                None => warn!("Ollama classification unreadable; using keyword fallback"),
            },
            Err(e) => warn!("Ollama classification failed, using keyword fallback: {e:#}"),
        }
        Ok(classify_by_keywords(text))
    }
}

// ---------------------------------------------------------------------------
// StandupPipeline
// ---------------------------------------------------------------------------

/// The assembled three-stage pipeline.
pub struct StandupPipeline {
    provider: Provider,
    transcriber: Box<dyn Transcriber>,
    diarizer: Box<dyn Diarizer>,
    classifier: Box<dyn Classifier>,
}

impl StandupPipeline {
    pub fn new(
        provider: Provider,
        transcriber: Box<dyn Transcriber>,
        diarizer: Box<dyn Diarizer>,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        Self {
            provider,
            transcriber,
            diarizer,
            classifier,
        }
    }

    /// Canned transcription, text diarization, keyword classification.
    pub fn mock() -> Self {
        Self::new(
            Provider::Mock,
            Box::new(MockTranscriber),
            Box::new(TextDiarizer),
            Box::new(KeywordClassifier),
        )
    }

    /// Assemble the pipeline for the configured provider.
    ///
    /// Selecting OpenAI without an API key degrades to the mock pipeline.
    /// With Ollama, audio is still transcribed by Whisper when a key is
    /// available, and by the canned transcriber otherwise.
    pub fn from_config(config: &Config) -> Result<Self> {
        let openai = match config.credentials.openai_key() {
            Some(key) => Some(OpenAiClient::new(&config.openai, key)?),
            None => None,
        };

        let pipeline = match (config.provider, openai) {
            (Provider::OpenAi, Some(client)) => Self::new(
                Provider::OpenAi,
                Box::new(WhisperTranscriber::new(client.clone())),
                Box::new(GptDiarizer::new(client.clone())),
                Box::new(GptClassifier::new(client)),
            ),
            (Provider::OpenAi, None) => {
                warn!("OpenAI provider selected but no API key configured; using mock pipeline");
                Self::mock()
            }
            (Provider::Ollama, openai) => {
                let ollama = OllamaClient::from_config(&config.ollama)?;
                let transcriber: Box<dyn Transcriber> = match openai {
                    Some(client) => Box::new(WhisperTranscriber::new(client)),
                    None => {
                        info!("no OpenAI API key; audio uploads use canned transcription");
                        Box::new(MockTranscriber)
                    }
                };
                Self::new(
                    Provider::Ollama,
                    transcriber,
                    Box::new(OllamaDiarizer::new(ollama.clone())),
                    Box::new(OllamaClassifier::new(ollama)),
                )
            }
            (Provider::Mock, _) => Self::mock(),
        };
        Ok(pipeline)
    }

    /// The provider actually in use (after any degradation).
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Full pipeline for an uploaded recording.
    pub async fn process_audio(&self, audio: &AudioUpload) -> Result<Vec<SpeakerTurn>> {
        let transcription = self.transcriber.transcribe(audio).await?;
        let segments = self.diarizer.diarize(&transcription).await?;
        self.summarize(&segments).await
    }

    /// Pipeline for pasted text: local speaker split, then classification.
    pub async fn process_transcript(&self, text: &str) -> Result<Vec<SpeakerTurn>> {
        info!(chars = text.chars().count(), "processing transcript text");
        let segments = split_transcript(text);
        self.summarize(&segments).await
    }

    /// Classify each segment in order.
    pub async fn summarize(&self, segments: &[Segment]) -> Result<Vec<SpeakerTurn>> {
        let mut summaries = Vec::with_capacity(segments.len());
        for segment in segments {
            let classification = self
                .classifier
                .classify(&segment.text)
                .await
                .with_context(|| format!("failed to classify update from {}", segment.speaker))?;
            summaries.push(SpeakerTurn::from_segment(segment, classification.normalized()));
        }
        info!(speakers = summaries.len(), "content classification completed");
        Ok(summaries)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
