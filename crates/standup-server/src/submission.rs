// Request extractor for standup submissions.
//
// The upload page posts audio as multipart/form-data and pasted transcripts
// as JSON; form-encoded bodies are accepted too. All three land in the same
// `Submission`.

use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde::Deserialize;
use tracing::debug;

use standup_core::standup::AudioUpload;

use crate::error::ApiError;

/// Raw fields of a submission, before validation.
#[derive(Debug, Default)]
pub struct Submission {
    pub team: Option<String>,
    pub transcript: Option<String>,
    pub audio: Option<AudioUpload>,
}

/// What a validated submission asks the pipeline to do.
#[derive(Debug)]
pub enum SubmissionInput {
    Audio(AudioUpload),
    Transcript(String),
}

#[derive(Debug, Default, Deserialize)]
struct SubmissionFields {
    team: Option<String>,
    transcript: Option<String>,
}

impl From<SubmissionFields> for Submission {
    fn from(fields: SubmissionFields) -> Self {
        Self {
            team: fields.team,
            transcript: fields.transcript,
            audio: None,
        }
    }
}

impl Submission {
    /// Check the submission and split it into team key and input.
    ///
    /// A team is required. Audio wins over a transcript when both are sent;
    /// empty audio and blank transcripts count as absent.
    pub fn validate(self) -> Result<(String, SubmissionInput), ApiError> {
        let team = self
            .team
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Team is required".into()))?
            .to_string();

        if let Some(audio) = self.audio.filter(|a| !a.bytes.is_empty()) {
            return Ok((team, SubmissionInput::Audio(audio)));
        }
        match self.transcript.filter(|t| !t.trim().is_empty()) {
            Some(text) => Ok((team, SubmissionInput::Transcript(text))),
            None => Err(ApiError::BadRequest(
                "No audio file or transcript provided".into(),
            )),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::Rejected {
                    status: e.status(),
                    message: e.body_text(),
                })?;
            read_multipart(multipart).await
        } else if content_type.starts_with("application/json") {
            let Json(fields) = Json::<SubmissionFields>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Rejected {
                    status: e.status(),
                    message: e.body_text(),
                })?;
            Ok(fields.into())
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<SubmissionFields>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Rejected {
                    status: e.status(),
                    message: e.body_text(),
                })?;
            Ok(fields.into())
        } else {
            debug!(content_type = %content_type, "submission without a recognised body type");
            Ok(Submission::default())
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<Submission, ApiError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let filename = field.file_name().unwrap_or("audio").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                debug!(file = %filename, bytes = bytes.len(), "received audio upload");
                submission.audio = Some(AudioUpload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "team" => submission.team = Some(field.text().await.map_err(multipart_error)?),
            "transcript" => {
                submission.transcript = Some(field.text().await.map_err(multipart_error)?)
            }
            other => debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    Ok(submission)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Rejected {
        status: e.status(),
        message: e.body_text(),
    }
}
