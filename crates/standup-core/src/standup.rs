// Standup records, speaker turns, and the naming helpers shared by the
// store, the pipeline, and the HTTP layer.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Blockers value used when a speaker reports nothing in their way.
pub const NO_BLOCKERS: &str = "None";

/// Placeholder for a yesterday/today bucket the speaker never addressed.
pub const NO_UPDATE: &str = "No update provided.";

/// Length of the synthetic time slot given to each text-derived turn.
const TEXT_TURN_SECS: u64 = 120;

/// Longest string still accepted as a `Name:` speaker label.
const MAX_LABEL_LEN: usize = 40;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One person's segment of a standup, classified into the three buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerTurn {
    pub speaker: String,
    pub initial: String,
    pub time: String,
    pub yesterday: String,
    pub today: String,
    pub blockers: String,
    pub raw_content: String,
}

impl SpeakerTurn {
    /// Combine a diarized segment with its classification.
    pub fn from_segment(segment: &Segment, classification: Classification) -> Self {
        Self {
            speaker: segment.speaker.clone(),
            initial: speaker_initial(&segment.speaker),
            time: format!("{}-{}", segment.start_time, segment.end_time),
            yesterday: classification.yesterday,
            today: classification.today,
            blockers: classification.blockers,
            raw_content: segment.text.clone(),
        }
    }
}

/// One meeting record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standup {
    pub id: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_today: Option<bool>,
    pub team: String,
    pub summary: Vec<SpeakerTurn>,
}

impl Standup {
    /// Build a fresh standup for `team_key` stamped with `now`.
    pub fn new<Tz: TimeZone>(team_key: &str, now: &DateTime<Tz>, summary: Vec<SpeakerTurn>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            id: new_standup_id(team_key, now),
            date: standup_date(now),
            is_today: None,
            team: capitalize_team(team_key),
            summary,
        }
    }
}

/// Entry in the team listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub name: String,
    pub path: String,
    pub meeting_count: usize,
}

// ---------------------------------------------------------------------------
// Pipeline types
// ---------------------------------------------------------------------------

/// A timed chunk of transcribed speech, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Output of the transcription step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

/// A speaker-attributed turn produced by diarization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub speaker: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    pub text: String,
}

/// Yesterday / today / blockers for a single turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub yesterday: String,
    #[serde(default)]
    pub today: String,
    #[serde(default)]
    pub blockers: String,
}

impl Classification {
    /// Trim every field and fill empty ones with their placeholders.
    pub fn normalized(self) -> Self {
        let fill = |s: String, default: &str| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed.to_string()
            }
        };
        Self {
            yesterday: fill(self.yesterday, NO_UPDATE),
            today: fill(self.today, NO_UPDATE),
            blockers: fill(self.blockers, NO_BLOCKERS),
        }
    }
}

/// An uploaded audio recording held in memory.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Naming helpers
// ---------------------------------------------------------------------------

/// Human-readable team name from a team key.
///
/// Only the first hyphen becomes a space; then the first character of every
/// run of word characters is uppercased (`qa-automation` -> `Qa Automation`).
pub fn display_team_name(key: &str) -> String {
    let replaced = key.replacen('-', " ", 1);
    let mut out = String::with_capacity(replaced.len());
    let mut in_word = false;
    for c in replaced.chars() {
        let is_word = c.is_alphanumeric() || c == '_';
        if is_word && !in_word {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        in_word = is_word;
    }
    out
}

/// Uppercase the first character of a team key (`development` -> `Development`).
pub fn capitalize_team(team: &str) -> String {
    let mut chars = team.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Avatar initial for a speaker.
///
/// Generic diarization labels (`Speaker B`) use their trailing letter; real
/// names use the uppercased first letter.
pub fn speaker_initial(speaker: &str) -> String {
    let trimmed = speaker.trim();
    if let Some(label) = trimmed.strip_prefix("Speaker ") {
        if let Some(last) = label.trim().chars().last() {
            return last.to_uppercase().collect();
        }
    }
    match trimmed.chars().next() {
        Some(first) => first.to_uppercase().collect(),
        None => "?".to_string(),
    }
}

/// Format seconds as `HH:MM:SS`. Negative and non-finite input clamps to zero.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Standup identifier: `{team}-{unix millis}`.
pub fn new_standup_id<Tz: TimeZone>(team_key: &str, now: &DateTime<Tz>) -> String {
    format!("{team_key}-{}", now.timestamp_millis())
}

/// Meeting date in `dd/mm/yyyy` form.
pub fn standup_date<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%d/%m/%Y").to_string()
}

// ---------------------------------------------------------------------------
// Text diarization
// ---------------------------------------------------------------------------

/// Split a pasted transcript into speaker segments without calling a model.
///
/// Transcripts written as `Name: utterance` lines are grouped by speaker turn
/// (consecutive lines from the same speaker merge; unlabelled lines continue
/// the previous turn). Anything else is cut at its character midpoint into
/// `Speaker A` and `Speaker B`.
pub fn split_transcript(text: &str) -> Vec<Segment> {
    if let Some(segments) = split_labelled(text) {
        return segments;
    }

    let chars: Vec<char> = text.chars().collect();
    let mid = chars.len() / 2;
    let halves = [
        ("Speaker A", chars[..mid].iter().collect::<String>()),
        ("Speaker B", chars[mid..].iter().collect::<String>()),
    ];

    halves
        .into_iter()
        .enumerate()
        .filter_map(|(slot, (speaker, half))| {
            let half = half.trim();
            if half.is_empty() {
                return None;
            }
            Some(timed_segment(speaker, slot, half.to_string()))
        })
        .collect()
}

fn split_labelled(text: &str) -> Option<Vec<Segment>> {
    let mut turns: Vec<(String, String)> = Vec::new();
    let mut preamble = String::new();
    let mut labelled_lines = 0;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match parse_speaker_label(line) {
            Some((speaker, utterance)) => {
                labelled_lines += 1;
                let same_speaker = turns.last().is_some_and(|(last, _)| last == speaker);
                if !same_speaker {
                    // Text before the first label opens the first turn.
                    turns.push((speaker.to_string(), std::mem::take(&mut preamble)));
                }
                if let Some((_, body)) = turns.last_mut() {
                    push_sentence(body, utterance);
                }
            }
            None => match turns.last_mut() {
                Some((_, body)) => push_sentence(body, line),
                None => push_sentence(&mut preamble, line),
            },
        }
    }

    if labelled_lines < 2 {
        return None;
    }

    Some(
        turns
            .into_iter()
            .filter(|(_, body)| !body.trim().is_empty())
            .enumerate()
            .map(|(slot, (speaker, body))| timed_segment(&speaker, slot, body))
            .collect(),
    )
}

fn parse_speaker_label(line: &str) -> Option<(&str, &str)> {
    let (label, rest) = line.split_once(':')?;
    let label = label.trim();
    let starts_with_letter = label.chars().next().is_some_and(char::is_alphabetic);
    let plain = !label.contains(['.', '!', '?', ',', '"']);
    if is_section_heading(label) {
        return None;
    }
    // Clock times such as "09:30" never reach here because they start with a digit.
    if starts_with_letter && plain && label.chars().count() <= MAX_LABEL_LEN {
        Some((label, rest.trim()))
    } else {
        None
    }
}

/// `Yesterday:` / `Today:` / `Blockers:` headings belong to the current
/// speaker's update; they are not speaker names.
fn is_section_heading(label: &str) -> bool {
    ["yesterday", "today", "blocker", "blockers"]
        .iter()
        .any(|heading| label.eq_ignore_ascii_case(heading))
}

fn push_sentence(body: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !body.is_empty() {
        body.push(' ');
    }
    body.push_str(text);
}

fn timed_segment(speaker: &str, slot: usize, text: String) -> Segment {
    let start = slot as u64 * TEXT_TURN_SECS;
    Segment {
        speaker: speaker.to_string(),
        start_time: format_timestamp(start as f64),
        end_time: format_timestamp((start + TEXT_TURN_SECS) as f64),
        text,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
