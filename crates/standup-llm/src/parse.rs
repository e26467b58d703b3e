// Best-effort parsing of model output, plus the keyword classifier used when
// a model is unavailable or answers in something other than JSON.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use standup_core::standup::{format_timestamp, Classification, Segment, NO_BLOCKERS};

// ---------------------------------------------------------------------------
// JSON extraction
// ---------------------------------------------------------------------------

/// Drop a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. "json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn extract_span(text: &str, open: char, close: char) -> Option<Value> {
    let text = strip_code_fence(text);
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Some(v);
    }
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Parse the outermost `{...}` in `text` as a JSON object.
pub fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    match extract_span(text, '{', '}')? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Parse the outermost `[...]` in `text` as a JSON array.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    match extract_span(text, '[', ']')? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Case-insensitive field lookup that flattens arrays of strings.
fn field_text(map: &serde_json::Map<String, Value>, names: &[&str]) -> Option<String> {
    let value = map
        .iter()
        .find(|(k, _)| names.iter().any(|n| k.eq_ignore_ascii_case(n)))
        .map(|(_, v)| v)?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn classification_from_json(text: &str) -> Option<Classification> {
    let map = extract_json_object(text)?;
    let yesterday = field_text(&map, &["yesterday"]);
    let today = field_text(&map, &["today"]);
    let blockers = field_text(&map, &["blockers", "blocker"]);
    if yesterday.is_none() && today.is_none() && blockers.is_none() {
        return None;
    }
    Some(
        Classification {
            yesterday: yesterday.unwrap_or_default(),
            today: today.unwrap_or_default(),
            blockers: blockers.unwrap_or_default(),
        }
        .normalized(),
    )
}

fn section_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:[-*•]\s*)?(?:\d+[.)]\s*)?(?:\*\*)?(yesterday|today|blockers?)(?:\*\*)?\s*:(?:\*\*)?\s*(.*)$",
        )
        .expect("section label regex is valid")
    })
}

/// Read `Yesterday: ... / Today: ... / Blockers: ...` sections from free text.
/// Lines without a label continue the previous section.
fn classification_from_sections(text: &str) -> Option<Classification> {
    let mut sections: [Option<String>; 3] = [None, None, None];
    let mut current: Option<usize> = None;

    for line in text.lines() {
        if let Some(caps) = section_label_re().captures(line) {
            let idx = match caps[1].to_ascii_lowercase().as_str() {
                "yesterday" => 0,
                "today" => 1,
                _ => 2,
            };
            let entry = sections[idx].get_or_insert_with(String::new);
            append(entry, caps[2].trim());
            current = Some(idx);
        } else if let Some(idx) = current {
            let line = line.trim();
            if !line.is_empty() {
                if let Some(entry) = sections[idx].as_mut() {
                    append(entry, line);
                }
            }
        }
    }

    let [yesterday, today, blockers] = sections;
    if yesterday.is_none() && today.is_none() {
        return None;
    }
    Some(
        Classification {
            yesterday: yesterday.unwrap_or_default(),
            today: today.unwrap_or_default(),
            blockers: blockers.unwrap_or_default(),
        }
        .normalized(),
    )
}

/// Parse a model's classification answer: JSON first, then labelled sections.
pub fn parse_classification(text: &str) -> Option<Classification> {
    classification_from_json(text).or_else(|| classification_from_sections(text))
}

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// Parse a model's diarization answer: a JSON array of segments, bare or
/// wrapped in an object under `segments`. Segments without text are dropped.
pub fn parse_segments(text: &str) -> Option<Vec<Segment>> {
    let items = match extract_json_object(text) {
        Some(map) => match map.get("segments") {
            Some(Value::Array(items)) => items.clone(),
            _ => extract_json_array(text)?,
        },
        None => extract_json_array(text)?,
    };

    let segments: Vec<Segment> = items.iter().filter_map(segment_from_value).collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// One diarized segment. Speaker and non-blank text are required. Times may
/// be `HH:MM:SS` strings or plain seconds.
fn segment_from_value(item: &Value) -> Option<Segment> {
    let speaker = item.get("speaker")?.as_str()?.trim();
    let text = item.get("text")?.as_str()?.trim();
    if speaker.is_empty() || text.is_empty() {
        return None;
    }
    Some(Segment {
        speaker: speaker.to_string(),
        start_time: time_field(item.get("start_time")),
        end_time: time_field(item.get("end_time")),
        text: text.to_string(),
    })
}

fn time_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.as_f64().map(format_timestamp).unwrap_or_default(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Keyword fallback
// ---------------------------------------------------------------------------

const NEGATED_BLOCKER_CUES: &[&str] = &[
    "no blocker",
    "no blocking",
    "nothing block",
    "not blocked",
    "no issues",
    "no impediment",
    "nothing in my way",
];

const BLOCKER_CUES: &[&str] = &[
    "block",
    "stuck",
    "waiting on",
    "waiting for",
    "depend on",
];

/// "need ... approval / access / help", with a few words allowed in between.
fn needs_something_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bneeds?\b.{0,40}?\b(?:approval|access|help)\b")
            .expect("blocker need regex is valid")
    })
}

fn is_blocker(lower: &str) -> bool {
    contains_any(lower, BLOCKER_CUES) || needs_something_re().is_match(lower)
}

const YESTERDAY_CUES: &[&str] = &[
    "yesterday",
    "finished",
    "completed",
    "done",
    "fixed",
    "merged",
    "deployed",
    "reviewed",
    "shipped",
    "wrapped up",
    "worked on",
];

const TODAY_CUES: &[&str] = &[
    "today",
    "will ",
    "going to",
    "plan",
    "working on",
    "next",
    "focus on",
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Yesterday,
    Today,
    Blockers,
}

/// Split into sentences on `.`, `!`, `?` followed by whitespace, and on newlines.
/// Dots inside tokens such as `v2.1.3` do not split.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if !matches!(c, '.' | '!' | '?' | '\n') {
            continue;
        }
        let end = i + c.len_utf8();
        let at_break = text[end..].chars().next().map_or(true, char::is_whitespace);
        if c == '\n' || at_break {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn contains_any(haystack: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| haystack.contains(cue))
}

/// Classify an update by string matching alone.
///
/// Each sentence goes to the first bucket whose cue words it contains
/// (blockers, then yesterday, then today). Sentences with no cue continue the
/// previous sentence's bucket. Negated blocker phrases ("no blockers") are
/// consumed without adding a blocker.
pub fn classify_by_keywords(text: &str) -> Classification {
    let mut yesterday: Vec<&str> = Vec::new();
    let mut today: Vec<&str> = Vec::new();
    let mut blockers: Vec<&str> = Vec::new();
    let mut last: Option<Bucket> = None;

    for sentence in sentences(text) {
        let lower = sentence.to_lowercase();
        if contains_any(&lower, NEGATED_BLOCKER_CUES) {
            last = None;
            continue;
        }

        let bucket = if is_blocker(&lower) {
            Some(Bucket::Blockers)
        } else if contains_any(&lower, YESTERDAY_CUES) {
            Some(Bucket::Yesterday)
        } else if contains_any(&lower, TODAY_CUES) {
            Some(Bucket::Today)
        } else {
            last
        };

        match bucket {
            Some(Bucket::Yesterday) => yesterday.push(sentence),
            Some(Bucket::Today) => today.push(sentence),
            Some(Bucket::Blockers) => blockers.push(sentence),
            None => {}
        }
        last = bucket;
    }

    let blockers = if blockers.is_empty() {
        NO_BLOCKERS.to_string()
    } else {
        blockers.join(" ")
    };

    Classification {
        yesterday: yesterday.join(" "),
        today: today.join(" "),
        blockers,
    }
    .normalized()
}

fn append(buf: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(text);
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use standup_core::standup::NO_UPDATE;

    #[test]
    fn object_extracted_from_chatty_reply() {
        let reply = "Sure! Here is the JSON:\n{\"yesterday\": \"a\", \"today\": \"b\"}\nHope that helps.";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["today"], "b");
    }

    #[test]
    fn object_extracted_from_code_fence() {
        let reply = "```json\n{\"blockers\": \"None\"}\n```";
        assert_eq!(extract_json_object(reply).unwrap()["blockers"], "None");
    }

    #[test]
    fn array_is_not_an_object() {
        assert!(extract_json_object("[1, 2]").is_none());
        assert_eq!(extract_json_array("[1, 2]").unwrap().len(), 2);
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_array("] backwards [").is_none());
    }

    #[test]
    fn classification_from_json_reply() {
        let reply = r#"{"Yesterday": "Fixed login", "today": ["Password reset", "Email"], "blockers": ""}"#;
        let c = parse_classification(reply).unwrap();
        assert_eq!(c.yesterday, "Fixed login");
        assert_eq!(c.today, "Password reset; Email");
        assert_eq!(c.blockers, "None");
    }

    #[test]
    fn classification_from_labelled_sections() {
        let reply = "Here's the breakdown:\n\
                     **Yesterday:** Finished migrations\n\
                     and updated APIs.\n\
                     - Today: Frontend components\n\
                     3. Blockers: Staging access";
        let c = parse_classification(reply).unwrap();
        assert_eq!(c.yesterday, "Finished migrations and updated APIs.");
        assert_eq!(c.today, "Frontend components");
        assert_eq!(c.blockers, "Staging access");
    }

    #[test]
    fn classification_rejects_unrelated_text() {
        assert!(parse_classification("I cannot help with that.").is_none());
        assert!(parse_classification(r#"{"answer": 42}"#).is_none());
    }

    #[test]
    fn segments_from_bare_array() {
        let reply = r#"[
            {"speaker": "Speaker A", "start_time": "00:00:00", "end_time": "00:00:30", "text": " Hello "},
            {"speaker": "Speaker B", "text": ""},
            {"text": "no speaker"},
            {"speaker": "Speaker B", "start_time": "00:00:30", "end_time": "00:01:00", "text": "Hi"}
        ]"#;
        let segments = parse_segments(reply).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello");
        assert_eq!(segments[1].speaker, "Speaker B");
        assert_eq!(segments[1].end_time, "00:01:00");
    }

    #[test]
    fn segments_from_wrapped_object() {
        let reply = r#"{"segments": [{"speaker": "Alice", "text": "Done"}]}"#;
        let segments = parse_segments(reply).unwrap();
        assert_eq!(segments[0].speaker, "Alice");
        assert_eq!(segments[0].start_time, "");
    }

    #[test]
    fn segments_accept_numeric_times() {
        let reply = r#"[{"speaker": "Speaker A", "start_time": 0.0, "end_time": 4.2, "text": "hi"},
                        {"speaker": "Speaker B", "start_time": 75, "end_time": null, "text": "hey"}]"#;
        let segments = parse_segments(reply).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_time, "00:00:00");
        assert_eq!(segments[0].end_time, "00:00:04");
        assert_eq!(segments[1].start_time, "00:01:15");
        assert_eq!(segments[1].end_time, "");
    }

    #[test]
    fn empty_segment_list_is_none() {
        assert!(parse_segments("[]").is_none());
        assert!(parse_segments("nothing").is_none());
    }

    #[test]
    fn sentences_keep_version_numbers_whole() {
        assert_eq!(
            sentences("Deployed v2.1.3 to staging. Next up: alerts!\nDone"),
            vec!["Deployed v2.1.3 to staging.", "Next up: alerts!", "Done"]
        );
    }

    #[test]
    fn keywords_sort_sample_update() {
        let c = classify_by_keywords(
            "Got the database migrations done for user profiles, updated APIs. \
             Working on frontend components today. \
             Still blocked on staging access - need IT approval.",
        );
        assert_eq!(
            c.yesterday,
            "Got the database migrations done for user profiles, updated APIs."
        );
        assert_eq!(c.today, "Working on frontend components today.");
        assert_eq!(
            c.blockers,
            "Still blocked on staging access - need IT approval."
        );
    }

    #[test]
    fn need_with_words_in_between_is_a_blocker() {
        let c = classify_by_keywords(
            "Yesterday I fixed the build. I need admin access to the prod cluster.",
        );
        assert_eq!(c.yesterday, "Yesterday I fixed the build.");
        assert_eq!(c.blockers, "I need admin access to the prod cluster.");
    }

    #[test]
    fn need_without_a_blocking_object_is_not_a_blocker() {
        let c = classify_by_keywords("Today I need to finish the report.");
        assert_eq!(c.today, "Today I need to finish the report.");
        assert_eq!(c.blockers, NO_BLOCKERS);
    }

    #[test]
    fn negated_blockers_become_none() {
        let c = classify_by_keywords(
            "Yesterday I finished the auth module and fixed that mobile login issue. \
             Today I'm working on password reset integration. No blockers right now.",
        );
        assert!(c.yesterday.starts_with("Yesterday I finished"));
        assert_eq!(c.today, "Today I'm working on password reset integration.");
        assert_eq!(c.blockers, NO_BLOCKERS);
    }

    #[test]
    fn uncued_sentence_follows_previous_bucket() {
        let c = classify_by_keywords("Today I will pair with Sam. It should take the morning.");
        assert_eq!(c.today, "Today I will pair with Sam. It should take the morning.");
        assert_eq!(c.yesterday, NO_UPDATE);
    }

    #[test]
    fn empty_text_gets_placeholders() {
        let c = classify_by_keywords("");
        assert_eq!(c.yesterday, NO_UPDATE);
        assert_eq!(c.today, NO_UPDATE);
        assert_eq!(c.blockers, NO_BLOCKERS);
    }
}
