// Prompt templates for speaker diarization and standup classification.

use standup_core::standup::Transcription;

/// Build the prompt asking a model to split a transcript by speaker.
///
/// Includes the full text plus every timed segment as `{start}s-{end}s: text`
/// so the model can carry timestamps into its answer.
pub fn diarization_prompt(transcription: &Transcription) -> String {
    let mut prompt = String::with_capacity(transcription.text.len() * 2 + 512);

    prompt.push_str(
        "Please analyze this standup meeting transcript and identify different speakers.\n\
         Segment the text by speaker and assign speaker names (like Speaker A, Speaker B, etc.).\n\
         Use a speaker's real name instead if they introduce themselves.\n\
         Return a JSON array with segments containing: speaker, start_time, end_time, text.\n\n",
    );

    prompt.push_str("Transcript: ");
    prompt.push_str(transcription.text.trim());
    prompt.push_str("\n\n");

    if !transcription.segments.is_empty() {
        prompt.push_str("Segments with timestamps:\n");
        for seg in &transcription.segments {
            prompt.push_str(&format!("{}s-{}s: {}\n", seg.start, seg.end, seg.text.trim()));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Please return only valid JSON in this format:\n\
         [{\"speaker\": \"Speaker A\", \"start_time\": \"00:00:00\", \"end_time\": \"00:00:30\", \"text\": \"speaker content\"}]",
    );
    prompt
}

/// Build the prompt asking a model to sort one speaker's update into
/// yesterday / today / blockers.
pub fn classification_prompt(speaker_text: &str) -> String {
    format!(
        "Analyze this standup update and extract:\n\
         1. Yesterday: What work was completed since last standup\n\
         2. Today: What work is planned for today\n\
         3. Blockers: Any impediments or issues (use \"None\" if no blockers)\n\
         \n\
         Provide brief, clear summaries for each category.\n\
         \n\
         Speaker content: \"{}\"\n\
         \n\
         Return only valid JSON in this format:\n\
         {{\n  \"yesterday\": \"summary of yesterday's work\",\n  \"today\": \"summary of today's plans\",\n  \"blockers\": \"blockers or None\"\n}}",
        speaker_text.trim().replace('"', "'")
    )
}
