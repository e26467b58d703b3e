// CSV export of a standup summary table.

use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};

use crate::standup::Standup;

const HEADER: [&str; 5] = ["Speaker", "Time", "Yesterday", "Today", "Blockers"];

/// Render the summary table of `standup` as CSV.
///
/// Laid out like the results page download: a bare header row, then one fully
/// quoted row per speaker, with no newline after the last row.
pub fn summary_csv(standup: &Standup) -> Result<String> {
    let mut out = write_records(QuoteStyle::Necessary, [HEADER.map(String::from)])
        .context("failed to write CSV header")?;

    let rows = standup.summary.iter().map(|turn| {
        [
            turn.speaker.clone(),
            turn.time.clone(),
            turn.yesterday.clone(),
            turn.today.clone(),
            turn.blockers.clone(),
        ]
    });
    out.push_str(&write_records(QuoteStyle::Always, rows).context("failed to write CSV rows")?);

    if out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

fn write_records<I>(style: QuoteStyle, records: I) -> Result<String>
where
    I: IntoIterator<Item = [String; 5]>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(style)
        .from_writer(Vec::new());
    for record in records {
        writer.write_record(&record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush CSV writer: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Download file name: `{team}_standup_summary_{dd-mm-yyyy}.csv`.
///
/// Characters that cannot sit inside a quoted `Content-Disposition` filename
/// (control characters, quotes, backslashes, non-ASCII) become `_`.
pub fn csv_filename(standup: &Standup) -> String {
    format!(
        "{}_standup_summary_{}.csv",
        standup.team,
        standup.date.replace('/', "-")
    )
    .chars()
    .map(|c| {
        if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
            c
        } else {
            '_'
        }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standup::SpeakerTurn;

    fn standup_with(turns: Vec<SpeakerTurn>) -> Standup {
        Standup {
            id: "ui-1".into(),
            date: "03/07/2025".into(),
            is_today: None,
            team: "Ui".into(),
            summary: turns,
        }
    }

    fn turn(speaker: &str, blockers: &str) -> SpeakerTurn {
        SpeakerTurn {
            speaker: speaker.into(),
            initial: speaker.chars().take(1).collect(),
            time: "00:00:00-00:02:00".into(),
            yesterday: "Fixed the navbar".into(),
            today: "Dark mode".into(),
            blockers: blockers.into(),
            raw_content: "raw".into(),
        }
    }

    #[test]
    fn bare_header_then_quoted_rows() {
        let csv = summary_csv(&standup_with(vec![turn("Dana", "None")])).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Speaker,Time,Yesterday,Today,Blockers");
        assert_eq!(
            lines[1],
            r#""Dana","00:00:00-00:02:00","Fixed the navbar","Dark mode","None""#
        );
        assert_eq!(lines.len(), 2);
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn embedded_quotes_and_commas_are_escaped() {
        let csv = summary_csv(&standup_with(vec![turn("Eve", r#"Waiting on "infra", again"#)]))
            .unwrap();
        assert!(csv.contains(r#""Waiting on ""infra"", again""#));
    }

    #[test]
    fn empty_summary_has_header_only() {
        let csv = summary_csv(&standup_with(vec![])).unwrap();
        assert_eq!(csv, "Speaker,Time,Yesterday,Today,Blockers");
    }

    #[test]
    fn filename_replaces_date_slashes() {
        assert_eq!(
            csv_filename(&standup_with(vec![])),
            "Ui_standup_summary_03-07-2025.csv"
        );
    }

    #[test]
    fn filename_drops_header_unsafe_characters() {
        let mut standup = standup_with(vec![]);
        standup.team = "Ops\nteam \"a\"\\é".into();
        assert_eq!(
            csv_filename(&standup),
            "Ops_team _a____standup_summary_03-07-2025.csv"
        );
    }
}
