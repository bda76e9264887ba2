use std::{path::Path, sync::LazyLock};

use regex::Regex;

use crate::error::{Error, Result};

/// `HH:MM:SS,mmm --> HH:MM:SS,mmm`. A `.` millisecond separator is
/// tolerated on input; timecodes are kept verbatim.
static TIMING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?<start>\d{2}:\d{2}:\d{2}[,.]\d{3})\s*-->\s*(?<end>\d{2}:\d{2}:\d{2}[,.]\d{3})\s*$",
    )
    .expect("timing line pattern is valid")
});

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Identifier as written in the file. Not necessarily contiguous.
    pub index: u64,
    pub start: String,
    pub end: String,
    pub text: String,
}

/// Cues recovered from one file, in file order.
#[derive(Debug, Default)]
pub struct ParsedSubtitles {
    pub cues: Vec<Cue>,
    /// Blocks that did not have the cue shape and were skipped.
    pub malformed_blocks: usize,
}

/// Read a subtitle file as UTF-8, dropping a leading byte order mark.
pub fn read_subtitle_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::PathNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;

    let (content, had_errors) =
        encoding_rs::UTF_8.decode_with_bom_removal(&bytes);
    if had_errors {
        tracing::warn!(
            path = %path.display(),
            "invalid UTF-8 sequences replaced while reading subtitles"
        );
    }
    Ok(content.into_owned())
}

/// Read and parse a subtitle file.
pub fn parse_subtitle_file(path: &Path) -> Result<ParsedSubtitles> {
    let _span =
        tracing::info_span!("subtitles", path = %path.display()).entered();
    let content = read_subtitle_file(path)?;
    Ok(parse_subtitles(&content))
}

/// Parse subtitle text into cues.
///
/// Blocks are separated by one or more blank lines. A block that does not
/// have the cue shape is skipped and counted; the rest of the file is
/// still parsed.
pub fn parse_subtitles(content: &str) -> ParsedSubtitles {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut parsed = ParsedSubtitles::default();
    for (first_line, block) in split_blocks(&normalized) {
        match parse_block(&block, first_line) {
            Ok(cue) => parsed.cues.push(cue),
            Err(e) => {
                tracing::warn!("skipping block: {e}");
                parsed.malformed_blocks += 1;
            }
        }
    }
    parsed
}

/// Group lines into blocks, remembering the 1-based line number each
/// block starts on.
fn split_blocks(content: &str) -> Vec<(usize, Vec<&str>)> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start = 0;

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push((start, std::mem::take(&mut current)));
            }
            continue;
        }
        if current.is_empty() {
            start = idx + 1;
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push((start, current));
    }

    blocks
}

/// Parse one block: identifier line, timing line, then text lines.
pub fn parse_block(lines: &[&str], first_line: usize) -> Result<Cue> {
    let malformed = |reason| Error::MalformedSubtitleBlock {
        line: first_line,
        reason,
    };

    let [id_line, timing_line, text_lines @ ..] = lines else {
        return Err(malformed("expected identifier, timing and text lines"));
    };
    if text_lines.is_empty() {
        return Err(malformed("cue has no text"));
    }

    let index = id_line
        .trim()
        .parse::<u64>()
        .map_err(|_| malformed("identifier line is not a number"))?;

    let caps = TIMING_LINE
        .captures(timing_line)
        .ok_or_else(|| malformed("timing line is not `start --> end`"))?;

    let text = text_lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Cue {
        index,
        start: caps["start"].to_string(),
        end: caps["end"].to_string(),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_block() {
        let parsed =
            parse_subtitles("1\n00:00:01,000 --> 00:00:02,000\n私は元気です\n");
        assert_eq!(parsed.malformed_blocks, 0);
        assert_eq!(
            parsed.cues,
            vec![Cue {
                index: 1,
                start: "00:00:01,000".to_string(),
                end: "00:00:02,000".to_string(),
                text: "私は元気です".to_string(),
            }]
        );
    }

    #[test]
    fn keeps_multiline_text_and_order() {
        let content = "\
1
00:00:01,000 --> 00:00:02,000
first line
second line

5
00:01:00,250 --> 00:01:03,000
later cue
";
        let parsed = parse_subtitles(content);
        assert_eq!(parsed.cues.len(), 2);
        assert_eq!(parsed.cues[0].text, "first line\nsecond line");
        assert_eq!(parsed.cues[1].index, 5);
        assert_eq!(parsed.cues[1].start, "00:01:00,250");
    }

    #[test]
    fn skips_malformed_block_and_keeps_the_rest() {
        let content = "\
1
00:00:01,000 --> 00:00:02,000
good

two
not a timing line
bad

3
00:00:05,000 --> 00:00:06,000
also good
";
        let parsed = parse_subtitles(content);
        assert_eq!(parsed.malformed_blocks, 1);
        let texts: Vec<_> = parsed.cues.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["good", "also good"]);
    }

    #[test]
    fn block_without_text_is_malformed() {
        let parsed = parse_subtitles("1\n00:00:01,000 --> 00:00:02,000\n");
        assert!(parsed.cues.is_empty());
        assert_eq!(parsed.malformed_blocks, 1);
    }

    #[test]
    fn tolerates_bom_crlf_and_extra_blank_lines() {
        let content = "\u{feff}1\r\n00:00:01,000-->00:00:02,000\r\nhello\r\n\r\n\r\n   \r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nworld\r\n";
        let parsed = parse_subtitles(content);
        assert_eq!(parsed.malformed_blocks, 0);
        assert_eq!(parsed.cues.len(), 2);
        assert_eq!(parsed.cues[0].text, "hello");
        assert_eq!(parsed.cues[1].text, "world");
    }

    #[test]
    fn timecodes_are_kept_verbatim() {
        let parsed =
            parse_subtitles("1\n00:00:01.000 --> 00:00:02.500\nperiod style\n");
        assert_eq!(parsed.cues[0].start, "00:00:01.000");
        assert_eq!(parsed.cues[0].end, "00:00:02.500");
    }

    #[test]
    fn malformed_error_reports_start_line() {
        let err = parse_block(&["x", "00:00:01,000 --> 00:00:02,000", "t"], 9)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedSubtitleBlock { line: 9, .. }
        ));
    }

    #[test]
    fn empty_content_has_no_cues() {
        let parsed = parse_subtitles("");
        assert!(parsed.cues.is_empty());
        assert_eq!(parsed.malformed_blocks, 0);
    }

    #[test]
    fn reads_file_with_bom() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("1.srt");
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(
            "1\n00:00:01,000 --> 00:00:02,000\nこんにちは\n".as_bytes(),
        );
        std::fs::write(&path, bytes).unwrap();

        let parsed = parse_subtitle_file(&path).unwrap();
        assert_eq!(parsed.cues.len(), 1);
        assert_eq!(parsed.cues[0].index, 1);
        assert_eq!(parsed.cues[0].text, "こんにちは");
    }

    #[test]
    fn missing_file_is_path_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = parse_subtitle_file(&tmp.path().join("nope.srt")).unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }
}
