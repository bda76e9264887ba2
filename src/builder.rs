use std::{collections::HashSet, path::Path};

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    document::{Document, Posting},
    error::{Error, Result},
    metadata::{EpisodeMetadata, extract_metadata},
    srt::{Cue, parse_subtitle_file},
    tokenizer::TextTokenizer,
    walker::{DiscoveredFile, discover_files},
};

/// Counts gathered while building an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub files_found: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub malformed_blocks: usize,
    pub cues_indexed: usize,
    pub postings: usize,
    pub distinct_words: usize,
}

/// Documents and postings for a whole corpus, ready to be stored.
#[derive(Debug)]
pub struct BuiltIndex {
    pub documents: Vec<Document>,
    pub postings: Vec<Posting>,
    pub report: BuildReport,
    /// Canonical corpus root the index was built from.
    pub corpus_root: String,
    /// Name of the segmenter that produced the postings.
    pub segmenter: String,
}

/// One file's contribution before document ids are assigned.
struct FileEntries {
    metadata: EpisodeMetadata,
    cues: Vec<(Cue, Vec<String>)>,
    malformed_blocks: usize,
}

/// Walk `root` and turn every subtitle cue under it into a document.
///
/// Files are parsed and tokenized in parallel, then merged in path order so
/// document ids are stable for a given corpus. Files whose location or name
/// cannot be interpreted are skipped with a warning; a tokenizer failure
/// aborts the build. Nothing is written to storage.
pub fn build_index(
    root: &Path,
    tokenizer: &TextTokenizer,
) -> Result<BuiltIndex> {
    let files = discover_files(root)?;
    let canonical_root = root.canonicalize()?;

    let per_file: Vec<Option<FileEntries>> = files
        .par_iter()
        .map(|file| process_file(&canonical_root, file, tokenizer))
        .collect::<Result<_>>()?;

    let mut report = BuildReport {
        files_found: files.len(),
        ..Default::default()
    };
    let mut documents = Vec::new();
    let mut postings = Vec::new();
    let mut words = HashSet::new();

    for entries in per_file {
        let Some(entries) = entries else {
            report.files_skipped += 1;
            continue;
        };
        report.files_processed += 1;
        report.malformed_blocks += entries.malformed_blocks;

        for (cue, tokens) in entries.cues {
            let id = documents.len() as u64;
            for token in tokens {
                words.insert(token.clone());
                postings.push(Posting::new(token, id));
            }
            documents.push(Document {
                id,
                text: cue.text,
                start: cue.start,
                end: cue.end,
                show: entries.metadata.show.clone(),
                season: entries.metadata.season,
                episode: entries.metadata.episode,
            });
        }
    }

    report.cues_indexed = documents.len();
    report.postings = postings.len();
    report.distinct_words = words.len();

    tracing::info!(
        files = report.files_processed,
        skipped = report.files_skipped,
        cues = report.cues_indexed,
        words = report.distinct_words,
        "built index"
    );

    Ok(BuiltIndex {
        documents,
        postings,
        report,
        corpus_root: canonical_root.to_string_lossy().to_string(),
        segmenter: tokenizer.name().to_string(),
    })
}

/// Parse and tokenize one file. `Ok(None)` means the file was skipped.
fn process_file(
    root: &Path,
    file: &DiscoveredFile,
    tokenizer: &TextTokenizer,
) -> Result<Option<FileEntries>> {
    // Symlinked files resolve outside the root, so metadata comes from the
    // path as discovered.
    let located = root.join(&file.relative_path);
    let metadata = match extract_metadata(&located, root) {
        Ok(metadata) => metadata,
        Err(e) if e.is_recoverable() => {
            tracing::warn!(
                path = %file.relative_path.display(),
                "skipping file: {e}"
            );
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let parsed = match parse_subtitle_file(&file.absolute_path) {
        Ok(parsed) => parsed,
        Err(Error::Io(e)) => {
            tracing::warn!(
                path = %file.relative_path.display(),
                "skipping unreadable file: {e}"
            );
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let mut cues = Vec::with_capacity(parsed.cues.len());
    for cue in parsed.cues {
        let tokens = tokenizer.unique_tokens(&cue.text)?;
        cues.push((cue, tokens));
    }

    Ok(Some(FileEntries {
        metadata,
        cues,
        malformed_blocks: parsed.malformed_blocks,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{Segment, Segmenter};

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn build(root: &Path) -> BuiltIndex {
        build_index(root, &TextTokenizer::morphological().unwrap()).unwrap()
    }

    fn words(index: &BuiltIndex, id: u64) -> Vec<&str> {
        index
            .postings
            .iter()
            .filter(|p| p.document_id == id)
            .map(|p| p.word.as_str())
            .collect()
    }

    #[test]
    fn builds_documents_and_postings() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "Vinland Saga (1)/1.srt",
            "1\n00:00:01,000 --> 00:00:02,000\n私は元気です\n",
        );

        let index = build(tmp.path());
        assert_eq!(
            index.documents,
            vec![Document {
                id: 0,
                text: "私は元気です".to_string(),
                start: "00:00:01,000".to_string(),
                end: "00:00:02,000".to_string(),
                show: "Vinland Saga".to_string(),
                season: 1,
                episode: 1,
            }]
        );
        assert_eq!(words(&index, 0), vec!["私", "は", "元気", "です"]);
        assert_eq!(index.segmenter, "ipadic");
        assert_eq!(index.report.distinct_words, 4);
    }

    #[test]
    fn ids_follow_path_order() {
        let tmp = tempfile::tempdir().unwrap();
        let cue =
            |text: &str| format!("1\n00:00:01,000 --> 00:00:02,000\n{text}\n");
        write(tmp.path(), "B/1.srt", &cue("bee"));
        write(tmp.path(), "A (2)/2.srt", &cue("two"));
        write(tmp.path(), "A (2)/1.srt", &cue("one"));

        let index = build(tmp.path());
        let texts: Vec<_> =
            index.documents.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "bee"]);
        let ids: Vec<_> = index.documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_tokens_yield_one_posting() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "Show/3.srt",
            "1\n00:00:01,000 --> 00:00:02,000\nGo go GO stop\n",
        );

        let index = build(tmp.path());
        assert_eq!(words(&index, 0), vec!["go", "stop"]);
        assert_eq!(index.report.postings, 2);
    }

    #[test]
    fn skips_files_without_usable_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let block = "1\n00:00:01,000 --> 00:00:02,000\nhello\n";
        write(tmp.path(), "loose.srt", block);
        write(tmp.path(), "Show/opening.srt", block);
        write(tmp.path(), "Show/01.srt", block);

        let index = build(tmp.path());
        assert_eq!(index.report.files_found, 3);
        assert_eq!(index.report.files_processed, 1);
        assert_eq!(index.report.files_skipped, 2);
        assert_eq!(index.documents.len(), 1);
        assert_eq!(index.documents[0].episode, 1);
    }

    #[test]
    fn malformed_blocks_are_counted_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "Show/1.srt",
            "1\n00:00:01,000 --> 00:00:02,000\nkept\n\nbroken\n\n\
             3\n00:00:03,000 --> 00:00:04,000\nalso kept\n",
        );

        let index = build(tmp.path());
        assert_eq!(index.report.malformed_blocks, 1);
        assert_eq!(index.report.cues_indexed, 2);
    }

    #[test]
    fn missing_root_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let tokenizer = TextTokenizer::morphological().unwrap();
        let err =
            build_index(&tmp.path().join("absent"), &tokenizer).unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }

    struct BrokenSegmenter;

    impl Segmenter for BrokenSegmenter {
        fn segment(&self, _text: &str) -> Result<Vec<Segment>> {
            Err(Error::Tokenization("dictionary missing".to_string()))
        }
    }

    #[test]
    fn tokenizer_failure_aborts_build() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "Show/1.srt",
            "1\n00:00:01,000 --> 00:00:02,000\nhello\n",
        );

        let tokenizer = TextTokenizer::new("broken", BrokenSegmenter);
        let err = build_index(tmp.path(), &tokenizer).unwrap_err();
        assert!(matches!(err, Error::Tokenization(_)));
    }
}
