use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// One subtitle cue plus the episode it belongs to. The unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Dense id, unique within one index generation.
    pub id: u64,
    pub text: String,
    /// `HH:MM:SS,mmm`, exactly as written in the subtitle file.
    pub start: String,
    pub end: String,
    pub show: String,
    pub season: u32,
    pub episode: u32,
}

/// An edge from a normalized token to the document it occurs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Posting {
    pub word: String,
    pub document_id: u64,
}

impl Posting {
    pub fn new(word: impl Into<String>, document_id: u64) -> Self {
        Self {
            word: word.into(),
            document_id,
        }
    }
}

/// The stored form of a document. The id is the table key, so it is not
/// repeated in the value.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DocumentRecord<'a> {
    #[serde(borrow)]
    pub text: Cow<'a, str>,
    #[serde(borrow)]
    pub start: Cow<'a, str>,
    #[serde(borrow)]
    pub end: Cow<'a, str>,
    #[serde(borrow)]
    pub show: Cow<'a, str>,
    pub season: u32,
    pub episode: u32,
}

impl Document {
    pub(crate) fn record(&self) -> DocumentRecord<'_> {
        DocumentRecord {
            text: Cow::Borrowed(&self.text),
            start: Cow::Borrowed(&self.start),
            end: Cow::Borrowed(&self.end),
            show: Cow::Borrowed(&self.show),
            season: self.season,
            episode: self.episode,
        }
    }

    pub(crate) fn from_record(id: u64, record: DocumentRecord<'_>) -> Self {
        Self {
            id,
            text: record.text.into_owned(),
            start: record.start.into_owned(),
            end: record.end.into_owned(),
            show: record.show.into_owned(),
            season: record.season,
            episode: record.episode,
        }
    }
}
