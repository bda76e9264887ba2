use std::{collections::BTreeMap, io::Write};

use serde::Serialize;

use crate::{document::Document, error::Result, index_db::IndexDb};

/// One occurrence of a word in the exported inverted index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub show: String,
    pub season: u32,
    pub episode: u32,
    pub start: String,
    pub end: String,
    pub text: String,
}

impl From<Document> for Occurrence {
    fn from(doc: Document) -> Self {
        Self {
            show: doc.show,
            season: doc.season,
            episode: doc.episode,
            start: doc.start,
            end: doc.end,
            text: doc.text,
        }
    }
}

/// The whole inverted index keyed by word, in byte order.
pub fn inverted_index(
    index: &IndexDb,
) -> Result<BTreeMap<String, Vec<Occurrence>>> {
    Ok(index
        .word_occurrences()?
        .into_iter()
        .map(|(word, docs)| {
            (word, docs.into_iter().map(Occurrence::from).collect())
        })
        .collect())
}

/// Write the inverted index as pretty-printed JSON. Returns the number of
/// words written.
pub fn write_json(index: &IndexDb, mut out: impl Write) -> Result<usize> {
    let words = inverted_index(index)?;
    serde_json::to_writer_pretty(&mut out, &words)?;
    writeln!(out)?;
    Ok(words.len())
}
