//! subsearch - a word index over subtitle corpora.
//!
//! subsearch reads a tree of `.srt` files laid out as
//! `<root>/<Show> (<season>)/<episode>.srt`, turns every cue into a
//! document, and stores an inverted index of segmented words in a
//! [redb](https://github.com/cberner/redb) database. Searches return every
//! cue containing all words of a phrase, optionally narrowed by show,
//! season and episode.
//!
//! # Quick start
//!
//! ```no_run
//! use subsearch::{DataDir, TextTokenizer};
//! use subsearch::builder;
//! use subsearch::index_db::IndexSource;
//! use subsearch::search::{self, SearchParams};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let index = data_dir.open_index_for_build().unwrap();
//! let tokenizer = TextTokenizer::morphological().unwrap();
//!
//! let built =
//!     builder::build_index("/srv/subtitles".as_ref(), &tokenizer).unwrap();
//! let source = IndexSource {
//!     corpus_root: &built.corpus_root,
//!     segmenter: &built.segmenter,
//! };
//! index.rebuild(&built.documents, &built.postings, source).unwrap();
//!
//! let params = SearchParams {
//!     phrase: "元気".to_string(),
//!     ..Default::default()
//! };
//! let outcome = search::execute_search(&params, &tokenizer, &index).unwrap();
//! for doc in &outcome.documents {
//!     println!("{} S{}E{} {}: {}", doc.show, doc.season, doc.episode,
//!         doc.start, doc.text);
//! }
//! ```

pub mod builder;
pub mod data_dir;
pub mod document;
pub mod error;
pub mod export;
pub mod index_db;
pub mod metadata;
pub mod query;
pub mod search;
pub mod srt;
pub mod tokenizer;
pub mod walker;

pub use data_dir::DataDir;
pub use document::{Document, Posting};
pub use error::{Error, Result};
pub use index_db::IndexDb;
pub use query::{QueryPlan, SearchFilters};
pub use tokenizer::TextTokenizer;
