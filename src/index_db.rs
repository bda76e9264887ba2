use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::Path,
    time::SystemTime,
};

use redb::{
    Database,
    MultimapTableDefinition,
    MultimapValue,
    ReadOnlyDatabase,
    ReadOnlyTable,
    ReadTransaction,
    ReadableDatabase,
    ReadableMultimapTable,
    ReadableTable,
    TableDefinition,
};
use serde::{Deserialize, Serialize};

use crate::{
    document::{Document, DocumentRecord, Posting},
    error::{Error, Result},
    query::{Predicate, QueryPlan},
};

const DOCUMENTS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("documents");
/// word -> document ids
const POSTINGS: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("postings");
/// document id -> words
const DOCUMENT_POSTINGS: MultimapTableDefinition<u64, &str> =
    MultimapTableDefinition::new("document_postings");
const SHOW_INDEX: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("show_index");
const SEASON_INDEX: MultimapTableDefinition<u32, u64> =
    MultimapTableDefinition::new("season_index");
const EPISODE_INDEX: MultimapTableDefinition<u32, u64> =
    MultimapTableDefinition::new("episode_index");
const GENERATION: TableDefinition<&str, &str> =
    TableDefinition::new("generation");

const CURRENT_GENERATION: &str = "current";

/// Where a generation came from.
#[derive(Debug, Clone, Copy)]
pub struct IndexSource<'a> {
    pub corpus_root: &'a str,
    pub segmenter: &'a str,
}

/// Summary of the committed index generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub generation: u64,
    pub corpus_root: String,
    pub segmenter: String,
    /// Unix seconds.
    pub built_at: u64,
    pub documents: u64,
    pub postings: u64,
    pub words: u64,
}

/// Matches of a query plan, read from a single snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Number of matching documents before the plan's window is applied.
    pub total: usize,
    /// Matching documents inside the window, ascending by id.
    pub documents: Vec<Document>,
}

/// The inverted index: documents, postings and the secondary indexes used
/// for filtering, stored in one redb database.
///
/// Every rebuild replaces all tables inside a single write transaction, so
/// readers see either the previous generation or the new one, never a mix.
pub struct IndexDb {
    handle: Handle,
}

/// redb allows one writable handle per file, or any number of read-only
/// ones.
enum Handle {
    Writable(Database),
    ReadOnly(ReadOnlyDatabase),
}

impl Handle {
    fn begin_read(&self) -> Result<ReadTransaction> {
        Ok(match self {
            Handle::Writable(db) => db.begin_read()?,
            Handle::ReadOnly(db) => db.begin_read()?,
        })
    }
}

impl IndexDb {
    /// Open for writing, creating the file and its tables if needed.
    ///
    /// Takes an exclusive lock on the file until the handle is dropped.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(DOCUMENTS)?;
        txn.open_multimap_table(POSTINGS)?;
        txn.open_multimap_table(DOCUMENT_POSTINGS)?;
        txn.open_multimap_table(SHOW_INDEX)?;
        txn.open_multimap_table(SEASON_INDEX)?;
        txn.open_multimap_table(EPISODE_INDEX)?;
        txn.open_table(GENERATION)?;
        txn.commit()?;

        Ok(Self {
            handle: Handle::Writable(db),
        })
    }

    /// Open an existing index for reading only.
    ///
    /// Takes a shared lock, so any number of read-only handles can be open
    /// at once. Fails while a writable handle holds the file.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let db = ReadOnlyDatabase::open(path)?;
        Ok(Self {
            handle: Handle::ReadOnly(db),
        })
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.handle, Handle::ReadOnly(_))
    }

    // -- Rebuild --

    /// Atomically replace the whole index with `documents` and `postings`.
    ///
    /// Document ids must be unique and every posting must reference one of
    /// them. Both are checked while writing; if anything fails the
    /// transaction is dropped uncommitted and the previous generation stays
    /// in place.
    pub fn rebuild(
        &self,
        documents: &[Document],
        postings: &[Posting],
        source: IndexSource<'_>,
    ) -> Result<GenerationInfo> {
        let Handle::Writable(db) = &self.handle else {
            return Err(Error::Storage(
                "index is open read-only; cannot rebuild".into(),
            ));
        };

        let words: HashSet<&str> =
            postings.iter().map(|p| p.word.as_str()).collect();
        let mut ids = HashSet::with_capacity(documents.len());

        let txn = db.begin_write()?;
        let previous = {
            let table = txn.open_table(GENERATION)?;
            let current = table.get(CURRENT_GENERATION)?;
            match current {
                Some(guard) => Some(decode_generation(guard.value())?),
                None => None,
            }
        };

        txn.delete_table(DOCUMENTS)?;
        txn.delete_multimap_table(POSTINGS)?;
        txn.delete_multimap_table(DOCUMENT_POSTINGS)?;
        txn.delete_multimap_table(SHOW_INDEX)?;
        txn.delete_multimap_table(SEASON_INDEX)?;
        txn.delete_multimap_table(EPISODE_INDEX)?;

        {
            let mut table = txn.open_table(DOCUMENTS)?;
            let mut shows = txn.open_multimap_table(SHOW_INDEX)?;
            let mut seasons = txn.open_multimap_table(SEASON_INDEX)?;
            let mut episodes = txn.open_multimap_table(EPISODE_INDEX)?;
            for doc in documents {
                let bytes = serde_json::to_vec(&doc.record())?;
                if table.insert(doc.id, bytes.as_slice())?.is_some()
                    || !ids.insert(doc.id)
                {
                    return Err(Error::Storage(format!(
                        "duplicate document id {}",
                        doc.id
                    )));
                }
                shows.insert(doc.show.as_str(), doc.id)?;
                seasons.insert(doc.season, doc.id)?;
                episodes.insert(doc.episode, doc.id)?;
            }
        }

        let mut posting_count = 0u64;
        {
            let mut by_word = txn.open_multimap_table(POSTINGS)?;
            let mut by_document = txn.open_multimap_table(DOCUMENT_POSTINGS)?;
            for posting in postings {
                if !ids.contains(&posting.document_id) {
                    return Err(Error::Storage(format!(
                        "posting '{}' references missing document {}",
                        posting.word, posting.document_id
                    )));
                }
                // Repeated (word, document) pairs collapse into one edge.
                let existed =
                    by_word.insert(posting.word.as_str(), posting.document_id)?;
                if !existed {
                    posting_count += 1;
                }
                by_document
                    .insert(posting.document_id, posting.word.as_str())?;
            }
        }

        let info = GenerationInfo {
            generation: previous.map_or(1, |p| p.generation + 1),
            corpus_root: source.corpus_root.to_string(),
            segmenter: source.segmenter.to_string(),
            built_at: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            documents: documents.len() as u64,
            postings: posting_count,
            words: words.len() as u64,
        };
        {
            let mut table = txn.open_table(GENERATION)?;
            let encoded = serde_json::to_string(&info)?;
            table.insert(CURRENT_GENERATION, encoded.as_str())?;
        }

        txn.commit()?;
        Ok(info)
    }

    /// The committed generation, or `None` before the first build.
    pub fn generation(&self) -> Result<Option<GenerationInfo>> {
        let txn = self.handle.begin_read()?;
        let table = txn.open_table(GENERATION)?;
        match table.get(CURRENT_GENERATION)? {
            Some(guard) => Ok(Some(decode_generation(guard.value())?)),
            None => Ok(None),
        }
    }

    // -- Query --

    /// Run a query plan against one consistent snapshot.
    ///
    /// Posting sets are intersected smallest first, then narrowed by the
    /// show/season/episode indexes. Only documents inside the plan's window
    /// are loaded.
    pub fn query(&self, plan: &QueryPlan) -> Result<QueryResult> {
        if plan.is_empty() {
            return Ok(QueryResult::default());
        }

        let txn = self.handle.begin_read()?;
        let ids = matching_ids(&txn, plan)?;
        let total = ids.len();

        let table = txn.open_table(DOCUMENTS)?;
        let mut documents = Vec::new();
        for id in plan.window().apply(ids) {
            documents.push(load_document(&table, id)?);
        }

        Ok(QueryResult { total, documents })
    }

    pub fn get_document(&self, id: u64) -> Result<Option<Document>> {
        let txn = self.handle.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(decode_document(id, guard.value())?)),
            None => Ok(None),
        }
    }

    /// Ids of documents with a posting for `word`, ascending.
    pub fn postings_for(&self, word: &str) -> Result<Vec<u64>> {
        let txn = self.handle.begin_read()?;
        let table = txn.open_multimap_table(POSTINGS)?;
        let mut ids = Vec::new();
        for value in table.get(word)? {
            ids.push(value?.value());
        }
        Ok(ids)
    }

    /// Words with a posting to document `id`, in byte order.
    pub fn document_words(&self, id: u64) -> Result<Vec<String>> {
        let txn = self.handle.begin_read()?;
        let table = txn.open_multimap_table(DOCUMENT_POSTINGS)?;
        let mut words = Vec::new();
        for value in table.get(id)? {
            words.push(value?.value().to_string());
        }
        Ok(words)
    }

    /// Every word with the documents it occurs in, read from one snapshot.
    pub fn word_occurrences(
        &self,
    ) -> Result<BTreeMap<String, Vec<Document>>> {
        let txn = self.handle.begin_read()?;
        let postings = txn.open_multimap_table(POSTINGS)?;
        let table = txn.open_table(DOCUMENTS)?;

        let mut cache: BTreeMap<u64, Document> = BTreeMap::new();
        let mut result = BTreeMap::new();
        for entry in postings.iter()? {
            let (word, ids) = entry?;
            let mut documents = Vec::new();
            for id in ids {
                let id = id?.value();
                if !cache.contains_key(&id) {
                    cache.insert(id, load_document(&table, id)?);
                }
                documents.push(cache[&id].clone());
            }
            result.insert(word.value().to_string(), documents);
        }
        Ok(result)
    }
}

impl std::fmt::Debug for IndexDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDb").finish_non_exhaustive()
    }
}

/// Evaluate every predicate of `plan` against the index tables.
fn matching_ids(
    txn: &ReadTransaction,
    plan: &QueryPlan,
) -> Result<BTreeSet<u64>> {
    let postings = txn.open_multimap_table(POSTINGS)?;
    let mut posting_sets = Vec::new();
    for token in plan.tokens() {
        let mut ids = BTreeSet::new();
        collect_ids(postings.get(token)?, &mut ids)?;
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        posting_sets.push(ids);
    }
    posting_sets.sort_by_key(BTreeSet::len);

    let mut sets = posting_sets.into_iter();
    let Some(mut candidates) = sets.next() else {
        return Ok(BTreeSet::new());
    };
    for set in sets {
        candidates.retain(|id| set.contains(id));
    }

    for predicate in plan.predicates() {
        if candidates.is_empty() {
            break;
        }
        let mut ids = BTreeSet::new();
        let keep = match predicate {
            Predicate::HasToken(_) => continue,
            Predicate::ShowIn(shows) | Predicate::ShowNotIn(shows) => {
                let table = txn.open_multimap_table(SHOW_INDEX)?;
                for show in shows {
                    collect_ids(table.get(show.as_str())?, &mut ids)?;
                }
                matches!(predicate, Predicate::ShowIn(_))
            }
            Predicate::SeasonIn(seasons) => {
                let table = txn.open_multimap_table(SEASON_INDEX)?;
                for season in seasons {
                    collect_ids(table.get(*season)?, &mut ids)?;
                }
                true
            }
            Predicate::EpisodeIn(episodes) => {
                let table = txn.open_multimap_table(EPISODE_INDEX)?;
                for episode in episodes {
                    collect_ids(table.get(*episode)?, &mut ids)?;
                }
                true
            }
        };
        // `keep` is false for exclusions.
        candidates.retain(|id| ids.contains(id) == keep);
    }

    Ok(candidates)
}

fn collect_ids(
    values: MultimapValue<'_, u64>,
    ids: &mut BTreeSet<u64>,
) -> Result<()> {
    for value in values {
        ids.insert(value?.value());
    }
    Ok(())
}

fn load_document(
    table: &ReadOnlyTable<u64, &'static [u8]>,
    id: u64,
) -> Result<Document> {
    let guard = table.get(id)?.ok_or_else(|| {
        Error::Storage(format!("posting references missing document {id}"))
    })?;
    decode_document(id, guard.value())
}

fn decode_document(id: u64, bytes: &[u8]) -> Result<Document> {
    let record: DocumentRecord<'_> = serde_json::from_slice(bytes)
        .map_err(|e| Error::Storage(format!("corrupt document {id}: {e}")))?;
    Ok(Document::from_record(id, record))
}

fn decode_generation(value: &str) -> Result<GenerationInfo> {
    serde_json::from_str(value)
        .map_err(|e| Error::Storage(format!("corrupt generation record: {e}")))
}
