use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    index_db::IndexDb,
};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SUBSEARCH_DATA_DIR";

const INDEX_FILE: &str = "index.redb";

/// The directory holding the index, and the two ways of opening it.
///
/// Builds take the index file exclusively. Everything else opens it
/// read-only, so searches can run side by side.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// `explicit` (from `--data-dir`) wins over [`DATA_DIR_ENV`], which wins
    /// over `$XDG_DATA_HOME/subsearch`. The directory is created if missing.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_root()?,
        };
        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_db(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Writable handle for a rebuild. Creates the index file on first use.
    pub fn open_index_for_build(&self) -> Result<IndexDb> {
        IndexDb::open(&self.index_db())
    }

    /// Read-only handle, or `None` if no index was ever built here.
    pub fn open_index_for_reading(&self) -> Result<Option<IndexDb>> {
        let path = self.index_db();
        if !path.is_file() {
            return Ok(None);
        }
        IndexDb::open_read_only(&path).map(Some)
    }
}

fn default_root() -> Result<PathBuf> {
    if let Some(dir) =
        std::env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty())
    {
        return Ok(PathBuf::from(dir));
    }
    xdg::BaseDirectories::with_prefix("subsearch")
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{document::Document, index_db::IndexSource};

    #[test]
    fn explicit_path_is_created_and_holds_the_index() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve(Some(&nested)).unwrap();

        assert!(dir.root().is_dir());
        assert_eq!(dir.index_db(), nested.join("index.redb"));
    }

    #[test]
    fn uncreatable_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file");
        std::fs::write(&file, "").unwrap();

        let err = DataDir::resolve(Some(&file.join("sub"))).unwrap_err();
        assert!(matches!(err, Error::DataDir(_)));
    }

    #[test]
    fn reading_before_first_build_finds_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert!(dir.open_index_for_reading().unwrap().is_none());
        assert!(!dir.index_db().exists());
    }

    #[test]
    fn readers_open_what_the_build_committed() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();
        {
            let index = dir.open_index_for_build().unwrap();
            let document = Document {
                id: 0,
                text: "元気".to_string(),
                start: "00:00:01,000".to_string(),
                end: "00:00:02,000".to_string(),
                show: "Mushishi".to_string(),
                season: 1,
                episode: 1,
            };
            let source = IndexSource {
                corpus_root: "/corpus",
                segmenter: "ipadic",
            };
            index.rebuild(&[document], &[], source).unwrap();
        }

        let first = dir.open_index_for_reading().unwrap().unwrap();
        let second = dir.open_index_for_reading().unwrap().unwrap();
        assert!(first.is_read_only());
        assert_eq!(first.generation().unwrap().unwrap().documents, 1);
        assert!(second.get_document(0).unwrap().is_some());
    }
}
