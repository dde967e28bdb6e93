use crate::analyzer::AnalyzerConfig;
use crate::error::{Result, SearchError};
use crate::index::{InvertedIndex, PostingList, StoredFields, TermId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

type Dictionary = (HashMap<String, HashMap<String, TermId>>, Vec<u32>);
type StoredTable = (Vec<StoredFields>, HashMap<String, Vec<Option<i64>>>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
    /// Analyzer the index was built with; queries must use the same one.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

impl MetaFile {
    pub fn new(num_docs: u32, analyzer: AnalyzerConfig) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into());
        Self { num_docs, created_at, version: FORMAT_VERSION, analyzer }
    }
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn stored(&self) -> PathBuf { self.root.join("stored.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn postings_dir(&self) -> PathBuf { self.root.join("postings") }
    fn postings_file(&self, term_id: TermId) -> PathBuf {
        self.postings_dir().join(format!("{term_id:08}.postings.bin"))
    }

    /// Sibling directory next to the root, e.g. `index.staging`.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.root.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "index".into());
        name.push(suffix);
        self.root.with_file_name(name)
    }

    pub fn exists(&self) -> bool { self.meta().is_file() }
}

fn write_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut w, value)?;
    w.flush()?;
    Ok(())
}

fn read_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let r = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(r)?)
}

pub fn save_dictionary(paths: &IndexPaths, dict: &Dictionary) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bin(&paths.dictionary(), dict)
}

pub fn load_dictionary(paths: &IndexPaths) -> Result<Dictionary> { read_bin(&paths.dictionary()) }

pub fn save_stored(paths: &IndexPaths, stored: &StoredTable) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bin(&paths.stored(), stored)
}

pub fn load_stored(paths: &IndexPaths) -> Result<StoredTable> { read_bin(&paths.stored()) }

pub fn save_postings_for_term(paths: &IndexPaths, term_id: TermId, postings: &PostingList) -> Result<()> {
    create_dir_all(paths.postings_dir())?;
    write_bin(&paths.postings_file(term_id), postings)
}

pub fn load_postings_for_term(paths: &IndexPaths, term_id: TermId) -> Result<PostingList> {
    read_bin(&paths.postings_file(term_id))
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Writes the whole index into a staging directory, then renames it over
/// `paths.root`. Any previous index at that location is replaced, never merged.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex, analyzer: AnalyzerConfig) -> Result<()> {
    let staging = IndexPaths::new(paths.sibling(".staging"));
    if staging.root.exists() {
        fs::remove_dir_all(&staging.root)?;
    }
    create_dir_all(staging.postings_dir())?;

    save_dictionary(&staging, &(index.dictionary.clone(), index.df.clone()))?;
    for (term_id, list) in index.postings.iter().enumerate() {
        save_postings_for_term(&staging, term_id as TermId, list)?;
    }
    save_stored(&staging, &(index.stored.clone(), index.ranges.clone()))?;
    // meta last: its presence marks a complete index
    save_meta(&staging, &MetaFile::new(index.num_docs, analyzer))?;

    swap_into_place(&staging.root, &paths.root, &paths.sibling(".old"))?;
    tracing::info!(root = %paths.root.display(), num_docs = index.num_docs, num_terms = index.num_terms(), "index saved");
    Ok(())
}

/// Moves `staging` to `root`, parking the current root at `previous` while
/// the rename happens. On failure the parked root is moved back.
fn swap_into_place(staging: &Path, root: &Path, previous: &Path) -> Result<()> {
    if previous.exists() {
        fs::remove_dir_all(previous)?;
    }
    let parked = root.exists();
    if parked {
        fs::rename(root, previous)?;
    }
    if let Err(e) = fs::rename(staging, root) {
        if parked {
            if let Err(restore) = fs::rename(previous, root) {
                tracing::error!(root = %root.display(), error = %restore, "could not restore previous index");
            }
        }
        return Err(e.into());
    }
    if parked {
        fs::remove_dir_all(previous)?;
    }
    Ok(())
}

/// Loads a complete index and checks its invariants.
pub fn load_index(paths: &IndexPaths) -> Result<(InvertedIndex, MetaFile)> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        return Err(SearchError::Corrupt(format!("unsupported index format version {}", meta.version)));
    }
    let (dictionary, df) = load_dictionary(paths)?;
    let (stored, ranges) = load_stored(paths)?;
    let postings = (0..df.len())
        .map(|tid| load_postings_for_term(paths, tid as TermId))
        .collect::<Result<Vec<_>>>()?;

    let index = InvertedIndex { dictionary, df, postings, stored, ranges, num_docs: meta.num_docs };
    index.check_invariants()?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, "index loaded");
    Ok((index, meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::builder::build;
    use crate::document::Document;
    use tempfile::tempdir;

    fn tiny(titles: &[&str]) -> InvertedIndex {
        build(Analyzer::standard(), titles.iter().map(|t| Document::new().with_field("title", *t, true, true)))
    }

    #[test]
    fn save_then_load_matches() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("index"));
        let idx = tiny(&["Kim visits Korea", "Video release"]);
        save_index(&paths, &idx, AnalyzerConfig::default()).unwrap();
        let (loaded, meta) = load_index(&paths).unwrap();
        assert_eq!(loaded, idx);
        assert_eq!(meta.num_docs, 2);
        assert_eq!(meta.version, FORMAT_VERSION);
    }

    #[test]
    fn resave_replaces_previous_generation() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("index"));
        save_index(&paths, &tiny(&["a b c", "d", "e"]), AnalyzerConfig::default()).unwrap();
        save_index(&paths, &tiny(&["z"]), AnalyzerConfig::default()).unwrap();
        let (loaded, _) = load_index(&paths).unwrap();
        assert_eq!(loaded.document_count(), 1);
        assert_eq!(loaded.num_terms(), 1);
        assert!(!paths.postings_file(1).exists());
        assert!(!paths.sibling(".staging").exists());
    }

    #[test]
    fn failed_swap_restores_previous_root() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("index"));
        save_index(&paths, &tiny(&["kept"]), AnalyzerConfig::default()).unwrap();

        let missing = dir.path().join("no-such-staging");
        let err = swap_into_place(&missing, &paths.root, &paths.sibling(".old"));
        assert!(matches!(err, Err(SearchError::Io(_))));
        assert!(paths.exists());
        assert!(!paths.sibling(".old").exists());
        let (loaded, _) = load_index(&paths).unwrap();
        assert_eq!(loaded.document_frequency("title", "kept"), 1);
    }

    #[test]
    fn damaged_df_is_reported() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("index"));
        let idx = tiny(&["one two"]);
        save_index(&paths, &idx, AnalyzerConfig::default()).unwrap();
        let (dict, mut df) = load_dictionary(&paths).unwrap();
        df[0] = 7;
        save_dictionary(&paths, &(dict, df)).unwrap();
        assert!(matches!(load_index(&paths), Err(SearchError::Corrupt(_))));
    }

    #[test]
    fn missing_index_is_io_error() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("absent"));
        assert!(!paths.exists());
        assert!(matches!(load_index(&paths), Err(SearchError::Io(_))));
    }
}
