use crate::document::FieldValue;
use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TermId = u32;
pub type DocId = u32;

/// One document's occurrences of a (field, term) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_freq: u32,
    pub positions: Vec<u32>,
}

/// Postings for one (field, term), strictly increasing by doc id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingList {
    postings: Vec<Posting>,
}

static EMPTY_POSTINGS: PostingList = PostingList { postings: Vec::new() };

impl PostingList {
    pub fn new() -> Self { Self::default() }

    /// Appends a posting; doc ids must arrive in increasing order.
    pub(crate) fn push(&mut self, posting: Posting) {
        if let Some(last) = self.postings.last() {
            assert!(posting.doc_id > last.doc_id, "posting doc ids must be strictly increasing");
        }
        self.postings.push(posting);
    }

    pub fn len(&self) -> usize { self.postings.len() }

    pub fn is_empty(&self) -> bool { self.postings.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Posting> + '_ { self.postings.iter() }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ { self.postings.iter().map(|p| p.doc_id) }

    pub fn get(&self, doc_id: DocId) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| &self.postings[i])
    }

    pub fn term_freq(&self, doc_id: DocId) -> u32 { self.get(doc_id).map_or(0, |p| p.term_freq) }

    fn is_strictly_increasing(&self) -> bool {
        self.postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id)
    }
}

/// Sorted-merge intersection of a sorted candidate set with a posting list.
pub fn intersect_sorted(candidates: &[DocId], list: &PostingList) -> Vec<DocId> {
    let mut out = Vec::with_capacity(candidates.len().min(list.len()));
    let (mut i, mut j) = (0, 0);
    while i < candidates.len() && j < list.postings.len() {
        let (a, b) = (candidates[i], list.postings[j].doc_id);
        if a < b {
            i += 1;
        } else if a > b {
            j += 1;
        } else {
            out.push(a);
            i += 1;
            j += 1;
        }
    }
    out
}

/// Sorted-merge difference: candidates not present in the posting list.
pub fn subtract_sorted(candidates: &[DocId], list: &PostingList) -> Vec<DocId> {
    let mut out = Vec::with_capacity(candidates.len());
    let mut j = 0;
    for &doc in candidates {
        while j < list.postings.len() && list.postings[j].doc_id < doc {
            j += 1;
        }
        if j < list.postings.len() && list.postings[j].doc_id == doc {
            continue;
        }
        out.push(doc);
    }
    out
}

/// Stored field values of one document, in the document's field order.
pub type StoredFields = Vec<(String, FieldValue)>;

/// Read-only inverted index: term dictionary per field, posting lists by term
/// id, stored values and range columns by doc id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    /// field -> term -> term id
    pub(crate) dictionary: HashMap<String, HashMap<String, TermId>>,
    pub(crate) df: Vec<u32>,
    pub(crate) postings: Vec<PostingList>, // indexed by term id
    pub(crate) stored: Vec<StoredFields>,  // indexed by doc id
    /// field -> per-document integer value, for range filters
    pub(crate) ranges: HashMap<String, Vec<Option<i64>>>,
    pub(crate) num_docs: u32,
}

impl InvertedIndex {
    /// Empty index: zero documents, every query yields no hits.
    pub fn new() -> Self { Self::default() }

    pub fn document_count(&self) -> u32 { self.num_docs }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn term_id(&self, field: &str, term: &str) -> Option<TermId> {
        self.dictionary.get(field)?.get(term).copied()
    }

    /// Posting list for (field, term), empty when absent.
    pub fn lookup(&self, field: &str, term: &str) -> &PostingList {
        match self.term_id(field, term) {
            Some(tid) => &self.postings[tid as usize],
            None => &EMPTY_POSTINGS,
        }
    }

    pub fn document_frequency(&self, field: &str, term: &str) -> u32 {
        self.term_id(field, term).map_or(0, |tid| self.df[tid as usize])
    }

    /// First stored value of `field` for `doc_id`.
    pub fn stored_value(&self, doc_id: DocId, field: &str) -> Option<&FieldValue> {
        self.stored
            .get(doc_id as usize)?
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v)
    }

    pub fn stored_fields(&self, doc_id: DocId) -> Option<&StoredFields> { self.stored.get(doc_id as usize) }

    /// Value of an indexed integer field, used by range clauses.
    pub fn range_value(&self, doc_id: DocId, field: &str) -> Option<i64> {
        self.ranges.get(field)?.get(doc_id as usize).copied().flatten()
    }

    /// True if any document declared `field` as indexed text or indexed integer.
    pub fn has_field(&self, field: &str) -> bool {
        self.dictionary.contains_key(field) || self.ranges.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.dictionary.keys().chain(self.ranges.keys()).map(String::as_str)
    }

    /// Verifies the structural invariants: df equals posting list length,
    /// doc ids strictly increasing and in range, tables sized to `num_docs`.
    pub fn check_invariants(&self) -> Result<()> {
        if self.df.len() != self.postings.len() {
            return Err(SearchError::Corrupt(format!(
                "df table has {} entries for {} posting lists",
                self.df.len(),
                self.postings.len()
            )));
        }
        if self.stored.len() != self.num_docs as usize {
            return Err(SearchError::Corrupt(format!(
                "stored table has {} rows for {} documents",
                self.stored.len(),
                self.num_docs
            )));
        }
        for (field, terms) in &self.dictionary {
            for (term, &tid) in terms {
                let list = self.postings.get(tid as usize).ok_or_else(|| {
                    SearchError::Corrupt(format!("{field}:{term} points at missing term id {tid}"))
                })?;
                if self.df[tid as usize] as usize != list.len() {
                    return Err(SearchError::Corrupt(format!(
                        "{field}:{term} has df {} but {} postings",
                        self.df[tid as usize],
                        list.len()
                    )));
                }
                if !list.is_strictly_increasing() {
                    return Err(SearchError::Corrupt(format!("{field}:{term} postings out of order")));
                }
                if list.postings.last().is_some_and(|p| p.doc_id >= self.num_docs) {
                    return Err(SearchError::Corrupt(format!("{field}:{term} references unknown document")));
                }
                if let Some(p) = list.postings.iter().find(|p| p.term_freq == 0 || p.positions.len() != p.term_freq as usize) {
                    return Err(SearchError::Corrupt(format!(
                        "{field}:{term} in doc {} has tf {} with {} positions",
                        p.doc_id,
                        p.term_freq,
                        p.positions.len()
                    )));
                }
            }
        }
        for (field, column) in &self.ranges {
            if column.len() != self.num_docs as usize {
                return Err(SearchError::Corrupt(format!("range column {field} has {} rows", column.len())));
            }
        }
        Ok(())
    }
}
