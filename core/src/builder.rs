use crate::analyzer::Analyzer;
use crate::document::{Document, FieldValue};
use crate::index::{DocId, InvertedIndex, Posting, PostingList, StoredFields, TermId};
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct TermAccumulator {
    term_freq: u32,
    positions: Vec<u32>,
}

/// Single-writer builder. Documents get ids 0..N-1 in arrival order; the
/// index becomes visible only through [`IndexBuilder::finish`].
pub struct IndexBuilder {
    analyzer: Analyzer,
    index: InvertedIndex,
}

impl IndexBuilder {
    pub fn new(analyzer: Analyzer) -> Self {
        Self { analyzer, index: InvertedIndex::new() }
    }

    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

    pub fn documents_added(&self) -> u32 { self.index.num_docs }

    pub fn add_document(&mut self, doc: Document) -> DocId {
        let doc_id = self.index.num_docs;
        self.index.num_docs += 1;
        if !doc.is_searchable() {
            tracing::debug!(doc_id, "document has no indexed field");
        }

        // (field, term) -> tf and positions for this document
        let mut terms: BTreeMap<(String, String), TermAccumulator> = BTreeMap::new();
        // repeated values of one field continue its position sequence
        let mut next_position: HashMap<String, u32> = HashMap::new();
        let mut stored: StoredFields = Vec::new();

        for field in doc.into_fields() {
            if field.indexed {
                match &field.value {
                    FieldValue::Text(text) => {
                        let base = next_position.get(&field.name).copied().unwrap_or(0);
                        let mut next = base;
                        for token in self.analyzer.analyze(text) {
                            let position = base + token.position;
                            let acc = terms.entry((field.name.clone(), token.term)).or_default();
                            acc.term_freq += 1;
                            acc.positions.push(position);
                            next = position + 1;
                        }
                        next_position.insert(field.name.clone(), next);
                    }
                    FieldValue::Int(v) => {
                        let column = self.index.ranges.entry(field.name.clone()).or_default();
                        column.resize(doc_id as usize + 1, None);
                        let slot = &mut column[doc_id as usize];
                        if slot.is_none() {
                            *slot = Some(*v);
                        }
                    }
                }
            }
            if field.stored {
                stored.push((field.name, field.value));
            }
        }

        let InvertedIndex { dictionary, df, postings, .. } = &mut self.index;
        for ((field, term), acc) in terms {
            let tid: TermId = *dictionary.entry(field).or_default().entry(term).or_insert_with(|| {
                let id = postings.len() as TermId;
                df.push(0);
                postings.push(PostingList::new());
                id
            });
            df[tid as usize] += 1;
            postings[tid as usize].push(Posting { doc_id, term_freq: acc.term_freq, positions: acc.positions });
        }
        self.index.stored.push(stored);
        doc_id
    }

    /// Completes the build. Range columns are padded so every document has a slot.
    pub fn finish(mut self) -> InvertedIndex {
        let num_docs = self.index.num_docs as usize;
        for column in self.index.ranges.values_mut() {
            column.resize(num_docs, None);
        }
        if cfg!(debug_assertions) {
            if let Err(e) = self.index.check_invariants() {
                panic!("index builder produced an inconsistent index: {e}");
            }
        }
        tracing::info!(num_docs, num_terms = self.index.num_terms(), "index built");
        self.index
    }
}

/// Builds a complete index from `documents`, consuming the sequence once.
/// An empty sequence yields a valid index with zero documents.
pub fn build<I>(analyzer: Analyzer, documents: I) -> InvertedIndex
where
    I: IntoIterator<Item = Document>,
{
    let mut builder = IndexBuilder::new(analyzer);
    for doc in documents {
        builder.add_document(doc);
    }
    builder.finish()
}
