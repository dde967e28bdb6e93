use crate::index::{intersect_sorted, subtract_sorted, DocId, InvertedIndex, PostingList};
use crate::query::{Clause, Occur, Query, RangeClause};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredHit {
    pub doc_id: DocId,
    pub score: f32,
}

/// Top-k hits plus the number of documents that matched before truncation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    pub total_hits: usize,
    pub hits: Vec<ScoredHit>,
}

/// Smoothed idf: ln(1 + N/df), zero for terms absent from the field.
pub fn idf(index: &InvertedIndex, field: &str, term: &str) -> f32 {
    let df = index.document_frequency(field, term);
    if df == 0 {
        return 0.0;
    }
    (1.0 + index.document_count() as f32 / df as f32).ln()
}

fn rank(a: &ScoredHit, b: &ScoredHit) -> Ordering {
    b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id))
}

/// Ordered hits, at most `k`, by score descending then doc id ascending.
pub fn evaluate(index: &InvertedIndex, query: &Query, k: usize) -> Vec<ScoredHit> {
    search(index, query, k).hits
}

pub fn search(index: &InvertedIndex, query: &Query, k: usize) -> TopDocs {
    let mut required: Vec<(&str, &str)> = Vec::new();
    let mut excluded: Vec<(&str, &str)> = Vec::new();
    let mut ranges: Vec<&RangeClause> = Vec::new();
    for leaf in query.leaves() {
        match leaf {
            Clause::Terms(tc) => {
                let target = match tc.occur {
                    Occur::Must => &mut required,
                    Occur::MustNot => &mut excluded,
                };
                target.extend(tc.terms.iter().map(|t| (tc.field.as_str(), t.as_str())));
            }
            Clause::Range(rc) => ranges.push(rc),
            Clause::All(_) => {}
        }
    }

    // required terms, rarest first so the candidate set shrinks fastest
    let mut candidates: Vec<DocId> = if required.is_empty() {
        (0..index.document_count()).collect()
    } else {
        let mut lists: Vec<&PostingList> = required.iter().map(|(f, t)| index.lookup(f, t)).collect();
        lists.sort_by_key(|l| l.len());
        let mut c: Vec<DocId> = lists[0].doc_ids().collect();
        for list in &lists[1..] {
            if c.is_empty() {
                break;
            }
            c = intersect_sorted(&c, list);
        }
        c
    };

    for (field, term) in &excluded {
        if candidates.is_empty() {
            break;
        }
        candidates = subtract_sorted(&candidates, index.lookup(field, term));
    }

    // range fields live in stored columns, not postings
    for rc in &ranges {
        candidates.retain(|&doc| index.range_value(doc, &rc.field).is_some_and(|v| rc.contains(v)));
    }

    let weights: Vec<(&PostingList, f32)> =
        required.iter().map(|(f, t)| (index.lookup(f, t), idf(index, f, t))).collect();
    let mut hits: Vec<ScoredHit> = candidates
        .into_iter()
        .map(|doc_id| {
            let score = weights.iter().map(|(list, w)| list.term_freq(doc_id) as f32 * w).sum();
            ScoredHit { doc_id, score }
        })
        .collect();

    let total_hits = hits.len();
    if hits.len() > k {
        hits.select_nth_unstable_by(k, rank);
        hits.truncate(k);
    }
    hits.sort_by(rank);
    tracing::debug!(%query, total_hits, returned = hits.len(), "query evaluated");
    TopDocs { total_hits, hits }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::builder::build;
    use crate::document::Document;

    fn corpus() -> InvertedIndex {
        let docs = ["rust fast rust", "rust safe", "go fast", "python"]
            .iter()
            .map(|t| Document::new().with_field("body", *t, true, true));
        build(Analyzer::standard(), docs)
    }

    fn q(required: &[&str]) -> Query {
        Query::match_all().must("body", required.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn tf_idf_ranking() {
        let idx = corpus();
        let hits = evaluate(&idx, &q(&["rust"]), 10);
        assert_eq!(hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![0, 1]);
        let w = (1.0f32 + 4.0 / 2.0).ln();
        assert!((hits[0].score - 2.0 * w).abs() < 1e-6);
        assert!((hits[1].score - w).abs() < 1e-6);
    }

    #[test]
    fn missing_term_short_circuits() {
        let idx = corpus();
        assert!(evaluate(&idx, &q(&["rust", "java"]), 10).is_empty());
        let unknown_field = Query::match_all().must("nope", vec!["rust".into()]);
        assert!(evaluate(&idx, &unknown_field, 10).is_empty());
    }

    #[test]
    fn exclusion_on_unknown_field_removes_nothing() {
        let idx = corpus();
        let query = Query::match_all().must_not("nope", vec!["rust".into()]);
        assert_eq!(search(&idx, &query, 10).total_hits, 4);
    }

    #[test]
    fn top_k_truncates_with_total() {
        let idx = corpus();
        let top = search(&idx, &Query::match_all(), 2);
        assert_eq!(top.total_hits, 4);
        assert_eq!(top.hits, vec![ScoredHit { doc_id: 0, score: 0.0 }, ScoredHit { doc_id: 1, score: 0.0 }]);
        assert!(evaluate(&idx, &Query::match_all(), 0).is_empty());
    }

    #[test]
    fn ties_break_by_doc_id() {
        let idx = corpus();
        let hits = evaluate(&idx, &q(&["fast"]), 10);
        assert_eq!(hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(hits[0].score, hits[1].score);
    }
}
