//! Structured queries: per-field required/excluded term sets and an optional
//! integer range, combined by conjunction.

use crate::analyzer::Analyzer;
use crate::config::FieldNames;
use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::macros::format_description;

pub const MS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    MustNot,
}

/// Terms that must all appear (or must all be absent) in one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermsClause {
    pub field: String,
    pub terms: Vec<String>,
    pub occur: Occur,
}

/// Inclusive bounds on an integer field; a missing side is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeClause {
    pub field: String,
    pub low: Option<i64>,
    pub high: Option<i64>,
}

impl RangeClause {
    pub fn new(field: impl Into<String>, low: Option<i64>, high: Option<i64>) -> Self {
        Self { field: field.into(), low, high }
    }

    pub fn contains(&self, value: i64) -> bool {
        self.low.map_or(true, |lo| value >= lo) && self.high.map_or(true, |hi| value <= hi)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Terms(TermsClause),
    Range(RangeClause),
    /// Conjunction of nested clauses.
    All(Vec<Clause>),
}

impl Clause {
    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Clause>) {
        match self {
            Clause::All(children) => children.iter().for_each(|c| c.collect_leaves(out)),
            leaf => out.push(leaf),
        }
    }
}

/// Immutable query tree. No clauses means match-all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    pub fn new(clauses: Vec<Clause>) -> Self { Self { clauses } }

    pub fn match_all() -> Self { Self::default() }

    pub fn must(mut self, field: impl Into<String>, terms: Vec<String>) -> Self {
        self.clauses.push(Clause::Terms(TermsClause { field: field.into(), terms, occur: Occur::Must }));
        self
    }

    pub fn must_not(mut self, field: impl Into<String>, terms: Vec<String>) -> Self {
        self.clauses.push(Clause::Terms(TermsClause { field: field.into(), terms, occur: Occur::MustNot }));
        self
    }

    pub fn range(mut self, clause: RangeClause) -> Self {
        self.clauses.push(Clause::Range(clause));
        self
    }

    pub fn clauses(&self) -> &[Clause] { &self.clauses }

    pub fn is_match_all(&self) -> bool { self.leaves().is_empty() }

    /// Leaf clauses with nested conjunctions flattened.
    pub fn leaves(&self) -> Vec<&Clause> {
        let mut out = Vec::new();
        for c in &self.clauses {
            c.collect_leaves(&mut out);
        }
        out
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let leaves = self.leaves();
        if leaves.is_empty() {
            return f.write_str("*:*");
        }
        let mut parts = Vec::new();
        for leaf in leaves {
            match leaf {
                Clause::Terms(tc) => {
                    let sign = match tc.occur {
                        Occur::Must => '+',
                        Occur::MustNot => '-',
                    };
                    parts.extend(tc.terms.iter().map(|t| format!("{sign}{}:{t}", tc.field)));
                }
                Clause::Range(rc) => {
                    let lo = rc.low.map_or_else(|| "*".to_string(), |v| v.to_string());
                    let hi = rc.high.map_or_else(|| "*".to_string(), |v| v.to_string());
                    parts.push(format!("+{}:[{lo} TO {hi}]", rc.field));
                }
                Clause::All(_) => {}
            }
        }
        f.write_str(&parts.join(" "))
    }
}

/// Structured search request. An absent list places no constraint on its
/// field; dates are `yyyy-mm-dd` and both bounds are inclusive days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub in_title: Option<Vec<String>>,
    pub not_in_title: Option<Vec<String>>,
    pub in_description: Option<Vec<String>>,
    pub not_in_description: Option<Vec<String>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        let lists = [
            ("in title", &self.in_title),
            ("not in title", &self.not_in_title),
            ("in description", &self.in_description),
            ("not in description", &self.not_in_description),
        ];
        for (label, list) in lists {
            if let Some(words) = list {
                parts.push(format!("{label}: [{}]", words.join(", ")));
            }
        }
        if let Some(d) = &self.start_date {
            parts.push(format!("startDate: {d}"));
        }
        if let Some(d) = &self.end_date {
            parts.push(format!("endDate: {d}"));
        }
        write!(f, "Search ({})", parts.join("; "))
    }
}

/// Epoch milliseconds of 00:00:00.000 UTC on the given `yyyy-mm-dd` day.
pub fn parse_day_start(field: &str, value: &str) -> Result<i64> {
    let format = format_description!("[year]-[month]-[day]");
    let date = time::Date::parse(value.trim(), &format).map_err(|_| SearchError::UnparsableRangeBound {
        field: field.to_string(),
        value: value.to_string(),
    })?;
    Ok(date.midnight().assume_utc().unix_timestamp() * 1000)
}

/// Translates requests into [`Query`] trees, analyzing every word with the
/// same analyzer the index was built with.
#[derive(Debug, Clone)]
pub struct QueryParser {
    analyzer: Analyzer,
    fields: FieldNames,
}

impl QueryParser {
    pub fn new(analyzer: Analyzer, fields: FieldNames) -> Self { Self { analyzer, fields } }

    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

    pub fn parse(&self, req: &SearchRequest) -> Result<Query> {
        let mut clauses = Vec::new();
        let lists = [
            (&self.fields.title, &req.in_title, Occur::Must),
            (&self.fields.title, &req.not_in_title, Occur::MustNot),
            (&self.fields.description, &req.in_description, Occur::Must),
            (&self.fields.description, &req.not_in_description, Occur::MustNot),
        ];
        for (field, words, occur) in lists {
            if let Some(clause) = self.terms_clause(field, words.as_deref().unwrap_or_default(), occur) {
                clauses.push(clause);
            }
        }

        let date_field = &self.fields.date;
        let low = req.start_date.as_deref().map(|d| parse_day_start(date_field, d)).transpose()?;
        let high = req
            .end_date
            .as_deref()
            .map(|d| parse_day_start(date_field, d).map(|start| start + MS_PER_DAY - 1))
            .transpose()?;
        if low.is_some() || high.is_some() {
            clauses.push(Clause::Range(RangeClause::new(date_field.clone(), low, high)));
        }

        let query = Query::new(clauses);
        tracing::debug!(%query, "parsed search request");
        Ok(query)
    }

    /// Free text scoped to one field: every word is required, words prefixed
    /// with `-` are excluded.
    pub fn parse_simple(&self, field: &str, text: &str) -> Query {
        let (excluded, required): (Vec<&str>, Vec<&str>) = text.split_whitespace().partition(|w| w.starts_with('-'));
        let excluded: Vec<String> = excluded.iter().map(|w| w.trim_start_matches('-').to_string()).collect();
        let required: Vec<String> = required.iter().map(|w| w.to_string()).collect();

        let mut clauses = Vec::new();
        if let Some(c) = self.terms_clause(field, &required, Occur::Must) {
            clauses.push(c);
        }
        if let Some(c) = self.terms_clause(field, &excluded, Occur::MustNot) {
            clauses.push(c);
        }
        Query::new(clauses)
    }

    fn terms_clause(&self, field: &str, words: &[String], occur: Occur) -> Option<Clause> {
        let mut terms: Vec<String> = Vec::new();
        for word in words {
            for term in self.analyzer.terms(word) {
                if !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }
        if terms.is_empty() {
            return None;
        }
        Some(Clause::Terms(TermsClause { field: field.to_string(), terms, occur }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> QueryParser { QueryParser::new(Analyzer::standard(), FieldNames::default()) }

    fn words(ws: &[&str]) -> Option<Vec<String>> { Some(ws.iter().map(|w| w.to_string()).collect()) }

    #[test]
    fn empty_request_is_match_all() {
        let q = parser().parse(&SearchRequest::default()).unwrap();
        assert!(q.is_match_all());
        assert_eq!(q.to_string(), "*:*");
    }

    #[test]
    fn empty_lists_add_no_constraint() {
        let req = SearchRequest { in_title: Some(vec![]), not_in_description: Some(vec!["!!".into()]), ..Default::default() };
        assert!(parser().parse(&req).unwrap().is_match_all());
    }

    #[test]
    fn inclusion_and_exclusion_on_one_field() {
        let req = SearchRequest { in_title: words(&["US"]), not_in_title: words(&["Dawn"]), ..Default::default() };
        let q = parser().parse(&req).unwrap();
        assert_eq!(q.to_string(), "+title:us -title:dawn");
    }

    #[test]
    fn dates_become_inclusive_day_range() {
        let req = SearchRequest { start_date: Some("2011-12-18".into()), end_date: Some("2011-12-18".into()), ..Default::default() };
        let q = parser().parse(&req).unwrap();
        let start = 1_324_166_400_000;
        match q.leaves()[0] {
            Clause::Range(rc) => {
                assert_eq!(rc.low, Some(start));
                assert_eq!(rc.high, Some(start + MS_PER_DAY - 1));
                assert!(rc.contains(start + 3_600_000));
                assert!(!rc.contains(start + MS_PER_DAY));
            }
            other => panic!("unexpected clause {other:?}"),
        }
    }

    #[test]
    fn half_open_range() {
        let req = SearchRequest { start_date: Some("2000-01-01".into()), ..Default::default() };
        let q = parser().parse(&req).unwrap();
        assert_eq!(q.leaves(), vec![&Clause::Range(RangeClause::new("pubDate", Some(946_684_800_000), None))]);
    }

    #[test]
    fn bad_date_is_rejected() {
        let req = SearchRequest { end_date: Some("18/12/2011".into()), ..Default::default() };
        match parser().parse(&req) {
            Err(SearchError::UnparsableRangeBound { field, value }) => {
                assert_eq!(field, "pubDate");
                assert_eq!(value, "18/12/2011");
            }
            other => panic!("expected UnparsableRangeBound, got {other:?}"),
        }
    }

    #[test]
    fn simple_mode_with_exclusion() {
        let q = parser().parse_simple("content", "Romeo -Juliet");
        assert_eq!(q.to_string(), "+content:romeo -content:juliet");
    }

    #[test]
    fn nested_conjunction_flattens() {
        let inner = Clause::All(vec![Clause::Range(RangeClause::new("pubDate", None, Some(5)))]);
        let q = Query::new(vec![inner]).must("title", vec!["kim".into()]);
        assert_eq!(q.leaves().len(), 2);
    }

    #[test]
    fn request_display_lists_constraints() {
        let req = SearchRequest { in_title: words(&["kim", "korea"]), end_date: Some("2011-12-18".into()), ..Default::default() };
        assert_eq!(req.to_string(), "Search (in title: [kim, korea]; endDate: 2011-12-18)");
    }
}
