use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Optional filter stages layered on top of the base normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Drop English stop words.
    #[serde(default)]
    pub stop_words: bool,
    /// Reduce words to their English stem.
    #[serde(default)]
    pub stemming: bool,
}

/// A normalized term and its 0-based ordinal within the analyzed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

/// Stateless text analyzer: NFKC normalization, lower-casing and splitting on
/// runs of non-alphanumeric characters, then the configured filter stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self { Self { config } }

    /// Base normalization only, no stop words and no stemming.
    pub fn standard() -> Self { Self::default() }

    pub fn config(&self) -> AnalyzerConfig { self.config }

    /// Start a single-pass token stream over `text`.
    pub fn analyze(&self, text: &str) -> TokenStream {
        TokenStream {
            buffer: text.nfkc().collect::<String>().to_lowercase(),
            offset: 0,
            position: 0,
            config: self.config,
        }
    }

    /// Analyzed terms of `text` with positions dropped.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).map(|t| t.term).collect()
    }
}

/// Lazy token sequence produced by [`Analyzer::analyze`]. Filtered tokens
/// still consume a position, so positions reflect the unfiltered text.
#[derive(Debug)]
pub struct TokenStream {
    buffer: String,
    offset: usize,
    position: u32,
    config: AnalyzerConfig,
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let mat = RE.find_at(&self.buffer, self.offset)?;
            self.offset = mat.end();
            let position = self.position;
            self.position += 1;

            let word = mat.as_str();
            if self.config.stop_words && is_stopword(word) { continue; }
            let term = if self.config.stemming {
                STEMMER.stem(word).into_owned()
            } else {
                word.to_string()
            };
            return Some(Token { term, position });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_analyze() {
        let toks: Vec<Token> = Analyzer::standard().analyze("Kim visits, KOREA!").collect();
        assert_eq!(toks, vec![
            Token { term: "kim".into(), position: 0 },
            Token { term: "visits".into(), position: 1 },
            Token { term: "korea".into(), position: 2 },
        ]);
    }

    #[test]
    fn stopword_stage_keeps_positions() {
        let analyzer = Analyzer::new(AnalyzerConfig { stop_words: true, stemming: false });
        let toks: Vec<Token> = analyzer.analyze("the quick fox").collect();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].term, "quick");
        assert_eq!(toks[0].position, 1);
    }

    #[test]
    fn stemming_stage() {
        let analyzer = Analyzer::new(AnalyzerConfig { stop_words: false, stemming: true });
        assert!(analyzer.terms("Running").contains(&"run".to_string()));
    }

    #[test]
    fn empty_and_punctuation_only() {
        assert!(Analyzer::standard().terms("").is_empty());
        assert!(Analyzer::standard().terms("  --- !!! ").is_empty());
    }
}
