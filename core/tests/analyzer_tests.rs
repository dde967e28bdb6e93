use search_core::analyzer::{Analyzer, AnalyzerConfig};

#[test]
fn it_normalizes_and_splits() {
    let words = Analyzer::standard().terms("Running Runners RUN! The café's menu.");
    assert_eq!(words, vec!["running", "runners", "run", "the", "café", "s", "menu"]);
}

#[test]
fn it_applies_nfkc() {
    // full-width letters and the "ﬁ" ligature fold to plain ASCII
    let words = Analyzer::standard().terms("ＫＩＭ ﬁle");
    assert_eq!(words, vec!["kim", "file"]);
}

#[test]
fn it_filters_stopwords_when_enabled() {
    let analyzer = Analyzer::new(AnalyzerConfig { stop_words: true, stemming: false });
    let words = analyzer.terms("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert!(words.contains(&"fox".to_string()));
}

#[test]
fn it_stems_when_enabled() {
    let analyzer = Analyzer::new(AnalyzerConfig { stop_words: false, stemming: true });
    let words = analyzer.terms("Running Runners");
    assert!(words.contains(&"run".to_string()));
}

#[test]
fn it_is_deterministic() {
    let text = "US dawn confession, american confession 2011-12-18";
    let a: Vec<_> = Analyzer::standard().analyze(text).collect();
    let b: Vec<_> = Analyzer::standard().analyze(text).collect();
    assert_eq!(a, b);
    assert_eq!(a.iter().map(|t| t.position).collect::<Vec<_>>(), (0..a.len() as u32).collect::<Vec<_>>());
}
