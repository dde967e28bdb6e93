//! Interactive query loop over a loaded index.

use search_core::{EngineConfig, Searcher, TopDocs};
use std::io::{self, BufRead, Write};

pub const DEFAULT_QUIT_WORD: &str = "quit";

/// Reads one free-text query per line from `input` and writes ranked results
/// to `output` until end of input or a line equal to `quit_word`.
pub fn run<R, W>(
    searcher: &Searcher,
    config: &EngineConfig,
    field: &str,
    k: usize,
    quit_word: &str,
    input: R,
    mut output: W,
) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
{
    let mut served = 0;
    writeln!(output, "Enter a query ({quit_word} to exit):")?;
    output.flush()?;
    for line in input.lines() {
        let line = line?;
        let text = line.trim();
        if text == quit_word {
            break;
        }
        if text.is_empty() {
            continue;
        }
        let top = searcher.search_simple(field, text, k);
        writeln!(output, "Search ({field}: {text}): {} result(s) found", top.total_hits)?;
        write_results(&mut output, searcher, config, &top)?;
        output.flush()?;
        served += 1;
    }
    tracing::debug!(served, "query loop finished");
    Ok(served)
}

pub fn write_results<W: Write>(output: &mut W, searcher: &Searcher, config: &EngineConfig, top: &TopDocs) -> io::Result<()> {
    if top.hits.is_empty() {
        return writeln!(output, " no results");
    }
    let display_fields = [config.fields.title.as_str(), config.fields.path.as_str()];
    for (i, hit) in top.hits.iter().enumerate() {
        let label = searcher
            .display_value(hit.doc_id, &display_fields)
            .map(|v| v.to_string())
            .unwrap_or_else(|| format!("doc #{}", hit.doc_id));
        writeln!(output, " {}. {label} : {:.4}", i + 1, hit.score)?;
    }
    if top.total_hits > top.hits.len() {
        writeln!(output, " ({} of {} matches shown)", top.hits.len(), top.total_hits)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_core::{Document, SearchEngine};

    fn engine() -> SearchEngine {
        let engine = SearchEngine::new(EngineConfig::default());
        engine.build(vec![
            Document::new().with_field("title", "Kim visits Korea", true, true),
            Document::new().with_field("title", "Video release", true, true),
        ]);
        engine
    }

    #[test]
    fn answers_each_line_until_quit_word() {
        let engine = engine();
        let searcher = engine.searcher().unwrap();
        let input = "korea\n\nvideo -release\nquit\nkim\n".as_bytes();
        let mut out = Vec::new();
        let served = run(&searcher, engine.config(), "title", 5, DEFAULT_QUIT_WORD, input, &mut out).unwrap();
        assert_eq!(served, 2);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Search (title: korea): 1 result(s) found"));
        assert!(text.contains(" 1. Kim visits Korea : "));
        assert!(text.contains(" no results"));
        assert!(!text.contains("title: kim"));
    }

    #[test]
    fn stops_at_end_of_input() {
        let engine = engine();
        let searcher = engine.searcher().unwrap();
        let mut out = Vec::new();
        let served = run(&searcher, engine.config(), "title", 5, "lab9", "video\n".as_bytes(), &mut out).unwrap();
        assert_eq!(served, 1);
        assert!(String::from_utf8(out).unwrap().contains(" 1. Video release : "));
    }
}
