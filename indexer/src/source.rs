//! Document sources: a directory of plain-text files, or feed items given as
//! a JSON array / JSONL file of `{title, description, pubDate}` records.
//!
//! Unreadable sources are not fatal. They are logged and yield no documents
//! so that a build still produces a valid, empty index.

use anyhow::{Context, Result};
use search_core::query::parse_day_start;
use search_core::{Document, FieldNames, SearchError};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceFormat {
    /// Every file under a directory is one document.
    Text,
    /// JSON or JSONL feed items.
    Feed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pub_date: Option<serde_json::Value>,
}

/// Reads every document of `input`, logging and skipping what cannot be read.
pub fn load_documents(format: SourceFormat, input: &Path, fields: &FieldNames) -> Vec<Document> {
    let result = match format {
        SourceFormat::Text => text_documents(input, fields),
        SourceFormat::Feed => feed_documents(input, fields),
    };
    match result {
        Ok(docs) => {
            if docs.is_empty() {
                let err = SearchError::InvalidDocumentSource(format!("{} yielded no documents", input.display()));
                tracing::warn!(%err, "building an empty index");
            }
            docs
        }
        Err(e) => {
            let err = SearchError::InvalidDocumentSource(format!("{e:#}"));
            tracing::warn!(%err, "building an empty index");
            Vec::new()
        }
    }
}

/// One document per regular file, visited in path order: stored `path`,
/// indexed `content`.
pub fn text_documents(dir: &Path, fields: &FieldNames) -> Result<Vec<Document>> {
    if !dir.exists() {
        anyhow::bail!("{} does not exist", dir.display());
    }
    let mut docs = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if !p.is_file() {
            continue;
        }
        let content = match fs::read_to_string(p) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        let mut doc = Document::new();
        doc.add_field(fields.path.clone(), p.display().to_string(), true, false);
        doc.add_field(fields.content.clone(), content, false, true);
        docs.push(doc);
    }
    tracing::info!(dir = %dir.display(), num_docs = docs.len(), "read text collection");
    Ok(docs)
}

/// Feed items from a `.jsonl` file (one item per line) or a `.json` file
/// holding an array or a single item.
pub fn feed_documents(file: &Path, fields: &FieldNames) -> Result<Vec<Document>> {
    let items = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        read_feed_jsonl(file)?
    } else {
        read_feed_json(file)?
    };
    let docs: Vec<Document> = items.into_iter().map(|item| feed_item_document(item, fields)).collect();
    tracing::info!(file = %file.display(), num_docs = docs.len(), "read feed items");
    Ok(docs)
}

fn read_feed_jsonl(file: &Path) -> Result<Vec<FeedItem>> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let mut items = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        match serde_json::from_str::<FeedItem>(&line) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(line = lineno + 1, error = %e, "skipping malformed feed item"),
        }
    }
    Ok(items)
}

fn read_feed_json(file: &Path) -> Result<Vec<FeedItem>> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    let items = match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| match serde_json::from_value::<FeedItem>(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(item = i, error = %e, "skipping malformed feed item");
                    None
                }
            })
            .collect(),
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(items)
}

/// Stored + indexed title, indexed description, indexed `pubDate` in epoch ms.
pub fn feed_item_document(item: FeedItem, fields: &FieldNames) -> Document {
    let mut doc = Document::new();
    doc.add_field(fields.title.clone(), item.title, true, true);
    doc.add_field(fields.description.clone(), item.description, false, true);
    match item.pub_date.as_ref().map(parse_pub_date) {
        Some(Some(ms)) => {
            doc.add_field(fields.date.clone(), ms, false, true);
        }
        Some(None) => tracing::warn!(value = ?item.pub_date, "unparsable pubDate, indexing item without a date"),
        None => {}
    }
    doc
}

/// Epoch milliseconds from an integer, an RFC 2822 (RSS) or RFC 3339
/// timestamp, or a `yyyy-mm-dd` day.
pub fn parse_pub_date(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => {
            let s = s.trim();
            let rfc2822 = s.strip_suffix(" GMT").map(|head| format!("{head} +0000"));
            OffsetDateTime::parse(rfc2822.as_deref().unwrap_or(s), &Rfc2822)
                .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
                .map(|dt| (dt.unix_timestamp_nanos() / 1_000_000) as i64)
                .ok()
                .or_else(|| parse_day_start("pubDate", s).ok())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn pub_date_formats() {
        let day = 1_324_166_400_000i64;
        assert_eq!(parse_pub_date(&json!(day)), Some(day));
        assert_eq!(parse_pub_date(&json!("2011-12-18")), Some(day));
        assert_eq!(parse_pub_date(&json!("Sun, 18 Dec 2011 10:00:00 GMT")), Some(day + 36_000_000));
        assert_eq!(parse_pub_date(&json!("Sun, 18 Dec 2011 10:00:00 +0000")), Some(day + 36_000_000));
        assert_eq!(parse_pub_date(&json!("2011-12-18T00:00:01Z")), Some(day + 1_000));
        assert_eq!(parse_pub_date(&json!("yesterday")), None);
    }

    #[test]
    fn text_directory_in_path_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "Second file").unwrap();
        fs::write(dir.path().join("a.txt"), "First file").unwrap();
        let fields = FieldNames::default();
        let docs = text_documents(dir.path(), &fields).unwrap();
        assert_eq!(docs.len(), 2);
        let first = docs[0].get("path").unwrap().to_string();
        assert!(first.ends_with("a.txt"));
    }

    #[test]
    fn missing_source_yields_no_documents() {
        let dir = tempdir().unwrap();
        let docs = load_documents(SourceFormat::Text, &dir.path().join("absent"), &FieldNames::default());
        assert!(docs.is_empty());
        let docs = load_documents(SourceFormat::Feed, &dir.path().join("absent.json"), &FieldNames::default());
        assert!(docs.is_empty());
    }

    #[test]
    fn jsonl_feed_skips_bad_lines() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("feed.jsonl");
        fs::write(
            &file,
            "{\"title\":\"Kim visits Korea\",\"pubDate\":\"2011-12-18\"}\nnot json\n\n{\"title\":\"Video release\",\"description\":\"clip\"}\n",
        )
        .unwrap();
        let docs = feed_documents(&file, &FieldNames::default()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get("pubDate").and_then(|v| v.as_int()), Some(1_324_166_400_000));
        assert!(docs[1].get("pubDate").is_none());
    }

    #[test]
    fn json_array_feed() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("feed.json");
        fs::write(&file, r#"[{"title":"A","description":"x"},{"title":"B"}]"#).unwrap();
        let docs = feed_documents(&file, &FieldNames::default()).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].fields().iter().any(|f| f.name == "title" && f.stored && f.indexed));
        assert!(docs[0].fields().iter().any(|f| f.name == "description" && !f.stored && f.indexed));
    }

    #[test]
    fn json_array_feed_skips_malformed_items() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("feed.json");
        fs::write(&file, r#"[{"title":"Kim visits Korea"},{"description":"no title"},{"title":"Video release"}]"#).unwrap();
        let docs = feed_documents(&file, &FieldNames::default()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].get("title").and_then(|v| v.as_text()), Some("Video release"));
    }
}
