use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use indexer::{load_documents, SourceFormat};
use search_core::persist::IndexPaths;
use search_core::{Analyzer, Clause, DocId, EngineConfig, Occur, SearchEngine, SearchError, SearchRequest, Searcher, TopDocs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub field: Option<String>,
    pub k: Option<usize>,
}

#[derive(Deserialize)]
pub struct StructuredSearch {
    #[serde(flatten)]
    pub request: SearchRequest,
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f32,
    pub title: Option<String>,
    /// Title with matched query terms wrapped in `<em>`.
    pub highlighted: Option<String>,
}

/// Where `/index/rebuild` reads documents from.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub format: SourceFormat,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index_dir: PathBuf,
    pub source: Option<SourceConfig>,
    pub engine: EngineConfig,
    pub admin_token: Option<String>,
    /// Comma-separated origins; any origin when unset.
    pub cors_allow_origin: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub index_paths: IndexPaths,
    pub source: Option<SourceConfig>,
    pub admin_token: Option<String>,
}

type ApiError = (StatusCode, String);

fn api_error(e: SearchError) -> ApiError {
    let status = match e {
        SearchError::UnparsableRangeBound { .. } => StatusCode::BAD_REQUEST,
        SearchError::IndexNotBuilt => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

/// Opens the index at `index_dir`, or builds it from the configured source
/// when none exists yet. Without either, searches answer 503 until a rebuild.
pub fn build_app(config: ServerConfig) -> Result<Router> {
    let index_paths = IndexPaths::new(&config.index_dir);
    let engine = SearchEngine::new(config.engine.clone());
    if index_paths.exists() {
        engine.load(&index_paths)?;
    } else if let Some(source) = &config.source {
        let docs = load_documents(source.format, &source.path, &engine.config().fields);
        engine.rebuild_and_persist(&index_paths, docs)?;
    } else {
        tracing::warn!(index = %config.index_dir.display(), "no index and no source configured");
    }

    let app_state = AppState {
        engine: Arc::new(engine),
        index_paths,
        source: config.source.clone(),
        admin_token: config.admin_token.clone(),
    };

    let cors = match &config.cors_allow_origin {
        Some(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler).post(structured_search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/rebuild", post(rebuild_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let searcher = state.engine.searcher().map_err(api_error)?;
    let config = state.engine.config();
    let field = params.field.unwrap_or_else(|| config.fields.content.clone());
    let k = params.k.unwrap_or(config.default_k).min(MAX_K);

    let query = searcher.parser().parse_simple(&field, &params.q);
    let top = searcher.search(&query, k);
    let terms = required_terms(query.clauses());
    Ok(Json(respond(&searcher, config, params.q, &top, &terms, start)))
}

pub async fn structured_search_handler(State(state): State<AppState>, Json(body): Json<StructuredSearch>) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let searcher = state.engine.searcher().map_err(api_error)?;
    let config = state.engine.config();
    let k = body.k.unwrap_or(config.default_k).min(MAX_K);

    let query = searcher.parser().parse(&body.request).map_err(api_error)?;
    let top = searcher.search(&query, k);
    let terms = required_terms(query.clauses());
    Ok(Json(respond(&searcher, config, body.request.to_string(), &top, &terms, start)))
}

fn required_terms(clauses: &[Clause]) -> Vec<String> {
    let mut out = Vec::new();
    for clause in clauses {
        match clause {
            Clause::Terms(tc) if tc.occur == Occur::Must => out.extend(tc.terms.iter().cloned()),
            Clause::All(children) => out.extend(required_terms(children)),
            _ => {}
        }
    }
    out
}

fn respond(searcher: &Searcher, config: &EngineConfig, query: String, top: &TopDocs, terms: &[String], start: Instant) -> SearchResponse {
    let display_fields = [config.fields.title.as_str(), config.fields.path.as_str()];
    let results = top
        .hits
        .iter()
        .map(|hit| {
            let title = searcher.display_value(hit.doc_id, &display_fields).map(|v| v.to_string());
            let highlighted = title.as_deref().map(|t| highlight_terms(t, terms, searcher.parser().analyzer()));
            SearchHit { doc_id: hit.doc_id, score: hit.score, title, highlighted }
        })
        .collect();
    let took_ms = start.elapsed().as_millis();
    tracing::info!(%query, total_hits = top.total_hits, took_ms, "search served");
    SearchResponse { query, took_ms, total_hits: top.total_hits, results }
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<serde_json::Value>, ApiError> {
    let searcher = state.engine.searcher().map_err(api_error)?;
    match searcher.index().stored_fields(doc_id) {
        Some(fields) => {
            let mut obj = serde_json::Map::new();
            obj.insert("doc_id".into(), doc_id.into());
            for (name, value) in fields {
                let v = match value {
                    search_core::FieldValue::Text(s) => serde_json::Value::String(s.clone()),
                    search_core::FieldValue::Int(i) => (*i).into(),
                };
                obj.entry(name.clone()).or_insert(v);
            }
            Ok(Json(serde_json::Value::Object(obj)))
        }
        None => Err((StatusCode::NOT_FOUND, format!("document {doc_id} not found"))),
    }
}

/// Wraps every word of `text` whose analyzed form is one of `terms` in `<em>`.
/// Words go through the index's analyzer, so stemmed terms match their
/// inflected forms.
fn highlight_terms(text: &str, terms: &[String], analyzer: &Analyzer) -> String {
    if terms.is_empty() {
        return text.to_string();
    }
    let words = match regex::Regex::new(r"[\p{L}\p{N}]+") {
        Ok(re) => re,
        Err(_) => return text.to_string(),
    };
    words
        .replace_all(text, |caps: &regex::Captures| {
            let word = &caps[0];
            if analyzer.analyze(word).any(|t| terms.contains(&t.term)) {
                format!("<em>{word}</em>")
            } else {
                word.to_string()
            }
        })
        .into_owned()
}

// --- Admin endpoints ---
async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let source = state
        .source
        .clone()
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "no document source configured".to_string()))?;

    let engine = state.engine.clone();
    let paths = state.index_paths.clone();
    let searcher = tokio::task::spawn_blocking(move || {
        let docs = load_documents(source.format, &source.path, &engine.config().fields);
        engine.rebuild_and_persist(&paths, docs)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(api_error)?;

    Ok(Json(serde_json::json!({
        "generation": searcher.generation(),
        "num_docs": searcher.index().document_count(),
    })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_whole_words_case_insensitively() {
        let terms = vec!["kim".to_string(), "korea".to_string()];
        let analyzer = Analyzer::standard();
        assert_eq!(highlight_terms("Kim visits Korea, Kimchi", &terms, &analyzer), "<em>Kim</em> visits <em>Korea</em>, Kimchi");
        assert_eq!(highlight_terms("Video", &[], &analyzer), "Video");
    }

    #[test]
    fn highlights_inflected_forms_under_stemming() {
        let analyzer = Analyzer::new(search_core::AnalyzerConfig { stop_words: false, stemming: true });
        let terms = analyzer.terms("runs");
        assert_eq!(highlight_terms("Running late, she runs", &terms, &analyzer), "<em>Running</em> late, she <em>runs</em>");
    }

    #[test]
    fn required_terms_skip_exclusions() {
        let q = search_core::Query::match_all()
            .must("title", vec!["us".into()])
            .must_not("title", vec!["dawn".into()]);
        assert_eq!(required_terms(q.clauses()), vec!["us".to_string()]);
    }
}
