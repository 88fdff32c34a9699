//! Minimal terminal chat front end over the lantern core.
//!
//! Usage: `lantern [document.txt ...]`. The model and executable come from
//! `lantern.toml`; plain-text documents passed on the command line are
//! chunked and indexed so answers can be grounded in them.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use lantern::chat::{Message, Transcript};
use lantern::config::{AppPaths, Settings};
use lantern::errors::CoreError;
use lantern::llm::{postprocess, GenerationEngine};
use lantern::prompt::{PromptBuilder, PromptFormat};
use lantern::rag::{Chunker, DocumentChunk, RetrievalIndex, RetrievalResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = AppPaths::new();
    lantern::logging::init(&paths);

    let settings = Settings::load(&paths).context("failed to load settings")?;
    let model_path = settings
        .model_path
        .clone()
        .context("no model configured; set `model_path` in lantern.toml")?;

    let engine = GenerationEngine::new(settings.executable.as_deref(), &model_path)?;
    let format = PromptFormat::detect(&model_path.to_string_lossy());
    tracing::info!(?format, model = %model_path.display(), "model loaded");

    let chunker = Chunker::new(settings.chunking.clone());
    let mut index = RetrievalIndex::new();
    for document in std::env::args().skip(1).map(PathBuf::from) {
        ingest_document(&chunker, &mut index, &document)?;
    }

    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("lantern ready; /quit to exit");
    prompt_marker()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            prompt_marker()?;
            continue;
        }
        if input == "/quit" {
            break;
        }

        let results = index.search(
            input,
            settings.retrieval.top_k,
            settings.retrieval.min_score,
        );
        let context = format_context(&results);
        let sources = source_names(&results);

        let prompt = PromptBuilder::render(format, transcript.messages(), input, context.as_deref());
        transcript.push(Message::user(input));

        match run_generation(&engine, &prompt, &settings).await {
            Ok(raw) => {
                let response = postprocess::finalize(&raw);
                transcript.push(Message::assistant(
                    response.content,
                    response.reasoning,
                    if sources.is_empty() { None } else { Some(sources) },
                ));
            }
            Err(err) => {
                eprintln!("error: {}", err);
                transcript.push(Message::error(err.to_string()));
            }
        }

        prompt_marker()?;
    }

    Ok(())
}

async fn run_generation(
    engine: &GenerationEngine,
    prompt: &str,
    settings: &Settings,
) -> Result<String, CoreError> {
    let mut rx = engine.start(prompt, &settings.generation).await?;

    let mut raw = String::new();
    let mut failure = None;
    while let Some(item) = rx.recv().await {
        match item {
            Ok(fragment) => {
                print!("{}", fragment);
                let _ = std::io::stdout().flush();
                raw.push_str(&fragment);
            }
            Err(err) => failure = Some(err),
        }
    }
    println!();

    match failure {
        Some(err) => Err(err),
        None => Ok(raw),
    }
}

fn ingest_document(
    chunker: &Chunker,
    index: &mut RetrievalIndex,
    path: &Path,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read document {}", path.display()))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let document_id = uuid::Uuid::new_v4().to_string();

    let chunks: Vec<DocumentChunk> = chunker
        .chunk(&text)
        .into_iter()
        .enumerate()
        .map(|(i, content)| DocumentChunk::new(&document_id, &name, i, content))
        .collect();

    tracing::info!(document = %name, chunks = chunks.len(), "indexed document");
    index.load(chunks);
    Ok(())
}

fn format_context(results: &[RetrievalResult]) -> Option<String> {
    if results.is_empty() {
        return None;
    }
    let joined = results
        .iter()
        .map(|r| format!("[{}] {}", r.source, r.chunk.content))
        .collect::<Vec<_>>()
        .join("\n");
    Some(joined)
}

fn source_names(results: &[RetrievalResult]) -> Vec<String> {
    let mut names: Vec<String> = results.iter().map(|r| r.source.clone()).collect();
    names.sort();
    names.dedup();
    names
}

fn prompt_marker() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}
