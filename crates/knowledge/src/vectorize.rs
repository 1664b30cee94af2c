//! Turning sources into index entries, atomically per run.
//!
//! A run does all extraction, chunking and embedding in memory first. Only
//! then is the chunk store appended and the index rewritten; the index
//! rename is the commit point. If the index write fails the chunk store is
//! cut back to its previous length. A crash between the two writes leaves
//! extra chunk store records, which the next writer trims.

use crate::chunk_store::ChunkStore;
use crate::chunker::Chunker;
use crate::config::{get_chunks_path, get_index_path, load_config, save_config};
use crate::embeddings::EmbeddingEngine;
use crate::extract::{extract, ExtractedDocument};
use crate::normalize::normalize;
use crate::progress::ProgressReporter;
use crate::sources::SourceLog;
use crate::types::{KnowledgeSource, SourceKind, VectorizeOptions, VectorizeStats};
use crate::vector_index::{FlatL2Index, VectorIndex};
use chrono::Utc;
use ragbasics_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::path::Path;
use std::time::Instant;

/// Open a base's index and chunk store for appending.
///
/// Repairs a torn commit (store longer than index) by trimming the store.
pub fn open_for_write(workspace: &Path, base_name: &str) -> AppResult<(FlatL2Index, ChunkStore)> {
    let index = FlatL2Index::create_or_open(&get_index_path(workspace, base_name))?;
    let mut store = ChunkStore::open(&get_chunks_path(workspace, base_name))?;
    reconcile(&index, &mut store)?;
    Ok((index, store))
}

/// Bring the chunk store back in line with the index.
pub fn reconcile<I: VectorIndex>(index: &I, store: &mut ChunkStore) -> AppResult<()> {
    match store.len().cmp(&index.len()) {
        Ordering::Equal if store.has_torn_tail() => {
            tracing::warn!(
                "Chunk store {:?} ends in a partial record from an interrupted run; discarding it",
                store.path()
            );
            store.truncate(index.len())
        }
        Ordering::Equal => Ok(()),
        Ordering::Greater => {
            tracing::warn!(
                "Chunk store {:?} has {} records but the index has {} entries; discarding records from an interrupted run",
                store.path(),
                store.len(),
                index.len()
            );
            store.truncate(index.len())
        }
        Ordering::Less => Err(AppError::IndexUnavailable(format!(
            "Index has {} entries but chunk store {:?} has only {} records; run clean and vectorize again",
            index.len(),
            store.path(),
            store.len()
        ))),
    }
}

/// Append `chunks` and their `vectors` as one unit.
///
/// Returns the position of the first appended chunk. On error neither the
/// store nor the index has changed.
pub fn commit(
    index: &mut FlatL2Index,
    store: &mut ChunkStore,
    chunks: &[String],
    vectors: &[Vec<f32>],
) -> AppResult<usize> {
    if chunks.len() != vectors.len() {
        return Err(AppError::Embedding(format!(
            "{} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }

    index.check(vectors)?;

    let first_position = store.len();
    store.append(chunks)?;

    if let Err(e) = index.add(vectors) {
        if let Err(rollback) = store.truncate(first_position) {
            tracing::warn!(
                "Failed to roll back chunk store {:?}: {}",
                store.path(),
                rollback
            );
        }
        return Err(e);
    }

    Ok(first_position)
}

/// Chunks produced from one document.
struct DocumentChunks {
    source: String,
    bytes: u64,
    chunks: Vec<String>,
}

/// Extract, chunk, embed and append one source to a knowledge base.
pub async fn vectorize(
    workspace: &Path,
    options: &VectorizeOptions,
    engine: &EmbeddingEngine,
    progress: &ProgressReporter,
) -> AppResult<VectorizeStats> {
    tracing::info!(
        "Vectorizing {} source '{}' into base '{}'",
        options.kind,
        options.source,
        options.base_name
    );

    // Fail on a bad base before any network or file access.
    crate::config::validate_base_name(&options.base_name)?;

    let documents = extract(options.kind, &options.source).await?;
    if documents.iter().all(|d| d.text.trim().is_empty()) {
        return Err(AppError::Extraction(format!(
            "No text could be extracted from '{}'",
            options.source
        )));
    }

    vectorize_documents(
        workspace,
        &options.base_name,
        options.kind,
        documents,
        engine,
        progress,
    )
    .await
}

/// Chunk, embed and append already-extracted documents.
pub async fn vectorize_documents(
    workspace: &Path,
    base_name: &str,
    kind: SourceKind,
    documents: Vec<ExtractedDocument>,
    engine: &EmbeddingEngine,
    progress: &ProgressReporter,
) -> AppResult<VectorizeStats> {
    let start = Instant::now();

    let mut config = load_config(workspace, base_name)?;
    let chunker = Chunker::new(config.chunking.clone())?;
    let (mut index, mut store) = open_for_write(workspace, base_name)?;

    if !index.is_empty() {
        config.embedding.validate_consistency(engine.config())?;
    }

    let total_documents = documents.len() as u64;
    let normalize_options = *config.normalize_options(kind);
    let mut per_document = Vec::with_capacity(documents.len());
    for (i, document) in documents.into_iter().enumerate() {
        progress.extract(i as u64 + 1, Some(total_documents), &document.source);

        let text = normalize(&document.text, &normalize_options);
        let chunks = chunker.chunk(&text);
        if chunks.is_empty() {
            tracing::warn!("No text extracted from {}", document.source);
        }

        per_document.push(DocumentChunks {
            source: document.source,
            bytes: document.text.len() as u64,
            chunks,
        });
    }

    let texts: Vec<String> = per_document
        .iter()
        .flat_map(|d| d.chunks.iter().cloned())
        .collect();
    progress.chunk(texts.len());

    if texts.is_empty() {
        return Err(AppError::Extraction(
            "No text left to index after normalization and chunking".to_string(),
        ));
    }

    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(engine.config().batch_size) {
        vectors.extend(engine.embed(batch).await?);
        progress.embed(vectors.len(), texts.len(), &engine.config().model);
    }

    let first_position = commit(&mut index, &mut store, &texts, &vectors)?;
    progress.commit(index.len());

    tracing::info!(
        "Committed {} chunks to base '{}' (positions {}..{})",
        texts.len(),
        base_name,
        first_position,
        index.len()
    );

    // Everything below is bookkeeping; the run is already durable.
    config.embedding = engine.config().clone();
    config.embedding.dimensions = index.dimension();
    if let Err(e) = save_config(workspace, &config) {
        tracing::warn!("Failed to save config for base '{}': {}", base_name, e);
    }

    let log = SourceLog::new(workspace, base_name);
    let indexed_at = Utc::now();
    let mut position = first_position;
    for document in &per_document {
        let record = KnowledgeSource {
            source: document.source.clone(),
            kind,
            indexed_at,
            first_position: position,
            chunk_count: document.chunks.len(),
            byte_count: document.bytes,
        };
        position += document.chunks.len();

        if let Err(e) = log.record(&record) {
            tracing::warn!("Failed to record source {}: {}", document.source, e);
        }
    }

    Ok(VectorizeStats {
        documents_count: per_document.len(),
        chunks_count: texts.len(),
        first_position,
        index_len: index.len(),
        bytes_processed: per_document.iter().map(|d| d.bytes).sum(),
        duration_secs: start.elapsed().as_secs_f64(),
    })
}
