use crate::error::{IngestError, SearchError};
use crate::models::{Chunk, CollectionManifest, ScoredChunk, SourceFingerprint, StoredRecord};
use crate::traits::{EmbeddingProvider, VectorIndex};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub fn records_path(directory: &Path, collection: &str) -> PathBuf {
    directory.join(format!("{collection}.records.json"))
}

pub fn manifest_path(directory: &Path, collection: &str) -> PathBuf {
    directory.join(format!("{collection}.manifest.json"))
}

pub fn read_manifest(
    directory: &Path,
    collection: &str,
) -> Result<Option<CollectionManifest>, SearchError> {
    let path = manifest_path(directory, collection);
    if !path.is_file() {
        return Ok(None);
    }
    let manifest = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    Ok(Some(manifest))
}

pub fn collection_exists(directory: &Path, collection: &str) -> bool {
    matches!(read_manifest(directory, collection), Ok(Some(_)))
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone)]
pub struct LocalVectorStore {
    manifest: CollectionManifest,
    records: Vec<StoredRecord>,
}

impl LocalVectorStore {
    pub async fn create(
        directory: &Path,
        collection: &str,
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        batch_size: usize,
        sources: Vec<SourceFingerprint>,
    ) -> Result<Self, IngestError> {
        let batch_size = batch_size.max(1);
        let total_batches = chunks.len().div_ceil(batch_size);
        let mut embeddings = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            tracing::debug!(batch = batch_no + 1, total_batches, "embedding batch");
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            embeddings.extend(embedder.embed_batch(&texts).await?);
        }

        let store = Self::from_parts(collection, embedder.name(), chunks, embeddings, sources)?;
        store.persist(directory)?;
        Ok(store)
    }

    pub fn from_parts(
        collection: &str,
        embedding_model: &str,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        sources: Vec<SourceFingerprint>,
    ) -> Result<Self, SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = embeddings.iter().find(|vector| vector.len() != dimensions) {
            return Err(SearchError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        let records: Vec<StoredRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredRecord { chunk, embedding })
            .collect();

        Ok(Self {
            manifest: CollectionManifest {
                collection: collection.to_string(),
                generation: Uuid::new_v4(),
                created_at: Utc::now(),
                embedding_model: embedding_model.to_string(),
                dimensions,
                record_count: records.len(),
                sources,
            },
            records,
        })
    }

    pub fn persist(&self, directory: &Path) -> Result<(), SearchError> {
        fs::create_dir_all(directory)?;
        let collection = &self.manifest.collection;

        let manifest = manifest_path(directory, collection);
        if manifest.exists() {
            fs::remove_file(&manifest)?;
        }

        // Manifest last: a collection only counts as present once it exists.
        write_atomically(&records_path(directory, collection), &self.records)?;
        write_atomically(&manifest, &self.manifest)?;

        tracing::info!(
            collection = %collection,
            records = self.records.len(),
            dimensions = self.manifest.dimensions,
            path = %directory.display(),
            "vector store persisted"
        );
        Ok(())
    }

    pub fn open(directory: &Path, collection: &str) -> Result<Self, SearchError> {
        let manifest = read_manifest(directory, collection)?
            .ok_or_else(|| SearchError::MissingCollection(collection.to_string()))?;

        let file = File::open(records_path(directory, collection))?;
        let records: Vec<StoredRecord> = serde_json::from_reader(BufReader::new(file))?;

        if records.len() != manifest.record_count {
            return Err(SearchError::Corrupt {
                collection: collection.to_string(),
                details: format!(
                    "manifest lists {} records, found {}",
                    manifest.record_count,
                    records.len()
                ),
            });
        }
        if let Some(bad) = records
            .iter()
            .find(|record| record.embedding.len() != manifest.dimensions)
        {
            return Err(SearchError::DimensionMismatch {
                expected: manifest.dimensions,
                actual: bad.embedding.len(),
            });
        }

        tracing::info!(
            collection = %collection,
            records = records.len(),
            generation = %manifest.generation,
            "vector store opened"
        );
        Ok(Self { manifest, records })
    }

    pub fn manifest(&self) -> &CollectionManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.manifest.dimensions {
            return Err(SearchError::DimensionMismatch {
                expected: self.manifest.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| (position, cosine_similarity(query_vector, &record.embedding)))
            .collect();
        // Stable, so equal scores keep insertion order.
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(position, score)| ScoredChunk {
                chunk: self.records[position].chunk.clone(),
                score,
            })
            .collect())
    }
}

#[async_trait]
impl VectorIndex for LocalVectorStore {
    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        self.similarity_search(query_vector, top_k)
    }
}

fn write_atomically<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SearchError> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    let file = File::create(&staging)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    fs::rename(&staging, path)?;
    Ok(())
}
