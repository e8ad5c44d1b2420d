use crate::chunking::{ChunkingConfig, RecursiveSplitter};
use crate::config::{Credentials, RagConfig};
use crate::extractor::PdfExtractor;
use crate::models::{Document, SourceFingerprint};
use crate::sources::download_sources;
use crate::store::{read_manifest, LocalVectorStore};
use crate::traits::EmbeddingProvider;
use crate::IngestError;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn fingerprint_sources(files: &[PathBuf]) -> Result<Vec<SourceFingerprint>, IngestError> {
    files
        .iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;
            Ok(SourceFingerprint {
                file_name: file_name.to_string(),
                sha256: digest_file(path)?,
            })
        })
        .collect()
}

pub fn load_documents(
    files: &[PathBuf],
    extractor: &dyn PdfExtractor,
) -> Result<Vec<Document>, IngestError> {
    let mut documents = Vec::new();
    for path in files {
        let pages = extractor.extract_pages(path)?;
        tracing::debug!(path = %path.display(), pages = pages.len(), "loaded pdf");
        documents.extend(pages);
    }
    tracing::info!(files = files.len(), pages = documents.len(), "loaded pdfs");
    Ok(documents)
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub data_folder: PathBuf,
    pub data_urls: Vec<Url>,
    pub persist_directory: PathBuf,
    pub collection_name: String,
    pub chunking: ChunkingConfig,
    pub embedding_batch_size: usize,
    pub download_token: Option<String>,
    pub force: bool,
}

impl IngestionOptions {
    pub fn from_config(config: &RagConfig, credentials: &Credentials) -> Self {
        Self {
            data_folder: config.data_folder.clone(),
            data_urls: config.data_urls.clone(),
            persist_directory: config.persist_directory.clone(),
            collection_name: config.collection_name.clone(),
            chunking: config.chunking(),
            embedding_batch_size: config.embedding_batch_size,
            download_token: credentials.secondary_token.clone(),
            force: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Skipped { records: usize },
    Created { documents: usize, chunks: usize },
}

pub async fn build_vectorstore(
    options: &IngestionOptions,
    embedder: &dyn EmbeddingProvider,
    extractor: &dyn PdfExtractor,
    client: &Client,
) -> Result<IngestOutcome, IngestError> {
    tracing::info!(collection = %options.collection_name, "starting vector store creation");
    download_sources(
        client,
        &options.data_folder,
        &options.data_urls,
        options.download_token.as_deref(),
    )
    .await?;

    let files = discover_pdf_files(&options.data_folder);
    let existing = match read_manifest(&options.persist_directory, &options.collection_name) {
        Ok(manifest) => manifest,
        Err(error) => {
            tracing::warn!(
                collection = %options.collection_name,
                %error,
                "unreadable collection manifest, rebuilding"
            );
            None
        }
    };

    if files.is_empty() {
        if let Some(manifest) = existing {
            tracing::warn!(
                folder = %options.data_folder.display(),
                "no source pdfs found, keeping existing collection"
            );
            return Ok(IngestOutcome::Skipped {
                records: manifest.record_count,
            });
        }
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            options.data_folder.display()
        )));
    }

    let sources = fingerprint_sources(&files)?;

    if let Some(manifest) = existing {
        let unchanged = manifest.sources == sources && manifest.embedding_model == embedder.name();
        if unchanged && !options.force {
            tracing::info!(
                collection = %options.collection_name,
                records = manifest.record_count,
                "vector store already exists, skipping ingestion"
            );
            return Ok(IngestOutcome::Skipped {
                records: manifest.record_count,
            });
        }
        if !unchanged {
            tracing::warn!(
                collection = %options.collection_name,
                "sources or embedding model changed since the last build, rebuilding"
            );
        }
    }

    let documents = load_documents(&files, extractor)?;
    let splitter = RecursiveSplitter::new(options.chunking)?;
    let chunks = splitter.split_documents(&documents);
    let chunk_count = chunks.len();
    tracing::info!(
        documents = documents.len(),
        chunks = chunk_count,
        chunk_size = options.chunking.chunk_size,
        chunk_overlap = options.chunking.chunk_overlap,
        "split documents"
    );

    LocalVectorStore::create(
        &options.persist_directory,
        &options.collection_name,
        chunks,
        embedder,
        options.embedding_batch_size,
        sources,
    )
    .await?;

    tracing::info!(collection = %options.collection_name, "vector store created");
    Ok(IngestOutcome::Created {
        documents: documents.len(),
        chunks: chunk_count,
    })
}
