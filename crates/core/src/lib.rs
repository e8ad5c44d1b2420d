pub mod chunking;
pub mod config;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod sources;
pub mod store;
pub mod traits;

#[cfg(test)]
mod testing;

pub use chunking::{ChunkingConfig, RecursiveSplitter};
pub use config::{resolve_credentials, Credentials, PromptMode, RagConfig};
pub use error::{ConfigError, IngestError, ProviderError, RagError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PdfExtractor};
pub use ingest::{
    build_vectorstore, discover_pdf_files, load_documents, IngestOutcome, IngestionOptions,
};
pub use models::{
    Chunk, CollectionManifest, Document, GenerationOptions, ScoredChunk, SourceFingerprint,
    StoredRecord,
};
pub use pipeline::RagPipeline;
pub use prompt::{format_context, PromptTemplate};
pub use providers::{MistralChat, MistralEmbeddings};
pub use sources::download_sources;
pub use store::{collection_exists, LocalVectorStore};
pub use traits::{Answerer, EmbeddingProvider, GenerationProvider, VectorIndex};
