//! Document processing and retrieval used by the PDF and RAG agents.
//!
//! This module provides:
//! - PDF extraction (`pdf-extract` with a `lopdf` fallback) into ordered page records
//! - Page chunking with overlap
//! - Embedding backends (local fastembed, OpenAI-compatible HTTP) behind an LRU cache
//! - A per-question flat L2 index
//! - The RAG agent's session store

mod embeddings;
mod pdf_extractor;
mod session_store;
mod text_splitter;
mod vector_index;

pub use embeddings::{
    CachingEmbedder, Embedder, FastEmbedder, OpenAiEmbedder, DEFAULT_EMBEDDING_CACHE_CAPACITY,
};
pub use pdf_extractor::{
    decode_pdf_bytes_to_string, extract_pages, extract_pages_via_lopdf, pages_to_records,
    DocumentExtractor, PdfExtractor,
};
pub use session_store::{Session, SessionStore};
pub use text_splitter::{TextSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use vector_index::{SearchHit, VectorIndex};
