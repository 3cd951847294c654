//! Retrieval backend implementations.
//!
//! Each module provides a struct implementing [`crate::retriever::Retriever`]
//! for one store. [`embedding`] holds the query embedders the vector backend
//! depends on.

pub mod embedding;
pub mod graph;
pub mod keyword;
pub mod relational;
pub mod vector;

pub use embedding::{Embedder, HashingEmbedder, HttpEmbedder};
pub use graph::{GraphCredentials, GraphRetriever};
pub use keyword::KeywordRetriever;
pub use relational::RelationalRetriever;
pub use vector::{FlatIndex, Metadata, VectorRetriever};
