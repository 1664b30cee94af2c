//! RAG (Retrieval-Augmented Generation) answering.
//!
//! Turns retrieved chunks into a grounded generation request.

pub mod ask;
pub mod types;

pub use ask::answer;
pub use types::{RagResponse, RagSourceRef};
