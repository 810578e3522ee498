pub mod chunking;
pub mod document;
pub mod gemini;
pub mod index;
pub mod rag;
pub mod server;
