//! Trait seams for external collaborators
//!
//! Everything the core calls out to (language models, embedding backends,
//! vector stores, alerting) is behind one of these traits so concrete
//! providers stay out of the pipeline crates.

pub mod alert;
pub mod embedding;
pub mod llm;
pub mod vector;

pub use alert::{AlertEvent, AlertSink, NullAlertSink};
pub use embedding::EmbeddingBackend;
pub use llm::LanguageModel;
pub use vector::VectorBackend;
