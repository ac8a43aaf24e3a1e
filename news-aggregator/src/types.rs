// Use the interfaces crate for core types
pub use interfaces::defs::{
    ArchivedPost, Category, ContentItem, EnrichmentPayload, GalleryPost, MediaType, NewGalleryPost,
    TranslationLanguage,
};

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
