#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no curated items match filter {signature}")]
    NoCandidates { signature: String },
    #[error("curated bank could not materialize an item for {skill_tag}")]
    CuratedItemUnavailable { skill_tag: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
