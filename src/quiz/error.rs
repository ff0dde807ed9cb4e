use thiserror::Error;

/// Errors the quiz core can produce.
///
/// `NotFound`, `Malformed` and `InsufficientCorpus` are fatal at startup.
/// `InvalidTransition` is a caller bug: the front-end gates every operation
/// on the session phase, so it should be unreachable through the bot.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("corpus file not found: {path} ({source})")]
    NotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus file {path} is not valid JSON: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("corpus has only {have} poems, need at least {need} to build a question")]
    InsufficientCorpus { have: usize, need: usize },

    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),
}
