pub mod quiz;

pub use quiz::error::QuizError;
pub use quiz::poems::{PoemRecord, Poems};
pub use quiz::{Mode, Phase, QuestionView, QuizSession, SessionView};
