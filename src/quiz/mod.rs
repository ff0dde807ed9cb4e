pub mod error;
pub mod poems;

use rand::seq::SliceRandom;
use rand::thread_rng;

use self::error::QuizError;
use self::poems::Poems;

/// One correct lower half plus three decoys.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Question ordering policy for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    /// Ascending poem id.
    Sequential,
    /// A fresh uniform permutation per (re)initialization.
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    Unanswered,
    Answered,
}

/// The quiz state machine. One instance per user, mutated by exactly one
/// discrete event at a time (submit / advance / restart). The session is
/// complete once `index` has walked past the end of `order`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuizSession {
    pub mode: Mode,
    /// Permutation of the corpus id set, fixed for the session's duration.
    pub order: Vec<u32>,
    pub index: usize,
    pub score: usize,
    pub phase: Phase,
    /// Exactly 4 entries while a question is live, empty otherwise.
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub last_answer: Option<String>,
}

/// Everything the front-end needs to render the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionView {
    Question(QuestionView),
    Complete { score: usize, total: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    /// 1-based question number.
    pub number: usize,
    pub upper: String,
    pub reading_upper: String,
    pub reading_lower: String,
    pub author: String,
    pub description: String,
    pub options: Vec<String>,
    pub phase: Phase,
    /// Only revealed once the question has been answered.
    pub correct_answer: Option<String>,
    pub last_answer: Option<String>,
    pub score: usize,
    pub total: usize,
}

impl QuizSession {
    /// Starts a fresh session over the whole corpus.
    pub fn new(mode: Mode, poems: &Poems) -> Result<Self, QuizError> {
        if poems.len() < OPTIONS_PER_QUESTION {
            return Err(QuizError::InsufficientCorpus {
                have: poems.len(),
                need: OPTIONS_PER_QUESTION,
            });
        }

        let mut order = poems.ids();
        match mode {
            Mode::Sequential => order.sort_unstable(),
            Mode::Random => order.shuffle(&mut thread_rng()),
        }

        Ok(Self {
            mode,
            order,
            index: 0,
            score: 0,
            phase: Phase::Unanswered,
            options: Vec::new(),
            correct_answer: None,
            last_answer: None,
        })
    }

    /// Restarts with the session's current mode (a new permutation in
    /// random mode).
    pub fn reinitialize(&mut self, poems: &Poems) -> Result<(), QuizError> {
        *self = Self::new(self.mode, poems)?;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.index == self.order.len()
    }

    pub fn total_questions(&self) -> usize {
        self.order.len()
    }

    /// Id of the poem the current question is about.
    pub fn current_id(&self) -> Option<u32> {
        self.order.get(self.index).copied()
    }

    /// Generates the answer options for the current question: the poem's
    /// own lower half plus 3 decoys drawn without replacement from the
    /// other poems, shuffled so the correct slot is uniform. Idempotent:
    /// once the options exist for this question, a second call is a no-op.
    pub fn ensure_options(&mut self, poems: &Poems) -> Result<(), QuizError> {
        if self.is_complete() {
            return Err(QuizError::InvalidTransition(
                "cannot build options for a completed session",
            ));
        }
        if !self.options.is_empty() {
            return Ok(());
        }

        let current_id = self.order[self.index];
        let poem = poems
            .by_id(current_id)
            .expect("order holds only ids taken from the corpus");
        let correct = poem.lower.clone();

        let pool: Vec<&String> = poems
            .iter()
            .filter(|p| p.id != current_id)
            .map(|p| &p.lower)
            .collect();
        let mut options: Vec<String> = pool
            .choose_multiple(&mut thread_rng(), OPTIONS_PER_QUESTION - 1)
            .map(|lower| lower.to_string())
            .collect();
        options.push(correct.clone());
        options.shuffle(&mut thread_rng());

        self.options = options;
        self.correct_answer = Some(correct);
        Ok(())
    }

    /// Evaluates the user's choice. Returns whether it was correct.
    pub fn submit_answer(&mut self, choice: &str) -> Result<bool, QuizError> {
        if self.is_complete() || self.phase != Phase::Unanswered {
            return Err(QuizError::InvalidTransition(
                "submit_answer is only valid on an unanswered question",
            ));
        }
        if !self.options.iter().any(|option| option == choice) {
            return Err(QuizError::InvalidTransition(
                "submitted answer is not one of the current options",
            ));
        }

        let correct = self.correct_answer.as_deref() == Some(choice);
        if correct {
            self.score += 1;
        }
        self.last_answer = Some(choice.to_string());
        self.phase = Phase::Answered;
        Ok(correct)
    }

    /// Moves on to the next question (or completes the session), dropping
    /// the answered question's options so the next one gets a fresh draw.
    pub fn advance(&mut self) -> Result<(), QuizError> {
        if self.phase != Phase::Answered {
            return Err(QuizError::InvalidTransition(
                "advance is only valid once the question has been answered",
            ));
        }

        self.index += 1;
        self.phase = Phase::Unanswered;
        self.options.clear();
        self.correct_answer = None;
        self.last_answer = None;
        Ok(())
    }

    /// Snapshot of the state for rendering. Call `ensure_options` first
    /// when entering a new question, otherwise the option list is empty.
    pub fn view(&self, poems: &Poems) -> SessionView {
        if self.is_complete() {
            return SessionView::Complete {
                score: self.score,
                total: self.order.len(),
            };
        }

        let poem = poems
            .by_id(self.order[self.index])
            .expect("order holds only ids taken from the corpus");

        SessionView::Question(QuestionView {
            number: self.index + 1,
            upper: poem.upper.clone(),
            reading_upper: poem.reading_upper.clone(),
            reading_lower: poem.reading_lower.clone(),
            author: poem.author.clone(),
            description: poem.description.clone(),
            options: self.options.clone(),
            phase: self.phase,
            correct_answer: match self.phase {
                Phase::Answered => self.correct_answer.clone(),
                Phase::Unanswered => None,
            },
            last_answer: self.last_answer.clone(),
            score: self.score,
            total: self.order.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::poems::{PoemRecord, Poems};
    use super::*;

    fn poem(id: u32) -> PoemRecord {
        PoemRecord {
            id,
            upper: format!("upper {id}"),
            lower: format!("lower {id}"),
            reading_upper: format!("reading upper {id}"),
            reading_lower: format!("reading lower {id}"),
            author: format!("author {id}"),
            description: format!("description {id}"),
        }
    }

    fn corpus(ids: &[u32]) -> Poems {
        Poems::from_records(ids.iter().map(|&id| poem(id)).collect())
    }

    #[test]
    fn sequential_order_is_ascending_by_id() {
        let poems = corpus(&[3, 1, 5, 2, 4]);
        let session = QuizSession::new(Mode::Sequential, &poems).unwrap();
        assert_eq!(session.order, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn order_is_a_permutation_of_the_corpus_ids() {
        let poems = corpus(&[1, 2, 3, 4, 5, 6, 7]);
        let session = QuizSession::new(Mode::Random, &poems).unwrap();
        assert_eq!(session.order.len(), poems.len());
        let drawn: HashSet<u32> = session.order.iter().copied().collect();
        let expected: HashSet<u32> = poems.ids().into_iter().collect();
        assert_eq!(drawn, expected);
    }

    #[test]
    fn fewer_than_four_poems_is_rejected() {
        let poems = corpus(&[1, 2, 3]);
        let result = QuizSession::new(Mode::Sequential, &poems);
        assert!(matches!(
            result,
            Err(QuizError::InsufficientCorpus { have: 3, need: 4 })
        ));
    }

    #[test]
    fn random_first_question_is_roughly_uniform() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for _ in 0..1000 {
            let session = QuizSession::new(Mode::Random, &poems).unwrap();
            *counts.entry(session.order[0]).or_insert(0) += 1;
        }
        assert_eq!(counts.len(), 5);
        // Expected 200 per id; the band is wide enough to make a false
        // failure astronomically unlikely.
        for (&id, &count) in &counts {
            assert!(
                (120..=280).contains(&count),
                "id {id} drawn {count} times out of 1000"
            );
        }
    }

    #[test]
    fn options_are_four_distinct_lowers_including_the_correct_one() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut session = QuizSession::new(Mode::Sequential, &poems).unwrap();
        session.ensure_options(&poems).unwrap();

        assert_eq!(session.options.len(), 4);
        let distinct: HashSet<&String> = session.options.iter().collect();
        assert_eq!(distinct.len(), 4);
        assert_eq!(session.correct_answer.as_deref(), Some("lower 1"));
        assert!(session.options.iter().any(|o| o == "lower 1"));
    }

    #[test]
    fn ensure_options_is_a_no_op_while_the_question_is_live() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut session = QuizSession::new(Mode::Sequential, &poems).unwrap();
        session.ensure_options(&poems).unwrap();
        let first_draw = session.options.clone();

        session.ensure_options(&poems).unwrap();
        assert_eq!(session.options, first_draw);

        session.submit_answer(&first_draw[0].clone()).unwrap();
        session.ensure_options(&poems).unwrap();
        assert_eq!(session.options, first_draw);
    }

    #[test]
    fn correct_answer_increments_the_score() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut session = QuizSession::new(Mode::Sequential, &poems).unwrap();
        session.ensure_options(&poems).unwrap();

        let was_correct = session.submit_answer("lower 1").unwrap();
        assert!(was_correct);
        assert_eq!(session.score, 1);
        assert_eq!(session.phase, Phase::Answered);
        assert_eq!(session.last_answer.as_deref(), Some("lower 1"));
    }

    #[test]
    fn wrong_answer_leaves_the_score_unchanged() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut session = QuizSession::new(Mode::Sequential, &poems).unwrap();
        session.ensure_options(&poems).unwrap();

        let decoy = session
            .options
            .iter()
            .find(|o| *o != "lower 1")
            .unwrap()
            .clone();
        let was_correct = session.submit_answer(&decoy).unwrap();
        assert!(!was_correct);
        assert_eq!(session.score, 0);
        assert_eq!(session.phase, Phase::Answered);
    }

    #[test]
    fn out_of_phase_calls_are_invalid_transitions() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut session = QuizSession::new(Mode::Sequential, &poems).unwrap();
        session.ensure_options(&poems).unwrap();

        // Advance before answering
        assert!(matches!(
            session.advance(),
            Err(QuizError::InvalidTransition(_))
        ));
        // An answer that is not one of the options
        assert!(matches!(
            session.submit_answer("not an option"),
            Err(QuizError::InvalidTransition(_))
        ));

        session.submit_answer("lower 1").unwrap();
        // Double submit
        assert!(matches!(
            session.submit_answer("lower 1"),
            Err(QuizError::InvalidTransition(_))
        ));
        assert_eq!(session.score, 1);
    }

    #[test]
    fn advance_clears_the_question_state() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut session = QuizSession::new(Mode::Sequential, &poems).unwrap();
        session.ensure_options(&poems).unwrap();
        session.submit_answer("lower 1").unwrap();

        session.advance().unwrap();
        assert_eq!(session.index, 1);
        assert_eq!(session.phase, Phase::Unanswered);
        assert!(session.options.is_empty());
        assert!(session.correct_answer.is_none());
        assert!(session.last_answer.is_none());
    }

    #[test]
    fn answering_every_question_completes_the_session() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut session = QuizSession::new(Mode::Sequential, &poems).unwrap();

        for number in 1..=5 {
            assert_eq!(session.current_id(), Some(number));
            session.ensure_options(&poems).unwrap();
            let correct = poems.by_id(number).unwrap().lower.clone();
            assert!(session.submit_answer(&correct).unwrap());
            session.advance().unwrap();
        }

        assert!(session.is_complete());
        assert_eq!(session.score, 5);
        assert!(matches!(
            session.view(&poems),
            SessionView::Complete { score: 5, total: 5 }
        ));
    }

    #[test]
    fn reinitialize_resets_progress_but_keeps_the_mode() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut session = QuizSession::new(Mode::Random, &poems).unwrap();
        session.index = session.order.len();
        session.score = 3;

        session.reinitialize(&poems).unwrap();
        assert_eq!(session.mode, Mode::Random);
        assert_eq!(session.index, 0);
        assert_eq!(session.score, 0);
        assert_eq!(session.phase, Phase::Unanswered);
        assert!(session.options.is_empty());
    }

    #[test]
    fn view_reveals_the_correct_answer_only_after_answering() {
        let poems = corpus(&[1, 2, 3, 4, 5]);
        let mut session = QuizSession::new(Mode::Sequential, &poems).unwrap();
        session.ensure_options(&poems).unwrap();

        let SessionView::Question(before) = session.view(&poems) else {
            panic!("expected a question view");
        };
        assert_eq!(before.number, 1);
        assert_eq!(before.upper, "upper 1");
        assert_eq!(before.author, "author 1");
        assert_eq!(before.options.len(), 4);
        assert_eq!(before.total, 5);
        assert!(before.correct_answer.is_none());

        session.submit_answer("lower 1").unwrap();
        let SessionView::Question(after) = session.view(&poems) else {
            panic!("expected a question view");
        };
        assert_eq!(after.correct_answer.as_deref(), Some("lower 1"));
        assert_eq!(after.last_answer.as_deref(), Some("lower 1"));
        assert_eq!(after.score, 1);
    }
}
