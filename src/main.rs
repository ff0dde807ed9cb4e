use std::sync::Arc;

use dotenv::dotenv;
use hyakunin_quiz_bot::quiz::{
    self,
    error::QuizError,
    poems::Poems,
    Mode, Phase, QuizSession, SessionView,
};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatId, KeyboardButton, KeyboardMarkup},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SessionStorage = std::sync::Arc<ErasedStorage<State>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveMode,
    Quiz {
        session: QuizSession,
    },
    Finished {
        session: QuizSession,
    },
}

const CORPUS_FILE: &str = "hyakunin_isshu.json";

#[tokio::main]
async fn main() {
    dotenv().expect("Failed to load .env file");

    pretty_env_logger::init();
    log::info!("Starting Hyakunin Isshu quiz bot...");

    let corpus_path =
        std::env::var("HYAKUNIN_CORPUS").unwrap_or_else(|_| CORPUS_FILE.to_string());
    let poems = match Poems::load(&corpus_path) {
        Ok(poems) => poems,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    // A question needs one correct answer and three decoys, so a corpus
    // this small can never produce a valid session. Refuse to start
    // instead of failing on the first question.
    if poems.len() < quiz::OPTIONS_PER_QUESTION {
        log::error!(
            "{}",
            QuizError::InsufficientCorpus {
                have: poems.len(),
                need: quiz::OPTIONS_PER_QUESTION,
            }
        );
        std::process::exit(1);
    }
    log::info!("Loaded {} poems from {}", poems.len(), corpus_path);
    let poems = Arc::new(poems);

    let bot = Bot::from_env();

    let storage: SessionStorage = SqliteStorage::open("db.sqlite", Json)
        .await
        .expect("Failed to open the dialogue database")
        .erase();

    let poems_for_mode = poems.clone();
    let poems_for_quiz = poems.clone();
    let poems_for_finished = poems.clone();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveMode].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, msg: Message| {
                    receive_mode(poems_for_mode.clone(), bot, dialogue, msg)
                },
            ))
            .branch(dptree::case![State::Quiz { session }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, session: QuizSession, msg: Message| {
                    quiz_turn(poems_for_quiz.clone(), bot, dialogue, session, msg)
                },
            ))
            .branch(dptree::case![State::Finished { session }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, session: QuizSession, msg: Message| {
                    finished(poems_for_finished.clone(), bot, dialogue, session, msg)
                },
            )),
    )
    .dependencies(dptree::deps![storage])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str =
    "百人一首クイズへようこそ！🌸 上の句に合う下の句を四択から選んでください。";
const CHOOSE_MODE_TEXT: &str = "出題順を選択してください";
const SEQUENTIAL_MODE: &str = "ID順";
const RANDOM_MODE: &str = "ランダム";
const NEXT_QUESTION: &str = "次の問題へ";
const RETRY: &str = "もう一度挑戦する";
const CHANGE_MODE: &str = "出題順を変える";

fn mode_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(SEQUENTIAL_MODE),
        KeyboardButton::new(RANDOM_MODE),
    ]])
}

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;
    bot.send_message(msg.chat.id, CHOOSE_MODE_TEXT)
        .reply_markup(mode_keyboard())
        .await?;

    dialogue.update(State::ReceiveMode).await?;
    Ok(())
}

async fn receive_mode(
    poems: Arc<Poems>,
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
) -> HandlerResult {
    let mode = match msg.text() {
        Some(SEQUENTIAL_MODE) => Mode::Sequential,
        Some(RANDOM_MODE) => Mode::Random,
        _ => {
            bot.send_message(msg.chat.id, "ボタンから出題順を選んでください")
                .reply_markup(mode_keyboard())
                .await?;
            return Ok(());
        }
    };

    // The corpus size was checked at startup, so this cannot fail here
    let mut session = QuizSession::new(mode, &poems)?;
    send_question(&poems, &bot, msg.chat.id, &mut session).await?;

    dialogue.update(State::Quiz { session }).await?;
    Ok(())
}

async fn quiz_turn(
    poems: Arc<Poems>,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let text = match msg.text() {
        Some(text) => text,
        None => {
            bot.send_message(msg.chat.id, "テキストで答えてください").await?;
            return Ok(());
        }
    };

    match session.phase {
        Phase::Unanswered => {
            if !session.options.iter().any(|option| option == text) {
                bot.send_message(msg.chat.id, "ボタンから下の句を選んでください")
                    .await?;
                return Ok(());
            }

            if session.submit_answer(text)? {
                bot.send_message(msg.chat.id, "正解！ 🎉").await?;
            } else {
                let answer = session.correct_answer.clone().unwrap_or_default();
                bot.send_message(
                    msg.chat.id,
                    format!("不正解... 正解は「{}」でした。", answer),
                )
                .await?;
            }

            bot.send_message(msg.chat.id, poem_detail(&poems, &session))
                .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(
                    NEXT_QUESTION,
                )]]))
                .await?;

            dialogue.update(State::Quiz { session }).await?;
        }
        Phase::Answered => {
            if text != NEXT_QUESTION {
                bot.send_message(msg.chat.id, format!("「{}」を押してください", NEXT_QUESTION))
                    .await?;
                return Ok(());
            }

            session.advance()?;
            if session.is_complete() {
                let score_text = format!(
                    "クイズ終了！\nあなたのスコア: {} / {} 点",
                    session.score,
                    session.total_questions()
                );
                bot.send_message(msg.chat.id, score_text)
                    .reply_markup(KeyboardMarkup::new(vec![vec![
                        KeyboardButton::new(RETRY),
                        KeyboardButton::new(CHANGE_MODE),
                    ]]))
                    .await?;

                dialogue.update(State::Finished { session }).await?;
            } else {
                send_question(&poems, &bot, msg.chat.id, &mut session).await?;
                dialogue.update(State::Quiz { session }).await?;
            }
        }
    }
    Ok(())
}

async fn finished(
    poems: Arc<Poems>,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(RETRY) => {
            session.reinitialize(&poems)?;
            send_question(&poems, &bot, msg.chat.id, &mut session).await?;
            dialogue.update(State::Quiz { session }).await?;
        }
        Some(CHANGE_MODE) => {
            bot.send_message(msg.chat.id, CHOOSE_MODE_TEXT)
                .reply_markup(mode_keyboard())
                .await?;
            dialogue.update(State::ReceiveMode).await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "ボタンから選んでください")
                .await?;
        }
    }
    Ok(())
}

async fn send_question(
    poems: &Poems,
    bot: &Bot,
    chat_id: ChatId,
    session: &mut QuizSession,
) -> HandlerResult {
    session.ensure_options(poems)?;

    let question = match session.view(poems) {
        SessionView::Question(question) => question,
        SessionView::Complete { .. } => return Ok(()),
    };

    let question_text = format!(
        "第 {} 問\n上の句: 「{}」\n\n下の句を選んでください",
        question.number, question.upper
    );
    let keyboard = KeyboardMarkup::new(
        question
            .options
            .iter()
            .map(|option| vec![KeyboardButton::new(option.clone())])
            .collect::<Vec<_>>(),
    );

    bot.send_message(chat_id, question_text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// The answered poem in full: both halves, readings, poet and commentary.
fn poem_detail(poems: &Poems, session: &QuizSession) -> String {
    let poem = session
        .current_id()
        .and_then(|id| poems.by_id(id))
        .expect("a question is live whenever an answer was just submitted");

    format!(
        "{}　{}\n（{}　{}）\n――――――\n【詠み手】: {}\n\n{}",
        poem.upper,
        poem.lower,
        poem.reading_upper,
        poem.reading_lower,
        poem.author,
        poem.formatted_description()
    )
}
