//! The single-session state machine behind every host.
//!
//! Input is classified into a [`Command`], fed through the pure
//! [`transition`] function, and the resulting [`Step`] is executed by
//! [`SessionController`] against its store and model.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::SessionConfig;
use crate::error::{DiaristError, Result};
use crate::llm::TextGenerator;
use crate::model::{Reflection, Session};
use crate::parse;
use crate::prompt;
use crate::storage::SessionStore;

pub const WELCOME_MESSAGE: &str = "Today's record: every line is a small spark of life.";
pub const ACKNOWLEDGEMENT: &str = "Got it.";
/// Returned when a session is ended before anything was written.
pub const NO_CONTENT: &str = "NO_CONTENT";
pub const BLANK_INPUT_MESSAGE: &str = "Please enter some content.";

pub const STATUS_IDLE: &str = "No active diary session";
pub const STATUS_CLOSED: &str = "Diary session closed";

const REPORT_TITLE: &str = "Today's Diary Summary";
const DIARY_HEADING: &str = "Full Diary:";
const SUMMARY_HEADING: &str = "Five-Point Summary:";
const INSIGHTS_HEADING: &str = "Insights & Suggestions:";

/// What the user asked for, decided by exact match on the reserved phrases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    End,
    Content(String),
    Blank,
}

impl Command {
    /// Classify raw input. Surrounding whitespace is ignored; the phrase match
    /// is otherwise exact.
    pub fn classify(input: &str, phrases: &SessionConfig) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            Self::Blank
        } else if trimmed == phrases.start_phrase {
            Self::Start
        } else if trimmed == phrases.end_phrase {
            Self::End
        } else {
            Self::Content(trimmed.to_string())
        }
    }
}

/// Lifecycle of the one in-memory session.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Idle,
    Active(Session),
    /// The last session was summarized and handed to the store.
    Closed,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Active(session) => Some(session),
            _ => None,
        }
    }
}

/// Side effect the controller must run after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing left to do; answer with this kind.
    Reply(ReplyKind),
    /// An entry was appended to the active session; snapshot it.
    Persist,
    /// The session is ready for the model. The caller picks the next state
    /// from the outcome.
    Summarize(Session),
}

/// Machine-readable category of a reply. `Recorded` and `Ignored` share the
/// same text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Welcome,
    AlreadyStarted,
    Recorded,
    Ignored,
    NoContent,
    Report,
    NoActiveSession,
    Failed,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub kind: ReplyKind,
}

impl Reply {
    fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Pure state transition. Never touches the store or the model.
pub fn transition(
    state: SessionState,
    command: Command,
    now: DateTime<Local>,
) -> (SessionState, Step) {
    match (state, command) {
        (state, Command::Blank) => (state, Step::Reply(ReplyKind::Blank)),

        (SessionState::Active(session), Command::Start) => (
            SessionState::Active(session),
            Step::Reply(ReplyKind::AlreadyStarted),
        ),
        (_, Command::Start) => (
            SessionState::Active(Session::start(now)),
            Step::Reply(ReplyKind::Welcome),
        ),

        (SessionState::Active(mut session), Command::Content(text)) => {
            match session.push_entry(text, now) {
                Ok(()) => (SessionState::Active(session), Step::Persist),
                Err(_) => (SessionState::Idle, Step::Reply(ReplyKind::Ignored)),
            }
        }
        (state, Command::Content(_)) => (state, Step::Reply(ReplyKind::Ignored)),

        (SessionState::Active(mut session), Command::End) if session.entry_count() == 0 => {
            session.close(now);
            (SessionState::Idle, Step::Reply(ReplyKind::NoContent))
        }
        (SessionState::Active(session), Command::End) => {
            (SessionState::Idle, Step::Summarize(session))
        }
        (state, Command::End) => (state, Step::Reply(ReplyKind::NoActiveSession)),
    }
}

/// Drives one journaling session at a time against a store and a model.
pub struct SessionController<S, M> {
    store: S,
    model: M,
    phrases: SessionConfig,
    state: SessionState,
}

impl<S: SessionStore, M: TextGenerator> SessionController<S, M> {
    pub fn new(store: S, model: M, phrases: SessionConfig) -> Self {
        Self {
            store,
            model,
            phrases,
            state: SessionState::Idle,
        }
    }

    pub fn phrases(&self) -> &SessionConfig {
        &self.phrases
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The session currently accepting entries, if any.
    pub fn current_session(&self) -> Option<&Session> {
        self.state.session()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle one line of user input using the current local time.
    pub async fn handle(&mut self, input: &str) -> Reply {
        self.handle_at(input, Local::now()).await
    }

    /// Handle one line of user input as if it arrived at `now`.
    pub async fn handle_at(&mut self, input: &str, now: DateTime<Local>) -> Reply {
        let command = Command::classify(input, &self.phrases);
        let state = std::mem::take(&mut self.state);
        let (next, step) = transition(state, command, now);
        self.state = next;

        match step {
            Step::Reply(kind) => {
                if kind == ReplyKind::Welcome {
                    tracing::info!(date = %now.date_naive(), "diary session started");
                }
                if kind == ReplyKind::NoContent {
                    tracing::info!("diary session ended without entries");
                }
                Reply::new(kind, self.text_for(kind))
            }
            Step::Persist => {
                self.persist_snapshot().await;
                Reply::new(ReplyKind::Recorded, ACKNOWLEDGEMENT)
            }
            Step::Summarize(session) => self.finish(session, now).await,
        }
    }

    /// Human-readable state, e.g. `Diary in progress, 3 entries recorded`.
    pub fn status(&self) -> String {
        match &self.state {
            SessionState::Idle => STATUS_IDLE.to_string(),
            SessionState::Active(session) => format!(
                "Diary in progress, {} entries recorded",
                session.entry_count()
            ),
            SessionState::Closed => STATUS_CLOSED.to_string(),
        }
    }

    pub async fn is_model_available(&self) -> bool {
        self.model.is_available().await
    }

    /// Best effort: a failed snapshot is logged and otherwise ignored.
    async fn persist_snapshot(&self) {
        let Some(session) = self.state.session() else {
            return;
        };
        tracing::debug!(entries = session.entry_count(), "diary entry recorded");
        if let Err(e) = self.store.save(session).await {
            tracing::warn!(
                entries = session.entry_count(),
                "failed to persist diary snapshot: {e}"
            );
        }
    }

    /// Summarize, close and persist. Any model error force-closes the session
    /// and drops it.
    async fn finish(&mut self, mut session: Session, now: DateTime<Local>) -> Reply {
        tracing::info!(
            entries = session.entry_count(),
            "ending diary session, calling the model"
        );

        let reflection = match self.summarize(&session).await {
            Ok(reflection) => reflection,
            Err(e) => {
                if e.is_model_failure() {
                    tracing::warn!("model call failed, discarding the session: {e}");
                } else {
                    tracing::error!("failed to process the diary: {e}");
                }
                session.close(now);
                self.state = SessionState::Idle;
                return Reply::new(ReplyKind::Failed, failure_message(&e));
            }
        };

        if let Err(e) = session.complete(reflection.clone(), now) {
            self.state = SessionState::Idle;
            return Reply::new(ReplyKind::Failed, failure_message(&e));
        }
        self.state = SessionState::Closed;

        let report = format_report(&reflection);
        match self.store.save(&session).await {
            Ok(()) => {
                tracing::info!(date = %session.date(), "diary session closed and saved");
                Reply::new(ReplyKind::Report, report)
            }
            Err(e) => {
                tracing::error!(date = %session.date(), "failed to save closed diary: {e}");
                Reply::new(
                    ReplyKind::Report,
                    format!("{report}\n\nWarning: the diary could not be saved ({e})"),
                )
            }
        }
    }

    async fn summarize(&self, session: &Session) -> Result<Reflection> {
        let prompt = prompt::build(&session.entry_contents())?;
        let raw = self.model.generate(&prompt).await?;
        Ok(parse::parse(&raw))
    }

    fn text_for(&self, kind: ReplyKind) -> String {
        match kind {
            ReplyKind::Welcome => WELCOME_MESSAGE.to_string(),
            ReplyKind::AlreadyStarted => format!(
                "Today's diary is already in progress. Keep writing, or say \"{}\" to finish.",
                self.phrases.end_phrase
            ),
            ReplyKind::Recorded | ReplyKind::Ignored => ACKNOWLEDGEMENT.to_string(),
            ReplyKind::NoContent => NO_CONTENT.to_string(),
            ReplyKind::NoActiveSession => format!(
                "There is no active diary session. Say \"{}\" first.",
                self.phrases.start_phrase
            ),
            ReplyKind::Blank => BLANK_INPUT_MESSAGE.to_string(),
            // Only produced by `finish`, which builds its own text.
            ReplyKind::Report | ReplyKind::Failed => String::new(),
        }
    }
}

fn failure_message(err: &DiaristError) -> String {
    format!("Failed to process the diary: {err}")
}

/// Render the three sections for display.
pub fn format_report(reflection: &Reflection) -> String {
    format!(
        "{REPORT_TITLE}\n\n{DIARY_HEADING}\n{}\n\n{SUMMARY_HEADING}\n{}\n\n{INSIGHTS_HEADING}\n{}",
        reflection.diary, reflection.summary, reflection.insights
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::prompt::{section_marker, DIARY_SECTION, INSIGHTS_SECTION, SUMMARY_SECTION};

    // -- Stubs --

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<Session>>,
    }

    impl MemoryStore {
        fn saves(&self) -> Vec<Session> {
            self.saved.lock().unwrap().clone()
        }
    }

    impl SessionStore for MemoryStore {
        async fn save(&self, session: &Session) -> Result<()> {
            self.saved.lock().unwrap().push(session.clone());
            Ok(())
        }

        async fn load(&self, date: NaiveDate) -> Result<Option<Session>> {
            Ok(self
                .saved
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|s| s.date() == date)
                .cloned())
        }

        async fn exists(&self, date: NaiveDate) -> Result<bool> {
            Ok(self.load(date).await?.is_some())
        }

        async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
            let mut dates: Vec<_> = self.saves().iter().map(|s| s.date()).collect();
            dates.sort();
            dates.dedup();
            Ok(dates)
        }
    }

    struct BrokenStore;

    impl SessionStore for BrokenStore {
        async fn save(&self, _session: &Session) -> Result<()> {
            Err(DiaristError::Persistence("disk full".into()))
        }

        async fn load(&self, _date: NaiveDate) -> Result<Option<Session>> {
            Err(DiaristError::Persistence("disk full".into()))
        }

        async fn exists(&self, _date: NaiveDate) -> Result<bool> {
            Err(DiaristError::Persistence("disk full".into()))
        }

        async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
            Err(DiaristError::Persistence("disk full".into()))
        }
    }

    /// Echoes every prompt line that looks like a numbered entry into the
    /// diary section of a well-formed reply.
    #[derive(Default)]
    struct EchoModel {
        calls: AtomicUsize,
    }

    impl TextGenerator for EchoModel {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let echoed: Vec<&str> = prompt
                .lines()
                .skip_while(|l| !l.starts_with("Here are all of my raw records"))
                .skip(1)
                .take_while(|l| !l.is_empty())
                .collect();
            Ok(format!(
                "{}\n{}\n\n{}\n1. A good day\n\n{}\nKeep going.\n",
                section_marker(DIARY_SECTION),
                echoed.join("\n"),
                section_marker(SUMMARY_SECTION),
                section_marker(INSIGHTS_SECTION),
            ))
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    struct DownModel;

    impl TextGenerator for DownModel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(DiaristError::ServiceUnavailable("connection refused".into()))
        }

        async fn is_available(&self) -> bool {
            false
        }
    }

    fn at(hour: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 12, 14, hour, 0, 0)
            .single()
            .unwrap()
    }

    fn controller() -> SessionController<Arc<MemoryStore>, EchoModel> {
        SessionController::new(
            Arc::new(MemoryStore::default()),
            EchoModel::default(),
            SessionConfig::default(),
        )
    }

    const START: &str = "start diary";
    const END: &str = "let's end today's diary";

    // -- Classification --

    #[test]
    fn test_classify_reserved_phrases() {
        let phrases = SessionConfig::default();
        assert_eq!(Command::classify("  start diary \n", &phrases), Command::Start);
        assert_eq!(Command::classify(END, &phrases), Command::End);
        assert_eq!(Command::classify("   ", &phrases), Command::Blank);
        assert_eq!(
            Command::classify("Start Diary", &phrases),
            Command::Content("Start Diary".into())
        );
        assert_eq!(
            Command::classify(" had tea ", &phrases),
            Command::Content("had tea".into())
        );
    }

    #[test]
    fn test_classify_custom_phrases() {
        let phrases = SessionConfig {
            start_phrase: "good morning".into(),
            end_phrase: "good night".into(),
        };
        assert_eq!(Command::classify("good morning", &phrases), Command::Start);
        assert_eq!(
            Command::classify(START, &phrases),
            Command::Content(START.into())
        );
    }

    // -- Pure transitions --

    #[test]
    fn test_transition_start_from_idle_and_closed() {
        for state in [SessionState::Idle, SessionState::Closed] {
            let (next, step) = transition(state, Command::Start, at(8));
            assert!(next.is_active());
            assert_eq!(step, Step::Reply(ReplyKind::Welcome));
            assert_eq!(next.session().unwrap().start_time(), at(8));
        }
    }

    #[test]
    fn test_transition_content_while_idle_is_ignored() {
        let (next, step) = transition(SessionState::Idle, Command::Content("x".into()), at(8));
        assert_eq!(next, SessionState::Idle);
        assert_eq!(step, Step::Reply(ReplyKind::Ignored));
    }

    #[test]
    fn test_transition_end_with_entries_summarizes() {
        let (state, _) = transition(SessionState::Idle, Command::Start, at(8));
        let (state, step) = transition(state, Command::Content("a".into()), at(9));
        assert_eq!(step, Step::Persist);

        let (next, step) = transition(state, Command::End, at(22));
        assert_eq!(next, SessionState::Idle);
        match step {
            Step::Summarize(session) => {
                assert!(session.is_active());
                assert_eq!(session.entry_contents(), vec!["a"]);
            }
            other => panic!("expected Summarize, got {other:?}"),
        }
    }

    #[test]
    fn test_transition_end_while_closed_is_noop() {
        let (next, step) = transition(SessionState::Closed, Command::End, at(8));
        assert_eq!(next, SessionState::Closed);
        assert_eq!(step, Step::Reply(ReplyKind::NoActiveSession));
    }

    // -- Controller scenarios --

    #[tokio::test]
    async fn test_full_day_produces_report() {
        let mut c = controller();

        assert_eq!(c.handle_at(START, at(8)).await.text, WELCOME_MESSAGE);
        let r = c.handle_at("walked to the market", at(9)).await;
        assert_eq!(r, Reply::new(ReplyKind::Recorded, ACKNOWLEDGEMENT));
        c.handle_at("called grandma", at(18)).await;
        assert_eq!(c.status(), "Diary in progress, 2 entries recorded");

        let report = c.handle_at(END, at(22)).await;
        assert_eq!(report.kind, ReplyKind::Report);
        assert!(report.text.starts_with(REPORT_TITLE));
        assert!(report.text.contains("1. walked to the market"));
        assert!(report.text.contains("2. called grandma"));
        assert!(report.text.contains("Five-Point Summary:\n1. A good day"));
        assert!(report.text.contains("Insights & Suggestions:\nKeep going."));

        assert_eq!(c.state(), &SessionState::Closed);
        assert_eq!(c.status(), STATUS_CLOSED);
        assert!(c.current_session().is_none());

        // Two snapshots plus the closed session.
        let saves = c.store().saves();
        assert_eq!(saves.len(), 3);
        let last = saves.last().unwrap();
        assert!(!last.is_active());
        assert_eq!(last.end_time(), Some(at(22)));
        let reflection = last.reflection().unwrap();
        assert!(reflection.diary.contains("called grandma"));
        assert_eq!(reflection.summary, "1. A good day");
    }

    #[tokio::test]
    async fn test_end_without_entries_returns_sentinel() {
        let mut c = controller();
        c.handle_at(START, at(8)).await;

        let r = c.handle_at(END, at(9)).await;
        assert_eq!(r, Reply::new(ReplyKind::NoContent, NO_CONTENT));
        assert_eq!(c.state(), &SessionState::Idle);
        assert_eq!(c.model.calls.load(Ordering::SeqCst), 0);
        assert!(c.store().saves().is_empty());
    }

    #[tokio::test]
    async fn test_stray_content_is_acknowledged_without_session() {
        let mut c = controller();
        let r = c.handle_at("just thinking out loud", at(8)).await;
        assert_eq!(r, Reply::new(ReplyKind::Ignored, ACKNOWLEDGEMENT));
        assert!(c.current_session().is_none());
        assert_eq!(c.status(), STATUS_IDLE);
        assert!(c.store().saves().is_empty());
    }

    #[tokio::test]
    async fn test_double_start_keeps_entries() {
        let mut c = controller();
        c.handle_at(START, at(8)).await;
        c.handle_at("first", at(9)).await;

        let r = c.handle_at(START, at(10)).await;
        assert_eq!(r.kind, ReplyKind::AlreadyStarted);
        assert!(r.text.contains(END));
        let session = c.current_session().unwrap();
        assert_eq!(session.entry_contents(), vec!["first"]);
        assert_eq!(session.start_time(), at(8));
    }

    #[tokio::test]
    async fn test_end_without_session() {
        let mut c = controller();
        let r = c.handle_at(END, at(8)).await;
        assert_eq!(r.kind, ReplyKind::NoActiveSession);
        assert!(r.text.contains(START));
    }

    #[tokio::test]
    async fn test_blank_input_changes_nothing() {
        let mut c = controller();
        c.handle_at(START, at(8)).await;
        let r = c.handle_at("  \t ", at(9)).await;
        assert_eq!(r, Reply::new(ReplyKind::Blank, BLANK_INPUT_MESSAGE));
        assert_eq!(c.current_session().unwrap().entry_count(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_still_acknowledges() {
        let mut c = SessionController::new(BrokenStore, EchoModel::default(), SessionConfig::default());
        c.handle_at(START, at(8)).await;

        let r = c.handle_at("A", at(9)).await;
        assert_eq!(r, Reply::new(ReplyKind::Recorded, ACKNOWLEDGEMENT));
        assert_eq!(c.current_session().unwrap().entry_contents(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_close_save_failure_still_returns_report() {
        let mut c = SessionController::new(BrokenStore, EchoModel::default(), SessionConfig::default());
        c.handle_at(START, at(8)).await;
        c.handle_at("A", at(9)).await;

        let r = c.handle_at(END, at(22)).await;
        assert_eq!(r.kind, ReplyKind::Report);
        assert!(r.text.contains("1. A"));
        assert!(r.text.contains("Warning: the diary could not be saved"));
        assert_eq!(c.state(), &SessionState::Closed);
    }

    #[tokio::test]
    async fn test_model_failure_discards_session() {
        let store = Arc::new(MemoryStore::default());
        let mut c = SessionController::new(Arc::clone(&store), DownModel, SessionConfig::default());
        c.handle_at(START, at(8)).await;
        c.handle_at("A", at(9)).await;

        let r = c.handle_at(END, at(22)).await;
        assert_eq!(r.kind, ReplyKind::Failed);
        assert!(r.text.starts_with("Failed to process the diary: "));
        assert!(r.text.contains("connection refused"));
        assert_eq!(c.state(), &SessionState::Idle);

        // Only the per-entry snapshot survives.
        let saves = store.saves();
        assert_eq!(saves.len(), 1);
        assert!(saves[0].is_active());
        assert!(!c.is_model_available().await);
    }

    #[tokio::test]
    async fn test_new_session_after_close() {
        let mut c = controller();
        c.handle_at(START, at(8)).await;
        c.handle_at("A", at(9)).await;
        c.handle_at(END, at(10)).await;

        assert_eq!(c.handle_at(START, at(11)).await.kind, ReplyKind::Welcome);
        assert_eq!(c.current_session().unwrap().entry_count(), 0);
    }

    #[test]
    fn test_format_report_layout() {
        let text = format_report(&Reflection {
            diary: "d".into(),
            summary: "s".into(),
            insights: "i".into(),
        });
        assert_eq!(
            text,
            "Today's Diary Summary\n\nFull Diary:\nd\n\nFive-Point Summary:\ns\n\nInsights & Suggestions:\ni"
        );
    }
}
