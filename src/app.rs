/// Driver: connects the session to the generator, the player and the terminal.
///
/// User commands arrive as lines on a channel; generation runs on the
/// blocking pool and its outcome comes back tagged with the request id, so
/// a result for anything but the outstanding request is dropped.

use crate::error::{GenerationError, SessionError};
use crate::generator::Generator;
use crate::playback::Player;
use crate::pulse::{CandidatePair, Preference, Side};
use crate::session::{GenerationRequest, RequestId, Session, Status};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const HELP: &str = "\
Commands:
  a / b      play option 1 / option 2
  1 / 2 / n  prefer option 1 / option 2 / neither
  f <text>   set feedback for the next round
  c          clear feedback
  r          retry after a failed generation
  s          show the current state
  h          this help
  q          quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(Side),
    Prefer(Preference),
    Feedback(String),
    ClearFeedback,
    Retry,
    Show,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let cmd = match word.to_ascii_lowercase().as_str() {
            "a" => Command::Play(Side::A),
            "b" => Command::Play(Side::B),
            "1" => Command::Prefer(Preference::OptionA),
            "2" => Command::Prefer(Preference::OptionB),
            "n" | "neither" => Command::Prefer(Preference::Neither),
            "f" | "feedback" => Command::Feedback(rest.to_string()),
            "c" | "clear" => Command::ClearFeedback,
            "r" | "retry" => Command::Retry,
            "s" | "show" => Command::Show,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            "" => return Err("Type h for help.".into()),
            other => return Err(format!("Unknown command '{other}'. Type h for help.")),
        };
        Ok(cmd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

struct Outcome {
    request: RequestId,
    result: Result<CandidatePair, GenerationError>,
}

pub struct App<G: Generator> {
    session: Session,
    player: Player,
    generator: Arc<G>,
    results_tx: mpsc::Sender<Outcome>,
    results_rx: mpsc::Receiver<Outcome>,
    in_flight: Option<JoinHandle<()>>,
}

impl<G: Generator> App<G> {
    pub fn new(session: Session, player: Player, generator: Arc<G>) -> Self {
        let (results_tx, results_rx) = mpsc::channel(4);
        Self {
            session,
            player,
            generator,
            results_tx,
            results_rx,
            in_flight: None,
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Main loop: returns on `q`, end of input, or when the session ends.
    pub async fn run(mut self, mut commands: mpsc::Receiver<String>) {
        println!("{HELP}\n");
        self.begin();

        loop {
            tokio::select! {
                line = commands.recv() => {
                    let Some(line) = line else {
                        log::info!("Input closed");
                        break;
                    };
                    match Command::parse(&line) {
                        Ok(cmd) => {
                            if self.execute(cmd) == Flow::Quit {
                                break;
                            }
                        }
                        Err(msg) => println!("{msg}"),
                    }
                }
                Some(outcome) = self.results_rx.recv() => {
                    self.apply(outcome);
                    println!("{}", self.screen());
                }
            }
        }
        self.shutdown();
    }

    /// Start the session and issue the first request.
    pub fn begin(&mut self) {
        let started = self.session.start();
        self.follow(started);
        println!("{}", self.screen());
    }

    /// Wait for the next generation outcome and apply it.
    /// Returns false if no request can ever resolve.
    #[cfg(test)]
    pub async fn pump(&mut self) -> bool {
        match self.results_rx.recv().await {
            Some(outcome) => {
                self.apply(outcome);
                true
            }
            None => false,
        }
    }

    pub fn execute(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::Play(side) => match self.session.current_pair() {
                Some(pair) => {
                    println!("Playing {side}: {}", pair.option(side));
                    self.player.play(pair.option(side));
                }
                None => println!("No pattern to play yet."),
            },
            Command::Prefer(choice) => {
                let feedback = self.session.pending_feedback().to_string();
                let submitted = self.session.submit_preference(choice, feedback);
                self.follow(submitted);
                if self.session.status() == Status::Terminated {
                    println!("{}", self.summary());
                    return Flow::Quit;
                }
                println!("{}", self.screen());
            }
            Command::Feedback(text) => {
                if let Err(e) = self.session.update_pending_feedback(text) {
                    println!("{e}");
                }
            }
            Command::ClearFeedback => {
                if let Err(e) = self.session.clear_pending_feedback() {
                    println!("{e}");
                }
            }
            Command::Retry => {
                let retried = self.session.retry();
                self.follow(retried);
                println!("{}", self.screen());
            }
            Command::Show => println!("{}", self.screen()),
            Command::Help => println!("{HELP}"),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Run the effect of a transition, or report why it was rejected.
    fn follow(&mut self, transition: Result<Option<GenerationRequest>, SessionError>) {
        match transition {
            Ok(Some(request)) => self.dispatch(request),
            Ok(None) => {}
            Err(e) => {
                log::debug!("Rejected: {e}");
                println!("{e}");
            }
        }
    }

    fn dispatch(&mut self, request: GenerationRequest) {
        let generator = Arc::clone(&self.generator);
        let tx = self.results_tx.clone();
        if let Some(previous) = self.in_flight.take() {
            previous.abort();
        }
        self.in_flight = Some(tokio::spawn(async move {
            let GenerationRequest { id, history, feedback } = request;
            let result = tokio::task::spawn_blocking(move || generator.generate(&history, &feedback))
                .await
                .unwrap_or_else(|e| Err(GenerationError::Transport(format!("generator task failed: {e}"))));
            // Receiver gone means the app is shutting down; nothing to report to.
            let _ = tx.send(Outcome { request: id, result }).await;
        }));
    }

    fn apply(&mut self, outcome: Outcome) {
        let Outcome { request, result } = outcome;
        let applied = match result {
            Ok(pair) => self.session.on_generation_succeeded(request, pair),
            Err(e) => self.session.on_generation_failed(request, e.to_string()),
        };
        match applied {
            Ok(_) => {}
            Err(e @ SessionError::StaleResult { .. }) => log::debug!("Discarding result: {e}"),
            Err(e) => log::warn!("Unexpected generation result: {e}"),
        }
    }

    /// Textual view of the current state.
    pub fn screen(&self) -> String {
        let s = &self.session;
        let body = match (s.status(), s.current_pair(), s.last_error()) {
            (Status::AwaitingChoice, Some(pair), _) => {
                format!("Which vibration do you prefer?\n{pair}")
            }
            (Status::Generating, _, Some(err)) => format!("Error: {err}\nType r to retry."),
            (Status::Generating, _, None) => "Loading...".to_string(),
            (Status::Terminated, _, _) => "Session complete.".to_string(),
            _ => "No result available".to_string(),
        };
        let feedback = if s.pending_feedback().is_empty() {
            String::new()
        } else {
            format!("\nFeedback: \"{}\"", s.pending_feedback())
        };
        format!("{body}{feedback}\n{}/{}", s.round_count(), s.max_rounds())
    }

    /// Round-by-round recap printed when the budget is used up.
    pub fn summary(&self) -> String {
        let history = self.session.history();
        let mut out = format!("Session complete after {} round(s):", history.len());
        for (i, round) in history.iter().enumerate() {
            out.push_str(&format!("\n  {:>2}. {}", i + 1, round.preferred()));
            if !round.feedback().is_empty() {
                out.push_str(&format!(" ({})", round.feedback()));
            }
        }
        match history.iter().rev().find_map(|r| r.chosen()) {
            Some(best) => out.push_str(&format!("\nLast preferred pattern: {best}")),
            None => out.push_str("\nNo pattern was preferred."),
        }
        out
    }

    fn shutdown(&mut self) {
        self.player.stop();
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        self.results_rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::tests::RecordingVibrator;
    use crate::pulse::{seq, Round};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Duration;

    /// Returns scripted results in order, then a default pair.
    struct ScriptedGenerator {
        calls: AtomicUsize,
        script: Mutex<VecDeque<Result<CandidatePair, GenerationError>>>,
        seen_feedback: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(script: Vec<Result<CandidatePair, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
                seen_feedback: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Generator for ScriptedGenerator {
        fn generate(&self, history: &[Round], feedback: &str) -> Result<CandidatePair, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_feedback.lock().unwrap().push(feedback.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(pair(history.len() as i64 + 1)))
        }
    }

    fn pair(n: i64) -> CandidatePair {
        CandidatePair::new(seq(&[100, 50], &[20, 0]), seq(&[n], &[0]))
    }

    fn app(max_rounds: usize, generator: Arc<ScriptedGenerator>) -> (App<ScriptedGenerator>, Arc<RecordingVibrator>) {
        let vib = RecordingVibrator::new();
        let player = Player::new(vib.clone());
        (App::new(Session::new(max_rounds), player, generator), vib)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("a"), Ok(Command::Play(Side::A)));
        assert_eq!(Command::parse(" B "), Ok(Command::Play(Side::B)));
        assert_eq!(Command::parse("1"), Ok(Command::Prefer(Preference::OptionA)));
        assert_eq!(Command::parse("n"), Ok(Command::Prefer(Preference::Neither)));
        assert_eq!(
            Command::parse("f   a bit  shorter "),
            Ok(Command::Feedback("a bit  shorter".into()))
        );
        assert_eq!(Command::parse("f"), Ok(Command::Feedback(String::new())));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
        assert!(Command::parse("").is_err());
        assert!(Command::parse("zap").unwrap_err().contains("zap"));
    }

    #[tokio::test]
    async fn full_session_requests_exactly_max_rounds() {
        let generator = ScriptedGenerator::new(vec![]);
        let (mut app, _) = app(10, generator.clone());
        app.begin();
        let mut flow = Flow::Continue;
        while flow == Flow::Continue {
            assert!(app.pump().await);
            assert_eq!(app.session().status(), Status::AwaitingChoice);
            flow = app.execute(Command::Prefer(Preference::OptionB));
        }
        assert_eq!(app.session().status(), Status::Terminated);
        assert_eq!(app.session().round_count(), 10);
        assert_eq!(generator.calls(), 10);
        assert!(app.summary().contains("Last preferred pattern: Vibrations: 10, Delays: 0"));
    }

    #[tokio::test]
    async fn failure_then_manual_retry() {
        let generator = ScriptedGenerator::new(vec![Err(GenerationError::EmptyResponse)]);
        let (mut app, _) = app(10, generator.clone());
        app.begin();
        app.pump().await;

        let s = app.session();
        assert_eq!(s.status(), Status::Generating);
        assert_eq!(s.round_count(), 0);
        assert!(s.history().is_empty());
        assert!(app.screen().contains("Error: API error or empty response"));

        // Preferences are rejected until a pair arrives.
        app.execute(Command::Prefer(Preference::OptionA));
        assert_eq!(app.session().round_count(), 0);

        app.execute(Command::Retry);
        app.pump().await;
        assert_eq!(app.session().status(), Status::AwaitingChoice);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn feedback_is_attached_and_forwarded() {
        let generator = ScriptedGenerator::new(vec![]);
        let (mut app, _) = app(10, generator.clone());
        app.begin();
        app.pump().await;

        app.execute(Command::Feedback("too long".into()));
        assert!(app.screen().contains("Feedback: \"too long\""));
        app.execute(Command::Prefer(Preference::OptionA));
        app.pump().await;

        let s = app.session();
        assert_eq!(s.history()[0].feedback(), "too long");
        assert_eq!(s.pending_feedback(), "");
        assert_eq!(
            *generator.seen_feedback.lock().unwrap(),
            vec![String::new(), "too long".to_string()]
        );
    }

    #[tokio::test]
    async fn cleared_feedback_is_not_attached() {
        let generator = ScriptedGenerator::new(vec![]);
        let (mut app, _) = app(10, generator);
        app.begin();
        app.pump().await;
        app.execute(Command::Feedback("draft".into()));
        app.execute(Command::ClearFeedback);
        app.execute(Command::Prefer(Preference::Neither));
        assert_eq!(app.session().history()[0].feedback(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn preview_plays_the_chosen_option() {
        let generator = ScriptedGenerator::new(vec![Ok(pair(70))]);
        let (mut app, vib) = app(10, generator);

        app.execute(Command::Play(Side::A));
        app.begin();
        app.pump().await;
        app.execute(Command::Play(Side::A));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let durations: Vec<u128> = vib.calls().iter().map(|&(_, d)| d).collect();
        assert_eq!(durations, vec![100, 50]);
    }

    #[tokio::test]
    async fn screen_shows_pair_and_progress() {
        let generator = ScriptedGenerator::new(vec![Ok(pair(30))]);
        let (mut app, _) = app(10, generator);
        app.begin();
        assert!(app.screen().starts_with("Loading..."));
        app.pump().await;
        assert_eq!(
            app.screen(),
            "Which vibration do you prefer?\n\
             Option 1: Vibrations: 100, 50, Delays: 20, 0\n\
             Option 2: Vibrations: 30, Delays: 0\n\
             0/10"
        );
    }
}
