/// Round-based preference session.
///
/// The session is a plain value driven by events. It never performs I/O:
/// a transition that needs new candidates returns a `GenerationRequest`
/// and the driver runs it and feeds the outcome back in.
///
///   Idle ──start──▶ Generating ──succeeded──▶ AwaitingChoice
///                    ▲   │ failed (retry)          │ submit
///                    │   ▼                         │
///                    └── Generating ◀──────────────┤ rounds < max
///                                   Terminated ◀───┘ rounds == max
///
/// Rejected events return an error and leave the session untouched.

use crate::error::SessionError;
use crate::pulse::{CandidatePair, Preference, Round};
use std::fmt;

/// Identifies one generation request. Results carrying any other id than
/// the outstanding one are stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Generating,
    AwaitingChoice,
    Terminated,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => f.write_str("idle"),
            Status::Generating => f.write_str("generating"),
            Status::AwaitingChoice => f.write_str("awaiting a choice"),
            Status::Terminated => f.write_str("terminated"),
        }
    }
}

/// Effect emitted by a transition: ask the generator for a new pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub id: RequestId,
    pub history: Vec<Round>,
    pub feedback: String,
}

#[derive(Debug, Clone)]
pub enum Event {
    Start,
    GenerationSucceeded { request: RequestId, pair: CandidatePair },
    GenerationFailed { request: RequestId, message: String },
    /// `feedback` is attached to the completed round and sent as the
    /// latest guidance with the next request.
    SubmitPreference { choice: Preference, feedback: String },
    UpdateFeedback(String),
    ClearFeedback,
    /// Reissue the last request after a failure.
    Retry,
}

#[derive(Debug)]
pub struct Session {
    max_rounds: usize,
    status: Status,
    history: Vec<Round>,
    current_pair: Option<CandidatePair>,
    pending_feedback: String,
    outstanding: Option<RequestId>,
    /// Feedback sent with the most recent request, reused on retry.
    request_feedback: String,
    last_error: Option<String>,
    next_request: u64,
}

impl Session {
    /// A budget of 0 rounds is raised to 1.
    pub fn new(max_rounds: usize) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
            status: Status::Idle,
            history: Vec::new(),
            current_pair: None,
            pending_feedback: String::new(),
            outstanding: None,
            request_feedback: String::new(),
            last_error: None,
            next_request: 0,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn history(&self) -> &[Round] {
        &self.history
    }

    pub fn round_count(&self) -> usize {
        self.history.len()
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn current_pair(&self) -> Option<&CandidatePair> {
        self.current_pair.as_ref()
    }

    pub fn pending_feedback(&self) -> &str {
        &self.pending_feedback
    }

    /// Diagnostic from the last failed generation, cleared on success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Request currently in flight, if any.
    #[cfg(test)]
    pub fn outstanding(&self) -> Option<RequestId> {
        self.outstanding
    }

    /// Apply one event.
    pub fn handle(&mut self, event: Event) -> Result<Option<GenerationRequest>, SessionError> {
        match event {
            Event::Start => {
                self.require(Status::Idle, "start")?;
                log::info!("Session started ({} rounds)", self.max_rounds);
                Ok(Some(self.issue_request(String::new())))
            }
            Event::GenerationSucceeded { request, pair } => {
                self.require(Status::Generating, "accept a generated pair")?;
                self.require_outstanding(request)?;
                log::info!("Request {request} succeeded");
                self.outstanding = None;
                self.last_error = None;
                self.current_pair = Some(pair);
                self.status = Status::AwaitingChoice;
                Ok(None)
            }
            Event::GenerationFailed { request, message } => {
                self.require(Status::Generating, "record a generation failure")?;
                self.require_outstanding(request)?;
                log::warn!("Request {request} failed: {message}");
                self.outstanding = None;
                self.last_error = Some(message);
                Ok(None)
            }
            Event::SubmitPreference { choice, feedback } => {
                self.require(Status::AwaitingChoice, "submit a preference")?;
                let Some(pair) = self.current_pair.take() else {
                    return Err(self.invalid("submit a preference"));
                };
                self.history.push(Round::new(pair, choice, feedback.clone()));
                self.pending_feedback.clear();
                log::info!(
                    "Round {}/{}: preferred {choice}",
                    self.history.len(),
                    self.max_rounds
                );

                if self.history.len() >= self.max_rounds {
                    log::info!("Round budget exhausted, session terminated");
                    self.status = Status::Terminated;
                    return Ok(None);
                }
                Ok(Some(self.issue_request(feedback)))
            }
            Event::UpdateFeedback(text) => {
                self.require_active("edit feedback")?;
                self.pending_feedback = text;
                Ok(None)
            }
            Event::ClearFeedback => {
                self.require_active("clear feedback")?;
                self.pending_feedback.clear();
                Ok(None)
            }
            Event::Retry => {
                self.require(Status::Generating, "retry")?;
                if self.outstanding.is_some() || self.last_error.is_none() {
                    return Err(self.invalid("retry"));
                }
                let feedback = self.request_feedback.clone();
                log::info!("Retrying generation");
                Ok(Some(self.issue_request(feedback)))
            }
        }
    }

    pub fn start(&mut self) -> Result<Option<GenerationRequest>, SessionError> {
        self.handle(Event::Start)
    }

    pub fn on_generation_succeeded(
        &mut self,
        request: RequestId,
        pair: CandidatePair,
    ) -> Result<Option<GenerationRequest>, SessionError> {
        self.handle(Event::GenerationSucceeded { request, pair })
    }

    pub fn on_generation_failed(
        &mut self,
        request: RequestId,
        message: impl Into<String>,
    ) -> Result<Option<GenerationRequest>, SessionError> {
        self.handle(Event::GenerationFailed { request, message: message.into() })
    }

    pub fn submit_preference(
        &mut self,
        choice: Preference,
        feedback: impl Into<String>,
    ) -> Result<Option<GenerationRequest>, SessionError> {
        self.handle(Event::SubmitPreference { choice, feedback: feedback.into() })
    }

    pub fn update_pending_feedback(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.handle(Event::UpdateFeedback(text.into())).map(|_| ())
    }

    pub fn clear_pending_feedback(&mut self) -> Result<(), SessionError> {
        self.handle(Event::ClearFeedback).map(|_| ())
    }

    pub fn retry(&mut self) -> Result<Option<GenerationRequest>, SessionError> {
        self.handle(Event::Retry)
    }

    fn issue_request(&mut self, feedback: String) -> GenerationRequest {
        self.next_request += 1;
        let id = RequestId(self.next_request);
        self.status = Status::Generating;
        self.outstanding = Some(id);
        self.last_error = None;
        self.request_feedback = feedback.clone();
        log::debug!("Issuing request {id} with {} round(s) of history", self.history.len());
        GenerationRequest {
            id,
            history: self.history.clone(),
            feedback,
        }
    }

    fn require(&self, status: Status, action: &'static str) -> Result<(), SessionError> {
        if self.status == status {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn require_active(&self, action: &'static str) -> Result<(), SessionError> {
        if self.status == Status::Terminated {
            Err(self.invalid(action))
        } else {
            Ok(())
        }
    }

    fn require_outstanding(&self, request: RequestId) -> Result<(), SessionError> {
        if self.outstanding == Some(request) {
            Ok(())
        } else {
            Err(SessionError::StaleResult {
                request,
                outstanding: self.outstanding,
            })
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            state: self.status,
            action,
        }
    }
}
