//! Submission state of one search form.
//!
//! A form owns its builder and allows a single outstanding request. A failed search keeps the
//! authored query so the user can retry; it is reported separately from an empty result.
//! Every submission carries a ticket, and a completion whose ticket is not the outstanding one
//! (an abandoned or superseded request) is discarded on arrival.

use super::builder::QueryBuilder;
use super::errors::QueryError;
use super::types::{SearchRequest, DEFAULT_SEARCH_LIMIT};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitState {
    Idle,
    Pending,
    Failed(String),
    Loaded(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitError {
    AlreadyPending,
    Invalid(QueryError),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::AlreadyPending => write!(f, "A search is already in progress"),
            SubmitError::Invalid(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SubmitError {}

/// A request handed out by [`SearchForm::begin_submit`]
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub ticket: u64,
    pub request: SearchRequest,
}

#[derive(Debug, Clone)]
pub struct SearchForm {
    builder: QueryBuilder,
    state: SubmitState,
    next_ticket: u64,
    outstanding: Option<u64>,
    pub skip: i64,
    pub limit: i64,
}

impl Default for SearchForm {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchForm {
    pub fn new() -> Self {
        Self {
            builder: QueryBuilder::new(),
            state: SubmitState::Idle,
            next_ticket: 1,
            outstanding: None,
            skip: 0,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn state(&self) -> &SubmitState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == SubmitState::Pending
    }

    /// Replaces the builder with the result of a pure edit
    pub fn edit(&mut self, edit: impl FnOnce(&QueryBuilder) -> QueryBuilder) {
        self.builder = edit(&self.builder);
    }

    /// Canonicalizes the authored query and marks the form pending.
    /// Refused while an earlier request is still outstanding; an invalid query leaves the state as is.
    pub fn begin_submit(&mut self) -> Result<Submission, SubmitError> {
        if self.is_pending() {
            return Err(SubmitError::AlreadyPending);
        }
        let query = self.builder.canonicalize().map_err(SubmitError::Invalid)?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.outstanding = Some(ticket);
        self.state = SubmitState::Pending;
        Ok(Submission {
            ticket,
            request: SearchRequest::new(query, self.skip, self.limit),
        })
    }

    /// Gives up on the outstanding request. Its result is ignored when it arrives.
    pub fn abandon(&mut self) {
        if self.outstanding.take().is_some() {
            self.state = SubmitState::Idle;
        }
    }

    /// Records a successful response. Returns false when `ticket` is stale and nothing changed.
    pub fn finish_ok(&mut self, ticket: u64, result_count: usize) -> bool {
        self.settle(ticket, SubmitState::Loaded(result_count))
    }

    /// Records a failed request. Returns false when `ticket` is stale and nothing changed.
    pub fn finish_err(&mut self, ticket: u64, reason: impl Into<String>) -> bool {
        self.settle(ticket, SubmitState::Failed(reason.into()))
    }

    fn settle(&mut self, ticket: u64, state: SubmitState) -> bool {
        if self.outstanding != Some(ticket) {
            return false;
        }
        self.outstanding = None;
        self.state = state;
        true
    }
}
