//! Iterator-style driver that replays an invocation up to each input
//! request and resumes once an answer is supplied.

use weft_resource::{Ref, ResourceValue};
use weft_store::Store;

use crate::error::EngineError;
use crate::invokable::Invokable;
use crate::records::{InputRequest, Invocation, Outcome};

enum GenState {
    NotStarted {
        invokable: Box<dyn Invokable>,
        input: Option<Ref>,
    },
    FromInvocation {
        invocation: Invocation,
    },
    Waiting {
        request: InputRequest,
        request_ref: Ref,
    },
    Done,
}

/// Drives a replay loop that yields at every [`InputRequest`].
///
/// Synchronous invokables only; async invocations have no generator
/// surface.
pub struct InvocationGenerator {
    store: Store,
    state: GenState,
    invocation: Option<Invocation>,
    pending_answer: Option<ResourceValue>,
}

impl InvocationGenerator {
    pub fn new(store: &Store, invokable: Box<dyn Invokable>, input: Option<Ref>) -> Self {
        InvocationGenerator {
            store: store.clone(),
            state: GenState::NotStarted { invokable, input },
            invocation: None,
            pending_answer: None,
        }
    }

    /// Resumes a previously journaled (possibly partial) invocation.
    pub fn from_invocation(store: &Store, invocation: Invocation) -> Self {
        InvocationGenerator {
            store: store.clone(),
            state: GenState::FromInvocation { invocation },
            invocation: None,
            pending_answer: None,
        }
    }

    /// The current (possibly partial) invocation.
    pub fn invocation(&self) -> Option<&Invocation> {
        self.invocation.as_ref()
    }

    /// The request currently awaiting an answer, if any.
    pub fn input_request(&self) -> Option<&InputRequest> {
        match &self.state {
            GenState::Waiting { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, GenState::Done)
    }

    /// Installs the answer for the pending request, consumed by the next
    /// call to [`InvocationGenerator::next_request`].
    pub fn set_input(&mut self, value: ResourceValue) -> Result<(), EngineError> {
        match &self.state {
            GenState::Waiting { request, .. } => {
                if value.type_id() != &request.requested_type {
                    return Err(EngineError::InvokableType(format!(
                        "input '{}' does not match requested type '{}'",
                        value.type_id().name(),
                        request.requested_type.name()
                    )));
                }
                self.pending_answer = Some(value);
                Ok(())
            }
            _ => Err(EngineError::NotExecuted),
        }
    }

    /// Runs to the next input request, or to completion (`Ok(None)`).
    ///
    /// Iterating while a request is pending without [`set_input`] fails
    /// with `InputRequired`.
    ///
    /// [`set_input`]: InvocationGenerator::set_input
    pub fn next_request(&mut self) -> Result<Option<InputRequest>, EngineError> {
        let state = std::mem::replace(&mut self.state, GenState::Done);
        let invocation = match state {
            GenState::Done => return Ok(None),
            GenState::NotStarted { invokable, input } => {
                crate::engine::invoke(&self.store, invokable.as_ref(), input.as_ref())?
            }
            GenState::FromInvocation { invocation } => invocation.replay(&self.store)?,
            GenState::Waiting {
                request,
                request_ref,
            } => match self.pending_answer.take() {
                None => {
                    self.state = GenState::Waiting {
                        request,
                        request_ref,
                    };
                    return Err(EngineError::InputRequired);
                }
                Some(answer) => {
                    let current = self.invocation.clone().ok_or(EngineError::NotExecuted)?;
                    let target = request_ref;
                    let overrides = move |r: &Ref| -> Option<ResourceValue> {
                        (*r == target).then(|| answer.clone())
                    };
                    current.replay_with(&self.store, &overrides)?
                }
            },
        };
        self.advance(invocation)
    }

    fn advance(&mut self, invocation: Invocation) -> Result<Option<InputRequest>, EngineError> {
        let outcome = invocation.outcome(&self.store)?;
        self.invocation = Some(invocation);
        match outcome {
            Outcome::Suspended(request) => {
                let request_ref = self.store.commit(&request)?;
                self.state = GenState::Waiting {
                    request: request.clone(),
                    request_ref,
                };
                Ok(Some(request))
            }
            Outcome::Completed(_) | Outcome::Failed(_) => {
                self.state = GenState::Done;
                Ok(None)
            }
        }
    }
}

impl Iterator for InvocationGenerator {
    type Item = Result<InputRequest, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_request() {
            Ok(Some(request)) => Some(Ok(request)),
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    }
}
