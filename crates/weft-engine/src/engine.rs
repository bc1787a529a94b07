//! The synchronous invocation engine.
//!
//! `invoke` runs an invokable inside a root frame; every nested call made
//! through the frame is journaled as a child node in completion order.
//! Replay seeds the root frame's cursor with a recorded invocation and
//! re-enters execution, consuming recorded children where the call
//! sequence matches.

use std::collections::VecDeque;

use weft_resource::{FieldValue, Ref, ResourceValue, TypeId};
use weft_store::Store;

use crate::error::EngineError;
use crate::invokable::{ensure_builtins, instantiate, is_async, Invokable, RequestInput};
use crate::raised::{ExceptionOverride, Raised, RaisedKind};
use crate::records::{Invocation, Request, Response};

/// Shared bookkeeping for one executing node: the replay cursor over
/// recorded children and the completed children of the new run.
pub(crate) struct FrameCore<'a> {
    store: &'a Store,
    overrides: Option<&'a ExceptionOverride>,
    cursor: VecDeque<Invocation>,
    children: Vec<Ref>,
}

/// Execution context handed to [`Invokable::call`]. Nested invokable calls
/// go through [`Frame::call`] so the engine can journal them.
pub struct Frame<'a> {
    core: FrameCore<'a>,
    invokable_ref: Ref,
    input_ref: Option<Ref>,
    output_type: Option<TypeId>,
}

impl<'a> Frame<'a> {
    pub fn store(&self) -> &Store {
        self.core.store
    }

    /// Reference to the invokable currently executing in this frame.
    pub fn invokable_ref(&self) -> &Ref {
        &self.invokable_ref
    }

    /// Reference to this frame's input, when there is one.
    pub fn input_ref(&self) -> Option<&Ref> {
        self.input_ref.as_ref()
    }

    /// Calls a nested invokable, journaling it as a child of this frame.
    pub fn call(
        &mut self,
        invokable: &dyn Invokable,
        input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        child_call(&mut self.core, invokable, input)
    }

    /// Requests external input, suspending the invocation.
    ///
    /// When no type is given the current invokable's declared output type
    /// is requested; with neither, the request fails. The suspension is
    /// journaled as a [`RequestInput`] child node so a replay override can
    /// later substitute the answer.
    pub fn request_input(
        &mut self,
        requested_type: Option<TypeId>,
        for_resource: Option<ResourceValue>,
        context: FieldValue,
    ) -> Result<ResourceValue, Raised> {
        let requested = match requested_type.or_else(|| self.output_type.clone()) {
            Some(t) => t,
            None => return Err(Raised::engine(EngineError::RequestedTypeUndetermined)),
        };
        self.call(
            &RequestInput {
                requested_type: requested,
                context,
            },
            for_resource,
        )
    }
}

/// Journaled execution of an invokable.
///
/// Suspensions and user errors come back inside the invocation (see
/// [`Invocation::outcome`]); only engine faults are returned as `Err`.
pub fn invoke(
    store: &Store,
    invokable: &dyn Invokable,
    input: Option<&Ref>,
) -> Result<Invocation, EngineError> {
    drive(store, invokable, input, None, None)
}

/// Re-executes a recorded invocation; see [`Invocation::replay`].
pub(crate) fn replay(
    store: &Store,
    from: &Invocation,
    overrides: Option<&ExceptionOverride>,
) -> Result<Invocation, EngineError> {
    ensure_builtins()?;
    let request: Request = store.checkout(&from.request)?;
    if is_async(request.invokable.type_id()) {
        return Err(EngineError::WrongEngine(
            "cannot replay an async invocation synchronously; use replay_async".into(),
        ));
    }
    let invokable = instantiate(store, &request.invokable)?;
    drive(
        store,
        invokable.as_ref(),
        request.input.as_ref(),
        Some(from.clone()),
        overrides,
    )
}

fn drive(
    store: &Store,
    invokable: &dyn Invokable,
    input: Option<&Ref>,
    replay_from: Option<Invocation>,
    overrides: Option<&ExceptionOverride>,
) -> Result<Invocation, EngineError> {
    ensure_builtins()?;
    let input_value = match input {
        Some(r) => Some(store.checkout_value(r)?),
        None => None,
    };
    // The top level acts as a pseudo-parent with the recorded root (if
    // any) as its single replayable child.
    let mut top = FrameCore {
        store,
        overrides,
        cursor: replay_from.into_iter().collect(),
        children: Vec::new(),
    };
    let result = child_call(&mut top, invokable, input_value);
    let root = top.children.pop();
    match result {
        Ok(_) => {}
        Err(raised) => {
            if let RaisedKind::Engine(error) = raised.into_kind() {
                return Err(error);
            }
        }
    }
    let root = root.ok_or(EngineError::NotExecuted)?;
    Ok(store.checkout(&root)?)
}

pub(crate) fn check_input_type(
    expected: Option<TypeId>,
    input: Option<&ResourceValue>,
) -> Result<(), EngineError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match input {
        Some(value) if value.type_id() == &expected => Ok(()),
        Some(value) => Err(EngineError::InvokableType(format!(
            "input '{}' does not match declared input type '{}'",
            value.type_id().name(),
            expected.name()
        ))),
        None => Err(EngineError::InvokableType(format!(
            "input of type '{}' required",
            expected.name()
        ))),
    }
}

pub(crate) fn check_output_type(
    expected: Option<TypeId>,
    output: &ResourceValue,
) -> Result<(), EngineError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    if output.type_id() == &expected {
        return Ok(());
    }
    Err(EngineError::InvokableType(format!(
        "output '{}' does not match declared output type '{}'",
        output.type_id().name(),
        expected.name()
    )))
}

pub(crate) fn describe_request(store: &Store, r: &Ref) -> String {
    match store.checkout::<Request>(r) {
        Ok(request) => format!(
            "invokable {} on input {}",
            request.invokable.digest(),
            request
                .input
                .map(|i| i.digest().to_hex())
                .unwrap_or_else(|| "none".into())
        ),
        Err(_) => format!("request {}", r.digest()),
    }
}

fn child_call(
    parent: &mut FrameCore<'_>,
    invokable: &dyn Invokable,
    input: Option<ResourceValue>,
) -> Result<ResourceValue, Raised> {
    let store = parent.store;
    let invokable_ref = store.commit_value(&invokable.to_resource()?)?;
    check_input_type(invokable.input_type(), input.as_ref()).map_err(Raised::engine)?;
    let input_ref = match &input {
        Some(value) => Some(store.commit_value(value)?),
        None => None,
    };
    let request_ref = store.commit(&Request {
        invokable: invokable_ref.clone(),
        input: input_ref.clone(),
    })?;

    if let Some(recorded) = parent.cursor.front() {
        if recorded.request == request_ref {
            let recorded = parent.cursor.pop_front().expect("cursor head exists");
            return consume_recorded(
                parent,
                invokable,
                recorded,
                request_ref,
                invokable_ref,
                input_ref,
                input,
            );
        }
        // Divergence: the re-executed call sequence is required to be a
        // pure function of the input and prior child outputs.
        let error = EngineError::Replay {
            expected: describe_request(store, &recorded.request),
            got: describe_request(store, &request_ref),
        };
        log::debug!("{error}");
        let raised = Raised::engine(error);
        record_node(parent, request_ref, invokable_ref, Vec::new(), None, Some(&raised))?;
        return Err(raised.propagated());
    }

    run_body(
        parent,
        invokable,
        request_ref,
        invokable_ref,
        input_ref,
        input,
        VecDeque::new(),
    )
}

fn consume_recorded(
    parent: &mut FrameCore<'_>,
    invokable: &dyn Invokable,
    recorded: Invocation,
    request_ref: Ref,
    invokable_ref: Ref,
    input_ref: Option<Ref>,
    input: Option<ResourceValue>,
) -> Result<ResourceValue, Raised> {
    let store = parent.store;
    let response = match recorded.response_record(store).map_err(Raised::engine)? {
        Some(response) => response,
        // Never executed: run it fresh.
        None => {
            return run_body(
                parent,
                invokable,
                request_ref,
                invokable_ref,
                input_ref,
                input,
                VecDeque::new(),
            )
        }
    };

    if let Some(output_ref) = &response.output {
        // Recorded success: reuse the node wholesale without running the body.
        let output = store.checkout_value(output_ref)?;
        let recorded_ref = store.commit(&recorded)?;
        log::trace!("replayed {} from journal", recorded_ref.digest());
        parent.children.push(recorded_ref);
        return Ok(output);
    }

    // Overrides apply only at the node where the error was raised.
    if response.raised_here {
        if let (Some(raised_ref), Some(overrides)) = (&response.raised, parent.overrides) {
            if let Some(value) = overrides(raised_ref) {
                check_output_type(invokable.output_type(), &value).map_err(Raised::engine)?;
                let output_ref = store.commit_value(&value)?;
                let new_response = Response {
                    invokable: invokable_ref,
                    output: Some(output_ref),
                    raised: None,
                    raised_here: false,
                    children: response.children.clone(),
                };
                let invocation = Invocation {
                    request: request_ref,
                    response: Some(store.commit(&new_response)?),
                };
                parent.children.push(store.commit(&invocation)?);
                return Ok(value);
            }
        }
    }

    // Recorded raise (or rewound node): re-execute the body, replaying the
    // recorded children.
    let cursor = response
        .children
        .iter()
        .map(|r| store.checkout(r))
        .collect::<Result<VecDeque<_>, _>>()?;
    run_body(
        parent,
        invokable,
        request_ref,
        invokable_ref,
        input_ref,
        input,
        cursor,
    )
}

fn run_body(
    parent: &mut FrameCore<'_>,
    invokable: &dyn Invokable,
    request_ref: Ref,
    invokable_ref: Ref,
    input_ref: Option<Ref>,
    input: Option<ResourceValue>,
    cursor: VecDeque<Invocation>,
) -> Result<ResourceValue, Raised> {
    let store = parent.store;
    let mut frame = Frame {
        core: FrameCore {
            store,
            overrides: parent.overrides,
            cursor,
            children: Vec::new(),
        },
        invokable_ref: invokable_ref.clone(),
        input_ref,
        output_type: invokable.output_type(),
    };
    let result = invokable.call(&mut frame, input).and_then(|output| {
        check_output_type(invokable.output_type(), &output).map_err(Raised::engine)?;
        Ok(output)
    });
    let children = frame.core.children;
    match result {
        Ok(output) => {
            let output_ref = store.commit_value(&output)?;
            record_node(
                parent,
                request_ref,
                invokable_ref,
                children,
                Some(output_ref),
                None,
            )?;
            Ok(output)
        }
        Err(raised) => {
            record_node(parent, request_ref, invokable_ref, children, None, Some(&raised))?;
            Err(raised.propagated())
        }
    }
}

/// Commits a response and invocation for a finished call and appends the
/// invocation to the parent's children.
fn record_node(
    parent: &mut FrameCore<'_>,
    request_ref: Ref,
    invokable_ref: Ref,
    children: Vec<Ref>,
    output: Option<Ref>,
    raised: Option<&Raised>,
) -> Result<(), Raised> {
    let store = parent.store;
    let (raised_ref, raised_here) = match raised {
        Some(r) => (Some(store.commit_value(&r.to_resource()?)?), !r.from_child()),
        None => (None, false),
    };
    let response = Response {
        invokable: invokable_ref,
        output,
        raised: raised_ref,
        raised_here,
        children,
    };
    let invocation = Invocation {
        request: request_ref,
        response: Some(store.commit(&response)?),
    };
    parent.children.push(store.commit(&invocation)?);
    Ok(())
}
