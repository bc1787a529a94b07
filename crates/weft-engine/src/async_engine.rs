//! The cooperative-async invocation engine.
//!
//! Same contract as the sync engine with two extra rules: children are
//! journaled in the order their `call` futures complete, and every child
//! started under a parent must finish before the parent's body returns.
//! The frame is cloneable so sibling calls can be awaited concurrently
//! (`futures::join!` and friends); the store is carried in the frame
//! rather than taken from the per-thread ambient stack, since tasks may
//! migrate across executor threads.

use std::sync::{Arc, Mutex};

use weft_resource::{Ref, ResourceValue};
use weft_store::Store;

use crate::engine::{check_input_type, check_output_type, describe_request};
use crate::error::EngineError;
use crate::invokable::{ensure_builtins, instantiate_async, is_async, AsyncInvokable};
use crate::raised::{Raised, RaisedKind};
use crate::records::{Invocation, Request, Response};

/// Shared exception override for async replay.
pub type SharedOverride = Arc<dyn Fn(&Ref) -> Option<ResourceValue> + Send + Sync>;

struct AsyncState {
    cursor: Vec<Invocation>,
    children: Vec<Ref>,
    started: usize,
    completed: usize,
}

struct AsyncFrameInner {
    store: Store,
    overrides: Option<SharedOverride>,
    state: Mutex<AsyncState>,
}

/// Execution context handed to [`AsyncInvokable::call`]; clones share the
/// same frame.
#[derive(Clone)]
pub struct AsyncFrame {
    inner: Arc<AsyncFrameInner>,
}

impl AsyncFrame {
    fn new(store: Store, overrides: Option<SharedOverride>, cursor: Vec<Invocation>) -> Self {
        AsyncFrame {
            inner: Arc::new(AsyncFrameInner {
                store,
                overrides,
                state: Mutex::new(AsyncState {
                    cursor,
                    children: Vec::new(),
                    started: 0,
                    completed: 0,
                }),
            }),
        }
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AsyncState> {
        self.inner.state.lock().expect("frame state poisoned")
    }

    /// Calls a nested async invokable, journaling it as a child of this
    /// frame once its future completes.
    pub async fn call(
        &self,
        invokable: &dyn AsyncInvokable,
        input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        self.lock().started += 1;
        let result = self.call_inner(invokable, input).await;
        self.lock().completed += 1;
        match result {
            Ok(value) => Ok(value),
            Err(raised) => Err(raised.propagated()),
        }
    }

    async fn call_inner(
        &self,
        invokable: &dyn AsyncInvokable,
        input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        let store = &self.inner.store;
        let invokable_ref = store.commit_value(&invokable.to_resource()?)?;
        check_input_type(invokable.input_type(), input.as_ref()).map_err(Raised::engine)?;
        let input_ref = match &input {
            Some(value) => Some(store.commit_value(value)?),
            None => None,
        };
        let request_ref = store.commit(&Request {
            invokable: invokable_ref.clone(),
            input: input_ref,
        })?;

        // Completion-order recording means concurrent siblings may reach
        // the cursor out of recorded order; scan for the matching request
        // instead of comparing only the head.
        let (recorded, divergence) = {
            let mut state = self.lock();
            if state.cursor.is_empty() {
                (None, None)
            } else {
                match state
                    .cursor
                    .iter()
                    .position(|inv| inv.request == request_ref)
                {
                    Some(index) => (Some(state.cursor.remove(index)), None),
                    None => (None, Some(state.cursor[0].request.clone())),
                }
            }
        };

        if let Some(expected) = divergence {
            let error = EngineError::Replay {
                expected: describe_request(store, &expected),
                got: describe_request(store, &request_ref),
            };
            log::debug!("{error}");
            let raised = Raised::engine(error);
            self.record_node(request_ref, invokable_ref, Vec::new(), None, Some(&raised))?;
            return Err(raised);
        }

        let cursor = match recorded {
            Some(recorded) => {
                match recorded.response_record(store).map_err(Raised::engine)? {
                    None => Vec::new(),
                    Some(response) => {
                        if let Some(output_ref) = &response.output {
                            let output = store.checkout_value(output_ref)?;
                            let recorded_ref = store.commit(&recorded)?;
                            self.lock().children.push(recorded_ref);
                            return Ok(output);
                        }
                        if response.raised_here {
                            if let (Some(raised_ref), Some(overrides)) =
                                (&response.raised, self.inner.overrides.as_ref())
                            {
                                if let Some(value) = overrides(raised_ref) {
                                    check_output_type(invokable.output_type(), &value)
                                        .map_err(Raised::engine)?;
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
                                    self.lock().children.push(store.commit(&invocation)?);
                                    return Ok(value);
                                }
                            }
                        }
                        response
                            .children
                            .iter()
                            .map(|r| store.checkout(r))
                            .collect::<Result<Vec<_>, _>>()?
                    }
                }
            }
            None => Vec::new(),
        };

        self.run_body(invokable, request_ref, invokable_ref, input, cursor)
            .await
    }

    async fn run_body(
        &self,
        invokable: &dyn AsyncInvokable,
        request_ref: Ref,
        invokable_ref: Ref,
        input: Option<ResourceValue>,
        cursor: Vec<Invocation>,
    ) -> Result<ResourceValue, Raised> {
        let child = AsyncFrame::new(
            self.inner.store.clone(),
            self.inner.overrides.clone(),
            cursor,
        );
        let mut result = invokable
            .call(child.clone(), input)
            .await
            .and_then(|output| {
                check_output_type(invokable.output_type(), &output).map_err(Raised::engine)?;
                Ok(output)
            });

        let (children, pending) = {
            let state = child.lock();
            (state.children.clone(), state.started - state.completed)
        };
        if pending > 0 && result.is_ok() {
            result = Err(Raised::engine(EngineError::IncompleteSubinvocation(
                format!("{pending} child call(s) still pending"),
            )));
        }

        match result {
            Ok(output) => {
                let output_ref = self.inner.store.commit_value(&output)?;
                self.record_node(request_ref, invokable_ref, children, Some(output_ref), None)?;
                Ok(output)
            }
            Err(raised) => {
                self.record_node(request_ref, invokable_ref, children, None, Some(&raised))?;
                Err(raised)
            }
        }
    }

    fn record_node(
        &self,
        request_ref: Ref,
        invokable_ref: Ref,
        children: Vec<Ref>,
        output: Option<Ref>,
        raised: Option<&Raised>,
    ) -> Result<(), Raised> {
        let store = &self.inner.store;
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
        self.lock().children.push(store.commit(&invocation)?);
        Ok(())
    }
}

/// Journaled execution of an async invokable. Same outcome contract as the
/// sync [`crate::invoke`].
pub async fn invoke_async(
    store: &Store,
    invokable: &dyn AsyncInvokable,
    input: Option<&Ref>,
) -> Result<Invocation, EngineError> {
    drive_async(store, invokable, input, None, None).await
}

/// Re-executes a recorded async invocation against its journal.
pub async fn replay_async(
    store: &Store,
    from: &Invocation,
    overrides: Option<SharedOverride>,
) -> Result<Invocation, EngineError> {
    ensure_builtins()?;
    let request: Request = store.checkout(&from.request)?;
    if !is_async(request.invokable.type_id()) {
        return Err(EngineError::WrongEngine(
            "cannot replay a synchronous invocation asynchronously; use replay".into(),
        ));
    }
    let invokable = instantiate_async(store, &request.invokable)?;
    drive_async(
        store,
        invokable.as_ref(),
        request.input.as_ref(),
        Some(from.clone()),
        overrides,
    )
    .await
}

async fn drive_async(
    store: &Store,
    invokable: &dyn AsyncInvokable,
    input: Option<&Ref>,
    replay_from: Option<Invocation>,
    overrides: Option<SharedOverride>,
) -> Result<Invocation, EngineError> {
    ensure_builtins()?;
    let input_value = match input {
        Some(r) => Some(store.checkout_value(r)?),
        None => None,
    };
    let top = AsyncFrame::new(
        store.clone(),
        overrides,
        replay_from.into_iter().collect(),
    );
    let result = top.call(invokable, input_value).await;
    let root = top.lock().children.pop();
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
