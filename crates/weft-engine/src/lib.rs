//! Journaled execution of invokable resources: every nested call is
//! recorded as a tree of invocation nodes in the content-addressed store,
//! which can then be rewound, mutated via overrides, and replayed.

mod async_engine;
mod engine;
mod error;
mod generator;
mod invokable;
mod raised;
mod records;

pub use async_engine::{invoke_async, replay_async, AsyncFrame, SharedOverride};
pub use engine::{invoke, Frame};
pub use error::EngineError;
pub use generator::InvocationGenerator;
pub use invokable::{
    ensure_builtins, instantiate, instantiate_async, register_async_invokable,
    register_invokable, AsyncInvokable, ErasedResource, Invokable, RequestInput,
};
pub use raised::{ExceptionOverride, Raised, RaisedKind};
pub use records::{ErrorResource, InputRequest, Invocation, Outcome, Request, Response};
