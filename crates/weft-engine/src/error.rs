use thiserror::Error;
use weft_resource::ResourceError;
use weft_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("invokable type error: {0}")]
    InvokableType(String),
    #[error("replay expected {expected} but got {got}")]
    Replay { expected: String, got: String },
    #[error("subinvocation did not complete before its parent returned: {0}")]
    IncompleteSubinvocation(String),
    #[error("input must be set before iterating further")]
    InputRequired,
    #[error("invocation has not been executed yet")]
    NotExecuted,
    #[error("requested type must be given when the invokable declares no output type")]
    RequestedTypeUndetermined,
    #[error("type '{0}' is not registered as an invokable")]
    NotInvokable(String),
    #[error("{0}")]
    WrongEngine(String),
}
