//! The signal type flowing out of `call` bodies.
//!
//! A raise is either a suspension ([`InputRequest`]), a user error carried
//! as a resource, or an engine fault. The `from_child` bit tracks whether
//! the value propagated out of a completed child call, which is what
//! `raised_here` records in the journal.

use weft_resource::{FieldValue, Ref, Resource, ResourceValue};
use weft_store::StoreError;

use crate::error::EngineError;
use crate::records::{ErrorResource, InputRequest};

#[derive(Debug)]
pub enum RaisedKind {
    /// Cooperative suspension; converted into a partial invocation at the
    /// top of `invoke`, never a failure.
    Input(InputRequest),
    /// A user error journaled as a resource.
    Error(ResourceValue),
    /// Engine fault; always re-raised to the caller.
    Engine(EngineError),
}

#[derive(Debug)]
pub struct Raised {
    kind: RaisedKind,
    from_child: bool,
}

impl Raised {
    pub fn input(request: InputRequest) -> Self {
        Raised {
            kind: RaisedKind::Input(request),
            from_child: false,
        }
    }

    pub fn error(value: ResourceValue) -> Self {
        Raised {
            kind: RaisedKind::Error(value),
            from_child: false,
        }
    }

    /// Wraps a plain message as a `weft/error@1` resource.
    pub fn message(message: impl Into<String>) -> Self {
        Raised::error(error_value(message.into()))
    }

    pub fn engine(error: EngineError) -> Self {
        Raised {
            kind: RaisedKind::Engine(error),
            from_child: false,
        }
    }

    pub fn kind(&self) -> &RaisedKind {
        &self.kind
    }

    pub fn into_kind(self) -> RaisedKind {
        self.kind
    }

    pub fn from_child(&self) -> bool {
        self.from_child
    }

    /// Re-tags the raise as propagated out of a completed child call.
    pub(crate) fn propagated(mut self) -> Self {
        self.from_child = true;
        self
    }

    /// The resource journaled as the node's `raised`.
    pub(crate) fn to_resource(&self) -> Result<ResourceValue, weft_resource::ResourceError> {
        match &self.kind {
            RaisedKind::Input(request) => request.to_value(),
            RaisedKind::Error(value) => Ok(value.clone()),
            RaisedKind::Engine(error) => Ok(error_value(error.to_string())),
        }
    }
}

fn error_value(message: String) -> ResourceValue {
    ResourceValue::new(
        ErrorResource::type_id(),
        vec![("message".to_owned(), FieldValue::Str(message))],
    )
    .expect("error resource fields are well-formed")
}

impl From<EngineError> for Raised {
    fn from(error: EngineError) -> Self {
        Raised::engine(error)
    }
}

impl From<StoreError> for Raised {
    fn from(error: StoreError) -> Self {
        Raised::engine(EngineError::Store(error))
    }
}

impl From<weft_resource::ResourceError> for Raised {
    fn from(error: weft_resource::ResourceError) -> Self {
        Raised::engine(EngineError::Resource(error))
    }
}

impl From<anyhow::Error> for Raised {
    fn from(error: anyhow::Error) -> Self {
        Raised::message(format!("{error:#}"))
    }
}

/// Maps a recorded raised-resource ref to a substitute output during replay.
pub type ExceptionOverride = dyn Fn(&Ref) -> Option<ResourceValue> + Send + Sync;
