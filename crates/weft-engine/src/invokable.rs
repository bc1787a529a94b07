//! Invokable contracts and the constructor registry that lets invokables be
//! checked out from a reference and called during replay.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use weft_cbor::Digest;
use weft_resource::{registry, FieldMap, FieldValue, Ref, Resource, ResourceError, ResourceValue, TypeId};
use weft_store::Store;

use crate::async_engine::AsyncFrame;
use crate::engine::Frame;
use crate::error::EngineError;
use crate::raised::Raised;
use crate::records::{ErrorResource, InputRequest, Invocation, Request, Response};

/// Erased access to a resource's runtime form; implemented for every
/// [`Resource`] so invokables stay object safe.
pub trait ErasedResource {
    fn to_resource(&self) -> Result<ResourceValue, ResourceError>;
}

impl<T: Resource> ErasedResource for T {
    fn to_resource(&self) -> Result<ResourceValue, ResourceError> {
        self.to_value()
    }
}

/// A resource that can be called. Sub-invocations go through the frame,
/// which journals them as child nodes.
pub trait Invokable: ErasedResource + Send + Sync {
    /// Declared input type; enforced at call and invoke time when present.
    fn input_type(&self) -> Option<TypeId> {
        None
    }

    /// Declared output type; enforced on returned outputs and replay
    /// overrides when present.
    fn output_type(&self) -> Option<TypeId> {
        None
    }

    fn call(
        &self,
        cx: &mut Frame<'_>,
        input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised>;
}

/// Cooperative-async variant of [`Invokable`]; the contract is otherwise
/// identical. The frame is cloneable so sibling calls can run concurrently.
#[async_trait]
pub trait AsyncInvokable: ErasedResource + Send + Sync {
    fn input_type(&self) -> Option<TypeId> {
        None
    }

    fn output_type(&self) -> Option<TypeId> {
        None
    }

    async fn call(
        &self,
        cx: AsyncFrame,
        input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised>;
}

type SyncCtor = Arc<dyn Fn(&ResourceValue) -> Result<Box<dyn Invokable>, ResourceError> + Send + Sync>;
type AsyncCtor =
    Arc<dyn Fn(&ResourceValue) -> Result<Box<dyn AsyncInvokable>, ResourceError> + Send + Sync>;

#[derive(Clone)]
enum InvokableCtor {
    Sync(SyncCtor),
    Async(AsyncCtor),
}

static INVOKABLES: Lazy<RwLock<HashMap<Digest, InvokableCtor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers a synchronous invokable type (and its resource type).
pub fn register_invokable<T>() -> Result<TypeId, ResourceError>
where
    T: Resource + Invokable + 'static,
{
    let type_id = registry::register::<T>()?;
    INVOKABLES.write().expect("invokable registry poisoned").insert(
        *type_id.digest(),
        InvokableCtor::Sync(Arc::new(|value: &ResourceValue| {
            Ok(Box::new(value.typed::<T>()?) as Box<dyn Invokable>)
        })),
    );
    Ok(type_id)
}

/// Registers a cooperative-async invokable type (and its resource type).
pub fn register_async_invokable<T>() -> Result<TypeId, ResourceError>
where
    T: Resource + AsyncInvokable + 'static,
{
    let type_id = registry::register::<T>()?;
    INVOKABLES.write().expect("invokable registry poisoned").insert(
        *type_id.digest(),
        InvokableCtor::Async(Arc::new(|value: &ResourceValue| {
            Ok(Box::new(value.typed::<T>()?) as Box<dyn AsyncInvokable>)
        })),
    );
    Ok(type_id)
}

fn ctor_for(type_id: &TypeId) -> Result<InvokableCtor, EngineError> {
    INVOKABLES
        .read()
        .expect("invokable registry poisoned")
        .get(type_id.digest())
        .cloned()
        .ok_or_else(|| EngineError::NotInvokable(type_id.name().to_owned()))
}

/// Checks out a reference as a callable synchronous invokable.
pub fn instantiate(store: &Store, r: &Ref) -> Result<Box<dyn Invokable>, EngineError> {
    let value = store.checkout_value(r)?;
    match ctor_for(value.type_id())? {
        InvokableCtor::Sync(ctor) => Ok(ctor(&value)?),
        InvokableCtor::Async(_) => Err(EngineError::WrongEngine(format!(
            "'{}' is an async invokable; use the async engine",
            value.type_id().name()
        ))),
    }
}

/// Checks out a reference as a callable async invokable.
pub fn instantiate_async(store: &Store, r: &Ref) -> Result<Box<dyn AsyncInvokable>, EngineError> {
    let value = store.checkout_value(r)?;
    match ctor_for(value.type_id())? {
        InvokableCtor::Async(ctor) => Ok(ctor(&value)?),
        InvokableCtor::Sync(_) => Err(EngineError::WrongEngine(format!(
            "'{}' is a synchronous invokable; use the sync engine",
            value.type_id().name()
        ))),
    }
}

pub(crate) fn is_async(type_id: &TypeId) -> bool {
    matches!(ctor_for(type_id), Ok(InvokableCtor::Async(_)))
}

/// Built-in invokable whose body raises an [`InputRequest`]; every
/// suspension is the journaled child node this produces, which is what
/// replay overrides target.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInput {
    pub requested_type: TypeId,
    pub context: FieldValue,
}

impl Resource for RequestInput {
    fn type_name() -> &'static str {
        "weft/request-input@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["requested_type", "context"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.requested_type.clone().into(), self.context.clone()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(RequestInput {
            requested_type: fields.take("requested_type")?.as_type()?.clone(),
            context: fields.take("context")?,
        })
    }
}

impl Invokable for RequestInput {
    fn output_type(&self) -> Option<TypeId> {
        Some(self.requested_type.clone())
    }

    fn call(
        &self,
        cx: &mut Frame<'_>,
        _input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        Err(Raised::input(InputRequest {
            invokable: cx.invokable_ref().clone(),
            for_resource: cx.input_ref().cloned(),
            requested_type: self.requested_type.clone(),
            context: self.context.clone(),
        }))
    }
}

/// Registers the engine's record and built-in types. Idempotent.
pub fn ensure_builtins() -> Result<(), ResourceError> {
    registry::register::<Ref>()?;
    registry::register::<Request>()?;
    registry::register::<Response>()?;
    registry::register::<Invocation>()?;
    registry::register::<InputRequest>()?;
    registry::register::<ErrorResource>()?;
    register_invokable::<RequestInput>()?;
    Ok(())
}
