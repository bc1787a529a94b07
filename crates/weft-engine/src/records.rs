//! Resource types that make up the invocation journal.

use weft_resource::{FieldMap, FieldValue, Ref, Resource, ResourceError, ResourceValue, TypeId};
use weft_store::Store;

use crate::error::EngineError;
use crate::raised::ExceptionOverride;

/// One requested call: the invokable plus its (possibly absent) input.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub invokable: Ref,
    pub input: Option<Ref>,
}

impl Resource for Request {
    fn type_name() -> &'static str {
        "weft/request@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["invokable", "input"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.invokable.clone().into(), self.input.clone().into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(Request {
            invokable: fields.take("invokable")?.as_ref_value()?.clone(),
            input: fields
                .take("input")?
                .as_option(|v| v.as_ref_value().cloned())?,
        })
    }
}

/// The outcome of one call: output or raised error, plus the completed
/// children in call-completion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub invokable: Ref,
    pub output: Option<Ref>,
    pub raised: Option<Ref>,
    /// True when the error originated in this node's own body rather than
    /// propagating from a child.
    pub raised_here: bool,
    pub children: Vec<Ref>,
}

impl Response {
    pub fn is_complete(&self) -> bool {
        self.output.is_some() || self.raised.is_some()
    }
}

impl Resource for Response {
    fn type_name() -> &'static str {
        "weft/response@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["invokable", "output", "raised", "raised_here", "children"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.invokable.clone().into(),
            self.output.clone().into(),
            self.raised.clone().into(),
            self.raised_here.into(),
            FieldValue::List(self.children.iter().cloned().map(Into::into).collect()),
        ]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(Response {
            invokable: fields.take("invokable")?.as_ref_value()?.clone(),
            output: fields
                .take("output")?
                .as_option(|v| v.as_ref_value().cloned())?,
            raised: fields
                .take("raised")?
                .as_option(|v| v.as_ref_value().cloned())?,
            raised_here: fields.take("raised_here")?.as_bool()?,
            children: fields
                .take("children")?
                .as_list()?
                .iter()
                .map(|v| v.as_ref_value().cloned())
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

/// A journaled call: its request and, once executed, its response.
///
/// A response with neither output nor raised error is a rewound node whose
/// recorded children remain available for replay matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub request: Ref,
    pub response: Option<Ref>,
}

impl Resource for Invocation {
    fn type_name() -> &'static str {
        "weft/invocation@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["request", "response"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.request.clone().into(), self.response.clone().into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(Invocation {
            request: fields.take("request")?.as_ref_value()?.clone(),
            response: fields
                .take("response")?
                .as_option(|v| v.as_ref_value().cloned())?,
        })
    }
}

/// How an invocation ended.
#[derive(Debug)]
pub enum Outcome {
    Completed(ResourceValue),
    Suspended(InputRequest),
    Failed(ResourceValue),
}

impl Invocation {
    pub fn request_record(&self, store: &Store) -> Result<Request, EngineError> {
        Ok(store.checkout(&self.request)?)
    }

    pub fn response_record(&self, store: &Store) -> Result<Option<Response>, EngineError> {
        match &self.response {
            Some(r) => Ok(Some(store.checkout(r)?)),
            None => Ok(None),
        }
    }

    fn require_response(&self, store: &Store) -> Result<Response, EngineError> {
        self.response_record(store)?.ok_or(EngineError::NotExecuted)
    }

    pub fn is_complete(&self, store: &Store) -> Result<bool, EngineError> {
        Ok(self
            .response_record(store)?
            .map(|r| r.is_complete())
            .unwrap_or(false))
    }

    pub fn successful(&self, store: &Store) -> Result<bool, EngineError> {
        Ok(self
            .response_record(store)?
            .map(|r| r.output.is_some())
            .unwrap_or(false))
    }

    /// The output value, if the invocation completed successfully.
    pub fn output(&self, store: &Store) -> Result<Option<ResourceValue>, EngineError> {
        match self.require_response(store)?.output {
            Some(r) => Ok(Some(store.checkout_value(&r)?)),
            None => Ok(None),
        }
    }

    /// The raised resource, if the invocation raised.
    pub fn raised(&self, store: &Store) -> Result<Option<ResourceValue>, EngineError> {
        match self.require_response(store)?.raised {
            Some(r) => Ok(Some(store.checkout_value(&r)?)),
            None => Ok(None),
        }
    }

    /// Whether the recorded error originated in this node's own body.
    pub fn raised_here(&self, store: &Store) -> Result<bool, EngineError> {
        Ok(self.require_response(store)?.raised_here)
    }

    pub fn children(&self, store: &Store) -> Result<Vec<Invocation>, EngineError> {
        match self.response_record(store)? {
            None => Ok(Vec::new()),
            Some(response) => response
                .children
                .iter()
                .map(|r| Ok(store.checkout(r)?))
                .collect(),
        }
    }

    /// Classifies a finished invocation.
    pub fn outcome(&self, store: &Store) -> Result<Outcome, EngineError> {
        let response = self.require_response(store)?;
        if let Some(output) = response.output {
            return Ok(Outcome::Completed(store.checkout_value(&output)?));
        }
        let raised = response.raised.ok_or(EngineError::NotExecuted)?;
        if raised.type_id() == &InputRequest::type_id() {
            return Ok(Outcome::Suspended(store.checkout(&raised)?));
        }
        Ok(Outcome::Failed(store.checkout_value(&raised)?))
    }

    /// Returns a pruned copy with the last `num_calls` completed calls
    /// removed in reverse completion order, and this node's own output and
    /// raised error cleared. The original journal is untouched.
    pub fn rewind(&self, store: &Store, num_calls: usize) -> Result<Invocation, EngineError> {
        let mut node = Node::load(store, self)?;
        if let Some(response) = &mut node.response {
            response.clear();
            let mut remaining = num_calls;
            prune(&mut response.children, &mut remaining);
        }
        node.commit(store)
    }

    /// Drops the response entirely; replaying re-executes from scratch.
    pub fn rewind_all(&self, store: &Store) -> Result<Invocation, EngineError> {
        let rewound = Invocation {
            request: self.request.clone(),
            response: None,
        };
        store.commit(&rewound)?;
        Ok(rewound)
    }

    /// Re-executes against this journal, reusing recorded child outputs
    /// where the call sequence matches.
    pub fn replay(&self, store: &Store) -> Result<Invocation, EngineError> {
        crate::engine::replay(store, self, None)
    }

    /// Replay with an override substituting outputs for recorded errors at
    /// their original raise point.
    pub fn replay_with(
        &self,
        store: &Store,
        overrides: &ExceptionOverride,
    ) -> Result<Invocation, EngineError> {
        crate::engine::replay(store, self, Some(overrides))
    }
}

/// Materialized journal tree used by rewind.
struct Node {
    request: Ref,
    response: Option<NodeResponse>,
}

struct NodeResponse {
    invokable: Ref,
    output: Option<Ref>,
    raised: Option<Ref>,
    raised_here: bool,
    children: Vec<Node>,
}

impl NodeResponse {
    fn is_complete(&self) -> bool {
        self.output.is_some() || self.raised.is_some()
    }

    fn clear(&mut self) {
        self.output = None;
        self.raised = None;
        self.raised_here = false;
    }
}

impl Node {
    fn load(store: &Store, invocation: &Invocation) -> Result<Node, EngineError> {
        let response = match invocation.response_record(store)? {
            None => None,
            Some(response) => {
                let children = response
                    .children
                    .iter()
                    .map(|r| Node::load(store, &store.checkout(r)?))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(NodeResponse {
                    invokable: response.invokable,
                    output: response.output,
                    raised: response.raised,
                    raised_here: response.raised_here,
                    children,
                })
            }
        };
        Ok(Node {
            request: invocation.request.clone(),
            response,
        })
    }

    fn commit(self, store: &Store) -> Result<Invocation, EngineError> {
        let response = match self.response {
            None => None,
            Some(response) => {
                let children = response
                    .children
                    .into_iter()
                    .map(|node| Ok(store.commit(&node.commit(store)?)?))
                    .collect::<Result<Vec<_>, EngineError>>()?;
                Some(store.commit(&Response {
                    invokable: response.invokable,
                    output: response.output,
                    raised: response.raised,
                    raised_here: response.raised_here,
                    children,
                })?)
            }
        };
        let invocation = Invocation {
            request: self.request,
            response,
        };
        store.commit(&invocation)?;
        Ok(invocation)
    }
}

/// Removes completed calls from the tail of `children`, most recently
/// completed first. A peeled node keeps its recorded children until they
/// too are removed, at which point the node is dropped entirely.
fn prune(children: &mut Vec<Node>, remaining: &mut usize) {
    while *remaining > 0 {
        let Some(last) = children.last_mut() else {
            return;
        };
        match &mut last.response {
            None => {
                children.pop();
            }
            Some(response) => {
                if response.is_complete() {
                    response.clear();
                    *remaining -= 1;
                }
                prune(&mut response.children, remaining);
                let emptied = last
                    .response
                    .as_ref()
                    .map(|r| r.children.is_empty())
                    .unwrap_or(true);
                if emptied {
                    children.pop();
                }
            }
        }
    }
}

/// Suspension record: what input is requested, for what, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRequest {
    /// The invokable that requested the input.
    pub invokable: Ref,
    /// The resource input is requested for, when there is one.
    pub for_resource: Option<Ref>,
    pub requested_type: TypeId,
    pub context: FieldValue,
}

impl Resource for InputRequest {
    fn type_name() -> &'static str {
        "weft/input-request@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["invokable", "for_resource", "requested_type", "context"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.invokable.clone().into(),
            self.for_resource.clone().into(),
            self.requested_type.clone().into(),
            self.context.clone(),
        ]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(InputRequest {
            invokable: fields.take("invokable")?.as_ref_value()?.clone(),
            for_resource: fields
                .take("for_resource")?
                .as_option(|v| v.as_ref_value().cloned())?,
            requested_type: fields.take("requested_type")?.as_type()?.clone(),
            context: fields.take("context")?,
        })
    }
}

/// An opaque error journaled as a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResource {
    pub message: String,
}

impl Resource for ErrorResource {
    fn type_name() -> &'static str {
        "weft/error@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["message"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.message.as_str().into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(ErrorResource {
            message: fields.take("message")?.as_str()?.to_owned(),
        })
    }
}
