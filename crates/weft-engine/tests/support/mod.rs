//! Shared fixtures: small resources and invokables exercising the engine.
#![allow(dead_code)]

use weft_engine::{register_invokable, Frame, Invokable, Raised};
use weft_resource::{FieldMap, FieldValue, Resource, ResourceError, ResourceValue, TypeId};

#[derive(Debug, Clone, PartialEq)]
pub struct Num {
    pub value: i64,
}

impl Num {
    pub fn new(value: i64) -> Self {
        Num { value }
    }
}

impl Resource for Num {
    fn type_name() -> &'static str {
        "fixtures/num@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["value"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.value.into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(Num {
            value: fields.take("value")?.as_int()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub value: String,
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Text {
            value: value.into(),
        }
    }
}

impl Resource for Text {
    fn type_name() -> &'static str {
        "fixtures/text@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["value"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.value.as_str().into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(Text {
            value: fields.take("value")?.as_str()?.to_owned(),
        })
    }
}

/// Input for one die roll.
#[derive(Debug, Clone, PartialEq)]
pub struct Roll {
    pub index: i64,
}

impl Resource for Roll {
    fn type_name() -> &'static str {
        "fixtures/roll@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["index"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.index.into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(Roll {
            index: fields.take("index")?.as_int()?,
        })
    }
}

pub fn roll_value(seed: i64, index: i64) -> i64 {
    (seed + index).rem_euclid(6) + 1
}

/// Rolls one die, deterministically from the seed and the roll index.
#[derive(Debug, Clone, PartialEq)]
pub struct RollDie {
    pub seed: i64,
}

impl Resource for RollDie {
    fn type_name() -> &'static str {
        "fixtures/roll-die@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["seed"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.seed.into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(RollDie {
            seed: fields.take("seed")?.as_int()?,
        })
    }
}

impl Invokable for RollDie {
    fn input_type(&self) -> Option<TypeId> {
        Some(Roll::type_id())
    }

    fn output_type(&self) -> Option<TypeId> {
        Some(Num::type_id())
    }

    fn call(
        &self,
        _cx: &mut Frame<'_>,
        input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        let roll: Roll = input
            .ok_or_else(|| Raised::message("missing roll input"))?
            .typed()?;
        Ok(Num::new(roll_value(self.seed, roll.index)).to_value()?)
    }
}

/// Sums `n` die rolls, one child invocation per roll.
#[derive(Debug, Clone, PartialEq)]
pub struct RollDice {
    pub seed: i64,
}

impl Resource for RollDice {
    fn type_name() -> &'static str {
        "fixtures/roll-dice@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["seed"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.seed.into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(RollDice {
            seed: fields.take("seed")?.as_int()?,
        })
    }
}

impl Invokable for RollDice {
    fn input_type(&self) -> Option<TypeId> {
        Some(Num::type_id())
    }

    fn output_type(&self) -> Option<TypeId> {
        Some(Num::type_id())
    }

    fn call(
        &self,
        cx: &mut Frame<'_>,
        input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        let count: Num = input
            .ok_or_else(|| Raised::message("missing count input"))?
            .typed()?;
        let die = RollDie { seed: self.seed };
        let mut sum = 0;
        for index in 0..count.value {
            let outcome = cx.call(&die, Some(Roll { index }.to_value()?))?;
            sum += outcome.typed::<Num>()?.value;
        }
        Ok(Num::new(sum).to_value()?)
    }
}

/// Asks for a text answer and returns it verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct AskQuestion {
    pub question: String,
}

impl Resource for AskQuestion {
    fn type_name() -> &'static str {
        "fixtures/ask-question@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["question"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.question.as_str().into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(AskQuestion {
            question: fields.take("question")?.as_str()?.to_owned(),
        })
    }
}

impl Invokable for AskQuestion {
    fn output_type(&self) -> Option<TypeId> {
        Some(Text::type_id())
    }

    fn call(
        &self,
        cx: &mut Frame<'_>,
        _input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        cx.request_input(
            Some(Text::type_id()),
            None,
            FieldValue::Str(self.question.clone()),
        )
    }
}

/// Always raises a user error.
#[derive(Debug, Clone, PartialEq)]
pub struct AlwaysFails;

impl Resource for AlwaysFails {
    fn type_name() -> &'static str {
        "fixtures/always-fails@1"
    }

    fn field_names() -> &'static [&'static str] {
        &[]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![]
    }

    fn from_fields(_fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(AlwaysFails)
    }
}

impl Invokable for AlwaysFails {
    fn call(
        &self,
        _cx: &mut Frame<'_>,
        _input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        Err(Raised::message("boom"))
    }
}

/// Calls [`AlwaysFails`] and propagates its error.
#[derive(Debug, Clone, PartialEq)]
pub struct CallsFailing;

impl Resource for CallsFailing {
    fn type_name() -> &'static str {
        "fixtures/calls-failing@1"
    }

    fn field_names() -> &'static [&'static str] {
        &[]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![]
    }

    fn from_fields(_fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(CallsFailing)
    }
}

impl Invokable for CallsFailing {
    fn call(
        &self,
        cx: &mut Frame<'_>,
        _input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        cx.call(&AlwaysFails, None)
    }
}

/// Returns its input unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity;

impl Resource for Identity {
    fn type_name() -> &'static str {
        "fixtures/identity@1"
    }

    fn field_names() -> &'static [&'static str] {
        &[]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![]
    }

    fn from_fields(_fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(Identity)
    }
}

impl Invokable for Identity {
    fn call(
        &self,
        _cx: &mut Frame<'_>,
        input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        input.ok_or_else(|| Raised::message("identity needs an input"))
    }
}

/// Calls [`Identity`] with a fresh ambient counter value on every run, so
/// its call sequence is not a pure function of its input.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockCaller;

impl Resource for ClockCaller {
    fn type_name() -> &'static str {
        "fixtures/clock-caller@1"
    }

    fn field_names() -> &'static [&'static str] {
        &[]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![]
    }

    fn from_fields(_fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(ClockCaller)
    }
}

impl Invokable for ClockCaller {
    fn call(
        &self,
        cx: &mut Frame<'_>,
        _input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        use std::sync::atomic::{AtomicI64, Ordering};
        static CLOCK: AtomicI64 = AtomicI64::new(0);
        let now = CLOCK.fetch_add(1, Ordering::Relaxed);
        cx.call(&Identity, Some(Num::new(now).to_value()?))
    }
}

/// Delegates the whole roll to a nested [`RollDice`] invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegatesDice {
    pub seed: i64,
}

impl Resource for DelegatesDice {
    fn type_name() -> &'static str {
        "fixtures/delegates-dice@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["seed"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.seed.into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(DelegatesDice {
            seed: fields.take("seed")?.as_int()?,
        })
    }
}

impl Invokable for DelegatesDice {
    fn input_type(&self) -> Option<TypeId> {
        Some(Num::type_id())
    }

    fn output_type(&self) -> Option<TypeId> {
        Some(Num::type_id())
    }

    fn call(
        &self,
        cx: &mut Frame<'_>,
        input: Option<ResourceValue>,
    ) -> Result<ResourceValue, Raised> {
        cx.call(&RollDice { seed: self.seed }, input)
    }
}

/// Registers every fixture type; call at the top of each test.
pub fn register_fixtures() {
    weft_resource::registry::register::<Num>().unwrap();
    weft_resource::registry::register::<Text>().unwrap();
    weft_resource::registry::register::<Roll>().unwrap();
    register_invokable::<RollDie>().unwrap();
    register_invokable::<RollDice>().unwrap();
    register_invokable::<AskQuestion>().unwrap();
    register_invokable::<AlwaysFails>().unwrap();
    register_invokable::<CallsFailing>().unwrap();
    register_invokable::<Identity>().unwrap();
    register_invokable::<ClockCaller>().unwrap();
    register_invokable::<DelegatesDice>().unwrap();
}
