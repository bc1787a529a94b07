//! Ambient store binding for the current thread of control.
//!
//! Binding pushes onto a per-thread stack; commit and checkout without an
//! explicit store target the topmost entry. Executors that migrate tasks
//! across threads must propagate the store explicitly instead.

use std::cell::RefCell;
use std::marker::PhantomData;

use weft_resource::{Ref, Resource, ResourceValue};

use crate::{Store, StoreError, StoreResult};

thread_local! {
    static STACK: RefCell<Vec<Store>> = const { RefCell::new(Vec::new()) };
}

/// Scope guard returned by [`Store::bind`]; pops the binding on drop.
#[must_use = "the binding is released when the guard drops"]
pub struct StoreGuard {
    // Thread-local bookkeeping; the guard must stay on its thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Store {
    /// Makes this store the ambient store for the current thread until the
    /// returned guard drops.
    pub fn bind(&self) -> StoreGuard {
        STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        StoreGuard {
            _not_send: PhantomData,
        }
    }
}

/// The topmost bound store, if any.
pub fn current() -> Option<Store> {
    STACK.with(|stack| stack.borrow().last().cloned())
}

fn active() -> StoreResult<Store> {
    current().ok_or(StoreError::NoActiveStore)
}

/// Commits against the ambient store.
pub fn commit<T: Resource>(resource: &T) -> StoreResult<Ref> {
    active()?.commit(resource)
}

pub fn commit_value(resource: &ResourceValue) -> StoreResult<Ref> {
    active()?.commit_value(resource)
}

/// Checks out against the ambient store.
pub fn checkout<T: Resource>(r: &Ref) -> StoreResult<T> {
    active()?.checkout(r)
}

pub fn checkout_value(r: &Ref) -> StoreResult<ResourceValue> {
    active()?.checkout_value(r)
}

/// Modifies against the ambient store.
pub fn modify<T: Resource, R>(r: &mut Ref, f: impl FnOnce(&mut T) -> R) -> StoreResult<R> {
    active()?.modify(r, f)
}
