//! Store scenarios: shared digests and layered snapshot "cycles".

use weft_resource::{registry, FieldMap, FieldValue, Ref, Resource, ResourceError};
use weft_store::{context, Store};

#[derive(Debug, Clone, PartialEq)]
struct Message {
    a: String,
    b: i64,
}

impl Resource for Message {
    fn type_name() -> &'static str {
        "chains-test/message@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["a", "b"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.a.as_str().into(), self.b.into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(Message {
            a: fields.take("a")?.as_str()?.to_owned(),
            b: fields.take("b")?.as_int()?,
        })
    }
}

/// Linked-list cell pointing at an older committed snapshot.
#[derive(Debug, Clone, PartialEq)]
struct Cell {
    value: i64,
    next: Option<Ref>,
}

impl Resource for Cell {
    fn type_name() -> &'static str {
        "chains-test/cell@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["value", "next"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.value.into(), self.next.clone().into()]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        Ok(Cell {
            value: fields.take("value")?.as_int()?,
            next: fields
                .take("next")?
                .as_option(|v| v.as_ref_value().cloned())?,
        })
    }
}

fn register_types() {
    registry::register::<Message>().unwrap();
    registry::register::<Cell>().unwrap();
}

#[test]
fn equal_resources_share_one_digest() {
    register_types();
    let store = Store::in_memory();
    let r1 = store
        .commit(&Message {
            a: "hello".into(),
            b: 42,
        })
        .unwrap();
    let r2 = store
        .commit(&Message {
            a: "hello".into(),
            b: 42,
        })
        .unwrap();
    assert_eq!(r1, r2);
    let hex = r1.digest().to_hex();
    assert_eq!(hex.len(), 64);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn chain_is_layered_snapshots_not_a_cycle() {
    register_types();
    let store = Store::in_memory();

    let mut l1 = Cell {
        value: 1,
        next: None,
    };
    let r1 = store.commit(&l1).unwrap();
    let l2 = Cell {
        value: 2,
        next: Some(r1.clone()),
    };
    let r2 = store.commit(&l2).unwrap();

    // "Closing the loop" just commits a newer snapshot of l1 that points
    // into the older chain.
    l1.next = Some(r2);
    let r3 = store.commit(&l1).unwrap();
    assert_ne!(r1, r3);

    let mut values = Vec::new();
    let mut cursor = Some(r3);
    while let Some(r) = cursor {
        let cell: Cell = store.checkout(&r).unwrap();
        values.push(cell.value);
        cursor = cell.next;
    }
    assert_eq!(values, vec![1, 2, 1]);
}

#[test]
fn ambient_context_serves_the_bound_store() {
    register_types();
    let store = Store::in_memory();
    let _guard = store.bind();

    let r = context::commit(&Message {
        a: "ambient".into(),
        b: 1,
    })
    .unwrap();
    assert!(store.has(&r).unwrap());
    assert_eq!(
        context::checkout::<Message>(&r).unwrap(),
        Message {
            a: "ambient".into(),
            b: 1,
        }
    );

    let mut handle = r.clone();
    context::modify(&mut handle, |m: &mut Message| m.b = 2).unwrap();
    assert_ne!(handle, r);
    assert_eq!(context::checkout::<Message>(&handle).unwrap().b, 2);
    assert_eq!(context::checkout::<Message>(&r).unwrap().b, 1);
}

#[test]
fn filesystem_store_round_trips_resources() {
    register_types();
    let dir = tempfile::TempDir::new().unwrap();
    let store = Store::on_disk(dir.path()).unwrap();

    let r = store
        .commit(&Message {
            a: "disk".into(),
            b: 9,
        })
        .unwrap();
    // A second store over the same root sees the same content.
    let again = Store::on_disk(dir.path()).unwrap();
    assert_eq!(again.checkout::<Message>(&r).unwrap().b, 9);
}
