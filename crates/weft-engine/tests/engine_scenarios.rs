mod support;

use support::*;
use weft_engine::{invoke, EngineError, Invocation, Outcome};
use weft_resource::ResourceValue;
use weft_store::Store;

fn output_num(store: &Store, invocation: &Invocation) -> i64 {
    invocation
        .output(store)
        .unwrap()
        .expect("invocation has an output")
        .typed::<Num>()
        .unwrap()
        .value
}

fn child_outputs(store: &Store, invocation: &Invocation) -> Vec<i64> {
    invocation
        .children(store)
        .unwrap()
        .iter()
        .map(|child| output_num(store, child))
        .collect()
}

fn invoke_dice(store: &Store, seed: i64, count: i64) -> Invocation {
    let input = store.commit(&Num::new(count)).unwrap();
    invoke(store, &RollDice { seed }, Some(&input)).unwrap()
}

#[test]
fn journaled_dice_tree() {
    register_fixtures();
    let store = Store::in_memory();
    let invocation = invoke_dice(&store, 2, 3);

    assert!(invocation.successful(&store).unwrap());
    assert_eq!(output_num(&store, &invocation), 12);
    assert_eq!(child_outputs(&store, &invocation), vec![3, 4, 5]);

    // Child requests carry the per-roll inputs in completion order.
    let children = invocation.children(&store).unwrap();
    for (index, child) in children.iter().enumerate() {
        let request = child.request_record(&store).unwrap();
        let roll: Roll = store.checkout(request.input.as_ref().unwrap()).unwrap();
        assert_eq!(roll.index, index as i64);
    }
}

#[test]
fn invoking_twice_yields_identical_journals() {
    register_fixtures();
    let store = Store::in_memory();
    let first = invoke_dice(&store, 2, 3);
    let second = invoke_dice(&store, 2, 3);
    assert_eq!(first, second);
}

#[test]
fn rewind_then_replay_preserves_matched_prefix() {
    register_fixtures();
    let store = Store::in_memory();
    let invocation = invoke_dice(&store, 2, 3);

    let rewound = invocation.rewind(&store, 2).unwrap();
    assert_eq!(rewound.children(&store).unwrap().len(), 1);
    assert!(!rewound.is_complete(&store).unwrap());

    let replayed = rewound.replay(&store).unwrap();
    assert_eq!(child_outputs(&store, &replayed), vec![3, 4, 5]);
    assert_eq!(output_num(&store, &replayed), 12);
    // The original journal is untouched.
    assert_eq!(child_outputs(&store, &invocation), vec![3, 4, 5]);
}

#[test]
fn rewind_zero_clears_only_the_root_response() {
    register_fixtures();
    let store = Store::in_memory();
    let invocation = invoke_dice(&store, 2, 3);

    let rewound = invocation.rewind(&store, 0).unwrap();
    assert!(!rewound.is_complete(&store).unwrap());
    assert_eq!(rewound.children(&store).unwrap().len(), 3);

    // All three children replay from the journal.
    let replayed = rewound.replay(&store).unwrap();
    assert_eq!(replayed, invocation);
}

#[test]
fn rewind_all_forces_full_reexecution() {
    register_fixtures();
    let store = Store::in_memory();
    let invocation = invoke_dice(&store, 4, 2);

    let rewound = invocation.rewind_all(&store).unwrap();
    assert!(rewound.response.is_none());

    let replayed = rewound.replay(&store).unwrap();
    assert_eq!(output_num(&store, &replayed), output_num(&store, &invocation));
    assert_eq!(
        child_outputs(&store, &replayed),
        child_outputs(&store, &invocation)
    );
}

#[test]
fn rewind_counts_calls_across_the_tree() {
    register_fixtures();
    let store = Store::in_memory();
    let invocation = invoke_dice(&store, 2, 3);

    // Removing more calls than were made leaves an empty journal.
    let rewound = invocation.rewind(&store, 10).unwrap();
    assert_eq!(rewound.children(&store).unwrap().len(), 0);
    let replayed = rewound.replay(&store).unwrap();
    assert_eq!(output_num(&store, &replayed), 12);
}

#[test]
fn rewind_peels_nested_trees_in_reverse_completion_order() {
    register_fixtures();
    let store = Store::in_memory();
    let input = store.commit(&Num::new(2)).unwrap();
    let invocation = invoke(&store, &DelegatesDice { seed: 2 }, Some(&input)).unwrap();

    // Tree: root -> [dice], dice -> [die#0, die#1]; completion order is
    // die#0, die#1, dice.
    let dice = &invocation.children(&store).unwrap()[0];
    assert_eq!(child_outputs(&store, dice), vec![3, 4]);

    // Rewinding two calls clears the dice node and drops its last roll.
    let rewound = invocation.rewind(&store, 2).unwrap();
    let dice = &rewound.children(&store).unwrap()[0];
    assert!(!dice.is_complete(&store).unwrap());
    assert_eq!(dice.children(&store).unwrap().len(), 1);

    // Replay reuses the surviving roll and re-executes the rest.
    let replayed = rewound.replay(&store).unwrap();
    assert_eq!(output_num(&store, &replayed), 7);
    let dice = &replayed.children(&store).unwrap()[0];
    assert_eq!(child_outputs(&store, dice), vec![3, 4]);

    // One more step peels everything under the dice node away.
    let rewound = invocation.rewind(&store, 3).unwrap();
    assert_eq!(rewound.children(&store).unwrap().len(), 0);
}

#[test]
fn replay_divergence_names_both_requests() {
    register_fixtures();
    let store = Store::in_memory();
    let invocation = invoke(&store, &ClockCaller, None).unwrap();
    assert!(invocation.successful(&store).unwrap());

    let rewound = invocation.rewind(&store, 0).unwrap();
    let error = rewound.replay(&store).unwrap_err();
    match error {
        EngineError::Replay { expected, got } => {
            assert!(expected.contains("invokable"));
            assert!(got.contains("invokable"));
            // Same invokable, different input digests.
            assert_ne!(expected, got);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn raised_errors_are_journaled_with_provenance() {
    register_fixtures();
    let store = Store::in_memory();
    let invocation = invoke(&store, &CallsFailing, None).unwrap();

    assert!(!invocation.successful(&store).unwrap());
    // The root saw the error propagate from its child.
    assert!(!invocation.raised_here(&store).unwrap());
    let children = invocation.children(&store).unwrap();
    assert_eq!(children.len(), 1);
    assert!(children[0].raised_here(&store).unwrap());

    // Parent and child record the same raised resource.
    let parent_raised = invocation.raised(&store).unwrap().unwrap();
    let child_raised = children[0].raised(&store).unwrap().unwrap();
    assert_eq!(parent_raised, child_raised);

    match invocation.outcome(&store).unwrap() {
        Outcome::Failed(raised) => {
            let error: weft_engine::ErrorResource = raised.typed().unwrap();
            assert_eq!(error.message, "boom");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn declared_types_are_enforced() {
    register_fixtures();
    let store = Store::in_memory();

    // Wrong input type.
    let bad_input = store.commit(&Text::new("three")).unwrap();
    let error = invoke(&store, &RollDice { seed: 2 }, Some(&bad_input)).unwrap_err();
    assert!(matches!(error, EngineError::InvokableType(_)));

    // Missing input.
    let error = invoke(&store, &RollDice { seed: 2 }, None).unwrap_err();
    assert!(matches!(error, EngineError::InvokableType(_)));
}

#[test]
fn replaying_a_completed_invocation_reuses_the_journal() {
    register_fixtures();
    let store = Store::in_memory();
    let invocation = invoke_dice(&store, 2, 3);
    let replayed = invocation.replay(&store).unwrap();
    assert_eq!(replayed, invocation);
}

#[test]
fn outcome_classifies_completion() {
    register_fixtures();
    let store = Store::in_memory();
    let invocation = invoke_dice(&store, 2, 1);
    match invocation.outcome(&store).unwrap() {
        Outcome::Completed(output) => {
            assert_eq!(output.typed::<Num>().unwrap().value, 3);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn request_records_the_invokable_and_input() {
    register_fixtures();
    let store = Store::in_memory();
    let input = store.commit(&Num::new(1)).unwrap();
    let invocation = invoke(&store, &RollDice { seed: 9 }, Some(&input)).unwrap();

    let request = invocation.request_record(&store).unwrap();
    assert_eq!(request.input.as_ref(), Some(&input));
    let recovered: ResourceValue = store.checkout_value(&request.invokable).unwrap();
    assert_eq!(recovered.typed::<RollDice>().unwrap(), RollDice { seed: 9 });
}
