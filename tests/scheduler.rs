use std::cell::{Cell, RefCell};
use std::rc::Rc;

use sweep::{Context, Error, PollState, block_on, cancel, detach, spawn};

#[test]
fn spawn_outside_context_fails() {
    let result = spawn(|| PollState::Ready(1), |_: Result<i32, Error>| Ok(()));

    assert!(
        matches!(result, Err(Error::Context(_))),
        "task creation needs an active scheduler context"
    );
}

#[test]
fn cancel_outside_context_fails() {
    let id = Rc::new(Cell::new(None));

    let stash = id.clone();
    block_on(move || {
        let task = spawn(|| PollState::Ready(()), |_: Result<(), Error>| Ok(()))
            .expect("spawn inside block_on");
        stash.set(Some(task));
    })
    .expect("scope drains");

    let task = id.get().expect("task id was recorded");
    assert!(matches!(cancel(task), Err(Error::Context(_))));
}

#[test]
fn completion_fires_once_on_the_ready_sweep() {
    let polls = Rc::new(Cell::new(0u32));
    let fires = Rc::new(Cell::new(0u32));

    let poll_count = polls.clone();
    let fire_count = fires.clone();
    block_on(move || {
        spawn(
            move || {
                poll_count.set(poll_count.get() + 1);
                if poll_count.get() == 3 {
                    PollState::Ready(poll_count.get())
                } else {
                    PollState::Pending
                }
            },
            move |outcome| {
                fire_count.set(fire_count.get() + 1);
                assert_eq!(outcome, Ok(3), "completion sees the ready value");
                Ok(())
            },
        )
        .expect("spawn inside block_on");
    })
    .expect("scope drains");

    assert_eq!(polls.get(), 3, "predicate polled once per sweep until ready");
    assert_eq!(fires.get(), 1, "completion fires exactly once");
}

#[test]
fn falsy_ready_value_settles() {
    let seen = Rc::new(Cell::new(None));

    let observed = seen.clone();
    block_on(move || {
        spawn(
            || PollState::Ready(0),
            move |outcome: Result<i32, Error>| {
                observed.set(outcome.ok());
                Ok(())
            },
        )
        .expect("spawn inside block_on");
    })
    .expect("scope drains");

    assert_eq!(seen.get(), Some(0), "a ready zero is an outcome, not a retry");
}

#[test]
fn failing_task_never_aborts_the_sweep() {
    let failed = Rc::new(RefCell::new(None));
    let sibling = Rc::new(Cell::new(false));

    let failure = failed.clone();
    let survivor = sibling.clone();
    block_on(move || {
        spawn(
            || PollState::<i32>::Failed(Error::failure("broken predicate")),
            move |outcome| {
                *failure.borrow_mut() = Some(outcome);
                Ok(())
            },
        )
        .expect("spawn inside block_on");

        let polls = Cell::new(0u32);
        spawn(
            move || {
                polls.set(polls.get() + 1);
                if polls.get() == 2 {
                    PollState::Ready(())
                } else {
                    PollState::Pending
                }
            },
            move |_: Result<(), Error>| {
                survivor.set(true);
                Ok(())
            },
        )
        .expect("spawn inside block_on");
    })
    .expect("scope drains");

    assert_eq!(
        *failed.borrow(),
        Some(Err(Error::failure("broken predicate")))
    );
    assert!(sibling.get(), "sibling outlived the failing task");
}

#[test]
fn nested_contexts_drain_lifo() {
    let trace: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let outer = trace.clone();
    block_on(move || {
        outer.borrow_mut().push("outer-start");

        let outer_done = outer.clone();
        spawn(
            || PollState::Ready(()),
            move |_: Result<(), Error>| {
                outer_done.borrow_mut().push("outer-task-done");
                Ok(())
            },
        )
        .expect("spawn into outer context");

        let inner = outer.clone();
        Context::new()
            .run(move || {
                inner.borrow_mut().push("inner-start");

                let inner_done = inner.clone();
                spawn(
                    || PollState::Ready(()),
                    move |_: Result<(), Error>| {
                        inner_done.borrow_mut().push("inner-task-done");
                        Ok(())
                    },
                )
                .expect("spawn into inner context");
            })
            .expect("inner scope drains before returning");

        outer.borrow_mut().push("inner-end");
    })
    .expect("outer scope drains");

    trace.borrow_mut().push("outer-end");

    assert_eq!(
        *trace.borrow(),
        vec![
            "outer-start",
            "inner-start",
            "inner-task-done",
            "inner-end",
            "outer-task-done",
            "outer-end",
        ],
        "inner context drains fully before the outer sweep resumes"
    );
}

#[test]
fn reentrant_run_on_active_context_skips_the_nested_sweep() {
    let trace: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let context = Context::new();
    let same_instance = context.clone();

    let body_trace = trace.clone();
    context
        .run(move || {
            let in_task = body_trace.clone();
            same_instance
                .run(move || {
                    spawn(
                        || PollState::Ready(()),
                        move |_: Result<(), Error>| {
                            in_task.borrow_mut().push("task-done");
                            Ok(())
                        },
                    )
                    .expect("spawn lands in the already-active context");
                })
                .expect("reentrant run executes the body only");

            body_trace.borrow_mut().push("body-continues");
        })
        .expect("scope drains");

    assert_eq!(
        *trace.borrow(),
        vec!["body-continues", "task-done"],
        "the outer sweep, not a nested one, drives the registered task"
    );
}

#[test]
fn task_appended_mid_sweep_is_visited_in_the_same_sweep() {
    let sweeps = Rc::new(Cell::new(0u32));
    let appended_ran_on = Rc::new(Cell::new(None));
    let appended_done = Rc::new(Cell::new(false));

    let counter = sweeps.clone();
    let ran_on = appended_ran_on.clone();
    let done = appended_done.clone();
    block_on(move || {
        // On its first poll, this task appends another behind the sentinel.
        let spawner_ran_on = ran_on.clone();
        let spawner_done = done.clone();
        let spawner_counter = counter.clone();
        spawn(
            move || {
                let record = spawner_ran_on.clone();
                let flag = spawner_done.clone();
                let current_sweep = spawner_counter.clone();
                spawn(
                    || PollState::Ready(()),
                    move |_: Result<(), Error>| {
                        record.set(Some(current_sweep.get()));
                        flag.set(true);
                        Ok(())
                    },
                )
                .expect("append during the sweep");
                PollState::Ready(())
            },
            |_: Result<(), Error>| Ok(()),
        )
        .expect("spawn inside block_on");

        // Sentinel: polled once per sweep, so its poll count numbers the
        // sweeps; finishes once the appended task has run.
        let sentinel_done = done.clone();
        let sentinel_counter = counter.clone();
        spawn(
            move || {
                sentinel_counter.set(sentinel_counter.get() + 1);
                if sentinel_done.get() {
                    PollState::Ready(())
                } else {
                    PollState::Pending
                }
            },
            |_: Result<(), Error>| Ok(()),
        )
        .expect("spawn inside block_on");
    })
    .expect("scope drains");

    assert_eq!(
        appended_ran_on.get(),
        Some(1),
        "appended task completed within the sweep that appended it"
    );
    assert_eq!(sweeps.get(), 2, "sentinel needed one extra sweep to observe it");
}

#[test]
fn detached_task_drains_without_a_completion() {
    let polls = Rc::new(Cell::new(0u32));

    let poll_count = polls.clone();
    block_on(move || {
        detach(move || {
            poll_count.set(poll_count.get() + 1);
            if poll_count.get() == 2 {
                PollState::Ready("ignored")
            } else {
                PollState::Pending
            }
        })
        .expect("detach inside block_on");
    })
    .expect("scope drains");

    assert_eq!(polls.get(), 2);
}

#[test]
fn cancel_is_idempotent() {
    block_on(|| {
        let target = spawn(|| PollState::<i32>::Pending, |_: Result<i32, Error>| Ok(()))
            .expect("spawn never-ready target");

        spawn(
            || PollState::Ready(()),
            move |_: Result<(), Error>| {
                cancel(target)?;
                // Second removal of the same task is a safe no-op.
                cancel(target)?;
                Ok(())
            },
        )
        .expect("spawn canceller");
    })
    .expect("the list drains once the never-ready task is cancelled");
}

#[test]
fn contexts_on_separate_threads_do_not_cross_talk() {
    let handles: Vec<_> = (0..4)
        .map(|offset| {
            std::thread::spawn(move || {
                let total = Rc::new(Cell::new(0i32));

                let sum = total.clone();
                block_on(move || {
                    for step in 0..3 {
                        let sum = sum.clone();
                        spawn(
                            move || PollState::Ready(offset * 10 + step),
                            move |outcome: Result<i32, Error>| {
                                sum.set(sum.get() + outcome.unwrap_or(0));
                                Ok(())
                            },
                        )
                        .expect("spawn inside block_on");
                    }
                })
                .expect("scope drains");

                total.get()
            })
        })
        .collect();

    for (offset, handle) in handles.into_iter().enumerate() {
        let expected = (offset as i32) * 30 + 3;
        assert_eq!(handle.join().expect("thread finished"), expected);
    }
}
