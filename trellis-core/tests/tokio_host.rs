//! Flushing the job queue from a tokio `LocalSet`.

#![cfg(feature = "tokio")]

use std::cell::RefCell;
use std::rc::Rc;

use trellis_core::reactive::Runtime;
use trellis_core::scheduler::TokioMicrotasks;
use trellis_core::value::Object;

/// Writes made in one synchronous stretch flush once the task yields.
#[tokio::test]
async fn flush_runs_as_a_local_task() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let rt = Runtime::builder()
                .microtasks(Rc::new(TokioMicrotasks))
                .build();
            let state = rt.reactive(&Object::new().with("n", 0));
            let seen = Rc::new(RefCell::new(Vec::new()));

            let s = state.clone();
            let log = Rc::clone(&seen);
            let _effect = rt.effect(move || {
                log.borrow_mut()
                    .push(s.get("n").and_then(|v| v.as_int()).unwrap_or_default());
            });

            state.set("n", 1);
            state.set("n", 2);
            assert_eq!(*seen.borrow(), [0]);
            // Custom hosts are not drained by the runtime itself
            assert_eq!(rt.run_microtasks(), 0);

            for _ in 0..10 {
                if !rt.is_flush_scheduled() {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert_eq!(*seen.borrow(), [0, 2]);
        })
        .await;
}
