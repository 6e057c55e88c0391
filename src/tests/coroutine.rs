use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::context::Context;
use crate::{Builder, Coroutine, State, Yielder, DEFAULT_STACK_SIZE};

/// Records markers pushed from both sides of a coroutine.
#[derive(Clone, Default)]
struct Trace(Arc<Mutex<Vec<i32>>>);

impl Trace {
    fn push(&self, marker: i32) {
        self.0.lock().unwrap().push(marker);
    }

    fn take(&self) -> Vec<i32> {
        mem::take(&mut *self.0.lock().unwrap())
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[test]
fn smoke() {
    let hit = Arc::new(AtomicBool::new(false));
    let hit2 = hit.clone();
    let mut coroutine = Coroutine::<()>::new(move |_| {
        hit2.store(true, Ordering::SeqCst);
    });
    assert!(!hit.load(Ordering::SeqCst));
    assert!(coroutine.is_active());
    assert!(!coroutine.done());
    assert_eq!(coroutine.state(), State::Parked);
    coroutine.resume();
    assert!(hit.load(Ordering::SeqCst));
    assert!(!coroutine.is_active());
    assert!(coroutine.done());
    assert_eq!(coroutine.state(), State::Finished);
}

#[test]
fn basic_int() {
    let trace = Trace::default();
    let t = trace.clone();
    let mut coroutine = Coroutine::new(move |y: &Yielder<i32>| {
        t.push(2);
        t.push(y.get());
        t.push(4);
        y.suspend();
        t.push(6);
        t.push(y.get());
        t.push(8);
        y.suspend();
        y.suspend();
    });
    trace.push(1);
    coroutine.call(3);
    trace.push(5);
    coroutine.call(7);

    assert_eq!(trace.take(), [1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(coroutine.is_active());

    // The last suspension is never resumed.
    drop(coroutine);
    assert!(trace.take().is_empty());
}

#[test]
fn basic_void() {
    let trace = Trace::default();
    let t = trace.clone();
    let mut coroutine = Coroutine::<()>::new(move |y| {
        t.push(2);
        t.push(4);
        y.suspend();
        t.push(6);
        t.push(8);
        y.suspend();
        y.suspend();
    });
    trace.push(1);
    coroutine.resume();
    trace.push(5);
    coroutine.resume();

    assert_eq!(trace.take(), [1, 2, 4, 5, 6, 8]);
}

#[test]
fn chained_calls() {
    let trace = Trace::default();
    let t = trace.clone();
    let mut coroutine = Coroutine::<i32>::new(move |y| loop {
        t.push(y.get());
        y.suspend();
    });
    coroutine.call(1).call(2).call(3);
    assert_eq!(trace.take(), [1, 2, 3]);
}

#[test]
fn slot_is_overwritten() {
    let trace = Trace::default();
    let t = trace.clone();
    let mut coroutine = Coroutine::<i32>::new(move |y| {
        // Don't read the first value.
        y.suspend();
        t.push(y.get());
    });
    coroutine.call(3);
    coroutine.call(7);
    assert_eq!(trace.take(), [7]);
    assert!(coroutine.done());
}

#[test]
fn strict_alternation() {
    const ROUNDS: i32 = 1000;

    let trace = Trace::default();
    let t = trace.clone();
    let mut coroutine = Coroutine::<i32>::new(move |y| loop {
        t.push(y.get() * 2 + 1);
        y.suspend();
    });
    for i in 0..ROUNDS {
        trace.push(i * 2);
        coroutine.call(i);
    }
    assert_eq!(trace.take(), (0..ROUNDS * 2).collect::<Vec<_>>());
}

#[test]
fn independent_pairs_in_parallel() {
    let workers: Vec<_> = (0..4)
        .map(|n| {
            thread::spawn(move || {
                let trace = Trace::default();
                let t = trace.clone();
                let mut coroutine = Coroutine::<i32>::new(move |y| loop {
                    t.push(y.get() + n);
                    y.suspend();
                });
                for i in 0..100 {
                    coroutine.call(i);
                }
                trace.take()
            })
        })
        .collect();

    for (n, worker) in workers.into_iter().enumerate() {
        let expected: Vec<_> = (0..100).map(|i| i + n as i32).collect();
        assert_eq!(worker.join().unwrap(), expected);
    }
}

#[test]
#[should_panic(expected = "foobar")]
fn panics_propagated() {
    let a = Arc::new(AtomicBool::new(false));
    let b = SetOnDrop(a.clone());
    let mut coroutine = Coroutine::<()>::new(move |_| {
        let _b = b;
        panic!("foobar");
    });
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        coroutine.resume();
    }));
    assert!(result.is_err());
    assert!(a.load(Ordering::SeqCst));
    assert!(coroutine.done());
    panic::resume_unwind(result.unwrap_err());
}

#[test]
fn panic_after_suspend() {
    let mut coroutine = Coroutine::<()>::new(|y| {
        y.suspend();
        panic!("foobar");
    });
    assert!(coroutine.try_resume().is_ok());
    assert!(coroutine.is_active());

    let err = coroutine.try_resume().unwrap_err();
    assert_eq!(err.downcast_ref::<&'static str>(), Some(&"foobar"));
    assert!(!coroutine.is_active());
    assert_eq!(coroutine.state(), State::Finished);
}

#[test]
fn panic_payload_is_preserved() {
    #[derive(Debug, PartialEq)]
    struct Failure(u32);

    let mut coroutine = Coroutine::<u32>::new(|y| {
        let code = y.get();
        y.suspend();
        panic::panic_any(Failure(code + y.get()));
    });
    assert!(coroutine.try_call(1).is_ok());

    let err = coroutine.try_call(2).unwrap_err();
    assert_eq!(err.downcast_ref::<Failure>(), Some(&Failure(3)));
    assert!(coroutine.done());
}

#[test]
#[should_panic(expected = "attempt to resume a completed coroutine")]
fn resume_completed() {
    let mut coroutine = Coroutine::<()>::new(|_| {});
    coroutine.resume();
    assert!(coroutine.done());
    coroutine.resume();
}

#[test]
fn not_a_coroutine() {
    let coroutine = Coroutine::<i32>::default();
    assert!(!coroutine.is_active());
    assert!(!coroutine.done());
    assert_eq!(coroutine.state(), State::NotStarted);
    assert_eq!(
        format!("{:?}", coroutine),
        "Coroutine { state: NotStarted }"
    );
}

#[test]
#[should_panic(expected = "attempt to resume a coroutine that was never started")]
fn call_not_a_coroutine() {
    Coroutine::<i32>::default().call(1);
}

#[test]
fn take_moves_value_out() {
    struct Token(i32);

    let trace = Trace::default();
    let t = trace.clone();
    let mut coroutine = Coroutine::<Token>::new(move |y| {
        t.push(y.take().map_or(-1, |token| token.0));
        t.push(y.take().map_or(-1, |token| token.0));
    });
    coroutine.call(Token(4));
    assert_eq!(trace.take(), [4, -1]);
}

#[test]
#[should_panic(expected = "no value has been passed to the coroutine")]
fn get_empty_slot() {
    let mut coroutine = Coroutine::<i32>::new(|y| {
        y.take();
        y.get();
    });
    coroutine.call(1);
}

#[test]
fn drop_unwinds_suspended_body() {
    let dropped = Arc::new(AtomicBool::new(false));
    let after = Arc::new(AtomicBool::new(false));
    let guard = SetOnDrop(dropped.clone());
    let after2 = after.clone();
    let mut coroutine = Coroutine::<()>::new(move |y| {
        let _guard = guard;
        y.suspend();
        after2.store(true, Ordering::SeqCst);
    });
    coroutine.resume();
    assert!(coroutine.is_active());
    assert!(!dropped.load(Ordering::SeqCst));

    drop(coroutine);
    assert!(dropped.load(Ordering::SeqCst));
    assert!(!after.load(Ordering::SeqCst));
}

#[test]
fn drop_before_first_call() {
    let dropped = Arc::new(AtomicBool::new(false));
    let ran = Arc::new(AtomicBool::new(false));
    let guard = SetOnDrop(dropped.clone());
    let ran2 = ran.clone();
    let coroutine = Coroutine::<()>::new(move |_| {
        let _guard = guard;
        ran2.store(true, Ordering::SeqCst);
    });
    assert!(coroutine.is_active());

    drop(coroutine);
    assert!(dropped.load(Ordering::SeqCst));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn drop_completed() {
    let mut coroutine = Coroutine::<()>::new(|y| y.suspend());
    coroutine.resume().resume();
    assert!(coroutine.done());
    drop(coroutine);
}

#[test]
fn yielder_inactive_while_unwinding() {
    let seen = Arc::new(Mutex::new(None));
    let seen2 = seen.clone();
    let mut coroutine = Coroutine::<()>::new(move |y| {
        assert!(y.is_active());
        let _guard = scopeguard::guard((), |()| {
            *seen2.lock().unwrap() = Some(y.is_active());
        });
        y.suspend();
    });
    coroutine.resume();
    drop(coroutine);
    assert_eq!(*seen.lock().unwrap(), Some(false));
}

#[test]
fn caught_interruption() {
    let caught = Arc::new(AtomicBool::new(false));
    let caught2 = caught.clone();
    let mut coroutine = Coroutine::<()>::new(move |y| {
        let result = panic::catch_unwind(AssertUnwindSafe(|| y.suspend()));
        caught2.store(result.is_err(), Ordering::SeqCst);

        // Suspending again unwinds straight away.
        let result = panic::catch_unwind(AssertUnwindSafe(|| y.suspend()));
        assert!(result.is_err());
    });
    coroutine.resume();
    drop(coroutine);
    assert!(caught.load(Ordering::SeqCst));
}

#[test]
fn panic_after_caught_interruption() {
    let mut context = Context::<()>::new("late".to_owned());
    let shared = context.shared().clone();
    let body_shared = shared.clone();
    context
        .start(DEFAULT_STACK_SIZE, move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| body_shared.suspend()));
            assert!(result.is_err());
            panic!("late");
        })
        .unwrap();
    context.resume();
    assert_eq!(shared.state(), State::Parked);

    // The late panic is discarded instead of reaching the dropping thread.
    drop(context);
    assert_eq!(shared.state(), State::Interrupted);
}

#[test]
fn panicking_clone_in_body() {
    struct Fussy(i32);

    impl Clone for Fussy {
        fn clone(&self) -> Self {
            if self.0 < 0 {
                panic!("refusing to clone");
            }
            Fussy(self.0)
        }
    }

    let trace = Trace::default();
    let t = trace.clone();
    let mut coroutine = Coroutine::<Fussy>::new(move |y| loop {
        t.push(y.get().0);
        y.suspend();
    });
    coroutine.call(Fussy(1));

    let err = coroutine.try_call(Fussy(-1)).unwrap_err();
    assert_eq!(err.downcast_ref::<&'static str>(), Some(&"refusing to clone"));
    assert_eq!(coroutine.state(), State::Finished);
    assert_eq!(trace.take(), [1]);
}

#[test]
fn panicking_drop_of_replaced_value() {
    struct Brittle(bool);

    impl Drop for Brittle {
        fn drop(&mut self) {
            if self.0 {
                panic!("brittle value dropped");
            }
        }
    }

    let mut coroutine = Coroutine::<Brittle>::new(|y| loop {
        y.suspend();
    });
    coroutine.call(Brittle(true));

    // Replacing the unread value panics before the body is resumed.
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        coroutine.call(Brittle(false));
    }));
    assert!(result.is_err());
    assert_eq!(coroutine.state(), State::Parked);

    coroutine.call(Brittle(false));
    assert!(coroutine.is_active());
}

#[test]
fn nested() {
    let trace = Trace::default();
    let t = trace.clone();
    let mut outer = Coroutine::<()>::new(move |y| {
        t.push(2);
        let t2 = t.clone();
        let mut inner = Coroutine::<i32>::new(move |y| {
            t2.push(y.get());
            y.suspend();
            t2.push(y.get());
        });
        inner.call(3).call(4);
        assert!(inner.done());
        t.push(5);
        y.suspend();
        t.push(7);
    });
    trace.push(1);
    outer.resume();
    trace.push(6);
    outer.resume();

    assert!(outer.done());
    assert_eq!(trace.take(), [1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn recursive() {
    fn countdown(depth: i32, trace: Trace) -> Coroutine<()> {
        Coroutine::new(move |y| {
            trace.push(depth);
            if depth > 0 {
                let mut child = countdown(depth - 1, trace.clone());
                child.resume();
                y.suspend();
                // The innermost body never suspends.
                if !child.done() {
                    child.resume();
                }
                assert!(child.done());
            }
            trace.push(-depth);
        })
    }

    let trace = Trace::default();
    let mut root = countdown(3, trace.clone());
    root.resume();
    assert_eq!(trace.take(), [3, 2, 1, 0, 0]);
    root.resume();
    assert_eq!(trace.take(), [-1, -2, -3]);
    assert!(root.done());
}

#[test]
fn drop_nested_while_suspended() {
    let dropped = Arc::new(AtomicBool::new(false));
    let guard = SetOnDrop(dropped.clone());
    let mut outer = Coroutine::<()>::new(move |y| {
        let mut inner = Coroutine::<()>::new(move |y| {
            let _guard = guard;
            y.suspend();
        });
        inner.resume();
        y.suspend();
    });
    outer.resume();
    assert!(!dropped.load(Ordering::SeqCst));

    // Unwinding the outer body drops the inner coroutine.
    drop(outer);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn transfer() {
    let trace = Trace::default();
    let t = trace.clone();
    let t2 = trace.clone();
    let other = Coroutine::<i32>::new(move |y| loop {
        t2.push(y.get());
        y.suspend();
    });
    let mut coroutine = Coroutine::<i32>::new(move |y| {
        let mut other = other;
        t.push(y.get());
        y.transfer(&mut other, 20);
        t.push(y.get());
        y.transfer(&mut other, 40);
    });
    coroutine.call(10);
    trace.push(25);
    coroutine.call(30);

    assert_eq!(trace.take(), [10, 20, 25, 30, 40]);
    assert!(coroutine.is_active());
}

#[test]
fn builder() {
    let mut coroutine = Builder::new()
        .name("worker".to_owned())
        .stack_size(256 * 1024)
        .spawn(|_: &Yielder<()>| {
            assert_eq!(thread::current().name(), Some("worker"));
        })
        .unwrap();
    assert_eq!(
        format!("{:?}", coroutine),
        "Coroutine { name: \"worker\", state: Parked }"
    );
    coroutine.resume();
    assert!(coroutine.done());
}

#[test]
fn stack_growth() {
    let mut coroutine = Builder::new()
        .stack_size(4 * 1024 * 1024)
        .spawn(|_: &Yielder<()>| {
            fn recurse(i: u32, p: &mut [u8; 10000]) {
                unsafe {
                    // Ensure the stack allocation isn't optimized away.
                    ptr::read_volatile(&p);
                }
                if i > 0 {
                    recurse(i - 1, &mut [0; 10000]);
                }
            }

            // Use ~500KB of stack.
            recurse(50, &mut [0; 10000]);
        })
        .unwrap();
    coroutine.resume();
    assert!(coroutine.done());
}
