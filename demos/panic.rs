use std::panic::{catch_unwind, AssertUnwindSafe};

use corothread::Coroutine;

fn main() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();

    println!("[main] creating coroutine");

    let mut coroutine = Coroutine::<()>::new(|yielder| {
        println!("[coroutine] suspending");
        yielder.suspend();

        println!("[coroutine] panicking");
        panic!("foobar");
    });

    println!("[main] resuming coroutine");
    coroutine.resume();
    println!("[main] coroutine is active: {}", coroutine.is_active());

    println!("[main] resuming coroutine");
    let result = catch_unwind(AssertUnwindSafe(|| {
        coroutine.resume();
    }));
    println!(
        "[main] caught panic \"{}\" from coroutine",
        result.unwrap_err().downcast_ref::<&'static str>().unwrap()
    );
    println!("[main] coroutine is done: {}", coroutine.done());

    println!("[main] exiting");
}

#[test]
fn panic() {
    main()
}
