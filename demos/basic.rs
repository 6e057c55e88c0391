use corothread::Coroutine;

fn main() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();

    println!("[main] creating coroutine");

    let mut coroutine = Coroutine::new(|yielder| {
        println!("[coroutine] coroutine started with input {}", yielder.get());
        for _ in 0..5 {
            yielder.suspend();
            println!("[coroutine] got {} from parent", yielder.get())
        }
        println!("[coroutine] exiting coroutine");
    });

    let mut counter = 100;
    while !coroutine.done() {
        println!("[main] resuming coroutine with argument {}", counter);
        coroutine.call(counter);
        counter += 1;
    }

    println!("[main] exiting");
}

#[test]
fn basic() {
    main()
}
