use corothread::{Builder, Coroutine, Yielder};

struct Noisy(&'static str);

impl Drop for Noisy {
    fn drop(&mut self) {
        println!("[{}] dropped", self.0);
    }
}

fn main() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();

    println!("[main] creating outer coroutine");

    let mut outer = Builder::new()
        .name("outer".into())
        .spawn(|yielder: &Yielder<u32>| {
            let _noisy = Noisy("outer");
            let mut inner = Builder::new()
                .name("inner".into())
                .spawn(|yielder: &Yielder<u32>| {
                    let _noisy = Noisy("inner");
                    loop {
                        println!("[inner] got {}", yielder.get());
                        yielder.suspend();
                    }
                })
                .unwrap();

            loop {
                let value = yielder.get();
                println!("[outer] forwarding {} to inner", value * 10);
                yielder.transfer(&mut inner, value * 10);
            }
        })
        .unwrap();

    for i in 1..4 {
        println!("[main] calling outer with {}", i);
        outer.call(i);
    }

    println!("[main] dropping {:?}", outer);
    drop(outer);

    // A default handle is not attached to any body.
    let idle = Coroutine::<u32>::default();
    println!("[main] idle handle is active: {}", idle.is_active());

    println!("[main] exiting");
}

#[test]
fn nested() {
    main()
}
