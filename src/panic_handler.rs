use std::io::{self, Write};
use std::panic;

pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        log::error!("Panic: {panic_info}");
        log::logger().flush();

        restore_output();
        default_hook(panic_info);

        std::process::exit(1);
    }));
}

/// Finish any partial progress line so the report starts on a fresh line
pub fn restore_output() {
    let _ = io::stdout().flush();
    let _ = writeln!(io::stderr());
}
