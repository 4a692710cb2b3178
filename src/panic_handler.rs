use std::io::{self, Write};
use std::panic;

pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // The log file is often the only trace left after a crash
        log::error!("Panic: {panic_info}");
        log::logger().flush();

        restore_prompt();
        default_hook(panic_info);

        std::process::exit(1);
    }));
}

/// Leave stdout on a fresh line so the panic report isn't glued to the prompt
pub fn restore_prompt() {
    let _ = io::stdout().flush();
    let _ = writeln!(io::stderr());
}
