use clap::Parser;
use dapflow::{Cli, run};

fn main() {
    // Reset SIGPIPE so piping JSON into `head` does not panic
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();
    dapflow::init_logging();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}
