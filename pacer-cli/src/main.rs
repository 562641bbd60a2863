//! pacer binary entry point.

fn main() {
    // A process spawned as a worker runs its loop here and never returns.
    pacer_core::init_worker();

    if let Err(e) = pacer_cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
