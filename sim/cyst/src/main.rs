use cyst::cli::parse_args;

/// Runs the simulation named on the command line.
fn main() {
    println!("cyst v{}", env!("CARGO_PKG_VERSION"));
    if let Err(e) = parse_args() {
        eprintln!("{e}");
        std::process::exit(1);
    }
    println!("Done");
}
