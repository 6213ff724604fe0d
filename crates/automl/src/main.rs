fn main() {
    let args = std::env::args().collect();
    if let Err(e) = automl::runner::main(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
