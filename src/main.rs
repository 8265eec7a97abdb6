fn main() {
    if let Err(err) = csv_mart::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
