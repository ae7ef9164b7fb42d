fn main() {
    if let Err(e) = medipredict_lib::run() {
        eprintln!("medipredict: {e}");
        std::process::exit(1);
    }
}
