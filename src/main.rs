fn main() {
    if let Err(err) = smart_connect::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
