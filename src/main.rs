fn main() {
    if let Err(err) = etl_mapper::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
