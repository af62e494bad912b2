fn main() {
    if let Err(err) = runlog_lib::run() {
        log::error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
