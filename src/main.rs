fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = ffarchive::cli::Args::parse();
    if let Err(e) = ffarchive::logging::init(args.verbose) {
        eprintln!("Warning: {:#}", e);
    }
    match ffarchive::cli::run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            if args.verbose {
                let mut source = e.source();
                while let Some(s) = source {
                    eprintln!("  cause: {}", s);
                    source = s.source();
                }
            }
            std::process::exit(e.exit_code());
        }
    }
}
