use std::process::exit;

use log::warn;

use deckscript::cli;
use deckscript::config::Config;

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("deckscript: {e}");
            eprintln!("{}", cli::USAGE);
            exit(1);
        }
    };

    let level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &args.config {
        Some(path) => match Config::load_file(path) {
            Ok((config, errors)) => {
                for e in errors {
                    warn!("{}: {e}", path.display());
                }
                config
            }
            Err(e) => {
                eprintln!("deckscript: {}: {e}", path.display());
                exit(1);
            }
        },
        None => Config::new(),
    };
    if let Some(fuel) = args.fuel {
        config.options.fuel = fuel;
    }

    match cli::run(&args, &config) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("deckscript: {e}");
            exit(1);
        }
    }
}
