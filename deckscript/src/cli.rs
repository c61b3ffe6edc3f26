//! Command-line argument parsing.
//!
//! Usage:
//!   deckscript [-c<config>] [-F<fuel>] [-d] -e<expr>     [field=value …]
//!   deckscript [-c<config>] [-F<fuel>] [-d] -t<template> [field=value …]
//!   deckscript [-c<config>] [-F<fuel>] [-d] -m<text>     [field=value …]
//!
//! `field=value` pairs make up the `card` record seen by the expression.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::script::{parse_expression, parse_template, render_markup, Executor, Record, Value};

pub const USAGE: &str =
    "Usage: deckscript [-c<config>] [-F<fuel>] [-d] (-e<expr> | -t<template> | -m<text>) [field=value ...]";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Configuration file (`-c<file>`).
    pub config: Option<PathBuf>,
    /// Statement budget override (`-F<n>`).
    pub fuel: Option<u64>,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// What to evaluate.
    pub mode: Mode,
    /// The `card` record, from trailing `field=value` pairs.
    pub card: Record,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// No `-e`, `-t` or `-m` given.
    #[default]
    Missing,
    /// `-e<expr>`: evaluate a full expression.
    Expr(String),
    /// `-t<template>`: evaluate a `${…}` template string.
    Template(String),
    /// `-m<text>`: render text markup.
    Markup(String),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            let flag = chars[j];
            match flag {
                'd' => args.debug = true,

                // Flags taking a value, embedded (-e1+2) or separate (-e 1+2).
                'c' | 'F' | 'e' | 't' | 'm' => {
                    let value = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err(format!("-{flag} requires an argument"));
                    };
                    match flag {
                        'c' => args.config = Some(PathBuf::from(value)),
                        'F' => {
                            let fuel = value
                                .parse::<u64>()
                                .ok()
                                .filter(|&n| n > 0)
                                .ok_or_else(|| format!("invalid fuel: {value}"))?;
                            args.fuel = Some(fuel);
                        }
                        _ => {
                            if args.mode != Mode::Missing {
                                return Err("only one of -e, -t and -m may be given".to_owned());
                            }
                            args.mode = match flag {
                                'e' => Mode::Expr(value),
                                't' => Mode::Template(value),
                                _ => Mode::Markup(value),
                            };
                        }
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    if args.mode == Mode::Missing {
        return Err("one of -e, -t or -m is required".to_owned());
    }

    // Positional arguments → card fields.
    for field in positional {
        let Some((name, value)) = field.split_once('=') else {
            return Err(format!("expected field=value, got '{field}'"));
        };
        if name.is_empty() {
            return Err(format!("empty field name in '{field}'"));
        }
        args.card.insert(name.to_owned(), value.to_owned());
    }

    Ok(args)
}

// ── Running ───────────────────────────────────────────────────────────────────

/// Evaluate what `args` asks for against `config`, returning the output text.
pub fn run(args: &CliArgs, config: &Config) -> Result<String> {
    let expr = match &args.mode {
        Mode::Expr(src) => parse_expression(src)?,
        Mode::Template(src) => parse_template(src)?,
        Mode::Markup(text) => return render_markup(text, &config.context),
        Mode::Missing => return Ok(String::new()),
    };
    let mut ex = Executor::new(&config.context, config.options);
    ex.env_mut().set("card", Value::Record(args.card.clone()));
    ex.eval(&expr)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn mode_is_required() {
        assert!(parse_argv(&argv(&[])).is_err());
        assert!(parse_argv(&argv(&["-d"])).is_err());
    }

    #[test]
    fn expr_embedded_and_separate() {
        let a = parse_argv(&argv(&["-e1+2"])).unwrap();
        assert_eq!(a.mode, Mode::Expr("1+2".into()));
        let a = parse_argv(&argv(&["-e", "1 + 2"])).unwrap();
        assert_eq!(a.mode, Mode::Expr("1 + 2".into()));
    }

    #[test]
    fn combined_flags() {
        let a = parse_argv(&argv(&["-dF100", "-m", "**x**"])).unwrap();
        assert!(a.debug);
        assert_eq!(a.fuel, Some(100));
        assert_eq!(a.mode, Mode::Markup("**x**".into()));
    }

    #[test]
    fn config_path() {
        let a = parse_argv(&argv(&["-cdeck.cfg", "-tx"])).unwrap();
        assert_eq!(a.config, Some(PathBuf::from("deck.cfg")));
    }

    #[test]
    fn card_fields() {
        let a = parse_argv(&argv(&["-e", "card.cost", "cost=3", "name=Orc=King"])).unwrap();
        assert_eq!(a.card.get("cost").map(String::as_str), Some("3"));
        assert_eq!(a.card.get("name").map(String::as_str), Some("Orc=King"));
    }

    #[test]
    fn bad_arguments() {
        assert!(parse_argv(&argv(&["-e1", "-t2"])).is_err());
        assert!(parse_argv(&argv(&["-e1", "loose"])).is_err());
        assert!(parse_argv(&argv(&["-e1", "=v"])).is_err());
        assert!(parse_argv(&argv(&["-F0", "-e1"])).is_err());
        assert!(parse_argv(&argv(&["-e"])).is_err());
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }

    #[test]
    fn run_each_mode() {
        let config = Config::new();
        let a = parse_argv(&argv(&["-e", "card.cost * 2", "cost=4"])).unwrap();
        assert_eq!(run(&a, &config).unwrap(), "8");
        let a = parse_argv(&argv(&["-t", "Pay ${card.cost}$$", "cost=4"])).unwrap();
        assert_eq!(run(&a, &config).unwrap(), "Pay 4$");
        let a = parse_argv(&argv(&["-m", "a\n\nb"])).unwrap();
        assert_eq!(run(&a, &config).unwrap(), "a<p>b");
    }

    #[test]
    fn run_reports_errors() {
        let config = Config::new();
        let a = parse_argv(&argv(&["-e", "card.cost"])).unwrap();
        assert_eq!(run(&a, &config).unwrap(), "");
        let a = parse_argv(&argv(&["-e", "nope"])).unwrap();
        assert_eq!(
            run(&a, &config).unwrap_err().message(),
            "variable 'nope' doesn't exist"
        );
    }
}
