//! Deck configuration file parser.
//!
//! A configuration file declares what templates can refer to by name, plus
//! execution limits:
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `/set fuel=<n>` or `/set fuel <n>` | statement budget per executor |
//! | `/base <dir>` | directory that image and icon paths are relative to |
//! | `/style <name> [key=value …]` | define a text style; `parent=<style>` inherits |
//! | `/inline <name> <src> [offset]` | define an `@name` icon for text markup |
//! | Lines starting with `;` | comment, ignored |
//! | Any other `/command` | skipped |
//!
//! Values may be double-quoted to include spaces (`font="Open Sans"`).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use thiserror::Error;

use crate::context::{Resolver, TemplateContext, TextStyle};
use crate::script::ExecOptions;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Parsed configuration: the resolution context and execution options.
#[derive(Debug, Clone)]
pub struct Config {
    pub context: TemplateContext,
    pub options: ExecOptions,
    /// Whether a `/base` directive was seen.
    base_set: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            context: TemplateContext::new("."),
            options: ExecOptions::default(),
            base_set: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Unknown directives are skipped so that one file can also carry
    /// settings for other tools.  Returns the config and a list of any
    /// errors on recognised lines; a bad line leaves the config unchanged.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            let Some(rest) = line.strip_prefix('/') else {
                errors.push(ConfigError {
                    line: lineno,
                    message: format!("expected a /directive, got '{line}'"),
                });
                continue;
            };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));
            let tokens = split_args(args_str.trim());

            let result = match cmd {
                "set" => parse_set(&tokens, &mut config.options),
                "base" => parse_base(&tokens).map(|dir| {
                    config.context.set_base_path(dir);
                    config.base_set = true;
                }),
                "style" => parse_style(&tokens, &config.context)
                    .map(|style| config.context.add_style(style)),
                "inline" => parse_inline(&tokens, &mut config.context),
                _ => {
                    debug!("config line {lineno}: skipping /{cmd}");
                    Ok(())
                }
            };
            if let Err(message) = result {
                errors.push(ConfigError {
                    line: lineno,
                    message,
                });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    ///
    /// The base path defaults to the file's directory, and a relative
    /// `/base` is taken relative to it.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        let (mut config, errors) = Self::load_str(&s);
        let dir = path.parent().unwrap_or(Path::new("."));
        let base = if config.base_set {
            dir.join(config.context.base_path())
        } else {
            dir.to_path_buf()
        };
        config.context.set_base_path(base);
        Ok((config, errors))
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.  Quotes may start mid-token (`key="a b"`).
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── Directives ────────────────────────────────────────────────────────────────

fn parse_set(tokens: &[String], options: &mut ExecOptions) -> Result<(), String> {
    if tokens.is_empty() {
        return Err("/set: requires an argument".into());
    }

    let (name, value) = if let Some((name, value)) = tokens[0].split_once('=') {
        (name.to_owned(), value.to_owned())
    } else if tokens.len() >= 2 {
        (tokens[0].clone(), tokens[1..].join(" "))
    } else {
        return Err(format!("/set: missing value for '{}'", tokens[0]));
    };

    match name.as_str() {
        "fuel" => match value.trim().parse::<u64>() {
            Ok(fuel) if fuel > 0 => {
                options.fuel = fuel;
                Ok(())
            }
            _ => Err(format!("/set: fuel must be a positive integer, got '{value}'")),
        },
        "" => Err("/set: variable name cannot be empty".into()),
        other => Err(format!("/set: unknown setting '{other}'")),
    }
}

fn parse_base(tokens: &[String]) -> Result<PathBuf, String> {
    match tokens {
        [dir] => Ok(PathBuf::from(dir)),
        [] => Err("/base: requires a directory".into()),
        _ => Err(format!("/base: expected 1 argument, got {}", tokens.len())),
    }
}

fn style_name_regex() -> Result<&'static Regex, String> {
    static NAME: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = NAME.get() {
        return Ok(re);
    }
    let re = Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").map_err(|e| e.to_string())?;
    Ok(NAME.get_or_init(|| re))
}

fn parse_style(tokens: &[String], context: &TemplateContext) -> Result<TextStyle, String> {
    let Some((name, params)) = tokens.split_first() else {
        return Err("/style: requires a name".into());
    };
    if !style_name_regex()?.is_match(name) {
        return Err(format!(
            "/style: invalid name '{name}' (letters, digits, '_' and '-', starting with a letter)"
        ));
    }

    let mut style = TextStyle::new(name.as_str());
    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            return Err(format!("/style: expected key=value, got '{param}'"));
        };
        if key == "parent" {
            let parent = context
                .resolve_style(value)
                .map_err(|e| format!("/style: {e}"))?;
            for (k, v) in &parent.params {
                style.params.entry(k.clone()).or_insert_with(|| v.clone());
            }
        } else {
            style.params.insert(key.to_owned(), value.to_owned());
        }
    }
    Ok(style)
}

fn parse_inline(tokens: &[String], context: &mut TemplateContext) -> Result<(), String> {
    let (name, src, offset) = match tokens {
        [name, src] => (name, src, 0.0),
        [name, src, offset] => {
            let offset = offset
                .parse::<f64>()
                .map_err(|_| format!("/inline: invalid offset '{offset}'"))?;
            (name, src, offset)
        }
        _ => return Err("/inline: expected <name> <src> [offset]".into()),
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!(
            "/inline: invalid name '{name}' (letters, digits and '_' only)"
        ));
    }
    context.add_inline(name.as_str(), src.as_str(), offset);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
