//! Name resolution for templates: text styles, inline symbols and asset paths.
//!
//! The executor and the markup renderer only see the [`Resolver`] trait.
//! [`TemplateContext`] is the in-memory implementation filled in by the
//! configuration loader (or directly by a host that already parsed its deck
//! definition).

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ValidateError};

/// A named text style.  Parameters are free-form (`font`, `size`, `color`, …)
/// and are interpreted by the renderer, not by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextStyle {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl TextStyle {
    pub fn new(name: impl Into<String>) -> Self {
        TextStyle {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// CSS class the renderer emits for text in this style.
    pub fn class_id(&self) -> String {
        format!("text-style-{}", self.name)
    }
}

/// An icon usable inside text markup as `@name`.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineSymbol {
    pub name: String,
    /// Image source, relative to the template base path.
    pub src: String,
    /// Vertical nudge in pixels; 0 leaves the icon on the baseline.
    pub offset_y: f64,
}

/// Lookups the engine needs from its host.
pub trait Resolver {
    fn resolve_style(&self, name: &str) -> Result<&TextStyle>;

    fn resolve_inline(&self, name: &str) -> Result<&InlineSymbol>;

    /// Turn a template-relative path into an absolute one.
    fn resolve_path(&self, relative: &str) -> String;
}

/// In-memory [`Resolver`].
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    base_path: PathBuf,
    styles: HashMap<String, TextStyle>,
    inlines: HashMap<String, InlineSymbol>,
}

impl TemplateContext {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        TemplateContext {
            base_path: base_path.into(),
            ..Default::default()
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn set_base_path(&mut self, base_path: impl Into<PathBuf>) {
        self.base_path = base_path.into();
    }

    /// Add or replace a style.
    pub fn add_style(&mut self, style: TextStyle) {
        self.styles.insert(style.name.clone(), style);
    }

    /// Add or replace an inline symbol.
    pub fn add_inline(&mut self, name: impl Into<String>, src: impl Into<String>, offset_y: f64) {
        let name = name.into();
        self.inlines.insert(
            name.clone(),
            InlineSymbol {
                name,
                src: src.into(),
                offset_y,
            },
        );
    }

    pub fn style_count(&self) -> usize {
        self.styles.len()
    }

    pub fn inline_count(&self) -> usize {
        self.inlines.len()
    }
}

impl Resolver for TemplateContext {
    fn resolve_style(&self, name: &str) -> Result<&TextStyle> {
        self.styles
            .get(name)
            .ok_or_else(|| ValidateError::new(format!("text style '{name}' is not defined")))
    }

    fn resolve_inline(&self, name: &str) -> Result<&InlineSymbol> {
        self.inlines
            .get(name)
            .ok_or_else(|| ValidateError::new(format!("inline symbol '{name}' is not defined")))
    }

    fn resolve_path(&self, relative: &str) -> String {
        let joined = self.base_path.join(relative);
        let absolute = if joined.is_absolute() {
            joined
        } else {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(joined),
                Err(_) => joined,
            }
        };
        normalize(&absolute).display().to_string()
    }
}

/// Drop `.` and fold `..` lexically, without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TemplateContext {
        let mut ctx = TemplateContext::new("/decks/goblins");
        ctx.add_style(TextStyle::new("title").with_param("size", "24"));
        ctx.add_inline("coin", "icons/coin.png", -3.0);
        ctx
    }

    #[test]
    fn styles_resolve_by_name() {
        let ctx = ctx();
        let style = ctx.resolve_style("title").unwrap();
        assert_eq!(style.params.get("size").map(String::as_str), Some("24"));
        assert_eq!(style.class_id(), "text-style-title");
        let e = ctx.resolve_style("body").unwrap_err();
        assert_eq!(e.message(), "text style 'body' is not defined");
    }

    #[test]
    fn inlines_resolve_by_name() {
        let ctx = ctx();
        assert_eq!(ctx.resolve_inline("coin").unwrap().offset_y, -3.0);
        assert!(ctx.resolve_inline("gem").is_err());
    }

    #[test]
    fn paths_are_joined_and_normalized() {
        let ctx = ctx();
        assert_eq!(ctx.resolve_path("art/./orc.png"), "/decks/goblins/art/orc.png");
        assert_eq!(ctx.resolve_path("../shared/back.png"), "/decks/shared/back.png");
        assert_eq!(ctx.resolve_path("/abs/img.png"), "/abs/img.png");
    }

    #[test]
    fn relative_base_is_made_absolute() {
        let ctx = TemplateContext::new("assets");
        assert!(Path::new(&ctx.resolve_path("a.png")).is_absolute());
    }
}
