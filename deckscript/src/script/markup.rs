//! Inline markup for text draw commands.
//!
//! Runs over the already-evaluated text of a text draw instruction and
//! produces the HTML fragment handed to the face:
//!
//! | Input            | Output                                                   |
//! |------------------|----------------------------------------------------------|
//! | plain text       | HTML-escaped text                                        |
//! | `*text*`         | `<span class="markdown-italic">text</span>`              |
//! | `**text**`       | `<span class="markdown-bold">text</span>`                |
//! | `@name`          | `<img src="…" class="icon-inline">` for inline symbol `name` |
//! | `@@`             | literal `@`                                              |
//! | one line break   | `<br>`                                                   |
//! | two line breaks  | `<p>`                                                    |
//!
//! A line break is `\r\n`, `\r` or `\n`.  A span closes only on an asterisk
//! run of exactly its opening length; a run of any other length is parsed as
//! content of the span.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::context::Resolver;
use crate::error::{Result, ValidateError};

fn is_special(c: char) -> bool {
    matches!(c, '@' | '*' | '\r' | '\n')
}

/// Deepest span nesting accepted.
const MAX_SPAN_DEPTH: usize = 64;

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Render `src` to an HTML fragment, resolving `@name` icons via `resolver`.
pub fn render_markup(src: &str, resolver: &dyn Resolver) -> Result<String> {
    let mut parser = MarkupParser {
        src: src.chars().collect(),
        pos: 0,
        resolver,
        out: String::with_capacity(src.len()),
        depth: 0,
    };
    while !parser.at_end() {
        parser.parse_next()?;
    }
    Ok(parser.out)
}

struct MarkupParser<'a> {
    src: Vec<char>,
    pos: usize,
    resolver: &'a dyn Resolver,
    out: String,
    depth: usize,
}

impl MarkupParser<'_> {
    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn parse_next(&mut self) -> Result<()> {
        match self.peek() {
            Some('\r' | '\n') => {
                self.parse_newline();
                Ok(())
            }
            Some('*') => self.parse_span(),
            Some('@') => self.parse_symbol(),
            Some(_) => {
                self.parse_plain();
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn parse_plain(&mut self) {
        let begin = self.pos;
        while self.peek().is_some_and(|c| !is_special(c)) {
            self.pos += 1;
        }
        let text: String = self.src[begin..self.pos].iter().collect();
        self.out.push_str(&encode_text(&text));
    }

    fn parse_symbol(&mut self) -> Result<()> {
        let at = self.pos;
        self.pos += 1;
        if self.peek() == Some('@') {
            self.pos += 1;
            self.out.push('@');
            return Ok(());
        }
        let begin = self.pos;
        while self.peek().is_some_and(is_symbol_char) {
            self.pos += 1;
        }
        let name: String = self.src[begin..self.pos].iter().collect();
        let symbol = self
            .resolver
            .resolve_inline(&name)
            .map_err(|e| e.context(format!("at position {at}")))?;
        let src = self.resolver.resolve_path(&symbol.src);
        self.out.push_str("<img src=\"");
        self.out.push_str(&encode_double_quoted_attribute(&src));
        self.out.push_str("\" class=\"icon-inline\"");
        if symbol.offset_y != 0.0 {
            self.out.push_str(&format!(
                " style=\"transform: translateY({}px);\"",
                symbol.offset_y
            ));
        }
        self.out.push('>');
        Ok(())
    }

    /// `*…*` or `**…**`, starting at the first asterisk.
    fn parse_span(&mut self) -> Result<()> {
        let open_at = self.pos;
        if self.depth >= MAX_SPAN_DEPTH {
            return Err(ValidateError::at_position(open_at, "markup nested too deeply"));
        }
        self.depth += 1;
        let result = self.parse_span_body(open_at);
        self.depth -= 1;
        result
    }

    fn parse_span_body(&mut self, open_at: usize) -> Result<()> {
        let mut count = 1;
        self.pos += 1;
        if self.peek() == Some('*') {
            self.pos += 1;
            count += 1;
        }
        self.out.push_str(if count == 1 {
            "<span class=\"markdown-italic\">"
        } else {
            "<span class=\"markdown-bold\">"
        });
        loop {
            match self.peek() {
                None => return Err(ValidateError::at_position(open_at, "unterminated *")),
                Some('*') if self.star_run() == count => {
                    self.pos += count;
                    break;
                }
                Some(_) => self.parse_next()?,
            }
        }
        self.out.push_str("</span>");
        Ok(())
    }

    /// Length of the asterisk run at the cursor.
    fn star_run(&self) -> usize {
        self.src[self.pos..].iter().take_while(|c| **c == '*').count()
    }

    fn parse_newline(&mut self) {
        self.eat_newline();
        if self.eat_newline() {
            self.out.push_str("<p>");
        } else {
            self.out.push_str("<br>");
        }
    }

    /// Consume one `\r\n`, `\r` or `\n`.
    fn eat_newline(&mut self) -> bool {
        let mut eaten = false;
        if self.peek() == Some('\r') {
            self.pos += 1;
            eaten = true;
        }
        if self.peek() == Some('\n') {
            self.pos += 1;
            eaten = true;
        }
        eaten
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
