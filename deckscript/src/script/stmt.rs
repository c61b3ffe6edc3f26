//! Statement trees.
//!
//! Statements come from the template loader, which parses the XML elements of
//! a face or card block and attaches each element's source location.  The
//! engine only executes them.  Trees are immutable once built and can be
//! shared between executors.
//!
//! | Kind | Template element |
//! |------|------------------|
//! | `Sequence` | element body |
//! | `DrawRect` / `DrawText` / `DrawImage` | `<rect>`, `<text>`, `<image>` |
//! | `SelectFace` | `<face>` |
//! | `ForEach` | `<for-each var in>` |
//! | `For` | `<for var from to [step]>` |
//! | `If` / `While` | `<if cond>`, `<while cond>` |
//! | `Case` | `<case>` with `<when cond>` children and an optional `<else>` |
//! | `SetName` / `SetDescription` | `<name>`, `<description>` |
//! | `SetVar` | `<set var value>` |

use std::fmt;

use super::expr::Expr;

/// Source position of a statement (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, col {}", self.line, self.column)
    }
}

/// A statement and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub location: Location,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Sequence(Vec<Stmt>),
    /// Missing colors draw nothing for that part; line width defaults to 1.
    DrawRect {
        x: Expr,
        y: Expr,
        width: Expr,
        height: Expr,
        fill: Option<Expr>,
        line_color: Option<Expr>,
        line_width: Option<Expr>,
    },
    DrawText {
        x: Expr,
        y: Expr,
        width: Expr,
        height: Expr,
        /// Evaluates to a style name.
        style: Expr,
        /// Evaluates to text markup.
        text: Expr,
    },
    DrawImage {
        x: Expr,
        y: Expr,
        /// Evaluates to a path relative to the template base.
        src: Expr,
        align_x: Option<Expr>,
        align_y: Option<Expr>,
    },
    SelectFace(Box<Stmt>),
    ForEach {
        var: String,
        source: Expr,
        body: Box<Stmt>,
    },
    For {
        var: String,
        from: Expr,
        to: Expr,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    If {
        cond: Expr,
        body: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Case {
        whens: Vec<WhenBlock>,
        else_body: Option<Box<Stmt>>,
    },
    SetName(Expr),
    SetDescription(Expr),
    SetVar {
        var: String,
        value: Expr,
    },
}

/// One `<when>` arm of a `Case`.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenBlock {
    pub location: Location,
    pub cond: Expr,
    pub body: Stmt,
}

impl WhenBlock {
    pub fn new(location: Location, cond: Expr, body: Stmt) -> Self {
        WhenBlock {
            location,
            cond,
            body,
        }
    }
}

// ── Constructors ──────────────────────────────────────────────────────────────

impl Stmt {
    pub fn new(location: Location, kind: StmtKind) -> Self {
        Stmt { location, kind }
    }

    pub fn sequence(location: Location, stmts: Vec<Stmt>) -> Self {
        Stmt::new(location, StmtKind::Sequence(stmts))
    }

    pub fn select_face(location: Location, body: Stmt) -> Self {
        Stmt::new(location, StmtKind::SelectFace(Box::new(body)))
    }

    pub fn for_each(location: Location, var: impl Into<String>, source: Expr, body: Stmt) -> Self {
        Stmt::new(
            location,
            StmtKind::ForEach {
                var: var.into(),
                source,
                body: Box::new(body),
            },
        )
    }

    pub fn for_range(
        location: Location,
        var: impl Into<String>,
        from: Expr,
        to: Expr,
        step: Option<Expr>,
        body: Stmt,
    ) -> Self {
        Stmt::new(
            location,
            StmtKind::For {
                var: var.into(),
                from,
                to,
                step,
                body: Box::new(body),
            },
        )
    }

    pub fn if_then(location: Location, cond: Expr, body: Stmt) -> Self {
        Stmt::new(
            location,
            StmtKind::If {
                cond,
                body: Box::new(body),
            },
        )
    }

    pub fn while_loop(location: Location, cond: Expr, body: Stmt) -> Self {
        Stmt::new(
            location,
            StmtKind::While {
                cond,
                body: Box::new(body),
            },
        )
    }

    pub fn case(location: Location, whens: Vec<WhenBlock>, else_body: Option<Stmt>) -> Self {
        Stmt::new(
            location,
            StmtKind::Case {
                whens,
                else_body: else_body.map(Box::new),
            },
        )
    }

    pub fn set_name(location: Location, value: Expr) -> Self {
        Stmt::new(location, StmtKind::SetName(value))
    }

    pub fn set_description(location: Location, value: Expr) -> Self {
        Stmt::new(location, StmtKind::SetDescription(value))
    }

    pub fn set_var(location: Location, var: impl Into<String>, value: Expr) -> Self {
        Stmt::new(
            location,
            StmtKind::SetVar {
                var: var.into(),
                value,
            },
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
