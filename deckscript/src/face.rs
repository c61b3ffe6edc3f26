//! Draw targets for template execution.
//!
//! The executor never renders anything itself; it sends draw commands to a
//! [`Face`] and card metadata to a [`Card`].  Hosts plug their own renderer in
//! behind these traits.  [`FaceRecorder`] and [`CardRecord`] are the in-memory
//! implementations used by the deck builder, the CLI and the tests.
//!
//! `FaceRecorder::render` produces the HTML fragment for a face:
//!
//! | Command | HTML                                                          |
//! |---------|---------------------------------------------------------------|
//! | rect    | `<div class="rect" style="left:…;top:…;width:…;height:…;">`   |
//! | text    | positioned `<div>` wrapping `<div class="text-field text-style-…">` |
//! | image   | `<img class="image" style="…translateX(…%) translateY(…%);">` |

use std::collections::BTreeSet;

use html_escape::encode_double_quoted_attribute;

use crate::context::TextStyle;

/// Axis-aligned rectangle in face pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Rect { x, y, width, height }
    }
}

/// One side of a card.
pub trait Face {
    fn draw_rect(
        &mut self,
        rect: Rect,
        fill: Option<String>,
        line_color: Option<String>,
        line_width: i64,
    );

    /// `markup` is already rendered HTML.
    fn draw_text(&mut self, rect: Rect, style: &TextStyle, markup: String);

    /// `align` is the fraction of the image size to shift left/up, so
    /// `(0.5, 0.5)` centres the image on `pos`.
    fn draw_image(&mut self, pos: (i64, i64), src: String, align: (f64, f64));
}

/// A card being instantiated.
pub trait Card {
    fn set_name(&mut self, name: String);

    fn set_description(&mut self, description: String);

    /// The card's front face, created and attached on first use.
    fn front_face(&mut self) -> &mut dyn Face;
}

// ── Recording implementation ─────────────────────────────────────────────────

/// A single recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect {
        rect: Rect,
        fill: Option<String>,
        line_color: Option<String>,
        line_width: i64,
    },
    Text {
        rect: Rect,
        style: String,
        markup: String,
    },
    Image {
        pos: (i64, i64),
        src: String,
        align: (f64, f64),
    },
}

/// A [`Face`] that keeps every command it receives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceRecorder {
    pub commands: Vec<DrawCommand>,
    /// Names of the text styles used on this face.
    pub styles: BTreeSet<String>,
}

impl FaceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// HTML for the whole face.  Two faces with identical commands render
    /// identically, which is what template deduplication keys on.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Rect {
                    rect,
                    fill,
                    line_color,
                    line_width,
                } => {
                    out.push_str(&format!(
                        "<div class=\"rect\" style=\"left:{}px;top:{}px;width:{}px;height:{}px;",
                        rect.x, rect.y, rect.width, rect.height
                    ));
                    if let Some(fill) = fill {
                        out.push_str(&format!("background-color:{fill};"));
                    }
                    if let Some(line) = line_color {
                        out.push_str(&format!(
                            "border-color:{line};border-style:solid;border-width:{line_width}px;"
                        ));
                    }
                    out.push_str("\"></div>");
                }
                DrawCommand::Text {
                    rect,
                    style,
                    markup,
                } => {
                    out.push_str(&format!(
                        "<div style=\"position:absolute;left:{}px;top:{}px;width:{}px;height:{}px;\">\
                         <div class=\"text-field text-style-{style}\"><p>{markup}</div></div>",
                        rect.x, rect.y, rect.width, rect.height
                    ));
                }
                DrawCommand::Image { pos, src, align } => {
                    out.push_str(&format!(
                        "<img class=\"image\" style=\"left:{}px;top:{}px;\
                         transform:translateX({}%) translateY({}%);\" src=\"{}\">",
                        pos.0,
                        pos.1,
                        shift_percent(align.0),
                        shift_percent(align.1),
                        encode_double_quoted_attribute(src)
                    ));
                }
            }
        }
        out
    }
}

/// Image alignment as a CSS translate percentage, without a `-0`.
fn shift_percent(align: f64) -> f64 {
    if align == 0.0 {
        0.0
    } else {
        -100.0 * align
    }
}

impl Face for FaceRecorder {
    fn draw_rect(
        &mut self,
        rect: Rect,
        fill: Option<String>,
        line_color: Option<String>,
        line_width: i64,
    ) {
        self.commands.push(DrawCommand::Rect {
            rect,
            fill,
            line_color,
            line_width,
        });
    }

    fn draw_text(&mut self, rect: Rect, style: &TextStyle, markup: String) {
        self.styles.insert(style.name.clone());
        self.commands.push(DrawCommand::Text {
            rect,
            style: style.name.clone(),
            markup,
        });
    }

    fn draw_image(&mut self, pos: (i64, i64), src: String, align: (f64, f64)) {
        self.commands.push(DrawCommand::Image { pos, src, align });
    }
}

/// A [`Card`] that records its metadata and faces.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRecord {
    /// Copies of this card in the printed deck.
    pub count: u32,
    pub name: String,
    pub description: String,
    pub front: Option<FaceRecorder>,
    /// Card-specific back; `None` falls back to the deck default.
    pub back: Option<FaceRecorder>,
}

impl CardRecord {
    pub fn new(count: u32) -> Self {
        CardRecord {
            count,
            name: String::new(),
            description: String::new(),
            front: None,
            back: None,
        }
    }
}

impl Default for CardRecord {
    fn default() -> Self {
        CardRecord::new(1)
    }
}

impl Card for CardRecord {
    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn set_description(&mut self, description: String) {
        self.description = description;
    }

    fn front_face(&mut self) -> &mut dyn Face {
        self.front.get_or_insert_with(FaceRecorder::new)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_commands_in_order() {
        let mut face = FaceRecorder::new();
        face.draw_rect(Rect::new(0, 0, 10, 20), Some("#ff0000".into()), None, 1);
        face.draw_image((5, 5), "/a.png".into(), (0.5, 0.0));
        assert_eq!(face.commands.len(), 2);
        assert!(matches!(face.commands[1], DrawCommand::Image { pos: (5, 5), .. }));
    }

    #[test]
    fn render_rect_and_image() {
        let mut face = FaceRecorder::new();
        face.draw_rect(
            Rect::new(1, 2, 3, 4),
            Some("#112233".into()),
            Some("#000000".into()),
            2,
        );
        face.draw_image((10, 20), "/img/a\"b.png".into(), (0.5, 1.0));
        assert_eq!(
            face.render(),
            "<div class=\"rect\" style=\"left:1px;top:2px;width:3px;height:4px;\
             background-color:#112233;border-color:#000000;border-style:solid;border-width:2px;\"></div>\
             <img class=\"image\" style=\"left:10px;top:20px;transform:translateX(-50%) translateY(-100%);\" \
             src=\"/img/a&quot;b.png\">"
        );
    }

    #[test]
    fn render_text_tracks_style() {
        let mut face = FaceRecorder::new();
        let style = TextStyle::new("title");
        face.draw_text(Rect::new(0, 0, 100, 30), &style, "<b>x</b>".into());
        assert!(face.styles.contains("title"));
        assert!(face.render().contains("class=\"text-field text-style-title\"><p><b>x</b>"));
    }

    #[test]
    fn identical_faces_render_identically() {
        let mut a = FaceRecorder::new();
        let mut b = FaceRecorder::new();
        for f in [&mut a, &mut b] {
            f.draw_rect(Rect::new(0, 0, 5, 5), None, None, 1);
        }
        assert_eq!(a.render(), b.render());
        assert_eq!(a, b);
    }

    #[test]
    fn front_face_is_created_once() {
        let mut card = CardRecord::new(3);
        assert!(card.front.is_none());
        card.front_face().draw_rect(Rect::new(0, 0, 1, 1), None, None, 1);
        card.front_face().draw_rect(Rect::new(0, 0, 2, 2), None, None, 1);
        assert_eq!(card.front.as_ref().map(|f| f.commands.len()), Some(2));
        assert_eq!(card.count, 3);
    }
}
