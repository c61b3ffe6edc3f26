//! Deck instantiation.
//!
//! A [`DeckTemplate`] is what the template loader produces for one `<deck>`:
//! optional shared faces (the default back and the face shown for hidden
//! cards) and blocks of card data, each with the statements that render it.
//! [`DeckBuilder`] runs those statements and collects the results:
//!
//! 1. Shared faces run once with no card and a fresh face already selected.
//!    Faces that come out identical are stored once across all decks.
//! 2. Every card runs the renderers of its block, in order, in one executor
//!    with `card` bound to the card's data record.
//! 3. A card must end up with a front face, and with a back face of its own
//!    or the deck's default back.
//!
//! The first failure aborts the whole deck.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::context::Resolver;
use crate::error::{Result, ValidateError};
use crate::face::{CardRecord, FaceRecorder};
use crate::script::{ExecOptions, Executor, Record, Stmt, Value};

// ── Templates ─────────────────────────────────────────────────────────────────

/// One card's data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardData {
    /// Copies to print.
    pub count: u32,
    pub data: Record,
}

impl CardData {
    pub fn new(data: Record) -> Self {
        CardData { count: 1, data }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// The data as a JSON object, for error messages.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.data).unwrap_or_else(|_| format!("{:?}", self.data))
    }
}

/// Cards that share the same renderers.
#[derive(Debug, Clone, Default)]
pub struct CardBlock {
    pub cards: Vec<CardData>,
    pub renderers: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct DeckTemplate {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub back_default: Option<Stmt>,
    pub face_hidden: Option<Stmt>,
    pub card_blocks: Vec<CardBlock>,
}

impl DeckTemplate {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        DeckTemplate {
            name: name.into(),
            width,
            height,
            scale: 1.0,
            back_default: None,
            face_hidden: None,
            card_blocks: Vec::new(),
        }
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// A built deck.  Shared faces are reference-counted because identical
/// faces are stored once for all decks of a builder.
#[derive(Debug, Clone)]
pub struct DeckRecord {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub default_back: Option<Arc<FaceRecorder>>,
    pub hidden_face: Option<Arc<FaceRecorder>>,
    pub cards: Vec<CardRecord>,
}

impl DeckRecord {
    /// Printed card count, copies included.
    pub fn total_count(&self) -> u32 {
        self.cards.iter().map(|c| c.count).sum()
    }
}

// ── Building ──────────────────────────────────────────────────────────────────

/// Run a shared template face and return what it drew.
pub fn build_face(template: &Stmt, resolver: &dyn Resolver, options: ExecOptions) -> Result<FaceRecorder> {
    let mut face = FaceRecorder::new();
    Executor::for_face(resolver, &mut face, options).execute(template)?;
    debug!("built template face with {} commands", face.commands.len());
    Ok(face)
}

/// Run a card block's renderers for one card.
pub fn build_card(
    card: &CardData,
    block: &CardBlock,
    resolver: &dyn Resolver,
    options: ExecOptions,
) -> Result<CardRecord> {
    let mut record = CardRecord::new(card.count);
    if let Some(name) = card.data.get("name") {
        record.name = name.clone();
    }
    if let Some(description) = card.data.get("description") {
        record.description = description.clone();
    }

    let rendered = {
        let mut ex = Executor::for_card(resolver, &mut record, options);
        ex.env_mut().set("card", Value::Record(card.data.clone()));
        block.renderers.iter().try_for_each(|r| ex.execute(r))
    };
    rendered.map_err(|e| e.context(format!("while rendering card {}", card.to_json())))?;

    if record.front.is_none() {
        return Err(ValidateError::new(format!(
            "no front face for card {}",
            card.to_json()
        )));
    }
    debug!("built card '{}' x{}", record.name, record.count);
    Ok(record)
}

/// Builds decks, sharing identical template faces between them.
pub struct DeckBuilder<'a> {
    resolver: &'a dyn Resolver,
    options: ExecOptions,
    unique_faces: HashMap<String, Arc<FaceRecorder>>,
}

impl<'a> DeckBuilder<'a> {
    pub fn new(resolver: &'a dyn Resolver, options: ExecOptions) -> Self {
        DeckBuilder {
            resolver,
            options,
            unique_faces: HashMap::new(),
        }
    }

    /// Distinct template faces built so far.
    pub fn unique_face_count(&self) -> usize {
        self.unique_faces.len()
    }

    pub fn build_deck(&mut self, template: &DeckTemplate) -> Result<DeckRecord> {
        self.build_deck_inner(template)
            .map_err(|e| e.context(format!("while building deck '{}'", template.name)))
    }

    fn build_deck_inner(&mut self, template: &DeckTemplate) -> Result<DeckRecord> {
        let default_back = template
            .back_default
            .as_ref()
            .map(|t| self.shared_face(t))
            .transpose()?;
        let hidden_face = template
            .face_hidden
            .as_ref()
            .map(|t| self.shared_face(t))
            .transpose()?;

        let mut cards = Vec::new();
        for block in &template.card_blocks {
            for data in &block.cards {
                let card = build_card(data, block, self.resolver, self.options)?;
                if card.back.is_none() && default_back.is_none() {
                    return Err(ValidateError::new(format!(
                        "no back face for card {}",
                        data.to_json()
                    )));
                }
                cards.push(card);
            }
        }

        debug!("built deck '{}' with {} cards", template.name, cards.len());
        Ok(DeckRecord {
            name: template.name.clone(),
            width: template.width,
            height: template.height,
            scale: template.scale,
            default_back,
            hidden_face,
            cards,
        })
    }

    fn shared_face(&mut self, template: &Stmt) -> Result<Arc<FaceRecorder>> {
        let face = build_face(template, self.resolver, self.options)?;
        let key = face.render();
        if let Some(existing) = self.unique_faces.get(&key) {
            debug!("reusing identical template face");
            return Ok(Arc::clone(existing));
        }
        let face = Arc::new(face);
        self.unique_faces.insert(key, Arc::clone(&face));
        Ok(face)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
