//! End-to-end engine scenarios: parse expressions, build statement trees the
//! way the template loader does, and run them through executors and decks.

use deckscript::context::{TemplateContext, TextStyle};
use deckscript::deck::{CardBlock, CardData, DeckBuilder, DeckTemplate};
use deckscript::face::{CardRecord, DrawCommand, FaceRecorder, Rect};
use deckscript::script::{
    parse_expression, parse_template, ExecOptions, Executor, Expr, Location, Parser, Record, Stmt,
    StmtKind, Value, WhenBlock,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn ctx() -> TemplateContext {
    let mut ctx = TemplateContext::new("/decks/dungeon");
    ctx.add_style(TextStyle::new("title").with_param("size", "18"));
    ctx.add_style(TextStyle::new("rules").with_param("size", "11"));
    ctx.add_inline("atk", "icons/sword.png", -2.0);
    ctx.add_inline("def", "icons/shield.png", 0.0);
    ctx
}

fn e(src: &str) -> Expr {
    parse_expression(src).unwrap_or_else(|err| panic!("{src}: {err}"))
}

fn t(src: &str) -> Expr {
    parse_template(src).unwrap_or_else(|err| panic!("{src}: {err}"))
}

fn at(line: u32, column: u32) -> Location {
    Location::new(line, column)
}

fn seq(line: u32, stmts: Vec<Stmt>) -> Stmt {
    Stmt::sequence(at(line, 1), stmts)
}

fn eval(src: &str) -> Result<Value, String> {
    let ctx = ctx();
    let ex = Executor::new(&ctx, ExecOptions::default());
    ex.compute(&e(src)).map_err(|err| err.to_string())
}

fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn text(line: u32, y: i64, style: &str, body: Expr) -> Stmt {
    Stmt::new(
        at(line, 5),
        StmtKind::DrawText {
            x: e("10"),
            y: Expr::literal(y),
            width: e("230"),
            height: e("30"),
            style: Expr::literal(style),
            text: body,
        },
    )
}

// ── Expressions ───────────────────────────────────────────────────────────────

#[test]
fn arithmetic_and_comparison() {
    assert_eq!(eval("2 + 3 * 4"), Ok(Value::Int(14)));
    assert_eq!(eval("(2 + 3) * 4"), Ok(Value::Int(20)));
    assert_eq!(eval("1 + 1 = 2"), Ok(Value::Int(1)));
    assert_eq!(eval("10 - 2 - 3"), Ok(Value::Int(5)));
    assert_eq!(eval("-7 % 3"), Ok(Value::Int(2)));
    assert_eq!(eval("7 % -3"), Ok(Value::Int(-2)));
    assert_eq!(eval("1 / 4"), Ok(Value::Float(0.25)));
    assert_eq!(eval("'abc' LT 'abd'"), Ok(Value::Int(1)));
    assert_eq!(eval("3 >= 3 and 2 < 1 or 1"), Ok(Value::Int(1)));
    assert_eq!(eval("#words('a b c')"), Ok(Value::Int(3)));
}

#[test]
fn no_short_circuit() {
    let err = eval("0 and (1 / 0)").unwrap_err();
    assert!(err.contains("division by zero"), "{err}");
    let err = eval("1 or (1 % 0)").unwrap_err();
    assert!(err.contains("modulo by zero"), "{err}");
}

#[test]
fn string_escapes() {
    for src in [r"'\x41'", "'A'", r"'\U00000041'", r"'\u0041'"] {
        assert_eq!(eval(src), Ok(Value::from("A")), "{src}");
    }
    assert!(parse_expression(r"'\q'").is_err());
    assert!(parse_expression(r"'\uD800'").is_err());
}

#[test]
fn leading_zero_literal() {
    let mut p = Parser::new("007");
    assert_eq!(p.parse_expr().unwrap(), Expr::literal(0));
    assert_eq!(p.pos(), 1);
    assert!(parse_expression("007").is_err());
}

#[test]
fn builtin_functions() {
    assert_eq!(eval("join(split('a,b,c', ','), '-')"), Ok(Value::from("a-b-c")));
    assert_eq!(eval("substring('dungeon', -4, 100)"), Ok(Value::from("geon")));
    assert_eq!(eval("repeat('*', 3)"), Ok(Value::from("***")));
    assert_eq!(eval("contains('Goblin King', 'K.ng')"), Ok(Value::Int(1)));
    assert_eq!(eval("round(2.5) + floor(-0.5) + ceil(0.1)"), Ok(Value::Int(3)));
    assert_eq!(eval("max(2, 2.5)"), Ok(Value::Float(2.5)));
    assert_eq!(eval("toint('12') + tonumber(' 0.5 ')"), Ok(Value::Float(12.5)));
    assert!(eval("len('abc')").unwrap_err().contains("expected list"));
    assert!(eval("min(1)").unwrap_err().contains("invalid number of arguments"));
}

#[test]
fn lookup_errors() {
    let ctx = ctx();
    let mut ex = Executor::new(&ctx, ExecOptions::default());
    ex.env_mut().set("x", Value::Int(1));
    assert_eq!(
        ex.compute(&e("x.y")).unwrap_err().message(),
        "cannot read property 'y' of non-object"
    );
    assert_eq!(
        ex.compute(&e("z")).unwrap_err().message(),
        "variable 'z' doesn't exist"
    );
}

// ── Statements ────────────────────────────────────────────────────────────────

#[test]
fn loop_variable_is_restored() {
    let ctx = ctx();
    let mut ex = Executor::new(&ctx, ExecOptions::default());
    let prog = seq(
        1,
        vec![
            Stmt::set_var(at(2, 3), "i", e("99")),
            Stmt::for_range(at(3, 3), "i", e("1"), e("3"), None, seq(4, vec![])),
        ],
    );
    ex.execute(&prog).unwrap();
    assert_eq!(ex.env().get("i"), Some(&Value::Int(99)));
}

#[test]
fn countdown_and_zero_step() {
    let ctx = ctx();
    let mut ex = Executor::new(&ctx, ExecOptions::default());
    let body = seq(4, vec![Stmt::set_var(at(5, 5), "out", t("${out}${v},"))]);
    let prog = seq(
        1,
        vec![
            Stmt::set_var(at(2, 3), "out", e("''")),
            Stmt::for_range(at(3, 3), "v", e("5"), e("1"), Some(e("-1")), body.clone()),
        ],
    );
    ex.execute(&prog).unwrap();
    assert_eq!(ex.env().get("out"), Some(&Value::from("5,4,3,2,1,")));

    let zero = Stmt::for_range(at(8, 2), "v", e("1"), e("5"), Some(e("0")), body);
    assert_eq!(
        ex.execute(&zero).unwrap_err().message(),
        "at line 8, col 2: step is 0"
    );
}

#[test]
fn runaway_loop_is_stopped() {
    let ctx = ctx();
    let mut ex = Executor::new(&ctx, ExecOptions { fuel: 500 });
    let prog = Stmt::while_loop(
        at(1, 1),
        e("1"),
        seq(2, vec![Stmt::set_var(at(3, 1), "n", e("1"))]),
    );
    let err = ex.execute(&prog).unwrap_err();
    assert!(err.message().ends_with("evaluation took too many steps"), "{err}");
    assert_eq!(ex.fuel(), 0);
}

#[test]
fn face_selection_rules() {
    let ctx = ctx();
    let mut card = CardRecord::default();
    let mut ex = Executor::for_card(&ctx, &mut card, ExecOptions::default());
    let nested = Stmt::select_face(at(1, 1), Stmt::select_face(at(2, 3), seq(3, vec![])));
    assert_eq!(
        ex.execute(&nested).unwrap_err().message(),
        "at line 1, col 1: at line 2, col 3: face already selected"
    );

    let no_card = crate::ctx();
    let mut ex = Executor::new(&no_card, ExecOptions::default());
    let err = ex.execute(&Stmt::select_face(at(1, 1), seq(2, vec![]))).unwrap_err();
    assert_eq!(err.message(), "at line 1, col 1: no active card");
}

#[test]
fn full_card_render() {
    let ctx = ctx();
    let mut card = CardRecord::default();
    {
        let mut ex = Executor::for_card(&ctx, &mut card, ExecOptions::default());
        ex.env_mut().set(
            "card",
            Value::Record(record(&[
                ("name", "Skeleton"),
                ("attack", "3"),
                ("defense", "1"),
                ("tags", "undead minion"),
            ])),
        );
        let prog = seq(
            1,
            vec![
                Stmt::set_name(at(2, 3), e("card.name")),
                Stmt::set_var(at(3, 3), "y", e("40")),
                Stmt::select_face(
                    at(4, 3),
                    seq(
                        5,
                        vec![
                            text(6, 10, "title", e("card.name")),
                            Stmt::for_each(
                                at(7, 5),
                                "tag",
                                e("words(card.tags)"),
                                seq(
                                    8,
                                    vec![
                                        Stmt::new(
                                            at(9, 7),
                                            StmtKind::DrawText {
                                                x: e("10"),
                                                y: e("y"),
                                                width: e("100"),
                                                height: e("20"),
                                                style: e("'rules'"),
                                                text: t("*${tag}*"),
                                            },
                                        ),
                                        Stmt::set_var(at(10, 7), "y", e("y + 20")),
                                    ],
                                ),
                            ),
                            Stmt::case(
                                at(11, 5),
                                vec![WhenBlock::new(
                                    at(12, 7),
                                    e("card.attack > card.defense"),
                                    text(13, 200, "rules", t("@atk ${card.attack}")),
                                )],
                                Some(text(14, 200, "rules", t("@def ${card.defense}"))),
                            ),
                        ],
                    ),
                ),
            ],
        );
        ex.execute(&prog).unwrap();
        assert_eq!(ex.env().get("y"), Some(&Value::Int(80)));
        assert!(!ex.env().contains("tag"));
    }

    assert_eq!(card.name, "Skeleton");
    let front = card.front.expect("front face");
    assert_eq!(front.commands.len(), 4);
    assert_eq!(
        front.commands[1],
        DrawCommand::Text {
            rect: Rect::new(10, 40, 100, 20),
            style: "rules".into(),
            markup: "<span class=\"markdown-italic\">undead</span>".into(),
        }
    );
    match &front.commands[3] {
        DrawCommand::Text { markup, .. } => assert_eq!(
            markup,
            "<img src=\"/decks/dungeon/icons/sword.png\" class=\"icon-inline\" \
             style=\"transform: translateY(-2px);\"> 3"
        ),
        other => panic!("expected text, got {other:?}"),
    }
    assert!(front.styles.contains("title") && front.styles.contains("rules"));
}

#[test]
fn markup_errors_carry_location() {
    let ctx = ctx();
    let mut face = FaceRecorder::new();
    let mut ex = Executor::for_face(&ctx, &mut face, ExecOptions::default());
    let err = ex
        .execute(&text(3, 0, "rules", e("'gain **2 gold'")))
        .unwrap_err();
    assert_eq!(err.message(), "at line 3, col 5: at position 5: unterminated *");
    let err = ex.execute(&text(4, 0, "rules", e("'@gem'"))).unwrap_err();
    assert_eq!(
        err.message(),
        "at line 4, col 5: at position 0: inline symbol 'gem' is not defined"
    );
}

// ── Decks ─────────────────────────────────────────────────────────────────────

fn monster_deck(name: &str) -> DeckTemplate {
    let mut deck = DeckTemplate::new(name, 250, 350);
    deck.back_default = Some(seq(
        1,
        vec![Stmt::new(
            at(2, 3),
            StmtKind::DrawImage {
                x: e("125"),
                y: e("175"),
                src: e("'back.png'"),
                align_x: Some(e("0.5")),
                align_y: Some(e("0.5")),
            },
        )],
    ));
    deck.card_blocks.push(CardBlock {
        cards: vec![
            CardData::new(record(&[("name", "Rat"), ("cost", "1")])).with_count(4),
            CardData::new(record(&[("name", "Ogre"), ("cost", "5")])),
        ],
        renderers: vec![Stmt::select_face(
            at(10, 1),
            seq(
                11,
                vec![
                    text(12, 10, "title", t("${card.name} (${card.cost})")),
                    Stmt::if_then(
                        at(13, 3),
                        e("tonumber(card.cost) > 3"),
                        text(14, 300, "rules", e("'**Elite**'")),
                    ),
                ],
            ),
        )],
    });
    deck
}

#[test]
fn deck_build() {
    let ctx = ctx();
    let mut builder = DeckBuilder::new(&ctx, ExecOptions::default());
    let deck = builder.build_deck(&monster_deck("monsters")).unwrap();
    assert_eq!(deck.total_count(), 5);
    assert_eq!(deck.cards[0].name, "Rat");
    assert_eq!(deck.cards[0].front.as_ref().unwrap().commands.len(), 1);
    assert_eq!(deck.cards[1].front.as_ref().unwrap().commands.len(), 2);

    let back = deck.default_back.as_ref().unwrap();
    assert_eq!(
        back.render(),
        "<img class=\"image\" style=\"left:125px;top:175px;transform:translateX(-50%) translateY(-50%);\" \
         src=\"/decks/dungeon/back.png\">"
    );

    builder.build_deck(&monster_deck("more monsters")).unwrap();
    assert_eq!(builder.unique_face_count(), 1);
}

#[test]
fn deck_errors_name_deck_and_card() {
    let ctx = ctx();
    let mut template = monster_deck("monsters");
    template.card_blocks[0]
        .cards
        .push(CardData::new(record(&[("name", "Ghost"), ("cost", "many")])));
    let err = DeckBuilder::new(&ctx, ExecOptions::default())
        .build_deck(&template)
        .unwrap_err();
    let msg = err.message();
    assert!(
        msg.starts_with(
            "while building deck 'monsters': while rendering card {\"cost\":\"many\",\"name\":\"Ghost\"}: \
             at line 10, col 1: at line 11, col 1: at line 13, col 3: "
        ),
        "{msg}"
    );
    assert!(msg.ends_with("expected number, got 'many'"), "{msg}");
}
