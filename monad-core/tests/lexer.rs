use monad_core::error::CoreError;
use monad_core::lexer::{parse_number, Lexer, TokenKind};

fn kinds(src: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new(src);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token().expect("lex failure");
        let done = token.kind == TokenKind::Eof;
        out.push(token.kind);
        if done {
            return out;
        }
    }
}

fn first_error(src: &str) -> (String, u32, u32) {
    let mut lexer = Lexer::new(src);
    loop {
        match lexer.next_token() {
            Ok(token) if token.kind == TokenKind::Eof => panic!("expected a lex error"),
            Ok(_) => continue,
            Err(CoreError::Diagnostics(diags)) => {
                let d = &diags[0];
                return (d.message.clone(), d.span.line, d.span.column);
            }
            Err(other) => panic!("unexpected error kind: {other}"),
        }
    }
}

#[test]
fn brackets_and_symbols() {
    assert_eq!(
        kinds("(show x)"),
        vec![
            TokenKind::LParen,
            TokenKind::Symbol("show".into()),
            TokenKind::Symbol("x".into()),
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn positions_are_one_based() {
    let mut lexer = Lexer::new("; comment\n  (+ 12)");
    let open = lexer.next_token().unwrap();
    assert_eq!((open.span.line, open.span.column), (2, 3));
    let plus = lexer.next_token().unwrap();
    assert_eq!(plus.kind, TokenKind::Symbol("+".into()));
    assert_eq!((plus.span.line, plus.span.column), (2, 4));
    let num = lexer.next_token().unwrap();
    assert_eq!(num.kind, TokenKind::Number("12".into()));
    assert_eq!((num.span.column, num.span.end_column), (6, 7));
}

#[test]
fn arrow_is_distinct_from_minus() {
    assert_eq!(
        kinds("-> - -5"),
        vec![
            TokenKind::Arrow,
            TokenKind::Symbol("-".into()),
            TokenKind::Number("-5".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn number_lexemes_keep_their_base_prefix() {
    assert_eq!(
        kinds("0xFF 0b1010 0o77 1.5 42"),
        vec![
            TokenKind::Number("0xFF".into()),
            TokenKind::Number("0b1010".into()),
            TokenKind::Number("0o77".into()),
            TokenKind::Number("1.5".into()),
            TokenKind::Number("42".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn parse_number_handles_all_bases() {
    assert_eq!(parse_number("0xFF"), Some(255.0));
    assert_eq!(parse_number("0b1010"), Some(10.0));
    assert_eq!(parse_number("0o77"), Some(63.0));
    assert_eq!(parse_number("-5"), Some(-5.0));
    assert_eq!(parse_number("1.5"), Some(1.5));
}

#[test]
fn char_literals_decode_escapes() {
    assert_eq!(
        kinds(r"'a' '\n' '\\' '\0'"),
        vec![
            TokenKind::Char(b'a'),
            TokenKind::Char(b'\n'),
            TokenKind::Char(b'\\'),
            TokenKind::Char(0),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn quote_prefix_when_no_closing_tick() {
    assert_eq!(
        kinds("'foo"),
        vec![
            TokenKind::Quote,
            TokenKind::Symbol("foo".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn strings_decode_escapes() {
    assert_eq!(
        kinds("\"a\\nb\\\"c\""),
        vec![TokenKind::Str("a\nb\"c".into()), TokenKind::Eof]
    );
}

#[test]
fn unterminated_string_is_an_error() {
    let (message, line, column) = first_error("  \"oops");
    assert_eq!(message, "unterminated string literal");
    assert_eq!((line, column), (1, 3));
}

#[test]
fn unexpected_byte_names_its_position() {
    let (message, line, column) = first_error("(show\n  @)");
    assert_eq!(message, "unexpected character '@'");
    assert_eq!((line, column), (2, 3));
}

#[test]
fn malformed_numbers_are_rejected() {
    let (message, _, _) = first_error("1.2.3");
    assert_eq!(message, "malformed number literal '1.2.3'");
    let (message, _, _) = first_error("0x");
    assert_eq!(message, "malformed number literal '0x'");
}
