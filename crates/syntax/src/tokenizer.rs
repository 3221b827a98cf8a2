//! Finite-state tokenizer.
//!
//! Each step inspects exactly one upcoming character and yields a
//! [`Step`]: the next state plus one of six actions. Every token
//! pattern is distinguishable within two characters of lookahead
//! (`/` vs `//` vs `/*`, `(` vs `(*`, `:` vs `::` vs `::=`, an integer
//! vs a float's decimal point), so the machine consumes each character
//! at most once and never backtracks.
//!
//! On a bad character the tokenizer fails fast with the exact line and
//! column; there is no recovery or resync. Re-tokenizing the same input
//! yields the same sequence -- the machine is a pure function of it.

use crate::chars::{classify, CharClass};
use crate::error::LexError;
use crate::token::{Span, Token, TokenKind};

// ──────────────────────────────────────────────
// Machine definition
// ──────────────────────────────────────────────

/// What the driver does with the character the state just inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Consume the character into the pending token buffer.
    Read,
    /// Consume the character without buffering it.
    Skip,
    /// Finish the pending token; the character is not consumed.
    Emit(TokenKind),
    /// Fail with a lexical error.
    Error,
    /// Input exhausted; the driver emits nothing further.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Identifier,
    /// Saw `-`; a digit continues into a number, anything else is punctuation.
    Minus,
    /// Saw a leading `0`; `x` continues into a hexadecimal literal.
    Zero,
    Integer,
    /// Saw digits then `.`; only a digit keeps this a float.
    IntegerDot,
    Fraction,
    /// Saw `0x`; at least one hex digit must follow.
    HexPrefix,
    Hex,
    Str { delim: char },
    StrEscape { delim: char },
    /// Saw `/`; `/` or `*` opens a comment, anything else emits the slash.
    Slash,
    LineComment,
    BlockComment,
    /// Saw `*` inside a `/* */` comment.
    BlockCommentStar,
    /// Saw `(`; `*` opens an EBNF comment, anything else emits the paren.
    LParen,
    EbnfComment,
    /// Saw `*` inside a `(* *)` comment.
    EbnfCommentStar,
    /// Saw `:`; a second `:` may extend toward `::=`.
    Colon,
    /// Saw `::`; `=` completes `::=`.
    ColonColon,
    /// A complete single-character punctuation mark.
    Punct,
    /// Token complete, final character already consumed.
    Done(TokenKind),
}

#[derive(Debug, Clone, Copy)]
struct Step {
    next: State,
    action: Action,
}

fn step(next: State, action: Action) -> Step {
    Step { next, action }
}

fn is_identifier_continue(c: char) -> bool {
    matches!(classify(c), CharClass::Letter | CharClass::Digit) || c == '.'
}

/// The transition function. `peek` is `None` at end of input.
fn transition(state: State, peek: Option<char>) -> Step {
    use State::*;
    match state {
        Start => match peek {
            None => step(Start, Action::End),
            Some(c) => match classify(c) {
                CharClass::Whitespace => step(Start, Action::Skip),
                CharClass::Letter => step(Identifier, Action::Read),
                CharClass::Digit if c == '0' => step(Zero, Action::Read),
                CharClass::Digit => step(Integer, Action::Read),
                CharClass::Quote => step(Str { delim: c }, Action::Skip),
                CharClass::Punctuation => match c {
                    '-' => step(Minus, Action::Read),
                    '/' => step(Slash, Action::Read),
                    '(' => step(LParen, Action::Read),
                    ':' => step(Colon, Action::Read),
                    _ => step(Punct, Action::Read),
                },
                CharClass::Control | CharClass::Other => step(Start, Action::Error),
            },
        },
        Identifier => match peek {
            Some(c) if is_identifier_continue(c) => step(Identifier, Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Identifier)),
        },
        Minus => match peek {
            Some('0') => step(Zero, Action::Read),
            Some(c) if c.is_ascii_digit() => step(Integer, Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Punctuation)),
        },
        Zero => match peek {
            Some('x') | Some('X') => step(HexPrefix, Action::Read),
            Some('.') => step(IntegerDot, Action::Read),
            Some(c) if c.is_ascii_digit() => step(Integer, Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Integer)),
        },
        Integer => match peek {
            Some('.') => step(IntegerDot, Action::Read),
            Some(c) if c.is_ascii_digit() => step(Integer, Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Integer)),
        },
        IntegerDot => match peek {
            Some(c) if c.is_ascii_digit() => step(Fraction, Action::Read),
            _ => step(Start, Action::Error),
        },
        Fraction => match peek {
            Some(c) if c.is_ascii_digit() => step(Fraction, Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Float)),
        },
        HexPrefix => match peek {
            Some(c) if c.is_ascii_hexdigit() => step(Hex, Action::Read),
            _ => step(Start, Action::Error),
        },
        Hex => match peek {
            Some(c) if c.is_ascii_hexdigit() => step(Hex, Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Hexadecimal)),
        },
        Str { delim } => match peek {
            None => step(state, Action::Error),
            Some(c) if c == delim => step(Done(TokenKind::Str), Action::Skip),
            Some('\\') => step(StrEscape { delim }, Action::Skip),
            Some(_) => step(state, Action::Read),
        },
        StrEscape { delim } => match peek {
            None => step(state, Action::Error),
            // The driver resolves the escape when buffering.
            Some(_) => step(Str { delim }, Action::Read),
        },
        Slash => match peek {
            Some('/') => step(LineComment, Action::Read),
            Some('*') => step(BlockComment, Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Punctuation)),
        },
        LineComment => match peek {
            Some('\n') | None => step(Start, Action::Emit(TokenKind::Comment)),
            Some(_) => step(LineComment, Action::Read),
        },
        BlockComment => match peek {
            None => step(state, Action::Error),
            Some('*') => step(BlockCommentStar, Action::Read),
            Some(_) => step(BlockComment, Action::Read),
        },
        BlockCommentStar => match peek {
            None => step(state, Action::Error),
            Some('/') => step(Done(TokenKind::Comment), Action::Read),
            Some('*') => step(BlockCommentStar, Action::Read),
            Some(_) => step(BlockComment, Action::Read),
        },
        LParen => match peek {
            Some('*') => step(EbnfComment, Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Punctuation)),
        },
        EbnfComment => match peek {
            None => step(state, Action::Error),
            Some('*') => step(EbnfCommentStar, Action::Read),
            Some(_) => step(EbnfComment, Action::Read),
        },
        EbnfCommentStar => match peek {
            None => step(state, Action::Error),
            Some(')') => step(Done(TokenKind::Comment), Action::Read),
            Some('*') => step(EbnfCommentStar, Action::Read),
            Some(_) => step(EbnfComment, Action::Read),
        },
        Colon => match peek {
            Some(':') => step(ColonColon, Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Punctuation)),
        },
        ColonColon => match peek {
            Some('=') => step(Done(TokenKind::Punctuation), Action::Read),
            _ => step(Start, Action::Emit(TokenKind::Punctuation)),
        },
        Punct => step(Start, Action::Emit(TokenKind::Punctuation)),
        Done(kind) => step(Start, Action::Emit(kind)),
    }
}

// ──────────────────────────────────────────────
// Driver
// ──────────────────────────────────────────────

/// Streaming tokenizer over a source string.
///
/// Implements `Iterator<Item = Result<Token, LexError>>`. Not resumable
/// mid-stream: restart by constructing a fresh `Tokenizer`.
pub struct Tokenizer {
    chars: Vec<(usize, char)>,
    src_len: usize,
    pos: usize,
    line: u32,
    column: u32,
    keep_comments: bool,
    finished: bool,
}

impl Tokenizer {
    pub fn new(src: &str) -> Self {
        Tokenizer {
            chars: src.char_indices().collect(),
            src_len: src.len(),
            pos: 0,
            line: 1,
            column: 1,
            keep_comments: false,
            finished: false,
        }
    }

    /// Emit `Comment` tokens instead of discarding them.
    pub fn keep_comments(mut self, keep: bool) -> Self {
        self.keep_comments = keep;
        self
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(o, _)| o)
            .unwrap_or(self.src_len)
    }

    fn consume(&mut self) -> Option<char> {
        let &(_, c) = self.chars.get(self.pos)?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        if self.finished {
            return None;
        }
        let mut state = State::Start;
        let mut buffer = String::new();
        let mut anchored = false;
        let mut start_offset = self.offset();
        let mut start_line = self.line;
        let mut start_column = self.column;

        loop {
            let escape_pending = matches!(state, State::StrEscape { .. });
            let s = transition(state, self.peek());
            // A Skip that moves into a token state (the opening quote)
            // anchors the span; whitespace skips back to Start do not.
            let begins_token =
                s.action == Action::Read || (s.action == Action::Skip && s.next != State::Start);
            if begins_token && !anchored {
                anchored = true;
                start_offset = self.offset();
                start_line = self.line;
                start_column = self.column;
            }
            match s.action {
                Action::Read => {
                    // Read is only issued when a character is present.
                    let c = self.consume().unwrap();
                    if escape_pending {
                        buffer.push(resolve_escape(c));
                    } else {
                        buffer.push(c);
                    }
                }
                Action::Skip => {
                    self.consume();
                }
                Action::Emit(kind) => {
                    let span = Span {
                        start: start_offset,
                        end: self.offset(),
                        line: start_line,
                        column: start_column,
                    };
                    return Some(Ok(Token::new(kind, buffer, span)));
                }
                Action::Error => {
                    self.finished = true;
                    return Some(Err(self.error_for(s.next, start_line, start_column)));
                }
                Action::End => {
                    self.finished = true;
                    return None;
                }
            }
            state = s.next;
        }
    }

    fn error_for(&self, state: State, start_line: u32, start_column: u32) -> LexError {
        match state {
            State::Str { .. } | State::StrEscape { .. } => LexError::UnterminatedString {
                line: start_line,
                column: start_column,
            },
            State::BlockComment
            | State::BlockCommentStar
            | State::EbnfComment
            | State::EbnfCommentStar => LexError::UnterminatedComment {
                line: start_line,
                column: start_column,
            },
            _ => LexError::UnexpectedChar {
                ch: self.peek().unwrap_or('\0'),
                line: self.line,
                column: self.column,
            },
        }
    }

    fn end_span(&self) -> Span {
        Span {
            start: self.src_len,
            end: self.src_len,
            line: self.line,
            column: self.column,
        }
    }
}

fn resolve_escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

impl Iterator for Tokenizer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_token() {
                Some(Ok(t)) if t.kind == TokenKind::Comment && !self.keep_comments => continue,
                other => return other,
            }
        }
    }
}

/// Tokenize a full source string, appending a synthetic end-of-input
/// token. Comments are discarded.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let mut tokenizer = Tokenizer::new(src);
    let mut tokens = Vec::new();
    for item in &mut tokenizer {
        tokens.push(item?);
    }
    tokens.push(Token::end_of_input(tokenizer.end_span()));
    Ok(tokens)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
