// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of minitcl, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::fmt::{self, Debug, Formatter};

use bstr::ByteSlice;
use memchr::memchr;

/// The classification of a token produced by [`Parser::next_token`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Whitespace between two words of the same command.
    Sep,
    /// A command terminator: a newline or `;`, with any trailing
    /// whitespace folded in.
    Eol,
    /// Input exhausted. Returned forever once reached.
    Eof,
    /// Literal bytes that undergo no further processing.
    Str,
    /// Literal bytes whose backslash escapes are still to be decoded.
    Esc,
    /// The interior of a `[...]` command substitution.
    Cmd,
    /// The name of a variable to substitute.
    Var,
}

/// A token and its raw payload, borrowed from the source.
///
/// Delimiters the parser consumed (`[`/`]`, `{`/`}`, `"`, `$`) are excluded
/// from the payload.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a [u8],
}

/// A cursor over script source that classifies it into tokens.
///
/// Tokenization is total: every byte sequence yields some token stream, and
/// unterminated brackets, braces, and quotes simply consume to the end of
/// the input. The parser does not assemble words; the evaluator does, by
/// concatenating adjacent tokens that have no `Sep`/`Eol` between them.
///
/// Classification is byte-oriented ASCII. A byte is part of a word when it
/// is graphic (`0x21..=0x7E`); everything else separates words.
pub struct Parser<'a> {
    text: &'a [u8],
    pos: usize,
    /// The kind of the last token returned. Starts as `Eol` so a `#` at
    /// the start of the input begins a comment and the first word token
    /// opens a new word.
    kind: TokenKind,
    /// Whether the cursor is inside a double-quoted run. A quoted run
    /// spans several tokens when it contains `$` or `[` substitutions.
    in_quote: bool,
}

impl<'a> Parser<'a> {
    #[inline]
    pub fn new(text: &'a [u8]) -> Self {
        Parser {
            text,
            pos: 0,
            kind: TokenKind::Eol,
            in_quote: false,
        }
    }

    /// Returns the next token. Once the input is exhausted, one trailing
    /// `Eol` is produced (unless the previous token already terminated the
    /// command), then `Eof` forever.
    pub fn next_token(&mut self) -> Token<'a> {
        loop {
            let Some(&b) = self.text.get(self.pos) else {
                let kind = match self.kind {
                    TokenKind::Eol | TokenKind::Eof => TokenKind::Eof,
                    _ => TokenKind::Eol,
                };
                self.kind = kind;
                return Token { kind, text: &[] };
            };
            return match b {
                b'#' if self.kind == TokenKind::Eol => {
                    self.skip_comment();
                    continue;
                }
                b'[' => self.parse_command(),
                b'$' => self.parse_var(),
                b'\n' | b';' if !self.in_quote => self.parse_sep(true),
                _ if self.in_quote || b.is_ascii_graphic() => self.parse_string(),
                _ => self.parse_sep(false),
            };
        }
    }

    /// Skips a comment up to, but not including, the next newline. The
    /// previous token kind is already `Eol`, so the extra terminator the
    /// newline produces is harmless.
    fn skip_comment(&mut self) {
        self.pos = match memchr(b'\n', &self.text[self.pos..]) {
            Some(offset) => self.pos + offset,
            None => self.text.len(),
        };
    }

    /// Consumes a run of non-graphic bytes, plus `;` when scanning a
    /// command terminator.
    fn parse_sep(&mut self, eol: bool) -> Token<'a> {
        let start = self.pos;
        while let Some(&b) = self.text.get(self.pos) {
            if b.is_ascii_graphic() && !(eol && b == b';') {
                break;
            }
            self.pos += 1;
        }
        let kind = if eol { TokenKind::Eol } else { TokenKind::Sep };
        self.token(kind, start)
    }

    /// Consumes a `[...]` substitution and yields its interior. Brackets
    /// nest, except inside a braced region, and `\` escapes the following
    /// byte.
    fn parse_command(&mut self) -> Token<'a> {
        debug_assert_eq!(self.text[self.pos], b'[', "not at a command");
        self.pos += 1;
        let start = self.pos;
        let mut level = 1usize;
        let mut blevel = 0usize;
        while let Some(&b) = self.text.get(self.pos) {
            match b {
                b'\\' if self.pos + 1 < self.text.len() => self.pos += 1,
                b'[' if blevel == 0 => level += 1,
                b']' if blevel == 0 => {
                    level -= 1;
                    if level == 0 {
                        break;
                    }
                }
                b'{' => blevel += 1,
                b'}' if blevel > 0 => blevel -= 1,
                _ => {}
            }
            self.pos += 1;
        }
        let end = self.pos;
        if self.pos < self.text.len() {
            self.pos += 1; // the closing `]`
        }
        self.kind = TokenKind::Cmd;
        Token {
            kind: TokenKind::Cmd,
            text: &self.text[start..end],
        }
    }

    /// Consumes `$name`, where the name is a run of `[A-Za-z0-9_]`. A `$`
    /// with no name after it is an ordinary string byte.
    fn parse_var(&mut self) -> Token<'a> {
        debug_assert_eq!(self.text[self.pos], b'$', "not at a variable");
        let dollar = self.pos;
        self.pos += 1;
        let start = self.pos;
        while let Some(&b) = self.text.get(self.pos) {
            if !(b.is_ascii_alphanumeric() || b == b'_') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            self.token(TokenKind::Str, dollar)
        } else {
            self.token(TokenKind::Var, start)
        }
    }

    /// Consumes a `{...}` word and yields its interior verbatim: no
    /// substitution happens inside braces. Braces nest and `\` escapes the
    /// following byte.
    fn parse_brace(&mut self) -> Token<'a> {
        debug_assert_eq!(self.text[self.pos], b'{', "not at a braced word");
        self.pos += 1;
        let start = self.pos;
        let mut level = 1usize;
        while let Some(&b) = self.text.get(self.pos) {
            match b {
                b'\\' if self.pos + 1 < self.text.len() => self.pos += 1,
                b'{' => level += 1,
                b'}' => {
                    level -= 1;
                    if level == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        let end = self.pos;
        if self.pos < self.text.len() {
            self.pos += 1; // the closing `}`
        }
        self.kind = TokenKind::Str;
        Token {
            kind: TokenKind::Str,
            text: &self.text[start..end],
        }
    }

    /// Consumes a run of word bytes, stopping at anything that needs its
    /// own token: a `$` or `[` substitution, or an unquoted separator.
    /// `\` keeps the following byte in the run, verbatim, for the escape
    /// decoder.
    fn parse_string(&mut self) -> Token<'a> {
        // `{...}` and `"..."` quoting engage only at the start of a word.
        let new_word = matches!(
            self.kind,
            TokenKind::Sep | TokenKind::Eol | TokenKind::Str
        );
        if new_word {
            match self.text.get(self.pos) {
                Some(b'{') => return self.parse_brace(),
                Some(b'"') => {
                    self.in_quote = true;
                    self.pos += 1;
                }
                _ => {}
            }
        }
        let start = self.pos;
        while let Some(&b) = self.text.get(self.pos) {
            match b {
                b'\\' if self.pos + 1 < self.text.len() => self.pos += 2,
                b'$' | b'[' => break,
                b'"' if self.in_quote => {
                    let token = self.token(TokenKind::Esc, start);
                    self.pos += 1; // the closing quote
                    self.in_quote = false;
                    return token;
                }
                _ if !self.in_quote && (b == b';' || !b.is_ascii_graphic()) => break,
                _ => self.pos += 1,
            }
        }
        self.token(TokenKind::Esc, start)
    }

    #[inline]
    fn token(&mut self, kind: TokenKind, start: usize) -> Token<'a> {
        self.kind = kind;
        Token {
            kind,
            text: &self.text[start..self.pos],
        }
    }
}

impl Debug for Token<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("text", &self.text.as_bstr())
            .finish()
    }
}

impl Debug for Parser<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("text", &self.text.as_bstr())
            .field("pos", &self.pos)
            .field("kind", &self.kind)
            .field("in_quote", &self.in_quote)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::TokenKind::*;
    use super::*;

    fn tokens(src: &[u8]) -> Vec<(TokenKind, &[u8])> {
        let mut parser = Parser::new(src);
        let mut tokens = Vec::new();
        loop {
            let token = parser.next_token();
            if token.kind == Eof {
                break;
            }
            tokens.push((token.kind, token.text));
        }
        tokens
    }

    #[test]
    fn words_and_separators() {
        assert_eq!(
            tokens(b"set x 5"),
            [
                (Esc, &b"set"[..]),
                (Sep, b" "),
                (Esc, b"x"),
                (Sep, b" "),
                (Esc, b"5"),
                (Eol, b""),
            ],
        );
    }

    #[test]
    fn empty_source_is_eof_only() {
        assert!(tokens(b"").is_empty());
        let mut parser = Parser::new(b"");
        assert_eq!(parser.next_token().kind, Eof);
        assert_eq!(parser.next_token().kind, Eof);
    }

    #[test]
    fn semicolon_terminates_commands() {
        assert_eq!(
            tokens(b"a; b"),
            [(Esc, &b"a"[..]), (Eol, b"; "), (Esc, b"b"), (Eol, b"")],
        );
    }

    #[test]
    fn newline_terminates_commands() {
        assert_eq!(
            tokens(b"a\nb"),
            [(Esc, &b"a"[..]), (Eol, b"\n"), (Esc, b"b"), (Eol, b"")],
        );
    }

    #[test]
    fn comment_at_line_start_is_skipped() {
        assert_eq!(
            tokens(b"# a comment\nset x 1"),
            [
                (Eol, &b"\n"[..]),
                (Esc, b"set"),
                (Sep, b" "),
                (Esc, b"x"),
                (Sep, b" "),
                (Esc, b"1"),
                (Eol, b""),
            ],
        );
        assert!(tokens(b"# only a comment").is_empty());
    }

    #[test]
    fn hash_inside_a_word_is_literal() {
        assert_eq!(tokens(b"a#b"), [(Esc, &b"a#b"[..]), (Eol, b"")]);
    }

    #[test]
    fn variable_token() {
        assert_eq!(
            tokens(b"puts $x_1"),
            [(Esc, &b"puts"[..]), (Sep, b" "), (Var, b"x_1"), (Eol, b"")],
        );
    }

    #[test]
    fn lone_dollar_is_a_string() {
        assert_eq!(
            tokens(b"$ $%"),
            [
                (Str, &b"$"[..]),
                (Sep, b" "),
                (Str, b"$"),
                (Esc, b"%"),
                (Eol, b""),
            ],
        );
    }

    #[test]
    fn command_substitution_interior() {
        assert_eq!(
            tokens(b"[+ 1 [- 2 1]]"),
            [(Cmd, &b"+ 1 [- 2 1]"[..]), (Eol, b"")],
        );
    }

    #[test]
    fn brackets_inside_braces_do_not_nest() {
        assert_eq!(tokens(b"[set x {]}]"), [(Cmd, &b"set x {]}"[..]), (Eol, b"")]);
    }

    #[test]
    fn braced_word_suppresses_substitution() {
        assert_eq!(
            tokens(b"{a $x [b] {c}}"),
            [(Str, &b"a $x [b] {c}"[..]), (Eol, b"")],
        );
    }

    #[test]
    fn unterminated_brace_consumes_to_end() {
        assert_eq!(tokens(b"{abc"), [(Str, &b"abc"[..]), (Eol, b"")]);
    }

    #[test]
    fn quoted_run_splits_around_substitutions() {
        assert_eq!(
            tokens(b"\"a $b c\""),
            [(Esc, &b"a "[..]), (Var, b"b"), (Esc, b" c"), (Eol, b"")],
        );
    }

    #[test]
    fn quoted_run_keeps_separators() {
        assert_eq!(tokens(b"\"a;b c\""), [(Esc, &b"a;b c"[..]), (Eol, b"")]);
    }

    #[test]
    fn empty_quoted_word() {
        assert_eq!(tokens(b"\"\""), [(Esc, &b""[..]), (Eol, b"")]);
    }

    #[test]
    fn backslash_keeps_the_next_byte_in_the_run() {
        assert_eq!(tokens(b"a\\ b"), [(Esc, &b"a\\ b"[..]), (Eol, b"")]);
        assert_eq!(tokens(b"a\\[b"), [(Esc, &b"a\\[b"[..]), (Eol, b"")]);
    }

    #[test]
    fn adjacent_tokens_for_interpolation() {
        assert_eq!(
            tokens(b"a$x!"),
            [(Esc, &b"a"[..]), (Var, b"x"), (Esc, b"!"), (Eol, b"")],
        );
    }
}
