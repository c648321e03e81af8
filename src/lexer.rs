use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    /// Brace-depth counters, one per template interpolation in progress.
    /// A `}` at depth zero resumes the innermost template.
    template_stack: Vec<u32>,
    /// Whether a `/` at the current position starts a regex literal
    /// (true when the previous token cannot end an expression).
    regex_ok: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
            template_stack: Vec::new(),
            regex_ok: true,
        }
    }

    pub fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            self.regex_ok = !ends_expression(&tok.node);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Lexeme::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if ch == b'`' {
                self.pos += 1;
                return self.scan_template(start, true);
            }

            // A `}` at interpolation depth zero resumes the enclosing template
            if ch == b'}' && self.template_stack.last() == Some(&0) {
                self.template_stack.pop();
                self.pos += 1;
                return self.scan_template(start, false);
            }

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }

            if ch.is_ascii_digit() || (ch == b'.' && self.peek_at(1).is_ascii_digit()) {
                return self.scan_number();
            }

            if ch == b'"' || ch == b'\'' {
                return self.scan_string(ch);
            }

            if ch == b'/' && self.regex_ok {
                return self.scan_regex();
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol returned None: error was recorded, try again
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            if self.pos + 1 < self.source.len() && self.source[self.pos] == b'/' {
                match self.source[self.pos + 1] {
                    b'/' => {
                        while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                            self.pos += 1;
                        }
                        continue;
                    }
                    b'*' => {
                        let start = self.pos;
                        self.pos += 2;
                        loop {
                            if self.pos + 1 >= self.source.len() {
                                self.pos = self.source.len();
                                self.diagnostics.push(Diagnostic::error(
                                    "unterminated block comment".to_string(),
                                    Span::new(start as u32, self.pos as u32),
                                ));
                                break;
                            }
                            if self.source[self.pos] == b'*' && self.source[self.pos + 1] == b'/' {
                                self.pos += 2;
                                break;
                            }
                            self.pos += 1;
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            break;
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        let token = Lexeme::from_keyword(text).unwrap_or_else(|| Lexeme::Ident(text.to_string()));
        self.make_token(token, start, self.pos)
    }

    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;

        // Hex, octal, and binary forms
        if self.source[self.pos] == b'0' {
            let radix = match self.peek_at(1) {
                b'x' | b'X' => Some(16),
                b'o' | b'O' => Some(8),
                b'b' | b'B' => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while self.pos < self.source.len()
                    && (self.source[self.pos] as char).is_digit(radix)
                {
                    self.pos += 1;
                }
                let digits = std::str::from_utf8(&self.source[digits_start..self.pos]).unwrap();
                let value = u64::from_str_radix(digits, radix).unwrap_or_else(|_| {
                    self.diagnostics.push(Diagnostic::error(
                        "invalid number literal".to_string(),
                        Span::new(start as u32, self.pos as u32),
                    ));
                    0
                });
                return self.make_token(Lexeme::Number(value as f64), start, self.pos);
            }
        }

        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos < self.source.len()
            && self.source[self.pos] == b'.'
            && self.peek_at(1).is_ascii_digit()
        {
            self.pos += 1;
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        if self.pos < self.source.len() && matches!(self.source[self.pos], b'e' | b'E') {
            let mut ahead = self.pos + 1;
            if ahead < self.source.len() && matches!(self.source[ahead], b'+' | b'-') {
                ahead += 1;
            }
            if ahead < self.source.len() && self.source[ahead].is_ascii_digit() {
                self.pos = ahead;
                while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }

        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        match text.parse::<f64>() {
            Ok(n) => self.make_token(Lexeme::Number(n), start, self.pos),
            Err(_) => {
                self.diagnostics.push(Diagnostic::error(
                    format!("invalid number literal '{}'", text),
                    Span::new(start as u32, self.pos as u32),
                ));
                self.make_token(Lexeme::Number(0.0), start, self.pos)
            }
        }
    }

    fn scan_string(&mut self, quote: u8) -> Spanned<Lexeme> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut value = String::new();

        loop {
            if self.pos >= self.source.len() || self.source[self.pos] == b'\n' {
                self.diagnostics.push(Diagnostic::error(
                    "unterminated string literal".to_string(),
                    Span::new(start as u32, self.pos as u32),
                ));
                break;
            }
            let ch = self.source[self.pos];
            if ch == quote {
                self.pos += 1;
                break;
            }
            if ch == b'\\' {
                self.pos += 1;
                self.scan_escape(&mut value);
                continue;
            }
            // Copy the full UTF-8 sequence verbatim
            let len = utf8_len(ch);
            let end = (self.pos + len).min(self.source.len());
            value.push_str(std::str::from_utf8(&self.source[self.pos..end]).unwrap_or("\u{fffd}"));
            self.pos = end;
        }

        self.make_token(Lexeme::Str(value), start, self.pos)
    }

    /// Decode one escape sequence; `self.pos` is just past the backslash.
    fn scan_escape(&mut self, out: &mut String) {
        if self.pos >= self.source.len() {
            return;
        }
        let ch = self.source[self.pos];
        self.pos += 1;
        match ch {
            b'n' => out.push('\n'),
            b't' => out.push('\t'),
            b'r' => out.push('\r'),
            b'b' => out.push('\u{8}'),
            b'f' => out.push('\u{c}'),
            b'v' => out.push('\u{b}'),
            b'0' => out.push('\0'),
            b'\n' => {} // line continuation
            b'x' => {
                let code = self.scan_hex_digits(2);
                if let Some(c) = code.and_then(char::from_u32) {
                    out.push(c);
                }
            }
            b'u' => {
                let code = if self.pos < self.source.len() && self.source[self.pos] == b'{' {
                    self.pos += 1;
                    let mut n: u32 = 0;
                    while self.pos < self.source.len() && self.source[self.pos] != b'}' {
                        n = n * 16 + (self.source[self.pos] as char).to_digit(16).unwrap_or(0);
                        self.pos += 1;
                    }
                    if self.pos < self.source.len() {
                        self.pos += 1; // closing '}'
                    }
                    Some(n)
                } else {
                    self.scan_hex_digits(4)
                };
                if let Some(c) = code.and_then(char::from_u32) {
                    out.push(c);
                }
            }
            _ => out.push(ch as char),
        }
    }

    fn scan_hex_digits(&mut self, count: usize) -> Option<u32> {
        let mut n: u32 = 0;
        for _ in 0..count {
            if self.pos >= self.source.len() {
                return None;
            }
            let d = (self.source[self.pos] as char).to_digit(16)?;
            n = n * 16 + d;
            self.pos += 1;
        }
        Some(n)
    }

    /// Scan a template piece starting just past a backtick (`head` true) or
    /// just past the `}` that closed an interpolation.
    fn scan_template(&mut self, start: usize, head: bool) -> Spanned<Lexeme> {
        let text_start = self.pos;
        loop {
            if self.pos >= self.source.len() {
                self.diagnostics.push(Diagnostic::error(
                    "unterminated template literal".to_string(),
                    Span::new(start as u32, self.pos as u32),
                ));
                let raw = self.raw_slice(text_start, self.pos);
                let tok = if head {
                    Lexeme::TemplateFull(raw)
                } else {
                    Lexeme::TemplateTail(raw)
                };
                return self.make_token(tok, start, self.pos);
            }
            match self.source[self.pos] {
                b'\\' => {
                    // Raw text keeps escapes verbatim, including \` and \$
                    self.pos = (self.pos + 2).min(self.source.len());
                }
                b'`' => {
                    let raw = self.raw_slice(text_start, self.pos);
                    self.pos += 1;
                    let tok = if head {
                        Lexeme::TemplateFull(raw)
                    } else {
                        Lexeme::TemplateTail(raw)
                    };
                    return self.make_token(tok, start, self.pos);
                }
                b'$' if self.peek_at(1) == b'{' => {
                    let raw = self.raw_slice(text_start, self.pos);
                    self.pos += 2;
                    self.template_stack.push(0);
                    let tok = if head {
                        Lexeme::TemplateHead(raw)
                    } else {
                        Lexeme::TemplateMiddle(raw)
                    };
                    return self.make_token(tok, start, self.pos);
                }
                _ => self.pos += 1,
            }
        }
    }

    fn scan_regex(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        self.pos += 1; // opening '/'
        let mut in_class = false;
        loop {
            if self.pos >= self.source.len() || self.source[self.pos] == b'\n' {
                self.diagnostics.push(Diagnostic::error(
                    "unterminated regex literal".to_string(),
                    Span::new(start as u32, self.pos as u32),
                ));
                break;
            }
            match self.source[self.pos] {
                b'\\' => self.pos = (self.pos + 2).min(self.source.len()),
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        // Flags
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let raw = self.raw_slice(start, self.pos);
        self.make_token(Lexeme::Regex(raw), start, self.pos)
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => Lexeme::LParen,
            b')' => Lexeme::RParen,
            b'{' => {
                if let Some(depth) = self.template_stack.last_mut() {
                    *depth += 1;
                }
                Lexeme::LBrace
            }
            b'}' => {
                if let Some(depth) = self.template_stack.last_mut() {
                    *depth -= 1;
                }
                Lexeme::RBrace
            }
            b'[' => Lexeme::LBracket,
            b']' => Lexeme::RBracket,
            b';' => Lexeme::Semicolon,
            b',' => Lexeme::Comma,
            b'.' => Lexeme::Dot,
            b'?' => Lexeme::Question,
            b':' => Lexeme::Colon,
            b'~' => Lexeme::Tilde,
            b'+' => {
                if self.eat(b'+') {
                    Lexeme::PlusPlus
                } else if self.eat(b'=') {
                    Lexeme::PlusEq
                } else {
                    Lexeme::Plus
                }
            }
            b'-' => {
                if self.eat(b'-') {
                    Lexeme::MinusMinus
                } else if self.eat(b'=') {
                    Lexeme::MinusEq
                } else {
                    Lexeme::Minus
                }
            }
            b'*' => {
                if self.eat(b'*') {
                    if self.eat(b'=') {
                        Lexeme::StarStarEq
                    } else {
                        Lexeme::StarStar
                    }
                } else if self.eat(b'=') {
                    Lexeme::StarEq
                } else {
                    Lexeme::Star
                }
            }
            b'/' => {
                if self.eat(b'=') {
                    Lexeme::SlashEq
                } else {
                    Lexeme::Slash
                }
            }
            b'%' => {
                if self.eat(b'=') {
                    Lexeme::PercentEq
                } else {
                    Lexeme::Percent
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    if self.eat(b'=') {
                        Lexeme::EqEqEq
                    } else {
                        Lexeme::EqEq
                    }
                } else if self.eat(b'>') {
                    Lexeme::FatArrow
                } else {
                    Lexeme::Eq
                }
            }
            b'!' => {
                if self.eat(b'=') {
                    if self.eat(b'=') {
                        Lexeme::NotEqEq
                    } else {
                        Lexeme::NotEq
                    }
                } else {
                    Lexeme::Bang
                }
            }
            b'<' => {
                if self.eat(b'<') {
                    if self.eat(b'=') {
                        Lexeme::ShlEq
                    } else {
                        Lexeme::Shl
                    }
                } else if self.eat(b'=') {
                    Lexeme::LtEq
                } else {
                    Lexeme::Lt
                }
            }
            b'>' => {
                if self.eat(b'>') {
                    if self.eat(b'>') {
                        if self.eat(b'=') {
                            Lexeme::UShrEq
                        } else {
                            Lexeme::UShr
                        }
                    } else if self.eat(b'=') {
                        Lexeme::ShrEq
                    } else {
                        Lexeme::Shr
                    }
                } else if self.eat(b'=') {
                    Lexeme::GtEq
                } else {
                    Lexeme::Gt
                }
            }
            b'&' => {
                if self.eat(b'&') {
                    Lexeme::AmpAmp
                } else if self.eat(b'=') {
                    Lexeme::AmpEq
                } else {
                    Lexeme::Amp
                }
            }
            b'|' => {
                if self.eat(b'|') {
                    Lexeme::PipePipe
                } else if self.eat(b'=') {
                    Lexeme::PipeEq
                } else {
                    Lexeme::Pipe
                }
            }
            b'^' => {
                if self.eat(b'=') {
                    Lexeme::CaretEq
                } else {
                    Lexeme::Caret
                }
            }
            _ => {
                self.diagnostics.push(Diagnostic::error(
                    format!("unexpected character '{}'", ch as char),
                    Span::new(start as u32, self.pos as u32),
                ));
                return None;
            }
        };

        Some(self.make_token(token, start, self.pos))
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.pos < self.source.len() && self.source[self.pos] == ch {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn raw_slice(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.source[start..end]).into_owned()
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_' || ch == b'$' || ch >= 0x80
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$' || ch >= 0x80
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b >= 0xf0 => 4,
        b if b >= 0xe0 => 3,
        b if b >= 0xc0 => 2,
        _ => 1,
    }
}

/// Whether a token can end an expression, which forbids a regex literal
/// (and means a following `/` is division).
fn ends_expression(token: &Lexeme) -> bool {
    matches!(
        token,
        Lexeme::Ident(_)
            | Lexeme::Number(_)
            | Lexeme::Str(_)
            | Lexeme::Regex(_)
            | Lexeme::TemplateFull(_)
            | Lexeme::TemplateTail(_)
            | Lexeme::True
            | Lexeme::False
            | Lexeme::Null
            | Lexeme::RParen
            | Lexeme::RBracket
            | Lexeme::PlusPlus
            | Lexeme::MinusMinus
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Lexeme> {
        let (tokens, diagnostics) = Lexer::new(source).tokenize();
        assert!(diagnostics.is_empty(), "lex errors: {:?}", diagnostics);
        tokens.into_iter().map(|t| t.node).collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        let tokens = lex("var x = yield1");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Var,
                Lexeme::Ident("x".to_string()),
                Lexeme::Eq,
                Lexeme::Ident("yield1".to_string()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = lex("0 42 3.5 1e3 0xff .25");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Number(0.0),
                Lexeme::Number(42.0),
                Lexeme::Number(3.5),
                Lexeme::Number(1000.0),
                Lexeme::Number(255.0),
                Lexeme::Number(0.25),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex(r#"'a\nb' "q\x41B""#);
        assert_eq!(
            tokens,
            vec![
                Lexeme::Str("a\nb".to_string()),
                Lexeme::Str("qAB".to_string()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_multichar_operators() {
        let tokens = lex("a === b !== c >>> 1 ** 2");
        assert_eq!(tokens[1], Lexeme::EqEqEq);
        assert_eq!(tokens[3], Lexeme::NotEqEq);
        assert_eq!(tokens[5], Lexeme::UShr);
        assert_eq!(tokens[7], Lexeme::StarStar);
    }

    #[test]
    fn test_template_plain() {
        let tokens = lex("`hello`");
        assert_eq!(
            tokens,
            vec![Lexeme::TemplateFull("hello".to_string()), Lexeme::Eof]
        );
    }

    #[test]
    fn test_template_interpolation() {
        let tokens = lex("`a${x}b${y}c`");
        assert_eq!(
            tokens,
            vec![
                Lexeme::TemplateHead("a".to_string()),
                Lexeme::Ident("x".to_string()),
                Lexeme::TemplateMiddle("b".to_string()),
                Lexeme::Ident("y".to_string()),
                Lexeme::TemplateTail("c".to_string()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_template_nested_braces() {
        // An object literal inside an interpolation must not end it
        let tokens = lex("`v${ {a: 1}.a }w`");
        assert_eq!(tokens[0], Lexeme::TemplateHead("v".to_string()));
        assert_eq!(*tokens.last().unwrap(), Lexeme::Eof);
        assert!(tokens.contains(&Lexeme::TemplateTail("w".to_string())));
    }

    #[test]
    fn test_regex_vs_division() {
        let tokens = lex("a / b");
        assert_eq!(tokens[1], Lexeme::Slash);

        let tokens = lex("x = /ab[/]c/gi");
        assert_eq!(tokens[2], Lexeme::Regex("/ab[/]c/gi".to_string()));
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = lex("a // trailing\n/* block\n */ b");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Ident("a".to_string()),
                Lexeme::Ident("b".to_string()),
                Lexeme::Eof,
            ]
        );
    }
}
