//! Lexer generation by pattern composition.

use crate::grammar::{Grammar, GrammarError, TerminalID};
use regex::Regex;

/// A terminal instance produced by scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kind: TerminalID,
    text: String,
}

impl Token {
    pub(crate) fn new(kind: TerminalID, text: String) -> Self {
        Self { kind, text }
    }

    pub fn kind(&self) -> TerminalID {
        self.kind
    }

    /// The matched input text. Empty for the stop token.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("a token has already been pushed back")]
    PushbackOccupied,
}

/// A scanner built from the terminal patterns of a grammar.
///
/// The lexer itself is immutable and can be shared; each input text gets
/// its own [`TokenStream`] via [`Lexer::open`].
#[derive(Debug)]
pub struct Lexer {
    regex: Regex,
    groups: Vec<(String, TerminalID)>,
    stop: TerminalID,
}

impl Lexer {
    /// Compose the non-empty terminal patterns of the grammar, in
    /// registration order, into a single anchored alternation. Earlier
    /// registration wins when several patterns match at the same position.
    pub fn generate<V>(grammar: &Grammar<V>) -> Result<Self, GrammarError> {
        let mut alternatives = Vec::new();
        let mut groups = Vec::new();
        for (idx, terminal) in grammar.terminals().enumerate() {
            if terminal.pattern().is_empty() {
                continue;
            }
            let group = format!("t{}", idx);
            alternatives.push(format!("(?P<{}>{})", group, terminal.pattern()));
            groups.push((group, terminal.id()));
        }

        let pattern = format!(r"\A(?:{})", alternatives.join("|"));
        let regex = Regex::new(&pattern).map_err(|source| GrammarError::InvalidPattern {
            name: "<alternation>".to_owned(),
            source,
        })?;

        Ok(Self {
            regex,
            groups,
            stop: grammar.stop_terminal(),
        })
    }

    /// Prepare a token stream over the specified input text.
    pub fn open<'s>(&self, text: &'s str) -> TokenStream<'_, 's> {
        TokenStream {
            lexer: self,
            text,
            pos: 0,
            queued: None,
            stop_emitted: false,
        }
    }
}

/// A single-pass cursor over one input text.
#[derive(Debug)]
pub struct TokenStream<'l, 's> {
    lexer: &'l Lexer,
    text: &'s str,
    pos: usize,
    queued: Option<Token>,
    stop_emitted: bool,
}

impl TokenStream<'_, '_> {
    /// Read the next token. Once no pattern matches the current position
    /// (including at the end of input), the stop token is produced exactly
    /// once; afterwards the stream is exhausted.
    pub fn read(&mut self) -> Option<Token> {
        let token = match self.queued.take() {
            Some(token) => Some(token),
            None => self.scan(),
        };
        tracing::trace!(?token, "read token");
        token
    }

    /// Return the next token without consuming it.
    pub fn peek(&mut self) -> Option<&Token> {
        if self.queued.is_none() {
            self.queued = self.scan();
        }
        self.queued.as_ref()
    }

    /// Return a token to the front of the stream. Only one token may be
    /// buffered at a time.
    pub fn pushback(&mut self, token: Token) -> Result<(), LexError> {
        if self.queued.is_some() {
            return Err(LexError::PushbackOccupied);
        }
        self.queued = Some(token);
        Ok(())
    }

    fn scan(&mut self) -> Option<Token> {
        if let Some(caps) = self.lexer.regex.captures(&self.text[self.pos..]) {
            let whole = caps.get(0).map(|m| m.len()).unwrap_or(0);
            // A zero-width match would never advance; treat it as a
            // lexical failure.
            if whole > 0 {
                self.pos += whole;
                for (group, kind) in &self.lexer.groups {
                    if let Some(matched) = caps.name(group) {
                        return Some(Token::new(*kind, matched.as_str().to_owned()));
                    }
                }
            }
        }

        if !self.stop_emitted {
            self.stop_emitted = true;
            return Some(Token::new(self.lexer.stop, String::new()));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SymbolValue;

    fn noop(_: &mut (), _: Vec<SymbolValue<()>>) {}

    fn lexed(grammar: &Grammar<()>, input: &str) -> Vec<Token> {
        let lexer = Lexer::generate(grammar).unwrap();
        let mut tokens = lexer.open(input);
        let mut out = Vec::new();
        while let Some(token) = tokens.read() {
            out.push(token);
        }
        out
    }

    fn word_grammar() -> (Grammar<()>, TerminalID, TerminalID) {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let foo = g.terminal("FOO", "foo")?;
            let word = g.terminal("WORD", "foo|bar")?;
            let s = g.nonterminal("S")?;
            g.start_symbol(s);
            g.rule(s, [foo], noop)?;
            ids = Some((foo, word));
            Ok(())
        })
        .unwrap();
        let (foo, word) = ids.unwrap();
        (grammar, foo, word)
    }

    #[test]
    fn earlier_registration_wins_overlap() {
        let (grammar, foo, word) = word_grammar();

        let tokens = lexed(&grammar, "foobar");
        assert_eq!(tokens[0].kind(), foo);
        assert_eq!(tokens[0].text(), "foo");
        assert_eq!(tokens[1].kind(), word);
        assert_eq!(tokens[1].text(), "bar");
    }

    #[test]
    fn stop_token_is_emitted_exactly_once() {
        let (grammar, ..) = word_grammar();
        let stop = grammar.stop_terminal();

        let lexer = Lexer::generate(&grammar).unwrap();
        let mut tokens = lexer.open("foo?");

        assert_eq!(tokens.read().unwrap().text(), "foo");
        // `?' matches nothing, so the stream falls back to the stop token.
        assert_eq!(tokens.read().unwrap().kind(), stop);
        assert!(tokens.read().is_none());
        assert!(tokens.read().is_none());
    }

    #[test]
    fn peek_does_not_consume() {
        let (grammar, foo, word) = word_grammar();

        let lexer = Lexer::generate(&grammar).unwrap();
        let mut tokens = lexer.open("foobar");

        assert_eq!(tokens.peek().unwrap().kind(), foo);
        assert_eq!(tokens.peek().unwrap().kind(), foo);
        assert_eq!(tokens.read().unwrap().kind(), foo);
        assert_eq!(tokens.read().unwrap().kind(), word);
    }

    #[test]
    fn pushback_returns_a_token_to_the_front() {
        let (grammar, foo, word) = word_grammar();

        let lexer = Lexer::generate(&grammar).unwrap();
        let mut tokens = lexer.open("foobar");

        let first = tokens.read().unwrap();
        assert_eq!(first.kind(), foo);
        tokens.pushback(first.clone()).unwrap();
        assert_eq!(tokens.read().unwrap(), first);
        assert_eq!(tokens.read().unwrap().kind(), word);
    }

    #[test]
    fn second_pushback_is_an_error() {
        let (grammar, ..) = word_grammar();

        let lexer = Lexer::generate(&grammar).unwrap();
        let mut tokens = lexer.open("foobar");

        let first = tokens.read().unwrap();
        tokens.pushback(first.clone()).unwrap();
        assert!(matches!(
            tokens.pushback(first),
            Err(LexError::PushbackOccupied)
        ));
    }

    #[test]
    fn separate_streams_are_independent() {
        let (grammar, foo, ..) = word_grammar();

        let lexer = Lexer::generate(&grammar).unwrap();
        let mut first = lexer.open("foo");
        let mut second = lexer.open("foofoo");

        assert_eq!(first.read().unwrap().kind(), foo);
        assert_eq!(second.read().unwrap().kind(), foo);
        assert_eq!(second.read().unwrap().kind(), foo);
        assert_eq!(first.read().unwrap().kind(), grammar.stop_terminal());
    }
}
