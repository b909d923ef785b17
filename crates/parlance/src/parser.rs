//! The shift-reduce parse engine.

use crate::dfa::{Automaton, StateID};
use crate::grammar::{Grammar, NonterminalID, RuleID};
use crate::lexer::{Token, TokenStream};
use crate::parse_table::{Action, Conflict, ParseTable};
use std::fmt;

/// A runtime element on the parse stack: a scanned terminal or a reduced
/// nonterminal carrying its semantic value.
pub enum SymbolValue<V> {
    T(Token),
    N { kind: NonterminalID, value: V },
}

impl<V> SymbolValue<V> {
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::T(token) => Some(token),
            Self::N { .. } => None,
        }
    }

    /// The matched text, for terminal elements.
    pub fn text(&self) -> Option<&str> {
        self.token().map(|token| token.text())
    }

    /// The semantic value, for nonterminal elements.
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::T(..) => None,
            Self::N { value, .. } => Some(value),
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            Self::T(..) => None,
            Self::N { value, .. } => Some(value),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for SymbolValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::T(token) => f.debug_tuple("T").field(token).finish(),
            Self::N { kind, value } => f
                .debug_struct("N")
                .field("kind", kind)
                .field("value", value)
                .finish(),
        }
    }
}

/// A parser generated from a grammar.
///
/// The parser borrows the grammar (for rule actions and the ignore flags)
/// and owns the derived table. It carries no per-parse state: a single
/// parser may run any number of independent parses.
pub struct Parser<'g, V> {
    grammar: &'g Grammar<V>,
    table: ParseTable,
}

impl<'g, V> Parser<'g, V> {
    /// Generate a parser for the specified grammar, along with the
    /// conflicts encountered while building the table. Conflicts do not
    /// prevent generation; the returned parser resolves them by rule
    /// priority and registration order.
    pub fn generate(grammar: &'g Grammar<V>) -> (Self, Vec<Conflict>) {
        let automaton = Automaton::generate(grammar);
        let (table, conflicts) = ParseTable::generate(grammar, &automaton);
        (Self { grammar, table }, conflicts)
    }

    pub fn table(&self) -> &ParseTable {
        &self.table
    }
}

impl<'g, V: Default> Parser<'g, V> {
    /// Run syntax analysis over the token stream.
    ///
    /// Returns the semantic value of the start nonterminal on acceptance,
    /// or `None` if the input is rejected. Rejection is a normal outcome,
    /// not an error.
    pub fn parse(&self, tokens: &mut TokenStream<'_, '_>) -> Option<V> {
        let mut stack: Vec<(Option<SymbolValue<V>>, StateID)> =
            vec![(None, self.table.initial_state())];

        let mut lookahead = tokens.read();
        while let Some(token) = lookahead.take() {
            if self.grammar.terminal(token.kind()).ignore() {
                lookahead = tokens.read();
                continue;
            }

            let top = stack.last()?.1;
            let action = self.table.row(top).action(token.kind());
            tracing::trace!(state = ?top, token = ?token, ?action);

            match action {
                None => return None,

                Some(Action::Shift(next)) => {
                    stack.push((Some(SymbolValue::T(token)), next));
                    lookahead = tokens.read();
                }

                Some(Action::Reduce(rule)) => {
                    let value = self.reduce(&mut stack, rule)?;
                    let left = self.grammar.rule(rule).left();
                    let top = stack.last()?.1;
                    let next = self.table.row(top).goto(left)?;
                    stack.push((Some(SymbolValue::N { kind: left, value }), next));
                    lookahead = Some(token);
                }

                Some(Action::Accept(rule)) => {
                    return self.reduce(&mut stack, rule);
                }
            }
        }

        None
    }

    /// Pop the rule's right-hand side off the stack and invoke its action
    /// against a freshly created left-hand side value.
    fn reduce(&self, stack: &mut Vec<(Option<SymbolValue<V>>, StateID)>, rule: RuleID) -> Option<V> {
        let rule = self.grammar.rule(rule);
        let count = rule.right().len();
        if stack.len() <= count {
            return None;
        }

        let split = stack.len() - count;
        let args: Vec<SymbolValue<V>> = stack
            .drain(split..)
            .filter_map(|(element, _)| element)
            .collect();

        let mut value = V::default();
        rule.invoke(&mut value, args);
        Some(value)
    }
}

impl<V> fmt::Debug for Parser<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn copy_value(value: &mut String, mut args: Vec<SymbolValue<String>>) {
        if let Some(inner) = args.pop().and_then(SymbolValue::into_value) {
            *value = inner;
        }
    }

    // S := Inner ; Inner := 'a'
    fn letter_grammar() -> Grammar<String> {
        Grammar::define(|g| {
            let a = g.terminal("A", "a")?;
            let s = g.nonterminal("S")?;
            let inner = g.nonterminal("Inner")?;
            g.start_symbol(s);
            g.rule(s, [inner], copy_value)?;
            g.rule(inner, [a], |value, args| {
                *value = args[0].text().unwrap_or_default().to_owned();
            })?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn accepts_and_returns_the_root_value() {
        let grammar = letter_grammar();
        let (parser, conflicts) = Parser::generate(&grammar);
        assert!(conflicts.is_empty());

        let lexer = Lexer::generate(&grammar).unwrap();
        let result = parser.parse(&mut lexer.open("a"));
        assert_eq!(result.as_deref(), Some("a"));
    }

    #[test]
    fn trailing_input_is_rejected() {
        let grammar = letter_grammar();
        let (parser, _) = Parser::generate(&grammar);
        let lexer = Lexer::generate(&grammar).unwrap();

        assert!(parser.parse(&mut lexer.open("aa")).is_none());
    }

    #[test]
    fn unscannable_input_is_rejected_without_panicking() {
        let grammar = letter_grammar();
        let (parser, _) = Parser::generate(&grammar);
        let lexer = Lexer::generate(&grammar).unwrap();

        // `?' produces the stop token immediately; state 0 has no action
        // on it.
        assert!(parser.parse(&mut lexer.open("?")).is_none());
    }

    #[test]
    fn one_parser_runs_many_sessions() {
        let grammar = letter_grammar();
        let (parser, _) = Parser::generate(&grammar);
        let lexer = Lexer::generate(&grammar).unwrap();

        assert!(parser.parse(&mut lexer.open("a")).is_some());
        assert!(parser.parse(&mut lexer.open("")).is_none());
        assert!(parser.parse(&mut lexer.open("a")).is_some());
    }
}
