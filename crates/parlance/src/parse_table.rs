//! SLR parse table generation with conflict reporting.

use crate::dfa::{Automaton, Item, StateID};
use crate::grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID};
use crate::util::{display_fn, Map};
use std::{cmp::Reverse, fmt};

/// The action the parser performs in a state on a particular lookahead
/// terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Consume the lookahead and transition to the specified state.
    Shift(StateID),

    /// Reduce by the specified production rule.
    Reduce(RuleID),

    /// Reduce by the specified start rule and finish parsing.
    Accept(RuleID),
}

/// Two rules competed for the same action slot. The higher-priority rule
/// kept the slot; the other is reported here. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub chosen: String,
    pub conflicting: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflict: kept `{}', rejected `{}'",
            self.chosen, self.conflicting
        )
    }
}

#[derive(Debug, Default)]
pub struct ParseTableRow {
    actions: Map<TerminalID, Action>,
    gotos: Map<NonterminalID, StateID>,
}

impl ParseTableRow {
    pub fn action(&self, terminal: TerminalID) -> Option<Action> {
        self.actions.get(&terminal).copied()
    }

    pub fn goto(&self, nonterminal: NonterminalID) -> Option<StateID> {
        self.gotos.get(&nonterminal).copied()
    }
}

#[derive(Debug)]
pub struct ParseTable {
    states: Map<StateID, ParseTableRow>,
    initial: StateID,
}

impl ParseTable {
    /// Derive the SLR action/goto table from the automaton.
    ///
    /// Each state's items are visited in descending rule priority
    /// (registration order breaks ties), and the first claimant of an
    /// action slot wins; later claimants are reported as conflicts.
    /// Generation always succeeds.
    pub fn generate<V>(g: &Grammar<V>, automaton: &Automaton) -> (Self, Vec<Conflict>) {
        let mut conflicts = Vec::new();
        let mut states = Map::default();

        for state in automaton.states() {
            tracing::trace!(id = ?state.id(), "building actions");

            let mut items = state.items().to_vec();
            items.sort_by_key(|item| (Reverse(g.rule(item.rule).priority()), item.rule, item.dot));

            let mut row = ParseTableRow::default();
            let mut claimed: Map<TerminalID, RuleID> = Map::default();

            let claim =
                |row: &mut ParseTableRow,
                 claimed: &mut Map<TerminalID, RuleID>,
                 conflicts: &mut Vec<Conflict>,
                 terminal: TerminalID,
                 item: Item,
                 action: Action| {
                    if let Some(&winner) = claimed.get(&terminal) {
                        // An identical claim (two items shifting the same
                        // terminal to the same target) is not a conflict.
                        if row.actions.get(&terminal) == Some(&action) {
                            return;
                        }
                        let conflict = Conflict {
                            chosen: g.rule(winner).display(g).to_string(),
                            conflicting: g.rule(item.rule).display(g).to_string(),
                        };
                        tracing::debug!(state = ?state.id(), terminal = %g.terminal(terminal), %conflict);
                        conflicts.push(conflict);
                    } else {
                        tracing::trace!(state = ?state.id(), terminal = %g.terminal(terminal), ?action);
                        row.actions.insert(terminal, action);
                        claimed.insert(terminal, item.rule);
                    }
                };

            for item in items {
                match item.dot_symbol(g) {
                    // A complete item reduces on every terminal in the
                    // FOLLOW set of its left-hand side; the start rule on
                    // the stop terminal accepts instead.
                    None => {
                        let rule = g.rule(item.rule);
                        let left = g.nonterminal(rule.left());
                        for terminal in left.follow().iter() {
                            let action = if left.is_start() && g.terminal(terminal).is_stop() {
                                Action::Accept(item.rule)
                            } else {
                                Action::Reduce(item.rule)
                            };
                            claim(&mut row, &mut claimed, &mut conflicts, terminal, item, action);
                        }
                    }

                    Some(SymbolID::T(terminal)) => {
                        if let Some(target) = state.transition(SymbolID::T(terminal)) {
                            claim(
                                &mut row,
                                &mut claimed,
                                &mut conflicts,
                                terminal,
                                item,
                                Action::Shift(target),
                            );
                        }
                    }

                    Some(SymbolID::N(..)) => {}
                }
            }

            for (symbol, target) in state.transitions() {
                if let SymbolID::N(n) = symbol {
                    row.gotos.insert(n, target);
                }
            }

            states.insert(state.id(), row);
        }

        let table = Self {
            states,
            initial: automaton.start_state(),
        };
        (table, conflicts)
    }

    pub fn initial_state(&self) -> StateID {
        self.initial
    }

    pub fn row(&self, id: StateID) -> &ParseTableRow {
        &self.states[&id]
    }

    pub fn display<'g, V>(&'g self, g: &'g Grammar<V>) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (i, (id, row)) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }

                writeln!(f, "#### State {:?}", id)?;
                writeln!(f, "## actions")?;
                for (terminal, action) in &row.actions {
                    let terminal = g.terminal(*terminal);
                    match action {
                        Action::Shift(n) => {
                            writeln!(f, "- {} => shift({:?})", terminal, n)?;
                        }
                        Action::Reduce(rule) => {
                            writeln!(f, "- {} => reduce({})", terminal, g.rule(*rule).display(g))?;
                        }
                        Action::Accept(rule) => {
                            writeln!(f, "- {} => accept({})", terminal, g.rule(*rule).display(g))?;
                        }
                    }
                }

                writeln!(f, "## gotos")?;
                for (symbol, goto) in &row.gotos {
                    writeln!(f, "- {} => goto({:?})", g.nonterminal(*symbol), goto)?;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SymbolValue;

    fn noop(_: &mut (), _: Vec<SymbolValue<()>>) {}

    #[test]
    fn higher_priority_rule_wins_the_slot() {
        // After shifting `x' the automaton reaches a state where both
        // `Low := x' and `High := x' are complete, with the same lookahead.
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let x = g.terminal("X", "x")?;
            let s = g.nonterminal("S")?;
            let choice = g.nonterminal("Choice")?;
            let low = g.nonterminal("Low")?;
            let high = g.nonterminal("High")?;
            g.start_symbol(s);
            g.rule(s, [choice], noop)?;
            g.rule(choice, [low], noop)?;
            g.rule(choice, [high], noop)?;
            let low_rule = g.rule_with_priority(low, [x], 1, noop)?;
            let high_rule = g.rule_with_priority(high, [x], 5, noop)?;
            ids = Some((x, low_rule, high_rule));
            Ok(())
        })
        .unwrap();
        let (x, low_rule, high_rule) = ids.unwrap();

        let automaton = Automaton::generate(&grammar);
        let (table, conflicts) = ParseTable::generate(&grammar, &automaton);

        // Exactly one conflict, naming both completed rules.
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0].chosen,
            grammar.rule(high_rule).display(&grammar).to_string()
        );
        assert_eq!(
            conflicts[0].conflicting,
            grammar.rule(low_rule).display(&grammar).to_string()
        );

        // The winning action reduces by the high-priority rule.
        let start = automaton.state(automaton.start_state());
        let after_x = start.transition(SymbolID::T(x)).unwrap();
        let action = table.row(after_x).action(grammar.stop_terminal()).unwrap();
        assert_eq!(action, Action::Reduce(high_rule));
    }

    #[test]
    fn start_rule_accepts_on_stop() {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let a = g.terminal("A", "a")?;
            let s = g.nonterminal("S")?;
            g.start_symbol(s);
            let rule = g.rule(s, [a], noop)?;
            ids = Some((a, rule));
            Ok(())
        })
        .unwrap();
        let (a, rule) = ids.unwrap();

        let automaton = Automaton::generate(&grammar);
        let (table, conflicts) = ParseTable::generate(&grammar, &automaton);
        assert!(conflicts.is_empty());

        let start = automaton.state(automaton.start_state());
        assert_eq!(
            table.row(automaton.start_state()).action(a),
            Some(Action::Shift(start.transition(SymbolID::T(a)).unwrap()))
        );

        let after_a = start.transition(SymbolID::T(a)).unwrap();
        assert_eq!(
            table.row(after_a).action(grammar.stop_terminal()),
            Some(Action::Accept(rule))
        );
    }

    #[test]
    fn goto_entries_mirror_nonterminal_transitions() {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let a = g.terminal("A", "a")?;
            let s = g.nonterminal("S")?;
            let inner = g.nonterminal("Inner")?;
            g.start_symbol(s);
            g.rule(s, [inner], noop)?;
            g.rule(inner, [a], noop)?;
            ids = Some(inner);
            Ok(())
        })
        .unwrap();
        let inner = ids.unwrap();

        let automaton = Automaton::generate(&grammar);
        let (table, _) = ParseTable::generate(&grammar, &automaton);

        let start = automaton.state(automaton.start_state());
        let expected = start.transition(SymbolID::N(inner)).unwrap();
        assert_eq!(table.row(automaton.start_state()).goto(inner), Some(expected));
    }
}
