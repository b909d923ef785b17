//! LR(0) automaton generation.

use crate::grammar::{Grammar, RuleID, SymbolID};
use crate::util::{display_fn, Map, Set};
use std::{collections::VecDeque, fmt};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u16);

impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}

/// An LR(0) item: a production rule with a marker position on its
/// right-hand side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub rule: RuleID,
    pub dot: u16,
}

impl Item {
    /// The symbol immediately after the marker, or `None` for a complete
    /// item.
    pub fn dot_symbol<V>(&self, g: &Grammar<V>) -> Option<SymbolID> {
        g.rule(self.rule).right().get(usize::from(self.dot)).copied()
    }

    pub fn display<'g, V>(self, g: &'g Grammar<V>) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let rule = g.rule(self.rule);
            write!(f, "{} -> [", g.nonterminal(rule.left()))?;
            for (i, symbol) in rule.right().iter().enumerate() {
                if i == usize::from(self.dot) {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            if usize::from(self.dot) == rule.right().len() {
                f.write_str(" .")?;
            }
            f.write_str(" ]")
        })
    }
}

/// A state of the automaton: a closed item set plus its outgoing
/// transitions.
#[derive(Debug)]
pub struct State {
    id: StateID,
    items: Vec<Item>,
    transitions: Map<SymbolID, StateID>,
}

impl State {
    pub fn id(&self) -> StateID {
        self.id
    }

    /// The closed item set, sorted by `(rule, dot)`.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn transitions(&self) -> impl Iterator<Item = (SymbolID, StateID)> + '_ {
        self.transitions.iter().map(|(sym, id)| (*sym, *id))
    }

    pub fn transition(&self, symbol: SymbolID) -> Option<StateID> {
        self.transitions.get(&symbol).copied()
    }

    pub fn display<'g, V>(&'g self, g: &'g Grammar<V>) -> impl fmt::Display + 'g {
        display_fn(|f| {
            writeln!(f, "## items:")?;
            for item in &self.items {
                writeln!(f, "- {}", item.display(g))?;
            }
            if !self.transitions.is_empty() {
                writeln!(f, "## transitions:")?;
                for (symbol, target) in &self.transitions {
                    writeln!(f, "- {} => {:?}", g.symbol_name(*symbol), target)?;
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct Automaton {
    states: Map<StateID, State>,
}

impl Automaton {
    /// Calculate the LR(0) automaton for the specified grammar.
    ///
    /// States are numbered in discovery order; the start state is state 0.
    /// No two states share the same closed item set.
    pub fn generate<V>(g: &Grammar<V>) -> Self {
        let mut states = Map::<StateID, State>::default();
        let mut canonical = Map::<Vec<Item>, StateID>::default();
        let mut pending = VecDeque::<(StateID, Vec<Item>)>::new();

        let mut next_state_id = 0;
        let mut state_id = move || {
            let id = StateID(next_state_id);
            next_state_id += 1;
            id
        };

        let start_items = closure(
            g,
            g.nonterminal(g.start_symbol())
                .rules()
                .iter()
                .map(|&rule| Item { rule, dot: 0 })
                .collect(),
        );
        let start = state_id();
        canonical.insert(start_items.clone(), start);
        pending.push_back((start, start_items));

        while let Some((current, items)) = pending.pop_front() {
            // Group the items by the symbol after the marker; advancing the
            // marker over that symbol yields the kernel of the target state.
            let mut moved = Map::<SymbolID, Vec<Item>>::default();
            for item in &items {
                if let Some(symbol) = item.dot_symbol(g) {
                    moved.entry(symbol).or_default().push(Item {
                        rule: item.rule,
                        dot: item.dot + 1,
                    });
                }
            }

            let mut transitions = Map::default();
            for (symbol, kernel) in moved {
                let closed = closure(g, kernel);
                let target = match canonical.get(&closed) {
                    Some(&id) => id,
                    None => {
                        let id = state_id();
                        canonical.insert(closed.clone(), id);
                        pending.push_back((id, closed));
                        id
                    }
                };
                transitions.insert(symbol, target);
            }

            let state = State {
                id: current,
                items,
                transitions,
            };
            tracing::debug!(id = ?current, "discovered state\n{}", state.display(g));
            states.insert(current, state);
        }

        Self { states }
    }

    pub fn states(&self) -> impl Iterator<Item = &State> + '_ {
        self.states.values()
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[&id]
    }

    pub fn start_state(&self) -> StateID {
        StateID(0)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Expand an item set to its closure: whenever the marker sits before a
/// nonterminal, the initial items of all of that nonterminal's rules
/// belong to the set as well. The result is sorted, which makes equal
/// item sets canonically equal.
fn closure<V>(g: &Grammar<V>, kernel: Vec<Item>) -> Vec<Item> {
    let mut items: Set<Item> = kernel.into_iter().collect();

    let mut changed = true;
    while changed {
        changed = false;

        let mut added = Vec::new();
        for item in &items {
            if let Some(SymbolID::N(n)) = item.dot_symbol(g) {
                for &rule in g.nonterminal(n).rules() {
                    added.push(Item { rule, dot: 0 });
                }
            }
        }

        for item in added {
            changed |= items.insert(item);
        }
    }

    let mut items: Vec<Item> = items.into_iter().collect();
    items.sort_unstable();
    items
}
