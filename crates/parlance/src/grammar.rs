//! Grammar types and the registration API.

use crate::parser::SymbolValue;
use crate::util::{display_fn, Map};
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}

impl TerminalID {
    #[inline]
    pub(crate) const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        usize::from(self.raw)
    }
}

impl fmt::Debug for TerminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T#{:03}", self.raw)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}

impl NonterminalID {
    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

impl fmt::Debug for NonterminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N#{:03}", self.raw)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u16,
}

impl RuleID {
    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

impl fmt::Debug for RuleID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R#{:03}", self.raw)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

impl fmt::Debug for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::T(t) => write!(f, "{:?}", t),
            Self::N(n) => write!(f, "{:?}", n),
        }
    }
}

impl From<TerminalID> for SymbolID {
    fn from(id: TerminalID) -> Self {
        Self::T(id)
    }
}

impl From<NonterminalID> for SymbolID {
    fn from(id: NonterminalID) -> Self {
        Self::N(id)
    }
}

/// A set of terminal symbols, backed by a bit set over the dense ID space.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.index())
    }

    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.index())
    }

    /// Merge `other` into `self`, reporting whether any element was new.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let before = self.inner.len();
        self.inner.union_with(&other.inner);
        self.inner.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn clear(&mut self) {
        self.inner.clear()
    }

    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner
            .iter()
            .map(|raw| TerminalID::new(raw as u16))
    }
}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(|t| t.index()).collect(),
        }
    }
}

/// The FIRST set of a symbol: a terminal set plus the epsilon marker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FirstSet {
    terminals: TerminalSet,
    epsilon: bool,
}

impl FirstSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.terminals.contains(id)
    }

    pub fn contains_epsilon(&self) -> bool {
        self.epsilon
    }

    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.terminals.insert(id)
    }

    pub fn insert_epsilon(&mut self) -> bool {
        !std::mem::replace(&mut self.epsilon, true)
    }

    /// The terminal members, excluding epsilon.
    pub fn terminals(&self) -> &TerminalSet {
        &self.terminals
    }

    pub(crate) fn terminals_mut(&mut self) -> &mut TerminalSet {
        &mut self.terminals
    }

    pub fn clear(&mut self) {
        self.terminals.clear();
        self.epsilon = false;
    }
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    name: String,
    pattern: String,
    is_stop: bool,
    ignore: bool,
    pub(crate) first: FirstSet,
}

impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scan pattern. Empty for terminals the lexer never produces by
    /// matching, such as the stop terminal.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_stop(&self) -> bool {
        self.is_stop
    }

    pub fn ignore(&self) -> bool {
        self.ignore
    }

    pub fn first(&self) -> &FirstSet {
        &self.first
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    name: String,
    is_start: bool,
    rules: Vec<RuleID>,
    pub(crate) first: FirstSet,
    pub(crate) follow: TerminalSet,
}

impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_start(&self) -> bool {
        self.is_start
    }

    /// The rules for which this nonterminal is the left-hand side, in
    /// registration order.
    pub fn rules(&self) -> &[RuleID] {
        &self.rules
    }

    pub fn first(&self) -> &FirstSet {
        &self.first
    }

    pub fn follow(&self) -> &TerminalSet {
        &self.follow
    }
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The semantic action bound to a rule. Invoked on reduction with the
/// freshly created left-hand side value and the popped right-hand side
/// elements in rule order.
pub type RuleAction<V> = Box<dyn Fn(&mut V, Vec<SymbolValue<V>>)>;

/// A production rule.
pub struct Rule<V> {
    id: RuleID,
    left: NonterminalID,
    right: Vec<SymbolID>,
    priority: i32,
    action: RuleAction<V>,
}

impl<V> Rule<V> {
    pub fn id(&self) -> RuleID {
        self.id
    }

    pub fn left(&self) -> NonterminalID {
        self.left
    }

    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn invoke(&self, lhs: &mut V, args: Vec<SymbolValue<V>>) {
        (self.action)(lhs, args)
    }

    // `"LHS := R1 R2 R3"`
    pub fn display<'g>(&'g self, g: &'g Grammar<V>) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} := ", g.nonterminal(self.left))?;
            for (i, symbol) in self.right.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                f.write_str(g.symbol_name(*symbol))?;
            }
            Ok(())
        })
    }
}

impl<V> fmt::Debug for Rule<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("left", &self.left)
            .field("right", &self.right)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// The grammar definition used to derive the lexer and parser tables.
pub struct Grammar<V> {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Map<RuleID, Rule<V>>,
    start: NonterminalID,
    stop: TerminalID,
}

impl<V> Grammar<V> {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef<V>) -> Result<(), GrammarError>,
    {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            rules: Map::default(),
            start: None,
            stop: None,
            next_terminal_id: 0,
            next_nonterminal_id: 0,
            next_rule_id: 0,
        };

        f(&mut def)?;

        def.end()
    }

    pub fn terminals(&self) -> impl Iterator<Item = &Terminal> + '_ {
        self.terminals.values()
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = &Nonterminal> + '_ {
        self.nonterminals.values()
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule<V>> + '_ {
        self.rules.values()
    }

    pub fn terminal(&self, id: TerminalID) -> &Terminal {
        &self.terminals[&id]
    }

    pub fn nonterminal(&self, id: NonterminalID) -> &Nonterminal {
        &self.nonterminals[&id]
    }

    pub fn rule(&self, id: RuleID) -> &Rule<V> {
        &self.rules[&id]
    }

    /// The nonterminal marked as the start symbol.
    pub fn start_symbol(&self) -> NonterminalID {
        self.start
    }

    /// The terminal marking the end of input.
    pub fn stop_terminal(&self) -> TerminalID {
        self.stop
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &str {
        match symbol {
            SymbolID::T(t) => self.terminal(t).name(),
            SymbolID::N(n) => self.nonterminal(n).name(),
        }
    }

    pub(crate) fn first_of(&self, symbol: SymbolID) -> &FirstSet {
        match symbol {
            SymbolID::T(t) => &self.terminals[&t].first,
            SymbolID::N(n) => &self.nonterminals[&n].first,
        }
    }

    pub(crate) fn terminals_mut(&mut self) -> impl Iterator<Item = &mut Terminal> + '_ {
        self.terminals.values_mut()
    }

    pub(crate) fn nonterminals_mut(&mut self) -> impl Iterator<Item = &mut Nonterminal> + '_ {
        self.nonterminals.values_mut()
    }

    pub(crate) fn nonterminal_mut(&mut self, id: NonterminalID) -> &mut Nonterminal {
        &mut self.nonterminals[&id]
    }

    pub(crate) fn rule_ids(&self) -> Vec<RuleID> {
        self.rules.keys().copied().collect()
    }
}

impl<V> fmt::Debug for Grammar<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("terminals", &self.terminals)
            .field("nonterminals", &self.nonterminals)
            .field("rules", &self.rules)
            .field("start", &self.start)
            .field("stop", &self.stop)
            .finish()
    }
}

impl<V> fmt::Display for Grammar<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals.values() {
            write!(f, "{}", terminal)?;
            if !terminal.pattern.is_empty() {
                write!(f, " /{}/", terminal.pattern)?;
            }
            if terminal.is_stop {
                write!(f, " (stop)")?;
            }
            if terminal.ignore {
                write!(f, " (ignore)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if nonterminal.is_start {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## rules:")?;
        for rule in self.rules.values() {
            write!(f, "{}", rule.display(self))?;
            if rule.priority != 0 {
                write!(f, " (priority = {})", rule.priority)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// The contextural values for building a `Grammar`.
pub struct GrammarDef<V> {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Map<RuleID, Rule<V>>,
    start: Option<NonterminalID>,
    stop: Option<TerminalID>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
    next_rule_id: u16,
}

impl<V> GrammarDef<V> {
    /// Declare a terminal symbol with its scan pattern.
    pub fn terminal(&mut self, name: &str, pattern: &str) -> Result<TerminalID, GrammarError> {
        self.add_terminal(name, pattern, false, false)
    }

    /// Declare a terminal symbol recognized by the lexer but skipped by the
    /// parser, such as whitespace.
    pub fn ignored_terminal(
        &mut self,
        name: &str,
        pattern: &str,
    ) -> Result<TerminalID, GrammarError> {
        self.add_terminal(name, pattern, false, true)
    }

    /// Declare the terminal that marks the end of input. At most one per
    /// grammar; if none is declared, a reserved `$stop` terminal is created.
    pub fn stop_terminal(&mut self, name: &str) -> Result<TerminalID, GrammarError> {
        if self.stop.is_some() {
            return Err(GrammarError::DuplicateStop);
        }
        let id = self.add_terminal(name, "", true, false)?;
        self.stop = Some(id);
        Ok(id)
    }

    fn add_terminal(
        &mut self,
        name: &str,
        pattern: &str,
        is_stop: bool,
        ignore: bool,
    ) -> Result<TerminalID, GrammarError> {
        self.verify_name(name)?;

        if !pattern.is_empty() {
            regex::Regex::new(pattern).map_err(|source| GrammarError::InvalidPattern {
                name: name.to_owned(),
                source,
            })?;
        }

        let id = TerminalID::new(self.next_terminal_id);
        self.next_terminal_id += 1;

        self.terminals.insert(
            id,
            Terminal {
                id,
                name: name.to_owned(),
                pattern: pattern.to_owned(),
                is_stop,
                ignore,
                first: FirstSet::default(),
            },
        );

        Ok(id)
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarError> {
        self.verify_name(name)?;

        let id = NonterminalID::new(self.next_nonterminal_id);
        self.next_nonterminal_id += 1;

        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: name.to_owned(),
                is_start: false,
                rules: vec![],
                first: FirstSet::default(),
                follow: TerminalSet::default(),
            },
        );

        Ok(id)
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: NonterminalID) {
        self.start.replace(symbol);
    }

    /// Register a production rule with the default priority.
    pub fn rule<I, F>(
        &mut self,
        left: NonterminalID,
        right: I,
        action: F,
    ) -> Result<RuleID, GrammarError>
    where
        I: IntoIterator,
        I::Item: Into<SymbolID>,
        F: Fn(&mut V, Vec<SymbolValue<V>>) + 'static,
    {
        self.rule_with_priority(left, right, 0, action)
    }

    /// Register a production rule. Higher priorities win conflicts during
    /// table generation.
    pub fn rule_with_priority<I, F>(
        &mut self,
        left: NonterminalID,
        right: I,
        priority: i32,
        action: F,
    ) -> Result<RuleID, GrammarError>
    where
        I: IntoIterator,
        I::Item: Into<SymbolID>,
        F: Fn(&mut V, Vec<SymbolValue<V>>) + 'static,
    {
        if !self.nonterminals.contains_key(&left) {
            return Err(GrammarError::UnknownSymbol);
        }

        let right: Vec<SymbolID> = right.into_iter().map(Into::into).collect();
        for symbol in &right {
            let known = match symbol {
                SymbolID::T(t) => self.terminals.contains_key(t),
                SymbolID::N(n) => self.nonterminals.contains_key(n),
            };
            if !known {
                return Err(GrammarError::UnknownSymbol);
            }
        }

        let id = RuleID::new(self.next_rule_id);
        self.next_rule_id += 1;

        self.rules.insert(
            id,
            Rule {
                id,
                left,
                right,
                priority,
                action: Box::new(action),
            },
        );
        self.nonterminals[&left].rules.push(id);

        Ok(id)
    }

    fn verify_name(&self, name: &str) -> Result<(), GrammarError> {
        if !verify_ident(name) {
            return Err(GrammarError::InvalidName(name.to_owned()));
        }

        let taken = self.terminals.values().any(|t| t.name == name)
            || self.nonterminals.values().any(|n| n.name == name);
        if taken {
            return Err(GrammarError::DuplicateName(name.to_owned()));
        }

        Ok(())
    }

    fn end(mut self) -> Result<Grammar<V>, GrammarError> {
        let start = self.start.take().ok_or(GrammarError::MissingStart)?;

        // The reserved name starts with `$` so it cannot collide with any
        // user-declared symbol.
        let stop = match self.stop.take() {
            Some(stop) => stop,
            None => {
                let id = TerminalID::new(self.next_terminal_id);
                self.next_terminal_id += 1;
                self.terminals.insert(
                    id,
                    Terminal {
                        id,
                        name: "$stop".to_owned(),
                        pattern: String::new(),
                        is_stop: true,
                        ignore: false,
                        first: FirstSet::default(),
                    },
                );
                id
            }
        };

        self.nonterminals[&start].is_start = true;

        for nonterminal in self.nonterminals.values() {
            if nonterminal.rules.is_empty() {
                tracing::warn!(
                    "nonterminal `{}` has no associated production rule",
                    nonterminal.name
                );
            }
        }

        let mut grammar = Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            rules: self.rules,
            start,
            stop,
        };
        grammar.resolve();

        Ok(grammar)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("no nonterminal was marked as the start symbol")]
    MissingStart,

    #[error("a stop terminal has already been declared")]
    DuplicateStop,

    #[error("the symbol name `{0}` is already in use")]
    DuplicateName(String),

    #[error("`{0}` is not a valid symbol name")]
    InvalidName(String),

    #[error("terminal `{name}` has an invalid pattern: {source}")]
    InvalidPattern { name: String, source: regex::Error },

    #[error("rule references a symbol that is not part of this grammar")]
    UnknownSymbol,
}

fn verify_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(ch) => ch,
        None => return false,
    };
    if !is_ident_start(first) {
        return false;
    }
    chars.all(is_ident_continue)
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || unicode_ident::is_xid_start(ch)
}

fn is_ident_continue(ch: char) -> bool {
    unicode_ident::is_xid_continue(ch)
}
