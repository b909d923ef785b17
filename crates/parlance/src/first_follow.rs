//! Fixed-point calculation of FIRST and FOLLOW sets.

use crate::grammar::{FirstSet, Grammar, SymbolID, TerminalSet};

impl<V> Grammar<V> {
    /// Recompute the FIRST set of every symbol and the FOLLOW set of every
    /// nonterminal, in place.
    ///
    /// Runs automatically when the grammar definition is finished; calling
    /// it again is idempotent once the sets have converged.
    pub fn resolve(&mut self) {
        for terminal in self.terminals_mut() {
            let id = terminal.id();
            terminal.first.clear();
            terminal.first.insert(id);
        }
        for nonterminal in self.nonterminals_mut() {
            nonterminal.first.clear();
            nonterminal.follow.clear();
        }

        self.compute_first();

        let start = self.start_symbol();
        let stop = self.stop_terminal();
        self.nonterminal_mut(start).follow.insert(stop);
        self.compute_follow();
    }

    fn compute_first(&mut self) {
        let rule_ids = self.rule_ids();

        let mut changed = true;
        while changed {
            changed = false;

            for &id in &rule_ids {
                // For X := Y1 Y2 ... Yn, add FIRST(Yi) (minus epsilon) to
                // FIRST(X) while epsilon is in FIRST(Yj) for all j < i; add
                // epsilon to FIRST(X) if it is in FIRST(Yi) for every i.
                // An empty right-hand side contributes epsilon directly.
                let rule = self.rule(id);
                let left = rule.left();

                let mut additions = FirstSet::default();
                let mut epsilon_in_all = true;
                for &symbol in rule.right() {
                    let first = self.first_of(symbol);
                    additions.terminals_mut().union_with(first.terminals());
                    if !first.contains_epsilon() {
                        epsilon_in_all = false;
                        break;
                    }
                }
                if epsilon_in_all {
                    additions.insert_epsilon();
                }

                let first = &mut self.nonterminal_mut(left).first;
                changed |= first.terminals_mut().union_with(additions.terminals());
                if additions.contains_epsilon() {
                    changed |= first.insert_epsilon();
                }
            }
        }
    }

    fn compute_follow(&mut self) {
        let rule_ids = self.rule_ids();

        let mut changed = true;
        while changed {
            changed = false;

            for &id in &rule_ids {
                let positions = self.rule(id).right().len();
                for idx in 0..positions {
                    let rule = self.rule(id);
                    let left = rule.left();
                    let y = match rule.right()[idx] {
                        SymbolID::N(n) => n,
                        SymbolID::T(..) => continue,
                    };

                    // For X := ... Y B1 B2 ... Bn, add FIRST(Bi) (minus
                    // epsilon) to FOLLOW(Y) while epsilon is in FIRST(Bj)
                    // for all j < i; add FOLLOW(X) to FOLLOW(Y) if epsilon
                    // is in FIRST(Bi) for every i.
                    let mut additions = TerminalSet::default();
                    let mut epsilon_in_all = true;
                    for &symbol in &rule.right()[idx + 1..] {
                        let first = self.first_of(symbol);
                        additions.union_with(first.terminals());
                        if !first.contains_epsilon() {
                            epsilon_in_all = false;
                            break;
                        }
                    }

                    let follow_left = if epsilon_in_all {
                        Some(self.nonterminal(left).follow().clone())
                    } else {
                        None
                    };

                    let follow = &mut self.nonterminal_mut(y).follow;
                    changed |= follow.union_with(&additions);
                    if let Some(follow_left) = follow_left {
                        changed |= follow.union_with(&follow_left);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::{Grammar, NonterminalID, SymbolID, TerminalID};
    use crate::parser::SymbolValue;

    fn noop(_: &mut (), _: Vec<SymbolValue<()>>) {}

    struct Fixture {
        grammar: Grammar<()>,
        a: TerminalID,
        b: TerminalID,
        s: NonterminalID,
        opt: NonterminalID,
        tail: NonterminalID,
    }

    // S := Opt Tail ; Opt := (empty) | 'a' ; Tail := 'b'
    fn epsilon_grammar() -> Fixture {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let a = g.terminal("A", "a")?;
            let b = g.terminal("B", "b")?;
            let s = g.nonterminal("S")?;
            let opt = g.nonterminal("Opt")?;
            let tail = g.nonterminal("Tail")?;
            g.start_symbol(s);
            g.rule(s, [SymbolID::N(opt), SymbolID::N(tail)], noop)?;
            g.rule(opt, std::iter::empty::<SymbolID>(), noop)?;
            g.rule(opt, [a], noop)?;
            g.rule(tail, [b], noop)?;
            ids = Some((a, b, s, opt, tail));
            Ok(())
        })
        .unwrap();
        let (a, b, s, opt, tail) = ids.unwrap();
        Fixture {
            grammar,
            a,
            b,
            s,
            opt,
            tail,
        }
    }

    #[test]
    fn terminal_first_is_itself() {
        let f = epsilon_grammar();
        for terminal in f.grammar.terminals() {
            assert!(terminal.first().contains(terminal.id()));
            assert_eq!(terminal.first().terminals().len(), 1);
            assert!(!terminal.first().contains_epsilon());
        }
    }

    #[test]
    fn first_propagates_through_epsilon() {
        let f = epsilon_grammar();

        let opt = f.grammar.nonterminal(f.opt);
        assert!(opt.first().contains(f.a));
        assert!(opt.first().contains_epsilon());

        // Opt can derive empty, so FIRST(S) sees through to Tail.
        let s = f.grammar.nonterminal(f.s);
        assert!(s.first().contains(f.a));
        assert!(s.first().contains(f.b));
        assert!(!s.first().contains_epsilon());
    }

    #[test]
    fn follow_of_start_contains_stop() {
        let f = epsilon_grammar();
        let stop = f.grammar.stop_terminal();
        assert!(f.grammar.nonterminal(f.s).follow().contains(stop));
    }

    #[test]
    fn follow_of_rightmost_inherits_follow_of_lhs() {
        let f = epsilon_grammar();
        let stop = f.grammar.stop_terminal();

        assert!(f.grammar.nonterminal(f.opt).follow().contains(f.b));
        assert!(f.grammar.nonterminal(f.tail).follow().contains(stop));
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut f = epsilon_grammar();

        let firsts: Vec<_> = f
            .grammar
            .nonterminals()
            .map(|n| n.first().clone())
            .collect();
        let follows: Vec<_> = f
            .grammar
            .nonterminals()
            .map(|n| n.follow().clone())
            .collect();

        f.grammar.resolve();

        let firsts_after: Vec<_> = f
            .grammar
            .nonterminals()
            .map(|n| n.first().clone())
            .collect();
        let follows_after: Vec<_> = f
            .grammar
            .nonterminals()
            .map(|n| n.follow().clone())
            .collect();

        assert_eq!(firsts, firsts_after);
        assert_eq!(follows, follows_after);
    }
}
