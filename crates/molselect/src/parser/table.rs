//! LALR(1) parse table construction
//!
//! States are LR(0) cores identified by their sorted kernel items.
//! Lookaheads are computed LR(1)-style and merged into the matching core;
//! a state whose lookaheads grow is processed again until nothing changes.
//!
//! Conflicts are resolved rather than rejected: shift wins over reduce and
//! the earlier production wins a reduce/reduce conflict. Each resolution is
//! logged.

use super::bnf::{Grammar, Symbol, END};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::warn;

/// LR parsing action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Shift to state
    Shift(usize),
    /// Reduce using production
    Reduce(usize),
    /// Accept (successful parse)
    Accept,
}

/// (production, dot position)
type Item = (usize, usize);

#[derive(Debug, Clone)]
struct State {
    kernel: Vec<Item>,
    lookaheads: Vec<BTreeSet<usize>>,
    transitions: BTreeMap<Symbol, usize>,
}

/// Action and goto tables
#[derive(Debug, Clone)]
pub struct ParseTable {
    /// Per state: terminal -> action
    pub actions: Vec<BTreeMap<usize, Action>>,
    /// Per state: rule -> state
    pub gotos: Vec<BTreeMap<usize, usize>>,
    /// Entry rule name -> initial state
    pub starts: HashMap<String, usize>,
    /// Number of conflicts resolved while building
    pub conflicts: usize,
}

impl ParseTable {
    pub fn build(grammar: &Grammar) -> Self {
        let first = FirstSets::new(grammar);
        let augmented: BTreeSet<usize> = grammar.entries.iter().map(|(_, p)| *p).collect();

        let mut states: Vec<State> = Vec::new();
        let mut index: HashMap<Vec<Item>, usize> = HashMap::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        let mut queued: Vec<bool> = Vec::new();
        let mut starts = HashMap::new();

        for (entry, production) in &grammar.entries {
            let kernel = vec![(*production, 0)];
            let id = states.len();
            states.push(State {
                kernel: kernel.clone(),
                lookaheads: vec![BTreeSet::from([END])],
                transitions: BTreeMap::new(),
            });
            index.insert(kernel, id);
            queue.push_back(id);
            queued.push(true);
            starts.insert(entry.clone(), id);
        }

        while let Some(s) = queue.pop_front() {
            queued[s] = false;
            let closure = closure(grammar, &first, &states[s]);

            let mut successors: BTreeMap<Symbol, BTreeMap<Item, BTreeSet<usize>>> =
                BTreeMap::new();
            for (&(p, dot), lookahead) in &closure {
                if let Some(&symbol) = grammar.productions[p].rhs.get(dot) {
                    successors
                        .entry(symbol)
                        .or_default()
                        .entry((p, dot + 1))
                        .or_default()
                        .extend(lookahead.iter().copied());
                }
            }

            for (symbol, items) in successors {
                let kernel: Vec<Item> = items.keys().copied().collect();
                let lookaheads: Vec<BTreeSet<usize>> = items.into_values().collect();

                let target = match index.get(&kernel) {
                    Some(&target) => {
                        let mut grew = false;
                        for (existing, incoming) in
                            states[target].lookaheads.iter_mut().zip(lookaheads)
                        {
                            let before = existing.len();
                            existing.extend(incoming);
                            grew |= existing.len() != before;
                        }
                        if grew && !queued[target] {
                            queued[target] = true;
                            queue.push_back(target);
                        }
                        target
                    }
                    None => {
                        let target = states.len();
                        states.push(State {
                            kernel: kernel.clone(),
                            lookaheads,
                            transitions: BTreeMap::new(),
                        });
                        index.insert(kernel, target);
                        queued.push(true);
                        queue.push_back(target);
                        target
                    }
                };
                states[s].transitions.insert(symbol, target);
            }
        }

        let mut table = ParseTable {
            actions: vec![BTreeMap::new(); states.len()],
            gotos: vec![BTreeMap::new(); states.len()],
            starts,
            conflicts: 0,
        };

        for (s, state) in states.iter().enumerate() {
            for (&symbol, &target) in &state.transitions {
                match symbol {
                    Symbol::Terminal(t) => table.set(grammar, s, t, Action::Shift(target)),
                    Symbol::Rule(r) => {
                        table.gotos[s].insert(r, target);
                    }
                }
            }
            for ((p, dot), lookahead) in closure(grammar, &first, state) {
                if dot < grammar.productions[p].rhs.len() {
                    continue;
                }
                let action = if augmented.contains(&p) {
                    Action::Accept
                } else {
                    Action::Reduce(p)
                };
                for t in lookahead {
                    table.set(grammar, s, t, action);
                }
            }
        }

        table
    }

    pub fn num_states(&self) -> usize {
        self.actions.len()
    }

    /// Terminals with an action in `state`
    pub fn expected(&self, state: usize) -> impl Iterator<Item = usize> + '_ {
        self.actions[state].keys().copied()
    }

    fn set(&mut self, grammar: &Grammar, state: usize, terminal: usize, action: Action) {
        let slot = self.actions[state].entry(terminal).or_insert(action);
        if *slot == action {
            return;
        }
        let resolved = match (*slot, action) {
            (Action::Shift(_), _) | (Action::Accept, _) => *slot,
            (_, Action::Shift(_)) | (_, Action::Accept) => action,
            (Action::Reduce(a), Action::Reduce(b)) => Action::Reduce(a.min(b)),
        };
        warn!(
            state,
            terminal = grammar.terminal_name(terminal),
            existing = ?*slot,
            incoming = ?action,
            kept = ?resolved,
            "Resolved grammar conflict"
        );
        *slot = resolved;
        self.conflicts += 1;
    }
}

/// LR(1) closure of a state's kernel
fn closure(grammar: &Grammar, first: &FirstSets, state: &State) -> BTreeMap<Item, BTreeSet<usize>> {
    let mut items: BTreeMap<Item, BTreeSet<usize>> = state
        .kernel
        .iter()
        .copied()
        .zip(state.lookaheads.iter().cloned())
        .collect();
    let mut pending: Vec<Item> = state.kernel.clone();

    while let Some((p, dot)) = pending.pop() {
        let rhs = &grammar.productions[p].rhs;
        let Some(Symbol::Rule(rule)) = rhs.get(dot) else {
            continue;
        };
        let follow = first.of_sequence(&rhs[dot + 1..], &items[&(p, dot)]);
        for &q in &grammar.by_lhs[*rule] {
            let fresh = !items.contains_key(&(q, 0));
            let entry = items.entry((q, 0)).or_default();
            let before = entry.len();
            entry.extend(follow.iter().copied());
            if fresh || entry.len() != before {
                pending.push((q, 0));
            }
        }
    }

    items
}

/// Nullable flags and FIRST sets per rule
struct FirstSets {
    nullable: Vec<bool>,
    first: Vec<BTreeSet<usize>>,
}

impl FirstSets {
    fn new(grammar: &Grammar) -> Self {
        let mut nullable = vec![false; grammar.rules.len()];
        let mut first = vec![BTreeSet::new(); grammar.rules.len()];

        let mut changed = true;
        while changed {
            changed = false;
            for production in &grammar.productions {
                let lhs = production.lhs;
                let mut all_nullable = true;
                for symbol in &production.rhs {
                    match *symbol {
                        Symbol::Terminal(t) => {
                            changed |= first[lhs].insert(t);
                            all_nullable = false;
                        }
                        Symbol::Rule(r) => {
                            if r != lhs {
                                let inherited: Vec<usize> = first[r].iter().copied().collect();
                                for t in inherited {
                                    changed |= first[lhs].insert(t);
                                }
                            }
                            all_nullable = nullable[r];
                        }
                    }
                    if !all_nullable {
                        break;
                    }
                }
                if all_nullable && !nullable[lhs] {
                    nullable[lhs] = true;
                    changed = true;
                }
            }
        }

        Self { nullable, first }
    }

    /// FIRST(sequence · lookahead)
    fn of_sequence(&self, sequence: &[Symbol], lookahead: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        for symbol in sequence {
            match *symbol {
                Symbol::Terminal(t) => {
                    out.insert(t);
                    return out;
                }
                Symbol::Rule(r) => {
                    out.extend(self.first[r].iter().copied());
                    if !self.nullable[r] {
                        return out;
                    }
                }
            }
        }
        out.extend(lookahead.iter().copied());
        out
    }
}
