// LR(0) item machinery, FIRST sets and LALR(1) lookahead computation.
//
// Productions are encoded as symbol index vectors with the left-hand side at
// index `0`, so the dot of a fresh item sits at position `1`. Symbols below
// `n_nonterm` are non-terminals, the rest are terminals and the last terminal
// is the end-of-input marker.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Represents an LR(0) item consisting of a production index and a dot position.
///
/// For example, if production `E → E + T` is partially parsed as `E → E • + T`,
/// the `Item` stores the production index for `E → E + T` and dot position `2`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Item {
    /// The index of the production in the grammar.
    pub prod: usize,

    /// The position of the dot within the production (`1` is before the first
    /// right-hand side symbol).
    pub dot: usize,
}

/// A set of LR(0) items
pub type ItemSet = BTreeSet<Item>;

/// Lookahead placeholder used while discovering propagation links.
const PROBE: usize = usize::MAX;

/// One state of the LALR(1) automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// Kernel items, sorted.
    pub kernel: Vec<Item>,
    /// Lookaheads of each kernel item.
    pub lookaheads: Vec<BTreeSet<usize>>,
    /// Successor state per symbol.
    pub transitions: BTreeMap<usize, usize>,
    /// Completed productions and the terminals they reduce on.
    pub reductions: BTreeMap<usize, BTreeSet<usize>>,
}

/// The LALR(1) automaton of an encoded grammar.
#[derive(Debug, Clone)]
pub struct Automaton {
    pub states: Vec<State>,
    pub first: Vec<BTreeSet<usize>>,
    pub nullable: Vec<bool>,
}

/// Grammar view shared by the construction steps.
pub struct Lalr<'a> {
    prods: &'a [Vec<usize>],
    n_nonterm: usize,
    n_term: usize,
    /// Productions of each non-terminal.
    by_lhs: Vec<Vec<usize>>,
    first: Vec<BTreeSet<usize>>,
    nullable: Vec<bool>,
}

impl<'a> Lalr<'a> {
    /// # Parameters
    /// - `prods`: productions with the LHS at index `0`; production `0` is the
    ///   augmented start production.
    /// - `n_nonterm`: number of nonterminal symbols.
    /// - `n_term`: number of terminal symbols, end marker included.
    pub fn new(prods: &'a [Vec<usize>], n_nonterm: usize, n_term: usize) -> Self {
        let mut by_lhs = vec![Vec::new(); n_nonterm];
        for (i, p) in prods.iter().enumerate() {
            by_lhs[p[0]].push(i);
        }
        let (first, nullable) = first_sets(prods, n_nonterm, n_term);
        Self {
            prods,
            n_nonterm,
            n_term,
            by_lhs,
            first,
            nullable,
        }
    }

    /// Computes the LR(0) *closure* of a set of items.
    pub fn closure(&self, items: &ItemSet) -> ItemSet {
        let mut c = items.clone();
        let mut work: Vec<Item> = items.iter().cloned().collect();
        while let Some(item) = work.pop() {
            let Some(&t) = self.prods[item.prod].get(item.dot) else {
                continue;
            };
            if t < self.n_nonterm {
                for &j in &self.by_lhs[t] {
                    let new_item = Item { prod: j, dot: 1 };
                    if c.insert(new_item.clone()) {
                        work.push(new_item);
                    }
                }
            }
        }
        c
    }

    /// Computes the kernel reached from `items` on `sym`.
    pub fn goto(&self, items: &ItemSet, sym: usize) -> ItemSet {
        let mut moved = ItemSet::new();
        for item in items {
            let p = &self.prods[item.prod];
            if item.dot < p.len() && p[item.dot] == sym {
                moved.insert(Item {
                    prod: item.prod,
                    dot: item.dot + 1,
                });
            }
        }
        moved
    }

    /// FIRST of a symbol string, and whether the string is nullable.
    fn first_of(&self, seq: &[usize]) -> (BTreeSet<usize>, bool) {
        let mut out = BTreeSet::new();
        for &sym in seq {
            out.extend(self.first[sym].iter().copied());
            if !self.nullable[sym] {
                return (out, false);
            }
        }
        (out, true)
    }

    /// Computes the LR(1) closure of items with lookahead sets.
    fn lr1_closure(
        &self,
        seed: impl IntoIterator<Item = (Item, BTreeSet<usize>)>,
    ) -> BTreeMap<Item, BTreeSet<usize>> {
        let mut items: BTreeMap<Item, BTreeSet<usize>> = BTreeMap::new();
        let mut work = Vec::new();
        for (item, la) in seed {
            items.entry(item.clone()).or_default().extend(la);
            work.push(item);
        }
        while let Some(item) = work.pop() {
            let p = &self.prods[item.prod];
            let Some(&x) = p.get(item.dot) else {
                continue;
            };
            if x >= self.n_nonterm {
                continue;
            }
            let (mut follow, nullable) = self.first_of(&p[item.dot + 1..]);
            if nullable {
                if let Some(la) = items.get(&item) {
                    follow.extend(la.iter().copied());
                }
            }
            for &j in &self.by_lhs[x] {
                let new_item = Item { prod: j, dot: 1 };
                let fresh = !items.contains_key(&new_item);
                let entry = items.entry(new_item.clone()).or_default();
                let before = entry.len();
                entry.extend(follow.iter().copied());
                if fresh || entry.len() != before {
                    work.push(new_item);
                }
            }
        }
        items
    }

    /// Builds the canonical collection of LR(0) kernels and their transitions.
    fn lr0_states(&self) -> Vec<State> {
        let start = vec![Item { prod: 0, dot: 1 }];
        let mut index: HashMap<Vec<Item>, usize> = HashMap::from([(start.clone(), 0)]);
        let mut states = vec![State {
            kernel: start,
            lookaheads: vec![BTreeSet::new()],
            transitions: BTreeMap::new(),
            reductions: BTreeMap::new(),
        }];
        let mut i = 0;
        while i < states.len() {
            let items = self.closure(&states[i].kernel.iter().cloned().collect());
            let symbols: BTreeSet<usize> = items
                .iter()
                .filter_map(|item| self.prods[item.prod].get(item.dot).copied())
                .collect();
            for sym in symbols {
                let kernel: Vec<Item> = self.goto(&items, sym).into_iter().collect();
                let next = match index.get(&kernel) {
                    Some(&next) => next,
                    None => {
                        let next = states.len();
                        index.insert(kernel.clone(), next);
                        states.push(State {
                            lookaheads: vec![BTreeSet::new(); kernel.len()],
                            kernel,
                            transitions: BTreeMap::new(),
                            reductions: BTreeMap::new(),
                        });
                        next
                    }
                };
                states[i].transitions.insert(sym, next);
            }
            i += 1;
        }
        states
    }

    /// Builds the LALR(1) automaton.
    ///
    /// Lookaheads are computed by spontaneous generation and propagation over
    /// the LR(0) kernels (Aho et al., section 4.7.5).
    pub fn build(&self) -> Automaton {
        let mut states = self.lr0_states();
        let eos = self.n_nonterm + self.n_term - 1;
        states[0].lookaheads[0].insert(eos);

        let mut links: Vec<((usize, usize), (usize, usize))> = Vec::new();
        for s in 0..states.len() {
            for k in 0..states[s].kernel.len() {
                let seed = (states[s].kernel[k].clone(), BTreeSet::from([PROBE]));
                for (item, la) in self.lr1_closure([seed]) {
                    let Some(&x) = self.prods[item.prod].get(item.dot) else {
                        continue;
                    };
                    let Some(&t) = states[s].transitions.get(&x) else {
                        continue;
                    };
                    let advanced = Item {
                        prod: item.prod,
                        dot: item.dot + 1,
                    };
                    let Ok(j) = states[t].kernel.binary_search(&advanced) else {
                        continue;
                    };
                    for a in la {
                        if a == PROBE {
                            links.push(((s, k), (t, j)));
                        } else {
                            states[t].lookaheads[j].insert(a);
                        }
                    }
                }
            }
        }
        log::trace!(
            "lalr: {} states, {} propagation links",
            states.len(),
            links.len()
        );

        let mut changed = true;
        while changed {
            changed = false;
            for &((s, k), (t, j)) in &links {
                if (s, k) == (t, j) {
                    continue;
                }
                let from = states[s].lookaheads[k].clone();
                let to = &mut states[t].lookaheads[j];
                let before = to.len();
                to.extend(from);
                changed |= to.len() != before;
            }
        }

        for state in states.iter_mut() {
            let seed: Vec<(Item, BTreeSet<usize>)> = state
                .kernel
                .iter()
                .cloned()
                .zip(state.lookaheads.iter().cloned())
                .collect();
            for (item, la) in self.lr1_closure(seed) {
                if item.dot == self.prods[item.prod].len() {
                    state.reductions.entry(item.prod).or_default().extend(la);
                }
            }
        }

        Automaton {
            states,
            first: self.first.clone(),
            nullable: self.nullable.clone(),
        }
    }
}

/// Computes FIRST sets and nullability for all grammar symbols.
///
/// # Returns
/// A tuple containing:
/// - A vector of FIRST sets (one per symbol).
/// - A vector of booleans marking nullable symbols.
pub fn first_sets(
    prods: &[Vec<usize>],
    n_nonterm: usize,
    n_term: usize,
) -> (Vec<BTreeSet<usize>>, Vec<bool>) {
    let n_sym = n_nonterm + n_term;
    let mut first: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n_sym];
    let mut nullable = vec![false; n_sym];
    // Terminals: FIRST(t) = {t}
    for (t, set) in first.iter_mut().enumerate().skip(n_nonterm) {
        set.insert(t);
    }
    let mut changed = true;
    while changed {
        changed = false;
        for prod in prods {
            let lhs = prod[0];
            let mut all_nullable = true;
            for &sym in &prod[1..] {
                let first_sym = first[sym].clone();
                for f in first_sym {
                    if first[lhs].insert(f) {
                        changed = true;
                    }
                }
                if !nullable[sym] {
                    all_nullable = false;
                    break;
                }
            }
            if all_nullable && !nullable[lhs] {
                nullable[lhs] = true;
                changed = true;
            }
        }
    }
    (first, nullable)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The assignment grammar, which is LALR(1) but not SLR(1):
    //   0: S' -> S        3: L -> * R
    //   1: S  -> L = R    4: L -> id
    //   2: S  -> R        5: R -> L
    // nonterminals S'=0 S=1 L=2 R=3, terminals '='=4 '*'=5 id=6 $=7
    fn assignments() -> Vec<Vec<usize>> {
        vec![
            vec![0, 1],
            vec![1, 2, 4, 3],
            vec![1, 3],
            vec![2, 5, 3],
            vec![2, 6],
            vec![3, 2],
        ]
    }

    #[test]
    fn first_sets_and_nullable() {
        // S' -> S ; S -> A b ; A -> ε | a ; terminals a=3 b=4 $=5
        let prods = vec![vec![0, 1], vec![1, 2, 4], vec![2], vec![2, 3]];
        let (first, nullable) = first_sets(&prods, 3, 3);
        assert_eq!(first[1], BTreeSet::from([3, 4]));
        assert_eq!(first[2], BTreeSet::from([3]));
        assert!(nullable[2]);
        assert!(!nullable[1]);
    }

    #[test]
    fn closure_and_goto() {
        let prods = assignments();
        let lalr = Lalr::new(&prods, 4, 4);
        let start = lalr.closure(&ItemSet::from([Item { prod: 0, dot: 1 }]));
        assert_eq!(start.len(), 6);
        let on_l = lalr.goto(&start, 2);
        assert_eq!(
            on_l,
            ItemSet::from([Item { prod: 1, dot: 2 }, Item { prod: 5, dot: 2 }])
        );
    }

    #[test]
    fn lalr_lookaheads_resolve_slr_conflict() {
        let prods = assignments();
        let automaton = Lalr::new(&prods, 4, 4).build();
        assert_eq!(automaton.states.len(), 10);

        // [S -> L . = R] and [R -> L .]: R -> L reduces on $ only.
        let state = automaton
            .states
            .iter()
            .find(|s| s.kernel.contains(&Item { prod: 1, dot: 2 }))
            .unwrap();
        assert_eq!(state.reductions[&5], BTreeSet::from([7]));
        assert!(state.transitions.contains_key(&4));

        // [L -> id .] reduces on both = and $.
        let state = automaton
            .states
            .iter()
            .find(|s| s.kernel == [Item { prod: 4, dot: 2 }])
            .unwrap();
        assert_eq!(state.reductions[&4], BTreeSet::from([4, 7]));
    }

    #[test]
    fn empty_productions_reduce_in_closure() {
        // S' -> S ; S -> A b ; A -> ε | a
        let prods = vec![vec![0, 1], vec![1, 2, 4], vec![2], vec![2, 3]];
        let automaton = Lalr::new(&prods, 3, 3).build();
        let start = &automaton.states[0];
        assert_eq!(start.reductions[&2], BTreeSet::from([4]));
        assert!(start.transitions.contains_key(&3));
        let accept = start.transitions[&1];
        assert_eq!(
            automaton.states[accept].reductions[&0],
            BTreeSet::from([5])
        );
    }
}
