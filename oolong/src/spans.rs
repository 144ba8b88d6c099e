use crate::grammar::{Grammar, ProdId};
use crate::items::ItemSet;
use std::collections::BTreeMap;


/// Transposed chart: start position -> end position -> productions fully
/// matched over `[start, end)`. Ordered so extraction is deterministic.
#[derive(Default, Debug)]
pub struct SpanIndex {
    spans: BTreeMap<usize, BTreeMap<usize, Vec<ProdId>>>,
}

impl SpanIndex {
    /// Collect every complete item: it was found at its set's position and
    /// started at its origin. Empty derivations show up as `[i, i)` since
    /// nullable productions complete in the same set that predicted them.
    pub fn new<T, V>(grammar: &Grammar<T, V>, sets: &[ItemSet]) -> Self {
        let mut spans: BTreeMap<usize, BTreeMap<usize, Vec<ProdId>>> = BTreeMap::new();
        for (end, set) in sets.iter().enumerate() {
            for item in set.iter().filter(|item| item.complete(grammar)) {
                spans.entry(item.origin).or_default()
                    .entry(end).or_default()
                    .push(item.prod);
            }
        }
        for prods in spans.values_mut().flat_map(|ends| ends.values_mut()) {
            prods.sort();
        }
        SpanIndex{spans}
    }

    /// Ends reachable from `start` with the productions matched up to them.
    pub fn ends(&self, start: usize) -> impl Iterator<Item=(usize, &[ProdId])> {
        self.spans.get(&start)
            .into_iter()
            .flat_map(|ends| ends.iter().map(|(end, prods)| (*end, prods.as_slice())))
    }

    #[cfg(test)]
    pub fn contains(&self, start: usize, end: usize, prod: ProdId) -> bool {
        self.spans.get(&start)
            .and_then(|ends| ends.get(&end))
            .is_some_and(|prods| prods.contains(&prod))
    }
}

///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::SpanIndex;
    use crate::grammar::{Grammar, ProdId, Symbol};
    use crate::items::{Item, ItemSet};

    #[test]
    fn spans_from_complete_items() {
        // S -> 'a' S | <e>
        let g: Grammar<&str> = Grammar::new("S")
            .rule("S", vec![Symbol::term("a"), Symbol::nonterm("S")])
            .rule("S", vec![]);
        let s0: ItemSet = vec![
            Item::predict(ProdId(0), 0),
            Item::predict(ProdId(1), 0),
        ].into_iter().collect();
        let s1: ItemSet = vec![
            Item::predict(ProdId(0), 0).advance(),
            Item::predict(ProdId(0), 1),
            Item::predict(ProdId(1), 1),
            Item::predict(ProdId(0), 0).advance().advance(),
        ].into_iter().collect();
        let spans = SpanIndex::new(&g, &[s0, s1]);
        assert!(spans.contains(0, 0, ProdId(1)));
        assert!(spans.contains(1, 1, ProdId(1)));
        assert!(spans.contains(0, 1, ProdId(0)));
        assert!(!spans.contains(0, 1, ProdId(1)));
        let ends: Vec<_> = spans.ends(0).collect();
        assert_eq!(ends, vec![(0, &[ProdId(1)][..]), (1, &[ProdId(0)][..])]);
        assert_eq!(spans.ends(5).count(), 0);
    }
}
