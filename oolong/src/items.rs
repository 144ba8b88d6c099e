use crate::grammar::{Grammar, ProdId, Symbol};
use std::collections::HashSet;
use std::fmt;


/// An Item is a partially matched production. `dot` shows the match progress
/// and `origin` the chart position where the match started.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Item {
    pub prod: ProdId,
    pub dot: usize,
    pub origin: usize,
}

/// Items recognized at one chart position, in insertion order.
/// Deduped on (prod, dot, origin) which bounds the chart.
#[derive(Default)]
pub struct ItemSet {
    items: Vec<Item>,
    seen: HashSet<Item>,
}


impl Item {
    /// Build a new `Prediction` based Item.
    pub fn predict(prod: ProdId, origin: usize) -> Item {
        Item{prod, dot: 0, origin}
    }

    /// The same item with one more symbol matched.
    pub fn advance(&self) -> Item {
        Item{dot: self.dot + 1, ..*self}
    }

    /// Item is complete if the production has been fully matched
    pub fn complete<T, V>(&self, grammar: &Grammar<T, V>) -> bool {
        self.dot >= grammar.production(self.prod).len()
    }

    /// Exposes the next symbol in the progress of the production
    pub fn next_symbol<'g, T, V>(&self, grammar: &'g Grammar<T, V>) -> Option<&'g Symbol<T>> {
        grammar.production(self.prod).symbols().get(self.dot)
    }

    pub fn stringify<T: fmt::Debug, V>(&self, grammar: &Grammar<T, V>) -> String {
        let production = grammar.production(self.prod);
        let pre = production.symbols().iter().take(self.dot)
            .map(|s| format!("{:?}", s)).collect::<Vec<_>>().join(" ");
        let post = production.symbols().iter().skip(self.dot)
            .map(|s| format!("{:?}", s)).collect::<Vec<_>>().join(" ");
        format!("({}) {} -> {} \u{00b7} {}", self.origin, production.name(), pre, post)
    }
}

impl ItemSet {
    /// Add an item unless already present. Returns whether it was new.
    pub fn insert(&mut self, item: Item) -> bool {
        if !self.seen.insert(item) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn get(&self, idx: usize) -> Option<Item> {
        self.items.get(idx).copied()
    }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item=&Item> {
        self.items.iter()
    }
}

impl FromIterator<Item> for ItemSet {
    fn from_iter<I: IntoIterator<Item=Item>>(iter: I) -> Self {
        let mut set = ItemSet::default();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

///////////////////////////////////////////////////////////////////////////////
