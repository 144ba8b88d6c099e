use crate::forest::Forest;
use crate::grammar::{Grammar, Symbol};
use crate::items::{Item, ItemSet};
use log::{debug, log_enabled, trace, Level};
use std::fmt::Debug;
use thiserror::Error;


/// A lexeme scanned from input. `start`/`next` are source offsets
/// (position of the lexeme and position right after it).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token<T> {
    pub kind: T,
    pub text: String,
    pub start: usize,
    pub next: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error<T> {
    #[error("syntax error at {pos}: expected one of {expected:?}")]
    Syntax { pos: usize, expected: Vec<T> },
    #[error("empty token at {pos}")]
    EmptyToken { pos: usize },
}

/// A scanned token and the expected kinds it stands for, as indices into
/// the `expected` slice the tokenizer was given. `None` leaves the choice to
/// the parser's `equals`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Scan<T> {
    pub token: Token<T>,
    pub matches: Option<Vec<usize>>,
}

/// Supplies the parser with input. Called exactly once per chart position
/// with the terminal kinds the parser can accept there; returns the next
/// token or `None` when the input is exhausted. An empty `expected` set means
/// nothing else is acceptable: any further token is trailing garbage.
///
/// Only items waiting on one of the matched kinds advance past the token, so
/// a tokenizer that settles on one kind (a keyword over an identifier) keeps
/// the other readings out of the chart.
pub trait Tokenizer<T> {
    fn scan(&mut self, expected: &[&T]) -> Result<Option<Scan<T>>, Error<T>>;
}

/// Plain closures return the token only; its matches come from `equals`.
impl<T, F> Tokenizer<T> for F
    where F: FnMut(&[&T]) -> Result<Option<Token<T>>, Error<T>>
{
    fn scan(&mut self, expected: &[&T]) -> Result<Option<Scan<T>>, Error<T>> {
        Ok(self(expected)?.map(Scan::from))
    }
}

/// Earley recognition results: one item set per position plus the token
/// scanned to move from position `i` to `i + 1` and the kinds it was
/// accepted as.
pub(crate) struct Chart<T> {
    pub sets: Vec<ItemSet>,
    pub tokens: Vec<Token<T>>,
    pub accepted: Vec<Vec<T>>,
}

pub struct EarleyParser<'g, T, V, E> {
    grammar: &'g Grammar<T, V>,
    equals: E,
}

///////////////////////////////////////////////////////////////////////////////

impl<T> Token<T> {
    pub fn new(kind: T, text: impl Into<String>, start: usize, next: usize) -> Self {
        Token{kind, text: text.into(), start, next}
    }
}

impl<T> From<Token<T>> for Scan<T> {
    fn from(token: Token<T>) -> Self {
        Scan{token, matches: None}
    }
}

/// Parse input supplied by `tokenizer`. `equals(text, kind)` decides whether
/// a scanned lexeme is acceptable as a terminal of kind `kind`.
pub fn parse<'g, T, V, K, E>(grammar: &'g Grammar<T, V>, tokenizer: K, equals: E)
    -> Result<Forest<'g, T, V>, Error<T>>
        where T: Clone + PartialEq + Debug, K: Tokenizer<T>, E: Fn(&str, &T) -> bool
{
    EarleyParser::new(grammar, equals).parse(tokenizer)
}

impl<'g, T, V, E> EarleyParser<'g, T, V, E>
    where T: Clone + PartialEq + Debug, E: Fn(&str, &T) -> bool
{
    pub fn new(grammar: &'g Grammar<T, V>, equals: E) -> Self {
        EarleyParser{grammar, equals}
    }

    /// Recognize the input and extract every full-span derivation of the
    /// entry nonterminal. Ambiguity is kept: see `Forest::roots`.
    pub fn parse<K: Tokenizer<T>>(&self, mut tokenizer: K) -> Result<Forest<'g, T, V>, Error<T>> {
        let chart = self.recognize(&mut tokenizer)?;
        Ok(Forest::extract(self.grammar, chart))
    }

    // Predict/Complete until no new Items are added to the set at `pos`.
    // Items appended while walking are visited by the same loop.
    fn closure(&self, sets: &mut [ItemSet], pos: usize) {
        let grammar = self.grammar;
        let mut idx = 0;
        while let Some(item) = sets[pos].get(idx) {
            idx += 1;
            match item.next_symbol(grammar) {
                // Complete: advance every item at `origin` waiting on this name
                None => {
                    let name = grammar.production(item.prod).name();
                    let advanced: Vec<_> = sets[item.origin].iter()
                        .filter(|waiting| matches!(
                            waiting.next_symbol(grammar),
                            Some(Symbol::NonTerm(next)) if next == name))
                        .map(Item::advance)
                        .collect();
                    for new_item in advanced {
                        sets[pos].insert(new_item);
                    }
                }
                Some(Symbol::NonTerm(name)) => {
                    for production in grammar.productions_of(name) {
                        sets[pos].insert(Item::predict(production.id(), pos));
                    }
                    // An empty derivation never moves position, so nothing
                    // would complete items predicted after it. Skip ahead.
                    if grammar.is_nullable(name) {
                        sets[pos].insert(item.advance());
                    }
                }
                // Scans populate the next set once this one is exhausted
                Some(Symbol::Term(_)) => (),
            }
        }
    }

    pub(crate) fn recognize<K: Tokenizer<T>>(&self, tokenizer: &mut K) -> Result<Chart<T>, Error<T>> {
        let grammar = self.grammar;
        let s0 = grammar.productions_of(grammar.entry())
            .map(|production| Item::predict(production.id(), 0))
            .collect();
        let mut sets: Vec<ItemSet> = vec![s0];
        let mut tokens = Vec::new();
        let mut accepted = Vec::new();

        for pos in 0.. {
            self.closure(&mut sets, pos);

            // Items in the current set waiting on a terminal, by expected kind
            let mut expected: Vec<&T> = Vec::new();
            let mut awaiting: Vec<(Item, usize)> = Vec::new();
            for item in sets[pos].iter() {
                if let Some(Symbol::Term(kind)) = item.next_symbol(grammar) {
                    let idx = match expected.iter().position(|known| *known == kind) {
                        Some(idx) => idx,
                        None => {
                            expected.push(kind);
                            expected.len() - 1
                        }
                    };
                    awaiting.push((*item, idx));
                }
            }

            let Scan{token, matches} = match tokenizer.scan(&expected)? {
                Some(scan) => scan,
                None => break,
            };
            if token.text.is_empty() {
                return Err(Error::EmptyToken{pos: token.start});
            }
            let mut matched = vec![false; expected.len()];
            match matches {
                Some(indices) => for idx in indices {
                    if let Some(hit) = matched.get_mut(idx) {
                        *hit = true;
                    }
                },
                None => for (hit, kind) in matched.iter_mut().zip(&expected) {
                    *hit = (self.equals)(token.text.as_str(), *kind);
                },
            }
            let next: ItemSet = awaiting.iter()
                .filter(|(_, idx)| matched[*idx])
                .map(|(item, _)| item.advance())
                .collect();
            if next.is_empty() {
                return Err(Error::Syntax{
                    pos: token.start,
                    expected: expected.into_iter().cloned().collect(),
                });
            }
            trace!("scan {:?} at {}: {} items advance", token.text, pos, next.len());
            accepted.push(expected.iter()
                .zip(&matched)
                .filter(|(_, hit)| **hit)
                .map(|(kind, _)| (*kind).clone())
                .collect());
            sets.push(next);
            tokens.push(token);
        }

        if log_enabled!(Level::Trace) {
            for (idx, set) in sets.iter().enumerate() {
                trace!("=== ItemSet {} ===", idx);
                for item in set.iter() {
                    trace!("{}", item.stringify(grammar));
                }
            }
        }
        debug!("recognized {} tokens, {} items",
               tokens.len(), sets.iter().map(ItemSet::len).sum::<usize>());
        Ok(Chart{sets, tokens, accepted})
    }
}
