use crate::forest::{Forest, ForestNode};
use crate::parser::Token;
use log::debug;
use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Reduces the values of a node's children into the node's value.
pub type Reducer<V> = Rc<dyn Fn(Vec<V>) -> V>;
/// Picks the branch (by index) to keep for an ambiguous node.
pub type Chooser<T, V> = Rc<dyn Fn(&Forest<'_, T, V>, &ForestNode<T, V>) -> Option<usize>>;
// Lifts a scanned token into the value domain of reducers
type Leaf<T, V> = Rc<dyn Fn(&Token<T>) -> V>;

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Symbol<T> {
    Term(T),
    NonTerm(String),
}

/// Stable identifier of a production within its grammar (declaration order).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ProdId(pub(crate) usize);

pub struct Production<T, V = ()> {
    id: ProdId,
    name: String,
    symbols: Vec<Symbol<T>>,
    reducer: Reducer<V>,
    chooser: Chooser<T, V>,
}

pub struct Grammar<T, V = ()> {
    entry: String,
    productions: Vec<Rc<Production<T, V>>>,
    by_name: HashMap<String, Vec<ProdId>>,
    leaf: Leaf<T, V>,
    // Dropped on every addition, rebuilt on first lookup
    nullable: OnceCell<HashMap<String, Vec<ProdId>>>,
}


impl<T> Symbol<T> {
    pub fn term(kind: T) -> Self {
        Symbol::Term(kind)
    }

    pub fn nonterm(name: impl Into<String>) -> Self {
        Symbol::NonTerm(name.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Term(_))
    }

    pub fn terminal(&self) -> Option<&T> {
        match self {
            Symbol::Term(kind) => Some(kind),
            Symbol::NonTerm(_) => None,
        }
    }

    pub fn nonterminal(&self) -> Option<&str> {
        match self {
            Symbol::NonTerm(name) => Some(name),
            Symbol::Term(_) => None,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Symbol<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::Term(kind) => write!(f, "{:?}", kind),
            Symbol::NonTerm(name) => write!(f, "{}", name),
        }
    }
}

impl<T, V: Default + 'static> Production<T, V> {
    /// A production for `name` with the default reducer (value of the first
    /// child, or `V::default()` when there are no children) and the default
    /// chooser (first branch). The id is assigned by `Grammar::add`.
    pub fn new(name: impl Into<String>, symbols: Vec<Symbol<T>>) -> Self {
        Production {
            id: ProdId(0),
            name: name.into(),
            symbols,
            reducer: Rc::new(|args: Vec<V>| args.into_iter().next().unwrap_or_default()),
            chooser: Rc::new(|_, node| if node.branches().is_empty() { None } else { Some(0) }),
        }
    }
}

impl<T, V> Production<T, V> {
    pub fn reducer(mut self, reducer: impl Fn(Vec<V>) -> V + 'static) -> Self {
        self.reducer = Rc::new(reducer);
        self
    }

    pub fn chooser<F>(mut self, chooser: F) -> Self
        where F: Fn(&Forest<'_, T, V>, &ForestNode<T, V>) -> Option<usize> + 'static
    {
        self.chooser = Rc::new(chooser);
        self
    }

    pub fn id(&self) -> ProdId { self.id }

    pub fn name(&self) -> &str { &self.name }

    pub fn symbols(&self) -> &[Symbol<T>] { &self.symbols }

    pub fn len(&self) -> usize { self.symbols.len() }

    pub fn is_empty(&self) -> bool { self.symbols.is_empty() }

    pub(crate) fn reduce(&self, args: Vec<V>) -> V {
        (self.reducer)(args)
    }

    pub(crate) fn choose(&self, forest: &Forest<'_, T, V>, node: &ForestNode<T, V>) -> Option<usize> {
        (self.chooser)(forest, node)
    }
}

impl<T: fmt::Debug, V> fmt::Display for Production<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ->", self.name)?;
        for symbol in &self.symbols {
            write!(f, " {:?}", symbol)?;
        }
        Ok(())
    }
}

impl<T: fmt::Debug, V> fmt::Debug for Production<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {}", self.id.0, self)
    }
}

impl<T, V: Default + 'static> Grammar<T, V> {
    /// An empty grammar deriving from `entry`. Tokens evaluate to
    /// `V::default()` until a leaf builder is set with `with_leaf`.
    pub fn new(entry: impl Into<String>) -> Self {
        Grammar {
            entry: entry.into(),
            productions: Vec::new(),
            by_name: HashMap::new(),
            leaf: Rc::new(|_| V::default()),
            nullable: OnceCell::new(),
        }
    }

    /// Chaining shortcut for adding a production with default callbacks.
    pub fn rule(mut self, name: impl Into<String>, symbols: Vec<Symbol<T>>) -> Self {
        self.add(Production::new(name, symbols));
        self
    }
}

impl<T, V> Grammar<T, V> {
    pub fn with_leaf(mut self, leaf: impl Fn(&Token<T>) -> V + 'static) -> Self {
        self.leaf = Rc::new(leaf);
        self
    }

    /// Register a production, freezing it and assigning its id.
    pub fn add(&mut self, mut production: Production<T, V>) -> ProdId {
        let id = ProdId(self.productions.len());
        production.id = id;
        self.by_name.entry(production.name.clone()).or_default().push(id);
        self.productions.push(Rc::new(production));
        self.nullable.take();
        id
    }

    pub fn entry(&self) -> &str { &self.entry }

    /// # Panics
    /// If `id` was not handed out by this grammar. Ids from `add` and
    /// `Production::id` of its own productions are always valid.
    pub fn production(&self, id: ProdId) -> &Rc<Production<T, V>> {
        &self.productions[id.0]
    }

    /// Every production in declaration order.
    pub fn productions(&self) -> impl Iterator<Item=&Rc<Production<T, V>>> {
        self.productions.iter()
    }

    /// Productions of `name` in declaration order.
    pub fn productions_of<'a>(&'a self, name: &str) -> impl Iterator<Item=&'a Rc<Production<T, V>>> + 'a {
        self.by_name.get(name)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |id| &self.productions[id.0])
    }

    /// Productions of `name` that derive the empty string, by id.
    pub fn nullable(&self, name: &str) -> &[ProdId] {
        self.nullable.get_or_init(|| nullable_closure(&self.productions))
            .get(name)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_nullable(&self, name: &str) -> bool {
        !self.nullable(name).is_empty()
    }

    pub(crate) fn leaf(&self, token: &Token<T>) -> V {
        (self.leaf)(token)
    }
}

impl<T: fmt::Debug, V> fmt::Debug for Grammar<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("entry", &self.entry)
            .field("productions", &self.productions)
            .finish()
    }
}

// A production derives empty when every symbol is a nonterminal with some
// nullable production (vacuously so when it has no symbols). Iterate to a
// fixpoint; sets only grow so this terminates in at most |P| rounds.
fn nullable_closure<T, V>(productions: &[Rc<Production<T, V>>]) -> HashMap<String, Vec<ProdId>> {
    let mut nullable: HashMap<String, Vec<ProdId>> = HashMap::new();
    let mut found = HashSet::new();
    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut changed = false;
        for production in productions {
            if found.contains(&production.id) {
                continue;
            }
            let derives_empty = production.symbols.iter().all(|symbol| match symbol {
                Symbol::Term(_) => false,
                Symbol::NonTerm(name) => nullable.get(name).is_some_and(|ids| !ids.is_empty()),
            });
            if derives_empty {
                found.insert(production.id);
                nullable.entry(production.name.clone()).or_default().push(production.id);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    for ids in nullable.values_mut() {
        ids.sort();
    }
    debug!("nullable closure: {} productions after {} rounds", found.len(), rounds);
    nullable
}

///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Grammar, ProdId, Production, Symbol};
    use std::collections::HashSet;

    fn t(kind: &'static str) -> Symbol<&'static str> { Symbol::term(kind) }
    fn n(name: &str) -> Symbol<&'static str> { Symbol::nonterm(name) }

    #[test]
    fn symbol_eq_hash() {
        assert_ne!(Symbol::nonterm("X"), Symbol::term("X".to_string()));
        // Check that term and non-term of equal name are not the same
        let mut m = HashSet::new();
        m.insert(Symbol::nonterm("X"));
        m.insert(Symbol::term("X".to_string()));
        assert_eq!(m.len(), 2);
        assert!(t("+").is_terminal());
        assert_eq!(n("Sum").nonterminal(), Some("Sum"));
        assert_eq!(t("+").terminal(), Some(&"+"));
    }

    #[test]
    fn production_display() {
        let mut g: Grammar<&str> = Grammar::new("Sum");
        let id = g.add(Production::new("Sum", vec![n("Sum"), t("+"), n("Num")]));
        assert_eq!(g.production(id).to_string(), r#"Sum -> Sum "+" Num"#);
        let id = g.add(Production::new("X", vec![]));
        assert_eq!(format!("{:?}", g.production(id)), "#1 X ->");
    }

    #[test]
    fn ids_follow_declaration_order() {
        let g: Grammar<&str> = Grammar::new("S")
            .rule("S", vec![n("A"), n("B")])
            .rule("A", vec![t("a")])
            .rule("S", vec![n("B")]);
        let ids: Vec<_> = g.productions().map(|p| p.id()).collect();
        assert_eq!(ids, vec![ProdId(0), ProdId(1), ProdId(2)]);
        let of_s: Vec<_> = g.productions_of("S").map(|p| p.id()).collect();
        assert_eq!(of_s, vec![ProdId(0), ProdId(2)]);
        assert_eq!(g.productions_of("Missing").count(), 0);
    }

    #[test]
    fn nullable_epsilon() {
        // a -> b b ; b -> 'x' | <e>
        let g: Grammar<&str> = Grammar::new("a")
            .rule("a", vec![n("b"), n("b")])
            .rule("b", vec![t("x")])
            .rule("b", vec![]);
        assert_eq!(g.nullable("b"), &[ProdId(2)]);
        assert_eq!(g.nullable("a"), &[ProdId(0)]);
        assert!(g.is_nullable("a"));
        assert!(!g.is_nullable("x"));
    }

    #[test]
    fn nullable_needs_every_symbol() {
        // S -> A B 'c' | A B ; A -> <e> ; B -> A A | 'b'
        let g: Grammar<&str> = Grammar::new("S")
            .rule("S", vec![n("A"), n("B"), t("c")])
            .rule("S", vec![n("A"), n("B")])
            .rule("A", vec![])
            .rule("B", vec![n("A"), n("A")])
            .rule("B", vec![t("b")]);
        assert_eq!(g.nullable("S"), &[ProdId(1)]);
        assert_eq!(g.nullable("B"), &[ProdId(3)]);
        assert_eq!(g.nullable("A"), &[ProdId(2)]);
    }

    #[test]
    fn nullable_recursive_names() {
        // declared before their base case: needs more than one round
        let g: Grammar<&str> = Grammar::new("X")
            .rule("X", vec![n("Y")])
            .rule("Y", vec![n("Z"), n("X")])
            .rule("Y", vec![n("Z")])
            .rule("Z", vec![]);
        assert_eq!(g.nullable("X"), &[ProdId(0)]);
        assert_eq!(g.nullable("Y"), &[ProdId(1), ProdId(2)]);
        // left recursion alone never derives empty
        let g: Grammar<&str> = Grammar::new("L")
            .rule("L", vec![n("L")])
            .rule("L", vec![n("L"), t("x")]);
        assert!(!g.is_nullable("L"));
    }

    #[test]
    fn nullable_invalidated_by_add() {
        let mut g: Grammar<&str> = Grammar::new("S").rule("S", vec![n("A")]);
        assert!(!g.is_nullable("S"));
        assert_eq!(g.nullable("S"), g.nullable("S"));
        g.add(Production::new("A", vec![]));
        assert!(g.is_nullable("S"));
        assert_eq!(g.nullable("A"), &[ProdId(1)]);
    }
}
