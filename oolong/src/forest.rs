use crate::grammar::{Grammar, Production, Symbol};
use crate::parser::{Chart, Token};
use crate::spans::SpanIndex;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write};
use std::rc::Rc;


/// Index of a node in its `Forest`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(usize);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Child {
    /// Index into `Forest::tokens`
    Token(usize),
    Node(NodeId),
}

/// One way of deriving a node: its children in production order.
pub type Branch = Vec<Child>;

/// A production matched over `[start, end)`. Every alternative way to derive
/// it is kept in `branches` (a packed node); there is always at least one.
pub struct ForestNode<T, V> {
    production: Rc<Production<T, V>>,
    start: usize,
    end: usize,
    branches: Vec<Branch>,
}

/// Shared packed parse forest. Nodes live in an arena and refer to each other
/// by `NodeId`, so shared subtrees are stored once and cycles are harmless.
pub struct Forest<'g, T, V> {
    grammar: &'g Grammar<T, V>,
    tokens: Vec<Token<T>>,
    nodes: Vec<ForestNode<T, V>>,
    roots: Vec<NodeId>,
}

// Builds nodes lazily from the span index, memoized per (name, start)
struct Extractor<'g, 'e, T, V> {
    grammar: &'g Grammar<T, V>,
    spans: SpanIndex,
    // kinds each token was scanned as
    accepted: &'e [Vec<T>],
    memo: HashMap<(&'g str, usize), Rc<[NodeId]>>,
    nodes: Vec<ForestNode<T, V>>,
}

///////////////////////////////////////////////////////////////////////////////

impl<T, V> ForestNode<T, V> {
    pub fn production(&self) -> &Production<T, V> { &self.production }

    pub fn name(&self) -> &str { self.production.name() }

    pub fn start(&self) -> usize { self.start }

    pub fn end(&self) -> usize { self.end }

    pub fn branches(&self) -> &[Branch] { &self.branches }

    pub fn is_ambiguous(&self) -> bool { self.branches.len() > 1 }
}

impl<T: fmt::Debug, V> fmt::Debug for ForestNode<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({} - {}) {} #branches: {}",
               self.start, self.end, self.production, self.branches.len())
    }
}

impl<'g, T: PartialEq, V> Extractor<'g, '_, T, V> {
    /// Nodes for `name` starting at `start`, any end. Nodes are registered
    /// in the memo before their branches are threaded so a recursive search
    /// for the same pair (left recursion, cycles) sees them.
    fn search(&mut self, name: &'g str, start: usize) -> Rc<[NodeId]> {
        if let Some(found) = self.memo.get(&(name, start)) {
            return found.clone();
        }
        let grammar = self.grammar;
        let mut created = Vec::new();
        for (end, prods) in self.spans.ends(start) {
            for &prod in prods {
                let production = grammar.production(prod);
                if production.name() != name {
                    continue;
                }
                created.push(NodeId(self.nodes.len()));
                self.nodes.push(ForestNode{
                    production: production.clone(),
                    start,
                    end,
                    branches: Vec::new(),
                });
            }
        }
        let created: Rc<[NodeId]> = created.into();
        self.memo.insert((name, start), created.clone());
        for &id in created.iter() {
            self.nodes[id.0].branches = self.thread(id);
        }
        created
    }

    // Walk the production's symbols keeping every partial children sequence
    // that fits inside the node's span. Only those landing on `end` survive,
    // so the last symbol has to end exactly there.
    fn thread(&mut self, id: NodeId) -> Vec<Branch> {
        let grammar = self.grammar;
        let (start, end) = (self.nodes[id.0].start, self.nodes[id.0].end);
        let production = grammar.production(self.nodes[id.0].production.id());

        let mut partial: Vec<(usize, Branch)> = vec![(start, Vec::new())];
        for (idx, symbol) in production.symbols().iter().enumerate() {
            let last = idx + 1 == production.len();
            let reaches = |child_end: usize| if last { child_end == end } else { child_end <= end };
            let mut extended = Vec::new();
            for (pos, branch) in partial {
                match symbol {
                    Symbol::Term(kind) => {
                        let fits = reaches(pos + 1) && self.accepted.get(pos)
                            .is_some_and(|kinds| kinds.contains(kind));
                        if fits {
                            let mut branch = branch;
                            branch.push(Child::Token(pos));
                            extended.push((pos + 1, branch));
                        }
                    }
                    Symbol::NonTerm(name) => {
                        for &child in self.search(name, pos).iter() {
                            let child_end = self.nodes[child.0].end;
                            if reaches(child_end) {
                                let mut branch = branch.clone();
                                branch.push(Child::Node(child));
                                extended.push((child_end, branch));
                            }
                        }
                    }
                }
            }
            partial = extended;
            if partial.is_empty() {
                break;
            }
        }
        partial.into_iter()
            .filter(|(pos, _)| *pos == end)
            .map(|(_, branch)| branch)
            .collect()
    }

    // Least fixpoint: a node is viable when some branch only has tokens and
    // viable nodes as children. Nodes only reachable through cycles never are.
    // Children are settled first and each newly viable node requeues the
    // nodes that use it, so deep chains take a single sweep.
    fn viable(&self) -> Vec<bool> {
        let mut users: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            for child in node.branches.iter().flatten() {
                if let Child::Node(id) = child {
                    users[id.0].push(idx);
                }
            }
        }
        let mut viable = vec![false; self.nodes.len()];
        // nodes are created parents first, popping from the back visits children first
        let mut pending: Vec<usize> = (0..self.nodes.len()).collect();
        while let Some(idx) = pending.pop() {
            if viable[idx] {
                continue;
            }
            let derivable = self.nodes[idx].branches.iter().any(|branch| branch.iter().all(|child| match child {
                Child::Token(_) => true,
                Child::Node(id) => viable[id.0],
            }));
            if derivable {
                viable[idx] = true;
                pending.extend(users[idx].iter().filter(|&&user| !viable[user]));
            }
        }
        viable
    }
}

impl<'g, T, V> Forest<'g, T, V> {
    pub(crate) fn extract(grammar: &'g Grammar<T, V>, chart: Chart<T>) -> Self
        where T: PartialEq
    {
        let Chart{sets, tokens, accepted} = chart;
        let consumed = tokens.len();
        let mut extractor = Extractor{
            grammar,
            spans: SpanIndex::new(grammar, &sets),
            accepted: &accepted,
            memo: HashMap::new(),
            nodes: Vec::new(),
        };
        let candidates = extractor.search(grammar.entry(), 0);

        // Drop unviable nodes and the branches through them, then compact
        let viable = extractor.viable();
        let mut remap = vec![None; extractor.nodes.len()];
        let mut nodes = Vec::new();
        for (idx, node) in extractor.nodes.into_iter().enumerate() {
            if viable[idx] {
                remap[idx] = Some(NodeId(nodes.len()));
                nodes.push(node);
            }
        }
        for node in &mut nodes {
            let branches = std::mem::take(&mut node.branches);
            node.branches = branches.into_iter()
                .filter_map(|branch| branch.into_iter().map(|child| match child {
                    Child::Token(idx) => Some(Child::Token(idx)),
                    Child::Node(id) => remap[id.0].map(Child::Node),
                }).collect::<Option<Branch>>())
                .collect();
        }
        let roots: Vec<_> = candidates.iter()
            .filter_map(|id| remap[id.0])
            .filter(|id| nodes[id.0].end == consumed)
            .collect();
        debug!("forest: {} nodes, {} roots over {} tokens", nodes.len(), roots.len(), consumed);
        Forest{grammar, tokens, nodes, roots}
    }

    pub fn grammar(&self) -> &'g Grammar<T, V> { self.grammar }

    /// Accepted derivations of the entry nonterminal spanning all the input.
    /// Several roots (one per matching production) or ambiguous roots mean
    /// the input has more than one reading.
    pub fn roots(&self) -> &[NodeId] { &self.roots }

    /// # Panics
    /// If `id` comes from another forest with more nodes. See `get`.
    pub fn node(&self, id: NodeId) -> &ForestNode<T, V> { &self.nodes[id.0] }

    pub fn get(&self, id: NodeId) -> Option<&ForestNode<T, V>> { self.nodes.get(id.0) }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn tokens(&self) -> &[Token<T>] { &self.tokens }

    pub fn token(&self, idx: usize) -> &Token<T> { &self.tokens[idx] }

    /// Span of a child in chart positions.
    pub fn span(&self, child: Child) -> (usize, usize) {
        match child {
            Child::Token(idx) => (idx, idx + 1),
            Child::Node(id) => (self.nodes[id.0].start, self.nodes[id.0].end),
        }
    }

    /// Number of distinct derivations below `id`, `None` if a cycle makes
    /// it unbounded (or it overflows).
    pub fn count_trees(&self, id: NodeId) -> Option<u64> {
        let mut counted = HashMap::new();
        let mut active = HashSet::new();
        self.count_helper(id, &mut counted, &mut active)
    }

    fn count_helper(&self, id: NodeId, counted: &mut HashMap<NodeId, u64>,
                    active: &mut HashSet<NodeId>) -> Option<u64> {
        if let Some(&count) = counted.get(&id) {
            return Some(count);
        }
        if !active.insert(id) {
            return None;
        }
        let mut total: u64 = 0;
        for branch in &self.nodes[id.0].branches {
            let mut product: u64 = 1;
            for child in branch {
                if let Child::Node(child) = child {
                    product = product.checked_mul(self.count_helper(*child, counted, active)?)?;
                }
            }
            total = total.checked_add(product)?;
        }
        active.remove(&id);
        counted.insert(id, total);
        Some(total)
    }
}

impl<T: fmt::Debug, V> Forest<'_, T, V> {
    /// Render the forest below `id`, one line per node or token. Ambiguous
    /// nodes list each branch under a `#n` marker; revisited nodes on the
    /// current path print as `(cycle)`.
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut path = HashSet::new();
        self.dump_helper(Child::Node(id), "", &mut path, &mut out);
        out
    }

    fn dump_helper(&self, child: Child, indent: &str, path: &mut HashSet<NodeId>, out: &mut String) {
        let id = match child {
            Child::Token(idx) => {
                let token = &self.tokens[idx];
                let _ = writeln!(out, "{}{:?} {:?}", indent, token.kind, token.text);
                return;
            }
            Child::Node(id) => id,
        };
        let node = &self.nodes[id.0];
        let _ = write!(out, "{}{} @{}..{}", indent, node.production, node.start, node.end);
        if !path.insert(id) {
            let _ = writeln!(out, " (cycle)");
            return;
        }
        let _ = writeln!(out);
        let inner = format!("{}  ", indent);
        for (idx, branch) in node.branches.iter().enumerate() {
            let indent = if node.is_ambiguous() {
                let _ = writeln!(out, "{}#{}", inner, idx);
                format!("{}  ", inner)
            } else {
                inner.clone()
            };
            for child in branch {
                self.dump_helper(*child, &indent, path, out);
            }
        }
        path.remove(&id);
    }
}
