//! Productions written as text, one rule per line:
//!
//! ```text
//! sum -> sum '+' num | num
//! num -> /\d+/
//! ```
//!
//! A symbol is an identifier (nonterminal), a quoted literal or a `/regex/`.
//! Alternatives may be empty and `name ->` alone is an empty production.
//! Rules are parsed with this same engine.

use crate::grammar::{Grammar, ProdId, Production, Symbol};
use crate::lexer::{self, Pattern};
use crate::parser::{Error, Token};
use log::debug;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("line {line}: {error}")]
    Syntax { line: usize, error: Error<Pattern> },
    #[error("line {line}: incomplete rule")]
    Incomplete { line: usize },
    #[error("line {line}: ambiguous rule")]
    Ambiguous { line: usize },
    #[error("line {line}: bad regex")]
    BadRegex { line: usize, #[source] source: regex::Error },
    #[error("line {line}: expected a single production")]
    Alternatives { line: usize },
}

// Symbol as written, before regexes are compiled
#[derive(Clone, Debug)]
enum Atom {
    Name(String),
    Literal(String),
    Regex(String),
}

#[derive(Clone, Debug, Default)]
enum Tpl {
    #[default]
    Nop,
    Text(String),
    Atom(Atom),
    Seq(Vec<Atom>),
    Alts(Vec<Vec<Atom>>),
    Rule(String, Vec<Vec<Atom>>),
}

// use to destructure Tpl enum into a specific alternative
macro_rules! pull {
    ($p:path, $e:expr) => {
        match $e {
            $p(value) => value,
            n => panic!("Bad pull match={:?}", n),
        }
    };
}

thread_local! {
    static TEMPLATE: Grammar<Pattern, Tpl> = template_grammar();
}

fn prod(name: &str, symbols: Vec<Symbol<Pattern>>) -> Production<Pattern, Tpl> {
    Production::new(name, symbols)
}

fn template_grammar() -> Grammar<Pattern, Tpl> {
    let re = |source: &str| Pattern::regex(source).expect("Bad template regex");
    let id = Symbol::term(re(r"[a-zA-Z_][a-zA-Z0-9_]*"));
    let arrow = Symbol::term(Pattern::literal("->"));
    let pipe = Symbol::term(Pattern::literal("|"));
    let quote1 = Symbol::term(re(r#""(?:[^"\\]|\\.)*""#));
    let quote2 = Symbol::term(re(r"'(?:[^'\\]|\\.)*'"));
    let regex = Symbol::term(re(r"/(?:[^/\\]|\\.)*/"));
    let nt = |name: &str| Symbol::nonterm(name);

    let mut grammar = Grammar::new("rule")
        .with_leaf(|token: &Token<Pattern>| Tpl::Text(token.text.clone()));
    grammar.add(prod("rule", vec![id.clone(), arrow, nt("alts")])
        .reducer(|mut n| {
            let alts = pull!(Tpl::Alts, n.remove(2));
            Tpl::Rule(pull!(Tpl::Text, n.remove(0)), alts)
        }));
    grammar.add(prod("alts", vec![nt("alts"), pipe, nt("seq")])
        .reducer(|mut n| {
            let mut alts = pull!(Tpl::Alts, n.remove(0));
            alts.push(pull!(Tpl::Seq, n.remove(1)));
            Tpl::Alts(alts)
        }));
    grammar.add(prod("alts", vec![nt("seq")])
        .reducer(|mut n| Tpl::Alts(vec![pull!(Tpl::Seq, n.remove(0))])));
    grammar.add(prod("seq", vec![nt("seq"), nt("sym")])
        .reducer(|mut n| {
            let mut seq = pull!(Tpl::Seq, n.remove(0));
            seq.push(pull!(Tpl::Atom, n.remove(0)));
            Tpl::Seq(seq)
        }));
    grammar.add(prod("seq", vec![])
        .reducer(|_| Tpl::Seq(Vec::new())));
    grammar.add(prod("sym", vec![id])
        .reducer(|mut n| Tpl::Atom(Atom::Name(pull!(Tpl::Text, n.remove(0))))));
    for quote in [quote1, quote2] {
        grammar.add(prod("sym", vec![quote])
            .reducer(|mut n| Tpl::Atom(Atom::Literal(unquote(&pull!(Tpl::Text, n.remove(0)))))));
    }
    grammar.add(prod("sym", vec![regex])
        .reducer(|mut n| Tpl::Atom(Atom::Regex(unslash(&pull!(Tpl::Text, n.remove(0)))))));
    grammar
}

// Drop the quotes, keep whatever follows each backslash
fn unquote(quoted: &str) -> String {
    let mut text = String::new();
    let mut chars = quoted[1..quoted.len() - 1].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => text.extend(chars.next()),
            c => text.push(c),
        }
    }
    text
}

// Drop the slashes, only `\/` is unescaped; the rest belongs to the regex
fn unslash(delimited: &str) -> String {
    let mut source = String::new();
    let mut chars = delimited[1..delimited.len() - 1].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'/') {
            continue;
        }
        source.push(c);
        if c == '\\' {
            source.extend(chars.next());
        }
    }
    source
}

fn parse_rule(text: &str, line: usize) -> Result<(String, Vec<Vec<Atom>>), GrammarError> {
    TEMPLATE.with(|grammar| {
        let forest = lexer::parse_str(grammar, text)
            .map_err(|error| GrammarError::Syntax{line, error})?;
        let root = match forest.roots() {
            [] => return Err(GrammarError::Incomplete{line}),
            [root] if forest.count_trees(*root) == Some(1) => *root,
            _ => return Err(GrammarError::Ambiguous{line}),
        };
        match forest.accept(root) {
            Some(Tpl::Rule(name, alts)) => Ok((name, alts)),
            _ => Err(GrammarError::Ambiguous{line}),
        }
    })
}

fn build<V: Default + 'static>(name: &str, atoms: Vec<Atom>, line: usize)
    -> Result<Production<Pattern, V>, GrammarError>
{
    let mut symbols = Vec::with_capacity(atoms.len());
    for atom in atoms {
        symbols.push(match atom {
            Atom::Name(name) => Symbol::nonterm(name),
            Atom::Literal(text) => Symbol::term(Pattern::literal(text)),
            Atom::Regex(source) => Symbol::term(Pattern::regex(&source)
                .map_err(|source| GrammarError::BadRegex{line, source})?),
        });
    }
    let production = Production::new(name, symbols);
    debug!("template line {}: {}", line, production);
    Ok(production)
}

/// Every production in `text`, one rule per line (alternatives expand to one
/// production each). Blank lines and lines starting with `#` are skipped.
pub fn productions<V: Default + 'static>(text: &str) -> Result<Vec<Production<Pattern, V>>, GrammarError> {
    let mut productions = Vec::new();
    for (idx, rule) in text.lines().enumerate() {
        let rule = rule.trim();
        if rule.is_empty() || rule.starts_with('#') {
            continue;
        }
        let (name, alts) = parse_rule(rule, idx + 1)?;
        for atoms in alts {
            productions.push(build(&name, atoms, idx + 1)?);
        }
    }
    Ok(productions)
}

/// A single production without alternatives, ready for `.reducer()` and
/// `.chooser()` before being added to a grammar.
pub fn production<V: Default + 'static>(rule: &str) -> Result<Production<Pattern, V>, GrammarError> {
    let (name, mut alts) = parse_rule(rule.trim(), 1)?;
    match alts.pop() {
        Some(atoms) if alts.is_empty() => build(&name, atoms, 1),
        _ => Err(GrammarError::Alternatives{line: 1}),
    }
}

/// Parse `text` and add all its productions to `grammar`. Nothing is added
/// if any line fails.
pub fn add_rules<V: Default + 'static>(grammar: &mut Grammar<Pattern, V>, text: &str)
    -> Result<Vec<ProdId>, GrammarError>
{
    Ok(productions(text)?.into_iter().map(|production| grammar.add(production)).collect())
}

///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{add_rules, production, productions, unquote, unslash, GrammarError};
    use crate::grammar::{Grammar, Symbol};
    use crate::lexer::Pattern;
    use crate::parser::Error;

    #[test]
    fn unescape_literals() {
        assert_eq!(unquote(r#""a\"b""#), r#"a"b"#);
        assert_eq!(unquote(r"'it\'s'"), "it's");
        assert_eq!(unquote(r"'\\'"), r"\");
        assert_eq!(unslash(r"/\d+/"), r"\d+");
        assert_eq!(unslash(r"/a\/b/"), "a/b");
        assert_eq!(unslash(r"/\\/"), r"\\");
    }

    #[test]
    fn single_production() {
        let p = production::<()>(r#"sum -> sum '+' "num" /\d+/ num"#).unwrap();
        assert_eq!(p.name(), "sum");
        assert_eq!(p.symbols(), &[
            Symbol::nonterm("sum"),
            Symbol::term(Pattern::literal("+")),
            Symbol::term(Pattern::literal("num")),
            Symbol::term(Pattern::regex(r"\d+").unwrap()),
            Symbol::nonterm("num"),
        ]);
        assert_eq!(p.to_string(), r"sum -> sum '+' 'num' /\d+/ num");
        let empty = production::<()>("b ->").unwrap();
        assert!(empty.is_empty());
        assert!(matches!(production::<()>("b -> 'x' | 'y'"),
                         Err(GrammarError::Alternatives{line: 1})));
    }

    #[test]
    fn alternatives_and_comments() {
        let text = "
            # epsilon scenario
            a -> b b
            b -> 'x' |

            c -> | '|' c
        ";
        let prods = productions::<()>(text).unwrap();
        let shown: Vec<_> = prods.iter().map(|p| p.to_string()).collect();
        assert_eq!(shown, vec!["a -> b b", "b -> 'x'", "b ->", "c ->", "c -> '|' c"]);
    }

    #[test]
    fn add_rules_to_grammar() {
        let mut g: Grammar<Pattern> = Grammar::new("a");
        let ids = add_rules(&mut g, "a -> b b\nb -> 'x' |").unwrap();
        assert_eq!(ids.len(), 3);
        assert!(g.is_nullable("b"));
        // nothing is added when a later line fails
        assert!(add_rules(&mut g, "c -> 'y'\nd -> /(/").is_err());
        assert_eq!(g.productions().count(), 3);
    }

    #[test]
    fn template_errors() {
        match productions::<()>("ok -> x\n\nbad 'x'") {
            Err(GrammarError::Syntax{line: 3, error: Error::Syntax{pos: 4, expected}}) =>
                assert_eq!(expected, vec![Pattern::literal("->")]),
            other => panic!("unexpected {:?}", other.map(|p| p.len())),
        }
        assert!(matches!(productions::<()>("x -> 'a' ?"),
                         Err(GrammarError::Syntax{line: 1, ..})));
        assert!(matches!(productions::<()>("lonely"),
                         Err(GrammarError::Incomplete{line: 1})));
        assert!(matches!(productions::<()>("x -> /[a-/"),
                         Err(GrammarError::BadRegex{line: 1, ..})));
    }
}
