use crate::forest::Forest;
use crate::grammar::Grammar;
use crate::parser::{self, Error, Scan, Token, Tokenizer};
use regex::Regex;
use std::{fmt, hash};


/// Terminal kind given as a literal string or a regular expression.
/// Two patterns are the same terminal when their source text is the same.
#[derive(Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Matcher),
}

/// A compiled regex terminal, anchored for prefix scans and whole matches.
#[derive(Clone)]
pub struct Matcher {
    source: String,
    prefix: Regex,
    whole: Regex,
}

/// Longest-match tokenizer over a string. Only the patterns the parser
/// expects at each position are tried, so the same text may lex differently
/// depending on context. Whitespace between tokens is skipped.
pub struct Lexer<'i> {
    input: &'i str,
    offset: usize,
}


impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    pub fn regex(source: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex(Matcher{
            source: source.to_string(),
            prefix: Regex::new(&format!("^(?:{})", source))?,
            whole: Regex::new(&format!("^(?:{})$", source))?,
        }))
    }

    pub fn source(&self) -> &str {
        match self {
            Pattern::Literal(text) => text,
            Pattern::Regex(matcher) => &matcher.source,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Pattern::Literal(_))
    }

    /// Whether `text` as a whole is accepted by this terminal.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Literal(literal) => literal == text,
            Pattern::Regex(matcher) => matcher.whole.is_match(text),
        }
    }

    /// Length of the match at the start of `input`, if any.
    pub fn match_prefix(&self, input: &str) -> Option<usize> {
        match self {
            Pattern::Literal(literal) => input.starts_with(literal.as_str()).then(|| literal.len()),
            Pattern::Regex(matcher) => matcher.prefix.find(input).map(|m| m.end()),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Pattern) -> bool {
        self.is_literal() == other.is_literal() && self.source() == other.source()
    }
}

impl Eq for Pattern {}

impl hash::Hash for Pattern {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.is_literal().hash(state);
        self.source().hash(state);
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pattern::Literal(text) => write!(f, "'{}'", text),
            Pattern::Regex(matcher) => write!(f, "/{}/", matcher.source),
        }
    }
}

/// The `equals(text, kind)` predicate for pattern terminals.
pub fn equals(text: &str, kind: &Pattern) -> bool {
    kind.matches(text)
}

/// Parse `input` with the default `Lexer`.
pub fn parse_str<'g, V>(grammar: &'g Grammar<Pattern, V>, input: &str)
    -> Result<Forest<'g, Pattern, V>, Error<Pattern>>
{
    parser::parse(grammar, Lexer::new(input), equals)
}

impl<'i> Lexer<'i> {
    pub fn new(input: &'i str) -> Self {
        Lexer{input, offset: 0}
    }

    /// Byte offset of the next unread character.
    pub fn offset(&self) -> usize { self.offset }

    /// Longest match among `expected` after skipping whitespace. Literals
    /// beat regexes on ties, then the first expected pattern wins.
    pub fn next_token(&mut self, expected: &[&Pattern]) -> Result<Option<Token<Pattern>>, Error<Pattern>> {
        let rest = &self.input[self.offset..];
        let trimmed = rest.trim_start();
        self.offset += rest.len() - trimmed.len();
        if trimmed.is_empty() {
            return Ok(None);
        }
        // Longest match wins, literals beat regexes on ties, then order
        let mut best: Option<(usize, &Pattern)> = None;
        for &pattern in expected {
            if let Some(len) = pattern.match_prefix(trimmed) {
                let better = match best {
                    None => true,
                    Some((best_len, best_pattern)) =>
                        len > best_len || (len == best_len && pattern.is_literal() && !best_pattern.is_literal()),
                };
                if better {
                    best = Some((len, pattern));
                }
            }
        }
        let (len, kind) = match best {
            Some(best) => best,
            None => return Err(Error::Syntax{
                pos: self.offset,
                expected: expected.iter().map(|&pattern| pattern.clone()).collect(),
            }),
        };
        if len == 0 {
            return Err(Error::EmptyToken{pos: self.offset});
        }
        let start = self.offset;
        self.offset += len;
        Ok(Some(Token::new(kind.clone(), &trimmed[..len], start, self.offset)))
    }
}

/// The token only stands for the pattern that won, so a keyword is never
/// also read as the identifier regex it ties with.
impl Tokenizer<Pattern> for Lexer<'_> {
    fn scan(&mut self, expected: &[&Pattern]) -> Result<Option<Scan<Pattern>>, Error<Pattern>> {
        Ok(self.next_token(expected)?.map(|token| {
            let matches = expected.iter()
                .enumerate()
                .filter(|(_, kind)| **kind == &token.kind)
                .map(|(idx, _)| idx)
                .collect();
            Scan{token, matches: Some(matches)}
        }))
    }
}

///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Lexer, Pattern};
    use crate::parser::{Error, Scan, Token, Tokenizer};

    fn lit(text: &str) -> Pattern { Pattern::literal(text) }
    fn re(source: &str) -> Pattern { Pattern::regex(source).unwrap() }

    #[test]
    fn pattern_eq_by_source() {
        assert_eq!(re(r"\d+"), re(r"\d+"));
        assert_ne!(re(r"\d+"), re(r"\d*"));
        assert_ne!(lit("a"), re("a"));
        assert_eq!(format!("{:?} {:?}", lit("+"), re(r"\d+")), r"'+' /\d+/");
        assert!(Pattern::regex("(").is_err());
    }

    #[test]
    fn pattern_matches_whole_text() {
        assert!(re(r"\d+").matches("123"));
        assert!(!re(r"\d+").matches("12a"));
        assert!(!re("a|ab").matches("abc"));
        assert!(re("a|ab").matches("ab"));
        assert!(lit("->").matches("->"));
        assert!(!lit("->").matches("-"));
        assert_eq!(re(r"\d+").match_prefix("42+1"), Some(2));
        assert_eq!(lit("+").match_prefix("42+1"), None);
    }

    #[test]
    fn lexer_longest_expected_match() {
        let (num, plus, ident, kw) = (re(r"\d+"), lit("+"), re("[a-z]+"), lit("if"));
        let mut lexer = Lexer::new("  12 + iffy if");
        let token = lexer.next_token(&[&plus, &num]).unwrap().unwrap();
        assert_eq!((token.kind, token.text.as_str(), token.start, token.next), (num.clone(), "12", 2, 4));
        let token = lexer.next_token(&[&plus]).unwrap().unwrap();
        assert_eq!((token.text.as_str(), token.start), ("+", 5));
        // longest match beats the keyword
        let token = lexer.next_token(&[&kw, &ident]).unwrap().unwrap();
        assert_eq!((token.kind, token.text.as_str()), (ident.clone(), "iffy"));
        // on a tie the literal wins
        let token = lexer.next_token(&[&ident, &kw]).unwrap().unwrap();
        assert_eq!((token.kind, token.text.as_str()), (kw.clone(), "if"));
        assert_eq!(lexer.next_token(&[&num]).unwrap(), None);
        assert_eq!(lexer.offset(), 14);
    }

    #[test]
    fn lexer_errors() {
        let num = re(r"\d+");
        let mut lexer = Lexer::new("1 x");
        assert!(lexer.next_token(&[&num]).unwrap().is_some());
        assert_eq!(lexer.next_token(&[&num]).unwrap_err(),
                   Error::Syntax{pos: 2, expected: vec![num.clone()]});
        // nothing expected but input is left
        assert_eq!(lexer.next_token(&[]).unwrap_err(),
                   Error::Syntax{pos: 2, expected: vec![]});
        let maybe = re(r"\d*");
        assert_eq!(Lexer::new("x").next_token(&[&maybe]).unwrap_err(),
                   Error::EmptyToken{pos: 0});
    }

    #[test]
    fn lexer_scan_reports_chosen_kind() {
        let (ident, kw, plus) = (re("[a-z]+"), lit("if"), lit("+"));
        let mut lexer = Lexer::new("if iffy");
        // both patterns accept "if" but only the keyword is reported
        assert_eq!(lexer.scan(&[&ident, &plus, &kw]).unwrap(),
                   Some(Scan{token: Token::new(kw.clone(), "if", 0, 2), matches: Some(vec![2])}));
        assert_eq!(lexer.scan(&[&kw, &ident]).unwrap(),
                   Some(Scan{token: Token::new(ident.clone(), "iffy", 3, 7), matches: Some(vec![1])}));
        assert_eq!(lexer.scan(&[&kw]).unwrap(), None);
    }
}
