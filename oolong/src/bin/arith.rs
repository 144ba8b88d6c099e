use log::debug;
use oolong::template::{self, GrammarError};
use oolong::{parse_str, Grammar, Pattern, Token};

fn rule(g: &mut Grammar<Pattern, f64>, line: &str, reducer: fn(Vec<f64>) -> f64)
    -> Result<(), GrammarError>
{
    g.add(template::production(line)?.reducer(reducer));
    Ok(())
}

fn build_grammar() -> Result<Grammar<Pattern, f64>, GrammarError> {
    let mut g = Grammar::new("expr")
        .with_leaf(|token: &Token<Pattern>| token.text.parse().unwrap_or(f64::NAN));
    // pass-through layers keep the default reducer (first child)
    template::add_rules(&mut g, "
        expr   -> term
        term   -> factor
        factor -> power
        power  -> ufact
        ufact  -> group
        group  -> /\\d+(\\.\\d*)?|\\.\\d+/
    ")?;
    rule(&mut g, "expr   -> expr '+' term", |n| n[0] + n[2])?;
    rule(&mut g, "expr   -> expr '-' term", |n| n[0] - n[2])?;
    rule(&mut g, "term   -> term '*' factor", |n| n[0] * n[2])?;
    rule(&mut g, "term   -> term '/' factor", |n| n[0] / n[2])?;
    rule(&mut g, "term   -> term '%' factor", |n| n[0] % n[2])?;
    rule(&mut g, "factor -> '-' factor", |n| -n[1])?;
    rule(&mut g, "power  -> ufact '^' factor", |n| n[0].powf(n[2]))?;
    rule(&mut g, "ufact  -> ufact '!'", |n| factorial(n[0]))?;
    rule(&mut g, "group  -> '(' expr ')'", |n| n[1])?;
    Ok(g)
}

fn factorial(x: f64) -> f64 {
    if x < 0.0 || x.fract() != 0.0 {
        return f64::NAN;
    }
    (1..=x as u64).map(|k| k as f64).product()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let grammar = build_grammar()?;
    debug!("{:?}", grammar);

    let eval = |expr: &str| match parse_str(&grammar, expr) {
        Err(e) => println!("Parse err: {}", e),
        Ok(forest) => match forest.roots().first() {
            None => println!("Parse err: incomplete expression"),
            Some(root) => match forest.accept(*root) {
                Some(value) => println!("{}", value),
                None => println!("Eval err: no reading"),
            },
        },
    };

    if std::env::args().len() > 1 {
        eval(&std::env::args().skip(1).collect::<Vec<String>>().join(" "));
        return Ok(());
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    while let Ok(expr) = rl.readline("~> ") {
        rl.add_history_entry(expr.as_str())?;
        eval(&expr);
    }
    Ok(())
}
