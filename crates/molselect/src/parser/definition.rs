//! Grammar description reader using nom
//!
//! Reads the assembled grammar text:
//! ```text
//! statement   := '%ignore' NAME | ['?'] name ':' expansions
//! expansions  := alternative ('|' alternative)*
//! alternative := item* ['->' name]
//! item        := atom ['+' | '*' | '?']
//! atom        := '(' expansions ')' | '[' expansions ']' | string ['i'] | regex ['i'] | name
//! ```
//! Lines starting with `|` continue the previous statement. Names holding a
//! lowercase letter are rules, all-uppercase names are terminals.

use crate::error::GrammarError;
use crate::grammar::{strip_comments, unescape_string};
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while, take_while1},
    character::complete::{anychar, char, multispace0, multispace1, one_of},
    combinator::{map, opt, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// A terminal pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    String { text: String, insensitive: bool },
    Regex { pattern: String, insensitive: bool },
}

impl Literal {
    pub fn is_string(&self) -> bool {
        matches!(self, Literal::String { .. })
    }
}

/// One element of an alternative
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Name(String),
    Literal(Literal),
    Group(Vec<Alternative>),
    Optional(Vec<Alternative>),
    Repeat { inner: Box<Item>, at_least_one: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alternative {
    pub items: Vec<Item>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDef {
    pub name: String,
    /// `?rule`: replaced by its only child when it has exactly one
    pub inline: bool,
    pub alternatives: Vec<Alternative>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalDef {
    pub name: String,
    pub patterns: Vec<Literal>,
    pub line: usize,
}

/// Rules, terminals and ignored terminals, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarDefinition {
    pub rules: Vec<RuleDef>,
    pub terminals: Vec<TerminalDef>,
    pub ignore: Vec<String>,
}

enum Statement {
    Ignore(String),
    Definition {
        inline: bool,
        name: String,
        alternatives: Vec<Alternative>,
    },
}

/// Names holding a lowercase letter are rules
pub fn is_rule_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_lowercase())
}

/// Read a grammar description
pub fn read_grammar(text: &str) -> Result<GrammarDefinition, GrammarError> {
    let mut statements: Vec<(usize, String)> = Vec::new();
    for (i, line) in strip_comments(text).lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('|') {
            let (_, current) = statements.last_mut().ok_or_else(|| GrammarError::Syntax {
                line: i + 1,
                message: "alternative outside of a rule".to_string(),
            })?;
            current.push(' ');
            current.push_str(trimmed);
        } else {
            statements.push((i + 1, trimmed.to_string()));
        }
    }

    let mut definition = GrammarDefinition::default();
    for (line, source) in statements {
        let syntax = |message: String| GrammarError::Syntax { line, message };
        let statement = match statement(&source) {
            Ok((rest, statement)) if rest.trim().is_empty() => statement,
            Ok((rest, _)) => return Err(syntax(format!("unexpected text: '{}'", rest.trim()))),
            Err(e) => return Err(syntax(format!("cannot read '{}': {:?}", source, e))),
        };

        match statement {
            Statement::Ignore(name) => definition.ignore.push(name),
            Statement::Definition {
                inline,
                name,
                alternatives,
            } if is_rule_name(&name) => {
                if definition.rules.iter().any(|r| r.name == name) {
                    return Err(GrammarError::DuplicateRule(name));
                }
                definition.rules.push(RuleDef {
                    name,
                    inline,
                    alternatives,
                    line,
                });
            }
            Statement::Definition {
                inline,
                name,
                alternatives,
            } => {
                if inline {
                    return Err(syntax(format!("terminal {name} cannot be inlined")));
                }
                if definition.terminals.iter().any(|t| t.name == name) {
                    return Err(GrammarError::DuplicateTerminal(name));
                }
                let patterns = alternatives
                    .into_iter()
                    .map(|alt| match (alt.items.as_slice(), alt.alias) {
                        ([Item::Literal(literal)], None) => Ok(literal.clone()),
                        _ => Err(syntax(format!(
                            "terminal {name} must be an alternation of literals"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if patterns.is_empty() {
                    return Err(syntax(format!("terminal {name} has no pattern")));
                }
                definition.terminals.push(TerminalDef {
                    name,
                    patterns,
                    line,
                });
            }
        }
    }

    Ok(definition)
}

/// Parse whitespace
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn statement(input: &str) -> IResult<&str, Statement> {
    alt((
        map(
            preceded(pair(tag("%ignore"), multispace1), identifier),
            |name| Statement::Ignore(name.to_string()),
        ),
        definition,
    ))(input)
}

fn definition(input: &str) -> IResult<&str, Statement> {
    let (input, (inline, name, _)) =
        tuple((opt(char('?')), identifier, ws(char(':'))))(input)?;

    // An empty body declares a rule without productions
    let (input, alternatives) = if input.trim().is_empty() {
        (input, Vec::new())
    } else {
        expansions(input)?
    };

    Ok((
        input,
        Statement::Definition {
            inline: inline.is_some(),
            name: name.to_string(),
            alternatives,
        },
    ))
}

fn expansions(input: &str) -> IResult<&str, Vec<Alternative>> {
    separated_list0(ws(char('|')), alternative)(input)
}

fn alternative(input: &str) -> IResult<&str, Alternative> {
    let (input, items) = many0(ws(item))(input)?;
    let (input, alias) = opt(preceded(ws(tag("->")), identifier))(input)?;
    Ok((
        input,
        Alternative {
            items,
            alias: alias.map(str::to_string),
        },
    ))
}

fn item(input: &str) -> IResult<&str, Item> {
    let (input, atom) = atom(input)?;
    let (input, op) = opt(one_of("+*?"))(input)?;
    let item = match op {
        Some('+') => Item::Repeat {
            inner: Box::new(atom),
            at_least_one: true,
        },
        Some('*') => Item::Repeat {
            inner: Box::new(atom),
            at_least_one: false,
        },
        Some(_) => Item::Optional(vec![Alternative {
            items: vec![atom],
            alias: None,
        }]),
        None => atom,
    };
    Ok((input, item))
}

fn atom(input: &str) -> IResult<&str, Item> {
    alt((
        map(
            delimited(char('('), ws(expansions), char(')')),
            Item::Group,
        ),
        map(
            delimited(char('['), ws(expansions), char(']')),
            Item::Optional,
        ),
        map(literal, Item::Literal),
        map(identifier, |name| Item::Name(name.to_string())),
    ))(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(pair(string_body, opt(char('i'))), |(raw, flag)| {
            Literal::String {
                text: unescape_string(raw),
                insensitive: flag.is_some(),
            }
        }),
        map(pair(regex_body, opt(char('i'))), |(raw, flag)| {
            Literal::Regex {
                pattern: raw.replace(r"\/", "/"),
                insensitive: flag.is_some(),
            }
        }),
    ))(input)
}

/// Raw contents of a `"..."` literal
fn string_body(input: &str) -> IResult<&str, &str> {
    delimited(
        char('"'),
        recognize(many0(alt((
            recognize(pair(char('\\'), anychar)),
            is_not("\"\\"),
        )))),
        char('"'),
    )(input)
}

/// Raw contents of a non-empty `/.../` literal
fn regex_body(input: &str) -> IResult<&str, &str> {
    delimited(
        char('/'),
        recognize(pair(
            alt((recognize(pair(char('\\'), anychar)), is_not("/\\"))),
            many0(alt((recognize(pair(char('\\'), anychar)), is_not("/\\")))),
        )),
        char('/'),
    )(input)
}

/// Parse an identifier (starts with letter or underscore, followed by alphanumeric or underscore)
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}
