// Grammar for interactive session commands

use super::lexer::{identifier, label, string_literal, unsigned, ws};
use anyhow::{anyhow, bail, Result};
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, rest, value, verify},
    sequence::{preceded, separated_pair, terminated, tuple},
    IResult,
};

/// One line of input in an interactive session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Click a bar or pie slice: `click <card> <label>`
    Click { card: usize, label: String },
    /// Toggle a category pill: `pill <card> <label>`
    Pill { card: usize, label: String },
    /// Toggle the "All" pill: `all <card>`
    All { card: usize },
    /// Remove one filter chip: `remove <column>`
    Remove { column: String },
    Clear,
    Filters,
    Cards,
    /// Send a question to the chat service: `ask <question>`
    Ask { question: String },
    /// `viz on` / `viz off`
    Viz(bool),
    Help,
    Quit,
}

/// Keyword followed by at least one space
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), multispace1)
}

fn card_and_label(input: &str) -> IResult<&str, (usize, String)> {
    separated_pair(unsigned, multispace1, label)(input)
}

fn parse_click(input: &str) -> IResult<&str, SessionCommand> {
    map(preceded(keyword("click"), card_and_label), |(card, label)| {
        SessionCommand::Click { card, label }
    })(input)
}

fn parse_pill(input: &str) -> IResult<&str, SessionCommand> {
    map(preceded(keyword("pill"), card_and_label), |(card, label)| {
        SessionCommand::Pill { card, label }
    })(input)
}

fn parse_all(input: &str) -> IResult<&str, SessionCommand> {
    map(preceded(keyword("all"), unsigned), |card| SessionCommand::All { card })(input)
}

fn parse_remove(input: &str) -> IResult<&str, SessionCommand> {
    map(preceded(keyword("remove"), label), |column| SessionCommand::Remove { column })(input)
}

fn parse_ask(input: &str) -> IResult<&str, SessionCommand> {
    map(
        preceded(
            keyword("ask"),
            verify(rest, |q: &str| !q.trim().is_empty()),
        ),
        |q: &str| SessionCommand::Ask {
            question: q.trim().to_string(),
        },
    )(input)
}

fn parse_viz(input: &str) -> IResult<&str, SessionCommand> {
    map(
        preceded(
            keyword("viz"),
            alt((value(true, tag_no_case("on")), value(false, tag_no_case("off")))),
        ),
        SessionCommand::Viz,
    )(input)
}

fn parse_bare(input: &str) -> IResult<&str, SessionCommand> {
    alt((
        value(SessionCommand::Clear, tag_no_case("clear")),
        value(SessionCommand::Filters, tag_no_case("filters")),
        value(SessionCommand::Cards, tag_no_case("cards")),
        value(SessionCommand::Help, alt((tag_no_case("help"), tag_no_case("?")))),
        value(SessionCommand::Quit, alt((tag_no_case("quit"), tag_no_case("exit")))),
    ))(input)
}

/// Parse a session command (without requiring end of input)
pub fn parse_command(input: &str) -> IResult<&str, SessionCommand> {
    ws(alt((
        parse_click,
        parse_pill,
        parse_all,
        parse_remove,
        parse_ask,
        parse_viz,
        parse_bare,
    )))(input)
}

/// Parse one full input line
pub fn parse_command_line(line: &str) -> Result<SessionCommand> {
    match all_consuming(parse_command)(line) {
        Ok((_, command)) => Ok(command),
        Err(_) => Err(anyhow!(
            "Unrecognized command '{}' (type 'help' for a list of commands)",
            line.trim()
        )),
    }
}

fn non_empty_literal(input: &str) -> IResult<&str, String> {
    verify(string_literal, |v: &String| !v.trim().is_empty())(input)
}

/// Quoted or bare value; neither form may be blank
fn filter_value(input: &str) -> IResult<&str, String> {
    alt((
        terminated(non_empty_literal, multispace0),
        map(
            verify(rest, |v: &str| !v.trim().is_empty() && !v.starts_with('"')),
            |v: &str| v.trim().to_string(),
        ),
    ))(input)
}

/// Parse a `column=value` filter argument. The value may be quoted.
pub fn parse_filter_arg(arg: &str) -> Result<(String, String)> {
    let parsed = all_consuming(tuple((
        ws(alt((non_empty_literal, identifier))),
        char('='),
        preceded(multispace0, filter_value),
    )))(arg);
    match parsed {
        Ok((_, (column, _, value))) => Ok((column, value)),
        Err(_) => bail!("Invalid filter '{}': expected column=value", arg),
    }
}
