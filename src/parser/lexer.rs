// Token-level parsers shared by the command grammar

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res, value},
    sequence::{delimited, terminated},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Column-like name: letters, digits, `_`, `-`, `.`
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
        |s: &str| s.to_string(),
    )(input)
}

/// Double-quoted string with `\"` and `\\` escapes
pub fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        // escaped_transform fails on an empty body
        value(String::new(), tag_empty_string),
        delimited(
            char('"'),
            escaped_transform(
                is_not("\\\""),
                '\\',
                alt((value("\\", char('\\')), value("\"", char('"')))),
            ),
            char('"'),
        ),
    ))(input)
}

fn tag_empty_string(input: &str) -> IResult<&str, char> {
    terminated(char('"'), char('"'))(input)
}

/// Any run of non-whitespace characters
pub fn word(input: &str) -> IResult<&str, String> {
    map(take_while1(|c: char| !c.is_whitespace()), |s: &str| s.to_string())(input)
}

/// A label: quoted string or bare word
pub fn label(input: &str) -> IResult<&str, String> {
    alt((string_literal, word))(input)
}

pub fn unsigned(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}
