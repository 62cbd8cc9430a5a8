//! Literal grammar accepted by `setVariable` and `evaluate`.
//!
//! Atoms are `None`, booleans, integers, floats and quoted strings. Lists,
//! tuples and dicts are accepted one level deep: their items must be atoms.
use mpdbg_runtime::Value;
use nom::Parser;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{char, digit0, digit1, multispace0, none_of, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value, verify},
    multi::separated_list0,
    sequence::{delimited, preceded, separated_pair},
};

use crate::error::MutationError;

pub fn parse_literal(text: &str) -> Result<Value, MutationError> {
    all_consuming(delimited(multispace0, literal, multispace0))
        .parse(text)
        .map(|(_, value)| value)
        .map_err(|_| MutationError::InvalidLiteral(text.to_string()))
}

fn literal(input: &str) -> IResult<&str, Value> {
    alt((list, tuple, dict, atom)).parse(input)
}

fn atom(input: &str) -> IResult<&str, Value> {
    alt((keyword, number, string)).parse(input)
}

fn keyword(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::None, alt((tag("None"), tag("null")))),
        value(Value::Bool(true), alt((tag("True"), tag("true")))),
        value(Value::Bool(false), alt((tag("False"), tag("false")))),
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize((
            opt(one_of("+-")),
            digit1,
            opt((char('.'), digit0)),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        |text: &str| {
            if text.contains(['.', 'e', 'E']) {
                text.parse::<f64>().map(Value::Float).map_err(|_| ())
            } else {
                text.parse::<i64>().map(Value::Int).map_err(|_| ())
            }
        },
    )
    .parse(input)
}

fn string(input: &str) -> IResult<&str, Value> {
    map(
        alt((
            value(String::new(), tag("\"\"")),
            value(String::new(), tag("''")),
            quoted('"'),
            quoted('\''),
        )),
        Value::Str,
    )
    .parse(input)
}

fn quoted<'a>(quote: char) -> impl Parser<&'a str, Output = String, Error = nom::error::Error<&'a str>> {
    let body = match quote {
        '"' => "\"\\",
        _ => "'\\",
    };
    delimited(
        char(quote),
        escaped_transform(
            none_of(body),
            '\\',
            alt((
                value('\\', char('\\')),
                value('"', char('"')),
                value('\'', char('\'')),
                value('\n', char('n')),
                value('\r', char('r')),
                value('\t', char('t')),
            )),
        ),
        char(quote),
    )
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0).parse(input)
}

/// Items of a bracketed literal, allowing a trailing comma after the last item.
/// The flag reports whether one was present.
fn items<'a, O, F>(item: F) -> impl Parser<&'a str, Output = (Vec<O>, bool), Error = nom::error::Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(
        multispace0,
        verify(
            (
                separated_list0(comma, item),
                map(opt(comma), |trailing| trailing.is_some()),
            ),
            |(items, trailing): &(Vec<O>, bool)| !*trailing || !items.is_empty(),
        ),
        multispace0,
    )
}

fn list(input: &str) -> IResult<&str, Value> {
    map(delimited(char('['), items(atom), char(']')), |(items, _)| {
        Value::list(items)
    })
    .parse(input)
}

fn tuple(input: &str) -> IResult<&str, Value> {
    map(
        delimited(char('('), items(atom), char(')')),
        |(mut items, trailing)| {
            // `(1)` is a parenthesized atom, `(1,)` a one-item tuple
            if items.len() == 1 && !trailing {
                items.remove(0)
            } else {
                Value::tuple(items)
            }
        },
    )
    .parse(input)
}

fn dict(input: &str) -> IResult<&str, Value> {
    map(
        delimited(
            char('{'),
            items(separated_pair(
                atom,
                preceded(multispace0, char(':')),
                preceded(multispace0, atom),
            )),
            char('}'),
        ),
        |(entries, _)| Value::dict(entries),
    )
    .parse(input)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("42", Value::Int(42))]
    #[case("-7", Value::Int(-7))]
    #[case("+3", Value::Int(3))]
    #[case("2.5", Value::Float(2.5))]
    #[case("1e3", Value::Float(1000.0))]
    #[case("10.", Value::Float(10.0))]
    #[case("None", Value::None)]
    #[case("null", Value::None)]
    #[case("True", Value::Bool(true))]
    #[case("false", Value::Bool(false))]
    #[case("\"hello\"", Value::str("hello"))]
    #[case("'single'", Value::str("single"))]
    #[case("\"\"", Value::str(""))]
    #[case("\"a\\\"b\\n\"", Value::str("a\"b\n"))]
    #[case("'it\\'s'", Value::str("it's"))]
    #[case("  99  ", Value::Int(99))]
    fn test_parse_atoms(#[case] text: &str, #[case] expected: Value) {
        assert_eq!(parse_literal(text), Ok(expected));
    }

    #[rstest]
    #[case("[1, 2, 3]", "[1, 2, 3]")]
    #[case("[]", "[]")]
    #[case("[ 'a' , None, ]", "[\"a\", None]")]
    #[case("(1, 2)", "(1, 2)")]
    #[case("(1,)", "(1,)")]
    #[case("()", "()")]
    #[case("(5)", "5")]
    #[case("{\"a\": 1, 2: True}", "{\"a\": 1, 2: True}")]
    #[case("{}", "{}")]
    fn test_parse_containers(#[case] text: &str, #[case] repr: &str) {
        assert_eq!(parse_literal(text).unwrap().repr(), repr);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("x + 1")]
    #[case("Nonesuch")]
    #[case("[1, [2]]")]
    #[case("{\"a\": {}}")]
    #[case("\"unterminated")]
    #[case("99999999999999999999")]
    #[case("__import__('os')")]
    #[case("[,]")]
    #[case("(,)")]
    #[case("{,}")]
    #[case("[ , ]")]
    fn test_rejects_outside_grammar(#[case] text: &str) {
        assert_eq!(
            parse_literal(text),
            Err(MutationError::InvalidLiteral(text.to_string()))
        );
    }
}
