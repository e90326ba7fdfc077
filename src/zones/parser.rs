// Line grammar of zone definitions
//
//   name = [(x1, y1), (x2, y2), ...]   polygon
//   name = (cx, cy, r)                 circle
//   name = a OP b                      OP is U, I, - or ^
//
// `#` starts a comment. Line numbers count from 1 after trimming the input.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::PawtrackError;

static ASSIGNMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*=\s*(.+)$").expect("valid assignment regex"));
static OPERATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*([UI\-\^])\s*(\w+)$").expect("valid operation regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersection,
    Difference,
    SymmetricDifference,
}

impl SetOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "U" => Some(SetOp::Union),
            "I" => Some(SetOp::Intersection),
            "-" => Some(SetOp::Difference),
            "^" => Some(SetOp::SymmetricDifference),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShapeExpr {
    Polygon(Vec<(f64, f64)>),
    Circle { center: (f64, f64), radius: f64 },
    Operation { left: String, op: SetOp, right: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub line: usize,
    pub name: String,
    pub shape: ShapeExpr,
}

/// Splits zone source text into statements without building any geometry.
pub fn parse_statements(source: &str) -> Result<Vec<Statement>, PawtrackError> {
    let mut statements = Vec::new();
    for (index, raw) in source.trim().lines().enumerate() {
        let line = index + 1;
        let text = raw.split('#').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }

        let Some(captures) = ASSIGNMENT_RE.captures(text) else {
            return Err(PawtrackError::ZoneSyntax {
                line,
                text: text.to_string(),
            });
        };
        let name = captures[1].to_string();
        let expr = captures[2].trim();

        let shape = if expr.starts_with('[') {
            let literal = parse_literal(expr).map_err(|reason| PawtrackError::ZoneCoordinates {
                name: name.clone(),
                line,
                reason,
            })?;
            ShapeExpr::Polygon(literal.as_points().map_err(|reason| {
                PawtrackError::ZoneCoordinates {
                    name: name.clone(),
                    line,
                    reason,
                }
            })?)
        } else if expr.starts_with('(') && expr.ends_with(')') {
            let circle_error = |reason: String| PawtrackError::InvalidCircle {
                name: name.clone(),
                line,
                reason,
            };
            let literal = parse_literal(expr).map_err(circle_error)?;
            match literal.as_numbers().as_deref() {
                Some([cx, cy, radius]) => ShapeExpr::Circle {
                    center: (*cx, *cy),
                    radius: *radius,
                },
                _ => return Err(circle_error("expected (cx, cy, radius)".to_string())),
            }
        } else {
            let operation = OPERATION_RE.captures(expr).and_then(|captures| {
                let op = SetOp::from_symbol(&captures[2])?;
                Some(ShapeExpr::Operation {
                    left: captures[1].to_string(),
                    op,
                    right: captures[3].to_string(),
                })
            });
            operation.ok_or_else(|| PawtrackError::ZoneExpression {
                name: name.clone(),
                line,
                expr: expr.to_string(),
            })?
        };

        statements.push(Statement { line, name, shape });
    }
    Ok(statements)
}

/// Numbers and nested `[...]`/`(...)` sequences.
#[derive(Clone, Debug, PartialEq)]
enum Literal {
    Number(f64),
    Sequence(Vec<Literal>),
}

impl Literal {
    fn as_numbers(&self) -> Option<Vec<f64>> {
        match self {
            Literal::Sequence(items) => items
                .iter()
                .map(|item| match item {
                    Literal::Number(value) => Some(*value),
                    Literal::Sequence(_) => None,
                })
                .collect(),
            Literal::Number(_) => None,
        }
    }

    fn as_points(&self) -> Result<Vec<(f64, f64)>, String> {
        let Literal::Sequence(items) = self else {
            return Err("expected a list of (x, y) pairs".to_string());
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item.as_numbers().as_deref() {
                Some([x, y]) => Ok((*x, *y)),
                _ => Err(format!("point {} is not an (x, y) pair", i + 1)),
            })
            .collect()
    }
}

fn parse_literal(text: &str) -> Result<Literal, String> {
    let mut parser = LiteralParser { text, pos: 0 };
    let literal = parser.value()?;
    parser.skip_whitespace();
    if parser.pos < text.len() {
        return Err(format!(
            "unexpected '{}' at column {}",
            &text[parser.pos..],
            parser.pos + 1
        ));
    }
    Ok(literal)
}

struct LiteralParser<'a> {
    text: &'a str,
    pos: usize,
}

impl LiteralParser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn value(&mut self) -> Result<Literal, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('[') => self.sequence(']'),
            Some('(') => self.sequence(')'),
            Some(_) => self.number(),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn sequence(&mut self, close: char) -> Result<Literal, String> {
        // opening bracket
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Literal::Sequence(items));
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                Some(c) => return Err(format!("expected ',' or '{close}', found '{c}'")),
                None => return Err(format!("missing closing '{close}'")),
            }
        }
    }

    fn number(&mut self) -> Result<Literal, String> {
        let start = self.pos;
        while let Some(c) = self
            .peek()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '.' | '+' | '-' | '_'))
        {
            self.pos += c.len_utf8();
        }
        let token = &self.text[start..self.pos];
        if token.is_empty() {
            let found = self.peek().unwrap_or(' ');
            return Err(format!("unexpected '{found}'"));
        }
        token
            .replace('_', "")
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Literal::Number)
            .ok_or_else(|| format!("'{token}' is not a number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_each_statement_kind() {
        let source = "
            # arena layout
            box = [(0,0), (10,0), (10,10), (0,10),]
            hole = (5, 5, 2.5)  # centre
            ring = box - hole
        ";
        let statements = parse_statements(source).unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0].name, "box");
        assert_eq!(statements[0].line, 2);
        assert_eq!(
            statements[0].shape,
            ShapeExpr::Polygon(vec![(0., 0.), (10., 0.), (10., 10.), (0., 10.)])
        );
        assert_eq!(
            statements[1].shape,
            ShapeExpr::Circle {
                center: (5., 5.),
                radius: 2.5
            }
        );
        assert_eq!(
            statements[2].shape,
            ShapeExpr::Operation {
                left: "box".to_string(),
                op: SetOp::Difference,
                right: "hole".to_string()
            }
        );
        assert_eq!(statements[2].line, 4);
    }

    #[test]
    fn test_operators_without_spaces() {
        for (source, op) in [
            ("c = aUb", SetOp::Union),
            ("c = a I b", SetOp::Intersection),
            ("c = a^b", SetOp::SymmetricDifference),
        ] {
            let statements = parse_statements(source).unwrap();
            let ShapeExpr::Operation { left, op: parsed, right } = &statements[0].shape else {
                panic!("expected an operation for {source}");
            };
            assert_eq!((left.as_str(), *parsed, right.as_str()), ("a", op, "b"));
        }
    }

    #[test]
    fn test_tuple_of_points_and_scientific_numbers() {
        let statements = parse_statements("z = [(-1.5e1, 2), (3, +4), (5., 0)]").unwrap();
        assert_eq!(
            statements[0].shape,
            ShapeExpr::Polygon(vec![(-15., 2.), (3., 4.), (5., 0.)])
        );
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        assert!(matches!(
            parse_statements("a = [(0,0),(1,0),(0,1)]\nnot a statement"),
            Err(PawtrackError::ZoneSyntax { line: 2, .. })
        ));
        assert!(matches!(
            parse_statements("a = [(0,0),(1,0),(0,1]"),
            Err(PawtrackError::ZoneCoordinates { line: 1, .. })
        ));
        assert!(matches!(
            parse_statements("a = [(0,0,1),(1,0),(0,1)]"),
            Err(PawtrackError::ZoneCoordinates { .. })
        ));
        assert!(matches!(
            parse_statements("\n\nc = (1, 2)"),
            Err(PawtrackError::InvalidCircle { line: 1, .. })
        ));
        assert!(matches!(
            parse_statements("c = (1, x, 2)"),
            Err(PawtrackError::InvalidCircle { .. })
        ));
        assert!(matches!(
            parse_statements("c = a + b"),
            Err(PawtrackError::ZoneExpression { .. })
        ));
    }

    #[test]
    fn test_literal_parser_rejects_trailing_text() {
        assert!(parse_literal("[1, 2] 3").is_err());
        assert!(parse_literal("[1 2]").is_err());
        assert_eq!(
            parse_literal("((1, 2))").unwrap(),
            Literal::Sequence(vec![Literal::Sequence(vec![
                Literal::Number(1.),
                Literal::Number(2.)
            ])])
        );
    }
}
