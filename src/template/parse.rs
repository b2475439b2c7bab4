//! Template parser: lexed items to a node tree.
//!
//! Grammar, in the style of Go's `text/template`:
//!
//! ```text
//! list     := (text | action | if | with | range)*
//! if       := {{ if pipeline }} list ({{ else if pipeline }} list)* ({{ else }} list)? {{ end }}
//! with     := {{ with pipeline }} list ({{ else }} list)? {{ end }}
//! range    := {{ range (var (',' var)? ':=')? pipeline }} list ({{ else }} list)? {{ end }}
//! action   := {{ (var (':=' | '='))? pipeline }}
//! pipeline := command ('|' command)*
//! command  := operand+            (first operand a function when more follow)
//! operand  := field | var | string | int | bool | function | '(' pipeline ')'
//! ```
//!
//! `if` and `with` take the same optional declaration as an action.

use super::funcs;
use super::lexer::{Item, Token};

/// A parsed template node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    /// `{{ pipeline }}`: print the value.
    Action(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    With {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Commands joined by `|`; each command's value is passed as the final
/// argument of the next.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub line: usize,
    /// Variables set from the pipeline's value; two only in `range`.
    pub decl: Vec<String>,
    /// `=` instead of `:=`: the variable already exists.
    pub assign: bool,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Field { path: Vec<String> },
    Var { name: String, path: Vec<String> },
    Str(String),
    Int(i64),
    Bool(bool),
    Func(String),
    Sub(Pipeline),
}

/// How a node list ended.
enum Terminator {
    Eof,
    End,
    Else { line: usize, tokens: Vec<Token> },
}

struct Parser {
    items: std::vec::IntoIter<Item>,
}

/// Parse lexed items into a node tree.
pub fn parse(items: Vec<Item>) -> Result<Vec<Node>, String> {
    let mut parser = Parser {
        items: items.into_iter(),
    };
    match parser.parse_list()? {
        (nodes, Terminator::Eof) => Ok(nodes),
        (_, Terminator::End) => Err("unexpected {{end}}".to_string()),
        (_, Terminator::Else { line, .. }) => Err(format!("line {line}: unexpected {{{{else}}}}")),
    }
}

impl Parser {
    fn parse_list(&mut self) -> Result<(Vec<Node>, Terminator), String> {
        let mut nodes = Vec::new();

        while let Some(item) = self.items.next() {
            let (line, tokens) = match item {
                Item::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action { line, tokens } => (line, tokens),
            };

            let Some(first) = tokens.first() else {
                return Err(format!("line {line}: missing value for command"));
            };

            match first {
                Token::End => {
                    if tokens.len() > 1 {
                        return Err(format!("line {line}: unexpected tokens after end"));
                    }
                    return Ok((nodes, Terminator::End));
                }
                Token::Else => {
                    let tokens = tokens[1..].to_vec();
                    return Ok((nodes, Terminator::Else { line, tokens }));
                }
                Token::If => nodes.push(self.parse_if(line, &tokens[1..])?),
                Token::With => {
                    let pipeline = parse_pipeline(line, &tokens[1..], 1)?;
                    let (body, otherwise) = self.parse_body("with", line)?;
                    nodes.push(Node::With {
                        pipeline,
                        body,
                        otherwise,
                    });
                }
                Token::Range => {
                    let pipeline = parse_pipeline(line, &tokens[1..], 2)?;
                    if pipeline.assign {
                        return Err(format!("line {line}: range can only declare variables with :="));
                    }
                    let (body, otherwise) = self.parse_body("range", line)?;
                    nodes.push(Node::Range {
                        pipeline,
                        body,
                        otherwise,
                    });
                }
                _ => nodes.push(Node::Action(parse_pipeline(line, &tokens, 1)?)),
            }
        }

        Ok((nodes, Terminator::Eof))
    }

    /// Body of `with` or `range`: list, optional plain `else` list, `end`.
    fn parse_body(&mut self, keyword: &str, line: usize) -> Result<(Vec<Node>, Vec<Node>), String> {
        let (body, term) = self.parse_list()?;
        match term {
            Terminator::End => Ok((body, Vec::new())),
            Terminator::Eof => Err(format!("line {line}: unexpected EOF in {keyword}")),
            Terminator::Else { line, tokens } => {
                if !tokens.is_empty() {
                    return Err(format!("line {line}: unexpected tokens after else in {keyword}"));
                }
                let (otherwise, term) = self.parse_list()?;
                match term {
                    Terminator::End => Ok((body, otherwise)),
                    Terminator::Eof => Err(format!("line {line}: unexpected EOF in {keyword}")),
                    Terminator::Else { line, .. } => {
                        Err(format!("line {line}: expected end; found else"))
                    }
                }
            }
        }
    }

    fn parse_if(&mut self, line: usize, cond: &[Token]) -> Result<Node, String> {
        let cond = parse_pipeline(line, cond, 1)?;
        let (body, mut term) = self.parse_list()?;
        let mut branches = vec![(cond, body)];
        let mut otherwise = Vec::new();

        loop {
            match term {
                Terminator::End => break,
                Terminator::Eof => return Err(format!("line {line}: unexpected EOF in if")),
                Terminator::Else { line, tokens } => match tokens.first() {
                    Some(Token::If) => {
                        let cond = parse_pipeline(line, &tokens[1..], 1)?;
                        let (body, next) = self.parse_list()?;
                        branches.push((cond, body));
                        term = next;
                    }
                    None => {
                        let (body, next) = self.parse_list()?;
                        otherwise = body;
                        match next {
                            Terminator::End => break,
                            Terminator::Eof => {
                                return Err(format!("line {line}: unexpected EOF in if"));
                            }
                            Terminator::Else { line, .. } => {
                                return Err(format!("line {line}: expected end; found else"));
                            }
                        }
                    }
                    Some(_) => {
                        return Err(format!("line {line}: unexpected tokens after else"));
                    }
                },
            }
        }

        Ok(Node::If {
            branches,
            otherwise,
        })
    }
}

/// Split a leading `$x :=`, `$x =` or `$k, $v :=` off an action.
/// Returns the variable names, whether it was an assignment, and the
/// remaining tokens.
fn declaration(line: usize, tokens: &[Token]) -> Result<(Vec<String>, bool, &[Token]), String> {
    let (names, op, rest) = match tokens {
        [
            Token::Var { name, path },
            op @ (Token::Declare | Token::Assign),
            rest @ ..,
        ] if path.is_empty() => (vec![name.clone()], op, rest),
        [
            Token::Var { name: first, path: p1 },
            Token::Comma,
            Token::Var { name: second, path: p2 },
            op @ (Token::Declare | Token::Assign),
            rest @ ..,
        ] if p1.is_empty() && p2.is_empty() => (vec![first.clone(), second.clone()], op, rest),
        _ => return Ok((Vec::new(), false, tokens)),
    };
    if names.iter().any(|n| n == "$") {
        return Err(format!("line {line}: cannot declare $"));
    }
    Ok((names, matches!(op, Token::Assign), rest))
}

/// Parse a pipeline from the tokens of one action, allowing up to
/// `max_decl` declared variables in front of it.
fn parse_pipeline(line: usize, tokens: &[Token], max_decl: usize) -> Result<Pipeline, String> {
    let (decl, assign, tokens) = declaration(line, tokens)?;
    if decl.len() > max_decl || (assign && decl.len() > 1) {
        return Err(format!("line {line}: too many declarations in command"));
    }

    let mut commands = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("line {line}: unexpected right paren"))?;
            }
            Token::Pipe if depth == 0 => {
                commands.push(parse_command(line, &tokens[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(format!("line {line}: unclosed left paren"));
    }
    commands.push(parse_command(line, &tokens[start..])?);

    for cmd in &commands[1..] {
        if !matches!(cmd.args.first(), Some(Arg::Func(_))) {
            return Err(format!("line {line}: cannot pipe into a non-function"));
        }
    }

    Ok(Pipeline {
        line,
        decl,
        assign,
        commands,
    })
}

fn parse_command(line: usize, tokens: &[Token]) -> Result<Command, String> {
    if tokens.is_empty() {
        return Err(format!("line {line}: missing value for command"));
    }

    let mut args = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let arg = match &tokens[i] {
            Token::Field { path } => Arg::Field { path: path.clone() },
            Token::Var { name, path } => Arg::Var {
                name: name.clone(),
                path: path.clone(),
            },
            Token::Str(s) => Arg::Str(s.clone()),
            Token::Int(n) => Arg::Int(*n),
            Token::Bool(b) => Arg::Bool(*b),
            Token::Ident(name) => {
                if funcs::lookup(name).is_none() {
                    return Err(format!("line {line}: function {name:?} not defined"));
                }
                Arg::Func(name.clone())
            }
            Token::LParen => {
                let close = matching_paren(&tokens[i..])
                    .ok_or_else(|| format!("line {line}: unclosed left paren"))?;
                let inner = parse_pipeline(line, &tokens[i + 1..i + close], 0)?;
                i += close;
                Arg::Sub(inner)
            }
            Token::RParen => return Err(format!("line {line}: unexpected right paren")),
            other => return Err(format!("line {line}: unexpected {other:?} in command")),
        };
        args.push(arg);
        i += 1;
    }

    if args.len() > 1 && !matches!(args[0], Arg::Func(_)) {
        return Err(format!("line {line}: can't give argument to non-function"));
    }

    Ok(Command { args })
}

/// Index of the `)` matching the `(` at `tokens[0]`.
fn matching_paren(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::lexer::lex;

    fn parse_src(src: &str) -> Result<Vec<Node>, String> {
        parse(lex(src)?)
    }

    #[test]
    fn test_parse_text_and_field() {
        let nodes = parse_src("x {{ .a }}\n").unwrap();
        assert_eq!(nodes.len(), 3);
        match &nodes[1] {
            Node::Action(p) => {
                assert_eq!(p.commands.len(), 1);
                assert_eq!(
                    p.commands[0].args,
                    vec![Arg::Field { path: vec!["a".to_string()] }]
                );
            }
            other => panic!("Expected Action, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_pipeline_commands() {
        let nodes = parse_src(r#"{{ .a | replace "x" "y" }}"#).unwrap();
        match &nodes[0] {
            Node::Action(p) => {
                assert_eq!(p.commands.len(), 2);
                assert_eq!(p.commands[1].args[0], Arg::Func("replace".to_string()));
            }
            other => panic!("Expected Action, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_subexpression() {
        let nodes = parse_src(r#"{{ eq (len .a) 3 }}"#).unwrap();
        match &nodes[0] {
            Node::Action(p) => {
                assert!(matches!(p.commands[0].args[1], Arg::Sub(_)));
                assert_eq!(p.commands[0].args[2], Arg::Int(3));
            }
            other => panic!("Expected Action, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_if_else_chain() {
        let nodes = parse_src("{{ if .a }}A{{ else if .b }}B{{ else }}C{{ end }}").unwrap();
        match &nodes[0] {
            Node::If { branches, otherwise } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(otherwise, &vec![Node::Text("C".to_string())]);
            }
            other => panic!("Expected If, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_range_with_else() {
        let nodes = parse_src("{{ range . }}x{{ else }}none{{ end }}").unwrap();
        assert!(matches!(&nodes[0], Node::Range { otherwise, .. } if otherwise.len() == 1));
    }

    #[test]
    fn test_parse_nested_blocks() {
        let nodes = parse_src("{{ with .a }}{{ if . }}y{{ end }}{{ end }}").unwrap();
        match &nodes[0] {
            Node::With { body, .. } => assert!(matches!(body[0], Node::If { .. })),
            other => panic!("Expected With, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_function() {
        let err = parse_src("{{ upper .a }}").unwrap_err();
        assert!(err.contains("function \"upper\" not defined"), "{err}");
    }

    #[test]
    fn test_missing_end() {
        let err = parse_src("{{ if .a }}x").unwrap_err();
        assert!(err.contains("unexpected EOF"), "{err}");
    }

    #[test]
    fn test_stray_end_and_else() {
        assert!(parse_src("x{{ end }}").is_err());
        assert!(parse_src("x{{ else }}").is_err());
    }

    #[test]
    fn test_empty_action() {
        let err = parse_src("{{ }}").unwrap_err();
        assert!(err.contains("missing value"), "{err}");
    }

    #[test]
    fn test_argument_to_non_function() {
        assert!(parse_src("{{ .a .b }}").is_err());
        assert!(parse_src("{{ .a | .b }}").is_err());
    }

    #[test]
    fn test_paren_balance() {
        assert!(parse_src("{{ (len .a }}").is_err());
        assert!(parse_src("{{ len .a) }}").is_err());
    }

    #[test]
    fn test_double_else_rejected() {
        let err = parse_src("{{ if .a }}1{{ else }}2{{ else }}3{{ end }}").unwrap_err();
        assert!(err.contains("expected end; found else"), "{err}");
    }

    #[test]
    fn test_parse_declaration() {
        let nodes = parse_src("{{ $n := .a }}{{ $n = .b }}").unwrap();
        match (&nodes[0], &nodes[1]) {
            (Node::Action(declare), Node::Action(assign)) => {
                assert_eq!(declare.decl, vec!["$n".to_string()]);
                assert!(!declare.assign);
                assert_eq!(assign.decl, vec!["$n".to_string()]);
                assert!(assign.assign);
                assert_eq!(declare.commands.len(), 1);
            }
            other => panic!("Expected two actions, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_range_two_variables() {
        let nodes = parse_src("{{ range $k, $v := . }}{{ $k }}{{ end }}").unwrap();
        match &nodes[0] {
            Node::Range { pipeline, body, .. } => {
                assert_eq!(pipeline.decl, vec!["$k".to_string(), "$v".to_string()]);
                assert!(matches!(&body[0], Node::Action(p) if p.decl.is_empty()));
            }
            other => panic!("Expected Range, got {other:?}"),
        }
    }

    #[test]
    fn test_declaration_limits() {
        let err = parse_src("{{ $a, $b := .x }}").unwrap_err();
        assert!(err.contains("too many declarations"), "{err}");
        assert!(parse_src("{{ len ($a := .x) }}").is_err());
        assert!(parse_src("{{ $ := .x }}").is_err());
        assert!(parse_src("{{ range $v = . }}{{ end }}").is_err());
    }
}
