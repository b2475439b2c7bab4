//! Template lexer.
//!
//! Splits template source into literal text and `{{ ... }}` actions, and
//! tokenizes the inside of each action. Trim markers (`{{- ` and ` -}}`)
//! are applied to the neighbouring text here, and comments
//! (`{{/* ... */}}`) are dropped, so the parser never sees either.

/// A token inside an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `.` or `.a.b`.
    Field { path: Vec<String> },
    /// `$`, `$x` or `$x.a.b`. `name` keeps the leading `$`.
    Var { name: String, path: Vec<String> },
    Str(String),
    Int(i64),
    Bool(bool),
    /// Function name.
    Ident(String),
    Pipe,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    Comma,
    LParen,
    RParen,
    If,
    Else,
    End,
    Range,
    With,
}

/// A piece of template source.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text(String),
    Action { line: usize, tokens: Vec<Token> },
}

/// Split template source into items.
pub fn lex(src: &str) -> Result<Vec<Item>, String> {
    let mut items = Vec::new();
    let mut rest = src;
    let mut line = 1;
    let mut trim_next = false;

    loop {
        let Some(open) = rest.find("{{") else {
            push_text(&mut items, rest, trim_next, false);
            break;
        };

        line += rest[..open].matches('\n').count();
        let mut after = &rest[open + 2..];
        let trim_left = after.starts_with('-')
            && after[1..].starts_with(|c: char| c.is_ascii_whitespace());
        if trim_left {
            after = &after[1..];
        }
        push_text(&mut items, &rest[..open], trim_next, trim_left);

        let action_line = line;
        let body = after.trim_start();
        let (consumed, trim_right) = if body.starts_with("/*") {
            let skipped = after.len() - body.len();
            line += after[..skipped].matches('\n').count();
            let (used, trim) = lex_comment(body, &mut line)?;
            (skipped + used, trim)
        } else {
            let mut tokens = Vec::new();
            let (used, trim) = lex_action(after, &mut line, &mut tokens)
                .map_err(|e| format!("line {line}: {e}"))?;
            items.push(Item::Action {
                line: action_line,
                tokens,
            });
            (used, trim)
        };

        rest = &after[consumed..];
        trim_next = trim_right;
    }

    Ok(items)
}

fn push_text(items: &mut Vec<Item>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}

/// Skip a comment starting at `/*`. Returns bytes consumed through the
/// closing `}}` and whether a right trim marker was present.
fn lex_comment(body: &str, line: &mut usize) -> Result<(usize, bool), String> {
    let Some(close) = body.find("*/") else {
        return Err(format!("line {line}: unclosed comment"));
    };
    *line += body[..close].matches('\n').count();

    let tail = &body[close + 2..];
    let trimmed = tail.trim_start();
    let gap = tail.len() - trimmed.len();
    let (end, trim) = if trimmed.starts_with("-}}") && gap > 0 {
        (close + 2 + gap + 3, true)
    } else if tail.starts_with("}}") {
        (close + 2 + 2, false)
    } else {
        return Err(format!("line {line}: comment ends before closing delimiter"));
    };
    *line += tail[..gap].matches('\n').count();
    Ok((end, trim))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Read a `.a.b` chain starting at a `.`; returns the path and the byte
/// length consumed. An empty path means a lone `.`.
fn lex_path(s: &str) -> (Vec<String>, usize) {
    let mut path = Vec::new();
    let mut pos = 0;
    while s[pos..].starts_with('.') {
        let name_len = s[pos + 1..]
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(s.len() - pos - 1);
        if name_len == 0 {
            break;
        }
        path.push(s[pos + 1..pos + 1 + name_len].to_string());
        pos += 1 + name_len;
    }
    if path.is_empty() && s.starts_with('.') {
        pos = 1;
    }
    (path, pos)
}

/// Read an interpreted string starting after the opening quote.
fn lex_string(s: &str) -> Result<(String, usize), String> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, i + 1)),
            '\n' => break,
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, '"')) => out.push('"'),
                Some((_, other)) => return Err(format!("unknown escape sequence: \\{other}")),
                None => break,
            },
            _ => out.push(c),
        }
    }
    Err("unterminated quoted string".to_string())
}

/// Tokenize one action body up to and including its closing `}}`.
/// Returns bytes consumed and whether the action ended with ` -}}`.
fn lex_action(src: &str, line: &mut usize, tokens: &mut Vec<Token>) -> Result<(usize, bool), String> {
    let mut pos = 0;
    let mut after_space = true;

    loop {
        let rest = &src[pos..];
        let Some(c) = rest.chars().next() else {
            return Err("unclosed action".to_string());
        };

        if c.is_whitespace() {
            if c == '\n' {
                *line += 1;
            }
            pos += c.len_utf8();
            after_space = true;
            continue;
        }

        if rest.starts_with("}}") {
            return Ok((pos + 2, false));
        }
        if rest.starts_with("-}}") && after_space {
            return Ok((pos + 3, true));
        }
        after_space = false;

        let used = match c {
            '|' => {
                tokens.push(Token::Pipe);
                1
            }
            ':' if rest.starts_with(":=") => {
                tokens.push(Token::Declare);
                2
            }
            '=' => {
                tokens.push(Token::Assign);
                1
            }
            ',' => {
                tokens.push(Token::Comma);
                1
            }
            '(' => {
                tokens.push(Token::LParen);
                1
            }
            ')' => {
                tokens.push(Token::RParen);
                1
            }
            '"' => {
                let (s, used) = lex_string(&rest[1..])?;
                tokens.push(Token::Str(s));
                1 + used
            }
            '`' => {
                let Some(close) = rest[1..].find('`') else {
                    return Err("unterminated raw quoted string".to_string());
                };
                let raw = &rest[1..1 + close];
                *line += raw.matches('\n').count();
                tokens.push(Token::Str(raw.to_string()));
                close + 2
            }
            '.' => {
                let (path, used) = lex_path(rest);
                tokens.push(Token::Field { path });
                used
            }
            '$' => {
                let name_len = 1 + rest[1..]
                    .find(|c: char| !is_ident_char(c))
                    .unwrap_or(rest.len() - 1);
                let (path, used) = lex_path(&rest[name_len..]);
                // A lone `.` after a variable is not a field access
                let used = if path.is_empty() { 0 } else { used };
                tokens.push(Token::Var {
                    name: rest[..name_len].to_string(),
                    path,
                });
                name_len + used
            }
            '-' | '0'..='9' => {
                let digits = rest[1..]
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(rest.len() - 1);
                let text = &rest[..1 + digits];
                let n: i64 = text
                    .parse()
                    .map_err(|_| format!("bad number syntax: {text:?}"))?;
                tokens.push(Token::Int(n));
                1 + digits
            }
            c if c.is_alphabetic() || c == '_' => {
                let len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
                let word = &rest[..len];
                tokens.push(match word {
                    "if" => Token::If,
                    "else" => Token::Else,
                    "end" => Token::End,
                    "range" => Token::Range,
                    "with" => Token::With,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Ident(word.to_string()),
                });
                len
            }
            other => return Err(format!("unexpected {other:?} in action")),
        };
        pos += used;
    }
}
