//! Functions callable from a template.
//!
//! `join` and `replace` are the helpers format strings are documented to
//! use. The rest follow the usual template builtins: comparisons (`eq`,
//! `ne`, `lt`, `le`, `gt`, `ge`), logic (`not`, `and`, `or`), `len`,
//! `index`, and the formatters `print`, `println` and `printf`.
//!
//! `and` and `or` are listed here so the parser accepts them, but the
//! executor evaluates them itself to stop at the deciding operand.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use super::value::Value;

/// A template function. Arguments arrive fully evaluated, with any piped
/// value appended last.
pub type Func = fn(Vec<Value>) -> Result<Value, String>;

/// Look up a function by name.
pub fn lookup(name: &str) -> Option<Func> {
    let f: Func = match name {
        "join" => join,
        "replace" => replace,
        "eq" => eq,
        "ne" => ne,
        "lt" => lt,
        "le" => le,
        "gt" => gt,
        "ge" => ge,
        "not" => not,
        "and" => and,
        "or" => or,
        "len" => len,
        "index" => index,
        "print" => print,
        "println" => println,
        "printf" => printf,
        _ => return None,
    };
    Some(f)
}

fn want_exactly(name: &str, args: &[Value], n: usize) -> Result<(), String> {
    if args.len() != n {
        return Err(format!(
            "wrong number of args for {name}: want {n} got {}",
            args.len()
        ));
    }
    Ok(())
}

fn want_at_least(name: &str, args: &[Value], n: usize) -> Result<(), String> {
    if args.len() < n {
        return Err(format!(
            "wrong number of args for {name}: want at least {n} got {}",
            args.len()
        ));
    }
    Ok(())
}

fn string_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str, String> {
    value.as_str().ok_or_else(|| {
        format!(
            "wrong type for value in {name}; expected string; got {}",
            value.type_name()
        )
    })
}

/// `join sep a b ...`: the arguments after the separator, joined by it.
/// A map argument contributes its values in key order.
fn join(args: Vec<Value>) -> Result<Value, String> {
    want_at_least("join", &args, 1)?;
    let sep = string_arg("join", &args[0])?;

    let mut parts = Vec::new();
    for arg in &args[1..] {
        match arg {
            Value::Map(m) => parts.extend(m.values().map(Value::to_string)),
            other => parts.push(other.to_string()),
        }
    }
    Ok(Value::Str(parts.join(sep)))
}

/// `replace old new subject`.
fn replace(args: Vec<Value>) -> Result<Value, String> {
    want_exactly("replace", &args, 3)?;
    let old = string_arg("replace", &args[0])?;
    let new = string_arg("replace", &args[1])?;
    let subject = string_arg("replace", &args[2])?;
    Ok(Value::Str(subject.replace(old, new)))
}

fn equal(a: &Value, b: &Value) -> Result<bool, String> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Map(_), _) | (_, Value::Map(_)) => {
            Err("non-comparable type map".to_string())
        }
        _ => Err(format!(
            "incompatible types for comparison: {} and {}",
            a.type_name(),
            b.type_name()
        )),
    }
}

/// `eq a b ...`: true when `a` equals any of the others.
fn eq(args: Vec<Value>) -> Result<Value, String> {
    want_at_least("eq", &args, 2)?;
    for other in &args[1..] {
        if equal(&args[0], other)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn ne(args: Vec<Value>) -> Result<Value, String> {
    want_exactly("ne", &args, 2)?;
    Ok(Value::Bool(!equal(&args[0], &args[1])?))
}

/// Order two ints or two strings; other pairs are not ordered.
fn compare(name: &str, args: &[Value]) -> Result<Ordering, String> {
    want_exactly(name, args, 2)?;
    match (&args[0], &args[1]) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (a @ (Value::Bool(_) | Value::Map(_)), _) | (_, a @ (Value::Bool(_) | Value::Map(_))) => {
            Err(format!("invalid type for comparison: {}", a.type_name()))
        }
        (a, b) => Err(format!(
            "incompatible types for comparison: {} and {}",
            a.type_name(),
            b.type_name()
        )),
    }
}

fn lt(args: Vec<Value>) -> Result<Value, String> {
    Ok(Value::Bool(compare("lt", &args)? == Ordering::Less))
}

fn le(args: Vec<Value>) -> Result<Value, String> {
    Ok(Value::Bool(compare("le", &args)? != Ordering::Greater))
}

fn gt(args: Vec<Value>) -> Result<Value, String> {
    Ok(Value::Bool(compare("gt", &args)? == Ordering::Greater))
}

fn ge(args: Vec<Value>) -> Result<Value, String> {
    Ok(Value::Bool(compare("ge", &args)? != Ordering::Less))
}

fn not(args: Vec<Value>) -> Result<Value, String> {
    want_exactly("not", &args, 1)?;
    Ok(Value::Bool(!args[0].truthy()))
}

/// First falsy argument, or the last one.
fn and(args: Vec<Value>) -> Result<Value, String> {
    want_at_least("and", &args, 1)?;
    let last = args.len() - 1;
    let pick = args.iter().position(|v| !v.truthy()).unwrap_or(last);
    Ok(args.into_iter().nth(pick).unwrap_or(Value::Bool(false)))
}

/// First truthy argument, or the last one.
fn or(args: Vec<Value>) -> Result<Value, String> {
    want_at_least("or", &args, 1)?;
    let last = args.len() - 1;
    let pick = args.iter().position(Value::truthy).unwrap_or(last);
    Ok(args.into_iter().nth(pick).unwrap_or(Value::Bool(false)))
}

fn len(args: Vec<Value>) -> Result<Value, String> {
    want_exactly("len", &args, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Map(m) => m.len(),
        other => return Err(format!("len of type {}", other.type_name())),
    };
    Ok(Value::Int(n as i64))
}

/// `index item k1 k2 ...`: map entries by key, or a string's byte at an
/// integer offset.
fn index(args: Vec<Value>) -> Result<Value, String> {
    let mut args = args.into_iter();
    let Some(mut current) = args.next() else {
        return Err("wrong number of args for index: want at least 1 got 0".to_string());
    };
    for key in args {
        current = match (current, &key) {
            (Value::Map(mut m), Value::Str(k)) => m
                .remove(k)
                .ok_or_else(|| format!("map has no entry for key {k:?}"))?,
            (Value::Str(s), Value::Int(i)) => {
                let byte = usize::try_from(*i).ok().and_then(|i| s.as_bytes().get(i).copied());
                Value::Int(byte.map(i64::from).ok_or_else(|| format!("index out of range: {i}"))?)
            }
            (Value::Map(_), other) => {
                return Err(format!("cannot index map with {}", other.type_name()));
            }
            (other, _) => return Err(format!("can't index item of type {}", other.type_name())),
        };
    }
    Ok(current)
}

/// Concatenate arguments, adding a space between two operands when
/// neither is a string.
fn print(args: Vec<Value>) -> Result<Value, String> {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            let prev_is_str = matches!(args[i - 1], Value::Str(_));
            if !prev_is_str && !matches!(arg, Value::Str(_)) {
                out.push(' ');
            }
        }
        out.push_str(&arg.to_string());
    }
    Ok(Value::Str(out))
}

/// Arguments separated by spaces, with a trailing newline.
fn println(args: Vec<Value>) -> Result<Value, String> {
    let parts: Vec<String> = args.iter().map(Value::to_string).collect();
    Ok(Value::Str(format!("{}\n", parts.join(" "))))
}

/// Flags, width and precision of one `printf` directive.
#[derive(Debug, Default)]
struct Directive {
    left: bool,
    zero: bool,
    plus: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = Some(n.unwrap_or(0).saturating_mul(10).saturating_add(d as usize));
        chars.next();
    }
    n
}

/// `printf format args...`. Supports the `%s %d %v %q %t %%` verbs with
/// the `-`, `0` and `+` flags, a width, and a precision for strings.
/// Mismatches are rendered inline (`%!d(string=x)`) rather than failing.
fn printf(args: Vec<Value>) -> Result<Value, String> {
    want_at_least("printf", &args, 1)?;
    let format = string_arg("printf", &args[0])?;
    let mut operands = args[1..].iter();
    let mut out = String::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut directive = Directive::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => directive.left = true,
                '0' => directive.zero = true,
                '+' => directive.plus = true,
                _ => break,
            }
            chars.next();
        }
        directive.width = read_number(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            directive.precision = Some(read_number(&mut chars).unwrap_or(0));
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        match operands.next() {
            Some(arg) => out.push_str(&format_directive(verb, &directive, arg)),
            None => out.push_str(&format!("%!{verb}(MISSING)")),
        }
    }

    let extra: Vec<String> = operands
        .map(|v| format!("{}={v}", v.type_name()))
        .collect();
    if !extra.is_empty() {
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    Ok(Value::Str(out))
}

fn format_directive(verb: char, directive: &Directive, arg: &Value) -> String {
    let body = match (verb, arg) {
        ('s' | 'v', Value::Str(s)) => match directive.precision {
            Some(p) => s.chars().take(p).collect(),
            None => s.clone(),
        },
        ('v', other) => other.to_string(),
        ('d', Value::Int(n)) if directive.plus && *n >= 0 => format!("+{n}"),
        ('d', Value::Int(n)) => n.to_string(),
        ('q', Value::Str(s)) => format!("{s:?}"),
        ('t', Value::Bool(b)) => b.to_string(),
        (verb, other) => return format!("%!{verb}({}={other})", other.type_name()),
    };
    pad(body, directive, verb == 'd')
}

fn pad(body: String, directive: &Directive, numeric: bool) -> String {
    let width = directive.width.unwrap_or(0);
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if directive.left {
        format!("{body}{}", " ".repeat(fill))
    } else if directive.zero && numeric {
        let (sign, digits) = match body.strip_prefix(['-', '+']) {
            Some(digits) => body.split_at(body.len() - digits.len()),
            None => ("", body.as_str()),
        };
        format!("{sign}{}{digits}", "0".repeat(fill))
    } else {
        format!("{}{body}", " ".repeat(fill))
    }
}
