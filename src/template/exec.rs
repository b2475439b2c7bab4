//! Template execution against a value scope.
//!
//! Field references are plain map lookups. A key missing from the map is
//! an error, never an empty or placeholder value.
//!
//! Variables live on a stack. A variable declared inside `if`, `with` or
//! `range` goes out of scope at the matching `end`, and one declared in a
//! `range` body is reset on every iteration.

use super::funcs;
use super::parse::{Arg, Command, Node, Pipeline};
use super::value::Value;

/// Execute `nodes` with `root` as both `$` and the initial `.`, appending
/// output to `out`.
pub fn execute(nodes: &[Node], root: &Value, out: &mut String) -> Result<(), String> {
    let mut exec = Exec {
        root,
        vars: Vec::new(),
    };
    exec.walk(root, nodes, out)
}

struct Exec<'a> {
    root: &'a Value,
    vars: Vec<(String, Value)>,
}

impl Exec<'_> {
    fn walk(&mut self, dot: &Value, nodes: &[Node], out: &mut String) -> Result<(), String> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(pipeline) => {
                    let value = self.eval_pipeline(dot, pipeline)?;
                    if pipeline.decl.is_empty() {
                        out.push_str(&value.to_string());
                    }
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mark = self.vars.len();
                    let mut taken = false;
                    for (cond, body) in branches {
                        if self.eval_pipeline(dot, cond)?.truthy() {
                            self.walk(dot, body, out)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.walk(dot, otherwise, out)?;
                    }
                    self.vars.truncate(mark);
                }
                Node::With {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let mark = self.vars.len();
                    let value = self.eval_pipeline(dot, pipeline)?;
                    if value.truthy() {
                        self.walk(&value, body, out)?;
                    } else {
                        self.walk(dot, otherwise, out)?;
                    }
                    self.vars.truncate(mark);
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                } => self.walk_range(dot, pipeline, body, otherwise, out)?,
            }
        }
        Ok(())
    }

    /// Map values in key order, or `0..n` for an int, one at a time.
    fn walk_range(
        &mut self,
        dot: &Value,
        pipeline: &Pipeline,
        body: &[Node],
        otherwise: &[Node],
        out: &mut String,
    ) -> Result<(), String> {
        let value = self
            .eval_commands(dot, pipeline)
            .map_err(|e| format!("line {}: {e}", pipeline.line))?;
        let mark = self.vars.len();
        let mut iterations = 0u64;

        match value {
            Value::Map(m) => {
                for (key, item) in m {
                    self.vars.truncate(mark);
                    self.bind_range(pipeline, Value::Str(key), &item)?;
                    self.walk(&item, body, out)?;
                    iterations += 1;
                }
            }
            Value::Int(n) => {
                if pipeline.decl.len() > 1 {
                    return Err(format!(
                        "line {}: can't use two iteration variables with range over int",
                        pipeline.line
                    ));
                }
                for i in 0..n.max(0) {
                    self.vars.truncate(mark);
                    let item = Value::Int(i);
                    self.bind_range(pipeline, item.clone(), &item)?;
                    self.walk(&item, body, out)?;
                    iterations += 1;
                }
            }
            other => {
                return Err(format!(
                    "line {}: range can't iterate over {}",
                    pipeline.line,
                    other.type_name()
                ));
            }
        }
        self.vars.truncate(mark);

        if iterations == 0 {
            self.walk(dot, otherwise, out)?;
        }
        Ok(())
    }

    /// One range variable takes the element; two take the key and element.
    fn bind_range(&mut self, pipeline: &Pipeline, key: Value, item: &Value) -> Result<(), String> {
        match pipeline.decl.as_slice() {
            [] => {}
            [elem] => self.vars.push((elem.clone(), item.clone())),
            [k, elem] => {
                self.vars.push((k.clone(), key));
                self.vars.push((elem.clone(), item.clone()));
            }
            _ => return Err(format!("line {}: too many range variables", pipeline.line)),
        }
        Ok(())
    }

    /// Evaluate a pipeline and apply its declaration or assignment, if any.
    fn eval_pipeline(&mut self, dot: &Value, pipeline: &Pipeline) -> Result<Value, String> {
        let value = self
            .eval_commands(dot, pipeline)
            .map_err(|e| format!("line {}: {e}", pipeline.line))?;

        if let Some(name) = pipeline.decl.first() {
            if pipeline.assign {
                let slot = self
                    .vars
                    .iter_mut()
                    .rev()
                    .find(|(n, _)| n == name)
                    .ok_or_else(|| format!("line {}: undefined variable: {name}", pipeline.line))?;
                slot.1 = value.clone();
            } else {
                self.vars.push((name.clone(), value.clone()));
            }
        }
        Ok(value)
    }

    fn eval_commands(&self, dot: &Value, pipeline: &Pipeline) -> Result<Value, String> {
        let mut piped = None;
        for cmd in &pipeline.commands {
            piped = Some(self.eval_command(dot, cmd, piped.take())?);
        }
        piped.ok_or_else(|| "empty pipeline".to_string())
    }

    fn eval_command(&self, dot: &Value, cmd: &Command, piped: Option<Value>) -> Result<Value, String> {
        let Some(first) = cmd.args.first() else {
            return Err("missing value for command".to_string());
        };

        match first {
            Arg::Func(name) if name == "and" || name == "or" => {
                self.eval_logic(dot, name, &cmd.args[1..], piped)
            }
            Arg::Func(name) => {
                let mut args = Vec::with_capacity(cmd.args.len());
                for arg in &cmd.args[1..] {
                    args.push(self.eval_arg(dot, arg)?);
                }
                args.extend(piped);
                call(name, args)
            }
            other => {
                if piped.is_some() || cmd.args.len() > 1 {
                    return Err("can't give argument to non-function".to_string());
                }
                self.eval_arg(dot, other)
            }
        }
    }

    /// `and` stops at the first falsy operand and `or` at the first truthy
    /// one; later operands are never evaluated. A piped value comes last.
    fn eval_logic(
        &self,
        dot: &Value,
        name: &str,
        args: &[Arg],
        piped: Option<Value>,
    ) -> Result<Value, String> {
        let stop_when = name == "or";
        let mut last = None;

        for arg in args {
            let value = self
                .eval_arg(dot, arg)
                .map_err(|e| format!("error calling {name}: {e}"))?;
            if value.truthy() == stop_when {
                return Ok(value);
            }
            last = Some(value);
        }
        if let Some(value) = piped {
            last = Some(value);
        }

        last.ok_or_else(|| {
            format!("error calling {name}: wrong number of args for {name}: want at least 1 got 0")
        })
    }

    fn eval_arg(&self, dot: &Value, arg: &Arg) -> Result<Value, String> {
        match arg {
            Arg::Field { path } => lookup_path(dot, path),
            Arg::Var { name, path } => lookup_path(self.variable(name)?, path),
            Arg::Str(s) => Ok(Value::Str(s.clone())),
            Arg::Int(n) => Ok(Value::Int(*n)),
            Arg::Bool(b) => Ok(Value::Bool(*b)),
            // A function in argument position is called with no arguments
            Arg::Func(name) => call(name, Vec::new()),
            Arg::Sub(pipeline) => self.eval_commands(dot, pipeline),
        }
    }

    fn variable(&self, name: &str) -> Result<&Value, String> {
        if name == "$" {
            return Ok(self.root);
        }
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| format!("undefined variable: {name}"))
    }
}

fn call(name: &str, args: Vec<Value>) -> Result<Value, String> {
    let f = funcs::lookup(name).ok_or_else(|| format!("function {name:?} not defined"))?;
    f(args).map_err(|e| format!("error calling {name}: {e}"))
}

fn lookup_path(base: &Value, path: &[String]) -> Result<Value, String> {
    let mut current = base;
    for name in path {
        current = match current {
            Value::Map(m) => m
                .get(name)
                .ok_or_else(|| format!("map has no entry for key {name:?}"))?,
            other => {
                return Err(format!(
                    "can't evaluate field {name} in type {}",
                    other.type_name()
                ));
            }
        };
    }
    Ok(current.clone())
}
