//! The prelude: global native functions and the built‑in classes every
//! interpreter starts with.
//!
//! | Global       | Kind   | Notes                                          |
//! |--------------|--------|------------------------------------------------|
//! | `clock`      | fn/0   | milliseconds since the Unix epoch              |
//! | `chr`        | fn/1   | code point → one‑character string             |
//! | `prompt`     | fn/1   | print a message, read a line from stdin        |
//! | `exit`       | fn/1   | stop the run with a process exit code          |
//! | `eval`       | fn/1   | run source text against the globals            |
//! | `instanceof` | fn/2   | walks the superclass chain                     |
//! | `has`/`get`/`set` | fn | raw field access, bypassing `_default`        |
//! | `range`      | fn/2   | inclusive `List` of consecutive numbers        |
//! | `Iterable`   | class  | iterator protocol over a subclass's `iterget`  |
//! | `List`       | class  | growable array, `Iterable` subclass            |
//! | `Object`     | class  | backs `{key: value}` literals                  |

use std::io::{self, BufRead, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::callable::{Callable, NativeFunction, NativeMethod};
use crate::class::{Class, Instance, NativeState};
use crate::environment::Environment;
use crate::interpreter::{IResult, InterpretError, Interpreter};
use crate::value::Value;

/// Built‑in classes the interpreter instantiates for literals.
pub struct Prelude {
    pub list: Rc<Class>,
    pub object: Rc<Class>,
}

/// Define every prelude global in `globals`.
pub fn install(globals: &mut Environment) -> Prelude {
    info!("Installing prelude");

    define_native(globals, "clock", 0, |_, _| {
        Ok(Value::Number(Utc::now().timestamp_millis() as f64))
    });

    define_native(globals, "chr", 1, |interpreter, args| {
        let code: usize = index_arg(interpreter, &args[0])?;

        u32::try_from(code)
            .ok()
            .and_then(char::from_u32)
            .map(|c| Value::from(c.to_string()))
            .ok_or_else(|| interpreter.error(format!("Invalid character code {}.", code)))
    });

    define_native(globals, "prompt", 1, |interpreter, args| {
        print!("{}", args[0]);
        io::stdout()
            .flush()
            .map_err(|e| interpreter.error(e.to_string()))?;

        let mut line = String::new();
        let read: usize = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| interpreter.error(e.to_string()))?;

        if read == 0 {
            return Ok(Value::Nil);
        }

        Ok(Value::from(line.trim_end_matches(['\r', '\n'])))
    });

    define_native(globals, "exit", 1, |interpreter, args| {
        let code: f64 = args[0]
            .as_number()
            .ok_or_else(|| interpreter.error("Exit code must be a number."))?;

        Err(InterpretError::Exit(code as i32))
    });

    define_native(globals, "eval", 1, |interpreter, args| {
        let Value::String(source) = &args[0] else {
            return Err(interpreter.error("eval expects a string."));
        };

        Ok(interpreter.eval_source(source)?.unwrap_or(Value::Nil))
    });

    define_native(globals, "instanceof", 2, |_, args| {
        let result: bool = match (&args[0], &args[1]) {
            (Value::Instance(instance), Value::Class(class)) => {
                instance.class.inherits_from(class)
            }
            _ => false,
        };

        Ok(Value::Bool(result))
    });

    define_native(globals, "has", 2, |interpreter, args| {
        let instance = instance_arg(interpreter, &args[0])?;
        Ok(Value::Bool(instance.has_field(&args[1].to_string())))
    });

    define_native(globals, "get", 2, |interpreter, args| {
        let instance = instance_arg(interpreter, &args[0])?;
        Ok(instance.field(&args[1].to_string()).unwrap_or(Value::Nil))
    });

    define_native(globals, "set", 3, |interpreter, args| {
        let instance = instance_arg(interpreter, &args[0])?;
        instance.set_field(&args[1].to_string(), args[2].clone());
        Ok(args[2].clone())
    });

    define_native(globals, "range", 2, |interpreter, args| {
        let (Some(start), Some(end)) = (args[0].as_number(), args[1].as_number()) else {
            return Err(interpreter.error("range expects two numbers."));
        };

        let mut values: Vec<Value> = Vec::new();
        let mut n: f64 = start;
        while n <= end {
            values.push(Value::Number(n));
            n += 1.0;
        }

        interpreter.new_list(values)
    });

    let iterable = Rc::new(iterable_class());
    let list = Rc::new(list_class(iterable.clone()));
    let object = Rc::new(object_class());

    globals.define("Iterable", Value::Class(iterable));
    globals.define("List", Value::Class(list.clone()));
    globals.define("Object", Value::Class(object.clone()));

    Prelude { list, object }
}

fn define_native<F>(globals: &mut Environment, name: &str, arity: usize, func: F)
where
    F: Fn(&mut Interpreter, &[Value]) -> IResult<Value> + 'static,
{
    debug!("Defining native function '{}'", name);

    globals.define(
        name,
        Value::NativeFunction(Rc::new(NativeFunction::new(name, arity, func))),
    );
}

fn method<F>(name: &'static str, arity: usize, body: F) -> (&'static str, usize, Rc<NativeMethod>)
where
    F: Fn(&mut Interpreter, &Rc<Instance>, &[Value]) -> IResult<Value> + 'static,
{
    let body: Rc<NativeMethod> = Rc::new(body);
    (name, arity, body)
}

// ───────────────────────────── argument helpers ─────────────────────────────

fn instance_arg(interpreter: &Interpreter, value: &Value) -> IResult<Rc<Instance>> {
    match value {
        Value::Instance(instance) => Ok(instance.clone()),
        _ => Err(interpreter.error("Only instances have fields.")),
    }
}

/// Largest integer a number holds exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// How far past the end a write may extend a list.
const MAX_LIST_GROWTH: usize = 1 << 20;

/// The non‑negative integer a number or numeric string names, if any.
fn integral(value: &Value) -> Option<f64> {
    let n: f64 = match value {
        Value::Number(n) => *n,
        Value::String(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };

    (n >= 0.0 && n.fract() == 0.0).then_some(n)
}

/// A non‑negative integral index, given as a number or numeric string.
fn index_arg(interpreter: &Interpreter, value: &Value) -> IResult<usize> {
    let Some(n) = integral(value) else {
        return Err(interpreter.error(format!(
            "Index must be a non-negative integer, got {}.",
            value
        )));
    };

    if n > MAX_SAFE_INTEGER {
        return Err(interpreter.error(format!("Index {} is out of range.", value)));
    }

    usize::try_from(n as u64)
        .map_err(|_| interpreter.error(format!("Index {} is out of range.", value)))
}

/// Render a value inside a container: strings quoted, nil spelled out.
fn repr(interpreter: &mut Interpreter, value: &Value) -> IResult<String> {
    match value {
        Value::String(s) => Ok(format!("\"{}\"", s)),
        other => interpreter.stringify(other),
    }
}

fn counter(instance: &Instance) -> f64 {
    instance
        .field("_counter")
        .and_then(|v| v.as_number())
        .unwrap_or(0.0)
}

/// Call the instance's `iterget(i)`.
fn iterget(interpreter: &mut Interpreter, this: &Rc<Instance>, index: f64) -> IResult<Value> {
    match this.get("iterget") {
        Some(Value::Function(getter)) => getter.call(interpreter, &[Value::Number(index)]),
        _ => Err(interpreter.error("iterget method is missing.")),
    }
}

// ───────────────────────────── Iterable ─────────────────────────────────────

fn iterable_class() -> Class {
    Class::native(
        "Iterable",
        None,
        vec![
            method("init", 0, |_, this, _| {
                this.set_field("_counter", Value::Number(0.0));
                Ok(Value::Nil)
            }),
            method("iterreset", 0, |_, this, _| {
                this.set_field("_counter", Value::Number(0.0));
                Ok(Value::Instance(this.clone()))
            }),
            method("iterhas", 0, |interpreter, this, _| {
                let next: Value = iterget(interpreter, this, counter(this))?;
                Ok(Value::Bool(!matches!(next, Value::Nil)))
            }),
            method("iternext", 0, |interpreter, this, _| {
                let current: f64 = counter(this);
                let value: Value = iterget(interpreter, this, current)?;
                this.set_field("_counter", Value::Number(current + 1.0));
                Ok(value)
            }),
        ],
    )
}

// ───────────────────────────── List ─────────────────────────────────────────

/// Run `f` over the list payload, creating it if an uninitialised subclass
/// instance reaches a list method.
fn with_items<R>(this: &Instance, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
    let mut state = this.native_state();

    if !matches!(*state, NativeState::List(_)) {
        *state = NativeState::List(Vec::new());
    }

    match &mut *state {
        NativeState::List(items) => f(items),
        NativeState::None => f(&mut Vec::new()),
    }
}

fn list_class(iterable: Rc<Class>) -> Class {
    Class::native(
        "List",
        Some(iterable),
        vec![
            method("init", 0, |_, this, _| {
                this.set_field("_counter", Value::Number(0.0));
                *this.native_state() = NativeState::List(Vec::new());
                Ok(Value::Nil)
            }),
            method("append", 1, |_, this, args| {
                with_items(this, |items| items.push(args[0].clone()));
                Ok(Value::Instance(this.clone()))
            }),
            method("set", 2, |interpreter, this, args| {
                let index: usize = index_arg(interpreter, &args[0])?;
                store(interpreter, this, index, args[1].clone())?;
                Ok(Value::Instance(this.clone()))
            }),
            method("pop", 0, |_, this, _| {
                Ok(with_items(this, |items| items.pop()).unwrap_or(Value::Nil))
            }),
            method("shift", 0, |_, this, _| {
                let first: Option<Value> = with_items(this, |items| {
                    if items.is_empty() {
                        None
                    } else {
                        Some(items.remove(0))
                    }
                });
                Ok(first.unwrap_or(Value::Nil))
            }),
            method("slice", 2, |interpreter, this, args| {
                let items: Vec<Value> = with_items(this, |items| items.clone());
                let start: usize = index_arg(interpreter, &args[0])?.min(items.len());
                let end: usize = match &args[1] {
                    Value::Nil => items.len(),
                    other => index_arg(interpreter, other)?.min(items.len()),
                };

                let slice: Vec<Value> = items.get(start..end.max(start)).unwrap_or(&[]).to_vec();
                interpreter.new_list(slice)
            }),
            method("foreach", 1, |interpreter, this, args| {
                let items: Vec<Value> = with_items(this, |items| items.clone());
                let line: usize = interpreter.line();

                for item in items {
                    let stop: Value = interpreter.invoke_callable(args[0].clone(), &[item], line)?;
                    if stop.is_truthy() {
                        break;
                    }
                }
                Ok(Value::Nil)
            }),
            method("get", 1, |interpreter, this, args| {
                let index: usize = index_arg(interpreter, &args[0])?;
                Ok(with_items(this, |items| items.get(index).cloned()).unwrap_or(Value::Nil))
            }),
            method("iterget", 1, |interpreter, this, args| {
                let index: usize = index_arg(interpreter, &args[0])?;
                Ok(with_items(this, |items| items.get(index).cloned()).unwrap_or(Value::Nil))
            }),
            // Counts instead of probing so nil elements do not end a loop.
            method("iterhas", 0, |_, this, _| {
                let len: usize = with_items(this, |items| items.len());
                Ok(Value::Bool((counter(this) as usize) < len))
            }),
            method("length", 0, |_, this, _| {
                Ok(Value::Number(with_items(this, |items| items.len()) as f64))
            }),
            method("last", 0, |_, this, _| {
                Ok(with_items(this, |items| items.last().cloned()).unwrap_or(Value::Nil))
            }),
            method("join", 1, |interpreter, this, args| {
                let items: Vec<Value> = with_items(this, |items| items.clone());
                let separator: String = args[0].to_string();

                let mut parts: Vec<String> = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(interpreter.stringify(item)?);
                }

                Ok(Value::from(parts.join(&separator)))
            }),
            method("string", 0, |interpreter, this, _| {
                let items: Vec<Value> = with_items(this, |items| items.clone());

                let mut parts: Vec<String> = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(repr(interpreter, item)?);
                }

                Ok(Value::from(format!("[{}]", parts.join(", "))))
            }),
            // `list[i]` reads, `list[i] = v` writes (padding with nil).
            method("_default", 2, |interpreter, this, args| {
                let key: Value = args.first().cloned().unwrap_or(Value::Nil);

                if integral(&key).is_none() {
                    return Err(interpreter.error(format!("Undefined property '{}'.", key)));
                }
                let index: usize = index_arg(interpreter, &key)?;

                if let Some(value) = args.get(1) {
                    store(interpreter, this, index, value.clone())?;
                    return Ok(value.clone());
                }

                Ok(with_items(this, |items| items.get(index).cloned()).unwrap_or(Value::Nil))
            }),
        ],
    )
}

/// Write `value` at `index`, padding the gap with `nil`.
fn store(interpreter: &Interpreter, this: &Instance, index: usize, value: Value) -> IResult<()> {
    with_items(this, |items| {
        let len: usize = items.len();
        let Some(new_len) = index.checked_add(1).filter(|end| *end <= len + MAX_LIST_GROWTH) else {
            return Err(interpreter.error(format!(
                "Index {} is too far past the end of a list of length {}.",
                index, len
            )));
        };

        if index >= len {
            items.resize(new_len, Value::Nil);
        }
        items[index] = value;
        Ok(())
    })
}

// ───────────────────────────── Object ───────────────────────────────────────

fn object_class() -> Class {
    Class::native(
        "Object",
        None,
        vec![method("string", 0, |interpreter, this, _| {
            let mut parts: Vec<String> = Vec::new();

            for (key, value) in this.fields() {
                parts.push(format!("{}: {}", key, repr(interpreter, &value)?));
            }

            Ok(Value::from(format!("{{{}}}", parts.join(", "))))
        })],
    )
}
