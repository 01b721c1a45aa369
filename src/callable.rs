//! Everything a call expression can invoke.
//!
//! The [`Callable`] capability is implemented by host functions
//! ([`NativeFunction`]), user functions and methods ([`Function`]) and by
//! classes (see [`crate::class`]), whose call allocates an instance.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::class::Instance;
use crate::environment::Environment;
use crate::interpreter::{Flow, IResult, InterpretError, Interpreter};
use crate::value::Value;

/// Anything invocable with a fixed arity.
///
/// The receiver is an `Rc` so implementations can hand out shared handles to
/// themselves (a class stores itself in the instances it creates).
pub trait Callable {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    /// Invoke with already evaluated arguments. Arity has been checked by the
    /// caller, except for `_default` fallbacks which may receive fewer.
    fn call(self: Rc<Self>, interpreter: &mut Interpreter, arguments: &[Value])
        -> IResult<Value>;
}

/// Body of a host‑provided free function.
pub type NativeFn = dyn Fn(&mut Interpreter, &[Value]) -> IResult<Value>;

/// Body of a host‑provided method; receives the bound instance.
pub type NativeMethod = dyn Fn(&mut Interpreter, &Rc<Instance>, &[Value]) -> IResult<Value>;

// ───────────────────────────── native functions ─────────────────────────────

pub struct NativeFunction {
    name: String,
    arity: usize,
    func: Rc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, arity: usize, func: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> IResult<Value> + 'static,
    {
        NativeFunction {
            name: name.to_string(),
            arity,
            func: Rc::new(func),
        }
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn call(self: Rc<Self>, interpreter: &mut Interpreter, arguments: &[Value]) -> IResult<Value> {
        debug!("Calling native function '{}'", self.name);
        (self.func)(interpreter, arguments)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

// ───────────────────────────── user functions ───────────────────────────────

#[derive(Clone)]
pub enum FunctionBody {
    /// A function literal or class method from the source.
    Declared(Rc<FunctionDecl>),

    /// A method of a built‑in class. `this` is read from the closure.
    Native { arity: usize, method: Rc<NativeMethod> },
}

/// A function value: code plus the environment it closes over.
pub struct Function {
    name: String,
    body: FunctionBody,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl Function {
    pub fn new(
        name: String,
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Function {
            name,
            body: FunctionBody::Declared(declaration),
            closure,
            is_initializer,
        }
    }

    pub fn native(name: &str, arity: usize, method: Rc<NativeMethod>) -> Self {
        Function {
            name: name.to_string(),
            body: FunctionBody::Native { arity, method },
            closure: Rc::new(RefCell::new(Environment::new())),
            is_initializer: name == "init",
        }
    }

    /// A copy of this method whose closure binds `this` to `instance`.
    pub fn bind(&self, instance: Rc<Instance>) -> Rc<Function> {
        let environment = Environment::child_of(&self.closure);
        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        Rc::new(Function {
            name: self.name.clone(),
            body: self.body.clone(),
            closure: environment,
            is_initializer: self.is_initializer,
        })
    }

    fn bound_this(&self) -> IResult<Rc<Instance>> {
        match self.closure.borrow().get("this") {
            Ok(Value::Instance(instance)) => Ok(instance),
            _ => Err(InterpretError::Runtime {
                line: 0,
                message: format!("Method '{}' called without an instance.", self.name),
            }),
        }
    }
}

impl Callable for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        match &self.body {
            FunctionBody::Declared(declaration) => declaration.params.len(),
            FunctionBody::Native { arity, .. } => *arity,
        }
    }

    fn call(self: Rc<Self>, interpreter: &mut Interpreter, arguments: &[Value]) -> IResult<Value> {
        debug!("Calling function '{}' with {} argument(s)", self.name, arguments.len());

        match &self.body {
            FunctionBody::Native { method, .. } => {
                let this: Rc<Instance> = self.bound_this()?;
                let result: Value = method(interpreter, &this, arguments)?;

                if self.is_initializer {
                    return Ok(Value::Instance(this));
                }

                Ok(result)
            }

            FunctionBody::Declared(declaration) => {
                let environment = Environment::child_of(&self.closure);

                {
                    let mut scope = environment.borrow_mut();
                    for (i, param) in declaration.params.iter().enumerate() {
                        let argument: Value = arguments.get(i).cloned().unwrap_or(Value::Nil);
                        scope.define(&param.lexeme, argument);
                    }
                }

                interpreter.enter_call()?;
                let flow = interpreter.execute_block(&declaration.body, environment);
                interpreter.exit_call();
                let flow: Flow = flow?;

                if self.is_initializer {
                    return Ok(Value::Instance(self.bound_this()?));
                }

                match flow {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal | Flow::Break => Ok(Value::Nil),
                }
            }
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}
