//! Tree‑walking evaluator.
//!
//! Statements return a [`Flow`] describing how control leaves them, so
//! `return` and `break` travel up the Rust call stack as ordinary values.
//! The `Err` side of [`IResult`] is reserved for the two genuine failure
//! kinds: engine runtime errors and user `throw`s, and only the latter is
//! seen by `try`/`catch`.
//!
//! Variable references carry an [`ExprId`]; the resolver records the scope
//! distance for each local one in `locals`. Anything missing from that table
//! is looked up in the globals.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::process::Command;
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, PropertyName, Stmt};
use crate::callable::{Callable, Function};
use crate::class::{Class, Instance, NativeState};
use crate::environment::Environment;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;
use crate::stack;
use crate::stdlib::{self, Prelude};
use crate::token::{Token, TokenType};
use crate::value::Value;

#[derive(Error, Debug)]
pub enum InterpretError {
    /// Engine‑detected fault. Fatal; never caught by `try`.
    #[error("[line {line}] RuntimeError: {message}")]
    Runtime { line: usize, message: String },

    /// A user `throw` carrying an arbitrary payload.
    #[error("[line {line}] RuntimeError: Uncaught exception: {value}")]
    Thrown { line: usize, value: Value },

    /// `exit(code)` was called.
    #[error("Exit requested with code {0}")]
    Exit(i32),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, InterpretError>;

/// How control left a statement.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
}

pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    transient: Vec<ExprId>,
    line: usize,
    call_depth: usize,
    out: Box<dyn Write>,
    prelude: Prelude,
}

/// Nested user function calls allowed before `Stack overflow.`
pub const MAX_CALL_DEPTH: usize = 2048;

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout, with the prelude installed.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// An interpreter whose `print` output goes to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));
        let prelude: Prelude = stdlib::install(&mut globals.borrow_mut());

        Self {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            transient: Vec::new(),
            line: 0,
            call_depth: 0,
            out,
            prelude,
        }
    }

    /// Record the scope distance of a local reference.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        debug!("Resolved {:?} at depth {}", id, depth);
        self.locals.insert(id, depth);
    }

    /// Record a local reference that sits outside every function body. It
    /// only runs as part of the current program, so [`forget_transient`]
    /// can drop it once that program is done.
    ///
    /// [`forget_transient`]: Interpreter::forget_transient
    pub fn resolve_transient(&mut self, id: ExprId, depth: usize) {
        self.resolve(id, depth);
        self.transient.push(id);
    }

    /// Position in the transient list; pass it to `forget_transient`.
    pub fn transient_mark(&self) -> usize {
        self.transient.len()
    }

    /// Drop the transient entries recorded since `mark`.
    pub fn forget_transient(&mut self, mark: usize) {
        let mark: usize = mark.min(self.transient.len());

        for id in self.transient.drain(mark..) {
            self.locals.remove(&id);
        }
        debug!("Side table holds {} resolved reference(s)", self.locals.len());
    }

    /// Line of the construct being evaluated, for errors raised by natives.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Count one more active user call. Every successful `enter_call` is
    /// paired with an `exit_call`, whatever the call's outcome.
    pub(crate) fn enter_call(&mut self) -> IResult<()> {
        if self.call_depth >= MAX_CALL_DEPTH {
            debug!("Call depth limit {} reached", MAX_CALL_DEPTH);
            return Err(self.error("Stack overflow."));
        }

        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub fn error<S: Into<String>>(&self, message: S) -> InterpretError {
        InterpretError::Runtime {
            line: self.line,
            message: message.into(),
        }
    }

    fn error_at<S: Into<String>>(&self, token: &Token, message: S) -> InterpretError {
        InterpretError::Runtime {
            line: token.line,
            message: message.into(),
        }
    }

    /// Run a program. `Some(value)` when a top‑level `return` fired.
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<Option<Value>> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                Flow::Return(value) => {
                    info!("Program returned {}", value);
                    return Ok(Some(value));
                }
                Flow::Break => {
                    debug!("Stray break at top level");
                    return Ok(None);
                }
            }
        }

        info!("Interpretation completed successfully");
        Ok(None)
    }

    /// Scan, parse, resolve and run `source` against the globals. Static
    /// diagnostics become one runtime error.
    pub fn eval_source(&mut self, source: &str) -> IResult<Option<Value>> {
        let (tokens, mut errors) = scan_tokens(source);

        let statements: Vec<Stmt> = if errors.is_empty() {
            match Parser::new(tokens).parse() {
                Ok(statements) => statements,
                Err(parse_errors) => {
                    errors.extend(parse_errors);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mark: usize = self.transient_mark();

        if errors.is_empty() {
            if let Err(resolve_errors) = Resolver::new(self).resolve(&statements) {
                errors.extend(resolve_errors);
            }
        }

        if !errors.is_empty() {
            self.forget_transient(mark);
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(self.error(messages.join("\n")));
        }

        let previous = mem::replace(&mut self.environment, self.globals.clone());
        let result = self.interpret(&statements);
        self.environment = previous;
        self.forget_transient(mark);

        result
    }

    // ───────────────────────────── statements ──────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> IResult<Flow> {
        stack::ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> IResult<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                let text: String = self.stringify(&value)?;

                writeln!(self.out, "{}", text).map_err(|e| self.error(e.to_string()))?;
                debug!("Printed value: {}", text);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                self.line = name.line;

                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let scope = Environment::child_of(&self.environment);
                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Try {
                try_branch,
                catch_name,
                catch_branch,
            } => match self.execute(try_branch) {
                Err(InterpretError::Thrown { value, line }) => {
                    debug!("Caught value thrown on line {}", line);

                    let scope = Environment::child_of(&self.environment);
                    if let Some(name) = catch_name {
                        scope.borrow_mut().define(&name.lexeme, value);
                    }

                    self.execute_block(std::slice::from_ref(&**catch_branch), scope)
                }
                other => other,
            },

            Stmt::Throw { keyword, value } => {
                let value: Value = self.evaluate(value)?;
                debug!("Throwing {}", value);

                Err(InterpretError::Thrown {
                    line: keyword.line,
                    value,
                })
            }

            Stmt::Return { keyword, value } => {
                self.line = keyword.line;

                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }

            Stmt::Break { .. } => Ok(Flow::Break),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.line = name.line;
                self.declare_class(name, superclass.as_ref(), methods)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` in `environment`, restoring the current environment
    /// afterwards whatever happens.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> IResult<Flow> {
        let previous = mem::replace(&mut self.environment, environment);
        let result = self.execute_all(statements);
        self.environment = previous;

        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> IResult<Flow> {
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }

        Ok(Flow::Normal)
    }

    fn declare_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> IResult<()> {
        let superclass: Option<Rc<Class>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => return Err(self.error_at(name, "Superclass must be a class.")),
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let method_scope: Rc<RefCell<Environment>> = match &superclass {
            Some(superclass) => {
                let scope = Environment::child_of(&self.environment);
                scope
                    .borrow_mut()
                    .define("super", Value::Class(superclass.clone()));
                scope
            }
            None => self.environment.clone(),
        };

        let table: HashMap<String, Rc<Function>> = methods
            .iter()
            .map(|decl| {
                let method_name: String = decl
                    .name
                    .as_ref()
                    .map_or_else(String::new, |t| t.lexeme.clone());
                let is_initializer: bool = method_name == "init";
                let function = Function::new(
                    method_name.clone(),
                    decl.clone(),
                    method_scope.clone(),
                    is_initializer,
                );
                (method_name, Rc::new(function))
            })
            .collect();

        let class = Class::new(name.lexeme.clone(), superclass, table);
        info!("Class '{}' declared", name.lexeme);

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Class(Rc::new(class)));
        Ok(())
    }

    // ───────────────────────────── expressions ─────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        stack::ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => {
                self.line = name.line;
                self.look_up_variable(*id, name)
            }

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;
                self.line = name.line;

                let assigned = match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, &name.lexeme, value.clone())
                    }
                    None => self.globals.borrow_mut().assign(&name.lexeme, value.clone()),
                };

                assigned.map_err(|message| self.error_at(name, message))?;
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.invoke_callable(callee, &args, paren.line)
            }

            Expr::Get { object, name } => {
                let object: Value = self.evaluate(object)?;
                let (key, _) = self.property_key(name)?;
                self.line = name.token().line;

                let Value::Instance(instance) = object else {
                    return Err(self.error_at(name.token(), "Only instances have properties."));
                };

                if let Some(value) = instance.get(&key) {
                    return Ok(value);
                }

                match instance.class.find_method("_default") {
                    Some(fallback) => fallback
                        .bind(instance.clone())
                        .call(self, &[Value::from(key)]),
                    None => Err(self.error_at(
                        name.token(),
                        format!("Undefined property '{}'.", key),
                    )),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object: Value = self.evaluate(object)?;
                let (key, raw_key) = self.property_key(name)?;
                self.line = name.token().line;

                let Value::Instance(instance) = object else {
                    return Err(self.error_at(name.token(), "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;

                let known: bool =
                    instance.has_field(&key) || instance.class.find_method(&key).is_some();

                if !known {
                    if let Some(fallback) = instance.class.find_method("_default") {
                        fallback
                            .bind(instance.clone())
                            .call(self, &[raw_key, value.clone()])?;
                        return Ok(value);
                    }
                }

                instance.set_field(&key, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => {
                self.line = keyword.line;
                self.look_up_variable(*id, keyword)
            }

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::Function(decl) => {
                let name: String = decl
                    .name
                    .as_ref()
                    .map_or_else(String::new, |t| t.lexeme.clone());

                let function = Rc::new(Function::new(
                    name.clone(),
                    decl.clone(),
                    self.environment.clone(),
                    false,
                ));

                if !name.is_empty() {
                    self.environment
                        .borrow_mut()
                        .define(&name, Value::Function(function.clone()));
                }

                Ok(Value::Function(function))
            }

            Expr::List { bracket, elements } => {
                self.line = bracket.line;

                let mut values: Vec<Value> = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }

                self.new_list(values)
            }

            Expr::Object { brace, entries } => {
                self.line = brace.line;

                let object = Rc::new(Instance::new(self.prelude.object.clone()));
                for (key, expr) in entries {
                    let value: Value = self.evaluate(expr)?;
                    object.set_field(key, value);
                }

                Ok(Value::Instance(object))
            }

            Expr::Command { token, command } => {
                self.line = token.line;
                self.run_command(command)
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> IResult<Value> {
        let found = match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme),
            None => self.globals.borrow().get(&name.lexeme),
        };

        found.map_err(|message| self.error_at(name, message))
    }

    /// The property name as a string key, plus the raw value for computed
    /// names (handed to `_default` on assignment).
    fn property_key(&mut self, name: &PropertyName) -> IResult<(String, Value)> {
        match name {
            PropertyName::Ident(token) => Ok((token.lexeme.clone(), Value::from(token.lexeme.as_str()))),
            PropertyName::Computed { expr, .. } => {
                let value: Value = self.evaluate(expr)?;
                Ok((value.to_string(), value))
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> IResult<Value> {
        let right: Value = self.evaluate(right)?;
        self.line = operator.line;

        match operator.token_type {
            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(self.error_at(operator, "Operand must be a number.")),
            },
            _ => Err(self.error_at(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> IResult<Value> {
        let left: Value = self.evaluate(left)?;
        let right: Value = self.evaluate(right)?;
        self.line = operator.line;

        debug!("Binary {} on {} and {}", operator.lexeme, left, right);

        match operator.token_type {
            TokenType::PLUS => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(_), _) | (_, Value::String(_)) => {
                    let mut text: String = self.stringify(&left)?;
                    text.push_str(&self.stringify(&right)?);
                    Ok(Value::from(text))
                }
                _ => Err(self.error_at(operator, "Operands must be numbers or strings.")),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left.is_equal(&right))),
            TokenType::BANG_EQUAL => Ok(Value::Bool(!left.is_equal(&right))),

            _ => {
                let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
                    return Err(self.error_at(operator, "Operands must be numbers."));
                };
                let (a, b) = (*a, *b);

                match operator.token_type {
                    TokenType::MINUS => Ok(Value::Number(a - b)),
                    TokenType::STAR => Ok(Value::Number(a * b)),
                    TokenType::SLASH => Ok(Value::Number(a / b)),
                    TokenType::DOUBLE_STAR => Ok(Value::Number(a.powf(b))),
                    TokenType::GREATER => Ok(Value::Bool(a > b)),
                    TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                    TokenType::LESS => Ok(Value::Bool(a < b)),
                    TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                    _ => Err(self.error_at(operator, "Invalid binary operator.")),
                }
            }
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> IResult<Value> {
        self.line = keyword.line;

        let distance: usize = *self
            .locals
            .get(&id)
            .ok_or_else(|| self.error_at(keyword, "Can't use 'super' outside of a class."))?;

        let superclass = Environment::get_at(&self.environment, distance, "super")
            .map_err(|message| self.error_at(keyword, message))?;
        let this = Environment::get_at(&self.environment, distance.saturating_sub(1), "this")
            .map_err(|message| self.error_at(keyword, message))?;

        let (Value::Class(superclass), Value::Instance(instance)) = (superclass, this) else {
            return Err(self.error_at(keyword, "Invalid 'super' binding."));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(found.bind(instance))),
            None => Err(self.error_at(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    /// Check callability and arity, then call.
    pub fn invoke_callable(&mut self, callee: Value, arguments: &[Value], line: usize) -> IResult<Value> {
        self.line = line;

        let Some(callable) = callee.as_callable() else {
            return Err(self.error("Can only call functions and classes."));
        };

        if arguments.len() != callable.arity() {
            return Err(self.error(format!(
                "Expected {} arguments but got {}.",
                callable.arity(),
                arguments.len()
            )));
        }

        let result = callable.call(self, arguments);
        self.line = line;
        result
    }

    // ───────────────────────────── helpers ─────────────────────────────────

    /// Text of a value as `print` shows it: instances with a `string()`
    /// method are asked for their own rendering.
    pub fn stringify(&mut self, value: &Value) -> IResult<String> {
        if let Value::Instance(instance) = value {
            if let Some(method) = instance.class.find_method("string") {
                let rendered: Value = method.bind(instance.clone()).call(self, &[])?;
                return Ok(rendered.to_string());
            }
        }

        Ok(value.to_string())
    }

    /// A fresh `List` instance holding `values`.
    pub fn new_list(&mut self, values: Vec<Value>) -> IResult<Value> {
        let list: Value = self.prelude.list.clone().call(self, &[])?;

        if let Value::Instance(instance) = &list {
            *instance.native_state() = NativeState::List(values);
        }

        Ok(list)
    }

    fn run_command(&self, command: &str) -> IResult<Value> {
        info!("Running shell command {:?}", command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|e| self.error(format!("Command failed: {}", e)))?;

        Ok(Value::from(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}
