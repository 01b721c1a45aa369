/*!
Recursive‑descent parser for slox.

Time is Θ(n) over the token stream: each token is consumed once by
`advance()`, and panic‑mode `synchronize()` only ever moves forward.

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| Error paths                  | `debug`| Context before recording the error.       |

--------------------------------------------------------------------------------
Grammar (EBNF, loosest binding first)
--------------------------------------------------------------------------------

```text
program        → declaration* EOF ;
declaration    → classDecl | varDecl | statement ;
classDecl      → "class" IDENT ( "<" IDENT )? "{" method* "}" ;
method         → IDENT "(" parameters? ")" statement ;
varDecl        → "var" IDENT ( "=" expression )? ";"? ;
statement      → exprStmt | printStmt | whileStmt | forStmt | ifStmt
               | tryStmt | throwStmt | returnStmt | breakStmt | block ;
forStmt        → "for" "(" ( "each" expression "as" IDENT ")" statement
                           | ( varDecl | exprStmt | ";" ) expression? ";"
                             expression? ")" statement ) ;
tryStmt        → "try" statement "catch" IDENT? statement ;
block          → "{" declaration* "}" ;
expression     → assignment ;
assignment     → ( call "." IDENT | call "[" expression "]" | IDENT )
                 "=" assignment | logic_or ;
logic_or       → logic_and ( "or" logic_and )* ;
logic_and      → equality ( "and" equality )* ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" | "**" ) unary )* ;
unary          → ( "!" | "-" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT | "[" expression "]" )* ;
primary        → NUMBER | STRING | COMMAND | "true" | "false" | "nil" | "this"
               | IDENT | "(" expression ")" | "super" "." IDENT
               | "fun" IDENT? "(" parameters? ")" statement
               | "[" arguments? "]" | "{" ( key ":" expression ","? )* "}"
               | "import" STRING ;
```

Semicolons after simple statements are optional.

Nesting is capped at `MAX_NESTING` levels. Every statement, expression,
prefix operator and right‑hand side of an assignment counts as one level,
and so does each link of a left‑associative operator or postfix chain. The
cap carries over into imported files.
*/

use std::mem;
use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, LiteralValue, PropertyName, Stmt};
use crate::error::{Result, SloxError};
use crate::scanner::scan_tokens;
use crate::stack;
use crate::token::{Token, TokenType};
use crate::value::format_number;

use log::{debug, info};

const MAX_ARGS: usize = 255;
const MAX_NESTING: usize = 512;

/// Top‑level parser over an owned token vector.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    loop_depth: usize,
    depth: usize,
    errors: Vec<SloxError>,
}

impl Parser {
    /// Construct a new parser. A trailing `EOF` is added if missing.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        if !matches!(tokens.last(), Some(t) if t.token_type == TokenType::EOF) {
            let line: usize = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::new(TokenType::EOF, "", line));
        }

        Self {
            tokens,
            current: 0,
            loop_depth: 0,
            depth: 0,
            errors: Vec::new(),
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program. Every syntax error is collected; if any
    /// occurred no statements are handed out.
    pub fn parse(&mut self) -> std::result::Result<Vec<Stmt>, Vec<SloxError>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        if self.errors.is_empty() {
            info!("Parsed {} statement(s)", statements.len());
            Ok(statements)
        } else {
            info!("Parse failed with {} error(s)", self.errors.len());
            Err(mem::take(&mut self.errors))
        }
    }

    // ──────────────────────── declaration rules ───────────────────

    /// Parse one declaration; on a syntax error record it, resynchronize and
    /// yield nothing so the caller carries on with the next declaration.
    fn declaration(&mut self) -> Option<Stmt> {
        debug!("Entering declaration");

        let result = if self.matches(TokenType::CLASS) {
            self.class_declaration()
        } else if self.matches(TokenType::VAR) {
            self.var_declaration(true)
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                debug!("Recovering from parse error: {}", e);
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass: Option<Expr> = if self.matches(TokenType::LESS) {
            let super_name: Token =
                self.consume(TokenType::IDENTIFIER, "Expect superclass name.")?;
            Some(Expr::variable(super_name))
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            let method_name: Token = self.consume(TokenType::IDENTIFIER, "Expect method name.")?;
            methods.push(Rc::new(self.function(Some(method_name), "method")?));
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    /// Parameters and body of a function literal or method; the name (if
    /// any) has already been consumed.
    fn function(&mut self, name: Option<Token>, kind: &str) -> Result<FunctionDecl> {
        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARGS {
                    let e = self.error_at(self.peek(), "Can't have more than 255 parameters.");
                    self.errors.push(e);
                }

                params.push(self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        // `break` never crosses a function boundary.
        let enclosing_depth: usize = mem::replace(&mut self.loop_depth, 0);
        let body = self.statement();
        self.loop_depth = enclosing_depth;

        Ok(FunctionDecl {
            name,
            params,
            body: vec![implicit_return(body?)],
        })
    }

    fn var_declaration(&mut self, terminated: bool) -> Result<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer: Option<Expr> = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        if terminated {
            self.matches(TokenType::SEMICOLON);
        }

        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        self.nested(Self::statement_rule)
    }

    fn statement_rule(&mut self) -> Result<Stmt> {
        debug!("Entering statement at {:?}", self.peek().token_type);

        if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::TRY) {
            self.try_statement()
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else if self.matches(TokenType::THROW) {
            self.throw_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::BREAK) {
            self.break_statement()
        } else if self.check(TokenType::LEFT_BRACE) && !self.object_ahead() {
            self.advance();
            Ok(Stmt::Block(self.block()?))
        } else {
            self.expression_statement(true)
        }
    }

    /// `{ key :` at statement start opens an object literal, not a block.
    fn object_ahead(&self) -> bool {
        let key = matches!(
            self.peek_at(1).token_type,
            TokenType::IDENTIFIER | TokenType::STRING(_)
        );

        key && self.peek_at(2).token_type == TokenType::COLON
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.loop_depth += 1;
        let result = self.while_parts();
        self.loop_depth -= 1;

        let (condition, body) = result?;

        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    fn while_parts(&mut self) -> Result<(Expr, Stmt)> {
        let condition: Expr = self.expression()?;
        let body: Stmt = self.statement()?;

        Ok((condition, body))
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        self.loop_depth += 1;
        let result = if self.matches(TokenType::EACH) {
            self.for_each()
        } else {
            self.for_clauses()
        };
        self.loop_depth -= 1;

        result
    }

    /// C‑style loop, desugared:
    /// `{ init; while (cond) { body; increment; } }`.
    fn for_clauses(&mut self) -> Result<Stmt> {
        let initializer: Option<Stmt> = if self.matches(TokenType::SEMICOLON) {
            None
        } else {
            let init = if self.matches(TokenType::VAR) {
                self.var_declaration(false)?
            } else {
                self.expression_statement(false)?
            };

            self.consume(TokenType::SEMICOLON, "Expect ';' after loop initializer.")?;
            Some(init)
        };

        let condition: Expr = if self.check(TokenType::SEMICOLON) {
            Expr::Literal(LiteralValue::True)
        } else {
            self.expression()?
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if self.check(TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body: Stmt = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    /// `for (each <expr> as x) body`, desugared onto the iterator protocol:
    ///
    /// ```text
    /// { var x = nil; var _x = <expr>; _x.iterreset();
    ///   while (_x.iterhas()) { x = _x.iternext(); body } }
    /// ```
    fn for_each(&mut self) -> Result<Stmt> {
        let iterable: Expr = self.expression()?;

        self.consume(TokenType::AS, "Expect 'as' after expression.")?;
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expected identifier after 'as'.")?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after identifier.")?;

        let body: Stmt = self.statement()?;

        let line: usize = name.line;
        let source: Token = Token::synthetic(&format!("_{}", name.lexeme), line);

        let protocol_call = |method: &str| Expr::Call {
            callee: Box::new(Expr::Get {
                object: Box::new(Expr::variable(source.clone())),
                name: PropertyName::Ident(Token::synthetic(method, line)),
            }),
            paren: name.clone(),
            arguments: Vec::new(),
        };

        let step = Stmt::Expression(Expr::assign(name.clone(), protocol_call("iternext")));

        Ok(Stmt::Block(vec![
            Stmt::Var {
                name: name.clone(),
                initializer: Some(Expr::Literal(LiteralValue::Nil)),
            },
            Stmt::Var {
                name: source.clone(),
                initializer: Some(iterable),
            },
            Stmt::Expression(protocol_call("iterreset")),
            Stmt::While {
                condition: protocol_call("iterhas"),
                body: Box::new(Stmt::Block(vec![step, body])),
            },
        ]))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let condition: Expr = self.expression()?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn try_statement(&mut self) -> Result<Stmt> {
        let try_branch: Box<Stmt> = Box::new(self.statement()?);

        self.consume(TokenType::CATCH, "Expected 'catch' after 'try' body.")?;

        let catch_name: Option<Token> = if self.check(TokenType::IDENTIFIER) {
            Some(self.advance())
        } else {
            None
        };

        let catch_branch: Box<Stmt> = Box::new(self.statement()?);

        Ok(Stmt::Try {
            try_branch,
            catch_name,
            catch_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value: Expr = self.expression()?;

        self.matches(TokenType::SEMICOLON);

        Ok(Stmt::Print(value))
    }

    fn throw_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();
        let value: Expr = self.expression()?;

        self.matches(TokenType::SEMICOLON);

        Ok(Stmt::Throw { keyword, value })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        let value: Option<Expr> = if self.check(TokenType::SEMICOLON)
            || self.check(TokenType::RIGHT_BRACE)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.expression()?)
        };

        self.matches(TokenType::SEMICOLON);

        Ok(Stmt::Return { keyword, value })
    }

    fn break_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        self.matches(TokenType::SEMICOLON);

        if self.loop_depth == 0 {
            let e = self.error_at(&keyword, "Break must be in loop.");
            self.errors.push(e);
        }

        Ok(Stmt::Break { keyword })
    }

    fn expression_statement(&mut self, terminated: bool) -> Result<Stmt> {
        let expr: Expr = self.expression()?;

        if terminated {
            self.matches(TokenType::SEMICOLON);
        }

        Ok(Stmt::Expression(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;
        Ok(statements)
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.logical_or()?;

        if self.matches(TokenType::EQUAL) {
            let equals: Token = self.previous().clone();
            let value: Expr = self.nested(Self::assignment)?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::assign(name, value)),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),

                other => {
                    let e = self.error_at(&equals, "Invalid assignment target.");
                    self.errors.push(e);
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let operator: Token = self.previous().clone();
            self.descend()?;
            let right: Expr = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.matches(TokenType::AND) {
            let operator: Token = self.previous().clone();
            self.descend()?;
            let right: Expr = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// One left‑associative binary precedence level.
    fn binary_level(
        &mut self,
        operators: &[TokenType],
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut expr: Expr = operand(self)?;

        while operators.iter().any(|op| self.check(op.clone())) {
            let operator: Token = self.advance();
            self.descend()?;
            let right: Expr = operand(self)?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(
            &[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                TokenType::GREATER,
                TokenType::GREATER_EQUAL,
                TokenType::LESS,
                TokenType::LESS_EQUAL,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_level(&[TokenType::MINUS, TokenType::PLUS], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_level(
            &[TokenType::SLASH, TokenType::STAR, TokenType::DOUBLE_STAR],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.matches(TokenType::BANG) || self.matches(TokenType::MINUS) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.nested(Self::unary)?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.check(TokenType::LEFT_PAREN)
                || self.check(TokenType::DOT)
                || self.check(TokenType::LEFT_SQRBRACKET)
            {
                self.descend()?;
            }

            if self.matches(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::DOT) {
                let name: Token =
                    self.consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name: PropertyName::Ident(name),
                };
            } else if self.matches(TokenType::LEFT_SQRBRACKET) {
                let bracket: Token = self.previous().clone();
                let key: Expr = self.expression()?;

                self.consume(
                    TokenType::RIGHT_SQRBRACKET,
                    "Expect ']' after expression.",
                )?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name: PropertyName::Computed {
                        bracket,
                        expr: Box::new(key),
                    },
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    let e = self.error_at(self.peek(), "Can't have more than 255 arguments.");
                    self.errors.push(e);
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren: Token = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        let token: Token = self.peek().clone();

        let expr: Expr = match token.token_type {
            TokenType::FALSE => Expr::Literal(LiteralValue::False),
            TokenType::TRUE => Expr::Literal(LiteralValue::True),
            TokenType::NIL => Expr::Literal(LiteralValue::Nil),
            TokenType::NUMBER(n) => Expr::Literal(LiteralValue::Number(n)),
            TokenType::STRING(ref s) => Expr::Literal(LiteralValue::Str(s.clone())),
            TokenType::COMMAND(ref command) => Expr::Command {
                command: command.clone(),
                token: token.clone(),
            },
            TokenType::THIS => Expr::This {
                id: crate::ast::ExprId::fresh(),
                keyword: token.clone(),
            },
            TokenType::IDENTIFIER => Expr::variable(token.clone()),

            TokenType::FUN => {
                self.advance();
                let name: Option<Token> = if self.check(TokenType::IDENTIFIER) {
                    Some(self.advance())
                } else {
                    None
                };
                return Ok(Expr::Function(Rc::new(self.function(name, "function")?)));
            }

            TokenType::LEFT_BRACE => {
                self.advance();
                return self.object();
            }

            TokenType::LEFT_SQRBRACKET => {
                self.advance();
                return self.list();
            }

            TokenType::LEFT_PAREN => {
                self.advance();
                let expr: Expr = self.expression()?;

                self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

                return Ok(Expr::Grouping(Box::new(expr)));
            }

            TokenType::SUPER => {
                self.advance();
                self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;
                let method: Token =
                    self.consume(TokenType::IDENTIFIER, "Expect superclass method name.")?;

                return Ok(Expr::Super {
                    id: crate::ast::ExprId::fresh(),
                    keyword: token,
                    method,
                });
            }

            TokenType::IMPORT => {
                self.advance();
                return self.import();
            }

            _ => {
                debug!("No expression starts at {:?}", token.token_type);
                return Err(self.error_at(&token, "Expect expression."));
            }
        };

        self.advance();
        Ok(expr)
    }

    /// `{ key: value, ... }` after the opening brace.
    fn object(&mut self) -> Result<Expr> {
        let brace: Token = self.previous().clone();
        let mut entries: Vec<(String, Expr)> = Vec::new();

        while !self.matches(TokenType::RIGHT_BRACE) {
            let key_token: Token = self.peek().clone();

            let key: String = match key_token.token_type {
                TokenType::IDENTIFIER => key_token.lexeme.clone(),
                TokenType::STRING(ref s) => s.clone(),
                TokenType::NUMBER(n) => format_number(n),
                _ => return Err(self.error_at(&key_token, "Expect property name in object.")),
            };
            self.advance();

            self.consume(TokenType::COLON, "Expect colon after expression.")?;
            entries.push((key, self.expression()?));

            self.matches(TokenType::COMMA);
        }

        Ok(Expr::Object { brace, entries })
    }

    /// `[a, b, ...]` after the opening bracket.
    fn list(&mut self) -> Result<Expr> {
        let bracket: Token = self.previous().clone();
        let mut elements: Vec<Expr> = Vec::new();

        if !self.check(TokenType::RIGHT_SQRBRACKET) {
            loop {
                elements.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(
            TokenType::RIGHT_SQRBRACKET,
            "Expect ']' after array values.",
        )?;

        Ok(Expr::List { bracket, elements })
    }

    /// `import "path"`: parse the file now and splice it in as an
    /// immediately‑invoked, parameterless function.
    fn import(&mut self) -> Result<Expr> {
        let keyword: Token = self.previous().clone();
        let filename: Token = self.consume(
            TokenType::STRING(String::new()),
            "Expect filename string after 'import'.",
        )?;

        let TokenType::STRING(ref path) = filename.token_type else {
            return Err(self.error_at(&filename, "Expect filename string after 'import'."));
        };

        let source: String = std::fs::read_to_string(path).map_err(|e| {
            debug!("Import of {:?} failed: {}", path, e);
            self.error_at(&keyword, "No such file or directory.")
        })?;

        info!("Importing {:?}", path);

        let (tokens, lex_errors) = scan_tokens(&source);
        self.errors.extend(lex_errors);

        let mut parser = Parser::new(tokens);
        parser.depth = self.depth;

        let body: Vec<Stmt> = match parser.parse() {
            Ok(statements) => statements,
            Err(errors) => {
                self.errors.extend(errors);
                Vec::new()
            }
        };

        Ok(Expr::Call {
            callee: Box::new(Expr::Function(Rc::new(FunctionDecl {
                name: None,
                params: Vec::new(),
                body,
            }))),
            paren: keyword,
            arguments: Vec::new(),
        })
    }

    // ────────────────────── utility helpers ───────────────────────

    /// Run `rule` one nesting level deeper, restoring the level afterwards
    /// whether or not it succeeded.
    fn nested<T>(&mut self, rule: fn(&mut Self) -> Result<T>) -> Result<T> {
        let saved: usize = self.depth;
        let result = self
            .descend()
            .and_then(|()| stack::ensure_sufficient_stack(|| rule(self)));
        self.depth = saved;
        result
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;

        if self.depth > MAX_NESTING {
            debug!("Nesting limit {} exceeded", MAX_NESTING);
            return Err(self.error_at(self.peek(), "Too much nesting."));
        }

        Ok(())
    }

    fn error_at(&self, token: &Token, message: &str) -> SloxError {
        let location: String = if token.token_type == TokenType::EOF {
            format!("{} at end", token.line)
        } else {
            format!("{} at '{}'", token.line, token.lexeme)
        };

        debug!("Parse error at {}: {}", location, message);

        SloxError::parse(token.line, location, message)
    }

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<Token> {
        if self.check(ttype) {
            return Ok(self.advance());
        }

        Err(self.error_at(self.peek(), message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    #[inline(always)]
    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous().clone()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Token `offset` positions ahead, clamped to the trailing `EOF`.
    fn peek_at(&self, offset: usize) -> &Token {
        let index: usize = (self.current + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    #[inline(always)]
    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance(); // skip the token that caused the error

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN
                | TokenType::BREAK => return,
                _ => {}
            }

            self.advance();
        }
    }
}

/// Rewrite the tail of a function body so expression‑bodied functions yield
/// their last expression.
fn implicit_return(body: Stmt) -> Stmt {
    match body {
        Stmt::Expression(expr) => {
            let keyword = Token::new(TokenType::RETURN, "return", expr.line());
            Stmt::Return {
                keyword,
                value: Some(expr),
            }
        }

        Stmt::Block(mut statements) => {
            if let Some(last) = statements.pop() {
                statements.push(match last {
                    Stmt::Expression(expr) => Stmt::Return {
                        keyword: Token::new(TokenType::RETURN, "return", expr.line()),
                        value: Some(expr),
                    },
                    other => other,
                });
            }
            Stmt::Block(statements)
        }

        other => other,
    }
}
