use crate::ast::{Expr, LiteralValue, PropertyName, Stmt};
use crate::scanner::is_keyword;
use crate::value::format_number;

/// Renders the AST back into slox source.
///
/// Output is canonical rather than faithful: spacing and semicolons are
/// normalised and loop sugar shows up in its desugared `while` form, but
/// re‑parsing the text yields a tree that evaluates the same way. Only
/// `Grouping` nodes get parentheses, so precedence survives because the
/// parser keeps a grouping wherever the source had one.
pub struct AstPrinter;

const INDENT: &str = "    ";

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),

                LiteralValue::False => "false".into(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => quote(s, '"'),

                LiteralValue::Number(n) => format_number(*n),
            },

            // ── grouping ────────────────────────────────────────────────
            Expr::Grouping(inner) => format!("({})", Self::print(inner)),

            // ── operators ───────────────────────────────────────────────
            Expr::Unary { operator, right } => {
                format!("{}{}", operator.lexeme, Self::print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "{} {} {}",
                Self::print(left),
                operator.lexeme,
                Self::print(right)
            ),

            // ── names ───────────────────────────────────────────────────
            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => format!("{} = {}", name.lexeme, Self::print(value)),

            Expr::This { .. } => "this".into(),

            Expr::Super { method, .. } => format!("super.{}", method.lexeme),

            // ── calls and properties ────────────────────────────────────
            Expr::Call {
                callee, arguments, ..
            } => format!("{}({})", Self::print(callee), Self::print_list(arguments)),

            Expr::Get { object, name } => {
                format!("{}{}", Self::print(object), Self::print_property(name))
            }

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "{}{} = {}",
                Self::print(object),
                Self::print_property(name),
                Self::print(value)
            ),

            // ── literals with structure ─────────────────────────────────
            Expr::Function(decl) => {
                let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
                let name: &str = decl.name.as_ref().map_or("", |t| t.lexeme.as_str());

                let body: String = match decl.body.as_slice() {
                    [single] => Self::print_stmt(single, 0),
                    many => Self::print_block(many, 0),
                };

                if name.is_empty() {
                    format!("fun ({}) {}", params.join(", "), body)
                } else {
                    format!("fun {}({}) {}", name, params.join(", "), body)
                }
            }

            Expr::List { elements, .. } => format!("[{}]", Self::print_list(elements)),

            Expr::Object { entries, .. } => {
                let fields: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", object_key(key), Self::print(value)))
                    .collect();

                format!("{{{}}}", fields.join(", "))
            }

            Expr::Command { command, .. } => quote(command, '`'),
        }
    }

    /// A whole program, one top‑level statement per line.
    pub fn print_program(statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(|stmt| Self::print_stmt(stmt, 0))
            .collect::<Vec<String>>()
            .join("\n")
    }

    /// One statement; nested blocks are indented from `depth`.
    pub fn print_stmt(stmt: &Stmt, depth: usize) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("{};", Self::print(expr)),

            Stmt::Print(expr) => format!("print {};", Self::print(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(expr) => format!("var {} = {};", name.lexeme, Self::print(expr)),
                None => format!("var {};", name.lexeme),
            },

            Stmt::Block(statements) => Self::print_block(statements, depth),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut text: String = format!(
                    "if {} {}",
                    Self::print(condition),
                    Self::print_branch(then_branch, depth)
                );

                if let Some(else_branch) = else_branch {
                    text.push_str(" else ");
                    text.push_str(&Self::print_branch(else_branch, depth));
                }

                text
            }

            Stmt::While { condition, body } => format!(
                "while {} {}",
                Self::print(condition),
                Self::print_branch(body, depth)
            ),

            Stmt::Try {
                try_branch,
                catch_name,
                catch_branch,
            } => {
                let name: String = catch_name
                    .as_ref()
                    .map_or_else(String::new, |t| format!("{} ", t.lexeme));

                format!(
                    "try {} catch {}{}",
                    Self::print_branch(try_branch, depth),
                    name,
                    Self::print_branch(catch_branch, depth)
                )
            }

            Stmt::Throw { value, .. } => format!("throw {};", Self::print(value)),

            Stmt::Return { value, .. } => match value {
                Some(expr) => format!("return {};", Self::print(expr)),
                None => "return;".into(),
            },

            Stmt::Break { .. } => "break;".into(),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let mut text: String = format!("class {}", name.lexeme);

                if let Some(superclass) = superclass {
                    text.push_str(" < ");
                    text.push_str(&Self::print(superclass));
                }

                text.push_str(" {\n");

                let pad: String = INDENT.repeat(depth + 1);
                for method in methods {
                    let params: Vec<&str> =
                        method.params.iter().map(|p| p.lexeme.as_str()).collect();
                    let method_name: &str = method.name.as_ref().map_or("", |t| t.lexeme.as_str());

                    let body: String = match method.body.as_slice() {
                        [single] => Self::print_stmt(single, depth + 1),
                        many => Self::print_block(many, depth + 1),
                    };

                    text.push_str(&format!(
                        "{}{}({}) {}\n",
                        pad,
                        method_name,
                        params.join(", "),
                        body
                    ));
                }

                text.push_str(&INDENT.repeat(depth));
                text.push('}');
                text
            }
        }
    }

    // ── helpers ─────────────────────────────────────────────────────────

    fn print_list(exprs: &[Expr]) -> String {
        exprs
            .iter()
            .map(Self::print)
            .collect::<Vec<String>>()
            .join(", ")
    }

    fn print_property(name: &PropertyName) -> String {
        match name {
            PropertyName::Ident(token) => format!(".{}", token.lexeme),
            PropertyName::Computed { expr, .. } => format!("[{}]", Self::print(expr)),
        }
    }

    fn print_block(statements: &[Stmt], depth: usize) -> String {
        if statements.is_empty() {
            return "{}".into();
        }

        let pad: String = INDENT.repeat(depth + 1);
        let mut text: String = String::from("{\n");

        for stmt in statements {
            text.push_str(&pad);
            text.push_str(&Self::print_stmt(stmt, depth + 1));
            text.push('\n');
        }

        text.push_str(&INDENT.repeat(depth));
        text.push('}');
        text
    }

    /// Bodies of `if`/`while`/`try` always print braced: conditions have no
    /// closing delimiter, so a bare body starting with `(`, `[` or `-` would
    /// re‑parse as part of the condition.
    fn print_branch(stmt: &Stmt, depth: usize) -> String {
        match stmt {
            Stmt::Block(statements) => Self::print_block(statements, depth),
            other => Self::print_block(std::slice::from_ref(other), depth),
        }
    }
}

/// Wrap `text` in `delimiter`, escaping the delimiter and backslashes the
/// way the scanner expects.
fn quote(text: &str, delimiter: char) -> String {
    let mut out: String = String::with_capacity(text.len() + 2);
    out.push(delimiter);

    for c in text.chars() {
        if c == delimiter || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }

    out.push(delimiter);
    out
}

fn object_key(key: &str) -> String {
    let mut chars = key.chars();

    let identifier: bool = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !is_keyword(key);

    if identifier {
        key.to_string()
    } else {
        quote(key, '"')
    }
}
