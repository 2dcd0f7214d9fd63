//! Reader for Sphinx `conf.py` files.
//!
//! A `conf.py` is a Python script, but the settings a documentation build
//! needs are almost always plain literal assignments. This module evaluates
//! that literal subset without an interpreter: strings, numbers, booleans,
//! `None`, lists, tuples, dicts, names bound by earlier assignments, and `+`
//! on strings, lists and numbers. Anything else is skipped.
//!
//! Two non-literal idioms are recognized because a build depends on them:
//! `app.add_directive('<name>', ...)` inside `setup(app)`, and a literal
//! shell command passed to `subprocess.call`/`run` (optionally guarded by a
//! Read the Docs check), which becomes the Doxygen pre-build command.

use log::debug;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{BuildConfig, DoxygenWhen};
use crate::error::BuildError;

/// Settings extracted from a `conf.py`.
#[derive(Debug, Clone, Default)]
pub struct ConfPyConfig {
    pub path: PathBuf,
    pub values: Map<String, Value>,
    /// Names registered with `app.add_directive`.
    pub registered_directives: Vec<String>,
    /// Literal command passed to `subprocess`.
    pub doxygen_command: Option<String>,
    /// Whether that command only runs on Read the Docs.
    pub doxygen_on_readthedocs: bool,
    /// Assignments whose value was not a literal.
    pub skipped: Vec<String>,
}

impl ConfPyConfig {
    /// Raw value of an assignment
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Convert the assignments into a build configuration
    pub fn into_build_config(mut self) -> Result<BuildConfig, BuildError> {
        // Sphinx also accepts a {suffix: parser} mapping.
        if let Some(Value::Object(suffixes)) = self.values.get("source_suffix") {
            let keys = suffixes.keys().cloned().map(Value::String).collect();
            self.values
                .insert("source_suffix".to_string(), Value::Array(keys));
        }

        let mut config: BuildConfig = serde_json::from_value(Value::Object(self.values))
            .map_err(|e| BuildError::Config(format!("{}: {}", self.path.display(), e)))?;

        config.custom_directives = self.registered_directives;
        if let Some(command) = self.doxygen_command {
            config.doxygen_command = Some(command);
            config.doxygen_when = if self.doxygen_on_readthedocs {
                DoxygenWhen::ReadTheDocs
            } else {
                DoxygenWhen::Always
            };
        }

        Ok(config)
    }
}

#[derive(Debug, Default)]
pub struct PythonConfigParser;

impl PythonConfigParser {
    pub fn new() -> Self {
        Self
    }

    /// Read and parse a `conf.py`
    pub fn parse_file(&self, path: &Path) -> Result<ConfPyConfig, BuildError> {
        let source = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        self.parse_str(&source, path)
    }

    /// Parse `conf.py` source text
    pub fn parse_str(&self, source: &str, path: &Path) -> Result<ConfPyConfig, BuildError> {
        let lines = tokenize(source).map_err(|(line, message)| BuildError::ConfPy {
            path: path.to_path_buf(),
            line,
            message,
        })?;

        let mut conf = ConfPyConfig {
            path: path.to_path_buf(),
            ..Default::default()
        };
        let mut readthedocs_names: HashSet<String> = HashSet::new();
        let mut blocks: Vec<OpenBlock> = Vec::new();

        for line in &lines {
            while blocks.last().is_some_and(|b| line.indent <= b.indent) {
                blocks.pop();
            }

            let tokens = line.tokens.as_slice();
            let keyword = match tokens.first() {
                Some(Token::Name(name)) if COMPOUND_KEYWORDS.contains(&name.as_str()) => {
                    Some(name.as_str())
                }
                _ => None,
            };
            let condition_on_rtd = matches!(keyword, Some("if") | Some("elif"))
                && mentions_readthedocs(&tokens[1..], &readthedocs_names);
            let in_rtd = condition_on_rtd || blocks.iter().any(|b| b.readthedocs);

            scan_calls(tokens, in_rtd, &mut conf);

            if keyword.is_some() {
                if tokens.last() == Some(&Token::Op(":")) {
                    blocks.push(OpenBlock {
                        indent: line.indent,
                        readthedocs: condition_on_rtd,
                    });
                }
                continue;
            }

            if !blocks.is_empty() {
                continue;
            }

            match tokens {
                [Token::Name(name), Token::Op("="), rest @ ..] if !rest.is_empty() => {
                    match evaluate(rest, &conf.values) {
                        Some(value) => {
                            conf.values.insert(name.clone(), value);
                        }
                        None => {
                            debug!("{}:{}: skipping non-literal '{}'", path.display(), line.line, name);
                            if mentions_readthedocs(rest, &readthedocs_names) {
                                readthedocs_names.insert(name.clone());
                            }
                            conf.skipped.push(name.clone());
                        }
                    }
                }
                [Token::Name(name), Token::Op("+"), Token::Op("="), rest @ ..] => {
                    let appended = match (conf.values.get(name), evaluate(rest, &conf.values)) {
                        (Some(current), Some(value)) => add(current.clone(), value),
                        _ => None,
                    };
                    match appended {
                        Some(value) => {
                            conf.values.insert(name.clone(), value);
                        }
                        None => conf.skipped.push(name.clone()),
                    }
                }
                _ => {}
            }
        }

        Ok(conf)
    }
}

const COMPOUND_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "def", "class", "for", "while", "try", "except", "finally", "with",
];

struct OpenBlock {
    indent: usize,
    readthedocs: bool,
}

fn mentions_readthedocs(tokens: &[Token], names: &HashSet<String>) -> bool {
    tokens.iter().any(|token| match token {
        Token::Str(s) => s == "READTHEDOCS",
        Token::Name(n) => names.contains(n),
        _ => false,
    })
}

fn scan_calls(tokens: &[Token], in_rtd: bool, conf: &mut ConfPyConfig) {
    for window in tokens.windows(5) {
        if let [Token::Name(object), Token::Op("."), Token::Name(method), Token::Op("("), Token::Str(arg)] =
            window
        {
            match (object.as_str(), method.as_str()) {
                ("app", "add_directive") => conf.registered_directives.push(arg.clone()),
                ("subprocess", "call" | "run" | "check_call" | "check_output" | "Popen")
                | ("os", "system") => {
                    conf.doxygen_command = Some(arg.clone());
                    conf.doxygen_on_readthedocs = in_rtd;
                }
                _ => {}
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Str(String),
    Int(i64),
    Float(f64),
    Op(&'static str),
}

#[derive(Debug)]
struct LogicalLine {
    indent: usize,
    line: usize,
    tokens: Vec<Token>,
}

type LexError = (usize, String);

fn tokenize(source: &str) -> Result<Vec<LogicalLine>, LexError> {
    let chars: Vec<char> = source.chars().collect();
    let n = chars.len();
    let mut i = 0;
    let mut line = 1;
    let mut depth = 0usize;
    let mut lines = Vec::new();
    let mut current: Option<LogicalLine> = None;

    while i < n {
        if current.is_none() {
            let mut indent = 0;
            while i < n && (chars[i] == ' ' || chars[i] == '\t') {
                indent += if chars[i] == '\t' { 8 - indent % 8 } else { 1 };
                i += 1;
            }
            if i >= n {
                break;
            }
            match chars[i] {
                '\n' => {
                    line += 1;
                    i += 1;
                    continue;
                }
                '\r' => {
                    i += 1;
                    continue;
                }
                '#' => {
                    while i < n && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                _ => {
                    current = Some(LogicalLine {
                        indent,
                        line,
                        tokens: Vec::new(),
                    })
                }
            }
        }

        let c = chars[i];
        let token = match c {
            ' ' | '\t' | '\r' => {
                i += 1;
                continue;
            }
            '#' => {
                while i < n && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '\\' if i + 1 < n && chars[i + 1] == '\n' => {
                i += 2;
                line += 1;
                continue;
            }
            '\n' => {
                i += 1;
                line += 1;
                if depth == 0 {
                    if let Some(done) = current.take() {
                        lines.push(done);
                    }
                }
                continue;
            }
            '\'' | '"' => Token::Str(lex_string(&chars, &mut i, &mut line, false)?),
            c if c.is_ascii_digit() || (c == '.' && i + 1 < n && chars[i + 1].is_ascii_digit()) => {
                lex_number(&chars, &mut i, line)?
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < n && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let lower = word.to_ascii_lowercase();
                let is_prefix = matches!(lower.as_str(), "r" | "u" | "b" | "f" | "rb" | "br" | "fr" | "rf");
                if is_prefix && i < n && (chars[i] == '\'' || chars[i] == '"') {
                    Token::Str(lex_string(&chars, &mut i, &mut line, lower.contains('r'))?)
                } else {
                    Token::Name(word)
                }
            }
            _ => {
                let next = chars.get(i + 1).copied();
                let (op, width): (&'static str, usize) = match (c, next) {
                    ('=', Some('=')) => ("==", 2),
                    ('!', Some('=')) => ("!=", 2),
                    ('<', Some('=')) => ("<=", 2),
                    ('>', Some('=')) => (">=", 2),
                    ('*', Some('*')) => ("**", 2),
                    ('(', _) => ("(", 1),
                    (')', _) => (")", 1),
                    ('[', _) => ("[", 1),
                    (']', _) => ("]", 1),
                    ('{', _) => ("{", 1),
                    ('}', _) => ("}", 1),
                    ('=', _) => ("=", 1),
                    ('<', _) => ("<", 1),
                    ('>', _) => (">", 1),
                    ('+', _) => ("+", 1),
                    ('-', _) => ("-", 1),
                    ('*', _) => ("*", 1),
                    ('/', _) => ("/", 1),
                    ('%', _) => ("%", 1),
                    (',', _) => (",", 1),
                    (':', _) => (":", 1),
                    (';', _) => (";", 1),
                    ('.', _) => (".", 1),
                    ('@', _) => ("@", 1),
                    ('|', _) => ("|", 1),
                    ('&', _) => ("&", 1),
                    ('^', _) => ("^", 1),
                    ('~', _) => ("~", 1),
                    _ => return Err((line, format!("unexpected character '{}'", c))),
                };
                match op {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
                i += width;
                Token::Op(op)
            }
        };

        if let Some(current) = current.as_mut() {
            current.tokens.push(token);
        }
    }

    if depth > 0 {
        return Err((line, "unexpected end of file inside brackets".to_string()));
    }
    if let Some(done) = current.take() {
        lines.push(done);
    }
    Ok(lines)
}

fn lex_string(chars: &[char], i: &mut usize, line: &mut usize, raw: bool) -> Result<String, LexError> {
    let n = chars.len();
    let quote = chars[*i];
    let start_line = *line;
    let triple = *i + 2 < n && chars[*i + 1] == quote && chars[*i + 2] == quote;
    *i += if triple { 3 } else { 1 };

    let mut out = String::new();
    loop {
        if *i >= n {
            return Err((start_line, "unterminated string literal".to_string()));
        }
        let c = chars[*i];
        if c == quote {
            if !triple {
                *i += 1;
                return Ok(out);
            }
            if *i + 2 < n && chars[*i + 1] == quote && chars[*i + 2] == quote {
                *i += 3;
                return Ok(out);
            }
        }
        if c == '\n' {
            if !triple {
                return Err((start_line, "unterminated string literal".to_string()));
            }
            *line += 1;
        }
        if c == '\\' && *i + 1 < n {
            let escaped = chars[*i + 1];
            *i += 2;
            if raw {
                out.push('\\');
                out.push(escaped);
                continue;
            }
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                '\n' => *line += 1,
                'x' | 'u' => {
                    let width = if escaped == 'x' { 2 } else { 4 };
                    let digits: String = chars.iter().skip(*i).take(width).collect();
                    match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                        Some(ch) if digits.len() == width => {
                            out.push(ch);
                            *i += width;
                        }
                        _ => return Err((*line, format!("invalid \\{} escape", escaped))),
                    }
                }
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
            continue;
        }
        out.push(c);
        *i += 1;
    }
}

fn lex_number(chars: &[char], i: &mut usize, line: usize) -> Result<Token, LexError> {
    let n = chars.len();
    let start = *i;

    if chars[*i] == '0' && *i + 1 < n && matches!(chars[*i + 1], 'x' | 'X') {
        *i += 2;
        let digits_start = *i;
        while *i < n && (chars[*i].is_ascii_hexdigit() || chars[*i] == '_') {
            *i += 1;
        }
        let digits: String = chars[digits_start..*i].iter().filter(|c| **c != '_').collect();
        return i64::from_str_radix(&digits, 16)
            .map(Token::Int)
            .map_err(|e| (line, e.to_string()));
    }

    let mut is_float = false;
    while *i < n {
        let c = chars[*i];
        if c.is_ascii_digit() || c == '_' {
            *i += 1;
        } else if c == '.' && !is_float {
            is_float = true;
            *i += 1;
        } else if matches!(c, 'e' | 'E') {
            is_float = true;
            *i += 1;
            if *i < n && matches!(chars[*i], '+' | '-') {
                *i += 1;
            }
        } else {
            break;
        }
    }

    let text: String = chars[start..*i].iter().filter(|c| **c != '_').collect();
    if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|e| (line, e.to_string()))
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|e| (line, e.to_string()))
    }
}

/// Evaluate a literal expression. `None` means the expression is not a
/// literal (or not one this reader understands).
fn evaluate(tokens: &[Token], env: &Map<String, Value>) -> Option<Value> {
    let mut evaluator = Evaluator {
        tokens,
        pos: 0,
        env,
    };
    let value = evaluator.expression()?;
    if evaluator.pos == tokens.len() {
        Some(value)
    } else {
        None
    }
}

struct Evaluator<'a> {
    tokens: &'a [Token],
    pos: usize,
    env: &'a Map<String, Value>,
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expression(&mut self) -> Option<Value> {
        let mut value = self.unary()?;
        while self.eat("+") {
            let rhs = self.unary()?;
            value = add(value, rhs)?;
        }
        Some(value)
    }

    fn unary(&mut self) -> Option<Value> {
        if self.eat("-") {
            return match self.unary()? {
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Some(Value::from(-i))
                    } else {
                        n.as_f64().map(|f| Value::from(-f))
                    }
                }
                _ => None,
            };
        }
        self.atom()
    }

    fn atom(&mut self) -> Option<Value> {
        let token = self.peek()?.clone();
        self.pos += 1;
        match token {
            Token::Str(mut s) => {
                // Adjacent literals concatenate.
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Some(Value::String(s))
            }
            Token::Int(i) => Some(Value::from(i)),
            Token::Float(f) => Some(Value::from(f)),
            Token::Name(name) => match name.as_str() {
                "True" => Some(Value::Bool(true)),
                "False" => Some(Value::Bool(false)),
                "None" => Some(Value::Null),
                _ => self.env.get(&name).cloned(),
            },
            Token::Op("[") => self.sequence("]"),
            Token::Op("(") => {
                if self.eat(")") {
                    return Some(Value::Array(Vec::new()));
                }
                let first = self.expression()?;
                if self.eat(")") {
                    return Some(first);
                }
                if !self.eat(",") {
                    return None;
                }
                let mut items = vec![first];
                if let Some(Value::Array(rest)) = self.sequence(")") {
                    items.extend(rest);
                    Some(Value::Array(items))
                } else {
                    None
                }
            }
            Token::Op("{") => self.dict(),
            _ => None,
        }
    }

    fn sequence(&mut self, close: &str) -> Option<Value> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Some(Value::Array(items));
            }
            items.push(self.expression()?);
            if !self.eat(",") {
                return if self.eat(close) {
                    Some(Value::Array(items))
                } else {
                    None
                };
            }
        }
    }

    fn dict(&mut self) -> Option<Value> {
        let mut map = Map::new();
        loop {
            if self.eat("}") {
                return Some(Value::Object(map));
            }
            let key = match self.expression()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            if !self.eat(":") {
                return None;
            }
            let value = self.expression()?;
            map.insert(key, value);
            if !self.eat(",") {
                return if self.eat("}") {
                    Some(Value::Object(map))
                } else {
                    None
                };
            }
        }
    }
}

fn add(lhs: Value, rhs: Value) -> Option<Value> {
    match (lhs, rhs) {
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Some(Value::String(a))
        }
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Some(Value::Array(a))
        }
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x.checked_add(y).map(Value::from),
            _ => Some(Value::from(a.as_f64()? + b.as_f64()?)),
        },
        _ => None,
    }
}
