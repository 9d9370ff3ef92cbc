//! Signature policy expression language.
//!
//! ```text
//! policy    := gate
//! gate      := ("AND" | "OR") "(" arg ("," arg)* ")"
//!            | "OutOf" "(" number "," arg ("," arg)* ")"
//! arg       := principal | gate
//! principal := "'" MSPID "." role "'"
//! ```
//!
//! Gate keywords and roles are case-insensitive. Compilation runs in two
//! passes: the parser flattens every gate into a canonical `outof(k, ...)`
//! node, then the build pass walks that tree left to right, handing each
//! principal occurrence the next identity index.

use std::fmt;

use super::{MspRoleType, Principal};
use crate::error::{ConfigTxError, Result};
use crate::proto::common::{NOutOf, SignaturePolicy, SignaturePolicyEnvelope, signature_policy};

/// Deepest gate nesting accepted by `compile` and `render`.
pub const MAX_NESTING: usize = 64;

/// Compile a policy expression into a signature policy envelope.
///
/// Identical principals are not merged: `AND('A.peer','A.peer')` yields two
/// identities, and existing policies rely on that numbering.
pub fn compile(expression: &str) -> Result<SignaturePolicyEnvelope> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let canonical = parser.parse_policy()?;

    let mut ctx = BuildContext::default();
    let rule = ctx.build(&canonical)?;
    Ok(SignaturePolicyEnvelope {
        version: 0,
        rule: Some(rule),
        identities: ctx.identities.iter().map(Principal::to_proto).collect(),
    })
}

/// Render an envelope back into gate syntax.
///
/// `n == len(children)` renders as `AND`, `n == 1` as `OR`, anything else as
/// `OutOf(n, ...)`.
pub fn render(envelope: &SignaturePolicyEnvelope) -> Result<String> {
    let principals = envelope
        .identities
        .iter()
        .map(Principal::from_proto)
        .collect::<Result<Vec<_>>>()?;
    let rule = envelope
        .rule
        .as_ref()
        .ok_or_else(|| ConfigTxError::validation("signature policy envelope has no rule"))?;
    let mut out = String::new();
    render_rule(rule, &principals, 0, &mut out)?;
    Ok(out)
}

fn render_rule(
    rule: &SignaturePolicy,
    principals: &[Principal],
    depth: usize,
    out: &mut String,
) -> Result<()> {
    match &rule.r#type {
        Some(signature_policy::Type::SignedBy(index)) => {
            let principal = usize::try_from(*index)
                .ok()
                .and_then(|i| principals.get(i))
                .ok_or_else(|| {
                    ConfigTxError::validation(format!(
                        "identity index {index} out of range ({} identities)",
                        principals.len()
                    ))
                })?;
            out.push_str(&format!("'{principal}'"));
        }
        Some(signature_policy::Type::NOutOf(gate)) => {
            if depth >= MAX_NESTING {
                return Err(ConfigTxError::validation(format!(
                    "policy nesting exceeds {MAX_NESTING} levels"
                )));
            }
            let count = gate.rules.len();
            if usize::try_from(gate.n).is_ok_and(|n| n == count) {
                out.push_str("AND(");
            } else if gate.n == 1 {
                out.push_str("OR(");
            } else {
                out.push_str(&format!("OutOf({},", gate.n));
            }
            for (i, child) in gate.rules.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render_rule(child, principals, depth + 1, out)?;
            }
            out.push(')');
        }
        None => return Err(ConfigTxError::validation("signature policy has no type")),
    }
    Ok(())
}

// ─── Tokenizer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(i64),
    Literal(String),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{s}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Literal(s) => write!(f, "'{s}'"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' | '"' => {
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    literal.push(ch);
                }
                if !closed {
                    return Err(ConfigTxError::parse(format!(
                        "unterminated string starting at offset {start} in policy string"
                    )));
                }
                tokens.push(Token::Literal(literal));
            }
            c if c.is_ascii_digit() => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let digits = &input[start..end];
                let n = digits.parse::<i64>().map_err(|_| {
                    ConfigTxError::parse(format!("number '{digits}' out of range in policy string"))
                })?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_alphanumeric() || d == '_' || d == '.' || d == '-') {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Ident(input[start..end].to_string()));
            }
            other => {
                return Err(ConfigTxError::parse(format!(
                    "unrecognized token '{other}' in policy string"
                )));
            }
        }
    }
    Ok(tokens)
}

// ─── Parser (flattening pass) ────────────────────────────────────────────────

/// Canonical form: every gate is `outof(k, args...)`.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Principal(String),
    OutOf { k: i64, args: Vec<Node> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gate {
    And,
    Or,
    OutOf,
}

impl Gate {
    fn from_ident(ident: &str) -> Option<Gate> {
        match ident.to_ascii_lowercase().as_str() {
            "and" => Some(Gate::And),
            "or" => Some(Gate::Or),
            "outof" => Some(Gate::OutOf),
            _ => None,
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn parse_policy(&mut self) -> Result<Node> {
        let node = match self.peek() {
            Some(Token::Ident(_)) => self.parse_gate()?,
            Some(Token::Literal(p)) => {
                return Err(ConfigTxError::parse(format!(
                    "policy must be a gate expression, got principal '{p}'"
                )));
            }
            Some(tok) => {
                return Err(ConfigTxError::parse(format!(
                    "unrecognized token '{tok}' in policy string"
                )));
            }
            None => return Err(ConfigTxError::parse("empty policy string")),
        };
        if let Some(tok) = self.peek() {
            return Err(ConfigTxError::parse(format!(
                "unexpected token '{tok}' after end of policy"
            )));
        }
        Ok(node)
    }

    fn parse_arg(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Token::Literal(p)) => {
                let p = p.clone();
                self.pos += 1;
                Ok(Node::Principal(p))
            }
            Some(Token::Ident(_)) => self.parse_gate(),
            Some(tok) => Err(ConfigTxError::parse(format!(
                "unrecognized token '{tok}' in policy string"
            ))),
            None => Err(ConfigTxError::parse("unexpected end of policy string")),
        }
    }

    fn parse_gate(&mut self) -> Result<Node> {
        let ident = match self.next() {
            Some(Token::Ident(ident)) => ident,
            _ => return Err(ConfigTxError::parse("expected a gate")),
        };
        let gate = Gate::from_ident(&ident).ok_or_else(|| {
            ConfigTxError::parse(format!("unrecognized token '{ident}' in policy string"))
        })?;
        self.expect(Token::LParen, &ident)?;
        if self.depth >= MAX_NESTING {
            return Err(ConfigTxError::parse(format!(
                "policy nesting exceeds {MAX_NESTING} levels"
            )));
        }
        self.depth += 1;

        let k = if gate == Gate::OutOf {
            let k = match self.next() {
                Some(Token::Number(n)) => n,
                Some(tok) => {
                    return Err(ConfigTxError::parse(format!(
                        "{ident} expects a number as its first argument, got '{tok}'"
                    )));
                }
                None => return Err(ConfigTxError::parse("unexpected end of policy string")),
            };
            self.expect(Token::Comma, &ident)?;
            Some(k)
        } else {
            None
        };

        let mut args = vec![self.parse_arg()?];
        loop {
            match self.next() {
                Some(Token::Comma) => args.push(self.parse_arg()?),
                Some(Token::RParen) => break,
                Some(tok) => {
                    return Err(ConfigTxError::parse(format!(
                        "unexpected token '{tok}' in arguments of {ident}"
                    )));
                }
                None => {
                    return Err(ConfigTxError::parse(format!(
                        "missing ')' closing {ident}"
                    )));
                }
            }
        }

        let k = match gate {
            Gate::And => args.len() as i64,
            Gate::Or => 1,
            Gate::OutOf => k.unwrap_or_default(),
        };
        self.depth -= 1;
        Ok(Node::OutOf { k, args })
    }

    fn expect(&mut self, want: Token, gate: &str) -> Result<()> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(ConfigTxError::parse(format!(
                "expected '{want}' in {gate}, got '{tok}'"
            ))),
            None => Err(ConfigTxError::parse(format!(
                "expected '{want}' in {gate}, got end of policy string"
            ))),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }
}

// ─── Build pass ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct BuildContext {
    identities: Vec<Principal>,
}

impl BuildContext {
    fn build(&mut self, node: &Node) -> Result<SignaturePolicy> {
        match node {
            Node::Principal(text) => {
                let principal = parse_principal(text)?;
                let index = i32::try_from(self.identities.len())
                    .map_err(|_| ConfigTxError::parse("too many principals in policy"))?;
                self.identities.push(principal);
                Ok(signed_by(index))
            }
            Node::OutOf { k, args } => {
                let n = args.len() as i64;
                // k == n + 1 is accepted and can never be satisfied.
                if *k < 0 || *k > n + 1 {
                    return Err(ConfigTxError::parse(format!(
                        "invalid t-out-of-n predicate, t {k}, n {n}"
                    )));
                }
                let rules = args
                    .iter()
                    .map(|arg| self.build(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(n_out_of(*k as i32, rules))
            }
        }
    }
}

fn parse_principal(text: &str) -> Result<Principal> {
    let (msp_id, role) = text
        .rsplit_once('.')
        .ok_or_else(|| ConfigTxError::parse(format!("error parsing principal '{text}'")))?;
    let msp_id_ok = !msp_id.is_empty()
        && msp_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !msp_id_ok {
        return Err(ConfigTxError::parse(format!("error parsing principal '{text}'")));
    }
    let role = MspRoleType::from_role_name(role).ok_or_else(|| {
        ConfigTxError::parse(format!("error parsing role '{role}' in principal '{text}'"))
    })?;
    Ok(Principal {
        msp_id: msp_id.to_string(),
        role,
    })
}

pub fn signed_by(index: i32) -> SignaturePolicy {
    SignaturePolicy {
        r#type: Some(signature_policy::Type::SignedBy(index)),
    }
}

pub fn n_out_of(n: i32, rules: Vec<SignaturePolicy>) -> SignaturePolicy {
    SignaturePolicy {
        r#type: Some(signature_policy::Type::NOutOf(NOutOf { n, rules })),
    }
}
