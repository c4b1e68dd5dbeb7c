//! Hand-assembled contracts and a toy compiler front end.
#![allow(dead_code)]

use std::cell::Cell;

use alloy_dyn_abi::DynSolType;
use alloy_primitives::{keccak256, Bytes, U256};
use alloy_sol_types::{Revert, SolError};
use revm::interpreter::opcode::*;
use splice_backend::{
    artifact::{
        assembly::Assembly, Artifact, FunctionSignature, SourcePos, SyntaxNode, SyntaxTree,
    },
    fragment::namespace::{NamespaceSnapshot, Symbol},
    frontend::{
        Frontend, FrontendError, SelectorCheck, Snippet, SnippetKind, ValidatedFunction,
    },
};

pub fn selector(signature: &str) -> U256 {
    U256::from_be_slice(&keccak256(signature)[..4])
}

/// An assembly under construction, with its revert messages collected at the end.
pub struct Program {
    pub asm: Assembly,
    prefix: String,
    messages: Vec<(String, Vec<u8>)>,
}

impl Program {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { asm: Assembly::new(), prefix: prefix.into(), messages: Vec::new() }
    }

    /// `PUSH2` with a fixed-width immediate.
    pub fn push2(&mut self, value: usize) -> &mut Self {
        self.asm.op(PUSH2).data(vec![(value >> 8) as u8, value as u8]);
        self
    }

    /// Selector dispatch: jumps to the label of the matching function, with the selector left on
    /// the stack. Reverts on no match.
    pub fn dispatch(&mut self, functions: &[(&str, &str)]) -> &mut Self {
        self.asm.push(0u64).op(CALLDATALOAD).push(0xe0u64).op(SHR);
        for (signature, label) in functions {
            self.asm.op(DUP1).push(selector(signature)).op(EQ).push_label(*label).op(JUMPI);
        }
        self.asm.push(0u64).push(0u64).op(REVERT);
        self
    }

    /// Returns the word on top of the stack.
    pub fn return_word(&mut self) -> &mut Self {
        self.asm.push(0u64).op(MSTORE).push(32u64).push(0u64).op(RETURN);
        self
    }

    /// Reverts with `Error(reason)`, attributed to `pos` and tagged with `error`.
    pub fn revert(&mut self, reason: &str, pos: SourcePos, error: &str) -> &mut Self {
        let payload = Revert { reason: reason.to_string() }.abi_encode();
        let label = format!("{}_msg_{}", self.prefix, self.messages.len());
        let len = payload.len() as u64;

        self.asm.push(len).at(pos).push_label(label.as_str()).at(pos);
        // Data starts right after the JUMPDEST of its label.
        self.asm.push(1u64).at(pos).op(ADD).at(pos).push(0u64).at(pos).op(CODECOPY).at(pos);
        self.asm.push(len).at(pos).push(0u64).at(pos).op(REVERT).at(pos).with_error(error);

        self.messages.push((label, payload));
        self
    }

    pub fn finish(mut self) -> Assembly {
        for (label, payload) in self.messages {
            self.asm.label(label).data(payload);
        }
        self.asm
    }
}

/// Init code returning `runtime ++ data`. `ctor` runs first and receives the init code length,
/// which is where constructor arguments start.
pub fn initcode(runtime: &[u8], data: &[u8], ctor: impl Fn(&mut Program, usize)) -> Bytes {
    let total = runtime.len() + data.len();
    let assemble = |ctor_len: usize| {
        let mut program = Program::new("ctor");
        ctor(&mut program, ctor_len + total);
        program.push2(total).push2(ctor_len);
        program.asm.push(0u64).op(CODECOPY);
        program.push2(total);
        program.asm.push(0u64).op(RETURN);

        let mut asm = program.finish();
        asm.data(runtime.to_vec()).data(data.to_vec());
        asm.assemble().unwrap().0
    };

    let ctor_len = assemble(0).len() - total;
    assemble(ctor_len)
}

fn artifact(name: &str, source: &str, nodes: Vec<SyntaxNode>, runtime: Assembly) -> Artifact {
    let (runtime_bytecode, _) = runtime.assemble().unwrap();
    let mut artifact = Artifact::new(name, Bytes::new(), runtime_bytecode);
    artifact.runtime_assembly = Some(runtime.clone());
    artifact.unoptimized_assembly = Some(runtime);
    artifact.syntax_tree = SyntaxTree::new(source, nodes);
    artifact
}

fn node(kind: &str, pos: SourcePos, function: &str) -> SyntaxNode {
    SyntaxNode { kind: kind.to_string(), pos, function: Some(function.to_string()) }
}

pub const FOO_SOURCE: &str = r#"bar: public(uint256)
LIMIT: immutable(uint256)

@deploy
def __init__(x: uint256):
    self.bar = x
    LIMIT = 10

@external
def answer() -> uint256:
    return 42

@external
def add(a: uint256, b: uint256 = 1) -> uint256:
    return a + b

@external
def check(x: uint256):
    assert x <= 10, "too big"

@external
def limit() -> uint256:
    return LIMIT
"#;

pub const BAR_POS: SourcePos = SourcePos::new(1, 0, 20);
pub const ANSWER_POS: SourcePos = SourcePos::new(11, 4, 13);
pub const ADD_POS: SourcePos = SourcePos::new(15, 4, 16);
pub const CHECK_POS: SourcePos = SourcePos::new(19, 4, 29);
pub const LIMIT_POS: SourcePos = SourcePos::new(23, 4, 16);

/// Constructor arguments above this make the constructor revert.
pub const FOO_MAX_INIT: u64 = 1000;
pub const FOO_LIMIT: u64 = 10;

/// `Foo(x)`: stores `x` in `bar`, carries the immutable `LIMIT` in its data section.
pub fn foo_artifact() -> Artifact {
    let mut p = Program::new("foo");
    p.dispatch(&[
        ("answer()", "answer"),
        ("bar()", "bar"),
        ("add(uint256)", "add1"),
        ("add(uint256,uint256)", "add2"),
        ("check(uint256)", "check"),
        ("limit()", "limit"),
    ]);

    p.asm.label("answer").op(POP).push(42u64).at(ANSWER_POS);
    p.return_word();

    p.asm.label("bar").op(POP).push(0u64).op(SLOAD).at(BAR_POS);
    p.return_word();

    p.asm.label("add1").op(POP).push(1u64).push(4u64).op(CALLDATALOAD).op(ADD).at(ADD_POS);
    p.return_word();

    p.asm.label("add2").op(POP).push(36u64).op(CALLDATALOAD).push(4u64).op(CALLDATALOAD);
    p.asm.op(ADD).at(ADD_POS);
    p.return_word();

    // x lives at 0x100 for the whole function.
    p.asm.label("check").op(POP).push(4u64).op(CALLDATALOAD).push(0x100u64).op(MSTORE);
    p.asm.push(FOO_LIMIT).push(0x100u64).op(MLOAD).op(GT).at(CHECK_POS);
    p.asm.push_label("check_fail").op(JUMPI).op(STOP);
    p.asm.label("check_fail");
    p.revert("too big", CHECK_POS, "user assert");

    p.asm.label("limit").op(POP).push(32u64).push(32u64).op(CODESIZE).op(SUB);
    p.asm.push(0u64).op(CODECOPY).push(0u64).op(MLOAD).at(LIMIT_POS);
    p.return_word();

    let nodes = vec![
        node("VariableDecl", BAR_POS, "bar"),
        node("Return", ANSWER_POS, "answer"),
        node("Return", ADD_POS, "add"),
        node("Assert", CHECK_POS, "check"),
        node("Return", LIMIT_POS, "limit"),
    ];
    let mut artifact = artifact("Foo", FOO_SOURCE, nodes, p.finish());

    let data = U256::from(FOO_LIMIT).to_be_bytes::<32>();
    artifact.data_section_len = data.len();
    artifact.bytecode = initcode(&artifact.runtime_bytecode, &data, |p, args_offset| {
        // mem[0..32] = x
        p.asm.push(32u64);
        p.push2(args_offset);
        p.asm.push(0u64).op(CODECOPY);

        p.asm.push(FOO_MAX_INIT).push(0u64).op(MLOAD).op(GT).op(ISZERO);
        p.asm.push_label("ctor_ok").op(JUMPI);
        p.revert("bad init", SourcePos::new(5, 0, 25), "user assert");
        p.asm.label("ctor_ok").push(0u64).op(MLOAD).push(0u64).op(SSTORE);
    });

    artifact.constructor = Some(FunctionSignature::new("__init__").input("x", "uint256"));
    artifact.functions = vec![
        FunctionSignature::new("answer").returns("uint256"),
        FunctionSignature::new("bar").returns("uint256"),
        FunctionSignature::new("add").input("a", "uint256").default_input("b", "uint256").returns("uint256"),
        FunctionSignature::new("check").input("x", "uint256").local("x", "uint256", 0x100),
        FunctionSignature::new("limit").returns("uint256"),
    ];
    artifact
}

pub const B_SOURCE: &str = "@external\ndef fail():\n    raise \"boom\"\n";
pub const FAIL_POS: SourcePos = SourcePos::new(3, 4, 16);
/// Value of the memory local `attempts` when `B.fail()` reverts.
pub const B_ATTEMPTS: u64 = 7;

/// `B.fail()` always reverts with `boom`.
pub fn b_artifact() -> Artifact {
    let mut p = Program::new("b");
    p.dispatch(&[("fail()", "fail")]);
    p.asm.label("fail").op(POP).push(B_ATTEMPTS).push(0x100u64).op(MSTORE);
    p.revert("boom", FAIL_POS, "user raise");

    let mut artifact = artifact("B", B_SOURCE, vec![node("Raise", FAIL_POS, "fail")], p.finish());
    artifact.bytecode = initcode(&artifact.runtime_bytecode, &[], |_, _| {});
    artifact.functions = vec![FunctionSignature::new("fail").local("attempts", "uint256", 0x100)];
    artifact
}

pub const A_SOURCE: &str = "@external\ndef poke(target: address):\n    extcall B(target).fail()\n";
pub const POKE_POS: SourcePos = SourcePos::new(3, 4, 28);

/// `A.poke(target)` calls `target.fail()` and reverts if it failed.
pub fn a_artifact() -> Artifact {
    let mut p = Program::new("a");
    p.dispatch(&[("poke(address)", "poke")]);
    p.asm.label("poke").op(POP);
    p.asm.push(selector("fail()")).push(0xe0u64).op(SHL).push(0u64).op(MSTORE);
    p.asm.push(0u64).push(0u64).push(4u64).push(0u64).push(0u64);
    p.asm.push(4u64).op(CALLDATALOAD).op(GAS).op(CALL).at(POKE_POS);
    p.asm.push_label("poke_ok").op(JUMPI);
    p.asm.push(0u64).push(0u64).op(REVERT).at(POKE_POS).with_error("external call failed");
    p.asm.label("poke_ok").op(STOP);

    let mut artifact = artifact("A", A_SOURCE, vec![node("ExtCall", POKE_POS, "poke")], p.finish());
    artifact.bytecode = initcode(&artifact.runtime_bytecode, &[], |_, _| {});
    artifact.functions = vec![FunctionSignature::new("poke").input("target", "address")];
    artifact
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Lit(U256),
    Member(String),
    /// `self.f()`: a jump into the contract's own code for `f`.
    Call(String),
    Tuple(Vec<Expr>),
    Name(String),
    CodeSize,
    Log(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
enum Stmt {
    Return(Expr),
    Expr(Expr),
    Assign(String, Expr),
    Raise(String),
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Num(U256),
    Ident(String),
    Dot,
    Comma,
    Plus,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, FrontendError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' => {
                chars.next();
            }
            '.' | ',' | '+' | '(' | ')' => {
                chars.next();
                tokens.push(match c {
                    '.' => Token::Dot,
                    ',' => Token::Comma,
                    '+' => Token::Plus,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(d) = chars.next_if(char::is_ascii_digit) {
                    digits.push(d);
                }
                let value = digits.parse().map_err(|_| FrontendError::Syntax(digits.clone()))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(d) = chars.next_if(|d| d.is_ascii_alphanumeric() || *d == '_') {
                    ident.push(d);
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(FrontendError::Syntax(format!("unexpected `{other}`"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse(source: &str) -> Result<Expr, FrontendError> {
        let mut parser = Self { tokens: tokenize(source)?, pos: 0 };
        let expr = parser.expr()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(expr),
            Some(token) => Err(FrontendError::Syntax(format!("trailing {token:?}"))),
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), FrontendError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(FrontendError::Syntax(format!("expected {expected:?}, found {other:?}"))),
        }
    }

    fn expr(&mut self) -> Result<Expr, FrontendError> {
        let mut lhs = self.term()?;
        while self.tokens.get(self.pos) == Some(&Token::Plus) {
            self.pos += 1;
            lhs = Expr::Add(Box::new(lhs), Box::new(self.term()?));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, FrontendError> {
        match self.next() {
            Some(Token::Num(value)) => Ok(Expr::Lit(value)),
            Some(Token::Ident(ident)) if ident == "self" => {
                self.expect(Token::Dot)?;
                let member = match self.next() {
                    Some(Token::Ident(member)) => member,
                    other => return Err(FrontendError::Syntax(format!("bad member {other:?}"))),
                };
                if self.tokens.get(self.pos) != Some(&Token::LParen) {
                    return Ok(Expr::Member(member));
                }
                self.pos += 1;
                self.expect(Token::RParen)?;
                Ok(Expr::Call(member))
            }
            Some(Token::LParen) => {
                let mut items = vec![self.expr()?];
                while self.tokens.get(self.pos) == Some(&Token::Comma) {
                    self.pos += 1;
                    items.push(self.expr()?);
                }
                self.expect(Token::RParen)?;
                Ok(if items.len() == 1 { items.remove(0) } else { Expr::Tuple(items) })
            }
            Some(Token::Ident(ident)) if self.tokens.get(self.pos) == Some(&Token::LParen) => {
                self.pos += 1;
                let expr = match ident.as_str() {
                    "codesize" => Expr::CodeSize,
                    "log" => Expr::Log(Box::new(self.expr()?)),
                    _ => return Err(FrontendError::UnknownName(ident)),
                };
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(ident)) => Ok(Expr::Name(ident)),
            other => Err(FrontendError::Syntax(format!("unexpected {other:?}"))),
        }
    }
}

fn parse_stmt(source: &str) -> Result<Stmt, FrontendError> {
    let source = source.trim();
    if let Some(message) = source.strip_prefix("raise ") {
        let message = message.trim().trim_matches('"');
        return Ok(Stmt::Raise(message.to_string()));
    }
    if let Some(value) = source.strip_prefix("return ") {
        return Ok(Stmt::Return(Parser::parse(value)?));
    }
    if let Some((target, value)) = source.split_once(" = ") {
        return match Parser::parse(target)? {
            Expr::Member(name) => Ok(Stmt::Assign(name, Parser::parse(value)?)),
            other => Err(FrontendError::Syntax(format!("cannot assign to {other:?}"))),
        };
    }
    Ok(Stmt::Expr(Parser::parse(source)?))
}

/// A wrapper function, taken apart again.
struct Wrapper {
    name: String,
    return_type: Option<DynSolType>,
    body: String,
}

fn parse_wrapper(source: &str) -> Result<Wrapper, FrontendError> {
    let mut lines = source.lines();
    let syntax = |what: &str| FrontendError::Syntax(format!("malformed wrapper: {what}"));

    if lines.next() != Some("@external") {
        return Err(syntax("decorator"));
    }
    let header = lines.next().and_then(|h| h.strip_prefix("def ")).ok_or_else(|| syntax("header"))?;
    let header = header.strip_suffix(':').ok_or_else(|| syntax("header"))?;
    let (name, return_type) = match header.split_once(" -> ") {
        Some((name, ty)) => {
            let ty = DynSolType::parse(ty).map_err(|_| syntax("return type"))?;
            (name, Some(ty))
        }
        None => (header, None),
    };
    let name = name.strip_suffix("()").ok_or_else(|| syntax("parameters"))?;
    let body = lines.map(str::trim).collect::<Vec<_>>().join("\n");

    Ok(Wrapper { name: name.to_string(), return_type, body })
}

/// Compiles a toy language: unsigned literals, `+`, `self.<storage>`, `self.<getter>()`, tuples of
/// words, immutables, constants, `codesize()`, `log(x)`, `self.<storage> = x` and
/// `raise "reason"`.
#[derive(Debug, Default)]
pub struct ToyFrontend {
    storage: Vec<(String, u64)>,
    immutables: Vec<(String, usize)>,
    constants: Vec<(String, u64)>,

    data_section_len: Cell<usize>,
    pub analyses: Cell<usize>,
    pub generations: Cell<usize>,
}

impl ToyFrontend {
    /// The front end of [`foo_artifact`].
    pub fn foo() -> Self {
        Self {
            storage: vec![("bar".to_string(), 0)],
            immutables: vec![("LIMIT".to_string(), 0)],
            constants: vec![("MAX_INIT".to_string(), FOO_MAX_INIT)],
            ..Default::default()
        }
    }

    fn type_of(&self, expr: &Expr, ns: &NamespaceSnapshot) -> Result<DynSolType, FrontendError> {
        match expr {
            Expr::Lit(_) | Expr::CodeSize => Ok(DynSolType::Uint(256)),
            Expr::Member(name) => match ns.lookup_member(name) {
                Some(Symbol::Storage(var)) => Ok(var.ty.clone()),
                Some(Symbol::Function(_)) => {
                    Err(FrontendError::Codegen(format!("`self.{name}` is not called")))
                }
                _ => Err(FrontendError::UnknownName(format!("self.{name}"))),
            },
            Expr::Call(name) => match ns.function(name) {
                Some(function) => match &function.output {
                    Some(ty) => {
                        DynSolType::parse(ty).map_err(|err| FrontendError::Codegen(err.to_string()))
                    }
                    None => Err(FrontendError::NotTypeable(format!("{name}() returns nothing"))),
                },
                None => Err(FrontendError::UnknownName(format!("self.{name}()"))),
            },
            Expr::Tuple(items) => {
                let types =
                    items.iter().map(|item| self.type_of(item, ns)).collect::<Result<Vec<_>, _>>()?;
                if types.iter().any(|ty| *ty != DynSolType::Uint(256)) {
                    return Err(FrontendError::Codegen("tuples hold words only".to_string()));
                }
                Ok(DynSolType::Tuple(types))
            }
            Expr::Name(name) => match ns.lookup(name) {
                Some(Symbol::Constant(var)) => Ok(var.ty.clone()),
                Some(Symbol::Immutable(var)) => Ok(var.ty.clone()),
                _ => Err(FrontendError::UnknownName(name.clone())),
            },
            Expr::Log(inner) => {
                self.type_of(inner, ns)?;
                Err(FrontendError::NotTypeable("log() returns nothing".to_string()))
            }
            Expr::Add(lhs, rhs) => {
                let (lhs, rhs) = (self.type_of(lhs, ns)?, self.type_of(rhs, ns)?);
                if lhs != rhs || lhs != DynSolType::Uint(256) {
                    return Err(FrontendError::TypeMismatch {
                        expected: lhs.sol_type_name().into_owned(),
                        found: rhs.sol_type_name().into_owned(),
                    });
                }
                Ok(lhs)
            }
        }
    }

    /// Checks a statement, returning the type of its value if it returns one.
    fn check_stmt(&self, stmt: &Stmt, ns: &NamespaceSnapshot) -> Result<Option<DynSolType>, FrontendError> {
        match stmt {
            Stmt::Return(expr) => self.type_of(expr, ns).map(Some),
            Stmt::Expr(expr) => match self.type_of(expr, ns) {
                Ok(_) | Err(FrontendError::NotTypeable(_)) => Ok(None),
                Err(err) => Err(err),
            },
            Stmt::Assign(name, expr) => {
                let Some(Symbol::Storage(var)) = ns.lookup_member(name) else {
                    return Err(FrontendError::UnknownName(format!("self.{name}")));
                };
                let ty = self.type_of(expr, ns)?;
                if ty != var.ty {
                    return Err(FrontendError::TypeMismatch {
                        expected: var.ty.sol_type_name().into_owned(),
                        found: ty.sol_type_name().into_owned(),
                    });
                }
                Ok(None)
            }
            Stmt::Raise(_) => Ok(None),
        }
    }

    fn gen_expr(&self, p: &mut Program, expr: &Expr, ns: &NamespaceSnapshot, pos: SourcePos) {
        match expr {
            Expr::Lit(value) => {
                p.asm.push(*value).at(pos);
            }
            Expr::Member(name) => {
                let slot = ns.storage(name).map(|var| var.slot).unwrap_or_default();
                p.asm.push(slot).op(SLOAD).at(pos);
            }
            Expr::Name(name) => match ns.lookup(name) {
                Some(Symbol::Immutable(var)) => {
                    let from_end = self.data_section_len.get() - var.offset;
                    p.asm.push(32u64).push(from_end as u64).op(CODESIZE).op(SUB);
                    p.asm.push(0u64).op(CODECOPY).push(0u64).op(MLOAD).at(pos);
                }
                Some(Symbol::Constant(var)) => {
                    let value = var.value.as_uint().map(|(value, _)| value).unwrap_or_default();
                    p.asm.push(value).at(pos);
                }
                _ => {}
            },
            Expr::Call(name) => {
                // The getter pops a selector and returns from the frame itself.
                p.asm.push(0u64).push_label(name.as_str()).op(JUMP).at(pos);
            }
            Expr::Tuple(items) => {
                for item in items {
                    self.gen_expr(p, item, ns, pos);
                    p.asm.op(POP);
                }
            }
            Expr::CodeSize => {
                p.asm.op(CODESIZE).at(pos);
            }
            Expr::Log(inner) => {
                self.gen_expr(p, inner, ns, pos);
                p.asm.push(0u64).op(MSTORE).push(32u64).push(0u64).op(LOG0).at(pos);
            }
            Expr::Add(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
                (Expr::Lit(a), Expr::Lit(b)) => {
                    p.asm.push(a.wrapping_add(*b)).at(pos);
                }
                _ => {
                    self.gen_expr(p, lhs, ns, pos);
                    self.gen_expr(p, rhs, ns, pos);
                    p.asm.op(ADD).at(pos);
                }
            },
        }
    }
}

impl Frontend for ToyFrontend {
    fn analyze_module(&self, artifact: &Artifact) -> Result<NamespaceSnapshot, FrontendError> {
        self.analyses.set(self.analyses.get() + 1);
        self.data_section_len.set(artifact.data_section_len);

        let uint = DynSolType::Uint(256);
        let mut builder = NamespaceSnapshot::builder(artifact.name.as_str()).builtin("codesize").builtin("log");
        for (name, slot) in &self.storage {
            builder = builder.storage(name.as_str(), uint.clone(), U256::from(*slot));
        }
        for (name, offset) in &self.immutables {
            builder = builder.immutable(name.as_str(), uint.clone(), *offset);
        }
        for (name, value) in &self.constants {
            let value = alloy_dyn_abi::DynSolValue::Uint(U256::from(*value), 256);
            builder = builder.constant(name.as_str(), uint.clone(), value);
        }
        for function in &artifact.functions {
            builder = builder.function(function.clone());
        }
        Ok(builder.build())
    }

    fn parse_snippet(&self, source: &str) -> Result<Snippet, FrontendError> {
        let kind = match parse_stmt(source)? {
            Stmt::Expr(_) => SnippetKind::Expression,
            Stmt::Return(_) => return Err(FrontendError::Syntax("return outside function".into())),
            Stmt::Assign(..) | Stmt::Raise(_) => SnippetKind::Statement,
        };
        Ok(Snippet { source: source.trim().to_string(), kind })
    }

    fn infer_type(&self, snippet: &Snippet, ns: &NamespaceSnapshot) -> Result<DynSolType, FrontendError> {
        self.type_of(&Parser::parse(&snippet.source)?, ns)
    }

    fn validate_function(&self, source: &str, ns: &NamespaceSnapshot) -> Result<ValidatedFunction, FrontendError> {
        let wrapper = parse_wrapper(source)?;
        let stmt = parse_stmt(&wrapper.body)?;
        let body_type = self.check_stmt(&stmt, ns)?;
        if body_type != wrapper.return_type {
            return Err(FrontendError::TypeMismatch {
                expected: format!("{:?}", wrapper.return_type),
                found: format!("{body_type:?}"),
            });
        }
        Ok(ValidatedFunction { name: wrapper.name, source: source.to_string(), return_type: body_type })
    }

    fn generate_function(
        &self,
        function: &ValidatedFunction,
        ns: &NamespaceSnapshot,
        selector_check: SelectorCheck,
    ) -> Result<Assembly, FrontendError> {
        self.generations.set(self.generations.get() + 1);

        let wrapper = parse_wrapper(&function.source)?;
        let stmt = parse_stmt(&wrapper.body)?;
        // The body is the third line of the wrapper, indented by four.
        let pos = SourcePos::new(3, 4, 4 + wrapper.body.len() as u32);

        let mut p = Program::new(function.name.as_str());
        if selector_check == SelectorCheck::Dispatch {
            let body = format!("{}_body", function.name);
            p.asm.push(0u64).op(CALLDATALOAD).push(0xe0u64).op(SHR);
            p.asm.push(selector(&format!("{}()", function.name))).op(EQ);
            p.asm.push_label(body.as_str()).op(JUMPI).push(0u64).push(0u64).op(REVERT);
            p.asm.label(body);
        }

        match &stmt {
            Stmt::Return(Expr::Tuple(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.gen_expr(&mut p, item, ns, pos);
                    p.asm.push(32 * i).op(MSTORE);
                }
                p.asm.push(32 * items.len()).push(0u64).op(RETURN).at(pos);
            }
            Stmt::Return(expr) => {
                self.gen_expr(&mut p, expr, ns, pos);
                p.return_word();
            }
            Stmt::Expr(expr) => {
                self.gen_expr(&mut p, expr, ns, pos);
                p.asm.op(STOP);
            }
            Stmt::Assign(name, expr) => {
                self.gen_expr(&mut p, expr, ns, pos);
                let slot = ns.storage(name).map(|var| var.slot).unwrap_or_default();
                p.asm.push(slot).op(SSTORE).at(pos).op(STOP);
            }
            Stmt::Raise(reason) => {
                p.revert(reason, pos, "user raise");
            }
        }
        Ok(p.finish())
    }
}
