//! Compiler artifacts consumed by the harness.
//!
//! An [`Artifact`] is produced once by the compiler pipeline and never mutated afterwards; every
//! contract instance deployed from it shares it through an [`Arc`].

pub mod assembly;
pub mod deploy;

use std::{collections::BTreeMap, fmt, fs, path::Path, sync::Arc};

use alloy_dyn_abi::DynSolType;
use alloy_primitives::Bytes;
use eyre::{Result, WrapErr};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::analysis::source_map::SourceMap;

use self::assembly::Assembly;

/// A source range: 1-based lines, 0-based columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourcePos {
    /// A range on a single line.
    pub const fn new(line: u32, column: u32, end_column: u32) -> Self {
        Self { line, column, end_line: line, end_column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    pub name: String,
    /// Canonical ABI type, e.g. `uint256` or `(address,bytes32)`.
    #[serde(rename = "type")]
    pub ty: String,
}

impl AbiParam {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self { name: name.into(), ty: ty.into() }
    }

    pub fn resolve(&self) -> Result<DynSolType> {
        parse_type(&self.ty)
    }
}

/// Where a frame variable lives at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarLocation {
    Memory,
    Calldata,
    Storage,
    Immutable,
}

/// A local variable of a function, as laid out by the compiler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameVar {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub location: VarLocation,
    pub offset: usize,
}

/// The declared ABI of a function.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    /// Positional arguments that must always be supplied.
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    /// Arguments with a default value. Each prefix of this list is a distinct overload.
    #[serde(default)]
    pub defaults: Vec<AbiParam>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub frame: Vec<FrameVar>,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn input(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.inputs.push(AbiParam::new(name, ty));
        self
    }

    pub fn default_input(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.defaults.push(AbiParam::new(name, ty));
        self
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.output = Some(ty.into());
        self
    }

    pub fn local(mut self, name: impl Into<String>, ty: impl Into<String>, offset: usize) -> Self {
        self.frame.push(FrameVar {
            name: name.into(),
            ty: ty.into(),
            location: VarLocation::Memory,
            offset,
        });
        self
    }

    #[inline]
    pub fn required(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn optional(&self) -> usize {
        self.defaults.len()
    }

    pub fn return_type(&self) -> Result<Option<DynSolType>> {
        self.output.as_deref().map(parse_type).transpose()
    }

    /// The parameters of the overload taking `n_optional` defaulted arguments.
    pub fn params(&self, n_optional: usize) -> impl Iterator<Item = &AbiParam> {
        self.inputs.iter().chain(self.defaults.iter().take(n_optional))
    }
}

/// A node of the contract's syntax tree, flattened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub kind: String,
    pub pos: SourcePos,
    /// Name of the function enclosing this node, if any.
    #[serde(default)]
    pub function: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub source: String,
    #[serde(default)]
    pub nodes: Vec<SyntaxNode>,

    #[serde(skip)]
    by_pos: OnceCell<BTreeMap<SourcePos, usize>>,
}

impl SyntaxTree {
    pub fn new(source: impl Into<String>, nodes: Vec<SyntaxNode>) -> Self {
        Self { source: source.into(), nodes, by_pos: OnceCell::new() }
    }

    /// Returns the node spanning exactly `pos`. When several nodes share a range, the innermost
    /// (last listed) one wins.
    pub fn node_at(&self, pos: &SourcePos) -> Option<&SyntaxNode> {
        let index = self.by_pos.get_or_init(|| {
            self.nodes.iter().enumerate().map(|(i, node)| (node.pos, i)).collect()
        });
        index.get(pos).map(|i| &self.nodes[*i])
    }

    /// The source lines covered by `pos`, prefixed with their line numbers.
    pub fn excerpt(&self, pos: &SourcePos) -> Option<String> {
        if pos.line == 0 {
            return None;
        }

        let first = pos.line as usize;
        let last = pos.end_line.max(pos.line) as usize;
        let lines = self
            .source
            .lines()
            .enumerate()
            .skip(first - 1)
            .take(last - first + 1)
            .map(|(i, line)| format!("{:>5}  {line}", i + 1))
            .collect::<Vec<_>>();

        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

/// Immutable compiler output for one contract.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    /// Deployment (init) bytecode. Constructor arguments are appended to it.
    pub bytecode: Bytes,
    pub runtime_bytecode: Bytes,
    /// Size of the immutable data section appended to the runtime code at deployment.
    #[serde(default)]
    pub data_section_len: usize,
    #[serde(default)]
    pub constructor: Option<FunctionSignature>,
    #[serde(default)]
    pub functions: Vec<FunctionSignature>,
    /// Assembly of the runtime code; assembles to `runtime_bytecode`.
    #[serde(default)]
    pub runtime_assembly: Option<Assembly>,
    /// Runtime assembly before any optimization, the base fragments are spliced onto.
    #[serde(default)]
    pub unoptimized_assembly: Option<Assembly>,
    #[serde(default)]
    pub syntax_tree: SyntaxTree,

    #[serde(skip)]
    source_map: OnceCell<Arc<SourceMap>>,
    #[serde(skip)]
    unoptimized_code: OnceCell<Bytes>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, bytecode: Bytes, runtime_bytecode: Bytes) -> Self {
        Self { name: name.into(), bytecode, runtime_bytecode, ..Default::default() }
    }

    /// Loads an artifact from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        trace!("loading artifact: {:?}", path);

        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read artifact {}", path.display()))?;
        serde_json::from_str(&content)
            .wrap_err_with(|| format!("invalid artifact {}", path.display()))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// The program-counter maps of the runtime code. Computed once, on first use.
    ///
    /// An artifact without runtime assembly (or whose assembly fails to assemble) has an empty
    /// map: diagnostics degrade, execution does not.
    pub fn source_map(&self) -> Arc<SourceMap> {
        let map = self.source_map.get_or_init(|| {
            let Some(assembly) = &self.runtime_assembly else {
                return Arc::default();
            };

            match assembly.assemble() {
                Ok((code, map)) => {
                    if code != self.runtime_bytecode {
                        warn!("runtime assembly of {} does not assemble to its runtime bytecode", self.name);
                    }
                    Arc::new(map)
                }
                Err(err) => {
                    warn!("failed to assemble runtime of {}: {err}", self.name);
                    Arc::default()
                }
            }
        });
        Arc::clone(map)
    }

    /// The unoptimized runtime code, without data section. Computed once, on first use.
    pub fn unoptimized_bytecode(&self) -> Result<&Bytes> {
        self.unoptimized_code.get_or_try_init(|| {
            let assembly = self
                .unoptimized_assembly
                .as_ref()
                .ok_or_else(|| eyre::eyre!("{} carries no unoptimized assembly", self.name))?;
            let (code, _) = assembly.assemble()?;
            Ok(code)
        })
    }
}

/// Parses a canonical ABI type string.
pub fn parse_type(ty: &str) -> Result<DynSolType> {
    DynSolType::parse(ty).map_err(|err| eyre::eyre!("invalid ABI type `{ty}`: {err}"))
}
