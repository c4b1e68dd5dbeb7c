//! The compiler front-end seam.
//!
//! The harness never parses or type-checks ordinary source itself. Fragment compilation drives a
//! [`Frontend`] through a narrow, single-function pipeline: parse a snippet, infer its type,
//! validate a synthesized wrapper and generate code for that wrapper only.

use alloy_dyn_abi::DynSolType;

use crate::{
    artifact::{assembly::Assembly, Artifact},
    fragment::namespace::NamespaceSnapshot,
};

#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The expression is well-formed but has no value type, e.g. a call to a function returning
    /// nothing. Such a snippet runs as a statement.
    #[error("expression is not typeable: {0}")]
    NotTypeable(String),

    #[error("unknown name `{0}`")]
    UnknownName(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("code generation failed: {0}")]
    Codegen(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnippetKind {
    Expression,
    Statement,
}

/// A snippet parsed on its own, outside of any function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snippet {
    pub source: String,
    pub kind: SnippetKind,
}

/// The function synthesized around a snippet: externally callable, without parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentWrapper {
    pub name: String,
    pub return_type: Option<DynSolType>,
    /// `return <snippet>` for expressions, the snippet verbatim otherwise.
    pub body: String,
}

/// A function that passed semantic validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedFunction {
    pub name: String,
    pub source: String,
    pub return_type: Option<DynSolType>,
}

/// How the generated function guards its entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorCheck {
    /// Compare the calldata selector against the function's own.
    Dispatch,
    /// The check always succeeds; the function is entered with sentinel calldata.
    AlwaysPass,
}

pub trait Frontend {
    /// Builds the semantic snapshot of a contract. Called once per contract instance.
    fn analyze_module(&self, artifact: &Artifact) -> Result<NamespaceSnapshot, FrontendError>;

    fn parse_snippet(&self, source: &str) -> Result<Snippet, FrontendError>;

    /// Infers the type of an expression snippet. Fails with [`FrontendError::NotTypeable`] when
    /// the expression has no value.
    fn infer_type(
        &self,
        snippet: &Snippet,
        namespace: &NamespaceSnapshot,
    ) -> Result<DynSolType, FrontendError>;

    /// Renders the source of a wrapper function.
    fn render_wrapper(&self, wrapper: &FragmentWrapper) -> String {
        let signature = match &wrapper.return_type {
            Some(ty) => format!("def {}() -> {}:", wrapper.name, ty.sol_type_name()),
            None => format!("def {}():", wrapper.name),
        };
        let mut out = format!("@external\n{signature}\n");
        for line in wrapper.body.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Validates a single function against `namespace`, which is only read.
    fn validate_function(
        &self,
        source: &str,
        namespace: &NamespaceSnapshot,
    ) -> Result<ValidatedFunction, FrontendError>;

    /// Generates code for a single validated function.
    fn generate_function(
        &self,
        function: &ValidatedFunction,
        namespace: &NamespaceSnapshot,
        selector_check: SelectorCheck,
    ) -> Result<Assembly, FrontendError>;
}
