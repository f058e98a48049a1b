//! MathML expressions: reading, evaluation and function inlining

pub mod evaluator;
pub mod inline;
pub mod mathml;
pub mod node;

pub use evaluator::{
    evaluate, evaluate_with_diagnostics, Binding, Environment, Evaluation, ModelContext, AVOGADRO,
};
pub use inline::{
    expand_function_definitions, replace_fd, FunctionDefinition, InlineConfig, InlineOutcome,
};
pub use mathml::{parse_math, read_math, MATHML_NAMESPACE};
pub use node::{Constant, MathKind, MathNode, Operator, Symbol};
