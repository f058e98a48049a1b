//! Inlining of user-defined functions

use tracing::{debug, trace};

use crate::math::node::{MathKind, MathNode};

/// A named lambda: parameters and body
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDefinition {
    id: String,
    params: Vec<String>,
    body: MathNode,
}

impl FunctionDefinition {
    pub fn new(id: impl Into<String>, params: Vec<String>, body: MathNode) -> Self {
        Self {
            id: id.into(),
            params,
            body,
        }
    }

    /// Definition from a `<lambda>` expression; `None` for anything else
    pub fn from_lambda(id: impl Into<String>, lambda: &MathNode) -> Option<Self> {
        let MathKind::Lambda { params } = lambda.kind() else {
            return None;
        };
        let body = lambda.child(0)?.clone();
        Some(Self::new(id, params.clone(), body))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn body(&self) -> &MathNode {
        &self.body
    }

    /// Body with `args` substituted for the parameters
    ///
    /// Substitution is simultaneous, so an argument that mentions a parameter
    /// name is never rewritten a second time.
    pub fn instantiate(&self, args: &[MathNode]) -> MathNode {
        let mut body = self.body.clone();
        self.substitute(&mut body, args);
        body
    }

    fn substitute(&self, node: &mut MathNode, args: &[MathNode]) {
        if let Some(id) = node.as_name() {
            if let Some(arg) = self
                .params
                .iter()
                .position(|param| param == id)
                .and_then(|index| args.get(index))
            {
                *node = arg.clone();
            }
            return;
        }
        for child in node.children_mut() {
            self.substitute(child, args);
        }
    }
}

/// Replace calls to `definition` inside `node` with its instantiated body
///
/// Arguments are expanded before substitution. Calls appearing in the body
/// itself are left for a later pass, so a single pass always terminates.
/// Calls whose arity does not match, or whose name is in `excluded`, stay
/// untouched. Returns the number of calls replaced.
pub fn replace_fd(node: &mut MathNode, definition: &FunctionDefinition, excluded: &[String]) -> usize {
    let mut replaced = 0;
    for child in node.children_mut() {
        replaced += replace_fd(child, definition, excluded);
    }

    let is_target = node.as_call().is_some_and(|id| {
        id == definition.id() && !excluded.iter().any(|skip| skip == id)
    });
    if !is_target {
        return replaced;
    }
    if node.num_children() != definition.params().len() {
        trace!(
            function = definition.id(),
            expected = definition.params().len(),
            found = node.num_children(),
            "arity mismatch, call left in place"
        );
        return replaced;
    }

    *node = definition.instantiate(node.children());
    replaced + 1
}

/// Limits for [`expand_function_definitions`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineConfig {
    /// Pass cap; `None` means twice the number of eligible definitions
    pub max_passes: Option<usize>,
    /// Function ids never inlined
    pub excluded: Vec<String>,
}

impl InlineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = Some(max_passes);
        self
    }

    pub fn with_excluded(mut self, excluded: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded = excluded.into_iter().map(Into::into).collect();
        self
    }
}

/// Summary of an expansion run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InlineOutcome {
    pub passes: usize,
    pub replaced: usize,
    /// No call to an eligible definition remains
    pub converged: bool,
}

/// Inline every eligible definition until no calls remain or the pass cap
/// is hit
pub fn expand_function_definitions(
    node: &mut MathNode,
    definitions: &[FunctionDefinition],
    config: &InlineConfig,
) -> InlineOutcome {
    let eligible: Vec<&FunctionDefinition> = definitions
        .iter()
        .filter(|definition| !config.excluded.iter().any(|skip| skip == definition.id()))
        .collect();
    let ids: Vec<&str> = eligible.iter().map(|definition| definition.id()).collect();
    let max_passes = config
        .max_passes
        .unwrap_or_else(|| eligible.len().saturating_mul(2));

    let mut passes = 0;
    let mut replaced = 0;
    while passes < max_passes && node.references_any(&ids) {
        for definition in &eligible {
            replaced += replace_fd(node, definition, &config.excluded);
        }
        passes += 1;
        trace!(passes, replaced, "function definition pass");
    }

    let converged = !node.references_any(&ids);
    debug!(passes, replaced, converged, "function definitions expanded");
    InlineOutcome {
        passes,
        replaced,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::node::Operator;

    fn square() -> FunctionDefinition {
        FunctionDefinition::new(
            "sq",
            vec!["x".to_string()],
            MathNode::apply(Operator::Times, vec![MathNode::name("x"), MathNode::name("x")]),
        )
    }

    #[test]
    fn test_from_lambda() {
        let lambda = MathNode::lambda(vec!["a".to_string()], MathNode::name("a"));
        let definition = FunctionDefinition::from_lambda("id", &lambda);
        assert_eq!(definition.as_ref().map(|d| d.params().len()), Some(1));
        assert!(FunctionDefinition::from_lambda("id", &MathNode::number(1.0)).is_none());
    }

    #[test]
    fn test_replace_single_call() {
        let mut expr = MathNode::call("sq", vec![MathNode::name("k")]);
        assert_eq!(replace_fd(&mut expr, &square(), &[]), 1);
        assert_eq!(
            expr,
            MathNode::apply(Operator::Times, vec![MathNode::name("k"), MathNode::name("k")])
        );
    }

    #[test]
    fn test_nested_arguments_expanded_first() {
        let mut expr = MathNode::call(
            "sq",
            vec![MathNode::call("sq", vec![MathNode::number(2.0)])],
        );
        assert_eq!(replace_fd(&mut expr, &square(), &[]), 2);
        assert!(!expr.references_any(&["sq"]));
        assert_eq!(expr.node_count(), 7);
    }

    #[test]
    fn test_substitution_is_simultaneous() {
        let swap = FunctionDefinition::new(
            "minus",
            vec!["a".to_string(), "b".to_string()],
            MathNode::apply(Operator::Minus, vec![MathNode::name("a"), MathNode::name("b")]),
        );
        let mut expr = MathNode::call("minus", vec![MathNode::name("b"), MathNode::name("a")]);
        replace_fd(&mut expr, &swap, &[]);
        assert_eq!(
            expr,
            MathNode::apply(Operator::Minus, vec![MathNode::name("b"), MathNode::name("a")])
        );
    }

    #[test]
    fn test_excluded_and_arity_mismatch_left_alone() {
        let mut excluded = MathNode::call("sq", vec![MathNode::number(1.0)]);
        assert_eq!(replace_fd(&mut excluded, &square(), &["sq".to_string()]), 0);
        assert_eq!(excluded.as_call(), Some("sq"));

        let mut wrong_arity = MathNode::call("sq", vec![]);
        assert_eq!(replace_fd(&mut wrong_arity, &square(), &[]), 0);
    }

    #[test]
    fn test_expand_chained_definitions() {
        let quad = FunctionDefinition::new(
            "quad",
            vec!["y".to_string()],
            MathNode::call("sq", vec![MathNode::call("sq", vec![MathNode::name("y")])]),
        );
        let mut expr = MathNode::call("quad", vec![MathNode::number(3.0)]);
        let outcome = expand_function_definitions(&mut expr, &[square(), quad], &InlineConfig::new());
        assert!(outcome.converged);
        assert!(outcome.passes <= 4);
        assert!(!expr.references_any(&["sq", "quad"]));
    }

    #[test]
    fn test_self_recursive_definition_stops() {
        let forever = FunctionDefinition::new(
            "f",
            vec!["x".to_string()],
            MathNode::call("f", vec![MathNode::name("x")]),
        );
        let mut expr = MathNode::call("f", vec![MathNode::number(1.0)]);
        let outcome = expand_function_definitions(&mut expr, &[forever], &InlineConfig::new());
        assert_eq!(outcome.passes, 2);
        assert!(!outcome.converged);
    }

    #[test]
    fn test_explicit_pass_cap() {
        let mut expr = MathNode::call("sq", vec![MathNode::number(1.0)]);
        let outcome = expand_function_definitions(
            &mut expr,
            &[square()],
            &InlineConfig::new().with_max_passes(0),
        );
        assert_eq!(outcome.passes, 0);
        assert!(!outcome.converged);
    }
}
