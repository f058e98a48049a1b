//! Numeric evaluation of expression trees
//!
//! Evaluation never fails: undeclared identifiers, unexpanded function calls
//! and math-domain errors all surface as NaN (or whatever IEEE arithmetic
//! yields). [`evaluate_with_diagnostics`] additionally reports which
//! identifiers were missing.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::math::node::{MathKind, MathNode, Operator, Symbol};

/// Avogadro's number as used by SBML Level 3
pub const AVOGADRO: f64 = 6.022_141_79e23;

/// A value known to the evaluator
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Binding {
    pub value: f64,
    /// Value comes from a rule or initial assignment not yet evaluated
    pub defined_elsewhere: bool,
}

/// Identifier values for one analysis
///
/// Callers own the environment and pass it to every evaluation; clear it
/// before reusing it for an unrelated model.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    values: IndexMap<String, Binding>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: impl Into<String>, value: f64) {
        self.values.insert(
            id.into(),
            Binding {
                value,
                defined_elsewhere: false,
            },
        );
    }

    /// Flag `id` as computed by a defining expression
    ///
    /// Keeps an existing value; unknown identifiers start as NaN.
    pub fn mark_defined_elsewhere(&mut self, id: impl Into<String>) {
        self.values
            .entry(id.into())
            .and_modify(|binding| binding.defined_elsewhere = true)
            .or_insert(Binding {
                value: f64::NAN,
                defined_elsewhere: true,
            });
    }

    pub fn get(&self, id: &str) -> Option<Binding> {
        self.values.get(id).copied()
    }

    /// Value of `id`, NaN when unset
    pub fn value(&self, id: &str) -> f64 {
        self.get(id).map_or(f64::NAN, |binding| binding.value)
    }

    pub fn remove(&mut self, id: &str) -> Option<Binding> {
        self.values.shift_remove(id)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Binding)> {
        self.values.iter().map(|(id, binding)| (id.as_str(), *binding))
    }
}

/// Read-only model lookups used to resolve deferred values
pub trait ModelContext {
    /// Right-hand side of the rule or initial assignment that sets `id`
    fn defining_expression(&self, id: &str) -> Option<&MathNode>;
}

impl ModelContext for HashMap<String, MathNode> {
    fn defining_expression(&self, id: &str) -> Option<&MathNode> {
        self.get(id)
    }
}

impl ModelContext for IndexMap<String, MathNode> {
    fn defining_expression(&self, id: &str) -> Option<&MathNode> {
        self.get(id)
    }
}

/// Result of [`evaluate_with_diagnostics`]
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    /// Identifiers read without any binding, in first-seen order
    pub undeclared: Vec<String>,
}

/// Evaluate `node` against `env`
pub fn evaluate(node: &MathNode, env: &mut Environment, context: Option<&dyn ModelContext>) -> f64 {
    Evaluator::new(env, context).eval(node)
}

pub fn evaluate_with_diagnostics(
    node: &MathNode,
    env: &mut Environment,
    context: Option<&dyn ModelContext>,
) -> Evaluation {
    let mut evaluator = Evaluator::new(env, context);
    let value = evaluator.eval(node);
    Evaluation {
        value,
        undeclared: evaluator.undeclared,
    }
}

struct Evaluator<'a> {
    env: &'a mut Environment,
    context: Option<&'a dyn ModelContext>,
    undeclared: Vec<String>,
}

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[allow(clippy::float_cmp)]
fn is_true(value: f64) -> bool {
    value == 1.0
}

impl<'a> Evaluator<'a> {
    fn new(env: &'a mut Environment, context: Option<&'a dyn ModelContext>) -> Self {
        Self {
            env,
            context,
            undeclared: Vec::new(),
        }
    }

    fn eval(&mut self, node: &MathNode) -> f64 {
        match node.kind() {
            MathKind::Number(value) => *value,
            MathKind::Name(id) => self.lookup(id),
            MathKind::Constant(constant) => constant.value(),
            MathKind::Symbol(Symbol::Time) => 0.0,
            MathKind::Symbol(Symbol::Avogadro) => AVOGADRO,
            MathKind::Symbol(Symbol::Delay) => f64::NAN,
            MathKind::Apply(op) => self.apply(*op, node.children()),
            MathKind::Piecewise => self.piecewise(node.children()),
            MathKind::Call(function) => {
                trace!(function = function.as_str(), "unexpanded function call evaluates to NaN");
                f64::NAN
            }
            MathKind::Lambda { .. } => f64::NAN,
        }
    }

    fn lookup(&mut self, id: &str) -> f64 {
        let Some(binding) = self.env.get(id) else {
            if !self.undeclared.iter().any(|seen| seen == id) {
                self.undeclared.push(id.to_string());
            }
            return f64::NAN;
        };
        if !(binding.defined_elsewhere && binding.value.is_nan()) {
            return binding.value;
        }

        let Some(expr) = self.context.and_then(|context| context.defining_expression(id)) else {
            return f64::NAN;
        };
        debug!(id, "resolving value from defining expression");
        // cleared before recursing so a cyclic definition reads NaN
        self.env.set(id, f64::NAN);
        let value = self.eval(expr);
        self.env.set(id, value);
        value
    }

    fn arg(&mut self, args: &[MathNode], index: usize) -> f64 {
        args.get(index).map_or(f64::NAN, |node| self.eval(node))
    }

    fn values(&mut self, args: &[MathNode]) -> Vec<f64> {
        args.iter().map(|node| self.eval(node)).collect()
    }

    fn unary(&mut self, args: &[MathNode], f: impl Fn(f64) -> f64) -> f64 {
        f(self.arg(args, 0))
    }

    fn binary(&mut self, args: &[MathNode], f: impl Fn(f64, f64) -> f64) -> f64 {
        let a = self.arg(args, 0);
        let b = self.arg(args, 1);
        f(a, b)
    }

    /// Relational operators hold when every adjacent pair does
    fn chain(&mut self, args: &[MathNode], holds: impl Fn(f64, f64) -> bool) -> f64 {
        let values = self.values(args);
        truth(values.windows(2).all(|pair| match pair {
            [a, b] => holds(*a, *b),
            _ => true,
        }))
    }

    fn apply(&mut self, op: Operator, args: &[MathNode]) -> f64 {
        match op {
            Operator::Plus => self.values(args).iter().sum(),
            Operator::Times => self.values(args).iter().product(),
            Operator::Minus => match self.values(args).as_slice() {
                [] => 0.0,
                [x] => -x,
                [first, rest @ ..] => rest.iter().fold(*first, |acc, x| acc - x),
            },
            Operator::Divide => self.binary(args, |a, b| a / b),
            Operator::Power => self.binary(args, f64::powf),
            Operator::Root => match args {
                [_degree, _radicand] => self.binary(args, |degree, x| x.powf(1.0 / degree)),
                _ => self.unary(args, f64::sqrt),
            },
            Operator::Abs => self.unary(args, f64::abs),
            Operator::Exp => self.unary(args, f64::exp),
            Operator::Ln => self.unary(args, f64::ln),
            Operator::Log => match args {
                [_base, _x] => self.binary(args, |base, x| x.log10() / base.log10()),
                _ => self.unary(args, f64::log10),
            },
            Operator::Floor => self.unary(args, f64::floor),
            Operator::Ceiling => self.unary(args, f64::ceil),
            Operator::Factorial => self.unary(args, factorial),
            Operator::Sin => self.unary(args, f64::sin),
            Operator::Cos => self.unary(args, f64::cos),
            Operator::Tan => self.unary(args, f64::tan),
            Operator::Sec => self.unary(args, |x| 1.0 / x.cos()),
            Operator::Csc => self.unary(args, |x| 1.0 / x.sin()),
            Operator::Cot => self.unary(args, |x| 1.0 / x.tan()),
            Operator::Sinh => self.unary(args, f64::sinh),
            Operator::Cosh => self.unary(args, f64::cosh),
            Operator::Tanh => self.unary(args, f64::tanh),
            Operator::Sech => self.unary(args, |x| 1.0 / x.cosh()),
            Operator::Csch => self.unary(args, |x| 1.0 / x.sinh()),
            Operator::Coth => self.unary(args, |x| 1.0 / x.tanh()),
            Operator::Arcsin => self.unary(args, f64::asin),
            Operator::Arccos => self.unary(args, f64::acos),
            Operator::Arctan => self.unary(args, f64::atan),
            Operator::Arcsec => self.unary(args, |x| (1.0 / x).acos()),
            Operator::Arccsc => self.unary(args, |x| (1.0 / x).asin()),
            Operator::Arccot => self.unary(args, |x| (1.0 / x).atan()),
            Operator::Arcsinh => self.unary(args, f64::asinh),
            Operator::Arccosh => self.unary(args, f64::acosh),
            Operator::Arctanh => self.unary(args, f64::atanh),
            Operator::Arcsech => self.unary(args, |x| (1.0 / x).acosh()),
            Operator::Arccsch => self.unary(args, |x| (1.0 / x).asinh()),
            Operator::Arccoth => self.unary(args, |x| 0.5 * ((x + 1.0) / (x - 1.0)).ln()),
            Operator::And => truth(self.values(args).into_iter().all(is_true)),
            Operator::Or => truth(self.values(args).into_iter().any(is_true)),
            Operator::Xor => {
                let count = self.values(args).into_iter().filter(|v| is_true(*v)).count();
                truth(count % 2 == 1)
            }
            Operator::Not => self.unary(args, |x| truth(!is_true(x))),
            Operator::Implies => self.binary(args, |a, b| truth(!is_true(a) || is_true(b))),
            Operator::Eq => self.chain(args, |a, b| a == b),
            Operator::Neq => self.chain(args, |a, b| a != b),
            Operator::Gt => self.chain(args, |a, b| a > b),
            Operator::Lt => self.chain(args, |a, b| a < b),
            Operator::Geq => self.chain(args, |a, b| a >= b),
            Operator::Leq => self.chain(args, |a, b| a <= b),
            Operator::Max => self
                .values(args)
                .into_iter()
                .reduce(|a, b| nan_aware(a, b, f64::max))
                .unwrap_or(f64::NAN),
            Operator::Min => self
                .values(args)
                .into_iter()
                .reduce(|a, b| nan_aware(a, b, f64::min))
                .unwrap_or(f64::NAN),
            Operator::Quotient => self.binary(args, |a, b| (a / b).trunc()),
            Operator::Rem => self.binary(args, |a, b| a % b),
        }
    }

    /// First true condition wins; a later true condition with a different
    /// value makes the choice ambiguous and the result NaN
    #[allow(clippy::float_cmp)]
    fn piecewise(&mut self, children: &[MathNode]) -> f64 {
        let mut pairs = children.chunks_exact(2);
        let mut chosen: Option<f64> = None;

        for pair in pairs.by_ref() {
            let [value, condition] = pair else {
                continue;
            };
            if !is_true(self.eval(condition)) {
                continue;
            }
            let candidate = self.eval(value);
            match chosen {
                None => chosen = Some(candidate),
                Some(previous) if previous != candidate => return f64::NAN,
                Some(_) => {}
            }
        }

        match (chosen, pairs.remainder()) {
            (Some(value), _) => value,
            (None, [otherwise]) => self.eval(otherwise),
            (None, _) => f64::NAN,
        }
    }
}

// f64::max and f64::min drop a NaN operand
fn nan_aware(a: f64, b: f64, pick: fn(f64, f64) -> f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        pick(a, b)
    }
}

/// `floor(x)!` as a floating-point product
fn factorial(x: f64) -> f64 {
    let n = x.floor();
    if n.is_nan() {
        return f64::NAN;
    }
    let mut result: f64 = 1.0;
    let mut i: f64 = 2.0;
    while i <= n && result.is_finite() {
        result *= i;
        i += 1.0;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::node::Constant;

    fn num(value: f64) -> MathNode {
        MathNode::number(value)
    }

    fn name(id: &str) -> MathNode {
        MathNode::name(id)
    }

    fn apply(op: Operator, args: Vec<MathNode>) -> MathNode {
        MathNode::apply(op, args)
    }

    fn eval(node: &MathNode) -> f64 {
        evaluate(node, &mut Environment::new(), None)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval(&apply(Operator::Plus, vec![num(1.0), num(2.0), num(3.0)])), 6.0);
        assert_eq!(eval(&apply(Operator::Plus, vec![])), 0.0);
        assert_eq!(eval(&apply(Operator::Times, vec![])), 1.0);
        assert_eq!(eval(&apply(Operator::Minus, vec![num(4.0)])), -4.0);
        assert_eq!(eval(&apply(Operator::Minus, vec![num(4.0), num(1.5)])), 2.5);
        assert_eq!(eval(&apply(Operator::Divide, vec![num(1.0), num(4.0)])), 0.25);
        assert_eq!(eval(&apply(Operator::Power, vec![num(2.0), num(10.0)])), 1024.0);
        assert!(eval(&apply(Operator::Divide, vec![num(1.0), num(0.0)])).is_infinite());
    }

    #[test]
    fn test_root_and_log() {
        assert_eq!(eval(&apply(Operator::Root, vec![num(16.0)])), 4.0);
        assert!((eval(&apply(Operator::Root, vec![num(3.0), num(27.0)])) - 3.0).abs() < 1e-12);
        assert_eq!(eval(&apply(Operator::Log, vec![num(1000.0)])), 3.0);
        assert!((eval(&apply(Operator::Log, vec![num(2.0), num(8.0)])) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_factorial_floors_first() {
        assert_eq!(eval(&apply(Operator::Factorial, vec![num(5.0)])), 120.0);
        assert_eq!(eval(&apply(Operator::Factorial, vec![num(4.7)])), 24.0);
        assert_eq!(eval(&apply(Operator::Factorial, vec![num(0.0)])), 1.0);
        assert!(eval(&apply(Operator::Factorial, vec![num(f64::INFINITY)])).is_infinite());
        assert!(eval(&apply(Operator::Factorial, vec![num(f64::NAN)])).is_nan());
    }

    #[test]
    fn test_domain_errors_propagate() {
        assert!(eval(&apply(Operator::Arccos, vec![num(2.0)])).is_nan());
        assert!(eval(&apply(Operator::Ln, vec![num(-1.0)])).is_nan());
        assert_eq!(eval(&apply(Operator::Sec, vec![num(0.0)])), 1.0);
    }

    #[test]
    fn test_logic_and_relations() {
        let t = MathNode::constant(Constant::True);
        let f = MathNode::constant(Constant::False);
        assert_eq!(eval(&apply(Operator::And, vec![t.clone(), t.clone()])), 1.0);
        assert_eq!(eval(&apply(Operator::Or, vec![f.clone(), f.clone()])), 0.0);
        assert_eq!(eval(&apply(Operator::Xor, vec![t.clone(), t.clone(), t.clone()])), 1.0);
        assert_eq!(eval(&apply(Operator::Not, vec![num(2.0)])), 1.0);
        assert_eq!(eval(&apply(Operator::Implies, vec![f, t])), 1.0);
        assert_eq!(eval(&apply(Operator::Lt, vec![num(1.0), num(2.0), num(3.0)])), 1.0);
        assert_eq!(eval(&apply(Operator::Lt, vec![num(1.0), num(3.0), num(2.0)])), 0.0);
        assert_eq!(eval(&apply(Operator::Eq, vec![num(2.0), num(2.0)])), 1.0);
    }

    #[test]
    fn test_min_max_quotient_rem() {
        assert_eq!(eval(&apply(Operator::Max, vec![num(1.0), num(7.0), num(3.0)])), 7.0);
        assert_eq!(eval(&apply(Operator::Min, vec![num(1.0), num(-7.0)])), -7.0);
        assert!(eval(&apply(Operator::Max, vec![num(1.0), num(f64::NAN)])).is_nan());
        assert!(eval(&apply(Operator::Min, Vec::new())).is_nan());
        assert_eq!(eval(&apply(Operator::Quotient, vec![num(7.0), num(2.0)])), 3.0);
        assert_eq!(eval(&apply(Operator::Rem, vec![num(7.0), num(2.0)])), 1.0);
    }

    #[test]
    fn test_special_names() {
        assert_eq!(eval(&MathNode::symbol(Symbol::Time, vec![])), 0.0);
        assert_eq!(eval(&MathNode::symbol(Symbol::Avogadro, vec![])), AVOGADRO);
        assert!(eval(&MathNode::symbol(Symbol::Delay, vec![num(1.0), num(0.0)])).is_nan());
        assert!(eval(&MathNode::call("f", vec![num(1.0)])).is_nan());
        assert!(eval(&MathNode::lambda(vec![], num(1.0))).is_nan());
    }

    #[test]
    fn test_environment_values() {
        let mut env = Environment::new();
        env.set("k", 2.0);
        let expr = apply(Operator::Times, vec![name("k"), name("missing")]);
        let result = evaluate_with_diagnostics(&expr, &mut env, None);
        assert!(result.value.is_nan());
        assert_eq!(result.undeclared, ["missing"]);

        env.set("missing", 3.0);
        assert_eq!(evaluate(&expr, &mut env, None), 6.0);
        env.clear();
        assert!(env.is_empty());
    }

    #[test]
    fn test_piecewise_rules() {
        let t = MathNode::constant(Constant::True);
        let f = MathNode::constant(Constant::False);
        let pw = |children: Vec<MathNode>| eval(&MathNode::piecewise(children));

        assert_eq!(pw(vec![num(1.0), t.clone(), num(2.0)]), 1.0);
        assert_eq!(pw(vec![num(1.0), f.clone(), num(2.0)]), 2.0);
        assert!(pw(vec![num(1.0), f.clone()]).is_nan());
        assert!(pw(vec![num(1.0), t.clone(), num(3.0), t.clone()]).is_nan());
        assert_eq!(pw(vec![num(1.0), t.clone(), num(1.0), t]), 1.0);
        assert!(pw(vec![]).is_nan());
    }

    #[test]
    fn test_deferred_values_resolved_through_context() {
        let mut rules: HashMap<String, MathNode> = HashMap::new();
        rules.insert(
            "y".to_string(),
            apply(Operator::Plus, vec![name("x"), num(1.0)]),
        );

        let context: &dyn ModelContext = &rules;
        let mut env = Environment::new();
        env.set("x", 4.0);
        env.mark_defined_elsewhere("y");
        assert_eq!(evaluate(&name("y"), &mut env, Some(context)), 5.0);
        assert_eq!(env.get("y").map(|b| b.value), Some(5.0));

        let mut cold = Environment::new();
        cold.mark_defined_elsewhere("y");
        assert!(evaluate(&name("y"), &mut cold, None).is_nan());
    }

    #[test]
    fn test_cyclic_definitions_yield_nan() {
        let mut rules: HashMap<String, MathNode> = HashMap::new();
        rules.insert("a".to_string(), name("b"));
        rules.insert("b".to_string(), name("a"));

        let context: &dyn ModelContext = &rules;
        let mut env = Environment::new();
        env.mark_defined_elsewhere("a");
        env.mark_defined_elsewhere("b");
        assert!(evaluate(&name("a"), &mut env, Some(context)).is_nan());
    }
}
