//! Expression tree read from MathML

/// Built-in MathML operators applied through `<apply>`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Divide,
    Power,
    Root,
    Abs,
    Exp,
    Ln,
    Log,
    Floor,
    Ceiling,
    Factorial,
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Sinh,
    Cosh,
    Tanh,
    Sech,
    Csch,
    Coth,
    Arcsin,
    Arccos,
    Arctan,
    Arcsec,
    Arccsc,
    Arccot,
    Arcsinh,
    Arccosh,
    Arctanh,
    Arcsech,
    Arccsch,
    Arccoth,
    And,
    Or,
    Xor,
    Not,
    Implies,
    Eq,
    Neq,
    Gt,
    Lt,
    Geq,
    Leq,
    Max,
    Min,
    Quotient,
    Rem,
}

const OPERATORS: [(&str, Operator); 52] = [
    ("plus", Operator::Plus),
    ("minus", Operator::Minus),
    ("times", Operator::Times),
    ("divide", Operator::Divide),
    ("power", Operator::Power),
    ("root", Operator::Root),
    ("abs", Operator::Abs),
    ("exp", Operator::Exp),
    ("ln", Operator::Ln),
    ("log", Operator::Log),
    ("floor", Operator::Floor),
    ("ceiling", Operator::Ceiling),
    ("factorial", Operator::Factorial),
    ("sin", Operator::Sin),
    ("cos", Operator::Cos),
    ("tan", Operator::Tan),
    ("sec", Operator::Sec),
    ("csc", Operator::Csc),
    ("cot", Operator::Cot),
    ("sinh", Operator::Sinh),
    ("cosh", Operator::Cosh),
    ("tanh", Operator::Tanh),
    ("sech", Operator::Sech),
    ("csch", Operator::Csch),
    ("coth", Operator::Coth),
    ("arcsin", Operator::Arcsin),
    ("arccos", Operator::Arccos),
    ("arctan", Operator::Arctan),
    ("arcsec", Operator::Arcsec),
    ("arccsc", Operator::Arccsc),
    ("arccot", Operator::Arccot),
    ("arcsinh", Operator::Arcsinh),
    ("arccosh", Operator::Arccosh),
    ("arctanh", Operator::Arctanh),
    ("arcsech", Operator::Arcsech),
    ("arccsch", Operator::Arccsch),
    ("arccoth", Operator::Arccoth),
    ("and", Operator::And),
    ("or", Operator::Or),
    ("xor", Operator::Xor),
    ("not", Operator::Not),
    ("implies", Operator::Implies),
    ("eq", Operator::Eq),
    ("neq", Operator::Neq),
    ("gt", Operator::Gt),
    ("lt", Operator::Lt),
    ("geq", Operator::Geq),
    ("leq", Operator::Leq),
    ("max", Operator::Max),
    ("min", Operator::Min),
    ("quotient", Operator::Quotient),
    ("rem", Operator::Rem),
];

impl Operator {
    /// Operator for a MathML element name
    pub fn from_element(name: &str) -> Option<Self> {
        OPERATORS
            .iter()
            .find(|(element, _)| *element == name)
            .map(|(_, op)| *op)
    }

    pub fn element_name(self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op)| *op == self)
            .map_or("", |(element, _)| *element)
    }

    /// True for operators whose result is a truth value
    pub const fn is_logical(self) -> bool {
        matches!(
            self,
            Self::And
                | Self::Or
                | Self::Xor
                | Self::Not
                | Self::Implies
                | Self::Eq
                | Self::Neq
                | Self::Gt
                | Self::Lt
                | Self::Geq
                | Self::Leq
        )
    }
}

/// MathML constant elements
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Constant {
    True,
    False,
    Pi,
    ExponentialE,
    Infinity,
    NotANumber,
}

impl Constant {
    pub fn from_element(name: &str) -> Option<Self> {
        match name {
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            "pi" => Some(Self::Pi),
            "exponentiale" => Some(Self::ExponentialE),
            "infinity" => Some(Self::Infinity),
            "notanumber" => Some(Self::NotANumber),
            _ => None,
        }
    }

    pub const fn value(self) -> f64 {
        match self {
            Self::True => 1.0,
            Self::False => 0.0,
            Self::Pi => std::f64::consts::PI,
            Self::ExponentialE => std::f64::consts::E,
            Self::Infinity => f64::INFINITY,
            Self::NotANumber => f64::NAN,
        }
    }
}

/// SBML `csymbol` definitions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
    Time,
    Delay,
    Avogadro,
}

impl Symbol {
    pub const TIME_URL: &'static str = "http://www.sbml.org/sbml/symbols/time";
    pub const DELAY_URL: &'static str = "http://www.sbml.org/sbml/symbols/delay";
    pub const AVOGADRO_URL: &'static str = "http://www.sbml.org/sbml/symbols/avogadro";

    pub fn from_url(url: &str) -> Option<Self> {
        match url.trim() {
            Self::TIME_URL => Some(Self::Time),
            Self::DELAY_URL => Some(Self::Delay),
            Self::AVOGADRO_URL => Some(Self::Avogadro),
            _ => None,
        }
    }
}

/// Kind of a [`MathNode`]
#[derive(Clone, Debug, PartialEq)]
pub enum MathKind {
    Number(f64),
    /// `<ci>` reference to a model identifier or bound variable
    Name(String),
    Constant(Constant),
    /// `time` and `avogadro` are leaves; `delay` applies to two arguments
    Symbol(Symbol),
    Apply(Operator),
    /// Call of a user-defined function
    Call(String),
    /// Children alternate value and condition, optionally ending with the
    /// `otherwise` value
    Piecewise,
    /// Single child: the body
    Lambda { params: Vec<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct MathNode {
    kind: MathKind,
    children: Vec<MathNode>,
}

impl MathNode {
    pub fn new(kind: MathKind, children: Vec<MathNode>) -> Self {
        Self { kind, children }
    }

    pub fn number(value: f64) -> Self {
        Self::new(MathKind::Number(value), Vec::new())
    }

    pub fn name(id: impl Into<String>) -> Self {
        Self::new(MathKind::Name(id.into()), Vec::new())
    }

    pub fn constant(constant: Constant) -> Self {
        Self::new(MathKind::Constant(constant), Vec::new())
    }

    pub fn symbol(symbol: Symbol, args: Vec<MathNode>) -> Self {
        Self::new(MathKind::Symbol(symbol), args)
    }

    pub fn apply(op: Operator, args: Vec<MathNode>) -> Self {
        Self::new(MathKind::Apply(op), args)
    }

    pub fn call(function: impl Into<String>, args: Vec<MathNode>) -> Self {
        Self::new(MathKind::Call(function.into()), args)
    }

    pub fn piecewise(pieces: Vec<MathNode>) -> Self {
        Self::new(MathKind::Piecewise, pieces)
    }

    pub fn lambda(params: Vec<String>, body: MathNode) -> Self {
        Self::new(MathKind::Lambda { params }, vec![body])
    }

    pub fn kind(&self) -> &MathKind {
        &self.kind
    }

    pub fn children(&self) -> &[MathNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [MathNode] {
        &mut self.children
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, index: usize) -> Option<&MathNode> {
        self.children.get(index)
    }

    /// Identifier of a `<ci>` leaf
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            MathKind::Name(id) => Some(id),
            _ => None,
        }
    }

    /// Function name of a user-defined call
    pub fn as_call(&self) -> Option<&str> {
        match &self.kind {
            MathKind::Call(id) => Some(id),
            _ => None,
        }
    }

    /// Visit this node and every descendant, parents first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a MathNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Whether any call in the tree targets one of `functions`
    pub fn references_any(&self, functions: &[&str]) -> bool {
        self.as_call().is_some_and(|id| functions.contains(&id))
            || self
                .children
                .iter()
                .any(|child| child.references_any(functions))
    }

    /// Identifiers referenced through `<ci>`, in first-seen order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        self.walk(&mut |node| {
            if let Some(id) = node.as_name() {
                if !names.contains(&id) {
                    names.push(id);
                }
            }
        });
        names
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_lookup() {
        assert_eq!(Operator::from_element("plus"), Some(Operator::Plus));
        assert_eq!(Operator::from_element("arccoth"), Some(Operator::Arccoth));
        assert_eq!(Operator::from_element("bogus"), None);
        assert_eq!(Operator::Quotient.element_name(), "quotient");
        assert!(Operator::Leq.is_logical());
        assert!(!Operator::Times.is_logical());
    }

    #[test]
    fn test_symbol_urls() {
        assert_eq!(Symbol::from_url(Symbol::TIME_URL), Some(Symbol::Time));
        assert_eq!(Symbol::from_url("urn:other"), None);
    }

    #[test]
    fn test_references_and_names() {
        let expr = MathNode::apply(
            Operator::Plus,
            vec![
                MathNode::call("f", vec![MathNode::name("x")]),
                MathNode::name("y"),
                MathNode::name("x"),
            ],
        );
        assert!(expr.references_any(&["g", "f"]));
        assert!(!expr.references_any(&["g"]));
        assert_eq!(expr.names(), ["x", "y"]);
        assert_eq!(expr.node_count(), 5);
    }
}
