// Expression trees: labelled terms joined by operators, with nested groups.

use std::fmt;

use super::FormulaError;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    /// Symbol used when rendering a formula.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "x",
            Operator::Divide => "÷",
        }
    }

    /// Apply the operator. Dividing by zero is an error rather than an
    /// infinity.
    pub fn apply(&self, lhs: f64, rhs: f64) -> Result<f64, FormulaError> {
        match self {
            Operator::Add => Ok(lhs + rhs),
            Operator::Subtract => Ok(lhs - rhs),
            Operator::Multiply => Ok(lhs * rhs),
            Operator::Divide if rhs == 0.0 => Err(FormulaError::DivisionByZero { dividend: lhs }),
            Operator::Divide => Ok(lhs / rhs),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// A labelled numeric leaf.
///
/// A term built with [`Term::fixed`] is immutable: its value comes from the
/// tournament configuration and survives every reset. A term built with
/// [`Term::resettable`] starts unbound and receives a value per computation.
#[derive(Debug, Clone)]
pub struct Term {
    label: String,
    value: Option<f64>,
    immutable: bool,
}

impl Term {
    pub fn fixed(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value: Some(value),
            immutable: true,
        }
    }

    pub fn resettable(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: None,
            immutable: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// The bound value, or `UnboundTerm` if there is none.
    pub fn get(&self) -> Result<f64, FormulaError> {
        self.value.ok_or_else(|| FormulaError::UnboundTerm {
            label: self.label.clone(),
        })
    }

    pub fn set(&mut self, value: f64) -> Result<(), FormulaError> {
        if self.immutable {
            return Err(FormulaError::ImmutableTerm {
                label: self.label.clone(),
            });
        }
        self.value = Some(value);
        Ok(())
    }

    /// Clear a resettable term. Immutable terms keep their value.
    pub fn reset(&mut self) {
        if !self.immutable {
            self.value = None;
        }
    }
}

/// Terms compare by label only.
impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "{{{}:{}}}", self.label, value),
            None => write!(f, "{{{}}}", self.label),
        }
    }
}

// ---------------------------------------------------------------------------
// Expression tree
// ---------------------------------------------------------------------------

/// One slot of an [`Expression`].
#[derive(Debug, Clone)]
pub enum Node {
    Value(Term),
    Operator(Operator),
    Group(Expression),
}

/// Anything that may stand on either side of an operator.
///
/// [`Expression::combine`] only accepts operands, so operators can never end
/// up where a value is expected.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Term),
    Group(Expression),
}

impl Operand {
    fn into_node(self) -> Node {
        match self {
            Operand::Value(term) => Node::Value(term),
            Operand::Group(expression) => Node::Group(expression),
        }
    }
}

impl From<Term> for Operand {
    fn from(term: Term) -> Self {
        Operand::Value(term)
    }
}

impl From<Expression> for Operand {
    /// A single-operand expression collapses to its operand so that it is
    /// never rendered inside redundant parentheses.
    fn from(mut expression: Expression) -> Self {
        if expression.nodes.len() == 1 {
            match expression.nodes.pop() {
                Some(Node::Value(term)) => return Operand::Value(term),
                Some(Node::Group(group)) => return Operand::Group(group),
                Some(node) => expression.nodes.push(node),
                None => {}
            }
        }
        Operand::Group(expression)
    }
}

/// An ordered operand/operator sequence folded strictly left to right.
///
/// Nodes alternate operand, operator, operand, ... so operators always sit at
/// odd indices. There is no precedence: grouping only comes from how terms
/// were combined (see [`Expression::combine`]).
#[derive(Debug, Clone, Default)]
pub struct Expression {
    nodes: Vec<Node>,
}

impl From<Term> for Expression {
    fn from(term: Term) -> Self {
        Self {
            nodes: vec![Node::Value(term)],
        }
    }
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The operator joining this expression's flat chain, if it has one.
    pub fn chain_operator(&self) -> Option<Operator> {
        match self.nodes.get(1) {
            Some(Node::Operator(op)) => Some(*op),
            _ => None,
        }
    }

    /// Join `other` onto this expression with `op`.
    ///
    /// Reusing the chain's operator extends the chain (`a + b` then `+ c`
    /// gives `a + b + c`). A different operator nests the current chain as a
    /// group (`a + b` then `x c` gives `(a + b) x c`).
    pub fn combine(mut self, op: Operator, other: impl Into<Operand>) -> Self {
        let other = other.into().into_node();
        if self.nodes.is_empty() {
            self.nodes.push(other);
            return self;
        }
        match self.chain_operator() {
            None => {
                self.nodes.push(Node::Operator(op));
                self.nodes.push(other);
                self
            }
            Some(chain) if chain == op => {
                self.nodes.push(Node::Operator(op));
                self.nodes.push(other);
                self
            }
            Some(_) => Self {
                nodes: vec![Node::Group(self), Node::Operator(op), other],
            },
        }
    }

    /// Human-readable text: `{label}` for unbound terms, `{label:value}` for
    /// bound ones, groups in parentheses, everything space separated.
    pub fn render(&self) -> String {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Value(term) => term.to_string(),
                Node::Operator(op) => op.symbol().to_string(),
                Node::Group(group) => format!("({})", group.render()),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Fold the expression left to right.
    pub fn evaluate(&self) -> Result<f64, FormulaError> {
        let mut nodes = self.nodes.iter();
        let first = nodes.next().ok_or(FormulaError::EmptyExpression)?;
        let mut current = operand_value(first)?;

        while let Some(node) = nodes.next() {
            let Node::Operator(op) = node else {
                unreachable!("expression operand found where an operator was expected");
            };
            let Some(operand) = nodes.next() else {
                unreachable!("expression ends with a dangling operator");
            };
            current = op.apply(current, operand_value(operand)?)?;
        }

        Ok(current)
    }

    /// Reset every resettable term, including those in nested groups.
    pub fn reset_all(&mut self) {
        for node in &mut self.nodes {
            match node {
                Node::Value(term) => term.reset(),
                Node::Group(group) => group.reset_all(),
                Node::Operator(_) => {}
            }
        }
    }

    /// Set the value of every term labelled `label`.
    ///
    /// Fails with `ImmutableTerm` if the label belongs to a fixed term and
    /// with `UnknownTerm` if nothing in the tree carries it.
    pub fn bind(&mut self, label: &str, value: f64) -> Result<(), FormulaError> {
        if self.bind_matching(label, value)? == 0 {
            return Err(FormulaError::UnknownTerm {
                label: label.to_string(),
            });
        }
        Ok(())
    }

    fn bind_matching(&mut self, label: &str, value: f64) -> Result<usize, FormulaError> {
        let mut bound = 0;
        for node in &mut self.nodes {
            match node {
                Node::Value(term) if term.label() == label => {
                    term.set(value)?;
                    bound += 1;
                }
                Node::Group(group) => bound += group.bind_matching(label, value)?,
                Node::Value(_) | Node::Operator(_) => {}
            }
        }
        Ok(bound)
    }

    /// Every term in the tree, depth first, left to right.
    pub fn terms(&self) -> Vec<&Term> {
        let mut terms = Vec::new();
        for node in &self.nodes {
            match node {
                Node::Value(term) => terms.push(term),
                Node::Group(group) => terms.extend(group.terms()),
                Node::Operator(_) => {}
            }
        }
        terms
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn operand_value(node: &Node) -> Result<f64, FormulaError> {
    match node {
        Node::Value(term) => term.get(),
        Node::Group(group) => group.evaluate(),
        Node::Operator(op) => unreachable!("operator `{op}` found where an operand was expected"),
    }
}
