use crate::error::{Error, Result};
use cascade_expr::Operator;

/// Shape matched by a rule against memo alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Matches any child, bound as a childless stub of the group.
    Leaf,
    /// Matches any child, bound as the fully expanded tree of first
    /// alternatives.
    Tree,
    /// Matches alternatives with the operator, recursing into
    /// children patterns.
    Node(Operator, Vec<Pattern>),
}

impl Pattern {
    #[inline]
    pub fn node(op: Operator, children: Vec<Pattern>) -> Self {
        Pattern::Node(op, children)
    }

    #[inline]
    pub fn op(&self) -> Option<Operator> {
        match self {
            Pattern::Node(op, _) => Some(*op),
            _ => None,
        }
    }

    /// Rule patterns must be rooted at a concrete operator, and every
    /// node must list exactly the children of its operator layout.
    pub fn validate(&self, rule: &'static str) -> Result<()> {
        match self {
            Pattern::Node(..) => self.validate_node(rule),
            _ => Err(Error::InvalidPattern(rule)),
        }
    }

    fn validate_node(&self, rule: &'static str) -> Result<()> {
        if let Pattern::Node(op, children) = self {
            let layout = op.layout();
            if !layout.variadic && children.len() != layout.num_children() {
                return Err(Error::InvalidPattern(rule));
            }
            for c in children {
                c.validate_node(rule)?;
            }
        }
        Ok(())
    }
}
