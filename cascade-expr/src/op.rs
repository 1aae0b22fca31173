use std::fmt;

/// Auxiliary slots following the relational inputs of an operator.
/// Each slot holds at most one scalar expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Single predicate, or a conjunction of predicates.
    Filters,
    /// List of projected expressions.
    Projections,
    /// List of grouping expressions.
    Groupings,
    /// List of aggregate expressions.
    Aggregations,
}

/// Child layout of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub inputs: usize,
    pub aux: &'static [Slot],
    /// Variadic operators accept any number of inputs and no aux slot.
    pub variadic: bool,
}

impl Layout {
    const LEAF: Layout = Layout::fixed(0, &[]);
    const UNARY: Layout = Layout::fixed(1, &[]);
    const BINARY: Layout = Layout::fixed(2, &[]);
    const VARIADIC: Layout = Layout {
        inputs: 0,
        aux: &[],
        variadic: true,
    };
    const FILTER: Layout = Layout::fixed(1, &[Slot::Filters]);
    const PROJECT: Layout = Layout::fixed(1, &[Slot::Projections]);
    const JOIN: Layout = Layout::fixed(2, &[Slot::Filters]);
    const GROUP: Layout = Layout::fixed(1, &[Slot::Groupings, Slot::Aggregations]);

    const fn fixed(inputs: usize, aux: &'static [Slot]) -> Self {
        Layout {
            inputs,
            aux,
            variadic: false,
        }
    }

    /// Returns number of children for fixed layouts.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.inputs + self.aux.len()
    }

    /// Returns child position of given aux slot.
    #[inline]
    pub fn slot(&self, slot: Slot) -> Option<usize> {
        self.aux
            .iter()
            .position(|s| *s == slot)
            .map(|i| self.inputs + i)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Relational,
    Scalar,
}

macro_rules! operators {
    ($($id:ident => $name:literal, $kind:ident, $layout:ident;)*) => {
        /// Operator tag of an expression node.
        ///
        /// Apply variants of joins are separate tags, printed with the
        /// name of their plain counterpart.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Operator {
            $($id,)*
        }

        impl Operator {
            pub const ALL: &'static [Operator] = &[$(Operator::$id,)*];

            #[inline]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Operator::$id => $name,)*
                }
            }

            #[inline]
            pub const fn kind(self) -> OpKind {
                match self {
                    $(Operator::$id => OpKind::$kind,)*
                }
            }

            #[inline]
            pub const fn layout(self) -> Layout {
                match self {
                    $(Operator::$id => Layout::$layout,)*
                }
            }
        }
    };
}

operators! {
    Scan => "scan", Relational, LEAF;
    IndexScan => "index scan", Relational, LEAF;
    IndexLookup => "index lookup", Relational, UNARY;
    Select => "select", Relational, FILTER;
    Project => "project", Relational, PROJECT;
    InnerJoin => "inner join", Relational, JOIN;
    LeftJoin => "left join", Relational, JOIN;
    RightJoin => "right join", Relational, JOIN;
    FullJoin => "full join", Relational, JOIN;
    SemiJoin => "semi join", Relational, JOIN;
    AntiJoin => "anti join", Relational, JOIN;
    InnerJoinApply => "inner join", Relational, JOIN;
    LeftJoinApply => "left join", Relational, JOIN;
    RightJoinApply => "right join", Relational, JOIN;
    FullJoinApply => "full join", Relational, JOIN;
    SemiJoinApply => "semi join", Relational, JOIN;
    AntiJoinApply => "anti join", Relational, JOIN;
    GroupBy => "group by", Relational, GROUP;
    OrderBy => "order by", Relational, UNARY;
    Union => "union", Relational, BINARY;
    Intersect => "intersect", Relational, BINARY;
    Except => "except", Relational, BINARY;
    Variable => "variable", Scalar, LEAF;
    Const => "const", Scalar, LEAF;
    List => "list", Scalar, VARIADIC;
    Exists => "exists", Scalar, UNARY;
    And => "and", Scalar, VARIADIC;
    Or => "or", Scalar, VARIADIC;
    Not => "not", Scalar, UNARY;
    Eq => "comp (=)", Scalar, BINARY;
    Ne => "comp (<>)", Scalar, BINARY;
    Lt => "comp (<)", Scalar, BINARY;
    Le => "comp (<=)", Scalar, BINARY;
    Gt => "comp (>)", Scalar, BINARY;
    Ge => "comp (>=)", Scalar, BINARY;
    Is => "comp (IS)", Scalar, BINARY;
    IsNot => "comp (IS NOT)", Scalar, BINARY;
    Like => "comp (LIKE)", Scalar, BINARY;
    NotLike => "comp (NOT LIKE)", Scalar, BINARY;
    In => "comp (IN)", Scalar, BINARY;
    NotIn => "comp (NOT IN)", Scalar, BINARY;
    Plus => "binary (+)", Scalar, BINARY;
    Minus => "binary (-)", Scalar, BINARY;
    Mult => "binary (*)", Scalar, BINARY;
    Div => "binary (/)", Scalar, BINARY;
    UnaryMinus => "unary (-)", Scalar, UNARY;
    Function => "function", Scalar, VARIADIC;
}

impl Operator {
    /// Number of operator tags, used to size per-operator tables.
    pub const COUNT: usize = Operator::ALL.len();

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn is_relational(self) -> bool {
        self.kind() == OpKind::Relational
    }

    #[inline]
    pub fn is_scalar(self) -> bool {
        self.kind() == OpKind::Scalar
    }

    #[inline]
    pub fn is_join(self) -> bool {
        self.layout() == Layout::JOIN
    }

    #[inline]
    pub fn is_apply(self) -> bool {
        matches!(
            self,
            Operator::InnerJoinApply
                | Operator::LeftJoinApply
                | Operator::RightJoinApply
                | Operator::FullJoinApply
                | Operator::SemiJoinApply
                | Operator::AntiJoinApply
        )
    }

    /// Returns the apply variant of a join, or itself if there is none.
    #[inline]
    pub fn set_apply(self) -> Operator {
        match self {
            Operator::InnerJoin => Operator::InnerJoinApply,
            Operator::LeftJoin => Operator::LeftJoinApply,
            Operator::RightJoin => Operator::RightJoinApply,
            Operator::FullJoin => Operator::FullJoinApply,
            Operator::SemiJoin => Operator::SemiJoinApply,
            Operator::AntiJoin => Operator::AntiJoinApply,
            other => other,
        }
    }

    /// Returns the plain variant of an apply join, or itself.
    #[inline]
    pub fn clear_apply(self) -> Operator {
        match self {
            Operator::InnerJoinApply => Operator::InnerJoin,
            Operator::LeftJoinApply => Operator::LeftJoin,
            Operator::RightJoinApply => Operator::RightJoin,
            Operator::FullJoinApply => Operator::FullJoin,
            Operator::SemiJoinApply => Operator::SemiJoin,
            Operator::AntiJoinApply => Operator::AntiJoin,
            other => other,
        }
    }

    /// Inner join and its apply variant neither drop nor duplicate
    /// columns, so their results are determined by the applied
    /// predicates and the base relations.
    #[inline]
    pub fn is_inner_join(self) -> bool {
        matches!(self, Operator::InnerJoin | Operator::InnerJoinApply)
    }

    #[inline]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
                | Operator::Is
                | Operator::IsNot
                | Operator::Like
                | Operator::NotLike
                | Operator::In
                | Operator::NotIn
        )
    }

    /// Comparisons that evaluate to unknown on null operand, and
    /// therefore reject rows whose referenced columns are null.
    #[inline]
    pub fn rejects_null(self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
                | Operator::Like
                | Operator::NotLike
                | Operator::In
        )
    }
}

impl fmt::Display for Operator {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if self.is_apply() {
            f.write_str(" (apply)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_apply_roundtrip() {
        for op in Operator::ALL {
            if op.is_apply() {
                assert_eq!(*op, op.clear_apply().set_apply());
                assert_eq!(op.name(), op.clear_apply().name());
            } else if op.is_join() {
                assert_eq!(*op, op.set_apply().clear_apply());
            } else {
                assert_eq!(*op, op.set_apply());
            }
        }
        assert_eq!("inner join (apply)", Operator::InnerJoinApply.to_string());
        assert_eq!("comp (IS NOT)", Operator::IsNot.to_string());
    }

    #[test]
    fn test_operator_layout() {
        let join = Operator::SemiJoin.layout();
        assert_eq!(3, join.num_children());
        assert_eq!(Some(2), join.slot(Slot::Filters));
        let group = Operator::GroupBy.layout();
        assert_eq!(Some(1), group.slot(Slot::Groupings));
        assert_eq!(Some(2), group.slot(Slot::Aggregations));
        assert!(Operator::And.layout().variadic);
        assert_eq!(None, Operator::Scan.layout().slot(Slot::Filters));
        assert_eq!(Operator::ALL.len(), Operator::COUNT);
        for (i, op) in Operator::ALL.iter().enumerate() {
            assert_eq!(i, op.index());
        }
    }
}
