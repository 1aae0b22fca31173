use crate::memo::Memo;
use cascade_expr::Expr;
use std::fmt::{self, Write};

const INDENT: usize = 2;

/// Explain defines how to print a memo or an expression tree.
pub trait Explain {
    fn explain<F: Write>(&self, f: &mut F) -> fmt::Result;

    #[inline]
    fn explain_string(&self) -> String {
        let mut s = String::new();
        let _ = self.explain(&mut s);
        s
    }
}

/// One line per group in topological order, root first:
/// "<group>: [<fingerprint>] [<fingerprint>] ...".
impl Explain for Memo {
    fn explain<F: Write>(&self, f: &mut F) -> fmt::Result {
        for gid in self.topo_order() {
            write!(f, "{}:", gid)?;
            if let Ok(exprs) = self.group_exprs(gid) {
                for me in exprs {
                    write!(f, " [{}]", me.fingerprint())?;
                }
            }
            f.write_char('\n')?;
        }
        Ok(())
    }
}

impl fmt::Display for Memo {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.explain(f)
    }
}

/// Tree dump of a bound expression, one line per node in pre-order:
/// "[<group>.<alt>] <opname>", children indented by two spaces.
/// Absent children are skipped, nodes outside the memo print "[-]".
pub struct MemoTree<'a>(pub &'a Expr);

impl Explain for MemoTree<'_> {
    #[inline]
    fn explain<F: Write>(&self, f: &mut F) -> fmt::Result {
        explain_node(self.0, 0, f)
    }
}

fn explain_node<F: Write>(e: &Expr, depth: usize, f: &mut F) -> fmt::Result {
    write!(f, "{:width$}", "", width = depth * INDENT)?;
    match e.loc {
        Some(loc) => write!(f, "[{}] {}", loc, e.op)?,
        None => write!(f, "[-] {}", e.op)?,
    }
    f.write_char('\n')?;
    for c in e.children.iter().flatten() {
        explain_node(c, depth + 1, f)?;
    }
    Ok(())
}
