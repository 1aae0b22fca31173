//! Expression model shared by relational and scalar operators,
//! with logical property derivation.
pub mod builder;
pub mod colset;
pub mod derive;
pub mod error;
pub mod expr;
pub mod id;
pub mod op;
pub mod private;
pub mod props;

pub use crate::colset::ColSet;
pub use crate::expr::*;
pub use crate::id::*;
pub use crate::op::*;
pub use crate::private::*;
pub use crate::props::*;
