pub mod compiler;
pub mod expr;

pub use expr::{Expr, Op};
