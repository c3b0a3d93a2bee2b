use bytes::Bytes;
use regex::bytes::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Neq,
    EqRegex,
    NeqRegex,
    And,
    Or,
}

/// The tag-predicate expression tree this crate compiles against a
/// `Metric`'s tag index. Field predicates are out of scope: any subtree
/// this crate cannot resolve against tags is reported back as a residual,
/// never evaluated here.
#[derive(Debug, Clone)]
pub enum Expr {
    Binary { op: Op, lhs: Box<Expr>, rhs: Box<Expr> },
    VarRef { name: Bytes },
    StringLiteral { v: Bytes },
    RegexLiteral { v: Regex },
    Paren { inner: Box<Expr> },
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Binary { op: o1, lhs: l1, rhs: r1 }, Expr::Binary { op: o2, lhs: l2, rhs: r2 }) => {
                o1 == o2 && l1 == l2 && r1 == r2
            }
            (Expr::VarRef { name: n1 }, Expr::VarRef { name: n2 }) => n1 == n2,
            (Expr::StringLiteral { v: v1 }, Expr::StringLiteral { v: v2 }) => v1 == v2,
            (Expr::RegexLiteral { v: v1 }, Expr::RegexLiteral { v: v2 }) => v1.as_str() == v2.as_str(),
            (Expr::Paren { inner: i1 }, Expr::Paren { inner: i2 }) => i1 == i2,
            _ => false,
        }
    }
}

impl Expr {
    pub fn binary(op: Op, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn var(name: impl Into<Bytes>) -> Expr {
        Expr::VarRef { name: name.into() }
    }

    pub fn string(v: impl Into<Bytes>) -> Expr {
        Expr::StringLiteral { v: v.into() }
    }

    pub fn regex(pattern: &str) -> Result<Expr, regex::Error> {
        Ok(Expr::RegexLiteral { v: Regex::new(pattern)? })
    }
}
