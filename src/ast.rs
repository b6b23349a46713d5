//! Syntax tree and symbol tables shared by the parser, the type checker and
//! the code generator.
//!
//! Variables live in flat vectors (a function's `locals`, the program's
//! `globals`) and the tree refers to them through [`VarRef`] indices, so
//! declaration order is preserved and no node owns a symbol.

use crate::ty::Type;

/// Binary operators recognised by the language. `>` and `>=` never reach the
/// tree: the parser swaps their operands into `Lt`/`Le`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
}

/// Where a variable reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRef {
  /// Index into the enclosing function's `locals`.
  Local(usize),
  /// Index into `Program::globals`.
  Global(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
  Num {
    value: i64,
  },
  Var {
    var: VarRef,
  },
  Neg {
    operand: Box<Node>,
  },
  Addr {
    operand: Box<Node>,
  },
  Deref {
    operand: Box<Node>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Node>,
    rhs: Box<Node>,
  },
  Assign {
    lhs: Box<Node>,
    rhs: Box<Node>,
  },
  FunCall {
    name: String,
    args: Vec<Node>,
  },
  ExprStmt {
    expr: Box<Node>,
  },
  Return {
    value: Box<Node>,
  },
  Block {
    body: Vec<Node>,
  },
  If {
    cond: Box<Node>,
    then: Box<Node>,
    els: Option<Box<Node>>,
  },
  For {
    init: Option<Box<Node>>,
    cond: Option<Box<Node>>,
    inc: Option<Box<Node>>,
    body: Box<Node>,
  },
}

/// A tree node. `loc` is the byte offset of its representative token and
/// `ty` stays `None` until the type checker visits it.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub kind: NodeKind,
  pub loc: usize,
  pub ty: Option<Type>,
}

impl Node {
  pub fn new(kind: NodeKind, loc: usize) -> Self {
    Self {
      kind,
      loc,
      ty: None,
    }
  }

  pub fn number(value: i64, loc: usize) -> Self {
    Self::new(NodeKind::Num { value }, loc)
  }

  pub fn var(var: VarRef, loc: usize) -> Self {
    Self::new(NodeKind::Var { var }, loc)
  }

  pub fn neg(operand: Node, loc: usize) -> Self {
    Self::new(
      NodeKind::Neg {
        operand: Box::new(operand),
      },
      loc,
    )
  }

  pub fn addr(operand: Node, loc: usize) -> Self {
    Self::new(
      NodeKind::Addr {
        operand: Box::new(operand),
      },
      loc,
    )
  }

  pub fn deref(operand: Node, loc: usize) -> Self {
    Self::new(
      NodeKind::Deref {
        operand: Box::new(operand),
      },
      loc,
    )
  }

  pub fn binary(op: BinaryOp, lhs: Node, rhs: Node, loc: usize) -> Self {
    Self::new(
      NodeKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      loc,
    )
  }

  pub fn assign(lhs: Node, rhs: Node, loc: usize) -> Self {
    Self::new(
      NodeKind::Assign {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      loc,
    )
  }

  pub fn expr_stmt(expr: Node, loc: usize) -> Self {
    Self::new(
      NodeKind::ExprStmt {
        expr: Box::new(expr),
      },
      loc,
    )
  }

  pub fn block(body: Vec<Node>, loc: usize) -> Self {
    Self::new(NodeKind::Block { body }, loc)
  }

  /// Variables and dereferences are the only nodes with an address.
  pub fn is_lvalue(&self) -> bool {
    matches!(self.kind, NodeKind::Var { .. } | NodeKind::Deref { .. })
  }
}

/// Static contents of a global variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitData {
  /// Raw bytes, exactly `ty.size` of them.
  Bytes(Vec<u8>),
  /// The address of another global.
  Label(String),
}

/// A named variable: a local, a parameter or a global.
#[derive(Debug, Clone, PartialEq)]
pub struct Obj {
  pub name: String,
  pub ty: Type,
  /// Frame offset from `rbp`; assigned by the code generator, locals only.
  pub offset: i64,
  pub init_data: Option<InitData>,
}

impl Obj {
  pub fn new(name: impl Into<String>, ty: Type) -> Self {
    Self {
      name: name.into(),
      ty,
      offset: 0,
      init_data: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub name: String,
  pub ty: Type,
  /// Indices into `locals`, in declaration order.
  pub params: Vec<usize>,
  pub locals: Vec<Obj>,
  pub body: Node,
  pub stack_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
  pub globals: Vec<Obj>,
  pub functions: Vec<Function>,
}

/// Read-only view used to resolve a [`VarRef`].
#[derive(Debug, Clone, Copy)]
pub struct Symbols<'a> {
  pub locals: &'a [Obj],
  pub globals: &'a [Obj],
}

impl<'a> Symbols<'a> {
  pub fn new(locals: &'a [Obj], globals: &'a [Obj]) -> Self {
    Self { locals, globals }
  }

  pub fn get(&self, var: VarRef) -> &'a Obj {
    match var {
      VarRef::Local(index) => &self.locals[index],
      VarRef::Global(index) => &self.globals[index],
    }
  }
}
