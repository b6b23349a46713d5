//! Bottom-up type propagation over the syntax tree.
//!
//! Every expression node gets its type exactly once. Visiting a node that
//! already has one is a no-op, so the parser may type subtrees eagerly (pointer
//! arithmetic needs operand types while the tree is still being built) and
//! check the enclosing statement again later.

use crate::ast::{BinaryOp, Node, NodeKind, Symbols};
use crate::error::{CompileError, CompileResult, SourceFile};
use crate::ty::{Type, pointer_to};

pub struct TypeChecker<'a> {
  file: SourceFile<'a>,
  symbols: Symbols<'a>,
}

impl<'a> TypeChecker<'a> {
  pub fn new(file: SourceFile<'a>, symbols: Symbols<'a>) -> Self {
    Self { file, symbols }
  }

  pub fn add_type(&self, node: &mut Node) -> CompileResult<()> {
    if node.ty.is_some() {
      return Ok(());
    }

    match &mut node.kind {
      NodeKind::Num { .. } | NodeKind::Var { .. } => {}
      NodeKind::Neg { operand } | NodeKind::Addr { operand } | NodeKind::Deref { operand } => {
        self.add_type(operand)?;
      }
      NodeKind::Binary { lhs, rhs, .. } | NodeKind::Assign { lhs, rhs } => {
        self.add_type(lhs)?;
        self.add_type(rhs)?;
      }
      NodeKind::FunCall { args, .. } => {
        for arg in args {
          self.add_type(arg)?;
        }
      }
      NodeKind::ExprStmt { expr } => self.add_type(expr)?,
      NodeKind::Return { value } => self.add_type(value)?,
      NodeKind::Block { body } => {
        for stmt in body {
          self.add_type(stmt)?;
        }
      }
      NodeKind::If { cond, then, els } => {
        self.add_type(cond)?;
        self.add_type(then)?;
        if let Some(els) = els {
          self.add_type(els)?;
        }
      }
      NodeKind::For {
        init,
        cond,
        inc,
        body,
      } => {
        for part in [init, cond, inc].into_iter().flatten() {
          self.add_type(part)?;
        }
        self.add_type(body)?;
      }
    }

    node.ty = self.resolve(node)?;
    Ok(())
  }

  /// Type of `node` given that its children are already typed. Statements
  /// resolve to `None`.
  fn resolve(&self, node: &Node) -> CompileResult<Option<Type>> {
    let ty = match &node.kind {
      NodeKind::Binary {
        op: BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div,
        lhs,
        ..
      } => self.type_of(lhs)?.clone(),
      NodeKind::Neg { operand } => self.type_of(operand)?.clone(),
      NodeKind::Assign { lhs, .. } => {
        let lhs_ty = self.type_of(lhs)?;
        if !lhs.is_lvalue() || lhs_ty.is_array() {
          return Err(CompileError::at(self.file, lhs.loc, "not an lvalue"));
        }
        lhs_ty.clone()
      }
      NodeKind::Binary { .. } | NodeKind::Num { .. } | NodeKind::FunCall { .. } => Type::int(),
      NodeKind::Var { var } => self.symbols.get(*var).ty.clone(),
      NodeKind::Addr { operand } => {
        if !operand.is_lvalue() {
          return Err(CompileError::at(self.file, operand.loc, "not an lvalue"));
        }
        let operand_ty = self.type_of(operand)?;
        match operand_ty.base() {
          Some(elem) if operand_ty.is_array() => pointer_to(elem.clone()),
          _ => pointer_to(operand_ty.clone()),
        }
      }
      NodeKind::Deref { operand } => match self.type_of(operand)?.base() {
        Some(base) => base.clone(),
        None => {
          return Err(CompileError::at(
            self.file,
            node.loc,
            "invalid pointer dereference",
          ));
        }
      },
      NodeKind::ExprStmt { .. }
      | NodeKind::Return { .. }
      | NodeKind::Block { .. }
      | NodeKind::If { .. }
      | NodeKind::For { .. } => return Ok(None),
    };
    Ok(Some(ty))
  }

  fn type_of<'n>(&self, node: &'n Node) -> CompileResult<&'n Type> {
    node
      .ty
      .as_ref()
      .ok_or_else(|| CompileError::at(self.file, node.loc, "expected an expression"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::{Obj, VarRef};
  use crate::ty::array_of;
  use pretty_assertions::assert_eq;

  const SRC: &str = "x = y;";

  fn check(node: &mut Node, locals: &[Obj]) -> CompileResult<()> {
    TypeChecker::new(SourceFile::new("t.go", SRC), Symbols::new(locals, &[])).add_type(node)
  }

  fn locals() -> Vec<Obj> {
    vec![
      Obj::new("x", Type::int()),
      Obj::new("p", pointer_to(Type::char())),
      Obj::new("a", array_of(Type::int(), 4)),
    ]
  }

  #[test]
  fn comparisons_and_calls_are_int() {
    let mut node = Node::binary(
      BinaryOp::Lt,
      Node::var(VarRef::Local(1), 0),
      Node::var(VarRef::Local(1), 0),
      0,
    );
    check(&mut node, &locals()).unwrap();
    assert_eq!(node.ty, Some(Type::int()));

    let mut call = Node::new(
      NodeKind::FunCall {
        name: "f".into(),
        args: vec![Node::var(VarRef::Local(2), 0)],
      },
      0,
    );
    check(&mut call, &locals()).unwrap();
    assert_eq!(call.ty, Some(Type::int()));
  }

  #[test]
  fn address_of_array_decays_to_element_pointer() {
    let mut node = Node::addr(Node::var(VarRef::Local(2), 0), 0);
    check(&mut node, &locals()).unwrap();
    assert_eq!(node.ty, Some(pointer_to(Type::int())));

    let mut node = Node::addr(Node::var(VarRef::Local(0), 0), 0);
    check(&mut node, &locals()).unwrap();
    assert_eq!(node.ty, Some(pointer_to(Type::int())));
  }

  #[test]
  fn dereference_takes_the_base_type() {
    let mut node = Node::deref(Node::var(VarRef::Local(1), 0), 0);
    check(&mut node, &locals()).unwrap();
    assert_eq!(node.ty, Some(Type::char()));

    let mut node = Node::deref(Node::var(VarRef::Local(0), 0), 0);
    let err = check(&mut node, &locals()).unwrap_err();
    assert_eq!(err.message(), "invalid pointer dereference");
  }

  #[test]
  fn assignment_to_array_is_rejected() {
    let mut node = Node::assign(
      Node::var(VarRef::Local(2), 0),
      Node::number(1, 4),
      2,
    );
    let err = check(&mut node, &locals()).unwrap_err();
    assert_eq!(err.message(), "not an lvalue");
  }

  #[test]
  fn address_of_rvalue_is_rejected() {
    let mut node = Node::addr(Node::number(1, 0), 0);
    let err = check(&mut node, &locals()).unwrap_err();
    assert_eq!(err.message(), "not an lvalue");
  }

  #[test]
  fn existing_types_are_kept() {
    let mut node = Node::var(VarRef::Local(0), 0);
    node.ty = Some(Type::char());
    check(&mut node, &locals()).unwrap();
    assert_eq!(node.ty, Some(Type::char()));
  }

  #[test]
  fn statements_stay_untyped_but_children_are_typed() {
    let mut stmt = Node::expr_stmt(Node::var(VarRef::Local(1), 0), 0);
    check(&mut stmt, &locals()).unwrap();
    assert_eq!(stmt.ty, None);
    let NodeKind::ExprStmt { expr } = &stmt.kind else {
      panic!("expected an expression statement");
    };
    assert_eq!(expr.ty, Some(pointer_to(Type::char())));
  }
}
