#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
  Char,
  Int,
  Ptr,
  Array,
  Func,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
  pub kind: TypeKind,
  pub size: i64,
  pub base: Option<Box<Type>>,
  pub array_len: i64,
  pub return_ty: Option<Box<Type>>,
  pub params: Vec<Type>,
}

impl Type {
  fn scalar(kind: TypeKind, size: i64) -> Self {
    Self {
      kind,
      size,
      base: None,
      array_len: 0,
      return_ty: None,
      params: Vec::new(),
    }
  }

  pub fn char() -> Self {
    Self::scalar(TypeKind::Char, 1)
  }

  pub fn int() -> Self {
    Self::scalar(TypeKind::Int, 8)
  }

  pub fn pointer_to(base: Type) -> Self {
    Self {
      base: Some(Box::new(base)),
      ..Self::scalar(TypeKind::Ptr, 8)
    }
  }

  pub fn array_of(base: Type, len: i64) -> Self {
    Self {
      size: base.size * len,
      array_len: len,
      base: Some(Box::new(base)),
      ..Self::scalar(TypeKind::Array, 0)
    }
  }

  pub fn func(return_ty: Type, params: Vec<Type>) -> Self {
    Self {
      return_ty: Some(Box::new(return_ty)),
      params,
      ..Self::scalar(TypeKind::Func, 0)
    }
  }

  pub fn is_integer(&self) -> bool {
    matches!(self.kind, TypeKind::Char | TypeKind::Int)
  }

  pub fn is_pointer(&self) -> bool {
    matches!(self.kind, TypeKind::Ptr)
  }

  pub fn is_array(&self) -> bool {
    matches!(self.kind, TypeKind::Array)
  }

  /// Declared result of a function type.
  pub fn return_type(&self) -> Option<&Type> {
    self.return_ty.as_deref()
  }

  /// Declared parameters of a function type, empty for anything else.
  pub fn param_types(&self) -> &[Type] {
    &self.params
  }

  /// Pointee of a pointer or element of an array.
  pub fn base(&self) -> Option<&Type> {
    self.base.as_deref()
  }
}

pub fn pointer_to(base: Type) -> Type {
  Type::pointer_to(base)
}

pub fn array_of(base: Type, len: i64) -> Type {
  Type::array_of(base, len)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn array_size_multiplies_element_size() {
    let ty = array_of(array_of(Type::int(), 3), 2);
    assert_eq!(ty.size, 48);
    assert_eq!(ty.array_len, 2);
    assert_eq!(ty.base().map(|b| b.size), Some(24));
    assert_eq!(array_of(Type::char(), 5).size, 5);
  }

  #[test]
  fn pointers_and_arrays_have_a_base() {
    assert!(pointer_to(Type::char()).base().is_some());
    assert!(array_of(Type::int(), 1).base().is_some());
    assert!(Type::int().base().is_none());
    assert!(Type::char().is_integer());
    assert!(!pointer_to(Type::int()).is_integer());
  }

  #[test]
  fn equality_is_structural() {
    assert_eq!(pointer_to(Type::int()), pointer_to(Type::int()));
    assert_ne!(pointer_to(Type::int()), pointer_to(Type::char()));
  }
}
