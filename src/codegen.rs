//! Code generation: lower the typed AST into Intel-syntax x86-64 assembly.
//!
//! The emitter is a simple stack machine: every expression leaves its value
//! in `rax`, and binary operators park the right operand on the machine stack
//! while the left one is computed. `depth` tracks those pushes and must be
//! back to zero at the end of every statement. Locals live on the stack frame
//! and are addressed relative to `%rbp`.

use log::debug;

use crate::ast::{BinaryOp, Function, InitData, Node, NodeKind, Obj, Program, Symbols, VarRef};
use crate::ty::{Type, TypeKind};

const ARG_REGS_64: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];
const ARG_REGS_8: [&str; 6] = ["dil", "sil", "dl", "cl", "r8b", "r9b"];

/// Emit assembly for a whole program. Assigns every local's frame offset and
/// every function's stack size on the way.
pub fn generate(program: &mut Program) -> String {
  for func in &mut program.functions {
    assign_lvar_offsets(func);
  }

  let mut codegen = CodeGen::new();
  codegen.emit(".intel_syntax noprefix");
  codegen.emit_data(&program.globals);
  for func in &program.functions {
    codegen.emit_function(func, &program.globals);
  }

  debug!("emitted {} bytes of assembly", codegen.asm.len());
  codegen.asm
}

/// Lay locals out below `rbp` in declaration order and round the frame up
/// to the 16 bytes the ABI requires at call sites.
pub fn assign_lvar_offsets(func: &mut Function) {
  let mut offset = 0;
  for var in &mut func.locals {
    offset += var.ty.size;
    var.offset = -offset;
  }
  func.stack_size = align_to(offset, 16);
  debug!("frame of {}: {} bytes", func.name, func.stack_size);
}

/// Round `n` up to the nearest multiple of `align`.
pub fn align_to(n: i64, align: i64) -> i64 {
  (n + align - 1) / align * align
}

struct CodeGen<'p> {
  asm: String,
  depth: usize,
  label_count: usize,
  func_name: String,
  /// Narrow `return` values to a byte for functions declared to return char.
  returns_char: bool,
  symbols: Symbols<'p>,
}

impl<'p> CodeGen<'p> {
  fn new() -> Self {
    Self {
      asm: String::new(),
      depth: 0,
      label_count: 0,
      func_name: String::new(),
      returns_char: false,
      symbols: Symbols::new(&[], &[]),
    }
  }

  fn emit(&mut self, line: &str) {
    self.asm.push_str(line);
    self.asm.push('\n');
  }

  fn next_label(&mut self) -> usize {
    self.label_count += 1;
    self.label_count
  }

  fn push(&mut self) {
    self.emit("    push rax");
    self.depth += 1;
  }

  fn pop(&mut self, reg: &str) {
    self.emit(&format!("    pop {reg}"));
    self.depth -= 1;
  }

  fn emit_data(&mut self, globals: &[Obj]) {
    for var in globals {
      self.emit("    .data");
      self.emit(&format!("    .globl {}", var.name));
      self.emit(&format!("{}:", var.name));
      match &var.init_data {
        Some(InitData::Bytes(bytes)) => {
          for byte in bytes {
            self.emit(&format!("    .byte {byte}"));
          }
          let padding = var.ty.size - bytes.len() as i64;
          if padding > 0 {
            self.emit(&format!("    .zero {padding}"));
          }
        }
        Some(InitData::Label(label)) => self.emit(&format!("    .quad {label}")),
        None => self.emit(&format!("    .zero {}", var.ty.size)),
      }
    }
  }

  fn emit_function(&mut self, func: &'p Function, globals: &'p [Obj]) {
    self.symbols = Symbols::new(&func.locals, globals);
    self.func_name = func.name.clone();
    self.returns_char = func
      .ty
      .return_type()
      .is_some_and(|ty| ty.kind == TypeKind::Char);

    self.emit(&format!("    .globl {}", func.name));
    self.emit("    .text");
    self.emit(&format!("{}:", func.name));

    // Prologue
    self.emit("    push rbp");
    self.emit("    mov rbp, rsp");
    self.emit(&format!("    sub rsp, {}", func.stack_size));

    // Spill register arguments into their frame slots.
    for (i, (&param, ty)) in func.params.iter().zip(func.ty.param_types()).enumerate() {
      let var = &func.locals[param];
      let reg = if ty.size == 1 {
        ARG_REGS_8[i]
      } else {
        ARG_REGS_64[i]
      };
      self.emit(&format!("    mov [rbp{:+}], {reg}", var.offset));
    }

    self.emit_stmt(&func.body);

    // Epilogue
    self.emit(&format!(".L.return.{}:", func.name));
    self.emit("    mov rsp, rbp");
    self.emit("    pop rbp");
    self.emit("    ret");
  }

  fn emit_stmt(&mut self, node: &Node) {
    match &node.kind {
      NodeKind::If { cond, then, els } => {
        let c = self.next_label();
        self.emit_expr(cond);
        self.emit("    cmp rax, 0");
        self.emit(&format!("    je .L.else.{c}"));
        self.emit_stmt(then);
        self.emit(&format!("    jmp .L.end.{c}"));
        self.emit(&format!(".L.else.{c}:"));
        if let Some(els) = els {
          self.emit_stmt(els);
        }
        self.emit(&format!(".L.end.{c}:"));
      }
      NodeKind::For {
        init,
        cond,
        inc,
        body,
      } => {
        let c = self.next_label();
        if let Some(init) = init {
          self.emit_expr(init);
        }
        self.emit(&format!(".L.begin.{c}:"));
        if let Some(cond) = cond {
          self.emit_expr(cond);
          self.emit("    cmp rax, 0");
          self.emit(&format!("    je .L.end.{c}"));
        }
        self.emit_stmt(body);
        if let Some(inc) = inc {
          self.emit_expr(inc);
        }
        self.emit(&format!("    jmp .L.begin.{c}"));
        self.emit(&format!(".L.end.{c}:"));
      }
      NodeKind::Block { body } => {
        for stmt in body {
          self.emit_stmt(stmt);
        }
      }
      NodeKind::Return { value } => {
        self.emit_expr(value);
        if self.returns_char {
          self.emit("    movsx rax, al");
        }
        self.emit(&format!("    jmp .L.return.{}", self.func_name));
      }
      NodeKind::ExprStmt { expr } => self.emit_expr(expr),
      NodeKind::Num { .. }
      | NodeKind::Var { .. }
      | NodeKind::Neg { .. }
      | NodeKind::Addr { .. }
      | NodeKind::Deref { .. }
      | NodeKind::Binary { .. }
      | NodeKind::Assign { .. }
      | NodeKind::FunCall { .. } => unreachable!("expression used as a statement"),
    }

    assert_eq!(
      self.depth, 0,
      "evaluation stack unbalanced after statement at offset {}",
      node.loc
    );
  }

  /// Compute the absolute address of an lvalue into `rax`.
  fn emit_addr(&mut self, node: &Node) {
    match &node.kind {
      NodeKind::Var { var } => match *var {
        VarRef::Local(_) => {
          let offset = self.symbols.get(*var).offset;
          self.emit(&format!("    lea rax, [rbp{offset:+}]"));
        }
        VarRef::Global(_) => {
          let name = &self.symbols.get(*var).name;
          self.emit(&format!("    lea rax, [rip+{name}]"));
        }
      },
      NodeKind::Deref { operand } => self.emit_expr(operand),
      _ => unreachable!("not an lvalue"),
    }
  }

  /// Load the value `rax` points to. An array's value is its address.
  fn load(&mut self, ty: Option<&Type>) {
    match ty {
      Some(ty) if ty.is_array() => {}
      Some(ty) if ty.size == 1 => self.emit("    movsx rax, byte ptr [rax]"),
      _ => self.emit("    mov rax, [rax]"),
    }
  }

  /// Store `rax` to the address on top of the stack.
  fn store(&mut self, ty: Option<&Type>) {
    self.pop("rdi");
    match ty {
      Some(ty) if ty.size == 1 => self.emit("    mov [rdi], al"),
      _ => self.emit("    mov [rdi], rax"),
    }
  }

  fn emit_expr(&mut self, node: &Node) {
    match &node.kind {
      NodeKind::Num { value } => self.emit(&format!("    mov rax, {value}")),
      NodeKind::Neg { operand } => {
        self.emit_expr(operand);
        self.emit("    neg rax");
      }
      NodeKind::Var { .. } => {
        self.emit_addr(node);
        self.load(node.ty.as_ref());
      }
      NodeKind::Deref { operand } => {
        self.emit_expr(operand);
        self.load(node.ty.as_ref());
      }
      NodeKind::Addr { operand } => self.emit_addr(operand),
      NodeKind::Assign { lhs, rhs } => {
        self.emit_addr(lhs);
        self.push();
        self.emit_expr(rhs);
        self.store(node.ty.as_ref());
      }
      NodeKind::FunCall { name, args } => self.emit_funcall(name, args),
      NodeKind::Binary { op, lhs, rhs } => {
        self.emit_expr(rhs);
        self.push();
        self.emit_expr(lhs);
        self.pop("rdi");

        match op {
          BinaryOp::Add => self.emit("    add rax, rdi"),
          BinaryOp::Sub => self.emit("    sub rax, rdi"),
          BinaryOp::Mul => self.emit("    imul rax, rdi"),
          BinaryOp::Div => {
            self.emit("    cqo");
            self.emit("    idiv rdi");
          }
          BinaryOp::Eq => self.emit_cmp("sete"),
          BinaryOp::Ne => self.emit_cmp("setne"),
          BinaryOp::Lt => self.emit_cmp("setl"),
          BinaryOp::Le => self.emit_cmp("setle"),
        }
      }
      NodeKind::ExprStmt { .. }
      | NodeKind::Return { .. }
      | NodeKind::Block { .. }
      | NodeKind::If { .. }
      | NodeKind::For { .. } => unreachable!("statement used as an expression"),
    }
  }

  fn emit_cmp(&mut self, set: &str) {
    self.emit("    cmp rax, rdi");
    self.emit(&format!("    {set} al"));
    self.emit("    movzb rax, al");
  }

  fn emit_funcall(&mut self, name: &str, args: &[Node]) {
    for arg in args {
      self.emit_expr(arg);
      self.push();
    }
    for reg in ARG_REGS_64[..args.len()].iter().rev() {
      self.pop(reg);
    }

    self.emit("    mov rax, 0");
    // rsp is 16-byte aligned at statement boundaries; pending pushes of an
    // enclosing expression may have moved it by 8.
    if self.depth % 2 == 1 {
      self.emit("    sub rsp, 8");
      self.emit(&format!("    call {name}"));
      self.emit("    add rsp, 8");
    } else {
      self.emit(&format!("    call {name}"));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ty::array_of;
  use pretty_assertions::assert_eq;

  fn function(locals: Vec<Obj>) -> Function {
    Function {
      name: "f".into(),
      ty: Type::func(Type::int(), Vec::new()),
      params: Vec::new(),
      locals,
      body: Node::block(Vec::new(), 0),
      stack_size: 0,
    }
  }

  #[test]
  fn aligns_up_to_multiple() {
    assert_eq!(align_to(0, 16), 0);
    assert_eq!(align_to(1, 16), 16);
    assert_eq!(align_to(16, 16), 16);
    assert_eq!(align_to(17, 16), 32);
  }

  #[test]
  fn locals_get_decreasing_offsets_and_aligned_frame() {
    let mut func = function(vec![
      Obj::new("a", Type::int()),
      Obj::new("b", Type::char()),
      Obj::new("c", array_of(Type::int(), 3)),
    ]);
    assign_lvar_offsets(&mut func);
    let offsets: Vec<_> = func.locals.iter().map(|var| var.offset).collect();
    assert_eq!(offsets, vec![-8, -9, -33]);
    assert_eq!(func.stack_size, 48);
  }

  #[test]
  fn empty_frame_is_zero() {
    let mut func = function(Vec::new());
    assign_lvar_offsets(&mut func);
    assert_eq!(func.stack_size, 0);
  }

  #[test]
  fn globals_without_initializer_are_zero_filled() {
    let mut program = Program {
      globals: vec![Obj::new("buf", array_of(Type::char(), 10))],
      functions: Vec::new(),
    };
    let asm = generate(&mut program);
    assert_eq!(
      asm,
      ".intel_syntax noprefix\n    .data\n    .globl buf\nbuf:\n    .zero 10\n"
    );
  }

  #[test]
  fn short_initializers_are_padded_with_zeros() {
    let mut var = Obj::new("s", array_of(Type::char(), 6));
    var.init_data = Some(InitData::Bytes(vec![104, 105, 0]));
    let mut program = Program {
      globals: vec![var],
      functions: Vec::new(),
    };
    let asm = generate(&mut program);
    assert!(asm.ends_with("s:\n    .byte 104\n    .byte 105\n    .byte 0\n    .zero 3\n"));
  }

  #[test]
  fn char_functions_narrow_their_return_value() {
    let mut func = function(Vec::new());
    func.ty = Type::func(Type::char(), Vec::new());
    let ret = Node::new(
      NodeKind::Return {
        value: Box::new(Node::number(300, 0)),
      },
      0,
    );
    func.body = Node::block(vec![ret], 0);
    let mut program = Program {
      globals: Vec::new(),
      functions: vec![func],
    };
    let asm = generate(&mut program);
    assert!(asm.contains("    mov rax, 300\n    movsx rax, al\n    jmp .L.return.f\n"));
  }

  #[test]
  fn globals_with_bytes_emit_byte_directives() {
    let mut var = Obj::new("s", array_of(Type::char(), 3));
    var.init_data = Some(InitData::Bytes(vec![104, 105, 0]));
    let mut program = Program {
      globals: vec![var],
      functions: Vec::new(),
    };
    let asm = generate(&mut program);
    assert!(asm.ends_with("s:\n    .byte 104\n    .byte 105\n    .byte 0\n"));
  }
}
