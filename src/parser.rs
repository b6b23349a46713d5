//! Recursive-descent parser producing the program's symbol tables and ASTs.
//!
//! The parser mirrors the classic chibicc structure: one method per
//! nonterminal, a precedence-climbing set of expression helpers and a
//! statement layer on top. Identifiers are resolved against a stack of
//! lexical scopes while parsing, and every completed statement is run
//! through the type checker so pointer arithmetic can be scaled as soon as
//! it is built.

use log::debug;

use crate::ast::{BinaryOp, Function, InitData, Node, NodeKind, Obj, Program, Symbols, VarRef};
use crate::error::{CompileError, CompileResult, SourceFile};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};
use crate::ty::{Type, TypeKind, array_of, pointer_to};
use crate::typecheck::TypeChecker;

/// Registers available for passing arguments; there is no stack spill path.
pub const MAX_ARGS: usize = 6;

const STRING_LITERAL_PREFIX: &str = ".L..";

/// Largest object the generated code can address with a 32-bit displacement.
const MAX_OBJECT_SIZE: i64 = i32::MAX as i64;

/// Names the assembler reads as registers or operators in Intel syntax, so
/// they cannot label a global or a function.
const RESERVED_SYMBOLS: &[&str] = &[
  "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp", "r8", "r9", "r10", "r11", "r12", "r13",
  "r14", "r15", "eax", "ebx", "ecx", "edx", "esi", "edi", "ebp", "esp", "r8d", "r9d", "r10d",
  "r11d", "r12d", "r13d", "r14d", "r15d", "ax", "bx", "cx", "dx", "si", "di", "bp", "sp", "r8w",
  "r9w", "r10w", "r11w", "r12w", "r13w", "r14w", "r15w", "al", "bl", "cl", "dl", "sil", "dil",
  "bpl", "spl", "ah", "bh", "ch", "dh", "r8b", "r9b", "r10b", "r11b", "r12b", "r13b", "r14b",
  "r15b", "rip", "eip", "cs", "ds", "es", "fs", "gs", "ss", "byte", "word", "dword", "qword",
  "ptr", "offset", "flat", "and", "or", "xor", "not", "mod", "shl", "shr",
];

/// Parse a whole translation unit.
pub fn parse(tokens: Vec<Token>, file: SourceFile<'_>) -> CompileResult<Program> {
  Parser::new(tokens, file).program()
}

/// One lexical block's bindings, oldest first.
#[derive(Debug, Default)]
struct Scope {
  vars: Vec<(String, VarRef)>,
}

/// A name being declared, with the pointer levels written in front of it.
struct DeclName {
  name: String,
  loc: usize,
  ptr_depth: usize,
}

/// Mutable state of one compilation's front end.
struct Parser<'a> {
  stream: TokenStream<'a>,
  scopes: Vec<Scope>,
  /// Locals of the function currently being parsed.
  locals: Vec<Obj>,
  globals: Vec<Obj>,
  functions: Vec<Function>,
  unique_id: usize,
}

impl<'a> Parser<'a> {
  fn new(tokens: Vec<Token>, file: SourceFile<'a>) -> Self {
    Self {
      stream: TokenStream::new(tokens, file),
      scopes: vec![Scope::default()],
      locals: Vec::new(),
      globals: Vec::new(),
      functions: Vec::new(),
      unique_id: 0,
    }
  }

  fn file(&self) -> SourceFile<'a> {
    self.stream.file
  }

  fn error_at(&self, loc: usize, message: impl Into<String>) -> CompileError {
    CompileError::at(self.file(), loc, message)
  }

  fn add_type(&self, node: &mut Node) -> CompileResult<()> {
    let symbols = Symbols::new(&self.locals, &self.globals);
    TypeChecker::new(self.file(), symbols).add_type(node)
  }

  //
  // Scopes and symbols
  //

  fn enter_scope(&mut self) {
    self.scopes.push(Scope::default());
  }

  fn leave_scope(&mut self) {
    self.scopes.pop();
  }

  fn bind(&mut self, name: String, var: VarRef) {
    if let Some(scope) = self.scopes.last_mut() {
      scope.vars.push((name, var));
    }
  }

  fn find_var(&self, name: &str) -> Option<VarRef> {
    self.scopes.iter().rev().find_map(|scope| {
      scope
        .vars
        .iter()
        .rev()
        .find(|(bound, _)| bound == name)
        .map(|(_, var)| *var)
    })
  }

  fn new_lvar(&mut self, name: String, ty: Type) -> usize {
    let index = self.locals.len();
    self.locals.push(Obj::new(name.clone(), ty));
    self.bind(name, VarRef::Local(index));
    index
  }

  fn new_gvar(&mut self, name: String, ty: Type, init_data: Option<InitData>) -> usize {
    let index = self.globals.len();
    let mut var = Obj::new(name.clone(), ty);
    var.init_data = init_data;
    self.globals.push(var);
    self.bind(name, VarRef::Global(index));
    index
  }

  /// Reject a global or function name the assembler cannot take as a label
  /// or one that another top-level symbol already owns.
  fn check_symbol_name(&self, name: &str, loc: usize) -> CompileResult<()> {
    if RESERVED_SYMBOLS.contains(&name) {
      return Err(self.error_at(loc, format!("\"{name}\" is reserved by the assembler")));
    }
    let is_global = self
      .globals
      .iter()
      .any(|var| var.name == name && !var.name.starts_with(STRING_LITERAL_PREFIX));
    if is_global || self.functions.iter().any(|func| func.name == name) {
      return Err(self.error_at(loc, format!("redefinition of \"{name}\"")));
    }
    Ok(())
  }

  fn new_string_literal(&mut self, data: Vec<u8>, ty: Type) -> usize {
    let name = format!("{STRING_LITERAL_PREFIX}{}", self.unique_id);
    self.unique_id += 1;
    let index = self.globals.len();
    let mut var = Obj::new(name, ty);
    var.init_data = Some(InitData::Bytes(data));
    self.globals.push(var);
    index
  }

  //
  // Declarations
  //

  // program = (function | global-var)*
  fn program(mut self) -> CompileResult<Program> {
    while !self.stream.is_eof() {
      if self.stream.equal("func") {
        self.function()?;
        continue;
      }
      if self.stream.equal("var") {
        self.global_var()?;
        continue;
      }
      let got = self.stream.describe_current();
      return Err(self.error_at(
        self.stream.loc(),
        format!("expected \"func\" or \"var\", but got \"{got}\""),
      ));
    }

    debug!(
      "parsed {} functions and {} globals",
      self.functions.len(),
      self.globals.len()
    );
    Ok(Program {
      globals: self.globals,
      functions: self.functions,
    })
  }

  // function = "func" ident "(" params ")" type "{" compound-stmt
  // params   = (ident type ("," ident type)*)?
  fn function(&mut self) -> CompileResult<()> {
    let (name, loc) = self.stream.get_ident()?;
    if self.functions.iter().any(|func| func.name == name) {
      return Err(self.error_at(loc, format!("redefinition of function \"{name}\"")));
    }
    self.check_symbol_name(&name, loc)?;

    self.locals.clear();
    self.enter_scope();

    self.stream.skip("(")?;
    let mut params = Vec::new();
    let mut param_tys = Vec::new();
    if !self.stream.equal(")") {
      loop {
        if params.len() == MAX_ARGS {
          return Err(self.error_at(self.stream.loc(), "too many parameters"));
        }
        let (param, _) = self.stream.get_ident()?;
        // Arrays are passed by address.
        let mut ty = self.declarator()?;
        if ty.is_array()
          && let Some(elem) = ty.base()
        {
          ty = pointer_to(elem.clone());
        }
        param_tys.push(ty.clone());
        params.push(self.new_lvar(param, ty));
        if self.stream.equal(")") {
          break;
        }
        self.stream.skip(",")?;
      }
    }
    let return_ty = self.declarator()?;

    let body_loc = self.stream.loc();
    self.stream.skip("{")?;
    let body = self.compound_stmt(body_loc)?;
    self.leave_scope();

    let frame = self
      .locals
      .iter()
      .try_fold(0i64, |acc, var| acc.checked_add(var.ty.size))
      .filter(|size| *size <= MAX_OBJECT_SIZE);
    if frame.is_none() {
      return Err(self.error_at(loc, format!("stack frame of \"{name}\" is too large")));
    }

    let locals = std::mem::take(&mut self.locals);
    debug!(
      "parsed function {name}: {} params, {} locals",
      params.len(),
      locals.len()
    );
    self.functions.push(Function {
      name,
      ty: Type::func(return_ty, param_tys),
      params,
      locals,
      body,
      stack_size: 0,
    });
    Ok(())
  }

  // global-var = "var" decl-names type ("=" expr ("," expr)*)? ";"
  fn global_var(&mut self) -> CompileResult<()> {
    let names = self.decl_names()?;
    let ty = self.declarator()?;
    let inits = self.initializers(names.len())?;

    let mut inits = inits.into_iter();
    for decl in names {
      self.check_symbol_name(&decl.name, decl.loc)?;
      let var_ty = wrap_pointers(ty.clone(), decl.ptr_depth);
      let init_data = match inits.next() {
        Some(init) => Some(self.eval_initializer(&init, &var_ty)?),
        None => None,
      };
      self.new_gvar(decl.name, var_ty, init_data);
    }
    Ok(())
  }

  // declaration = "var" decl-names type ("=" expr ("," expr)*)? ";"
  //
  // Initializers become assignment statements. They are parsed before the
  // names are bound, so `var x int = x` reads an outer `x`.
  fn declaration(&mut self, loc: usize) -> CompileResult<Node> {
    let names = self.decl_names()?;
    let ty = self.declarator()?;
    let inits = self.initializers(names.len())?;

    let mut body = Vec::new();
    let mut inits = inits.into_iter();
    for decl in names {
      let index = self.new_lvar(decl.name, wrap_pointers(ty.clone(), decl.ptr_depth));
      if let Some(init) = inits.next() {
        let lhs = Node::var(VarRef::Local(index), decl.loc);
        let init_loc = init.loc;
        body.push(Node::expr_stmt(Node::assign(lhs, init, init_loc), init_loc));
      }
    }
    Ok(Node::block(body, loc))
  }

  // ("=" expr ("," expr)*)? ";"
  fn initializers(&mut self, expected: usize) -> CompileResult<Vec<Node>> {
    let mut inits = Vec::new();
    if self.stream.equal("=") {
      let loc = self.stream.loc();
      loop {
        inits.push(self.expr()?);
        if !self.stream.equal(",") {
          break;
        }
      }
      if inits.len() != expected {
        return Err(self.error_at(
          loc,
          format!(
            "assignment mismatch: {expected} variables but {} values",
            inits.len()
          ),
        ));
      }
    }
    self.stream.skip(";")?;
    Ok(inits)
  }

  // decl-names = "*"* ident ("," "*"* ident)*
  fn decl_names(&mut self) -> CompileResult<Vec<DeclName>> {
    let mut names = Vec::new();
    loop {
      let mut ptr_depth = 0;
      while self.stream.equal("*") {
        ptr_depth += 1;
      }
      let (name, loc) = self.stream.get_ident()?;
      names.push(DeclName {
        name,
        loc,
        ptr_depth,
      });
      if !self.stream.equal(",") {
        return Ok(names);
      }
    }
  }

  // type = "[" num "]" type | "*"* ("int" | "char")
  fn declarator(&mut self) -> CompileResult<Type> {
    if self.stream.equal("[") {
      let (len, loc) = self.stream.get_number()?;
      self.stream.skip("]")?;
      let base = self.declarator()?;
      let fits = base
        .size
        .checked_mul(len)
        .is_some_and(|size| size <= MAX_OBJECT_SIZE);
      if !fits {
        return Err(self.error_at(loc, "array too large"));
      }
      return Ok(array_of(base, len));
    }

    let mut ptr_depth = 0;
    while self.stream.equal("*") {
      ptr_depth += 1;
    }

    let base = if self.stream.equal("int") {
      Type::int()
    } else if self.stream.equal("char") {
      Type::char()
    } else {
      let got = self.stream.describe_current();
      return Err(self.error_at(
        self.stream.loc(),
        format!("expected a type, but got \"{got}\""),
      ));
    };
    Ok(wrap_pointers(base, ptr_depth))
  }

  /// Fold a global's initializer into the bytes stored in `.data`.
  fn eval_initializer(&self, init: &Node, ty: &Type) -> CompileResult<InitData> {
    if let Some(literal) = self.string_literal(init) {
      let Some(InitData::Bytes(data)) = &literal.init_data else {
        return Err(self.error_at(init.loc, "initializer element is not constant"));
      };
      let is_char_base = ty.base().is_some_and(|base| base.kind == TypeKind::Char);
      if ty.is_pointer() && is_char_base {
        return Ok(InitData::Label(literal.name.clone()));
      }
      if ty.is_array() && is_char_base {
        // The terminating NUL may be dropped when the text fills the array.
        if data.len() as i64 - 1 > ty.size {
          return Err(self.error_at(init.loc, "initializer-string is too long"));
        }
        // Anything past the literal is zero-filled when the data is emitted.
        let len = data.len().min(ty.size as usize);
        return Ok(InitData::Bytes(data[..len].to_vec()));
      }
      return Err(self.error_at(init.loc, "invalid initializer"));
    }

    if !ty.is_integer() && !ty.is_pointer() {
      return Err(self.error_at(init.loc, "invalid initializer"));
    }
    let value = self.eval_const(init)?;
    let bytes = value.to_le_bytes()[..ty.size as usize].to_vec();
    Ok(InitData::Bytes(bytes))
  }

  fn string_literal(&self, node: &Node) -> Option<&Obj> {
    match node.kind {
      NodeKind::Var {
        var: VarRef::Global(index),
      } => self
        .globals
        .get(index)
        .filter(|var| var.name.starts_with(STRING_LITERAL_PREFIX)),
      _ => None,
    }
  }

  fn eval_const(&self, node: &Node) -> CompileResult<i64> {
    match &node.kind {
      NodeKind::Num { value } => Ok(*value),
      NodeKind::Neg { operand } => Ok(self.eval_const(operand)?.wrapping_neg()),
      NodeKind::Binary { op, lhs, rhs } => {
        let lhs = self.eval_const(lhs)?;
        let rhs = self.eval_const(rhs)?;
        Ok(match op {
          BinaryOp::Add => lhs.wrapping_add(rhs),
          BinaryOp::Sub => lhs.wrapping_sub(rhs),
          BinaryOp::Mul => lhs.wrapping_mul(rhs),
          BinaryOp::Div => {
            if rhs == 0 {
              return Err(self.error_at(node.loc, "division by zero in constant expression"));
            }
            lhs.wrapping_div(rhs)
          }
          BinaryOp::Eq => i64::from(lhs == rhs),
          BinaryOp::Ne => i64::from(lhs != rhs),
          BinaryOp::Lt => i64::from(lhs < rhs),
          BinaryOp::Le => i64::from(lhs <= rhs),
        })
      }
      _ => Err(self.error_at(node.loc, "initializer element is not constant")),
    }
  }

  //
  // Statements
  //

  // compound-stmt = (declaration | stmt)* "}"
  fn compound_stmt(&mut self, loc: usize) -> CompileResult<Node> {
    self.enter_scope();
    let mut body = Vec::new();
    while !self.stream.equal("}") {
      let stmt_loc = self.stream.loc();
      let mut node = if self.stream.equal("var") {
        self.declaration(stmt_loc)?
      } else {
        self.stmt()?
      };
      self.add_type(&mut node)?;
      body.push(node);
    }
    self.leave_scope();
    Ok(Node::block(body, loc))
  }

  // stmt = "return" expr ";"
  //      | "if" expr stmt ("else" stmt)?
  //      | "for" (expr? ";" expr? ";" expr?)? stmt
  //      | "for" expr stmt
  //      | "{" compound-stmt
  //      | expr-stmt
  fn stmt(&mut self) -> CompileResult<Node> {
    let loc = self.stream.loc();

    if self.stream.equal("return") {
      let value = self.expr()?;
      self.stream.skip(";")?;
      return Ok(Node::new(
        NodeKind::Return {
          value: Box::new(value),
        },
        loc,
      ));
    }

    if self.stream.equal("if") {
      let cond = self.expr()?;
      let then = self.stmt()?;
      let els = if self.stream.equal("else") {
        Some(Box::new(self.stmt()?))
      } else {
        None
      };
      return Ok(Node::new(
        NodeKind::If {
          cond: Box::new(cond),
          then: Box::new(then),
          els,
        },
        loc,
      ));
    }

    if self.stream.equal("for") {
      return self.for_stmt(loc);
    }

    if self.stream.equal("{") {
      return self.compound_stmt(loc);
    }

    self.expr_stmt()
  }

  fn for_stmt(&mut self, loc: usize) -> CompileResult<Node> {
    let mut init = None;
    let mut cond = None;
    let mut inc = None;

    if !self.stream.check("{") {
      if !self.stream.check(";") {
        init = Some(Box::new(self.expr()?));
      }
      if self.stream.equal(";") {
        if !self.stream.check(";") {
          cond = Some(Box::new(self.expr()?));
        }
        self.stream.skip(";")?;
        if !self.stream.check("{") {
          inc = Some(Box::new(self.expr()?));
        }
      } else {
        // while-style: the only expression is the condition
        cond = init.take();
      }
    }

    let body = self.stmt()?;
    Ok(Node::new(
      NodeKind::For {
        init,
        cond,
        inc,
        body: Box::new(body),
      },
      loc,
    ))
  }

  // expr-stmt = expr? ";"
  fn expr_stmt(&mut self) -> CompileResult<Node> {
    let loc = self.stream.loc();
    if self.stream.equal(";") {
      return Ok(Node::block(Vec::new(), loc));
    }

    let expr = self.expr()?;
    self.stream.skip(";")?;
    Ok(Node::expr_stmt(expr, loc))
  }

  //
  // Expressions
  //

  fn expr(&mut self) -> CompileResult<Node> {
    self.assign()
  }

  // assign = equality ("=" assign)?
  fn assign(&mut self) -> CompileResult<Node> {
    let node = self.equality()?;

    let loc = self.stream.loc();
    if self.stream.equal("=") {
      let rhs = self.assign()?;
      return Ok(Node::assign(node, rhs, loc));
    }

    Ok(node)
  }

  // equality = relational ("==" relational | "!=" relational)*
  fn equality(&mut self) -> CompileResult<Node> {
    let mut node = self.relational()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.punctuator() {
        Some("==") => BinaryOp::Eq,
        Some("!=") => BinaryOp::Ne,
        _ => break,
      };

      self.stream.advance();
      let rhs = self.relational()?;
      node = Node::binary(op, node, rhs, loc);
    }

    Ok(node)
  }

  // relational = add ("<" add | "<=" add | ">" add | ">=" add)*
  fn relational(&mut self) -> CompileResult<Node> {
    let mut node = self.add()?;

    loop {
      let loc = self.stream.loc();
      let (op, swap) = match self.stream.punctuator() {
        Some("<") => (BinaryOp::Lt, false),
        Some("<=") => (BinaryOp::Le, false),
        Some(">") => (BinaryOp::Lt, true),
        Some(">=") => (BinaryOp::Le, true),
        _ => break,
      };

      self.stream.advance();
      let rhs = self.add()?;
      node = if swap {
        Node::binary(op, rhs, node, loc)
      } else {
        Node::binary(op, node, rhs, loc)
      };
    }

    Ok(node)
  }

  // add = mul ("+" mul | "-" mul)*
  fn add(&mut self) -> CompileResult<Node> {
    let mut node = self.mul()?;

    loop {
      let loc = self.stream.loc();
      if self.stream.equal("+") {
        let rhs = self.mul()?;
        node = self.new_add(node, rhs, loc)?;
        continue;
      }
      if self.stream.equal("-") {
        let rhs = self.mul()?;
        node = self.new_sub(node, rhs, loc)?;
        continue;
      }
      return Ok(node);
    }
  }

  // mul = unary ("*" unary | "/" unary)*
  fn mul(&mut self) -> CompileResult<Node> {
    let mut node = self.unary()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.punctuator() {
        Some("*") => BinaryOp::Mul,
        Some("/") => BinaryOp::Div,
        _ => break,
      };

      self.stream.advance();
      let rhs = self.unary()?;
      node = Node::binary(op, node, rhs, loc);
    }

    Ok(node)
  }

  // `+` and `-` on pointers scale the integer operand by the pointee size.
  fn new_add(&self, mut lhs: Node, mut rhs: Node, loc: usize) -> CompileResult<Node> {
    self.add_type(&mut lhs)?;
    self.add_type(&mut rhs)?;

    let (lhs_base, rhs_base) = (base_size(&lhs), base_size(&rhs));
    match (lhs_base, rhs_base) {
      (None, None) => Ok(Node::binary(BinaryOp::Add, lhs, rhs, loc)),
      (Some(_), Some(_)) => Err(self.error_at(loc, "invalid operands")),
      // num + ptr is canonicalized to ptr + num
      (None, Some(size)) => Ok(scaled(BinaryOp::Add, rhs, lhs, size, loc)),
      (Some(size), None) => Ok(scaled(BinaryOp::Add, lhs, rhs, size, loc)),
    }
  }

  fn new_sub(&self, mut lhs: Node, mut rhs: Node, loc: usize) -> CompileResult<Node> {
    self.add_type(&mut lhs)?;
    self.add_type(&mut rhs)?;

    match (base_size(&lhs), base_size(&rhs)) {
      (None, None) => Ok(Node::binary(BinaryOp::Sub, lhs, rhs, loc)),
      (Some(size), None) => Ok(scaled(BinaryOp::Sub, lhs, rhs, size, loc)),
      _ => Err(self.error_at(loc, "invalid operands")),
    }
  }

  // unary = ("+" | "-" | "&" | "*") unary
  //       | postfix
  fn unary(&mut self) -> CompileResult<Node> {
    let loc = self.stream.loc();

    if self.stream.equal("+") {
      return self.unary();
    }
    if self.stream.equal("-") {
      return Ok(Node::neg(self.unary()?, loc));
    }
    if self.stream.equal("&") {
      return Ok(Node::addr(self.unary()?, loc));
    }
    if self.stream.equal("*") {
      return Ok(Node::deref(self.unary()?, loc));
    }

    self.postfix()
  }

  // postfix = primary ("[" expr "]")*
  fn postfix(&mut self) -> CompileResult<Node> {
    let mut node = self.primary()?;

    loop {
      let loc = self.stream.loc();
      if !self.stream.equal("[") {
        return Ok(node);
      }
      let index = self.expr()?;
      self.stream.skip("]")?;
      node = Node::deref(self.new_add(node, index, loc)?, loc);
    }
  }

  // primary = "(" expr ")" | ident ("(" args ")")? | str | num
  fn primary(&mut self) -> CompileResult<Node> {
    let loc = self.stream.loc();

    if self.stream.equal("(") {
      let node = self.expr()?;
      self.stream.skip(")")?;
      return Ok(node);
    }

    match self.stream.peek().map(|token| token.kind) {
      Some(TokenKind::Ident) => {
        let (name, loc) = self.stream.get_ident()?;
        if self.stream.equal("(") {
          return self.funcall(name, loc);
        }
        match self.find_var(&name) {
          Some(var) => Ok(Node::var(var, loc)),
          None => Err(self.error_at(loc, format!("undefined variable \"{name}\""))),
        }
      }
      Some(TokenKind::Str) => {
        let (data, ty) = self.stream.get_string()?;
        let index = self.new_string_literal(data, ty);
        Ok(Node::var(VarRef::Global(index), loc))
      }
      Some(TokenKind::Num) => {
        let (value, loc) = self.stream.get_number()?;
        Ok(Node::number(value, loc))
      }
      _ => {
        let got = self.stream.describe_current();
        Err(self.error_at(loc, format!("expected an expression, but got \"{got}\"")))
      }
    }
  }

  // funcall = ident "(" (assign ("," assign)*)? ")"
  fn funcall(&mut self, name: String, loc: usize) -> CompileResult<Node> {
    if RESERVED_SYMBOLS.contains(&name.as_str()) {
      return Err(self.error_at(loc, format!("\"{name}\" is reserved by the assembler")));
    }
    let mut args = Vec::new();
    if !self.stream.equal(")") {
      loop {
        if args.len() == MAX_ARGS {
          return Err(self.error_at(self.stream.loc(), "too many arguments"));
        }
        args.push(self.assign()?);
        if self.stream.equal(")") {
          break;
        }
        self.stream.skip(",")?;
      }
    }
    Ok(Node::new(NodeKind::FunCall { name, args }, loc))
  }
}

fn wrap_pointers(mut ty: Type, depth: usize) -> Type {
  for _ in 0..depth {
    ty = pointer_to(ty);
  }
  ty
}

/// Element size if the node is pointer- or array-typed.
fn base_size(node: &Node) -> Option<i64> {
  node.ty.as_ref()?.base().map(|base| base.size)
}

/// `ptr op num` with `num` multiplied by the element size.
fn scaled(op: BinaryOp, ptr: Node, num: Node, size: i64, loc: usize) -> Node {
  let num_loc = num.loc;
  let offset = Node::binary(BinaryOp::Mul, num, Node::number(size, num_loc), loc);
  Node::binary(op, ptr, offset, loc)
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  file: SourceFile<'a>,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, file: SourceFile<'a>) -> Self {
    Self {
      tokens,
      file,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn advance(&mut self) {
    if !self.is_eof() {
      self.pos += 1;
    }
  }

  /// Byte offset of the current token, or the end of input.
  fn loc(&self) -> usize {
    self.peek().map_or(self.file.text.len(), |token| token.loc)
  }

  fn describe_current(&self) -> String {
    describe_token(self.peek(), self.file.text)
  }

  /// Text of the current token if it is a punctuator.
  fn punctuator(&self) -> Option<&'a str> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, self.file.text))
  }

  /// Whether the current token is the given punctuator or keyword.
  fn check(&self, op: &str) -> bool {
    self.peek().is_some_and(|token| {
      matches!(token.kind, TokenKind::Punctuator | TokenKind::Keyword)
        && token.len == op.len()
        && token_text(token, self.file.text) == op
    })
  }

  /// Consume the current token if it matches the provided punctuator or keyword.
  fn equal(&mut self, op: &str) -> bool {
    if self.check(op) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let got = self.describe_current();
      Err(CompileError::at(
        self.file,
        self.loc(),
        format!("expected \"{s}\", but got \"{got}\""),
      ))
    }
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i64, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let loc = token.loc;
      let value = token.value.ok_or_else(|| {
        CompileError::at(self.file, loc, "internal error: numeric token missing value")
      })?;
      self.pos += 1;
      return Ok((value, loc));
    }

    let got = self.describe_current();
    Err(CompileError::at(
      self.file,
      self.loc(),
      format!("expected a number, but got \"{got}\""),
    ))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(String, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let ident = token_text(token, self.file.text).to_string();
      let loc = token.loc;
      self.pos += 1;
      return Ok((ident, loc));
    }

    let got = self.describe_current();
    Err(CompileError::at(
      self.file,
      self.loc(),
      format!("expected an identifier, but got \"{got}\""),
    ))
  }

  /// Take the decoded bytes and type of the current string literal.
  fn get_string(&mut self) -> CompileResult<(Vec<u8>, Type)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Str
      && let (Some(data), Some(ty)) = (&token.str_data, &token.ty)
    {
      let literal = (data.clone(), ty.clone());
      self.pos += 1;
      return Ok(literal);
    }

    let got = self.describe_current();
    Err(CompileError::at(
      self.file,
      self.loc(),
      format!("expected a string literal, but got \"{got}\""),
    ))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof) | None)
  }
}
