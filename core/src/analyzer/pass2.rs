//! Pass 2: body type-checking (spec.md §4.3). Walks every function and
//! event body, maintaining a lexical scope stack, the enclosing function's
//! return signature, and a loop-depth counter for `break`/`continue`
//! validation. Every expression node gets exactly one `expr_info` entry,
//! even on error (a placeholder `Void` keeps sibling checks going).

use super::{AnalysisResult, ConstValue, ExprInfo};
use crate::{
    ast::{AssignOp, BinOp, Block, EventDecl, Expr, ExprKind, FuncDecl, Program, Stmt, UnaryOp},
    error::{Diagnostics, Phase},
    types::Type,
    util::{ExprId, Pos, Span},
};
use std::collections::HashMap;

pub fn check_bodies(program: &Program, result: &mut AnalysisResult, errors: &mut Diagnostics) {
    for decl in &program.funcs {
        check_func(decl, result, errors);
    }
    for decl in &program.events {
        check_event(decl, result, errors);
    }
}

struct Checker<'a> {
    result: &'a mut AnalysisResult,
    errors: &'a mut Diagnostics,
    scopes: Vec<HashMap<String, Type>>,
    return_types: Vec<Type>,
    loop_depth: u32,
}

fn check_func(decl: &FuncDecl, result: &mut AnalysisResult, errors: &mut Diagnostics) {
    let info = match result.funcs.get(&decl.name).cloned() {
        Some(info) => info,
        None => return,
    };
    let mut checker = Checker {
        result,
        errors,
        scopes: vec![HashMap::new()],
        return_types: info.return_types.clone(),
        loop_depth: 0,
    };
    for (name, ty) in info.param_names.iter().zip(info.param_types.iter()) {
        checker.declare(name, ty.clone(), decl.span.start);
    }
    checker.check_block(&decl.body);
}

fn check_event(decl: &EventDecl, result: &mut AnalysisResult, errors: &mut Diagnostics) {
    let key = format!("on_{}", decl.name);
    let info = match result.funcs.get(&key).cloned() {
        Some(info) => info,
        None => return,
    };
    let mut checker = Checker {
        result,
        errors,
        scopes: vec![HashMap::new()],
        return_types: Vec::new(),
        loop_depth: 0,
    };
    for (name, ty) in decl.params.iter().map(|p| &p.name).zip(info.param_types.iter()) {
        checker.declare(name, ty.clone(), decl.span.start);
    }
    checker.check_block(&decl.body);
}

impl<'a> Checker<'a> {
    fn declare(&mut self, name: &str, ty: Type, pos: Pos) {
        let scope = self.scopes.last_mut().expect("at least one scope");
        if scope.contains_key(name) {
            self.errors.push(
                Phase::Analyze,
                pos,
                format!("duplicate declaration of '{}' in this scope", name),
            );
            return;
        }
        scope.insert(name.to_string(), ty);
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return Some(ty.clone());
            }
        }
        if let Some(sym) = self.result.symbols.get(name) {
            return Some(sym.ty.clone());
        }
        if let Some(c) = self.result.consts.get(name) {
            return Some(c.ty.clone());
        }
        None
    }

    fn is_const_name(&self, name: &str) -> bool {
        self.scopes.iter().all(|s| !s.contains_key(name))
            && !self.result.symbols.contains_key(name)
            && self.result.consts.contains_key(name)
    }

    fn record(&mut self, id: ExprId, ty: Type, is_lvalue: bool, is_const: bool, const_value: Option<ConstValue>) -> Type {
        self.result
            .expr_info
            .insert(id, ExprInfo { ty: ty.clone(), is_lvalue, is_const, const_value });
        ty
    }

    fn err(&mut self, pos: Pos, message: impl Into<String>) {
        self.errors.push(Phase::Analyze, pos, message);
    }

    fn check_block(&mut self, block: &Block) {
        self.scopes.push(HashMap::new());
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.check_block(block),
            Stmt::Local(decl) => {
                let ty = super::pass1::resolve_type(&decl.ty, &self.result.structs, self.errors, decl.span.start);
                if let Some(init) = &decl.init {
                    let init_ty = self.check_expr(init);
                    if init_ty != ty && init_ty != Type::Void && ty != Type::Void {
                        self.err(
                            decl.span.start,
                            format!(
                                "cannot initialize '{}' of type {} with a value of type {}",
                                decl.name, ty, init_ty
                            ),
                        );
                    }
                }
                self.declare(&decl.name, ty, decl.span.start);
            }
            Stmt::ShortDecl { names, exprs, span } => self.check_short_decl(names, exprs, *span),
            Stmt::Assign { target, op, value, span } => self.check_assign(target, *op, value, *span),
            Stmt::If { cond, then_block, else_branch, .. } => {
                let cond_ty = self.check_expr(cond);
                if cond_ty != Type::Bool {
                    self.err(cond.span.start, "'if' condition must be bool");
                }
                self.check_block(then_block);
                if let Some(else_stmt) = else_branch {
                    self.check_stmt(else_stmt);
                }
            }
            Stmt::For { init, cond, post, body, .. } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    let cond_ty = self.check_expr(cond);
                    if cond_ty != Type::Bool {
                        self.err(cond.span.start, "loop condition must be bool");
                    }
                }
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
                if let Some(post) = post {
                    self.check_stmt(post);
                }
                self.scopes.pop();
            }
            Stmt::Switch { tag, cases, default, .. } => {
                let tag_ty = self.check_expr(tag);
                for (values, body) in cases {
                    for value in values {
                        let value_ty = self.check_expr(value);
                        if value_ty != tag_ty && value_ty != Type::Void && tag_ty != Type::Void {
                            self.err(
                                value.span.start,
                                format!("case value type {} does not match switch tag type {}", value_ty, tag_ty),
                            );
                        }
                    }
                    self.check_block(body);
                }
                if let Some(default) = default {
                    self.check_block(default);
                }
            }
            Stmt::Return { values, span } => {
                if values.len() != self.return_types.len() {
                    self.err(
                        span.start,
                        format!(
                            "expected {} return value(s), found {}",
                            self.return_types.len(),
                            values.len()
                        ),
                    );
                }
                let expected = self.return_types.clone();
                for (i, value) in values.iter().enumerate() {
                    let value_ty = self.check_expr(value);
                    if let Some(expected_ty) = expected.get(i) {
                        if &value_ty != expected_ty && value_ty != Type::Void {
                            self.err(
                                value.span.start,
                                format!("return value {} has type {}, expected {}", i, value_ty, expected_ty),
                            );
                        }
                    }
                }
            }
            Stmt::Break(span) => {
                if self.loop_depth == 0 {
                    self.err(span.start, "'break' outside of a loop");
                }
            }
            Stmt::Continue(span) => {
                if self.loop_depth == 0 {
                    self.err(span.start, "'continue' outside of a loop");
                }
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
        }
    }

    fn check_short_decl(&mut self, names: &[String], exprs: &[Expr], span: Span) {
        if exprs.len() == names.len() {
            for (name, expr) in names.iter().zip(exprs.iter()) {
                let ty = self.check_expr(expr);
                self.declare(name, ty, span.start);
            }
            return;
        }
        if exprs.len() == 1 {
            if let ExprKind::Call(callee, _) = &exprs[0].kind {
                if let Some(info) = self.result.funcs.get(callee.as_str()).cloned() {
                    self.check_expr(&exprs[0]);
                    if info.return_types.len() == names.len() {
                        for (name, ty) in names.iter().zip(info.return_types.iter()) {
                            self.declare(name, ty.clone(), span.start);
                        }
                        return;
                    }
                    self.err(
                        span.start,
                        format!(
                            "'{}' returns {} value(s), cannot bind to {} names",
                            callee,
                            info.return_types.len(),
                            names.len()
                        ),
                    );
                    for name in names {
                        self.declare(name, Type::Void, span.start);
                    }
                    return;
                }
            }
        }
        self.err(
            span.start,
            "short declaration requires one value per name, or a single call returning that many values",
        );
        let _ = self.check_expr(&exprs[0]);
        for name in names {
            self.declare(name, Type::Void, span.start);
        }
    }

    fn check_assign(&mut self, target: &Expr, op: AssignOp, value: &Expr, span: Span) {
        let target_ty = self.check_expr(target);
        let target_info = self.result.expr_info.get(&target.id).cloned();
        let is_lvalue = target_info.map(|i| i.is_lvalue).unwrap_or(false);
        if !is_lvalue {
            self.err(span.start, "assignment target is not an l-value");
        }
        let value_ty = self.check_expr(value);
        match op {
            AssignOp::Assign => {
                if target_ty != value_ty && target_ty != Type::Void && value_ty != Type::Void {
                    self.err(
                        span.start,
                        format!("cannot assign value of type {} to target of type {}", value_ty, target_ty),
                    );
                }
            }
            _ => {
                let bin_op = match op {
                    AssignOp::AddAssign => BinOp::Add,
                    AssignOp::SubAssign => BinOp::Sub,
                    AssignOp::MulAssign => BinOp::Mul,
                    AssignOp::DivAssign => BinOp::Div,
                    AssignOp::Assign => unreachable!(),
                };
                let result_ty = self.arithmetic_result(bin_op, &target_ty, &value_ty, span.start);
                if result_ty != target_ty && result_ty != Type::Void && target_ty != Type::Void {
                    self.err(
                        span.start,
                        format!("compound assignment result type {} does not match target type {}", result_ty, target_ty),
                    );
                }
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Int(v) => self.record(expr.id, Type::Int, false, true, Some(ConstValue::Int(*v))),
            ExprKind::Float(v) => self.record(expr.id, Type::Float, false, true, Some(ConstValue::Float(*v))),
            ExprKind::Bool(v) => self.record(expr.id, Type::Bool, false, true, Some(ConstValue::Bool(*v))),
            ExprKind::Str(_) => {
                self.err(expr.span.start, "string literals are not allowed in expression position");
                self.record(expr.id, Type::Void, false, false, None)
            }
            ExprKind::Ident(name) => self.check_ident(expr.id, name, expr.span.start),
            ExprKind::Unary(op, inner) => self.check_unary(expr.id, *op, inner, expr.span.start),
            ExprKind::Binary(op, lhs, rhs) => self.check_binary(expr.id, *op, lhs, rhs, expr.span.start),
            ExprKind::Call(name, args) => self.check_call(expr.id, name, args, expr.span.start),
            ExprKind::Field(obj, field) => self.check_field(expr.id, obj, field, expr.span.start),
            ExprKind::Index(obj, index) => self.check_index(expr.id, obj, index, expr.span.start),
            ExprKind::StructLit(name, fields) => self.check_struct_lit(expr.id, name, fields, expr.span.start),
            ExprKind::ArrayLit(elems) => self.check_array_lit(expr.id, elems, expr.span.start),
            ExprKind::Group(inner) => {
                let ty = self.check_expr(inner);
                let info = self.result.expr_info.get(&inner.id).cloned();
                let (is_const, const_value) = info.map(|i| (i.is_const, i.const_value)).unwrap_or((false, None));
                self.record(expr.id, ty, false, is_const, const_value)
            }
        }
    }

    fn check_ident(&mut self, id: ExprId, name: &str, pos: Pos) -> Type {
        match self.lookup(name) {
            Some(ty) => {
                let is_const = self.is_const_name(name);
                let const_value = if is_const { self.result.consts.get(name).map(|c| c.value) } else { None };
                self.record(id, ty, !is_const, is_const, const_value)
            }
            None => {
                self.err(pos, format!("undefined name '{}'", name));
                self.record(id, Type::Void, false, false, None)
            }
        }
    }

    fn check_unary(&mut self, id: ExprId, op: UnaryOp, inner: &Expr, pos: Pos) -> Type {
        let inner_ty = self.check_expr(inner);
        match op {
            UnaryOp::Neg => {
                if inner_ty.is_numeric() {
                    self.record(id, inner_ty, false, false, None)
                } else {
                    if inner_ty != Type::Void {
                        self.err(pos, "unary '-' requires a numeric operand");
                    }
                    self.record(id, Type::Void, false, false, None)
                }
            }
            UnaryOp::Not => {
                if inner_ty == Type::Bool {
                    self.record(id, Type::Bool, false, false, None)
                } else {
                    if inner_ty != Type::Void {
                        self.err(pos, "unary '!' requires a bool operand");
                    }
                    self.record(id, Type::Void, false, false, None)
                }
            }
        }
    }

    fn arithmetic_result(&mut self, op: BinOp, lhs: &Type, rhs: &Type, pos: Pos) -> Type {
        use BinOp::*;
        use Type::*;
        match op {
            Add | Sub | Mul | Div => {
                if lhs == rhs && matches!(lhs, Int | Float) {
                    lhs.clone()
                } else if *lhs == Angle && *rhs == Angle {
                    if matches!(op, Add | Sub) {
                        Angle
                    } else {
                        self.err(pos, "only '+' and '-' are legal between two angles");
                        Void
                    }
                } else if *lhs == Angle && *rhs == Float && matches!(op, Mul | Div) {
                    Angle
                } else if *lhs == Float && *rhs == Angle && matches!(op, Mul | Div) {
                    self.err(pos, "angle must be on the left of '*'/'/' with a float");
                    Void
                } else if *lhs == Void || *rhs == Void {
                    Void
                } else {
                    self.err(pos, format!("incompatible operand types {} and {} for this operator", lhs, rhs));
                    Void
                }
            }
            Mod | BitAnd | BitOr | BitXor | Shl | Shr => {
                if *lhs == Int && *rhs == Int {
                    Int
                } else if *lhs == Void || *rhs == Void {
                    Void
                } else {
                    self.err(pos, "this operator requires int operands");
                    Void
                }
            }
            _ => unreachable!("comparison/logical ops are handled in check_binary"),
        }
    }

    fn check_binary(&mut self, id: ExprId, op: BinOp, lhs_expr: &Expr, rhs_expr: &Expr, pos: Pos) -> Type {
        let lhs = self.check_expr(lhs_expr);
        let rhs = self.check_expr(rhs_expr);
        use BinOp::*;
        let result = match op {
            Add | Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor | Shl | Shr => {
                self.arithmetic_result(op, &lhs, &rhs, pos)
            }
            Lt | Gt | LtEq | GtEq => {
                if lhs.is_numeric() && lhs == rhs {
                    Type::Bool
                } else if lhs == Type::Void || rhs == Type::Void {
                    Type::Void
                } else {
                    self.err(pos, "comparison requires two operands of the same numeric type");
                    Type::Void
                }
            }
            Eq | NotEq => {
                let scalar = |t: &Type| matches!(t, Type::Int | Type::Float | Type::Bool | Type::Angle);
                if scalar(&lhs) && lhs == rhs {
                    Type::Bool
                } else if lhs == Type::Void || rhs == Type::Void {
                    Type::Void
                } else {
                    self.err(pos, "equality requires two operands of the same scalar type");
                    Type::Void
                }
            }
            And | Or => {
                if lhs == Type::Bool && rhs == Type::Bool {
                    Type::Bool
                } else if lhs == Type::Void || rhs == Type::Void {
                    Type::Void
                } else {
                    self.err(pos, "logical operators require bool operands");
                    Type::Void
                }
            }
        };
        self.record(id, result, false, false, None)
    }

    fn check_call(&mut self, id: ExprId, name: &str, args: &[Expr], pos: Pos) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|a| self.check_expr(a)).collect();

        if matches!(name, "int" | "float" | "angle") {
            if args.len() != 1 {
                self.err(pos, format!("'{}' takes exactly one argument", name));
                return self.record(id, Type::Void, false, false, None);
            }
            if !arg_types[0].is_numeric() {
                if arg_types[0] != Type::Void {
                    self.err(pos, format!("'{}' requires a numeric argument", name));
                }
                return self.record(id, Type::Void, false, false, None);
            }
            let result = match name {
                "int" => Type::Int,
                "float" => Type::Float,
                "angle" => Type::Angle,
                _ => unreachable!(),
            };
            return self.record(id, result, false, false, None);
        }

        if name == "debug" {
            if args.len() != 1 {
                self.err(pos, "'debug' takes exactly one argument");
                return self.record(id, Type::Void, false, false, None);
            }
            match arg_types[0] {
                Type::Int | Type::Float | Type::Angle => {}
                Type::Bool => self.err(pos, "'debug' does not support bool"),
                Type::Void => {}
                _ => self.err(pos, "'debug' requires a scalar argument"),
            }
            return self.record(id, Type::Void, false, false, None);
        }

        let info = match self.result.funcs.get(name).cloned() {
            Some(info) => info,
            None => {
                self.err(pos, format!("call to undefined function '{}'", name));
                return self.record(id, Type::Void, false, false, None);
            }
        };
        if info.param_types.len() != args.len() {
            self.err(
                pos,
                format!("'{}' expects {} argument(s), found {}", name, info.param_types.len(), args.len()),
            );
        } else {
            for (i, (arg_ty, expected)) in arg_types.iter().zip(info.param_types.iter()).enumerate() {
                if arg_ty != expected && *arg_ty != Type::Void {
                    self.err(
                        pos,
                        format!("argument {} to '{}' has type {}, expected {}", i, name, arg_ty, expected),
                    );
                }
            }
        }
        let result = info.return_types.first().cloned().unwrap_or(Type::Void);
        self.record(id, result, false, false, None)
    }

    fn check_field(&mut self, id: ExprId, obj: &Expr, field: &str, pos: Pos) -> Type {
        let obj_ty = self.check_expr(obj);
        let obj_lvalue = self.result.expr_info.get(&obj.id).map(|i| i.is_lvalue).unwrap_or(false);
        match &obj_ty {
            Type::Struct { .. } => match obj_ty.struct_field(field) {
                Some(f) => {
                    let ty = f.ty.clone();
                    self.record(id, ty, obj_lvalue, false, None)
                }
                None => {
                    self.err(pos, format!("struct '{}' has no field '{}'", obj_ty, field));
                    self.record(id, Type::Void, false, false, None)
                }
            },
            Type::Void => self.record(id, Type::Void, false, false, None),
            _ => {
                self.err(pos, format!("field access on non-struct type {}", obj_ty));
                self.record(id, Type::Void, false, false, None)
            }
        }
    }

    fn check_index(&mut self, id: ExprId, obj: &Expr, index: &Expr, pos: Pos) -> Type {
        let obj_ty = self.check_expr(obj);
        let obj_lvalue = self.result.expr_info.get(&obj.id).map(|i| i.is_lvalue).unwrap_or(false);
        let index_ty = self.check_expr(index);
        if index_ty != Type::Int && index_ty != Type::Void {
            self.err(index.span.start, "array index must be int");
        }
        match &obj_ty {
            Type::Array { element, .. } => {
                let ty = (**element).clone();
                self.record(id, ty, obj_lvalue, false, None)
            }
            Type::Void => self.record(id, Type::Void, false, false, None),
            _ => {
                self.err(pos, format!("index access on non-array type {}", obj_ty));
                self.record(id, Type::Void, false, false, None)
            }
        }
    }

    fn check_struct_lit(&mut self, id: ExprId, name: &str, fields: &[(String, Expr)], pos: Pos) -> Type {
        let struct_ty = match self.result.structs.get(name).cloned() {
            Some(ty) => ty,
            None => {
                self.err(pos, format!("'{}' is not a declared struct type", name));
                for (_, value) in fields {
                    self.check_expr(value);
                }
                return self.record(id, Type::Void, false, false, None);
            }
        };
        for (field_name, value_expr) in fields {
            let value_ty = self.check_expr(value_expr);
            match struct_ty.struct_field(field_name) {
                Some(f) => {
                    if f.ty != value_ty && value_ty != Type::Void {
                        self.err(
                            value_expr.span.start,
                            format!("field '{}' has type {}, found {}", field_name, f.ty, value_ty),
                        );
                    }
                }
                None => self.err(
                    value_expr.span.start,
                    format!("struct '{}' has no field '{}'", name, field_name),
                ),
            }
        }
        self.record(id, struct_ty, false, false, None)
    }

    fn check_array_lit(&mut self, id: ExprId, elems: &[Expr], pos: Pos) -> Type {
        if elems.is_empty() {
            self.err(pos, "array literal must have at least one element");
            return self.record(id, Type::Void, false, false, None);
        }
        let first_ty = self.check_expr(&elems[0]);
        for elem in &elems[1..] {
            let ty = self.check_expr(elem);
            if ty != first_ty && ty != Type::Void && first_ty != Type::Void {
                self.err(elem.span.start, "array literal elements must share one type");
            }
        }
        let ty = Type::Array { size: elems.len() as u32, element: Box::new(first_ty) };
        self.record(id, ty, false, false, None)
    }
}
