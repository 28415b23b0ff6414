//! Recursive-descent parser with Pratt-style binary expression precedence
//! (spec.md §4.2). Never panics past the top level: every syntax error
//! records a diagnostic and invokes [`Parser::recover`], which is guaranteed
//! to advance at least one token so the parser always terminates (spec.md
//! §8.1 invariant 2, design notes "Error recovery progress guarantee").

use crate::{
    ast::*,
    error::{Diagnostics, Phase},
    token::{Token, TokenKind},
    util::{ExprIdGen, Pos, Span},
};
use std::collections::HashSet;
use std::mem::discriminant;

/// Parses a token list (as produced by [`crate::lexer::lex`]) into a
/// [`Program`] plus any syntax diagnostics. Always returns, never panics.
pub fn parse(tokens: Vec<Token>) -> (Program, Diagnostics) {
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();
    (program, parser.errors)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Diagnostics,
    ids: ExprIdGen,
    type_names: HashSet<String>,
}

enum ForForm {
    ThreeParts,
    CondOnly,
    Infinite,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        let type_names = prescan_type_names(&tokens);
        Self {
            tokens,
            pos: 0,
            errors: Diagnostics::new(),
            ids: ExprIdGen::default(),
            type_names,
        }
    }

    // ----- token stream helpers -----

    fn cur(&self) -> &Token {
        // The token list always ends in EOF, and we never advance past it,
        // so this index is always in bounds.
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.cur().kind
    }

    fn pos_here(&self) -> Pos {
        self.cur().pos
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        discriminant(self.peek_kind()) == discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.cur().clone();
        if !matches!(tok.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        tok
    }

    fn next_id(&mut self) -> u32 {
        self.ids.next()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(Phase::Parse, self.pos_here(), message);
    }

    /// Consumes a token of the given kind, or records a diagnostic and
    /// leaves the stream untouched.
    fn eat(&mut self, kind: TokenKind, expected: &str) -> bool {
        if self.check(&kind) {
            self.advance();
            true
        } else {
            self.error(format!(
                "expected {}, found {}",
                expected,
                self.peek_kind()
            ));
            false
        }
    }

    fn eat_ident(&mut self) -> String {
        if self.check(&TokenKind::Ident) {
            self.advance().lexeme
        } else {
            self.error(format!("expected identifier, found {}", self.peek_kind()));
            String::new()
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline) {
            self.advance();
        }
    }

    fn at_stmt_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof
        )
    }

    /// Recovery: skip forward to the next newline, the next closing brace, or
    /// the next top-level declaration keyword — whichever comes first. Always
    /// consumes at least one token first, so repeated calls can never loop
    /// forever on the same position.
    fn recover(&mut self) {
        self.advance();
        loop {
            match self.peek_kind() {
                TokenKind::Newline => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Const
                | TokenKind::Type
                | TokenKind::Var
                | TokenKind::Func
                | TokenKind::On => break,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ----- top level -----

    fn parse_program(&mut self) -> Program {
        let start = self.pos_here();
        self.skip_newlines();

        let robot_name = if self.check(&TokenKind::Robot) {
            self.advance();
            match self.peek_kind() {
                TokenKind::Str(_) => {
                    if let TokenKind::Str(s) = self.advance().kind {
                        s
                    } else {
                        unreachable!()
                    }
                }
                _ => {
                    self.error("expected robot name string after 'robot'");
                    String::new()
                }
            }
        } else {
            self.error("expected 'robot' declaration at start of program");
            String::new()
        };

        let mut consts = Vec::new();
        let mut types = Vec::new();
        let mut globals = Vec::new();
        let mut funcs = Vec::new();
        let mut events = Vec::new();

        self.skip_newlines();
        while !self.at_eof() {
            match self.peek_kind() {
                TokenKind::Const => consts.push(self.parse_const_decl()),
                TokenKind::Type => types.push(self.parse_type_decl()),
                TokenKind::Var => globals.push(self.parse_var_decl()),
                TokenKind::Func => funcs.push(self.parse_func_decl()),
                TokenKind::On => events.push(self.parse_event_decl()),
                _ => {
                    self.error(format!(
                        "unexpected {} at top level",
                        self.peek_kind()
                    ));
                    self.recover();
                }
            }
            self.skip_newlines();
        }

        let end = self.pos_here();
        Program {
            robot_name,
            consts,
            types,
            globals,
            funcs,
            events,
            span: Span::new(start, end),
        }
    }

    fn parse_const_decl(&mut self) -> ConstDecl {
        let start = self.pos_here();
        self.advance(); // const
        let name = self.eat_ident();
        self.eat(TokenKind::Assign, "'='");
        let expr = self.parse_expr();
        ConstDecl { name, expr, span: Span::new(start, self.pos_here()) }
    }

    fn parse_type_decl(&mut self) -> TypeDecl {
        let start = self.pos_here();
        self.advance(); // type
        let name = self.eat_ident();
        self.eat(TokenKind::Struct, "'struct'");
        self.eat(TokenKind::LBrace, "'{'");
        self.skip_newlines();
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let field_name = self.eat_ident();
            let ty = self.parse_type_node();
            fields.push((field_name, ty));
            self.skip_newlines();
        }
        if !self.eat(TokenKind::RBrace, "'}'") {
            self.recover();
        }
        TypeDecl { name, fields, span: Span::new(start, self.pos_here()) }
    }

    fn parse_var_decl(&mut self) -> VarDecl {
        let start = self.pos_here();
        self.advance(); // var
        let name = self.eat_ident();
        let ty = self.parse_type_node();
        let init = if self.check(&TokenKind::Assign) {
            self.advance();
            Some(self.parse_expr())
        } else {
            None
        };
        VarDecl { name, ty, init, span: Span::new(start, self.pos_here()) }
    }

    fn parse_params(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        self.eat(TokenKind::LParen, "'('");
        if !self.check(&TokenKind::RParen) {
            loop {
                let name = self.eat_ident();
                let ty = self.parse_type_node();
                params.push(Param { name, ty });
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat(TokenKind::RParen, "')'");
        params
    }

    fn parse_return_types(&mut self) -> Vec<TypeNode> {
        let mut types = Vec::new();
        if self.check(&TokenKind::LBrace) {
            return types;
        }
        loop {
            types.push(self.parse_type_node());
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        types
    }

    fn parse_func_decl(&mut self) -> FuncDecl {
        let start = self.pos_here();
        self.advance(); // func
        let name = self.eat_ident();
        let params = self.parse_params();
        let return_types = self.parse_return_types();
        let body = self.parse_block();
        FuncDecl { name, params, return_types, body, span: Span::new(start, self.pos_here()) }
    }

    fn parse_event_decl(&mut self) -> EventDecl {
        let start = self.pos_here();
        self.advance(); // on
        let name = self.eat_ident();
        let params = self.parse_params();
        let body = self.parse_block();
        EventDecl { name, params, body, span: Span::new(start, self.pos_here()) }
    }

    fn parse_type_node(&mut self) -> TypeNode {
        match self.peek_kind().clone() {
            TokenKind::IntType => {
                self.advance();
                TypeNode::Int
            }
            TokenKind::FloatType => {
                self.advance();
                TypeNode::Float
            }
            TokenKind::BoolType => {
                self.advance();
                TypeNode::Bool
            }
            TokenKind::AngleType => {
                self.advance();
                TypeNode::Angle
            }
            TokenKind::LBracket => {
                self.advance();
                let size = match self.peek_kind().clone() {
                    TokenKind::Int(n) => {
                        self.advance();
                        n.max(0) as u32
                    }
                    _ => {
                        self.error("expected array size");
                        0
                    }
                };
                self.eat(TokenKind::RBracket, "']'");
                let element = self.parse_type_node();
                TypeNode::Array(Box::new(element), size)
            }
            TokenKind::Ident => {
                let name = self.advance().lexeme;
                TypeNode::Named(name)
            }
            _ => {
                self.error(format!("expected a type, found {}", self.peek_kind()));
                TypeNode::Int
            }
        }
    }

    // ----- statements -----

    fn parse_block(&mut self) -> Block {
        let start = self.pos_here();
        if !self.eat(TokenKind::LBrace, "'{'") {
            return Block { stmts: Vec::new(), span: Span::new(start, self.pos_here()) };
        }
        self.skip_newlines();
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            stmts.push(self.parse_stmt());
            self.skip_newlines();
        }
        if !self.eat(TokenKind::RBrace, "'}'") {
            self.error("unterminated block");
        }
        Block { stmts, span: Span::new(start, self.pos_here()) }
    }

    fn parse_stmt(&mut self) -> Stmt {
        match self.peek_kind() {
            TokenKind::LBrace => Stmt::Block(self.parse_block()),
            TokenKind::Var => Stmt::Local(self.parse_var_decl()),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                let start = self.pos_here();
                self.advance();
                Stmt::Break(Span::new(start, self.pos_here()))
            }
            TokenKind::Continue => {
                let start = self.pos_here();
                self.advance();
                Stmt::Continue(Span::new(start, self.pos_here()))
            }
            _ => self.parse_simple_stmt(),
        }
    }

    /// Parses a short declaration, assignment, or bare expression statement.
    /// Shared between the general statement dispatcher and `for`-loop
    /// init/post clauses.
    fn parse_simple_stmt(&mut self) -> Stmt {
        if self.looks_like_short_decl() {
            return self.parse_short_decl();
        }

        let start = self.pos_here();
        let target = self.parse_expr();
        let op = match self.peek_kind() {
            TokenKind::Assign => Some(AssignOp::Assign),
            TokenKind::PlusAssign => Some(AssignOp::AddAssign),
            TokenKind::MinusAssign => Some(AssignOp::SubAssign),
            TokenKind::StarAssign => Some(AssignOp::MulAssign),
            TokenKind::SlashAssign => Some(AssignOp::DivAssign),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let value = self.parse_expr();
                Stmt::Assign { target, op, value, span: Span::new(start, self.pos_here()) }
            }
            None => Stmt::Expr(target),
        }
    }

    /// Single-token-lookahead scan (no backtracking needed): `Ident (',' Ident)* ':='`.
    fn looks_like_short_decl(&self) -> bool {
        let mut i = self.pos;
        if !matches!(self.tokens[i].kind, TokenKind::Ident) {
            return false;
        }
        i += 1;
        loop {
            match self.tokens[i].kind {
                TokenKind::Comma => {
                    i += 1;
                    if !matches!(self.tokens[i].kind, TokenKind::Ident) {
                        return false;
                    }
                    i += 1;
                }
                TokenKind::Walrus => return true,
                _ => return false,
            }
        }
    }

    fn parse_short_decl(&mut self) -> Stmt {
        let start = self.pos_here();
        let mut names = vec![self.eat_ident()];
        while self.check(&TokenKind::Comma) {
            self.advance();
            names.push(self.eat_ident());
        }
        self.eat(TokenKind::Walrus, "':='");
        let mut exprs = vec![self.parse_expr()];
        while self.check(&TokenKind::Comma) {
            self.advance();
            exprs.push(self.parse_expr());
        }
        Stmt::ShortDecl { names, exprs, span: Span::new(start, self.pos_here()) }
    }

    fn parse_if(&mut self) -> Stmt {
        let start = self.pos_here();
        self.advance(); // if
        let cond = self.parse_expr();
        let then_block = self.parse_block();
        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            if self.check(&TokenKind::If) {
                Some(Box::new(self.parse_if()))
            } else {
                Some(Box::new(Stmt::Block(self.parse_block())))
            }
        } else {
            None
        };
        Stmt::If { cond, then_block, else_branch, span: Span::new(start, self.pos_here()) }
    }

    /// Scans ahead (brace/bracket/paren-balanced) to tell the three `for`
    /// forms apart without backtracking (spec.md §4.2 "`for` parsing").
    fn scan_for_form(&self) -> ForForm {
        if self.check(&TokenKind::LBrace) {
            return ForForm::Infinite;
        }
        let mut depth = 0i32;
        let mut i = self.pos;
        loop {
            match &self.tokens[i].kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth -= 1,
                TokenKind::LBrace if depth <= 0 => return ForForm::CondOnly,
                TokenKind::Semicolon if depth <= 0 => return ForForm::ThreeParts,
                TokenKind::Eof => return ForForm::CondOnly,
                _ => {}
            }
            i += 1;
        }
    }

    fn parse_for(&mut self) -> Stmt {
        let start = self.pos_here();
        self.advance(); // for
        let (init, cond, post) = match self.scan_for_form() {
            ForForm::Infinite => (None, None, None),
            ForForm::CondOnly => (None, Some(self.parse_expr()), None),
            ForForm::ThreeParts => {
                let init = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(Box::new(self.parse_simple_stmt()))
                };
                self.eat(TokenKind::Semicolon, "';'");
                let cond = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr())
                };
                self.eat(TokenKind::Semicolon, "';'");
                let post = if self.check(&TokenKind::LBrace) {
                    None
                } else {
                    Some(Box::new(self.parse_simple_stmt()))
                };
                (init, cond, post)
            }
        };
        let body = self.parse_block();
        Stmt::For { init, cond, post, body, span: Span::new(start, self.pos_here()) }
    }

    /// `while cond { ... }` is lowered to `for cond { ... }` by the parser
    /// itself, so later stages only ever see one loop construct (spec.md
    /// §4.2).
    fn parse_while(&mut self) -> Stmt {
        let start = self.pos_here();
        self.advance(); // while
        let cond = self.parse_expr();
        let body = self.parse_block();
        Stmt::For { init: None, cond: Some(cond), post: None, body, span: Span::new(start, self.pos_here()) }
    }

    fn parse_switch(&mut self) -> Stmt {
        let start = self.pos_here();
        self.advance(); // switch
        let tag = self.parse_expr();
        self.eat(TokenKind::LBrace, "'{'");
        self.skip_newlines();
        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            if self.check(&TokenKind::Case) {
                self.advance();
                let mut values = vec![self.parse_expr()];
                while self.check(&TokenKind::Comma) {
                    self.advance();
                    values.push(self.parse_expr());
                }
                let body = self.parse_block();
                cases.push((values, body));
            } else if self.check(&TokenKind::Default) {
                self.advance();
                default = Some(self.parse_block());
            } else {
                self.error(format!(
                    "expected 'case' or 'default', found {}",
                    self.peek_kind()
                ));
                self.recover();
            }
            self.skip_newlines();
        }
        if !self.eat(TokenKind::RBrace, "'}'") {
            self.recover();
        }
        Stmt::Switch { tag, cases, default, span: Span::new(start, self.pos_here()) }
    }

    fn parse_return(&mut self) -> Stmt {
        let start = self.pos_here();
        self.advance(); // return
        let mut values = Vec::new();
        if !self.at_stmt_end() {
            values.push(self.parse_expr());
            while self.check(&TokenKind::Comma) {
                self.advance();
                values.push(self.parse_expr());
            }
        }
        Stmt::Return { values, span: Span::new(start, self.pos_here()) }
    }

    // ----- expressions -----
    // Precedence table, low to high: || , && , | , ^ , & , == != ,
    // < > <= >= , << >> , + - , * / %. Unary -/! bind tighter than
    // multiplicative; postfix . and [ ] bind tightest.

    fn parse_expr(&mut self) -> Expr {
        self.parse_binary(1)
    }

    fn binop_prec(&self) -> Option<(u8, BinOp)> {
        Some(match self.peek_kind() {
            TokenKind::Or => (1, BinOp::Or),
            TokenKind::And => (2, BinOp::And),
            TokenKind::Pipe => (3, BinOp::BitOr),
            TokenKind::Caret => (4, BinOp::BitXor),
            TokenKind::Amp => (5, BinOp::BitAnd),
            TokenKind::EqEq => (6, BinOp::Eq),
            TokenKind::NotEq => (6, BinOp::NotEq),
            TokenKind::Lt => (7, BinOp::Lt),
            TokenKind::Gt => (7, BinOp::Gt),
            TokenKind::LtEq => (7, BinOp::LtEq),
            TokenKind::GtEq => (7, BinOp::GtEq),
            TokenKind::Shl => (8, BinOp::Shl),
            TokenKind::Shr => (8, BinOp::Shr),
            TokenKind::Plus => (9, BinOp::Add),
            TokenKind::Minus => (9, BinOp::Sub),
            TokenKind::Star => (10, BinOp::Mul),
            TokenKind::Slash => (10, BinOp::Div),
            TokenKind::Percent => (10, BinOp::Mod),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Expr {
        let mut left = self.parse_unary();
        while let Some((prec, op)) = self.binop_prec() {
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1); // left-associative
            let span = left.span.to(right.span);
            let id = self.next_id();
            left = Expr { id, kind: ExprKind::Binary(op, Box::new(left), Box::new(right)), span };
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.pos_here();
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let operand = self.parse_unary();
                let span = Span::new(start, operand.span.end);
                let id = self.next_id();
                Expr { id, kind: ExprKind::Unary(op, Box::new(operand)), span }
            }
            None => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let field = self.eat_ident();
                    let span = Span::new(expr.span.start, self.pos_here());
                    let id = self.next_id();
                    expr = Expr { id, kind: ExprKind::Field(Box::new(expr), field), span };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr();
                    self.eat(TokenKind::RBracket, "']'");
                    let span = Span::new(expr.span.start, self.pos_here());
                    let id = self.next_id();
                    expr = Expr { id, kind: ExprKind::Index(Box::new(expr), Box::new(index)), span };
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.pos_here();
        let id = self.next_id();
        match self.peek_kind().clone() {
            TokenKind::Int(v) => {
                self.advance();
                Expr { id, kind: ExprKind::Int(v), span: Span::new(start, self.pos_here()) }
            }
            TokenKind::Float(v) => {
                self.advance();
                Expr { id, kind: ExprKind::Float(v), span: Span::new(start, self.pos_here()) }
            }
            TokenKind::Bool(v) => {
                self.advance();
                Expr { id, kind: ExprKind::Bool(v), span: Span::new(start, self.pos_here()) }
            }
            TokenKind::Str(s) => {
                self.advance();
                Expr { id, kind: ExprKind::Str(s), span: Span::new(start, self.pos_here()) }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.eat(TokenKind::RParen, "')'");
                Expr { id, kind: ExprKind::Group(Box::new(inner)), span: Span::new(start, self.pos_here()) }
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elems = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    elems.push(self.parse_expr());
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        if self.check(&TokenKind::RBracket) {
                            break;
                        }
                        elems.push(self.parse_expr());
                    }
                }
                self.eat(TokenKind::RBracket, "']'");
                Expr { id, kind: ExprKind::ArrayLit(elems), span: Span::new(start, self.pos_here()) }
            }
            TokenKind::Ident => {
                let name = self.advance().lexeme;
                if self.check(&TokenKind::LBrace) && self.type_names.contains(&name) {
                    self.parse_struct_lit(id, name, start)
                } else if self.check(&TokenKind::LParen) {
                    self.parse_call(id, name, start)
                } else {
                    Expr { id, kind: ExprKind::Ident(name), span: Span::new(start, self.pos_here()) }
                }
            }
            _ => {
                self.error(format!("expected expression, found {}", self.peek_kind()));
                // Guarantee progress even when called outside statement-level
                // recovery (e.g. mid-expression).
                if !self.at_eof() {
                    self.advance();
                }
                Expr { id, kind: ExprKind::Int(0), span: Span::new(start, self.pos_here()) }
            }
        }
    }

    fn parse_call(&mut self, id: u32, name: String, start: Pos) -> Expr {
        self.advance(); // (
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            args.push(self.parse_expr());
            while self.check(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_expr());
            }
        }
        self.eat(TokenKind::RParen, "')'");
        Expr { id, kind: ExprKind::Call(name, args), span: Span::new(start, self.pos_here()) }
    }

    fn parse_struct_lit(&mut self, id: u32, name: String, start: Pos) -> Expr {
        self.advance(); // {
        self.skip_newlines();
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let field_name = self.eat_ident();
            self.eat(TokenKind::Colon, "':'");
            let value = self.parse_expr();
            fields.push((field_name, value));
            self.skip_newlines();
            if self.check(&TokenKind::Comma) {
                self.advance();
                self.skip_newlines();
            }
        }
        self.eat(TokenKind::RBrace, "'}'");
        Expr { id, kind: ExprKind::StructLit(name, fields), span: Span::new(start, self.pos_here()) }
    }
}

/// Collects every identifier that follows a `type` keyword, so primary-
/// expression parsing can disambiguate `TypeName{...}` struct literals from
/// a following block (spec.md §4.2).
fn prescan_type_names(tokens: &[Token]) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut i = 0;
    while i < tokens.len() {
        if matches!(tokens[i].kind, TokenKind::Type) {
            if let Some(next) = tokens.get(i + 1) {
                if matches!(next.kind, TokenKind::Ident) {
                    names.insert(next.lexeme.clone());
                }
            }
        }
        i += 1;
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_src(src: &str) -> (Program, Diagnostics) {
        parse(lex(src))
    }

    #[test]
    fn minimal_program() {
        let (program, errors) = parse_src("robot \"T\"\nfunc tick() {}\n");
        assert!(errors.is_empty());
        assert_eq!(program.robot_name, "T");
        assert_eq!(program.funcs.len(), 1);
        assert_eq!(program.funcs[0].name, "tick");
    }

    #[test]
    fn missing_robot_is_an_error_but_parsing_continues() {
        let (program, errors) = parse_src("func tick() {}\n");
        assert!(!errors.is_empty());
        assert_eq!(program.robot_name, "");
        assert_eq!(program.funcs.len(), 1);
    }

    #[test]
    fn short_decl_and_arithmetic_precedence() {
        let (program, errors) = parse_src(
            "robot \"T\"\nfunc tick() { x := 2 + 3 * 4 }\n",
        );
        assert!(errors.is_empty());
        let body = &program.funcs[0].body.stmts;
        match &body[0] {
            Stmt::ShortDecl { names, exprs, .. } => {
                assert_eq!(names, &vec!["x".to_string()]);
                match &exprs[0].kind {
                    ExprKind::Binary(BinOp::Add, lhs, rhs) => {
                        assert!(matches!(lhs.kind, ExprKind::Int(2)));
                        assert!(matches!(rhs.kind, ExprKind::Binary(BinOp::Mul, _, _)));
                    }
                    other => panic!("unexpected expr {:?}", other),
                }
            }
            other => panic!("unexpected stmt {:?}", other),
        }
    }

    #[test]
    fn for_loop_forms() {
        let (program, errors) = parse_src(
            "robot \"T\"\nfunc tick() {\n\
             for i := 0; i < 5; i += 1 { }\n\
             for true { }\n\
             for { }\n\
             }\n",
        );
        assert!(errors.is_empty());
        let stmts = &program.funcs[0].body.stmts;
        assert!(matches!(stmts[0], Stmt::For { init: Some(_), cond: Some(_), post: Some(_), .. }));
        assert!(matches!(stmts[1], Stmt::For { init: None, cond: Some(_), post: None, .. }));
        assert!(matches!(stmts[2], Stmt::For { init: None, cond: None, post: None, .. }));
    }

    #[test]
    fn while_lowers_to_for() {
        let (program, errors) = parse_src("robot \"T\"\nfunc tick() { while true { } }\n");
        assert!(errors.is_empty());
        assert!(matches!(
            program.funcs[0].body.stmts[0],
            Stmt::For { init: None, cond: Some(_), post: None, .. }
        ));
    }

    #[test]
    fn struct_literal_vs_block_ambiguity() {
        let (program, errors) = parse_src(
            "robot \"T\"\ntype Point struct { x int\ny int }\nfunc tick() { p := Point{x: 1, y: 2} }\n",
        );
        assert!(errors.is_empty());
        match &program.funcs[0].body.stmts[0] {
            Stmt::ShortDecl { exprs, .. } => {
                assert!(matches!(exprs[0].kind, ExprKind::StructLit(ref n, _) if n == "Point"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn recovery_advances_and_parse_terminates_on_stray_brace() {
        let (_program, errors) = parse_src("robot \"T\"\n}}}\nfunc tick() {}\n");
        assert!(!errors.is_empty());
    }

    #[test]
    fn recovery_terminates_on_unterminated_block() {
        let (_program, _errors) = parse_src("robot \"T\"\nfunc tick() {\n");
        // Must simply terminate; reaching this point is the assertion.
    }
}
