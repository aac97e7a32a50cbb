// ═══════════════════════════════════════════════════════════
// Lox Parser: turns tokens into an AST
// ═══════════════════════════════════════════════════════════

use std::rc::Rc;

use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::{Token, TokenKind};
use crate::stack::ensure_sufficient_stack;

const MAX_ARGS: usize = 255;

type ParseResult<T> = Result<T, SyntaxError>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token { kind: TokenKind::Eof, lexeme: String::new(), line });
        }
        Parser { tokens, pos: 0, errors: Vec::new() }
    }

    // ── Token navigation ──────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() { self.pos += 1; }
        t
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn at_end(&self) -> bool {
        self.check(&TokenKind::Eof)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) { self.advance(); true } else { false }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            Err(error_at(self.peek(), message))
        }
    }

    fn expect_ident(&mut self, message: &str) -> ParseResult<Name> {
        match &self.peek().kind {
            TokenKind::Ident(s) => {
                let name = Name::new(s.clone(), self.peek().line);
                self.advance();
                Ok(name)
            }
            _ => Err(error_at(self.peek(), message)),
        }
    }

    // Errors that do not leave the parser confused are recorded without
    // unwinding.
    fn report(&mut self, token: &Token, message: &str) {
        self.errors.push(error_at(token, message));
    }

    /// Panic mode: skip tokens until just past a `;`, or just before a keyword
    /// that starts a new declaration or a `}` that may close the current block.
    fn synchronize(&mut self) {
        while !self.at_end() {
            if self.advance().kind == TokenKind::Semicolon {
                return;
            }
            let next = &self.peek().kind;
            if next.starts_statement() || *next == TokenKind::RBrace {
                return;
            }
        }
    }

    // ── Top-level parsing ─────────────────────────────────────────────────────

    /// Parses every declaration, collecting all syntax errors. The program is
    /// only returned when there were none.
    pub fn parse_program(mut self) -> Result<Vec<Stmt>, Vec<SyntaxError>> {
        let mut stmts = Vec::new();
        while !self.at_end() {
            match self.parse_declaration() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    tracing::trace!(error = %e, "resynchronizing");
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            tracing::debug!(count = stmts.len(), "parsed statements");
            Ok(stmts)
        } else {
            self.errors.sort_by_key(|e| e.line());
            Err(self.errors)
        }
    }

    // ── Declarations ──────────────────────────────────────────────────────────

    fn parse_declaration(&mut self) -> ParseResult<Stmt> {
        ensure_sufficient_stack(|| {
            if self.eat(&TokenKind::Fun) {
                self.parse_function()
            } else if self.eat(&TokenKind::Var) {
                self.parse_var()
            } else {
                self.parse_stmt()
            }
        })
    }

    fn parse_function(&mut self) -> ParseResult<Stmt> {
        let name = self.expect_ident("Expect function name.")?;
        self.expect(&TokenKind::LParen, "Expect '(' after function name.")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    let token = self.peek().clone();
                    self.report(&token, "Can't have more than 255 parameters.");
                }
                params.push(self.expect_ident("Expect parameter name.")?);
                if !self.eat(&TokenKind::Comma) { break; }
            }
        }
        self.expect(&TokenKind::RParen, "Expect ')' after parameters.")?;

        self.expect(&TokenKind::LBrace, "Expect '{' before function body.")?;
        let body = self.parse_block_body()?;

        Ok(Stmt::Function(Rc::new(FunDecl { name, params, body })))
    }

    fn parse_var(&mut self) -> ParseResult<Stmt> {
        let name = self.expect_ident("Expect variable name.")?;
        let init = if self.eat(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var(name, init))
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        ensure_sufficient_stack(|| match self.peek().kind {
            TokenKind::For    => { self.advance(); self.parse_for() }
            TokenKind::If     => { self.advance(); self.parse_if() }
            TokenKind::Print  => self.parse_print(),
            TokenKind::Return => self.parse_return(),
            TokenKind::While  => { self.advance(); self.parse_while() }
            TokenKind::LBrace => { self.advance(); Ok(Stmt::Block(self.parse_block_body()?)) }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "Expect ';' after expression.")?;
                Ok(Stmt::Expr(expr))
            }
        })
    }

    /// Statements up to and including the closing `}`. A bad declaration is
    /// recorded and skipped so the rest of the block is still checked.
    fn parse_block_body(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            match self.parse_declaration() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    tracing::trace!(error = %e, "resynchronizing inside block");
                    self.errors.push(e);
                    // Failing on the closing brace itself leaves it for the block.
                    if !self.check(&TokenKind::RBrace) {
                        self.synchronize();
                    }
                }
            }
        }
        self.expect(&TokenKind::RBrace, "Expect '}' after block.")?;
        Ok(stmts)
    }

    fn parse_print(&mut self) -> ParseResult<Stmt> {
        let line = self.advance().line;
        let value = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value, line))
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return(value))
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.expect(&TokenKind::LParen, "Expect '(' after 'if'.")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If(cond, then_branch, else_branch))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        self.expect(&TokenKind::LParen, "Expect '(' after 'while'.")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "Expect ')' after condition.")?;
        let body = self.parse_stmt()?;
        Ok(Stmt::While(cond, Box::new(body)))
    }

    /// `for` has no node of its own: it becomes a block holding the
    /// initializer and a `while` whose body runs the increment last.
    fn parse_for(&mut self) -> ParseResult<Stmt> {
        self.expect(&TokenKind::LParen, "Expect '(' after 'for'.")?;

        let init = if self.eat(&TokenKind::Semicolon) {
            None
        } else if self.eat(&TokenKind::Var) {
            Some(self.parse_var()?)
        } else {
            let expr = self.parse_expr()?;
            self.expect(&TokenKind::Semicolon, "Expect ';' after expression.")?;
            Some(Stmt::Expr(expr))
        };

        let cond = if self.check(&TokenKind::Semicolon) {
            Expr::Literal(Literal::Bool(true))
        } else {
            self.parse_expr()?
        };
        self.expect(&TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let incr = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::RParen, "Expect ')' after for clauses.")?;

        let mut body = self.parse_stmt()?;
        if let Some(incr) = incr {
            body = Stmt::Block(vec![body, Stmt::Expr(incr)]);
        }

        let mut stmts: Vec<Stmt> = init.into_iter().collect();
        stmts.push(Stmt::While(cond, Box::new(body)));
        Ok(Stmt::Block(stmts))
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        ensure_sufficient_stack(|| self.parse_assignment())
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let target = self.parse_or()?;

        if self.check(&TokenKind::Eq) {
            let equals = self.advance().clone();
            let value = self.parse_assignment()?;

            if let Expr::Variable(name) = &target {
                return Ok(Expr::Assign { name: name.clone(), value: Box::new(value) });
            }
            self.report(&equals, "Invalid assignment target.");
            return Ok(target);
        }
        Ok(target)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Expr::Logical { left: Box::new(left), op: LogicalOp::Or, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_equality()?;
            left = Expr::Logical { left: Box::new(left), op: LogicalOp::And, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq   => BinOp::Eq,
                TokenKind::BangEq => BinOp::NotEq,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_comparison()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt   => BinOp::Lt,
                TokenKind::LtEq => BinOp::LtEq,
                TokenKind::Gt   => BinOp::Gt,
                TokenKind::GtEq => BinOp::GtEq,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_term()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus  => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_factor()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star  => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_unary()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang  => UnaryOp::Not,
            _ => return self.parse_call(),
        };
        let line = self.advance().line;
        let right = ensure_sufficient_stack(|| self.parse_unary())?;
        Ok(Expr::Unary { op, right: Box::new(right), line })
    }

    fn parse_call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        while self.eat(&TokenKind::LParen) {
            let args = self.parse_args()?;
            let line = self.expect(&TokenKind::RParen, "Expect ')' after arguments.")?.line;
            expr = Expr::Call { callee: Box::new(expr), args, line };
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            if args.len() >= MAX_ARGS {
                let token = self.peek().clone();
                self.report(&token, "Can't have more than 255 arguments.");
            }
            args.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) { break; }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::False     => Expr::Literal(Literal::Bool(false)),
            TokenKind::True      => Expr::Literal(Literal::Bool(true)),
            TokenKind::Nil       => Expr::Literal(Literal::Nil),
            TokenKind::Number(n) => Expr::Literal(Literal::Number(n)),
            TokenKind::Str(s)    => Expr::Literal(Literal::Str(s)),
            TokenKind::Ident(s)  => Expr::Variable(Name::new(s, token.line)),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "Expect ')' after expression.")?;
                return Ok(Expr::Grouping(Box::new(inner)));
            }
            _ => return Err(error_at(&token, "Expect expression.")),
        };
        self.advance();
        Ok(expr)
    }
}

fn error_at(token: &Token, message: &str) -> SyntaxError {
    SyntaxError::Parse {
        line: token.line,
        location: format!("at {}", token),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> Result<Vec<Stmt>, Vec<SyntaxError>> {
        let tokens = Lexer::new(src).tokenize().expect("source should scan");
        Parser::new(tokens).parse_program()
    }

    fn dump(src: &str) -> Vec<String> {
        parse(src)
            .expect("source should parse")
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn messages(src: &str) -> Vec<String> {
        parse(src).unwrap_err().iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn precedence_climbing() {
        assert_eq!(
            dump("print 1 + 2 * 3 - 4 / -5;"),
            vec!["(print (- (+ 1 (* 2 3)) (/ 4 (- 5))))"]
        );
        assert_eq!(
            dump("a = b or c and d == e < f;"),
            vec!["(; (= a (or b (and c (== d (< e f))))))"]
        );
    }

    #[test]
    fn grouping_and_calls() {
        assert_eq!(dump("print 5 * (1 + 2);"), vec!["(print (* 5 (group (+ 1 2))))"]);
        assert_eq!(dump("f(1, g())(x);"), vec!["(; (call (call f 1 (call g)) x))"]);
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(dump("a = b = 3;"), vec!["(; (= a (= b 3)))"]);
    }

    #[test]
    fn declarations() {
        assert_eq!(
            dump("var a; var b = \"x\"; fun add(x, y) { return x + y; } fun nop() {}"),
            vec![
                "(var a)",
                "(var b \"x\")",
                "(fun add (x y) (return (+ x y)))",
                "(fun nop ())",
            ]
        );
    }

    #[test]
    fn if_else_binds_to_nearest_if() {
        assert_eq!(
            dump("if (a) if (b) print 1; else print 2;"),
            vec!["(if a (if-else b (print 1) (print 2)))"]
        );
    }

    #[test]
    fn for_desugars_into_while() {
        assert_eq!(
            dump("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["(block (var i 0) (while (< i 3) (block (print i) (; (= i (+ i 1))))))"]
        );
        assert_eq!(dump("for (;;) print 1;"), vec!["(block (while true (print 1)))"]);
        assert_eq!(
            dump("for (i = 0; i < 3;) {}"),
            vec!["(block (; (= i 0)) (while (< i 3) (block)))"]
        );
    }

    #[test]
    fn print_records_its_keyword_line() {
        let stmts = parse("fun f() {\n  print\n    1;\n}").expect("source should parse");
        match &stmts[0] {
            Stmt::Function(decl) => assert!(matches!(decl.body[..], [Stmt::Print(_, 2)])),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn return_value_is_optional() {
        assert_eq!(dump("fun f() { return; return 1; }"), vec!["(fun f () (return) (return 1))"]);
    }

    #[test]
    fn missing_semicolon_is_reported_at_end() {
        assert_eq!(
            messages("print unterminated_statement"),
            vec!["[line 1] Error at end: Expect ';' after value."]
        );
    }

    #[test]
    fn panic_mode_recovers_and_reports_every_error() {
        let errors = messages("var = 1;\nprint (2;\nvar ok = 3;\nprint ok +;");
        assert_eq!(
            errors,
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 2] Error at ';': Expect ')' after expression.",
                "[line 4] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn recovery_stops_before_statement_keywords() {
        let errors = messages("var = 1 print ;");
        assert_eq!(
            errors,
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 1] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn one_error_inside_a_block_is_reported_once() {
        assert_eq!(
            messages("fun f() {\n print ;\n print 1;\n}\nprint 2;"),
            vec!["[line 2] Error at ';': Expect expression."]
        );
        assert_eq!(
            messages("if (true) {\n var = 1;\n}"),
            vec!["[line 2] Error at '=': Expect variable name."]
        );
    }

    #[test]
    fn recovery_inside_a_block_keeps_checking_it() {
        assert_eq!(
            messages("{\n var = 1\n}\n{\n print 1\n}\nwhile (true) { print ; print -; }"),
            vec![
                "[line 2] Error at '=': Expect variable name.",
                "[line 6] Error at '}': Expect ';' after value.",
                "[line 7] Error at ';': Expect expression.",
                "[line 7] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn unclosed_block_is_reported_at_end() {
        assert_eq!(
            messages("{ print 1;"),
            vec!["[line 1] Error at end: Expect '}' after block."]
        );
    }

    #[test]
    fn deep_nesting_parses() {
        let depth = 10_000;
        let blocks = format!("{}print 1;{}", "{".repeat(depth), "}".repeat(depth));
        assert_eq!(parse(&blocks).expect("nested blocks").len(), 1);

        let ifs = format!("{}print 1;", "if (true) ".repeat(depth));
        assert_eq!(parse(&ifs).expect("nested ifs").len(), 1);

        let groups = format!("print {}1{};", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&groups).expect("nested groups").len(), 1);
    }

    #[test]
    fn invalid_assignment_target_does_not_panic() {
        assert_eq!(
            messages("1 = 2; (a) = 3;"),
            vec![
                "[line 1] Error at '=': Invalid assignment target.",
                "[line 1] Error at '=': Invalid assignment target.",
            ]
        );
    }

    #[test]
    fn reserved_words_are_not_expressions() {
        assert_eq!(messages("print this;"), vec!["[line 1] Error at 'this': Expect expression."]);
    }

    #[test]
    fn too_many_arguments() {
        let args = vec!["1"; 256].join(", ");
        let errors = messages(&format!("f({});", args));
        assert_eq!(errors, vec!["[line 1] Error at '1': Can't have more than 255 arguments."]);
    }
}
