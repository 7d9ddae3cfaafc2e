use crate::ast::{Expr, ExprId, Stmt};
use crate::error::LoxError;
use crate::token::{Literal, Token, TokenType};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<LoxError>,
    next_id: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_first_id(tokens, 0)
    }

    /// A session that parses repeatedly (the REPL) threads the id counter
    /// through so node ids never collide across runs.
    pub fn with_first_id(tokens: Vec<Token>, first_id: u32) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
            next_id: first_id,
        }
    }

    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        statements
    }

    pub fn take_errors(&mut self) -> Vec<LoxError> {
        std::mem::take(&mut self.errors)
    }

    /// The id the next parsed node would receive.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    fn fresh_id(&mut self) -> ExprId {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        id
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_types(&[TokenType::Class]) {
            self.class_declaration()
        } else if self.match_types(&[TokenType::Fun]) {
            self.function("function")
        } else if self.match_types(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?.clone();

        let superclass = if self.match_types(&[TokenType::Less]) {
            self.consume(TokenType::Identifier, "Expect superclass name after '<'.")?;
            let id = self.fresh_id();
            Some(Expr::Variable {
                name: self.previous().clone(),
                id,
            })
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn function(&mut self, kind: &str) -> Result<Stmt, LoxError> {
        let name = self
            .consume(TokenType::Identifier, &format!("Expect {} name.", kind))?
            .clone();

        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;
        let mut params = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                let param = self.consume(TokenType::Identifier, "Expect parameter name.")?;
                params.push(param.clone());
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block_statements()?;

        Ok(Stmt::Function { name, params, body })
    }

    fn var_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name = self
            .consume(TokenType::Identifier, "Expect variable name.")?
            .clone();

        let initializer = if self.match_types(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt, LoxError> {
        if self.match_types(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_types(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_types(&[TokenType::Print]) {
            self.print_statement()
        } else if self.match_types(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_types(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_types(&[TokenType::LeftBrace]) {
            Ok(Stmt::Block {
                statements: self.block_statements()?,
            })
        } else {
            self.expression_statement()
        }
    }

    /// A for loop is syntactic sugar for a while loop.
    fn for_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_types(&[TokenType::Semicolon]) {
            None
        } else if self.match_types(&[TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(&TokenType::Semicolon) {
            Expr::Literal {
                value: Literal::Bool(true),
            }
        } else {
            self.expression()?
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(&TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        // Inner block keeps the body's own scope, increment runs after it
        if let Some(inc) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression { expression: inc }],
            };
        }

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        // A declared initializer is scoped to an outer wrapping block
        if let Some(init) = initializer {
            body = Stmt::Block {
                statements: vec![init, body],
            };
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_types(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt, LoxError> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { expression })
    }

    fn return_statement(&mut self) -> Result<Stmt, LoxError> {
        let keyword = self.previous().clone();
        let value = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after while condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn block_statements(&mut self) -> Result<Vec<Stmt>, LoxError> {
        let mut statements = Vec::new();

        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, LoxError> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression })
    }

    fn expression(&mut self) -> Result<Expr, LoxError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, LoxError> {
        let expr = self.or()?;

        if self.match_types(&[TokenType::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => {
                    let id = self.fresh_id();
                    Ok(Expr::Assign {
                        name,
                        value: Box::new(value),
                        id,
                    })
                }
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),
                _ => Err(LoxError::Parse {
                    message: "Invalid assignment target.".to_string(),
                    span: equals.span,
                }),
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.and()?;

        while self.match_types(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.equality()?;

        while self.match_types(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.comparison()?;

        while self.match_types(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.term()?;

        while self.match_types(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.factor()?;

        while self.match_types(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.unary()?;

        while self.match_types(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, LoxError> {
        if self.match_types(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_types(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_types(&[TokenType::Dot]) {
                let name = self
                    .consume(TokenType::Identifier, "Expect property name after '.'.")?
                    .clone();
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, LoxError> {
        let mut arguments = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        let paren = self
            .consume(TokenType::RightParen, "Expect ')' after arguments.")?
            .clone();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, LoxError> {
        let token = self.peek();
        match token.token_type {
            TokenType::False => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(false),
                })
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(true),
                })
            }
            TokenType::Nil => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Nil,
                })
            }
            TokenType::Number | TokenType::String => {
                let value = token.literal.clone().unwrap();
                self.advance();
                Ok(Expr::Literal { value })
            }
            TokenType::Super => {
                self.advance();
                let keyword = self.previous().clone();
                self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
                let method = self
                    .consume(TokenType::Identifier, "Expect superclass method name.")?
                    .clone();
                let id = self.fresh_id();
                Ok(Expr::Super {
                    keyword,
                    method,
                    id,
                })
            }
            TokenType::This => {
                self.advance();
                let id = self.fresh_id();
                Ok(Expr::This {
                    keyword: self.previous().clone(),
                    id,
                })
            }
            TokenType::Identifier => {
                let name = token.clone();
                self.advance();
                let id = self.fresh_id();
                Ok(Expr::Variable { name, id })
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(Expr::Grouping {
                    expression: Box::new(expr),
                })
            }
            _ => Err(LoxError::Parse {
                message: "Expect expression.".to_string(),
                span: token.span.clone(),
            }),
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<&Token, LoxError> {
        if self.check(&token_type) {
            return Ok(self.advance());
        }
        Err(LoxError::Parse {
            message: message.to_string(),
            span: self.peek().span.clone(),
        })
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }

            self.advance();
        }
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for t in types {
            if self.check(t) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse_source(source: &str) -> (Vec<Stmt>, Vec<LoxError>) {
        let tokens: Vec<Token> = Scanner::new(source).map(|r| r.unwrap()).collect();
        let mut parser = Parser::new(tokens);
        let stmts = parser.parse();
        (stmts, parser.take_errors())
    }

    fn parse_ok(source: &str) -> Vec<Stmt> {
        let (stmts, errors) = parse_source(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        stmts
    }

    fn printed(source: &str) -> String {
        parse_ok(source)
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn eof_only_parses_to_empty_program() {
        assert!(parse_ok("").is_empty());
    }

    #[test]
    fn factor_binds_tighter_than_term() {
        assert_eq!(printed("1 + 2 * 3;"), "(1 + (2 * 3));");
        assert_eq!(printed("(1 + 2) * 3;"), "((1 + 2) * 3);");
    }

    #[test]
    fn comparison_binds_tighter_than_equality() {
        assert_eq!(printed("1 < 2 == true;"), "((1 < 2) == true);");
    }

    #[test]
    fn term_is_left_associative() {
        assert_eq!(printed("1 - 2 - 3;"), "((1 - 2) - 3);");
    }

    #[test]
    fn unary_is_right_associative() {
        assert_eq!(printed("!!true;"), "(!(!true));");
        assert_eq!(printed("--1;"), "(-(-1));");
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(printed("a or b and c;"), "(a or (b and c));");
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(printed("a = b = 1;"), "(a = (b = 1));");
    }

    #[test]
    fn assignment_to_variable_becomes_assign() {
        let stmts = parse_ok("x = 1;");
        match &stmts[0] {
            Stmt::Expression { expression } => {
                assert!(matches!(expression, Expr::Assign { name, .. } if name.lexeme == "x"));
            }
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn assignment_to_property_becomes_set() {
        let stmts = parse_ok("a.b = 1;");
        match &stmts[0] {
            Stmt::Expression { expression } => {
                assert!(matches!(expression, Expr::Set { name, .. } if name.lexeme == "b"));
            }
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn assignment_to_literal_is_an_error() {
        let (_, errors) = parse_source("1 = 2;");
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            LoxError::Parse { message, .. } if message.contains("Invalid assignment target")
        ));
    }

    #[test]
    fn parses_var_declaration() {
        let stmts = parse_ok("var x = 42; var y;");
        assert!(matches!(
            &stmts[0],
            Stmt::Var { name, initializer: Some(_) } if name.lexeme == "x"
        ));
        assert!(matches!(
            &stmts[1],
            Stmt::Var { name, initializer: None } if name.lexeme == "y"
        ));
    }

    #[test]
    fn parses_if_else_attached_to_nearest_if() {
        assert_eq!(
            printed("if (a) if (b) print 1; else print 2;"),
            "if (a) if (b) print 1; else print 2;"
        );
        let stmts = parse_ok("if (a) if (b) print 1; else print 2;");
        match &stmts[0] {
            Stmt::If { else_branch, .. } => assert!(else_branch.is_none()),
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn parses_calls_left_to_right() {
        assert_eq!(printed("f(1)(2);"), "f(1)(2);");
        let stmts = parse_ok("f(1)(2);");
        match &stmts[0] {
            Stmt::Expression { expression } => match expression {
                Expr::Call { callee, .. } => assert!(matches!(callee.as_ref(), Expr::Call { .. })),
                other => panic!("expected call, got {:?}", other),
            },
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn parses_chained_property_access() {
        let stmts = parse_ok("a.b.c;");
        match &stmts[0] {
            Stmt::Expression { expression } => match expression {
                Expr::Get { object, name } => {
                    assert_eq!(name.lexeme, "c");
                    assert!(matches!(object.as_ref(), Expr::Get { .. }));
                }
                other => panic!("expected get, got {:?}", other),
            },
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn for_with_all_clauses_desugars_to_block_var_while() {
        let stmts = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::Block { statements } => {
                assert_eq!(statements.len(), 2);
                assert!(matches!(&statements[0], Stmt::Var { .. }));
                match &statements[1] {
                    Stmt::While { body, .. } => match body.as_ref() {
                        Stmt::Block { statements } => {
                            assert_eq!(statements.len(), 2);
                            assert!(matches!(&statements[0], Stmt::Print { .. }));
                            assert!(matches!(&statements[1], Stmt::Expression { .. }));
                        }
                        other => panic!("expected desugared body block, got {:?}", other),
                    },
                    other => panic!("expected while, got {:?}", other),
                }
            }
            other => panic!("expected wrapping block, got {:?}", other),
        }
    }

    #[test]
    fn for_without_initializer_has_no_wrapping_block() {
        let stmts = parse_ok("for (; i < 3; i = i + 1) print i;");
        assert!(matches!(&stmts[0], Stmt::While { .. }));
    }

    #[test]
    fn for_without_condition_loops_on_true() {
        let stmts = parse_ok("for (var i = 0;; i = i + 1) print i;");
        match &stmts[0] {
            Stmt::Block { statements } => match &statements[1] {
                Stmt::While { condition, .. } => {
                    assert!(matches!(
                        condition,
                        Expr::Literal {
                            value: Literal::Bool(true)
                        }
                    ));
                }
                other => panic!("expected while, got {:?}", other),
            },
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn for_with_only_body_is_infinite_while() {
        let stmts = parse_ok("for (;;) print 1;");
        match &stmts[0] {
            Stmt::While { condition, body } => {
                assert!(matches!(
                    condition,
                    Expr::Literal {
                        value: Literal::Bool(true)
                    }
                ));
                assert!(matches!(body.as_ref(), Stmt::Print { .. }));
            }
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn parses_function_declaration() {
        let stmts = parse_ok("fun add(a, b) { return a + b; }");
        match &stmts[0] {
            Stmt::Function { name, params, body } => {
                assert_eq!(name.lexeme, "add");
                assert_eq!(params.len(), 2);
                assert!(matches!(&body[0], Stmt::Return { value: Some(_), .. }));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn parses_return_without_value() {
        let stmts = parse_ok("fun f() { return; }");
        match &stmts[0] {
            Stmt::Function { body, .. } => {
                assert!(matches!(&body[0], Stmt::Return { value: None, .. }));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn parses_class_with_superclass_and_methods() {
        let stmts = parse_ok("class B < A { m() { return super.m(); } n() { return this; } }");
        match &stmts[0] {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                assert_eq!(name.lexeme, "B");
                assert!(
                    matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A")
                );
                assert_eq!(methods.len(), 2);
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn super_requires_dot_and_method_name() {
        let (_, errors) = parse_source("fun f() { super; }");
        assert!(!errors.is_empty());
        assert!(matches!(
            &errors[0],
            LoxError::Parse { message, .. } if message.contains("after 'super'")
        ));
    }

    #[test]
    fn distinct_occurrences_get_distinct_ids() {
        let stmts = parse_ok("a + a;");
        match &stmts[0] {
            Stmt::Expression {
                expression: Expr::Binary { left, right, .. },
            } => {
                let left_id = match left.as_ref() {
                    Expr::Variable { id, .. } => *id,
                    other => panic!("expected variable, got {:?}", other),
                };
                let right_id = match right.as_ref() {
                    Expr::Variable { id, .. } => *id,
                    other => panic!("expected variable, got {:?}", other),
                };
                assert_ne!(left_id, right_id);
            }
            other => panic!("expected binary expression, got {:?}", other),
        }
    }

    #[test]
    fn desugared_for_reads_and_writes_share_no_id() {
        // The incrementor's read and write of `i` sit on the same line with
        // the same lexeme; they must still resolve independently.
        let stmts = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");
        let mut ids = Vec::new();
        fn collect(expr: &Expr, ids: &mut Vec<ExprId>) {
            match expr {
                Expr::Variable { id, .. } | Expr::This { id, .. } | Expr::Super { id, .. } => {
                    ids.push(*id)
                }
                Expr::Assign { id, value, .. } => {
                    ids.push(*id);
                    collect(value, ids);
                }
                Expr::Unary { right, .. } => collect(right, ids),
                Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                    collect(left, ids);
                    collect(right, ids);
                }
                Expr::Grouping { expression } => collect(expression, ids),
                Expr::Call {
                    callee, arguments, ..
                } => {
                    collect(callee, ids);
                    for arg in arguments {
                        collect(arg, ids);
                    }
                }
                Expr::Get { object, .. } => collect(object, ids),
                Expr::Set { object, value, .. } => {
                    collect(object, ids);
                    collect(value, ids);
                }
                Expr::Literal { .. } => {}
            }
        }
        fn walk(stmt: &Stmt, ids: &mut Vec<ExprId>) {
            match stmt {
                Stmt::Expression { expression } | Stmt::Print { expression } => {
                    collect(expression, ids)
                }
                Stmt::Var { initializer, .. } => {
                    if let Some(init) = initializer {
                        collect(init, ids);
                    }
                }
                Stmt::Block { statements } => {
                    for s in statements {
                        walk(s, ids);
                    }
                }
                Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    collect(condition, ids);
                    walk(then_branch, ids);
                    if let Some(eb) = else_branch {
                        walk(eb, ids);
                    }
                }
                Stmt::While { condition, body } => {
                    collect(condition, ids);
                    walk(body, ids);
                }
                Stmt::Function { body, .. } => {
                    for s in body {
                        walk(s, ids);
                    }
                }
                Stmt::Return { value, .. } => {
                    if let Some(v) = value {
                        collect(v, ids);
                    }
                }
                Stmt::Class {
                    superclass,
                    methods,
                    ..
                } => {
                    if let Some(sc) = superclass {
                        collect(sc, ids);
                    }
                    for m in methods {
                        walk(m, ids);
                    }
                }
            }
        }
        for stmt in &stmts {
            walk(stmt, &mut ids);
        }
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len(), "node ids must not collide");
    }

    #[test]
    fn id_counter_threads_across_parsers() {
        let tokens: Vec<Token> = Scanner::new("a;").map(|r| r.unwrap()).collect();
        let mut first = Parser::new(tokens);
        first.parse();
        let next = first.next_id();
        assert!(next > 0);

        let tokens: Vec<Token> = Scanner::new("a;").map(|r| r.unwrap()).collect();
        let mut second = Parser::with_first_id(tokens, next);
        let stmts = second.parse();
        match &stmts[0] {
            Stmt::Expression {
                expression: Expr::Variable { id, .. },
            } => assert_eq!(*id, ExprId(next)),
            other => panic!("expected variable, got {:?}", other),
        }
    }

    #[test]
    fn recovers_from_error_and_keeps_parsing() {
        let (stmts, errors) = parse_source("var = 1; print 2;");
        assert_eq!(errors.len(), 1);
        assert_eq!(stmts.len(), 1);
        assert!(matches!(&stmts[0], Stmt::Print { .. }));
    }

    #[test]
    fn collects_multiple_errors_in_one_pass() {
        let (_, errors) = parse_source("var = 1; var = 2;");
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, LoxError::Parse { .. })));
    }

    #[test]
    fn unclosed_paren_is_an_error() {
        let (_, errors) = parse_source("(1 + 2;");
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            LoxError::Parse { message, .. } if message.contains("after expression")
        ));
    }

    #[test]
    fn printing_then_reparsing_reaches_a_fixed_point() {
        let programs = [
            "var a = 1 + 2 * -3;",
            "print (1 + 2) * 3 == 9 or false;",
            "for (var i = 0; i < 3; i = i + 1) { print i; }",
            "fun fib(n) { if (n <= 1) return n; return fib(n - 2) + fib(n - 1); }",
            "class B < A { init(x) { this.x = x; } m() { return super.m() + \"B\"; } }",
            "while (a and b) { a = a - 1; obj.field = obj.field + 1; }",
        ];
        for program in programs {
            let once = printed(program);
            let twice = printed(&once);
            assert_eq!(once, twice, "program: {}", program);
        }
    }
}
