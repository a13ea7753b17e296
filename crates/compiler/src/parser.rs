//! Single-pass recursive-descent parser fused with a code generator.
//!
//! Every production returns `bool`: `true` means it emitted valid bytecode
//! and left `self.pos` past what it consumed; `false` means it recorded a
//! diagnostic and the caller should unwind to `synchronize`. This mirrors
//! the reference parser's control flow exactly rather than threading a
//! `Result` through every production, since the unwind-on-false behavior
//! *is* the synchronization mechanism (see `Parser::synchronize`).

use copper_core::{diagnostics::format_diagnostic, Bytecode, OpCode, TranslationUnit, Value};
use copper_lexer::{Token, TokenKind};

use crate::environment::LexicalEnvironment;

struct LoopFrame {
    continue_offset: u32,
    break_patches: Vec<usize>,
}

pub struct Parser<'a> {
    tu: &'a TranslationUnit,
    tokens: Vec<Token>,
    pos: usize,
    bytecode: Bytecode,
    env: &'a mut LexicalEnvironment,
    loop_stack: Vec<LoopFrame>,
    errors: Vec<String>,
}

impl<'a> Parser<'a> {
    pub fn new(tu: &'a TranslationUnit, tokens: Vec<Token>, env: &'a mut LexicalEnvironment) -> Self {
        Parser { tu, tokens, pos: 0, bytecode: Bytecode::new(), env, loop_stack: Vec::new(), errors: Vec::new() }
    }

    /// Parses every declaration in `self.tokens`, synchronizing and
    /// continuing after each failure so one run reports as many problems as
    /// possible. Returns whether the whole program compiled cleanly.
    pub fn parse(mut self) -> (Bytecode, Vec<String>) {
        self.env.begin_scope();
        while !self.at_eof() {
            if !self.declaration() {
                self.synchronize();
            }
        }
        (self.bytecode, self.errors)
    }

    // -- token stream helpers -------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos - 1]
    }

    fn next(&mut self) -> Token {
        if !self.at_eof() {
            self.pos += 1;
        }
        self.previous().clone()
    }

    fn consume(&mut self) {
        self.next();
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.consume();
            true
        } else {
            false
        }
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn error(&mut self, message: impl Into<String>) {
        let token = self.peek();
        let diagnostic = format_diagnostic(self.tu, token.line as usize, token.column as usize, &message.into());
        self.errors.push(diagnostic);
    }

    /// Returns the offset of the jump's (still-zero) operand word, to be
    /// filled in later by `patch_jump`.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        let (line, column) = (self.peek().line, self.peek().column);
        self.bytecode.emit_with_operand(op, 0, line, column)
    }

    fn patch_jump(&mut self, operand_offset: usize) {
        let target = self.bytecode.len() as u32;
        let _ = self.bytecode.patch(operand_offset, target);
    }

    /// Skips tokens until one that plausibly starts a new declaration, so a
    /// single bad statement doesn't prevent the rest of the program from
    /// being checked.
    fn synchronize(&mut self) {
        use TokenKind::*;
        while !self.at_eof() {
            match self.peek().kind {
                Class | Function | Let | Const | For | If | While | Do | Try | Print => return,
                _ => self.consume(),
            }
        }
    }

    // -- declarations and statements -----------------------------------------

    fn declaration(&mut self) -> bool {
        if self.matches(TokenKind::Let) {
            self.declaration_list(false)
        } else if self.matches(TokenKind::Const) {
            self.declaration_list(true)
        } else {
            self.statement()
        }
    }

    fn declaration_list(&mut self, is_const: bool) -> bool {
        let mut identifier_found = false;
        while self.check(TokenKind::Identifier) {
            identifier_found = true;
            if !self.single_declaration(is_const) {
                return false;
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }

        if !identifier_found {
            self.error("Unexpected token");
            return false;
        }

        if !self.matches(TokenKind::Semicolon) {
            self.error("Expect ';' after declaration");
            return false;
        }

        true
    }

    fn single_declaration(&mut self, is_const: bool) -> bool {
        let identifier_token = self.next();

        if self.matches(TokenKind::Assignment) {
            if !self.expression() {
                return false;
            }
        } else {
            if is_const {
                self.error("Missing initializer in const declaration");
                return false;
            }
            let (line, column) = (self.peek().line, self.peek().column);
            let offset = self.bytecode.add_constant(Value::Undefined);
            self.bytecode.emit_with_operand(OpCode::Ldc, offset, line, column);
        }

        if !self.env.new_variable(&identifier_token.lexeme, is_const) {
            self.error(format!("Redeclaration of variable: {}", identifier_token.lexeme));
            return false;
        }

        true
    }

    fn statement(&mut self) -> bool {
        if self.matches(TokenKind::OpenBrace) {
            self.block()
        } else if self.matches(TokenKind::Print) {
            self.print_statement()
        } else if self.matches(TokenKind::If) {
            self.if_statement()
        } else if self.matches(TokenKind::For) {
            self.for_statement()
        } else if self.matches(TokenKind::While) {
            self.while_statement()
        } else {
            self.expression_statement()
        }
    }

    fn print_statement(&mut self) -> bool {
        let (line, column) = (self.previous().line, self.previous().column);
        if !self.expression() {
            return false;
        }
        self.bytecode.emit(OpCode::Print, line, column);

        if !self.matches(TokenKind::Semicolon) {
            self.error("Expect ';' after statement");
            return false;
        }
        true
    }

    fn expression_statement(&mut self) -> bool {
        if !self.expression() {
            return false;
        }
        if self.matches(TokenKind::Semicolon) {
            let (line, column) = (self.previous().line, self.previous().column);
            self.bytecode.emit(OpCode::Pop, line, column);
            true
        } else {
            self.error("Expect ';' after expression");
            false
        }
    }

    fn block(&mut self) -> bool {
        self.env.begin_scope();

        while !self.at_eof() && !self.check(TokenKind::CloseBrace) {
            if !self.declaration() {
                return false;
            }
        }

        if !self.matches(TokenKind::CloseBrace) {
            self.error("Expect '}' after block");
            return false;
        }

        let pop_count = self.env.close_scope();
        let (line, column) = (self.previous().line, self.previous().column);
        self.bytecode.emit_with_operand(OpCode::PopN, pop_count as u32, line, column);
        true
    }

    fn if_statement(&mut self) -> bool {
        if !self.matches(TokenKind::OpenParen) {
            self.error("Expect '(' before if condition");
            return false;
        }

        if !self.expression() {
            return false;
        }

        let jnt_offset = self.emit_jump(OpCode::Jnt);
        let (line, column) = (self.peek().line, self.peek().column);
        self.bytecode.emit(OpCode::Pop, line, column);

        if !self.matches(TokenKind::CloseParen) {
            self.error("Expect ')' after if condition");
            return false;
        }

        if !self.statement() {
            return false;
        }

        let jmp_offset = self.emit_jump(OpCode::Jmp);
        self.patch_jump(jnt_offset);

        let (line, column) = (self.peek().line, self.peek().column);
        self.bytecode.emit(OpCode::Pop, line, column);
        if self.matches(TokenKind::Else) && !self.statement() {
            return false;
        }

        self.patch_jump(jmp_offset);
        true
    }

    fn for_statement(&mut self) -> bool {
        self.env.begin_scope();
        if !self.matches(TokenKind::OpenParen) {
            self.error("Expect '(' before for initializer");
            return false;
        }

        if self.matches(TokenKind::Semicolon) {
            // empty initializer
        } else if self.matches(TokenKind::Let) || self.matches(TokenKind::Const) {
            let is_const = self.previous().kind == TokenKind::Const;
            if !self.declaration_list(is_const) {
                return false;
            }
        } else if !self.expression_statement() {
            return false;
        }

        let next_iteration = self.bytecode.len() as u32;
        let mut to_end_of_loop: Option<usize> = None;

        if !self.matches(TokenKind::Semicolon) {
            if !self.expression() {
                return false;
            }
            if !self.matches(TokenKind::Semicolon) {
                self.error("Expect ';' after for exit condition");
                return false;
            }
            to_end_of_loop = Some(self.emit_jump(OpCode::Jnt));
            let (line, column) = (self.peek().line, self.peek().column);
            self.bytecode.emit(OpCode::Pop, line, column);
        }

        let mut to_increment = next_iteration;
        let mut to_body: Option<usize> = None;

        if !self.matches(TokenKind::CloseParen) {
            to_body = Some(self.emit_jump(OpCode::Jmp));
            to_increment = self.bytecode.len() as u32;

            if !self.expression() {
                return false;
            }
            if !self.matches(TokenKind::CloseParen) {
                self.error("Expect ')' after for declaration");
                return false;
            }

            let (line, column) = (self.peek().line, self.peek().column);
            self.bytecode.emit(OpCode::Pop, line, column);
            self.bytecode.emit_with_operand(OpCode::Jmp, next_iteration, line, column);
        }

        if let Some(offset) = to_body {
            self.patch_jump(offset);
        }

        self.loop_stack.push(LoopFrame { continue_offset: to_increment, break_patches: Vec::new() });
        if !self.statement() {
            return false;
        }

        let (line, column) = (self.peek().line, self.peek().column);
        self.bytecode.emit_with_operand(OpCode::Jmp, to_increment, line, column);

        if let Some(offset) = to_end_of_loop {
            self.patch_jump(offset);
            let (line, column) = (self.peek().line, self.peek().column);
            self.bytecode.emit(OpCode::Pop, line, column);
        }

        let frame = self.loop_stack.pop().unwrap();
        for patch in frame.break_patches {
            self.patch_jump(patch);
        }

        let pop_count = self.env.close_scope();
        let (line, column) = (self.previous().line, self.previous().column);
        self.bytecode.emit_with_operand(OpCode::PopN, pop_count as u32, line, column);
        true
    }

    fn while_statement(&mut self) -> bool {
        if !self.matches(TokenKind::OpenParen) {
            self.error("Expect '(' before while condition");
            return false;
        }

        let next_iteration = self.bytecode.len() as u32;
        if !self.expression() {
            return false;
        }

        let to_end_of_loop = self.emit_jump(OpCode::Jnt);
        let (line, column) = (self.peek().line, self.peek().column);
        self.bytecode.emit(OpCode::Pop, line, column);

        if !self.matches(TokenKind::CloseParen) {
            self.error("Expect ')' after while condition");
            return false;
        }

        self.loop_stack.push(LoopFrame { continue_offset: next_iteration, break_patches: Vec::new() });
        if !self.statement() {
            return false;
        }

        let (line, column) = (self.peek().line, self.peek().column);
        self.bytecode.emit_with_operand(OpCode::Jmp, next_iteration, line, column);
        self.patch_jump(to_end_of_loop);
        self.bytecode.emit(OpCode::Pop, line, column);

        let frame = self.loop_stack.pop().unwrap();
        for patch in frame.break_patches {
            self.patch_jump(patch);
        }
        true
    }

    // -- expressions, highest to lowest precedence ---------------------------

    fn expression(&mut self) -> bool {
        self.logical_or()
    }

    fn logical_or(&mut self) -> bool {
        if !self.logical_and() {
            return false;
        }
        while self.matches(TokenKind::Or) {
            let (line, column) = (self.previous().line, self.previous().column);
            if !self.logical_and() {
                return false;
            }
            self.bytecode.emit(OpCode::Or, line, column);
        }
        true
    }

    fn logical_and(&mut self) -> bool {
        if !self.equality() {
            return false;
        }
        while self.matches(TokenKind::And) {
            let (line, column) = (self.previous().line, self.previous().column);
            if !self.equality() {
                return false;
            }
            self.bytecode.emit(OpCode::And, line, column);
        }
        true
    }

    fn equality(&mut self) -> bool {
        if !self.comparison() {
            return false;
        }
        while matches!(self.peek().kind, TokenKind::Equ | TokenKind::Neq) {
            let op = self.next();
            if !self.comparison() {
                return false;
            }
            let code = if op.kind == TokenKind::Equ { OpCode::Equ } else { OpCode::Neq };
            self.bytecode.emit(code, op.line, op.column);
        }
        true
    }

    fn comparison(&mut self) -> bool {
        if !self.term() {
            return false;
        }
        while matches!(self.peek().kind, TokenKind::Grt | TokenKind::Lst | TokenKind::Gre | TokenKind::Lse) {
            let op = self.next();
            if !self.term() {
                return false;
            }
            let code = match op.kind {
                TokenKind::Grt => OpCode::Grt,
                TokenKind::Lst => OpCode::Lst,
                TokenKind::Gre => OpCode::Gre,
                _ => OpCode::Lse,
            };
            self.bytecode.emit(code, op.line, op.column);
        }
        true
    }

    fn term(&mut self) -> bool {
        if !self.factor() {
            return false;
        }
        while matches!(self.peek().kind, TokenKind::Plus | TokenKind::Minus) {
            let op = self.next();
            if !self.factor() {
                return false;
            }
            let code = if op.kind == TokenKind::Plus { OpCode::Add } else { OpCode::Sub };
            self.bytecode.emit(code, op.line, op.column);
        }
        true
    }

    fn factor(&mut self) -> bool {
        if !self.exponent() {
            return false;
        }
        while matches!(self.peek().kind, TokenKind::Multiply | TokenKind::Divide | TokenKind::Modulo) {
            let op = self.next();
            if !self.exponent() {
                return false;
            }
            let code = match op.kind {
                TokenKind::Multiply => OpCode::Mul,
                TokenKind::Divide => OpCode::Div,
                _ => OpCode::Mod,
            };
            self.bytecode.emit(code, op.line, op.column);
        }
        true
    }

    fn exponent(&mut self) -> bool {
        if !self.pre_unary() {
            return false;
        }
        if self.matches(TokenKind::Exponent) {
            let op = self.previous().clone();
            if !self.exponent() {
                return false;
            }
            self.bytecode.emit(OpCode::Exp, op.line, op.column);
        }
        true
    }

    fn pre_unary(&mut self) -> bool {
        match self.peek().kind {
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op_token = self.next();
                let op = if op_token.kind == TokenKind::PlusPlus { OpCode::Incr } else { OpCode::Decr };

                let identifier_token = self.next();
                let Some(slot) = self.env.resolve_variable(&identifier_token.lexeme) else {
                    self.error(format!("Undefined variable: {}", identifier_token.lexeme));
                    return false;
                };
                if self.env.is_variable_const(slot) {
                    self.error(format!("Assignment to const variable: {}", identifier_token.lexeme));
                    return false;
                }

                let (line, column) = (identifier_token.line, identifier_token.column);
                self.bytecode.emit_with_operand(OpCode::LdVar, slot as u32, line, column);
                self.bytecode.emit(op, line, column);
                self.bytecode.emit_with_operand(OpCode::SetVar, slot as u32, line, column);
                true
            }
            TokenKind::Minus | TokenKind::Negation => {
                let op_token = self.next();
                let op = if op_token.kind == TokenKind::Minus { OpCode::Neg } else { OpCode::Not };
                if !self.pre_unary() {
                    return false;
                }
                self.bytecode.emit(op, op_token.line, op_token.column);
                true
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> bool {
        let primary_token = self.peek().clone();
        match primary_token.kind {
            TokenKind::OpenParen => {
                if !self.grouping() {
                    return false;
                }
            }
            TokenKind::OpenSquareBracket => {
                if !self.array() {
                    return false;
                }
            }
            TokenKind::Number => {
                let n: f64 = primary_token.lexeme.parse().unwrap_or(0.0);
                let offset = self.bytecode.add_constant(Value::Number(n));
                self.bytecode.emit_with_operand(OpCode::Ldc, offset, primary_token.line, primary_token.column);
                self.next();
            }
            TokenKind::True | TokenKind::False => {
                let offset = self.bytecode.add_constant(Value::Boolean(primary_token.kind == TokenKind::True));
                self.bytecode.emit_with_operand(OpCode::Ldc, offset, primary_token.line, primary_token.column);
                self.next();
            }
            TokenKind::String => {
                let offset = self.bytecode.add_constant(Value::string(primary_token.lexeme.clone()));
                self.bytecode.emit_with_operand(OpCode::Ldc, offset, primary_token.line, primary_token.column);
                self.next();
            }
            TokenKind::InterpolationStart => {
                self.consume();
                if !self.expression() {
                    return false;
                }
                if !self.matches(TokenKind::CloseBrace) {
                    self.error("Expect '}' after template expression");
                    return false;
                }
            }
            TokenKind::BackTick => return self.string_template(),
            TokenKind::Identifier => return self.identifier(),
            TokenKind::NullType => {
                let offset = self.bytecode.add_constant(Value::Null);
                self.bytecode.emit_with_operand(OpCode::Ldc, offset, primary_token.line, primary_token.column);
                self.consume();
            }
            TokenKind::Undefined => {
                let offset = self.bytecode.add_constant(Value::Undefined);
                self.bytecode.emit_with_operand(OpCode::Ldc, offset, primary_token.line, primary_token.column);
                self.consume();
            }
            TokenKind::Break => {
                if self.loop_stack.is_empty() {
                    self.error("Illegal break statement");
                    return false;
                }
                let patch = self.emit_jump(OpCode::Jmp);
                self.loop_stack.last_mut().unwrap().break_patches.push(patch);
                self.consume();
            }
            TokenKind::Continue => {
                if self.loop_stack.is_empty() {
                    self.error("Illegal continue statement, no enclosing iteration statement");
                    return false;
                }
                let target = self.loop_stack.last().unwrap().continue_offset;
                let (line, column) = (self.peek().line, self.peek().column);
                self.bytecode.emit_with_operand(OpCode::Jmp, target, line, column);
                self.consume();
            }
            TokenKind::Eof => {
                self.error("Unexpected end-of-file, expect expression");
                return false;
            }
            _ => {
                self.error("Expect expression");
                return false;
            }
        }
        true
    }

    fn grouping(&mut self) -> bool {
        self.consume(); // '('
        if !self.expression() {
            return false;
        }
        if self.matches(TokenKind::CloseParen) {
            return true;
        }
        if self.at_eof() {
            self.error("Unexpected end-of-file, expect ')'");
        } else {
            self.error("Expect ')'");
        }
        false
    }

    fn array(&mut self) -> bool {
        self.consume(); // '['
        let mut size: u32 = 0;

        while !self.at_eof() && !self.matches(TokenKind::CloseSquareBracket) {
            if !self.expression() {
                return false;
            }
            size += 1;
            if !self.matches(TokenKind::Comma) {
                if !self.matches(TokenKind::CloseSquareBracket) {
                    self.error("Expect ',' between array members");
                    return false;
                }
                break;
            }
        }

        if self.previous().kind == TokenKind::CloseSquareBracket {
            let (line, column) = (self.peek().line, self.peek().column);
            self.bytecode.emit_with_operand(OpCode::NewArr, size, line, column);
            true
        } else {
            if self.at_eof() {
                self.error("Unexpected end-of-file, expect ']'");
            } else {
                self.error("Expect ']' after array declaration");
            }
            false
        }
    }

    /// A template string lowers (in the lexer) to a chain of `STRING`,
    /// `PLUS`, `INTERPOLATION_START ... CLOSE_BRACE`, `PLUS` tokens; `term`'s
    /// own `+` loop and `primary`'s `InterpolationStart` arm absorb that
    /// whole chain through a single `expression()` call, so this only has to
    /// consume the delimiters.
    fn string_template(&mut self) -> bool {
        self.consume(); // opening `
        if !self.expression() {
            return false;
        }
        if !self.matches(TokenKind::BackTick) {
            if self.at_eof() {
                self.error("Unexpected end-of-file, unterminated string template literal");
            } else {
                self.error("Expect '`' after template string literal");
            }
            return false;
        }
        true
    }

    fn identifier(&mut self) -> bool {
        let identifier_token = self.next();
        let Some(_slot) = self.env.resolve_variable(&identifier_token.lexeme) else {
            self.error(format!("Undefined variable: {}", identifier_token.lexeme));
            return false;
        };

        if self.check(TokenKind::OpenSquareBracket) {
            self.member_access(&identifier_token)
        } else {
            self.variable_reference(&identifier_token)
        }
    }

    fn member_access(&mut self, identifier_token: &Token) -> bool {
        let slot = self.env.resolve_variable(&identifier_token.lexeme).unwrap();
        self.bytecode.emit_with_operand(OpCode::LdVar, slot as u32, identifier_token.line, identifier_token.column);

        while self.matches(TokenKind::OpenSquareBracket) {
            if !self.expression() {
                return false;
            }
            if !self.matches(TokenKind::CloseSquareBracket) {
                self.error("Expect ']' after member access");
                return false;
            }
            if !self.matches(TokenKind::Assignment) {
                let (line, column) = (self.previous().line, self.previous().column);
                self.bytecode.emit(OpCode::LdProp, line, column);
            }
        }

        if self.previous().kind == TokenKind::Assignment {
            if !self.expression() {
                return false;
            }
            let (line, column) = (self.peek().line, self.peek().column);
            self.bytecode.emit(OpCode::SetProp, line, column);
        }

        true
    }

    fn variable_reference(&mut self, identifier_token: &Token) -> bool {
        let slot = self.env.resolve_variable(&identifier_token.lexeme).unwrap();

        if self.matches(TokenKind::Assignment) {
            if self.env.is_variable_const(slot) {
                self.error(format!("Assignment to const variable: {}", identifier_token.lexeme));
                return false;
            }
            if !self.expression() {
                return false;
            }
            self.bytecode.emit_with_operand(OpCode::SetVar, slot as u32, identifier_token.line, identifier_token.column);
        } else if self.matches(TokenKind::PlusPlus) || self.matches(TokenKind::MinusMinus) {
            return self.post_unary(identifier_token);
        } else {
            self.bytecode.emit_with_operand(OpCode::LdVar, slot as u32, identifier_token.line, identifier_token.column);
        }

        true
    }

    /// Lowers `i++`/`i--` by loading the variable twice: the first load is
    /// left on the stack as the expression's (pre-increment) result; the
    /// second is used to compute and store the new value, then popped, so
    /// only the original value remains.
    fn post_unary(&mut self, identifier_token: &Token) -> bool {
        let slot = self.env.resolve_variable(&identifier_token.lexeme).unwrap();
        if self.env.is_variable_const(slot) {
            self.error(format!("Assignment to const variable: {}", identifier_token.lexeme));
            return false;
        }

        let (line, column) = (identifier_token.line, identifier_token.column);
        self.bytecode.emit_with_operand(OpCode::LdVar, slot as u32, line, column);
        self.bytecode.emit_with_operand(OpCode::LdVar, slot as u32, line, column);

        let (op_line, op_column) = (self.previous().line, self.previous().column);
        let one = self.bytecode.add_constant(Value::Number(1.0));
        self.bytecode.emit_with_operand(OpCode::Ldc, one, op_line, op_column);
        let code = if self.previous().kind == TokenKind::PlusPlus { OpCode::Add } else { OpCode::Sub };
        self.bytecode.emit(code, op_line, op_column);

        self.bytecode.emit_with_operand(OpCode::SetVar, slot as u32, op_line, op_column);
        self.bytecode.emit(OpCode::Pop, op_line, op_column);

        true
    }
}
