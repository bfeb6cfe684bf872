//! Recursive-descent parser for the four sublanguages, built directly
//! from the grammar in §4.1. No regex shortcuts: nested parentheses
//! and operator precedence are handled structurally, by the method
//! call tree itself.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::Token;

pub struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

const FUNCTION_NAMES: &[&str] = &[
    "attribute_exists",
    "attribute_not_exists",
    "begins_with",
    "contains",
    "size",
    "attribute_type",
    "if_not_exists",
    "list_append",
];

impl Parser {
    fn new(input: &str) -> Result<Self, ParseError> {
        Ok(Parser {
            tokens: Lexer::tokenize(input)?,
            pos: 0,
        })
    }

    pub fn parse_condition(input: &str) -> Result<ConditionNode, ParseError> {
        let mut parser = Parser::new(input)?;
        let node = parser.or_expr()?;
        parser.expect_eof()?;
        Ok(node)
    }

    pub fn parse_update(input: &str) -> Result<UpdateExpression, ParseError> {
        let mut parser = Parser::new(input)?;
        let update = parser.update_expression()?;
        parser.expect_eof()?;
        Ok(update)
    }

    pub fn parse_key_condition(input: &str) -> Result<KeyCondition, ParseError> {
        let mut parser = Parser::new(input)?;
        let cond = parser.key_condition()?;
        parser.expect_eof()?;
        Ok(cond)
    }

    pub fn parse_projection(input: &str) -> Result<ProjectionExpression, ParseError> {
        let mut parser = Parser::new(input)?;
        let mut paths = vec![parser.path()?];
        while parser.eat(&Token::Comma) {
            paths.push(parser.path()?);
        }
        parser.expect_eof()?;
        Ok(paths)
    }

    // ---- cursor helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn pos_of_current(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(ParseError::new(
                format!(
                    "expected {}, found {}",
                    token.describe(),
                    self.peek().describe()
                ),
                self.pos_of_current(),
            ))
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if *self.peek() == Token::Eof {
            Ok(())
        } else {
            Err(ParseError::new(
                format!("unexpected trailing {}", self.peek().describe()),
                self.pos_of_current(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            other => Err(ParseError::new(
                format!("expected an identifier, found {}", other.describe()),
                self.pos_of_current(),
            )),
        }
    }

    // ---- condition grammar ----

    fn or_expr(&mut self) -> Result<ConditionNode, ParseError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = ConditionNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<ConditionNode, ParseError> {
        let mut left = self.not_expr()?;
        while self.eat(&Token::And) {
            let right = self.not_expr()?;
            left = ConditionNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<ConditionNode, ParseError> {
        if self.eat(&Token::Not) {
            let inner = self.not_expr()?;
            return Ok(ConditionNode::Not(Box::new(inner)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<ConditionNode, ParseError> {
        if self.eat(&Token::LParen) {
            let inner = self.or_expr()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }

        let left = self.operand()?;

        if self.eat(&Token::Between) {
            let low = self.operand()?;
            self.expect(&Token::And)?;
            let high = self.operand()?;
            return Ok(ConditionNode::Between {
                operand: left,
                low,
                high,
            });
        }
        if self.eat(&Token::In) {
            self.expect(&Token::LParen)?;
            let mut values = vec![self.operand()?];
            while self.eat(&Token::Comma) {
                values.push(self.operand()?);
            }
            self.expect(&Token::RParen)?;
            return Ok(ConditionNode::In {
                operand: left,
                values,
            });
        }
        if let Some(op) = self.compare_op() {
            self.advance();
            let right = self.operand()?;
            return Ok(ConditionNode::Compare { left, op, right });
        }

        match left {
            Operand::Function(call) => Ok(ConditionNode::Function(*call)),
            _ => Err(ParseError::new(
                "expected a comparison, BETWEEN, IN, or function call".to_string(),
                self.pos_of_current(),
            )),
        }
    }

    fn compare_op(&self) -> Option<CompareOp> {
        match self.peek() {
            Token::Eq => Some(CompareOp::Eq),
            Token::Ne => Some(CompareOp::Ne),
            Token::Lt => Some(CompareOp::Lt),
            Token::Le => Some(CompareOp::Le),
            Token::Gt => Some(CompareOp::Gt),
            Token::Ge => Some(CompareOp::Ge),
            _ => None,
        }
    }

    // ---- operands, paths, function calls (shared across grammars) ----

    fn path(&mut self) -> Result<Path, ParseError> {
        match self.advance() {
            Token::NamePlaceholder(name) => Ok(Path::Placeholder(name)),
            Token::Ident(name) => Ok(Path::Name(name)),
            other => Err(ParseError::new(
                format!("expected an attribute path, found {}", other.describe()),
                self.pos_of_current(),
            )),
        }
    }

    fn operand(&mut self) -> Result<Operand, ParseError> {
        match self.peek().clone() {
            Token::NamePlaceholder(name) => {
                self.advance();
                Ok(Operand::Path(Path::Placeholder(name)))
            }
            Token::ValuePlaceholder(name) => {
                self.advance();
                Ok(Operand::Placeholder(name))
            }
            Token::Number(n) => {
                self.advance();
                Ok(Operand::NumberLiteral(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Operand::StringLiteral(s))
            }
            Token::Ident(name) if FUNCTION_NAMES.contains(&name.as_str()) => {
                self.function_call(&name)
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Operand::Path(Path::Name(name)))
            }
            other => Err(ParseError::new(
                format!("expected a value or path, found {}", other.describe()),
                self.pos_of_current(),
            )),
        }
    }

    fn function_call(&mut self, name: &str) -> Result<Operand, ParseError> {
        self.advance(); // function name
        self.expect(&Token::LParen)?;
        let call = match name {
            "attribute_exists" => {
                let path = self.path()?;
                FunctionCall::AttributeExists(path)
            }
            "attribute_not_exists" => {
                let path = self.path()?;
                FunctionCall::AttributeNotExists(path)
            }
            "begins_with" => {
                let a = self.operand()?;
                self.expect(&Token::Comma)?;
                let b = self.operand()?;
                FunctionCall::BeginsWith(a, b)
            }
            "contains" => {
                let a = self.operand()?;
                self.expect(&Token::Comma)?;
                let b = self.operand()?;
                FunctionCall::Contains(a, b)
            }
            "attribute_type" => {
                let a = self.operand()?;
                self.expect(&Token::Comma)?;
                let b = self.operand()?;
                FunctionCall::AttributeType(a, b)
            }
            "size" => {
                let a = self.operand()?;
                FunctionCall::Size(a)
            }
            "if_not_exists" => {
                let a = self.operand()?;
                self.expect(&Token::Comma)?;
                let b = self.operand()?;
                FunctionCall::IfNotExists(a, b)
            }
            "list_append" => {
                let a = self.operand()?;
                self.expect(&Token::Comma)?;
                let b = self.operand()?;
                FunctionCall::ListAppend(a, b)
            }
            other => {
                return Err(ParseError::new(
                    format!("unknown function '{other}'"),
                    self.pos_of_current(),
                ))
            }
        };
        self.expect(&Token::RParen)?;
        Ok(Operand::Function(Box::new(call)))
    }

    // ---- update grammar ----

    fn update_expression(&mut self) -> Result<UpdateExpression, ParseError> {
        let mut update = UpdateExpression::default();
        loop {
            match self.peek().clone() {
                Token::Set => {
                    self.advance();
                    update.set.push(self.set_action()?);
                    while self.eat(&Token::Comma) {
                        update.set.push(self.set_action()?);
                    }
                }
                Token::Remove => {
                    self.advance();
                    update.remove.push(self.path()?);
                    while self.eat(&Token::Comma) {
                        update.remove.push(self.path()?);
                    }
                }
                Token::Add => {
                    self.advance();
                    update.add.push(self.add_action()?);
                    while self.eat(&Token::Comma) {
                        update.add.push(self.add_action()?);
                    }
                }
                Token::Delete => {
                    self.advance();
                    update.delete.push(self.delete_action()?);
                    while self.eat(&Token::Comma) {
                        update.delete.push(self.delete_action()?);
                    }
                }
                Token::Eof => break,
                other => {
                    return Err(ParseError::new(
                        format!("expected SET, REMOVE, ADD, or DELETE, found {}", other.describe()),
                        self.pos_of_current(),
                    ))
                }
            }
        }
        if update.set.is_empty() && update.remove.is_empty() && update.add.is_empty() && update.delete.is_empty()
        {
            return Err(ParseError::new(
                "an update expression must contain at least one clause".to_string(),
                self.pos_of_current(),
            ));
        }
        Ok(update)
    }

    fn set_action(&mut self) -> Result<SetAction, ParseError> {
        let path = self.path()?;
        self.expect(&Token::Eq)?;
        let left = self.operand()?;
        let value = if self.eat(&Token::Plus) {
            SetValue::Arithmetic {
                left,
                op: ArithOp::Plus,
                right: self.operand()?,
            }
        } else if self.eat(&Token::Minus) {
            SetValue::Arithmetic {
                left,
                op: ArithOp::Minus,
                right: self.operand()?,
            }
        } else {
            SetValue::Operand(left)
        };
        Ok(SetAction { path, value })
    }

    fn add_action(&mut self) -> Result<AddAction, ParseError> {
        let path = self.path()?;
        let value = self.operand()?;
        Ok(AddAction { path, value })
    }

    fn delete_action(&mut self) -> Result<DeleteAction, ParseError> {
        let path = self.path()?;
        let value = self.operand()?;
        Ok(DeleteAction { path, value })
    }

    // ---- key-condition grammar ----

    fn key_condition(&mut self) -> Result<KeyCondition, ParseError> {
        let partition_key = self.path()?;
        self.expect(&Token::Eq)?;
        let partition_value = self.operand()?;

        let sort = if self.eat(&Token::And) {
            Some(self.sort_condition()?)
        } else {
            None
        };

        Ok(KeyCondition {
            partition_key,
            partition_value,
            sort,
        })
    }

    fn sort_condition(&mut self) -> Result<SortCondition, ParseError> {
        if let Token::Ident(name) = self.peek().clone() {
            if name == "begins_with" {
                let operand = self.function_call(&name)?;
                return match operand {
                    Operand::Function(call) => match *call {
                        FunctionCall::BeginsWith(_, value) => Ok(SortCondition::BeginsWith(value)),
                        _ => unreachable!(),
                    },
                    _ => unreachable!(),
                };
            }
        }

        let _sort_path = self.path()?;
        if self.eat(&Token::Between) {
            let low = self.operand()?;
            self.expect(&Token::And)?;
            let high = self.operand()?;
            return Ok(SortCondition::Between(low, high));
        }
        let op = self.compare_op().ok_or_else(|| {
            ParseError::new(
                "expected a comparison operator or BETWEEN in sort-key condition".to_string(),
                self.pos_of_current(),
            )
        })?;
        self.advance();
        let value = self.operand()?;
        Ok(SortCondition::Compare(op, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let ast = Parser::parse_condition("#n = :v").unwrap();
        assert_eq!(
            ast,
            ConditionNode::Compare {
                left: Operand::Path(Path::Placeholder("n".into())),
                op: CompareOp::Eq,
                right: Operand::Placeholder("v".into()),
            }
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let ast = Parser::parse_condition("a = :x OR b = :y AND c = :z").unwrap();
        match ast {
            ConditionNode::Or(left, right) => {
                assert!(matches!(*left, ConditionNode::Compare { .. }));
                assert!(matches!(*right, ConditionNode::And(_, _)));
            }
            other => panic!("expected OR at top level, got {other:?}"),
        }
    }

    #[test]
    fn parens_override_precedence() {
        let ast = Parser::parse_condition("(a = :x OR b = :y) AND c = :z").unwrap();
        match ast {
            ConditionNode::And(left, _) => {
                assert!(matches!(*left, ConditionNode::Or(_, _)));
            }
            other => panic!("expected AND at top level, got {other:?}"),
        }
    }

    #[test]
    fn not_applies_to_the_following_atom() {
        let ast = Parser::parse_condition("NOT attribute_exists(id)").unwrap();
        assert!(matches!(ast, ConditionNode::Not(_)));
    }

    #[test]
    fn parses_between_and_in() {
        assert!(matches!(
            Parser::parse_condition("a BETWEEN :lo AND :hi").unwrap(),
            ConditionNode::Between { .. }
        ));
        assert!(matches!(
            Parser::parse_condition("a IN (:x, :y, :z)").unwrap(),
            ConditionNode::In { .. }
        ));
    }

    #[test]
    fn parses_function_call_atom() {
        let ast = Parser::parse_condition("attribute_not_exists(id)").unwrap();
        assert_eq!(
            ast,
            ConditionNode::Function(FunctionCall::AttributeNotExists(Path::Name("id".into())))
        );
    }

    #[test]
    fn parses_nested_size_in_comparison() {
        let ast = Parser::parse_condition("size(list) > :n").unwrap();
        match ast {
            ConditionNode::Compare { left, op, .. } => {
                assert_eq!(op, CompareOp::Gt);
                assert!(matches!(left, Operand::Function(_)));
            }
            other => panic!("unexpected ast {other:?}"),
        }
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(Parser::parse_condition("a = :x extra").is_err());
    }

    #[test]
    fn parses_update_clauses_out_of_order() {
        let update = Parser::parse_update("DELETE tags :t ADD count :n SET a = :x REMOVE b").unwrap();
        assert_eq!(update.set.len(), 1);
        assert_eq!(update.remove.len(), 1);
        assert_eq!(update.add.len(), 1);
        assert_eq!(update.delete.len(), 1);
    }

    #[test]
    fn parses_set_arithmetic() {
        let update = Parser::parse_update("SET a = a + :n").unwrap();
        assert!(matches!(update.set[0].value, SetValue::Arithmetic { .. }));
    }

    #[test]
    fn parses_set_if_not_exists_and_list_append() {
        let update = Parser::parse_update("SET a = if_not_exists(a, :d), b = list_append(b, :x)").unwrap();
        assert_eq!(update.set.len(), 2);
    }

    #[test]
    fn update_requires_at_least_one_clause() {
        assert!(Parser::parse_update("").is_err());
    }

    #[test]
    fn parses_key_condition_with_between() {
        let kc = Parser::parse_key_condition("userId = :u AND ts BETWEEN :lo AND :hi").unwrap();
        assert_eq!(kc.partition_key, Path::Name("userId".into()));
        assert!(matches!(kc.sort, Some(SortCondition::Between(_, _))));
    }

    #[test]
    fn parses_key_condition_with_begins_with() {
        let kc = Parser::parse_key_condition("pk = :p AND begins_with(sk, :prefix)").unwrap();
        assert!(matches!(kc.sort, Some(SortCondition::BeginsWith(_))));
    }

    #[test]
    fn key_condition_without_sort_condition() {
        let kc = Parser::parse_key_condition("pk = :p").unwrap();
        assert!(kc.sort.is_none());
    }

    #[test]
    fn parses_projection_list() {
        let paths = Parser::parse_projection("#a, b, #c").unwrap();
        assert_eq!(paths.len(), 3);
    }
}
