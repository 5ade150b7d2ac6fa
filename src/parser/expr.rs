use crate::lexer::token::TokenKind;

use super::ast::{BinaryOp, BoolOperator, CompareOp, Constant, Expr, UnaryOperator};
use super::{ParseError, Parser};

impl Parser {
    pub(crate) fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and_expr()?;

        while self.matches_kind(TokenKind::Or) {
            let rhs = self.and_expr()?;
            expr = Expr::BoolOp {
                lhs: Box::new(expr),
                op: BoolOperator::Or,
                rhs: Box::new(rhs),
            };
        }

        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.not_expr()?;

        while self.matches_kind(TokenKind::And) {
            let rhs = self.not_expr()?;
            expr = Expr::BoolOp {
                lhs: Box::new(expr),
                op: BoolOperator::And,
                rhs: Box::new(rhs),
            };
        }

        Ok(expr)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.matches_kind(TokenKind::Not) {
            let operand = self.not_expr()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }

        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let expr = self.term()?;

        let Some(op) = self.compare_op() else {
            return Ok(expr);
        };
        let rhs = self.term()?;

        if self.compare_op().is_some() {
            return Err(ParseError::new(
                "chained comparisons are not supported",
                self.previous(),
            ));
        }

        Ok(Expr::Compare {
            lhs: Box::new(expr),
            op,
            rhs: Box::new(rhs),
        })
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        if self.matches_kind(TokenKind::EqualEqual) {
            Some(CompareOp::Eq)
        } else if self.matches_kind(TokenKind::BangEqual) {
            Some(CompareOp::NotEq)
        } else if self.matches_kind(TokenKind::Less) {
            Some(CompareOp::Lt)
        } else if self.matches_kind(TokenKind::LessEqual) {
            Some(CompareOp::LtE)
        } else if self.matches_kind(TokenKind::Greater) {
            Some(CompareOp::Gt)
        } else if self.matches_kind(TokenKind::GreaterEqual) {
            Some(CompareOp::GtE)
        } else {
            None
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;

        loop {
            let op = if self.matches_kind(TokenKind::Plus) {
                Some(BinaryOp::Add)
            } else if self.matches_kind(TokenKind::Minus) {
                Some(BinaryOp::Sub)
            } else {
                None
            };

            let Some(op) = op else { break };
            let rhs = self.factor()?;
            expr = Expr::BinOp {
                lhs: Box::new(expr),
                op,
                rhs: Box::new(rhs),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;

        loop {
            let op = if self.matches_kind(TokenKind::Star) {
                Some(BinaryOp::Mult)
            } else if self.matches_kind(TokenKind::Slash) {
                Some(BinaryOp::Div)
            } else {
                None
            };

            let Some(op) = op else { break };
            let rhs = self.unary()?;
            expr = Expr::BinOp {
                lhs: Box::new(expr),
                op,
                rhs: Box::new(rhs),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.matches_kind(TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Neg,
                operand: Box::new(operand),
            });
        }

        if self.matches_kind(TokenKind::Plus) {
            return self.unary();
        }

        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Expr::Constant(Constant::Int(value)))
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Expr::Constant(Constant::Float(value)))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Expr::Constant(Constant::Str(value)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Constant(Constant::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Constant(Constant::Bool(false)))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.matches_kind(TokenKind::LeftParen) {
                    let args = self.call_arguments()?;
                    return Ok(Expr::Call { func: name, args });
                }
                Ok(Expr::Name(name))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume_kind(TokenKind::RightParen, "expected ')' after expression")?;
                Ok(expr)
            }
            other => Err(ParseError::new(
                format!("expected expression, found {}", other.describe()),
                self.peek(),
            )),
        }
    }

    fn call_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if !self.check_kind(&TokenKind::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.matches_kind(TokenKind::Comma) || self.check_kind(&TokenKind::RightParen)
                {
                    break;
                }
            }
        }
        self.consume_kind(TokenKind::RightParen, "expected ')' after arguments")?;
        Ok(args)
    }
}
