//! 表达式节点：逐个接收token的小状态机，根据字段白名单校验token并生成谓词文本
//!
//! ```text
//! Operator        field ──► op ──► constant                       (complete)
//!                   │        └──► in ──► ( ──► constant ─┬─► )    (complete)
//!                   │                        ▲           │
//!                   │                        └──── , ◄───┘
//!                   └─ 布尔字段：单独即完整，之后仍可接运算符
//!
//! StringFunction  fn ──► ( ──► field ──► , ──► constant ──► )     (complete)
//!
//! Logical         and | or | not                                  (complete)
//! Parenthesis     ( | )                                           (complete)
//! ```

use crate::error::{FilterError, Result};
use crate::field::{FieldConfig, FieldRegistry};
use crate::lexer::unquote_literal;
use crate::result::ParserResult;
use crate::token::{Token, TokenKind};
use sea_query::Value;

/// 表达式校验token所需的上下文：token指向的源文本和字段白名单
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub input: &'a str,
    pub fields: &'a FieldRegistry,
}

impl<'a> ParseContext<'a> {
    pub fn new(input: &'a str, fields: &'a FieldRegistry) -> Self {
        Self { input, fields }
    }

    pub fn text(&self, token: &Token) -> &'a str {
        token.text(self.input)
    }

    pub(crate) fn syntax_error(&self, token: &Token) -> FilterError {
        FilterError::syntax(self.text(token), token.span.start)
    }

    /// 把字段token解析为字段配置
    pub fn field_config(&self, token: &Token) -> Result<&'a FieldConfig> {
        if !token.is(TokenKind::FIELD) {
            return Err(self.syntax_error(token));
        }
        self.fields.resolve(token, self.input)
    }

    /// 按字段校验常量token并转换为值
    fn constant(&self, field: &FieldConfig, token: &Token, allow_null: bool) -> Result<Constant> {
        if !token.is(TokenKind::CONSTANT) {
            return Err(self.syntax_error(token));
        }
        let text = self.text(token);
        if !field.accepts_constant(token.kind) || (token.is(TokenKind::NULL) && !allow_null) {
            return Err(FilterError::invalid_value(field.name(), text));
        }
        if token.is(TokenKind::NULL) {
            return Ok(Constant::Null);
        }
        let converted = if token.is(TokenKind::LITERAL) {
            field.convert_to_value(&unquote_literal(text))
        } else {
            field.convert_to_value(text)
        };
        converted
            .map(Constant::Value)
            .ok_or_else(|| FilterError::invalid_value(field.name(), text))
    }
}

/// 校验后的常量
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Value(Value),
}

impl Constant {
    fn write_to_result(&self, result: &mut ParserResult) {
        match self {
            Constant::Null => {
                result.append("null");
            }
            Constant::Value(value) => {
                result.append_value(value.clone());
            }
        }
    }
}

/// 所有表达式类型
#[derive(Debug, Clone)]
pub enum Expression<'a> {
    Operator(OperatorExpression<'a>),
    Logical(LogicalExpression),
    OpenParenthesis(Token),
    CloseParenthesis(Token),
    StringFunction(StringFunctionExpression<'a>),
}

impl<'a> Expression<'a> {
    pub fn can_add_token(&self, token: &Token) -> bool {
        match self {
            Expression::Operator(e) => e.can_add_token(token),
            Expression::StringFunction(e) => e.can_add_token(token),
            Expression::Logical(_)
            | Expression::OpenParenthesis(_)
            | Expression::CloseParenthesis(_) => false,
        }
    }

    pub fn add_token(&mut self, ctx: &ParseContext<'a>, token: &Token) -> Result<()> {
        match self {
            Expression::Operator(e) => e.add_token(ctx, token),
            Expression::StringFunction(e) => e.add_token(ctx, token),
            Expression::Logical(_)
            | Expression::OpenParenthesis(_)
            | Expression::CloseParenthesis(_) => Err(ctx.syntax_error(token)),
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Expression::Operator(e) => e.is_complete(),
            Expression::StringFunction(e) => e.is_complete(),
            Expression::Logical(_)
            | Expression::OpenParenthesis(_)
            | Expression::CloseParenthesis(_) => true,
        }
    }

    pub fn write_to_result(&self, result: &mut ParserResult) {
        match self {
            Expression::Operator(e) => e.write_to_result(result),
            Expression::StringFunction(e) => e.write_to_result(result),
            Expression::Logical(e) => e.write_to_result(result),
            Expression::OpenParenthesis(_) => {
                result.append("(");
            }
            Expression::CloseParenthesis(_) => {
                result.append(")");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorState {
    AwaitingField,
    AwaitingOperator,
    /// 单独的布尔字段，已完整，但之后仍可接运算符
    FieldOnly,
    AwaitingConstant,
    AwaitingListOpen,
    AwaitingListItem,
    AwaitingListSeparator,
    Complete,
}

/// `field op constant`、`field in (c1, c2, ...)` 或单独的布尔字段
#[derive(Debug, Clone)]
pub struct OperatorExpression<'a> {
    state: OperatorState,
    field: Option<&'a FieldConfig>,
    operator: Option<TokenKind>,
    constants: Vec<Constant>,
}

impl Default for OperatorExpression<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> OperatorExpression<'a> {
    pub fn new() -> Self {
        Self {
            state: OperatorState::AwaitingField,
            field: None,
            operator: None,
            constants: Vec::new(),
        }
    }

    pub fn field(&self) -> Option<&'a FieldConfig> {
        self.field
    }

    pub fn operator(&self) -> Option<TokenKind> {
        self.operator
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn can_add_token(&self, token: &Token) -> bool {
        match self.state {
            OperatorState::FieldOnly => token.is(TokenKind::COMPARISON),
            OperatorState::Complete => false,
            _ => true,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, OperatorState::FieldOnly | OperatorState::Complete)
    }

    pub fn add_token(&mut self, ctx: &ParseContext<'a>, token: &Token) -> Result<()> {
        self.state = match (self.state, self.field) {
            (OperatorState::AwaitingField, _) => {
                let field = ctx.field_config(token)?;
                self.field = Some(field);
                if field.is_boolean() {
                    OperatorState::FieldOnly
                } else {
                    OperatorState::AwaitingOperator
                }
            }
            (OperatorState::AwaitingOperator | OperatorState::FieldOnly, Some(field)) => {
                if !token.is(TokenKind::COMPARISON) {
                    return Err(ctx.syntax_error(token));
                }
                if !field.supports_kind(token.kind) {
                    return Err(FilterError::unsupported_operator(
                        field.name(),
                        ctx.text(token),
                    ));
                }
                self.operator = Some(token.kind);
                if token.kind == TokenKind::IN {
                    OperatorState::AwaitingListOpen
                } else {
                    OperatorState::AwaitingConstant
                }
            }
            (OperatorState::AwaitingConstant, Some(field)) => {
                let allow_null = self
                    .operator
                    .is_some_and(|op| TokenKind::EQUALITY.contains(op));
                self.constants.push(ctx.constant(field, token, allow_null)?);
                OperatorState::Complete
            }
            (OperatorState::AwaitingListOpen, Some(_)) => {
                if !token.is(TokenKind::OPEN_PAREN) {
                    return Err(ctx.syntax_error(token));
                }
                OperatorState::AwaitingListItem
            }
            (OperatorState::AwaitingListItem, Some(field)) => {
                self.constants.push(ctx.constant(field, token, true)?);
                OperatorState::AwaitingListSeparator
            }
            (OperatorState::AwaitingListSeparator, Some(_)) => {
                if token.is(TokenKind::COMMA) {
                    OperatorState::AwaitingListItem
                } else if token.is(TokenKind::CLOSE_PAREN) {
                    OperatorState::Complete
                } else {
                    return Err(ctx.syntax_error(token));
                }
            }
            _ => return Err(ctx.syntax_error(token)),
        };
        Ok(())
    }

    pub fn write_to_result(&self, result: &mut ParserResult) {
        let Some(field) = self.field else {
            return;
        };
        let name = field.target_name();
        let Some(operator) = self.operator else {
            result.append(name);
            return;
        };
        let compared = compared_field(field);

        if operator == TokenKind::IN {
            result.append(&compared).append("in").append("(");
            for (i, constant) in self.constants.iter().enumerate() {
                if i > 0 {
                    result.append(",");
                }
                constant.write_to_result(result);
            }
            result.append(")");
            return;
        }

        let symbol = operator.operator_symbol().unwrap_or_default();
        match self.constants.first() {
            Some(Constant::Null) => {
                result.append(name).append(symbol).append("null");
            }
            Some(constant @ Constant::Value(_)) => {
                let guard = field.checks_not_null();
                if guard {
                    write_not_null_guard(result, name);
                }
                result.append(&compared).append(symbol);
                constant.write_to_result(result);
                if guard {
                    result.append(")");
                }
            }
            None => {}
        }
    }
}

/// 逻辑运算：`and` / `or` / `not`
#[derive(Debug, Clone, Copy)]
pub struct LogicalExpression {
    pub kind: TokenKind,
}

impl LogicalExpression {
    pub fn write_to_result(&self, result: &mut ParserResult) {
        if let Some(symbol) = self.kind.logical_symbol() {
            result.append(symbol);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionState {
    AwaitingFunction,
    AwaitingOpen,
    AwaitingField,
    AwaitingComma,
    AwaitingConstant,
    AwaitingClose,
    Complete,
}

/// 字符串函数：`startswith(field, constant)`、`endswith(...)`、`contains(...)`
#[derive(Debug, Clone)]
pub struct StringFunctionExpression<'a> {
    state: FunctionState,
    function: Option<TokenKind>,
    field: Option<&'a FieldConfig>,
    value: Option<Value>,
}

impl Default for StringFunctionExpression<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> StringFunctionExpression<'a> {
    pub fn new() -> Self {
        Self {
            state: FunctionState::AwaitingFunction,
            function: None,
            field: None,
            value: None,
        }
    }

    pub fn function(&self) -> Option<TokenKind> {
        self.function
    }

    pub fn field(&self) -> Option<&'a FieldConfig> {
        self.field
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn can_add_token(&self, _token: &Token) -> bool {
        !self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.state == FunctionState::Complete
    }

    pub fn add_token(&mut self, ctx: &ParseContext<'a>, token: &Token) -> Result<()> {
        let expected = match self.state {
            FunctionState::AwaitingFunction => TokenKind::STRING_FUNCTION,
            FunctionState::AwaitingOpen => TokenKind::OPEN_PAREN,
            FunctionState::AwaitingField => TokenKind::FIELD,
            FunctionState::AwaitingComma => TokenKind::COMMA,
            FunctionState::AwaitingConstant => TokenKind::CONSTANT,
            FunctionState::AwaitingClose => TokenKind::CLOSE_PAREN,
            FunctionState::Complete => TokenKind::empty(),
        };
        if !token.is(expected) {
            return Err(ctx.syntax_error(token));
        }

        self.state = match self.state {
            FunctionState::AwaitingFunction => {
                self.function = Some(token.kind);
                FunctionState::AwaitingOpen
            }
            FunctionState::AwaitingOpen => FunctionState::AwaitingField,
            FunctionState::AwaitingField => {
                let field = ctx.field_config(token)?;
                if let Some(function) = self.function {
                    if !field.supports_kind(function) {
                        return Err(FilterError::unsupported_operator(
                            field.name(),
                            function.function_name().unwrap_or_default(),
                        ));
                    }
                }
                self.field = Some(field);
                FunctionState::AwaitingComma
            }
            FunctionState::AwaitingComma => FunctionState::AwaitingConstant,
            FunctionState::AwaitingConstant => {
                let Some(field) = self.field else {
                    return Err(ctx.syntax_error(token));
                };
                match ctx.constant(field, token, false)? {
                    Constant::Value(value) => self.value = Some(value),
                    Constant::Null => return Err(FilterError::invalid_value(field.name(), "null")),
                }
                FunctionState::AwaitingClose
            }
            FunctionState::AwaitingClose | FunctionState::Complete => FunctionState::Complete,
        };
        Ok(())
    }

    pub fn write_to_result(&self, result: &mut ParserResult) {
        let (Some(field), Some(function), Some(value)) = (
            self.field,
            self.function.and_then(TokenKind::function_name),
            &self.value,
        ) else {
            return;
        };
        let guard = field.checks_not_null();
        if guard {
            write_not_null_guard(result, field.target_name());
        }
        result
            .append(&format!("{}.{}(", compared_field(field), function))
            .append_value(value.clone())
            .append(")");
        if guard {
            result.append(")");
        }
    }
}

/// 比较运算左侧的字段文本
fn compared_field(field: &FieldConfig) -> String {
    if field.ignore_case() {
        format!("{}.ToUpper()", field.target_name())
    } else {
        field.target_name().to_string()
    }
}

/// 写入 `(field != null &&`，右括号由调用者补上
fn write_not_null_guard(result: &mut ParserResult, name: &str) {
    result.append("(").append(name).append("!=").append("null").append("&&");
}
