//! Filter的语法分析器：驱动词法分析器，把token交给表达式状态机，并检查表达式之间的语法
//!
//! ## 分发流程图
//!
//! ```text
//! token
//!   ├─ 当前表达式能接收? ── 是 ─► add_token (校验)
//!   │                      否 ─► 输出当前表达式，开始新表达式
//!   └─ 按token类型开始新表达式
//!        ├─ field            → Operator        (仅限表达式开头)
//!        ├─ startswith/...   → StringFunction  (仅限表达式开头)
//!        ├─ (                → OpenParenthesis (仅限表达式开头)
//!        ├─ )                → CloseParenthesis(表达式之后, depth > 0)
//!        ├─ and / or         → Logical         (表达式之后)
//!        ├─ not              → Logical         (表达式开头, 之后必须是 `(`)
//!        └─ 其他             → 语法错误
//! ```
//!
//! ## 语法
//!
//! ```text
//! filter      := expr (logical expr)*
//! expr        := 'not' '(' filter ')' | comparison | funccall | '(' filter ')'
//! comparison  := FIELD OP constant | FIELD 'in' '(' constant (',' constant)* ')' | BOOL_FIELD
//! funccall    := ('startswith'|'endswith'|'contains') '(' FIELD ',' constant ')'
//! logical     := 'and' | 'or'
//! ```
//!
//! ## 示例
//!
//! ```text
//! name eq 'bob' and (age gt 21 or not (active))
//!   → name == @0 && (age > @1 || !(active))      args = ["bob", 21]
//! ```

use crate::error::{FilterError, Result};
use crate::expression::{
    Expression, LogicalExpression, OperatorExpression, ParseContext, StringFunctionExpression,
};
use crate::field::{FieldConfig, FieldRegistry, FieldType, FieldValue};
use crate::lexer::Lexer;
use crate::result::ParserResult;
use crate::token::{Token, TokenKind};
use std::collections::VecDeque;

/// 按已注册字段的白名单解析Filter字符串
///
/// 字段在开始时一次性注册，之后解析器只读，可以在线程间共享
#[derive(Debug, Clone, Default)]
pub struct FilterParser {
    fields: FieldRegistry,
}

impl FilterParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(fields: FieldRegistry) -> Self {
        Self { fields }
    }

    /// 注册类型为 `T` 的字段，返回字段配置以便链式调用
    pub fn add_field<T: FieldValue>(&mut self, name: &str) -> Result<&mut FieldConfig> {
        self.fields.add(FieldConfig::for_value::<T>(name))
    }

    pub fn add_field_of_type(&mut self, name: &str, field_type: FieldType) -> Result<&mut FieldConfig> {
        self.fields.add(FieldConfig::new(name, field_type))
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// 解析来自 `filter` 的字段token
    pub fn get_field_config(&self, token: &Token, filter: &str) -> Result<&FieldConfig> {
        self.fields.resolve(token, filter)
    }

    pub fn tokens<'a>(&'a self, filter: &'a str) -> Lexer<'a> {
        Lexer::with_fields(filter, &self.fields)
    }

    /// 惰性地返回校验过的表达式，遇到第一个错误即结束
    pub fn expressions<'a>(&'a self, filter: &'a str) -> Expressions<'a> {
        Expressions::new(ParseContext::new(filter, &self.fields), self.tokens(filter))
    }

    /// 把Filter解析为谓词文本和按位置排列的参数
    ///
    /// Filter缺失或为空白时返回 `Ok(None)`
    pub fn parse<'s>(&self, filter: impl Into<Option<&'s str>>) -> Result<Option<ParserResult>> {
        let Some(filter) = filter.into().filter(|f| !f.trim().is_empty()) else {
            return Ok(None);
        };

        let expressions = self.expressions(filter).collect::<Result<Vec<_>>>()?;

        let mut result = ParserResult::new();
        for expression in &expressions {
            expression.write_to_result(&mut result);
        }
        log::debug!(
            "parsed filter into {} expressions and {} arguments: {}",
            expressions.len(),
            result.args().len(),
            result.filter_text()
        );
        Ok(Some(result))
    }
}

/// 表达式之间传递的语法状态
#[derive(Debug, Clone, Copy)]
struct GrammarCursor {
    /// 此处可以开始新表达式
    can_open_paren: bool,
    /// 前一个表达式已结束，可以接 `and`/`or`
    can_logical: bool,
    paren_depth: usize,
    /// 上一个token是 `not`
    after_not: bool,
}

impl Default for GrammarCursor {
    fn default() -> Self {
        Self {
            can_open_paren: true,
            can_logical: false,
            paren_depth: 0,
            after_not: false,
        }
    }
}

/// 单个Filter字符串的表达式迭代器
pub struct Expressions<'a> {
    ctx: ParseContext<'a>,
    lexer: Lexer<'a>,
    cursor: GrammarCursor,
    current: Option<Expression<'a>>,
    ready: VecDeque<Expression<'a>>,
    error: Option<FilterError>,
    last_token: Option<Token>,
    finished: bool,
}

impl<'a> Expressions<'a> {
    fn new(ctx: ParseContext<'a>, lexer: Lexer<'a>) -> Self {
        Self {
            ctx,
            lexer,
            cursor: GrammarCursor::default(),
            current: None,
            ready: VecDeque::new(),
            error: None,
            last_token: None,
            finished: false,
        }
    }

    fn dispatch(&mut self, token: Token) -> Result<()> {
        self.last_token = Some(token);
        let flush = self
            .current
            .as_ref()
            .is_some_and(|current| !current.can_add_token(&token));
        if flush {
            if let Some(done) = self.current.take() {
                log::trace!("expression complete: {:?}", done);
                self.ready.push_back(done);
            }
        }

        if let Some(current) = self.current.as_mut() {
            return current.add_token(&self.ctx, &token);
        }
        let expression = self.start(&token)?;
        self.current = Some(expression);
        Ok(())
    }

    /// 以 `token` 开始新表达式，并检查它能否出现在这里
    fn start(&mut self, token: &Token) -> Result<Expression<'a>> {
        let ctx = self.ctx;
        let cursor = &mut self.cursor;
        let kind = token.kind;

        if cursor.after_not && kind != TokenKind::OPEN_PAREN {
            return Err(ctx.syntax_error(token));
        }

        let expression = if kind == TokenKind::FIELD && cursor.can_open_paren {
            cursor.can_open_paren = false;
            cursor.can_logical = true;
            let mut expression = Expression::Operator(OperatorExpression::new());
            expression.add_token(&ctx, token)?;
            expression
        } else if kind.intersects(TokenKind::STRING_FUNCTION) && cursor.can_open_paren {
            cursor.can_open_paren = false;
            cursor.can_logical = true;
            let mut expression = Expression::StringFunction(StringFunctionExpression::new());
            expression.add_token(&ctx, token)?;
            expression
        } else if kind == TokenKind::OPEN_PAREN && cursor.can_open_paren {
            cursor.paren_depth += 1;
            cursor.can_logical = false;
            cursor.after_not = false;
            Expression::OpenParenthesis(*token)
        } else if kind == TokenKind::CLOSE_PAREN && !cursor.can_open_paren {
            if cursor.paren_depth == 0 {
                return Err(FilterError::unbalanced(ctx.text(token), token.span.start));
            }
            cursor.paren_depth -= 1;
            cursor.can_logical = true;
            Expression::CloseParenthesis(*token)
        } else if kind.intersects(TokenKind::AND | TokenKind::OR) && cursor.can_logical {
            cursor.can_logical = false;
            cursor.can_open_paren = true;
            Expression::Logical(LogicalExpression { kind })
        } else if kind == TokenKind::NOT && cursor.can_open_paren {
            cursor.after_not = true;
            cursor.can_logical = false;
            Expression::Logical(LogicalExpression { kind })
        } else {
            return Err(ctx.syntax_error(token));
        };

        log::trace!("started expression at '{}'", ctx.text(token));
        Ok(expression)
    }

    /// 输入结束时的检查，并把最后一个表达式放入队列
    fn finish(&mut self) -> Result<()> {
        let Some(last) = self.last_token else {
            return Ok(());
        };
        let (text, position) = (self.ctx.text(&last), last.span.start);
        if let Some(current) = self.current.take() {
            if !current.is_complete() {
                return Err(FilterError::incomplete(text, position));
            }
            self.ready.push_back(current);
        }
        if self.cursor.paren_depth != 0 {
            return Err(FilterError::unbalanced(text, position));
        }
        if !self.cursor.can_logical {
            return Err(FilterError::incomplete(text, position));
        }
        Ok(())
    }

    /// 错误之前已完成的表达式仍会先被返回
    fn fail(&mut self, error: FilterError) {
        self.finished = true;
        self.current = None;
        self.error = Some(error);
    }
}

impl<'a> Iterator for Expressions<'a> {
    type Item = Result<Expression<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(expression) = self.ready.pop_front() {
                return Some(Ok(expression));
            }
            if let Some(error) = self.error.take() {
                return Some(Err(error));
            }
            if self.finished {
                return None;
            }
            match self.lexer.next() {
                Some(Ok(token)) => {
                    if let Err(e) = self.dispatch(token) {
                        self.fail(e);
                    }
                }
                Some(Err(e)) => self.fail(e),
                None => {
                    self.finished = true;
                    if let Err(e) = self.finish() {
                        self.fail(e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::Value;
    use std::sync::Arc;
    use uuid::Uuid;

    fn create_test_parser() -> FilterParser {
        let mut parser = FilterParser::new();
        parser
            .add_field::<String>("name")
            .unwrap()
            .supports(TokenKind::STRING_FUNCTION);
        parser.add_field::<i64>("age").unwrap();
        parser.add_field::<bool>("active").unwrap();
        parser
    }

    fn parse(parser: &FilterParser, filter: &str) -> (String, Vec<Value>) {
        parser
            .parse(filter)
            .unwrap()
            .unwrap_or_else(|| panic!("no result for: {}", filter))
            .into_parts()
    }

    fn parse_err(parser: &FilterParser, filter: &str) -> FilterError {
        match parser.parse(filter) {
            Ok(result) => panic!("Expected failure for: {}, but got: {:?}", filter, result),
            Err(e) => e,
        }
    }

    #[test]
    fn test_missing_or_blank_filter() {
        let parser = create_test_parser();
        assert_eq!(parser.parse(None), Ok(None));
        assert_eq!(parser.parse(""), Ok(None));
        assert_eq!(parser.parse("   "), Ok(None));
    }

    #[test]
    fn test_simple_equality() {
        let parser = create_test_parser();
        let (text, args) = parse(&parser, "name eq 'bob'");
        assert_eq!(text, "name == @0");
        assert_eq!(args, vec![Value::from("bob")]);
    }

    #[test]
    fn test_keywords_and_fields_are_case_insensitive() {
        let parser = create_test_parser();
        assert_eq!(
            parse(&parser, "NAME EQ 'bob'"),
            parse(&parser, "name eq 'bob'")
        );
    }

    #[test]
    fn test_unknown_field() {
        let parser = create_test_parser();
        assert_eq!(
            parse_err(&parser, "unknown eq 1"),
            FilterError::UnknownField {
                field: "unknown".to_string()
            }
        );
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let parser = create_test_parser();
        assert_eq!(
            parse_err(&parser, "(name eq 'bob'"),
            FilterError::UnbalancedParentheses {
                text: "'bob'".to_string(),
                position: 9
            }
        );
        assert_eq!(
            parse_err(&parser, "name eq 'bob')"),
            FilterError::UnbalancedParentheses {
                text: ")".to_string(),
                position: 13
            }
        );
        assert_eq!(
            parse_err(&parser, "(name eq 'bob'").to_string(),
            "Filter has unbalanced parentheses at ''bob'' (position 9)"
        );
    }

    #[test]
    fn test_in_rendering() {
        let parser = create_test_parser();
        let (text, args) = parse(&parser, "age in (1,2,3)");
        assert_eq!(text, "age in (@0, @1, @2)");
        assert_eq!(
            args,
            vec![Value::from(1i64), Value::from(2i64), Value::from(3i64)]
        );
    }

    #[test]
    fn test_upper_case_field() {
        let mut parser = FilterParser::new();
        parser.add_field::<String>("name").unwrap().use_upper_case();

        let (text, args) = parse(&parser, "name eq 'BOB'");
        assert_eq!(text, "name.ToUpper() == @0");
        assert_eq!(args, vec![Value::from("BOB")]);

        let (_, args) = parse(&parser, "name eq 'bob'");
        assert_eq!(args, vec![Value::from("BOB")]);
    }

    #[test]
    fn test_escaped_literal() {
        let parser = create_test_parser();
        let (text, args) = parse(&parser, "name eq 'O''Brien'");
        assert_eq!(text, "name == @0");
        assert_eq!(args, vec![Value::from("O'Brien")]);
    }

    #[test]
    fn test_not_null_guard() {
        let mut parser = FilterParser::new();
        parser.add_field::<String>("name").unwrap().check_not_null();
        let (text, _) = parse(&parser, "name eq 'bob'");
        assert_eq!(text, "(name != null && name == @0)");

        // 与null比较不需要空值判断
        let (text, args) = parse(&parser, "name eq null");
        assert_eq!(text, "name == null");
        assert!(args.is_empty());

        let (text, _) = parse(&parser, "name in ('a', 'b')");
        assert_eq!(text, "name in (@0, @1)");
    }

    #[test]
    fn test_renamed_field() {
        let mut parser = FilterParser::new();
        parser
            .add_field::<String>("name")
            .unwrap()
            .rename("Person.Name")
            .use_upper_case()
            .check_not_null();
        let (text, args) = parse(&parser, "name ne 'x'");
        assert_eq!(text, "(Person.Name != null && Person.Name.ToUpper() != @0)");
        assert_eq!(args, vec![Value::from("X")]);
    }

    #[test]
    fn test_logical_and_grouping() {
        let parser = create_test_parser();
        let (text, args) = parse(
            &parser,
            "name eq 'bob' and (age gt 21 or not (active)) or active eq false",
        );
        assert_eq!(
            text,
            "name == @0 && (age > @1 || !(active)) || active == @2"
        );
        assert_eq!(
            args,
            vec![Value::from("bob"), Value::from(21i64), Value::from(false)]
        );
    }

    #[test]
    fn test_leading_not() {
        let parser = create_test_parser();
        let (text, _) = parse(&parser, "not (name eq 'a' or name eq 'b')");
        assert_eq!(text, "!(name == @0 || name == @1)");
    }

    #[test]
    fn test_not_must_be_followed_by_parenthesis() {
        let parser = create_test_parser();
        assert!(matches!(
            parse_err(&parser, "not name eq 'a'"),
            FilterError::Syntax { ref text, .. } if text == "name"
        ));
        assert!(matches!(
            parse_err(&parser, "not not (active)"),
            FilterError::Syntax { .. }
        ));
    }

    #[test]
    fn test_string_functions() {
        let parser = create_test_parser();
        let (text, args) = parse(
            &parser,
            "startswith(name, 'a') or endswith(name,'z') and contains(name, 'm')",
        );
        assert_eq!(
            text,
            "name.StartsWith(@0) || name.EndsWith(@1) && name.Contains(@2)"
        );
        assert_eq!(
            args,
            vec![Value::from("a"), Value::from("z"), Value::from("m")]
        );
    }

    #[test]
    fn test_string_function_with_guard_and_upper_case() {
        let mut parser = FilterParser::new();
        parser
            .add_field::<String>("name")
            .unwrap()
            .supports(TokenKind::STRING_FUNCTION)
            .use_upper_case()
            .check_not_null();
        let (text, args) = parse(&parser, "contains(name, 'bo')");
        assert_eq!(text, "(name != null && name.ToUpper().Contains(@0))");
        assert_eq!(args, vec![Value::from("BO")]);
    }

    #[test]
    fn test_string_function_not_supported_by_default() {
        let mut parser = FilterParser::new();
        parser.add_field::<String>("name").unwrap();
        assert!(matches!(
            parse_err(&parser, "startswith(name, 'a')"),
            FilterError::UnsupportedOperator { .. }
        ));
    }

    #[test]
    fn test_boolean_field_forms() {
        let parser = create_test_parser();
        assert_eq!(parse(&parser, "active").0, "active");
        assert_eq!(parse(&parser, "active and age lt 3").0, "active && age < @0");
        assert_eq!(parse(&parser, "(active)").0, "(active)");
        let (text, args) = parse(&parser, "active ne TRUE");
        assert_eq!(text, "active != @0");
        assert_eq!(args, vec![Value::from(true)]);
    }

    #[test]
    fn test_consecutive_logical_operators() {
        let parser = create_test_parser();
        assert!(matches!(
            parse_err(&parser, "active and or active"),
            FilterError::Syntax { ref text, .. } if text == "or"
        ));
        assert!(matches!(
            parse_err(&parser, "and active"),
            FilterError::Syntax { .. }
        ));
    }

    #[test]
    fn test_missing_logical_between_expressions() {
        let parser = create_test_parser();
        assert!(matches!(
            parse_err(&parser, "name eq 'a' age eq 1"),
            FilterError::Syntax { ref text, .. } if text == "age"
        ));
        assert!(matches!(
            parse_err(&parser, "active (age eq 1)"),
            FilterError::Syntax { .. }
        ));
    }

    #[test]
    fn test_string_options_on_numeric_field() {
        let mut parser = FilterParser::new();
        parser
            .add_field::<i64>("age")
            .unwrap()
            .use_upper_case()
            .supports(TokenKind::STRING_FUNCTION);

        let (text, args) = parse(&parser, "age gt 3");
        assert_eq!(text, "age > @0");
        assert_eq!(args, vec![Value::from(3i64)]);

        assert!(matches!(
            parse_err(&parser, "startswith(age, 3)"),
            FilterError::UnsupportedOperator { ref field, .. } if field == "age"
        ));
    }

    #[test]
    fn test_dangling_operator() {
        let parser = create_test_parser();
        let incomplete = |text: &str, position| FilterError::IncompleteExpression {
            text: text.to_string(),
            position,
        };
        assert_eq!(parse_err(&parser, "active and"), incomplete("and", 7));
        assert_eq!(parse_err(&parser, "name eq"), incomplete("eq", 5));
        assert_eq!(parse_err(&parser, "age in (1, 2"), incomplete("2", 11));
        assert_eq!(parse_err(&parser, "not"), incomplete("not", 0));
        assert_eq!(
            parse_err(&parser, "name eq").to_string(),
            "Filter ends with an incomplete expression at 'eq' (position 5)"
        );
    }

    #[test]
    fn test_empty_parentheses() {
        let parser = create_test_parser();
        assert!(matches!(
            parse_err(&parser, "()"),
            FilterError::Syntax { ref text, .. } if text == ")"
        ));
    }

    #[test]
    fn test_stray_constant() {
        let parser = create_test_parser();
        assert!(matches!(
            parse_err(&parser, "'bob' eq name"),
            FilterError::Syntax { position: 0, .. }
        ));
    }

    #[test]
    fn test_unterminated_literal() {
        let parser = create_test_parser();
        assert_eq!(
            parse_err(&parser, "name eq 'bob"),
            FilterError::UnterminatedLiteral { position: 8 }
        );
    }

    #[test]
    fn test_error_messages_quote_input() {
        let parser = create_test_parser();
        assert_eq!(
            parse_err(&parser, "name eq 5").to_string(),
            "Value '5' is not valid for field 'name'"
        );
        assert_eq!(
            parse_err(&parser, "age eq 1 xyz").to_string(),
            "Filter is syntactically incorrect at 'xyz' (position 9)"
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let parser = create_test_parser();
        let filter = "name eq 'bob' and age in (1, 2) or startswith(name, 'x')";
        assert_eq!(parse(&parser, filter), parse(&parser, filter));
    }

    #[test]
    fn test_expressions_are_lazy() {
        let parser = create_test_parser();
        let mut expressions = parser.expressions("active and bogus eq 1");
        assert!(matches!(expressions.next(), Some(Ok(Expression::Operator(_)))));
        assert!(matches!(expressions.next(), Some(Ok(Expression::Logical(_)))));
        assert!(matches!(
            expressions.next(),
            Some(Err(FilterError::UnknownField { .. }))
        ));
        assert!(expressions.next().is_none());
    }

    #[test]
    fn test_typed_fields() {
        let mut parser = FilterParser::new();
        parser.add_field::<Uuid>("id").unwrap();
        parser.add_field::<f64>("score").unwrap();
        parser.add_field::<chrono::NaiveDate>("born").unwrap();

        let id = "0f8fad5b-d9cb-469f-a165-70867728950e";
        let (text, args) = parse(
            &parser,
            &format!("id eq {} and score ge -1.5 and born lt 2000-01-01", id),
        );
        assert_eq!(text, "id == @0 && score >= @1 && born < @2");
        assert_eq!(args[0], Value::from(Uuid::parse_str(id).unwrap()));
        assert_eq!(args[1], Value::from(-1.5f64));
        assert_eq!(
            args[2],
            Value::from(chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_registered_numeric_looking_field() {
        let mut parser = FilterParser::new();
        parser.add_field::<i32>("2fa_level").unwrap();
        let (text, args) = parse(&parser, "2fa_level gt 1");
        assert_eq!(text, "2fa_level > @0");
        assert_eq!(args, vec![Value::from(1i32)]);
    }

    #[test]
    fn test_duplicate_field_registration() {
        let mut parser = create_test_parser();
        assert!(matches!(
            parser.add_field::<String>("Name"),
            Err(FilterError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_concurrent_parsing() {
        let parser = Arc::new(create_test_parser());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let parser = Arc::clone(&parser);
                std::thread::spawn(move || {
                    let filter = format!("age eq {} and name eq 'n{}'", i, i);
                    parser.parse(filter.as_str()).unwrap().unwrap().into_parts()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let (text, args) = handle.join().unwrap();
            assert_eq!(text, "age == @0 && name == @1");
            assert_eq!(
                args,
                vec![Value::from(i as i64), Value::from(format!("n{}", i))]
            );
        }
    }
}
