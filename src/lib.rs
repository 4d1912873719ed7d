//! 基于白名单的Filter和OrderBy解析
//!
//! 例如 `name eq 'bob' and age in (1, 2)` 会按字段白名单校验，
//! 输出参数化的谓词文本 (`name == @0 && age in (@1, @2)`) 和按位置排列的参数值。
//! 调用方的文本只会以占位符的形式进入谓词。
//!
//! ```
//! use filter_dispatcher::{FilterParser, OrderByParser};
//! use sea_query::Value;
//!
//! let mut filters = FilterParser::new();
//! filters.add_field::<String>("name")?;
//! filters.add_field::<i64>("age")?;
//!
//! let result = filters.parse("name eq 'bob' and age in (1, 2)")?.unwrap();
//! assert_eq!(result.filter_text(), "name == @0 && age in (@1, @2)");
//! assert_eq!(result.args()[0], Value::from("bob"));
//!
//! let mut order = OrderByParser::new();
//! order.add_field("name")?;
//! assert_eq!(order.parse("name desc")?.as_deref(), Some("name desc"));
//! # Ok::<(), filter_dispatcher::FilterError>(())
//! ```

pub mod config;
pub mod error;
pub mod expression;
pub mod field;
pub mod lexer;
pub mod order_by;
pub mod parser;
pub mod result;
pub mod token;

pub use config::{ConfigError, ParserConfig};
pub use error::{FilterError, Result};
pub use expression::Expression;
pub use field::{FieldConfig, FieldRegistry, FieldType, FieldValue};
pub use order_by::{OrderByFieldConfig, OrderByParser, OrderClause};
pub use parser::{Expressions, FilterParser};
pub use result::ParserResult;
pub use token::{Span, Token, TokenKind};
