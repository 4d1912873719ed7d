//! Filter和OrderBy解析器共用的错误类型

use thiserror::Error;

/// 解析器可能返回的所有错误
///
/// 调用方应当把这些错误都视为客户端错误：输入被拒绝，没有任何输出
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Literal has not been terminated (starting at position {position})")]
    UnterminatedLiteral { position: usize },

    #[error("Field '{field}' is not supported")]
    UnknownField { field: String },

    #[error("Operator '{operator}' is not supported by field '{field}'")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Value '{value}' is not valid for field '{field}'")]
    InvalidValue { field: String, value: String },

    #[error("Filter is syntactically incorrect at '{text}' (position {position})")]
    Syntax { text: String, position: usize },

    #[error("Filter has unbalanced parentheses at '{text}' (position {position})")]
    UnbalancedParentheses { text: String, position: usize },

    #[error("Filter ends with an incomplete expression at '{text}' (position {position})")]
    IncompleteExpression { text: String, position: usize },

    #[error("Order by is invalid: {message}")]
    OrderBy { message: String },

    #[error("Field '{field}' has already been registered")]
    DuplicateField { field: String },
}

impl FilterError {
    pub(crate) fn syntax(text: &str, position: usize) -> Self {
        Self::Syntax {
            text: text.to_string(),
            position,
        }
    }

    pub(crate) fn unbalanced(text: &str, position: usize) -> Self {
        Self::UnbalancedParentheses {
            text: text.to_string(),
            position,
        }
    }

    pub(crate) fn incomplete(text: &str, position: usize) -> Self {
        Self::IncompleteExpression {
            text: text.to_string(),
            position,
        }
    }

    pub(crate) fn invalid_value(field: &str, value: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn unsupported_operator(field: &str, operator: &str) -> Self {
        Self::UnsupportedOperator {
            field: field.to_string(),
            operator: operator.to_string(),
        }
    }

    pub(crate) fn order_by(message: impl Into<String>) -> Self {
        Self::OrderBy {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
