//! 配置模块，从JSON加载字段白名单和排序字段配置
//!
//! ```json
//! {
//!   "fields": [
//!     { "name": "name", "type": "string", "ignore_case": true, "operators": ["eq", "startswith"] },
//!     { "name": "age", "type": "int", "rename": "Person.Age" }
//!   ],
//!   "order_by": [
//!     { "name": "name" },
//!     { "name": "age", "descending": false }
//!   ],
//!   "default_order": "name asc"
//! }
//! ```

use crate::error::FilterError;
use crate::field::FieldType;
use crate::order_by::OrderByParser;
use crate::parser::FilterParser;
use crate::lexer::match_keyword;
use crate::token::TokenKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown operator '{operator}' for field '{field}'")]
    UnknownOperator { field: String, operator: String },

    #[error("'{option}' is only valid on string fields, but '{field}' is {field_type:?}")]
    StringOnlyOption {
        field: String,
        field_type: FieldType,
        option: String,
    },

    #[error(transparent)]
    Registration(#[from] FilterError),
}

/// 可过滤字段的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub check_not_null: bool,
    /// 存在时替换该类型默认支持的运算符
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operators: Option<Vec<String>>,
}

/// 可排序字段的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByFieldSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    #[serde(default = "enabled")]
    pub ascending: bool,
    #[serde(default = "enabled")]
    pub descending: bool,
}

impl FieldSpec {
    /// 检查仅限字符串字段的选项，并解析运算符列表
    fn operator_kinds(&self) -> Result<Option<TokenKind>, ConfigError> {
        if self.ignore_case && !self.field_type.is_string() {
            return Err(self.string_only("ignore_case"));
        }
        let Some(operators) = &self.operators else {
            return Ok(None);
        };
        let mut kinds = TokenKind::empty();
        for operator in operators {
            let kind = operator_kind(operator).ok_or_else(|| ConfigError::UnknownOperator {
                field: self.name.clone(),
                operator: operator.clone(),
            })?;
            if !self.field_type.allowed_operators().contains(kind) {
                return Err(self.string_only(operator));
            }
            kinds |= kind;
        }
        Ok(Some(kinds))
    }

    fn string_only(&self, option: &str) -> ConfigError {
        ConfigError::StringOnlyOption {
            field: self.name.clone(),
            field_type: self.field_type,
            option: option.to_string(),
        }
    }
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub order_by: Vec<OrderByFieldSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_order: Option<String>,
}

impl ParserConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn build_filter_parser(&self) -> Result<FilterParser, ConfigError> {
        let mut parser = FilterParser::new();
        for spec in &self.fields {
            let operators = spec.operator_kinds()?;
            let config = parser.add_field_of_type(&spec.name, spec.field_type)?;
            if let Some(rename) = &spec.rename {
                config.rename(rename);
            }
            if spec.ignore_case {
                config.use_upper_case();
            }
            if spec.check_not_null {
                config.check_not_null();
            }
            if let Some(kinds) = operators {
                config.only_supports(kinds);
            }
        }
        log::info!("built filter parser with {} fields", parser.fields().len());
        Ok(parser)
    }

    pub fn build_order_by_parser(&self) -> Result<OrderByParser, ConfigError> {
        let mut parser = OrderByParser::new();
        for spec in &self.order_by {
            let config = parser.add_field(&spec.name)?;
            if let Some(rename) = &spec.rename {
                config.rename(rename);
            }
            config.ascending(spec.ascending).descending(spec.descending);
        }
        if let Some(default_order) = &self.default_order {
            parser.set_default(default_order);
        }
        log::info!("built order-by parser with {} fields", self.order_by.len());
        Ok(parser)
    }

    /// 未指定配置文件时REPL使用的演示配置
    pub fn demo() -> Self {
        let field = |name: &str, field_type| FieldSpec {
            name: name.to_string(),
            rename: None,
            field_type,
            ignore_case: false,
            check_not_null: false,
            operators: None,
        };
        let sortable = |name: &str| OrderByFieldSpec {
            name: name.to_string(),
            rename: None,
            ascending: true,
            descending: true,
        };
        Self {
            fields: vec![
                FieldSpec {
                    ignore_case: true,
                    check_not_null: true,
                    operators: Some(
                        ["eq", "ne", "in", "startswith", "endswith", "contains"]
                            .map(String::from)
                            .to_vec(),
                    ),
                    ..field("name", FieldType::String)
                },
                field("age", FieldType::Int),
                field("active", FieldType::Bool),
                field("id", FieldType::Guid),
                field("created", FieldType::Date),
            ],
            order_by: vec![sortable("name"), sortable("age"), sortable("created")],
            default_order: Some("name asc".to_string()),
        }
    }
}

/// 通过Filter关键字表把运算符名称映射为token类型
fn operator_kind(operator: &str) -> Option<TokenKind> {
    match_keyword(operator)
        .filter(|kind| kind.intersects(TokenKind::COMPARISON | TokenKind::STRING_FUNCTION))
}
