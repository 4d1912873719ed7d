//! 字段配置：哪些字段可以过滤、支持哪些运算符、常量如何转换为类型化的值

use crate::error::{FilterError, Result};
use crate::token::{Token, TokenKind};
use chrono::{DateTime, NaiveDate, Utc};
use sea_query::{Nullable, Value};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// 把去掉引号的常量文本转换为类型化的值
pub type Converter = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// 在大小写处理之后作用于转换结果
pub type ValueTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// 可过滤字段的声明类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Bool,
    Int,
    Long,
    Double,
    Guid,
    Date,
    DateTime,
}

impl FieldType {
    /// 该类型字段默认支持的运算符
    pub fn default_operators(self) -> TokenKind {
        match self {
            FieldType::Bool => TokenKind::EQUALITY,
            _ => TokenKind::COMPARISON,
        }
    }

    /// 该类型字段允许配置的运算符。字符串函数和大写比较只对字符串有效
    pub fn allowed_operators(self) -> TokenKind {
        match self {
            FieldType::String => TokenKind::COMPARISON | TokenKind::STRING_FUNCTION,
            _ => TokenKind::COMPARISON,
        }
    }

    pub fn is_string(self) -> bool {
        self == FieldType::String
    }

    /// 可与该类型字段比较的常量类型
    pub fn constant_kinds(self) -> TokenKind {
        match self {
            FieldType::String => TokenKind::LITERAL | TokenKind::NULL,
            FieldType::Bool => TokenKind::BOOLEAN | TokenKind::NULL,
            _ => TokenKind::VALUE | TokenKind::NULL,
        }
    }

    pub fn default_converter(self) -> Converter {
        match self {
            FieldType::String => Arc::new(|text: &str| Some(Value::from(text.to_string()))),
            FieldType::Bool => Arc::new(|text: &str| {
                if text.eq_ignore_ascii_case("true") {
                    Some(Value::from(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Some(Value::from(false))
                } else {
                    None
                }
            }),
            FieldType::Int => Arc::new(|text: &str| text.parse::<i32>().ok().map(Value::from)),
            FieldType::Long => Arc::new(|text: &str| text.parse::<i64>().ok().map(Value::from)),
            FieldType::Double => Arc::new(|text: &str| text.parse::<f64>().ok().map(Value::from)),
            FieldType::Guid => Arc::new(|text: &str| Uuid::try_parse(text).ok().map(Value::from)),
            FieldType::Date => Arc::new(|text: &str| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .map(Value::from)
            }),
            FieldType::DateTime => Arc::new(|text: &str| {
                DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|d| Value::from(d.with_timezone(&Utc)))
            }),
        }
    }
}

/// 可以作为字段类型的Rust类型
pub trait FieldValue: Nullable {
    const FIELD_TYPE: FieldType;

    /// 以该类型注册字段时使用的转换器
    fn converter() -> Converter {
        Self::FIELD_TYPE.default_converter()
    }

    /// 该类型的空值，例如 `i64` 对应 `Value::BigInt(None)`
    fn typed_null() -> Value {
        <Self as Nullable>::null()
    }
}

impl FieldValue for String {
    const FIELD_TYPE: FieldType = FieldType::String;
}

impl FieldValue for bool {
    const FIELD_TYPE: FieldType = FieldType::Bool;
}

impl FieldValue for i32 {
    const FIELD_TYPE: FieldType = FieldType::Int;
}

impl FieldValue for i64 {
    const FIELD_TYPE: FieldType = FieldType::Long;
}

impl FieldValue for f64 {
    const FIELD_TYPE: FieldType = FieldType::Double;
}

impl FieldValue for Uuid {
    const FIELD_TYPE: FieldType = FieldType::Guid;
}

impl FieldValue for NaiveDate {
    const FIELD_TYPE: FieldType = FieldType::Date;
}

impl FieldValue for DateTime<Utc> {
    const FIELD_TYPE: FieldType = FieldType::DateTime;
}

/// 单个可过滤字段的配置
///
/// 由 [`FieldRegistry::add`]（或 `FilterParser::add_field`）返回，支持链式配置：
///
/// ```
/// use filter_dispatcher::FilterParser;
///
/// let mut parser = FilterParser::new();
/// parser
///     .add_field::<String>("name")?
///     .rename("Person.Name")
///     .use_upper_case()
///     .check_not_null();
/// # Ok::<(), filter_dispatcher::FilterError>(())
/// ```
#[derive(Clone)]
pub struct FieldConfig {
    name: String,
    override_name: Option<String>,
    field_type: FieldType,
    supported_kinds: TokenKind,
    ignore_case: bool,
    check_not_null: bool,
    converter: Converter,
    value_transform: Option<ValueTransform>,
}

impl FieldConfig {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            override_name: None,
            field_type,
            supported_kinds: field_type.default_operators(),
            ignore_case: false,
            check_not_null: false,
            converter: field_type.default_converter(),
            value_transform: None,
        }
    }

    /// 以 `T` 为类型的字段，使用 `T` 的转换器
    pub fn for_value<T: FieldValue>(name: &str) -> Self {
        Self {
            converter: T::converter(),
            ..Self::new(name, T::FIELD_TYPE)
        }
    }

    /// 输出时使用的字段名，与调用方过滤时使用的名称不同
    pub fn rename(&mut self, override_name: &str) -> &mut Self {
        self.override_name = Some(override_name.to_string());
        self
    }

    /// 两侧都转为大写，忽略大小写比较。非字符串字段忽略此设置
    pub fn use_upper_case(&mut self) -> &mut Self {
        if self.field_type.is_string() {
            self.ignore_case = true;
        } else {
            log::warn!(
                "ignoring upper-casing on {:?} field '{}'",
                self.field_type,
                self.name
            );
        }
        self
    }

    /// 比较前加上 `field != null` 判断
    pub fn check_not_null(&mut self) -> &mut Self {
        self.check_not_null = true;
        self
    }

    /// 扩展支持的运算符
    pub fn supports(&mut self, kinds: TokenKind) -> &mut Self {
        self.supported_kinds |= self.allowed(kinds);
        self
    }

    /// 替换支持的运算符
    pub fn only_supports(&mut self, kinds: TokenKind) -> &mut Self {
        self.supported_kinds = self.allowed(kinds);
        self
    }

    fn allowed(&self, kinds: TokenKind) -> TokenKind {
        let allowed = self.field_type.allowed_operators();
        let dropped = kinds & TokenKind::STRING_FUNCTION & !allowed;
        if !dropped.is_empty() {
            log::warn!(
                "ignoring string functions on {:?} field '{}'",
                self.field_type,
                self.name
            );
        }
        kinds & allowed
    }

    pub fn with_converter<F>(&mut self, converter: F) -> &mut Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.converter = Arc::new(converter);
        self
    }

    pub fn with_value_transform<F>(&mut self, transform: F) -> &mut Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.value_transform = Some(Arc::new(transform));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 写入输出文本的字段名
    pub fn target_name(&self) -> &str {
        self.override_name.as_deref().unwrap_or(&self.name)
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn supported_kinds(&self) -> TokenKind {
        self.supported_kinds
    }

    pub fn supports_kind(&self, kind: TokenKind) -> bool {
        self.supported_kinds.contains(kind)
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn checks_not_null(&self) -> bool {
        self.check_not_null
    }

    pub fn is_boolean(&self) -> bool {
        self.field_type == FieldType::Bool
    }

    pub fn accepts_constant(&self, kind: TokenKind) -> bool {
        self.field_type.constant_kinds().contains(kind)
    }

    /// 把常量文本转换为值
    ///
    /// 大写转换作用于转换后的字符串而不是原始文本，自定义转换器看到的是调用方输入的原文
    pub fn convert_to_value(&self, text: &str) -> Option<Value> {
        let value = match (self.converter)(text)? {
            Value::String(Some(s)) if self.ignore_case => Value::from(s.to_uppercase()),
            value => value,
        };
        Some(match &self.value_transform {
            Some(transform) => transform(value),
            None => value,
        })
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("name", &self.name)
            .field("override_name", &self.override_name)
            .field("field_type", &self.field_type)
            .field("supported_kinds", &self.supported_kinds)
            .field("ignore_case", &self.ignore_case)
            .field("check_not_null", &self.check_not_null)
            .finish_non_exhaustive()
    }
}

/// 可过滤字段白名单，查找时不区分大小写
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: HashMap<String, FieldConfig>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册字段，同名字段只能注册一次
    pub fn add(&mut self, config: FieldConfig) -> Result<&mut FieldConfig> {
        match self.fields.entry(config.name.to_lowercase()) {
            Entry::Occupied(_) => Err(FilterError::DuplicateField { field: config.name }),
            Entry::Vacant(entry) => {
                log::debug!(
                    "registered filter field '{}' as {:?}",
                    config.name,
                    config.field_type
                );
                Ok(entry.insert(config))
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 在白名单中查找字段token
    pub fn resolve(&self, token: &Token, input: &str) -> Result<&FieldConfig> {
        let name = token.text(input);
        self.get(name).ok_or_else(|| FilterError::UnknownField {
            field: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
