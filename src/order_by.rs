//! OrderBy解析器：`field [asc|desc], field [asc|desc], ...`
//!
//! 语法比Filter简单得多，直接按逗号拆分子句，不经过token流

use crate::error::{FilterError, Result};
use sea_query::Order;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

/// 单个可排序字段的配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByFieldConfig {
    name: String,
    override_name: Option<String>,
    supports_ascending: bool,
    supports_descending: bool,
}

impl OrderByFieldConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            override_name: None,
            supports_ascending: true,
            supports_descending: true,
        }
    }

    pub fn rename(&mut self, override_name: &str) -> &mut Self {
        self.override_name = Some(override_name.to_string());
        self
    }

    pub fn ascending(&mut self, supported: bool) -> &mut Self {
        self.supports_ascending = supported;
        self
    }

    pub fn descending(&mut self, supported: bool) -> &mut Self {
        self.supports_descending = supported;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_name(&self) -> &str {
        self.override_name.as_deref().unwrap_or(&self.name)
    }

    pub fn supports_ascending(&self) -> bool {
        self.supports_ascending
    }

    pub fn supports_descending(&self) -> bool {
        self.supports_descending
    }
}

/// 解析后的 `field [direction]` 子句
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    /// 输出的字段名（配置了别名时为别名）
    pub field: String,
    /// 调用方未指定方向时为 `None`
    pub direction: Option<Order>,
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field)?;
        match self.direction {
            Some(Order::Asc) => write!(f, " asc"),
            Some(Order::Desc) => write!(f, " desc"),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderByParser {
    fields: HashMap<String, OrderByFieldConfig>,
    default: Option<String>,
}

impl OrderByParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, name: &str) -> Result<&mut OrderByFieldConfig> {
        match self.fields.entry(name.to_lowercase()) {
            Entry::Occupied(_) => Err(FilterError::DuplicateField {
                field: name.to_string(),
            }),
            Entry::Vacant(entry) => {
                log::debug!("registered order-by field '{}'", name);
                Ok(entry.insert(OrderByFieldConfig::new(name)))
            }
        }
    }

    pub fn get_field_config(&self, name: &str) -> Option<&OrderByFieldConfig> {
        self.fields.get(&name.to_lowercase())
    }

    /// 调用方未提供排序时使用的默认排序
    pub fn set_default(&mut self, order_by: &str) -> &mut Self {
        self.default = Some(order_by.to_string());
        self
    }

    pub fn default_order(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn parse_clauses(&self, order_by: &str) -> Result<Vec<OrderClause>> {
        order_by
            .split(',')
            .map(|clause| self.parse_clause(clause.trim()))
            .collect()
    }

    fn parse_clause(&self, clause: &str) -> Result<OrderClause> {
        let parts: Vec<&str> = clause.split_whitespace().collect();
        let (name, direction) = match parts.as_slice() {
            [name] => (*name, None),
            [name, direction] => (*name, Some(*direction)),
            [] => return Err(FilterError::order_by("empty clause")),
            _ => {
                return Err(FilterError::order_by(format!(
                    "too many parts in clause '{}'",
                    clause
                )))
            }
        };

        let field = self
            .get_field_config(name)
            .ok_or_else(|| FilterError::order_by(format!("field '{}' is not supported", name)))?;

        let direction = direction
            .map(|text| parse_direction(field, text))
            .transpose()?;

        Ok(OrderClause {
            field: field.target_name().to_string(),
            direction,
        })
    }

    /// 解析并输出排序字符串，输入缺失或为空白时返回 `Ok(None)`
    pub fn parse<'s>(&self, order_by: impl Into<Option<&'s str>>) -> Result<Option<String>> {
        let Some(order_by) = order_by.into().filter(|o| !o.trim().is_empty()) else {
            return Ok(None);
        };
        let rendered = self
            .parse_clauses(order_by)?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        log::debug!("parsed order by '{}' into '{}'", order_by, rendered);
        Ok(Some(rendered))
    }

    /// 同 [`OrderByParser::parse`]，没有输入时使用默认排序
    pub fn parse_or_default<'s>(
        &self,
        order_by: impl Into<Option<&'s str>>,
    ) -> Result<Option<String>> {
        match self.parse(order_by)? {
            Some(rendered) => Ok(Some(rendered)),
            None => Ok(self.default.clone()),
        }
    }
}

/// 方向必须是无歧义的前缀，至少为 `asc` 或 `desc`
fn parse_direction(field: &OrderByFieldConfig, text: &str) -> Result<Order> {
    let lower = text.to_ascii_lowercase();
    let (order, supported, label) = if lower.len() > 2 && "ascending".starts_with(&lower) {
        (Order::Asc, field.supports_ascending, "ascending")
    } else if lower.len() > 3 && "descending".starts_with(&lower) {
        (Order::Desc, field.supports_descending, "descending")
    } else {
        return Err(FilterError::order_by(format!(
            "direction '{}' is not valid",
            text
        )));
    };
    if !supported {
        return Err(FilterError::order_by(format!(
            "field '{}' does not support {} order",
            field.name, label
        )));
    }
    Ok(order)
}
