//! Filter解析的输出：谓词文本加按位置排列的参数

use sea_query::{Value, Values};

/// 带 `@0`、`@1` 等占位符的谓词文本，以及按顺序对应的参数值
///
/// 调用方提供的常量只能通过 [`ParserResult::append_value`] 进入输出，且文本中只写入占位符
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserResult {
    filter_text: String,
    args: Vec<Value>,
}

impl ParserResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// 以sea-query `Values` 形式返回参数，可直接绑定
    pub fn values(&self) -> Values {
        Values(self.args.clone())
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.filter_text, self.args)
    }

    /// 追加一段谓词文本。前面的文本以 `(`、`!` 或空格结尾，
    /// 或新文本以 `)`、`,` 开头时不加空格，否则插入一个空格
    pub fn append(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        let needs_space = match (self.filter_text.chars().last(), text.chars().next()) {
            (None, _) => false,
            (Some('(' | '!' | ' '), _) => false,
            (_, Some(')' | ',' | ' ')) => false,
            _ => true,
        };
        if needs_space {
            self.filter_text.push(' ');
        }
        self.filter_text.push_str(text);
        self
    }

    /// 追加下一个占位符并记录对应的值
    pub fn append_value(&mut self, value: Value) -> &mut Self {
        let placeholder = format!("@{}", self.args.len());
        self.append(&placeholder);
        self.args.push(value);
        self
    }
}
