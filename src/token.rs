//! Filter语言的Token定义

use bitflags::bitflags;

/// Token是语言的最小单元，包含类型和位置
///
/// Token不持有文本，需要时通过 [`Token::text`] 从源字符串中截取
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// token的原始文本，字面量包含引号
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.span.start..self.span.end]
    }

    pub fn is(&self, kinds: TokenKind) -> bool {
        self.kind.intersects(kinds)
    }
}

bitflags! {
    /// Token的类型
    ///
    /// 每个token只带一个单位类型；底部的组合类型用于一次 `intersects`
    /// 判断是否属于某一类运算符
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TokenKind: u32 {
        // 标点
        const OPEN_PAREN = 1 << 0;            // (
        const CLOSE_PAREN = 1 << 1;           // )
        const COMMA = 1 << 2;                 // ,

        // 常量
        const LITERAL = 1 << 3;               // 'quoted'
        const VALUE = 1 << 4;                 // 42, 2024-01-01, guid
        const NULL = 1 << 5;
        const TRUE = 1 << 6;
        const FALSE = 1 << 7;

        const FIELD = 1 << 8;

        // 逻辑运算符
        const AND = 1 << 9;
        const OR = 1 << 10;
        const NOT = 1 << 11;

        // 比较运算符
        const EQUAL = 1 << 12;                // eq
        const NOT_EQUAL = 1 << 13;            // ne
        const GREATER_THAN = 1 << 14;         // gt
        const GREATER_THAN_OR_EQUAL = 1 << 15; // ge
        const LESS_THAN = 1 << 16;            // lt
        const LESS_THAN_OR_EQUAL = 1 << 17;   // le
        const IN = 1 << 18;                   // in

        // 字符串函数
        const STARTS_WITH = 1 << 19;
        const ENDS_WITH = 1 << 20;
        const CONTAINS = 1 << 21;

        const EQUALITY = Self::EQUAL.bits() | Self::NOT_EQUAL.bits();
        const COMPARISON = Self::EQUAL.bits()
            | Self::NOT_EQUAL.bits()
            | Self::GREATER_THAN.bits()
            | Self::GREATER_THAN_OR_EQUAL.bits()
            | Self::LESS_THAN.bits()
            | Self::LESS_THAN_OR_EQUAL.bits()
            | Self::IN.bits();
        const STRING_FUNCTION = Self::STARTS_WITH.bits()
            | Self::ENDS_WITH.bits()
            | Self::CONTAINS.bits();
        const BOOLEAN = Self::TRUE.bits() | Self::FALSE.bits();
        const CONSTANT = Self::LITERAL.bits()
            | Self::VALUE.bits()
            | Self::NULL.bits()
            | Self::TRUE.bits()
            | Self::FALSE.bits();
        const LOGICAL = Self::AND.bits() | Self::OR.bits() | Self::NOT.bits();
    }
}

impl TokenKind {
    /// 比较运算符对应的输出文本
    pub fn operator_symbol(self) -> Option<&'static str> {
        let symbol = match self {
            k if k == Self::EQUAL => "==",
            k if k == Self::NOT_EQUAL => "!=",
            k if k == Self::GREATER_THAN => ">",
            k if k == Self::GREATER_THAN_OR_EQUAL => ">=",
            k if k == Self::LESS_THAN => "<",
            k if k == Self::LESS_THAN_OR_EQUAL => "<=",
            k if k == Self::IN => "in",
            _ => return None,
        };
        Some(symbol)
    }

    /// 字符串函数对应的方法名
    pub fn function_name(self) -> Option<&'static str> {
        let name = match self {
            k if k == Self::STARTS_WITH => "StartsWith",
            k if k == Self::ENDS_WITH => "EndsWith",
            k if k == Self::CONTAINS => "Contains",
            _ => return None,
        };
        Some(name)
    }

    /// 逻辑运算符对应的输出文本
    pub fn logical_symbol(self) -> Option<&'static str> {
        let symbol = match self {
            k if k == Self::AND => "&&",
            k if k == Self::OR => "||",
            k if k == Self::NOT => "!",
            _ => return None,
        };
        Some(symbol)
    }
}

/// 源文本中的一个区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// 起始字节位置
    pub start: usize,
    /// 结束字节位置
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
