//! Filter的词法分析器
//!
//! 这里只检查字面量是否结束和单词边界，语义校验都交给表达式状态机

use crate::error::{FilterError, Result};
use crate::field::FieldRegistry;
use crate::token::{Span, Token, TokenKind};
use uuid::Uuid;

/// 关键字表中最长的关键字（`startswith`）
const MAX_KEYWORD_LEN: usize = 10;

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    fields: Option<&'a FieldRegistry>,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            fields: None,
            failed: false,
        }
    }

    /// 已注册的字段名即使不像标识符也识别为字段
    pub fn with_fields(input: &'a str, fields: &'a FieldRegistry) -> Self {
        Lexer {
            fields: Some(fields),
            ..Self::new(input)
        }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 读取单引号包围的字面量
    /// 注意：开始的引号已经被调用者消费；连续两个引号表示转义，不结束字面量
    fn read_literal(&mut self, start: usize) -> Result<Token> {
        loop {
            match self.bump() {
                Some('\'') if self.peek() == Some('\'') => {
                    self.bump();
                }
                Some('\'') => {
                    return Ok(Token::new(
                        TokenKind::LITERAL,
                        Span::new(start, self.position),
                    ))
                }
                Some(_) => {}
                None => return Err(FilterError::UnterminatedLiteral { position: start }),
            }
        }
    }

    /// 读取到空白或标点为止的单词
    /// 结尾的标点不消费，留给下一个token
    fn read_word(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || is_punctuation(c) {
                break;
            }
            self.bump();
        }
        let word = &self.input[start..self.position];
        Token::new(self.classify(word), Span::new(start, self.position))
    }

    fn classify(&self, word: &str) -> TokenKind {
        if let Some(kind) = match_keyword(word) {
            return kind;
        }
        if Uuid::try_parse(word).is_ok() {
            return TokenKind::VALUE;
        }
        if word.starts_with(|c: char| c.is_alphabetic() || c == '_') {
            return TokenKind::FIELD;
        }
        match self.fields {
            Some(fields) if fields.contains(word) => TokenKind::FIELD,
            _ => TokenKind::VALUE,
        }
    }
}

fn is_punctuation(c: char) -> bool {
    matches!(c, '(' | ')' | ',')
}

pub(crate) fn match_keyword(s: &str) -> Option<TokenKind> {
    if s.len() > MAX_KEYWORD_LEN {
        return None;
    }
    let kind = match s.to_ascii_lowercase().as_str() {
        "eq" => TokenKind::EQUAL,
        "ne" => TokenKind::NOT_EQUAL,
        "gt" => TokenKind::GREATER_THAN,
        "ge" => TokenKind::GREATER_THAN_OR_EQUAL,
        "lt" => TokenKind::LESS_THAN,
        "le" => TokenKind::LESS_THAN_OR_EQUAL,
        "in" => TokenKind::IN,
        "true" => TokenKind::TRUE,
        "false" => TokenKind::FALSE,
        "null" => TokenKind::NULL,
        "and" => TokenKind::AND,
        "or" => TokenKind::OR,
        "not" => TokenKind::NOT,
        "startswith" => TokenKind::STARTS_WITH,
        "endswith" => TokenKind::ENDS_WITH,
        "contains" => TokenKind::CONTAINS,
        _ => return None,
    };
    Some(kind)
}

/// 去掉字面量两侧的引号并还原转义的引号
pub fn unquote_literal(text: &str) -> String {
    let inner = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or(text);
    inner.replace("''", "'")
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.skip_whitespace();
        let start = self.position;

        let c = self.bump()?;

        let token = match c {
            '(' => Token::new(TokenKind::OPEN_PAREN, Span::new(start, self.position)),
            ')' => Token::new(TokenKind::CLOSE_PAREN, Span::new(start, self.position)),
            ',' => Token::new(TokenKind::COMMA, Span::new(start, self.position)),
            '\'' => match self.read_literal(start) {
                Ok(token) => token,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            },
            _ => self.read_word(start),
        };
        log::trace!("token {:?} '{}'", token.kind, token.text(self.input));
        Some(Ok(token))
    }
}
