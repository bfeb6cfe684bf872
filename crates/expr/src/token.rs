//! Lexical tokens shared by all four sublanguages (condition, update,
//! key-condition, projection).

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    And,
    Or,
    Not,
    Between,
    In,
    Set,
    Remove,
    Add,
    Delete,

    /// A bare identifier: a path segment or a function name. Keywords
    /// above are matched first and never appear as `Ident`.
    Ident(String),
    /// `#ident` — an attribute-name placeholder.
    NamePlaceholder(String),
    /// `:ident` — an attribute-value placeholder.
    ValuePlaceholder(String),
    /// Raw text of a decimal numeric literal, e.g. `"3.14"` or `"-2"`.
    Number(String),
    /// Contents of a quoted string literal, with escapes resolved.
    Str(String),

    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Plus,
    Minus,

    LParen,
    RParen,
    Comma,

    Eof,
}

impl Token {
    /// A short human-readable label for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::NamePlaceholder(s) => format!("'#{s}'"),
            Token::ValuePlaceholder(s) => format!("':{s}'"),
            Token::Number(s) => format!("number '{s}'"),
            Token::Str(s) => format!("string '{s}'"),
            Token::Eof => "end of input".to_string(),
            other => format!("'{other:?}'"),
        }
    }

    pub fn keyword_from_str(s: &str) -> Option<Token> {
        match s {
            "AND" => Some(Token::And),
            "OR" => Some(Token::Or),
            "NOT" => Some(Token::Not),
            "BETWEEN" => Some(Token::Between),
            "IN" => Some(Token::In),
            "SET" => Some(Token::Set),
            "REMOVE" => Some(Token::Remove),
            "ADD" => Some(Token::Add),
            "DELETE" => Some(Token::Delete),
            _ => None,
        }
    }
}
