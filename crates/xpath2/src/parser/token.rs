use compact_str::CompactString;
use core::fmt;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    IntegerLiteral,
    DecimalLiteral,
    DoubleLiteral,
    StringLiteral,
    /// Element/attribute name test or the name of an atomic type.
    QName,
    /// Name immediately followed by `(`.
    FunctionName,
    /// `$name`
    VarName,
    /// `child::`, `attribute::`, ...
    AxisName,
    /// `element`, `attribute`, `text`, `node`, `item`, `empty-sequence`, ... before `(`.
    KindKeyword,
    /// `*` as a name test
    Wildcard,
    /// `prefix:*`
    PrefixWildcard,
    /// `*:local`
    LocalWildcard,
    For,
    Some,
    Every,
    In,
    Satisfies,
    Return,
    If,
    Then,
    Else,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Slash,
    DoubleSlash,
    Plus,
    Minus,
    /// `*` as multiplication
    Multiply,
    Div,
    IDiv,
    Mod,
    Union,
    Intersect,
    Except,
    GeneralEq,
    GeneralNe,
    GeneralLt,
    GeneralLe,
    GeneralGt,
    GeneralGe,
    ValueEq,
    ValueNe,
    ValueLt,
    ValueLe,
    ValueGt,
    ValueGe,
    Is,
    Precedes,
    Follows,
    And,
    Or,
    To,
    InstanceOf,
    TreatAs,
    CastableAs,
    CastAs,
    /// `?` after a type (also the nillable marker inside `element(N, T?)`)
    OccurrenceOptional,
    /// `*` after a type
    OccurrenceZeroOrMore,
    /// `+` after a type
    OccurrenceOneOrMore,
    EndOfInput,
}

impl TokenKind {
    /// Display name used in "expected ..." diagnostics.
    pub fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            IntegerLiteral => "integer literal",
            DecimalLiteral => "decimal literal",
            DoubleLiteral => "double literal",
            StringLiteral => "string literal",
            QName => "name",
            FunctionName => "function name",
            VarName => "variable",
            AxisName => "axis",
            KindKeyword => "kind test",
            Wildcard => "'*'",
            PrefixWildcard => "'prefix:*'",
            LocalWildcard => "'*:name'",
            For => "'for'",
            Some => "'some'",
            Every => "'every'",
            In => "'in'",
            Satisfies => "'satisfies'",
            Return => "'return'",
            If => "'if'",
            Then => "'then'",
            Else => "'else'",
            Comma => "','",
            LParen => "'('",
            RParen => "')'",
            LBracket => "'['",
            RBracket => "']'",
            Dot => "'.'",
            DotDot => "'..'",
            At => "'@'",
            Slash => "'/'",
            DoubleSlash => "'//'",
            Plus => "'+'",
            Minus => "'-'",
            Multiply => "'*'",
            Div => "'div'",
            IDiv => "'idiv'",
            Mod => "'mod'",
            Union => "'union'",
            Intersect => "'intersect'",
            Except => "'except'",
            GeneralEq => "'='",
            GeneralNe => "'!='",
            GeneralLt => "'<'",
            GeneralLe => "'<='",
            GeneralGt => "'>'",
            GeneralGe => "'>='",
            ValueEq => "'eq'",
            ValueNe => "'ne'",
            ValueLt => "'lt'",
            ValueLe => "'le'",
            ValueGt => "'gt'",
            ValueGe => "'ge'",
            Is => "'is'",
            Precedes => "'<<'",
            Follows => "'>>'",
            And => "'and'",
            Or => "'or'",
            To => "'to'",
            InstanceOf => "'instance of'",
            TreatAs => "'treat as'",
            CastableAs => "'castable as'",
            CastAs => "'cast as'",
            OccurrenceOptional => "'?'",
            OccurrenceZeroOrMore => "'*'",
            OccurrenceOneOrMore => "'+'",
            EndOfInput => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Str(CompactString),
    Name {
        prefix: Option<CompactString>,
        local: CompactString,
    },
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    /// Character offset of the first character.
    pub start: usize,
    /// Length in characters.
    pub len: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            TokenValue::Str(s) => Some(s.as_str()),
            TokenValue::Name { local, .. } => Some(local.as_str()),
            _ => None,
        }
    }
}
