//! XML Schema type codes, cardinalities and `SequenceType` descriptors.
//!
//! The type-code lattice mirrors the XML Schema built-in hierarchy that XPath 2.0
//! exposes (XDM 1.0 section 2.6, XML Schema part 2 figure 1). Node kinds share
//! the same code space so a single `SequenceType` can describe both node and
//! atomic destinations.

use core::fmt;

use crate::xdm::ExpandedName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XmlTypeCode {
    /// `empty-sequence()`: matches only the empty sequence.
    None,
    Item,
    // Node kinds
    Node,
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
    // Complex/simple roots
    AnyType,
    Untyped,
    AnySimpleType,
    AnyAtomicType,
    UntypedAtomic,
    // String family
    String,
    NormalizedString,
    Token,
    Language,
    NmToken,
    Name,
    NcName,
    Id,
    IdRef,
    Entity,
    Boolean,
    // Numeric family
    Decimal,
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    PositiveInteger,
    Float,
    Double,
    // Durations
    Duration,
    YearMonthDuration,
    DayTimeDuration,
    // Date/time family
    DateTime,
    Date,
    Time,
    GYearMonth,
    GYear,
    GMonthDay,
    GDay,
    GMonth,
    HexBinary,
    Base64Binary,
    AnyUri,
    QName,
    Notation,
}

/// `(local name, code)` for every type reachable as `xs:local`.
const XS_NAMES: &[(&str, XmlTypeCode)] = &[
    ("anyType", XmlTypeCode::AnyType),
    ("untyped", XmlTypeCode::Untyped),
    ("anySimpleType", XmlTypeCode::AnySimpleType),
    ("anyAtomicType", XmlTypeCode::AnyAtomicType),
    ("untypedAtomic", XmlTypeCode::UntypedAtomic),
    ("string", XmlTypeCode::String),
    ("normalizedString", XmlTypeCode::NormalizedString),
    ("token", XmlTypeCode::Token),
    ("language", XmlTypeCode::Language),
    ("NMTOKEN", XmlTypeCode::NmToken),
    ("Name", XmlTypeCode::Name),
    ("NCName", XmlTypeCode::NcName),
    ("ID", XmlTypeCode::Id),
    ("IDREF", XmlTypeCode::IdRef),
    ("ENTITY", XmlTypeCode::Entity),
    ("boolean", XmlTypeCode::Boolean),
    ("decimal", XmlTypeCode::Decimal),
    ("integer", XmlTypeCode::Integer),
    ("nonPositiveInteger", XmlTypeCode::NonPositiveInteger),
    ("negativeInteger", XmlTypeCode::NegativeInteger),
    ("long", XmlTypeCode::Long),
    ("int", XmlTypeCode::Int),
    ("short", XmlTypeCode::Short),
    ("byte", XmlTypeCode::Byte),
    ("nonNegativeInteger", XmlTypeCode::NonNegativeInteger),
    ("unsignedLong", XmlTypeCode::UnsignedLong),
    ("unsignedInt", XmlTypeCode::UnsignedInt),
    ("unsignedShort", XmlTypeCode::UnsignedShort),
    ("unsignedByte", XmlTypeCode::UnsignedByte),
    ("positiveInteger", XmlTypeCode::PositiveInteger),
    ("float", XmlTypeCode::Float),
    ("double", XmlTypeCode::Double),
    ("duration", XmlTypeCode::Duration),
    ("yearMonthDuration", XmlTypeCode::YearMonthDuration),
    ("dayTimeDuration", XmlTypeCode::DayTimeDuration),
    ("dateTime", XmlTypeCode::DateTime),
    ("date", XmlTypeCode::Date),
    ("time", XmlTypeCode::Time),
    ("gYearMonth", XmlTypeCode::GYearMonth),
    ("gYear", XmlTypeCode::GYear),
    ("gMonthDay", XmlTypeCode::GMonthDay),
    ("gDay", XmlTypeCode::GDay),
    ("gMonth", XmlTypeCode::GMonth),
    ("hexBinary", XmlTypeCode::HexBinary),
    ("base64Binary", XmlTypeCode::Base64Binary),
    ("anyURI", XmlTypeCode::AnyUri),
    ("QName", XmlTypeCode::QName),
    ("NOTATION", XmlTypeCode::Notation),
];

impl XmlTypeCode {
    /// Resolve the local part of an `xs:` QName.
    pub fn from_xs_local(local: &str) -> Option<Self> {
        XS_NAMES.iter().find(|(n, _)| *n == local).map(|(_, c)| *c)
    }

    /// Local name inside the XML Schema namespace, if this code has one.
    pub fn xs_local(self) -> Option<&'static str> {
        XS_NAMES.iter().find(|(_, c)| *c == self).map(|(n, _)| *n)
    }

    /// Immediate base type in the lattice. `Item` is the top.
    pub fn parent(self) -> Option<Self> {
        use XmlTypeCode::*;
        Some(match self {
            None | Item => return Option::None,
            Node | AnyAtomicType => Item,
            Document | Element | Attribute | Text | Comment | ProcessingInstruction | Namespace => Node,
            AnyType => Item,
            Untyped | AnySimpleType => AnyType,
            UntypedAtomic | String | Boolean | Decimal | Float | Double | Duration | DateTime | Date
            | Time | GYearMonth | GYear | GMonthDay | GDay | GMonth | HexBinary | Base64Binary
            | AnyUri | QName | Notation => AnyAtomicType,
            NormalizedString => String,
            Token => NormalizedString,
            Language | NmToken | Name => Token,
            NcName => Name,
            Id | IdRef | Entity => NcName,
            Integer => Decimal,
            NonPositiveInteger | Long | NonNegativeInteger => Integer,
            NegativeInteger => NonPositiveInteger,
            Int => Long,
            Short => Int,
            Byte => Short,
            UnsignedLong | PositiveInteger => NonNegativeInteger,
            UnsignedInt => UnsignedLong,
            UnsignedShort => UnsignedInt,
            UnsignedByte => UnsignedShort,
            YearMonthDuration | DayTimeDuration => Duration,
        })
    }

    /// True when `self` equals `ancestor` or derives from it by restriction.
    pub fn derives_from(self, ancestor: Self) -> bool {
        if ancestor == XmlTypeCode::Item {
            return self != XmlTypeCode::None;
        }
        let mut cur = Some(self);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = c.parent();
        }
        false
    }

    pub fn is_node(self) -> bool {
        self.derives_from(XmlTypeCode::Node)
    }

    pub fn is_atomic(self) -> bool {
        self != XmlTypeCode::AnyAtomicType && self.derives_from(XmlTypeCode::AnyAtomicType)
    }

    pub fn is_numeric(self) -> bool {
        self.derives_from(XmlTypeCode::Decimal)
            || matches!(self, XmlTypeCode::Float | XmlTypeCode::Double)
    }

    pub fn is_integer_derived(self) -> bool {
        self.derives_from(XmlTypeCode::Integer)
    }

    pub fn is_string_derived(self) -> bool {
        self.derives_from(XmlTypeCode::String)
    }

    pub fn is_duration(self) -> bool {
        self.derives_from(XmlTypeCode::Duration)
    }

    /// Abstract types cannot be the target of a cast (`XPST0080`).
    pub fn is_abstract(self) -> bool {
        matches!(
            self,
            XmlTypeCode::AnyAtomicType | XmlTypeCode::Notation | XmlTypeCode::AnySimpleType
        )
    }

    /// The primitive type (direct child of `xs:anyAtomicType`) this type restricts.
    pub fn primitive(self) -> Self {
        let mut cur = self;
        while let Some(p) = cur.parent() {
            if p == XmlTypeCode::AnyAtomicType {
                return cur;
            }
            cur = p;
        }
        self
    }
}

impl fmt::Display for XmlTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(local) = self.xs_local() {
            return write!(f, "xs:{local}");
        }
        let s = match self {
            XmlTypeCode::None => "empty-sequence()",
            XmlTypeCode::Item => "item()",
            XmlTypeCode::Node => "node()",
            XmlTypeCode::Document => "document-node()",
            XmlTypeCode::Element => "element()",
            XmlTypeCode::Attribute => "attribute()",
            XmlTypeCode::Text => "text()",
            XmlTypeCode::Comment => "comment()",
            XmlTypeCode::ProcessingInstruction => "processing-instruction()",
            XmlTypeCode::Namespace => "namespace-node()",
            _ => "?",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cardinality {
    #[default]
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    pub fn from_indicator(c: char) -> Option<Self> {
        match c {
            '?' => Some(Cardinality::ZeroOrOne),
            '*' => Some(Cardinality::ZeroOrMore),
            '+' => Some(Cardinality::OneOrMore),
            _ => None,
        }
    }

    pub fn allows_empty(self) -> bool {
        matches!(self, Cardinality::ZeroOrOne | Cardinality::ZeroOrMore)
    }

    pub fn allows_many(self) -> bool {
        matches!(self, Cardinality::ZeroOrMore | Cardinality::OneOrMore)
    }

    /// Whether a sequence of `count` items satisfies this cardinality.
    pub fn accepts(self, count: usize) -> bool {
        match count {
            0 => self.allows_empty(),
            1 => true,
            _ => self.allows_many(),
        }
    }

    fn indicator(self) -> &'static str {
        match self {
            Cardinality::One => "",
            Cardinality::ZeroOrOne => "?",
            Cardinality::ZeroOrMore => "*",
            Cardinality::OneOrMore => "+",
        }
    }
}

/// Name constraint of an `element(..)`/`attribute(..)`/`processing-instruction(..)` test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameConstraint {
    Any,
    Name(ExpandedName),
}

/// A `(type-code, cardinality, optional name, optional schema type)` descriptor.
///
/// Constructed through [`SequenceType::empty`], [`SequenceType::atomic`],
/// [`SequenceType::item`] or [`SequenceType::node`] so that `empty-sequence()`
/// never carries a name or schema type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceType {
    pub type_code: XmlTypeCode,
    pub cardinality: Cardinality,
    /// Node name test for element/attribute/processing-instruction kinds.
    pub name: Option<NameConstraint>,
    /// Schema type named in `element(N, T)` / `attribute(N, T)`, or the
    /// declaration used by `schema-element(N)` / `schema-attribute(N)`.
    pub schema_type: Option<ExpandedName>,
    /// `element(N, T?)`
    pub nillable: bool,
    /// `schema-element(N)` / `schema-attribute(N)`
    pub schema_declared: bool,
    /// Element test nested in `document-node(...)`.
    pub document_element: Option<Box<SequenceType>>,
}

impl SequenceType {
    pub fn empty() -> Self {
        Self::bare(XmlTypeCode::None, Cardinality::ZeroOrOne)
    }

    pub fn item(cardinality: Cardinality) -> Self {
        Self::bare(XmlTypeCode::Item, cardinality)
    }

    pub fn atomic(type_code: XmlTypeCode, cardinality: Cardinality) -> Self {
        Self::bare(type_code, cardinality)
    }

    pub fn node(kind: XmlTypeCode) -> Self {
        Self::bare(kind, Cardinality::One)
    }

    fn bare(type_code: XmlTypeCode, cardinality: Cardinality) -> Self {
        Self {
            type_code,
            cardinality,
            name: None,
            schema_type: None,
            nillable: false,
            schema_declared: false,
            document_element: None,
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        if self.type_code != XmlTypeCode::None {
            self.cardinality = cardinality;
        }
        self
    }

    pub fn with_name(mut self, name: NameConstraint) -> Self {
        if self.type_code != XmlTypeCode::None {
            self.name = Some(name);
        }
        self
    }

    pub fn with_schema_type(mut self, ty: ExpandedName) -> Self {
        if self.type_code != XmlTypeCode::None {
            self.schema_type = Some(ty);
        }
        self
    }

    pub fn is_empty_sequence(&self) -> bool {
        self.type_code == XmlTypeCode::None
    }

    /// Whether a sequence of `count` items satisfies the occurrence part.
    pub fn accepts_count(&self, count: usize) -> bool {
        if self.is_empty_sequence() {
            count == 0
        } else {
            self.cardinality.accepts(count)
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty_sequence() {
            return f.write_str("empty-sequence()");
        }
        match (&self.name, self.type_code) {
            (Some(NameConstraint::Name(n)), XmlTypeCode::Element) => write!(f, "element({})", n.local)?,
            (Some(NameConstraint::Name(n)), XmlTypeCode::Attribute) => write!(f, "attribute({})", n.local)?,
            _ => write!(f, "{}", self.type_code)?,
        }
        f.write_str(self.cardinality.indicator())
    }
}
