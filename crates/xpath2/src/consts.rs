//! Well-known namespace URIs and collation identifiers.

/// XML Schema namespace (`xs:`).
pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
/// XPath/XQuery function namespace (`fn:`).
pub const FNS: &str = "http://www.w3.org/2005/xpath-functions";
/// Namespace of W3C-defined error codes (`err:`).
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";
/// The reserved `xml` prefix binding.
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";

pub const CODEPOINT_URI: &str = "http://www.w3.org/2005/xpath-functions/collation/codepoint";
pub const SIMPLE_CASE_URI: &str = "urn:xpath2:collation:simple-case";
pub const SIMPLE_ACCENT_URI: &str = "urn:xpath2:collation:simple-accent";
pub const SIMPLE_CASE_ACCENT_URI: &str = "urn:xpath2:collation:simple-case-accent";
