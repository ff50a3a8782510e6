//! The schema collaborator: type-name resolution and global declarations.

use core::fmt;
use std::collections::HashMap;

use crate::consts::XS;
use crate::xdm::{ExpandedName, XmlTypeCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaType {
    /// Atomic simple type; `base` is the built-in type it ultimately restricts.
    Simple { name: ExpandedName, base: XmlTypeCode },
    Complex { name: ExpandedName },
}

impl SchemaType {
    pub fn name(&self) -> &ExpandedName {
        match self {
            SchemaType::Simple { name, .. } | SchemaType::Complex { name } => name,
        }
    }
}

/// Set of schema types and global declarations in scope for compilation.
pub trait SchemaTypeSet: Send + Sync + fmt::Debug {
    /// Resolve a type name. Implementations must answer for the built-in `xs:` types.
    fn resolve_type(&self, name: &ExpandedName) -> Option<SchemaType>;

    /// Direct base type of a named type (`None` for the lattice roots and built-ins).
    fn base_type(&self, _name: &ExpandedName) -> Option<ExpandedName> {
        None
    }

    /// Type of a global element declaration.
    fn element_declaration(&self, _name: &ExpandedName) -> Option<ExpandedName> {
        None
    }

    /// Type of a global attribute declaration.
    fn attribute_declaration(&self, _name: &ExpandedName) -> Option<ExpandedName> {
        None
    }

    /// Whether `actual` is `expected` or derives from it.
    fn derives_from(&self, actual: &ExpandedName, expected: &ExpandedName) -> bool {
        if actual == expected {
            return true;
        }
        if let (Some(a), Some(e)) = (builtin_code(actual), builtin_code(expected)) {
            return a.derives_from(e);
        }
        let mut cur = self.base_type(actual);
        while let Some(b) = cur {
            if &b == expected {
                return true;
            }
            if let (Some(a), Some(e)) = (builtin_code(&b), builtin_code(expected)) {
                return a.derives_from(e);
            }
            cur = self.base_type(&b);
        }
        false
    }
}

/// The built-in type code for an `xs:` name.
pub fn builtin_code(name: &ExpandedName) -> Option<XmlTypeCode> {
    if name.ns_uri.as_deref() == Some(XS) {
        XmlTypeCode::from_xs_local(&name.local)
    } else {
        None
    }
}

fn resolve_builtin(name: &ExpandedName) -> Option<SchemaType> {
    let code = builtin_code(name)?;
    if code.derives_from(XmlTypeCode::AnyAtomicType) || code == XmlTypeCode::AnySimpleType {
        Some(SchemaType::Simple {
            name: name.clone(),
            base: code,
        })
    } else {
        Some(SchemaType::Complex { name: name.clone() })
    }
}

/// Only the built-in `xs:` types; no user declarations.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinSchema;

impl SchemaTypeSet for BuiltinSchema {
    fn resolve_type(&self, name: &ExpandedName) -> Option<SchemaType> {
        resolve_builtin(name)
    }
}

/// Programmatically assembled schema: user simple types restricting built-ins
/// plus global element/attribute declarations.
#[derive(Debug, Default, Clone)]
pub struct SimpleSchema {
    simple_types: HashMap<ExpandedName, ExpandedName>,
    complex_types: HashMap<ExpandedName, Option<ExpandedName>>,
    elements: HashMap<ExpandedName, ExpandedName>,
    attributes: HashMap<ExpandedName, ExpandedName>,
}

impl SimpleSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_simple_type(mut self, name: ExpandedName, base: ExpandedName) -> Self {
        self.simple_types.insert(name, base);
        self
    }

    pub fn with_complex_type(mut self, name: ExpandedName, base: Option<ExpandedName>) -> Self {
        self.complex_types.insert(name, base);
        self
    }

    pub fn with_element(mut self, name: ExpandedName, ty: ExpandedName) -> Self {
        self.elements.insert(name, ty);
        self
    }

    pub fn with_attribute(mut self, name: ExpandedName, ty: ExpandedName) -> Self {
        self.attributes.insert(name, ty);
        self
    }
}

impl SchemaTypeSet for SimpleSchema {
    fn resolve_type(&self, name: &ExpandedName) -> Option<SchemaType> {
        if let Some(t) = resolve_builtin(name) {
            return Some(t);
        }
        if self.complex_types.contains_key(name) {
            return Some(SchemaType::Complex { name: name.clone() });
        }
        // walk to the built-in ancestor to find the primitive representation
        let mut cur = self.simple_types.get(name)?;
        for _ in 0..64 {
            if let Some(code) = builtin_code(cur) {
                return Some(SchemaType::Simple {
                    name: name.clone(),
                    base: code,
                });
            }
            cur = self.simple_types.get(cur)?;
        }
        None
    }

    fn base_type(&self, name: &ExpandedName) -> Option<ExpandedName> {
        self.simple_types
            .get(name)
            .cloned()
            .or_else(|| self.complex_types.get(name).cloned().flatten())
    }

    fn element_declaration(&self, name: &ExpandedName) -> Option<ExpandedName> {
        self.elements.get(name).cloned()
    }

    fn attribute_declaration(&self, name: &ExpandedName) -> Option<ExpandedName> {
        self.attributes.get(name).cloned()
    }
}
