//! Matching items and sequences against a `SequenceType` (`instance of`,
//! `treat as`, kind tests in axis steps).

use crate::engine::runtime::Error;
use crate::model::{NodeKind, XdmNode};
use crate::schema::SchemaTypeSet;
use crate::xdm::{NameConstraint, SequenceCursor, SequenceType, XdmAtomicValue, XdmItem, XmlTypeCode};

fn kind_code(kind: NodeKind) -> XmlTypeCode {
    match kind {
        NodeKind::Document => XmlTypeCode::Document,
        NodeKind::Element => XmlTypeCode::Element,
        NodeKind::Attribute => XmlTypeCode::Attribute,
        NodeKind::Text => XmlTypeCode::Text,
        NodeKind::Comment => XmlTypeCode::Comment,
        NodeKind::ProcessingInstruction => XmlTypeCode::ProcessingInstruction,
        NodeKind::Namespace => XmlTypeCode::Namespace,
    }
}

fn atomic_matches(v: &XdmAtomicValue, code: XmlTypeCode) -> bool {
    if code == XmlTypeCode::AnyAtomicType {
        return true;
    }
    if !v.type_code().derives_from(code) {
        return false;
    }
    // xs:int additionally requires the value to fit 32 bits
    if code == XmlTypeCode::Int {
        return v.as_integer().is_some_and(|i| i32::try_from(i).is_ok());
    }
    true
}

fn name_matches<N: XdmNode>(node: &N, ty: &SequenceType) -> bool {
    match &ty.name {
        None | Some(NameConstraint::Any) => true,
        Some(NameConstraint::Name(expected)) => match node.name() {
            // processing-instruction(N) tests only the target
            Some(q) if ty.type_code == XmlTypeCode::ProcessingInstruction => q.local == expected.local,
            Some(q) => q.local == expected.local && q.ns_uri == expected.ns_uri,
            None => false,
        },
    }
}

fn annotation_matches<N: XdmNode>(node: &N, ty: &SequenceType, schema: &dyn SchemaTypeSet) -> bool {
    let Some(expected) = &ty.schema_type else {
        return true;
    };
    if node.is_nilled() && !ty.nillable && !ty.schema_declared {
        return false;
    }
    node.type_annotation()
        .is_some_and(|actual| schema.derives_from(&actual, expected))
}

fn node_matches<N: XdmNode>(node: &N, ty: &SequenceType, schema: &dyn SchemaTypeSet) -> bool {
    let code = kind_code(node.kind());
    if ty.type_code != XmlTypeCode::Node && ty.type_code != code {
        return false;
    }
    if !name_matches(node, ty) || !annotation_matches(node, ty, schema) {
        return false;
    }
    if let Some(inner) = &ty.document_element {
        let elements: Vec<N> = node
            .children()
            .into_iter()
            .filter(|c| c.kind() == NodeKind::Element)
            .collect();
        return matches!(elements.as_slice(), [only] if node_matches(only, inner, schema));
    }
    true
}

/// Whether one item matches the item-type part of `ty` (cardinality ignored).
pub(crate) fn item_matches<N: XdmNode>(item: &XdmItem<N>, ty: &SequenceType, schema: &dyn SchemaTypeSet) -> bool {
    match (item, ty.type_code) {
        (_, XmlTypeCode::None) => false,
        (_, XmlTypeCode::Item) => true,
        (XdmItem::Node(n), code) if code.is_node() => node_matches(n, ty, schema),
        (XdmItem::Atomic(v), code) if !code.is_node() => atomic_matches(v, code),
        _ => false,
    }
}

/// `instance of`: every item matches and the item count satisfies the
/// occurrence indicator. Stops at the first mismatch or surplus item.
pub(crate) fn instance_of<'a, N: XdmNode + 'a>(
    input: &mut (dyn SequenceCursor<'a, N> + 'a),
    ty: &SequenceType,
    schema: &dyn SchemaTypeSet,
) -> Result<bool, Error> {
    let mut count = 0usize;
    while let Some(item) = input.next_item() {
        let item = item?;
        count += 1;
        if !ty.accepts_count(count) && count > 1 {
            return Ok(false);
        }
        if !item_matches(&item, ty, schema) {
            return Ok(false);
        }
    }
    Ok(ty.accepts_count(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BuiltinSchema;
    use crate::xdm::Cardinality;

    #[test]
    fn int_subtypes_match_int() {
        let ty = XmlTypeCode::Int;
        assert!(atomic_matches(&XdmAtomicValue::Short(7), ty));
        assert!(atomic_matches(&XdmAtomicValue::Int(i32::MIN), ty));
        assert!(!atomic_matches(&XdmAtomicValue::Integer(7), ty));
        assert!(!atomic_matches(&XdmAtomicValue::Long(7), ty));
    }

    #[test]
    fn empty_sequence_type_matches_nothing() {
        let item: XdmItem<crate::simple_node::SimpleNode> = XdmItem::Atomic(XdmAtomicValue::Integer(1));
        assert!(!item_matches(&item, &SequenceType::empty(), &BuiltinSchema));
        assert!(item_matches(&item, &SequenceType::item(Cardinality::One), &BuiltinSchema));
    }
}
