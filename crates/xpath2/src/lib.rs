//! XPath 2.0 front-end: a mode-switching lexer, a recursive-descent parser
//! producing a typed AST, and the evaluator with the atomic-value coercion
//! runtime, all over an abstract node tree ([`XdmNode`]).
//!
//! ```
//! use xpath2::{
//!     DynamicContextBuilder, SimpleNode, StaticContext, XdmAtomicValue, XdmItem, compile_xpath, elem, simple_doc, text,
//! };
//!
//! let doc = simple_doc()
//!     .child(elem("list").child(elem("a").child(text("1"))).child(elem("a").child(text("2"))))
//!     .build();
//! let exe = compile_xpath("sum(//a)", &StaticContext::default()).unwrap();
//! let ctx = DynamicContextBuilder::<SimpleNode>::new().with_context_item(XdmItem::Node(doc)).build();
//! let result = exe.evaluate(&ctx).unwrap();
//! assert_eq!(result, vec![XdmItem::Atomic(XdmAtomicValue::Double(3.0))]);
//! ```

pub mod compiler;
pub mod consts;
pub mod engine;
pub mod model;
pub mod parser;
pub mod schema;
pub mod simple_node;
pub mod xdm;

pub use compiler::{Compiler, XPathExecutable, compile_xpath};
pub use engine::evaluator::Evaluator;
pub use engine::runtime::{
    DynamicContext, DynamicContextBuilder, Error, ErrorCode, FunctionRegistry, StaticContext, StaticContextBuilder,
};
pub use model::{NodeKind, QName, XdmNode};
pub use parser::parse_expression;
pub use simple_node::{SimpleNode, SimpleNodeBuilder, attr, comment, doc as simple_doc, elem, ns, pi, text};
pub use xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence};
