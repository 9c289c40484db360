//! Parsed request documents.
//!
//! A [`Document`] is the structural form of one GraphQL request: the selected
//! operation (type, name, variable definitions, top-level selections) plus
//! every fragment definition from the request text. Documents are produced by
//! [`parse`] / [`parse_operation`] and turned back into text by
//! [`Document::serialize`].
//!
//! The AST nodes themselves come from `async-graphql-parser`; this module only
//! decides which nodes make up a document and in which order.

mod printer;

use std::fmt;

use async_graphql_parser::types::{
    DocumentOperations, ExecutableDocument, FragmentDefinition, OperationDefinition,
    OperationType, Selection, VariableDefinition,
};
use async_graphql_parser::{Pos, Positioned};
use async_graphql_value::Name;

use crate::error::MergeError;

pub use printer::print_document;

/// The type of a GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => Self::Query,
            OperationType::Mutation => Self::Mutation,
            OperationType::Subscription => Self::Subscription,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named fragment definition.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: Name,
    pub definition: Positioned<FragmentDefinition>,
}

/// An operation definition as written in the request text.
#[derive(Debug, Clone)]
pub struct Operation {
    pub name: Option<Name>,
    pub definition: Positioned<OperationDefinition>,
}

impl Operation {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.definition.node.ty.into()
    }
}

/// A top-level definition of a request text.
#[derive(Debug, Clone)]
pub enum Definition {
    Operation(Operation),
    Fragment(Fragment),
}

impl Definition {
    /// The operation type, or `None` for fragments.
    #[must_use]
    pub fn operation_kind(&self) -> Option<OperationKind> {
        match self {
            Self::Operation(op) => Some(op.kind()),
            Self::Fragment(_) => None,
        }
    }

    fn pos(&self) -> Pos {
        match self {
            Self::Operation(op) => op.definition.pos,
            Self::Fragment(fragment) => fragment.definition.pos,
        }
    }
}

/// Parses request text into its definitions, in source order.
///
/// Text that only defines fragments yields no definitions: the parser rejects
/// it before the fragments can be collected.
///
/// # Errors
///
/// Returns [`MergeError::Parse`] if the text is not a valid executable
/// document.
pub fn parse_definitions(text: &str) -> Result<Vec<Definition>, MergeError> {
    let document: ExecutableDocument = match async_graphql_parser::parse_query(text) {
        Ok(document) => document,
        Err(async_graphql_parser::Error::MissingOperation) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut definitions: Vec<Definition> = match document.operations {
        DocumentOperations::Single(definition) => vec![Definition::Operation(Operation {
            name: None,
            definition,
        })],
        DocumentOperations::Multiple(operations) => operations
            .into_iter()
            .map(|(name, definition)| {
                Definition::Operation(Operation {
                    name: Some(name),
                    definition,
                })
            })
            .collect(),
    };
    definitions.extend(
        document
            .fragments
            .into_iter()
            .map(|(name, definition)| Definition::Fragment(Fragment { name, definition })),
    );

    // The parser keys operations and fragments by name in hash maps.
    definitions.sort_by_key(Definition::pos);
    Ok(definitions)
}

/// The structural form of a single-operation request.
#[derive(Debug, Clone)]
pub struct Document {
    pub operation_type: OperationKind,
    pub name: Option<Name>,
    pub variable_definitions: Vec<Positioned<VariableDefinition>>,
    pub selections: Vec<Positioned<Selection>>,
    pub fragments: Vec<Fragment>,
}

impl Document {
    /// Builds a document from parsed definitions, selecting one operation.
    ///
    /// With `operation_name` the operation of that name is selected;
    /// without it the definitions must contain exactly one operation.
    /// Operation directives are not carried over.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Parse`] if no operation can be selected.
    pub fn from_definitions(
        definitions: Vec<Definition>,
        operation_name: Option<&str>,
    ) -> Result<Self, MergeError> {
        let mut operations = Vec::new();
        let mut fragments = Vec::new();
        for definition in definitions {
            match definition {
                Definition::Operation(op) => operations.push(op),
                Definition::Fragment(fragment) => fragments.push(fragment),
            }
        }

        let operation = match operation_name {
            Some(wanted) => operations
                .into_iter()
                .find(|op| op.name.as_deref() == Some(wanted))
                .ok_or_else(|| MergeError::parse(format!("Unknown operation named '{wanted}'")))?,
            None => {
                if operations.len() > 1 {
                    return Err(MergeError::parse(
                        "Document contains multiple operations, operationName is required",
                    ));
                }
                operations
                    .pop()
                    .ok_or_else(|| MergeError::parse("Document does not contain any operation"))?
            }
        };

        let kind = operation.kind();
        let OperationDefinition {
            variable_definitions,
            selection_set,
            ..
        } = operation.definition.node;

        Ok(Self {
            operation_type: kind,
            name: operation.name,
            variable_definitions,
            selections: selection_set.node.items,
            fragments,
        })
    }

    /// Serializes the document back into GraphQL text.
    #[must_use]
    pub fn serialize(&self) -> String {
        print_document(self)
    }

    #[must_use]
    pub fn is_query(&self) -> bool {
        self.operation_type == OperationKind::Query
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Parses a single-operation request text.
///
/// # Errors
///
/// Returns [`MergeError::Parse`] on malformed text, or if the text does not
/// contain exactly one operation.
pub fn parse(text: &str) -> Result<Document, MergeError> {
    parse_operation(text, None)
}

/// Parses request text and selects the operation named `operation_name`.
///
/// # Errors
///
/// Returns [`MergeError::Parse`] on malformed text or if the operation cannot
/// be selected.
pub fn parse_operation(text: &str, operation_name: Option<&str>) -> Result<Document, MergeError> {
    Document::from_definitions(parse_definitions(text)?, operation_name)
}
