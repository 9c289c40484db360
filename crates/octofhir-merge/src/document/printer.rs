//! GraphQL printer for [`Document`].
//!
//! Output is deterministic: fragments first, then the operation, each
//! definition separated by a blank line, selection sets indented by two
//! spaces.

use std::fmt::{self, Display, Formatter, Write};

use async_graphql_parser::Positioned;
use async_graphql_parser::types::{Directive, Selection, VariableDefinition};
use async_graphql_value::{Name, Value};

use super::{Document, Fragment};

const INDENT: &str = "  ";

/// Serializes a document into GraphQL text.
#[must_use]
pub fn print_document(document: &Document) -> String {
    DocumentPrinter(document).to_string()
}

struct DocumentPrinter<'a>(&'a Document);

impl Display for DocumentPrinter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let document = self.0;

        for fragment in &document.fragments {
            write_fragment(f, fragment)?;
            f.write_str("\n\n")?;
        }

        f.write_str(document.operation_type.as_str())?;
        if let Some(name) = &document.name {
            write!(f, " {name}")?;
        }
        write_variable_definitions(f, &document.variable_definitions)?;
        f.write_char(' ')?;
        write_selection_set(f, &document.selections, 0)?;
        f.write_char('\n')
    }
}

fn write_fragment(f: &mut Formatter<'_>, fragment: &Fragment) -> fmt::Result {
    let definition = &fragment.definition.node;
    write!(
        f,
        "fragment {} on {}",
        fragment.name, definition.type_condition.node.on.node
    )?;
    write_directives(f, &definition.directives)?;
    f.write_char(' ')?;
    write_selection_set(f, &definition.selection_set.node.items, 0)
}

fn write_variable_definitions(
    f: &mut Formatter<'_>,
    definitions: &[Positioned<VariableDefinition>],
) -> fmt::Result {
    if definitions.is_empty() {
        return Ok(());
    }

    f.write_char('(')?;
    for (i, definition) in definitions.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        let definition = &definition.node;
        write!(f, "${}: {}", definition.name.node, definition.var_type.node)?;
        if let Some(default) = &definition.default_value {
            write!(f, " = {}", default.node)?;
        }
        write_directives(f, &definition.directives)?;
    }
    f.write_char(')')
}

fn write_selection_set(
    f: &mut Formatter<'_>,
    items: &[Positioned<Selection>],
    depth: usize,
) -> fmt::Result {
    f.write_str("{\n")?;
    for item in items {
        write_selection(f, &item.node, depth + 1)?;
    }
    write_indent(f, depth)?;
    f.write_char('}')
}

fn write_selection(f: &mut Formatter<'_>, selection: &Selection, depth: usize) -> fmt::Result {
    write_indent(f, depth)?;
    match selection {
        Selection::Field(field) => {
            let field = &field.node;
            if let Some(alias) = &field.alias {
                write!(f, "{}: ", alias.node)?;
            }
            f.write_str(&field.name.node)?;
            write_arguments(f, &field.arguments)?;
            write_directives(f, &field.directives)?;
            if !field.selection_set.node.items.is_empty() {
                f.write_char(' ')?;
                write_selection_set(f, &field.selection_set.node.items, depth)?;
            }
        }
        Selection::FragmentSpread(spread) => {
            write!(f, "...{}", spread.node.fragment_name.node)?;
            write_directives(f, &spread.node.directives)?;
        }
        Selection::InlineFragment(inline) => {
            let inline = &inline.node;
            f.write_str("...")?;
            if let Some(condition) = &inline.type_condition {
                write!(f, " on {}", condition.node.on.node)?;
            }
            write_directives(f, &inline.directives)?;
            f.write_char(' ')?;
            write_selection_set(f, &inline.selection_set.node.items, depth)?;
        }
    }
    f.write_char('\n')
}

fn write_arguments(
    f: &mut Formatter<'_>,
    arguments: &[(Positioned<Name>, Positioned<Value>)],
) -> fmt::Result {
    if arguments.is_empty() {
        return Ok(());
    }

    f.write_char('(')?;
    for (i, (name, value)) in arguments.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {}", name.node, value.node)?;
    }
    f.write_char(')')
}

fn write_directives(f: &mut Formatter<'_>, directives: &[Positioned<Directive>]) -> fmt::Result {
    for directive in directives {
        write!(f, " @{}", directive.node.name.node)?;
        write_arguments(f, &directive.node.arguments)?;
    }
    Ok(())
}

fn write_indent(f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::document::parse;

    #[test]
    fn test_print_simple_query() {
        let doc = parse("{ me { id name } }").unwrap();
        assert_eq!(doc.serialize(), "query {\n  me {\n    id\n    name\n  }\n}\n");
    }

    #[test]
    fn test_print_variables_arguments_and_directives() {
        let doc = parse(
            r#"query Patient($id: ID!, $withName: Boolean = true, $tags: [String!]) {
                p: patient(id: $id, filter: {tags: $tags, status: ACTIVE}) {
                    id
                    name @include(if: $withName) { given }
                }
            }"#,
        )
        .unwrap();

        let expected = "query Patient($id: ID!, $withName: Boolean = true, $tags: [String!]) {\n\
                        \x20 p: patient(id: $id, filter: {tags: $tags, status: ACTIVE}) {\n\
                        \x20   id\n\
                        \x20   name @include(if: $withName) {\n\
                        \x20     given\n\
                        \x20   }\n\
                        \x20 }\n\
                        }\n";
        assert_eq!(doc.serialize(), expected);
    }

    #[test]
    fn test_print_fragments_first() {
        let doc = parse(
            r#"query { patient { ...PatientFields ... on Patient { gender } ... @skip(if: true) { id } } }
               fragment PatientFields on Patient @cached { id name(use: "official") }"#,
        )
        .unwrap();

        let expected = "fragment PatientFields on Patient @cached {\n\
                        \x20 id\n\
                        \x20 name(use: \"official\")\n\
                        }\n\
                        \n\
                        query {\n\
                        \x20 patient {\n\
                        \x20   ...PatientFields\n\
                        \x20   ... on Patient {\n\
                        \x20     gender\n\
                        \x20   }\n\
                        \x20   ... @skip(if: true) {\n\
                        \x20     id\n\
                        \x20   }\n\
                        \x20 }\n\
                        }\n";
        assert_eq!(doc.serialize(), expected);
    }

    #[test]
    fn test_printed_text_parses_back() {
        let text = r#"query Search($q: String = "a \"quoted\" value", $n: Int = 10) {
            search(q: $q, first: $n, sort: [NAME, DATE]) { total items { ...Item } }
        }
        fragment Item on Resource { id }"#;

        let printed = parse(text).unwrap().serialize();
        let reparsed = parse(&printed).unwrap();
        assert_eq!(reparsed.serialize(), printed);
    }
}
