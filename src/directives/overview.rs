//! `doc_overview_table`: a symbol/description summary table built from a
//! Doxygen compound file.
//!
//! ```rst
//! .. doc_overview_table:: namespacemockturtle
//!    :column: Algorithm
//!
//!    cut_rewriting
//!    refactoring
//! ```

use log::debug;

use super::{Directive, DirectiveContext, DirectiveError, DirectiveInput, DirectiveSpec, OptionKind};
use crate::document::{Block, Inline, RefTarget, Table};
use crate::doxygen::CompoundFile;
use crate::error::BuildWarning;

/// Header of the symbol column when `:column:` is not given
pub const DEFAULT_COLUMN: &str = "Function";

/// `doc_overview_table`: symbol and description table from Doxygen XML
pub struct OverviewTableDirective;

impl Directive for OverviewTableDirective {
    fn name(&self) -> &str {
        "doc_overview_table"
    }

    fn spec(&self) -> DirectiveSpec {
        DirectiveSpec {
            required_arguments: 1,
            optional_arguments: 0,
            final_argument_whitespace: false,
            has_content: true,
            option_spec: vec![
                ("column", OptionKind::Unchanged),
                ("project", OptionKind::Unchanged),
            ],
        }
    }

    fn run(
        &self,
        input: &DirectiveInput<'_>,
        ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError> {
        let stem = input.argument(0).unwrap_or_default();
        let compound = ctx
            .doxygen
            .compound(input.option("project"), stem)
            .map_err(|e| DirectiveError::Failed(format!("cannot read Doxygen XML: {}", e)))?;

        let column = match input.option("column") {
            Some(column) if !column.is_empty() => column,
            _ => DEFAULT_COLUMN,
        };
        let (table, missing) = overview_table(&compound, column, input.content_lines());

        for symbol in missing {
            ctx.warn(BuildWarning::missing_symbol(
                ctx.source_path,
                input.call.line,
                &symbol,
                &compound.path,
            ));
        }
        debug!(
            "{}: overview table with {} row(s) from {}",
            ctx.docname,
            table.rows.len(),
            compound.path.display()
        );

        Ok(vec![Block::Table(table)])
    }
}

/// Build the overview table for `symbols`. Each symbol contributes one row
/// for the first member with that name; symbols without a member are
/// returned separately and get no row.
pub fn overview_table<'s>(
    compound: &CompoundFile,
    column: &str,
    symbols: impl IntoIterator<Item = &'s str>,
) -> (Table, Vec<String>) {
    let header: Vec<Vec<Block>> = [column, "Description"]
        .iter()
        .map(|text| vec![Block::Line(vec![Inline::Text(text.to_string())])])
        .collect();

    let mut rows = Vec::new();
    let mut missing = Vec::new();
    for symbol in symbols {
        let member = match compound.find_member(symbol) {
            Some(member) => member,
            None => {
                missing.push(symbol.to_string());
                continue;
            }
        };

        let reference = Inline::Reference {
            text: symbol.to_string(),
            target: RefTarget::Anchor(member.id.clone()),
        };
        let description = match &member.brief {
            Some(brief) => vec![Inline::Text(brief.clone())],
            None => Vec::new(),
        };
        rows.push(vec![
            vec![Block::Paragraph(vec![reference])],
            vec![Block::Line(description)],
        ]);
    }

    let table = Table {
        colwidths: vec![50, 50],
        header,
        rows,
        classes: vec!["overview-table".to_string()],
    };
    (table, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const XML: &str = r#"<doxygen>
  <compounddef id="namespacemockturtle" kind="namespace">
    <compoundname>mockturtle</compoundname>
    <sectiondef kind="func">
      <memberdef kind="function" id="ns_1acut"><name>cut_rewriting</name>
        <briefdescription><para>Cut rewriting.</para></briefdescription>
      </memberdef>
      <memberdef kind="function" id="ns_1acut2"><name>cut_rewriting</name>
        <briefdescription><para>Second overload.</para></briefdescription>
      </memberdef>
      <memberdef kind="function" id="ns_1aref"><name>refactoring</name>
        <briefdescription><para>Refactoring.</para></briefdescription>
      </memberdef>
    </sectiondef>
  </compounddef>
</doxygen>"#;

    fn compound() -> CompoundFile {
        CompoundFile::parse(Path::new("namespacemockturtle.xml"), XML).unwrap()
    }

    #[test]
    fn test_table_shape() {
        let (table, missing) = overview_table(&compound(), "Algorithm", ["cut_rewriting", "refactoring"]);

        assert!(missing.is_empty());
        assert_eq!(table.colwidths, vec![50, 50]);
        assert_eq!(
            table.header,
            vec![
                vec![Block::Line(vec![Inline::Text("Algorithm".to_string())])],
                vec![Block::Line(vec![Inline::Text("Description".to_string())])],
            ]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            table.rows[1],
            vec![
                vec![Block::Paragraph(vec![Inline::Reference {
                    text: "refactoring".to_string(),
                    target: RefTarget::Anchor("ns_1aref".to_string()),
                }])],
                vec![Block::Line(vec![Inline::Text("Refactoring.".to_string())])],
            ]
        );
    }

    #[test]
    fn test_only_first_definition_produces_a_row() {
        let (table, _) = overview_table(&compound(), DEFAULT_COLUMN, ["cut_rewriting"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(
            table.rows[0][0],
            vec![Block::Paragraph(vec![Inline::Reference {
                text: "cut_rewriting".to_string(),
                target: RefTarget::Anchor("ns_1acut".to_string()),
            }])]
        );
    }

    #[test]
    fn test_missing_symbols_are_reported_without_rows() {
        let (table, missing) = overview_table(&compound(), DEFAULT_COLUMN, ["nope", "refactoring"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(missing, vec!["nope"]);
    }
}

#[cfg(test)]
mod directive_tests {
    use super::*;
    use crate::directives::testing::Fixture;
    use crate::directives::validation::validate_call;
    use crate::document::DirectiveCall;
    use crate::error::WarningKind;

    const XML: &str = r#"<doxygen>
  <compounddef id="namespacemockturtle" kind="namespace">
    <sectiondef kind="func">
      <memberdef kind="function" id="ns_1amig"><name>mig_algebraic_depth_rewriting</name>
        <briefdescription><para>Depth rewriting.</para></briefdescription>
      </memberdef>
    </sectiondef>
  </compounddef>
</doxygen>"#;

    #[test]
    fn test_directive_warns_for_missing_symbols() {
        let fixture = Fixture::with_xml(&["index"], &[("namespacemockturtle.xml", XML)]);
        let ctx = fixture.context("index");
        let call = DirectiveCall::new("doc_overview_table", "namespacemockturtle", 7)
            .with_content(["mig_algebraic_depth_rewriting", "", "unknown_algorithm"]);
        let input = validate_call(&call, &OverviewTableDirective.spec()).unwrap();

        let blocks = OverviewTableDirective.run(&input, &ctx).unwrap();
        match &blocks[0] {
            Block::Table(table) => {
                assert_eq!(table.rows.len(), 1);
                assert_eq!(
                    table.header[0],
                    vec![Block::Line(vec![Inline::Text("Function".to_string())])]
                );
            }
            other => panic!("expected table, got {:?}", other),
        }

        let warnings = ctx.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MissingSymbol);
        assert_eq!(warnings[0].line, Some(7));
        assert!(warnings[0].message.contains("unknown_algorithm"));
    }

    #[test]
    fn test_directive_fails_without_xml() {
        let fixture = Fixture::new(&["index"]);
        let ctx = fixture.context("index");
        let call = DirectiveCall::new("doc_overview_table", "namespacemissing", 1).with_content(["x"]);
        let input = validate_call(&call, &OverviewTableDirective.spec()).unwrap();

        match OverviewTableDirective.run(&input, &ctx) {
            Err(DirectiveError::Failed(message)) => assert!(message.contains("namespacemissing.xml")),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
