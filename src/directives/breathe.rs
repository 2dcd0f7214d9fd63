//! The Doxygen member directives of the `breathe` extension.

use std::path::Path;

use super::{Directive, DirectiveContext, DirectiveError, DirectiveInput, DirectiveSpec, OptionKind};
use crate::document::Block;

/// `doxygenfunction`, `doxygenvariable`, `doxygentypedef`, `doxygenenum`.
pub struct DoxygenMemberDirective {
    name: &'static str,
    kind: &'static str,
}

impl DoxygenMemberDirective {
    pub const fn new(name: &'static str, kind: &'static str) -> Self {
        Self { name, kind }
    }

    /// Every member directive breathe provides
    pub fn all() -> [Self; 4] {
        [
            Self::new("doxygenfunction", "function"),
            Self::new("doxygenvariable", "variable"),
            Self::new("doxygentypedef", "typedef"),
            Self::new("doxygenenum", "enum"),
        ]
    }
}

impl Directive for DoxygenMemberDirective {
    fn name(&self) -> &str {
        self.name
    }

    fn spec(&self) -> DirectiveSpec {
        DirectiveSpec {
            required_arguments: 1,
            optional_arguments: 0,
            final_argument_whitespace: true,
            has_content: false,
            option_spec: vec![
                ("project", OptionKind::Unchanged),
                ("file", OptionKind::Unchanged),
            ],
        }
    }

    fn run(
        &self,
        input: &DirectiveInput<'_>,
        ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError> {
        let argument = input.argument(0).unwrap_or_default();
        // A parameter list only disambiguates overloads; the first match wins.
        let name = argument.split('(').next().unwrap_or(argument).trim();
        let project = input.option("project");

        let member = match input.option("file") {
            Some(file) => {
                let stem = Path::new(file)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(file);
                let compound = ctx
                    .doxygen
                    .compound(project, stem)
                    .map_err(|e| DirectiveError::Failed(format!("cannot read Doxygen XML: {}", e)))?;
                let short_name = name.rsplit("::").next().unwrap_or(name);
                compound.find_member_of_kind(short_name, self.kind).cloned()
            }
            None => ctx
                .doxygen
                .find_member(project, name, self.kind)
                .map_err(|e| DirectiveError::Failed(format!("cannot read Doxygen index: {}", e)))?,
        };

        match member {
            Some(member) => Ok(vec![Block::Member(member.to_description())]),
            None => Err(DirectiveError::MissingSymbol(format!(
                "cannot find {} \"{}\" in doxygen xml output",
                self.kind, name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::testing::Fixture;
    use crate::directives::validation::validate_call;
    use crate::document::DirectiveCall;

    const NAMESPACE_XML: &str = r#"<doxygen>
  <compounddef id="namespacemockturtle" kind="namespace">
    <compoundname>mockturtle</compoundname>
    <sectiondef kind="func">
      <memberdef kind="function" id="ns_1acut"><name>cut_rewriting</name>
        <definition>void mockturtle::cut_rewriting</definition>
        <argsstring>(Ntk &amp;ntk)</argsstring>
        <briefdescription><para>Cut rewriting.</para></briefdescription>
      </memberdef>
    </sectiondef>
    <sectiondef kind="typedef">
      <memberdef kind="typedef" id="ns_1akl"><name>klut_network</name>
        <definition>using mockturtle::klut_network = ...</definition>
        <briefdescription></briefdescription>
      </memberdef>
    </sectiondef>
  </compounddef>
</doxygen>"#;

    const INDEX_XML: &str = r#"<doxygenindex>
  <compound refid="namespacemockturtle" kind="namespace"><name>mockturtle</name>
    <member refid="ns_1acut" kind="function"><name>cut_rewriting</name></member>
    <member refid="ns_1akl" kind="typedef"><name>klut_network</name></member>
  </compound>
</doxygenindex>"#;

    fn fixture() -> Fixture {
        Fixture::with_xml(
            &["index"],
            &[("namespacemockturtle.xml", NAMESPACE_XML), ("index.xml", INDEX_XML)],
        )
    }

    fn run(directive: &DoxygenMemberDirective, call: &DirectiveCall) -> Result<Vec<Block>, DirectiveError> {
        let fixture = fixture();
        let ctx = fixture.context("index");
        let input = validate_call(call, &directive.spec())?;
        directive.run(&input, &ctx)
    }

    #[test]
    fn test_function_through_index() {
        let directive = DoxygenMemberDirective::new("doxygenfunction", "function");
        let call = DirectiveCall::new("doxygenfunction", "mockturtle::cut_rewriting(Ntk&)", 1);
        let blocks = run(&directive, &call).unwrap();
        match &blocks[0] {
            Block::Member(member) => {
                assert_eq!(member.id, "ns_1acut");
                assert_eq!(member.signature, "void mockturtle::cut_rewriting(Ntk &ntk)");
                assert_eq!(member.brief.as_deref(), Some("Cut rewriting."));
            }
            other => panic!("expected member, got {:?}", other),
        }
    }

    #[test]
    fn test_typedef_with_file_option() {
        let directive = DoxygenMemberDirective::new("doxygentypedef", "typedef");
        let call = DirectiveCall::new("doxygentypedef", "klut_network", 1)
            .with_option("file", "namespacemockturtle.xml");
        let blocks = run(&directive, &call).unwrap();
        assert!(matches!(&blocks[0], Block::Member(m) if m.id == "ns_1akl" && m.brief.is_none()));
    }

    #[test]
    fn test_missing_member() {
        let directive = DoxygenMemberDirective::new("doxygenvariable", "variable");
        let call = DirectiveCall::new("doxygenvariable", "cut_rewriting", 1);
        assert!(matches!(run(&directive, &call), Err(DirectiveError::MissingSymbol(_))));
    }
}
