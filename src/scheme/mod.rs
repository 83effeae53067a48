//! Shared scheme mutation
//!
//! The shared `.xcscheme` normally lists its test targets inline under
//! `<TestAction><Testables>`. For a capture run the `Testables` are replaced
//! by a single `<TestPlans>` reference to the generated plan. The original
//! bytes are captured first and written back by `SchemeGuard` on every exit
//! path.

mod guard;

pub use guard::{RestoreRegistry, SchemeGuard};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io;
use thiserror::Error;

/// Element holding the test configuration
pub const TEST_ACTION: &str = "TestAction";

/// Direct children of `TestAction` removed before the plan reference is added
const REPLACED_CHILDREN: &[&[u8]] = &[b"Testables", b"TestPlans"];

/// Indentation step Xcode uses in scheme files
const INDENT: &str = "   ";

/// Scheme errors
#[derive(Debug, Error)]
pub enum SchemeError {
    #[error("failed to access scheme {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("scheme {path} is not well-formed XML: {message}")]
    Malformed { path: String, message: String },

    #[error("scheme {path} has no <{element}> element")]
    MissingElement { path: String, element: &'static str },
}

impl SchemeError {
    /// True for errors caused by the document's shape rather than I/O
    pub fn is_structural(&self) -> bool {
        !matches!(self, SchemeError::Io { .. })
    }
}

/// Failure of `patch_scheme`, before a path is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    Malformed(String),
    MissingTestAction,
}

impl PatchError {
    pub(crate) fn at(self, path: &str) -> SchemeError {
        match self {
            PatchError::Malformed(message) => SchemeError::Malformed {
                path: path.to_string(),
                message,
            },
            PatchError::MissingTestAction => SchemeError::MissingElement {
                path: path.to_string(),
                element: TEST_ACTION,
            },
        }
    }
}

fn is_replaced(name: &[u8]) -> bool {
    REPLACED_CHILDREN.iter().any(|child| *child == name)
}

fn is_whitespace(text: &[u8]) -> bool {
    text.iter().all(|b| b.is_ascii_whitespace())
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), PatchError> {
    writer
        .write_event(event)
        .map_err(|e| PatchError::Malformed(e.to_string()))
}

/// Emit `<TestPlans><TestPlanReference .../></TestPlans>` indented one level
/// deeper than `closing_indent`, followed by `closing_indent` itself.
fn write_plan_reference(
    writer: &mut Writer<Vec<u8>>,
    plan_reference: &str,
    closing_indent: &str,
) -> Result<(), PatchError> {
    let child = format!("{}{}", closing_indent, INDENT);
    let grandchild = format!("{}{}", child, INDENT);

    write(writer, Event::Text(BytesText::new(&child)))?;
    write(writer, Event::Start(BytesStart::new("TestPlans")))?;
    write(writer, Event::Text(BytesText::new(&grandchild)))?;
    write(
        writer,
        Event::Empty(
            BytesStart::new("TestPlanReference")
                .with_attributes([("reference", plan_reference), ("default", "YES")]),
        ),
    )?;
    write(writer, Event::Text(BytesText::new(&child)))?;
    write(writer, Event::End(BytesEnd::new("TestPlans")))?;
    write(writer, Event::Text(BytesText::new(closing_indent)))
}

/// Rewrite scheme XML so its `TestAction` references `plan_reference`.
///
/// Every direct `Testables` or `TestPlans` child of the first top-level
/// `TestAction` is removed, then one `TestPlans` node with a single default
/// `TestPlanReference` is appended. Applying the patch to its own output
/// yields the same document. Everything outside those nodes is passed
/// through unchanged.
pub fn patch_scheme(xml: &str, plan_reference: &str) -> Result<String, PatchError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());

    // Number of currently open elements
    let mut depth = 0usize;
    let mut in_test_action = false;
    let mut patched = false;
    // Depth to return to before leaving a removed subtree
    let mut skip_until: Option<usize> = None;
    // Whitespace seen but not yet written; dropped if a removed node follows
    let mut pending_ws: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            PatchError::Malformed(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        if let Some(target) = skip_until {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == target {
                        skip_until = None;
                    }
                }
                Event::Eof => {
                    return Err(PatchError::Malformed("unexpected end of document".to_string()))
                }
                _ => {}
            }
            continue;
        }

        // Direct children of TestAction sit at depth 2
        let removable = in_test_action && depth == 2;

        match event {
            Event::Text(ref text) if is_whitespace(text) => {
                let ws = String::from_utf8_lossy(text).into_owned();
                if let Some(prev) = pending_ws.replace(ws) {
                    write(&mut writer, Event::Text(BytesText::from_escaped(prev)))?;
                }
                continue;
            }
            Event::Start(ref e) if removable && is_replaced(e.name().as_ref()) => {
                pending_ws = None;
                skip_until = Some(depth);
                depth += 1;
                continue;
            }
            Event::Empty(ref e) if removable && is_replaced(e.name().as_ref()) => {
                pending_ws = None;
                continue;
            }
            _ => {}
        }

        match event {
            Event::Start(e) => {
                if let Some(ws) = pending_ws.take() {
                    write(&mut writer, Event::Text(BytesText::from_escaped(ws)))?;
                }
                if depth == 1 && !patched && e.name().as_ref() == TEST_ACTION.as_bytes() {
                    in_test_action = true;
                }
                depth += 1;
                write(&mut writer, Event::Start(e))?;
            }
            Event::End(e) => {
                let closing_indent = pending_ws.take();
                depth = depth.saturating_sub(1);
                if in_test_action && depth == 1 {
                    let indent = closing_indent.as_deref().unwrap_or("\n");
                    write_plan_reference(&mut writer, plan_reference, indent)?;
                    in_test_action = false;
                    patched = true;
                } else if let Some(ws) = closing_indent {
                    write(&mut writer, Event::Text(BytesText::from_escaped(ws)))?;
                }
                write(&mut writer, Event::End(e))?;
            }
            Event::Empty(e) if depth == 1 && !patched && e.name().as_ref() == TEST_ACTION.as_bytes() => {
                let indent = pending_ws.take().unwrap_or_else(|| "\n".to_string());
                write(&mut writer, Event::Text(BytesText::from_escaped(indent.clone())))?;
                write(&mut writer, Event::Start(e))?;
                write_plan_reference(&mut writer, plan_reference, &indent)?;
                write(&mut writer, Event::End(BytesEnd::new(TEST_ACTION)))?;
                patched = true;
            }
            Event::Eof => {
                if let Some(ws) = pending_ws.take() {
                    write(&mut writer, Event::Text(BytesText::from_escaped(ws)))?;
                }
                break;
            }
            other => {
                if let Some(ws) = pending_ws.take() {
                    write(&mut writer, Event::Text(BytesText::from_escaped(ws)))?;
                }
                write(&mut writer, other)?;
            }
        }
    }

    if !patched {
        return Err(PatchError::MissingTestAction);
    }

    String::from_utf8(writer.into_inner()).map_err(|e| PatchError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = "container:ImmichLensScreenshots.xctestplan";

    const SCHEME: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Scheme
   LastUpgradeVersion = "1620"
   version = "1.7">
   <BuildAction
      parallelizeBuildables = "YES">
   </BuildAction>
   <TestAction
      buildConfiguration = "Debug"
      shouldUseLaunchSchemeArgsEnv = "YES">
      <Testables>
         <TestableReference
            skipped = "NO">
            <BuildableReference
               BlueprintName = "ImmichLensUITests">
            </BuildableReference>
         </TestableReference>
      </Testables>
   </TestAction>
   <LaunchAction
      buildConfiguration = "Debug">
   </LaunchAction>
</Scheme>
"#;

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_replaces_testables_with_plan_reference() {
        let patched = patch_scheme(SCHEME, PLAN).unwrap();

        assert!(!patched.contains("<Testables>"));
        assert!(!patched.contains("TestableReference"));
        assert_eq!(count(&patched, "<TestPlans>"), 1);
        assert!(patched.contains(
            r#"<TestPlanReference reference="container:ImmichLensScreenshots.xctestplan" default="YES"/>"#
        ));

        let test_action = patched.find("<TestAction").unwrap();
        let plans = patched.find("<TestPlans>").unwrap();
        let end = patched.find("</TestAction>").unwrap();
        assert!(test_action < plans && plans < end);
    }

    #[test]
    fn test_preserves_unrelated_content() {
        let patched = patch_scheme(SCHEME, PLAN).unwrap();

        assert!(patched.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(patched.contains("LastUpgradeVersion = \"1620\""));
        assert!(patched.contains("<BuildAction\n      parallelizeBuildables = \"YES\">\n   </BuildAction>"));
        assert!(patched.contains("<LaunchAction\n      buildConfiguration = \"Debug\">"));
        assert!(patched.contains("shouldUseLaunchSchemeArgsEnv = \"YES\""));
    }

    #[test]
    fn test_reference_is_indented_inside_test_action() {
        let patched = patch_scheme(SCHEME, PLAN).unwrap();
        assert!(patched.contains(
            "      <TestPlans>\n         <TestPlanReference reference=\"container:ImmichLensScreenshots.xctestplan\" default=\"YES\"/>\n      </TestPlans>\n   </TestAction>"
        ));
    }

    #[test]
    fn test_second_application_keeps_one_reference() {
        let once = patch_scheme(SCHEME, PLAN).unwrap();
        let twice = patch_scheme(&once, PLAN).unwrap();

        assert_eq!(count(&twice, "<TestPlans>"), 1);
        assert_eq!(count(&twice, "<TestPlanReference"), 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_multiple_testables_all_removed() {
        let xml = r#"<Scheme><TestAction><Testables/><Testables><A/></Testables></TestAction></Scheme>"#;
        let patched = patch_scheme(xml, PLAN).unwrap();
        assert!(!patched.contains("Testables"));
        assert!(!patched.contains("<A/>"));
        assert_eq!(count(&patched, "<TestPlanReference"), 1);
    }

    #[test]
    fn test_test_action_without_testables() {
        let xml = "<Scheme>\n   <TestAction buildConfiguration=\"Debug\">\n   </TestAction>\n</Scheme>\n";
        let patched = patch_scheme(xml, PLAN).unwrap();
        assert_eq!(count(&patched, "<TestPlanReference"), 1);
        assert!(patched.ends_with("</TestAction>\n</Scheme>\n"));
    }

    #[test]
    fn test_empty_test_action_element() {
        let xml = "<Scheme>\n   <TestAction buildConfiguration=\"Debug\"/>\n</Scheme>";
        let patched = patch_scheme(xml, PLAN).unwrap();
        assert!(patched.contains("<TestAction buildConfiguration=\"Debug\">"));
        assert!(patched.contains("</TestPlans>\n   </TestAction>"));
    }

    #[test]
    fn test_nested_testables_outside_test_action_untouched() {
        let xml = "<Scheme><ProfileAction><Testables/></ProfileAction><TestAction><Testables/></TestAction></Scheme>";
        let patched = patch_scheme(xml, PLAN).unwrap();
        assert!(patched.contains("<ProfileAction><Testables/></ProfileAction>"));
    }

    #[test]
    fn test_missing_test_action() {
        let xml = "<Scheme>\n   <BuildAction/>\n</Scheme>\n";
        assert_eq!(patch_scheme(xml, PLAN), Err(PatchError::MissingTestAction));
    }

    #[test]
    fn test_deeper_test_action_does_not_count() {
        let xml = "<Scheme><Other><TestAction/></Other></Scheme>";
        assert_eq!(patch_scheme(xml, PLAN), Err(PatchError::MissingTestAction));
    }

    #[test]
    fn test_malformed_document() {
        let xml = "<Scheme><TestAction></Scheme>";
        assert!(matches!(patch_scheme(xml, PLAN), Err(PatchError::Malformed(_))));
    }

    #[test]
    fn test_attribute_value_is_escaped() {
        let patched = patch_scheme("<Scheme><TestAction/></Scheme>", "container:a&b.xctestplan").unwrap();
        assert!(patched.contains("reference=\"container:a&amp;b.xctestplan\""));
    }
}
