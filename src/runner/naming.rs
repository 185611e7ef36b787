//! Names reported to the legacy host.
//!
//! The host derives log file names from reported test names and, in
//! isolated method runs, filters tests by their bare method name. Both
//! constrain what a name may look like.

use crate::plan::types::{TestIdentifier, TestSource};

/// Format a single identifier's name.
///
/// In an isolated method run the legacy reporting name is cut at the first
/// `(`, keeping a trailing `[n]` invocation index: `method(String)[2]`
/// becomes `method[2]`. Otherwise, and for legacy names without a parameter
/// list, the display name loses every `()`, other parentheses become
/// brackets and double quotes are dropped.
pub fn format_name(identifier: &TestIdentifier, isolated: bool) -> String {
    if isolated {
        let legacy = identifier.legacy_name();
        if let Some(open) = legacy.find('(') {
            let (base, params) = legacy.split_at(open);
            return match params.rfind('[') {
                Some(index) => format!("{base}{}", &params[index..]),
                None => base.to_owned(),
            };
        }
    }

    identifier
        .display_name
        .replace("()", "")
        .replace('(', "[")
        .replace(')', "]")
        .replace('"', "")
}

/// The name of a container: derived from its source when there is one.
pub fn technical_name(identifier: &TestIdentifier) -> String {
    match &identifier.source {
        Some(TestSource::Class { class_name }) => class_name.clone(),
        Some(TestSource::Method {
            method_name,
            parameter_types,
            ..
        }) => {
            if parameter_types.trim().is_empty() {
                method_name.clone()
            } else {
                format!("{method_name}({parameter_types})")
            }
        }
        None => identifier.display_name.clone(),
    }
}
