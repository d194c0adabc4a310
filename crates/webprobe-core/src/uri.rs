//! Path template substitution

use crate::document::Operation;
use crate::synth::{SynthesisContext, Synthesizer, ValueSite};

/// Replace every `{name}` placeholder for the operation's path parameters.
///
/// Substitution is textual. Placeholders without a matching parameter are
/// left as they are; parameters without a placeholder are ignored.
#[must_use]
pub fn build_uri(template: &str, operation: &Operation, synthesizer: &Synthesizer) -> String {
    let mut uri = template.to_string();
    for param in operation.path_parameters() {
        let ctx = SynthesisContext {
            path: template,
            method: operation.method,
            operation,
            parameter_name: &param.name,
            site: ValueSite::PathSegment,
            schema: &param.schema,
        };
        let value = synthesizer.synthesize(&ctx);
        uri = uri.replace(&format!("{{{}}}", param.name), &value);
    }
    uri
}
