//! Checking directive calls against their [`DirectiveSpec`].

use indexmap::IndexMap;

use super::{DirectiveError, DirectiveInput, DirectiveSpec, OptionKind, OptionValue};
use crate::document::DirectiveCall;

/// Split the raw argument text the way docutils does: on whitespace, with
/// the remainder kept whole when the last argument allows whitespace.
pub fn split_arguments(raw: &str, spec: &DirectiveSpec) -> Result<Vec<String>, DirectiveError> {
    let raw = raw.trim();
    let max = spec.required_arguments + spec.optional_arguments;
    if raw.is_empty() {
        if spec.required_arguments > 0 {
            return Err(DirectiveError::invalid(format!(
                "{} argument(s) required, 0 supplied",
                spec.required_arguments
            )));
        }
        return Ok(Vec::new());
    }

    let words: Vec<&str> = raw.split_whitespace().collect();
    let arguments = if words.len() > max {
        if !spec.final_argument_whitespace || max == 0 {
            return Err(DirectiveError::invalid(format!(
                "maximum {} argument(s) allowed, {} supplied",
                max,
                words.len()
            )));
        }
        let mut arguments: Vec<String> = raw
            .splitn(max, char::is_whitespace)
            .map(|s| s.trim().to_string())
            .collect();
        // splitn keeps runs of whitespace in the remainder
        if let Some(last) = arguments.last_mut() {
            *last = last.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        arguments
    } else {
        words.iter().map(|w| w.to_string()).collect()
    };

    if arguments.len() < spec.required_arguments {
        return Err(DirectiveError::invalid(format!(
            "{} argument(s) required, {} supplied",
            spec.required_arguments,
            arguments.len()
        )));
    }
    Ok(arguments)
}

/// Convert a raw option value according to its kind
pub fn convert_option(name: &str, value: &str, kind: OptionKind) -> Result<OptionValue, DirectiveError> {
    let value = value.trim();
    match kind {
        OptionKind::Flag if value.is_empty() => Ok(OptionValue::Flag),
        OptionKind::Flag => Err(DirectiveError::invalid(format!(
            "option '{}': no argument is allowed; \"{}\" supplied",
            name, value
        ))),
        OptionKind::Unchanged => Ok(OptionValue::Text(value.to_string())),
        OptionKind::PositiveInt => match value.parse::<usize>() {
            Ok(n) if n > 0 => Ok(OptionValue::Int(n)),
            _ => Err(DirectiveError::invalid(format!(
                "option '{}': positive integer expected, got \"{}\"",
                name, value
            ))),
        },
        OptionKind::Choice(choices) => {
            let lowered = value.to_lowercase();
            if choices.contains(&lowered.as_str()) {
                Ok(OptionValue::Text(lowered))
            } else {
                Err(DirectiveError::Invalid {
                    message: format!(
                        "option '{}': \"{}\" unknown; choose from {}",
                        name,
                        value,
                        choices.join(", ")
                    ),
                    suggestion: closest_match(&lowered, choices.iter().copied())
                        .map(|c| format!("Did you mean '{}'?", c)),
                })
            }
        }
    }
}

/// Check arguments, options and content of `call` against `spec`
pub fn validate_call<'c>(
    call: &'c DirectiveCall,
    spec: &DirectiveSpec,
) -> Result<DirectiveInput<'c>, DirectiveError> {
    let arguments = split_arguments(&call.arguments, spec)?;

    let mut options = IndexMap::new();
    for (name, value) in &call.options {
        let kind = spec.option_kind(name).ok_or_else(|| DirectiveError::Invalid {
            message: format!("unknown option: \"{}\"", name),
            suggestion: closest_match(name, spec.option_spec.iter().map(|(o, _)| *o))
                .map(|c| format!("Did you mean '{}'?", c)),
        })?;
        options.insert(name.clone(), convert_option(name, value, kind)?);
    }

    if !spec.has_content && call.has_content() {
        return Err(DirectiveError::invalid(format!(
            "no content permitted in \"{}\" directive",
            call.name
        )));
    }

    Ok(DirectiveInput {
        call,
        arguments,
        options,
    })
}

/// The candidate closest to `name` by edit distance, if it is close enough
/// to be a plausible typo.
pub fn closest_match<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let limit = (name.chars().count() / 3).max(1);
    candidates
        .map(|candidate| (edit_distance(name, candidate), candidate))
        .filter(|(distance, candidate)| {
            *distance <= limit || candidate.contains(name) || name.contains(candidate)
        })
        .min_by_key(|(distance, candidate)| (*distance, *candidate))
        .map(|(_, candidate)| candidate)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}
