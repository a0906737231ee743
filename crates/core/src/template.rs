use crate::error::TemplateError;

/// Splice bindings into a user-supplied SQL fragment.
///
/// `${name}` resolves by name against the binding pairs; a bare `$1`, `$2`,
/// ... resolves positionally against the same pairs (1-based). `$$` is a
/// literal `$`. A template uses one style; the bindings serve either.
///
/// Single pass: the output is never re-scanned, and there is no nested
/// expansion.
pub fn substitute(template: &str, bindings: &[(&str, &str)]) -> Result<String, TemplateError> {
    let chars = template.char_indices().collect::<Vec<_>>();
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0usize;

    while cursor < chars.len() {
        let (position, ch) = chars[cursor];
        if ch != '$' {
            out.push(ch);
            cursor += 1;
            continue;
        }

        match chars.get(cursor + 1) {
            Some((_, '$')) => {
                out.push('$');
                cursor += 2;
            }
            Some((_, '{')) => {
                let mut name = String::new();
                let mut scan = cursor + 2;
                loop {
                    match chars.get(scan) {
                        Some((_, '}')) => break,
                        Some((_, inner)) => {
                            name.push(*inner);
                            scan += 1;
                        }
                        None => return Err(TemplateError::MalformedTemplate { position }),
                    }
                }
                out.push_str(resolve(&name, bindings)?);
                cursor = scan + 1;
            }
            Some((_, digit)) if digit.is_ascii_digit() => {
                let mut name = String::new();
                let mut scan = cursor + 1;
                while let Some((_, digit)) = chars.get(scan) {
                    if !digit.is_ascii_digit() {
                        break;
                    }
                    name.push(*digit);
                    scan += 1;
                }
                out.push_str(resolve(&name, bindings)?);
                cursor = scan;
            }
            _ => return Err(TemplateError::MalformedTemplate { position }),
        }
    }

    Ok(out)
}

fn resolve<'a>(
    name: &str,
    bindings: &[(&str, &'a str)],
) -> Result<&'a str, TemplateError> {
    let undefined = || TemplateError::UndefinedPlaceholder(name.to_string());

    if !name.is_empty() && name.bytes().all(|byte| byte.is_ascii_digit()) {
        let ordinal: usize = name.parse().map_err(|_| undefined())?;
        let index = ordinal.checked_sub(1).ok_or_else(undefined)?;
        return bindings
            .get(index)
            .map(|(_, value)| *value)
            .ok_or_else(undefined);
    }

    bindings
        .iter()
        .find(|(binding, _)| *binding == name)
        .map(|(_, value)| *value)
        .ok_or_else(undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_and_positional_share_bindings() {
        let bindings = [("key", "locks"), ("table", "child")];
        assert_eq!(
            substitute("SELECT * FROM ${key} -- ${table}", &bindings).unwrap(),
            "SELECT * FROM locks -- child",
        );
        assert_eq!(
            substitute("SELECT * FROM $1 -- $2", &bindings).unwrap(),
            "SELECT * FROM locks -- child",
        );
    }

    #[test]
    fn dollar_escapes_to_literal_dollar() {
        assert_eq!(substitute("$$", &[]).unwrap(), "$");
        assert_eq!(substitute("a$$b$$", &[]).unwrap(), "a$b$");
    }

    #[test]
    fn unknown_placeholder_is_a_hard_error() {
        assert_eq!(
            substitute("${missing}", &[]),
            Err(TemplateError::UndefinedPlaceholder("missing".to_string())),
        );
        assert_eq!(
            substitute("$3", &[("key", "x")]),
            Err(TemplateError::UndefinedPlaceholder("3".to_string())),
        );
    }

    #[test]
    fn malformed_placeholders_report_the_dollar_position() {
        assert_eq!(
            substitute("ab $x", &[]),
            Err(TemplateError::MalformedTemplate { position: 3 }),
        );
        assert_eq!(
            substitute("${open", &[]),
            Err(TemplateError::MalformedTemplate { position: 0 }),
        );
        assert_eq!(
            substitute("end$", &[]),
            Err(TemplateError::MalformedTemplate { position: 3 }),
        );
    }
}
