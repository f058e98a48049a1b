//! Entity decoding, character escaping and attribute number formatting

use std::borrow::Cow;

/// Significant digits used for double-valued attributes
pub const DOUBLE_PRECISION: usize = 15;

const PREDEFINED_ENTITIES: [(&str, char); 5] = [
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
];

/// Length of the entity or character reference starting at `input[0] == '&'`
///
/// Recognizes the five predefined entities and well-formed decimal or
/// hexadecimal character references. Anything else yields `None`.
pub fn reference_len(input: &str) -> Option<usize> {
    let body = input.strip_prefix('&')?;
    let end = body.find(';')?;
    let name = body.get(..end)?;

    let known = PREDEFINED_ENTITIES.iter().any(|(entity, _)| *entity == name)
        || decode_char_reference(name).is_some();
    // '&' + name + ';'
    known.then_some(end + 2)
}

/// Escape character data, passing existing references through unchanged
///
/// A carriage return is written as `&#13;` since readers fold a literal one
/// into a line feed.
pub fn escape(input: &str) -> Cow<'_, str> {
    escape_with(input, false)
}

/// Escape an attribute value
///
/// Tab, line feed and carriage return become character references because
/// attribute-value normalization turns the literal characters into spaces.
pub fn escape_attribute(input: &str) -> Cow<'_, str> {
    escape_with(input, true)
}

fn escape_with(input: &str, attribute: bool) -> Cow<'_, str> {
    let needs_escape = |ch: char| {
        matches!(ch, '&' | '<' | '>' | '"' | '\'' | '\r') || (attribute && matches!(ch, '\t' | '\n'))
    };
    if !input.contains(needs_escape) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    for (i, ch) in input.char_indices() {
        match ch {
            '&' => {
                let rest = input.get(i..).unwrap_or_default();
                if reference_len(rest).is_some() {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\r' => out.push_str("&#13;"),
            '\t' if attribute => out.push_str("&#9;"),
            '\n' if attribute => out.push_str("&#10;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Decode entity and character references
///
/// On failure returns the name of the offending reference.
pub fn decode_entities(input: &str) -> Result<Cow<'_, str>, String> {
    if !input.contains('&') {
        return Ok(Cow::Borrowed(input));
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        result.push_str(rest.get(..amp).unwrap_or_default());
        let after = rest.get(amp + 1..).unwrap_or_default();
        let Some(end) = after.find(';') else {
            return Err(after.to_string());
        };
        let entity = after.get(..end).unwrap_or_default();

        let decoded = PREDEFINED_ENTITIES
            .iter()
            .find(|(name, _)| *name == entity)
            .map(|(_, ch)| *ch)
            .or_else(|| decode_char_reference(entity));

        match decoded {
            Some(ch) => result.push(ch),
            None => return Err(entity.to_string()),
        }
        rest = after.get(end + 1..).unwrap_or_default();
    }
    result.push_str(rest);

    Ok(Cow::Owned(result))
}

fn decode_char_reference(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x') {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()?
    } else {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

/// Format a double the way `%.15g` does, with `NaN`, `INF` and `-INF`
///
/// Rust float formatting never consults the process locale, so the output is
/// identical on every host.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.*e}", DOUBLE_PRECISION - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };

    let max_exponent = i32::try_from(DOUBLE_PRECISION).unwrap_or(15);
    if exponent < -4 || exponent >= max_exponent {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = usize::try_from(max_exponent - 1 - exponent).unwrap_or(0);
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain_text_is_borrowed() {
        assert!(matches!(escape("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_markup() {
        assert_eq!(escape("a < b & c > \"d\" 'e'"), "a &lt; b &amp; c &gt; &quot;d&quot; &apos;e&apos;");
    }

    #[test]
    fn test_escape_keeps_existing_references() {
        assert_eq!(escape("&amp;"), "&amp;");
        assert_eq!(escape("&lt;tag&gt;"), "&lt;tag&gt;");
        assert_eq!(escape("&#160; and &#xA0;"), "&#160; and &#xA0;");
        assert_eq!(escape("&nbsp;"), "&amp;nbsp;");
        assert_eq!(escape("&#xZZ;"), "&amp;#xZZ;");
        assert_eq!(escape("fish & chips;"), "fish &amp; chips;");
    }

    #[test]
    fn test_escape_whitespace_references() {
        assert_eq!(escape("line1\nline2\tx"), "line1\nline2\tx");
        assert_eq!(escape("a\rb"), "a&#13;b");
        assert_eq!(escape_attribute("line1\nline2\tx\r"), "line1&#10;line2&#9;x&#13;");
        assert_eq!(escape_attribute("a b"), "a b");
    }

    #[test]
    fn test_reference_len() {
        assert_eq!(reference_len("&amp; rest"), Some(5));
        assert_eq!(reference_len("&#x41;"), Some(6));
        assert_eq!(reference_len("&#;"), None);
        assert_eq!(reference_len("&"), None);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt; b").as_deref(), Ok("a < b"));
        assert_eq!(decode_entities("&#65;&#x42;").as_deref(), Ok("AB"));
        assert_eq!(decode_entities("&bogus;"), Err("bogus".to_string()));
        assert!(decode_entities("dangling &amp").is_err());
    }

    #[test]
    fn test_format_double_special_values() {
        assert_eq!(format_double(f64::NAN), "NaN");
        assert_eq!(format_double(f64::INFINITY), "INF");
        assert_eq!(format_double(f64::NEG_INFINITY), "-INF");
        assert_eq!(format_double(0.0), "0");
    }

    #[test]
    fn test_format_double_general_notation() {
        assert_eq!(format_double(1.0), "1");
        assert_eq!(format_double(0.1), "0.1");
        assert_eq!(format_double(-2.5), "-2.5");
        assert_eq!(format_double(1e-5), "1e-05");
        assert_eq!(format_double(0.0001), "0.0001");
        assert_eq!(format_double(6.02214179e23), "6.02214179e+23");
        assert_eq!(format_double(123456789012345.0), "123456789012345");
        assert_eq!(format_double(1234567890123456.0), "1.23456789012346e+15");
        assert_eq!(format_double(1.0 / 3.0), "0.333333333333333");
    }
}
