/// Appends `raw` to `out`, escaping the five XML-reserved characters.
///
/// C0 control characters other than tab, LF and CR cannot appear in an XML
/// 1.0 document at all and are dropped.
///
/// Call exactly once, when the text lands in the output buffer. Escaping is
/// not idempotent: `&amp;` would become `&amp;amp;`.
pub fn push_escaped(out: &mut String, raw: &str) {
    out.reserve(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            control if control < '\u{20}' => {}
            other => out.push(other),
        }
    }
}

pub fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    push_escaped(&mut escaped, raw);
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(
            escape_xml(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&apos;s&lt;/a&gt;"
        );
    }

    #[test]
    fn leaves_plain_and_accented_text_alone() {
        assert_eq!(escape_xml("Apartamento em São Paulo"), "Apartamento em São Paulo");
    }

    #[test]
    fn drops_characters_xml_cannot_carry() {
        assert_eq!(
            escape_xml("Sala\u{0c} ampla\u{0}\u{1b}\tcom\r\nvista"),
            "Sala ampla\tcom\r\nvista"
        );
    }

    #[test]
    fn escaping_twice_changes_the_text() {
        let once = escape_xml("a & b");
        assert_ne!(escape_xml(&once), once);
    }
}
