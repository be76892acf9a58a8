//! XML helpers shared by the SOAP codec and the description documents.

use quick_xml::events::BytesStart;

/// Collects the namespace declarations (`xmlns` / `xmlns:prefix`) of an element.
///
/// The default namespace is reported with an empty prefix.
#[must_use]
pub fn namespace_declarations(elem: &BytesStart) -> Vec<(String, String)> {
    elem.attributes()
        .flatten()
        .filter_map(|a| {
            let key = a.key.as_ref();
            let prefix = if key == b"xmlns" {
                String::new()
            } else {
                let rest = key.strip_prefix(b"xmlns:")?;
                String::from_utf8_lossy(rest).to_string()
            };
            Some((prefix, String::from_utf8_lossy(&a.value).to_string()))
        })
        .collect()
}

/// Splits a qualified element name into `(prefix, local_name)`.
///
/// Unprefixed names yield an empty prefix.
#[must_use]
pub fn split_qname(qname: &[u8]) -> (String, String) {
    match qname.iter().position(|&b| b == b':') {
        Some(idx) => (
            String::from_utf8_lossy(&qname[..idx]).to_string(),
            String::from_utf8_lossy(&qname[idx + 1..]).to_string(),
        ),
        None => (String::new(), String::from_utf8_lossy(qname).to_string()),
    }
}

/// Escapes XML special characters for embedding in XML content.
///
/// This escapes all five XML special characters as required by the XML spec:
/// - `&` → `&amp;`
/// - `<` → `&lt;`
/// - `>` → `&gt;`
/// - `"` → `&quot;`
/// - `'` → `&apos;`
///
/// Used for SOAP result values (notably DIDL-Lite metadata, which travels as
/// escaped text) and description document fields.
#[must_use]
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_xml_handles_all_special_chars() {
        assert_eq!(escape_xml("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(escape_xml("<DIDL-Lite>"), "&lt;DIDL-Lite&gt;");
        assert_eq!(escape_xml(r#"a="b" 'c'"#), "a=&quot;b&quot; &apos;c&apos;");
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn split_qname_handles_prefixed_and_bare_names() {
        assert_eq!(
            split_qname(b"u:Play"),
            ("u".to_string(), "Play".to_string())
        );
        assert_eq!(split_qname(b"Play"), (String::new(), "Play".to_string()));
    }

    #[test]
    fn namespace_declarations_include_default_namespace() {
        let elem = BytesStart::from_content(
            r#"Play xmlns="urn:a" xmlns:u="urn:b" other="x""#,
            4,
        );
        let decls = namespace_declarations(&elem);
        assert_eq!(
            decls,
            vec![
                (String::new(), "urn:a".to_string()),
                ("u".to_string(), "urn:b".to_string()),
            ]
        );
    }
}
