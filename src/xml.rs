//! Minimal attribute get/set over a single XML element.
//!
//! DBGP init packets are full XML documents, but the proxy only ever reads
//! or writes two attributes (`idekey`, `hostname`) on the root element and
//! injects a third (`proxied`). A full parser is not worth the weight; this
//! module treats the document as a prolog plus one opening tag plus the
//! remainder, and edits attributes on that tag in place.

use crate::error::{ProxyError, Result};

/// A parsed init (or similarly shaped) root element: the XML prolog and
/// anything before the tag, the tag name, its attributes in source order,
/// whether the tag self-closes with `/>`, and whatever text follows the tag
/// (usually nothing -- DBGP's `init` element is empty).
#[derive(Debug, Clone)]
pub struct Element {
    pub prolog: String,
    pub tag_name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    pub trailer: String,
}

impl Element {
    /// Parses `xml` into a prolog, the first element's tag, and a trailer.
    pub fn parse(xml: &str) -> Result<Self> {
        let tag_start = xml
            .find('<')
            .ok_or_else(|| ProxyError::Protocol("no element found in init packet".into()))?;

        // Skip an optional `<?xml ... ?>` prolog to find the root element.
        let (prolog, rest) = if xml[tag_start..].starts_with("<?") {
            let prolog_end = xml[tag_start..]
                .find("?>")
                .ok_or_else(|| ProxyError::Protocol("unterminated XML prolog".into()))?
                + tag_start
                + 2;
            (xml[..prolog_end].to_string(), &xml[prolog_end..])
        } else {
            (xml[..tag_start].to_string(), &xml[tag_start..])
        };

        let elem_start = rest
            .find('<')
            .ok_or_else(|| ProxyError::Protocol("no root element after prolog".into()))?;
        let elem_end = rest[elem_start..]
            .find('>')
            .ok_or_else(|| ProxyError::Protocol("unterminated root element tag".into()))?
            + elem_start
            + 1;

        let tag_body = &rest[elem_start + 1..elem_end - 1];
        let self_closing = tag_body.trim_end().ends_with('/');
        let tag_body = tag_body.trim_end().trim_end_matches('/').trim_end();

        let mut parts = tag_body.splitn(2, char::is_whitespace);
        let tag_name = parts
            .next()
            .ok_or_else(|| ProxyError::Protocol("root element has no name".into()))?
            .to_string();
        let attrs = parts.next().map(parse_attrs).unwrap_or_default();

        Ok(Element {
            prolog,
            tag_name,
            attrs,
            self_closing,
            trailer: rest[elem_end..].to_string(),
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets `name` to `value`, updating it in place if already present or
    /// appending it otherwise. Re-running with the same values is a no-op
    /// that reproduces byte-identical output.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.attrs.iter_mut().find(|(k, _)| k == name) {
            entry.1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }

    /// Serializes back to a full XML document: prolog, tag, trailer.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.prolog);
        out.push('<');
        out.push_str(&self.tag_name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(v);
            out.push('"');
        }
        if self.self_closing {
            out.push_str("/>");
        } else {
            out.push('>');
        }
        out.push_str(&self.trailer);
        out
    }
}

fn parse_attrs(body: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i == name_start {
            break;
        }
        let name = body[name_start..i].to_string();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            break;
        }
        i += 1; // '='
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || (bytes[i] != b'"' && bytes[i] != b'\'') {
            break;
        }
        let quote = bytes[i];
        i += 1;
        let value_start = i;
        while i < bytes.len() && bytes[i] != quote {
            i += 1;
        }
        let value = body[value_start..i].to_string();
        i += 1; // closing quote
        attrs.push((name, value));
    }
    attrs
}

/// Builds a `proxyerror` XML document carrying `message`, used to report a
/// protocol or routing failure back to the engine before the IDE is connected.
pub fn proxy_error_xml(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<proxyerror message=\"{}\"/>",
        escape_attr(message)
    )
}

pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_idekey_and_self_closing_tag() {
        let xml = r#"<?xml version="1.0"?><init idekey="alice" fileuri="file:///t.py"/>"#;
        let elem = Element::parse(xml).unwrap();
        assert_eq!(elem.tag_name, "init");
        assert_eq!(elem.attr("idekey"), Some("alice"));
        assert_eq!(elem.attr("fileuri"), Some("file:///t.py"));
        assert_eq!(elem.attr("hostname"), None);
    }

    #[test]
    fn set_attr_inserts_missing_hostname_and_proxied() {
        let xml = r#"<?xml version="1.0"?><init idekey="alice"/>"#;
        let mut elem = Element::parse(xml).unwrap();
        elem.set_attr("hostname", "10.0.0.5");
        elem.set_attr("proxied", "true");
        let out = elem.to_xml();
        assert!(out.contains(r#"hostname="10.0.0.5""#));
        assert!(out.contains(r#"proxied="true""#));
        assert!(out.contains(r#"idekey="alice""#));
    }

    #[test]
    fn rewrite_is_idempotent() {
        let xml = r#"<?xml version="1.0"?><init idekey="alice" hostname="10.0.0.5" proxied="true"/>"#;
        let mut elem = Element::parse(xml).unwrap();
        elem.set_attr("hostname", "10.0.0.5");
        elem.set_attr("proxied", "true");
        assert_eq!(elem.to_xml(), xml);
    }

    #[test]
    fn preserves_prolog_and_tag_name_verbatim() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?><init idekey="bob"/>"#;
        let elem = Element::parse(xml).unwrap();
        assert_eq!(elem.prolog, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        assert_eq!(elem.tag_name, "init");
    }

    #[test]
    fn missing_idekey_is_none_not_error() {
        let xml = r#"<init fileuri="file:///t.py"/>"#;
        let elem = Element::parse(xml).unwrap();
        assert_eq!(elem.attr("idekey"), None);
    }
}
