// ! SOAP 1.1 envelope assembly
// !
// ! Module composes the outgoing envelope from namespace declarations,
// ! header fragments and the marshalled body. Fragment content is not
// ! validated here; the marshaller and security strategies own well-formedness.

/// SOAP 1.1 envelope namespace, bound to the `soap` prefix
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.1 encoding namespace used by RPC/encoded operations
pub const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Encoding-style attribute placed on the envelope root for RPC/encoded calls
pub fn encoding_style_decl() -> String {
    format!(" soap:encodingStyle=\"{SOAP_ENCODING_NS}\"")
}

/// Assemble a SOAP envelope
///
/// `namespace_decls` and `encoding_style` are inserted verbatim into the root
/// start tag and are expected to carry their own leading space. Header
/// fragments are concatenated in the order given, with no separator.
pub fn assemble<S: AsRef<str>>(
    body_xml: &str,
    header_fragments: &[S],
    namespace_decls: &str,
    encoding_style: Option<&str>,
) -> String {
    let headers_len: usize = header_fragments.iter().map(|f| f.as_ref().len()).sum();
    let mut xml = String::with_capacity(body_xml.len() + headers_len + 192);

    xml.push_str("<soap:Envelope xmlns:soap=\"");
    xml.push_str(SOAP_ENVELOPE_NS);
    xml.push('"');
    xml.push_str(namespace_decls);
    if let Some(encoding) = encoding_style {
        xml.push_str(encoding);
    }
    xml.push('>');

    xml.push_str("<soap:Header>");
    for fragment in header_fragments {
        xml.push_str(fragment.as_ref());
    }
    xml.push_str("</soap:Header>");

    xml.push_str("<soap:Body>");
    xml.push_str(body_xml);
    xml.push_str("</soap:Body>");
    xml.push_str("</soap:Envelope>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_assemble_minimal_envelope() {
        let xml = assemble::<&str>("<ping/>", &[], "", None);
        assert_eq!(
            xml,
            "<soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">\
             <soap:Header></soap:Header><soap:Body><ping/></soap:Body></soap:Envelope>"
        );
    }

    #[test]
    fn test_header_fragments_keep_order() {
        let xml = assemble("<b/>", &["<S/>", "<C1/>", "<C2/>"], "", None);
        assert!(xml.contains("<soap:Header><S/><C1/><C2/></soap:Header>"));
    }

    #[test]
    fn test_namespace_and_encoding_decls() {
        let decl = encoding_style_decl();
        let xml = assemble::<String>(
            "<b/>",
            &[],
            " xmlns:tns=\"urn:stock\"",
            Some(decl.as_str()),
        );
        assert!(xml.starts_with(
            "<soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\" \
             xmlns:tns=\"urn:stock\" \
             soap:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">"
        ));
    }

    #[test]
    fn test_malformed_fragments_are_not_rejected() {
        let xml = assemble("<unclosed>", &["<broken"], "", None);
        assert!(xml.contains("<soap:Body><unclosed></soap:Body>"));
        assert!(xml.contains("<soap:Header><broken</soap:Header>"));
    }
}
