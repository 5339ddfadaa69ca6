//! SOAP envelope construction and response navigation
//!
//! Requests are small, flat documents built by string formatting. Responses
//! are parsed with `roxmltree` and navigated by element name inside the
//! service namespace.

use roxmltree::{Document, Node};

use crate::core::{ExportError, Result};

/// XML namespace of every service element
pub const API_NAMESPACE: &str = "http://www.zenfolio.com/api/1.8";

const SOAP_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Value of the `SOAPAction` header for a method
pub fn soap_action(method: &str) -> String {
    format!("{API_NAMESPACE}/{method}")
}

/// Build the request document for `method` with the given parameters in order
pub fn build_envelope(method: &str, fields: &[(&str, String)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "<zf:{name}>{}</zf:{name}>",
            html_escape::encode_text(value)
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"{SOAP_NAMESPACE}\" xmlns:zf=\"{API_NAMESPACE}\">\
         <soap:Body><zf:{method}>{body}</zf:{method}></soap:Body></soap:Envelope>"
    )
}

/// Parse a response body, attributing failures to `action`
pub fn parse<'i>(action: &str, body: &'i str) -> Result<Document<'i>> {
    Document::parse(body).map_err(|source| ExportError::MalformedResponse {
        action: action.to_string(),
        source,
    })
}

/// First element anywhere in the document with this service-namespace name
pub fn find<'a, 'i>(doc: &'a Document<'i>, name: &str) -> Option<Node<'a, 'i>> {
    doc.descendants().find(|n| is_named(n, name))
}

/// Like [`find`], but a missing element is an error
pub fn require<'a, 'i>(doc: &'a Document<'i>, action: &str, name: &str) -> Result<Node<'a, 'i>> {
    find(doc, name).ok_or_else(|| ExportError::MissingField {
        action: action.to_string(),
        field: name.to_string(),
    })
}

/// Direct child element with this name
pub fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| is_named(n, name))
}

/// Direct child elements with this name, in document order
pub fn children<'a, 'i: 'a>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(move |n| is_named(n, name))
}

/// Trimmed text of a direct child; `None` when absent or empty
pub fn child_text<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| text(n))
}

/// Trimmed text of an element; `None` when empty
pub fn text<'a, 'i>(node: Node<'a, 'i>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|t| !t.is_empty())
}

/// Parse a child's text as an integer id
pub fn child_id(node: Node<'_, '_>, name: &str) -> Option<i64> {
    child_text(node, name).and_then(|t| t.parse().ok())
}

fn is_named(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.has_tag_name((API_NAMESPACE, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_escapes_values_and_keeps_field_order() {
        let envelope = build_envelope(
            "LoadPhotoSetPhotos",
            &[
                ("photoSetId", "12".to_string()),
                ("startingIndex", "0".to_string()),
                ("numberOfPhotos", "10".to_string()),
            ],
        );

        assert!(envelope.contains(
            "<zf:LoadPhotoSetPhotos><zf:photoSetId>12</zf:photoSetId>\
             <zf:startingIndex>0</zf:startingIndex><zf:numberOfPhotos>10</zf:numberOfPhotos>"
        ));

        let escaped = build_envelope("GetChallenge", &[("loginName", "a&b<c".to_string())]);
        assert!(escaped.contains("<zf:loginName>a&amp;b&lt;c</zf:loginName>"));
        assert!(Document::parse(&escaped).is_ok());
    }

    #[test]
    fn soap_action_is_namespace_qualified() {
        assert_eq!(
            soap_action("AuthenticatePlain"),
            "http://www.zenfolio.com/api/1.8/AuthenticatePlain"
        );
    }

    #[test]
    fn navigation_matches_only_service_namespace() {
        let body = format!(
            r#"<soap:Envelope xmlns:soap="{SOAP_NAMESPACE}"><soap:Body>
                <LoadPhotoResponse xmlns="{API_NAMESPACE}"><LoadPhotoResult>
                  <Id>77</Id><Title>  Dawn  </Title><Caption/>
                  <Keywords><string>sky</string><string>sea</string></Keywords>
                </LoadPhotoResult></LoadPhotoResponse>
              </soap:Body></soap:Envelope>"#
        );
        let doc = parse("LoadPhoto", &body).unwrap();
        let photo = require(&doc, "LoadPhoto", "LoadPhotoResult").unwrap();

        assert_eq!(child_id(photo, "Id"), Some(77));
        assert_eq!(child_text(photo, "Title"), Some("Dawn"));
        assert_eq!(child_text(photo, "Caption"), None);
        let keywords = child(photo, "Keywords").unwrap();
        let words: Vec<_> = children(keywords, "string").filter_map(text).collect();
        assert_eq!(words, vec!["sky", "sea"]);
        assert!(find(&doc, "Body").is_none());
    }

    #[test]
    fn malformed_body_reports_action() {
        match parse("LoadGroupHierarchy", "<unclosed>") {
            Err(ExportError::MalformedResponse { action, .. }) => assert_eq!(action, "LoadGroupHierarchy"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
