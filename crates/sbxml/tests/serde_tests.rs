#![cfg(feature = "serde")]

use sbxml::{parse_document, XmlAttributes, XmlDocument, XmlNode};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_attributes_serialize_as_sequence() -> TestResult {
    let mut attrs = XmlAttributes::new();
    attrs.add("id", "c")?;
    attrs.add_qualified("resource", "urn:x", "urn:rdf", "rdf")?;

    let json = serde_json::to_value(&attrs)?;
    assert!(json.is_array());
    assert_eq!(json.as_array().map(Vec::len), Some(2));

    let back: XmlAttributes = serde_json::from_value(json)?;
    assert_eq!(back, attrs);
    Ok(())
}

#[test]
fn test_empty_attribute_name_rejected_on_deserialize() {
    let json = r#"[{"triple":{"name":"","uri":"","prefix":""},"value":"v"}]"#;
    assert!(serde_json::from_str::<XmlAttributes>(json).is_err());
}

#[test]
fn test_document_serde_round_trip() -> TestResult {
    let doc = parse_document(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <sbml xmlns=\"http://www.sbml.org/sbml/level3/version1/core\" level=\"3\">\
         <model id=\"m1\"><notes>text</notes><listOfSpecies><species id=\"S\"/></listOfSpecies></model>\
         </sbml>",
    )?;

    let json = serde_json::to_string(&doc)?;
    let back: XmlDocument = serde_json::from_str(&json)?;
    assert_eq!(back.encoding.as_deref(), Some("UTF-8"));
    assert!(back.root.equals(&doc.root, false));

    let node_json = serde_json::to_string(&doc.root)?;
    let node: XmlNode = serde_json::from_str(&node_json)?;
    assert_eq!(node.to_xml_string(), doc.root.to_xml_string());
    Ok(())
}
