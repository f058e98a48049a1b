#![no_main]

use libfuzzer_sys::fuzz_target;
use sbxml::XmlNode;

// The writer passes existing references through, so decoded text that
// still spells one (`&amp;lt;` read as `&lt;`) cannot come back unchanged.
fn holds_literal_ampersand(node: &XmlNode) -> bool {
    node.characters().contains('&')
        || node.attributes().iter().any(|attr| attr.value.contains('&'))
        || node.namespaces().iter().any(|(uri, _)| uri.contains('&'))
        || node.children().iter().any(holds_literal_ampersand)
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // anything that parses must survive a write/reparse cycle
    if let Ok(node) = sbxml::parse_xml_str(text) {
        let written = node.to_xml_string();
        let reparsed = sbxml::parse_xml_str(&written);
        assert!(reparsed.is_ok(), "written tree failed to parse:\n{written}");
        if let Ok(reparsed) = reparsed {
            if !holds_literal_ampersand(&node) {
                assert!(reparsed.equals(&node, false), "round trip changed the tree:\n{written}");
            }
        }
    }
    let _ = sbxml::convert_string_to_node(text, None);
});
