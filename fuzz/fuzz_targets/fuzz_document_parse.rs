#![no_main]

use libfuzzer_sys::fuzz_target;
use savelite_core::Document;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1_000_000 {
        return;
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Anything that parses must render and parse back
    if let Ok(document) = Document::from_json(text) {
        let rendered = document.to_json().expect("parsed document must render");
        let reparsed = Document::from_json(&rendered).expect("rendered document must parse");
        assert_eq!(document.len(), reparsed.len());
    }
});
