#![no_main]

use libfuzzer_sys::fuzz_target;
use savelite_codec::Codec;
use savelite_core::{CompressionMethod, EncryptionMethod};

fuzz_target!(|data: &[u8]| {
    // Limit input size to prevent timeout
    if data.len() > 1_000_000 {
        return;
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Decoding arbitrary stored text should never panic
    let _ = Codec::plain().decode(text);

    if let Ok(codec) = Codec::new(CompressionMethod::GZip, EncryptionMethod::None, None, 1) {
        let _ = codec.decode(text);
    }

    if let Ok(codec) = Codec::new(CompressionMethod::GZip, EncryptionMethod::Aes, Some("fuzz"), 1) {
        let _ = codec.decode(text);
    }
});
