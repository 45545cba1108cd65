#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use savelite_codec::Codec;
use savelite_core::{CompressionMethod, EncryptionMethod};

#[derive(Arbitrary, Debug)]
struct PipelineInput {
    compress: bool,
    encrypt: bool,
    passphrase: String,
    text: String,
}

fuzz_target!(|input: PipelineInput| {
    if input.text.len() > 100_000 || input.passphrase.is_empty() {
        return;
    }

    let compression = if input.compress {
        CompressionMethod::GZip
    } else {
        CompressionMethod::None
    };
    let encryption = if input.encrypt {
        EncryptionMethod::Aes
    } else {
        EncryptionMethod::None
    };

    let Ok(codec) = Codec::new(compression, encryption, Some(&input.passphrase), 1) else {
        return;
    };

    let stored = codec.encode(&input.text).expect("encode must succeed");
    let decoded = codec.decode(&stored).expect("decode of own output must succeed");
    assert_eq!(decoded, input.text);
});
