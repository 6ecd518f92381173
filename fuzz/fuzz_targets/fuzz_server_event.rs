#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Frames arrive as text; anything else never reaches the decoder.
    if let Ok(frame) = std::str::from_utf8(data) {
        if let Ok(event) = edu_party_client::codec::decode(frame) {
            // A decoded event always names one of the known types.
            assert!(edu_party_client::ServerEvent::is_known_type(event.name()));
        }
    }
});
