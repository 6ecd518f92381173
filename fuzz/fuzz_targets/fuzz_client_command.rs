#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(command) = serde_json::from_slice::<edu_party_client::Command>(data) {
        // Anything that parses as a command must encode back to an equal one.
        let frame = edu_party_client::codec::encode(&command).unwrap();
        let again: edu_party_client::Command = serde_json::from_str(&frame).unwrap();
        assert_eq!(command, again);
    }
});
