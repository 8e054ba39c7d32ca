//! Message constructors must never panic: valid parameters yield a
//! renderable message, invalid parameters yield a typed error.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nexus_crypto::SecretKey;
use nexus_proto::{Credit, ExtendedSmallMessage, FullMessage, FullMessageWipeFlags, SmallMessage};

#[derive(Arbitrary, Debug)]
struct Input {
    id: u32,
    hours: u32,
    days: u16,
    key: [u8; 16],
}

fuzz_target!(|input: Input| {
    let key = SecretKey::new(input.key);
    let credit = if input.days == u16::MAX { Credit::Unlock } else { Credit::Days(input.days) };

    if let Ok(msg) = FullMessage::add_credit(input.id, input.hours, &key) {
        let _ = msg.to_keycode();
    }
    if let Ok(msg) = FullMessage::set_credit(input.id, input.hours, &key) {
        let _ = msg.to_keycode();
    }
    let _ = FullMessage::unlock(input.id, &key).to_keycode();
    let _ = FullMessage::wipe_state(input.id, FullMessageWipeFlags::TargetFlags1, &key).to_keycode();

    if let Ok(msg) = SmallMessage::add_credit(input.id, credit, &key) {
        let _ = msg.to_keycode();
    }
    if let Ok(msg) = SmallMessage::set_credit(input.id, credit, &key) {
        let _ = msg.to_keycode();
    }

    // keep the window scan bounded so the fuzzer stays fast
    if let Ok(msg) = ExtendedSmallMessage::set_credit_wipe_restricted_flag(
        input.id & 0xFFFF,
        credit,
        &key,
    ) {
        assert!(msg.final_id() >= input.id & 0xFFFF);
        let _ = msg.to_keycode();
    }
});
