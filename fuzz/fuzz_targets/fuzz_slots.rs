#![no_main]

use libfuzzer_sys::fuzz_target;
use shlink_linker::find_available_slots;

fn span_is_free(used: u32, base: u32, needed: u32) -> bool {
    (base..base + needed).all(|bit| used & (1 << bit) == 0)
}

fuzz_target!(|data: &[u8]| {
    let Some((bytes, rest)) = data.split_first_chunk::<4>() else {
        return;
    };
    let used = u32::from_le_bytes(*bytes);
    let needed = rest.first().copied().unwrap_or(1) as u32 % 40;

    match find_available_slots(used, needed) {
        Some(base) => {
            // The first free span that fits.
            assert!(needed >= 1 && base + needed <= 32);
            assert!(span_is_free(used, base, needed));
            assert!((0..base).all(|lower| !span_is_free(used, lower, needed)));
        }
        None => {
            if (1..=32).contains(&needed) {
                assert!((0..=32 - needed).all(|base| !span_is_free(used, base, needed)));
            }
        }
    }
});
