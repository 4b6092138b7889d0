//! ABI layer for `STBTT_assert`.

use std::ffi::c_int;

use stbtt_bridge_core::check::AssertVerdict;
use stbtt_bridge_membrane::LogLevel;
use stbtt_bridge_membrane::events::{self, BridgeEvent};
use stbtt_bridge_membrane::metrics::{BridgeMetrics, global_metrics};

abi_fn! {
    /// `void stb_zig_assert(int expression)`.
    ///
    /// Returns when `expression` is non-zero. Otherwise emits a fatal event and
    /// aborts the process; there is no recovery path and no mode disables it.
    fn stb_zig_assert(expression: c_int) {
        if !AssertVerdict::from_expression(expression).is_fatal() {
            BridgeMetrics::inc(&global_metrics().assert_passes);
            return;
        }
        events::emit(
            BridgeEvent::new(LogLevel::Fatal, "assertion_failed", "stb_zig_assert")
                .with_details(serde_json::json!({ "expression": expression })),
        );
        std::process::abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_expressions_return() {
        let before = global_metrics().snapshot().assert_passes;
        // SAFETY: non-zero expressions never abort.
        unsafe {
            stb_zig_assert(1);
            stb_zig_assert(-7);
        }
        assert!(global_metrics().snapshot().assert_passes >= before + 2);
    }
}
