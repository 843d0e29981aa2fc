pub mod counter;
pub mod easing;
pub mod floating;
pub mod reveal;
pub mod smooth_scroll;

pub use counter::{start_counter, CounterSpec};
pub use easing::{ease_in_out_quad, ease_out_quart};
pub use floating::{animate_floating, float_animation, golden_jitter};
pub use reveal::{RevealEngine, RevealKind, RevealTimings, TargetState};
pub use smooth_scroll::smooth_scroll_to;
