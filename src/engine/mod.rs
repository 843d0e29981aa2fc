pub mod host;
pub mod rate_limit;
pub mod scheduler;
pub mod stages;

pub use host::{
    Hosts, Intersection, IntersectionHost, IntersectionSink, ListenerId, Millis, TargetId,
    TimerHandle, TimerHost, FrameHost, WindowHost,
};
pub use rate_limit::{debounce, debounce_immediate, throttle, Debounced, Throttled, TimerState};
pub use scheduler::Scheduler;
pub use stages::{Stage, StageSequence};
