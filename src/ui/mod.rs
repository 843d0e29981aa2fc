pub mod element;
pub mod observer;
pub mod viewport;
pub mod window;

pub use element::{Element, ElementSnapshot, MemoryElement};
pub use observer::{ObserverOptions, VirtualObserver};
pub use viewport::{
    intersection_ratio, is_element_in_viewport, meets_threshold, MarginLength, Rect, RootMargin,
    Viewport,
};
pub use window::VirtualWindow;
