pub mod interaction;
pub mod loading;
pub mod navigation;

pub use interaction::{BackToTop, DownloadButton, DOWNLOAD_RESTORED, DOWNLOAD_STARTED};
pub use loading::{LoadingScreen, LOADING_FADING, LOADING_GONE, LOADING_WAITING};
pub use navigation::{active_section, scroll_progress, NavElements, NavLink, Navigation, Section};
