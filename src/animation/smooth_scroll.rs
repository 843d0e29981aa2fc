//! フレーム駆動の2次 ease-in-out スムーズスクロール

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use log::trace;

use crate::engine::host::{millis, FrameHost, Millis, WindowHost};

use super::easing::ease_in_out_quad;

struct ScrollRun {
    frames: Rc<dyn FrameHost>,
    window: Rc<dyn WindowHost>,
    from: f64,
    distance: f64,
    duration: Millis,
    started_at: Cell<Option<Millis>>,
}

impl ScrollRun {
    fn schedule(self: Rc<Self>) {
        let frames = Rc::clone(&self.frames);
        frames.request_frame(Box::new(move |timestamp| self.step(timestamp)));
    }

    fn step(self: Rc<Self>, timestamp: Millis) {
        let started_at = self.started_at.get().unwrap_or(timestamp);
        self.started_at.set(Some(started_at));
        let elapsed = timestamp - started_at;
        let y = ease_in_out_quad(elapsed, self.from, self.distance, self.duration);
        self.window.scroll_to(y as f32);
        if elapsed < self.duration {
            self.schedule();
        }
    }
}

/// ドキュメント上の `target_y` が高さ `header_offset` の固定ヘッダーのすぐ下に
/// 来るようにウィンドウをスクロールする。行き先はスクロール可能な範囲に収める。
pub fn smooth_scroll_to(
    frames: Rc<dyn FrameHost>,
    window: Rc<dyn WindowHost>,
    target_y: f32,
    header_offset: f32,
    duration: Duration,
) {
    let viewport = window.viewport();
    let max_scroll = (window.document_height() - viewport.height).max(0.0);
    let destination = (target_y - header_offset).clamp(0.0, max_scroll);
    let from = viewport.scroll_y as f64;
    trace!("smooth scroll {} -> {}", from, destination);

    let run = Rc::new(ScrollRun {
        frames,
        window,
        from,
        distance: destination as f64 - from,
        duration: millis(duration),
        started_at: Cell::new(None),
    });
    run.schedule();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scheduler::Scheduler;
    use crate::ui::viewport::Viewport;
    use crate::ui::window::VirtualWindow;

    #[test]
    fn test_scroll_reaches_destination_below_header() {
        let scheduler = Rc::new(Scheduler::new());
        let window = Rc::new(VirtualWindow::new(Viewport::new(1280.0, 800.0), 5000.0));

        smooth_scroll_to(
            scheduler.clone(),
            window.clone(),
            1070.0,
            70.0,
            Duration::from_millis(800),
        );
        scheduler.advance(400.0);
        let midway = window.viewport().scroll_y;
        assert!(midway > 0.0 && midway < 1000.0);

        scheduler.advance(1000.0);
        assert_eq!(window.viewport().scroll_y, 1000.0);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_scroll_to_top_clamps_at_zero() {
        let scheduler = Rc::new(Scheduler::new());
        let window = Rc::new(VirtualWindow::new(Viewport::new(1280.0, 800.0), 5000.0));
        window.scroll_to(2000.0);

        smooth_scroll_to(scheduler.clone(), window.clone(), 0.0, 70.0, Duration::from_millis(800));
        scheduler.advance(2000.0);
        assert_eq!(window.viewport().scroll_y, 0.0);
    }
}
