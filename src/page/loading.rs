//! リソースの準備ができ、最小表示時間が過ぎるまで出しておくローディング画面

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, info};

use crate::config::LoadingConfig;
use crate::engine::host::{Millis, TimerHost};
use crate::engine::stages::{Stage, StageSequence};
use crate::ui::element::Element;

pub const LOADING_WAITING: &str = "waiting";
pub const LOADING_FADING: &str = "fading";
pub const LOADING_GONE: &str = "gone";

pub struct LoadingScreen {
    element: Option<Rc<dyn Element>>,
    timers: Rc<dyn TimerHost>,
    config: LoadingConfig,
    shown_at: Millis,
    sequence: RefCell<Option<StageSequence>>,
}

impl LoadingScreen {
    /// 呼び出した時点から表示中とみなす
    pub fn new(element: Option<Rc<dyn Element>>, timers: Rc<dyn TimerHost>, config: &LoadingConfig) -> Self {
        let shown_at = timers.now();
        Self {
            element,
            timers,
            config: config.clone(),
            shown_at,
            sequence: RefCell::new(None),
        }
    }

    /// 最小表示時間の残りを待ってからオーバーレイを隠し始める。
    /// 効果があるのは最初の呼び出しだけ
    pub fn resources_ready(&self) -> bool {
        let Some(element) = self.element.clone() else {
            debug!("loading: no overlay on this page");
            return false;
        };
        if self.sequence.borrow().is_some() {
            return false;
        }

        let elapsed = self.timers.now() - self.shown_at;
        let remaining = (self.config.min_display_ms as Millis - elapsed).max(0.0);
        info!("loading: resources ready after {}ms, hiding in {}ms", elapsed, remaining);

        let stages = vec![
            Stage::new(LOADING_WAITING, Duration::from_millis(remaining.ceil() as u64)),
            Stage::new(LOADING_FADING, Duration::from_millis(self.config.fade_out_ms)),
            Stage::new(LOADING_GONE, Duration::ZERO),
        ];
        let sequence = StageSequence::new(Rc::clone(&self.timers), stages, move |stage| match stage.name {
            LOADING_FADING => element.set_class("hidden", true),
            LOADING_GONE => element.set_style("display", "none"),
            _ => {}
        });
        sequence.start();
        *self.sequence.borrow_mut() = Some(sequence);
        true
    }

    pub fn stage(&self) -> Option<&'static str> {
        self.sequence.borrow().as_ref()?.current_stage()
    }

    /// オーバーレイがレイアウトから外れた
    pub fn is_gone(&self) -> bool {
        self.sequence
            .borrow()
            .as_ref()
            .is_some_and(|s| s.completed_runs() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scheduler::Scheduler;
    use crate::ui::element::MemoryElement;
    use crate::ui::viewport::Rect;

    fn overlay() -> Rc<MemoryElement> {
        Rc::new(MemoryElement::new("", Rect::default()))
    }

    #[test]
    fn test_fast_resources_wait_for_minimum_display() {
        let scheduler = Rc::new(Scheduler::new());
        let el = overlay();
        let screen = LoadingScreen::new(Some(el.clone()), scheduler.clone(), &LoadingConfig::default());

        scheduler.advance(200.0);
        assert!(screen.resources_ready());
        assert!(!screen.resources_ready());
        assert_eq!(screen.stage(), Some(LOADING_WAITING));

        scheduler.advance(1299.0);
        assert!(!el.has_class("hidden"));
        scheduler.advance(1.0);
        assert!(el.has_class("hidden"));
        assert_eq!(el.style("display"), None);

        scheduler.advance(500.0);
        assert_eq!(el.style("display").as_deref(), Some("none"));
        assert!(screen.is_gone());
    }

    #[test]
    fn test_fractional_remainder_never_shortens_minimum() {
        let scheduler = Rc::new(Scheduler::new());
        let el = overlay();
        let screen = LoadingScreen::new(Some(el.clone()), scheduler.clone(), &LoadingConfig::default());

        scheduler.advance(300.5);
        screen.resources_ready();
        scheduler.advance(1199.0);
        assert!(!el.has_class("hidden"));
        scheduler.advance(1.0);
        assert!(el.has_class("hidden"));
    }

    #[test]
    fn test_slow_resources_hide_immediately() {
        let scheduler = Rc::new(Scheduler::new());
        let el = overlay();
        let screen = LoadingScreen::new(Some(el.clone()), scheduler.clone(), &LoadingConfig::default());

        scheduler.advance(4000.0);
        screen.resources_ready();
        scheduler.advance(0.0);
        assert!(el.has_class("hidden"));
    }

    #[test]
    fn test_missing_overlay_is_noop() {
        let scheduler = Rc::new(Scheduler::new());
        let screen = LoadingScreen::new(None, scheduler.clone(), &LoadingConfig::default());
        assert!(!screen.resources_ready());
        assert!(!screen.is_gone());
        assert!(scheduler.is_idle());
    }
}
