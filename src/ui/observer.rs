//! `IntersectionObserver` の決定的な代替
//!
//! ビューポートが変わった可能性があるとき（スクロール、リサイズ、登録直後）に
//! ホストが [`VirtualObserver::check`] を呼ぶ。`observe` 後の最初のチェックは
//! 必ずターゲットを通知し、以降は交差状態が反転したターゲットだけを通知する。

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use crate::engine::host::{Intersection, IntersectionHost, IntersectionSink, TargetId};

use super::element::Element;
use super::viewport::{intersection_ratio, meets_threshold, RootMargin, Viewport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    pub threshold: f32,
    pub root_margin: RootMargin,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            root_margin: RootMargin::default(),
        }
    }
}

struct Watched {
    target: TargetId,
    element: Rc<dyn Element>,
    last: Option<bool>,
}

pub struct VirtualObserver {
    options: ObserverOptions,
    watched: RefCell<Vec<Watched>>,
    sink: RefCell<Option<IntersectionSink>>,
}

impl VirtualObserver {
    pub fn new(options: ObserverOptions) -> Self {
        Self {
            options,
            watched: RefCell::new(Vec::new()),
            sink: RefCell::new(None),
        }
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    pub fn observed_count(&self) -> usize {
        self.watched.borrow().len()
    }

    pub fn is_observing(&self, target: TargetId) -> bool {
        self.watched.borrow().iter().any(|w| w.target == target)
    }

    /// `viewport` に対する通知を計算し、接続済みのシンクに渡してから返す
    pub fn check(&self, viewport: &Viewport) -> Vec<Intersection> {
        let root = viewport.root_rect(&self.options.root_margin);
        let entries: Vec<Intersection> = {
            let mut watched = self.watched.borrow_mut();
            watched
                .iter_mut()
                .filter_map(|w| {
                    let client = viewport.client_rect(w.element.layout_rect());
                    let ratio = intersection_ratio(client, root);
                    let is_intersecting = meets_threshold(ratio, self.options.threshold);
                    if w.last == Some(is_intersecting) {
                        return None;
                    }
                    w.last = Some(is_intersecting);
                    Some(Intersection {
                        target: w.target,
                        is_intersecting,
                        ratio,
                    })
                })
                .collect()
        };

        if entries.is_empty() {
            return entries;
        }
        trace!("observer: {} notifications", entries.len());

        let sink = self.sink.borrow().clone();
        if let Some(sink) = sink {
            sink(&entries);
        }
        entries
    }
}

impl IntersectionHost for VirtualObserver {
    fn connect(&self, sink: IntersectionSink) {
        *self.sink.borrow_mut() = Some(sink);
    }

    fn observe(&self, target: TargetId, element: Rc<dyn Element>) {
        let mut watched = self.watched.borrow_mut();
        if watched.iter().any(|w| w.target == target) {
            return;
        }
        watched.push(Watched {
            target,
            element,
            last: None,
        });
    }

    fn unobserve(&self, target: TargetId) {
        self.watched.borrow_mut().retain(|w| w.target != target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::element::MemoryElement;
    use crate::ui::viewport::Rect;
    use std::cell::Cell;

    fn observer() -> VirtualObserver {
        VirtualObserver::new(ObserverOptions {
            threshold: 0.1,
            root_margin: "0px 0px -50px 0px".parse().unwrap(),
        })
    }

    #[test]
    fn test_first_check_reports_everything() {
        let obs = observer();
        obs.observe(TargetId(1), Rc::new(MemoryElement::new("", Rect::new(0.0, 100.0, 100.0, 100.0))));
        obs.observe(TargetId(2), Rc::new(MemoryElement::new("", Rect::new(0.0, 3000.0, 100.0, 100.0))));

        let entries = obs.check(&Viewport::new(1000.0, 800.0));
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_intersecting);
        assert!(!entries[1].is_intersecting);

        // 変化なし
        assert!(obs.check(&Viewport::new(1000.0, 800.0)).is_empty());
    }

    #[test]
    fn test_negative_bottom_margin_delays_trigger() {
        let obs = observer();
        // 要素の 40px が画面内だが、すべて 50px のマージン内
        obs.observe(TargetId(1), Rc::new(MemoryElement::new("", Rect::new(0.0, 760.0, 100.0, 100.0))));
        let entries = obs.check(&Viewport::new(1000.0, 800.0));
        assert!(!entries[0].is_intersecting);

        let entries = obs.check(&Viewport::new(1000.0, 800.0).scrolled_to(100.0));
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_intersecting);
    }

    #[test]
    fn test_sink_receives_batches_and_unobserve_stops_reports() {
        let obs = observer();
        let delivered = Rc::new(Cell::new(0usize));
        let count = delivered.clone();
        obs.connect(Rc::new(move |entries: &[Intersection]| {
            count.set(count.get() + entries.len())
        }));

        obs.observe(TargetId(7), Rc::new(MemoryElement::new("", Rect::new(0.0, 0.0, 10.0, 10.0))));
        obs.check(&Viewport::new(100.0, 100.0));
        assert_eq!(delivered.get(), 1);

        obs.unobserve(TargetId(7));
        assert!(!obs.is_observing(TargetId(7)));
        obs.check(&Viewport::new(100.0, 100.0).scrolled_to(500.0));
        assert_eq!(delivered.get(), 1);
    }
}
