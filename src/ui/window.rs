use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::engine::host::{ListenerId, WindowHost};

use super::viewport::Viewport;

#[derive(Clone, Copy, PartialEq)]
enum ListenerKind {
    Scroll,
    Resize,
}

/// メモリ上のブラウザウィンドウ。スクロールはドキュメント内に収め、
/// スクロールリスナーへ同期的に通知する（実際の `scroll` イベントなら次のタスク）。
pub struct VirtualWindow {
    viewport: Cell<Viewport>,
    document_height: Cell<f32>,
    listeners: RefCell<Vec<(ListenerId, ListenerKind, Rc<dyn Fn()>)>>,
    next_listener: Cell<u64>,
}

impl VirtualWindow {
    pub fn new(viewport: Viewport, document_height: f32) -> Self {
        Self {
            viewport: Cell::new(viewport),
            document_height: Cell::new(document_height),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
        }
    }

    /// 到達できる最大のスクロール位置
    pub fn max_scroll(&self) -> f32 {
        (self.document_height.get() - self.viewport.get().height).max(0.0)
    }

    pub fn resize(&self, width: f32, height: f32) {
        let viewport = self.viewport.get();
        self.viewport.set(Viewport {
            width,
            height,
            ..viewport
        });
        self.clamp_scroll();
        self.emit(ListenerKind::Resize);
    }

    pub fn set_document_height(&self, height: f32) {
        self.document_height.set(height);
        self.clamp_scroll();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn clamp_scroll(&self) {
        let viewport = self.viewport.get();
        let clamped = viewport.scroll_y.clamp(0.0, self.max_scroll());
        self.viewport.set(viewport.scrolled_to(clamped));
    }

    fn add(&self, kind: ListenerKind, listener: Rc<dyn Fn()>) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, kind, listener));
        id
    }

    fn emit(&self, kind: ListenerKind) {
        let targets: Vec<Rc<dyn Fn()>> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, l)| Rc::clone(l))
            .collect();
        for listener in targets {
            listener();
        }
    }
}

impl WindowHost for VirtualWindow {
    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn document_height(&self) -> f32 {
        self.document_height.get()
    }

    fn scroll_to(&self, y: f32) {
        let viewport = self.viewport.get();
        let clamped = y.clamp(0.0, self.max_scroll());
        if clamped == viewport.scroll_y {
            return;
        }
        self.viewport.set(viewport.scrolled_to(clamped));
        self.emit(ListenerKind::Scroll);
    }

    fn add_scroll_listener(&self, listener: Rc<dyn Fn()>) -> ListenerId {
        self.add(ListenerKind::Scroll, listener)
    }

    fn add_resize_listener(&self, listener: Rc<dyn Fn()>) -> ListenerId {
        self.add(ListenerKind::Resize, listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(lid, _, _)| *lid != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_clamps_and_notifies_once_per_change() {
        let window = VirtualWindow::new(Viewport::new(1000.0, 800.0), 3000.0);
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        window.add_scroll_listener(Rc::new(move || counter.set(counter.get() + 1)));

        window.scroll_to(5000.0);
        assert_eq!(window.viewport().scroll_y, 2200.0);
        window.scroll_to(5000.0);
        window.scroll_to(-10.0);
        assert_eq!(window.viewport().scroll_y, 0.0);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_removed_listener_is_silent() {
        let window = VirtualWindow::new(Viewport::new(1000.0, 800.0), 3000.0);
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let id = window.add_resize_listener(Rc::new(move || counter.set(counter.get() + 1)));

        window.resize(500.0, 800.0);
        window.remove_listener(id);
        window.resize(1200.0, 800.0);

        assert_eq!(hits.get(), 1);
        assert_eq!(window.listener_count(), 0);
        assert_eq!(window.viewport().width, 1200.0);
    }
}
