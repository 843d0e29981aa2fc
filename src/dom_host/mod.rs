// ========================================
// ブラウザホスト
// ========================================
//
// ホストトレイトを `web-sys` に結び付ける: `setTimeout`、`requestAnimationFrame`、
// `IntersectionObserver`、`window` のスクロール/リサイズリスナー

pub mod page;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use js_sys::Array;
use log::{trace, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::engine::host::{
    FrameHost, Intersection, IntersectionHost, IntersectionSink, ListenerId, Millis, TargetId,
    TimerHandle, TimerHost, WindowHost,
};
use crate::error::{Result, SensoryError};
use crate::ui::element::Element;
use crate::ui::observer::ObserverOptions;
use crate::ui::viewport::{Rect, Viewport};

/// DOM ノードを [`TargetId`] に結び付ける属性
pub const TARGET_ID_ATTRIBUTE: &str = "data-sensorial-id";

fn js_error(context: &str, value: JsValue) -> SensoryError {
    SensoryError::Config(format!("{}: {:?}", context, value))
}

// ========================================
// 要素
// ========================================

pub struct DomElement {
    element: web_sys::HtmlElement,
}

impl DomElement {
    pub fn new(element: web_sys::HtmlElement) -> Self {
        Self { element }
    }

    pub fn node(&self) -> &web_sys::HtmlElement {
        &self.element
    }
}

impl Element for DomElement {
    fn id(&self) -> Option<String> {
        let id = self.element.id();
        (!id.is_empty()).then_some(id)
    }

    fn text(&self) -> String {
        self.element.text_content().unwrap_or_default()
    }

    fn set_text(&self, text: &str) {
        self.element.set_text_content(Some(text));
    }

    fn layout_rect(&self) -> Rect {
        let rect = self.element.get_bounding_client_rect();
        let (scroll_x, scroll_y) = web_sys::window()
            .map(|w| (w.scroll_x().unwrap_or(0.0), w.scroll_y().unwrap_or(0.0)))
            .unwrap_or((0.0, 0.0));
        Rect::new(
            (rect.left() + scroll_x) as f32,
            (rect.top() + scroll_y) as f32,
            rect.width() as f32,
            rect.height() as f32,
        )
    }

    fn has_class(&self, class: &str) -> bool {
        self.element.class_list().contains(class)
    }

    fn set_class(&self, class: &str, on: bool) {
        self.element.class_list().toggle_with_force(class, on).ok();
    }

    fn style(&self, property: &str) -> Option<String> {
        self.element
            .style()
            .get_property_value(property)
            .ok()
            .filter(|v| !v.is_empty())
    }

    fn set_style(&self, property: &str, value: &str) {
        let style = self.element.style();
        if value.is_empty() {
            style.remove_property(property).ok();
        } else {
            style.set_property(property, value).ok();
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.element.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.element.set_attribute(name, value).ok();
    }
}

// ========================================
// タイマーとフレーム
// ========================================

pub struct DomTimers {
    window: web_sys::Window,
}

impl DomTimers {
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }
}

impl TimerHost for DomTimers {
    fn now(&self) -> Millis {
        self.window.performance().map(|p| p.now()).unwrap_or(0.0)
    }

    fn after(&self, delay: Millis, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let closure = Closure::once_into_js(move || callback());
        let id = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.unchecked_ref(),
                delay.max(0.0).round() as i32,
            )
            .unwrap_or_else(|e| {
                warn!("setTimeout failed: {:?}", e);
                0
            });
        TimerHandle(id as u64)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.window.clear_timeout_with_handle(handle.0 as i32);
    }
}

pub struct DomFrames {
    window: web_sys::Window,
}

impl DomFrames {
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }
}

impl FrameHost for DomFrames {
    fn request_frame(&self, callback: Box<dyn FnOnce(Millis)>) {
        let closure = Closure::once_into_js(move |timestamp: f64| callback(timestamp));
        if let Err(e) = self.window.request_animation_frame(closure.unchecked_ref()) {
            warn!("requestAnimationFrame failed: {:?}", e);
        }
    }
}

// ========================================
// ウィンドウ
// ========================================

struct DomListener {
    id: ListenerId,
    event: &'static str,
    closure: Closure<dyn FnMut()>,
}

pub struct DomWindow {
    window: web_sys::Window,
    listeners: RefCell<Vec<DomListener>>,
    next_listener: Cell<u64>,
}

impl DomWindow {
    pub fn new(window: web_sys::Window) -> Self {
        Self {
            window,
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
        }
    }

    fn listen(&self, event: &'static str, listener: Rc<dyn Fn()>) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);

        let closure = Closure::wrap(Box::new(move || listener()) as Box<dyn FnMut()>);
        self.window
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .ok();
        self.listeners.borrow_mut().push(DomListener { id, event, closure });
        id
    }
}

impl WindowHost for DomWindow {
    fn viewport(&self) -> Viewport {
        let width = self
            .window
            .inner_width()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as f32;
        let height = self
            .window
            .inner_height()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as f32;
        Viewport {
            width,
            height,
            scroll_x: self.window.scroll_x().unwrap_or(0.0) as f32,
            scroll_y: self.window.scroll_y().unwrap_or(0.0) as f32,
        }
    }

    fn document_height(&self) -> f32 {
        self.window
            .document()
            .and_then(|d| d.document_element())
            .map(|e| e.scroll_height() as f32)
            .unwrap_or(0.0)
    }

    fn scroll_to(&self, y: f32) {
        let x = self.window.scroll_x().unwrap_or(0.0);
        self.window.scroll_to_with_x_and_y(x, y as f64);
    }

    fn add_scroll_listener(&self, listener: Rc<dyn Fn()>) -> ListenerId {
        self.listen("scroll", listener)
    }

    fn add_resize_listener(&self, listener: Rc<dyn Fn()>) -> ListenerId {
        self.listen("resize", listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(index) = listeners.iter().position(|l| l.id == id) {
            let listener = listeners.remove(index);
            self.window
                .remove_event_listener_with_callback(
                    listener.event,
                    listener.closure.as_ref().unchecked_ref(),
                )
                .ok();
        }
    }
}

// ========================================
// 交差オブザーバー
// ========================================

type EntriesCallback = Closure<dyn FnMut(Array, web_sys::IntersectionObserver)>;

pub struct DomObserver {
    observer: web_sys::IntersectionObserver,
    sink: Rc<RefCell<Option<IntersectionSink>>>,
    watched: RefCell<BTreeMap<TargetId, Rc<dyn Element>>>,
    _callback: EntriesCallback,
}

fn target_of(entry: &web_sys::IntersectionObserverEntry) -> Option<TargetId> {
    entry
        .target()
        .get_attribute(TARGET_ID_ATTRIBUTE)?
        .parse()
        .ok()
        .map(TargetId)
}

impl DomObserver {
    pub fn new(options: &ObserverOptions) -> Result<Self> {
        let sink: Rc<RefCell<Option<IntersectionSink>>> = Rc::new(RefCell::new(None));

        let delivery = Rc::clone(&sink);
        let callback: EntriesCallback = Closure::wrap(Box::new(
            move |entries: Array, _observer: web_sys::IntersectionObserver| {
                let batch: Vec<Intersection> = entries
                    .iter()
                    .filter_map(|value| value.dyn_into::<web_sys::IntersectionObserverEntry>().ok())
                    .filter_map(|entry| {
                        Some(Intersection {
                            target: target_of(&entry)?,
                            is_intersecting: entry.is_intersecting(),
                            ratio: entry.intersection_ratio() as f32,
                        })
                    })
                    .collect();
                trace!("observer: {} entries", batch.len());
                let sink = delivery.borrow().clone();
                if let Some(sink) = sink {
                    sink(&batch);
                }
            },
        ) as Box<dyn FnMut(Array, web_sys::IntersectionObserver)>);

        let init = web_sys::IntersectionObserverInit::new();
        init.set_root_margin(&options.root_margin.to_string());
        init.set_threshold(&JsValue::from_f64(options.threshold as f64));
        let observer =
            web_sys::IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)
                .map_err(|e| js_error("IntersectionObserver", e))?;

        Ok(Self {
            observer,
            sink,
            watched: RefCell::new(BTreeMap::new()),
            _callback: callback,
        })
    }

    fn node_of(&self, target: TargetId) -> Option<web_sys::Element> {
        let document = web_sys::window()?.document()?;
        let selector = format!("[{}=\"{}\"]", TARGET_ID_ATTRIBUTE, target.0);
        document.query_selector(&selector).ok().flatten()
    }
}

impl IntersectionHost for DomObserver {
    fn connect(&self, sink: IntersectionSink) {
        *self.sink.borrow_mut() = Some(sink);
    }

    fn observe(&self, target: TargetId, element: Rc<dyn Element>) {
        element.set_attribute(TARGET_ID_ATTRIBUTE, &target.0.to_string());
        match self.node_of(target) {
            Some(node) => {
                self.observer.observe(&node);
                self.watched.borrow_mut().insert(target, element);
            }
            None => warn!("observer: {} is not attached to the document", target),
        }
    }

    fn unobserve(&self, target: TargetId) {
        if self.watched.borrow_mut().remove(&target).is_none() {
            return;
        }
        if let Some(node) = self.node_of(target) {
            self.observer.unobserve(&node);
        }
    }
}

impl Drop for DomObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}
