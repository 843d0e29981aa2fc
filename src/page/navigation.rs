//! ナビゲーションバーの状態: スクロール進捗、アクティブなセクションのリンク、
//! スクロール後の背景、モバイルメニュー
//!
//! スクロール更新は throttle、リサイズ処理は debounce する。登録したリスナーは
//! [`Navigation`] への弱参照しか持たないので、破棄するか
//! [`Navigation::teardown`] を呼べば何もしなくなる。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, trace};

use crate::animation::smooth_scroll::smooth_scroll_to;
use crate::config::{AnimationConfig, Config, ScrollConfig};
use crate::engine::host::{FrameHost, Hosts, ListenerId, TimerHost, WindowHost};
use crate::engine::rate_limit::{debounce, throttle};
use crate::ui::element::Element;
use crate::ui::viewport::Rect;

pub struct NavLink {
    pub href: String,
    pub element: Rc<dyn Element>,
}

pub struct Section {
    pub id: String,
    pub element: Rc<dyn Element>,
}

/// ナビゲーションが扱う要素。どれも欠けていてよい
#[derive(Default)]
pub struct NavElements {
    pub nav: Option<Rc<dyn Element>>,
    pub toggle: Option<Rc<dyn Element>>,
    pub menu: Option<Rc<dyn Element>>,
    pub progress_bar: Option<Rc<dyn Element>>,
    pub body: Option<Rc<dyn Element>>,
    pub links: Vec<NavLink>,
    pub sections: Vec<Section>,
}

/// スクロール進捗（パーセント、`0..=100`）。スクロールできないページは 0
pub fn scroll_progress(scroll_top: f32, document_height: f32, viewport_height: f32) -> f32 {
    let scrollable = document_height - viewport_height;
    if scrollable <= 0.0 {
        return 0.0;
    }
    (scroll_top / scrollable * 100.0).clamp(0.0, 100.0)
}

/// `position` を含むセクション。重なっている場合は最後のものを選ぶ
pub fn active_section<'a, I>(sections: I, position: f32) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, Rect)>,
{
    sections
        .into_iter()
        .filter(|(_, rect)| position >= rect.y && position < rect.bottom())
        .last()
        .map(|(id, _)| id)
}

pub struct Navigation {
    elements: NavElements,
    timers: Rc<dyn TimerHost>,
    frames: Rc<dyn FrameHost>,
    window: Rc<dyn WindowHost>,
    scroll: ScrollConfig,
    animation: AnimationConfig,
    mobile_breakpoint: f32,
    menu_open: Cell<bool>,
    current_section: RefCell<Option<String>>,
    listeners: RefCell<Vec<ListenerId>>,
}

impl Navigation {
    pub fn new(elements: NavElements, hosts: &Hosts, config: &Config) -> Rc<Self> {
        Rc::new(Self {
            elements,
            timers: Rc::clone(&hosts.timers),
            frames: Rc::clone(&hosts.frames),
            window: Rc::clone(&hosts.window),
            scroll: config.scroll.clone(),
            animation: config.animation.clone(),
            mobile_breakpoint: config.breakpoints.mobile,
            menu_open: Cell::new(false),
            current_section: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn init(self: &Rc<Self>) {
        self.bind_events();
        self.update_scroll_progress();
        self.update_active_link();
        debug!(
            "navigation: {} links, {} sections",
            self.elements.links.len(),
            self.elements.sections.len()
        );
    }

    fn bind_events(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let on_scroll = throttle(
            Rc::clone(&self.timers),
            move |()| {
                if let Some(nav) = weak.upgrade() {
                    nav.update_scroll_progress();
                    nav.update_active_link();
                    nav.update_nav_background();
                }
            },
            self.scroll.scroll_throttle(),
        );
        let scroll_id = self.window.add_scroll_listener(Rc::new(move || {
            on_scroll.call(());
        }));

        let weak = Rc::downgrade(self);
        let on_resize = debounce(
            Rc::clone(&self.timers),
            move |()| {
                if let Some(nav) = weak.upgrade() {
                    nav.on_resize();
                }
            },
            self.scroll.resize_debounce(),
        );
        let resize_id = self
            .window
            .add_resize_listener(Rc::new(move || on_resize.call(())));

        self.listeners.borrow_mut().extend([scroll_id, resize_id]);
    }

    /// [`Navigation::init`] が登録したウィンドウリスナーを外す
    pub fn teardown(&self) {
        for id in self.listeners.borrow_mut().drain(..) {
            self.window.remove_listener(id);
        }
    }

    pub fn is_menu_open(&self) -> bool {
        self.menu_open.get()
    }

    pub fn current_section(&self) -> Option<String> {
        self.current_section.borrow().clone()
    }

    /// ビューポートがモバイルのブレークポイントより広くなったらメニューを閉じる
    pub fn on_resize(&self) {
        if self.window.viewport().width > self.mobile_breakpoint && self.menu_open.get() {
            debug!("navigation: viewport above mobile breakpoint, closing menu");
            self.close_mobile_menu();
        }
    }

    pub fn toggle_mobile_menu(&self) {
        let open = !self.menu_open.get();
        self.menu_open.set(open);
        self.apply_menu_state(open);
    }

    pub fn close_mobile_menu(&self) {
        self.menu_open.set(false);
        self.apply_menu_state(false);
    }

    fn apply_menu_state(&self, open: bool) {
        if let Some(menu) = &self.elements.menu {
            menu.set_class("active", open);
        }
        if let Some(toggle) = &self.elements.toggle {
            toggle.set_class("active", open);
        }
        // メニューが開いている間は背後のページをスクロールさせない
        if let Some(body) = &self.elements.body {
            body.set_style("overflow", if open { "hidden" } else { "" });
        }
    }

    /// ナビゲーションリンクのクリックを処理する。ページ内アンカーなら該当セクションへ
    /// スムーズにスクロールしてメニューを閉じる。スクロールしたら `true`
    pub fn handle_nav_click(&self, href: &str) -> bool {
        let Some(target_id) = href.strip_prefix('#') else {
            return false;
        };
        let Some(section) = self.elements.sections.iter().find(|s| s.id == target_id) else {
            debug!("navigation: no section for {}", href);
            return false;
        };

        smooth_scroll_to(
            Rc::clone(&self.frames),
            Rc::clone(&self.window),
            section.element.layout_rect().y,
            self.animation.header_offset_px,
            self.animation.smooth_scroll(),
        );
        self.close_mobile_menu();
        true
    }

    pub fn update_scroll_progress(&self) {
        let Some(bar) = &self.elements.progress_bar else {
            return;
        };
        let viewport = self.window.viewport();
        let pct = scroll_progress(viewport.scroll_y, self.window.document_height(), viewport.height);
        bar.set_style("width", &format!("{}%", pct));
    }

    pub fn update_active_link(&self) {
        let position = self.window.viewport().scroll_y + self.scroll.section_offset_px;
        let sections = self
            .elements
            .sections
            .iter()
            .map(|s| (s.id.as_str(), s.element.layout_rect()));
        let Some(active) = active_section(sections, position) else {
            return;
        };
        if self.current_section.borrow().as_deref() == Some(active) {
            return;
        }

        trace!("navigation: active section {}", active);
        *self.current_section.borrow_mut() = Some(active.to_string());
        let anchor = format!("#{}", active);
        for link in &self.elements.links {
            link.element.set_class("active", link.href == anchor);
        }
    }

    pub fn update_nav_background(&self) {
        if let Some(nav) = &self.elements.nav {
            let scrolled = self.window.viewport().scroll_y > self.scroll.nav_scrolled_px;
            nav.set_class("scrolled", scrolled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scheduler::Scheduler;
    use crate::ui::element::MemoryElement;
    use crate::ui::observer::{ObserverOptions, VirtualObserver};
    use crate::ui::viewport::Viewport;
    use crate::ui::window::VirtualWindow;

    struct Fixture {
        scheduler: Rc<Scheduler>,
        window: Rc<VirtualWindow>,
        nav: Rc<Navigation>,
        bar: Rc<MemoryElement>,
        navbar: Rc<MemoryElement>,
        menu: Rc<MemoryElement>,
        body: Rc<MemoryElement>,
        home_link: Rc<MemoryElement>,
        about_link: Rc<MemoryElement>,
    }

    fn el(y: f32, height: f32) -> Rc<MemoryElement> {
        Rc::new(MemoryElement::new("", Rect::new(0.0, y, 1280.0, height)))
    }

    fn setup() -> Fixture {
        let scheduler = Rc::new(Scheduler::new());
        let window = Rc::new(VirtualWindow::new(Viewport::new(1280.0, 800.0), 2800.0));
        let hosts = Hosts {
            timers: scheduler.clone(),
            frames: scheduler.clone(),
            observer: Rc::new(VirtualObserver::new(ObserverOptions::default())),
            window: window.clone(),
        };

        let (bar, navbar, menu, body) = (el(0.0, 4.0), el(0.0, 70.0), el(0.0, 0.0), el(0.0, 2800.0));
        let (home_link, about_link) = (el(0.0, 0.0), el(0.0, 0.0));
        let elements = NavElements {
            nav: Some(navbar.clone()),
            toggle: Some(el(0.0, 0.0)),
            menu: Some(menu.clone()),
            progress_bar: Some(bar.clone()),
            body: Some(body.clone()),
            links: vec![
                NavLink {
                    href: "#home".into(),
                    element: home_link.clone(),
                },
                NavLink {
                    href: "#about".into(),
                    element: about_link.clone(),
                },
            ],
            sections: vec![
                Section {
                    id: "home".into(),
                    element: el(0.0, 1000.0),
                },
                Section {
                    id: "about".into(),
                    element: el(1000.0, 1800.0),
                },
            ],
        };
        let nav = Navigation::new(elements, &hosts, &Config::default());
        nav.init();

        Fixture {
            scheduler,
            window,
            nav,
            bar,
            navbar,
            menu,
            body,
            home_link,
            about_link,
        }
    }

    #[test]
    fn test_scroll_progress_math() {
        assert_eq!(scroll_progress(0.0, 2800.0, 800.0), 0.0);
        assert_eq!(scroll_progress(1000.0, 2800.0, 800.0), 50.0);
        assert_eq!(scroll_progress(9000.0, 2800.0, 800.0), 100.0);
        assert_eq!(scroll_progress(10.0, 500.0, 800.0), 0.0);
    }

    #[test]
    fn test_active_section_last_match_wins() {
        let sections = [
            ("a", Rect::new(0.0, 0.0, 10.0, 100.0)),
            ("b", Rect::new(0.0, 50.0, 10.0, 100.0)),
        ];
        assert_eq!(active_section(sections, 10.0), Some("a"));
        assert_eq!(active_section(sections, 60.0), Some("b"));
        assert_eq!(active_section(sections, 500.0), None);
    }

    #[test]
    fn test_init_marks_first_section() {
        let f = setup();
        assert_eq!(f.nav.current_section().as_deref(), Some("home"));
        assert!(f.home_link.has_class("active"));
        assert_eq!(f.bar.style("width").as_deref(), Some("0%"));
    }

    #[test]
    fn test_scroll_updates_are_throttled() {
        let f = setup();
        f.window.scroll_to(1000.0);
        assert_eq!(f.bar.style("width").as_deref(), Some("50%"));
        assert!(f.navbar.has_class("scrolled"));
        assert!(f.about_link.has_class("active"));
        assert!(!f.home_link.has_class("active"));

        // 16ms の範囲内なので破棄
        f.window.scroll_to(2000.0);
        assert_eq!(f.bar.style("width").as_deref(), Some("50%"));

        f.scheduler.advance(16.0);
        f.window.scroll_to(0.0);
        assert_eq!(f.bar.style("width").as_deref(), Some("0%"));
        assert!(!f.navbar.has_class("scrolled"));
        assert!(f.home_link.has_class("active"));
    }

    #[test]
    fn test_menu_toggle_and_close_on_wide_resize() {
        let f = setup();
        f.nav.toggle_mobile_menu();
        assert!(f.nav.is_menu_open());
        assert!(f.menu.has_class("active"));
        assert_eq!(f.body.style("overflow").as_deref(), Some("hidden"));

        f.window.resize(500.0, 800.0);
        f.scheduler.advance(300.0);
        assert!(f.nav.is_menu_open());

        f.window.resize(1000.0, 800.0);
        f.window.resize(1100.0, 800.0);
        f.scheduler.advance(249.0);
        assert!(f.nav.is_menu_open());
        f.scheduler.advance(1.0);
        assert!(!f.nav.is_menu_open());
        assert_eq!(f.body.style("overflow"), None);
    }

    #[test]
    fn test_nav_click_scrolls_below_header() {
        let f = setup();
        f.nav.toggle_mobile_menu();

        assert!(f.nav.handle_nav_click("#about"));
        assert!(!f.nav.is_menu_open());
        f.scheduler.advance(1000.0);
        assert_eq!(f.window.viewport().scroll_y, 930.0);

        assert!(!f.nav.handle_nav_click("#nowhere"));
        assert!(!f.nav.handle_nav_click("https://example.com"));
    }

    #[test]
    fn test_teardown_silences_listeners() {
        let f = setup();
        f.nav.teardown();
        assert_eq!(f.window.listener_count(), 0);
        f.window.scroll_to(1000.0);
        assert_eq!(f.bar.style("width").as_deref(), Some("0%"));
    }
}
