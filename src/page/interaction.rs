//! 小さなインタラクティブ部品: トップへ戻るボタンとダウンロードのフィードバック

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use log::{debug, info};

use crate::animation::smooth_scroll::smooth_scroll_to;
use crate::config::{Config, DownloadConfig};
use crate::engine::host::{FrameHost, Hosts, ListenerId, TimerHost, WindowHost};
use crate::engine::rate_limit::throttle;
use crate::engine::stages::{Stage, StageSequence};
use crate::ui::element::Element;

// ========================================
// トップへ戻る
// ========================================

pub struct BackToTop {
    button: Rc<dyn Element>,
    timers: Rc<dyn TimerHost>,
    frames: Rc<dyn FrameHost>,
    window: Rc<dyn WindowHost>,
    show_after_px: f32,
    throttle: Duration,
    header_offset_px: f32,
    scroll_duration: Duration,
    listener: Cell<Option<ListenerId>>,
}

impl BackToTop {
    pub fn new(button: Rc<dyn Element>, hosts: &Hosts, config: &Config) -> Rc<Self> {
        Rc::new(Self {
            button,
            timers: Rc::clone(&hosts.timers),
            frames: Rc::clone(&hosts.frames),
            window: Rc::clone(&hosts.window),
            show_after_px: config.scroll.back_to_top_px,
            throttle: config.scroll.back_to_top_throttle(),
            header_offset_px: config.animation.header_offset_px,
            scroll_duration: config.animation.smooth_scroll(),
            listener: Cell::new(None),
        })
    }

    pub fn init(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let on_scroll = throttle(
            Rc::clone(&self.timers),
            move |()| {
                if let Some(button) = weak.upgrade() {
                    button.update_visibility();
                }
            },
            self.throttle,
        );
        let id = self.window.add_scroll_listener(Rc::new(move || {
            on_scroll.call(());
        }));
        self.listener.set(Some(id));
        self.update_visibility();
    }

    pub fn teardown(&self) {
        if let Some(id) = self.listener.take() {
            self.window.remove_listener(id);
        }
    }

    pub fn is_visible(&self) -> bool {
        self.button.has_class("visible")
    }

    pub fn update_visibility(&self) {
        let visible = self.window.viewport().scroll_y > self.show_after_px;
        self.button.set_class("visible", visible);
    }

    /// ドキュメントの先頭までスムーズにスクロールする
    pub fn click(&self) {
        debug!("back to top");
        smooth_scroll_to(
            Rc::clone(&self.frames),
            Rc::clone(&self.window),
            0.0,
            self.header_offset_px,
            self.scroll_duration,
        );
    }
}

// ========================================
// ダウンロードのフィードバック
// ========================================

pub const DOWNLOAD_STARTED: &str = "started";
pub const DOWNLOAD_RESTORED: &str = "restored";

fn restore(element: &dyn Element, label: &str) {
    element.set_text(label);
    element.set_style("pointer-events", "auto");
}

/// ダウンロード開始中はボタンのラベルを確認表示に差し替え、終わったら元に戻す
pub struct DownloadButton {
    element: Rc<dyn Element>,
    name: String,
    original_label: Rc<RefCell<String>>,
    sequence: StageSequence,
}

impl DownloadButton {
    pub fn new(
        element: Rc<dyn Element>,
        name: impl Into<String>,
        timers: Rc<dyn TimerHost>,
        config: &DownloadConfig,
    ) -> Self {
        let original_label = Rc::new(RefCell::new(element.text()));
        let stages = vec![
            Stage::new(DOWNLOAD_STARTED, Duration::from_millis(config.feedback_ms)),
            Stage::new(DOWNLOAD_RESTORED, Duration::ZERO),
        ];

        let target = Rc::clone(&element);
        let original = Rc::clone(&original_label);
        let started_label = config.started_label.clone();
        let sequence = StageSequence::new(timers, stages, move |stage| match stage.name {
            DOWNLOAD_STARTED => {
                target.set_text(&started_label);
                target.set_style("pointer-events", "none");
            }
            _ => restore(target.as_ref(), &original.borrow()),
        });

        Self {
            element,
            name: name.into(),
            original_label,
            sequence,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 前回のクリックのフィードバックが表示中なら `false`
    pub fn click(&self) -> bool {
        if self.sequence.is_running() {
            debug!("download {}: click ignored while busy", self.name);
            return false;
        }
        *self.original_label.borrow_mut() = self.element.text();
        self.sequence.start();
        info!("Download iniciado: {}", self.name);
        true
    }

    pub fn stage(&self) -> Option<&'static str> {
        self.sequence.current_stage()
    }

    /// 表示中のフィードバックを打ち切り、元のラベルに戻す
    pub fn teardown(&self) {
        if !self.sequence.is_running() {
            return;
        }
        self.sequence.stop();
        restore(self.element.as_ref(), &self.original_label.borrow());
        debug!("download {}: feedback cut short", self.name);
    }
}
