//! ビューポートとの交差で起動する一度きりの表示エフェクト
//!
//! 登録された要素は `Unobserved → Observed → Animating → Settled` を一度だけ通る。
//! 最初の交差通知でエフェクトを始めて監視を外し、同じターゲットへの以降の通知は
//! 無視する。完了したターゲットは要素ハンドルを手放し、ID だけが残る。

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{AnimationConfig, CounterConfig};
use crate::engine::host::{FrameHost, Intersection, IntersectionHost, TargetId};
use crate::error::SensoryError;
use crate::ui::element::Element;

use super::counter::{start_counter, CounterSpec};

/// 要素のエフェクトを指定する属性。例: `data-animate="fade-in"`
pub const ANIMATE_ATTRIBUTE: &str = "data-animate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevealKind {
    #[serde(rename = "fade-in", alias = "fade")]
    Fade,
    #[serde(rename = "slide-in", alias = "slide")]
    Slide,
    #[serde(rename = "counter")]
    Counter,
}

impl RevealKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevealKind::Fade => "fade-in",
            RevealKind::Slide => "slide-in",
            RevealKind::Counter => "counter",
        }
    }
}

impl fmt::Display for RevealKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevealKind {
    type Err = SensoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fade-in" | "fade" => Ok(RevealKind::Fade),
            "slide-in" | "slide" => Ok(RevealKind::Slide),
            "counter" => Ok(RevealKind::Counter),
            other => Err(SensoryError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Unobserved,
    Observed,
    Animating,
    Settled,
}

struct Target {
    element: Rc<dyn Element>,
    kind: RevealKind,
    counter: Option<CounterSpec>,
    state: TargetState,
}

/// 動作中のターゲットと、完了して破棄されたターゲットの ID
#[derive(Default)]
struct Registry {
    live: BTreeMap<TargetId, Target>,
    settled: BTreeSet<TargetId>,
}

type Targets = RefCell<Registry>;

/// エンジンに渡すエフェクトの時間
#[derive(Debug, Clone, PartialEq)]
pub struct RevealTimings {
    pub fade: Duration,
    pub slide: Duration,
    pub slide_offset_px: f32,
    pub counter: Duration,
}

impl RevealTimings {
    pub fn from_config(animation: &AnimationConfig, counter: &CounterConfig) -> Self {
        Self {
            fade: Duration::from_millis(animation.fade_ms),
            slide: Duration::from_millis(animation.slide_ms),
            slide_offset_px: animation.slide_offset_px,
            counter: counter.duration(),
        }
    }
}

impl Default for RevealTimings {
    fn default() -> Self {
        Self::from_config(&AnimationConfig::default(), &CounterConfig::default())
    }
}

pub struct RevealEngine {
    timings: RevealTimings,
    observer: Rc<dyn IntersectionHost>,
    frames: Rc<dyn FrameHost>,
    targets: Rc<Targets>,
    next_id: Cell<u64>,
}

fn same_element(a: &Rc<dyn Element>, b: &Rc<dyn Element>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

fn seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs_f64())
}

impl RevealEngine {
    pub fn new(
        timings: RevealTimings,
        observer: Rc<dyn IntersectionHost>,
        frames: Rc<dyn FrameHost>,
    ) -> Self {
        Self {
            timings,
            observer,
            frames,
            targets: Rc::new(RefCell::new(Registry::default())),
            next_id: Cell::new(1),
        }
    }

    pub fn is_registered(&self, element: &Rc<dyn Element>) -> bool {
        self.targets
            .borrow()
            .live
            .values()
            .any(|t| same_element(&t.element, element))
    }

    /// `element` の監視を始める。同じ要素の二重登録は呼び出し側の誤りで、
    /// 2回目はログに残して無視する。
    pub fn register(&self, element: Rc<dyn Element>, kind: RevealKind) -> Option<TargetId> {
        if self.is_registered(&element) {
            warn!("reveal: element {:?} registered twice, ignoring", element.id());
            return None;
        }

        let counter = match kind {
            RevealKind::Counter => match CounterSpec::from_element(element.as_ref()) {
                Ok(spec) => Some(spec),
                Err(e) => {
                    debug!("reveal: counter skipped ({})", e);
                    None
                }
            },
            RevealKind::Fade | RevealKind::Slide => None,
        };

        let id = TargetId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.targets.borrow_mut().live.insert(
            id,
            Target {
                element: Rc::clone(&element),
                kind,
                counter,
                state: TargetState::Unobserved,
            },
        );

        self.observer.observe(id, element);
        if let Some(target) = self.targets.borrow_mut().live.get_mut(&id) {
            target.state = TargetState::Observed;
        }
        debug!("reveal: {} registered as {}", id, kind);
        Some(id)
    }

    /// セレクタ検索の結果を登録する。要素がなければログに残して飛ばす
    pub fn register_selector(
        &self,
        found: Option<Rc<dyn Element>>,
        selector: &str,
        kind: RevealKind,
    ) -> Option<TargetId> {
        match found {
            Some(element) => self.register(element, kind),
            None => {
                debug!("reveal: {}", SensoryError::MissingElement(selector.to_string()));
                None
            }
        }
    }

    /// `data-animate` 属性に従って要素を登録する
    pub fn register_annotated(&self, element: Rc<dyn Element>) -> Option<TargetId> {
        let raw = element.attribute(ANIMATE_ATTRIBUTE)?;
        match raw.parse::<RevealKind>() {
            Ok(kind) => self.register(element, kind),
            Err(_) => {
                warn!("reveal: unknown {} value {:?}", ANIMATE_ATTRIBUTE, raw);
                None
            }
        }
    }

    /// 交差通知の入口
    pub fn handle(&self, entries: &[Intersection]) {
        for entry in entries.iter().filter(|e| e.is_intersecting) {
            self.reveal(entry.target);
        }
    }

    pub fn state(&self, id: TargetId) -> Option<TargetState> {
        let targets = self.targets.borrow();
        match targets.live.get(&id) {
            Some(target) => Some(target.state),
            None => targets.settled.contains(&id).then_some(TargetState::Settled),
        }
    }

    /// 要素ハンドルをまだ保持しているターゲットの数
    pub fn live_count(&self) -> usize {
        self.targets.borrow().live.len()
    }

    /// 表示待ちのターゲットの数
    pub fn observed_count(&self) -> usize {
        self.count(TargetState::Observed)
    }

    pub fn settled_count(&self) -> usize {
        self.targets.borrow().settled.len()
    }

    fn count(&self, state: TargetState) -> usize {
        self.targets
            .borrow()
            .live
            .values()
            .filter(|t| t.state == state)
            .count()
    }

    /// まだ表示されていないターゲットの監視をすべて外す
    pub fn shutdown(&self) {
        let waiting: Vec<TargetId> = self
            .targets
            .borrow()
            .live
            .iter()
            .filter(|(_, t)| t.state == TargetState::Observed)
            .map(|(id, _)| *id)
            .collect();
        for id in &waiting {
            self.observer.unobserve(*id);
        }
        self.targets.borrow_mut().live.clear();
        info!("reveal: shut down, {} targets never revealed", waiting.len());
    }

    fn reveal(&self, id: TargetId) {
        let (element, kind, counter) = {
            let mut targets = self.targets.borrow_mut();
            let Some(target) = targets.live.get_mut(&id) else {
                return;
            };
            if target.state != TargetState::Observed {
                return;
            }
            target.state = TargetState::Animating;
            (Rc::clone(&target.element), target.kind, target.counter.clone())
        };
        self.observer.unobserve(id);
        debug!("reveal: {} ({})", id, kind);

        let targets: Weak<Targets> = Rc::downgrade(&self.targets);
        let settle: Box<dyn FnOnce()> = Box::new(move || {
            if let Some(targets) = targets.upgrade() {
                let mut targets = targets.borrow_mut();
                if targets.live.remove(&id).is_some() {
                    targets.settled.insert(id);
                }
            }
        });

        match kind {
            RevealKind::Counter => match counter {
                Some(spec) => start_counter(
                    Rc::clone(&self.frames),
                    element,
                    spec,
                    self.timings.counter,
                    Some(settle),
                ),
                None => settle(),
            },
            RevealKind::Slide => {
                element.set_style(
                    "transform",
                    &format!("translateX(-{}px)", self.timings.slide_offset_px),
                );
                element.set_style("opacity", "0");
                element.set_style("transition", &format!("all {} ease-out", seconds(self.timings.slide)));
                self.frames.request_frame(Box::new(move |_| {
                    element.set_style("transform", "translateX(0)");
                    element.set_style("opacity", "1");
                    settle();
                }));
            }
            RevealKind::Fade => {
                element.set_style("opacity", "0");
                element.set_style("transition", &format!("opacity {} ease-out", seconds(self.timings.fade)));
                self.frames.request_frame(Box::new(move |_| {
                    element.set_style("opacity", "1");
                    settle();
                }));
            }
        }
    }
}
