//! JSON シーン: ページの記述とユーザー操作のスクリプト。仮想スケジューラ上で
//! メモリ上の要素に対して再生する。
//!
//! ```json
//! {
//!   "viewport": { "width": 1280, "height": 800 },
//!   "document_height": 3000,
//!   "run_ms": 4000,
//!   "elements": [
//!     { "id": "revenue", "text": "R$ 0", "rect": { "x": 0, "y": 1200, "width": 300, "height": 60 },
//!       "attributes": { "data-target": "1500" }, "roles": [{ "role": "counter" }] }
//!   ],
//!   "script": [{ "at_ms": 500, "action": "scroll", "y": 900 }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::{Rc, Weak};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::app::{App, Page};
use crate::config::Config;
use crate::engine::host::{Hosts, Millis, TimerHost, WindowHost};
use crate::engine::scheduler::Scheduler;
use crate::error::{Result, SensoryError};
use crate::page::navigation::{NavLink, Section};
use crate::ui::element::{Element, ElementSnapshot, MemoryElement};
use crate::ui::observer::VirtualObserver;
use crate::ui::viewport::{Rect, Viewport};
use crate::ui::window::VirtualWindow;

/// 要素の用途。1つの要素が複数の役割を持てる
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum Role {
    LoadingScreen,
    Body,
    Nav,
    NavToggle,
    NavMenu,
    ScrollProgress,
    NavLink { href: String },
    /// `id` が必要。ナビゲーションリンクは `#id` で参照する
    Section,
    Counter,
    /// `data-animate` 属性に従って表示する
    Animated,
    Floating,
    BackToTop,
    Download { name: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneElement {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    Scroll { y: f32 },
    Resize { width: f32, height: f32 },
    ClickNav { href: String },
    ToggleMenu,
    BackToTop,
    Download { name: String },
    ResourcesReady,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Step {
    pub at_ms: Millis,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scene {
    pub viewport: Viewport,
    pub document_height: f32,
    /// シーンを走らせる仮想時間。これより後のステップには到達しない
    pub run_ms: Millis,
    #[serde(default)]
    pub elements: Vec<SceneElement>,
    #[serde(default)]
    pub script: Vec<Step>,
}

/// シーン実行後の最終状態
#[derive(Debug, Serialize)]
pub struct SceneReport {
    pub elapsed_ms: Millis,
    pub frames_run: u64,
    pub scroll_y: f32,
    pub menu_open: bool,
    pub current_section: Option<String>,
    pub revealed: usize,
    pub waiting_reveal: usize,
    pub loading_gone: bool,
    pub elements: BTreeMap<String, ElementSnapshot>,
}

impl Scene {
    pub fn from_json_str(source: &str) -> Result<Self> {
        let scene: Scene = serde_json::from_str(source)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            return Err(SensoryError::Scene("viewport must have a size".into()));
        }
        if self.run_ms < 0.0 {
            return Err(SensoryError::Scene("run_ms must not be negative".into()));
        }
        for (index, element) in self.elements.iter().enumerate() {
            if element.roles.contains(&Role::Section) && element.id.is_none() {
                return Err(SensoryError::Scene(format!("section element #{} has no id", index)));
            }
        }
        Ok(())
    }

    /// `config` でシーンを最後まで実行する
    pub fn run(&self, config: Config) -> Result<SceneReport> {
        let runner = SceneRunner::new(self, config)?;
        runner.play(&self.script, self.run_ms);
        Ok(runner.report())
    }
}

fn label(element: &SceneElement, index: usize) -> String {
    element
        .id
        .clone()
        .unwrap_or_else(|| format!("element#{}", index))
}

fn build_element(spec: &SceneElement) -> MemoryElement {
    let mut element = MemoryElement::new(spec.text.clone(), spec.rect);
    if let Some(id) = &spec.id {
        element = element.with_id(id.clone());
    }
    spec.attributes
        .iter()
        .fold(element, |element, (name, value)| element.with_attribute(name, value))
}

fn page_from(scene: &Scene, elements: &[Rc<MemoryElement>]) -> Page {
    let mut page = Page::default();
    for (spec, element) in scene.elements.iter().zip(elements) {
        let handle: Rc<dyn Element> = element.clone();
        for role in &spec.roles {
            match role {
                Role::LoadingScreen => page.loading_screen = Some(handle.clone()),
                Role::Body => page.nav.body = Some(handle.clone()),
                Role::Nav => page.nav.nav = Some(handle.clone()),
                Role::NavToggle => page.nav.toggle = Some(handle.clone()),
                Role::NavMenu => page.nav.menu = Some(handle.clone()),
                Role::ScrollProgress => page.nav.progress_bar = Some(handle.clone()),
                Role::NavLink { href } => page.nav.links.push(NavLink {
                    href: href.clone(),
                    element: handle.clone(),
                }),
                Role::Section => page.nav.sections.push(Section {
                    id: spec.id.clone().unwrap_or_default(),
                    element: handle.clone(),
                }),
                Role::Counter => page.counters.push(handle.clone()),
                Role::Animated => page.animated.push(handle.clone()),
                Role::Floating => page.floating.push(handle.clone()),
                Role::BackToTop => page.back_to_top = Some(handle.clone()),
                Role::Download { name } => page.downloads.push((name.clone(), handle.clone())),
            }
        }
    }
    page
}

/// 仮想ホストに接続した [`App`]
pub struct SceneRunner {
    pub scheduler: Rc<Scheduler>,
    pub window: Rc<VirtualWindow>,
    pub observer: Rc<VirtualObserver>,
    pub app: App,
    labels: Vec<String>,
    elements: Vec<Rc<MemoryElement>>,
}

impl SceneRunner {
    pub fn new(scene: &Scene, config: Config) -> Result<Self> {
        let scheduler = Rc::new(Scheduler::new());
        let window = Rc::new(VirtualWindow::new(scene.viewport, scene.document_height));
        let observer = Rc::new(VirtualObserver::new(config.reveal.observer_options()?));
        let hosts = Hosts {
            timers: scheduler.clone(),
            frames: scheduler.clone(),
            observer: observer.clone(),
            window: window.clone(),
        };

        let elements: Vec<Rc<MemoryElement>> = scene
            .elements
            .iter()
            .map(|spec| Rc::new(build_element(spec)))
            .collect();
        let labels = scene
            .elements
            .iter()
            .enumerate()
            .map(|(index, spec)| label(spec, index))
            .collect();

        let mut app = App::new(config, hosts)?;
        app.init(page_from(scene, &elements));

        // ブラウザはビューポートが動くたびに交差を計算し直す
        let recheck = {
            let observer = Rc::downgrade(&observer);
            let window: Weak<VirtualWindow> = Rc::downgrade(&window);
            Rc::new(move || {
                if let (Some(observer), Some(window)) = (observer.upgrade(), window.upgrade()) {
                    observer.check(&window.viewport());
                }
            })
        };
        window.add_scroll_listener(recheck.clone());
        window.add_resize_listener(recheck);
        observer.check(&window.viewport());

        debug!("scene: {} elements loaded", elements.len());
        Ok(Self {
            scheduler,
            window,
            observer,
            app,
            labels,
            elements,
        })
    }

    pub fn apply(&self, action: &Action) {
        debug!("scene: {:?}", action);
        match action {
            Action::Scroll { y } => self.window.scroll_to(*y),
            Action::Resize { width, height } => self.window.resize(*width, *height),
            Action::ClickNav { href } => {
                self.app.click_nav_link(href);
            }
            Action::ToggleMenu => self.app.toggle_menu(),
            Action::BackToTop => self.app.click_back_to_top(),
            Action::Download { name } => {
                self.app.click_download(name);
            }
            Action::ResourcesReady => {
                self.app.resources_ready();
            }
        }
    }

    /// `script` を時刻順に再生し、そのあと `run_ms` まで時計を進める
    pub fn play(&self, script: &[Step], run_ms: Millis) {
        let mut steps: Vec<&Step> = script.iter().filter(|s| s.at_ms <= run_ms).collect();
        steps.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        for step in steps {
            self.scheduler.advance_to(step.at_ms);
            self.apply(&step.action);
        }
        self.scheduler.advance_to(run_ms);
        info!("scene: finished at {}ms after {} frames", run_ms, self.scheduler.frames_run());
    }

    pub fn element(&self, label: &str) -> Option<&Rc<MemoryElement>> {
        let index = self.labels.iter().position(|l| l == label)?;
        self.elements.get(index)
    }

    pub fn report(&self) -> SceneReport {
        let navigation = self.app.navigation();
        SceneReport {
            elapsed_ms: self.scheduler.now(),
            frames_run: self.scheduler.frames_run(),
            scroll_y: self.window.viewport().scroll_y,
            menu_open: navigation.is_some_and(|n| n.is_menu_open()),
            current_section: navigation.and_then(|n| n.current_section()),
            revealed: self.app.engine().settled_count(),
            waiting_reveal: self.app.engine().observed_count(),
            loading_gone: self.app.loading().is_some_and(|l| l.is_gone()),
            elements: self
                .labels
                .iter()
                .cloned()
                .zip(self.elements.iter().map(|e| e.snapshot()))
                .collect(),
        }
    }
}
