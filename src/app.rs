// ========================================
// アプリケーションコンテキスト
// ========================================
//
// `App` は1ページ分のコンポーネントをすべて所有する。`Config` とホストハンドルから
// 一度だけ作られ、`App::init` で `Page` に結び付けられ、`App::shutdown` で片付けられる。

use std::rc::Rc;

use log::{debug, info, warn};

use crate::animation::floating::{animate_floating, golden_jitter};
use crate::animation::reveal::{RevealEngine, RevealKind, RevealTimings};
use crate::config::Config;
use crate::engine::host::{Hosts, Intersection};
use crate::error::Result;
use crate::page::interaction::{BackToTop, DownloadButton};
use crate::page::loading::LoadingScreen;
use crate::page::navigation::{NavElements, Navigation};
use crate::ui::element::Element;

/// ホストが検索済みのページ要素
#[derive(Default)]
pub struct Page {
    pub loading_screen: Option<Rc<dyn Element>>,
    pub nav: NavElements,
    /// 画面に入ると 0 からアニメーションする数値表示
    pub counters: Vec<Rc<dyn Element>>,
    /// `data-animate` 属性を持つ要素
    pub animated: Vec<Rc<dyn Element>>,
    pub floating: Vec<Rc<dyn Element>>,
    pub back_to_top: Option<Rc<dyn Element>>,
    /// ダウンロードボタンと、ボタンが示すファイル名
    pub downloads: Vec<(String, Rc<dyn Element>)>,
}

pub struct App {
    config: Config,
    hosts: Hosts,
    engine: Rc<RevealEngine>,
    navigation: Option<Rc<Navigation>>,
    back_to_top: Option<Rc<BackToTop>>,
    downloads: Vec<DownloadButton>,
    loading: Option<LoadingScreen>,
    initialized: bool,
}

impl App {
    pub fn new(config: Config, hosts: Hosts) -> Result<Self> {
        config.validate()?;
        let engine = Rc::new(RevealEngine::new(
            RevealTimings::from_config(&config.animation, &config.counter),
            Rc::clone(&hosts.observer),
            Rc::clone(&hosts.frames),
        ));
        Ok(Self {
            config,
            hosts,
            engine,
            navigation: None,
            back_to_top: None,
            downloads: Vec::new(),
            loading: None,
            initialized: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &Rc<RevealEngine> {
        &self.engine
    }

    pub fn navigation(&self) -> Option<&Rc<Navigation>> {
        self.navigation.as_ref()
    }

    pub fn back_to_top(&self) -> Option<&Rc<BackToTop>> {
        self.back_to_top.as_ref()
    }

    pub fn loading(&self) -> Option<&LoadingScreen> {
        self.loading.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 各コンポーネントを `page` に結び付ける。効果があるのは最初の呼び出しだけ
    pub fn init(&mut self, page: Page) {
        if self.initialized {
            warn!("app: init called twice, ignoring");
            return;
        }
        self.initialized = true;

        self.loading = Some(LoadingScreen::new(
            page.loading_screen,
            Rc::clone(&self.hosts.timers),
            &self.config.loading,
        ));

        let navigation = Navigation::new(page.nav, &self.hosts, &self.config);
        navigation.init();
        self.navigation = Some(navigation);

        self.init_reveal(page.counters, page.animated);
        animate_floating(&page.floating, golden_jitter);

        if let Some(button) = page.back_to_top {
            let widget = BackToTop::new(button, &self.hosts, &self.config);
            widget.init();
            self.back_to_top = Some(widget);
        }

        self.downloads = page
            .downloads
            .into_iter()
            .map(|(name, element)| {
                DownloadButton::new(element, name, Rc::clone(&self.hosts.timers), &self.config.download)
            })
            .collect();

        info!(
            "app: initialized ({} reveal targets, {} downloads)",
            self.engine.observed_count(),
            self.downloads.len()
        );
    }

    fn init_reveal(&self, counters: Vec<Rc<dyn Element>>, animated: Vec<Rc<dyn Element>>) {
        let engine = Rc::downgrade(&self.engine);
        self.hosts
            .observer
            .connect(Rc::new(move |entries: &[Intersection]| {
                if let Some(engine) = engine.upgrade() {
                    engine.handle(entries);
                }
            }));

        for counter in counters {
            self.engine.register(counter, RevealKind::Counter);
        }
        for element in animated {
            // カウンターは通常 data-animate="counter" も持っている
            if self.engine.is_registered(&element) {
                continue;
            }
            self.engine.register_annotated(element);
        }
    }

    /// 接続済みシンクを使わないホストから交差通知を受け渡す
    pub fn on_intersections(&self, entries: &[Intersection]) {
        self.engine.handle(entries);
    }

    /// ページのリソース（フォント、画像）の読み込み完了を伝える
    pub fn resources_ready(&self) -> bool {
        self.loading.as_ref().is_some_and(LoadingScreen::resources_ready)
    }

    pub fn click_nav_link(&self, href: &str) -> bool {
        self.navigation
            .as_ref()
            .is_some_and(|nav| nav.handle_nav_click(href))
    }

    pub fn toggle_menu(&self) {
        if let Some(nav) = &self.navigation {
            nav.toggle_mobile_menu();
        }
    }

    pub fn click_back_to_top(&self) {
        if let Some(widget) = &self.back_to_top {
            widget.click();
        }
    }

    /// `name` を示すダウンロードボタンをすべてクリックする。
    /// 1つでも受け付けたら `true`
    pub fn click_download(&self, name: &str) -> bool {
        let mut accepted = false;
        for button in self.downloads.iter().filter(|b| b.name() == name) {
            accepted |= button.click();
        }
        if !accepted {
            debug!("app: no idle download button named {}", name);
        }
        accepted
    }

    /// リスナーをすべて外し、表示されなかったターゲットの監視をやめる。
    /// 表示中のダウンロードのフィードバックは元に戻す。実行中のアニメーションはそのまま終わる。
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        if let Some(nav) = self.navigation.take() {
            nav.teardown();
        }
        if let Some(widget) = self.back_to_top.take() {
            widget.teardown();
        }
        for button in self.downloads.drain(..) {
            button.teardown();
        }
        self.engine.shutdown();
        self.initialized = false;
        info!("app: shut down");
    }
}
