// WASM エントリーポイント

use std::cell::RefCell;
use std::rc::Rc;

use log::{error, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::app::App;
use crate::config::Config;
use crate::dom_host::page::{
    collect_page, download_name, query_nodes, BACK_TO_TOP, DOWNLOAD_BUTTONS, NAV_LINKS, NAV_TOGGLE,
};
use crate::dom_host::{DomFrames, DomObserver, DomTimers, DomWindow};
use crate::engine::host::{Hosts, TimerHost};
use crate::error::{Result, SensoryError};

/// `document.fonts` が使えないとき、この時間が経てばリソースの準備ができたとみなす
const FONTS_FALLBACK_MS: f64 = 1000.0;

thread_local! {
    static APP: RefCell<Option<App>> = const { RefCell::new(None) };
}

fn with_app<R>(f: impl FnOnce(&App) -> R) -> Option<R> {
    APP.with(|app| app.borrow().as_ref().map(f))
}

fn on_click<F>(target: &web_sys::EventTarget, handler: F)
where
    F: Fn(&web_sys::Event) + 'static,
{
    let closure = Closure::wrap(Box::new(move |event: web_sys::Event| handler(&event)) as Box<dyn FnMut(_)>);
    target
        .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
        .ok();
    closure.forget();
}

fn bind_clicks(document: &web_sys::Document) {
    for toggle in query_nodes(document, NAV_TOGGLE) {
        on_click(&toggle, |_| {
            with_app(App::toggle_menu);
        });
    }

    for link in query_nodes(document, NAV_LINKS) {
        let href = link.get_attribute("href").unwrap_or_default();
        on_click(&link, move |event| {
            if with_app(|app| app.click_nav_link(&href)) == Some(true) {
                event.prevent_default();
            }
        });
    }

    for button in query_nodes(document, BACK_TO_TOP) {
        on_click(&button, |_| {
            with_app(App::click_back_to_top);
        });
    }

    for button in query_nodes(document, DOWNLOAD_BUTTONS) {
        let name = download_name(&button);
        on_click(&button, move |event| {
            event.prevent_default();
            with_app(|app| app.click_download(&name));
        });
    }
}

/// `document.fonts.ready` が解決したら、フォント API がなければ一定時間後に
/// `App::resources_ready` を呼ぶ
fn watch_resources(document: &web_sys::Document, timers: &Rc<DomTimers>) {
    let fonts_ready = js_sys::Reflect::get(document, &JsValue::from_str("fonts"))
        .ok()
        .filter(|fonts| !fonts.is_undefined())
        .and_then(|fonts| js_sys::Reflect::get(&fonts, &JsValue::from_str("ready")).ok())
        .and_then(|promise| promise.dyn_into::<js_sys::Promise>().ok());

    match fonts_ready {
        Some(promise) => {
            let ready = Closure::once(move |_: JsValue| {
                with_app(App::resources_ready);
            });
            let _ = promise.then(&ready);
            ready.forget();
        }
        None => {
            warn!("document.fonts unavailable, assuming resources ready");
            timers.after(
                FONTS_FALLBACK_MS,
                Box::new(|| {
                    with_app(App::resources_ready);
                }),
            );
        }
    }
}

fn start() -> Result<()> {
    let window = web_sys::window().ok_or_else(|| SensoryError::MissingElement("window".into()))?;
    let document = window
        .document()
        .ok_or_else(|| SensoryError::MissingElement("document".into()))?;

    let config = Config::default();
    let timers = Rc::new(DomTimers::new(window.clone()));
    let hosts = Hosts {
        timers: timers.clone(),
        frames: Rc::new(DomFrames::new(window.clone())),
        observer: Rc::new(DomObserver::new(&config.reveal.observer_options()?)?),
        window: Rc::new(DomWindow::new(window)),
    };

    let mut app = App::new(config, hosts)?;
    app.init(collect_page(&document));
    APP.with(|slot| *slot.borrow_mut() = Some(app));

    bind_clicks(&document);
    watch_resources(&document, &timers);
    Ok(())
}

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();

    match start() {
        Ok(()) => info!("sensorial: page ready"),
        Err(e) => error!("sensorial: init failed: {}", e),
    }
}

/// ページを片付ける: リスナーを外し、表示待ちの監視をやめる
#[wasm_bindgen]
pub fn shutdown() {
    APP.with(|slot| {
        if let Some(mut app) = slot.borrow_mut().take() {
            app.shutdown();
        }
    });
}
