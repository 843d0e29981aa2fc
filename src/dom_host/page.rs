//! 実際のドキュメントからページ要素を検索する

use std::rc::Rc;

use log::debug;
use wasm_bindgen::JsCast;

use crate::app::Page;
use crate::error::SensoryError;
use crate::page::navigation::{NavElements, NavLink, Section};
use crate::ui::element::Element;

use super::DomElement;

pub const LOADING_SCREEN: &str = "#loading-screen";
pub const NAVBAR: &str = "#navbar";
pub const NAV_TOGGLE: &str = "#nav-toggle";
pub const NAV_MENU: &str = "#nav-menu";
pub const NAV_LINKS: &str = ".nav-link";
pub const SCROLL_PROGRESS: &str = "#scroll-progress";
pub const SECTIONS: &str = "section[id]";
pub const COUNTERS: &str = ".stat-number, .metric-number, .highlight-number";
pub const ANIMATED: &str = "[data-animate]";
pub const FLOATING: &str = ".floating-element";
pub const BACK_TO_TOP: &str = "#back-to-top";
pub const DOWNLOAD_BUTTONS: &str = ".download-btn";
pub const DOWNLOAD_NAME: &str = ".download-name";

fn wrap(element: web_sys::Element) -> Option<Rc<dyn Element>> {
    let html = element.dyn_into::<web_sys::HtmlElement>().ok()?;
    Some(Rc::new(DomElement::new(html)))
}

/// `selector` に最初に一致した要素。見つからなければログに残して `None`
pub fn query(document: &web_sys::Document, selector: &str) -> Option<Rc<dyn Element>> {
    match document.query_selector(selector).ok().flatten() {
        Some(element) => wrap(element),
        None => {
            debug!("{}", SensoryError::MissingElement(selector.to_string()));
            None
        }
    }
}

/// `selector` に一致したすべてのノード
pub fn query_nodes(document: &web_sys::Document, selector: &str) -> Vec<web_sys::HtmlElement> {
    let Ok(list) = document.query_selector_all(selector) else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<web_sys::HtmlElement>().ok())
        .collect()
}

pub fn query_all(document: &web_sys::Document, selector: &str) -> Vec<Rc<dyn Element>> {
    query_nodes(document, selector)
        .into_iter()
        .map(|node| Rc::new(DomElement::new(node)) as Rc<dyn Element>)
        .collect()
}

/// ダウンロードボタン内に書かれたファイル名
pub fn download_name(button: &web_sys::HtmlElement) -> String {
    button
        .query_selector(DOWNLOAD_NAME)
        .ok()
        .flatten()
        .and_then(|node| node.text_content())
        .unwrap_or_else(|| "unknown".to_string())
}

/// アプリが扱う要素を `document` からすべて集める
pub fn collect_page(document: &web_sys::Document) -> Page {
    let links = query_nodes(document, NAV_LINKS)
        .into_iter()
        .map(|node| NavLink {
            href: node.get_attribute("href").unwrap_or_default(),
            element: Rc::new(DomElement::new(node)),
        })
        .collect();
    let sections = query_nodes(document, SECTIONS)
        .into_iter()
        .map(|node| Section {
            id: node.id(),
            element: Rc::new(DomElement::new(node)),
        })
        .collect();

    let nav = NavElements {
        nav: query(document, NAVBAR),
        toggle: query(document, NAV_TOGGLE),
        menu: query(document, NAV_MENU),
        progress_bar: query(document, SCROLL_PROGRESS),
        body: document
            .body()
            .map(|body| Rc::new(DomElement::new(body)) as Rc<dyn Element>),
        links,
        sections,
    };

    let downloads = query_nodes(document, DOWNLOAD_BUTTONS)
        .into_iter()
        .map(|node| {
            let name = download_name(&node);
            (name, Rc::new(DomElement::new(node)) as Rc<dyn Element>)
        })
        .collect();

    // カウンターは通常 data-animate も持つので、ノードごとにハンドルは1つだけ
    let counter_nodes = query_nodes(document, COUNTERS);
    let animated = query_nodes(document, ANIMATED)
        .into_iter()
        .filter(|node| !counter_nodes.iter().any(|c| c.is_same_node(Some(node.as_ref()))))
        .map(|node| Rc::new(DomElement::new(node)) as Rc<dyn Element>)
        .collect();
    let counters = counter_nodes
        .into_iter()
        .map(|node| Rc::new(DomElement::new(node)) as Rc<dyn Element>)
        .collect();

    Page {
        loading_screen: query(document, LOADING_SCREEN),
        nav,
        counters,
        animated,
        floating: query_all(document, FLOATING),
        back_to_top: query(document, BACK_TO_TOP),
        downloads,
    }
}
