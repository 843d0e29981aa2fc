use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use super::viewport::Rect;

/// このクレートが読み書きする DOM 要素の一部
///
/// メソッドはすべて `&self` を取る。要素は共有ハンドルで、DOM ノードと同じく
/// ホスト経由で変更される。
pub trait Element {
    /// `id` 属性（あれば）
    fn id(&self) -> Option<String>;

    fn text(&self) -> String;
    fn set_text(&self, text: &str);

    /// ドキュメント座標でのレイアウト矩形（`offsetTop` / `offsetHeight`）
    fn layout_rect(&self) -> Rect;

    fn has_class(&self, class: &str) -> bool;
    fn set_class(&self, class: &str, on: bool);

    fn style(&self, property: &str) -> Option<String>;
    fn set_style(&self, property: &str, value: &str);

    fn attribute(&self, name: &str) -> Option<String>;
    fn set_attribute(&self, name: &str, value: &str);
}

// ========================================
// メモリ上の要素
// ========================================

/// 素のデータで表した要素。シーンランナーとテストで使う
///
/// テキストの書き込みはすべて [`MemoryElement::text_history`] に残る。
pub struct MemoryElement {
    id: Option<String>,
    text: RefCell<String>,
    rect: Cell<Rect>,
    classes: RefCell<BTreeSet<String>>,
    styles: RefCell<BTreeMap<String, String>>,
    attributes: RefCell<BTreeMap<String, String>>,
    history: RefCell<Vec<String>>,
}

impl MemoryElement {
    pub fn new(text: impl Into<String>, rect: Rect) -> Self {
        Self {
            id: None,
            text: RefCell::new(text.into()),
            rect: Cell::new(rect),
            classes: RefCell::new(BTreeSet::new()),
            styles: RefCell::new(BTreeMap::new()),
            attributes: RefCell::new(BTreeMap::new()),
            history: RefCell::new(Vec::new()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn set_rect(&self, rect: Rect) {
        self.rect.set(rect);
    }

    pub fn text_history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }

    pub fn classes(&self) -> Vec<String> {
        self.classes.borrow().iter().cloned().collect()
    }

    pub fn styles(&self) -> BTreeMap<String, String> {
        self.styles.borrow().clone()
    }

    pub fn snapshot(&self) -> ElementSnapshot {
        ElementSnapshot {
            id: self.id.clone(),
            text: self.text.borrow().clone(),
            classes: self.classes(),
            styles: self.styles(),
            text_writes: self.history.borrow().len(),
        }
    }
}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryElement")
            .field("id", &self.id)
            .field("text", &*self.text.borrow())
            .field("classes", &*self.classes.borrow())
            .finish()
    }
}

impl Element for MemoryElement {
    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn text(&self) -> String {
        self.text.borrow().clone()
    }

    fn set_text(&self, text: &str) {
        *self.text.borrow_mut() = text.to_string();
        self.history.borrow_mut().push(text.to_string());
    }

    fn layout_rect(&self) -> Rect {
        self.rect.get()
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.borrow().contains(class)
    }

    fn set_class(&self, class: &str, on: bool) {
        let mut classes = self.classes.borrow_mut();
        if on {
            classes.insert(class.to_string());
        } else {
            classes.remove(class);
        }
    }

    fn style(&self, property: &str) -> Option<String> {
        self.styles.borrow().get(property).cloned()
    }

    fn set_style(&self, property: &str, value: &str) {
        let mut styles = self.styles.borrow_mut();
        if value.is_empty() {
            styles.remove(property);
        } else {
            styles.insert(property.to_string(), value.to_string());
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }
}

/// ある時点の [`MemoryElement`] のシリアライズ可能なビュー
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSnapshot {
    pub id: Option<String>,
    pub text: String,
    pub classes: Vec<String>,
    pub styles: BTreeMap<String, String>,
    pub text_writes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_toggle() {
        let el = MemoryElement::new("", Rect::default());
        el.set_class("active", true);
        el.set_class("active", true);
        assert!(el.has_class("active"));
        assert_eq!(el.classes(), vec!["active"]);
        el.set_class("active", false);
        assert!(!el.has_class("active"));
    }

    #[test]
    fn test_empty_style_value_clears_property() {
        let el = MemoryElement::new("", Rect::default());
        el.set_style("overflow", "hidden");
        assert_eq!(el.style("overflow").as_deref(), Some("hidden"));
        el.set_style("overflow", "");
        assert_eq!(el.style("overflow"), None);
    }

    #[test]
    fn test_text_history_records_writes() {
        let el = MemoryElement::new("0", Rect::default()).with_id("stat");
        el.set_text("1");
        el.set_text("2");
        assert_eq!(el.text(), "2");
        assert_eq!(el.text_history(), vec!["1", "2"]);
        assert_eq!(el.snapshot().text_writes, 2);
        assert_eq!(el.id().as_deref(), Some("stat"));
    }
}
