// ========================================
// ホストプリミティブ
// ========================================
//
// エンジンがページ側に求める機能はすべてここでトレイトとして表す。
// ブラウザ実装は `dom_host`、テストとシーンランナー用の決定的な実装は
// `engine::scheduler`・`ui::observer`・`ui::window` にある。

use std::fmt;
use std::rc::Rc;

use crate::ui::element::Element;
use crate::ui::viewport::Viewport;

/// ミリ秒。単位と起点は `performance.now()` と同じ
pub type Millis = f64;

/// [`TimerHost::after`] が返すハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// ウィンドウリスナー登録時に返るハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// [`IntersectionHost`] に登録された要素の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// 可視状態の通知1件
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub target: TargetId,
    pub is_intersecting: bool,
    pub ratio: f32,
}

/// 交差通知をまとめて受け取る
pub type IntersectionSink = Rc<dyn Fn(&[Intersection])>;

/// 一度だけ実行される遅延コールバック（`setTimeout` / `clearTimeout`）
pub trait TimerHost {
    /// タイマーの基準となる現在時刻
    fn now(&self) -> Millis;

    /// `delay` ミリ秒後に `callback` を一度だけ実行する
    fn after(&self, delay: Millis, callback: Box<dyn FnOnce()>) -> TimerHandle;

    /// 保留中のタイマーを取り消す。未知のハンドルや発火済みのハンドルは無視
    fn cancel(&self, handle: TimerHandle);
}

/// フレームクロック（`requestAnimationFrame`）
pub trait FrameHost {
    /// 次の再描画の前にフレームのタイムスタンプ付きで `callback` を一度呼ぶ
    fn request_frame(&self, callback: Box<dyn FnOnce(Millis)>);
}

/// ビューポートとの交差を監視する（`IntersectionObserver`）
///
/// 通知は [`IntersectionHost::connect`] で設定したシンクへ非同期に届く。
pub trait IntersectionHost {
    fn connect(&self, sink: IntersectionSink);
    fn observe(&self, target: TargetId, element: Rc<dyn Element>);
    fn unobserve(&self, target: TargetId);
}

/// ページを表示しているスクロール可能なウィンドウ
pub trait WindowHost {
    fn viewport(&self) -> Viewport;
    fn document_height(&self) -> f32;
    fn scroll_to(&self, y: f32);
    fn add_scroll_listener(&self, listener: Rc<dyn Fn()>) -> ListenerId;
    fn add_resize_listener(&self, listener: Rc<dyn Fn()>) -> ListenerId;
    fn remove_listener(&self, id: ListenerId);
}

/// [`crate::app::App`] の各コンポーネントが共有するホストハンドル
#[derive(Clone)]
pub struct Hosts {
    pub timers: Rc<dyn TimerHost>,
    pub frames: Rc<dyn FrameHost>,
    pub observer: Rc<dyn IntersectionHost>,
    pub window: Rc<dyn WindowHost>,
}

/// `Duration` をホストのミリ秒に変換する
pub fn millis(duration: std::time::Duration) -> Millis {
    duration.as_secs_f64() * 1000.0
}
