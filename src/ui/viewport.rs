use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SensoryError};

/// 軸に平行な矩形。要素のレイアウト矩形はドキュメント座標
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// 2つの矩形の重なり。辺が接するだけなら空とみなす
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// ドキュメントのうち表示されている部分
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub scroll_x: f32,
    #[serde(default)]
    pub scroll_y: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    pub fn scrolled_to(self, scroll_y: f32) -> Self {
        Self { scroll_y, ..self }
    }

    /// ドキュメント座標の矩形をビューポート座標に変換する
    /// （`getBoundingClientRect` が返すもの）
    pub fn client_rect(&self, layout: Rect) -> Rect {
        layout.translate(-self.scroll_x, -self.scroll_y)
    }

    /// `margin` で拡大・縮小したビューポート座標のルート矩形
    pub fn root_rect(&self, margin: &RootMargin) -> Rect {
        let top = margin.top.resolve(self.height);
        let right = margin.right.resolve(self.width);
        let bottom = margin.bottom.resolve(self.height);
        let left = margin.left.resolve(self.width);
        Rect::new(
            -left,
            -top,
            self.width + left + right,
            self.height + top + bottom,
        )
    }
}

// ========================================
// ルートマージン
// ========================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarginLength {
    Px(f32),
    Percent(f32),
}

impl MarginLength {
    fn resolve(&self, reference: f32) -> f32 {
        match *self {
            MarginLength::Px(px) => px,
            MarginLength::Percent(pct) => reference * pct / 100.0,
        }
    }
}

impl fmt::Display for MarginLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginLength::Px(px) => write!(f, "{}px", px),
            MarginLength::Percent(pct) => write!(f, "{}%", pct),
        }
    }
}

/// オブザーバーのルート周りの CSS 形式マージン。例: `"0px 0px -50px 0px"`
/// 下マージンを負にすると、要素がビューポート下端に届く少し手前で発火する。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: MarginLength,
    pub right: MarginLength,
    pub bottom: MarginLength,
    pub left: MarginLength,
}

impl Default for RootMargin {
    fn default() -> Self {
        let zero = MarginLength::Px(0.0);
        Self {
            top: zero,
            right: zero,
            bottom: zero,
            left: zero,
        }
    }
}

lazy_static! {
    static ref MARGIN_VALUE: Regex = Regex::new(r"^(-?\d+(?:\.\d+)?)(px|%)?$").unwrap();
}

fn parse_length(token: &str, source: &str) -> Result<MarginLength> {
    let caps = MARGIN_VALUE
        .captures(token)
        .ok_or_else(|| SensoryError::Config(format!("invalid root margin {:?}", source)))?;
    let value: f32 = caps[1]
        .parse()
        .map_err(|_| SensoryError::Config(format!("invalid root margin {:?}", source)))?;
    Ok(match caps.get(2).map(|m| m.as_str()) {
        Some("%") => MarginLength::Percent(value),
        _ => MarginLength::Px(value),
    })
}

impl FromStr for RootMargin {
    type Err = SensoryError;

    /// 1〜4 個の値の CSS ショートハンド（上、右、下、左）を受け付ける
    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split_whitespace()
            .map(|token| parse_length(token, s))
            .collect::<Result<Vec<_>>>()?;
        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [v, h] => (*v, *h, *v, *h),
            [t, h, b] => (*t, *h, *b, *h),
            [t, r, b, l] => (*t, *r, *b, *l),
            _ => {
                return Err(SensoryError::Config(format!(
                    "root margin needs 1 to 4 values, got {:?}",
                    s
                )));
            }
        };
        Ok(Self {
            top,
            right,
            bottom,
            left,
        })
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

// ========================================
// 可視判定
// ========================================

/// `target`（ビューポート座標）のうち `root` に含まれる割合
///
/// 面積ゼロのターゲットはルート内にあれば完全に見えているとみなす。
pub fn intersection_ratio(target: Rect, root: Rect) -> f32 {
    let Some(overlap) = target.intersection(&root) else {
        return 0.0;
    };
    let area = target.area();
    if area <= 0.0 {
        return 1.0;
    }
    (overlap.area() / area).clamp(0.0, 1.0)
}

/// `threshold` を設定したオブザーバーが `ratio` を交差と報告するか
pub fn meets_threshold(ratio: f32, threshold: f32) -> bool {
    ratio > 0.0 && ratio >= threshold
}

/// ビューポート座標の矩形に対する同期的な可視判定。縦方向はビューポートの高さの
/// `threshold` から `1 - threshold` の帯にかかる必要があり、横方向は
/// ビューポートに触れていればよい。
pub fn is_element_in_viewport(client: Rect, viewport: &Viewport, threshold: f32) -> bool {
    let vert_in_view = client.y <= viewport.height * (1.0 - threshold)
        && client.bottom() >= viewport.height * threshold;
    let hor_in_view = client.x <= viewport.width && client.right() >= 0.0;
    vert_in_view && hor_in_view
}
