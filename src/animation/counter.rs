//! 数値カウンターのアニメーション
//!
//! 表示テキストを接頭辞・数値・接尾辞に分ける
//! （`"R$ 1.500+"` → `"R$ "`、`1500`、`"+"`）。数値は 0 から目標値まで一定時間、
//! ease-out の4次曲線で1フレームに1回ずつ書き込み、最後は目標値ちょうどで止まる。
//! 開始したカウンターは最後まで走る。ページから外れた要素への書き込みは害がない。

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use log::debug;

use crate::engine::host::{millis, FrameHost, Millis};
use crate::error::{Result, SensoryError};
use crate::ui::element::Element;

use super::easing::ease_out_quart;

/// テキストから読んだ目標値を上書きする属性
pub const TARGET_ATTRIBUTE: &str = "data-target";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSpec {
    pub goal: u64,
    pub prefix: String,
    pub suffix: String,
}

fn digit_span(text: &str) -> Option<(usize, usize)> {
    let first = text.find(|c: char| c.is_ascii_digit())?;
    let last = text.rfind(|c: char| c.is_ascii_digit())?;
    Some((first, last + 1))
}

fn parse_digits(text: &str) -> Result<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(SensoryError::Parse(text.to_string()));
    }
    digits
        .parse()
        .map_err(|_| SensoryError::Parse(text.to_string()))
}

impl CounterSpec {
    /// 目標値・接頭辞・接尾辞をすべて `text` から得る。数字の間の区切り文字は捨てる
    pub fn parse(text: &str) -> Result<Self> {
        let (start, end) = digit_span(text).ok_or_else(|| SensoryError::Parse(text.to_string()))?;
        Ok(Self {
            goal: parse_digits(&text[start..end])?,
            prefix: text[..start].to_string(),
            suffix: text[end..].to_string(),
        })
    }

    /// 接頭辞と接尾辞は `text` から、目標値は引数で指定
    pub fn with_goal(text: &str, goal: u64) -> Self {
        match digit_span(text) {
            Some((start, end)) => Self {
                goal,
                prefix: text[..start].to_string(),
                suffix: text[end..].to_string(),
            },
            None => Self {
                goal,
                prefix: String::new(),
                suffix: String::new(),
            },
        }
    }

    /// [`TARGET_ATTRIBUTE`] があればそこから、なければテキストから目標値を読む
    pub fn from_element(element: &dyn Element) -> Result<Self> {
        let text = element.text();
        match element.attribute(TARGET_ATTRIBUTE) {
            Some(raw) => Ok(Self::with_goal(&text, parse_digits(&raw)?)),
            None => Self::parse(&text),
        }
    }

    pub fn render(&self, value: u64) -> String {
        format!("{}{}{}", self.prefix, value, self.suffix)
    }

    /// `duration` ミリ秒のアニメーションで `elapsed` ミリ秒経過したときの表示値と、
    /// 終了したかどうか
    pub fn value_at(&self, elapsed: Millis, duration: Millis) -> (u64, bool) {
        let progress = if duration <= 0.0 {
            1.0
        } else {
            (elapsed / duration).clamp(0.0, 1.0)
        };
        if progress >= 1.0 {
            return (self.goal, true);
        }
        let eased = ease_out_quart(progress);
        let value = ((self.goal as f64) * eased).floor() as u64;
        (value.min(self.goal), false)
    }
}

struct CounterRun {
    frames: Rc<dyn FrameHost>,
    element: Rc<dyn Element>,
    spec: CounterSpec,
    duration: Millis,
    started_at: Cell<Option<Millis>>,
    on_done: Cell<Option<Box<dyn FnOnce()>>>,
}

impl CounterRun {
    fn schedule(self: Rc<Self>) {
        let frames = Rc::clone(&self.frames);
        frames.request_frame(Box::new(move |timestamp| self.step(timestamp)));
    }

    fn step(self: Rc<Self>, timestamp: Millis) {
        let started_at = match self.started_at.get() {
            Some(at) => at,
            None => {
                self.started_at.set(Some(timestamp));
                timestamp
            }
        };
        let (value, done) = self.spec.value_at(timestamp - started_at, self.duration);
        self.element.set_text(&self.spec.render(value));

        if !done {
            self.schedule();
            return;
        }
        debug!("counter settled at {}", self.spec.render(value));
        if let Some(on_done) = self.on_done.take() {
            on_done();
        }
    }
}

/// 次のフレームで `element` のアニメーションを始める。時間は 0 を表示する
/// 最初のフレームから測る。
pub fn start_counter(
    frames: Rc<dyn FrameHost>,
    element: Rc<dyn Element>,
    spec: CounterSpec,
    duration: Duration,
    on_done: Option<Box<dyn FnOnce()>>,
) {
    debug!("counter start: 0 -> {}", spec.goal);
    let run = Rc::new(CounterRun {
        frames,
        element,
        spec,
        duration: millis(duration),
        started_at: Cell::new(None),
        on_done: Cell::new(on_done),
    });
    run.schedule();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scheduler::Scheduler;
    use crate::ui::element::MemoryElement;
    use crate::ui::viewport::Rect;

    #[test]
    fn test_parse_splits_prefix_number_suffix() {
        let spec = CounterSpec::parse("R$ 1.500+").unwrap();
        assert_eq!(spec.goal, 1500);
        assert_eq!(spec.prefix, "R$ ");
        assert_eq!(spec.suffix, "+");

        let pct = CounterSpec::parse("87%").unwrap();
        assert_eq!((pct.goal, pct.prefix.as_str(), pct.suffix.as_str()), (87, "", "%"));
    }

    #[test]
    fn test_parse_without_digits_fails() {
        assert!(matches!(CounterSpec::parse("N/A"), Err(SensoryError::Parse(_))));
        assert!(matches!(CounterSpec::parse(""), Err(SensoryError::Parse(_))));
        assert!(matches!(
            CounterSpec::parse("99999999999999999999999"),
            Err(SensoryError::Parse(_))
        ));
    }

    #[test]
    fn test_value_at_never_overshoots() {
        let spec = CounterSpec::parse("87%").unwrap();
        assert_eq!(spec.value_at(0.0, 2000.0), (0, false));
        assert_eq!(spec.value_at(1000.0, 2000.0), (81, false));
        assert_eq!(spec.value_at(2000.0, 2000.0), (87, true));
        assert_eq!(spec.value_at(9000.0, 2000.0), (87, true));
    }

    #[test]
    fn test_data_target_attribute_wins() {
        let el = MemoryElement::new("R$ 0", Rect::default()).with_attribute(TARGET_ATTRIBUTE, "1500");
        let spec = CounterSpec::from_element(&el).unwrap();
        assert_eq!(spec.render(spec.goal), "R$ 1500");
    }

    #[test]
    fn test_counter_runs_to_exact_goal() {
        let scheduler = Rc::new(Scheduler::new());
        let el = Rc::new(MemoryElement::new("87%", Rect::default()));
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();

        start_counter(
            scheduler.clone(),
            el.clone(),
            CounterSpec::parse("87%").unwrap(),
            Duration::from_millis(2000),
            Some(Box::new(move || flag.set(true))),
        );
        scheduler.advance(1000.0);
        assert!(!done.get());
        scheduler.advance(1100.0);

        assert!(done.get());
        assert_eq!(el.text(), "87%");
        let history = el.text_history();
        assert_eq!(history.first().map(String::as_str), Some("0%"));
        assert_eq!(scheduler.pending_frames(), 0);
    }
}
