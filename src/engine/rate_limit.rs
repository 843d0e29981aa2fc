//! 高頻度イベント向けの debounce / throttle ラッパー
//!
//! ラッパーは、いずれかのクローンが生きている間 [`TimerState`] を保持する。
//! ラッパーが仕掛けたタイマーは弱参照しか持たないので、最後のクローンを
//! 破棄すると保留中のタイマーはすべて何もしなくなる。
//!
//! ラップしたアクション内の panic は捕捉しない。アクションから自分の
//! ラッパーを再入的に呼んではならない。

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::trace;

use super::host::{millis, Millis, TimerHandle, TimerHost};

/// ラップしたアクション1つ分の管理情報
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TimerState {
    /// アクションが最後に実行された時刻
    pub last_invoked: Option<Millis>,
    /// ラッパーが現在仕掛けているタイマー
    pub pending: Option<TimerHandle>,
    /// throttle 専用: 呼び出しを破棄している最中
    pub suppressed: bool,
}

struct Wrapped<A> {
    timers: Rc<dyn TimerHost>,
    action: RefCell<Box<dyn FnMut(A)>>,
    window: Millis,
    state: RefCell<TimerState>,
}

impl<A> Wrapped<A> {
    fn new<F>(timers: Rc<dyn TimerHost>, action: F, window: Duration) -> Self
    where
        F: FnMut(A) + 'static,
    {
        Self {
            timers,
            action: RefCell::new(Box::new(action)),
            window: millis(window),
            state: RefCell::new(TimerState::default()),
        }
    }

    fn invoke(&self, args: A) {
        self.state.borrow_mut().last_invoked = Some(self.timers.now());
        let mut action = self.action.borrow_mut();
        (*action)(args);
    }

    fn clear_pending(&self) {
        if let Some(handle) = self.state.borrow_mut().pending.take() {
            self.timers.cancel(handle);
        }
    }

    fn arm(&self, callback: Box<dyn FnOnce()>) {
        self.clear_pending();
        let handle = self.timers.after(self.window, callback);
        self.state.borrow_mut().pending = Some(handle);
    }

    fn snapshot(&self) -> TimerState {
        *self.state.borrow()
    }
}

// ========================================
// Debounce
// ========================================

/// 呼び出しが待機時間いっぱい途切れたらアクションを一度実行する
pub struct Debounced<A> {
    inner: Rc<Wrapped<A>>,
    immediate: bool,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            immediate: self.immediate,
        }
    }
}

/// 後縁 debounce: 最後の呼び出しから `wait` 後に、その呼び出しの引数で
/// `action` を実行する
pub fn debounce<A, F>(timers: Rc<dyn TimerHost>, action: F, wait: Duration) -> Debounced<A>
where
    A: 'static,
    F: FnMut(A) + 'static,
{
    Debounced {
        inner: Rc::new(Wrapped::new(timers, action, wait)),
        immediate: false,
    }
}

/// 前縁 debounce: 静かな期間の最初の呼び出しで `action` を同期実行する。
/// 以降の呼び出しは期間の終わりを延ばすだけ
pub fn debounce_immediate<A, F>(
    timers: Rc<dyn TimerHost>,
    action: F,
    wait: Duration,
) -> Debounced<A>
where
    A: 'static,
    F: FnMut(A) + 'static,
{
    Debounced {
        inner: Rc::new(Wrapped::new(timers, action, wait)),
        immediate: true,
    }
}

impl<A: 'static> Debounced<A> {
    pub fn call(&self, args: A) {
        let quiet = self.inner.state.borrow().pending.is_none();
        let (now, later) = match (self.immediate, quiet) {
            (true, true) => (Some(args), None),
            (true, false) => (None, None),
            (false, _) => (None, Some(args)),
        };

        let weak: Weak<Wrapped<A>> = Rc::downgrade(&self.inner);
        self.inner.arm(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.state.borrow_mut().pending = None;
            if let Some(args) = later {
                inner.invoke(args);
            }
        }));

        match now {
            Some(args) => self.inner.invoke(args),
            None => trace!("debounce: call deferred"),
        }
    }

    /// 待機時間の経過を待っている呼び出しがある
    pub fn is_pending(&self) -> bool {
        self.inner.state.borrow().pending.is_some()
    }

    pub fn last_invoked(&self) -> Option<Millis> {
        self.inner.state.borrow().last_invoked
    }

    pub fn state(&self) -> TimerState {
        self.inner.snapshot()
    }
}

// ========================================
// Throttle
// ========================================

/// 制限時間ごとに最大一度だけ実行し、その間の呼び出しは破棄する
pub struct Throttled<A> {
    inner: Rc<Wrapped<A>>,
}

impl<A> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

pub fn throttle<A, F>(timers: Rc<dyn TimerHost>, action: F, limit: Duration) -> Throttled<A>
where
    A: 'static,
    F: FnMut(A) + 'static,
{
    Throttled {
        inner: Rc::new(Wrapped::new(timers, action, limit)),
    }
}

impl<A: 'static> Throttled<A> {
    /// 実行したら `true`、破棄したら `false`
    pub fn call(&self, args: A) -> bool {
        if self.inner.state.borrow().suppressed {
            trace!("throttle: call dropped");
            return false;
        }

        self.inner.state.borrow_mut().suppressed = true;
        let weak: Weak<Wrapped<A>> = Rc::downgrade(&self.inner);
        self.inner.arm(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut state = inner.state.borrow_mut();
                state.suppressed = false;
                state.pending = None;
            }
        }));

        self.inner.invoke(args);
        true
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.state.borrow().suppressed
    }

    pub fn last_invoked(&self) -> Option<Millis> {
        self.inner.state.borrow().last_invoked
    }

    pub fn state(&self) -> TimerState {
        self.inner.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scheduler::Scheduler;
    use proptest::prelude::*;

    fn setup() -> (Rc<Scheduler>, Rc<RefCell<Vec<(Millis, u32)>>>) {
        (Rc::new(Scheduler::new()), Rc::new(RefCell::new(Vec::new())))
    }

    fn recording(
        scheduler: &Rc<Scheduler>,
        calls: &Rc<RefCell<Vec<(Millis, u32)>>>,
    ) -> impl FnMut(u32) + 'static {
        let clock = Rc::clone(scheduler);
        let calls = Rc::clone(calls);
        move |arg| calls.borrow_mut().push((clock.now(), arg))
    }

    #[test]
    fn test_debounce_runs_once_with_last_args() {
        let (scheduler, calls) = setup();
        let debounced = debounce(
            scheduler.clone(),
            recording(&scheduler, &calls),
            Duration::from_millis(250),
        );

        debounced.call(1);
        scheduler.advance(100.0);
        debounced.call(2);
        scheduler.advance(100.0);
        debounced.call(3);
        assert!(debounced.is_pending());
        assert!(calls.borrow().is_empty());

        scheduler.advance(249.0);
        assert!(calls.borrow().is_empty());
        scheduler.advance(1.0);
        assert_eq!(*calls.borrow(), vec![(450.0, 3)]);
        assert!(!debounced.is_pending());
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[test]
    fn test_debounce_immediate_fires_leading_edge_only() {
        let (scheduler, calls) = setup();
        let debounced = debounce_immediate(
            scheduler.clone(),
            recording(&scheduler, &calls),
            Duration::from_millis(100),
        );

        debounced.call(1);
        assert_eq!(*calls.borrow(), vec![(0.0, 1)]);

        scheduler.advance(50.0);
        debounced.call(2);
        scheduler.advance(500.0);
        assert_eq!(calls.borrow().len(), 1);

        // 新しい静かな期間
        debounced.call(3);
        assert_eq!(calls.borrow().last(), Some(&(550.0, 3)));
    }

    #[test]
    fn test_throttle_drops_calls_inside_window() {
        let (scheduler, calls) = setup();
        let throttled = throttle(
            scheduler.clone(),
            recording(&scheduler, &calls),
            Duration::from_millis(100),
        );

        assert!(throttled.call(1));
        assert!(throttled.is_suppressed());
        scheduler.advance(40.0);
        assert!(!throttled.call(2));
        scheduler.advance(60.0);
        assert!(!throttled.is_suppressed());
        assert!(throttled.call(3));

        assert_eq!(*calls.borrow(), vec![(0.0, 1), (100.0, 3)]);
        assert_eq!(throttled.state().last_invoked, Some(100.0));
    }

    #[test]
    fn test_dropped_wrapper_leaves_timer_harmless() {
        let (scheduler, calls) = setup();
        let debounced = debounce(
            scheduler.clone(),
            recording(&scheduler, &calls),
            Duration::from_millis(10),
        );
        debounced.call(7);
        drop(debounced);

        scheduler.advance(50.0);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let (scheduler, calls) = setup();
        let throttled = throttle(
            scheduler.clone(),
            recording(&scheduler, &calls),
            Duration::from_millis(16),
        );
        let other = throttled.clone();

        assert!(throttled.call(1));
        assert!(!other.call(2));
        assert_eq!(calls.borrow().len(), 1);
    }

    /// 最初の時刻から `limit` 以上の間隔で貪欲に選んだ部分列
    fn expected_throttle_times(times: &[Millis], limit: Millis) -> Vec<Millis> {
        let mut out: Vec<Millis> = Vec::new();
        for &t in times {
            match out.last() {
                Some(&last) if t - last < limit => {}
                _ => out.push(t),
            }
        }
        out
    }

    proptest! {
        #[test]
        fn prop_debounce_burst_collapses_to_last_call(
            wait in 1u64..500,
            offsets in prop::collection::vec(0u64..1000, 1..20),
        ) {
            let (scheduler, calls) = setup();
            let debounced = debounce(
                scheduler.clone(),
                recording(&scheduler, &calls),
                Duration::from_millis(wait),
            );

            // バーストを待機時間より短い幅に詰め込む
            let mut times: Vec<Millis> = offsets
                .iter()
                .map(|o| (o % wait) as Millis)
                .collect();
            times.sort_by(|a, b| a.total_cmp(b));

            for (i, t) in times.iter().enumerate() {
                scheduler.advance_to(*t);
                debounced.call(i as u32);
            }
            scheduler.advance(wait as Millis * 2.0);

            let calls = calls.borrow();
            prop_assert_eq!(calls.len(), 1);
            prop_assert_eq!(calls[0].1, (times.len() - 1) as u32);
        }

        #[test]
        fn prop_throttle_keeps_spaced_subsequence(
            limit in 1u64..200,
            gaps in prop::collection::vec(0u64..150, 1..40),
        ) {
            let (scheduler, calls) = setup();
            let throttled = throttle(
                scheduler.clone(),
                recording(&scheduler, &calls),
                Duration::from_millis(limit),
            );

            let mut times = Vec::new();
            let mut t = 0.0;
            for gap in gaps {
                t += gap as Millis;
                times.push(t);
            }
            for (i, t) in times.iter().enumerate() {
                scheduler.advance_to(*t);
                throttled.call(i as u32);
            }

            let seen: Vec<Millis> = calls.borrow().iter().map(|(at, _)| *at).collect();
            prop_assert_eq!(seen, expected_throttle_times(&times, limit as Millis));
        }
    }
}
