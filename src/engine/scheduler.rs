//! 仮想時間で動く協調スケジューラ
//!
//! [`TimerHost`] と [`FrameHost`] を、所有者が [`Scheduler::advance`] か
//! [`Scheduler::advance_to`] を呼んだときだけ進む時計の上に実装する。
//! フレームは一定間隔（既定 16ms）で、要求があったときだけ進む。同じ時刻の
//! タイマーは仕掛けた順に発火し、同時刻のフレームより先に実行される。
//!
//! コールバック実行中は内部の借用を持たないので、新しいタイマーや次の
//! フレームを自由に要求できる。

use std::cell::RefCell;

use log::trace;

use super::host::{FrameHost, Millis, TimerHandle, TimerHost};

/// 既定のフレーム間隔（約 60fps）
pub const FRAME_INTERVAL_MS: Millis = 16.0;

struct Timer {
    handle: TimerHandle,
    due: Millis,
    callback: Box<dyn FnOnce()>,
}

struct Inner {
    now: Millis,
    next_handle: u64,
    timers: Vec<Timer>,
    frames: Vec<Box<dyn FnOnce(Millis)>>,
    frame_interval: Millis,
    frames_run: u64,
}

pub struct Scheduler {
    inner: RefCell<Inner>,
}

enum Next {
    Timer(usize),
    Frame(Millis),
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_frame_interval(FRAME_INTERVAL_MS)
    }

    pub fn with_frame_interval(frame_interval: Millis) -> Self {
        Self {
            inner: RefCell::new(Inner {
                now: 0.0,
                next_handle: 1,
                timers: Vec::new(),
                frames: Vec::new(),
                frame_interval: frame_interval.max(1.0),
                frames_run: 0,
            }),
        }
    }

    /// 発火も取り消しもされていないタイマーの数
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// 次のフレームを待っているコールバックの数
    pub fn pending_frames(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    /// 生成以降に進んだフレーム数
    pub fn frames_run(&self) -> u64 {
        self.inner.borrow().frames_run
    }

    pub fn is_idle(&self) -> bool {
        let inner = self.inner.borrow();
        inner.timers.is_empty() && inner.frames.is_empty()
    }

    /// 時計を `delta` ミリ秒進める
    pub fn advance(&self, delta: Millis) {
        let target = self.now() + delta.max(0.0);
        self.advance_to(target);
    }

    /// 時計を `target` まで進め、途中で期限が来たタイマーとフレームをすべて実行する。
    /// 過去の時刻を指定した場合は何もしない
    pub fn advance_to(&self, target: Millis) {
        while let Some(next) = self.next_due(target) {
            match next {
                Next::Timer(index) => {
                    let timer = {
                        let mut inner = self.inner.borrow_mut();
                        let timer = inner.timers.remove(index);
                        inner.now = inner.now.max(timer.due);
                        timer
                    };
                    trace!("timer {:?} fired at {}ms", timer.handle, timer.due);
                    (timer.callback)();
                }
                Next::Frame(at) => self.tick_frame(at),
            }
        }
        let mut inner = self.inner.borrow_mut();
        inner.now = inner.now.max(target);
    }

    /// フレーム単位で `count` 回進める。フレーム要求がなくなったら途中で止まる。
    /// 実行したフレーム数を返す
    pub fn run_frames(&self, count: usize) -> usize {
        let mut ran = 0;
        while ran < count && self.pending_frames() > 0 {
            let at = {
                let inner = self.inner.borrow();
                ((inner.now / inner.frame_interval).floor() + 1.0) * inner.frame_interval
            };
            self.advance_to(at);
            ran += 1;
        }
        ran
    }

    /// 保留がなくなるまで進める。`limit` ミリ秒で打ち切る。
    /// アイドルになったら `true`
    pub fn run_until_idle(&self, limit: Millis) -> bool {
        let deadline = self.now() + limit;
        while !self.is_idle() {
            let Some(next) = self.next_due(deadline) else {
                return false;
            };
            let at = match next {
                Next::Timer(index) => self.inner.borrow().timers[index].due,
                Next::Frame(at) => at,
            };
            self.advance_to(at);
        }
        true
    }

    fn next_due(&self, limit: Millis) -> Option<Next> {
        let inner = self.inner.borrow();

        // Vec の順序が登録順なので、同じ時刻なら先頭が勝つ
        let timer = inner
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= limit)
            .fold(None::<(usize, Millis)>, |best, (i, t)| match best {
                Some((_, due)) if due <= t.due => best,
                _ => Some((i, t.due)),
            });

        let frame = if inner.frames.is_empty() {
            None
        } else {
            let interval = inner.frame_interval;
            let at = ((inner.now / interval).floor() + 1.0) * interval;
            (at <= limit).then_some(at)
        };

        match (timer, frame) {
            (Some((index, due)), Some(at)) if due <= at => Some(Next::Timer(index)),
            (_, Some(at)) => Some(Next::Frame(at)),
            (Some((index, _)), None) => Some(Next::Timer(index)),
            (None, None) => None,
        }
    }

    fn tick_frame(&self, at: Millis) {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            inner.now = inner.now.max(at);
            inner.frames_run += 1;
            std::mem::take(&mut inner.frames)
        };
        trace!("frame at {}ms ({} callbacks)", at, callbacks.len());
        for callback in callbacks {
            callback(at);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerHost for Scheduler {
    fn now(&self) -> Millis {
        self.inner.borrow().now
    }

    fn after(&self, delay: Millis, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = TimerHandle(inner.next_handle);
        inner.next_handle += 1;
        let due = inner.now + delay.max(0.0);
        inner.timers.push(Timer {
            handle,
            due,
            callback,
        });
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        self.inner.borrow_mut().timers.retain(|t| t.handle != handle);
    }
}

impl FrameHost for Scheduler {
    fn request_frame(&self, callback: Box<dyn FnOnce(Millis)>) {
        self.inner.borrow_mut().frames.push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn FnOnce()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &str| {
            let sink = sink.clone();
            let name = name.to_string();
            Box::new(move || sink.borrow_mut().push(name)) as Box<dyn FnOnce()>
        };
        (log, make)
    }

    #[test]
    fn test_timers_fire_in_due_then_arming_order() {
        let scheduler = Scheduler::new();
        let (log, make) = recorder();

        scheduler.after(50.0, make("late"));
        scheduler.after(10.0, make("first"));
        scheduler.after(10.0, make("second"));

        scheduler.advance(9.0);
        assert!(log.borrow().is_empty());

        scheduler.advance(100.0);
        assert_eq!(*log.borrow(), vec!["first", "second", "late"]);
        assert_eq!(scheduler.now(), 109.0);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let scheduler = Scheduler::new();
        let (log, make) = recorder();

        let handle = scheduler.after(10.0, make("cancelled"));
        scheduler.after(20.0, make("kept"));
        scheduler.cancel(handle);
        scheduler.cancel(TimerHandle(999));

        scheduler.advance(30.0);
        assert_eq!(*log.borrow(), vec!["kept"]);
    }

    #[test]
    fn test_timer_sees_its_own_due_time() {
        let scheduler = Rc::new(Scheduler::new());
        let seen = Rc::new(RefCell::new(None));

        let clock = scheduler.clone();
        let slot = seen.clone();
        scheduler.after(
            42.0,
            Box::new(move || *slot.borrow_mut() = Some(clock.now())),
        );
        scheduler.advance(100.0);

        assert_eq!(*seen.borrow(), Some(42.0));
    }

    #[test]
    fn test_frames_only_tick_when_requested() {
        let scheduler = Rc::new(Scheduler::new());
        scheduler.advance(100.0);
        assert_eq!(scheduler.frames_run(), 0);

        let stamps = Rc::new(RefCell::new(Vec::new()));
        let frames = scheduler.clone();
        let out = stamps.clone();
        scheduler.request_frame(Box::new(move |first: Millis| {
            out.borrow_mut().push(first);
            let out = out.clone();
            frames.request_frame(Box::new(move |second: Millis| out.borrow_mut().push(second)));
        }));

        scheduler.advance(100.0);
        assert_eq!(*stamps.borrow(), vec![112.0, 128.0]);
        assert_eq!(scheduler.frames_run(), 2);
    }

    #[test]
    fn test_timer_armed_inside_callback_runs_in_same_advance() {
        let scheduler = Rc::new(Scheduler::new());
        let (log, make) = recorder();

        let inner = scheduler.clone();
        let nested = make("nested");
        scheduler.after(
            5.0,
            Box::new(move || {
                inner.after(5.0, nested);
            }),
        );

        scheduler.advance(10.0);
        assert_eq!(*log.borrow(), vec!["nested"]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_run_until_idle_gives_up_at_limit() {
        let scheduler = Scheduler::new();
        let (_log, make) = recorder();
        scheduler.after(500.0, make("far"));

        assert!(!scheduler.run_until_idle(100.0));
        assert_eq!(scheduler.pending_timers(), 1);
        assert!(scheduler.run_until_idle(1000.0));
        assert_eq!(scheduler.now(), 500.0);
    }

    #[test]
    fn test_run_frames_stops_when_nothing_requested() {
        let scheduler = Rc::new(Scheduler::new());
        let count = Rc::new(RefCell::new(0));

        let frames = scheduler.clone();
        let out = count.clone();
        scheduler.request_frame(Box::new(move |_: Millis| {
            *out.borrow_mut() += 1;
            let out = out.clone();
            frames.request_frame(Box::new(move |_: Millis| *out.borrow_mut() += 1));
        }));

        assert_eq!(scheduler.run_frames(5), 2);
        assert_eq!(*count.borrow(), 2);
        assert_eq!(scheduler.now(), 32.0);
    }

    #[test]
    fn test_advance_to_past_is_noop() {
        let scheduler = Scheduler::new();
        scheduler.advance(50.0);
        scheduler.advance_to(10.0);
        assert_eq!(scheduler.now(), 50.0);
    }
}
