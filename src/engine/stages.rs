//! 名前と長さを持つステージの列
//!
//! 入れ子の `setTimeout` コールバックの代わり。シーケンスは有限個のステージで、
//! それぞれ自分の長さの間だけ現在のステージになり、1つの [`TimerHost`] で駆動される。
//! 現在のステージはいつでも参照できるので、仮想時計の上でそのままテストできる。

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::debug;

use super::host::{millis, TimerHandle, TimerHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub name: &'static str,
    pub duration: Duration,
}

impl Stage {
    pub const fn new(name: &'static str, duration: Duration) -> Self {
        Self { name, duration }
    }
}

struct Progress {
    current: Option<usize>,
    timer: Option<TimerHandle>,
    completed_runs: u32,
}

struct Inner {
    timers: Rc<dyn TimerHost>,
    stages: Vec<Stage>,
    on_enter: RefCell<Box<dyn FnMut(&Stage)>>,
    progress: RefCell<Progress>,
}

/// シーケンス1つへのクローン可能なハンドル
#[derive(Clone)]
pub struct StageSequence {
    inner: Rc<Inner>,
}

impl StageSequence {
    /// ステージが現在になるたびに `on_enter` が呼ばれる
    pub fn new<F>(timers: Rc<dyn TimerHost>, stages: Vec<Stage>, on_enter: F) -> Self
    where
        F: FnMut(&Stage) + 'static,
    {
        Self {
            inner: Rc::new(Inner {
                timers,
                stages,
                on_enter: RefCell::new(Box::new(on_enter)),
                progress: RefCell::new(Progress {
                    current: None,
                    timer: None,
                    completed_runs: 0,
                }),
            }),
        }
    }

    /// 最初のステージに入る。実行中またはステージが空なら `false`
    pub fn start(&self) -> bool {
        if self.is_running() || self.inner.stages.is_empty() {
            return false;
        }
        Inner::enter(&self.inner, 0);
        true
    }

    pub fn is_running(&self) -> bool {
        self.inner.progress.borrow().current.is_some()
    }

    pub fn current_stage(&self) -> Option<&'static str> {
        let index = self.inner.progress.borrow().current?;
        Some(self.inner.stages[index].name)
    }

    /// 最後まで実行し終えた回数
    pub fn completed_runs(&self) -> u32 {
        self.inner.progress.borrow().completed_runs
    }

    pub fn stages(&self) -> &[Stage] {
        &self.inner.stages
    }

    /// 残りのステージを実行せずに止める
    pub fn stop(&self) {
        let mut progress = self.inner.progress.borrow_mut();
        progress.current = None;
        if let Some(handle) = progress.timer.take() {
            self.inner.timers.cancel(handle);
        }
    }
}

impl Inner {
    fn enter(this: &Rc<Self>, index: usize) {
        let stage = this.stages[index];
        {
            let mut progress = this.progress.borrow_mut();
            progress.current = Some(index);
            if let Some(handle) = progress.timer.take() {
                this.timers.cancel(handle);
            }
        }
        debug!("stage {} ({}/{})", stage.name, index + 1, this.stages.len());

        {
            let mut on_enter = this.on_enter.borrow_mut();
            (*on_enter)(&stage);
        }

        let weak: Weak<Self> = Rc::downgrade(this);
        let handle = this.timers.after(
            millis(stage.duration),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.progress.borrow_mut().timer = None;
                    Inner::leave(&inner, index);
                }
            }),
        );
        this.progress.borrow_mut().timer = Some(handle);
    }

    fn leave(this: &Rc<Self>, index: usize) {
        if this.progress.borrow().current != Some(index) {
            return;
        }
        if index + 1 < this.stages.len() {
            Inner::enter(this, index + 1);
        } else {
            let mut progress = this.progress.borrow_mut();
            progress.current = None;
            progress.completed_runs += 1;
        }
    }
}
