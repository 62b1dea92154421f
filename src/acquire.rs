//! Blocking acquire with cancellation / 可取消的阻塞获取
//!
//! Polls [`create`] on a fixed period until the lock frees, a fatal
//! error occurs, or the token cancels. No retry cap: cancellation is
//! the only bound on the wait.
//! 按固定周期轮询 [`create`]，直到锁释放、出现致命错误或令牌取消。
//! 无重试上限：取消是等待的唯一边界。

use std::{
  path::Path,
  sync::{Arc, Condvar, Mutex},
  time::{Duration, Instant},
};

use crate::{Error, LockFile, Result, create, lock};

/// Default poll period / 默认轮询周期
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Inner {
  done: Mutex<bool>,
  cond: Condvar,
}

/// Cooperative cancellation token / 协作式取消令牌
///
/// Clone to share across threads; [`cancel`](Cancel::cancel) wakes
/// every waiter at once, mid-wait included.
/// 克隆以跨线程共享；cancel 会立刻唤醒所有等待者，包括等待中的。
#[derive(Clone, Default)]
pub struct Cancel(Arc<Inner>);

impl Cancel {
  #[inline]
  pub fn new() -> Self {
    Self::default()
  }

  /// Signal cancellation / 发出取消信号
  pub fn cancel(&self) {
    let mut done = lock(&self.0.done);
    *done = true;
    self.0.cond.notify_all();
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool {
    *lock(&self.0.done)
  }

  /// Wait one period, true when cancelled before it elapses
  /// 等待一个周期，周期内被取消时返回 true
  fn wait_for(&self, period: Duration) -> bool {
    let deadline = Instant::now() + period;
    let mut done = lock(&self.0.done);
    while !*done {
      let Some(left) = deadline.checked_duration_since(Instant::now()) else {
        return false;
      };
      // wait_timeout wakes spuriously, loop against the deadline
      // wait_timeout 存在虚假唤醒，按截止时间循环
      let (guard, timeout) = self
        .0
        .cond
        .wait_timeout(done, left)
        .unwrap_or_else(std::sync::PoisonError::into_inner);
      done = guard;
      if timeout.timed_out() {
        return *done;
      }
    }
    true
  }
}

/// Create or open the named file, retrying while it is locked.
/// Success and fatal errors return immediately; Locked waits one
/// `period` and retries. A cancelled token returns Err(Cancelled) at
/// once, before any attempt and mid-wait alike.
/// 创建或打开文件，被锁定时重试。成功与致命错误立即返回；Locked 等待
/// 一个周期后重试。令牌已取消时立即返回 Cancelled，包括首次尝试前与
/// 等待途中。
pub fn acquire(
  cancel: &Cancel,
  path: impl AsRef<Path>,
  perm: u32,
  period: Duration,
) -> Result<LockFile> {
  let path = path.as_ref();
  if cancel.is_cancelled() {
    return Err(Error::Cancelled);
  }
  loop {
    match create(path, perm) {
      Err(Error::Locked) => {}
      outcome => return outcome,
    }
    if cancel.wait_for(period) {
      return Err(Error::Cancelled);
    }
  }
}
