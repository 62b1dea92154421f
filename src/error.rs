//! Error types / 错误类型

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  /// Another holder owns the lock, retry may succeed
  /// 锁被其他持有者占用，重试可能成功
  #[error("file locked / 文件已锁定")]
  Locked,

  /// Waiting acquire was cancelled / 等待获取被取消
  #[error("acquire cancelled / 获取已取消")]
  Cancelled,

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  /// True when the error is lock contention / 是否为锁竞争错误
  #[inline]
  pub fn is_locked(&self) -> bool {
    matches!(self, Self::Locked)
  }
}
