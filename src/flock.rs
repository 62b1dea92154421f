//! Non-blocking exclusive lock on a descriptor / 描述符上的非阻塞排他锁

use std::fs::File;

use fs4::fs_std::FileExt;

use crate::Result;

/// Try a whole-file exclusive advisory lock without blocking.
/// Ok(true): acquired. Ok(false): held by someone else. Err: OS failure.
/// The lock lives until unlock or descriptor close.
/// 非阻塞尝试整文件排他咨询锁。Ok(true) 获取成功，Ok(false) 被他人持有，
/// Err 为系统错误。锁持续到解锁或描述符关闭。
#[inline]
pub fn try_exclusive(file: &File) -> Result<bool> {
  Ok(file.try_lock_exclusive()?)
}

/// Release the lock placed by [`try_exclusive`] / 释放 [`try_exclusive`] 加的锁
#[inline]
pub fn unlock(file: &File) -> std::io::Result<()> {
  FileExt::unlock(file)
}
