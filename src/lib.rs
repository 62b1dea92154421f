#![cfg_attr(docsrs, feature(doc_cfg))]

//! # flockfile - Process-exclusive locked files / 进程排他锁文件
//!
//! Opening a file also locks it: an OS advisory lock excludes other
//! processes, an in-process registry excludes other handles in this
//! process. Two handles on one path never coexist.
//! 打开文件即加锁：系统咨询锁排除其他进程，进程内注册表排除本进程的
//! 其他句柄。同一路径不会同时存在两个句柄。
//!
//! ```no_run
//! use std::io::Write;
//!
//! let mut f = flockfile::obtain("app.lock")?;
//! f.write_all(b"pid")?;
//! f.release()?;
//! # Ok::<(), flockfile::Error>(())
//! ```

pub mod acquire;
pub mod error;
pub mod flock;
pub mod registry;

use std::{
  fs::{self, File, OpenOptions},
  io::{self, Read, Seek, SeekFrom, Write},
  path::{Path, PathBuf},
  sync::{Mutex, MutexGuard, PoisonError},
};

pub use acquire::{Cancel, DEFAULT_PERIOD, acquire};
pub use error::{Error, Result};
use log::warn;
pub use registry::Registry;

/// Default permission bits for created files / 创建文件的默认权限位
pub const DEFAULT_PERM: u32 = 0o644;

/// Open, locked file handle / 已加锁的打开文件句柄
///
/// Sole handle for its path in this process while open. [`close`] and
/// [`release`] tear down exactly once; [`Drop`] closes when neither ran.
/// 打开期间是本进程内该路径的唯一句柄。[`close`] 与 [`release`] 只销毁
/// 一次；两者都未调用时由 [`Drop`] 关闭。
///
/// [`close`]: LockFile::close
/// [`release`]: LockFile::release
pub struct LockFile {
  /// None after teardown, the one-shot guard / 销毁后为 None，一次性守卫
  file: Option<File>,
  key: PathBuf,
}

/// Open the named file read-only and lock it / 以只读方式打开并加锁
pub fn open(path: impl AsRef<Path>) -> Result<LockFile> {
  open_file(path, OpenOptions::new().read(true))
}

/// Open the named file with the given options, then lock it.
/// Err(Locked) when any holder, in or out of process, already has it.
/// A failed attempt leaves no registry entry and no open descriptor.
/// 以给定选项打开并加锁。进程内外任一持有者存在时返回 Locked。
/// 失败的尝试不留下注册表条目或打开的描述符。
pub fn open_file(path: impl AsRef<Path>, opts: &OpenOptions) -> Result<LockFile> {
  let path = path.as_ref();
  let key = std::path::absolute(path)?;
  let registry = Registry::global();
  registry.reserve(&key)?;
  match open_and_lock(path, opts) {
    Ok(file) => {
      registry.confirm(&key);
      Ok(LockFile {
        file: Some(file),
        key,
      })
    }
    Err(err) => {
      registry.remove(&key);
      Err(err)
    }
  }
}

fn open_and_lock(path: &Path, opts: &OpenOptions) -> Result<File> {
  // descriptor closes on drop for every failure below
  // 以下任一失败时描述符随 drop 关闭
  let file = opts.open(path)?;
  if flock::try_exclusive(&file)? {
    Ok(file)
  } else {
    Err(Error::Locked)
  }
}

/// Create or open the named file read-write and lock it.
/// Existing files are not truncated; missing files are created with
/// mode `perm` (before umask). Losing a create race to another process
/// reports Locked, and a file created without winning the lock is
/// deleted best-effort.
/// 以读写方式创建或打开并加锁。已有文件不截断；缺失文件以 `perm`
/// 权限创建（umask 之前）。创建竞争失败报告 Locked，创建了文件却未
/// 获得锁时尽力删除该文件。
pub fn create(path: impl AsRef<Path>, perm: u32) -> Result<LockFile> {
  let path = path.as_ref();
  let mut rw = OpenOptions::new();
  rw.read(true).write(true);
  match open_file(path, &rw) {
    Err(Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => {}
    outcome => return outcome,
  }

  let mut new = OpenOptions::new();
  new.read(true).write(true).create_new(true);
  #[cfg(unix)]
  {
    use std::os::unix::fs::OpenOptionsExt;
    new.mode(perm);
  }
  #[cfg(not(unix))]
  let _ = perm;

  match open_file(path, &new) {
    Err(Error::Locked) => {
      // the file may exist now only because this attempt created it
      // 文件可能仅因本次尝试而存在
      if let Err(err) = fs::remove_file(path) {
        warn!("remove unlocked create failed: {}, err={err}", path.display());
      }
      Err(Error::Locked)
    }
    // lost the create race, someone else owns the path now
    // 创建竞争失败，路径已被他人占有
    Err(Error::Io(err)) if err.kind() == io::ErrorKind::AlreadyExists => Err(Error::Locked),
    outcome => outcome,
  }
}

/// Create or open with [`DEFAULT_PERM`] / 以 [`DEFAULT_PERM`] 创建或打开
#[inline]
pub fn obtain(path: impl AsRef<Path>) -> Result<LockFile> {
  create(path, DEFAULT_PERM)
}

impl LockFile {
  /// Absolute path the lock is registered under / 锁注册的绝对路径
  #[inline]
  pub fn path(&self) -> &Path {
    &self.key
  }

  /// Underlying file, None after teardown / 底层文件，销毁后为 None
  #[inline]
  pub fn file(&self) -> Option<&File> {
    self.file.as_ref()
  }

  #[inline]
  pub fn file_mut(&mut self) -> Option<&mut File> {
    self.file.as_mut()
  }

  /// Unlock, close and deregister. Later calls, including a later
  /// [`release`](LockFile::release), are no-ops returning Ok.
  /// 解锁、关闭并注销。后续调用（含之后的 release）为空操作并返回 Ok。
  pub fn close(&mut self) -> Result<()> {
    self.teardown(false)
  }

  /// Delete the file from disk (best-effort), then unlock, close and
  /// deregister. Same one-shot guard as [`close`](LockFile::close).
  /// 尽力删除磁盘文件，然后解锁、关闭并注销。与 close 共用一次性守卫。
  pub fn release(&mut self) -> Result<()> {
    self.teardown(true)
  }

  fn teardown(&mut self, remove: bool) -> Result<()> {
    let Some(file) = self.file.take() else {
      return Ok(());
    };
    if remove && let Err(err) = fs::remove_file(&self.key) {
      warn!("release remove failed: {}, err={err}", self.key.display());
    }
    let unlocked = flock::unlock(&file);
    drop(file);
    Registry::global().remove(&self.key);
    unlocked.map_err(Error::from)
  }
}

impl Drop for LockFile {
  fn drop(&mut self) {
    let _ = self.teardown(false);
  }
}

fn closed() -> io::Error {
  io::Error::other("lock file closed")
}

impl Read for LockFile {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    match &mut self.file {
      Some(file) => file.read(buf),
      None => Err(closed()),
    }
  }
}

impl Write for LockFile {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    match &mut self.file {
      Some(file) => file.write(buf),
      None => Err(closed()),
    }
  }

  fn flush(&mut self) -> io::Result<()> {
    match &mut self.file {
      Some(file) => file.flush(),
      None => Err(closed()),
    }
  }
}

impl Seek for LockFile {
  fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
    match &mut self.file {
      Some(file) => file.seek(pos),
      None => Err(closed()),
    }
  }
}

/// Registry critical sections never leave partial state, absorb poison
/// 注册表临界区不会留下中间状态，忽略锁中毒
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
