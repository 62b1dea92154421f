//! Lock file tests / 锁文件测试

use std::{
  fs,
  io::{Read, Seek, SeekFrom, Write},
  path::PathBuf,
};

use aok::{OK, Void};
use flockfile::{Error, Registry, create, obtain, open};

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

fn temp_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
  dir.path().join(name)
}

/// While a handle is open, every same-process attempt reports Locked
/// 句柄打开期间，本进程内的所有尝试都报告 Locked
#[test]
fn locked_while_open() -> Void {
  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "a.lock");

  let held = create(&path, 0o644)?;
  assert!(matches!(create(&path, 0o644), Err(Error::Locked)));
  assert!(open(&path).err().is_some_and(|err| err.is_locked()));
  assert!(matches!(obtain(&path), Err(Error::Locked)));

  drop(held);
  let _again = create(&path, 0o644)?;
  OK
}

/// Close releases the lock and the registry entry
/// close 释放锁与注册表条目
#[test]
fn close_then_reopen() -> Void {
  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "a.lock");

  let mut held = create(&path, 0o644)?;
  let key = held.path().to_path_buf();
  assert!(Registry::global().contains(&key));

  held.close()?;
  assert!(!Registry::global().contains(&key));

  let _again = create(&path, 0o644)?;
  OK
}

/// Release deletes the file, a later open reports not-exist
/// release 删除文件，之后的 open 报告文件不存在
#[test]
fn release_removes_file() -> Void {
  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "a.lock");

  let mut held = obtain(&path)?;
  held.release()?;
  assert!(!path.exists());

  match open(&path) {
    Err(Error::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
    outcome => panic!("want NotFound, got {outcome:?}", outcome = outcome.map(|_| ())),
  }
  OK
}

/// close then release tears down once, the file survives
/// 先 close 后 release 只销毁一次，文件保留
#[test]
fn close_then_release_noop() -> Void {
  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "a.lock");

  let mut held = obtain(&path)?;
  held.close()?;
  held.release()?;
  assert!(path.exists());
  OK
}

/// release then close tears down once, second call is Ok
/// 先 release 后 close 只销毁一次，第二次调用返回 Ok
#[test]
fn release_then_close_noop() -> Void {
  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "a.lock");

  let mut held = obtain(&path)?;
  held.release()?;
  held.close()?;
  assert!(!path.exists());
  assert!(!Registry::global().contains(held.path()));
  OK
}

/// Created files carry the requested mode bits
/// 创建的文件带有请求的权限位
#[cfg(unix)]
#[test]
fn create_mode_bits() -> Void {
  use std::os::unix::fs::PermissionsExt;

  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "a.lock");

  let _held = create(&path, 0o600)?;
  let mode = fs::metadata(&path)?.permissions().mode();
  assert_eq!(mode & 0o777, 0o600);
  OK
}

/// create on an existing file opens it without truncation
/// create 打开已有文件时不截断
#[test]
fn create_no_truncate() -> Void {
  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "a.lock");

  {
    let mut held = create(&path, 0o644)?;
    held.write_all(b"hello")?;
    held.close()?;
  }

  let mut held = create(&path, 0o644)?;
  assert_eq!(fs::metadata(&path)?.len(), 5);
  let mut buf = String::new();
  held.read_to_string(&mut buf)?;
  assert_eq!(buf, "hello");
  OK
}

/// Racing threads: one winner, the rest Locked, one registry entry
/// 线程竞争：一个成功，其余 Locked，注册表恰好一个条目
#[test]
fn thread_race_single_winner() -> Void {
  const THREADS: usize = 8;

  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "a.lock");
  fs::write(&path, b"")?;

  let results: Vec<_> = std::thread::scope(|scope| {
    let handles: Vec<_> = (0..THREADS)
      .map(|_| {
        let path = &path;
        scope.spawn(move || {
          let mut opts = fs::OpenOptions::new();
          opts.read(true).write(true);
          flockfile::open_file(path, &opts)
        })
      })
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  let won = results.iter().filter(|r| r.is_ok()).count();
  let locked = results
    .iter()
    .filter(|r| matches!(r, Err(Error::Locked)))
    .count();
  assert_eq!(won, 1);
  assert_eq!(locked, THREADS - 1);

  let key = std::path::absolute(&path)?;
  assert!(Registry::global().contains(&key));
  drop(results);
  assert!(!Registry::global().contains(&key));
  OK
}

/// Relative and absolute spellings collide on one registry key
/// 相对与绝对写法命中同一个注册表键
#[test]
fn relative_absolute_alias() -> Void {
  let name = format!("flockfile_alias_{}.lock", fastrand::u64(..));

  let mut held = create(&name, 0o644)?;
  let abs = std::path::absolute(&name)?;
  assert!(matches!(obtain(&abs), Err(Error::Locked)));

  held.release()?;
  assert!(!abs.exists());
  OK
}

/// I/O passes through while open and fails after close
/// 打开期间 I/O 透传，关闭后失败
#[test]
fn io_passthrough() -> Void {
  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "a.lock");

  let mut held = create(&path, 0o644)?;
  held.write_all(b"0123456789")?;
  held.flush()?;
  held.seek(SeekFrom::Start(3))?;
  let mut buf = [0u8; 4];
  held.read_exact(&mut buf)?;
  assert_eq!(&buf, b"3456");
  assert!(held.file().is_some());

  held.close()?;
  assert!(held.file().is_none());
  assert!(held.write_all(b"x").is_err());
  assert!(held.read_exact(&mut buf).is_err());
  OK
}

/// open on a missing path is a fatal io error, not Locked
/// open 缺失路径是致命 io 错误，不是 Locked
#[test]
fn open_missing() -> Void {
  let dir = tempfile::tempdir()?;
  let path = temp_path(&dir, "missing.lock");

  match open(&path) {
    Err(Error::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
    outcome => panic!("want NotFound, got {outcome:?}", outcome = outcome.map(|_| ())),
  }
  assert!(!Registry::global().contains(&std::path::absolute(&path)?));
  OK
}
