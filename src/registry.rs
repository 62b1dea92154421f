//! Process-wide lock registry / 进程级锁注册表
//!
//! One entry per absolute path. A present key, placeholder or held,
//! blocks every other open attempt on that path within this process.
//! 每个绝对路径一个条目。键存在时（占位或持有），本进程内对该路径的
//! 其他打开尝试都会被阻止。

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{LazyLock, Mutex},
};

use crate::{Error, Result, lock};

/// Entry state / 条目状态
#[derive(Clone, Copy, Debug)]
enum State {
  /// Open attempt in flight, no handle yet / 打开中，尚无句柄
  Reserved,
  /// A live handle holds the lock / 句柄持有锁
  Held,
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(|| Registry {
  paths: Mutex::new(HashMap::new()),
});

/// Reserved lock keys of this process / 本进程已保留的锁键
pub struct Registry {
  paths: Mutex<HashMap<PathBuf, State>>,
}

impl Registry {
  /// Shared process-wide instance / 进程级共享实例
  #[inline]
  pub fn global() -> &'static Registry {
    &GLOBAL
  }

  /// Insert a placeholder, Err(Locked) when the key is already present
  /// 插入占位，键已存在则返回 Locked
  pub fn reserve(&self, key: &Path) -> Result<()> {
    let mut paths = lock(&self.paths);
    if paths.contains_key(key) {
      return Err(Error::Locked);
    }
    paths.insert(key.to_path_buf(), State::Reserved);
    Ok(())
  }

  /// Promote a placeholder to a live handle / 占位升级为持有句柄
  pub fn confirm(&self, key: &Path) {
    lock(&self.paths).insert(key.to_path_buf(), State::Held);
  }

  /// Remove the key, on attempt failure or handle teardown
  /// 移除键，用于尝试失败或句柄销毁
  pub fn remove(&self, key: &Path) {
    lock(&self.paths).remove(key);
  }

  /// Whether the key is present / 键是否存在
  pub fn contains(&self, key: &Path) -> bool {
    lock(&self.paths).contains_key(key)
  }

  /// Entry count / 条目数
  pub fn len(&self) -> usize {
    lock(&self.paths).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
