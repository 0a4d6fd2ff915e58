//! 注册员锁模块
//!
//! 注册员身份首次使用时需要物化（导入内嵌证书或向 CA 登记）。同一组织的并发
//! 首次调用通过该模块的按组织互斥锁串行化，其他组织和普通操作不受影响。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// 按组织划分的注册员物化锁
#[derive(Debug, Default)]
pub struct RegistrarLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RegistrarLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取组织对应的锁，不存在时创建
    pub fn lock_for(&self, org_name: &str) -> Arc<AsyncMutex<()>> {
        let key = org_name.to_lowercase();
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(key).or_default().clone()
    }
}
