//! 加密套件接口
//!
//! 私钥由外部加密套件持有，这里只通过 SKI 句柄引用。

use hlnet_common::{KeyHandle, Result};

/// 加密套件
#[cfg_attr(test, mockall::automock)]
pub trait CryptoSuite: Send + Sync {
    /// 导入 PEM 私钥，返回句柄
    fn key_import(&self, pem: &[u8]) -> Result<KeyHandle>;

    /// 按 SKI 查找已有私钥
    fn get_key(&self, ski: &[u8]) -> Result<KeyHandle>;
}
