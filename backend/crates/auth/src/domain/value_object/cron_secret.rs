//! Cron Secret Value Object
//!
//! cron 実行元と共有するシークレット。`x-cron-secret` ヘッダーと比較される。
//!
//! ## 不変条件
//! - 空でない
//! - 32文字以上
//!
//! ## 取り扱い
//! - 比較は `platform::crypto::secrets_equal`（SHA-256 + 定数時間比較）のみ
//! - `Debug` では値を出力しない
//! - drop 時にゼロ化

use std::fmt;

use platform::crypto::secrets_equal;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigIssue;

/// Minimum length for the cron secret (in characters)
pub const CRON_SECRET_MIN_LENGTH: usize = 32;

/// Shared secret presented by the cron caller
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CronSecret(String);

impl CronSecret {
    pub fn new(raw: impl Into<String>) -> Result<Self, ConfigIssue> {
        let raw = raw.into();
        let length = raw.chars().count();

        if length == 0 {
            return Err(ConfigIssue::MissingCronSecret);
        }
        if length < CRON_SECRET_MIN_LENGTH {
            return Err(ConfigIssue::CronSecretTooShort {
                min: CRON_SECRET_MIN_LENGTH,
                actual: length,
            });
        }

        Ok(Self(raw))
    }

    /// Constant-time comparison against a presented value
    pub fn matches(&self, provided: &str) -> bool {
        secrets_equal(provided, &self.0)
    }
}

impl fmt::Debug for CronSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CronSecret(****)")
    }
}
