//! IP Allowlist Value Object
//!
//! cron エンドポイントを呼び出せる送信元 IP の集合。
//!
//! ## 正規化
//! - `localhost` / `::1` → `127.0.0.1`
//! - IPv4-mapped IPv6 (`::ffff:a.b.c.d`) → `a.b.c.d`
//! - 解析できない入力はどのエントリにも一致しない（fail-closed）
//!
//! ## 空の場合
//! 制限はオプトイン。空の allowlist はすべての IP を許可する。

use std::collections::HashSet;
use std::net::IpAddr;

use platform::client::{canonical_ip, parse_ip};

use crate::error::ConfigIssue;

/// Configured set of allowed caller addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpAllowlist {
    entries: HashSet<IpAddr>,
}

impl IpAllowlist {
    /// Parse a comma-separated list
    ///
    /// Blank segments are skipped. Every malformed entry is reported.
    pub fn parse(raw: &str) -> Result<Self, Vec<ConfigIssue>> {
        let mut entries = HashSet::new();
        let mut issues = Vec::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match parse_ip(entry) {
                Some(ip) => {
                    entries.insert(ip);
                }
                None => issues.push(ConfigIssue::InvalidAllowlistEntry(entry.to_string())),
            }
        }

        if issues.is_empty() {
            Ok(Self { entries })
        } else {
            Err(issues)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check a raw address string
    pub fn is_allowed(&self, raw: &str) -> bool {
        self.allows(parse_ip(raw))
    }

    /// Check an already-extracted address
    ///
    /// `None` (unknown or unparsable caller) only passes an empty allowlist.
    pub fn allows(&self, ip: Option<IpAddr>) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        match ip {
            Some(ip) => self.entries.contains(&canonical_ip(ip)),
            None => false,
        }
    }
}
