//! 铃声解析 - 会话铃声 vs 全局默认 vs 平台默认
//!
//! 裸文件路径一律视为不可解析：伴随设备读不到任意文件路径。

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::Result;
use crate::model::ToneSetting;

/// 平台铃声目录
pub trait ToneCatalog: Send + Sync {
    /// 铃声是否仍然存在于平台上
    fn is_resolvable(&self, tone: &str) -> Result<bool>;

    /// 平台默认通知铃声
    fn platform_default(&self) -> Option<String>;
}

/// 基于配置列表的铃声目录
#[derive(Debug, Clone, Default)]
pub struct StaticToneCatalog {
    /// 为空时任何带 scheme 的引用都视为存在
    known: HashSet<String>,
    default_tone: Option<String>,
}

impl StaticToneCatalog {
    pub fn new(known: impl IntoIterator<Item = String>, default_tone: Option<String>) -> Self {
        Self {
            known: known.into_iter().collect(),
            default_tone,
        }
    }
}

impl ToneCatalog for StaticToneCatalog {
    fn is_resolvable(&self, tone: &str) -> Result<bool> {
        Ok(self.known.is_empty() || self.known.contains(tone))
    }

    fn platform_default(&self) -> Option<String> {
        self.default_tone.clone()
    }
}

/// 铃声解析器
pub struct RingtoneResolver<'a> {
    catalog: &'a dyn ToneCatalog,
    global: &'a ToneSetting,
}

impl<'a> RingtoneResolver<'a> {
    pub fn new(catalog: &'a dyn ToneCatalog, global: &'a ToneSetting) -> Self {
        Self { catalog, global }
    }

    /// 解析会话的实际铃声
    pub fn resolve(&self, conversation: &ToneSetting) -> Option<String> {
        let candidate = match conversation {
            ToneSetting::Explicit(tone) => Some(tone.as_str()),
            ToneSetting::UseDefault => match self.global {
                ToneSetting::Explicit(tone) => Some(tone.as_str()),
                ToneSetting::UseDefault => None,
            },
        };

        match candidate {
            Some(tone) if self.usable(tone) => Some(tone.to_string()),
            Some(tone) => {
                debug!(tone = %tone, "Tone not resolvable, falling back to platform default");
                self.catalog.platform_default()
            }
            None => self.catalog.platform_default(),
        }
    }

    fn usable(&self, tone: &str) -> bool {
        if is_bare_path(tone) {
            return false;
        }
        match self.catalog.is_resolvable(tone) {
            Ok(found) => found,
            Err(e) => {
                debug!(tone = %tone, error = %e, "Tone lookup failed");
                false
            }
        }
    }
}

/// 没有 URI scheme 或使用 file:// 的引用
pub fn is_bare_path(tone: &str) -> bool {
    match scheme_regex().captures(tone) {
        Some(caps) => caps[1].eq_ignore_ascii_case("file"),
        None => true,
    }
}

fn scheme_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*)://").unwrap())
}
