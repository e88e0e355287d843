use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Age, BorrowLimit, User, UserId, ValidationError};

/// 出版状態チェックの有効/無効を指定する環境変数
pub const ENV_ENFORCE_PUBLISH_STATE: &str = "LIBRARY_ENFORCE_PUBLISH_STATE";

/// 新規利用者のデフォルト最大貸出冊数を指定する環境変数
pub const ENV_DEFAULT_MAX_BORROWED: &str = "LIBRARY_DEFAULT_MAX_BORROWED";

/// 設定読み込みのエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a boolean, got '{value}'")]
    InvalidBool { key: &'static str, value: String },

    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} is out of range")]
    OutOfRange {
        key: &'static str,
        #[source]
        source: ValidationError,
    },
}

/// 貸出ポリシー
///
/// エンジンの振る舞いを切り替える設定値。プロセス全体の状態ではなく、
/// エンジンごとに値として保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingPolicy {
    /// 出版済み以外の書籍の貸出を拒否するか
    pub enforce_publish_state: bool,
    /// `new_user`で作成する利用者の最大貸出冊数
    pub default_max_borrowed: BorrowLimit,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            enforce_publish_state: true,
            default_max_borrowed: BorrowLimit::default(),
        }
    }
}

impl LendingPolicy {
    /// 環境変数から読み込む。未設定の項目はデフォルト値を使う。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー検索関数から読み込む
    ///
    /// 値が設定されているのに解釈できない場合は、黙ってデフォルトに戻さずエラーにする。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enforce_publish_state = match lookup(ENV_ENFORCE_PUBLISH_STATE) {
            Some(raw) => parse_bool(ENV_ENFORCE_PUBLISH_STATE, &raw)?,
            None => defaults.enforce_publish_state,
        };

        let default_max_borrowed = match lookup(ENV_DEFAULT_MAX_BORROWED) {
            Some(raw) => {
                let value = raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| ConfigError::InvalidNumber {
                        key: ENV_DEFAULT_MAX_BORROWED,
                        value: raw.clone(),
                    })?;
                BorrowLimit::new(value).map_err(|source| ConfigError::OutOfRange {
                    key: ENV_DEFAULT_MAX_BORROWED,
                    source,
                })?
            }
            None => defaults.default_max_borrowed,
        };

        Ok(Self {
            enforce_publish_state,
            default_max_borrowed,
        })
    }

    /// ポリシーのデフォルト上限で利用者を作成する
    pub fn new_user(
        &self,
        id: UserId,
        name: impl Into<String>,
        age: Age,
    ) -> Result<User, ValidationError> {
        User::new(id, name, age).map(|user| user.with_max_borrowed(self.default_max_borrowed))
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}
