use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// 会員1人あたりのデフォルト最大貸出冊数
pub const DEFAULT_MAX_BORROWED: u32 = 5;

/// 文字列IDの共通バリデーション（前後の空白を除去し、空文字を拒否する）
fn normalize_id(field: &'static str, raw: String) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// 書籍ID - カタログ内で一意かつ不変
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookId(String);

impl BookId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        normalize_id("book id", value.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BookId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BookId> for String {
    fn from(id: BookId) -> Self {
        id.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 利用者ID - 会員管理内で一意かつ不変
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        normalize_id("user id", value.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 年齢
///
/// 不変条件：負の値は作成できない。
/// 書籍の年齢制限としても使用し、0は「制限なし」を表す。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Age(u32);

impl Age {
    /// 制限なし（年齢制限0）
    pub const UNRESTRICTED: Age = Age(0);

    /// 新規作成
    ///
    /// # エラー
    /// 負の値の場合は`ValidationError::NegativeAge`を返す
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| ValidationError::NegativeAge(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// 年齢制限として見たとき、制限がないか
    pub fn is_unrestricted(&self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i64> for Age {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<u32> for Age {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 最大貸出冊数
///
/// 不変条件：1以上。0冊しか借りられない会員は作成できない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BorrowLimit(u32);

impl BorrowLimit {
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidBorrowLimit(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// 現在の貸出冊数で上限に達しているか
    pub fn is_reached(&self, borrowed: usize) -> bool {
        u32::try_from(borrowed).map_or(true, |count| count >= self.0)
    }
}

impl Default for BorrowLimit {
    fn default() -> Self {
        Self(DEFAULT_MAX_BORROWED)
    }
}

impl TryFrom<u32> for BorrowLimit {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BorrowLimit> for u32 {
    fn from(limit: BorrowLimit) -> Self {
        limit.0
    }
}

impl fmt::Display for BorrowLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 出版状態
///
/// 貸出可能なのは`Published`のみ。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    #[default]
    Published,
    Unpublished,
    Withdrawn,
}

impl PublishState {
    pub fn is_borrowable(&self) -> bool {
        matches!(self, PublishState::Published)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishState::Published => "published",
            PublishState::Unpublished => "unpublished",
            PublishState::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
