//! Cursor-based paging of a user's posts.
//!
//! A [`PageCursor`] names the last post of the previous page. Clients get it as
//! an opaque base64 string and only ever echo it back.

use crate::model::{
    Id,
    post::{Post, PostMarker},
};
use base64::{DecodeError, Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use serde::Serialize;
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

pub const PAGE_LIMIT_MIN: u32 = 1;
pub const PAGE_LIMIT_MAX: u32 = 100;
pub const PAGE_LIMIT_DEFAULT: u32 = 10;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum CursorDecodeError {
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The cursor has the wrong length")]
    InvalidLength,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("Page size must be between 1 and 100, got {0}")]
pub struct PageLimitError(pub u32);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageCursor(Id<PostMarker>);

impl PageCursor {
    #[must_use]
    pub fn new(last_post: Id<PostMarker>) -> Self {
        Self(last_post)
    }

    #[must_use]
    pub fn post_id(self) -> Id<PostMarker> {
        self.0
    }

    #[must_use]
    pub fn encode(self) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(u64::from(self.0).to_be_bytes())
    }
}

impl FromStr for PageCursor {
    type Err = CursorDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 8] = BASE64_URL_SAFE_NO_PAD
            .decode(s)?
            .try_into()
            .map_err(|_| CursorDecodeError::InvalidLength)?;

        Ok(Self(u64::from_be_bytes(bytes).into()))
    }
}

impl Display for PageCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for PageCursor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Number of posts per page. Out of range values are rejected, never clamped.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageLimit(u32);

impl PageLimit {
    pub fn new(limit: u32) -> Result<Self, PageLimitError> {
        if (PAGE_LIMIT_MIN..=PAGE_LIMIT_MAX).contains(&limit) {
            Ok(Self(limit))
        } else {
            Err(PageLimitError(limit))
        }
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for PageLimit {
    fn default() -> Self {
        Self(PAGE_LIMIT_DEFAULT)
    }
}

impl TryFrom<u32> for PageLimit {
    type Error = PageLimitError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// One page of an author's posts, newest first.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub posts: Vec<Post>,
    #[serde(rename = "nextPage", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<PageCursor>,
}
