use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize, Serializer};
use time::{OffsetDateTime, UtcDateTime};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub text: String,
}

/// Body of a publish request. The author comes from the caller's identity.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub text: String,
}

impl Post {
    /// Creation time, read back from the id so it can never disagree with id order.
    #[must_use]
    pub fn created_at(&self) -> UtcDateTime {
        self.id.created_at()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostBody<'a> {
    id: Id<PostMarker>,
    author_id: Id<UserMarker>,
    text: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl Serialize for Post {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        PostBody {
            id: self.id,
            author_id: self.author_id,
            text: &self.text,
            created_at: self.created_at().into(),
        }
        .serialize(serializer)
    }
}
