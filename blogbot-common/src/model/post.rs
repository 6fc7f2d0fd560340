use crate::model::{
    Id,
    user::{User, UserMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    /// `None` once the author reference is lost; such a post can no longer be
    /// changed by anyone.
    pub author: Option<User>,
    pub text: PostText,
    pub created_at: OffsetDateTime,
}

impl Post {
    #[must_use]
    pub fn author_id(&self) -> Option<Id<UserMarker>> {
        self.author.as_ref().map(|author| author.id)
    }

    #[must_use]
    pub fn is_authored_by(&self, user_id: Id<UserMarker>) -> bool {
        self.author_id() == Some(user_id)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostText {
    pub title: PostTitle,
    pub content: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub text: PostText,
}

/// Partial update of a post. Absent fields keep their stored value.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PostPatch {
    #[serde(default)]
    pub title: Option<PostTitle>,
    #[serde(default)]
    pub content: Option<String>,
}

impl PostPatch {
    pub fn apply_to(self, text: &mut PostText) {
        if let Some(title) = self.title {
            text.title = title;
        }
        if let Some(content) = self.content {
            text.content = content;
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct PostTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post title is invalid: {0:?}")]
pub struct InvalidPostTitleError(String);

impl PostTitle {
    pub fn new(title: String) -> Result<Self, InvalidPostTitleError> {
        let len = title.chars().count();
        if (1..=POST_TITLE_MAX_LEN).contains(&len) {
            Ok(PostTitle(title))
        } else {
            Err(InvalidPostTitleError(title))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for PostTitle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PostTitle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostTitle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"PostTitle"))
    }
}
