use blogbot_common::model::{Id, post::PostMarker};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

const REFRESH_POSTS: &str = "refresh_posts";
const BACK_TO_LIST: &str = "back_to_list";
const POST_PREFIX: &str = "post_";

/// What an inline button asks for, encoded in its callback data.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CallbackAction {
    RefreshPosts,
    BackToList,
    ShowPost(Id<PostMarker>),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
#[error("Unknown callback data: {0:?}")]
pub struct UnknownCallbackError(String);

impl FromStr for CallbackAction {
    type Err = UnknownCallbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            REFRESH_POSTS => Ok(CallbackAction::RefreshPosts),
            BACK_TO_LIST => Ok(CallbackAction::BackToList),
            _ => s
                .strip_prefix(POST_PREFIX)
                .and_then(|id| id.parse().ok())
                .map(CallbackAction::ShowPost)
                .ok_or_else(|| UnknownCallbackError(s.to_owned())),
        }
    }
}

impl Display for CallbackAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackAction::RefreshPosts => f.write_str(REFRESH_POSTS),
            CallbackAction::BackToList => f.write_str(BACK_TO_LIST),
            CallbackAction::ShowPost(id) => write!(f, "{POST_PREFIX}{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::action::CallbackAction;
    use blogbot_common::model::Id;

    #[test]
    fn parses_known_callbacks() {
        let parse = |data: &str| data.parse::<CallbackAction>();

        assert_eq!(parse("refresh_posts"), Ok(CallbackAction::RefreshPosts));
        assert_eq!(parse("back_to_list"), Ok(CallbackAction::BackToList));
        assert_eq!(parse("post_42"), Ok(CallbackAction::ShowPost(Id::new(42))));
    }

    #[test]
    fn rejects_unknown_callbacks() {
        for data in ["", "post_", "post_abc", "post42", "refresh", "askuser:1:2"] {
            assert!(
                data.parse::<CallbackAction>().is_err(),
                "{data:?} was accepted"
            );
        }
    }

    #[test]
    fn callback_data_format() {
        assert_eq!(CallbackAction::ShowPost(Id::new(7)).to_string(), "post_7");
        assert_eq!(CallbackAction::RefreshPosts.to_string(), "refresh_posts");
        assert_eq!(CallbackAction::BackToList.to_string(), "back_to_list");
    }
}
