use crate::action::CallbackAction;
use blogbot_common::model::post::Post;
use teloxide::{
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
    utils::html,
};
use time::macros::format_description;

pub const WELCOME: &str = "👋 Hi! I show the posts of the blog.\n\n\
    Available commands:\n\
    /posts - browse the list of posts\n\
    /help - show help";
pub const LIST_PROMPT: &str = "📚 Choose a post to read:";
pub const NO_POSTS: &str = "😔 There are no posts yet.";
pub const POST_GONE: &str = "This post no longer exists.";
pub const USE_HELP: &str = "❓ Use /help to see the available commands.";

/// One button per post in the given order, followed by a refresh button.
/// `None` if there is nothing to choose from.
#[must_use]
pub fn post_list(posts: &[Post]) -> Option<InlineKeyboardMarkup> {
    if posts.is_empty() {
        return None;
    }

    let rows = posts
        .iter()
        .map(|post| {
            vec![InlineKeyboardButton::callback(
                format!("📌 {}", post.text.title),
                CallbackAction::ShowPost(post.id).to_string(),
            )]
        })
        .chain([vec![InlineKeyboardButton::callback(
            "🔄 Refresh list",
            CallbackAction::RefreshPosts.to_string(),
        )]]);

    Some(InlineKeyboardMarkup::new(rows))
}

/// The full post as HTML.
pub fn post_view(post: &Post) -> Result<String, time::error::Format> {
    let author = post
        .author
        .as_ref()
        .map_or("unknown", |author| author.username.get());
    let created_at = post
        .created_at
        .format(format_description!("[day].[month].[year] [hour]:[minute]"))?;

    Ok(format!(
        "📝 <b>{}</b>\n\n{}\n\n👤 Author: {}\n📅 Created: {created_at}",
        html::escape(post.text.title.get()),
        html::escape(&post.text.content),
        html::escape(author),
    ))
}

#[must_use]
pub fn back_to_list() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
        "🔙 Back",
        CallbackAction::BackToList.to_string(),
    )]])
}
