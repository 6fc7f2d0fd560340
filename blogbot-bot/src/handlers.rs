use crate::{action::CallbackAction, render};
use blogbot_common::{
    model::post::Post,
    service::posts::{PostError, PostService},
};
use std::sync::Arc;
use teloxide::{
    ApiError, RequestError,
    dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler},
    prelude::*,
    types::{ChatId, InlineKeyboardMarkup, Message, ParseMode},
    utils::command::BotCommands,
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Telegram request failed: {0}")]
    Request(#[from] RequestError),
    #[error(transparent)]
    Post(#[from] PostError),
    #[error("Post date could not be formatted: {0}")]
    DateFormat(#[from] time::error::Format),
}

pub type HandlerResult = Result<(), BotError>;

#[derive(BotCommands, Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "browse the list of posts")]
    Posts,
    #[command(description = "show this message")]
    Help,
}

pub fn schema() -> UpdateHandler<BotError> {
    let messages = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_text));

    dptree::entry()
        .branch(messages)
        .branch(Update::filter_callback_query().endpoint(handle_callback))
}

/// Telegram refuses edits that would not change a message. Re-rendering the
/// same content is not an error for us.
fn ignore_not_modified<T>(result: Result<T, RequestError>) -> Result<(), RequestError> {
    match result {
        Ok(_) => Ok(()),
        Err(RequestError::Api(ApiError::MessageNotModified)) => {
            debug!("Message was not modified");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn handle_command(
    bot: Bot,
    message: Message,
    command: Command,
    posts: Arc<PostService>,
) -> HandlerResult {
    debug!(chat_id = message.chat.id.0, ?command, "Received command");

    match command {
        Command::Start => {
            bot.send_message(message.chat.id, render::WELCOME).await?;
        }
        Command::Posts => send_post_list(&bot, message.chat.id, &posts).await?,
        Command::Help => {
            let help = format!(
                "📚 <b>Available commands:</b>\n\n{}",
                Command::descriptions()
            );
            bot.send_message(message.chat.id, help)
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }

    Ok(())
}

async fn handle_text(bot: Bot, message: Message) -> HandlerResult {
    bot.send_message(message.chat.id, render::USE_HELP).await?;

    Ok(())
}

/// What to do with the message a pressed button belongs to.
#[derive(Clone, Eq, PartialEq, Debug)]
enum CallbackReply {
    /// Only answer the query, optionally with a notification.
    Answer(Option<&'static str>),
    /// Replace the message with new HTML text and buttons.
    Edit {
        text: String,
        keyboard: InlineKeyboardMarkup,
    },
    /// Leave the message alone and send a new one.
    Send(&'static str),
}

fn callback_action(data: Option<&str>) -> Option<CallbackAction> {
    data?.parse().ok()
}

fn list_reply(posts: &[Post]) -> CallbackReply {
    match render::post_list(posts) {
        Some(keyboard) => CallbackReply::Edit {
            text: render::LIST_PROMPT.to_owned(),
            keyboard,
        },
        None => CallbackReply::Send(render::NO_POSTS),
    }
}

fn post_reply(post: Result<Post, PostError>) -> Result<CallbackReply, BotError> {
    match post {
        Ok(post) => Ok(CallbackReply::Edit {
            text: render::post_view(&post)?,
            keyboard: render::back_to_list(),
        }),
        Err(PostError::PostNotFound(post_id)) => {
            debug!(%post_id, "Selected post is gone");
            Ok(CallbackReply::Answer(Some(render::POST_GONE)))
        }
        Err(err) => Err(err.into()),
    }
}

async fn handle_callback(
    bot: Bot,
    query: CallbackQuery,
    posts: Arc<PostService>,
) -> HandlerResult {
    let action = callback_action(query.data.as_deref());

    let (Some(message), Some(action)) = (&query.message, action) else {
        warn!(data = ?query.data, "Ignoring callback query");
        bot.answer_callback_query(query.id).await?;
        return Ok(());
    };

    debug!(chat_id = message.chat.id.0, %action, "Received callback");

    let reply = match action {
        CallbackAction::RefreshPosts | CallbackAction::BackToList => {
            list_reply(&posts.list_posts().await?)
        }
        CallbackAction::ShowPost(post_id) => post_reply(posts.get_post(post_id).await)?,
    };

    let answer = bot.answer_callback_query(query.id.clone());
    match reply {
        CallbackReply::Answer(Some(text)) => {
            answer.text(text).await?;
        }
        CallbackReply::Answer(None) => {
            answer.await?;
        }
        CallbackReply::Edit { text, keyboard } => {
            answer.await?;
            let edit = bot
                .edit_message_text(message.chat.id, message.id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await;
            ignore_not_modified(edit)?;
        }
        CallbackReply::Send(text) => {
            answer.await?;
            bot.send_message(message.chat.id, text).await?;
        }
    }

    Ok(())
}

async fn send_post_list(bot: &Bot, chat_id: ChatId, posts: &PostService) -> HandlerResult {
    let posts = posts.list_posts().await?;

    match render::post_list(&posts) {
        Some(keyboard) => {
            bot.send_message(chat_id, render::LIST_PROMPT)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, render::NO_POSTS).await?;
        }
    }

    Ok(())
}
