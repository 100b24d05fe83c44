pub mod structs;
pub mod api;
pub mod timetable;
pub mod ticket;
pub mod config;
#[cfg(test)]
mod tests;

use structs::*;
use timetable::*;

use dptree::{case, deps};
use std::{
    collections::HashMap,
    error::Error,
    sync::{Arc, Mutex},
};
use teloxide::{
    dispatching::{dialogue, dialogue::InMemStorage},
    dptree::endpoint,
    filter_command,
    payloads::{EditMessageTextSetters, SendMessageSetters, SendPhotoSetters},
    prelude::*,
    types::{
        ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
        ParseMode::Html,
    },
    utils::{command::BotCommands, html::escape},
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type MyDialogue = Dialogue<State, InMemStorage<State>>;
type Sessions = Arc<Mutex<HashMap<ChatId, Session>>>;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "Display help menu showing the commands list")]
    Help,
    #[command(description = "Show the main menu.")]
    Start,
    #[command(description = "Browse and filter the bus timetable.")]
    Buses,
    #[command(description = "Reload the timetable from the server.")]
    Refresh,
    #[command(description = "Show your ticket as a QR code.")]
    Ticket,
    #[command(description = "Go back to the main menu.")]
    Cancel,
}

#[derive(Clone, Default)]
enum State {
    #[default]
    Start,
    Timetable,
    ReceiveName,
    ReceiveReference,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting 'Bus timetable' BOT ...");

    let bot = Bot::from_env();

    let command_handler = filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(help))
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Buses].endpoint(show_timetable))
        .branch(case![Command::Refresh].endpoint(refresh_timetable))
        .branch(case![Command::Ticket].endpoint(start_ticket))
        .branch(case![Command::Cancel].endpoint(cancel));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![State::Timetable].endpoint(receive_query))
        .branch(case![State::ReceiveName].endpoint(receive_name))
        .branch(case![State::ReceiveReference].endpoint(receive_reference))
        .branch(endpoint(invalid_state));

    let callback_query_handler = Update::filter_callback_query()
        .branch(case![State::Timetable].endpoint(receive_favorite_toggle));

    let dial = dialogue::enter::<Update, InMemStorage<State>, State, _>()
        .branch(message_handler)
        .branch(callback_query_handler);

    // Shared map of per-chat sessions. Both screens and the menu badge read
    // and write through this one owner.
    let sessions: Sessions = Arc::new(Mutex::new(HashMap::new()));

    Dispatcher::builder(bot, dial)
        .dependencies(deps![InMemStorage::<State>::new(), sessions])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Type /help to see the usage.",
    )
    .await?;
    Ok(())
}

//////////////////////////////////////////////////////////
// Session access
//////////////////////////////////////////////////////////

/// Runs `f` on this chat's session, creating it first if needed. The lock
/// only lives for the duration of `f`, never across an await.
fn with_session<T>(sessions: &Sessions, chat_id: ChatId, f: impl FnOnce(&mut Session) -> T) -> T {
    let mut map = sessions.lock().unwrap();
    f(map.entry(chat_id).or_default())
}

/// Fetches the timetable and swaps it into the session. At most one fetch
/// per chat is in flight; a request while one is outstanding is dropped.
async fn run_fetch(sessions: &Sessions, chat_id: ChatId) {
    if !with_session(sessions, chat_id, Session::begin_fetch) {
        log::debug!("fetch already in flight for chat {chat_id}, ignoring");
        return;
    }

    let result = api::fetch_timetable(&config::timetable_url()).await;
    with_session(sessions, chat_id, |session| session.apply_fetch(result));
}

//////////////////////////////////////////////////////////
// State handlers
//////////////////////////////////////////////////////////
async fn cancel(bot: Bot, dialogue: MyDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "🚫 Back to the menu! Use /buses or /ticket.")
        .await?;
    dialogue.exit().await?;
    Ok(())
}

async fn start(bot: Bot, dialogue: MyDialogue, msg: Message, sessions: Sessions) -> HandlerResult {
    let menu = with_session(&sessions, msg.chat.id, |session| render_menu(session));
    bot.send_message(msg.chat.id, menu).parse_mode(Html).await?;
    dialogue.update(State::Start).await?;
    Ok(())
}

async fn show_timetable(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    sessions: Sessions,
) -> HandlerResult {
    let chat_id = msg.chat.id;

    // Opening the screen starts with no filter and fetches only when the
    // list is still empty. /refresh is the explicit reload.
    let needs_fetch = with_session(&sessions, chat_id, |session| {
        session.query.clear();
        session.buses.is_empty()
    });
    if needs_fetch {
        run_fetch(&sessions, chat_id).await;
    }

    let (text, kb) = with_session(&sessions, chat_id, |session| render_timetable(session));
    bot.send_message(chat_id, text)
        .parse_mode(Html)
        .reply_markup(kb)
        .await?;
    dialogue.update(State::Timetable).await?;
    Ok(())
}

async fn refresh_timetable(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    sessions: Sessions,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    run_fetch(&sessions, chat_id).await;

    let (text, kb) = with_session(&sessions, chat_id, |session| render_timetable(session));
    bot.send_message(chat_id, text)
        .parse_mode(Html)
        .reply_markup(kb)
        .await?;
    dialogue.update(State::Timetable).await?;
    Ok(())
}

async fn receive_query(bot: Bot, msg: Message, sessions: Sessions) -> HandlerResult {
    match msg.text().map(ToOwned::to_owned) {
        Some(query) => {
            let chat_id = msg.chat.id;
            let (text, kb) = with_session(&sessions, chat_id, |session| {
                session.query = query;
                render_timetable(session)
            });
            bot.send_message(chat_id, text)
                .parse_mode(Html)
                .reply_markup(kb)
                .await?;
        }
        None => {
            bot.send_message(
                msg.chat.id,
                "❌ Send me some text to filter the timetable, or /cancel to leave.",
            )
            .await?;
        }
    }
    Ok(())
}

async fn receive_favorite_toggle(
    bot: Bot,
    q: CallbackQuery,
    sessions: Sessions,
) -> HandlerResult {
    if let (Some(data), Some(message)) = (&q.data, &q.message) {
        if let Ok(id) = data.parse::<i64>() {
            let chat_id = message.chat.id;
            let (text, kb) = with_session(&sessions, chat_id, |session| {
                toggle_favorite(&mut session.favorites, id);
                render_timetable(session)
            });
            bot.edit_message_text(chat_id, message.id, text)
                .parse_mode(Html)
                .reply_markup(kb)
                .await?;
        }
    }
    bot.answer_callback_query(q.id).await?;
    Ok(())
}

async fn start_ticket(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    sessions: Sessions,
) -> HandlerResult {
    let current = with_session(&sessions, msg.chat.id, |session| session.ticket.clone());
    let prompt = if current.name.is_empty() {
        "🎫 Let's set up your ticket!\n\nWhat is the passenger name?".to_string()
    } else {
        format!(
            "🎫 Updating your ticket.\n\nWhat is the passenger name? (currently: {})",
            current.name
        )
    };
    bot.send_message(msg.chat.id, prompt).await?;
    dialogue.update(State::ReceiveName).await?;
    Ok(())
}

async fn receive_name(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    sessions: Sessions,
) -> HandlerResult {
    match msg.text().map(ToOwned::to_owned) {
        Some(name) => {
            with_session(&sessions, msg.chat.id, |session| session.ticket.name = name);
            bot.send_message(msg.chat.id, "And the ticket reference number?")
                .await?;
            dialogue.update(State::ReceiveReference).await?;
        }
        None => {
            bot.send_message(msg.chat.id, "❌ Please send the passenger name as text.")
                .await?;
        }
    }
    Ok(())
}

async fn receive_reference(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    sessions: Sessions,
) -> HandlerResult {
    match msg.text().map(ToOwned::to_owned) {
        Some(reference) => {
            let identifier = with_session(&sessions, msg.chat.id, |session| {
                session.ticket.reference = reference;
                session.ticket.identifier()
            });
            send_ticket(&bot, msg.chat.id, &identifier).await?;
            dialogue.update(State::Start).await?;
        }
        None => {
            bot.send_message(msg.chat.id, "❌ Please send the reference number as text.")
                .await?;
        }
    }
    Ok(())
}

/// Sends the ticket QR photo. An empty identifier or a rendering failure
/// falls back to the placeholder message; neither reaches the dispatcher.
async fn send_ticket(bot: &Bot, chat_id: ChatId, identifier: &str) -> HandlerResult {
    if identifier.is_empty() {
        bot.send_message(
            chat_id,
            "✖️ No ticket code to show — your ticket details are empty ❗",
        )
        .await?;
        return Ok(());
    }

    match ticket::ticket_png(identifier) {
        Ok(png) => {
            bot.send_photo(chat_id, InputFile::memory(png).file_name("ticket.png"))
                .caption(format!("🎫 Your ticket: {identifier}"))
                .await?;
        }
        Err(e) => {
            log::error!("ticket QR rendering failed: {e}");
            bot.send_message(chat_id, "✖️ No ticket code available.")
                .await?;
        }
    }
    Ok(())
}

//////////////////////////////////////////////////////////
// Rendering & keyboards
//////////////////////////////////////////////////////////

/// The main menu. The ticket entry carries a `❗` badge while the ticket
/// details are empty; recomputed on every render.
fn render_menu(session: &Session) -> String {
    let badge = if session.ticket.is_incomplete() { " ❗" } else { "" };
    format!(
        "🚌 <b>Bus Timetable</b>\n\n\
         /buses — browse and filter the timetable\n\
         /refresh — reload from the server\n\
         /ticket — my ticket{badge}\n\
         /help — list all commands"
    )
}

/// One message for the whole visible timetable, plus a keyboard with one
/// favorite-toggle button per visible bus.
fn render_timetable(session: &Session) -> (String, InlineKeyboardMarkup) {
    let visible = filter_buses(&session.buses, &session.query);

    let mut text = if session.query.is_empty() {
        "🚌 <b>Bus Timetable</b>".to_string()
    } else {
        format!(
            "🚌 <b>Bus Timetable</b> — filter: <i>{}</i>",
            escape(&session.query)
        )
    };

    if visible.is_empty() {
        if session.buses.is_empty() {
            text.push_str("\n\nNo timetable loaded yet. Try /refresh.");
        } else {
            text.push_str("\n\nNo buses match your filter.");
        }
    }
    for bus in &visible {
        text.push_str("\n\n");
        text.push_str(&format_bus_row(bus, session.favorites.contains(&bus.id)));
    }
    if !visible.is_empty() {
        text.push_str("\n\nTap a bus to add or remove a favorite, send text to filter.");
    }

    let buttons = visible
        .iter()
        .map(|bus| {
            let label = if session.favorites.contains(&bus.id) {
                format!("★ {}", bus.name)
            } else {
                format!("☆ {}", bus.name)
            };
            (label, bus.id.to_string())
        })
        .collect();

    (text, make_inline_keyboard(buttons, 2))
}

/// Creates a keyboard made by callback buttons in rows of `chunks`.
fn make_inline_keyboard(buttons: Vec<(String, String)>, chunks: usize) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = vec![];

    for row_buttons in buttons.chunks(chunks) {
        let row = row_buttons
            .iter()
            .map(|(label, data)| InlineKeyboardButton::callback(label.to_owned(), data.to_owned()))
            .collect();

        keyboard.push(row);
    }

    InlineKeyboardMarkup::new(keyboard)
}
