use crate::app::App;
use anyhow::Result;
use console::style;
use wabot_core::simulator::ChatSimulator;
use wabot_ui::term;

/// Interactive chat with one account's bot. An empty line or `/quit` exits.
pub async fn run(app: &App, id: Option<String>) -> Result<()> {
    let session = app.session().await?;
    let account = app.account(&session, id).await?;
    let mut chat = session.chat();
    chat.switch_account(&account.id);

    println!(
        "Chatting with {} ({}). Empty line or /quit to leave.",
        style(&account.name).bold(),
        account.phone_number
    );
    if !ChatSimulator::will_reply(&account) {
        println!(
            "{}",
            style("This bot is offline or paused and will not reply. Connect it with `wabot connect`.")
                .yellow()
        );
    }

    loop {
        let text = term::prompt_text("you", Some(""))?;
        let text = text.trim();
        if text.is_empty() || text == "/quit" {
            break;
        }
        let pb = term::spinner("typing...");
        let reply = chat.send(&account, text).await;
        pb.finish_and_clear();
        if let Some(msg) = reply {
            term::print_message(&msg);
        }
    }
    Ok(())
}
