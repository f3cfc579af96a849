use tokio::sync::mpsc::UnboundedSender;

/// Report a step of a long-running operation.
///
/// With a listener attached the line goes to the channel only; otherwise it
/// is printed. A listener that went away falls back to printing.
pub fn emit(tx: Option<&UnboundedSender<String>>, msg: &str) {
    match tx {
        Some(tx) if tx.send(msg.to_string()).is_ok() => {}
        _ => println!("{msg}"),
    }
}
