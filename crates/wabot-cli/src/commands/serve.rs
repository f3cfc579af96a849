use crate::app::{build_store, App};
use anyhow::Result;
use std::sync::Arc;
use wabot_ui::web::{self, Console, ConsoleDeps, StoreFactory};

pub async fn run(app: App, port: u16) -> Result<()> {
    let store_factory: StoreFactory = Arc::new(build_store);
    let console = Console::new(ConsoleDeps {
        runner: app.runner()?,
        chat: app.chat()?,
        prefs: app.prefs(),
        settings: app.settings,
        store_factory,
    });
    web::run(Arc::new(console), port).await
}
