use serde_json::json;

pub const PACKAGE_NAME: &str = "whatsapp-bot-runner";
pub const NODE_ENGINE: &str = ">=20.0.0 <21.0.0";

/// `package.json` for the runner program, pretty-printed.
pub fn generate() -> String {
    let pkg = json!({
        "name": PACKAGE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "WhatsApp bot runner with keep-alive and auto-reconnect",
        "main": "server.js",
        "scripts": {
            "start": "node server.js"
        },
        "dependencies": {
            "@whiskeysockets/baileys": "^6.6.0",
            "qrcode": "^1.5.3",
            "@google/genai": "^1.30.0",
            "pino": "^7.0.0"
        },
        "overrides": {
            "eslint-config": "0.0.0",
            "@whiskeysockets/eslint-config": "0.0.0",
            "linkifyjs": "^4.0.0"
        },
        "engines": {
            "node": NODE_ENGINE
        }
    });
    let mut out = serde_json::to_string_pretty(&pkg).unwrap_or_default();
    out.push('\n');
    out
}
