use wabot_core::types::BotAccount;

/// Deployment notes shipped next to the runner program.
pub fn render(account: &BotAccount) -> String {
    format!(
        r#"# Deploying the runner for {name}

Instance: {instance}
Phone:    {phone}

## 1. Prepare the files

Put `server.js` and `package.json` from this bundle in a GitHub repository.

## 2. Create the web service

1. On Render.com, create a new **Web Service** from that repository.
2. Build command: `npm install`. Start command: `npm start`.
3. Add the environment variable `API_KEY` with your Gemini API key.
4. Render sets `RENDER_EXTERNAL_URL` on its own; the runner uses it to ping
   itself every 14 minutes so the free tier does not go to sleep.

When upgrading from an older runner, use **Manual Deploy > Clear build cache
& deploy** so stale session files are removed. The service is usually back
within 2-3 minutes.

## 3. Pair the number

1. Copy the service URL (for example `https://my-bot.onrender.com`).
2. Set it as the runner URL of this account:
   `wabot runner-url {id} https://my-bot.onrender.com`
3. Run `wabot connect {id}` and scan the QR code from WhatsApp
   (Settings > Linked devices).

The runner keeps its own copy of the prompt in `bot_config.json`. Saving the
configuration from the console pushes the new prompt, temperature and
active flag to `/api/update-config`.
"#,
        name = account.name,
        instance = account.instance_id,
        phone = account.phone_number,
        id = account.id,
    )
}
