use wabot_core::config::DEFAULT_CHAT_MODEL;
use wabot_core::types::BotAccount;

/// Log lines the runner keeps in memory.
pub const LOG_CAPACITY: usize = 50;
/// Log lines returned by `GET /api/qr`.
pub const LOGS_PER_POLL: usize = 10;
/// Keep-alive self-ping interval, just under the host's 15 minute idle cutoff.
pub const KEEP_ALIVE_MS: u64 = 14 * 60 * 1000;
pub const RECONNECT_DELAY_MS: u64 = 5_000;
pub const RESET_RESTART_DELAY_MS: u64 = 3_000;

/// Quote `s` as a JavaScript string literal.
pub fn js_string(s: &str) -> String {
    // JSON strings are valid JS literals; the two line separators are escaped
    // for older parsers.
    serde_json::Value::String(s.to_string())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Generate the Node.js runner program for one account.
///
/// The program serves the runner HTTP API the console polls, keeps the
/// WhatsApp session alive with Baileys, answers incoming messages with the
/// account's prompt and temperature, and pings itself every 14 minutes when
/// `RENDER_EXTERNAL_URL` is set.
pub fn generate(account: &BotAccount) -> String {
    let instance_id = js_string(&account.instance_id);
    let bot_name = js_string(&account.name);
    let instruction = js_string(&account.config.system_instruction);
    let temperature = account.config.temperature;
    let is_active = account.is_active;
    let model = js_string(DEFAULT_CHAT_MODEL);

    format!(
        r##"/**
 * WhatsApp bot runner
 * Serves the console API, keeps the WhatsApp session alive and replies with AI.
 */

const http = require('http');
const https = require('https');
const {{ default: makeWASocket, useMultiFileAuthState, DisconnectReason, delay, fetchLatestBaileysVersion }} = require('@whiskeysockets/baileys');
const qrcode = require('qrcode');
const {{ GoogleGenAI }} = require('@google/genai');
const pino = require('pino');
const fs = require('fs');
const path = require('path');

const PORT = process.env.PORT || 10000;
const INSTANCE_ID = {instance_id};
const BOT_NAME = {bot_name};
const MODEL = {model};
const CONFIG_FILE = path.join(__dirname, 'bot_config.json');
const AUTH_DIR = path.join(__dirname, 'auth_info');

// --- Config ---
let botConfig = {{
    systemInstruction: {instruction},
    temperature: {temperature},
    isActive: {is_active}
}};

if (fs.existsSync(CONFIG_FILE)) {{
    try {{
        botConfig = {{ ...botConfig, ...JSON.parse(fs.readFileSync(CONFIG_FILE, 'utf8')) }};
    }} catch (e) {{ console.error('Config load error', e); }}
}}

function saveConfig() {{
    fs.writeFileSync(CONFIG_FILE, JSON.stringify(botConfig, null, 2));
}}

// --- State ---
let qrCodeDataUrl = '';
let statusMessage = 'Starting';
let isConnected = false;
let logs = [];
let ai = null;
let sock = null;

function addLog(msg) {{
    const time = new Date().toLocaleTimeString();
    logs.unshift(`[${{time}}] ${{msg}}`);
    if (logs.length > {log_capacity}) logs.pop();
    console.log(msg);
}}

function initAI() {{
    const apiKey = process.env.API_KEY || process.env.GEMINI_API_KEY;
    if (!apiKey) {{
        ai = null;
        addLog('AI: missing API_KEY environment variable');
        return;
    }}
    try {{
        ai = new GoogleGenAI({{ apiKey }});
        addLog('AI: ready');
    }} catch (e) {{ addLog('AI error: ' + e.message); }}
}}
initAI();

function readBody(req) {{
    return new Promise((resolve, reject) => {{
        let body = '';
        req.on('data', c => body += c);
        req.on('end', () => resolve(body));
        req.on('error', reject);
    }});
}}

function sendJson(res, code, payload) {{
    res.writeHead(code, {{ 'Content-Type': 'application/json' }});
    res.end(JSON.stringify(payload));
}}

function escapeHtml(s) {{
    return String(s).replace(/[&<>"']/g, c => ({{ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' }})[c]);
}}

// --- HTTP API ---
const server = http.createServer(async (req, res) => {{
    res.setHeader('Access-Control-Allow-Origin', '*');
    res.setHeader('Access-Control-Allow-Methods', 'GET, POST, OPTIONS');
    res.setHeader('Access-Control-Allow-Headers', 'Content-Type');

    if (req.method === 'OPTIONS') {{ res.writeHead(204); res.end(); return; }}

    if (req.url === '/api/qr') {{
        sendJson(res, 200, {{
            qr: isConnected ? null : (qrCodeDataUrl || null),
            status: isConnected ? 'CONNECTED' : (qrCodeDataUrl ? 'SCAN_NEEDED' : 'INITIALIZING'),
            instanceId: INSTANCE_ID,
            logs: logs.slice(0, {logs_per_poll}),
            isActive: botConfig.isActive
        }});
        return;
    }}

    if (req.url === '/api/update-config' && req.method === 'POST') {{
        try {{
            const data = JSON.parse(await readBody(req));
            if (typeof data.systemInstruction === 'string' && data.systemInstruction) botConfig.systemInstruction = data.systemInstruction;
            if (typeof data.temperature === 'number') botConfig.temperature = data.temperature;
            if (typeof data.isActive === 'boolean') botConfig.isActive = data.isActive;
            saveConfig();
            initAI();
            addLog(`Config updated. Bot active: ${{botConfig.isActive}}`);
            sendJson(res, 200, {{ success: true, message: 'Config updated' }});
        }} catch (e) {{
            sendJson(res, 400, {{ success: false, message: 'Invalid JSON body' }});
        }}
        return;
    }}

    if (req.url === '/api/logout' && req.method === 'POST') {{
        addLog('Hard reset requested from the console');
        try {{
            if (sock) {{ sock.end(undefined); sock = null; }}
            if (fs.existsSync(AUTH_DIR)) {{
                fs.rmSync(AUTH_DIR, {{ recursive: true, force: true }});
                addLog('Session files removed');
            }}
            isConnected = false;
            qrCodeDataUrl = '';
            statusMessage = 'Reset complete';
            setTimeout(startBaileys, {reset_restart_ms});
            sendJson(res, 200, {{ success: true }});
        }} catch (e) {{
            addLog('Reset error: ' + e.message);
            sendJson(res, 500, {{ success: false, message: e.message }});
        }}
        return;
    }}

    res.writeHead(200, {{ 'Content-Type': 'text/html; charset=utf-8' }});
    res.end(`<html><head><title>${{escapeHtml(BOT_NAME)}}</title></head>
<body style="font-family:sans-serif;background:#1e1e1e;color:#fff;text-align:center;padding:50px;">
  <div style="background:#2d2d2d;padding:30px;border-radius:15px;max-width:600px;margin:auto;border-top:5px solid #00a884;">
    <h1 style="color:#00a884;">${{escapeHtml(BOT_NAME)}}</h1>
    <p>Instance: <code>${{INSTANCE_ID}}</code></p>
    <p>Status: <strong>${{isConnected ? 'CONNECTED' : escapeHtml(statusMessage)}}</strong></p>
    <p>Mode: <strong>${{botConfig.isActive ? 'ACTIVE' : 'PAUSED'}}</strong></p>
    <div style="background:#000;padding:15px;border-radius:8px;font-family:monospace;text-align:left;font-size:12px;color:#00a884;max-height:300px;overflow-y:auto;">
      ${{logs.map(escapeHtml).join('<br>')}}
    </div>
    <p style="font-size:10px;color:#666;margin-top:20px;">External URL: ${{escapeHtml(process.env.RENDER_EXTERNAL_URL || 'not detected')}}</p>
  </div>
</body></html>`);
}});

server.listen(PORT, () => {{
    addLog(`Web server listening on port ${{PORT}}`);
    startBaileys();
}});

// --- Keep-alive ---
const RENDER_EXTERNAL_URL = process.env.RENDER_EXTERNAL_URL;
if (RENDER_EXTERNAL_URL) {{
    addLog(`Keep-alive enabled for ${{RENDER_EXTERNAL_URL}}`);
    setInterval(() => {{
        addLog('Keep-alive ping');
        https.get(`${{RENDER_EXTERNAL_URL}}/api/qr`, () => {{}})
            .on('error', e => console.error('Keep-alive ping failed:', e.message));
    }}, {keep_alive_ms});
}} else {{
    addLog('Keep-alive disabled (RENDER_EXTERNAL_URL not set); the host may put the bot to sleep');
}}

// --- WhatsApp ---
async function startBaileys() {{
    addLog('Starting WhatsApp engine');
    try {{
        const {{ state, saveCreds }} = await useMultiFileAuthState(AUTH_DIR);
        const {{ version }} = await fetchLatestBaileysVersion();

        sock = makeWASocket({{
            version,
            auth: state,
            logger: pino({{ level: 'error' }}),
            browser: ['Ubuntu', 'Chrome', '20.0.04'],
            connectTimeoutMs: 60000,
            keepAliveIntervalMs: 25000,
            emitOwnEvents: false,
            retryRequestDelayMs: 5000,
            syncFullHistory: false,
            printQRInTerminal: false
        }});

        sock.ev.on('connection.update', async (update) => {{
            const {{ connection, lastDisconnect, qr }} = update;

            if (qr) {{
                isConnected = false;
                statusMessage = 'Scan the QR code';
                qrcode.toDataURL(qr, (err, url) => {{ if (!err) qrCodeDataUrl = url; }});
                addLog('QR code regenerated');
            }}

            if (connection === 'close') {{
                isConnected = false;
                qrCodeDataUrl = '';
                const error = lastDisconnect?.error;
                if (error?.output?.statusCode === DisconnectReason.loggedOut) {{
                    addLog('Logged out; clearing session');
                    if (fs.existsSync(AUTH_DIR)) fs.rmSync(AUTH_DIR, {{ recursive: true, force: true }});
                }}
                addLog(`Disconnected: ${{error?.message || 'reconnecting'}}`);
                setTimeout(startBaileys, {reconnect_ms});
            }} else if (connection === 'open') {{
                isConnected = true;
                qrCodeDataUrl = '';
                statusMessage = 'Connected';
                addLog('Connected');
            }}
        }});

        sock.ev.on('creds.update', saveCreds);

        sock.ev.on('messages.upsert', async ({{ messages, type }}) => {{
            if (type !== 'notify' || !botConfig.isActive || !ai) return;

            for (const msg of messages) {{
                if (!msg.message || msg.key.fromMe) continue;
                const text = msg.message.conversation || msg.message.extendedTextMessage?.text;
                if (!text) continue;
                addLog(`Message: ${{text.substring(0, 15)}}...`);

                try {{
                    await sock.readMessages([msg.key]);
                    await delay(1000);
                    const response = await ai.models.generateContent({{
                        model: MODEL,
                        contents: text,
                        config: {{
                            systemInstruction: botConfig.systemInstruction,
                            temperature: botConfig.temperature
                        }}
                    }});
                    await sock.sendMessage(msg.key.remoteJid, {{ text: response.text }}, {{ quoted: msg }});
                    addLog('Reply sent');
                }} catch (e) {{
                    addLog('AI error: ' + e.message);
                }}
            }}
        }});
    }} catch (e) {{
        addLog('Startup failed: ' + e.message);
        setTimeout(startBaileys, {reconnect_ms});
    }}
}}
"##,
        log_capacity = LOG_CAPACITY,
        logs_per_poll = LOGS_PER_POLL,
        keep_alive_ms = KEEP_ALIVE_MS,
        reconnect_ms = RECONNECT_DELAY_MS,
        reset_restart_ms = RESET_RESTART_DELAY_MS,
    )
}
