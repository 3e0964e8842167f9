// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verification email rendering.

pub const OTP_SUBJECT: &str = "🔐 Kode Verifikasi PNJ Anonymous Bot";

/// Display name used when the configured sender has none.
pub const SENDER_NAME: &str = "PNJ Anonymous Bot";

const OTP_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 0; padding: 0; background-color: #0f0f23; }
        .container { max-width: 500px; margin: 0 auto; padding: 40px 20px; }
        .card { background: linear-gradient(135deg, #1a1a3e 0%, #2d2d6b 100%); border-radius: 20px; padding: 40px; text-align: center; }
        .title { color: #ffffff; font-size: 24px; font-weight: 700; margin: 10px 0; }
        .subtitle { color: #a0a0cc; font-size: 14px; margin-bottom: 30px; }
        .otp-box { background: linear-gradient(135deg, #6366f1, #8b5cf6); border-radius: 16px; padding: 20px; margin: 20px 0; }
        .otp-code { font-size: 36px; font-weight: 800; color: #ffffff; letter-spacing: 12px; font-family: 'Courier New', monospace; }
        .warning { color: #ff6b6b; font-size: 12px; margin-top: 20px; }
        .footer { color: #666688; font-size: 11px; margin-top: 30px; }
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <div class="title">PNJ Anonymous Bot</div>
            <div class="subtitle">Verifikasi Email Mahasiswa PNJ</div>
            <p style="color: #c0c0e0; font-size: 14px;">Kode verifikasi kamu:</p>
            <div class="otp-box">
                <div class="otp-code">{{code}}</div>
            </div>
            <p style="color: #a0a0cc; font-size: 13px;">
                Masukkan kode ini di bot Telegram untuk<br>menyelesaikan verifikasi akunmu.
            </p>
            <div class="warning">
                ⚠️ Kode ini berlaku selama {{expiry}} menit.<br>
                Jangan bagikan kode ini kepada siapapun!
            </div>
            <div class="footer">
                Politeknik Negeri Jakarta<br>
                Jl. Prof. DR. G.A. Siwabessy, Kampus UI Depok 16425
            </div>
        </div>
    </div>
</body>
</html>"#;

/// Renders the HTML body of a verification email.
///
/// Codes are digits only, so no escaping is applied.
pub fn render_otp_html(code: &str, expiry_minutes: u32) -> String {
    OTP_HTML
        .replace("{{code}}", code)
        .replace("{{expiry}}", &expiry_minutes.to_string())
}

/// Plain-text alternative for clients that do not render HTML.
pub fn render_otp_text(code: &str, expiry_minutes: u32) -> String {
    format!(
        "Kode verifikasi PNJ Anonymous Bot kamu: {code}\n\n\
         Kode ini berlaku selama {expiry_minutes} menit.\n\
         Jangan bagikan kode ini kepada siapapun!"
    )
}

/// Splits a `Name <email>` sender into its parts.
///
/// A bare address gets [`SENDER_NAME`] as its display name.
pub fn split_sender(raw: &str) -> (String, String) {
    match raw.split_once('<') {
        Some((name, rest)) => {
            let name = name.trim().trim_matches('"').trim();
            let email = rest.trim_end().trim_end_matches('>').trim();
            let name = if name.is_empty() { SENDER_NAME } else { name };
            (name.to_string(), email.to_string())
        }
        None => (SENDER_NAME.to_string(), raw.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_contains_code_and_expiry() {
        let html = render_otp_html("482913", 10);
        assert!(html.contains(r#"<div class="otp-code">482913</div>"#));
        assert!(html.contains("berlaku selama 10 menit"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn text_alternative_mentions_expiry() {
        let text = render_otp_text("1234", 5);
        assert!(text.contains("1234"));
        assert!(text.contains("5 menit"));
    }

    #[test]
    fn sender_with_display_name() {
        assert_eq!(
            split_sender("Anon Bot <noreply@pnj.ac.id>"),
            ("Anon Bot".to_string(), "noreply@pnj.ac.id".to_string())
        );
        assert_eq!(
            split_sender("\"Quoted\" <a@b.id> "),
            ("Quoted".to_string(), "a@b.id".to_string())
        );
    }

    #[test]
    fn bare_sender_gets_default_name() {
        assert_eq!(
            split_sender(" bot@gmail.com "),
            (SENDER_NAME.to_string(), "bot@gmail.com".to_string())
        );
        assert_eq!(split_sender("<x@y.id>").0, SENDER_NAME);
    }
}
