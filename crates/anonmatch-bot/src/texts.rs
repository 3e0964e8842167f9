// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing texts. All of them are sent as HTML; anything user-supplied
//! goes through [`escape_html`] first.

use anonmatch_core::community::{Confession, ConfessionReply, Poll};
use anonmatch_core::types::{Achievement, User};
use anonmatch_core::{Action, AnonmatchError};
use anonmatch_matching::achievements;
use anonmatch_matching::validation::escape_html;

pub const WELCOME: &str = "👋 <b>Selamat datang di PNJ Anonymous Bot!</b>\n\n\
    Ngobrol anonim dengan sesama mahasiswa Politeknik Negeri Jakarta.\n\n\
    Untuk mulai, verifikasi email kampus kamu dengan /regist.";
pub const ASK_EMAIL: &str = "📧 <b>Verifikasi Email PNJ</b>\n\n\
    Kirim email kampus kamu (@mhsw.pnj.ac.id, @stu.pnj.ac.id atau @pnj.ac.id).\n\n\
    <i>Ketik /cancel untuk membatalkan</i>";
pub const ALREADY_VERIFIED: &str = "✅ Email kamu sudah terverifikasi.";
pub const OTP_INVALID: &str = "❌ Kode OTP salah atau sudah kedaluwarsa. \
    Gunakan /regist untuk mengirim ulang kode.";
pub const VERIFIED: &str = "✅ <b>Email Berhasil Diverifikasi!</b>\n\n👤 <b>Pilih Gender Kamu:</b>";
pub const ASK_YEAR: &str = "🎓 <b>Pilih Tahun Angkatan (Masuk) Kamu:</b>";
pub const ASK_DEPARTMENT: &str = "🏛️ <b>Pilih Jurusan Kamu:</b>";
pub const EDIT_PROFILE: &str = "✏️ <b>Edit Profil</b>\n\n👤 <b>Pilih Gender Baru:</b>";
pub const PROFILE_UPDATED: &str = "✅ Profil berhasil diperbarui!";
pub const MAIN_MENU: &str = "🏠 <b>Menu Utama</b>\n\nPilih fitur di bawah ini:";

pub const NOT_REGISTERED: &str = "⚠️ Kamu belum terdaftar. Ketik /start untuk memulai.";
pub const NOT_VERIFIED: &str =
    "⚠️ <b>Email belum diverifikasi!</b>\n\nKetik /regist dan ikuti proses verifikasi email PNJ kamu.";
pub const PROFILE_INCOMPLETE: &str =
    "⚠️ <b>Profil belum lengkap!</b>\n\nKetik /start untuk melengkapi profil kamu.";
pub const BANNED: &str = "🚫 <b>Akun kamu telah di-banned.</b>\n\n\
    Akun ini diblokir karena menerima terlalu banyak laporan.";
pub const UNKNOWN_COMMAND: &str = "❓ Perintah tidak dikenali. Ketik /help untuk bantuan.";
pub const FALLBACK: &str =
    "💡 Gunakan /start untuk membuka menu utama atau /help untuk bantuan.";
pub const UNSUPPORTED: &str = "⚠️ Tipe pesan ini tidak didukung.";
pub const INTERNAL_ERROR: &str = "⚠️ Terjadi kesalahan. Silakan coba lagi nanti.";

pub const SEARCH_PICK_FILTER: &str = "🔍 <b>Cari Partner Chat Anonim</b>\n\nPilih filter pencarian:";
pub const SEARCH_PICK_GENDER: &str = "👫 <b>Pilih Gender Partner:</b>";
pub const SEARCH_PICK_DEPARTMENT: &str = "🏛️ <b>Pilih Jurusan Partner:</b>";
pub const SEARCH_PICK_YEAR: &str = "🎓 <b>Pilih Angkatan Partner:</b>";
pub const ALREADY_IN_CHAT: &str = "⚠️ Kamu masih dalam sesi chat!\n\
    Gunakan /stop untuk menghentikan atau /next untuk partner baru.";
pub const ALREADY_SEARCHING: &str = "⏳ Kamu sudah dalam antrian pencarian. Tunggu sebentar ya!";
pub const SEARCH_STOPPED: &str = "🛑 Pencarian dihentikan.";
pub const NO_ACTIVE_CHAT: &str = "⚠️ Tidak ada chat aktif saat ini.";
pub const CHAT_INACTIVE: &str = "⚠️ Chat tidak aktif. Gunakan /search untuk mencari partner.";
pub const PARTNER_LEFT: &str =
    "👋 <b>Partner kamu telah memutus chat.</b>\n\nGunakan /search untuk mencari partner baru.";
pub const CHAT_STOPPED: &str = "🛑 <b>Chat dihentikan.</b>\nKetik /search untuk mencari partner baru.";
pub const LOOKING_AGAIN: &str = "⏭️ <b>Mencari partner baru...</b>";
pub const RELAXED: &str = "⏳ <b>Belum menemukan partner...</b>\n\n\
    Filter kamu belum menemukan pasangan, sekarang bot akan mencari partner secara acak. \
    Tetap di antrian ya!";

pub const REPORT_NEEDS_CHAT: &str = "⚠️ Kamu hanya bisa melaporkan partner saat sedang chat.";
pub const REPORT_PROMPT: &str =
    "⚠️ <b>Laporkan Partner</b>\n\nTuliskan alasan kamu:\n<i>Ketik /cancel untuk membatalkan</i>";
pub const REPORT_SENT: &str = "✅ <b>Laporan Terkirim!</b>\n\n\
    Terima kasih, laporan kamu akan membantu menjaga komunitas tetap aman.";
pub const AUTO_BANNED: &str = "🚫 <b>Akun kamu telah diblokir otomatis</b> karena menerima \
    terlalu banyak laporan dari pengguna lain.";
pub const BLOCK_NEEDS_CHAT: &str = "⚠️ Kamu hanya bisa memblock partner saat sedang chat.";
pub const BLOCKED: &str = "🚫 <b>Partner telah di-block.</b>\n\nKamu tidak akan dipertemukan lagi.";
pub const PARTNER_DISCONNECTED: &str = "👋 <b>Partner kamu telah memutus chat.</b>";

pub const CONFESS_PROMPT: &str = "💬 <b>Tulis Confession Kamu</b>\n\n\
    📝 Ketik confession kamu sekarang...\nAtau ketik /cancel untuk membatalkan.\n\n\
    ⚠️ <i>Confession akan menampilkan jurusan kamu tapi TIDAK identitas kamu.</i>";
pub const NO_CONFESSIONS: &str = "📋 Belum ada confession. Jadilah yang pertama dengan /confess!";
pub const REACT_USAGE: &str = "💡 Cara pakai: <code>/react &lt;id&gt; &lt;emoji&gt;</code>\n\
    Contoh: <code>/react 12 🔥</code>";
pub const REPLY_USAGE: &str = "💡 Cara pakai: <code>/reply &lt;id&gt; &lt;pesan&gt;</code>";
pub const VIEW_REPLIES_USAGE: &str = "💡 Cara pakai: <code>/view_replies &lt;id&gt;</code>";
pub const CONFESSION_NOT_FOUND: &str = "❌ Confession tidak ditemukan.";
pub const POLL_USAGE: &str = "💡 Cara pakai: <code>/poll Pertanyaan | Opsi 1 | Opsi 2</code>\n\
    Minimal 2 opsi, maksimal 10.";
pub const NO_POLLS: &str = "🗳️ Belum ada polling. Buat dengan /poll!";
pub const VOTE_POLL_USAGE: &str = "💡 Cara pakai: <code>/vote_poll &lt;id&gt;</code>";
pub const POLL_NOT_FOUND: &str = "❌ Polling tidak ditemukan.";
pub const VOTE_RECORDED: &str = "✅ Suara kamu berhasil direkam!";
pub const ALREADY_VOTED: &str = "⚠️ Kamu sudah memberikan suara di polling ini.";

pub const WHISPER_PICK: &str = "📢 <b>Whisper - Pesan Anonim ke Jurusan</b>\n\n🎯 Pilih jurusan tujuan:";

pub const NO_CIRCLES: &str = "👥 <b>Circles</b>\n\nBelum ada circle aktif. Buat yang pertama!";
pub const CIRCLES_HEADER: &str = "👥 <b>Circles</b>\n\nPilih circle untuk bergabung:";
pub const NOT_IN_CIRCLE: &str = "⚠️ Kamu tidak sedang berada di circle mana pun.";
pub const ROOM_NAME_PROMPT: &str = "➕ <b>Buat Circle Baru</b>\n\n\
    Tuliskan <b>Nama Circle</b> yang ingin kamu buat:\n(Contoh: Pejuang Kopi PNJ)\n\n\
    <i>Ketik /cancel untuk membatalkan</i>";
pub const CIRCLE_NOT_FOUND: &str = "❌ Circle tidak ditemukan.";
pub const CIRCLE_EXISTS: &str = "❌ Circle dengan nama serupa sudah ada.";
pub const JOIN_ENDS_CHAT: &str = "⚠️ <b>Kamu sedang dalam Private Chat aktif</b>\n\n\
    Bergabung ke circle akan mengakhiri chat kamu saat ini secara otomatis. Apakah kamu yakin?";
pub const STAY_IN_CHAT: &str = "👍 Oke, kamu tetap di private chat.";
pub const STAY_IN_CIRCLE: &str = "👍 Oke, kamu tetap di circle.";

pub const NOTHING_TO_CANCEL: &str = "💡 Tidak ada aksi yang perlu dibatalkan.";

pub const ABOUT: &str = "ℹ️ <b>Tentang PNJ Anonymous Bot</b>\n\n\
    Bot obrolan anonim khusus mahasiswa Politeknik Negeri Jakarta.\n\
    Identitas kamu tidak pernah dibagikan ke partner.\n\n\
    Laporkan penyalahgunaan dengan /report.";

pub const HELP: &str = "📖 <b>Daftar Perintah</b>\n\n\
    <b>Dasar</b>\n\
    /start - Mulai bot & menu utama\n\
    /regist - Verifikasi email PNJ\n\
    /help - Bantuan\n\
    /about - Tentang bot\n\
    /cancel - Batalkan aksi\n\n\
    <b>Chat Anonim</b>\n\
    /search [jurusan] [gender] [angkatan] - Cari partner\n\
    /next - Partner berikutnya\n\
    /stop - Hentikan chat\n\
    /report - Laporkan partner\n\
    /block - Block partner\n\n\
    <b>Confession & Polling</b>\n\
    /confess - Kirim confession\n\
    /confessions - Confession terbaru\n\
    /react &lt;id&gt; &lt;emoji&gt; - Beri reaksi\n\
    /reply &lt;id&gt; &lt;pesan&gt; - Balas confession\n\
    /view_replies &lt;id&gt; - Lihat balasan\n\
    /poll q | a | b - Buat polling\n\
    /polls - Polling terbaru\n\
    /vote_poll &lt;id&gt; - Ikut voting\n\n\
    <b>Komunitas</b>\n\
    /whisper - Pesan anonim ke satu jurusan\n\
    /circles - Ruang obrolan grup anonim\n\
    /leave_circle - Keluar dari circle\n\n\
    <b>Profil</b>\n\
    /profile - Profil kamu\n\
    /stats - Statistik kamu\n\
    /edit - Ubah profil";

/// Keeps the first three characters of the local part: `bud***@mhsw.pnj.ac.id`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let head: String = local.chars().take(3).collect();
            format!("{head}***@{domain}")
        }
        None => "***".to_string(),
    }
}

/// Notice for a failed operation, or `None` when the user should not be told.
pub fn user_message(err: &AnonmatchError) -> Option<String> {
    let msg = match err {
        AnonmatchError::NotVerified => NOT_VERIFIED.to_string(),
        AnonmatchError::ProfileIncomplete => PROFILE_INCOMPLETE.to_string(),
        AnonmatchError::Banned => BANNED.to_string(),
        AnonmatchError::AlreadyInSession => ALREADY_IN_CHAT.to_string(),
        AnonmatchError::AlreadyInQueue => ALREADY_SEARCHING.to_string(),
        AnonmatchError::RateLimited { action } => rate_limited(*action).to_string(),
        AnonmatchError::PartnerGone => CHAT_INACTIVE.to_string(),
        AnonmatchError::InvalidInput { field, reason } => invalid_input(field, reason),
        AnonmatchError::ModerationBlocked { reason } => format!(
            "🚫 <b>Pesan tidak terkirim.</b>\n\n{}",
            escape_html(reason)
        ),
        AnonmatchError::Config(_) => return None,
        _ => INTERNAL_ERROR.to_string(),
    };
    Some(msg)
}

fn rate_limited(action: Action) -> &'static str {
    match action {
        Action::Search => "⏳ Terlalu sering mencari partner. Tunggu sebentar lalu coba lagi.",
        Action::Report => "⚠️ Kamu sudah mencapai batas laporan hari ini.",
        Action::Confession => "⏳ Batas confession per jam tercapai. Coba lagi nanti.",
        Action::Reply => "⏳ Batas balasan per jam tercapai. Coba lagi nanti.",
        Action::Whisper => "⏳ Batas whisper per jam tercapai. Coba lagi nanti.",
        Action::Otp => "🔒 Terlalu banyak percobaan OTP. Coba lagi dalam 15 menit.",
    }
}

fn invalid_input(field: &str, reason: &str) -> String {
    let what = match field {
        "email" => "Email tidak valid. Gunakan email @mhsw.pnj.ac.id, @stu.pnj.ac.id atau @pnj.ac.id.",
        "entry_year" => "Tahun angkatan tidak valid.",
        "department" => "Jurusan tidak dikenali.",
        "gender" => "Gender tidak dikenali.",
        "confession" => "Confession harus 10 sampai 1000 karakter.",
        "whisper" => "Whisper harus 5 sampai 500 karakter.",
        "room_name" => "Nama circle harus 3 sampai 30 karakter.",
        "room_description" => "Deskripsi circle harus 5 sampai 200 karakter.",
        "report_reason" => "Alasan laporan harus 5 sampai 500 karakter.",
        "reply" => "Balasan harus 1 sampai 500 karakter.",
        "poll_question" => "Pertanyaan polling harus 5 sampai 300 karakter.",
        "poll_option" => "Setiap opsi polling harus 1 sampai 100 karakter.",
        "poll" => "Polling butuh pertanyaan dan 2 sampai 10 opsi, dipisah dengan |.",
        "circle" => "Kamu sedang berada di circle. Keluar dulu dengan /leave_circle.",
        _ => return format!("⚠️ Input tidak valid: {}", escape_html(reason)),
    };
    format!("⚠️ {what}")
}

pub fn otp_sent(email: &str, expiry_minutes: u32) -> String {
    format!(
        "📧 <b>Kode OTP Telah Dikirim!</b>\n\n\
         Kode verifikasi dikirim ke <code>{}</code>.\n\
         ⏰ Berlaku selama {expiry_minutes} menit.\n\n\
         Ketik kode tersebut di sini.",
        escape_html(&mask_email(email))
    )
}

pub fn profile_completed(display_name: &str) -> String {
    format!(
        "🎉 <b>Profil Lengkap!</b>\n\nNama anonim kamu: <b>{}</b>\n\n\
         Gunakan /search untuk mulai mencari partner.",
        escape_html(display_name)
    )
}

pub fn enqueued(position: usize) -> String {
    format!(
        "🔍 <b>Mencari Partner...</b>\n\n⏳ Kamu telah masuk ke antrian\n\
         👥 Orang dalam antrian: {position}\n\n<i>Gunakan /stop untuk membatalkan</i>"
    )
}

/// Shown to each side of a new session with the other side's public profile.
pub fn partner_found(partner: Option<&User>) -> String {
    let (gender, year, dept) = match partner {
        Some(p) => (
            p.gender
                .map(|g| format!("{} {}", g.emoji(), g.label()))
                .unwrap_or_else(|| "-".into()),
            p.entry_year.map(|y| y.to_string()).unwrap_or_else(|| "-".into()),
            p.department
                .map(|d| format!("{} {d}", d.emoji()))
                .unwrap_or_else(|| "-".into()),
        ),
        None => ("-".into(), "-".into(), "-".into()),
    };
    format!(
        "🎉 <b>Partner Ditemukan!</b>\n\n\
         👤 Gender: {gender}\n🎓 Angkatan: {year}\n🏛️ Jurusan: {}\n\n\
         Selamat ngobrol! Identitas kalian tetap anonim.",
        escape_html(&dept)
    )
}

pub fn leave_circle_first(room_name: &str) -> String {
    format!(
        "⚠️ Kamu sedang berada di <b>{}</b>.\n\n\
         Apakah kamu ingin keluar dari Circle dan mencari partner baru?",
        escape_html(room_name)
    )
}

pub fn report_warning(count: i64, threshold: i64) -> String {
    format!(
        "⚠️ <b>PERINGATAN MODERASI</b>\n\n\
         Kamu menerima laporan dari pengguna lain. Harap jaga sikap saat chat.\n\n\
         Status Laporan: {count}/{threshold}\n\
         <i>Akun akan diblokir otomatis jika mencapai batas.</i>"
    )
}

pub fn achievement_unlocked(key: &str) -> Option<String> {
    achievements::lookup(key).map(|a| {
        format!(
            "🎊 <b>ACHIEVEMENT UNLOCKED!</b>\n\n{} <b>{}</b>\n{}",
            a.icon, a.name, a.description
        )
    })
}

pub fn profile(user: &User, earned: &[Achievement]) -> String {
    let gender = user
        .gender
        .map(|g| format!("{} {}", g.emoji(), g.label()))
        .unwrap_or_else(|| "-".into());
    let dept = user
        .department
        .map(|d| format!("{} {d}", d.emoji()))
        .unwrap_or_else(|| "-".into());
    let year = user
        .entry_year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "-".into());
    let badges = if earned.is_empty() {
        "-".to_string()
    } else {
        earned
            .iter()
            .filter_map(|a| achievements::lookup(&a.key))
            .map(|a| format!("{} {}", a.icon, a.name))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "👤 <b>Profil Kamu</b>\n\n\
         🎭 Nama Anonim: <b>{}</b>\n\
         👫 Gender: {gender}\n🎓 Angkatan: {year}\n🏛️ Jurusan: {}\n\
         📧 Email: {}\n\n\
         ✨ Karma: {}\n🏅 Achievement: {badges}",
        escape_html(user.display_name.as_deref().unwrap_or("-")),
        escape_html(&dept),
        escape_html(&user.email.as_deref().map(mask_email).unwrap_or_else(|| "-".into())),
        user.karma,
    )
}

pub fn stats(user: &User, confessions: i64, users: i64, active_sessions: i64) -> String {
    format!(
        "📊 <b>Statistik</b>\n\n\
         💬 Total chat kamu: {}\n\
         📝 Confession kamu: {confessions}\n\
         ✨ Karma: {}\n\n\
         <b>Komunitas</b>\n\
         👥 Pengguna terdaftar: {users}\n\
         🔥 Chat aktif sekarang: {active_sessions}",
        user.total_chats, user.karma,
    )
}

pub fn confession_sent(id: i64) -> String {
    format!("✅ <b>Confession Terkirim!</b>\n\nConfession #{id} sudah dipublikasikan secara anonim.")
}

pub fn confession_card(c: &Confession) -> String {
    let dept = c
        .department
        .map(|d| format!("{} {d}", d.emoji()))
        .unwrap_or_else(|| "🏫 PNJ".into());
    format!(
        "💬 <b>Confession #{}</b> · {}\n\n{}\n\n💬 /reply {} · 👀 /view_replies {}",
        c.id,
        escape_html(&dept),
        escape_html(&c.content),
        c.id,
        c.id
    )
}

pub fn reacted(emoji: &str, id: i64) -> String {
    format!("✅ Berhasil menambahkan reaksi {} ke confession #{id}", escape_html(emoji))
}

pub fn replied(id: i64) -> String {
    format!("✅ Berhasil membalas confession #{id}")
}

pub fn replies(confession_id: i64, replies: &[ConfessionReply]) -> String {
    if replies.is_empty() {
        return format!("💬 Belum ada balasan untuk confession #{confession_id}.");
    }
    let body = replies
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, escape_html(&r.content)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("💬 <b>Balasan Confession #{confession_id}</b>\n\n{body}")
}

pub fn poll_created(id: i64) -> String {
    format!("✅ Polling #{id} berhasil dibuat!\n\nAjak teman voting dengan /vote_poll {id}")
}

pub fn poll_card(poll: &Poll) -> String {
    let total = poll.total_votes();
    let options = poll
        .options
        .iter()
        .map(|o| {
            let pct = if total > 0 { o.votes * 100 / total } else { 0 };
            format!("• {} - {} suara ({pct}%)", escape_html(&o.text), o.votes)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "🗳️ <b>Polling #{}</b>\n{}\n\n{options}\n\nTotal: {total} suara",
        poll.id,
        escape_html(&poll.question)
    )
}

pub fn whisper_prompt(dept: &str) -> String {
    format!(
        "📢 <b>Whisper ke {}</b>\n\nTulis pesan anonim kamu untuk mahasiswa jurusan ini:\n\
         <i>Ketik /cancel untuk membatalkan</i>",
        escape_html(dept)
    )
}

pub fn whisper_delivery(sender_dept: Option<&str>, content: &str) -> String {
    format!(
        "📢 <b>Whisper dari {}</b>\n\n{}",
        escape_html(sender_dept.unwrap_or("seseorang")),
        escape_html(content)
    )
}

pub fn whisper_sent(delivered: usize) -> String {
    format!("✅ <b>Whisper Terkirim!</b>\n\nDikirim ke {delivered} mahasiswa")
}

pub fn circle_joined(name: &str, ended_chat: bool) -> String {
    let note = if ended_chat {
        "Pesan kamu sekarang dikirim ke circle ini. Private chat sebelumnya telah dihentikan."
    } else {
        "Sekarang semua pesan yang kamu ketik akan dikirim ke semua anggota circle ini secara anonim."
    };
    format!(
        "🎉 <b>Berhasil Terhubung ke Circle {}</b>\n\n{note}\n\n\
         💡 Gunakan /leave_circle untuk keluar.",
        escape_html(name)
    )
}

pub fn circle_left(name: &str) -> String {
    format!("👋 Kamu telah keluar dari circle <b>{}</b>", escape_html(name))
}

pub fn circle_message(room: &str, sender: &str, text: &str) -> String {
    format!(
        "👥 <b>[{}]</b>\n👤 <b>{}</b>: {}",
        escape_html(room),
        escape_html(sender),
        escape_html(text)
    )
}

pub fn room_desc_prompt(name: &str) -> String {
    format!(
        "📝 <b>Nama Circle:</b> {}\n\nSekarang tulis <b>Deskripsi Singkat</b> untuk circle ini:",
        escape_html(name)
    )
}

pub fn room_created(name: &str) -> String {
    format!(
        "✅ <b>Circle Berhasil Dibuat!</b>\n\nKamu otomatis bergabung ke circle <b>{}</b>. \
         Selamat ngobrol!",
        escape_html(name)
    )
}

pub fn cancelled(what: &str) -> String {
    format!("❌ {what} dibatalkan.")
}
