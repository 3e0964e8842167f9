// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation flows driven through the router against a temp database.

use std::sync::Arc;

use anonmatch_bot::{BotContext, Router};
use anonmatch_core::types::{Department, Gender, MediaPayload};
use anonmatch_core::{InboundKind, UserState};
use anonmatch_test_utils::TestHarness;

fn router(h: &TestHarness) -> Router {
    Router::new(BotContext::new(
        h.engine.clone(),
        h.community.clone(),
        Arc::new(h.config.clone()),
        h.shutdown.clone(),
    ))
}

fn last_body(h: &TestHarness, user: i64) -> String {
    h.channel.bodies_to(user).pop().unwrap_or_default()
}

async fn state(h: &TestHarness, user: i64) -> UserState {
    h.storage.get_state(user).await.unwrap().state
}

/// Two verified users paired with each other.
async fn paired(h: &TestHarness, r: &Router) {
    h.add_verified_user(1, Gender::Male, Department::TeknikInformatika, 2022)
        .await
        .unwrap();
    h.add_verified_user(2, Gender::Female, Department::Akuntansi, 2023)
        .await
        .unwrap();
    r.handle(h.callback(1, "search:any")).await;
    r.handle(h.callback(2, "search:any")).await;
    assert_eq!(state(h, 1).await, UserState::InChat);
    assert_eq!(state(h, 2).await, UserState::InChat);
    h.channel.clear_sent();
}

#[tokio::test]
async fn registration_walks_through_every_profile_step() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);

    r.handle(h.command(10, "regist", "")).await;
    assert!(last_body(&h, 10).contains("Verifikasi Email PNJ"));
    assert_eq!(state(&h, 10).await, UserState::AwaitingEmail);

    r.handle(h.text(10, "Budi.Santoso@MHSW.pnj.ac.id")).await;
    let body = last_body(&h, 10);
    assert!(body.contains("Kode OTP Telah Dikirim"));
    assert!(body.contains("bud***@mhsw.pnj.ac.id"));

    let (email, code) = h.mailer.last_sent().unwrap();
    assert_eq!(email, "budi.santoso@mhsw.pnj.ac.id");
    r.handle(h.text(10, &code)).await;
    assert!(last_body(&h, 10).contains("Email Berhasil Diverifikasi"));

    r.handle(h.callback(10, "gender:F")).await;
    assert!(last_body(&h, 10).contains("Tahun Angkatan"));
    r.handle(h.callback(10, "year:2022")).await;
    assert!(last_body(&h, 10).contains("Pilih Jurusan"));
    r.handle(h.callback(10, "dept:tik")).await;
    assert!(last_body(&h, 10).contains("Profil Lengkap"));

    let user = h.storage.get_user(10).await.unwrap().unwrap();
    assert!(user.verified);
    assert_eq!(user.gender, Some(Gender::Female));
    assert_eq!(user.entry_year, Some(2022));
    assert_eq!(user.department, Some(Department::TeknikInformatika));
    assert!(user.display_name.is_some());
    assert_eq!(state(&h, 10).await, UserState::None);
    assert_eq!(h.channel.answered_callbacks().len(), 3);
}

#[tokio::test]
async fn wrong_code_keeps_the_user_waiting() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    r.handle(h.command(11, "regist", "")).await;
    r.handle(h.text(11, "ani@stu.pnj.ac.id")).await;
    let (_, code) = h.mailer.last_sent().unwrap();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    r.handle(h.text(11, wrong)).await;
    assert!(last_body(&h, 11).contains("Kode OTP salah"));
    assert_eq!(state(&h, 11).await, UserState::AwaitingOtp);
}

#[tokio::test]
async fn foreign_email_domain_is_refused() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    r.handle(h.command(12, "regist", "")).await;
    r.handle(h.text(12, "someone@gmail.com")).await;
    assert!(last_body(&h, 12).contains("Email tidak valid"));
    assert_eq!(h.mailer.sent_count(), 0);
}

#[tokio::test]
async fn unverified_users_are_gated() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    r.handle(h.command(20, "search", "")).await;
    assert!(last_body(&h, 20).contains("Email belum diverifikasi"));

    // Ungated commands still answer.
    r.handle(h.command(20, "help", "")).await;
    assert!(last_body(&h, 20).contains("Daftar Perintah"));
}

#[tokio::test]
async fn unknown_commands_get_a_hint() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    r.handle(h.command(21, "frobnicate", "")).await;
    assert!(last_body(&h, 21).contains("Perintah tidak dikenali"));
}

#[tokio::test]
async fn media_outside_a_chat_is_unsupported() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    h.add_verified_user(22, Gender::Male, Department::TeknikSipil, 2021)
        .await
        .unwrap();
    let photo = InboundKind::Photo(MediaPayload {
        file_id: "photo-1".into(),
        caption: None,
        ephemeral: false,
    });
    r.handle(h.event(22, photo)).await;
    assert!(last_body(&h, 22).contains("tidak didukung"));
}

#[tokio::test]
async fn maintenance_account_skips_verification() {
    let h = TestHarness::builder()
        .with_config(|c| c.bot.maintenance_account_id = 99)
        .build()
        .await
        .unwrap();
    let r = router(&h);
    r.handle(h.command(99, "search", "")).await;
    assert!(last_body(&h, 99).contains("Cari Partner Chat Anonim"));
    assert!(h.storage.get_user(99).await.unwrap().is_some());
}

#[tokio::test]
async fn search_pairs_two_users_and_tells_both() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    h.add_verified_user(1, Gender::Male, Department::TeknikInformatika, 2022)
        .await
        .unwrap();
    h.add_verified_user(2, Gender::Female, Department::Akuntansi, 2023)
        .await
        .unwrap();

    r.handle(h.command(1, "search", "")).await;
    assert!(last_body(&h, 1).contains("Pilih filter pencarian"));

    r.handle(h.callback(1, "search:any")).await;
    assert!(last_body(&h, 1).contains("Mencari Partner"));
    assert_eq!(state(&h, 1).await, UserState::Searching);

    r.handle(h.command(2, "search", "any")).await;
    let to_one = last_body(&h, 1);
    let to_two = last_body(&h, 2);
    assert!(to_one.contains("Partner Ditemukan"));
    assert!(to_one.contains("Akuntansi"));
    assert!(to_two.contains("Partner Ditemukan"));
    assert!(to_two.contains("Teknik Informatika"));

    // A second search while chatting is refused.
    r.handle(h.command(1, "search", "any")).await;
    assert!(last_body(&h, 1).contains("masih dalam sesi chat"));
}

#[tokio::test]
async fn text_is_relayed_to_the_partner() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    paired(&h, &r).await;

    r.handle(h.text(1, "halo <kamu>")).await;
    let body = last_body(&h, 2);
    assert!(body.contains("Stranger:"));
    assert!(body.contains("halo &lt;kamu&gt;"));
    assert!(h.channel.bodies_to(1).is_empty());
}

#[tokio::test]
async fn stop_ends_the_chat_for_both_sides() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    paired(&h, &r).await;

    r.handle(h.command(1, "stop", "")).await;
    assert!(last_body(&h, 1).contains("Chat dihentikan"));
    assert!(last_body(&h, 2).contains("Partner kamu telah memutus chat"));
    assert_eq!(state(&h, 1).await, UserState::None);
    assert_eq!(state(&h, 2).await, UserState::None);

    r.handle(h.command(1, "stop", "")).await;
    assert!(last_body(&h, 1).contains("Tidak ada chat aktif"));

    // Chat text after the end falls back to the menu hint.
    r.handle(h.text(2, "masih di sana?")).await;
    assert!(last_body(&h, 2).contains("Gunakan /start"));
}

#[tokio::test]
async fn partner_stop_abandons_a_pending_report() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    paired(&h, &r).await;

    r.handle(h.command(1, "report", "")).await;
    assert_eq!(state(&h, 1).await, UserState::AwaitingReport);

    r.handle(h.command(2, "stop", "")).await;
    assert!(h.engine.sessions.get_active_for(1).await.unwrap().is_none());
    assert_eq!(state(&h, 1).await, UserState::None);
    assert_eq!(state(&h, 2).await, UserState::None);

    // The reason that would have followed is now ordinary text.
    r.handle(h.text(1, "dia berkata kasar")).await;
    assert!(last_body(&h, 1).contains("Gunakan /start"));
    assert_eq!(h.storage.get_user(2).await.unwrap().unwrap().report_count, 0);
}

#[tokio::test]
async fn next_ends_the_chat_and_queues_again() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    paired(&h, &r).await;

    r.handle(h.command(1, "next", "")).await;
    assert!(last_body(&h, 2).contains("Partner kamu telah memutus chat"));
    let bodies = h.channel.bodies_to(1);
    assert!(bodies.iter().any(|b| b.contains("Mencari partner baru")));
    assert!(bodies.last().unwrap().contains("Mencari Partner"));
    assert_eq!(state(&h, 1).await, UserState::Searching);
    assert_eq!(state(&h, 2).await, UserState::None);
}

#[tokio::test]
async fn report_below_threshold_warns_the_partner() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    paired(&h, &r).await;

    r.handle(h.command(1, "report", "")).await;
    assert!(last_body(&h, 1).contains("Laporkan Partner"));
    assert_eq!(state(&h, 1).await, UserState::AwaitingReport);

    // Too short: still waiting for a reason.
    r.handle(h.text(1, "eh")).await;
    assert_eq!(state(&h, 1).await, UserState::AwaitingReport);

    r.handle(h.text(1, "kata-kata kasar terus")).await;
    assert!(last_body(&h, 1).contains("Laporan Terkirim"));
    assert!(last_body(&h, 2).contains("Status Laporan: 1/3"));
    assert_eq!(state(&h, 1).await, UserState::InChat);
    assert!(!h.storage.get_user(2).await.unwrap().unwrap().banned);
}

#[tokio::test]
async fn report_at_threshold_bans_and_ends_the_chat() {
    let h = TestHarness::builder()
        .with_config(|c| c.limits.auto_ban_report_count = 1)
        .build()
        .await
        .unwrap();
    let r = router(&h);
    paired(&h, &r).await;

    r.handle(h.command(1, "report", "")).await;
    r.handle(h.text(1, "mengirim spam berulang kali")).await;

    assert!(h.storage.get_user(2).await.unwrap().unwrap().banned);
    let to_two = h.channel.bodies_to(2);
    assert!(to_two.iter().any(|b| b.contains("diblokir otomatis")));
    let to_one = h.channel.bodies_to(1);
    assert!(to_one.iter().any(|b| b.contains("Laporan Terkirim")));
    assert!(to_one.iter().any(|b| b.contains("Partner kamu telah memutus chat")));
    assert_eq!(state(&h, 1).await, UserState::None);
    assert_eq!(state(&h, 2).await, UserState::None);

    r.handle(h.command(2, "search", "any")).await;
    assert!(last_body(&h, 2).contains("telah di-banned"));
}

#[tokio::test]
async fn block_ends_the_chat_and_prevents_rematch() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    paired(&h, &r).await;

    r.handle(h.callback(1, "chat:block")).await;
    assert!(last_body(&h, 1).contains("Partner telah di-block"));
    assert!(last_body(&h, 2).contains("Partner kamu telah memutus chat"));
    assert_eq!(h.storage.blocked_peers(1).await.unwrap(), vec![2]);

    r.handle(h.command(1, "search", "any")).await;
    r.handle(h.command(2, "search", "any")).await;
    assert_eq!(state(&h, 1).await, UserState::Searching);
    assert_eq!(state(&h, 2).await, UserState::Searching);
}

#[tokio::test]
async fn confessions_collect_reactions_and_replies() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    h.add_verified_user(1, Gender::Male, Department::TeknikMesin, 2020)
        .await
        .unwrap();
    h.add_verified_user(2, Gender::Female, Department::TeknikGrafika, 2021)
        .await
        .unwrap();

    r.handle(h.command(1, "confess", "")).await;
    assert_eq!(state(&h, 1).await, UserState::AwaitingConfession);
    r.handle(h.text(1, "hai")).await;
    assert!(last_body(&h, 1).contains("10 sampai 1000"));
    assert_eq!(state(&h, 1).await, UserState::AwaitingConfession);

    r.handle(h.text(1, "Aku suka diam-diam ke perpustakaan tiap sore"))
        .await;
    assert!(last_body(&h, 1).contains("Confession Terkirim"));
    assert_eq!(state(&h, 1).await, UserState::None);

    let confession = h.community.latest_confessions(1).await.unwrap().remove(0);
    assert_eq!(confession.department, Some(Department::TeknikMesin));

    r.handle(h.command(2, "confessions", "")).await;
    assert!(last_body(&h, 2).contains("perpustakaan"));

    r.handle(h.command(2, "react", &format!("{} 🔥", confession.id)))
        .await;
    assert!(last_body(&h, 2).contains("Berhasil menambahkan reaksi"));

    r.handle(h.command(2, "reply", &format!("{} semangat terus!", confession.id)))
        .await;
    assert!(last_body(&h, 2).contains("Berhasil membalas"));
    assert!(last_body(&h, 1).contains("mendapat balasan baru"));
    assert_eq!(h.storage.get_user(1).await.unwrap().unwrap().karma, 1);

    r.handle(h.command(1, "view_replies", &confession.id.to_string()))
        .await;
    assert!(last_body(&h, 1).contains("semangat terus!"));
}

#[tokio::test]
async fn polls_accept_one_vote_per_user() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    h.add_verified_user(1, Gender::Male, Department::TeknikElektro, 2020)
        .await
        .unwrap();
    h.add_verified_user(2, Gender::Female, Department::TeknikElektro, 2020)
        .await
        .unwrap();

    r.handle(h.command(1, "poll", "Makan siang di mana? | Kantin | Warteg"))
        .await;
    assert!(last_body(&h, 1).contains("berhasil dibuat"));
    assert_eq!(h.storage.get_user(1).await.unwrap().unwrap().karma, 3);

    let poll = h.community.latest_polls(1).await.unwrap().remove(0);
    let option = poll.options[1].id;
    let data = format!("vote:{}:{option}", poll.id);

    r.handle(h.callback(2, &data)).await;
    assert!(h
        .channel
        .bodies_to(2)
        .iter()
        .any(|b| b.contains("berhasil direkam")));
    r.handle(h.callback(2, &data)).await;
    assert!(last_body(&h, 2).contains("sudah memberikan suara"));

    let poll = h.community.get_poll(poll.id).await.unwrap().unwrap();
    assert_eq!(poll.total_votes(), 1);
}

#[tokio::test]
async fn whispers_reach_the_target_department() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    h.add_verified_user(1, Gender::Male, Department::TeknikInformatika, 2022)
        .await
        .unwrap();
    h.add_verified_user(2, Gender::Female, Department::TeknikInformatika, 2023)
        .await
        .unwrap();
    h.add_verified_user(3, Gender::Female, Department::Akuntansi, 2021)
        .await
        .unwrap();

    r.handle(h.command(3, "whisper", "")).await;
    assert!(last_body(&h, 3).contains("Pilih jurusan tujuan"));
    r.handle(h.callback(3, "whisper:tik")).await;
    assert_eq!(state(&h, 3).await, UserState::AwaitingWhisper);

    r.handle(h.text(3, "semangat UTS anak TIK!")).await;
    assert!(last_body(&h, 3).contains("Dikirim ke 2 mahasiswa"));
    for user in [1, 2] {
        let body = last_body(&h, user);
        assert!(body.contains("Whisper dari Akuntansi"));
        assert!(body.contains("semangat UTS"));
    }
    assert_eq!(state(&h, 3).await, UserState::None);
}

#[tokio::test]
async fn circles_relay_to_every_other_member() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    h.add_verified_user(1, Gender::Male, Department::AdministrasiNiaga, 2022)
        .await
        .unwrap();
    h.add_verified_user(2, Gender::Female, Department::TeknikSipil, 2022)
        .await
        .unwrap();

    r.handle(h.callback(1, "circle:create")).await;
    assert_eq!(state(&h, 1).await, UserState::AwaitingRoomName);
    r.handle(h.text(1, "Pejuang Kopi")).await;
    assert_eq!(state(&h, 1).await, UserState::AwaitingRoomDesc);
    r.handle(h.text(1, "Ngopi bareng tiap pagi")).await;
    assert!(last_body(&h, 1).contains("Circle Berhasil Dibuat"));
    let snapshot = h.storage.get_state(1).await.unwrap();
    assert_eq!(snapshot.state, UserState::InCircle);
    assert_eq!(snapshot.payload, "pejuang-kopi");

    r.handle(h.callback(2, "circle:join:pejuang-kopi")).await;
    assert!(last_body(&h, 2).contains("Terhubung ke Circle Pejuang Kopi"));

    r.handle(h.text(2, "pagi semua")).await;
    let body = last_body(&h, 1);
    assert!(body.contains("[Pejuang Kopi]"));
    assert!(body.contains("TestUser2"));
    assert!(body.contains("pagi semua"));

    // Searching from a circle asks to leave it first.
    r.handle(h.command(1, "search", "")).await;
    assert!(last_body(&h, 1).contains("Kamu sedang berada di"));
    assert_eq!(state(&h, 1).await, UserState::InCircle);

    r.handle(h.command(2, "leave_circle", "")).await;
    assert!(last_body(&h, 2).contains("telah keluar dari circle"));
    assert_eq!(state(&h, 2).await, UserState::None);
}

#[tokio::test]
async fn cancel_abandons_the_pending_prompt() {
    let h = TestHarness::new().await.unwrap();
    let r = router(&h);
    h.add_verified_user(1, Gender::Male, Department::Pascasarjana, 2019)
        .await
        .unwrap();

    r.handle(h.command(1, "confess", "")).await;
    r.handle(h.command(1, "cancel", "")).await;
    assert!(last_body(&h, 1).contains("Confession dibatalkan"));
    assert_eq!(state(&h, 1).await, UserState::None);

    r.handle(h.command(1, "cancel", "")).await;
    assert!(last_body(&h, 1).contains("Tidak ada aksi"));
}
