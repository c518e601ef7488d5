mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use scout_engine::{
    build_staff_csv_prompt, ExtractedFacts, ManualClock, NavigationResolver, NavigationSettings,
    RowHandler, RowProcessor, RowSettings, ScoutError, TabManager, TabUrls,
};
use support::{init_logging, timeout, FakeBrowser, ScriptedChat};

const SHEET: &str = "https://docs.google.com/spreadsheets/d/abc/edit";
const HOME_URL: &str = "https://clinic.example";
const TEAM_URL: &str = "https://clinic.example/our-team";

const HOME: &str = r#"
<html><body>
<nav><a href="/">Home</a><a href="/our-team">Our Team</a><a href="/contact">Contact</a></nav>
<main><p>Call 555-010-9999 to book.</p></main>
</body></html>"#;

const TEAM: &str = r#"
<html><body>
<header><a href="tel:5550101234">(555) 010-1234</a></header>
<main>
  <h1>Meet Our Team</h1>
  <section><h2>Jane Doe, DVM</h2><p>Founder and owner of the clinic.</p></section>
  <section><h2>Dr. Mark Twain</h2><p>Associate veterinarian.</p></section>
  <section><h2>Alan Smith, DVM</h2></section>
  <p>Our founder, Jane Doe, opened the practice in 2001.</p>
</main>
</body></html>"#;

const SPARSE_TEAM: &str = r#"
<html><body><h1>Our Team</h1><p>Dr. Kim Park sees cats.</p></body></html>"#;

fn clinic_site(team: &str) -> FakeBrowser {
    FakeBrowser::new()
        .with_page(HOME_URL, HOME)
        .with_page(TEAM_URL, team)
}

fn processor(browser: &Arc<FakeBrowser>, chat: &Arc<ScriptedChat>) -> RowProcessor {
    let clock = Arc::new(ManualClock::new());
    let tabs = Arc::new(TabManager::new(browser.clone(), TabUrls::new(SHEET)));
    RowProcessor::new(
        browser.clone(),
        tabs,
        chat.clone(),
        NavigationResolver::new(clock, NavigationSettings::default()),
        RowSettings::default(),
    )
}

#[tokio::test]
async fn conclusive_staff_page_needs_a_single_question() {
    init_logging();
    let browser = Arc::new(clinic_site(TEAM));
    let chat = Arc::new(ScriptedChat::replying(vec![Ok("Our Team".to_string())]));

    let facts = processor(&browser, &chat)
        .process_row("job", 2, "clinic.example")
        .await
        .unwrap();

    assert_eq!(
        facts,
        ExtractedFacts {
            phone: Some("5550101234".to_string()),
            owner_first: Some("Jane".to_string()),
            owner_last: Some("Doe".to_string()),
            doctor_count: Some(3),
        }
    );
    assert_eq!(chat.threads(), 1);
    assert_eq!(chat.prompts().len(), 1);
    assert!(chat.prompts()[0].1, "landing screenshot should be attached");
    assert_eq!(browser.actions(), vec!["click 1".to_string()]);
    assert_eq!(
        browser.events(),
        vec![
            "open https://clinic.example".to_string(),
            "activate tab-1".to_string(),
            "activate tab-1".to_string(),
            "close tab-1".to_string(),
        ]
    );
    assert!(browser.tab_ids().is_empty());
}

#[tokio::test]
async fn inconclusive_page_asks_for_the_staff_line() {
    init_logging();
    let browser = Arc::new(clinic_site(SPARSE_TEAM));
    let chat = Arc::new(ScriptedChat::replying(vec![
        Ok("Our Team".to_string()),
        Ok("555-010-7777, Ann, Lee, 4".to_string()),
    ]));

    let facts = processor(&browser, &chat)
        .process_row("job", 2, "https://clinic.example")
        .await
        .unwrap();

    // Text values win over the reply; the reply only fills gaps.
    assert_eq!(
        facts,
        ExtractedFacts {
            phone: Some("555-010-9999".to_string()),
            owner_first: Some("Ann".to_string()),
            owner_last: Some("Lee".to_string()),
            doctor_count: Some(1),
        }
    );
    let prompts = chat.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[1], (build_staff_csv_prompt(), true));
}

#[tokio::test]
async fn timed_out_question_is_retried_once_then_skipped() {
    init_logging();
    let browser = Arc::new(clinic_site(TEAM));
    let chat = Arc::new(ScriptedChat::replying(vec![timeout(), timeout()]));

    let facts = processor(&browser, &chat)
        .process_row("job", 3, "clinic.example")
        .await
        .unwrap();

    let prompts = chat.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
    // Without a suggestion the staff keyword link is still followed.
    assert_eq!(browser.actions(), vec![format!("goto {TEAM_URL}")]);
    assert!(facts.is_conclusive(), "{facts:?}");
}

#[tokio::test]
async fn unreachable_site_fails_only_its_row() {
    init_logging();
    let browser = Arc::new(FakeBrowser::new().unreachable("down.example"));
    let chat = Arc::new(ScriptedChat::default());

    let err = processor(&browser, &chat)
        .process_row("job", 5, "down.example")
        .await
        .unwrap_err();

    assert!(!err.is_fatal());
    match err {
        ScoutError::Row { row, message } => {
            assert_eq!(row, 5);
            assert!(message.contains("https://down.example"), "{message}");
        }
        other => panic!("expected a row error, got {other:?}"),
    }
    assert!(chat.prompts().is_empty());
}

#[tokio::test]
async fn lost_chat_tab_is_passed_through() {
    init_logging();
    let browser = Arc::new(clinic_site(TEAM));
    let chat = Arc::new(ScriptedChat::replying(vec![Err(ScoutError::TabLost(
        "chat".to_string(),
    ))]));

    let err = processor(&browser, &chat)
        .process_row("job", 2, "clinic.example")
        .await
        .unwrap_err();

    assert!(matches!(err, ScoutError::TabLost(_)), "{err:?}");
    assert!(err.is_fatal());
}

#[tokio::test]
async fn open_site_tab_is_reused_and_closed_afterwards() {
    init_logging();
    let browser = Arc::new(clinic_site(TEAM));
    browser.add_tab("old", "https://clinic.example/contact");
    let chat = Arc::new(ScriptedChat::replying(vec![Ok("Our Team".to_string())]));

    processor(&browser, &chat)
        .process_row("job", 2, "clinic.example")
        .await
        .unwrap();

    assert_eq!(
        browser.actions(),
        vec![format!("goto {HOME_URL}"), "click 1".to_string()]
    );
    assert!(!browser.events().iter().any(|e| e.starts_with("open")));
    assert!(browser.tab_ids().is_empty());
}
