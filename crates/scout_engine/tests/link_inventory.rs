use pretty_assertions::assert_eq;
use scout_engine::LinkInventoryBuilder;

const PAGE: &str = r##"
<html><head><title>Clinic</title><script>var nav = "<a href='/x'>x</a>";</script></head>
<body>
<header>
  <nav role="navigation">
    <ul>
      <li><a href="/">Home</a></li>
      <li><button aria-haspopup="true">About</button>
        <ul class="dropdown-menu">
          <li><a href="/team">Meet the Team</a></li>
        </ul>
      </li>
      <li><a href="tel:+1%20555%20010%201234">Call us</a></li>
    </ul>
  </nav>
</header>
<main>
  <h1>Welcome</h1>
  <p>Caring for pets since 1990.</p>
  <a href="javascript:void(0)" aria-label="Open chat"></a>
  <div style="display: none"><a href="https://other.example/secret">Secret</a></div>
</main>
</body></html>"##;

#[test]
fn anchors_keep_document_indices_and_context() {
    let page = LinkInventoryBuilder::new().build(PAGE, "https://clinic.example/index.html");
    let summary: Vec<(usize, &str, Option<&str>, bool, bool)> = page
        .links
        .iter()
        .map(|l| (l.index, l.text.as_str(), l.href.as_deref(), l.in_nav, l.in_submenu))
        .collect();

    assert_eq!(
        summary,
        vec![
            (0, "Home", Some("https://clinic.example/"), true, false),
            (1, "Meet the Team", Some("https://clinic.example/team"), true, true),
            (2, "Call us", Some("tel:+1%20555%20010%201234"), true, false),
            (3, "Open chat", None, false, false),
            (4, "Secret", Some("https://other.example/secret"), false, false),
        ]
    );
}

#[test]
fn dropdown_children_know_their_parent_label() {
    let page = LinkInventoryBuilder::new().build(PAGE, "https://clinic.example/");
    let children = page.children_of("about");

    assert_eq!(children.len(), 1);
    assert_eq!(children[0].text, "Meet the Team");
    assert_eq!(children[0].parent_menu.as_deref(), Some("About"));
}

#[test]
fn hidden_and_script_links_are_flagged() {
    let page = LinkInventoryBuilder::new().build(PAGE, "https://clinic.example/");

    assert!(page.links[3].is_toggle);
    assert!(page.links[4].hidden);
    assert_eq!(
        page.visible_link_texts(10),
        vec!["Home", "Meet the Team", "Call us", "Open chat"]
    );
}

#[test]
fn text_skips_scripts_and_keeps_blocks_on_lines() {
    let page = LinkInventoryBuilder::new().build(PAGE, "https://clinic.example/");

    assert!(page.text.contains("Welcome\nCaring for pets since 1990."));
    assert!(!page.text.contains("var nav"));
}

#[test]
fn tel_links_are_decoded() {
    let page = LinkInventoryBuilder::new().build(PAGE, "https://clinic.example/");
    let numbers: Vec<String> = page.tel_numbers().collect();

    assert_eq!(numbers, vec!["+1 555 010 1234".to_string()]);
}

#[test]
fn link_cap_is_respected() {
    let html: String = (0..10)
        .map(|i| format!("<a href=\"/p{i}\">Page {i}</a>"))
        .collect();
    let page = LinkInventoryBuilder::with_max_links(3).build(&html, "https://clinic.example/");

    assert_eq!(page.links.len(), 3);
    assert_eq!(page.links[2].text, "Page 2");
}
