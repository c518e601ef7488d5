use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use url::Url;

const DEFAULT_MAX_LINKS: usize = 2_000;
const SUBMENU_CLASS_HINTS: [&str; 4] = ["sub-menu", "submenu", "dropdown-menu", "dropdown-content"];

/// An anchor on the page. `index` is its position among all `<a>` elements
/// in document order, which is how the driver clicks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub index: usize,
    pub text: String,
    /// Absolute URL; `None` for fragment or script toggles.
    pub href: Option<String>,
    /// Inside `nav`, `header` or `role=navigation`.
    pub in_nav: bool,
    /// Inside a dropdown list below a menu item.
    pub in_submenu: bool,
    /// Label of the menu item owning the dropdown, when known.
    pub parent_menu: Option<String>,
    /// Opens a menu rather than (or as well as) navigating.
    pub is_toggle: bool,
    /// Hidden through markup (`hidden`, `aria-hidden`, inline style).
    pub hidden: bool,
}

/// Text and links of one page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageInventory {
    pub url: String,
    pub text: String,
    pub links: Vec<PageLink>,
}

impl PageInventory {
    /// Distinct non-empty texts of links that are not hidden, in page order.
    pub fn visible_link_texts(&self, limit: usize) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for link in self.links.iter().filter(|l| !l.hidden) {
            if link.text.is_empty() || out.iter().any(|t| t == &link.text) {
                continue;
            }
            out.push(link.text.clone());
            if out.len() >= limit {
                break;
            }
        }
        out
    }

    /// Visible navigation links outside any dropdown.
    pub fn top_level_nav(&self) -> impl Iterator<Item = &PageLink> {
        self.links
            .iter()
            .filter(|l| l.in_nav && !l.in_submenu && !l.hidden)
    }

    /// Dropdown entries under the menu item labelled `parent`.
    pub fn children_of(&self, parent: &str) -> Vec<&PageLink> {
        let parent = parent.trim();
        self.links
            .iter()
            .filter(|l| {
                l.parent_menu
                    .as_deref()
                    .is_some_and(|p| p.eq_ignore_ascii_case(parent))
            })
            .collect()
    }

    /// Numbers behind `tel:` links, in page order.
    pub fn tel_numbers(&self) -> impl Iterator<Item = String> + '_ {
        self.links.iter().filter_map(|l| {
            let href = l.href.as_deref()?;
            let number = href.strip_prefix("tel:")?;
            let decoded = number.replace("%20", " ").replace("%2B", "+");
            let trimmed = decoded.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
    }
}

/// Walks a DOM snapshot once, collecting readable text and every anchor
/// with its navigation context.
pub struct LinkInventoryBuilder {
    max_links: usize,
}

impl LinkInventoryBuilder {
    pub fn new() -> Self {
        Self::with_max_links(DEFAULT_MAX_LINKS)
    }

    pub fn with_max_links(max_links: usize) -> Self {
        Self { max_links }
    }

    pub fn build(&self, html: &str, page_url: &str) -> PageInventory {
        let document = Html::parse_document(html);
        let base_url = Url::parse(page_url).ok();
        let mut ctx = InventoryContext::new(base_url, self.max_links);

        for child in document.root_element().children() {
            self.visit_node(child, &mut ctx);
        }

        let (text, mut links) = ctx.into_output();
        mark_menu_parents(&mut links);
        PageInventory {
            url: page_url.to_string(),
            text,
            links,
        }
    }

    fn visit_node(&self, node: NodeRef<'_, Node>, ctx: &mut InventoryContext) {
        match node.value() {
            Node::Text(text) => ctx.append_text(text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element, ctx);
                }
            }
            _ => {
                for child in node.children() {
                    self.visit_node(child, ctx);
                }
            }
        }
    }

    fn visit_element(&self, element: ElementRef, ctx: &mut InventoryContext) {
        let tag = element.value().name().to_ascii_lowercase();
        if matches!(
            tag.as_str(),
            "script" | "style" | "noscript" | "iframe" | "template"
        ) {
            return;
        }

        let hidden = is_hidden(element);
        let nav = tag == "nav"
            || tag == "header"
            || element.value().attr("role") == Some("navigation");
        let submenu = match tag.as_str() {
            "ul" | "ol" => (ctx.nav_depth > 0 && !ctx.li_labels.is_empty()) || has_submenu_class(element),
            "div" => has_submenu_class(element),
            _ => false,
        };

        if hidden {
            ctx.hidden_depth += 1;
        }
        if nav {
            ctx.nav_depth += 1;
        }
        if submenu {
            let owner = ctx.li_labels.last().cloned().flatten();
            ctx.menus.push(owner);
        }

        match tag.as_str() {
            "a" => self.handle_anchor(element, ctx),
            "br" => ctx.ensure_newline(),
            "li" => {
                ctx.li_labels.push(li_label(element));
                ctx.ensure_newline();
                self.visit_children(element, ctx);
                ctx.ensure_newline();
                ctx.li_labels.pop();
            }
            "p" | "div" | "section" | "article" | "header" | "footer" | "nav" | "ul" | "ol"
            | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "table" | "tr" | "td" | "th"
            | "blockquote" | "address" | "figure" | "figcaption" | "main" | "aside" => {
                ctx.ensure_newline();
                self.visit_children(element, ctx);
                ctx.ensure_newline();
            }
            _ => self.visit_children(element, ctx),
        }

        if submenu {
            ctx.menus.pop();
        }
        if nav {
            ctx.nav_depth -= 1;
        }
        if hidden {
            ctx.hidden_depth -= 1;
        }
    }

    fn visit_children(&self, element: ElementRef, ctx: &mut InventoryContext) {
        for child in element.children() {
            self.visit_node(child, ctx);
        }
    }

    fn handle_anchor(&self, element: ElementRef, ctx: &mut InventoryContext) {
        let index = ctx.anchor_count;
        ctx.anchor_count += 1;

        let attrs = element.value();
        let raw_href = attrs.attr("href").map(str::trim);
        let start = ctx.builder.len();
        self.visit_children(element, ctx);
        let end = ctx.builder.len();

        let mut text = ctx.extract_substring(start, end);
        if text.is_empty() {
            text = attrs
                .attr("aria-label")
                .or_else(|| attrs.attr("title"))
                .map(collapse_whitespace)
                .unwrap_or_default();
        }

        let href = raw_href.and_then(|raw| resolve_href(raw, ctx.base_url.as_ref()));
        let script_only = match raw_href {
            None => true,
            Some(raw) => {
                raw.is_empty() || raw.starts_with('#') || raw.to_ascii_lowercase().starts_with("javascript:")
            }
        };
        let is_toggle = script_only
            || attrs.attr("aria-haspopup").is_some()
            || attrs.attr("aria-expanded").is_some()
            || attrs.classes().any(|c| c.contains("dropdown-toggle"));

        ctx.add_link(PageLink {
            index,
            text,
            href,
            in_nav: ctx.nav_depth > 0,
            in_submenu: !ctx.menus.is_empty(),
            parent_menu: ctx.menus.last().cloned().flatten(),
            is_toggle,
            hidden: ctx.hidden_depth > 0,
        });
    }
}

impl Default for LinkInventoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A top-level item owning a dropdown also acts as its toggle.
fn mark_menu_parents(links: &mut [PageLink]) {
    let parents: Vec<String> = links
        .iter()
        .filter_map(|l| l.parent_menu.as_deref().map(str::to_ascii_lowercase))
        .collect();
    for link in links.iter_mut().filter(|l| !l.in_submenu) {
        if parents.contains(&link.text.to_ascii_lowercase()) {
            link.is_toggle = true;
        }
    }
}

fn resolve_href(reference: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url.into());
    }
    base.and_then(|base| base.join(trimmed).ok()).map(Into::into)
}

fn is_hidden(element: ElementRef) -> bool {
    let attrs = element.value();
    if attrs.attr("hidden").is_some() || attrs.attr("aria-hidden") == Some("true") {
        return true;
    }
    attrs.attr("style").is_some_and(|style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

fn has_submenu_class(element: ElementRef) -> bool {
    element
        .value()
        .classes()
        .any(|c| SUBMENU_CLASS_HINTS.iter().any(|hint| c.eq_ignore_ascii_case(hint)))
}

/// Text of the first link or button inside a list item.
fn li_label(element: ElementRef) -> Option<String> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| {
            matches!(e.value().name(), "a" | "button") || e.value().attr("role") == Some("button")
        })
        .map(|e| collapse_whitespace(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct InventoryContext {
    builder: String,
    links: Vec<PageLink>,
    base_url: Option<Url>,
    max_links: usize,
    last_char: Option<char>,
    anchor_count: usize,
    nav_depth: usize,
    hidden_depth: usize,
    li_labels: Vec<Option<String>>,
    menus: Vec<Option<String>>,
}

impl InventoryContext {
    fn new(base_url: Option<Url>, max_links: usize) -> Self {
        Self {
            builder: String::new(),
            links: Vec::new(),
            base_url,
            max_links,
            last_char: None,
            anchor_count: 0,
            nav_depth: 0,
            hidden_depth: 0,
            li_labels: Vec::new(),
            menus: Vec::new(),
        }
    }

    fn into_output(self) -> (String, Vec<PageLink>) {
        (self.builder.trim().to_string(), self.links)
    }

    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if self.last_char == Some(' ') || self.last_char == Some('\n') {
                    continue;
                }
                self.push_char(' ');
            } else {
                self.push_char(ch);
            }
        }
    }

    fn ensure_newline(&mut self) {
        if self.last_char == Some('\n') || self.builder.is_empty() {
            return;
        }
        self.push_char('\n');
    }

    fn push_char(&mut self, ch: char) {
        self.builder.push(ch);
        self.last_char = Some(ch);
    }

    fn extract_substring(&self, start: usize, end: usize) -> String {
        collapse_whitespace(&self.builder[start..end])
    }

    fn add_link(&mut self, link: PageLink) {
        if self.links.len() >= self.max_links {
            return;
        }
        self.links.push(link);
    }
}
