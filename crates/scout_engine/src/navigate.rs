use std::sync::Arc;
use std::time::Duration;

use scout_logging::{scout_debug, scout_info};

use crate::browser::BrowserDriver;
use crate::clock::Clock;
use crate::error::ScoutError;
use crate::links::{PageInventory, PageLink};
use crate::reply::NavSuggestion;
use crate::staff::{likely_staff_url, score_staff_label};

const CHILD_THRESHOLD: u32 = 60;
const ANYWHERE_THRESHOLD: i64 = 90;

/// A concrete step that should lead to the staff page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    /// Click the anchor with this document index.
    Click { index: usize },
    /// Open the dropdown labelled `parent`, then click a child anchor.
    ExpandThenClick { parent: String, child: usize },
    /// Load the URL directly.
    Goto { url: String },
}

/// One way of turning a suggestion and a link inventory into an action.
pub trait NavStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn attempt(&self, page: &PageInventory, suggestion: &NavSuggestion) -> Option<NavAction>;
}

fn normalized(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// First link maximising `score`; `None` when nothing scores above zero.
fn best_by<'a, I, F>(links: I, score: F) -> Option<(&'a PageLink, i64)>
where
    I: IntoIterator<Item = &'a PageLink>,
    F: Fn(&PageLink) -> Option<i64>,
{
    links
        .into_iter()
        .filter_map(|l| score(l).map(|s| (l, s)))
        .fold(None, |best, (l, s)| match best {
            Some((_, best_score)) if best_score >= s => best,
            _ if s > 0 => Some((l, s)),
            _ => best,
        })
}

/// Exact, then containment, match against top-level navigation links.
pub struct ExactNavMatch;

impl NavStrategy for ExactNavMatch {
    fn name(&self) -> &'static str {
        "nav link"
    }

    fn attempt(&self, page: &PageInventory, suggestion: &NavSuggestion) -> Option<NavAction> {
        let target = normalized(&suggestion.label);
        if target.is_empty() {
            return None;
        }
        let exact = page
            .top_level_nav()
            .find(|l| normalized(&l.text) == target);
        let found = exact.or_else(|| {
            page.top_level_nav()
                .find(|l| contains_either(&normalized(&l.text), &target))
        })?;
        Some(NavAction::Click { index: found.index })
    }
}

/// Open a dropdown parent and pick the child: the one named by the
/// suggestion, otherwise the most staff-like.
pub struct DropdownChild;

impl NavStrategy for DropdownChild {
    fn name(&self) -> &'static str {
        "dropdown"
    }

    fn attempt(&self, page: &PageInventory, suggestion: &NavSuggestion) -> Option<NavAction> {
        let parent = suggestion
            .parent
            .clone()
            .unwrap_or_else(|| suggestion.label.clone());
        let children = page.children_of(&parent);
        if children.is_empty() {
            return None;
        }

        let wanted = normalized(&suggestion.label);
        let named = suggestion
            .parent
            .as_ref()
            .and_then(|_| children.iter().find(|l| normalized(&l.text) == wanted));
        let child = match named {
            Some(child) => *child,
            None => {
                let (child, _) = best_by(children.iter().copied(), |l| {
                    let score = score_staff_label(&l.text);
                    (score >= CHILD_THRESHOLD).then_some(i64::from(score))
                })?;
                child
            }
        };
        Some(NavAction::ExpandThenClick {
            parent,
            child: child.index,
        })
    }
}

/// Any anchor whose text matches the label, loaded straight from its href.
pub struct DirectHref;

impl NavStrategy for DirectHref {
    fn name(&self) -> &'static str {
        "direct href"
    }

    fn attempt(&self, page: &PageInventory, suggestion: &NavSuggestion) -> Option<NavAction> {
        let target = normalized(&suggestion.label);
        if target.is_empty() {
            return None;
        }
        let (link, _) = best_by(&page.links, |l| {
            let href = navigable_href(l)?;
            let text = normalized(&l.text);
            if text.is_empty() {
                return None;
            }
            let mut score = 0i64;
            if text == target {
                score += 50;
            }
            if contains_either(&text, &target) {
                score += 20;
            }
            if score == 0 {
                return None;
            }
            score += i64::from(score_staff_label(&text));
            if likely_staff_url(href) {
                score += 80;
            }
            Some(score)
        })?;
        Some(NavAction::Goto {
            url: link.href.clone()?,
        })
    }
}

/// The most staff-like link anywhere on the page, regardless of the
/// suggestion.
pub struct StaffKeywordFallback;

impl NavStrategy for StaffKeywordFallback {
    fn name(&self) -> &'static str {
        "staff keyword"
    }

    fn attempt(&self, page: &PageInventory, _suggestion: &NavSuggestion) -> Option<NavAction> {
        let (link, score) = best_by(&page.links, |l| {
            let href = navigable_href(l)?;
            let mut score = i64::from(score_staff_label(&l.text));
            if likely_staff_url(href) {
                score += 100;
            }
            score -= (href.len().min(200) / 50) as i64;
            Some(score)
        })?;
        if score < ANYWHERE_THRESHOLD {
            return None;
        }
        Some(NavAction::Goto {
            url: link.href.clone()?,
        })
    }
}

fn navigable_href(link: &PageLink) -> Option<&str> {
    let href = link.href.as_deref()?;
    let lower = href.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")).then_some(href)
}

#[derive(Debug, Clone)]
pub struct NavigationSettings {
    /// How long to watch for a URL change after an action.
    pub settle_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause after expanding a dropdown.
    pub expand_delay: Duration,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_secs(6),
            poll_interval: Duration::from_millis(200),
            expand_delay: Duration::from_millis(500),
        }
    }
}

/// Ordered fallback chain of [`NavStrategy`] objects.
pub struct NavigationResolver {
    strategies: Vec<Box<dyn NavStrategy>>,
    clock: Arc<dyn Clock>,
    settings: NavigationSettings,
}

impl NavigationResolver {
    pub fn new(clock: Arc<dyn Clock>, settings: NavigationSettings) -> Self {
        Self::with_strategies(
            vec![
                Box::new(ExactNavMatch),
                Box::new(DropdownChild),
                Box::new(DirectHref),
                Box::new(StaffKeywordFallback),
            ],
            clock,
            settings,
        )
    }

    pub fn with_strategies(
        strategies: Vec<Box<dyn NavStrategy>>,
        clock: Arc<dyn Clock>,
        settings: NavigationSettings,
    ) -> Self {
        Self {
            strategies,
            clock,
            settings,
        }
    }

    /// Candidate actions in strategy order, with the strategy name.
    pub fn plan(
        &self,
        page: &PageInventory,
        suggestion: &NavSuggestion,
    ) -> Vec<(&'static str, NavAction)> {
        let mut actions: Vec<(&'static str, NavAction)> = Vec::new();
        for strategy in &self.strategies {
            if let Some(action) = strategy.attempt(page, suggestion) {
                if !actions.iter().any(|(_, a)| a == &action) {
                    actions.push((strategy.name(), action));
                }
            }
        }
        actions
    }

    /// Try each planned action until one navigates. `Ok(false)` means the
    /// caller should work with the page as it is.
    pub async fn resolve_and_navigate(
        &self,
        browser: &dyn BrowserDriver,
        tab: &str,
        page: &PageInventory,
        suggestion: Option<&NavSuggestion>,
    ) -> Result<bool, ScoutError> {
        let empty = NavSuggestion::new("");
        let suggestion = suggestion.unwrap_or(&empty);

        for (name, action) in self.plan(page, suggestion) {
            let start_url = browser.current_url(tab).await?;
            scout_debug!("Trying {} strategy: {:?}", name, action);
            if let Err(e) = self.execute(browser, tab, &action).await {
                scout_debug!("{} strategy failed: {}", name, e);
                continue;
            }
            if self.wait_for_navigation(browser, tab, &start_url).await {
                scout_info!("Navigated via {} strategy", name);
                return Ok(true);
            }
        }
        scout_debug!("No strategy navigated for '{}'", suggestion.label);
        Ok(false)
    }

    async fn execute(
        &self,
        browser: &dyn BrowserDriver,
        tab: &str,
        action: &NavAction,
    ) -> Result<(), ScoutError> {
        match action {
            NavAction::Click { index } => browser.click_link(tab, *index).await?,
            NavAction::ExpandThenClick { parent, child } => {
                if !browser.expand_menu(tab, parent).await? {
                    scout_debug!("Menu '{}' not found; clicking child directly", parent);
                }
                self.clock.sleep(self.settings.expand_delay).await;
                browser.click_link(tab, *child).await?;
            }
            NavAction::Goto { url } => browser.navigate(tab, url).await?,
        }
        Ok(())
    }

    /// Success once the URL differs from `start_url`. A staff-looking URL that
    /// never changed does not count: hosts like `cityvets.example` match the
    /// keywords on every page.
    async fn wait_for_navigation(
        &self,
        browser: &dyn BrowserDriver,
        tab: &str,
        start_url: &str,
    ) -> bool {
        let start = self.clock.now();
        loop {
            if let Ok(current) = browser.current_url(tab).await {
                if current != start_url {
                    return true;
                }
            }
            if self.clock.elapsed_since(start) >= self.settings.settle_timeout {
                return false;
            }
            self.clock.sleep(self.settings.poll_interval).await;
        }
    }
}
