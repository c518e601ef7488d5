#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, Once};
use std::time::Duration;

use scout_engine::cdp::CdpError;
use scout_engine::{
    column_index, BrowserDriver, ChatAssistant, ChatObservation, ChatSurface, ExtractedFacts,
    Key, LinkInventoryBuilder, PageInventory, RowHandler, ScoutError, Spreadsheet, TabInfo,
};
use serde_json::Value;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scout_logging::initialize_for_tests);
}

/// Scriptable browser. Tabs can be added, moved and closed by the test;
/// clicking a link follows the href found in the current page's HTML, or in
/// the inventory given to [`FakeBrowser::on_page`].
#[derive(Default)]
pub struct FakeBrowser {
    tabs: Mutex<Vec<TabInfo>>,
    next_tab: Mutex<usize>,
    pages: Mutex<HashMap<String, String>>,
    home_hrefs: Vec<Option<String>>,
    unreachable: Mutex<HashSet<String>>,
    scripts: Mutex<Vec<(String, VecDeque<Value>)>>,
    actions: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
    active: Mutex<Option<String>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// One tab `site` showing `page`.
    pub fn on_page(page: &PageInventory) -> Self {
        let browser = Self {
            home_hrefs: page.links.iter().map(|l| l.href.clone()).collect(),
            ..Self::default()
        };
        browser.add_tab("site", &page.url);
        browser
    }

    pub fn add_tab(&self, id: &str, url: &str) {
        self.tabs.lock().unwrap().push(TabInfo {
            id: id.to_string(),
            url: url.to_string(),
            title: String::new(),
        });
    }

    pub fn set_tab_url(&self, id: &str, url: &str) {
        if let Some(tab) = self.tabs.lock().unwrap().iter_mut().find(|t| t.id == id) {
            tab.url = url.to_string();
        }
    }

    pub fn remove_tab(&self, id: &str) {
        self.tabs.lock().unwrap().retain(|t| t.id != id);
    }

    pub fn tab_ids(&self) -> Vec<String> {
        self.tabs.lock().unwrap().iter().map(|t| t.id.clone()).collect()
    }

    /// Serve `html` whenever a tab shows `url`.
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
        self
    }

    /// Opening or navigating to a URL on this host fails.
    pub fn unreachable(self, host: &str) -> Self {
        self.unreachable.lock().unwrap().insert(host.to_string());
        self
    }

    /// `evaluate` returns `value` for expressions containing `needle`.
    pub fn on_script(self, needle: &str, value: Value) -> Self {
        self.on_script_sequence(needle, vec![value])
    }

    /// Like [`FakeBrowser::on_script`], one value per call; the last repeats.
    pub fn on_script_sequence(self, needle: &str, values: Vec<Value>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push((needle.to_string(), values.into()));
        self
    }

    /// Page interactions: clicks, expands, gotos, typing and attachments.
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    /// Tab lifecycle: opens, activations and closes.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn active(&self) -> Option<String> {
        self.active.lock().unwrap().clone()
    }

    /// URL of tab `site`, or of the first tab.
    pub fn url(&self) -> String {
        let tabs = self.tabs.lock().unwrap();
        tabs.iter()
            .find(|t| t.id == "site")
            .or_else(|| tabs.first())
            .map(|t| t.url.clone())
            .unwrap_or_default()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    fn event(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn tab_url(&self, id: &str) -> Result<String, CdpError> {
        self.tabs
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.url.clone())
            .ok_or_else(|| CdpError::TargetNotFound(id.to_string()))
    }

    fn check_reachable(&self, url: &str) -> Result<(), CdpError> {
        let unreachable = self.unreachable.lock().unwrap();
        if unreachable.iter().any(|host| url.contains(host.as_str())) {
            return Err(CdpError::NavigationFailed(format!("{url}: net::ERR_NAME_NOT_RESOLVED")));
        }
        Ok(())
    }

    fn hrefs_on(&self, url: &str) -> Vec<Option<String>> {
        match self.pages.lock().unwrap().get(url) {
            Some(html) => LinkInventoryBuilder::new()
                .build(html, url)
                .links
                .iter()
                .map(|l| l.href.clone())
                .collect(),
            None => self.home_hrefs.clone(),
        }
    }
}

#[async_trait::async_trait]
impl BrowserDriver for FakeBrowser {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, CdpError> {
        Ok(self.tabs.lock().unwrap().clone())
    }

    async fn open_tab(&self, url: &str) -> Result<TabInfo, CdpError> {
        self.event(format!("open {url}"));
        self.check_reachable(url)?;
        let id = {
            let mut next = self.next_tab.lock().unwrap();
            *next += 1;
            format!("tab-{next}")
        };
        self.add_tab(&id, url);
        Ok(TabInfo {
            id,
            url: url.to_string(),
            title: String::new(),
        })
    }

    async fn activate(&self, tab: &str) -> Result<(), CdpError> {
        self.tab_url(tab)?;
        self.event(format!("activate {tab}"));
        *self.active.lock().unwrap() = Some(tab.to_string());
        Ok(())
    }

    async fn close_tab(&self, tab: &str) -> Result<(), CdpError> {
        self.tab_url(tab)?;
        self.event(format!("close {tab}"));
        self.remove_tab(tab);
        Ok(())
    }

    async fn navigate(&self, tab: &str, url: &str) -> Result<(), CdpError> {
        self.record(format!("goto {url}"));
        self.check_reachable(url)?;
        self.tab_url(tab)?;
        self.set_tab_url(tab, url);
        Ok(())
    }

    async fn current_url(&self, tab: &str) -> Result<String, CdpError> {
        self.tab_url(tab)
    }

    async fn page_html(&self, tab: &str) -> Result<String, CdpError> {
        let url = self.tab_url(tab)?;
        Ok(self.pages.lock().unwrap().get(&url).cloned().unwrap_or_default())
    }

    async fn evaluate(&self, _tab: &str, expression: &str) -> Result<Value, CdpError> {
        let mut scripts = self.scripts.lock().unwrap();
        let Some((_, values)) = scripts
            .iter_mut()
            .find(|(needle, _)| expression.contains(needle.as_str()))
        else {
            return Ok(Value::Null);
        };
        let value = if values.len() > 1 {
            values.pop_front()
        } else {
            values.front().cloned()
        };
        Ok(value.unwrap_or(Value::Null))
    }

    async fn click_link(&self, tab: &str, index: usize) -> Result<(), CdpError> {
        self.record(format!("click {index}"));
        let url = self.tab_url(tab)?;
        match self.hrefs_on(&url).get(index) {
            Some(Some(href)) => {
                self.set_tab_url(tab, href);
                Ok(())
            }
            Some(None) => Ok(()),
            None => Err(CdpError::ElementNotFound(format!("link #{index}"))),
        }
    }

    async fn expand_menu(&self, _tab: &str, label: &str) -> Result<bool, CdpError> {
        self.record(format!("expand {label}"));
        Ok(true)
    }

    async fn insert_text(&self, _tab: &str, text: &str) -> Result<(), CdpError> {
        self.record(format!("type {text}"));
        Ok(())
    }

    async fn press_key(&self, _tab: &str, key: Key) -> Result<(), CdpError> {
        self.record(format!("key {key:?}"));
        Ok(())
    }

    async fn set_file_input(
        &self,
        _tab: &str,
        selector: &str,
        path: &Path,
    ) -> Result<(), CdpError> {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        self.record(format!("attach {selector} ({size} bytes)"));
        Ok(())
    }

    async fn screenshot_jpeg(&self, _tab: &str) -> Result<String, CdpError> {
        Ok(SCREENSHOT.to_string())
    }
}

/// Base64 stand-in for a JPEG screenshot.
pub const SCREENSHOT: &str = "/9j/4AAQSkZJRg==";

/// Chat assistant replaying scripted answers in order. Once the script runs
/// out every question times out.
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, ScoutError>>>,
    prompts: Mutex<Vec<(String, bool)>>,
    threads: Mutex<usize>,
}

impl ScriptedChat {
    pub fn replying(replies: Vec<Result<String, ScoutError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Every prompt asked, with whether an image came along.
    pub fn prompts(&self) -> Vec<(String, bool)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn threads(&self) -> usize {
        *self.threads.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ChatAssistant for ScriptedChat {
    async fn new_thread(&self) -> Result<(), ScoutError> {
        *self.threads.lock().unwrap() += 1;
        Ok(())
    }

    async fn ask(&self, prompt: &str, image_jpeg_base64: Option<&str>) -> Result<String, ScoutError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), image_jpeg_base64.is_some()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ScoutError::ResponseTimeout(Duration::from_secs(20))))
    }
}

pub fn timeout() -> Result<String, ScoutError> {
    Err(ScoutError::ResponseTimeout(Duration::from_secs(20)))
}

enum SheetCursor {
    Idle,
    NameBox(String),
    Cell {
        row: usize,
        col: usize,
        pending: Option<String>,
    },
}

struct SheetTabState {
    cells: BTreeMap<(usize, usize), String>,
    cursor: SheetCursor,
    typed: Vec<String>,
    commits: Vec<(usize, usize, String)>,
}

/// A browser holding one spreadsheet tab that understands the Name box,
/// typing, Tab/Enter/Delete and the CSV export fetch.
pub struct SheetTab {
    url: String,
    state: Mutex<SheetTabState>,
    banner: bool,
    read_only: bool,
}

impl SheetTab {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            state: Mutex::new(SheetTabState {
                cells: BTreeMap::new(),
                cursor: SheetCursor::Idle,
                typed: Vec::new(),
                commits: Vec::new(),
            }),
            banner: false,
            read_only: false,
        }
    }

    /// Show a "Comment only" style banner.
    pub fn with_banner(mut self) -> Self {
        self.banner = true;
        self
    }

    /// Accept keystrokes but never save them.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_cell(self, column: &str, row: usize, value: &str) -> Self {
        let col = column_index(column).unwrap();
        self.state
            .lock()
            .unwrap()
            .cells
            .insert((row, col), value.to_string());
        self
    }

    pub fn get(&self, column: &str, row: usize) -> String {
        let col = column_index(column).unwrap();
        self.state
            .lock()
            .unwrap()
            .cells
            .get(&(row, col))
            .cloned()
            .unwrap_or_default()
    }

    /// Text typed anywhere, Name box included.
    pub fn typed(&self) -> Vec<String> {
        self.state.lock().unwrap().typed.clone()
    }

    /// Saved edits as (row, column index, value).
    pub fn commits(&self) -> Vec<(usize, usize, String)> {
        self.state.lock().unwrap().commits.clone()
    }

    fn export(&self) -> String {
        let state = self.state.lock().unwrap();
        let rows = state.cells.keys().map(|(r, _)| *r).max().unwrap_or(0);
        let cols = state.cells.keys().map(|(_, c)| *c).max().map_or(0, |c| c + 1);
        let mut out = String::new();
        for row in 1..=rows {
            let line: Vec<String> = (0..cols)
                .map(|col| {
                    let value = state.cells.get(&(row, col)).cloned().unwrap_or_default();
                    if value.contains([',', '"']) {
                        format!("\"{}\"", value.replace('"', "\"\""))
                    } else {
                        value
                    }
                })
                .collect();
            out.push_str(&line.join(","));
            out.push_str("\r\n");
        }
        out
    }
}

fn split_cell_ref(cell: &str) -> (usize, usize) {
    let split = cell.find(|c: char| c.is_ascii_digit()).unwrap();
    let (letters, digits) = cell.split_at(split);
    (digits.parse().unwrap(), column_index(letters).unwrap())
}

#[async_trait::async_trait]
impl BrowserDriver for SheetTab {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, CdpError> {
        Ok(vec![TabInfo {
            id: "sheet".to_string(),
            url: self.url.clone(),
            title: "Clinics - Google Sheets".to_string(),
        }])
    }

    async fn open_tab(&self, url: &str) -> Result<TabInfo, CdpError> {
        Err(CdpError::NavigationFailed(url.to_string()))
    }

    async fn activate(&self, _tab: &str) -> Result<(), CdpError> {
        Ok(())
    }

    async fn close_tab(&self, _tab: &str) -> Result<(), CdpError> {
        Ok(())
    }

    async fn navigate(&self, _tab: &str, _url: &str) -> Result<(), CdpError> {
        Ok(())
    }

    async fn current_url(&self, _tab: &str) -> Result<String, CdpError> {
        Ok(self.url.clone())
    }

    async fn page_html(&self, _tab: &str) -> Result<String, CdpError> {
        Ok(String::new())
    }

    async fn evaluate(&self, _tab: &str, expression: &str) -> Result<Value, CdpError> {
        if expression.contains("waffle-name-box") {
            self.state.lock().unwrap().cursor = SheetCursor::NameBox(String::new());
            return Ok(Value::Bool(true));
        }
        if expression.contains("Comment only") {
            return Ok(Value::Bool(self.banner));
        }
        if expression.contains("export?format=csv") {
            return Ok(serde_json::json!({"ok": true, "text": self.export()}));
        }
        Ok(Value::Null)
    }

    async fn click_link(&self, _tab: &str, index: usize) -> Result<(), CdpError> {
        Err(CdpError::ElementNotFound(format!("link #{index}")))
    }

    async fn expand_menu(&self, _tab: &str, _label: &str) -> Result<bool, CdpError> {
        Ok(false)
    }

    async fn insert_text(&self, _tab: &str, text: &str) -> Result<(), CdpError> {
        let mut state = self.state.lock().unwrap();
        state.typed.push(text.to_string());
        match &mut state.cursor {
            SheetCursor::NameBox(buffer) => buffer.push_str(text),
            SheetCursor::Cell { pending, .. } => {
                pending.get_or_insert_with(String::new).push_str(text)
            }
            SheetCursor::Idle => {}
        }
        Ok(())
    }

    async fn press_key(&self, _tab: &str, key: Key) -> Result<(), CdpError> {
        let mut state = self.state.lock().unwrap();
        let cursor = std::mem::replace(&mut state.cursor, SheetCursor::Idle);
        let next = match (cursor, key) {
            (SheetCursor::NameBox(target), Key::Enter) => {
                let (row, col) = split_cell_ref(&target);
                SheetCursor::Cell {
                    row,
                    col,
                    pending: None,
                }
            }
            (SheetCursor::Cell { row, col, .. }, Key::Delete) => SheetCursor::Cell {
                row,
                col,
                pending: Some(String::new()),
            },
            (SheetCursor::Cell { row, col, pending }, Key::Tab | Key::Enter) => {
                if let Some(value) = pending.filter(|_| !self.read_only) {
                    let value = value.strip_prefix('\'').unwrap_or(&value).to_string();
                    state.commits.push((row, col, value.clone()));
                    if value.is_empty() {
                        state.cells.remove(&(row, col));
                    } else {
                        state.cells.insert((row, col), value);
                    }
                }
                if key == Key::Tab {
                    SheetCursor::Cell {
                        row,
                        col: col + 1,
                        pending: None,
                    }
                } else {
                    SheetCursor::Cell {
                        row: row + 1,
                        col,
                        pending: None,
                    }
                }
            }
            (other, _) => other,
        };
        state.cursor = next;
        Ok(())
    }

    async fn set_file_input(
        &self,
        _tab: &str,
        _selector: &str,
        _path: &Path,
    ) -> Result<(), CdpError> {
        Ok(())
    }

    async fn screenshot_jpeg(&self, _tab: &str) -> Result<String, CdpError> {
        Ok(SCREENSHOT.to_string())
    }
}

/// In-memory spreadsheet keyed by (row, column index).
#[derive(Default)]
pub struct FakeSheet {
    cells: Mutex<BTreeMap<(usize, usize), String>>,
    writes: Mutex<Vec<(usize, Vec<String>)>>,
}

impl FakeSheet {
    /// Input URLs in column Z from row 2 down.
    pub fn with_inputs(urls: &[&str]) -> Self {
        let sheet = Self::default();
        for (i, url) in urls.iter().enumerate() {
            sheet.set("Z", i + 2, url);
        }
        sheet
    }

    pub fn set(&self, column: &str, row: usize, value: &str) {
        let col = column_index(column).unwrap();
        self.cells
            .lock()
            .unwrap()
            .insert((row, col), value.to_string());
    }

    pub fn get(&self, column: &str, row: usize) -> String {
        let col = column_index(column).unwrap();
        self.cells
            .lock()
            .unwrap()
            .get(&(row, col))
            .cloned()
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<(usize, Vec<String>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Spreadsheet for FakeSheet {
    async fn probe_access(&self) -> Result<(), ScoutError> {
        Ok(())
    }

    async fn read_cell(&self, cell: &str) -> Result<String, ScoutError> {
        let split = cell.find(|c: char| c.is_ascii_digit()).unwrap();
        let (column, row) = cell.split_at(split);
        Ok(self.get(column, row.parse().unwrap()))
    }

    async fn column_values(&self, column: &str) -> Result<Vec<String>, ScoutError> {
        let col = column_index(column).unwrap();
        let cells = self.cells.lock().unwrap();
        let last = cells.keys().map(|(row, _)| *row).max().unwrap_or(0);
        Ok((1..=last)
            .map(|row| cells.get(&(row, col)).cloned().unwrap_or_default())
            .collect())
    }

    async fn find_next_empty_row(&self) -> Result<usize, ScoutError> {
        let filled = self
            .column_values("A")
            .await?
            .iter()
            .filter(|v| !v.is_empty())
            .count();
        Ok(if filled == 0 { 2 } else { filled + 1 })
    }

    async fn write_row(&self, row: usize, values: &[String]) -> Result<(), ScoutError> {
        {
            let mut cells = self.cells.lock().unwrap();
            for (i, value) in values.iter().enumerate() {
                cells.insert((row, i), value.clone());
            }
        }
        self.writes.lock().unwrap().push((row, values.to_vec()));
        Ok(())
    }
}

/// Row handler returning fixed facts, failing the listed rows.
#[derive(Default)]
pub struct ScriptedRows {
    failing: HashSet<usize>,
    processed: Mutex<Vec<usize>>,
}

impl ScriptedRows {
    pub fn failing(rows: &[usize]) -> Self {
        Self {
            failing: rows.iter().copied().collect(),
            processed: Mutex::new(Vec::new()),
        }
    }

    pub fn processed(&self) -> Vec<usize> {
        self.processed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RowHandler for ScriptedRows {
    async fn process_row(
        &self,
        _job_id: &str,
        row: usize,
        url: &str,
    ) -> Result<ExtractedFacts, ScoutError> {
        self.processed.lock().unwrap().push(row);
        if self.failing.contains(&row) {
            return Err(ScoutError::Row {
                row,
                message: format!("{url} did not load"),
            });
        }
        Ok(ExtractedFacts {
            phone: Some("(555) 010-0000".to_string()),
            owner_first: Some("Ada".to_string()),
            owner_last: Some("Lovelace".to_string()),
            doctor_count: Some(2),
        })
    }
}

/// Chat surface replaying scripted observations; the last one repeats.
pub struct ScriptedSurface {
    script: Mutex<VecDeque<ChatObservation>>,
    polls: Mutex<usize>,
}

impl ScriptedSurface {
    pub fn new(script: Vec<ChatObservation>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            polls: Mutex::new(0),
        }
    }

    pub fn polls(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ChatSurface for ScriptedSurface {
    async fn observe(&self) -> Result<ChatObservation, ScoutError> {
        *self.polls.lock().unwrap() += 1;
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        Ok(next.unwrap_or_default())
    }
}

pub fn streaming(text: &str, count: usize) -> ChatObservation {
    ChatObservation {
        streaming: true,
        reply_count: count,
        last_reply: text.to_string(),
    }
}

pub fn idle(text: &str, count: usize) -> ChatObservation {
    ChatObservation {
        streaming: false,
        reply_count: count,
        last_reply: text.to_string(),
    }
}
