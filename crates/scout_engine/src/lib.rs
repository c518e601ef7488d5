//! Scout engine: browser IO, row processing and the batch orchestrator.
mod artifacts;
mod browser;
pub mod cdp;
mod chat;
mod clock;
mod completion;
mod error;
mod extract;
mod links;
mod navigate;
mod orchestrator;
mod prompts;
mod reply;
mod row;
mod sheet;
mod staff;
mod tabs;

pub use artifacts::{ensure_artifact_dir, ArtifactError, ArtifactStore};
pub use browser::{BrowserDriver, CdpBrowser, TabInfo};
pub use cdp::{CdpSettings, Key};
pub use chat::{BrowserChat, ChatAssistant};
pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::{ChatObservation, ChatSurface, CompletionDetector, DetectorSettings};
pub use error::ScoutError;
pub use extract::{ExtractedFacts, TextFactExtractor};
pub use links::{LinkInventoryBuilder, PageInventory, PageLink};
pub use navigate::{
    DirectHref, DropdownChild, ExactNavMatch, NavAction, NavStrategy, NavigationResolver,
    NavigationSettings, StaffKeywordFallback,
};
pub use orchestrator::{BatchOrchestrator, JobControl, OrchestratorSettings, WorkItem};
pub use prompts::{build_nav_prompt, build_staff_csv_prompt};
pub use reply::{parse_nav_reply, parse_staff_reply, strip_fences, NavSuggestion};
pub use row::{RowHandler, RowProcessor, RowSettings};
pub use sheet::{
    cell_ref, column_index, csv_export_url, is_valid_sheet_url, parse_csv, BrowserSheet,
    SheetLayout, Spreadsheet, OUTPUT_HEADERS,
};
pub use staff::{likely_staff_url, score_staff_label};
pub use tabs::{TabHandle, TabKind, TabManager, TabUrls};
