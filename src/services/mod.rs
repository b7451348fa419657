// authcheck Core Services

pub mod config_store;
pub mod providers;
pub mod retry;
pub mod highlight;
pub mod detector;
pub mod paraphrase;
pub mod plagiarism;
pub mod session;

pub use config_store::*;
pub use providers::{
    error_from_body, extract_candidate_text, extract_json, gemini_base_url, get_api_key,
    plagiarism_url, Auth, Endpoint, HttpTransport, ProviderError, Transport, GEMINI_DEFAULT_MODEL,
};
pub use retry::{RetryPolicy, RetryingFetchClient};
pub use session::{Mode, Session, Submission, Ticket};

// Re-export highlight pipeline functions
pub use highlight::{
    annotate,
    find_all,
    highlight,
    render,
    render_detection,
    sanitize,
    DisplayText,
    Highlighted,
};
