pub mod address;
pub mod bounce_detect;
pub mod business_hours;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod html_clean;
pub mod logging;
pub mod metrics;
pub mod name_parts;
pub mod quoting;
pub mod template;

pub use address::normalize_email;
pub use bounce_detect::{extract_bounced_email, is_bounce_email};
pub use business_hours::{is_business_hours, next_allowed_uk_business_time};
pub use config::{AppConfig, GraphConfig, SenderMailboxConfig, TemplatesConfig};
pub use cooldown::{cooldown_elapsed, randomize_post_send_delay};
pub use error::{OrchestratorError, OrchestratorResult};
pub use html_clean::clean_email_body;
pub use logging::init_logging;
pub use metrics::{init_metrics, record_queue_depth, record_rows_processed, record_tick, record_tick_error, serve_metrics};
pub use name_parts::extract_name_parts_with_prefix;
pub use quoting::build_outgoing_body;
pub use template::{render_template_strict, TemplateContext, TemplateStore};
