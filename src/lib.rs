//! Move heredoc payloads out of VM startup scripts.
//!
//! Each service's `startup.sh` may embed `package.json` and `app.js` as
//! heredocs. The extractor writes those bodies to sibling files and replaces
//! the heredocs with `curl` calls against the instance metadata server.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
