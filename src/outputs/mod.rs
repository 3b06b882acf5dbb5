//! Output generation for stored articles.
//!
//! # Submodules
//!
//! - [`json`]: Writes the stored article feed to dated JSON files
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! ├── 2025-05-06/
//! │   └── articles.json
//! └── 2025-05-07/
//!     └── articles.json
//! ```

pub mod json;
